pub mod decode;
pub mod signal;
pub mod stft;

pub use signal::{AudioSignal, SignalSlice};
