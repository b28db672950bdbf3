//! Picks the most vocal 40–60 second window of a track and places seamless
//! loop points inside it.
//!
//! ```no_run
//! use segmenta::{select_segment, AudioSignal, LogObserver, SelectionConfig};
//!
//! let signal = AudioSignal::new(vec![0.0; 44_100 * 90], 44_100)?;
//! let result = select_segment(&signal, &SelectionConfig::default(), &LogObserver::new("demo"))?;
//! println!("{:.1}s-{:.1}s score={:.3}", result.start, result.end, result.vocal_score);
//! # Ok::<(), segmenta::SegmentError>(())
//! ```
//!
//! Everything in here is a pure function of its inputs: scoring, loop points
//! and tempo/key estimation can run for many tracks at once.

pub mod analysis;
pub mod audio;
pub mod error;
pub mod observer;
pub mod segment;

#[cfg(test)]
pub(crate) mod testing;

pub use analysis::{estimate_tempo_and_key, PitchClass, SpectralStats, TempoKey};
pub use audio::{AudioSignal, SignalSlice};
pub use error::SegmentError;
pub use observer::{LogObserver, NoopObserver, SelectionObserver};
pub use segment::{
    compute_loop_points, segment_for_window, select_best_window, select_segment, select_window,
    LoopPoints, LoopStrategy, SampleSpan, SegmentSelectionResult, SelectionConfig,
    WindowCandidate, WindowScanner,
};
