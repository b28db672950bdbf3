//! Spectral statistics, vocal scoring and tempo/key estimation.

pub mod key;
pub mod score;
pub mod spectral;
pub mod tempo;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::audio::stft::magnitude_spectrogram;
use crate::audio::SignalSlice;
use crate::observer::{NoopObserver, SelectionObserver};

pub use key::PitchClass;
pub use spectral::SpectralStats;

/// Why a tempo or key estimate could not be made. Never leaves this crate's
/// estimation code; it is turned into `None`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DegenerateEstimate {
    reason: &'static str,
}

impl DegenerateEstimate {
    pub(crate) fn new(reason: &'static str) -> Self {
        Self { reason }
    }

    pub fn reason(&self) -> &'static str {
        self.reason
    }
}

impl fmt::Display for DegenerateEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.reason)
    }
}

/// Best-effort tempo and key of a slice.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TempoKey {
    pub bpm: Option<f32>,
    pub key: Option<PitchClass>,
}

/// Estimates BPM and key. Failures degrade to `None`.
pub fn estimate_tempo_and_key(slice: &SignalSlice<'_>) -> TempoKey {
    estimate_tempo_and_key_observed(slice, &NoopObserver)
}

/// Like [`estimate_tempo_and_key`], reporting dropped estimates to `observer`.
pub fn estimate_tempo_and_key_observed(
    slice: &SignalSlice<'_>,
    observer: &dyn SelectionObserver,
) -> TempoKey {
    let bpm = match tempo::track_beats(slice) {
        Ok(track) => match track.bpm() {
            Some(bpm) => Some(bpm),
            None => {
                observer.on_estimate_absorbed("bpm", "fewer than two beats");
                None
            }
        },
        Err(err) => {
            observer.on_estimate_absorbed("bpm", err.reason());
            None
        }
    };

    let spec = magnitude_spectrogram(slice.samples(), slice.sample_rate());
    let key = match key::estimate_key(&spec) {
        Ok(key) => Some(key),
        Err(err) => {
            observer.on_estimate_absorbed("key", err.reason());
            None
        }
    };

    TempoKey { bpm, key }
}
