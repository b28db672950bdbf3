use std::cmp::Ordering;

use rayon::prelude::*;

use super::{SampleSpan, WindowCandidate};
use crate::analysis::{score, spectral};
use crate::audio::AudioSignal;
use crate::error::{Result, SegmentError};

/// Slides a candidate window across a signal and keeps the most vocal one.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WindowScanner {
    min_length: f32,
    max_length: f32,
    stride: f32,
}

impl WindowScanner {
    pub fn new(min_length: f32, max_length: f32, stride: f32) -> Result<Self> {
        if !(min_length.is_finite() && max_length.is_finite() && stride.is_finite()) {
            return Err(SegmentError::invalid("window lengths and stride must be finite"));
        }
        if min_length <= 0.0 || stride <= 0.0 {
            return Err(SegmentError::invalid("minimum window length and stride must be positive"));
        }
        if max_length < min_length {
            return Err(SegmentError::invalid(format!(
                "maximum window length {:.2}s is below the minimum {:.2}s",
                max_length, min_length
            )));
        }
        Ok(Self {
            min_length,
            max_length,
            stride,
        })
    }

    pub fn min_length(&self) -> f32 {
        self.min_length
    }

    pub fn max_length(&self) -> f32 {
        self.max_length
    }

    pub fn stride(&self) -> f32 {
        self.stride
    }

    /// Scores every admissible window. The result is ordered by start offset.
    ///
    /// Fails with [`SegmentError::InsufficientSignalLength`] when the signal
    /// cannot hold a single window of `min_length`.
    pub fn scan(&self, signal: &AudioSignal) -> Result<Vec<WindowCandidate>> {
        let sr = signal.sample_rate() as f64;
        let min_samples = (self.min_length as f64 * sr).ceil() as usize;
        let max_samples = (self.max_length as f64 * sr).floor() as usize;
        let stride_samples = ((self.stride as f64 * sr).round() as usize).max(1);

        if min_samples == 0 || max_samples < min_samples {
            return Err(SegmentError::invalid(format!(
                "window range {:.4}s-{:.4}s holds no whole sample at {}Hz",
                self.min_length,
                self.max_length,
                signal.sample_rate()
            )));
        }

        let total = signal.len();
        let offsets: Vec<usize> = (0..)
            .map(|i| i * stride_samples)
            .take_while(|&start| start + min_samples <= total)
            .collect();

        if offsets.is_empty() {
            return Err(SegmentError::InsufficientSignalLength {
                duration_seconds: signal.duration_seconds(),
                min_length_seconds: self.min_length,
            });
        }

        let candidates: Vec<WindowCandidate> = offsets
            .into_par_iter()
            .filter_map(|start| {
                let len = max_samples.min(total - start);
                if len < min_samples {
                    return None;
                }
                let span = SampleSpan {
                    start,
                    len,
                    sample_rate: signal.sample_rate(),
                };
                let stats = spectral::analyze(&span.slice(signal));
                Some(WindowCandidate::new(span, score::score(&stats)))
            })
            .collect();

        if candidates.is_empty() {
            return Err(SegmentError::InsufficientSignalLength {
                duration_seconds: signal.duration_seconds(),
                min_length_seconds: self.min_length,
            });
        }

        Ok(candidates)
    }

    pub fn select_best(&self, signal: &AudioSignal) -> Result<WindowCandidate> {
        let candidates = self.scan(signal)?;
        pick_best(&candidates).ok_or(SegmentError::InsufficientSignalLength {
            duration_seconds: signal.duration_seconds(),
            min_length_seconds: self.min_length,
        })
    }
}

/// Convenience wrapper around [`WindowScanner::select_best`].
pub fn select_best_window(
    signal: &AudioSignal,
    min_length: f32,
    max_length: f32,
    stride: f32,
) -> Result<WindowCandidate> {
    WindowScanner::new(min_length, max_length, stride)?.select_best(signal)
}

/// Highest score wins; equal scores go to the earliest start.
///
/// Independent of the order of `candidates`.
pub fn pick_best(candidates: &[WindowCandidate]) -> Option<WindowCandidate> {
    candidates.iter().copied().reduce(|best, candidate| {
        match candidate.score.total_cmp(&best.score) {
            Ordering::Greater => candidate,
            Ordering::Equal if candidate.span.start < best.span.start => candidate,
            _ => best,
        }
    })
}
