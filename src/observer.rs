//! Hook for callers that want to watch the selection as it happens.
//!
//! The core never logs on its own; it reports to whatever observer the
//! orchestrator passes in. [`NoopObserver`] ignores everything and
//! [`LogObserver`] forwards to the `log` facade.

use crate::segment::{LoopPoints, WindowCandidate};

pub trait SelectionObserver: Sync {
    /// Called once per scored candidate, in start order, after all are scored.
    fn on_candidate(&self, _candidate: &WindowCandidate) {}

    fn on_window_selected(&self, _window: &WindowCandidate, _candidates_scored: usize) {}

    fn on_loop_points(&self, _loop_points: &LoopPoints) {}

    /// The beat-aligned loop strategy found too few beats and used correlation instead.
    fn on_loop_fallback(&self, _beats_found: usize) {}

    /// A tempo or key estimate was dropped.
    fn on_estimate_absorbed(&self, _what: &str, _reason: &str) {}
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoopObserver;

impl SelectionObserver for NoopObserver {}

/// Forwards selection events to `log`, tagged with a track label.
#[derive(Clone, Debug)]
pub struct LogObserver {
    label: String,
}

impl LogObserver {
    pub fn new<T: Into<String>>(label: T) -> Self {
        Self {
            label: label.into(),
        }
    }
}

impl SelectionObserver for LogObserver {
    fn on_candidate(&self, candidate: &WindowCandidate) {
        log::trace!(
            "[{}] candidate {:.2}s +{:.2}s score={:.4}",
            self.label,
            candidate.start_seconds,
            candidate.length_seconds,
            candidate.score
        );
    }

    fn on_window_selected(&self, window: &WindowCandidate, candidates_scored: usize) {
        log::info!(
            "[{}] best window {:.2}s-{:.2}s score={:.4} ({} candidates)",
            self.label,
            window.start_seconds,
            window.end_seconds(),
            window.score,
            candidates_scored
        );
    }

    fn on_loop_points(&self, loop_points: &LoopPoints) {
        log::debug!(
            "[{}] loop points start={:.3} end={:.3} crossfade={:.3}",
            self.label,
            loop_points.loop_start_seconds,
            loop_points.loop_end_seconds,
            loop_points.crossfade_seconds
        );
    }

    fn on_loop_fallback(&self, beats_found: usize) {
        log::warn!(
            "[{}] only {} usable beats, falling back to correlation loop points",
            self.label,
            beats_found
        );
    }

    fn on_estimate_absorbed(&self, what: &str, reason: &str) {
        log::debug!("[{}] no {} estimate: {}", self.label, what, reason);
    }
}
