//! Window selection and loop-point derivation.

pub mod loop_points;
pub mod scanner;

use serde::{Deserialize, Serialize};

use crate::analysis::{self, PitchClass};
use crate::audio::{AudioSignal, SignalSlice};
use crate::error::{Result, SegmentError};
use crate::observer::SelectionObserver;

pub use loop_points::{compute_loop_points, LoopStrategy};
pub use scanner::{select_best_window, WindowScanner};

/// Exact position of a window in its signal, in samples.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SampleSpan {
    pub start: usize,
    pub len: usize,
    pub sample_rate: u32,
}

impl SampleSpan {
    pub fn end(&self) -> usize {
        self.start + self.len
    }

    pub fn start_seconds(&self) -> f64 {
        self.start as f64 / self.sample_rate as f64
    }

    pub fn length_seconds(&self) -> f64 {
        self.len as f64 / self.sample_rate as f64
    }

    pub fn end_seconds(&self) -> f64 {
        self.end() as f64 / self.sample_rate as f64
    }

    /// The spanned samples of `signal`, which must be the signal the span came from.
    pub fn slice<'a>(&self, signal: &'a AudioSignal) -> SignalSlice<'a> {
        signal.slice(self.start, self.len)
    }
}

/// A scored candidate window. Only the best one outlives the scan.
///
/// The seconds fields are for display; `span` is the window that was scored.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct WindowCandidate {
    pub start_seconds: f32,
    pub length_seconds: f32,
    pub score: f32,
    pub span: SampleSpan,
}

impl WindowCandidate {
    pub(crate) fn new(span: SampleSpan, score: f32) -> Self {
        Self {
            start_seconds: span.start_seconds() as f32,
            length_seconds: span.length_seconds() as f32,
            score,
            span,
        }
    }

    pub fn end_seconds(&self) -> f32 {
        self.span.end_seconds() as f32
    }
}

/// Loop boundaries relative to the start of the selected window.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LoopPoints {
    pub loop_start_seconds: f32,
    pub loop_end_seconds: f32,
    pub crossfade_seconds: f32,
}

impl LoopPoints {
    /// The same points moved by `offset_seconds`.
    pub fn shifted(&self, offset_seconds: f32) -> Self {
        Self {
            loop_start_seconds: self.loop_start_seconds + offset_seconds,
            loop_end_seconds: self.loop_end_seconds + offset_seconds,
            crossfade_seconds: self.crossfade_seconds,
        }
    }

    pub fn loop_length_seconds(&self) -> f32 {
        self.loop_end_seconds - self.loop_start_seconds
    }
}

/// Everything the selector decided about one signal.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SegmentSelectionResult {
    /// Window start on the track timeline, in seconds.
    pub start: f32,
    /// Window end on the track timeline, in seconds.
    pub end: f32,
    pub bpm: Option<f32>,
    pub key: Option<PitchClass>,
    pub vocal_score: f32,
    /// Window-relative; see [`SegmentSelectionResult::absolute_loop`].
    #[serde(rename = "loop")]
    pub loop_points: LoopPoints,
    /// The selected window in samples; `start` and `end` are derived from it.
    pub span: SampleSpan,
}

impl SegmentSelectionResult {
    pub fn length_seconds(&self) -> f32 {
        self.span.length_seconds() as f32
    }

    /// The selected window's samples.
    pub fn window<'a>(&self, signal: &'a AudioSignal) -> SignalSlice<'a> {
        self.span.slice(signal)
    }

    /// Loop points on the track timeline.
    pub fn absolute_loop(&self) -> LoopPoints {
        self.loop_points.shifted(self.start)
    }
}

/// Parameters of a selection run.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    pub min_window_seconds: f32,
    pub max_window_seconds: f32,
    pub stride_seconds: f32,
    pub crossfade_seconds: f32,
    pub loop_strategy: LoopStrategy,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            min_window_seconds: 40.0,
            max_window_seconds: 60.0,
            stride_seconds: 0.5,
            crossfade_seconds: 0.15,
            loop_strategy: LoopStrategy::Correlation,
        }
    }
}

/// Picks the most vocal window of `signal`, places loop points inside it and
/// estimates its tempo and key.
///
/// Window-length and crossfade failures are returned to the caller; tempo
/// and key failures only leave `bpm` / `key` empty.
pub fn select_segment(
    signal: &AudioSignal,
    config: &SelectionConfig,
    observer: &dyn SelectionObserver,
) -> Result<SegmentSelectionResult> {
    let best = select_window(signal, config, observer)?;
    segment_for_window(signal, &best, config, observer)
}

/// Scans `signal` and returns the winning candidate, reporting every
/// candidate and the winner to `observer`.
pub fn select_window(
    signal: &AudioSignal,
    config: &SelectionConfig,
    observer: &dyn SelectionObserver,
) -> Result<WindowCandidate> {
    if signal.channel_count() != 1 {
        return Err(SegmentError::invalid("selection requires a mono signal"));
    }

    let scanner = WindowScanner::new(
        config.min_window_seconds,
        config.max_window_seconds,
        config.stride_seconds,
    )?;
    let candidates = scanner.scan(signal)?;
    for candidate in &candidates {
        observer.on_candidate(candidate);
    }
    let best = scanner::pick_best(&candidates).ok_or(SegmentError::InsufficientSignalLength {
        duration_seconds: signal.duration_seconds(),
        min_length_seconds: config.min_window_seconds,
    })?;
    observer.on_window_selected(&best, candidates.len());
    Ok(best)
}

/// Loop points and tempo/key for an already selected window.
///
/// Only `crossfade_seconds` and `loop_strategy` of `config` are used, so a
/// caller can retry with another crossfade without rescanning.
pub fn segment_for_window(
    signal: &AudioSignal,
    best: &WindowCandidate,
    config: &SelectionConfig,
    observer: &dyn SelectionObserver,
) -> Result<SegmentSelectionResult> {
    let span = best.span;
    if span.sample_rate != signal.sample_rate() || span.end() > signal.len() {
        return Err(SegmentError::invalid("window does not belong to this signal"));
    }

    let window = span.slice(signal);
    let loop_points = loop_points::compute_with_strategy(
        &window,
        config.crossfade_seconds,
        config.loop_strategy,
        observer,
    )?;
    observer.on_loop_points(&loop_points);

    let estimate = analysis::estimate_tempo_and_key_observed(&window, observer);

    Ok(SegmentSelectionResult {
        start: span.start_seconds() as f32,
        end: span.end_seconds() as f32,
        bpm: estimate.bpm,
        key: estimate.key,
        vocal_score: best.score,
        loop_points,
        span,
    })
}
