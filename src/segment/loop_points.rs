use serde::{Deserialize, Serialize};

use super::LoopPoints;
use crate::analysis::tempo;
use crate::audio::SignalSlice;
use crate::error::{Result, SegmentError};
use crate::observer::SelectionObserver;

/// How loop boundaries are placed inside the selected window.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LoopStrategy {
    /// Align the loop start to the lag that best matches the window tail.
    #[default]
    Correlation,
    /// Snap both boundaries to tracked beats; falls back to `Correlation`
    /// when the window has fewer than two usable beats.
    BeatAligned,
}

/// Correlation-based loop points, relative to the window start.
///
/// The last `crossfade_seconds` of the window (the tail) is compared with
/// every head segment `window[lag..lag + crossfade]` for
/// `0 <= lag < crossfade`; the best normalised correlation picks the loop
/// start, and the loop ends one crossfade before the window end.
pub fn compute_loop_points(window: &SignalSlice<'_>, crossfade_seconds: f32) -> Result<LoopPoints> {
    let crossfade = crossfade_samples(window, crossfade_seconds)?;
    let lag = correlation_lag(window.samples(), crossfade);
    Ok(points_from_samples(window, lag, window.len() - crossfade, crossfade))
}

/// Loop points using `strategy`. Fallbacks are reported to `observer`.
pub fn compute_with_strategy(
    window: &SignalSlice<'_>,
    crossfade_seconds: f32,
    strategy: LoopStrategy,
    observer: &dyn SelectionObserver,
) -> Result<LoopPoints> {
    match strategy {
        LoopStrategy::Correlation => compute_loop_points(window, crossfade_seconds),
        LoopStrategy::BeatAligned => {
            let crossfade = crossfade_samples(window, crossfade_seconds)?;
            let beats = match tempo::track_beats(window) {
                Ok(track) => track.beats,
                Err(err) => {
                    observer.on_estimate_absorbed("beats", err.reason());
                    Vec::new()
                }
            };
            match beat_aligned_bounds(window, &beats, crossfade) {
                Some((start, end)) => Ok(points_from_samples(window, start, end, crossfade)),
                None => {
                    observer.on_loop_fallback(beats.len());
                    compute_loop_points(window, crossfade_seconds)
                }
            }
        }
    }
}

fn crossfade_samples(window: &SignalSlice<'_>, crossfade_seconds: f32) -> Result<usize> {
    if !crossfade_seconds.is_finite() || crossfade_seconds <= 0.0 {
        return Err(SegmentError::invalid(format!(
            "crossfade must be positive, got {}",
            crossfade_seconds
        )));
    }
    let crossfade = (crossfade_seconds as f64 * window.sample_rate() as f64).round() as usize;
    if crossfade == 0 {
        return Err(SegmentError::invalid(format!(
            "crossfade of {}s is shorter than one sample",
            crossfade_seconds
        )));
    }
    if window.len() < 2 * crossfade {
        return Err(SegmentError::WindowTooShortForCrossfade {
            window_seconds: window.duration_seconds(),
            crossfade_seconds,
        });
    }
    Ok(crossfade)
}

/// Lag in `0..crossfade` whose head segment best matches the tail.
///
/// Lags are capped at `len - 2 * crossfade` so the head segment never
/// overlaps the tail. Ties go to the smallest lag.
pub fn correlation_lag(window: &[f32], crossfade: usize) -> usize {
    let len = window.len();
    if crossfade == 0 || len < 2 * crossfade {
        return 0;
    }
    let tail = &window[len - crossfade..];
    let tail_energy: f64 = tail.iter().map(|&s| (s as f64) * (s as f64)).sum();
    let max_lag = (crossfade - 1).min(len - 2 * crossfade);

    let mut best_lag = 0;
    let mut best_score = f64::NEG_INFINITY;
    for lag in 0..=max_lag {
        let head = &window[lag..lag + crossfade];
        let (dot, head_energy) = head
            .iter()
            .zip(tail.iter())
            .fold((0.0f64, 0.0f64), |(dot, energy), (&h, &t)| {
                (dot + h as f64 * t as f64, energy + h as f64 * h as f64)
            });
        let denom = (head_energy * tail_energy).sqrt();
        let score = if denom > 1e-12 { dot / denom } else { 0.0 };
        if score > best_score {
            best_score = score;
            best_lag = lag;
        }
    }
    best_lag
}

/// First beat as the loop start, the last beat that still leaves a
/// crossfade-length tail as the loop end. `None` without such a pair.
fn beat_aligned_bounds(window: &SignalSlice<'_>, beats: &[f32], crossfade: usize) -> Option<(usize, usize)> {
    let sr = window.sample_rate() as f32;
    let latest_end = window.len() - crossfade;
    let beat_samples: Vec<usize> = beats
        .iter()
        .filter(|&&b| b >= 0.0)
        .map(|&b| (b * sr).round() as usize)
        .filter(|&b| b <= latest_end)
        .collect();

    let start = *beat_samples.first()?;
    let end = beat_samples
        .iter()
        .rev()
        .copied()
        .find(|&b| b >= start + crossfade)?;
    Some((start, end))
}

fn points_from_samples(window: &SignalSlice<'_>, start: usize, end: usize, crossfade: usize) -> LoopPoints {
    let sr = window.sample_rate() as f64;
    LoopPoints {
        loop_start_seconds: (start as f64 / sr) as f32,
        loop_end_seconds: (end as f64 / sr) as f32,
        crossfade_seconds: (crossfade as f64 / sr) as f32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::AudioSignal;
    use crate::observer::NoopObserver;
    use crate::testing::{click_track, noise_samples, sine, RecordingObserver};

    const SR: u32 = 8_000;

    fn assert_invariants(points: &LoopPoints, window_seconds: f32) {
        assert!(points.loop_start_seconds >= 0.0);
        assert!(points.loop_start_seconds < points.loop_end_seconds);
        assert!(points.loop_end_seconds <= window_seconds + 1e-6);
        assert!(points.crossfade_seconds <= points.loop_end_seconds - points.loop_start_seconds + 1e-6);
    }

    #[test]
    fn recovers_injected_seam_offset() {
        let crossfade = 800;
        let injected = 123;
        let mut samples = noise_samples(SR as usize * 2, 0.5, 42);
        let n = samples.len();
        let head: Vec<f32> = samples[injected..injected + crossfade].to_vec();
        samples[n - crossfade..].copy_from_slice(&head);

        let signal = AudioSignal::new(samples, SR).unwrap();
        let points = compute_loop_points(&signal.as_slice(), 0.1).unwrap();
        let expected = injected as f32 / SR as f32;
        assert!((points.loop_start_seconds - expected).abs() <= 1.0 / SR as f32);
        assert!((points.loop_end_seconds - (n - crossfade) as f32 / SR as f32).abs() < 1e-6);
    }

    #[test]
    fn periodic_signal_aligns_to_its_period() {
        // A noise cycle of 1000 samples repeated; the tail sits 500 samples
        // into a cycle, so the best head match is at lag 500.
        let cycle = noise_samples(1000, 0.5, 9);
        let samples: Vec<f32> = (0..10_300).map(|i| cycle[i % 1000]).collect();
        assert_eq!(correlation_lag(&samples, 800), 500);
    }

    #[test]
    fn invariants_hold_across_inputs() {
        let inputs = vec![
            sine(SR, 220.0, 3.0),
            AudioSignal::new(noise_samples(SR as usize * 3, 0.3, 1), SR).unwrap(),
            AudioSignal::new(vec![0.0; SR as usize * 3], SR).unwrap(),
        ];
        for signal in &inputs {
            for &crossfade in &[0.01, 0.15, 0.5, 1.0, 1.5] {
                let points = compute_loop_points(&signal.as_slice(), crossfade).unwrap();
                assert_invariants(&points, signal.duration_seconds());
                let lag_seconds = points.loop_start_seconds;
                assert!(lag_seconds < crossfade);
            }
        }
    }

    #[test]
    fn window_shorter_than_two_crossfades_is_rejected() {
        let signal = sine(SR, 220.0, 0.25);
        let err = compute_loop_points(&signal.as_slice(), 0.15).unwrap_err();
        assert!(matches!(err, SegmentError::WindowTooShortForCrossfade { .. }));
    }

    #[test]
    fn non_positive_crossfade_is_invalid() {
        let signal = sine(SR, 220.0, 1.0);
        assert!(matches!(
            compute_loop_points(&signal.as_slice(), 0.0),
            Err(SegmentError::InvalidInput(_))
        ));
        assert!(matches!(
            compute_loop_points(&signal.as_slice(), f32::NAN),
            Err(SegmentError::InvalidInput(_))
        ));
        assert!(matches!(
            compute_loop_points(&signal.as_slice(), 1e-6),
            Err(SegmentError::InvalidInput(_))
        ));
    }

    #[test]
    fn silent_window_loops_from_zero() {
        let silent = AudioSignal::new(vec![0.0; SR as usize], SR).unwrap();
        assert_eq!(correlation_lag(silent.samples(), 400), 0);
    }

    #[test]
    fn beat_aligned_snaps_to_clicks() {
        let sr = 22_050;
        let clicks = click_track(sr, 120.0, 8.0, 0.3);
        let points = compute_with_strategy(&clicks.as_slice(), 0.15, LoopStrategy::BeatAligned, &NoopObserver)
            .unwrap();
        assert_invariants(&points, clicks.duration_seconds());

        let near_click = |t: f32| {
            let phase = (t - 0.3).rem_euclid(0.5);
            phase.min(0.5 - phase) < 0.06
        };
        assert!(near_click(points.loop_start_seconds), "start {}", points.loop_start_seconds);
        assert!(near_click(points.loop_end_seconds), "end {}", points.loop_end_seconds);
        assert!(points.loop_start_seconds < 0.5);
        assert!(points.loop_end_seconds > 7.0);
    }

    #[test]
    fn beat_aligned_falls_back_without_beats() {
        let silent = AudioSignal::new(vec![0.0; SR as usize * 3], SR).unwrap();
        let observer = RecordingObserver::default();
        let points = compute_with_strategy(&silent.as_slice(), 0.15, LoopStrategy::BeatAligned, &observer).unwrap();
        assert_eq!(points, compute_loop_points(&silent.as_slice(), 0.15).unwrap());
        assert_eq!(observer.fallbacks.lock().unwrap().as_slice(), &[0]);
    }

    #[test]
    fn strategy_parses_from_kebab_case() {
        let strategy: LoopStrategy = serde_json::from_str("\"beat-aligned\"").unwrap();
        assert_eq!(strategy, LoopStrategy::BeatAligned);
    }
}
