//! Onset strength, tempo period and dynamic-programming beat tracking.

use crate::audio::stft::{spectrogram, Spectrogram};
use crate::audio::SignalSlice;

use super::DegenerateEstimate;

const ONSET_FFT_SIZE: usize = 1024;
const ONSET_HOP_SIZE: usize = 256;
/// Gain inside `ln(1 + gain * magnitude)` before differencing.
const LOG_GAIN: f32 = 1000.0;
const MIN_BPM: f32 = 60.0;
const MAX_BPM: f32 = 200.0;
/// Centre and width (octaves) of the log-normal tempo prior.
const PRIOR_BPM: f32 = 120.0;
const PRIOR_OCTAVES: f32 = 1.0;
/// How strongly beat spacing is held to the tempo period.
const TIGHTNESS: f32 = 100.0;

/// Beats found in a slice, in seconds from the slice start.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BeatTrack {
    pub beats: Vec<f32>,
    pub period_seconds: f32,
}

impl BeatTrack {
    /// `60 / median inter-beat interval`, or `None` below two beats.
    pub fn bpm(&self) -> Option<f32> {
        if self.beats.len() < 2 {
            return None;
        }
        let mut intervals: Vec<f32> = self.beats.windows(2).map(|w| w[1] - w[0]).collect();
        intervals.sort_by(|a, b| a.total_cmp(b));
        let median = intervals[intervals.len() / 2];
        (median > 0.0).then(|| 60.0 / median)
    }
}

/// Per-frame onset strength: mean rectified increase of log magnitude.
pub fn onset_strength(spec: &Spectrogram) -> Vec<f32> {
    let mut envelope = vec![0.0f32; spec.num_frames()];
    let mut previous: Option<Vec<f32>> = None;

    for (i, frame) in spec.frames.iter().enumerate() {
        let current: Vec<f32> = frame.iter().map(|&m| (LOG_GAIN * m).ln_1p()).collect();
        if let Some(prev) = &previous {
            let flux: f32 = current
                .iter()
                .zip(prev.iter())
                .map(|(cur, prev)| (cur - prev).max(0.0))
                .sum();
            envelope[i] = flux / current.len().max(1) as f32;
        }
        previous = Some(current);
    }

    envelope
}

/// Tracks beats over a slice.
pub fn track_beats(slice: &SignalSlice<'_>) -> Result<BeatTrack, DegenerateEstimate> {
    let spec = spectrogram(slice.samples(), slice.sample_rate(), ONSET_FFT_SIZE, ONSET_HOP_SIZE);
    let envelope = onset_strength(&spec);
    let frame_seconds = spec.frame_seconds();

    let period = estimate_period(&envelope, frame_seconds)?;
    let beat_frames = dp_beats(&envelope, period)?;

    Ok(BeatTrack {
        beats: beat_frames.iter().map(|&f| spec.frame_time(f)).collect(),
        period_seconds: period as f32 * frame_seconds,
    })
}

/// Beat period in frames: the autocorrelation peak of the onset envelope
/// between `MIN_BPM` and `MAX_BPM`, weighted by a log-normal tempo prior.
fn estimate_period(envelope: &[f32], frame_seconds: f32) -> Result<usize, DegenerateEstimate> {
    let max_lag = ((60.0 / MIN_BPM) / frame_seconds).ceil() as usize;
    let min_lag = (((60.0 / MAX_BPM) / frame_seconds).floor() as usize).max(1);

    if envelope.len() <= max_lag {
        return Err(DegenerateEstimate::new("slice shorter than one slow beat"));
    }
    if envelope.iter().all(|&v| v <= 0.0) {
        return Err(DegenerateEstimate::new("flat onset envelope"));
    }

    let mean = envelope.iter().sum::<f32>() / envelope.len() as f32;
    let centred: Vec<f32> = envelope.iter().map(|v| v - mean).collect();

    let mut best: Option<(usize, f32)> = None;
    for lag in min_lag..=max_lag {
        let acf: f32 = centred[lag..]
            .iter()
            .zip(centred.iter())
            .map(|(a, b)| a * b)
            .sum::<f32>()
            / (centred.len() - lag) as f32;
        let bpm = 60.0 / (lag as f32 * frame_seconds);
        let prior = (-0.5 * ((bpm / PRIOR_BPM).log2() / PRIOR_OCTAVES).powi(2)).exp();
        let weighted = acf * prior;
        if best.map_or(true, |(_, w)| weighted > w) {
            best = Some((lag, weighted));
        }
    }

    match best {
        Some((lag, weight)) if weight > 0.0 => Ok(lag),
        _ => Err(DegenerateEstimate::new("no periodicity in onset envelope")),
    }
}

/// Dynamic-programming beat tracker: maximises onset strength at the beats
/// minus a penalty on the log deviation of each spacing from `period`.
fn dp_beats(envelope: &[f32], period: usize) -> Result<Vec<usize>, DegenerateEstimate> {
    let n = envelope.len();
    let std = {
        let mean = envelope.iter().sum::<f32>() / n as f32;
        (envelope.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / n as f32).sqrt()
    };
    if std <= f32::EPSILON {
        return Err(DegenerateEstimate::new("onset envelope has no variance"));
    }
    let local: Vec<f32> = envelope.iter().map(|v| v / std).collect();

    let p = period as f32;
    let min_back = (period / 2).max(1);
    let max_back = period * 2;

    let mut cumulative = vec![0.0f32; n];
    let mut backlink: Vec<Option<usize>> = vec![None; n];

    for i in 0..n {
        let mut best: Option<(usize, f32)> = None;
        if i >= min_back {
            let lo = i.saturating_sub(max_back);
            for j in lo..=(i - min_back) {
                let penalty = ((i - j) as f32 / p).ln().powi(2);
                let candidate = cumulative[j] - TIGHTNESS * penalty;
                if best.map_or(true, |(_, s)| candidate > s) {
                    best = Some((j, candidate));
                }
            }
        }
        match best {
            Some((j, s)) if s > 0.0 => {
                cumulative[i] = local[i] + s;
                backlink[i] = Some(j);
            }
            _ => cumulative[i] = local[i],
        }
    }

    // Last beat: the final local maximum of the cumulative score that is
    // still at least half the median of all such maxima.
    let maxima: Vec<usize> = (0..n)
        .filter(|&i| {
            let left = i == 0 || cumulative[i] >= cumulative[i - 1];
            let right = i + 1 == n || cumulative[i] > cumulative[i + 1];
            left && right
        })
        .collect();
    if maxima.is_empty() {
        return Err(DegenerateEstimate::new("no beat candidates"));
    }
    let mut peak_scores: Vec<f32> = maxima.iter().map(|&i| cumulative[i]).collect();
    peak_scores.sort_by(|a, b| a.total_cmp(b));
    let threshold = 0.5 * peak_scores[peak_scores.len() / 2];
    let last = maxima
        .iter()
        .rev()
        .copied()
        .find(|&i| cumulative[i] >= threshold)
        .ok_or_else(|| DegenerateEstimate::new("no beat above threshold"))?;

    let mut beats = vec![last];
    let mut cursor = last;
    while let Some(prev) = backlink[cursor] {
        beats.push(prev);
        cursor = prev;
    }
    beats.reverse();

    Ok(trim_weak_beats(beats, envelope))
}

/// Drops leading and trailing beats that sit on near-silent onsets.
fn trim_weak_beats(beats: Vec<usize>, envelope: &[f32]) -> Vec<usize> {
    if beats.is_empty() {
        return beats;
    }
    let rms = (beats.iter().map(|&b| envelope[b].powi(2)).sum::<f32>() / beats.len() as f32).sqrt();
    let threshold = 0.1 * rms;
    let first = beats.iter().position(|&b| envelope[b] >= threshold);
    let last = beats.iter().rposition(|&b| envelope[b] >= threshold);
    match (first, last) {
        (Some(first), Some(last)) => beats[first..=last].to_vec(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::AudioSignal;
    use crate::testing::click_track;

    const SR: u32 = 22_050;

    #[test]
    fn click_track_tempo() {
        let signal = click_track(SR, 120.0, 12.0, 0.25);
        let track = track_beats(&signal.as_slice()).unwrap();
        let bpm = track.bpm().unwrap();
        assert!((bpm - 120.0).abs() < 3.0, "bpm {}", bpm);
        assert!(track.beats.len() >= 15);
    }

    #[test]
    fn beats_land_on_clicks() {
        let signal = click_track(SR, 100.0, 10.0, 0.5);
        let track = track_beats(&signal.as_slice()).unwrap();
        for beat in &track.beats {
            let phase = (beat - 0.5).rem_euclid(0.6);
            let distance = phase.min(0.6 - phase);
            assert!(distance < 0.06, "beat {} is {}s from a click", beat, distance);
        }
    }

    #[test]
    fn silence_is_degenerate() {
        let silent = AudioSignal::new(vec![0.0; SR as usize * 5], SR).unwrap();
        assert!(track_beats(&silent.as_slice()).is_err());
    }

    #[test]
    fn too_short_is_degenerate() {
        let short = AudioSignal::new(vec![0.1; SR as usize / 2], SR).unwrap();
        assert!(track_beats(&short.as_slice()).is_err());
    }

    #[test]
    fn bpm_needs_two_beats() {
        let one = BeatTrack {
            beats: vec![1.0],
            period_seconds: 0.5,
        };
        assert_eq!(one.bpm(), None);

        let steady = BeatTrack {
            beats: vec![0.0, 0.5, 1.0, 1.5],
            period_seconds: 0.5,
        };
        assert!((steady.bpm().unwrap() - 120.0).abs() < 1e-3);
    }

    #[test]
    fn onset_envelope_rises_at_clicks() {
        let signal = click_track(SR, 60.0, 3.0, 1.0);
        let spec = spectrogram(signal.samples(), SR, ONSET_FFT_SIZE, ONSET_HOP_SIZE);
        let envelope = onset_strength(&spec);
        let (peak, _) = envelope
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .unwrap();
        let t = spec.frame_time(peak);
        let phase = t.rem_euclid(1.0);
        assert!(phase < 0.06 || phase > 0.94, "peak at {}", t);
    }
}
