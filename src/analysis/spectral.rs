//! Harmonic/percussive decomposition and spectral statistics of a slice.
//!
//! The decomposition follows the usual median-filtering approach: sustained
//! pitched content forms horizontal ridges in the magnitude spectrogram and
//! survives a median across time, while transients form vertical lines and
//! survive a median across frequency. Soft masks built from the two filtered
//! spectrograms split the original magnitudes between the components.

use serde::{Deserialize, Serialize};

use crate::audio::stft::{magnitude_spectrogram, Spectrogram};
use crate::audio::SignalSlice;

/// Median filter length, in frames (harmonic) and bins (percussive).
const HPSS_KERNEL: usize = 17;
/// Exponent of the Wiener-style soft mask.
const MASK_POWER: i32 = 2;
/// Octave band edges for spectral contrast; the last band runs to Nyquist.
const CONTRAST_EDGES_HZ: [f32; 7] = [0.0, 100.0, 200.0, 400.0, 800.0, 1600.0, 3200.0];
/// Share of a band's sorted bins averaged into its peak and its valley.
const CONTRAST_QUANTILE: f32 = 0.2;
const AMIN: f32 = 1e-10;

/// Per-slice spectral summary consumed by the vocal scorer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SpectralStats {
    /// Mean magnitude of the harmonic component.
    pub harmonic_energy: f32,
    /// Mean magnitude of the percussive component.
    pub percussive_energy: f32,
    /// Mean `log10(peak / valley)` over octave sub-bands and frames.
    pub spectral_contrast: f32,
    /// Mean Wiener entropy of the power spectrum, in `[0, 1]`.
    pub spectral_flatness: f32,
}

/// Computes [`SpectralStats`] for a slice. Deterministic for a given input.
pub fn analyze(slice: &SignalSlice<'_>) -> SpectralStats {
    let spec = magnitude_spectrogram(slice.samples(), slice.sample_rate());
    analyze_spectrogram(&spec)
}

/// Same as [`analyze`] for an already computed spectrogram.
pub fn analyze_spectrogram(spec: &Spectrogram) -> SpectralStats {
    let (harmonic, percussive) = hpss(&spec.frames);

    SpectralStats {
        harmonic_energy: mean_magnitude(&harmonic),
        percussive_energy: mean_magnitude(&percussive),
        spectral_contrast: spectral_contrast(spec),
        spectral_flatness: spectral_flatness(&spec.frames),
    }
}

/// Splits a magnitude spectrogram (`[frame][bin]`) into harmonic and
/// percussive parts whose sum equals the input wherever it is non-zero.
pub fn hpss(frames: &[Vec<f32>]) -> (Vec<Vec<f32>>, Vec<Vec<f32>>) {
    if frames.is_empty() {
        return (Vec::new(), Vec::new());
    }

    let num_frames = frames.len();
    let num_bins = frames[0].len();
    let half = HPSS_KERNEL / 2;
    let mut window = Vec::with_capacity(HPSS_KERNEL);

    // Median across time, per bin
    let mut harmonic_filtered = vec![vec![0.0f32; num_bins]; num_frames];
    for bin in 0..num_bins {
        for t in 0..num_frames {
            let lo = t.saturating_sub(half);
            let hi = (t + half + 1).min(num_frames);
            window.clear();
            window.extend(frames[lo..hi].iter().map(|frame| frame[bin]));
            harmonic_filtered[t][bin] = median(&mut window);
        }
    }

    // Median across frequency, per frame
    let mut percussive_filtered = vec![vec![0.0f32; num_bins]; num_frames];
    for (t, frame) in frames.iter().enumerate() {
        for bin in 0..num_bins {
            let lo = bin.saturating_sub(half);
            let hi = (bin + half + 1).min(num_bins);
            window.clear();
            window.extend_from_slice(&frame[lo..hi]);
            percussive_filtered[t][bin] = median(&mut window);
        }
    }

    let mut harmonic = vec![vec![0.0f32; num_bins]; num_frames];
    let mut percussive = vec![vec![0.0f32; num_bins]; num_frames];
    for t in 0..num_frames {
        for bin in 0..num_bins {
            let h = harmonic_filtered[t][bin].powi(MASK_POWER);
            let p = percussive_filtered[t][bin].powi(MASK_POWER);
            let total = h + p;
            if total <= f32::MIN_POSITIVE {
                continue;
            }
            let magnitude = frames[t][bin];
            harmonic[t][bin] = magnitude * h / total;
            percussive[t][bin] = magnitude * p / total;
        }
    }

    (harmonic, percussive)
}

fn median(values: &mut [f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    let mid = values.len() / 2;
    let (_, m, _) = values.select_nth_unstable_by(mid, |a, b| a.total_cmp(b));
    *m
}

fn mean_magnitude(frames: &[Vec<f32>]) -> f32 {
    let count: usize = frames.iter().map(|f| f.len()).sum();
    if count == 0 {
        return 0.0;
    }
    let sum: f64 = frames
        .iter()
        .flat_map(|f| f.iter())
        .map(|&m| m as f64)
        .sum();
    (sum / count as f64) as f32
}

fn spectral_contrast(spec: &Spectrogram) -> f32 {
    let num_bins = spec.num_bins();
    let bin_hz = spec.bin_hz();
    let nyquist = spec.sample_rate as f32 / 2.0;

    let mut edges: Vec<usize> = CONTRAST_EDGES_HZ
        .iter()
        .map(|&hz| ((hz / bin_hz).round() as usize).min(num_bins))
        .collect();
    edges.push(((nyquist / bin_hz).round() as usize + 1).min(num_bins));

    let mut band_mags: Vec<f32> = Vec::with_capacity(num_bins);
    let mut total = 0.0f64;
    let mut count = 0usize;

    for frame in &spec.frames {
        for band in edges.windows(2) {
            let (start, end) = (band[0], band[1]);
            if end <= start {
                continue;
            }
            band_mags.clear();
            band_mags.extend_from_slice(&frame[start..end]);
            band_mags.sort_unstable_by(|a, b| a.total_cmp(b));

            let n = band_mags.len();
            let take = ((n as f32 * CONTRAST_QUANTILE).ceil() as usize).clamp(1, n);
            let valley = band_mags[..take].iter().sum::<f32>() / take as f32;
            let peak = band_mags[n - take..].iter().sum::<f32>() / take as f32;

            total += ((peak + AMIN) / (valley + AMIN)).log10() as f64;
            count += 1;
        }
    }

    if count == 0 {
        0.0
    } else {
        (total / count as f64) as f32
    }
}

fn spectral_flatness(frames: &[Vec<f32>]) -> f32 {
    if frames.is_empty() {
        return 0.0;
    }
    let mut total = 0.0f64;
    for frame in frames {
        let n = frame.len().max(1) as f64;
        let (log_sum, sum) = frame.iter().fold((0.0f64, 0.0f64), |(ls, s), &m| {
            let power = (m * m).max(AMIN) as f64;
            (ls + power.ln(), s + power)
        });
        let geometric = (log_sum / n).exp();
        let arithmetic = sum / n;
        total += (geometric / arithmetic).clamp(0.0, 1.0);
    }
    (total / frames.len() as f64) as f32
}
