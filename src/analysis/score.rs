use super::spectral::SpectralStats;

const EPSILON: f64 = 1e-9;
const RATIO_WEIGHT: f64 = 0.5;
const CONTRAST_WEIGHT: f64 = 0.1;

/// Vocal richness of a slice in `[0, 1)`.
///
/// Increases with harmonic energy and spectral contrast, decreases with
/// percussive energy. The harmonic/percussive ratio is log-compressed and
/// squashed with `x / (1 + x)` in `f64`, which approaches 1 slowly enough
/// that the `f32` result stays below 1 and keeps ordering even for
/// `percussive_energy == 0`. Only infinite inputs (or a contrast above
/// ~1e7) reach exactly 1.
pub fn score(stats: &SpectralStats) -> f32 {
    let harmonic = stats.harmonic_energy.max(0.0) as f64;
    let percussive = stats.percussive_energy.max(0.0) as f64;
    let ratio = harmonic / (percussive + EPSILON);
    let contrast = stats.spectral_contrast.max(0.0) as f64;

    let x = RATIO_WEIGHT * ratio.ln_1p() + CONTRAST_WEIGHT * contrast;
    if x.is_finite() {
        (x / (1.0 + x)) as f32
    } else if x == f64::INFINITY {
        1.0
    } else {
        0.0
    }
}
