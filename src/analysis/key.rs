use std::fmt;

use serde::{Deserialize, Serialize};

use crate::audio::stft::Spectrogram;

use super::DegenerateEstimate;

const MIN_CHROMA_HZ: f32 = 55.0;
const MAX_CHROMA_HZ: f32 = 5000.0;
const A4_HZ: f32 = 440.0;

/// One of the 12 equal-tempered pitch classes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PitchClass {
    C,
    #[serde(rename = "C#")]
    CSharp,
    D,
    #[serde(rename = "D#")]
    DSharp,
    E,
    F,
    #[serde(rename = "F#")]
    FSharp,
    G,
    #[serde(rename = "G#")]
    GSharp,
    A,
    #[serde(rename = "A#")]
    ASharp,
    B,
}

impl PitchClass {
    pub const ALL: [PitchClass; 12] = [
        PitchClass::C,
        PitchClass::CSharp,
        PitchClass::D,
        PitchClass::DSharp,
        PitchClass::E,
        PitchClass::F,
        PitchClass::FSharp,
        PitchClass::G,
        PitchClass::GSharp,
        PitchClass::A,
        PitchClass::ASharp,
        PitchClass::B,
    ];

    /// `index` modulo 12, with C = 0.
    pub fn from_index(index: usize) -> Self {
        Self::ALL[index % 12]
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            PitchClass::C => "C",
            PitchClass::CSharp => "C#",
            PitchClass::D => "D",
            PitchClass::DSharp => "D#",
            PitchClass::E => "E",
            PitchClass::F => "F",
            PitchClass::FSharp => "F#",
            PitchClass::G => "G",
            PitchClass::GSharp => "G#",
            PitchClass::A => "A",
            PitchClass::ASharp => "A#",
            PitchClass::B => "B",
        }
    }
}

impl fmt::Display for PitchClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Pitch class of a frequency, A4 = 440 Hz.
pub fn pitch_class_of(freq_hz: f32) -> Option<PitchClass> {
    if !(freq_hz.is_finite() && freq_hz > 0.0) {
        return None;
    }
    let semitones_from_a = (12.0 * (freq_hz / A4_HZ).log2()).round() as i64;
    let index = (semitones_from_a + PitchClass::A.index() as i64).rem_euclid(12);
    Some(PitchClass::from_index(index as usize))
}

/// Mean chroma vector: per-frame pitch-class power, each frame normalised to
/// a peak of 1, averaged over the frames that carry any energy.
pub fn mean_chroma(spec: &Spectrogram) -> Result<[f32; 12], DegenerateEstimate> {
    let bin_hz = spec.bin_hz();
    let bin_classes: Vec<Option<usize>> = (0..spec.num_bins())
        .map(|bin| {
            let freq = bin as f32 * bin_hz;
            if (MIN_CHROMA_HZ..=MAX_CHROMA_HZ).contains(&freq) {
                pitch_class_of(freq).map(PitchClass::index)
            } else {
                None
            }
        })
        .collect();

    let mut total = [0.0f32; 12];
    let mut voiced_frames = 0usize;

    for frame in &spec.frames {
        let mut chroma = [0.0f32; 12];
        for (magnitude, class) in frame.iter().zip(bin_classes.iter()) {
            if let Some(class) = class {
                chroma[*class] += magnitude * magnitude;
            }
        }
        let peak = chroma.iter().copied().fold(0.0f32, f32::max);
        if peak <= f32::MIN_POSITIVE {
            continue;
        }
        for (acc, value) in total.iter_mut().zip(chroma.iter()) {
            *acc += value / peak;
        }
        voiced_frames += 1;
    }

    if voiced_frames == 0 {
        return Err(DegenerateEstimate::new("no pitched energy"));
    }
    for value in total.iter_mut() {
        *value /= voiced_frames as f32;
    }
    Ok(total)
}

/// Arg-max of the mean chroma. Ties go to the lower pitch class.
pub fn estimate_key(spec: &Spectrogram) -> Result<PitchClass, DegenerateEstimate> {
    let chroma = mean_chroma(spec)?;
    let (index, _) = chroma
        .iter()
        .enumerate()
        .fold((0usize, f32::MIN), |best, (i, &v)| if v > best.1 { (i, v) } else { best });
    Ok(PitchClass::from_index(index))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::stft::magnitude_spectrogram;
    use crate::testing::{noise_samples, sine_samples};

    const SR: u32 = 22_050;

    #[test]
    fn maps_reference_frequencies() {
        assert_eq!(pitch_class_of(440.0), Some(PitchClass::A));
        assert_eq!(pitch_class_of(261.63), Some(PitchClass::C));
        assert_eq!(pitch_class_of(277.18), Some(PitchClass::CSharp));
        assert_eq!(pitch_class_of(55.0), Some(PitchClass::A));
        assert_eq!(pitch_class_of(0.0), None);
    }

    #[test]
    fn pure_tones_give_their_pitch_class() {
        for &(freq, expected) in &[
            (440.0, PitchClass::A),
            (261.63, PitchClass::C),
            (392.0, PitchClass::G),
            (311.13, PitchClass::DSharp),
        ] {
            let spec = magnitude_spectrogram(&sine_samples(SR, freq, 2.0, 0.5), SR);
            assert_eq!(estimate_key(&spec).unwrap(), expected, "{} Hz", freq);
        }
    }

    #[test]
    fn silence_is_degenerate() {
        let spec = magnitude_spectrogram(&vec![0.0; SR as usize], SR);
        assert!(estimate_key(&spec).is_err());
    }

    #[test]
    fn noise_still_yields_some_class() {
        let spec = magnitude_spectrogram(&noise_samples(SR as usize, 0.3, 5), SR);
        assert!(estimate_key(&spec).is_ok());
    }

    #[test]
    fn names_round_trip_through_serde() {
        let json = serde_json::to_string(&PitchClass::FSharp).unwrap();
        assert_eq!(json, "\"F#\"");
        let back: PitchClass = serde_json::from_str("\"A#\"").unwrap();
        assert_eq!(back, PitchClass::ASharp);
        assert_eq!(PitchClass::GSharp.to_string(), "G#");
        assert_eq!(PitchClass::from_index(14), PitchClass::D);
    }
}
