use rustfft::{num_complex::Complex, FftPlanner};

/// Frame size used by the window analysis.
pub const FFT_SIZE: usize = 2048;
pub const HOP_SIZE: usize = 1024;

/// Magnitude spectrogram, one `Vec` of `fft_size / 2 + 1` bins per frame.
#[derive(Clone, Debug)]
pub struct Spectrogram {
    pub frames: Vec<Vec<f32>>,
    pub sample_rate: u32,
    pub fft_size: usize,
    pub hop_size: usize,
}

impl Spectrogram {
    pub fn num_frames(&self) -> usize {
        self.frames.len()
    }

    pub fn num_bins(&self) -> usize {
        self.fft_size / 2 + 1
    }

    pub fn bin_hz(&self) -> f32 {
        self.sample_rate as f32 / self.fft_size as f32
    }

    /// Seconds between consecutive frames.
    pub fn frame_seconds(&self) -> f32 {
        self.hop_size as f32 / self.sample_rate as f32
    }

    /// Time of the centre of frame `index`.
    pub fn frame_time(&self, index: usize) -> f32 {
        (index * self.hop_size + self.fft_size / 2) as f32 / self.sample_rate as f32
    }
}

/// Spectrogram with the analysis defaults (`FFT_SIZE`, `HOP_SIZE`).
pub fn magnitude_spectrogram(samples: &[f32], sample_rate: u32) -> Spectrogram {
    spectrogram(samples, sample_rate, FFT_SIZE, HOP_SIZE)
}

/// Short-time magnitude spectrum with a Hann window.
///
/// Frames start every `hop_size` samples while a full frame fits; input
/// shorter than one frame is zero-padded into a single frame.
pub fn spectrogram(samples: &[f32], sample_rate: u32, fft_size: usize, hop_size: usize) -> Spectrogram {
    let mut planner = FftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(fft_size);
    let hann = hann_window(fft_size);
    let bins = fft_size / 2 + 1;
    let hop = hop_size.max(1);

    let num_frames = if samples.len() <= fft_size {
        1
    } else {
        (samples.len() - fft_size) / hop + 1
    };

    let mut scratch = vec![Complex::new(0.0f32, 0.0); fft.get_inplace_scratch_len()];
    let mut buffer = vec![Complex::new(0.0f32, 0.0); fft_size];
    let mut frames = Vec::with_capacity(num_frames);

    for frame_idx in 0..num_frames {
        let start = frame_idx * hop;
        let end = (start + fft_size).min(samples.len());
        for (i, slot) in buffer.iter_mut().enumerate() {
            let s = if start + i < end { samples[start + i] } else { 0.0 };
            *slot = Complex::new(s * hann[i], 0.0);
        }
        fft.process_with_scratch(&mut buffer, &mut scratch);
        frames.push(buffer[..bins].iter().map(|c| c.norm()).collect());
    }

    Spectrogram {
        frames,
        sample_rate,
        fft_size,
        hop_size: hop,
    }
}

pub fn hann_window(size: usize) -> Vec<f32> {
    if size <= 1 {
        return vec![1.0; size];
    }
    (0..size)
        .map(|i| {
            0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / (size - 1) as f32).cos())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_input_is_padded_to_one_frame() {
        let spec = magnitude_spectrogram(&[0.5; 100], 22_050);
        assert_eq!(spec.num_frames(), 1);
        assert_eq!(spec.frames[0].len(), FFT_SIZE / 2 + 1);
    }

    #[test]
    fn frame_count_follows_hop() {
        let spec = magnitude_spectrogram(&vec![0.0; FFT_SIZE + 3 * HOP_SIZE], 22_050);
        assert_eq!(spec.num_frames(), 4);

        let fine = spectrogram(&vec![0.0; 1024 + 4 * 256], 22_050, 1024, 256);
        assert_eq!(fine.num_frames(), 5);
        assert_eq!(fine.num_bins(), 513);
    }

    #[test]
    fn sine_peaks_at_its_bin() {
        let sr = 22_050;
        let freq = 1000.0;
        let samples: Vec<f32> = (0..FFT_SIZE * 2)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / sr as f32).sin())
            .collect();
        let spec = magnitude_spectrogram(&samples, sr);
        let frame = &spec.frames[0];
        let peak = frame
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        let expected = (freq / spec.bin_hz()).round() as usize;
        assert!((peak as i64 - expected as i64).abs() <= 1);
    }

    #[test]
    fn frame_time_is_centred() {
        let spec = spectrogram(&vec![0.0; 4096], 1000, 1000, 500);
        assert!((spec.frame_time(0) - 0.5).abs() < 1e-6);
        assert!((spec.frame_time(2) - 1.5).abs() < 1e-6);
    }
}
