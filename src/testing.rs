//! Synthetic signals and a recording observer shared by the unit tests.

use std::sync::Mutex;

use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::audio::AudioSignal;
use crate::observer::SelectionObserver;
use crate::segment::{LoopPoints, WindowCandidate};

pub fn sine_samples(sample_rate: u32, freq: f32, seconds: f32, amplitude: f32) -> Vec<f32> {
    let n = (seconds * sample_rate as f32) as usize;
    (0..n)
        .map(|i| amplitude * (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate as f32).sin())
        .collect()
}

pub fn noise_samples(n: usize, amplitude: f32, seed: u64) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n).map(|_| rng.random_range(-amplitude..amplitude)).collect()
}

pub fn sine(sample_rate: u32, freq: f32, seconds: f32) -> AudioSignal {
    AudioSignal::new(sine_samples(sample_rate, freq, seconds, 0.5), sample_rate).unwrap()
}

/// Short decaying bursts every `60 / bpm` seconds, starting at `offset`.
pub fn click_track(sample_rate: u32, bpm: f32, seconds: f32, offset: f32) -> AudioSignal {
    let n = (seconds * sample_rate as f32) as usize;
    let period = (60.0 / bpm * sample_rate as f32) as usize;
    let mut samples = vec![0.0f32; n];
    let mut pos = (offset * sample_rate as f32) as usize;
    while pos < n {
        for k in 0..400.min(n - pos) {
            let decay = (-(k as f32) / 60.0).exp();
            let sign = if (k * 7919) % 3 == 0 { -1.0 } else { 1.0 };
            samples[pos + k] = sign * decay;
        }
        pos += period;
    }
    AudioSignal::new(samples, sample_rate).unwrap()
}

#[derive(Default)]
pub struct RecordingObserver {
    pub candidates: Mutex<Vec<WindowCandidate>>,
    pub selected: Mutex<Option<WindowCandidate>>,
    pub loop_points: Mutex<Option<LoopPoints>>,
    pub fallbacks: Mutex<Vec<usize>>,
    pub absorbed: Mutex<Vec<String>>,
}

impl SelectionObserver for RecordingObserver {
    fn on_candidate(&self, candidate: &WindowCandidate) {
        self.candidates.lock().unwrap().push(*candidate);
    }

    fn on_window_selected(&self, window: &WindowCandidate, _candidates_scored: usize) {
        *self.selected.lock().unwrap() = Some(*window);
    }

    fn on_loop_points(&self, loop_points: &LoopPoints) {
        *self.loop_points.lock().unwrap() = Some(*loop_points);
    }

    fn on_loop_fallback(&self, beats_found: usize) {
        self.fallbacks.lock().unwrap().push(beats_found);
    }

    fn on_estimate_absorbed(&self, what: &str, _reason: &str) {
        self.absorbed.lock().unwrap().push(what.to_string());
    }
}
