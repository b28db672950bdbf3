use crate::error::{Result, SegmentError};

/// Mono, fixed-rate amplitude buffer. Immutable once built.
#[derive(Clone, Debug, PartialEq)]
pub struct AudioSignal {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl AudioSignal {
    /// Builds a mono signal. Empty buffers and a zero sample rate are rejected.
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Result<Self> {
        Self::from_interleaved(samples, sample_rate, 1)
    }

    /// Builds a signal from interleaved data, which must already be mono.
    ///
    /// Downmixing is the decoder's job; anything with `channel_count != 1`
    /// is a precondition violation.
    pub fn from_interleaved(samples: Vec<f32>, sample_rate: u32, channel_count: u16) -> Result<Self> {
        if channel_count != 1 {
            return Err(SegmentError::invalid(format!(
                "expected mono input, got {} channels",
                channel_count
            )));
        }
        if sample_rate == 0 {
            return Err(SegmentError::invalid("sample rate must be positive"));
        }
        if samples.is_empty() {
            return Err(SegmentError::invalid("signal has no samples"));
        }
        Ok(Self {
            samples,
            sample_rate,
        })
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channel_count(&self) -> u16 {
        1
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_seconds(&self) -> f32 {
        self.samples.len() as f32 / self.sample_rate as f32
    }

    /// Borrowed view over the whole signal.
    pub fn as_slice(&self) -> SignalSlice<'_> {
        SignalSlice {
            samples: &self.samples,
            sample_rate: self.sample_rate,
            offset: 0,
        }
    }

    /// Borrowed view over `[start, start + len)` in samples, clamped to the buffer.
    pub fn slice(&self, start: usize, len: usize) -> SignalSlice<'_> {
        self.as_slice().sub_slice(start, len)
    }

    /// Borrowed view over a range given in seconds, clamped to the buffer.
    pub fn slice_seconds(&self, start_seconds: f32, length_seconds: f32) -> SignalSlice<'_> {
        let start = self.seconds_to_samples(start_seconds);
        let len = self.seconds_to_samples(length_seconds);
        self.slice(start, len)
    }

    pub fn seconds_to_samples(&self, seconds: f32) -> usize {
        (seconds.max(0.0) * self.sample_rate as f32).round() as usize
    }
}

/// Read-only window into an [`AudioSignal`].
#[derive(Clone, Copy, Debug)]
pub struct SignalSlice<'a> {
    samples: &'a [f32],
    sample_rate: u32,
    offset: usize,
}

impl<'a> SignalSlice<'a> {
    pub fn samples(&self) -> &'a [f32] {
        self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Position of the first sample within the parent signal.
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn start_seconds(&self) -> f32 {
        self.offset as f32 / self.sample_rate as f32
    }

    pub fn duration_seconds(&self) -> f32 {
        self.samples.len() as f32 / self.sample_rate as f32
    }

    pub fn sub_slice(&self, start: usize, len: usize) -> SignalSlice<'a> {
        let start = start.min(self.samples.len());
        let end = start.saturating_add(len).min(self.samples.len());
        SignalSlice {
            samples: &self.samples[start..end],
            sample_rate: self.sample_rate,
            offset: self.offset + start,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_multichannel_input() {
        let err = AudioSignal::from_interleaved(vec![0.0; 8], 44_100, 2).unwrap_err();
        assert!(matches!(err, SegmentError::InvalidInput(_)));
    }

    #[test]
    fn rejects_empty_and_zero_rate() {
        assert!(AudioSignal::new(vec![], 44_100).is_err());
        assert!(AudioSignal::new(vec![0.0; 4], 0).is_err());
    }

    #[test]
    fn duration_matches_length() {
        let signal = AudioSignal::new(vec![0.0; 22_050 * 3], 22_050).unwrap();
        assert!((signal.duration_seconds() - 3.0).abs() < 1e-6);
    }

    #[test]
    fn slices_are_clamped() {
        let signal = AudioSignal::new((0..100).map(|i| i as f32).collect(), 10).unwrap();
        let slice = signal.slice(90, 50);
        assert_eq!(slice.len(), 10);
        assert_eq!(slice.offset(), 90);
        assert_eq!(slice.samples()[0], 90.0);

        let inner = slice.sub_slice(5, 2);
        assert_eq!(inner.offset(), 95);
        assert_eq!(inner.samples(), &[95.0, 96.0]);

        let past_end = signal.slice(200, 10);
        assert!(past_end.is_empty());
    }

    #[test]
    fn slice_seconds_rounds_to_samples() {
        let signal = AudioSignal::new(vec![0.0; 1000], 100).unwrap();
        let slice = signal.slice_seconds(1.5, 2.0);
        assert_eq!(slice.offset(), 150);
        assert_eq!(slice.len(), 200);
        assert!((slice.start_seconds() - 1.5).abs() < 1e-6);
    }
}
