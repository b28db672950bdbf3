/// Failures the selection core reports to its caller.
///
/// Tempo and key estimation never produce one of these; their failures are
/// absorbed into `None` fields of the result.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SegmentError {
    /// No candidate window met the minimum length. The track should be skipped.
    #[error("signal is {duration_seconds:.2}s, shorter than the {min_length_seconds:.2}s minimum window")]
    InsufficientSignalLength {
        duration_seconds: f32,
        min_length_seconds: f32,
    },

    /// The window cannot hold a head and a tail of the requested crossfade.
    #[error("window of {window_seconds:.3}s is too short for a {crossfade_seconds:.3}s crossfade")]
    WindowTooShortForCrossfade {
        window_seconds: f32,
        crossfade_seconds: f32,
    },

    /// Precondition violation: multi-channel or empty input, bad parameters.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl SegmentError {
    pub(crate) fn invalid<T: Into<String>>(msg: T) -> Self {
        Self::InvalidInput(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, SegmentError>;
