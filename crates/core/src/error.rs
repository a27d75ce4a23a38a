/// Result alias that carries the custom [`PianoError`] type.
pub type Result<T> = std::result::Result<T, PianoError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum PianoError {
    /// Free-form failure surfaced to the presentation layer as-is.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Score or config JSON that could not be decoded.
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    /// Image encoding or resampling failure.
    #[error("image: {0}")]
    Image(#[from] image::ImageError),
    /// A note list that violates the score invariants.
    #[error("invalid score: {0}")]
    InvalidScore(String),
    /// A pitch name such as `"H4"` that does not map to a MIDI number.
    #[error("invalid pitch `{0}`")]
    InvalidPitch(String),
    /// Failure reported by the external audio engine.
    #[error("audio engine: {0}")]
    Audio(String),
}

impl PianoError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }
}

impl From<&str> for PianoError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for PianoError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
