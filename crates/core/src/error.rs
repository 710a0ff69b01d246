/// Result alias that carries the custom [`BioMotionError`] type.
pub type Result<T> = std::result::Result<T, BioMotionError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum BioMotionError {
    /// A clip was requested with `start >= end` or a non-finite bound. The clip
    /// is never stored.
    #[error("invalid clip range: start {start} must be before end {end}")]
    InvalidRange { start: f64, end: f64 },
    /// A marker was requested at a time that is not a finite number.
    #[error("invalid timeline position {time}")]
    InvalidTime { time: f64 },
    /// No microphone is available or permission to use it was denied.
    #[error("audio capture unavailable: {0}")]
    CaptureUnavailable(String),
    /// A shareable string could not be turned back into a session.
    #[error("could not decode shared state: {0}")]
    Decode(#[from] CodecError),
    /// A share link could not be produced for the current document.
    #[error("cannot share: {0}")]
    Share(String),
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Json(#[from] serde_json::Error),
}

impl BioMotionError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }
}

impl From<&str> for BioMotionError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for BioMotionError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}

/// The stage at which decoding a shareable string failed.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("input is empty")]
    Empty,
    #[error("invalid base64 alphabet: {0}")]
    Alphabet(#[from] base64::DecodeError),
    #[error("decoded bytes are not a valid UTF-8 sequence")]
    NotText(#[from] std::string::FromUtf8Error),
    #[error("invalid session document: {0}")]
    Json(#[from] serde_json::Error),
    #[error("session violates its invariants: {0}")]
    Invalid(String),
}
