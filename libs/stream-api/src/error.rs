/// Category of a stream error. Lets callers decide between fixing input,
/// retrying with backoff, giving up, or re-resolving a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Caller input violates a size/shape invariant. Never retried.
    Validation,
    /// Network, timeout or throughput problem. Safe to retry with backoff.
    Transient,
    /// Unknown stream, auth failure. Not retried automatically.
    Permanent,
    /// Consumer positioning problem. Re-resolve from a locator.
    Positioning,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Validation => f.write_str("validation"),
            ErrorKind::Transient => f.write_str("transient"),
            ErrorKind::Permanent => f.write_str("permanent"),
            ErrorKind::Positioning => f.write_str("positioning"),
        }
    }
}

/// Error returned by every producer, consumer and backend operation.
///
/// Partial batch failures are never reported through this type; they are
/// per-entry data in [`crate::BatchResult`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamError {
    #[error("validation: {0}")]
    Validation(String),

    #[error("transient backend error: {0}")]
    Transient(String),

    #[error("permanent backend error: {0}")]
    Permanent(String),

    #[error("expired iterator: {0}")]
    ExpiredIterator(String),

    #[error("shard '{shard}' not found in stream '{stream}'")]
    UnknownShard { stream: String, shard: String },

    #[error("invalid locator: {0}")]
    InvalidLocator(String),

    #[error("codec: {0}")]
    Codec(String),

    #[error("invalid state: {0}")]
    InvalidState(String),
}

impl StreamError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StreamError::Validation(_) | StreamError::Codec(_) | StreamError::InvalidState(_) => {
                ErrorKind::Validation
            }
            StreamError::Transient(_) => ErrorKind::Transient,
            StreamError::Permanent(_) => ErrorKind::Permanent,
            StreamError::ExpiredIterator(_)
            | StreamError::UnknownShard { .. }
            | StreamError::InvalidLocator(_) => ErrorKind::Positioning,
        }
    }

    /// True only for errors where repeating the same call may succeed.
    pub fn is_retry_safe(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }

    /// Prepend context to the message, preserving the variant.
    pub fn with_context(self, ctx: impl std::fmt::Display) -> Self {
        match self {
            StreamError::Validation(m) => StreamError::Validation(format!("{ctx}: {m}")),
            StreamError::Transient(m) => StreamError::Transient(format!("{ctx}: {m}")),
            StreamError::Permanent(m) => StreamError::Permanent(format!("{ctx}: {m}")),
            StreamError::ExpiredIterator(m) => StreamError::ExpiredIterator(format!("{ctx}: {m}")),
            StreamError::InvalidLocator(m) => StreamError::InvalidLocator(format!("{ctx}: {m}")),
            StreamError::Codec(m) => StreamError::Codec(format!("{ctx}: {m}")),
            StreamError::InvalidState(m) => StreamError::InvalidState(format!("{ctx}: {m}")),
            other @ StreamError::UnknownShard { .. } => other,
        }
    }
}

impl From<serde_json::Error> for StreamError {
    fn from(e: serde_json::Error) -> Self {
        StreamError::Codec(e.to_string())
    }
}

impl From<std::str::Utf8Error> for StreamError {
    fn from(e: std::str::Utf8Error) -> Self {
        StreamError::Codec(e.to_string())
    }
}
