use thiserror::Error;

/// Errors that can occur while configuring, running, or feeding the
/// metrics engine.
#[derive(Error, Debug)]
pub enum StatsdError {
    /// A custom error with a free-form message.
    #[error("{0}")]
    Custom(String),

    /// An I/O error from the standard library (socket bind/connect/write).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A configuration value was invalid at startup.
    #[error("configuration error: {0}")]
    Config(String),

    /// An invariant the engine relies on was violated.
    #[error("internal invariant violated: {0}")]
    Internal(String),
}

impl From<String> for StatsdError {
    fn from(value: String) -> Self {
        Self::Custom(value)
    }
}

impl From<&str> for StatsdError {
    fn from(value: &str) -> Self {
        Self::Custom(value.to_string())
    }
}

/// Result type used throughout the crate.
pub type StatsdResult<T> = Result<T, StatsdError>;
