//! Error types for the modem

use thiserror::Error;

/// Errors surfaced by modem operations
///
/// Weak signal, sync loss and malformed payloads are not errors; they show up
/// as dropped samples or events on the receive path.
#[derive(Debug, Error)]
pub enum ModemError {
    #[error("Audio device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("Failed to open stream: {0}")]
    StreamError(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("{0} is already running")]
    Busy(&'static str),

    #[error("WAV error: {0}")]
    Wav(String),

    #[error("Config parse error: {0}")]
    Config(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<hound::Error> for ModemError {
    fn from(err: hound::Error) -> Self {
        match err {
            hound::Error::IoError(e) => ModemError::Io(e),
            other => ModemError::Wav(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, ModemError>;
