use thiserror::Error;

/// Top-level error type for the Moto engine.
///
/// Subsystem crates keep their own error types (`AuthError`,
/// `GenerationError`, `VoiceError`) and convert into `MotoError` where they
/// cross into startup or composition code, so `?` works across crates.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum MotoError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Voice session error: {0}")]
    Voice(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for MotoError {
    fn from(err: toml::de::Error) -> Self {
        MotoError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for MotoError {
    fn from(err: toml::ser::Error) -> Self {
        MotoError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for MotoError {
    fn from(err: serde_json::Error) -> Self {
        MotoError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Moto operations.
pub type Result<T> = std::result::Result<T, MotoError>;
