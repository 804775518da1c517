//! Error types for the voice session controller and providers.

use moto_core::error::MotoError;
use moto_core::types::VoiceSessionStatus;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VoiceError {
    /// The provider could not open a session.
    #[error("could not start voice session: {0}")]
    Connect(String),

    /// The transport failed after the session was opened.
    #[error("voice transport failed: {0}")]
    Transport(String),

    /// The agent sent something the provider could not interpret.
    #[error("voice protocol error: {0}")]
    Protocol(String),

    /// The requested transport is not implemented by this provider.
    #[error("unsupported voice transport: {0}")]
    Unsupported(String),

    #[error("invalid voice session transition: {from} -> {to}")]
    InvalidTransition {
        from: VoiceSessionStatus,
        to: VoiceSessionStatus,
    },
}

impl From<VoiceError> for MotoError {
    fn from(err: VoiceError) -> Self {
        MotoError::Voice(err.to_string())
    }
}
