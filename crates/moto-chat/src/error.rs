//! Error types for the text query pipeline.

use moto_core::error::MotoError;

/// Failure of a text-generation call.
///
/// The `Display` text is what the user sees after the `"Error: "` prefix,
/// so every variant renders a self-contained, legible sentence.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerationError {
    #[error("could not reach the language service: {0}")]
    Transport(String),
    #[error("the language service rejected the request ({status}): {message}")]
    Status { status: u16, message: String },
    #[error("rate limit exceeded: {0}")]
    RateLimited(String),
    #[error("the language service returned an unreadable response: {0}")]
    MalformedResponse(String),
    #[error("the request was blocked by the language service: {0}")]
    Blocked(String),
    #[error("{0}")]
    Other(String),
}

impl GenerationError {
    /// The message carried by the error, as shown in the conversation.
    pub fn message(&self) -> String {
        self.to_string()
    }
}

impl From<GenerationError> for MotoError {
    fn from(err: GenerationError) -> Self {
        MotoError::Generation(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_error_display() {
        let err = GenerationError::Transport("connection refused".to_string());
        assert_eq!(
            err.to_string(),
            "could not reach the language service: connection refused"
        );

        let err = GenerationError::Status {
            status: 403,
            message: "API key not valid".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "the language service rejected the request (403): API key not valid"
        );

        let err = GenerationError::RateLimited("quota exhausted".to_string());
        assert_eq!(err.to_string(), "rate limit exceeded: quota exhausted");

        let err = GenerationError::MalformedResponse("no candidates".to_string());
        assert!(err.to_string().contains("unreadable response"));

        let err = GenerationError::Blocked("SAFETY".to_string());
        assert!(err.to_string().ends_with("SAFETY"));

        let err = GenerationError::Other("Unknown error".to_string());
        assert_eq!(err.message(), "Unknown error");
    }

    #[test]
    fn test_into_moto_error() {
        let err: MotoError = GenerationError::Other("boom".to_string()).into();
        assert!(matches!(err, MotoError::Generation(_)));
        assert_eq!(err.to_string(), "Generation error: boom");
    }

    #[test]
    fn test_unicode_inner_messages() {
        let err = GenerationError::Other("দাম পাওয়া যায়নি".to_string());
        assert!(err.to_string().contains("দাম"));
    }
}
