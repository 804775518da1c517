//! Authentication error taxonomy and provider error-code mapping.
//!
//! Providers report failures as `ProviderError { code, message }` using the
//! hosted identity service's code strings. The gate translates them into
//! the fixed [`AuthErrorKind`] taxonomy with a message fit for inline display.

use std::fmt;

use moto_core::error::MotoError;

/// Provider error codes understood by the mapping table.
pub mod codes {
    pub const INVALID_EMAIL: &str = "auth/invalid-email";
    pub const USER_NOT_FOUND: &str = "auth/user-not-found";
    pub const WRONG_PASSWORD: &str = "auth/wrong-password";
    pub const INVALID_CREDENTIAL: &str = "auth/invalid-credential";
    pub const EMAIL_ALREADY_IN_USE: &str = "auth/email-already-in-use";
    pub const WEAK_PASSWORD: &str = "auth/weak-password";
}

/// Raw failure reported by an identity provider.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{code}: {message}")]
pub struct ProviderError {
    pub code: String,
    pub message: String,
}

impl ProviderError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Category of an authentication failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthErrorKind {
    InvalidInput,
    InvalidCredential,
    UnknownAccount,
    EmailInUse,
    WeakSecret,
    Provider,
}

impl fmt::Display for AuthErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AuthErrorKind::InvalidInput => "invalid-input",
            AuthErrorKind::InvalidCredential => "invalid-credential",
            AuthErrorKind::UnknownAccount => "unknown-account",
            AuthErrorKind::EmailInUse => "email-in-use",
            AuthErrorKind::WeakSecret => "weak-secret",
            AuthErrorKind::Provider => "provider-error",
        };
        f.write_str(s)
    }
}

/// Error returned by the identity gate's login and register operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct AuthError {
    kind: AuthErrorKind,
    message: String,
}

impl AuthError {
    pub fn new(kind: AuthErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(AuthErrorKind::InvalidInput, message)
    }

    pub fn kind(&self) -> AuthErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<ProviderError> for AuthError {
    fn from(err: ProviderError) -> Self {
        let (kind, message) = match err.code.as_str() {
            codes::INVALID_EMAIL => (AuthErrorKind::InvalidInput, "Invalid email address"),
            codes::USER_NOT_FOUND => (
                AuthErrorKind::UnknownAccount,
                "No account found with this email",
            ),
            codes::WRONG_PASSWORD => (AuthErrorKind::InvalidCredential, "Incorrect password"),
            codes::INVALID_CREDENTIAL => (
                AuthErrorKind::InvalidCredential,
                "Invalid email or password",
            ),
            codes::EMAIL_ALREADY_IN_USE => (AuthErrorKind::EmailInUse, "Email already in use"),
            codes::WEAK_PASSWORD => (
                AuthErrorKind::WeakSecret,
                "Password must be at least 6 characters",
            ),
            _ => {
                let message = if err.message.trim().is_empty() {
                    "Authentication failed".to_string()
                } else {
                    err.message
                };
                return AuthError::new(AuthErrorKind::Provider, message);
            }
        };
        AuthError::new(kind, message)
    }
}

impl From<AuthError> for MotoError {
    fn from(err: AuthError) -> Self {
        MotoError::Auth(format!("{} ({})", err.message, err.kind))
    }
}
