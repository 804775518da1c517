use std::fmt;

use serde::{Deserialize, Serialize};

// =============================================================================
// Chat turns
// =============================================================================

/// Who produced a chat turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    /// The signed-in human.
    User,
    /// The motorbike specialist (text pipeline output or seeded greeting).
    Assistant,
}

impl fmt::Display for Speaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Speaker::User => write!(f, "user"),
            Speaker::Assistant => write!(f, "assistant"),
        }
    }
}

/// One logged utterance. Immutable once created.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    text: String,
    speaker: Speaker,
}

impl ChatTurn {
    pub fn new(speaker: Speaker, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            speaker,
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Speaker::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Speaker::Assistant, text)
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn speaker(&self) -> Speaker {
        self.speaker
    }
}

// =============================================================================
// Identity
// =============================================================================

/// Opaque handle for a signed-in account.
///
/// Holding an `Identity` means "authenticated"; the engine never inspects
/// it beyond display and equality.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    uid: String,
    email: String,
}

impl Identity {
    pub fn new(uid: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            email: email.into(),
        }
    }

    pub fn uid(&self) -> &str {
        &self.uid
    }

    pub fn email(&self) -> &str {
        &self.email
    }
}

// =============================================================================
// Voice session status
// =============================================================================

/// Lifecycle status of the streaming voice session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoiceSessionStatus {
    /// No session. Initial state.
    #[default]
    Disconnected,
    /// Start requested, waiting for the provider to confirm.
    Connecting,
    /// Live full-duplex session.
    Connected,
}

impl fmt::Display for VoiceSessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VoiceSessionStatus::Disconnected => write!(f, "disconnected"),
            VoiceSessionStatus::Connecting => write!(f, "connecting"),
            VoiceSessionStatus::Connected => write!(f, "connected"),
        }
    }
}

impl VoiceSessionStatus {
    /// Returns whether a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: &VoiceSessionStatus) -> bool {
        matches!(
            (self, target),
            (VoiceSessionStatus::Disconnected, VoiceSessionStatus::Connecting)
                | (VoiceSessionStatus::Connecting, VoiceSessionStatus::Connected)
                // Cancel, failure, or explicit end
                | (VoiceSessionStatus::Connecting, VoiceSessionStatus::Disconnected)
                | (VoiceSessionStatus::Connected, VoiceSessionStatus::Disconnected)
        )
    }

    /// Whether the presentation layer should show the live-session affordance.
    pub fn is_live(&self) -> bool {
        matches!(self, VoiceSessionStatus::Connected)
    }
}

// =============================================================================
// Tests
// =============================================================================
