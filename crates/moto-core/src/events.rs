use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::types::VoiceSessionStatus;

pub type Timestamp = DateTime<Utc>;

/// All observable events emitted by the interaction engine.
///
/// Events are published on the [`EventBus`] after state changes and consumed by:
/// - The logging task in the binary (observability)
/// - Tests asserting lifecycle ordering
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[non_exhaustive]
pub enum EngineEvent {
    // =========================================================================
    // Identity Events
    // =========================================================================
    /// The identity gate observed a sign-in, sign-out, or restored session.
    IdentityChanged {
        uid: Option<String>,
        timestamp: Timestamp,
    },

    // =========================================================================
    // Text Query Events
    // =========================================================================
    /// A text query was accepted and its user turn appended.
    QueryStarted {
        query_id: Uuid,
        utterance_len: usize,
        timestamp: Timestamp,
    },

    /// The generation call returned text and the assistant turn was appended.
    QueryResolved {
        query_id: Uuid,
        answer_len: usize,
        timestamp: Timestamp,
    },

    /// The generation call failed; an error turn was appended instead.
    QueryFailed {
        query_id: Uuid,
        message: String,
        timestamp: Timestamp,
    },

    // =========================================================================
    // Voice Events
    // =========================================================================
    /// The voice session status changed.
    VoiceStatusChanged {
        from: VoiceSessionStatus,
        to: VoiceSessionStatus,
        timestamp: Timestamp,
    },

    /// The provider confirmed a live session.
    VoiceConnected {
        session_id: Uuid,
        timestamp: Timestamp,
    },

    /// A session ended, by the user or by the provider.
    VoiceDisconnected {
        session_id: Option<Uuid>,
        timestamp: Timestamp,
    },

    /// Diagnostic message from the voice agent (transcripts, agent replies).
    VoiceMessage {
        source: String,
        text: String,
        timestamp: Timestamp,
    },

    /// A session could not be started or failed while live.
    VoiceFailed {
        reason: String,
        timestamp: Timestamp,
    },
}

impl EngineEvent {
    /// Short machine-readable name of the event.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineEvent::IdentityChanged { .. } => "identity_changed",
            EngineEvent::QueryStarted { .. } => "query_started",
            EngineEvent::QueryResolved { .. } => "query_resolved",
            EngineEvent::QueryFailed { .. } => "query_failed",
            EngineEvent::VoiceStatusChanged { .. } => "voice_status_changed",
            EngineEvent::VoiceConnected { .. } => "voice_connected",
            EngineEvent::VoiceDisconnected { .. } => "voice_disconnected",
            EngineEvent::VoiceMessage { .. } => "voice_message",
            EngineEvent::VoiceFailed { .. } => "voice_failed",
        }
    }

    pub fn timestamp(&self) -> Timestamp {
        match self {
            EngineEvent::IdentityChanged { timestamp, .. }
            | EngineEvent::QueryStarted { timestamp, .. }
            | EngineEvent::QueryResolved { timestamp, .. }
            | EngineEvent::QueryFailed { timestamp, .. }
            | EngineEvent::VoiceStatusChanged { timestamp, .. }
            | EngineEvent::VoiceConnected { timestamp, .. }
            | EngineEvent::VoiceDisconnected { timestamp, .. }
            | EngineEvent::VoiceMessage { timestamp, .. }
            | EngineEvent::VoiceFailed { timestamp, .. } => *timestamp,
        }
    }
}

/// Default number of events buffered per subscriber before lagging.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Fan-out channel for [`EngineEvent`]s.
///
/// Cloning is cheap; all clones publish to the same subscribers. Publishing
/// with no subscribers is not an error.
#[derive(Clone, Debug)]
pub struct EventBus {
    tx: broadcast::Sender<EngineEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish an event to all current subscribers.
    pub fn publish(&self, event: EngineEvent) {
        tracing::trace!(kind = event.kind(), "Engine event");
        // Err only means nobody is listening.
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

// =============================================================================
// Tests
// =============================================================================
