//! Voice agent provider boundary.

use async_trait::async_trait;
use uuid::Uuid;

use moto_core::config::VoiceTransport;

use crate::controller::SessionReporter;
use crate::error::VoiceError;

/// Parameters for opening one conversational-agent session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRequest {
    /// Controller-assigned id; providers stamp their handle with it.
    pub session_id: Uuid,
    pub agent_id: String,
    pub transport: VoiceTransport,
}

/// Provider-side reference to an open session.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct SessionHandle {
    id: Uuid,
}

impl SessionHandle {
    pub fn new(id: Uuid) -> Self {
        Self { id }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }
}

/// A full-duplex conversational voice agent.
///
/// `start_session` returns once the transport is open. Confirmation that the
/// agent is live, agent messages, and later failures are pushed through the
/// [`SessionReporter`], possibly before `start_session` returns.
#[async_trait]
pub trait VoiceProvider: Send + Sync {
    async fn start_session(
        &self,
        request: SessionRequest,
        reporter: SessionReporter,
    ) -> Result<SessionHandle, VoiceError>;

    /// End a session. Ending a session the provider already closed is not
    /// an error.
    async fn end_session(&self, handle: SessionHandle) -> Result<(), VoiceError>;
}
