//! Voice session state with validated transitions.
//!
//! Valid transitions are defined by [`VoiceSessionStatus::can_transition_to`]:
//! - Disconnected -> Connecting (start requested)
//! - Connecting -> Connected (provider confirmed)
//! - Connecting -> Disconnected (cancelled or failed)
//! - Connected -> Disconnected (ended by the user or the provider)
//!
//! Every transition back to `Disconnected` advances the epoch, which
//! invalidates reporters handed out for earlier sessions.

use uuid::Uuid;

use moto_core::types::VoiceSessionStatus;

use crate::error::VoiceError;
use crate::provider::SessionHandle;

/// Mutable state guarded by the controller's lock.
#[derive(Debug, Default)]
pub struct SessionState {
    status: VoiceSessionStatus,
    epoch: u64,
    session_id: Option<Uuid>,
    handle: Option<SessionHandle>,
    /// Epoch of the last session the user cancelled before it connected.
    cancelled: Option<u64>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> VoiceSessionStatus {
        self.status
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn session_id(&self) -> Option<Uuid> {
        self.session_id
    }

    /// Whether a reporter stamped with `epoch` still speaks for the current
    /// session.
    pub fn is_current(&self, epoch: u64) -> bool {
        self.epoch == epoch && self.status != VoiceSessionStatus::Disconnected
    }

    /// Move to `Connecting` for a fresh session. Returns the session's epoch.
    pub fn begin(&mut self, session_id: Uuid) -> Result<u64, VoiceError> {
        self.transition(VoiceSessionStatus::Connecting)?;
        self.session_id = Some(session_id);
        Ok(self.epoch)
    }

    /// Remember the provider handle for the current session.
    pub fn attach(&mut self, handle: SessionHandle) {
        self.handle = Some(handle);
    }

    /// Attempt to transition to `target`. Returns the previous status.
    pub fn transition(
        &mut self,
        target: VoiceSessionStatus,
    ) -> Result<VoiceSessionStatus, VoiceError> {
        let from = self.status;
        if !from.can_transition_to(&target) {
            return Err(VoiceError::InvalidTransition { from, to: target });
        }
        tracing::debug!("Voice session state: {} -> {}", from, target);
        self.status = target;
        Ok(from)
    }

    /// Transition to `Disconnected`, advance the epoch, and hand back what
    /// the closed session owned.
    pub fn close(&mut self) -> Result<ClosedSession, VoiceError> {
        let from = self.transition(VoiceSessionStatus::Disconnected)?;
        self.epoch += 1;
        Ok(ClosedSession {
            from,
            session_id: self.session_id.take(),
            handle: self.handle.take(),
        })
    }

    /// [`close`](Self::close) on the user's request. Closing a session that
    /// is still `Connecting` marks it cancelled.
    pub fn cancel(&mut self) -> Result<ClosedSession, VoiceError> {
        let epoch = self.epoch;
        let closed = self.close()?;
        if closed.from == VoiceSessionStatus::Connecting {
            self.cancelled = Some(epoch);
        }
        Ok(closed)
    }

    /// Whether the session started at `epoch` was cancelled while connecting.
    pub fn was_cancelled(&self, epoch: u64) -> bool {
        self.cancelled == Some(epoch)
    }
}

/// What remains of a session after [`SessionState::close`].
#[derive(Debug)]
pub struct ClosedSession {
    pub from: VoiceSessionStatus,
    pub session_id: Option<Uuid>,
    pub handle: Option<SessionHandle>,
}

// =============================================================================
// Tests
// =============================================================================
