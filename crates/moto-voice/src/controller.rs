//! Voice session controller.
//!
//! Owns the single [`VoiceSessionStatus`] for a chat room and drives a
//! [`VoiceProvider`] from user toggles. Provider-side news (confirmation,
//! agent messages, disconnects, failures) comes back through a
//! [`SessionReporter`] stamped with the session's epoch, so a report from a
//! session the user already ended cannot disturb the current one.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use chrono::Utc;
use tokio::sync::watch;
use uuid::Uuid;

use moto_core::config::VoiceSettings;
use moto_core::events::{EngineEvent, EventBus};
use moto_core::types::VoiceSessionStatus;

use crate::error::VoiceError;
use crate::provider::{SessionRequest, VoiceProvider};
use crate::state::{ClosedSession, SessionState};

#[derive(Debug)]
struct Inner {
    state: Mutex<SessionState>,
    status_tx: watch::Sender<VoiceSessionStatus>,
    events: EventBus,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Publish a status change. Called with the state lock held so observers
    /// see transitions in the order they were applied.
    fn announce(&self, from: VoiceSessionStatus, to: VoiceSessionStatus) {
        self.status_tx.send_replace(to);
        self.events.publish(EngineEvent::VoiceStatusChanged {
            from,
            to,
            timestamp: Utc::now(),
        });
    }

    fn close(&self, state: &mut SessionState) -> Option<ClosedSession> {
        let closed = state.close().ok()?;
        self.announce(closed.from, VoiceSessionStatus::Disconnected);
        Some(closed)
    }

    fn cancel(&self, state: &mut SessionState) -> Option<ClosedSession> {
        let closed = state.cancel().ok()?;
        self.announce(closed.from, VoiceSessionStatus::Disconnected);
        Some(closed)
    }

    fn report_connected(&self, epoch: u64, session_id: Uuid) -> bool {
        let mut state = self.lock();
        if !state.is_current(epoch) {
            tracing::debug!(%session_id, "Ignoring confirmation from stale voice session");
            return false;
        }
        match state.transition(VoiceSessionStatus::Connected) {
            Ok(from) => {
                self.announce(from, VoiceSessionStatus::Connected);
                self.events.publish(EngineEvent::VoiceConnected {
                    session_id,
                    timestamp: Utc::now(),
                });
                tracing::info!(%session_id, "Voice session connected");
                true
            }
            Err(e) => {
                tracing::debug!(%session_id, error = %e, "Ignoring voice confirmation");
                false
            }
        }
    }

    fn report_disconnected(&self, epoch: u64, session_id: Uuid) -> bool {
        let mut state = self.lock();
        if !state.is_current(epoch) {
            return false;
        }
        let Some(closed) = self.close(&mut state) else {
            return false;
        };
        self.events.publish(EngineEvent::VoiceDisconnected {
            session_id: closed.session_id,
            timestamp: Utc::now(),
        });
        tracing::info!(%session_id, "Voice agent ended the session");
        true
    }

    fn report_failed(&self, epoch: u64, session_id: Uuid, reason: &str) -> bool {
        let mut state = self.lock();
        if !state.is_current(epoch) {
            tracing::debug!(%session_id, reason, "Ignoring failure from stale voice session");
            return false;
        }
        if self.close(&mut state).is_none() {
            return false;
        }
        self.events.publish(EngineEvent::VoiceFailed {
            reason: reason.to_string(),
            timestamp: Utc::now(),
        });
        tracing::warn!(%session_id, reason, "Voice session failed");
        true
    }

    fn report_message(&self, epoch: u64, source: &str, text: &str) {
        if !self.lock().is_current(epoch) {
            return;
        }
        tracing::debug!(source, text_len = text.len(), "Voice agent message");
        self.events.publish(EngineEvent::VoiceMessage {
            source: source.to_string(),
            text: text.to_string(),
            timestamp: Utc::now(),
        });
    }
}

/// Provider-facing callback surface for one session.
///
/// Holds only a weak reference to the controller; reports made after the
/// controller is gone, or after the session was superseded, are dropped.
#[derive(Debug, Clone)]
pub struct SessionReporter {
    inner: Weak<Inner>,
    epoch: u64,
    session_id: Uuid,
}

impl SessionReporter {
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// The agent confirmed the session is live. Returns whether it applied.
    pub fn connected(&self) -> bool {
        self.inner
            .upgrade()
            .is_some_and(|inner| inner.report_connected(self.epoch, self.session_id))
    }

    /// The provider closed the session on its side.
    pub fn disconnected(&self) -> bool {
        self.inner
            .upgrade()
            .is_some_and(|inner| inner.report_disconnected(self.epoch, self.session_id))
    }

    /// The session failed. Status reverts to `Disconnected`; no retry.
    pub fn failed(&self, reason: &str) -> bool {
        self.inner
            .upgrade()
            .is_some_and(|inner| inner.report_failed(self.epoch, self.session_id, reason))
    }

    /// Diagnostic message from the agent, e.g. a transcript.
    pub fn message(&self, source: &str, text: &str) {
        if let Some(inner) = self.inner.upgrade() {
            inner.report_message(self.epoch, source, text);
        }
    }
}

/// Start/stop control for the streaming voice agent.
pub struct VoiceSessionController {
    inner: Arc<Inner>,
    provider: Arc<dyn VoiceProvider>,
    settings: VoiceSettings,
}

impl VoiceSessionController {
    pub fn new(provider: Arc<dyn VoiceProvider>, settings: VoiceSettings, events: EventBus) -> Self {
        let (status_tx, _) = watch::channel(VoiceSessionStatus::Disconnected);
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(SessionState::new()),
                status_tx,
                events,
            }),
            provider,
            settings,
        }
    }

    pub fn status(&self) -> VoiceSessionStatus {
        self.inner.lock().status()
    }

    /// Watch status changes.
    pub fn subscribe(&self) -> watch::Receiver<VoiceSessionStatus> {
        self.inner.status_tx.subscribe()
    }

    /// Start a session when disconnected, otherwise end (or cancel) it.
    ///
    /// Returns the provider's error when a start fails; the status has
    /// already reverted to `Disconnected` by then.
    pub async fn toggle(&self) -> Result<(), VoiceError> {
        match self.status() {
            VoiceSessionStatus::Disconnected => self.start().await,
            VoiceSessionStatus::Connecting | VoiceSessionStatus::Connected => {
                self.end().await;
                Ok(())
            }
        }
    }

    async fn start(&self) -> Result<(), VoiceError> {
        let session_id = Uuid::new_v4();
        let epoch = {
            let mut state = self.inner.lock();
            match state.begin(session_id) {
                Ok(epoch) => {
                    self.inner
                        .announce(VoiceSessionStatus::Disconnected, VoiceSessionStatus::Connecting);
                    epoch
                }
                Err(e) => {
                    tracing::debug!(error = %e, "Ignoring voice start");
                    return Ok(());
                }
            }
        };

        tracing::info!(
            %session_id,
            agent_id = %self.settings.agent_id,
            transport = %self.settings.transport,
            "Starting voice session"
        );

        let request = SessionRequest {
            session_id,
            agent_id: self.settings.agent_id.clone(),
            transport: self.settings.transport,
        };
        let reporter = SessionReporter {
            inner: Arc::downgrade(&self.inner),
            epoch,
            session_id,
        };

        match self.provider.start_session(request, reporter).await {
            Ok(handle) => {
                let late = {
                    let mut state = self.inner.lock();
                    if state.is_current(epoch) {
                        state.attach(handle);
                        None
                    } else {
                        Some(handle)
                    }
                };
                if let Some(handle) = late {
                    tracing::info!(%session_id, "Voice session opened after cancellation, ending it");
                    if let Err(e) = self.provider.end_session(handle).await {
                        tracing::warn!(%session_id, error = %e, "Failed to end cancelled voice session");
                    }
                }
                Ok(())
            }
            Err(e) => {
                if self.inner.report_failed(epoch, session_id, &e.to_string()) {
                    return Err(e);
                }
                if self.inner.lock().was_cancelled(epoch) {
                    tracing::debug!(%session_id, error = %e, "Cancelled voice session failed to start");
                    return Ok(());
                }
                // The provider already reported this failure through the reporter.
                Err(e)
            }
        }
    }

    /// End the current session, if any. Idempotent.
    ///
    /// Ending while `Connecting` cancels the start; a session that opens
    /// afterwards is ended as soon as the provider hands it back.
    pub async fn end(&self) {
        let closed = {
            let mut state = self.inner.lock();
            let Some(closed) = self.inner.cancel(&mut state) else {
                return;
            };
            self.inner.events.publish(EngineEvent::VoiceDisconnected {
                session_id: closed.session_id,
                timestamp: Utc::now(),
            });
            closed
        };

        tracing::info!(
            session_id = ?closed.session_id,
            from = %closed.from,
            "Ending voice session"
        );

        if let Some(handle) = closed.handle {
            if let Err(e) = self.provider.end_session(handle).await {
                tracing::warn!(error = %e, "Voice provider failed to end session");
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
