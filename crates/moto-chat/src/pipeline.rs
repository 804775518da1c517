//! Text query pipeline: utterance in, assistant turn out.
//!
//! Every accepted utterance produces exactly two turns in the shared
//! [`MessageStore`]: the user turn, appended before the provider is called,
//! and an assistant turn once the call settles. Generation failures become
//! `"Error: ..."` turns and never reach the caller.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use moto_core::events::{EngineEvent, EventBus};
use moto_core::types::ChatTurn;

use crate::generation::TextGenerator;
use crate::prompt;
use crate::store::MessageStore;

/// In-flight marker. Decrements the shared counter on drop, so the pending
/// flag clears on every exit path including cancellation of the `ask` future.
struct PendingGuard {
    in_flight: Arc<AtomicUsize>,
}

impl PendingGuard {
    fn raise(in_flight: &Arc<AtomicUsize>) -> Self {
        in_flight.fetch_add(1, Ordering::SeqCst);
        Self {
            in_flight: Arc::clone(in_flight),
        }
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Outcome of a single `ask`, for callers that want more than the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AskOutcome {
    /// Blank utterance; nothing was appended.
    Skipped,
    Answered(String),
    Failed(String),
}

pub struct TextQueryPipeline {
    store: Arc<MessageStore>,
    generator: Arc<dyn TextGenerator>,
    model: String,
    events: EventBus,
    in_flight: Arc<AtomicUsize>,
}

impl TextQueryPipeline {
    pub fn new(
        store: Arc<MessageStore>,
        generator: Arc<dyn TextGenerator>,
        model: impl Into<String>,
        events: EventBus,
    ) -> Self {
        Self {
            store,
            generator,
            model: model.into(),
            events,
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn store(&self) -> &Arc<MessageStore> {
        &self.store
    }

    /// True while at least one query is awaiting its answer.
    pub fn is_pending(&self) -> bool {
        self.in_flight() > 0
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Run one utterance through the provider.
    ///
    /// Overlapping calls are allowed; each appends its answer when its own
    /// call resolves, so answers may land out of submission order.
    pub async fn ask(&self, utterance: &str) -> AskOutcome {
        if utterance.trim().is_empty() {
            return AskOutcome::Skipped;
        }

        let query_id = Uuid::new_v4();
        self.store.append(ChatTurn::user(utterance));
        let _pending = PendingGuard::raise(&self.in_flight);

        self.events.publish(EngineEvent::QueryStarted {
            query_id,
            utterance_len: utterance.len(),
            timestamp: Utc::now(),
        });
        tracing::info!(%query_id, model = %self.model, "Text query started");

        let prompt = prompt::compose(utterance);
        match self.generator.generate(&self.model, &prompt).await {
            Ok(answer) => {
                self.store.append(ChatTurn::assistant(answer.clone()));
                self.events.publish(EngineEvent::QueryResolved {
                    query_id,
                    answer_len: answer.len(),
                    timestamp: Utc::now(),
                });
                tracing::info!(%query_id, answer_len = answer.len(), "Text query resolved");
                AskOutcome::Answered(answer)
            }
            Err(e) => {
                let message = e.message();
                self.store
                    .append(ChatTurn::assistant(format!("Error: {}", message)));
                self.events.publish(EngineEvent::QueryFailed {
                    query_id,
                    message: message.clone(),
                    timestamp: Utc::now(),
                });
                tracing::warn!(%query_id, error = %message, "Text query failed");
                AskOutcome::Failed(message)
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
