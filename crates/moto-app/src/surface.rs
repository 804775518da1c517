//! Interaction surface: the composition root behind any front-end.
//!
//! Shows a loading view until the identity gate settles, the sign-in view
//! while signed out, and a chat room while signed in. Each sign-in mounts a
//! fresh [`ChatRoom`] (new message store seeded with the greeting, voice
//! disconnected); sign-out ends any live voice session and unmounts it.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;

use moto_auth::{AuthError, AuthState, IdentityGate};
use moto_chat::{AskOutcome, MessageStore, TextGenerator, TextQueryPipeline};
use moto_core::config::VoiceSettings;
use moto_core::events::EventBus;
use moto_core::types::{ChatTurn, Identity, VoiceSessionStatus};
use moto_voice::{VoiceError, VoiceProvider, VoiceSessionController};

/// What the front-end should draw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceView {
    /// Session restoration has not finished yet.
    Loading,
    SignIn,
    Chat(ChatView),
}

/// Snapshot of a mounted chat room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatView {
    pub turns: Vec<ChatTurn>,
    /// A text query is awaiting its answer.
    pub pending: bool,
    pub voice: VoiceSessionStatus,
}

/// Everything a chat room needs besides the signed-in identity.
#[derive(Clone)]
pub struct RoomServices {
    pub generator: Arc<dyn TextGenerator>,
    pub voice: Arc<dyn VoiceProvider>,
    pub model: String,
    pub voice_settings: VoiceSettings,
    pub events: EventBus,
}

impl RoomServices {
    fn mount(&self, identity: Identity) -> ChatRoom {
        let store = Arc::new(MessageStore::new());
        ChatRoom {
            identity,
            pipeline: TextQueryPipeline::new(
                store,
                Arc::clone(&self.generator),
                self.model.clone(),
                self.events.clone(),
            ),
            voice: VoiceSessionController::new(
                Arc::clone(&self.voice),
                self.voice_settings.clone(),
                self.events.clone(),
            ),
            input: Mutex::new(String::new()),
        }
    }
}

// =============================================================================
// Chat room
// =============================================================================

/// The signed-in view: conversation, input buffer, and voice toggle.
pub struct ChatRoom {
    identity: Identity,
    pipeline: TextQueryPipeline,
    voice: VoiceSessionController,
    input: Mutex<String>,
}

impl ChatRoom {
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn set_input(&self, text: impl Into<String>) {
        *self.input_lock() = text.into();
    }

    pub fn input(&self) -> String {
        self.input_lock().clone()
    }

    /// Send the input buffer. The buffer is cleared when the text is
    /// accepted; blank input is left in place and nothing is sent.
    pub async fn submit(&self) -> AskOutcome {
        let text = {
            let mut input = self.input_lock();
            if input.trim().is_empty() {
                return AskOutcome::Skipped;
            }
            std::mem::take(&mut *input)
        };
        self.pipeline.ask(&text).await
    }

    pub async fn ask(&self, utterance: &str) -> AskOutcome {
        self.pipeline.ask(utterance).await
    }

    pub async fn toggle_voice(&self) -> Result<(), VoiceError> {
        self.voice.toggle().await
    }

    pub fn voice_status(&self) -> VoiceSessionStatus {
        self.voice.status()
    }

    pub fn voice(&self) -> &VoiceSessionController {
        &self.voice
    }

    pub fn is_pending(&self) -> bool {
        self.pipeline.is_pending()
    }

    /// Turns appended at or after `index`.
    pub fn turns_since(&self, index: usize) -> Vec<ChatTurn> {
        self.pipeline.store().since(index)
    }

    pub fn snapshot(&self) -> ChatView {
        ChatView {
            turns: self.pipeline.store().all(),
            pending: self.pipeline.is_pending(),
            voice: self.voice.status(),
        }
    }

    /// Tear down on unmount.
    async fn close(&self) {
        self.voice.end().await;
    }

    fn input_lock(&self) -> MutexGuard<'_, String> {
        self.input.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// =============================================================================
// Surface
// =============================================================================

pub struct InteractionSurface {
    gate: IdentityGate,
    services: RoomServices,
    room: Mutex<Option<Arc<ChatRoom>>>,
    /// Held across a whole mount or unmount, teardown included.
    syncing: AsyncMutex<()>,
}

impl InteractionSurface {
    pub fn new(gate: IdentityGate, services: RoomServices) -> Self {
        Self {
            gate,
            services,
            room: Mutex::new(None),
            syncing: AsyncMutex::new(()),
        }
    }

    pub fn gate(&self) -> &IdentityGate {
        &self.gate
    }

    /// The mounted chat room, if signed in.
    pub fn room(&self) -> Option<Arc<ChatRoom>> {
        self.room_lock().clone()
    }

    /// Current view.
    ///
    /// Signed in but not yet mounted (between a provider push and the next
    /// [`sync_identity`](Self::sync_identity)) reads as `Loading`.
    pub fn view(&self) -> SurfaceView {
        match self.gate.state() {
            AuthState::Pending => SurfaceView::Loading,
            AuthState::SignedOut => SurfaceView::SignIn,
            AuthState::SignedIn(identity) => match self.room() {
                Some(room) if *room.identity() == identity => SurfaceView::Chat(room.snapshot()),
                _ => SurfaceView::Loading,
            },
        }
    }

    pub async fn login(&self, email: &str, secret: &str) -> Result<Identity, AuthError> {
        let identity = self.gate.login(email, secret).await?;
        self.sync_identity().await;
        Ok(identity)
    }

    pub async fn register(&self, email: &str, secret: &str) -> Result<Identity, AuthError> {
        let identity = self.gate.register(email, secret).await?;
        self.sync_identity().await;
        Ok(identity)
    }

    pub async fn logout(&self) {
        self.gate.logout().await;
        self.sync_identity().await;
    }

    /// Mount or unmount the chat room to match the gate's identity.
    ///
    /// Returns once any replaced room has been torn down, even when a
    /// concurrent call took the room first.
    pub async fn sync_identity(&self) {
        let _syncing = self.syncing.lock().await;
        let identity = self.gate.current_identity();
        let previous = {
            let mut room = self.room_lock();
            if let (Some(current), Some(identity)) = (room.as_ref(), identity.as_ref()) {
                if current.identity() == identity {
                    return;
                }
            }
            let previous = room.take();
            if let Some(identity) = identity {
                tracing::info!(uid = %identity.uid(), "Chat room mounted");
                *room = Some(Arc::new(self.services.mount(identity)));
            }
            previous
        };

        if let Some(previous) = previous {
            previous.close().await;
            tracing::info!(uid = %previous.identity().uid(), "Chat room unmounted");
        }
    }

    /// Keep the room in step with identity changes pushed by the provider,
    /// such as a restored session or an expired one.
    ///
    /// The task ends when the surface is dropped.
    pub fn watch_identity(self: &Arc<Self>) -> JoinHandle<()> {
        let mut rx = self.gate.subscribe();
        let surface: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            loop {
                match surface.upgrade() {
                    Some(surface) => surface.sync_identity().await,
                    None => break,
                }
                if rx.changed().await.is_err() {
                    break;
                }
            }
        })
    }

    fn room_lock(&self) -> MutexGuard<'_, Option<Arc<ChatRoom>>> {
        self.room.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
