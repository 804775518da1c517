//! Conversational-agent provider over WebSocket.
//!
//! Connects to `{endpoint}?agent_id={id}`, then runs one task per session
//! that answers keep-alive pings and forwards agent events to the
//! [`SessionReporter`]. Audio frames are not consumed here; capture and
//! playback belong to the host.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use url::Url;
use uuid::Uuid;

use moto_core::config::{VoiceSettings, VoiceTransport};

use crate::controller::SessionReporter;
use crate::error::VoiceError;
use crate::provider::{SessionHandle, SessionRequest, VoiceProvider};

const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

type AgentSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

// =============================================================================
// Wire protocol
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ServerMessage {
    ConversationInitiationMetadata {
        conversation_initiation_metadata_event: InitiationMetadata,
    },
    Ping {
        ping_event: PingEvent,
    },
    AgentResponse {
        agent_response_event: AgentResponseEvent,
    },
    UserTranscript {
        user_transcription_event: UserTranscriptionEvent,
    },
    Interruption {
        #[serde(default)]
        interruption_event: Option<InterruptionEvent>,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct InitiationMetadata {
    conversation_id: String,
}

#[derive(Debug, Deserialize)]
struct PingEvent {
    event_id: u64,
}

#[derive(Debug, Deserialize)]
struct AgentResponseEvent {
    agent_response: String,
}

#[derive(Debug, Deserialize)]
struct UserTranscriptionEvent {
    user_transcript: String,
}

#[derive(Debug, Deserialize)]
struct InterruptionEvent {
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientMessage {
    ConversationInitiationClientData {},
    Pong { event_id: u64 },
}

/// Apply one server text frame. Returns the reply to send, if any.
fn handle_server_message(text: &str, reporter: &SessionReporter) -> Option<String> {
    let msg: ServerMessage = match serde_json::from_str(text) {
        Ok(m) => m,
        Err(e) => {
            tracing::debug!("Ignoring unparseable agent message: {e}");
            return None;
        }
    };

    match msg {
        ServerMessage::ConversationInitiationMetadata {
            conversation_initiation_metadata_event: meta,
        } => {
            tracing::info!(
                session_id = %reporter.session_id(),
                conversation_id = %meta.conversation_id,
                "Voice agent accepted conversation"
            );
            reporter.connected();
            None
        }
        ServerMessage::Ping { ping_event } => {
            serde_json::to_string(&ClientMessage::Pong {
                event_id: ping_event.event_id,
            })
            .ok()
        }
        ServerMessage::AgentResponse {
            agent_response_event,
        } => {
            reporter.message("agent", &agent_response_event.agent_response);
            None
        }
        ServerMessage::UserTranscript {
            user_transcription_event,
        } => {
            reporter.message("user", &user_transcription_event.user_transcript);
            None
        }
        ServerMessage::Interruption { interruption_event } => {
            let reason = interruption_event
                .and_then(|e| e.reason)
                .unwrap_or_else(|| "user interrupted".to_string());
            reporter.message("interruption", &reason);
            None
        }
        ServerMessage::Other => None,
    }
}

/// Build the session URL for `agent_id`.
pub fn session_url(endpoint: &str, agent_id: &str) -> Result<Url, VoiceError> {
    let mut url = Url::parse(endpoint)
        .map_err(|e| VoiceError::Connect(format!("invalid endpoint {endpoint}: {e}")))?;
    if !matches!(url.scheme(), "ws" | "wss") {
        return Err(VoiceError::Connect(format!(
            "endpoint must be ws:// or wss://, got {}",
            url.scheme()
        )));
    }
    url.query_pairs_mut().append_pair("agent_id", agent_id);
    Ok(url)
}

// =============================================================================
// Session task
// =============================================================================

enum Exit {
    /// `end_session` asked us to stop.
    Local,
    /// The agent closed the conversation.
    Remote,
    Failed(String),
}

async fn run_session(
    socket: AgentSocket,
    reporter: SessionReporter,
    mut shutdown_rx: oneshot::Receiver<()>,
    sessions: Arc<Mutex<HashMap<Uuid, SessionTask>>>,
) {
    let session_id = reporter.session_id();
    let (mut write, mut read) = socket.split();

    let exit = match serde_json::to_string(&ClientMessage::ConversationInitiationClientData {}) {
        Ok(init) => match write.send(Message::Text(init)).await {
            Ok(()) => None,
            Err(e) => Some(Exit::Failed(format!("send error: {e}"))),
        },
        Err(e) => Some(Exit::Failed(e.to_string())),
    };

    let exit = match exit {
        Some(exit) => exit,
        None => loop {
            tokio::select! {
                _ = &mut shutdown_rx => {
                    let _ = write.send(Message::Close(None)).await;
                    break Exit::Local;
                }
                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            if let Some(reply) = handle_server_message(&text, &reporter) {
                                if let Err(e) = write.send(Message::Text(reply)).await {
                                    break Exit::Failed(format!("send error: {e}"));
                                }
                            }
                        }
                        Some(Ok(Message::Close(frame))) => {
                            break match frame {
                                Some(f) if f.code != CloseCode::Normal && f.code != CloseCode::Away => {
                                    Exit::Failed(format!(
                                        "closed by agent ({}): {}",
                                        u16::from(f.code),
                                        f.reason
                                    ))
                                }
                                _ => Exit::Remote,
                            };
                        }
                        None => break Exit::Remote,
                        Some(Err(e)) => break Exit::Failed(format!("read error: {e}")),
                        _ => {} // Binary audio, Ping/Pong frames handled by tungstenite.
                    }
                }
            }
        },
    };

    sessions
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .remove(&session_id);

    match exit {
        Exit::Local => tracing::debug!(%session_id, "Voice session task stopped"),
        Exit::Remote => {
            reporter.disconnected();
        }
        Exit::Failed(reason) => {
            reporter.failed(&reason);
        }
    }
}

// =============================================================================
// Provider
// =============================================================================

struct SessionTask {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

/// [`VoiceProvider`] for the hosted conversational-agent WebSocket API.
pub struct ConvaiProvider {
    endpoint: String,
    sessions: Arc<Mutex<HashMap<Uuid, SessionTask>>>,
}

impl ConvaiProvider {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            sessions: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn from_settings(settings: &VoiceSettings) -> Self {
        Self::new(settings.endpoint.clone())
    }

    /// Number of sessions with a running socket task.
    pub fn active_sessions(&self) -> usize {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[async_trait]
impl VoiceProvider for ConvaiProvider {
    async fn start_session(
        &self,
        request: SessionRequest,
        reporter: SessionReporter,
    ) -> Result<SessionHandle, VoiceError> {
        if request.transport != VoiceTransport::Websocket {
            return Err(VoiceError::Unsupported(request.transport.to_string()));
        }

        let url = session_url(&self.endpoint, &request.agent_id)?;
        tracing::debug!(session_id = %request.session_id, host = ?url.host_str(), "Connecting to voice agent");

        // No local deadline on the handshake.
        let (socket, _) = connect_async(url.as_str())
            .await
            .map_err(|e| VoiceError::Connect(e.to_string()))?;

        let (shutdown, shutdown_rx) = oneshot::channel();
        // Register before the task can finish and try to remove itself.
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        let task = tokio::spawn(run_session(
            socket,
            reporter,
            shutdown_rx,
            Arc::clone(&self.sessions),
        ));
        sessions.insert(request.session_id, SessionTask { shutdown, task });
        drop(sessions);

        Ok(SessionHandle::new(request.session_id))
    }

    async fn end_session(&self, handle: SessionHandle) -> Result<(), VoiceError> {
        let entry = self
            .sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&handle.id());

        let Some(SessionTask { shutdown, mut task }) = entry else {
            tracing::debug!(session_id = %handle.id(), "Voice session already closed");
            return Ok(());
        };

        let _ = shutdown.send(());
        if tokio::time::timeout(CLOSE_TIMEOUT, &mut task).await.is_err() {
            tracing::warn!(session_id = %handle.id(), "Voice session did not close in time, aborting");
            task.abort();
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_url() {
        let url = session_url("wss://api.elevenlabs.io/v1/convai/conversation", "agent_123").unwrap();
        assert_eq!(
            url.as_str(),
            "wss://api.elevenlabs.io/v1/convai/conversation?agent_id=agent_123"
        );
    }

    #[test]
    fn test_session_url_escapes_agent_id() {
        let url = session_url("ws://127.0.0.1:9000/convai", "a b&c").unwrap();
        assert_eq!(url.query(), Some("agent_id=a+b%26c"));
    }

    #[test]
    fn test_session_url_rejects_http() {
        let err = session_url("https://api.elevenlabs.io", "x").unwrap_err();
        assert!(matches!(err, VoiceError::Connect(_)));
        assert!(session_url("not a url", "x").is_err());
    }

    #[test]
    fn test_parse_server_messages() {
        let msg: ServerMessage = serde_json::from_str(
            r#"{"type":"conversation_initiation_metadata","conversation_initiation_metadata_event":{"conversation_id":"conv_1","agent_output_audio_format":"pcm_16000"}}"#,
        )
        .unwrap();
        assert!(matches!(
            msg,
            ServerMessage::ConversationInitiationMetadata { ref conversation_initiation_metadata_event }
                if conversation_initiation_metadata_event.conversation_id == "conv_1"
        ));

        let msg: ServerMessage =
            serde_json::from_str(r#"{"type":"ping","ping_event":{"event_id":42,"ping_ms":50}}"#)
                .unwrap();
        assert!(matches!(msg, ServerMessage::Ping { ping_event } if ping_event.event_id == 42));

        let msg: ServerMessage = serde_json::from_str(
            r#"{"type":"agent_response","agent_response_event":{"agent_response":"BDT 450,000"}}"#,
        )
        .unwrap();
        assert!(matches!(msg, ServerMessage::AgentResponse { .. }));

        let msg: ServerMessage = serde_json::from_str(r#"{"type":"interruption"}"#).unwrap();
        assert!(matches!(
            msg,
            ServerMessage::Interruption {
                interruption_event: None
            }
        ));

        let msg: ServerMessage =
            serde_json::from_str(r#"{"type":"audio","audio_event":{"audio_base_64":"AAAA"}}"#)
                .unwrap();
        assert!(matches!(msg, ServerMessage::Other));
    }

    #[test]
    fn test_client_messages() {
        let pong = serde_json::to_string(&ClientMessage::Pong { event_id: 7 }).unwrap();
        assert_eq!(pong, r#"{"type":"pong","event_id":7}"#);

        let init = serde_json::to_string(&ClientMessage::ConversationInitiationClientData {}).unwrap();
        assert_eq!(init, r#"{"type":"conversation_initiation_client_data"}"#);
    }

    #[tokio::test]
    async fn test_end_unknown_session_is_ok() {
        let provider = ConvaiProvider::new("ws://127.0.0.1:9/convai");
        provider
            .end_session(SessionHandle::new(Uuid::new_v4()))
            .await
            .unwrap();
        assert_eq!(provider.active_sessions(), 0);
    }
}
