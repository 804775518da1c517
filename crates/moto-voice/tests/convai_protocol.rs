//! Conversational-agent protocol tests against a local WebSocket server.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use moto_core::config::{VoiceSettings, VoiceTransport};
use moto_core::events::{EngineEvent, EventBus};
use moto_core::types::VoiceSessionStatus;
use moto_voice::{ConvaiProvider, VoiceError, VoiceSessionController};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_async, accept_hdr_async, WebSocketStream};

const WAIT: Duration = Duration::from_secs(5);

type ServerSocket = WebSocketStream<TcpStream>;

// =============================================================================
// Harness
// =============================================================================

/// Accept one connection, report the request URI, then run `script`.
async fn serve_once<F, Fut, T>(script: F) -> (String, oneshot::Receiver<String>, JoinHandle<T>)
where
    F: FnOnce(ServerSocket) -> Fut + Send + 'static,
    Fut: std::future::Future<Output = T> + Send,
    T: Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let endpoint = format!("ws://{}/v1/convai/conversation", listener.local_addr().unwrap());
    let (uri_tx, uri_rx) = oneshot::channel();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let socket = accept_hdr_async(stream, move |req: &Request, resp: Response| {
            let _ = uri_tx.send(req.uri().to_string());
            Ok::<Response, ErrorResponse>(resp)
        })
        .await
        .unwrap();
        script(socket).await
    });

    (endpoint, uri_rx, server)
}

async fn next_text(socket: &mut ServerSocket) -> Option<String> {
    while let Some(msg) = socket.next().await {
        match msg {
            Ok(Message::Text(text)) => return Some(text),
            Ok(Message::Close(_)) | Err(_) => return None,
            _ => {}
        }
    }
    None
}

async fn send_json(socket: &mut ServerSocket, value: serde_json::Value) {
    socket.send(Message::Text(value.to_string())).await.unwrap();
}

fn controller(endpoint: &str, transport: VoiceTransport) -> (Arc<VoiceSessionController>, EventBus) {
    let settings = VoiceSettings {
        agent_id: "agent_moto".to_string(),
        endpoint: endpoint.to_string(),
        transport,
    };
    let events = EventBus::default();
    let provider = Arc::new(ConvaiProvider::from_settings(&settings));
    let controller = VoiceSessionController::new(provider, settings, events.clone());
    (Arc::new(controller), events)
}

async fn wait_for_status(controller: &VoiceSessionController, status: VoiceSessionStatus) {
    let mut rx = controller.subscribe();
    timeout(WAIT, rx.wait_for(|s| *s == status))
        .await
        .expect("timed out waiting for voice status")
        .unwrap();
}

async fn next_message(rx: &mut broadcast::Receiver<EngineEvent>) -> (String, String) {
    loop {
        let event = timeout(WAIT, rx.recv()).await.expect("timed out").unwrap();
        if let EngineEvent::VoiceMessage { source, text, .. } = event {
            return (source, text);
        }
    }
}

fn metadata() -> serde_json::Value {
    serde_json::json!({
        "type": "conversation_initiation_metadata",
        "conversation_initiation_metadata_event": {
            "conversation_id": "conv_test",
            "agent_output_audio_format": "pcm_16000"
        }
    })
}

// =============================================================================
// Lifecycle
// =============================================================================

#[tokio::test]
async fn test_session_lifecycle_ended_by_user() {
    let (endpoint, uri_rx, server) = serve_once(|mut socket| async move {
        let init = next_text(&mut socket).await.unwrap();
        send_json(&mut socket, metadata()).await;
        send_json(
            &mut socket,
            serde_json::json!({"type": "ping", "ping_event": {"event_id": 7, "ping_ms": 0}}),
        )
        .await;
        let pong = next_text(&mut socket).await.unwrap();
        send_json(
            &mut socket,
            serde_json::json!({"type": "user_transcript", "user_transcription_event": {"user_transcript": "Yamaha R15 V3 price?"}}),
        )
        .await;
        send_json(
            &mut socket,
            serde_json::json!({"type": "agent_response", "agent_response_event": {"agent_response": "About BDT 450,000."}}),
        )
        .await;
        // Drain until the client closes.
        let trailing = next_text(&mut socket).await;
        (init, pong, trailing)
    })
    .await;

    let (controller, events) = controller(&endpoint, VoiceTransport::Websocket);
    let mut rx = events.subscribe();

    controller.toggle().await.unwrap();
    wait_for_status(&controller, VoiceSessionStatus::Connected).await;

    assert_eq!(
        uri_rx.await.unwrap(),
        "/v1/convai/conversation?agent_id=agent_moto"
    );
    assert_eq!(
        next_message(&mut rx).await,
        ("user".to_string(), "Yamaha R15 V3 price?".to_string())
    );
    assert_eq!(
        next_message(&mut rx).await,
        ("agent".to_string(), "About BDT 450,000.".to_string())
    );

    controller.toggle().await.unwrap();
    assert_eq!(controller.status(), VoiceSessionStatus::Disconnected);

    let (init, pong, trailing) = timeout(WAIT, server).await.unwrap().unwrap();
    let init: serde_json::Value = serde_json::from_str(&init).unwrap();
    assert_eq!(init["type"], "conversation_initiation_client_data");
    let pong: serde_json::Value = serde_json::from_str(&pong).unwrap();
    assert_eq!(pong, serde_json::json!({"type": "pong", "event_id": 7}));
    assert!(trailing.is_none());
}

#[tokio::test]
async fn test_agent_closing_disconnects() {
    let (endpoint, _uri_rx, server) = serve_once(|mut socket| async move {
        next_text(&mut socket).await;
        send_json(&mut socket, metadata()).await;
        socket.close(None).await.unwrap();
    })
    .await;

    let (controller, events) = controller(&endpoint, VoiceTransport::Websocket);
    let mut rx = events.subscribe();

    controller.toggle().await.unwrap();
    timeout(WAIT, server).await.unwrap().unwrap();
    wait_for_status(&controller, VoiceSessionStatus::Disconnected).await;

    let mut seen = Vec::new();
    while let Ok(event) = rx.try_recv() {
        seen.push(event.kind());
    }
    assert!(seen.contains(&"voice_connected"));
    assert!(seen.contains(&"voice_disconnected"));
    assert!(!seen.contains(&"voice_failed"));
}

#[tokio::test]
async fn test_interruption_is_reported() {
    let (endpoint, _uri_rx, _server) = serve_once(|mut socket| async move {
        next_text(&mut socket).await;
        send_json(&mut socket, metadata()).await;
        send_json(&mut socket, serde_json::json!({"type": "interruption"})).await;
        next_text(&mut socket).await;
    })
    .await;

    let (controller, events) = controller(&endpoint, VoiceTransport::Websocket);
    let mut rx = events.subscribe();

    controller.toggle().await.unwrap();
    let (source, _) = next_message(&mut rx).await;
    assert_eq!(source, "interruption");
    controller.end().await;
}

#[tokio::test(start_paused = true)]
async fn test_slow_handshake_completes() {
    const HANDSHAKE_DELAY: Duration = Duration::from_secs(30);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let endpoint = format!("ws://{}/v1/convai/conversation", listener.local_addr().unwrap());
    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        tokio::time::sleep(HANDSHAKE_DELAY).await;
        let mut socket = accept_async(stream).await.unwrap();
        next_text(&mut socket).await;
        send_json(&mut socket, metadata()).await;
        next_text(&mut socket).await;
    });

    let (controller, _events) = controller(&endpoint, VoiceTransport::Websocket);
    let started = tokio::time::Instant::now();

    controller.toggle().await.unwrap();
    assert!(started.elapsed() >= HANDSHAKE_DELAY);

    let mut status = controller.subscribe();
    status
        .wait_for(|s| *s == VoiceSessionStatus::Connected)
        .await
        .unwrap();

    controller.end().await;
    assert_eq!(controller.status(), VoiceSessionStatus::Disconnected);
    server.await.unwrap();
}

// =============================================================================
// Failures
// =============================================================================

#[tokio::test]
async fn test_unreachable_agent_fails_start() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let endpoint = format!("ws://{}/v1/convai/conversation", listener.local_addr().unwrap());
    drop(listener);

    let (controller, events) = controller(&endpoint, VoiceTransport::Websocket);
    let mut rx = events.subscribe();

    let err = controller.toggle().await.unwrap_err();
    assert!(matches!(err, VoiceError::Connect(_)), "got {:?}", err);
    assert_eq!(controller.status(), VoiceSessionStatus::Disconnected);

    let mut kinds = Vec::new();
    while let Ok(event) = rx.try_recv() {
        kinds.push(event.kind());
    }
    assert!(kinds.contains(&"voice_failed"));
}

#[tokio::test]
async fn test_webrtc_transport_is_unsupported() {
    let (controller, _events) = controller("ws://127.0.0.1:9/convai", VoiceTransport::Webrtc);

    let err = controller.toggle().await.unwrap_err();
    assert_eq!(err, VoiceError::Unsupported("webrtc".to_string()));
    assert_eq!(controller.status(), VoiceSessionStatus::Disconnected);
}
