//! Moto terminal front-end - composition root.
//!
//! 1. Load configuration from TOML, `.env`, and CLI flags
//! 2. Resolve provider credentials from the environment
//! 3. Wire the identity gate, text pipeline, and voice controller into the surface
//! 4. Run a line-oriented REPL over stdin

use std::sync::{Arc, Weak};

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;

use moto_app::cli::CliArgs;
use moto_app::repl::{Command, HELP, THINKING};
use moto_app::surface::{ChatRoom, InteractionSurface, RoomServices, SurfaceView};
use moto_auth::{IdentityGate, InMemoryIdentityProvider};
use moto_chat::{render_plain, GeminiGenerator};
use moto_core::config::{MotoConfig, Settings};
use moto_core::events::{EngineEvent, EventBus};
use moto_core::types::{ChatTurn, Speaker, VoiceSessionStatus};
use moto_voice::ConvaiProvider;

fn print_turn(turn: &ChatTurn) {
    let who = match turn.speaker() {
        Speaker::User => "You",
        Speaker::Assistant => "Specialist",
    };
    println!("{}: {}\n", who, render_plain(turn.text()));
}

fn show(view: &SurfaceView) {
    match view {
        SurfaceView::Loading => println!("Loading..."),
        SurfaceView::SignIn => {
            println!("Please sign in: /login <email> <password> or /register <email> <password>")
        }
        SurfaceView::Chat(chat) => {
            for turn in &chat.turns {
                print_turn(turn);
            }
            if chat.pending {
                println!("{}", THINKING);
            }
            if chat.voice == VoiceSessionStatus::Connected {
                println!("[voice: live]");
            }
        }
    }
}

/// Drain the event bus into the log.
async fn log_events(mut rx: broadcast::Receiver<EngineEvent>) {
    loop {
        match rx.recv().await {
            Ok(event) => {
                tracing::debug!(kind = event.kind(), at = %event.timestamp(), event = ?event, "Engine event")
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Event logger lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

/// Print answers and voice activity as they arrive.
async fn print_updates(surface: Arc<InteractionSurface>, mut rx: broadcast::Receiver<EngineEvent>) {
    let mut room: Weak<ChatRoom> = Weak::new();
    // The greeting is printed when the room is first shown.
    let mut printed = 1;

    loop {
        let event = match rx.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(_)) => continue,
            Err(broadcast::error::RecvError::Closed) => break,
        };

        match event {
            EngineEvent::QueryResolved { .. } | EngineEvent::QueryFailed { .. } => {
                let Some(current) = surface.room() else {
                    continue;
                };
                if !Weak::ptr_eq(&room, &Arc::downgrade(&current)) {
                    room = Arc::downgrade(&current);
                    printed = 1;
                }
                let fresh = current.turns_since(printed);
                printed += fresh.len();
                for turn in fresh.iter().filter(|t| t.speaker() == Speaker::Assistant) {
                    print_turn(turn);
                }
                if current.is_pending() {
                    println!("{}", THINKING);
                }
            }
            EngineEvent::VoiceStatusChanged { to, .. } => println!("[voice: {}]", to),
            EngineEvent::VoiceMessage { source, text, .. } => println!("[voice {}] {}", source, text),
            EngineEvent::VoiceFailed { reason, .. } => println!("[voice failed] {}", reason),
            _ => {}
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();
    // A missing .env is fine; real environment variables take precedence.
    let _ = dotenvy::dotenv();

    // Config.
    let config_file = args.resolve_config_path();
    let mut config = MotoConfig::load_or_default(&config_file);
    config.generation.model = args.resolve_model(&config.generation.model);

    // Tracing.
    moto_core::logging::init(&args.resolve_log_level(&config.general.log_level))?;
    tracing::info!("Starting Moto v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_file.display(), "Configuration loaded");

    let settings = match Settings::resolve(&config, |key| std::env::var(key).ok()) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Missing provider credentials");
            return Err(e.into());
        }
    };

    let events = EventBus::default();
    tokio::spawn(log_events(events.subscribe()));

    // === Services ===

    let generator = GeminiGenerator::new(&settings.generation)?;
    let services = RoomServices {
        generator: Arc::new(generator),
        voice: Arc::new(ConvaiProvider::from_settings(&settings.voice)),
        model: settings.generation.model.clone(),
        voice_settings: settings.voice.clone(),
        events: events.clone(),
    };
    tracing::info!(model = %services.model, transport = %settings.voice.transport, "Services ready");

    // Accounts live for the lifetime of the process.
    let identity_provider = Arc::new(InMemoryIdentityProvider::new());
    let gate = IdentityGate::new(identity_provider, events.clone());
    let surface = Arc::new(InteractionSurface::new(gate, services));
    let _watcher = surface.watch_identity();

    surface.gate().resolved().await;
    surface.sync_identity().await;
    tokio::spawn(print_updates(Arc::clone(&surface), events.subscribe()));

    // === REPL ===

    println!("{}\n", HELP);
    show(&surface.view());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match Command::parse(&line) {
            Command::Empty => {}
            Command::Help => println!("{}", HELP),
            Command::Quit => break,
            Command::Unknown(name) => println!("Unknown command {}. Type /help.", name),
            Command::Login { email, secret } => match surface.login(&email, &secret).await {
                Ok(identity) => {
                    println!("Signed in as {}\n", identity.email());
                    show(&surface.view());
                }
                Err(e) => println!("{}", e),
            },
            Command::Register { email, secret } => match surface.register(&email, &secret).await {
                Ok(identity) => {
                    println!("Account created for {}\n", identity.email());
                    show(&surface.view());
                }
                Err(e) => println!("{}", e),
            },
            Command::Logout => {
                surface.logout().await;
                show(&surface.view());
            }
            Command::Voice => match surface.room() {
                Some(room) => {
                    tokio::spawn(async move {
                        if let Err(e) = room.toggle_voice().await {
                            println!("Voice agent unavailable: {}", e);
                        }
                    });
                }
                None => show(&surface.view()),
            },
            Command::Utterance(text) => match surface.room() {
                Some(room) => {
                    println!("{}", THINKING);
                    tokio::spawn(async move {
                        room.ask(&text).await;
                    });
                }
                None => show(&surface.view()),
            },
        }
    }

    if let Some(room) = surface.room() {
        room.voice().end().await;
    }
    tracing::info!("Moto stopped");
    Ok(())
}
