//! Shared types, configuration, errors, and events for the Moto engine.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;
pub mod types;

pub use config::{GenerationSettings, MotoConfig, Settings, VoiceSettings, VoiceTransport};
pub use error::{MotoError, Result};
pub use events::{EngineEvent, EventBus};
pub use types::*;
