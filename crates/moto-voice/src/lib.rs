//! Streaming voice session control for the motorbike specialist.
//!
//! A [`VoiceSessionController`] owns the session status
//! (Disconnected -> Connecting -> Connected) and drives a [`VoiceProvider`].
//! Providers report back through a [`SessionReporter`]; reports from a
//! superseded session are ignored.

pub mod controller;
pub mod convai;
pub mod error;
pub mod provider;
pub mod state;

pub use controller::{SessionReporter, VoiceSessionController};
pub use convai::ConvaiProvider;
pub use error::VoiceError;
pub use provider::{SessionHandle, SessionRequest, VoiceProvider};
