//! Text side of the motorbike specialist.
//!
//! Holds the per-room conversation log, the prompt, the generation provider
//! boundary, and the pipeline that turns an utterance into an answer turn.

pub mod error;
pub mod gemini;
pub mod generation;
pub mod pipeline;
pub mod prompt;
pub mod render;
pub mod store;

pub use error::GenerationError;
pub use gemini::GeminiGenerator;
pub use generation::TextGenerator;
pub use pipeline::{AskOutcome, TextQueryPipeline};
pub use render::{render_markup, render_plain};
pub use store::{MessageStore, GREETING};
