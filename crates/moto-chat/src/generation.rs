//! Text-generation provider boundary.

use async_trait::async_trait;

use crate::error::GenerationError;

/// Opaque request/response language-model call.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate a completion for `prompt` with `model`.
    async fn generate(&self, model: &str, prompt: &str) -> Result<String, GenerationError>;
}

#[async_trait]
impl<T: TextGenerator + ?Sized> TextGenerator for std::sync::Arc<T> {
    async fn generate(&self, model: &str, prompt: &str) -> Result<String, GenerationError> {
        (**self).generate(model, prompt).await
    }
}
