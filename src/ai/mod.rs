/// Completion backends for the coach
///
/// Every backend sends the full transcript with streaming enabled and hands
/// back a lazy stream of reply deltas in arrival order.
///
/// # Backends
///
/// - `deepseek` - hosted OpenAI-compatible chat completions over SSE
/// - `ollama` - local Ollama server over JSON lines
///
/// The backend is picked from [`ProviderConfig`]; see [`backend_from_config`].
pub mod deepseek;
pub mod framing;
pub mod ollama;

use crate::config::ProviderConfig;
use crate::types::ChatMessage;
use async_trait::async_trait;
use futures::stream::BoxStream;
use std::sync::Arc;

pub use deepseek::DeepSeekBackend;
pub use ollama::OllamaBackend;

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("completion transport failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("completion endpoint returned {status}: {body}")]
    Api {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("completion stream reported an error: {0}")]
    Remote(String),
    #[error("malformed completion payload: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("completion backend not configured: {0}")]
    NotConfigured(String),
}

pub type ChatResult<T> = Result<T, ChatError>;

/// Reply fragments in arrival order. Finite and not restartable.
pub type DeltaStream = BoxStream<'static, ChatResult<String>>;

#[derive(Clone, Copy, Debug)]
pub struct CompletionRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [ChatMessage],
    pub temperature: f32,
}

#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Starts a streamed completion. Errors before the first byte (bad
    /// status, missing key) come back here; later ones arrive in the stream.
    async fn stream(&self, request: CompletionRequest<'_>) -> ChatResult<DeltaStream>;
}

pub fn backend_from_config(provider: &ProviderConfig) -> Arc<dyn CompletionBackend> {
    match provider {
        ProviderConfig::DeepSeek {
            base_url, api_key, ..
        } => Arc::new(DeepSeekBackend::new(base_url.clone(), api_key.clone())),
        ProviderConfig::Ollama { endpoint, .. } => Arc::new(OllamaBackend::new(endpoint.clone())),
    }
}
