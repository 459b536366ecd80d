use async_trait::async_trait;
use futures::stream::Stream;
use std::pin::Pin;
use std::sync::Arc;

pub mod api;
mod client;
pub mod providers;
pub mod traffic_log;
pub use api::*;
pub use providers::{DEFAULT_BASE_URL, GeminiChatModel, GeminiProvider};

/// Incremental model output. Items arrive in generation order; an `Err` item
/// means the transport failed mid-stream.
pub type ChatStream = Pin<Box<dyn Stream<Item = anyhow::Result<ChatChunk>> + Send>>;

/// What a listed model can be asked to do
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ModelCapability {
    /// Multimodal turns: text plus inline images and audio
    Chat,
    /// Incremental output over server-sent events
    Streaming,
}

#[derive(Clone, Debug)]
pub struct ModelDefinition {
    pub id: String,
    pub display_name: Option<String>,
    pub input_token_limit: Option<u32>,
    pub capabilities: Vec<ModelCapability>,
}

impl ModelDefinition {
    /// Get the display name, falling back to id if not set
    pub fn name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.id)
    }

    pub fn has_capability(&self, capability: ModelCapability) -> bool {
        self.capabilities.contains(&capability)
    }

    /// Whether a session can run on this model in the given mode
    pub fn supports_session(&self, streaming: bool) -> bool {
        self.has_capability(ModelCapability::Chat)
            && (!streaming || self.has_capability(ModelCapability::Streaming))
    }
}

#[async_trait]
pub trait ChatModel {
    fn name(&self) -> &str;

    /// One request, one complete reply
    async fn chat(&self, request: &ChatRequest) -> anyhow::Result<ChatMessage>;

    /// One request, the reply delivered as it is generated
    async fn stream_chat(&self, request: &ChatRequest) -> anyhow::Result<ChatStream>;
}

#[async_trait]
impl ChatModel for Arc<dyn ChatModel + Send + Sync> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn chat(&self, request: &ChatRequest) -> anyhow::Result<ChatMessage> {
        (**self).chat(request).await
    }

    async fn stream_chat(&self, request: &ChatRequest) -> anyhow::Result<ChatStream> {
        (**self).stream_chat(request).await
    }
}

#[async_trait]
pub trait ModelProvider {
    /// Models reachable with the configured key, across all result pages
    async fn list_models(&self) -> anyhow::Result<Vec<ModelDefinition>>;

    fn create_chat_model(&self, model_name: &str) -> Option<Arc<dyn ChatModel + Send + Sync>>;
}
