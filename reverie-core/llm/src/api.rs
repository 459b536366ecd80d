use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, Deserialize, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    #[default]
    Assistant,
    System,
}

/// One part of a turn: plain text or a base64-encoded attachment.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { text: String },
    Image { data: String, mime_type: String },
    Audio { data: String, mime_type: String },
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        ContentBlock::Text { text: text.into() }
    }

    pub fn image(data: impl Into<String>, mime_type: impl Into<String>) -> Self {
        ContentBlock::Image {
            data: data.into(),
            mime_type: mime_type.into(),
        }
    }

    pub fn audio(data: impl Into<String>, mime_type: impl Into<String>) -> Self {
        ContentBlock::Audio {
            data: data.into(),
            mime_type: mime_type.into(),
        }
    }
}

/// The ordered parts of one turn
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize, Default)]
pub struct ChatPayload {
    pub content: Vec<ContentBlock>,
}

impl ChatPayload {
    pub fn new(content: Vec<ContentBlock>) -> Self {
        ChatPayload { content }
    }

    pub fn text(text: impl Into<String>) -> Self {
        ChatPayload {
            content: vec![ContentBlock::text(text)],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    pub fn get_text(&self) -> String {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize, Default)]
pub struct ChatMessage {
    #[serde(default)]
    pub role: Role,
    #[serde(flatten)]
    pub payload: ChatPayload,
}

impl ChatMessage {
    pub fn new(role: Role, payload: ChatPayload) -> Self {
        Self { role, payload }
    }

    pub fn user(payload: ChatPayload) -> Self {
        Self::new(Role::User, payload)
    }

    pub fn assistant(payload: ChatPayload) -> Self {
        Self::new(Role::Assistant, payload)
    }

    pub fn system(payload: ChatPayload) -> Self {
        Self::new(Role::System, payload)
    }

    pub fn get_text(&self) -> String {
        self.payload.get_text()
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ChatChunk {
    pub role: Role,
    #[serde(flatten)]
    pub payload: ChatPayload,
}

impl ChatChunk {
    pub fn new(role: Role, payload: ChatPayload) -> Self {
        Self { role, payload }
    }

    pub fn assistant(payload: ChatPayload) -> Self {
        Self::new(Role::Assistant, payload)
    }

    pub fn get_text(&self) -> String {
        self.payload.get_text()
    }
}

impl From<ChatChunk> for ChatMessage {
    fn from(chunk: ChatChunk) -> Self {
        ChatMessage {
            role: chunk.role,
            payload: chunk.payload,
        }
    }
}

#[derive(Copy, Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
pub enum HarmCategory {
    #[serde(rename = "HARM_CATEGORY_HARASSMENT")]
    Harassment,
    #[serde(rename = "HARM_CATEGORY_HATE_SPEECH")]
    HateSpeech,
    #[serde(rename = "HARM_CATEGORY_SEXUALLY_EXPLICIT")]
    SexuallyExplicit,
    #[serde(rename = "HARM_CATEGORY_DANGEROUS_CONTENT")]
    DangerousContent,
}

impl HarmCategory {
    pub const ALL: [HarmCategory; 4] = [
        HarmCategory::Harassment,
        HarmCategory::HateSpeech,
        HarmCategory::SexuallyExplicit,
        HarmCategory::DangerousContent,
    ];
}

#[derive(Copy, Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HarmBlockThreshold {
    BlockNone,
    BlockOnlyHigh,
    BlockMediumAndAbove,
    BlockLowAndAbove,
}

#[derive(Copy, Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
pub struct SafetySetting {
    pub category: HarmCategory,
    pub threshold: HarmBlockThreshold,
}

impl SafetySetting {
    /// One `BLOCK_NONE` override per harm category
    pub fn permit_all() -> Vec<SafetySetting> {
        HarmCategory::ALL
            .iter()
            .map(|&category| SafetySetting {
                category,
                threshold: HarmBlockThreshold::BlockNone,
            })
            .collect()
    }
}

/// Fixed per-session call configuration sent alongside the history.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize, Default)]
pub struct GenerationConfig {
    pub system_instruction: Option<String>,
    #[serde(default)]
    pub safety_settings: Vec<SafetySetting>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ChatRequest {
    pub(crate) messages: Vec<ChatMessage>,
    pub(crate) config: GenerationConfig,
}

impl ChatRequest {
    /// Create a new chat request from an iterator of message references
    ///
    /// This accepts any iterator that yields `&ChatMessage`:
    /// - `&[ChatMessage]` - slice
    /// - `Vec<&ChatMessage>` - vector of references
    ///
    /// Messages are cloned only once when constructing the request.
    pub fn new<'a>(messages: impl IntoIterator<Item = &'a ChatMessage>) -> Self {
        ChatRequest {
            messages: messages.into_iter().cloned().collect(),
            config: GenerationConfig::default(),
        }
    }

    /// Create a chat request carrying a system instruction and safety settings
    pub fn with_config(messages: Vec<ChatMessage>, config: GenerationConfig) -> Self {
        ChatRequest { messages, config }
    }

    /// Get a reference to the messages
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_payload_text() {
        let payload = ChatPayload::text("Hello, world!");
        assert_eq!(payload.get_text(), "Hello, world!");
        assert_eq!(payload.content.len(), 1);
        assert!(matches!(payload.content[0], ContentBlock::Text { .. }));
    }

    #[test]
    fn test_chat_payload_mixed_content_keeps_order() {
        let payload = ChatPayload::new(vec![
            ContentBlock::text("look"),
            ContentBlock::image("aW1n", "image/png"),
            ContentBlock::audio("YXVk", "audio/wav"),
        ]);

        assert_eq!(payload.get_text(), "look");
        assert!(matches!(&payload.content[1], ContentBlock::Image { mime_type, .. } if mime_type == "image/png"));
        assert!(matches!(&payload.content[2], ContentBlock::Audio { data, .. } if data == "YXVk"));
    }

    #[test]
    fn test_chat_message_constructors() {
        let payload = ChatPayload::text("Test");

        let user_msg = ChatMessage::user(payload.clone());
        assert_eq!(user_msg.role, Role::User);
        assert_eq!(user_msg.get_text(), "Test");

        let assistant_msg = ChatMessage::assistant(payload.clone());
        assert_eq!(assistant_msg.role, Role::Assistant);

        let system_msg = ChatMessage::system(payload);
        assert_eq!(system_msg.role, Role::System);
    }

    #[test]
    fn test_chat_request_new() {
        let messages = vec![ChatMessage::user(ChatPayload::text("Hello"))];
        let request = ChatRequest::new(&messages);

        assert_eq!(request.messages().len(), 1);
        assert!(request.config().system_instruction.is_none());
        assert!(request.config().safety_settings.is_empty());
    }

    #[test]
    fn test_permit_all_covers_every_category() {
        let settings = SafetySetting::permit_all();
        assert_eq!(settings.len(), HarmCategory::ALL.len());
        assert!(settings.iter().all(|s| s.threshold == HarmBlockThreshold::BlockNone));

        let json = serde_json::to_string(&settings[0]).unwrap();
        assert_eq!(
            json,
            r#"{"category":"HARM_CATEGORY_HARASSMENT","threshold":"BLOCK_NONE"}"#
        );
    }

    #[test]
    fn test_content_block_serialization() {
        let text_block = ContentBlock::text("Hello");
        let json = serde_json::to_string(&text_block).unwrap();
        assert!(json.contains("\"type\":\"text\""));
        assert!(json.contains("\"text\":\"Hello\""));
    }
}
