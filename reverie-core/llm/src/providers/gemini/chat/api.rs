use serde::{Deserialize, Serialize};

use crate::{ChatChunk, ChatMessage, ChatPayload, ChatRequest, ContentBlock, SafetySetting};

/// Finish reasons that mean the model withheld its answer.
const BLOCKING_FINISH_REASONS: &[&str] = &["SAFETY", "PROHIBITED_CONTENT", "BLOCKLIST", "SPII"];

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ModelDefinition {
    pub(crate) name: String,

    #[serde(default)]
    pub(crate) display_name: Option<String>,

    #[serde(default)]
    pub(crate) input_token_limit: Option<u32>,

    #[serde(default)]
    pub(crate) supported_generation_methods: Option<Vec<String>>,
}

impl From<ModelDefinition> for crate::ModelDefinition {
    fn from(model: ModelDefinition) -> Self {
        let mut capabilities = Vec::new();
        for method in model.supported_generation_methods.iter().flatten() {
            let capability = match method.as_str() {
                "generateContent" => crate::ModelCapability::Chat,
                "streamGenerateContent" => crate::ModelCapability::Streaming,
                _ => continue,
            };
            if !capabilities.contains(&capability) {
                capabilities.push(capability);
            }
        }

        let id = match model.name.strip_prefix("models/") {
            Some(id) => id.to_string(),
            None => model.name,
        };

        crate::ModelDefinition {
            id,
            display_name: model.display_name,
            input_token_limit: model.input_token_limit,
            capabilities,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ListModelsResponse {
    #[serde(default)]
    pub(crate) models: Vec<ModelDefinition>,

    pub(crate) next_page_token: Option<String>,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    #[default]
    Model,
}

impl TryFrom<crate::api::Role> for Role {
    type Error = anyhow::Error;

    fn try_from(value: crate::api::Role) -> Result<Self, Self::Error> {
        match value {
            crate::api::Role::User => Ok(Role::User),
            crate::api::Role::Assistant => Ok(Role::Model),
            crate::api::Role::System => Err(anyhow::anyhow!(
                "Gemini does not support system messages directly."
            )),
        }
    }
}

impl From<Role> for crate::api::Role {
    fn from(value: Role) -> Self {
        match value {
            Role::User => crate::api::Role::User,
            Role::Model => crate::api::Role::Assistant,
        }
    }
}

/// Gemini inline data for images/audio
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct InlineData {
    pub(crate) mime_type: String,
    pub(crate) data: String, // base64-encoded
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) enum PartType {
    Text(String),
    InlineData(InlineData),
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub(crate) struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) thought: Option<bool>,

    #[serde(flatten)]
    pub(crate) data: PartType,

    #[serde(flatten)]
    pub(crate) extra: Option<serde_json::Value>,
}

impl Part {
    pub fn new_text(text: String) -> Self {
        Part {
            thought: None,
            data: PartType::Text(text),
            extra: None,
        }
    }

    pub fn new_inline(data: String, mime_type: String) -> Self {
        Part {
            thought: None,
            data: PartType::InlineData(InlineData { mime_type, data }),
            extra: None,
        }
    }
}

impl From<&Part> for Option<ContentBlock> {
    fn from(part: &Part) -> Self {
        // Thought summaries are reasoning traces, not reply text
        if part.thought == Some(true) {
            return None;
        }
        match &part.data {
            PartType::Text(t) => Some(ContentBlock::text(t.clone())),
            PartType::InlineData(data) => {
                if data.mime_type.starts_with("image/") {
                    Some(ContentBlock::image(data.data.clone(), data.mime_type.clone()))
                } else if data.mime_type.starts_with("audio/") {
                    Some(ContentBlock::audio(data.data.clone(), data.mime_type.clone()))
                } else {
                    None
                }
            }
        }
    }
}

impl From<&ContentBlock> for Part {
    fn from(block: &ContentBlock) -> Self {
        match block {
            ContentBlock::Text { text } => Part::new_text(text.clone()),
            ContentBlock::Image { data, mime_type } | ContentBlock::Audio { data, mime_type } => {
                Part::new_inline(data.clone(), mime_type.clone())
            }
        }
    }
}

// Gemini representation of messages.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub(crate) struct Content {
    #[serde(default)]
    pub(crate) role: Role,
    #[serde(default)]
    pub(crate) parts: Vec<Part>,
}

impl Content {
    fn blocks(&self) -> Vec<ContentBlock> {
        self.parts
            .iter()
            .filter_map(|p| Option::<ContentBlock>::from(p))
            .collect()
    }
}

impl TryFrom<&ChatMessage> for Content {
    type Error = anyhow::Error;

    fn try_from(msg: &ChatMessage) -> Result<Self, Self::Error> {
        Ok(Content {
            role: msg.role.try_into()?,
            parts: msg.payload.content.iter().map(Part::from).collect(),
        })
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerateContentRequest {
    pub(crate) contents: Vec<Content>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) system_instruction: Option<Content>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub(crate) safety_settings: Vec<SafetySetting>,
}

impl From<&ChatRequest> for GenerateContentRequest {
    fn from(request: &ChatRequest) -> Self {
        // The configured instruction comes first, then any inline system messages.
        let mut system_parts: Vec<Part> = request
            .config
            .system_instruction
            .iter()
            .map(|text| Part::new_text(text.clone()))
            .collect();
        system_parts.extend(
            request
                .messages
                .iter()
                .filter(|m| m.role == crate::api::Role::System)
                .flat_map(|m| m.payload.content.iter().map(Part::from)),
        );

        // System messages fail the role conversion and are left out of `contents`.
        let contents = request
            .messages
            .iter()
            .filter_map(|msg| Content::try_from(msg).ok())
            .collect();

        GenerateContentRequest {
            contents,
            system_instruction: (!system_parts.is_empty()).then(|| Content {
                role: Role::User, // Role is ignored for system instructions
                parts: system_parts,
            }),
            safety_settings: request.config.safety_settings.clone(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Candidate {
    #[serde(default)]
    pub(crate) content: Option<Content>,

    #[serde(default)]
    pub(crate) finish_reason: Option<String>,

    #[serde(flatten)]
    pub(crate) extra: Option<serde_json::Value>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PromptFeedback {
    #[serde(default)]
    pub(crate) block_reason: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerateContentResponse {
    #[serde(default)]
    pub(crate) candidates: Vec<Candidate>,

    #[serde(default)]
    pub(crate) prompt_feedback: Option<PromptFeedback>,

    #[serde(flatten)]
    pub(crate) extra: Option<serde_json::Value>,
}

impl GenerateContentResponse {
    /// Take the first candidate's visible content.
    ///
    /// A blocked prompt, or a candidate withheld for a safety reason, is an error.
    /// A response without candidates is an empty chunk, which streaming
    /// callers skip and batch callers treat as an empty reply.
    pub(crate) fn into_chunk(self) -> anyhow::Result<ChatChunk> {
        if let Some(reason) = self
            .prompt_feedback
            .as_ref()
            .and_then(|feedback| feedback.block_reason.as_deref())
        {
            anyhow::bail!("Prompt blocked by the model: {}", reason);
        }

        let Some(candidate) = self.candidates.into_iter().next() else {
            return Ok(ChatChunk::assistant(ChatPayload::default()));
        };

        let blocks = candidate
            .content
            .as_ref()
            .map(Content::blocks)
            .unwrap_or_default();

        if blocks.is_empty() {
            if let Some(reason) = candidate
                .finish_reason
                .as_deref()
                .filter(|reason| BLOCKING_FINISH_REASONS.contains(reason))
            {
                anyhow::bail!("Response blocked by the model: {}", reason);
            }
        }

        Ok(ChatChunk::assistant(ChatPayload::new(blocks)))
    }

    pub(crate) fn into_message(self) -> anyhow::Result<ChatMessage> {
        self.into_chunk().map(ChatMessage::from)
    }
}
