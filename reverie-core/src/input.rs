//! Input capture: pending text and the staged image/audio attachments

use base64::{Engine as _, engine::general_purpose::STANDARD};
use llm::ContentBlock;
use std::fmt;
use std::path::Path;
use tracing::debug;

use crate::error::SessionError;
use crate::persona::{AUDIO_PLACEHOLDER, IMAGE_PLACEHOLDER};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AttachmentKind {
    Image,
    Audio,
}

impl AttachmentKind {
    fn mime_prefix(self) -> &'static str {
        match self {
            AttachmentKind::Image => "image/",
            AttachmentKind::Audio => "audio/",
        }
    }
}

impl fmt::Display for AttachmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttachmentKind::Image => f.write_str("image"),
            AttachmentKind::Audio => f.write_str("audio"),
        }
    }
}

/// A base64 payload with its MIME type, ready to go out as inline data
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attachment {
    pub data: String,
    pub mime_type: String,
}

impl Attachment {
    pub fn new(data: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            mime_type: mime_type.into(),
        }
    }

    pub fn from_bytes(bytes: &[u8], mime_type: impl Into<String>) -> Self {
        Self::new(STANDARD.encode(bytes), mime_type)
    }

    /// Parse `data:<mime>;base64,<payload>`, keeping only the payload.
    pub fn from_data_url(url: &str) -> Result<Self, SessionError> {
        let rest = url
            .strip_prefix("data:")
            .ok_or_else(|| SessionError::Decode("not a data URL".to_string()))?;
        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| SessionError::Decode("data URL has no payload".to_string()))?;
        let mime_type = header
            .strip_suffix(";base64")
            .ok_or_else(|| SessionError::Decode("data URL is not base64-encoded".to_string()))?;
        if mime_type.is_empty() {
            return Err(SessionError::Decode("data URL has no MIME type".to_string()));
        }
        STANDARD
            .decode(payload)
            .map_err(|e| SessionError::Decode(format!("invalid base64 payload: {}", e)))?;

        Ok(Self::new(payload, mime_type))
    }

    pub fn is_kind(&self, kind: AttachmentKind) -> bool {
        self.mime_type.starts_with(kind.mime_prefix())
    }

    fn to_block(&self, kind: AttachmentKind) -> ContentBlock {
        match kind {
            AttachmentKind::Image => ContentBlock::image(&self.data, &self.mime_type),
            AttachmentKind::Audio => ContentBlock::audio(&self.data, &self.mime_type),
        }
    }
}

/// Read a file and encode it as an attachment of the given kind.
/// The MIME type is guessed from the extension and must match the kind.
pub async fn read_attachment(path: &Path, kind: AttachmentKind) -> Result<Attachment, SessionError> {
    let mime = mime_guess::from_path(path).first().ok_or_else(|| {
        SessionError::Decode(format!("unknown file type: {}", path.display()))
    })?;
    let mime_type = mime.essence_str().to_string();
    if !mime_type.starts_with(kind.mime_prefix()) {
        return Err(SessionError::Decode(format!(
            "{} is {}, not an {} file",
            path.display(),
            mime_type,
            kind
        )));
    }

    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| SessionError::Decode(format!("{}: {}", path.display(), e)))?;
    debug!(path = %path.display(), mime_type, bytes = bytes.len(), "Read attachment");

    Ok(Attachment::from_bytes(&bytes, mime_type))
}

/// Everything staged for the next send
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PendingInput {
    pub text: String,
    pub image: Option<Attachment>,
    pub audio: Option<Attachment>,
}

impl PendingInput {
    pub fn trimmed_text(&self) -> &str {
        self.text.trim()
    }

    /// Nothing to send: blank text and no attachments
    pub fn is_empty(&self) -> bool {
        self.trimmed_text().is_empty() && self.image.is_none() && self.audio.is_none()
    }

    pub fn attachment(&self, kind: AttachmentKind) -> Option<&Attachment> {
        match kind {
            AttachmentKind::Image => self.image.as_ref(),
            AttachmentKind::Audio => self.audio.as_ref(),
        }
    }

    pub(crate) fn slot_mut(&mut self, kind: AttachmentKind) -> &mut Option<Attachment> {
        match kind {
            AttachmentKind::Image => &mut self.image,
            AttachmentKind::Audio => &mut self.audio,
        }
    }

    /// Text for the visible user message: the trimmed text, or a placeholder
    /// naming the attachment when there is no text
    pub fn display_text(&self) -> String {
        let text = self.trimmed_text();
        if !text.is_empty() {
            text.to_string()
        } else if self.image.is_some() {
            IMAGE_PLACEHOLDER.to_string()
        } else {
            AUDIO_PLACEHOLDER.to_string()
        }
    }

    /// Parts for the model: text first, then image, then audio
    pub fn to_parts(&self) -> Vec<ContentBlock> {
        let mut parts = Vec::new();
        let text = self.trimmed_text();
        if !text.is_empty() {
            parts.push(ContentBlock::text(text));
        }
        for kind in [AttachmentKind::Image, AttachmentKind::Audio] {
            if let Some(attachment) = self.attachment(kind) {
                parts.push(attachment.to_block(kind));
            }
        }
        parts
    }

    /// Attachment kinds currently staged
    pub fn staged_kinds(&self) -> Vec<AttachmentKind> {
        [AttachmentKind::Image, AttachmentKind::Audio]
            .into_iter()
            .filter(|kind| self.attachment(*kind).is_some())
            .collect()
    }
}
