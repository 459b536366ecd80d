//! The canonical conversation log.
//!
//! Every turn the user sees is recorded once, with a status. The visible
//! message list and the model context are both derived from this log, so they
//! can only differ in ways the statuses make explicit.

use llm::{ChatMessage, ChatPayload, ContentBlock};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MessageRole {
    User,
    Model,
}

/// Display record for one bubble in the conversation
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn model(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Model,
            content: content.into(),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TurnStatus {
    /// Sent or still streaming; a pending user turn is part of the context
    Pending,
    /// Part of the model context
    Committed,
    /// Visible only
    Failed,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Turn {
    pub role: MessageRole,
    pub parts: Vec<ContentBlock>,
    pub display: String,
    pub status: TurnStatus,
}

impl Turn {
    fn in_context(&self) -> bool {
        match self.status {
            TurnStatus::Committed => true,
            TurnStatus::Pending => self.role == MessageRole::User,
            TurnStatus::Failed => false,
        }
    }

    fn to_chat_message(&self) -> ChatMessage {
        let payload = ChatPayload::new(self.parts.clone());
        match self.role {
            MessageRole::User => ChatMessage::user(payload),
            MessageRole::Model => ChatMessage::assistant(payload),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct TurnLog {
    turns: Vec<Turn>,
}

impl TurnLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Record a user turn as pending and return its index
    pub fn push_user(&mut self, parts: Vec<ContentBlock>, display: impl Into<String>) -> usize {
        self.push(Turn {
            role: MessageRole::User,
            parts,
            display: display.into(),
            status: TurnStatus::Pending,
        })
    }

    /// Record a text-only model turn and return its index
    pub fn push_model(&mut self, text: impl Into<String>, status: TurnStatus) -> usize {
        let text = text.into();
        self.push(Turn {
            role: MessageRole::Model,
            parts: vec![ContentBlock::text(text.clone())],
            display: text,
            status,
        })
    }

    fn push(&mut self, turn: Turn) -> usize {
        self.turns.push(turn);
        self.turns.len() - 1
    }

    /// Append streamed text to a model turn, keeping display and parts in step
    pub fn append_text(&mut self, index: usize, delta: &str) {
        let Some(turn) = self.turns.get_mut(index) else {
            return;
        };
        turn.display.push_str(delta);
        match turn.parts.last_mut() {
            Some(ContentBlock::Text { text }) => text.push_str(delta),
            _ => turn.parts.push(ContentBlock::text(delta)),
        }
    }

    pub fn set_status(&mut self, index: usize, status: TurnStatus) {
        if let Some(turn) = self.turns.get_mut(index) {
            turn.status = status;
        }
    }

    /// Everything the user has seen, in order
    pub fn messages(&self) -> Vec<Message> {
        self.turns
            .iter()
            .map(|turn| Message {
                role: turn.role,
                content: turn.display.clone(),
            })
            .collect()
    }

    /// What the model is given: committed turns plus the pending user turn
    pub fn context(&self) -> Vec<ChatMessage> {
        self.turns
            .iter()
            .filter(|turn| turn.in_context())
            .map(Turn::to_chat_message)
            .collect()
    }
}
