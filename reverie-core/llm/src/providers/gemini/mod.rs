pub(crate) mod chat;
mod provider;

pub use chat::GeminiChatModel;
pub use provider::{DEFAULT_BASE_URL, GeminiProvider};
