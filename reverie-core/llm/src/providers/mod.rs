pub(crate) mod gemini;

pub use gemini::{DEFAULT_BASE_URL, GeminiChatModel, GeminiProvider};
