//! Traffic logging for LLM API calls
//!
//! Requests and responses are summarised under the `reverie::traffic` target.
//! Content is truncated so inline attachments and private text never land in logs whole.

use tracing::{info, warn};

/// Maximum characters to log for content
const MAX_CONTENT_LOG_CHARS: usize = 200;

/// Truncate a string for logging, adding ellipsis if truncated
pub fn truncate_for_log(s: &str, max_chars: usize) -> String {
    let char_count = s.chars().count();
    if char_count <= max_chars {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max_chars).collect();
        format!("{}... ({} chars total)", truncated, char_count)
    }
}

fn summarize(value: &impl serde::Serialize) -> String {
    let json = serde_json::to_string(value).unwrap_or_else(|_| "<serialization error>".to_string());
    truncate_for_log(&json, MAX_CONTENT_LOG_CHARS)
}

/// Log an LLM request (truncated summary only)
pub fn log_request(model: &str, request: &impl serde::Serialize) {
    info!(target: "reverie::traffic", model, kind = "REQUEST", "{}", summarize(request));
}

/// Log an LLM response (truncated summary only)
pub fn log_response(model: &str, response: &impl serde::Serialize) {
    info!(target: "reverie::traffic", model, kind = "RESPONSE", "{}", summarize(response));
}

/// Log an LLM error
pub fn log_error(model: &str, error: &str) {
    warn!(target: "reverie::traffic", model, kind = "ERROR", "{}", error);
}

/// Log an LLM streaming start (truncated summary only)
pub fn log_stream_start(model: &str, request: &impl serde::Serialize) {
    info!(target: "reverie::traffic", model, kind = "STREAM_START", "{}", summarize(request));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_short_string_unchanged() {
        assert_eq!(truncate_for_log("hello", 10), "hello");
    }

    #[test]
    fn test_truncate_counts_chars_not_bytes() {
        let text = "精神分析".repeat(3);
        let truncated = truncate_for_log(&text, 4);
        assert_eq!(truncated, "精神分析... (12 chars total)");
    }
}
