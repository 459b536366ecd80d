use super::api::{GenerateContentRequest, GenerateContentResponse};
use crate::client::Client;
use crate::traffic_log;
use crate::{ChatMessage, ChatModel, ChatRequest, ChatStream};
use async_trait::async_trait;
use futures::StreamExt;

#[derive(Copy, Clone, Debug)]
enum Method {
    Generate,
    StreamGenerate,
}

impl Method {
    fn suffix(self) -> &'static str {
        match self {
            Method::Generate => ":generateContent",
            Method::StreamGenerate => ":streamGenerateContent?alt=sse",
        }
    }
}

/// Payload of one server-sent event line; other SSE fields are ignored
fn sse_data(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(str::trim_start)
}

pub struct GeminiChatModel {
    client: Client,
    base_url: String,
    model_name: String,
}

impl GeminiChatModel {
    pub fn new(client: Client, base_url: String, model_name: String) -> Self {
        GeminiChatModel {
            client,
            base_url,
            model_name,
        }
    }

    /// Accepts both `gemini-3-flash-preview` and `models/gemini-3-flash-preview`
    fn url(&self, method: Method) -> String {
        let id = self
            .model_name
            .strip_prefix("models/")
            .unwrap_or(&self.model_name);
        format!("{}/models/{}{}", self.base_url, id, method.suffix())
    }

    fn record_failure(&self, error: anyhow::Error) -> anyhow::Error {
        traffic_log::log_error(&self.model_name, &format!("{:#}", error));
        error
    }
}

#[async_trait]
impl ChatModel for GeminiChatModel {
    fn name(&self) -> &str {
        &self.model_name
    }

    async fn chat(&self, request: &ChatRequest) -> anyhow::Result<ChatMessage> {
        let body = GenerateContentRequest::from(request);
        traffic_log::log_request(&self.model_name, &body);

        let response: GenerateContentResponse = self
            .client
            .post(self.url(Method::Generate), &body)
            .await
            .map_err(|e| self.record_failure(e))?;
        traffic_log::log_response(&self.model_name, &response);

        response.into_message().map_err(|e| self.record_failure(e))
    }

    async fn stream_chat(&self, request: &ChatRequest) -> anyhow::Result<ChatStream> {
        let body = GenerateContentRequest::from(request);
        traffic_log::log_stream_start(&self.model_name, &body);

        let events = self
            .client
            .post_stream(self.url(Method::StreamGenerate), &body, sse_data)
            .await
            .map_err(|e| self.record_failure(e))?;

        Ok(Box::pin(events.map(
            |event: anyhow::Result<GenerateContentResponse>| {
                event.and_then(GenerateContentResponse::into_chunk)
            },
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(name: &str) -> GeminiChatModel {
        let client = Client::with_headers(Default::default()).unwrap();
        GeminiChatModel::new(client, "http://localhost/v1beta".to_string(), name.to_string())
    }

    #[test]
    fn test_url_with_and_without_models_prefix() {
        assert_eq!(
            model("gemini-3-flash-preview").url(Method::Generate),
            "http://localhost/v1beta/models/gemini-3-flash-preview:generateContent"
        );
        assert_eq!(
            model("models/gemini-3-flash-preview").url(Method::StreamGenerate),
            "http://localhost/v1beta/models/gemini-3-flash-preview:streamGenerateContent?alt=sse"
        );
    }

    #[test]
    fn test_sse_data_lines() {
        assert_eq!(sse_data("data: {\"a\":1}"), Some("{\"a\":1}"));
        assert_eq!(sse_data("data:{}"), Some("{}"));
        assert_eq!(sse_data("event: ping"), None);
        assert_eq!(sse_data(""), None);
    }
}
