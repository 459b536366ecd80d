use crate::client::Client;
use crate::{ChatModel, ModelCapability, ModelProvider};
use async_trait::async_trait;
use reqwest::Url;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use std::sync::Arc;

use super::chat::GeminiChatModel;
use super::chat::api::ListModelsResponse;

/// Public Gemini endpoint, including the API version
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Clone)]
pub struct GeminiProvider {
    client: Client,
    base_url: String,
}

impl GeminiProvider {
    pub fn default(api_key: &str) -> anyhow::Result<Self> {
        Self::new(DEFAULT_BASE_URL, api_key)
    }

    /// Create a provider with a custom base URL (e.g., for proxying).
    /// The URL must already include the API version path.
    pub fn new(base_url: &str, api_key: &str) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let mut key = HeaderValue::from_str(api_key)
            .map_err(|_| anyhow::anyhow!("API key contains characters not allowed in a header"))?;
        key.set_sensitive(true);
        headers.insert("x-goog-api-key", key);

        Ok(GeminiProvider {
            client: Client::with_headers(headers)?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn models_url(&self, page_token: Option<&str>) -> anyhow::Result<Url> {
        let mut url = Url::parse(&format!("{}/models", self.base_url))?;
        if let Some(token) = page_token {
            url.query_pairs_mut().append_pair("pageToken", token);
        }
        Ok(url)
    }
}

#[async_trait]
impl ModelProvider for GeminiProvider {
    async fn list_models(&self) -> anyhow::Result<Vec<crate::ModelDefinition>> {
        let mut models = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let response: ListModelsResponse =
                self.client.get(self.models_url(page_token.as_deref())?).await?;
            models.extend(
                response
                    .models
                    .into_iter()
                    .map(crate::ModelDefinition::from)
                    .filter(|m| m.has_capability(ModelCapability::Chat)),
            );
            match response.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }
        Ok(models)
    }

    fn create_chat_model(&self, model_name: &str) -> Option<Arc<dyn ChatModel + Send + Sync>> {
        Some(Arc::new(GeminiChatModel::new(
            self.client.clone(),
            self.base_url.clone(),
            model_name.to_string(),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let provider = GeminiProvider::new("http://localhost:8080/v1beta/", "key").unwrap();
        assert_eq!(
            provider.models_url(None).unwrap().as_str(),
            "http://localhost:8080/v1beta/models"
        );
        assert_eq!(
            provider.models_url(Some("abc")).unwrap().as_str(),
            "http://localhost:8080/v1beta/models?pageToken=abc"
        );
    }

    #[test]
    fn test_page_token_is_query_encoded() {
        let provider = GeminiProvider::new("http://localhost:8080/v1beta", "key").unwrap();
        let url = provider.models_url(Some("a+b/c=&d")).unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:8080/v1beta/models?pageToken=a%2Bb%2Fc%3D%26d"
        );
        let (_, token) = url.query_pairs().next().unwrap();
        assert_eq!(token, "a+b/c=&d");
    }

    #[test]
    fn test_invalid_api_key_rejected() {
        assert!(GeminiProvider::new(DEFAULT_BASE_URL, "bad\nkey").is_err());
    }

    #[test]
    fn test_create_chat_model_keeps_name() {
        let provider = GeminiProvider::default("key").unwrap();
        let model = provider.create_chat_model("gemini-3-flash-preview").unwrap();
        assert_eq!(model.name(), "gemini-3-flash-preview");
    }
}
