use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use thiserror::Error;
use tracing::debug;

use super::endpoints::{ChatCompletionRequest, ChatCompletionResponse, Provider};
use crate::config::AppConfig;
use crate::retry::RateLimitSignal;

#[derive(Debug, Error)]
pub enum ApiConnectionError {
    #[error("API key not found in environment: {0}")]
    MissingApiKey(String),
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("Rate limited by the service (retry after {retry_after_secs:?}s)")]
    RateLimited { retry_after_secs: Option<u64> },
    #[error("API error {status}: {error_body}")]
    ApiError {
        status: StatusCode,
        error_body: String,
    },
    #[error("The service returned no text content")]
    EmptyResponse,
}

impl RateLimitSignal for ApiConnectionError {
    fn is_rate_limited(&self) -> bool {
        matches!(self, ApiConnectionError::RateLimited { .. })
    }
}

/// Anything that carries the model's textual reply.
pub trait ServiceResponse {
    fn text(&self) -> Option<&str>;
}

impl ServiceResponse for ChatCompletionResponse {
    fn text(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|choice| choice.message.content.as_deref())
    }
}

/// Text of a reply, or `EmptyResponse` when the service sent nothing usable.
pub fn response_text<R: ServiceResponse + ?Sized>(response: &R) -> Result<String, ApiConnectionError> {
    response
        .text()
        .map(str::to_string)
        .ok_or(ApiConnectionError::EmptyResponse)
}

/// A chat completion service. `Provider` talks HTTP; tests plug in scripted doubles.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn call_chat_completion(
        &self,
        request: ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, ApiConnectionError>;
}

impl Provider {
    /// Builds the provider once; the HTTP client and credentials are reused for every call.
    pub fn openrouter(config: &AppConfig) -> Self {
        Self::OpenRouter {
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            site_url: config.site_url.clone(),
            app_name: config.app_name.clone(),
            client: Client::new(),
        }
    }

    pub fn completions_url(&self) -> String {
        match self {
            Provider::OpenRouter { base_url, .. } => format!("{}/chat/completions", base_url),
        }
    }
}

#[async_trait]
impl ChatBackend for Provider {
    async fn call_chat_completion(
        &self,
        request: ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, ApiConnectionError> {
        let url = self.completions_url();
        match self {
            Provider::OpenRouter {
                api_key,
                site_url,
                app_name,
                client,
                ..
            } => {
                debug!(model = %request.model, messages = request.messages.len(), "sending chat completion");

                let response = client
                    .post(&url)
                    .bearer_auth(api_key)
                    .header("Content-Type", "application/json")
                    .header("HTTP-Referer", site_url)
                    .header("X-Title", app_name)
                    .json(&request)
                    .send()
                    .await?;

                let status = response.status();
                if status == StatusCode::TOO_MANY_REQUESTS {
                    let retry_after_secs = response
                        .headers()
                        .get("retry-after")
                        .and_then(|value| value.to_str().ok())
                        .and_then(|value| value.trim().parse::<u64>().ok());
                    return Err(ApiConnectionError::RateLimited { retry_after_secs });
                }

                if status.is_success() {
                    let body = response.text().await?;
                    let chat_response = serde_json::from_str::<ChatCompletionResponse>(&body)?;
                    Ok(chat_response)
                } else {
                    let error_body = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "Failed to read error body".to_string());
                    Err(ApiConnectionError::ApiError { status, error_body })
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_rate_limited_errors_signal_a_retry() {
        assert!(ApiConnectionError::RateLimited { retry_after_secs: None }.is_rate_limited());
        assert!(!ApiConnectionError::EmptyResponse.is_rate_limited());
        assert!(!ApiConnectionError::ApiError {
            status: StatusCode::BAD_REQUEST,
            error_body: "bad".to_string(),
        }
        .is_rate_limited());
    }

    #[test]
    fn response_text_reads_first_choice() {
        let response = ChatCompletionResponse::from_text("hello");
        assert_eq!(response_text(&response).unwrap(), "hello");
    }

    #[test]
    fn response_without_choices_is_empty() {
        let mut response = ChatCompletionResponse::from_text("unused");
        response.choices.clear();
        assert!(matches!(
            response_text(&response),
            Err(ApiConnectionError::EmptyResponse)
        ));
    }

    #[test]
    fn completions_url_joins_base_without_double_slash() {
        let config = AppConfig::for_tests("https://example.test/api/v1/");
        let provider = Provider::openrouter(&config);
        assert_eq!(
            provider.completions_url(),
            "https://example.test/api/v1/chat/completions"
        );
    }
}
