use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use reqwest::StatusCode;

use crate::api_connection::{
    ApiConnectionError, ChatBackend, ChatCompletionRequest, ChatCompletionResponse,
};

type ScriptedReply = Result<ChatCompletionResponse, ApiConnectionError>;

/// A `ChatBackend` that replays queued replies in order and records every request.
#[derive(Default)]
pub struct ScriptedBackend {
    replies: Mutex<VecDeque<ScriptedReply>>,
    requests: Mutex<Vec<ChatCompletionRequest>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(self, text: impl Into<String>) -> Self {
        self.push(Ok(ChatCompletionResponse::from_text(text)))
    }

    pub fn with_error(self, error: ApiConnectionError) -> Self {
        self.push(Err(error))
    }

    pub fn with_rate_limits(mut self, count: usize) -> Self {
        for _ in 0..count {
            self = self.with_error(ApiConnectionError::RateLimited {
                retry_after_secs: None,
            });
        }
        self
    }

    fn push(self, reply: ScriptedReply) -> Self {
        self.replies
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push_back(reply);
        self
    }

    pub fn requests(&self) -> Vec<ChatCompletionRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Text of the last message of the most recent request.
    pub fn last_prompt(&self) -> Option<String> {
        self.requests()
            .last()
            .and_then(|request| request.messages.last())
            .map(|message| message.content.as_text())
    }
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    async fn call_chat_completion(
        &self,
        request: ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, ApiConnectionError> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(request);
        self.replies
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop_front()
            .unwrap_or_else(|| {
                Err(ApiConnectionError::ApiError {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    error_body: "no scripted reply left".to_string(),
                })
            })
    }
}
