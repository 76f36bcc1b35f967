pub mod connection;
pub mod endpoints;

pub use connection::{response_text, ApiConnectionError, ChatBackend, ServiceResponse};
pub use endpoints::{ChatCompletionRequest, ChatCompletionResponse, ChatMessage, Provider};
