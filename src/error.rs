use std::path::PathBuf;

use thiserror::Error;

use crate::api_connection::ApiConnectionError;

#[derive(Debug, Error)]
pub enum ChefError {
    #[error("Configuration error: {0}")]
    Config(#[source] ApiConnectionError),
    #[error("The image file was not found at: {}", .0.display())]
    ImageNotFound(PathBuf),
    #[error("Failed to read image {}: {source}", path.display())]
    ImageRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("No ingredients detected. Try with another image.")]
    NoIngredientsDetected,
    #[error("Cannot regenerate. Make sure you have generated a plan first.")]
    NothingToRegenerate,
    #[error("'{0}' is not a meal slot; expected something like 'Monday Breakfast'")]
    InvalidMealSlot(String),
    #[error("{context}: {source}")]
    Service {
        context: &'static str,
        #[source]
        source: ApiConnectionError,
    },
    #[error("Session file {}: {message}", path.display())]
    Session { path: PathBuf, message: String },
}

impl ChefError {
    pub fn service(context: &'static str) -> impl FnOnce(ApiConnectionError) -> Self {
        move |source| ChefError::Service { context, source }
    }
}
