use std::env;
use std::fmt;
use std::time::Duration;

use crate::api_connection::endpoints::{DEFAULT_MODEL, OPENROUTER_BASE_URL};
use crate::api_connection::ApiConnectionError;
use crate::retry::RetryPolicy;

pub const API_KEY_ENV_VAR: &str = "OPENROUTER_API_KEY";
pub const MODEL_ENV_VAR: &str = "PLANNER_MODEL";
pub const BASE_URL_ENV_VAR: &str = "OPENROUTER_BASE_URL";
pub const RETRY_DELAY_ENV_VAR: &str = "PLANNER_RETRY_DELAY_SECS";

/// Process-level settings, resolved once at startup.
#[derive(Clone)]
pub struct AppConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub site_url: String,
    pub app_name: String,
    pub retry_delay: Duration,
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("site_url", &self.site_url)
            .field("app_name", &self.app_name)
            .field("retry_delay", &self.retry_delay)
            .finish()
    }
}

impl AppConfig {
    /// Loads `.env` and reads the process environment.
    pub fn from_env() -> Result<Self, ApiConnectionError> {
        dotenv::dotenv().ok();
        Self::from_env_with_key_var(API_KEY_ENV_VAR)
    }

    pub fn from_env_with_key_var(api_key_env_var: &str) -> Result<Self, ApiConnectionError> {
        let api_key = env::var(api_key_env_var)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| ApiConnectionError::MissingApiKey(api_key_env_var.to_string()))?;

        let retry_delay = env::var(RETRY_DELAY_ENV_VAR)
            .ok()
            .and_then(|secs| secs.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or_else(|| RetryPolicy::default().delay);

        Ok(Self {
            api_key,
            model: env::var(MODEL_ENV_VAR).unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            base_url: env::var(BASE_URL_ENV_VAR).unwrap_or_else(|_| OPENROUTER_BASE_URL.to_string()),
            site_url: env::var("SITE_URL").unwrap_or_else(|_| "http://localhost:3000".to_string()),
            app_name: env::var("APP_NAME").unwrap_or_else(|_| "PantryPlanner".to_string()),
            retry_delay,
        })
    }

    pub fn generation_settings(&self) -> GenerationSettings {
        GenerationSettings {
            model: self.model.clone(),
            temperature: None,
            retry: RetryPolicy::fixed(self.retry_delay),
        }
    }

    #[cfg(test)]
    pub(crate) fn for_tests(base_url: &str) -> Self {
        Self {
            api_key: "test-key".to_string(),
            model: DEFAULT_MODEL.to_string(),
            base_url: base_url.to_string(),
            site_url: "http://localhost:3000".to_string(),
            app_name: "PantryPlanner".to_string(),
            retry_delay: Duration::from_secs(2),
        }
    }
}

/// Per-call knobs handed to every component.
#[derive(Clone, Debug)]
pub struct GenerationSettings {
    pub model: String,
    pub temperature: Option<f32>,
    pub retry: RetryPolicy,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            temperature: None,
            retry: RetryPolicy::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_key_is_a_configuration_failure() {
        let result = AppConfig::from_env_with_key_var("PANTRY_PLANNER_KEY_THAT_IS_NEVER_SET");
        match result {
            Err(ApiConnectionError::MissingApiKey(name)) => {
                assert_eq!(name, "PANTRY_PLANNER_KEY_THAT_IS_NEVER_SET")
            }
            other => panic!("expected MissingApiKey, got {:?}", other.map(|c| c.model)),
        }
    }

    #[test]
    fn settings_carry_the_configured_delay() {
        let mut config = AppConfig::for_tests(OPENROUTER_BASE_URL);
        config.retry_delay = Duration::from_secs(7);
        let settings = config.generation_settings();
        assert_eq!(settings.retry.delay, Duration::from_secs(7));
        assert_eq!(settings.model, DEFAULT_MODEL);
    }

    #[test]
    fn debug_output_hides_the_api_key() {
        let mut config = AppConfig::for_tests(OPENROUTER_BASE_URL);
        config.api_key = "sk-or-v1-secret-value".to_string();
        let printed = format!("{:?}", config);
        assert!(!printed.contains("sk-or-v1-secret-value"));
        assert!(printed.contains("<redacted>"));
        assert!(printed.contains(DEFAULT_MODEL));
    }
}
