use std::fmt;
use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::api_connection::{response_text, ChatBackend, ChatCompletionRequest, ChatMessage};
use crate::config::GenerationSettings;
use crate::error::ChefError;
use crate::json_extract::extract_json;
use crate::retry::call_with_retry;

pub const DETECTION_PROMPT: &str = "You are a food expert. Analyze the image to identify all ingredients. \
Estimate the amount of each one. \
Return the response only as a JSON list of objects. \
Each object must have a key 'ingredient' (string) and a key 'amount' (an object with 'value' and 'unit'). \
Example: [{\"ingredient\": \"tomato\", \"amount\": {\"value\": 2, \"unit\": \"piece\"}}]";

const DETECTION_MAX_TOKENS: u32 = 2048;

/// A quantity as the model reported it: usually a number, sometimes "a handful".
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum AmountValue {
    Number(serde_json::Number),
    Text(String),
}

impl Default for AmountValue {
    fn default() -> Self {
        AmountValue::Text(String::new())
    }
}

impl fmt::Display for AmountValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AmountValue::Number(number) => write!(f, "{}", number),
            AmountValue::Text(text) => write!(f, "{}", text),
        }
    }
}

#[derive(Debug, Serialize, Clone, PartialEq, Default)]
pub struct Amount {
    pub value: AmountValue,
    pub unit: String,
}

fn scalar_value(value: Value) -> AmountValue {
    match value {
        Value::Null => AmountValue::default(),
        Value::Number(number) => AmountValue::Number(number),
        Value::String(text) => AmountValue::Text(text),
        other => AmountValue::Text(other.to_string()),
    }
}

fn unit_text(unit: Option<Value>) -> String {
    match unit {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text,
        Some(other) => other.to_string(),
    }
}

// Models do not always follow the `{value, unit}` shape; a bare `"2 pieces"`
// or `6` is kept as the value with no unit.
impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::Object(mut fields) => Amount {
                value: scalar_value(fields.remove("value").unwrap_or(Value::Null)),
                unit: unit_text(fields.remove("unit")),
            },
            other => Amount {
                value: scalar_value(other),
                unit: String::new(),
            },
        })
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", format!("{} {}", self.value, self.unit).trim())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct IngredientEntry {
    pub ingredient: String,
    #[serde(default)]
    pub amount: Amount,
}

impl IngredientEntry {
    pub fn new(ingredient: impl Into<String>) -> Self {
        Self {
            ingredient: ingredient.into(),
            amount: Amount::default(),
        }
    }
}

fn mime_type_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());
    match extension.as_deref() {
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        Some("heic") => "image/heic",
        _ => "image/jpeg",
    }
}

pub fn image_data_url(path: &Path, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime_type_for(path), STANDARD.encode(bytes))
}

/// Reads the ingredient list out of a detection reply. Anything but a JSON list yields nothing.
pub fn parse_detected_ingredients(text: &str) -> Vec<IngredientEntry> {
    match extract_json(text) {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| match serde_json::from_value::<IngredientEntry>(item) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    debug!(error = %e, "skipping malformed ingredient entry");
                    None
                }
            })
            .collect(),
        _ => Vec::new(),
    }
}

pub async fn detect_ingredients(
    backend: &dyn ChatBackend,
    settings: &GenerationSettings,
    image_path: &Path,
) -> Result<Vec<IngredientEntry>, ChefError> {
    if !tokio::fs::try_exists(image_path).await.unwrap_or(false) {
        return Err(ChefError::ImageNotFound(image_path.to_path_buf()));
    }

    let bytes = tokio::fs::read(image_path)
        .await
        .map_err(|source| ChefError::ImageRead {
            path: image_path.to_path_buf(),
            source,
        })?;
    info!(path = %image_path.display(), bytes = bytes.len(), "detecting ingredients");

    let request = ChatCompletionRequest {
        model: settings.model.clone(),
        messages: vec![ChatMessage::user_with_image(
            DETECTION_PROMPT,
            image_data_url(image_path, &bytes),
        )],
        temperature: settings.temperature,
        max_tokens: Some(DETECTION_MAX_TOKENS),
    };

    let context = "An error occurred while detecting ingredients";
    let response = call_with_retry(&settings.retry, || {
        backend.call_chat_completion(request.clone())
    })
    .await
    .map_err(ChefError::service(context))?;
    let text = response_text(&response).map_err(ChefError::service(context))?;

    let ingredients = parse_detected_ingredients(&text);
    info!(count = ingredients.len(), "ingredients detected");
    Ok(ingredients)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api_connection::endpoints::{ContentPart, MessageContent};
    use crate::api_connection::ApiConnectionError;
    use crate::mock::ScriptedBackend;
    use std::io::Write;

    fn image_file() -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".png").tempfile().unwrap();
        file.write_all(b"\x89PNG fake").unwrap();
        file
    }

    #[tokio::test]
    async fn missing_image_fails_before_any_call() {
        let backend = ScriptedBackend::new().with_text("[]");
        let result = detect_ingredients(
            &backend,
            &GenerationSettings::default(),
            Path::new("/definitely/not/here.jpg"),
        )
        .await;
        assert!(matches!(result, Err(ChefError::ImageNotFound(_))));
        assert!(backend.requests().is_empty());
    }

    #[tokio::test]
    async fn parses_the_fenced_ingredient_list() {
        let image = image_file();
        let backend = ScriptedBackend::new().with_text(
            "Sure!\n```json\n[{\"ingredient\": \"tomato\", \"amount\": {\"value\": 2, \"unit\": \"piece\"}},\n {\"ingredient\": \"rice\", \"amount\": {\"value\": \"a bag\", \"unit\": \"\"}}]\n```",
        );

        let ingredients = detect_ingredients(&backend, &GenerationSettings::default(), image.path())
            .await
            .unwrap();

        assert_eq!(ingredients.len(), 2);
        assert_eq!(ingredients[0].ingredient, "tomato");
        assert_eq!(ingredients[0].amount.to_string(), "2 piece");
        assert_eq!(ingredients[1].amount.to_string(), "a bag");
    }

    #[tokio::test]
    async fn sends_the_image_as_a_png_data_url() {
        let image = image_file();
        let backend = ScriptedBackend::new().with_text("[]");
        detect_ingredients(&backend, &GenerationSettings::default(), image.path())
            .await
            .unwrap();

        let requests = backend.requests();
        let MessageContent::Parts(parts) = &requests[0].messages[0].content else {
            panic!("detection request should carry content parts");
        };
        assert!(matches!(&parts[0], ContentPart::Text { text } if text == DETECTION_PROMPT));
        assert!(matches!(
            &parts[1],
            ContentPart::ImageUrl { image_url } if image_url.url.starts_with("data:image/png;base64,")
        ));
    }

    #[tokio::test]
    async fn non_list_reply_degrades_to_no_ingredients() {
        let image = image_file();
        let backend = ScriptedBackend::new().with_text("I see a {\"ingredient\": \"tomato\"}");
        let ingredients = detect_ingredients(&backend, &GenerationSettings::default(), image.path())
            .await
            .unwrap();
        assert!(ingredients.is_empty());
    }

    #[tokio::test]
    async fn prose_reply_degrades_to_no_ingredients() {
        let image = image_file();
        let backend = ScriptedBackend::new().with_text("I could not see any food.");
        let ingredients = detect_ingredients(&backend, &GenerationSettings::default(), image.path())
            .await
            .unwrap();
        assert!(ingredients.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limits_are_retried_until_success() {
        let image = image_file();
        let backend = ScriptedBackend::new()
            .with_rate_limits(2)
            .with_text("```json\n[{\"ingredient\": \"egg\", \"amount\": {\"value\": 6, \"unit\": \"piece\"}}]\n```");

        let ingredients = detect_ingredients(&backend, &GenerationSettings::default(), image.path())
            .await
            .unwrap();

        assert_eq!(ingredients, vec![IngredientEntry {
            ingredient: "egg".to_string(),
            amount: Amount {
                value: AmountValue::Number(serde_json::Number::from(6u64)),
                unit: "piece".to_string(),
            },
        }]);
        assert_eq!(backend.requests().len(), 3);
    }

    #[tokio::test]
    async fn other_service_failures_are_wrapped_with_context() {
        let image = image_file();
        let backend = ScriptedBackend::new().with_error(ApiConnectionError::ApiError {
            status: reqwest::StatusCode::BAD_REQUEST,
            error_body: "bad image".to_string(),
        });

        let error = detect_ingredients(&backend, &GenerationSettings::default(), image.path())
            .await
            .unwrap_err();

        assert!(matches!(error, ChefError::Service { .. }));
        assert!(error
            .to_string()
            .starts_with("An error occurred while detecting ingredients"));
        assert_eq!(backend.requests().len(), 1);
    }

    #[test]
    fn entries_tolerate_missing_and_null_fields() {
        let entries = parse_detected_ingredients(
            "```json\n[{\"ingredient\": \"salt\"}, {\"ingredient\": \"milk\", \"amount\": {\"value\": null, \"unit\": null}}, {\"amount\": {}}]\n```",
        );
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].amount.to_string(), "");
        assert_eq!(entries[1].ingredient, "milk");
    }

    #[test]
    fn scalar_and_odd_amounts_are_kept() {
        let entries = parse_detected_ingredients(
            "```json\n[{\"ingredient\": \"tomato\", \"amount\": \"2 pieces\"}, {\"ingredient\": \"egg\", \"amount\": 6}, {\"ingredient\": \"rice\", \"amount\": {\"value\": true, \"unit\": \"bag\"}}]\n```",
        );
        let rendered: Vec<(String, String)> = entries
            .iter()
            .map(|entry| (entry.ingredient.clone(), entry.amount.to_string()))
            .collect();
        assert_eq!(
            rendered,
            vec![
                ("tomato".to_string(), "2 pieces".to_string()),
                ("egg".to_string(), "6".to_string()),
                ("rice".to_string(), "true bag".to_string()),
            ]
        );
        assert_eq!(
            entries[1].amount.value,
            AmountValue::Number(serde_json::Number::from(6u64))
        );
    }

    #[tokio::test]
    async fn unfenced_bare_array_degrades_to_no_ingredients() {
        let image = image_file();
        let backend = ScriptedBackend::new().with_text(
            "[{\"ingredient\": \"egg\", \"amount\": {\"value\": 6, \"unit\": \"piece\"}}, {\"ingredient\": \"milk\"}]",
        );
        let ingredients = detect_ingredients(&backend, &GenerationSettings::default(), image.path())
            .await
            .unwrap();
        assert!(ingredients.is_empty());
    }

    #[test]
    fn mime_type_follows_extension() {
        assert_eq!(mime_type_for(Path::new("a.PNG")), "image/png");
        assert_eq!(mime_type_for(Path::new("a.webp")), "image/webp");
        assert_eq!(mime_type_for(Path::new("a.jpeg")), "image/jpeg");
        assert_eq!(mime_type_for(Path::new("noext")), "image/jpeg");
    }
}


