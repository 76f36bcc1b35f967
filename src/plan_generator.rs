use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::api_connection::{response_text, ChatBackend, ChatCompletionRequest, ChatMessage};
use crate::config::GenerationSettings;
use crate::error::ChefError;
use crate::ingredient_detector::IngredientEntry;
use crate::json_extract::extract_json;
use crate::retry::call_with_retry;

pub const JSON_FENCE: &str = "```json";
pub const REQUIRED_INGREDIENTS_KEY: &str = "required_ingredients";

const PLAN_MAX_TOKENS: u32 = 16384;

/// An ingredient the plan calls for, with a free-text amount.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct RequiredIngredient {
    #[serde(default, deserialize_with = "lenient_name")]
    pub ingredient: String,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub amount: Option<String>,
}

impl RequiredIngredient {
    pub fn new(ingredient: impl Into<String>, amount: Option<&str>) -> Self {
        Self {
            ingredient: ingredient.into(),
            amount: amount.map(str::to_string),
        }
    }
}

fn lenient_name<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

// Models sometimes answer `"amount": 2` instead of `"amount": "2"`.
fn lenient_amount<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => None,
        Value::String(text) => Some(text),
        other => Some(other.to_string()),
    })
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct GeneratedPlan {
    pub plan_markdown: String,
    pub required_ingredients: Vec<RequiredIngredient>,
}

pub fn ingredient_names(ingredients: &[IngredientEntry]) -> String {
    ingredients
        .iter()
        .map(|item| item.ingredient.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn build_plan_prompt(ingredients: &[IngredientEntry], dietary_preference: &str) -> String {
    format!(
        "Dietary preference: {preference}
Available ingredients: {ingredients}

**Main Task: Generate a COMPLETE and VARIED Meal Plan**
You can summarize each meal to make it shorter but it must include 3 meals for each day of the week, without summarizing the days by repeating phrases.
1. **Master Rule**: You must create a detailed, creative, and varied meal plan for the **7 full days** of the week (Monday to Sunday).
2. **KEY PROHIBITIONS:**
    - **DO NOT REPEAT MEALS:** Each of the 21 meals must be a unique and different recipe. It is strictly forbidden to repeat a meal from a previous day or use phrases like '(Repetition of...)'.
    - **DO NOT SUMMARIZE OR OMIT DAYS:** You must generate the complete response from Monday to Sunday without interruptions.
3. **MANDATORY FORMAT FOR EACH MEAL:**
    For **each of the 21 meals**, without exception, you must provide the complete recipe with all these details:
    - **Dish Name**
    - **Servings**
    - **Nutritional Information (Estimated)**: Calories, Proteins, Carbohydrates, Fats.
    - **Ingredients**: List with amounts.
**Secondary Task (At the end of EVERYTHING):**
After generating the COMPLETE and VARIED 7-day plan, add a JSON code block with the list of ALL necessary ingredients. The format is:
{fence}
{{\"{key}\": [{{\"ingredient\": \"name\", \"amount\": \"e.g., 2 units\"}}, ...]}}
```",
        preference = dietary_preference,
        ingredients = ingredient_names(ingredients),
        fence = JSON_FENCE,
        key = REQUIRED_INGREDIENTS_KEY,
    )
}

/// Splits a plan reply into the markdown plan and the trailing ingredient block.
pub fn split_plan_reply(full_text: &str) -> GeneratedPlan {
    let plan_markdown = match full_text.find(JSON_FENCE) {
        Some(index) => &full_text[..index],
        None => full_text,
    }
    .trim()
    .to_string();

    let required_ingredients = match extract_json(full_text) {
        Some(Value::Object(mut map)) => match map.remove(REQUIRED_INGREDIENTS_KEY) {
            Some(Value::Array(items)) => items
                .into_iter()
                .filter_map(|item| serde_json::from_value::<RequiredIngredient>(item).ok())
                .collect(),
            _ => Vec::new(),
        },
        _ => {
            debug!("plan reply has no ingredient mapping");
            Vec::new()
        }
    };

    GeneratedPlan {
        plan_markdown,
        required_ingredients,
    }
}

pub async fn generate_plan(
    backend: &dyn ChatBackend,
    settings: &GenerationSettings,
    available_ingredients: &[IngredientEntry],
    dietary_preference: &str,
) -> Result<GeneratedPlan, ChefError> {
    info!(
        ingredients = available_ingredients.len(),
        preference = dietary_preference,
        "generating weekly plan"
    );
    let request = ChatCompletionRequest {
        model: settings.model.clone(),
        messages: vec![ChatMessage::user(build_plan_prompt(
            available_ingredients,
            dietary_preference,
        ))],
        temperature: settings.temperature,
        max_tokens: Some(PLAN_MAX_TOKENS),
    };

    let context = "Error generating the meal plan";
    let response = call_with_retry(&settings.retry, || {
        backend.call_chat_completion(request.clone())
    })
    .await
    .map_err(ChefError::service(context))?;
    let full_text = response_text(&response).map_err(ChefError::service(context))?;

    let plan = split_plan_reply(&full_text);
    info!(
        plan_chars = plan.plan_markdown.len(),
        required = plan.required_ingredients.len(),
        "weekly plan generated"
    );
    Ok(plan)
}
