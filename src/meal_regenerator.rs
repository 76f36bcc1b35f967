use tracing::info;

use crate::api_connection::{response_text, ChatBackend, ChatCompletionRequest, ChatMessage};
use crate::config::GenerationSettings;
use crate::error::ChefError;
use crate::ingredient_detector::IngredientEntry;
use crate::plan_generator::ingredient_names;
use crate::retry::call_with_retry;

const REGENERATE_MAX_TOKENS: u32 = 16384;

pub fn build_regeneration_prompt(
    current_plan: &str,
    meal_to_change: &str,
    available_ingredients: &[IngredientEntry],
    preference: &str,
) -> String {
    format!(
        "Your task is to regenerate a single meal in an existing meal plan.
Here is the current full meal plan:
```
{plan}
```

The meal you must change is: '{meal}'.
Use these ingredients: {ingredients}
And consider this preference: {preference}

Final instruction: Return only the complete and updated meal plan in the same original text format. Make sure all the plan's content stays the same, except for the '{meal}' recipe, which must be a new creative recipe.
Do not add any additional text, headers, or JSON format. Just return the complete, updated meal plan.",
        plan = current_plan,
        meal = meal_to_change,
        ingredients = ingredient_names(available_ingredients),
        preference = preference,
    )
}

/// Asks the model for the whole plan back with one meal replaced. The reply is
/// trusted verbatim.
pub async fn regenerate_meal(
    backend: &dyn ChatBackend,
    settings: &GenerationSettings,
    current_plan: &str,
    meal_to_change: &str,
    available_ingredients: &[IngredientEntry],
    preference: &str,
) -> Result<String, ChefError> {
    info!(meal = meal_to_change, "regenerating meal");
    let request = ChatCompletionRequest {
        model: settings.model.clone(),
        messages: vec![ChatMessage::user(build_regeneration_prompt(
            current_plan,
            meal_to_change,
            available_ingredients,
            preference,
        ))],
        temperature: settings.temperature,
        max_tokens: Some(REGENERATE_MAX_TOKENS),
    };

    let context = "Error regenerating the meal";
    let response = call_with_retry(&settings.retry, || {
        backend.call_chat_completion(request.clone())
    })
    .await
    .map_err(ChefError::service(context))?;
    response_text(&response).map_err(ChefError::service(context))
}
