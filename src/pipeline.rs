use std::path::Path;

use tracing::info;

use crate::api_connection::ChatBackend;
use crate::config::GenerationSettings;
use crate::error::ChefError;
use crate::ingredient_detector::detect_ingredients;
use crate::meal_regenerator::regenerate_meal;
use crate::plan_generator::generate_plan;
use crate::session::{MealSlot, SessionState};
use crate::shopping_list::create_shopping_list;

/// Photo in, plan and shopping list out: detect, plan, then diff.
pub async fn generate_session(
    backend: &dyn ChatBackend,
    settings: &GenerationSettings,
    image_path: &Path,
    preference: &str,
) -> Result<SessionState, ChefError> {
    let available_ingredients = detect_ingredients(backend, settings, image_path).await?;
    if available_ingredients.is_empty() {
        return Err(ChefError::NoIngredientsDetected);
    }

    let plan = generate_plan(backend, settings, &available_ingredients, preference).await?;
    let shopping_list = create_shopping_list(&available_ingredients, &plan.required_ingredients);
    info!("Plan generated successfully.");

    Ok(SessionState {
        available_ingredients,
        plan_markdown: plan.plan_markdown,
        preference: preference.to_string(),
        shopping_list,
    })
}

/// Replaces one meal of the stored plan. Refuses without a plan, ingredients
/// and a preference; the session is left untouched on failure.
pub async fn regenerate_in_session(
    backend: &dyn ChatBackend,
    settings: &GenerationSettings,
    session: &mut SessionState,
    slot: MealSlot,
) -> Result<(), ChefError> {
    if session.plan_markdown.trim().is_empty()
        || session.available_ingredients.is_empty()
        || session.preference.trim().is_empty()
    {
        return Err(ChefError::NothingToRegenerate);
    }

    let label = slot.to_string();
    let new_plan = regenerate_meal(
        backend,
        settings,
        &session.plan_markdown,
        &label,
        &session.available_ingredients,
        &session.preference,
    )
    .await?;
    session.plan_markdown = new_plan;
    info!(meal = %label, "The recipe has been regenerated.");
    Ok(())
}
