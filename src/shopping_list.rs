use std::collections::HashSet;

use crate::ingredient_detector::IngredientEntry;
use crate::plan_generator::RequiredIngredient;

pub const NOTHING_TO_BUY: &str = "It seems you have all the necessary ingredients.";
pub const AMOUNT_PLACEHOLDER: &str = "Amount not specified";
pub const SHOPPING_LIST_HEADER: &str = "### Shopping List";

fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}

pub(crate) fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Markdown list of required ingredients that are not already on hand.
pub fn create_shopping_list(
    available_ingredients: &[IngredientEntry],
    required_ingredients: &[RequiredIngredient],
) -> String {
    let available: HashSet<String> = available_ingredients
        .iter()
        .map(|item| normalize(&item.ingredient))
        .collect();

    let missing: Vec<String> = required_ingredients
        .iter()
        .filter_map(|required| {
            let name = normalize(&required.ingredient);
            if name.is_empty() || available.contains(&name) {
                return None;
            }
            let amount = required
                .amount
                .as_deref()
                .map(str::trim)
                .filter(|amount| !amount.is_empty())
                .unwrap_or(AMOUNT_PLACEHOLDER);
            Some(format!("- {} ({})", capitalize(&name), amount))
        })
        .collect();

    if missing.is_empty() {
        return NOTHING_TO_BUY.to_string();
    }
    format!("{}\n\n{}", SHOPPING_LIST_HEADER, missing.join("\n"))
}
