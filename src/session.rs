//! Transient state of one planning session, plus the meal slot vocabulary.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ChefError;
use crate::ingredient_detector::IngredientEntry;
use crate::shopping_list::capitalize;

pub const DEFAULT_PREFERENCE: &str = "balanced";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SessionState {
    pub available_ingredients: Vec<IngredientEntry>,
    pub plan_markdown: String,
    pub preference: String,
    pub shopping_list: String,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            available_ingredients: Vec::new(),
            plan_markdown: String::new(),
            preference: DEFAULT_PREFERENCE.to_string(),
            shopping_list: String::new(),
        }
    }
}

impl SessionState {
    pub async fn load(path: &Path) -> Result<Self, ChefError> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| session_error(path, e))?;
        serde_json::from_str(&raw).map_err(|e| session_error(path, e))
    }

    pub async fn save(&self, path: &Path) -> Result<(), ChefError> {
        let raw = serde_json::to_string_pretty(self).map_err(|e| session_error(path, e))?;
        tokio::fs::write(path, raw)
            .await
            .map_err(|e| session_error(path, e))
    }
}

fn session_error(path: &Path, error: impl fmt::Display) -> ChefError {
    ChefError::Session {
        path: path.to_path_buf(),
        message: error.to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl Weekday {
    pub const ALL: [Weekday; 7] = [
        Weekday::Monday,
        Weekday::Tuesday,
        Weekday::Wednesday,
        Weekday::Thursday,
        Weekday::Friday,
        Weekday::Saturday,
        Weekday::Sunday,
    ];

    fn name(self) -> &'static str {
        match self {
            Weekday::Monday => "Monday",
            Weekday::Tuesday => "Tuesday",
            Weekday::Wednesday => "Wednesday",
            Weekday::Thursday => "Thursday",
            Weekday::Friday => "Friday",
            Weekday::Saturday => "Saturday",
            Weekday::Sunday => "Sunday",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MealKind {
    Breakfast,
    Lunch,
    Dinner,
}

impl MealKind {
    pub const ALL: [MealKind; 3] = [MealKind::Breakfast, MealKind::Lunch, MealKind::Dinner];

    fn name(self) -> &'static str {
        match self {
            MealKind::Breakfast => "Breakfast",
            MealKind::Lunch => "Lunch",
            MealKind::Dinner => "Dinner",
        }
    }
}

/// One of the 21 meals of the week, e.g. "Monday Breakfast".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MealSlot {
    pub day: Weekday,
    pub meal: MealKind,
}

impl MealSlot {
    pub fn all() -> Vec<MealSlot> {
        Weekday::ALL
            .iter()
            .flat_map(|&day| MealKind::ALL.iter().map(move |&meal| MealSlot { day, meal }))
            .collect()
    }
}

impl fmt::Display for MealSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.day.name(), self.meal.name())
    }
}

impl FromStr for MealSlot {
    type Err = ChefError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut words = s.split_whitespace();
        let (Some(day), Some(meal), None) = (words.next(), words.next(), words.next()) else {
            return Err(ChefError::InvalidMealSlot(s.to_string()));
        };
        let day = Weekday::ALL
            .into_iter()
            .find(|candidate| candidate.name().eq_ignore_ascii_case(day));
        let meal = MealKind::ALL
            .into_iter()
            .find(|candidate| candidate.name().eq_ignore_ascii_case(meal));
        match (day, meal) {
            (Some(day), Some(meal)) => Ok(MealSlot { day, meal }),
            _ => Err(ChefError::InvalidMealSlot(s.to_string())),
        }
    }
}

/// Markdown table of detected ingredients and their estimated quantities.
pub fn ingredients_table(entries: &[IngredientEntry]) -> String {
    let mut table = String::from("| Ingredient | Quantity |\n| --- | --- |");
    for entry in entries {
        table.push_str(&format!(
            "\n| {} | {} |",
            capitalize(&entry.ingredient),
            entry.amount
        ));
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingredient_detector::{Amount, AmountValue};

    #[test]
    fn there_are_twenty_one_slots_in_week_order() {
        let slots = MealSlot::all();
        assert_eq!(slots.len(), 21);
        assert_eq!(slots[0].to_string(), "Monday Breakfast");
        assert_eq!(slots[2].to_string(), "Monday Dinner");
        assert_eq!(slots[20].to_string(), "Sunday Dinner");
    }

    #[test]
    fn slot_labels_parse_loosely() {
        let slot: MealSlot = "  friday   LUNCH ".parse().unwrap();
        assert_eq!(
            slot,
            MealSlot {
                day: Weekday::Friday,
                meal: MealKind::Lunch
            }
        );
        for slot in MealSlot::all() {
            assert_eq!(slot.to_string().parse::<MealSlot>().unwrap(), slot);
        }
    }

    #[test]
    fn bad_slot_labels_are_rejected() {
        for label in ["", "Monday", "Funday Lunch", "Monday Brunch", "Monday Lunch Extra"] {
            assert!(matches!(
                label.parse::<MealSlot>(),
                Err(ChefError::InvalidMealSlot(_))
            ));
        }
    }

    #[test]
    fn table_capitalizes_names_and_joins_quantities() {
        let entries = vec![
            IngredientEntry {
                ingredient: "tomato".to_string(),
                amount: Amount {
                    value: AmountValue::Number(serde_json::Number::from(2u64)),
                    unit: "piece".to_string(),
                },
            },
            IngredientEntry::new("SALT"),
        ];
        assert_eq!(
            ingredients_table(&entries),
            "| Ingredient | Quantity |\n| --- | --- |\n| Tomato | 2 piece |\n| Salt |  |"
        );
    }

    #[tokio::test]
    async fn session_survives_a_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let state = SessionState {
            available_ingredients: vec![IngredientEntry::new("egg")],
            plan_markdown: "## Monday".to_string(),
            preference: "vegetarian".to_string(),
            shopping_list: "### Shopping List\n\n- Milk (1 l)".to_string(),
        };
        state.save(&path).await.unwrap();
        assert_eq!(SessionState::load(&path).await.unwrap(), state);
    }

    #[tokio::test]
    async fn missing_session_file_is_a_session_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = SessionState::load(&dir.path().join("absent.json")).await;
        assert!(matches!(result, Err(ChefError::Session { .. })));
    }
}
