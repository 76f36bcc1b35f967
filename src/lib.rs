pub mod api_connection;
pub mod cli;
pub mod config;
pub mod error;
pub mod ingredient_detector;
pub mod json_extract;
pub mod meal_regenerator;
pub mod mock;
pub mod pipeline;
pub mod plan_generator;
pub mod retry;
pub mod session;
pub mod shopping_list;
