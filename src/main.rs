use std::future::Future;
use std::path::Path;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use pantry_planner::api_connection::Provider;
use pantry_planner::cli::{parse_args, Cli, Command};
use pantry_planner::config::{AppConfig, GenerationSettings};
use pantry_planner::error::ChefError;
use pantry_planner::pipeline::{generate_session, regenerate_in_session};
use pantry_planner::session::{ingredients_table, MealSlot, SessionState};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Resolves the environment once and builds the shared provider.
fn connect(cli: &Cli) -> Result<(Provider, GenerationSettings)> {
    let mut config = AppConfig::from_env()
        .map_err(ChefError::Config)
        .context("Cannot talk to the model without credentials")?;
    if let Some(model) = &cli.model {
        config.model = model.clone();
    }
    if let Some(secs) = cli.retry_delay_secs {
        config.retry_delay = Duration::from_secs(secs);
    }
    info!(model = %config.model, "using model");
    let provider = Provider::openrouter(&config);
    Ok((provider, config.generation_settings()))
}

async fn bounded<T>(
    timeout_secs: Option<u64>,
    call: impl Future<Output = Result<T, ChefError>>,
) -> Result<T> {
    match timeout_secs {
        Some(secs) => tokio::time::timeout(Duration::from_secs(secs), call)
            .await
            .map_err(|_| anyhow!("Gave up waiting for the model after {} seconds", secs))?
            .map_err(Into::into),
        None => call.await.map_err(Into::into),
    }
}

async fn load_session(path: &Path) -> Result<SessionState> {
    SessionState::load(path)
        .await
        .with_context(|| format!("Run `plan` first to create '{}'", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = parse_args();
    init_tracing(cli.verbose);

    match &cli.command {
        Command::Meals => {
            for slot in MealSlot::all() {
                println!("{}", slot);
            }
        }
        Command::ShoppingList { session } => {
            let state = load_session(session).await?;
            println!("{}", state.shopping_list);
        }
        Command::Plan {
            image,
            preference,
            session,
        } => {
            let (provider, settings) = connect(&cli)?;
            let state = bounded(
                cli.timeout_secs,
                generate_session(&provider, &settings, image, preference),
            )
            .await
            .context("An error has occurred")?;

            println!("## Detected Ingredients\n\n{}\n", ingredients_table(&state.available_ingredients));
            println!("{}\n", state.plan_markdown);
            println!("{}", state.shopping_list);

            state
                .save(session)
                .await
                .with_context(|| format!("Failed to save session to '{}'", session.display()))?;
            info!(path = %session.display(), "session saved");
        }
        Command::Regenerate { meal, session } => {
            let slot: MealSlot = meal.parse()?;
            let mut state = load_session(session).await?;
            let (provider, settings) = connect(&cli)?;
            bounded(
                cli.timeout_secs,
                regenerate_in_session(&provider, &settings, &mut state, slot),
            )
            .await
            .with_context(|| format!("Error regenerating {}", slot))?;

            println!("{}", state.plan_markdown);
            state
                .save(session)
                .await
                .with_context(|| format!("Failed to save session to '{}'", session.display()))?;
        }
    }

    Ok(())
}
