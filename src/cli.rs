use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::session::DEFAULT_PREFERENCE;

#[derive(Parser, Debug)]
#[command(author, version, about = "Weekly meal plans and shopping lists from a photo of your ingredients", long_about = None)]
pub struct Cli {
    /// Model identifier; overrides PLANNER_MODEL
    #[arg(long, global = true)]
    pub model: Option<String>,

    /// Seconds to wait between attempts when the service is rate limiting
    #[arg(long, global = true)]
    pub retry_delay_secs: Option<u64>,

    /// Give up on the whole command (every model call and its retries) after this many seconds
    #[arg(long, global = true)]
    pub timeout_secs: Option<u64>,

    /// Debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Detect ingredients in a photo and generate a weekly plan
    Plan {
        /// Path to the photo of your ingredients
        #[arg(short, long)]
        image: PathBuf,

        /// Dietary preference
        #[arg(short, long, default_value = DEFAULT_PREFERENCE)]
        preference: String,

        /// Where to store the session for later regeneration
        #[arg(short, long, default_value = "session.json")]
        session: PathBuf,
    },
    /// Replace one meal of the stored plan
    Regenerate {
        /// Meal to change, e.g. "Monday Breakfast"
        #[arg(short, long)]
        meal: String,

        #[arg(short, long, default_value = "session.json")]
        session: PathBuf,
    },
    /// Print the stored shopping list
    ShoppingList {
        #[arg(short, long, default_value = "session.json")]
        session: PathBuf,
    },
    /// List the meal labels accepted by `regenerate`
    Meals,
}

pub fn parse_args() -> Cli {
    Cli::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_defaults_preference_and_session() {
        let cli = Cli::try_parse_from(["pantry-planner", "plan", "--image", "fridge.jpg"]).unwrap();
        match cli.command {
            Command::Plan {
                image,
                preference,
                session,
            } => {
                assert_eq!(image, PathBuf::from("fridge.jpg"));
                assert_eq!(preference, "balanced");
                assert_eq!(session, PathBuf::from("session.json"));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn global_flags_follow_the_subcommand() {
        let cli = Cli::try_parse_from([
            "pantry-planner",
            "regenerate",
            "--meal",
            "Monday Lunch",
            "--retry-delay-secs",
            "5",
            "-v",
        ])
        .unwrap();
        assert_eq!(cli.retry_delay_secs, Some(5));
        assert!(cli.verbose);
        assert!(matches!(cli.command, Command::Regenerate { ref meal, .. } if meal == "Monday Lunch"));
    }

    #[test]
    fn timeout_help_describes_the_whole_command() {
        use clap::CommandFactory;
        let command = Cli::command();
        let timeout = command
            .get_arguments()
            .find(|arg| arg.get_id() == "timeout_secs")
            .unwrap();
        let help = timeout.get_help().unwrap().to_string();
        assert!(help.contains("whole command"));
        assert!(!help.contains("a model call"));
    }

    #[test]
    fn plan_requires_an_image() {
        assert!(Cli::try_parse_from(["pantry-planner", "plan"]).is_err());
    }
}
