use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};
use clap_complete::Shell;

use crate::engine::diagnosis::TasteRating;
use crate::journal::BackendKind;
use crate::recipe::{BrewMethod, Roast, Selections};

#[derive(Parser, Debug)]
#[command(name = "brew-coach")]
#[command(version)]
#[command(about = "Coffee recipes that learn from how your last cup tasted")]
pub struct Args {
    /// Directory holding the journal and brew-coach.toml
    #[arg(long, global = true, env = "BREW_COACH_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Explicit config file (defaults to <data-dir>/brew-coach.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Override the storage backend from the config file
    #[arg(long, global = true, value_enum)]
    pub backend: Option<BackendKind>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print a recipe, personalised by past feedback
    Recipe {
        #[command(flatten)]
        brew: BrewArgs,

        /// Also log the brew to history (without feedback)
        #[arg(long)]
        log: bool,
    },

    /// Rate a brew; updates learning and the history log
    Feedback {
        #[command(flatten)]
        brew: BrewArgs,

        /// Taste rating as attribute=score (0-10), repeatable
        #[arg(long = "rate", value_name = "ATTR=SCORE")]
        ratings: Vec<String>,

        /// Free-text tasting notes
        #[arg(long)]
        notes: Option<String>,
    },

    /// Show recent brews, newest first
    History {
        #[arg(long, default_value = "10")]
        limit: usize,
    },

    /// List learned adjustments
    Learning,

    /// Forget learned adjustments
    Reset {
        /// Forget every grinder / method pair
        #[arg(long, conflicts_with_all = ["method", "grinder"])]
        all: bool,

        #[arg(long, value_parser = parse_method, required_unless_present = "all")]
        method: Option<BrewMethod>,

        #[arg(long, required_unless_present = "all")]
        grinder: Option<String>,
    },

    /// Write history and learning to a portable JSON document
    Export {
        /// Output file (defaults to stdout)
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Replace history and learning with an exported document
    Import {
        file: PathBuf,
    },

    /// Check whether a machine can run a pressure profile
    CheckProfile {
        #[arg(long)]
        machine: String,

        #[arg(long)]
        profile: String,
    },

    /// List pressure profiles, or those a machine can run
    Profiles {
        #[arg(long)]
        machine: Option<String>,
    },

    /// List known espresso machine ids
    Machines,

    /// List grinders with a dedicated grind chart
    Grinders,

    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// The brew the user is making.
#[derive(ClapArgs, Debug, Clone)]
pub struct BrewArgs {
    #[arg(long, value_parser = parse_roast, default_value = "medium")]
    pub roast: Roast,

    #[arg(long, value_parser = parse_method)]
    pub method: BrewMethod,

    /// Grinder id, e.g. niche_zero or baratza_Encore
    #[arg(long)]
    pub grinder: String,

    /// Green coffee process (washed, natural, ...)
    #[arg(long)]
    pub process: Option<String>,

    #[arg(long)]
    pub water: Option<String>,

    #[arg(long)]
    pub hardness: Option<String>,
}

impl BrewArgs {
    pub fn selections(&self) -> Selections {
        Selections {
            roast: self.roast,
            method: self.method,
            grinder: self.grinder.clone(),
            process: self.process.clone(),
            water: self.water.clone(),
            hardness: self.hardness.clone(),
        }
    }
}

fn parse_method(s: &str) -> Result<BrewMethod, String> {
    s.parse().map_err(|e: crate::error::BrewError| e.to_string())
}

fn parse_roast(s: &str) -> Result<Roast, String> {
    s.parse().map_err(|e: crate::error::BrewError| e.to_string())
}

/// Turn `attr=score` strings into ratings.  Anything malformed is no signal.
pub fn ratings_from_args(raw: &[String]) -> TasteRating {
    TasteRating::from_pairs(raw.iter().filter_map(|r| r.split_once('=')))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::diagnosis::TasteAttribute;

    #[test]
    fn test_args_parse_recipe_minimal() {
        let args = Args::parse_from(["bc", "recipe", "--method", "espresso", "--grinder", "niche_zero"]);
        match args.command {
            Command::Recipe { brew: b, log } => {
                assert_eq!(b.method, BrewMethod::Espresso);
                assert_eq!(b.roast, Roast::Medium);
                assert_eq!(b.grinder, "niche_zero");
                assert!(b.process.is_none());
                assert!(!log);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_args_parse_feedback_ratings() {
        let args = Args::parse_from([
            "bc", "feedback", "--method", "v60", "--grinder", "ek43", "--roast", "light",
            "--rate", "acidity=2", "--rate", "sweetness=3", "--notes", "sharp",
        ]);
        match args.command {
            Command::Feedback { brew, ratings, notes } => {
                assert_eq!(brew.roast, Roast::Light);
                assert_eq!(ratings, vec!["acidity=2", "sweetness=3"]);
                assert_eq!(notes.as_deref(), Some("sharp"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_args_unknown_method_rejected() {
        let res = Args::try_parse_from(["bc", "recipe", "--method", "pour_over", "--grinder", "x"]);
        assert!(res.is_err());
    }

    #[test]
    fn test_args_global_data_dir_after_subcommand() {
        let args = Args::parse_from(["bc", "history", "--data-dir", "/tmp/bc"]);
        assert_eq!(args.data_dir, Some(PathBuf::from("/tmp/bc")));
    }

    #[test]
    fn test_args_backend_override() {
        let args = Args::parse_from(["bc", "--backend", "sqlite", "learning"]);
        assert_eq!(args.backend, Some(BackendKind::Sqlite));
    }

    #[test]
    fn test_args_reset_all_conflicts_with_key() {
        assert!(Args::try_parse_from(["bc", "reset", "--all", "--grinder", "ek43"]).is_err());
        assert!(Args::try_parse_from(["bc", "reset"]).is_err());
        assert!(Args::try_parse_from(["bc", "reset", "--all"]).is_ok());
        assert!(Args::try_parse_from(["bc", "reset", "--method", "v60", "--grinder", "ek43"]).is_ok());
    }

    #[test]
    fn test_args_history_default_limit() {
        let args = Args::parse_from(["bc", "history"]);
        assert!(matches!(args.command, Command::History { limit: 10 }));
    }

    #[test]
    fn test_args_listing_commands() {
        assert!(matches!(Args::parse_from(["bc", "machines"]).command, Command::Machines));
        assert!(matches!(Args::parse_from(["bc", "grinders"]).command, Command::Grinders));
    }

    #[test]
    fn test_ratings_from_args_skips_malformed() {
        let raw = vec!["acidity=2".to_string(), "body".to_string(), "flavor=great".to_string()];
        let r = ratings_from_args(&raw);
        assert_eq!(r.len(), 1);
        assert_eq!(r.get(TasteAttribute::Acidity), Some(2.0));
    }
}
