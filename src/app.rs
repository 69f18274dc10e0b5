//! # Stage: Command Runner
//!
//! ## Responsibility
//! Wire the parsed [`Command`] to the recipe engine, the capability catalog
//! and the [`BrewJournal`], writing human-readable output to any
//! [`Write`] sink.
//!
//! ## Guarantees
//! - State-changing commands (`feedback`, `reset`, `import`, `recipe --log`)
//!   save the journal before returning `Ok`
//! - Read-only commands never touch the backend
//!
//! ## NOT Responsible For
//! - Argument parsing (see [`crate::cli`])
//! - Logger installation (the binary does that)

use std::fs;
use std::io::Write;

use clap::CommandFactory;
use colored::*;

use crate::capability::{CapabilityCatalog, Compatibility};
use crate::cli::{ratings_from_args, Args, Command};
use crate::config::BrewConfig;
use crate::engine::diagnosis::ExtractionState;
use crate::engine::learning::LearningKey;
use crate::error::Result;
use crate::journal::{open_backend, BrewJournal};
use crate::recipe::RecipeEngine;

pub struct App {
    recipes: RecipeEngine,
    catalog: CapabilityCatalog,
    journal: BrewJournal,
}

impl App {
    pub fn new(journal: BrewJournal) -> Self {
        Self {
            recipes: RecipeEngine::default(),
            catalog: CapabilityCatalog::builtin(),
            journal,
        }
    }

    /// Open the configured backend and restore the journal from it.
    pub fn from_config(cfg: &BrewConfig) -> Result<Self> {
        let backend = open_backend(&cfg.storage)?;
        let journal = BrewJournal::open(backend, cfg.learning.clone(), cfg.history.clone());
        Ok(Self::new(journal))
    }

    pub fn journal(&self) -> &BrewJournal {
        &self.journal
    }

    pub fn execute(&mut self, command: Command, out: &mut dyn Write) -> Result<()> {
        match command {
            Command::Recipe { brew, log } => {
                let recipe = self.recipes.recommend(&brew.selections());
                let personal = self.recipes.personalize(&recipe, self.journal.store());
                writeln!(out, "{}", personal.render())?;
                if log {
                    let id = self.journal.record_brew(&recipe);
                    self.journal.save()?;
                    writeln!(out, "\nLogged brew {}", id.to_string().dimmed())?;
                }
            }

            Command::Feedback { brew, ratings, notes } => {
                let recipe = self.recipes.recommend(&brew.selections());
                let ratings = ratings_from_args(&ratings);
                let outcome = self.journal.record_feedback(&recipe, ratings, notes);
                self.journal.save()?;

                let d = &outcome.diagnosis;
                writeln!(
                    out,
                    "Diagnosis: {} (confidence {})",
                    paint_state(d.state),
                    d.confidence_display()
                )?;
                writeln!(out, "{}", d.advice())?;
                let rec = outcome.update.record;
                writeln!(
                    out,
                    "Learning for {}: grind {:+.2}, time {:+.1}s after {} sample(s)",
                    outcome.key, rec.grind_offset, rec.time_offset, rec.sample_count
                )?;
            }

            Command::History { limit } => {
                let history = self.journal.history();
                if history.is_empty() {
                    writeln!(out, "No brews logged yet.")?;
                }
                for record in history.recent(limit) {
                    writeln!(out, "{} {}", "#".dimmed(), record.id.to_string().dimmed())?;
                    writeln!(out, "{}\n", record.summary())?;
                }
            }

            Command::Learning => {
                let store = self.journal.store();
                if store.is_empty() {
                    writeln!(out, "No learning data yet.")?;
                }
                let gate = store.config().min_samples;
                for (key, rec) in store.iter() {
                    let status = if rec.sample_count >= gate { "active".green() } else { "collecting".yellow() };
                    writeln!(
                        out,
                        "{}: grind {:+.2}, time {:+.1}s, {} sample(s) [{}]",
                        key.to_string().bold(),
                        rec.grind_offset,
                        rec.time_offset,
                        rec.sample_count,
                        status
                    )?;
                }
            }

            Command::Reset { all, method, grinder } => {
                if all {
                    self.journal.reset_all();
                    self.journal.save()?;
                    writeln!(out, "Cleared all learned adjustments.")?;
                } else if let (Some(method), Some(grinder)) = (method, grinder) {
                    let key = LearningKey::new(grinder, method.id());
                    let removed = self.journal.reset(&key);
                    self.journal.save()?;
                    if removed {
                        writeln!(out, "Cleared learning for {}.", key)?;
                    } else {
                        writeln!(out, "Nothing learned for {}.", key)?;
                    }
                }
            }

            Command::Export { output } => {
                let json = self.journal.export().to_json()?;
                match output {
                    Some(path) => {
                        fs::write(&path, json)?;
                        writeln!(out, "Exported to {}", path.display())?;
                    }
                    None => writeln!(out, "{}", json)?,
                }
            }

            Command::Import { file } => {
                let json = fs::read_to_string(&file)?;
                let summary = self.journal.import_json(&json)?;
                writeln!(
                    out,
                    "Imported {} brew(s) and {} learning record(s).",
                    summary.brews, summary.learning_records
                )?;
            }

            Command::CheckProfile { machine, profile } => {
                let verdict = self.catalog.evaluate_pressure_profile(&machine, &profile);
                writeln!(out, "{}", paint_verdict(&verdict))?;
            }

            Command::Profiles { machine } => match machine {
                Some(id) => {
                    let profiles = self.catalog.compatible_profiles(&id);
                    if profiles.is_empty() {
                        writeln!(out, "No profiles available for '{}'.", id)?;
                    }
                    for (pid, verdict) in profiles {
                        match verdict.reason() {
                            Some(w) => writeln!(out, "{} ({})", pid, w.yellow())?,
                            None => writeln!(out, "{}", pid)?,
                        }
                    }
                }
                None => {
                    for pid in self.catalog.profile_ids() {
                        writeln!(out, "{}", pid)?;
                    }
                }
            },

            Command::Machines => {
                for id in self.catalog.machine_ids() {
                    let name = self.catalog.machine(id).map(|m| m.name.as_str()).unwrap_or_default();
                    writeln!(out, "{:<24} {}", id, name.dimmed())?;
                }
            }

            Command::Grinders => {
                for id in self.recipes.grinders().grinders() {
                    writeln!(out, "{}", id)?;
                }
            }

            Command::Completions { shell } => {
                clap_complete::generate(shell, &mut Args::command(), "brew-coach", out);
            }
        }
        Ok(())
    }
}

fn paint_state(state: ExtractionState) -> ColoredString {
    let label = state.to_string();
    match state {
        ExtractionState::Under    => label.yellow().bold(),
        ExtractionState::Over     => label.red().bold(),
        ExtractionState::Balanced => label.green().bold(),
    }
}

fn paint_verdict(verdict: &Compatibility) -> String {
    match verdict {
        Compatibility::Compatible => format!("{}", "compatible".green()),
        Compatibility::CompatibleWithWarning { warning } => {
            format!("{}: {}", "compatible with warning".yellow(), warning)
        }
        Compatibility::Incompatible { reason } => format!("{}: {}", "incompatible".red(), reason),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::BrewArgs;
    use crate::engine::learning::LearningConfig;
    use crate::journal::{HistoryConfig, MemoryBackend};
    use crate::recipe::{BrewMethod, Roast};

    fn app() -> App {
        colored::control::set_override(false);
        App::new(BrewJournal::open(
            Box::new(MemoryBackend::new()),
            LearningConfig::default(),
            HistoryConfig::default(),
        ))
    }

    fn brew() -> BrewArgs {
        BrewArgs {
            roast: Roast::Medium,
            method: BrewMethod::Espresso,
            grinder: "niche_zero".into(),
            process: None,
            water: None,
            hardness: None,
        }
    }

    fn run(app: &mut App, cmd: Command) -> String {
        let mut buf = Vec::new();
        app.execute(cmd, &mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    fn sour_feedback() -> Command {
        Command::Feedback {
            brew: brew(),
            ratings: vec!["acidity=2".into(), "sweetness=2".into()],
            notes: None,
        }
    }

    #[test]
    fn test_recipe_without_learning() {
        let mut a = app();
        let text = run(&mut a, Command::Recipe { brew: brew(), log: false });
        assert!(text.contains("Temperature: 92°C"));
        assert!(text.contains("no learning data yet"));
        assert!(a.journal().history().is_empty());
    }

    #[test]
    fn test_recipe_log_records_brew() {
        let mut a = app();
        run(&mut a, Command::Recipe { brew: brew(), log: true });
        assert_eq!(a.journal().history().len(), 1);
    }

    #[test]
    fn test_feedback_then_recipe_applies_after_gate() {
        let mut a = app();
        for _ in 0..3 {
            let text = run(&mut a, sour_feedback());
            assert!(text.contains("under"));
        }
        let text = run(&mut a, Command::Recipe { brew: brew(), log: false });
        assert!(text.contains("Personal Adjustment"));
        assert!(text.contains("learned from 3 samples"));
    }

    #[test]
    fn test_reset_reports_missing_key() {
        let mut a = app();
        let text = run(
            &mut a,
            Command::Reset { all: false, method: Some(BrewMethod::V60), grinder: Some("ek43".into()) },
        );
        assert!(text.contains("Nothing learned"));
        run(&mut a, sour_feedback());
        let text = run(
            &mut a,
            Command::Reset { all: false, method: Some(BrewMethod::Espresso), grinder: Some("niche_zero".into()) },
        );
        assert!(text.contains("Cleared learning for niche_zero / espresso"));
        assert!(a.journal().store().is_empty());
    }

    #[test]
    fn test_check_profile_verdicts() {
        let mut a = app();
        let text = run(
            &mut a,
            Command::CheckProfile { machine: "gaggia-classic-pro".into(), profile: "blooming".into() },
        );
        assert!(text.starts_with("incompatible"));
        let text = run(
            &mut a,
            Command::CheckProfile { machine: "decent-de1".into(), profile: "classic_9bar".into() },
        );
        assert_eq!(text.trim(), "compatible");
    }

    #[test]
    fn test_export_to_file_and_import_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("export.json");

        let mut source = app();
        run(&mut source, sour_feedback());
        run(&mut source, Command::Export { output: Some(path.clone()) });

        let mut target = app();
        let text = run(&mut target, Command::Import { file: path });
        assert!(text.contains("Imported 1 brew(s) and 1 learning record(s)"));
    }

    #[test]
    fn test_machines_lists_catalog_ids() {
        let mut a = app();
        let text = run(&mut a, Command::Machines);
        assert!(text.lines().any(|l| l.starts_with("decent-de1") && l.contains("Decent DE1")));
        assert_eq!(text.lines().count(), a.catalog.machine_ids().count());
    }

    #[test]
    fn test_grinders_lists_chart() {
        let mut a = app();
        let text = run(&mut a, Command::Grinders);
        assert!(text.lines().any(|l| l == "niche_zero"));
    }

    #[test]
    fn test_completions_emit_script() {
        let mut a = app();
        let text = run(&mut a, Command::Completions { shell: clap_complete::Shell::Bash });
        assert!(text.contains("brew-coach"));
    }
}
