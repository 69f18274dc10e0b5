//! brew-coach: coffee recipes that learn from taste feedback.
//!
//! A rated cup is diagnosed as under-, over- or balanced extraction
//! ([`engine::diagnosis`]); the diagnosis nudges a bounded grind / time offset
//! kept per grinder and brew method ([`engine::learning`]); the next recipe for
//! that pair carries the offset once enough samples are in ([`recipe`]).
//! [`journal`] persists the learning model and the brew log, and
//! [`capability`] answers whether an espresso machine can run a pressure
//! profile.

pub mod app;
pub mod capability;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod journal;
pub mod recipe;

pub use capability::{CapabilityCatalog, Compatibility};
pub use config::BrewConfig;
pub use engine::{
    diagnose, DiagnosisEngine, ExtractionDiagnosis, ExtractionState, LearnedAdjustment, LearningConfig,
    LearningKey, LearningRecord, LearningStore, TasteAttribute, TasteRating,
};
pub use error::{BrewError, Result};
pub use journal::{BrewJournal, ExportDocument, KvBackend};
pub use recipe::{BrewMethod, Recipe, RecipeEngine, Roast, Selections};
