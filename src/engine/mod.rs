//! # Module: engine
//!
//! Taste feedback core: diagnose a cup, then fold the diagnosis into a
//! bounded per-equipment adjustment.
//!
//! ## Sub-modules
//! - [`diagnosis`] — ratings → under / over / balanced with confidence
//! - [`learning`]  — per-(equipment, method) grind / time offsets with a sample gate

pub mod diagnosis;
pub mod learning;

pub use diagnosis::{
    diagnose, parse_score, AttributeSpec, AttributeTable, DiagnosisEngine, Direction,
    ExtractionDiagnosis, ExtractionSignal, ExtractionState, Lean, TasteAttribute, TasteRating,
};
pub use learning::{
    new_shared_store, shared_apply, shared_update, LearnedAdjustment, LearningConfig, LearningKey,
    LearningModel, LearningRecord, LearningStore, SharedLearningStore, UpdateOutcome,
};
