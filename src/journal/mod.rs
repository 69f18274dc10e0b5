//! # Stage: Brew Journal
//!
//! ## Responsibility
//! Owns the learning store and the brew history, loads them from a
//! [`KvBackend`] at startup, writes them back on [`BrewJournal::save`], and
//! implements export / import of the portable document.
//!
//! ## Guarantees
//! - Startup never fails on bad data: an unreadable or corrupt slot is
//!   logged and treated as empty
//! - All-or-nothing import: a rejected document, or a save failure after an
//!   accepted one, leaves the in-memory state exactly as it was
//!
//! ## NOT Responsible For
//! - Recipe lookup (see [`crate::recipe`])
//! - Rendering (the CLI prints whatever this returns)

pub mod backend;
pub mod history;
pub mod transfer;

use serde::de::DeserializeOwned;
use uuid::Uuid;

pub use backend::{open_backend, BackendKind, FileBackend, KvBackend, MemoryBackend, Slot, SqliteBackend, StorageConfig};
pub use history::{now_ms, BrewHistory, BrewRecord, Feedback, HistoryConfig};
pub use transfer::{ExportDocument, EXPORT_VERSION};

use crate::engine::diagnosis::{DiagnosisEngine, ExtractionDiagnosis, TasteRating};
use crate::engine::learning::{LearningConfig, LearningKey, LearningModel, LearningStore, UpdateOutcome};
use crate::error::Result;
use crate::recipe::Recipe;

/// Everything produced by one feedback submission.
#[derive(Debug, Clone)]
pub struct FeedbackOutcome {
    pub record_id: Uuid,
    pub key: LearningKey,
    pub diagnosis: ExtractionDiagnosis,
    pub update: UpdateOutcome,
}

/// Counts reported after a successful import.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportSummary {
    pub brews: usize,
    pub learning_records: usize,
}

/// Learning store + brew history bound to a persistence backend.
pub struct BrewJournal {
    engine: DiagnosisEngine,
    learning_cfg: LearningConfig,
    history_cfg: HistoryConfig,
    store: LearningStore,
    history: BrewHistory,
    backend: Box<dyn KvBackend>,
}

impl BrewJournal {
    /// Restore state from `backend`, falling back to empty per slot.
    pub fn open(backend: Box<dyn KvBackend>, learning_cfg: LearningConfig, history_cfg: HistoryConfig) -> Self {
        let model: LearningModel = load_slot(backend.as_ref(), Slot::LearningModel).unwrap_or_default();
        let records: Vec<BrewRecord> = load_slot(backend.as_ref(), Slot::History).unwrap_or_default();

        let store = LearningStore::from_model(learning_cfg.clone(), &model);
        let history = BrewHistory::from_records(history_cfg.clone(), records);

        tracing::debug!(
            target: "brew_coach::journal",
            backend = backend.name(),
            brews = history.len(),
            learning_records = store.len(),
            "journal opened"
        );

        Self {
            engine: DiagnosisEngine::default(),
            learning_cfg,
            history_cfg,
            store,
            history,
            backend,
        }
    }

    pub fn store(&self) -> &LearningStore {
        &self.store
    }

    pub fn history(&self) -> &BrewHistory {
        &self.history
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Diagnose the ratings, fold the result into the learning store, and
    /// append the brew to the history.  Call [`save`](Self::save) to persist.
    pub fn record_feedback(&mut self, recipe: &Recipe, ratings: TasteRating, notes: Option<String>) -> FeedbackOutcome {
        let diagnosis = self.engine.diagnose(&ratings);
        let key = recipe.selections.learning_key();
        let update = self.store.update(&key, &diagnosis);

        let notes = notes.filter(|n| !n.trim().is_empty());
        let record = BrewRecord::new(recipe, Feedback { ratings, notes }, Some(diagnosis.clone()));
        let record_id = record.id;
        self.history.push(record);

        tracing::info!(
            target: "brew_coach::journal",
            key = %key,
            state = %diagnosis.state,
            confidence = diagnosis.confidence,
            samples = update.record.sample_count,
            "feedback recorded"
        );

        FeedbackOutcome { record_id, key, diagnosis, update }
    }

    /// Log a brew without feedback.
    pub fn record_brew(&mut self, recipe: &Recipe) -> Uuid {
        let record = BrewRecord::new(recipe, Feedback::default(), None);
        let id = record.id;
        self.history.push(record);
        id
    }

    pub fn reset(&mut self, key: &LearningKey) -> bool {
        self.store.reset(key)
    }

    pub fn reset_all(&mut self) {
        self.store.reset_all();
    }

    /// Write both slots.
    pub fn save(&mut self) -> Result<()> {
        let history = serde_json::to_string(&self.history.to_records())?;
        let model = serde_json::to_string(&self.store.to_model())?;
        self.backend.write(Slot::History, &history)?;
        self.backend.write(Slot::LearningModel, &model)?;
        tracing::debug!(target: "brew_coach::journal", backend = self.backend.name(), "journal saved");
        Ok(())
    }

    pub fn export(&self) -> ExportDocument {
        ExportDocument {
            version: EXPORT_VERSION,
            exported_at: now_ms(),
            brew_history: self.history.to_records(),
            learning_model: self.store.to_model(),
        }
    }

    /// Validate `json`, replace history and learning model wholesale, and
    /// save.  On any error the journal is left untouched.
    pub fn import_json(&mut self, json: &str) -> Result<ImportSummary> {
        let doc = ExportDocument::parse(json)?;

        let store = LearningStore::from_model(self.learning_cfg.clone(), &doc.learning_model);
        let history = BrewHistory::from_records(self.history_cfg.clone(), doc.brew_history);
        let summary = ImportSummary { brews: history.len(), learning_records: store.len() };

        let old_store = std::mem::replace(&mut self.store, store);
        let old_history = std::mem::replace(&mut self.history, history);

        if let Err(e) = self.save() {
            self.store = old_store;
            self.history = old_history;
            tracing::warn!(target: "brew_coach::journal", error = %e, "import rolled back: save failed");
            // A slot may already hold the imported data; put the old state back.
            if let Err(restore) = self.save() {
                tracing::warn!(target: "brew_coach::journal", error = %restore, "could not restore previous slots");
            }
            return Err(e);
        }

        tracing::info!(
            target: "brew_coach::journal",
            brews = summary.brews,
            learning_records = summary.learning_records,
            "import applied"
        );
        Ok(summary)
    }
}

fn load_slot<T: DeserializeOwned>(backend: &dyn KvBackend, slot: Slot) -> Option<T> {
    let raw = match backend.read(slot) {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(e) => {
            tracing::warn!(target: "brew_coach::journal", %slot, error = %e, "slot unreadable; starting empty");
            return None;
        }
    };
    match serde_json::from_str(&raw) {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::warn!(target: "brew_coach::journal", %slot, error = %e, "slot corrupt; starting empty");
            None
        }
    }
}
