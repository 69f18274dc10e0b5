//! # Stage: Learning Store
//!
//! ## Responsibility
//! Keeps one small grind / time offset per (equipment, method) pair and
//! nudges it after every diagnosed brew.  Offsets are only surfaced once a
//! pair has collected enough samples to be trusted.
//!
//! ## Guarantees
//! - Bounded: `grind_offset ∈ [-grind_bound, grind_bound]` and
//!   `time_offset ∈ [-time_bound, time_bound]` after every call, including
//!   restores from persisted models
//! - Gated: [`LearningStore::apply`] never adjusts a recipe for a key with
//!   fewer than `min_samples` samples
//! - Read-only apply: `apply` takes `&self`
//! - Non-panicking: NaN / negative confidence is treated as noise, and a NaN
//!   bound clamps offsets to zero
//!
//! ## NOT Responsible For
//! - Persisting the model (see [`crate::journal`])
//! - Diagnosing ratings (see [`super::diagnosis`])

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use super::diagnosis::{ExtractionDiagnosis, ExtractionState};
use crate::error::{BrewError, Result};

// ---------------------------------------------------------------------------
// LearningConfig
// ---------------------------------------------------------------------------

/// Tuning constants for the learning store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearningConfig {
    /// Samples required before offsets are applied.
    pub min_samples: u32,
    /// Grind offset is clamped to `±grind_bound` clicks.
    pub grind_bound: f64,
    /// Time offset is clamped to `±time_bound` seconds.
    pub time_bound: f64,
    /// Confidence that maps to full strength.
    pub confidence_scale: f64,
    /// Strength below which feedback only counts as a sample.
    pub noise_floor: f64,
    /// Grind clicks moved per unit of strength.
    pub grind_step: f64,
    /// Seconds moved per unit of strength.
    pub time_step: f64,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            min_samples: 3,
            grind_bound: 4.0,
            time_bound: 12.0,
            confidence_scale: 3.0,
            noise_floor: 0.15,
            grind_step: 0.5,
            time_step: 1.0,
        }
    }
}

impl LearningConfig {
    /// Map a diagnosis confidence onto `[0, 1]`.
    pub fn strength(&self, confidence: f64) -> f64 {
        if confidence.is_nan() || confidence <= 0.0 || self.confidence_scale <= 0.0 {
            return 0.0;
        }
        (confidence / self.confidence_scale).min(1.0)
    }

    /// Reject values the update rule cannot work with: every bound, step,
    /// scale and floor must be finite and non-negative, and the scale
    /// strictly positive.
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("grind_bound", self.grind_bound),
            ("time_bound", self.time_bound),
            ("confidence_scale", self.confidence_scale),
            ("noise_floor", self.noise_floor),
            ("grind_step", self.grind_step),
            ("time_step", self.time_step),
        ];
        for (name, v) in fields {
            if !v.is_finite() || v < 0.0 {
                return Err(BrewError::InvalidSetting(format!(
                    "learning.{} must be a finite, non-negative number (got {})",
                    name, v
                )));
            }
        }
        if self.confidence_scale == 0.0 {
            return Err(BrewError::InvalidSetting("learning.confidence_scale must be greater than 0".to_string()));
        }
        Ok(())
    }

    // A NaN bound would make f64::clamp panic; treat it as zero drift.
    fn clamp_grind(&self, v: f64) -> f64 {
        clamp_offset(v, self.grind_bound)
    }

    fn clamp_time(&self, v: f64) -> f64 {
        clamp_offset(v, self.time_bound)
    }
}

fn clamp_offset(v: f64, bound: f64) -> f64 {
    let b = bound.abs();
    if v.is_nan() || b.is_nan() {
        0.0
    } else {
        v.clamp(-b, b)
    }
}

// ---------------------------------------------------------------------------
// Key and record
// ---------------------------------------------------------------------------

/// Identifies one adjustment slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LearningKey {
    /// Grinder (or other equipment) identifier.
    pub equipment: String,
    /// Brew method identifier.
    pub method: String,
}

impl LearningKey {
    pub fn new(equipment: impl Into<String>, method: impl Into<String>) -> Self {
        Self { equipment: equipment.into(), method: method.into() }
    }
}

impl std::fmt::Display for LearningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} / {}", self.equipment, self.method)
    }
}

/// Accumulated personal adjustment for one key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearningRecord {
    pub grind_offset: f64,
    pub time_offset: f64,
    pub sample_count: u32,
}

/// Persisted shape of the whole store: `equipment -> method -> record`.
pub type LearningModel = BTreeMap<String, BTreeMap<String, LearningRecord>>;

// ---------------------------------------------------------------------------
// Update / apply results
// ---------------------------------------------------------------------------

/// What a single [`LearningStore::update`] call did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UpdateOutcome {
    pub strength: f64,
    /// `true` if the offsets were moved (before clamping).
    pub offsets_moved: bool,
    pub record: LearningRecord,
}

/// Result of [`LearningStore::apply`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LearnedAdjustment {
    pub grind: f64,
    pub time: f64,
    pub learning_applied: bool,
    pub reason: String,
}

// ---------------------------------------------------------------------------
// LearningStore
// ---------------------------------------------------------------------------

/// Per-(equipment, method) offset memory.
#[derive(Debug, Clone, Default)]
pub struct LearningStore {
    config: LearningConfig,
    records: HashMap<LearningKey, LearningRecord>,
}

impl LearningStore {
    pub fn new(config: LearningConfig) -> Self {
        Self { config, records: HashMap::new() }
    }

    pub fn config(&self) -> &LearningConfig {
        &self.config
    }

    /// Fold one diagnosis into the record for `key`.
    pub fn update(&mut self, key: &LearningKey, diagnosis: &ExtractionDiagnosis) -> UpdateOutcome {
        let cfg = &self.config;
        let strength = cfg.strength(diagnosis.confidence);
        let record = self.records.entry(key.clone()).or_default();

        let mut offsets_moved = false;
        if strength >= cfg.noise_floor {
            match diagnosis.state {
                ExtractionState::Under => {
                    record.grind_offset -= cfg.grind_step * strength;
                    record.time_offset += cfg.time_step * strength;
                    offsets_moved = true;
                }
                ExtractionState::Over => {
                    record.grind_offset += cfg.grind_step * strength;
                    record.time_offset -= cfg.time_step * strength;
                    offsets_moved = true;
                }
                ExtractionState::Balanced => {}
            }
        }

        record.grind_offset = cfg.clamp_grind(record.grind_offset);
        record.time_offset = cfg.clamp_time(record.time_offset);
        record.sample_count = record.sample_count.saturating_add(1);

        tracing::debug!(
            target: "brew_coach::learning",
            key = %key,
            state = %diagnosis.state,
            strength,
            offsets_moved,
            grind_offset = record.grind_offset,
            time_offset = record.time_offset,
            samples = record.sample_count,
            "learning record updated"
        );

        UpdateOutcome { strength, offsets_moved, record: *record }
    }

    /// Layer the learned offsets for `key` over a base grind and time.
    pub fn apply(&self, key: &LearningKey, base_grind: f64, base_time: f64) -> LearnedAdjustment {
        let unchanged = |reason: String| LearnedAdjustment {
            grind: base_grind,
            time: base_time,
            learning_applied: false,
            reason,
        };

        let Some(record) = self.records.get(key) else {
            return unchanged("no learning data yet".to_string());
        };

        if record.sample_count < self.config.min_samples {
            return unchanged(format!(
                "collecting feedback ({}/{} samples)",
                record.sample_count, self.config.min_samples
            ));
        }

        LearnedAdjustment {
            grind: base_grind + record.grind_offset,
            time: base_time + record.time_offset,
            learning_applied: true,
            reason: format!("learned from {} samples", record.sample_count),
        }
    }

    pub fn record(&self, key: &LearningKey) -> Option<&LearningRecord> {
        self.records.get(key)
    }

    /// Delete one record.  Returns `true` if it existed.
    pub fn reset(&mut self, key: &LearningKey) -> bool {
        self.records.remove(key).is_some()
    }

    pub fn reset_all(&mut self) {
        self.records.clear();
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records sorted by key.
    pub fn iter(&self) -> impl Iterator<Item = (&LearningKey, &LearningRecord)> {
        let mut entries: Vec<_> = self.records.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries.into_iter()
    }

    // -----------------------------------------------------------------------
    // Persisted model conversion
    // -----------------------------------------------------------------------

    pub fn to_model(&self) -> LearningModel {
        let mut model = LearningModel::new();
        for (key, record) in &self.records {
            model
                .entry(key.equipment.clone())
                .or_default()
                .insert(key.method.clone(), *record);
        }
        model
    }

    /// Rebuild a store from a persisted model.  Offsets outside the bounds
    /// are clamped on the way in.
    pub fn from_model(config: LearningConfig, model: &LearningModel) -> Self {
        let mut records = HashMap::new();
        for (equipment, methods) in model {
            for (method, record) in methods {
                let restored = LearningRecord {
                    grind_offset: config.clamp_grind(record.grind_offset),
                    time_offset: config.clamp_time(record.time_offset),
                    sample_count: record.sample_count,
                };
                records.insert(LearningKey::new(equipment.clone(), method.clone()), restored);
            }
        }
        Self { config, records }
    }
}

// ---------------------------------------------------------------------------
// Shared handle
// ---------------------------------------------------------------------------

/// Thread-safe handle for callers that serve more than one request at a time.
pub type SharedLearningStore = Arc<Mutex<LearningStore>>;

pub fn new_shared_store(config: LearningConfig) -> SharedLearningStore {
    Arc::new(Mutex::new(LearningStore::new(config)))
}

/// Run [`LearningStore::update`] under the lock.
pub fn shared_update(
    store: &SharedLearningStore,
    key: &LearningKey,
    diagnosis: &ExtractionDiagnosis,
) -> Result<UpdateOutcome> {
    let mut guard = store.lock().map_err(|_| BrewError::LockPoisoned)?;
    Ok(guard.update(key, diagnosis))
}

/// Run [`LearningStore::apply`] under the lock.
pub fn shared_apply(
    store: &SharedLearningStore,
    key: &LearningKey,
    base_grind: f64,
    base_time: f64,
) -> Result<LearnedAdjustment> {
    let guard = store.lock().map_err(|_| BrewError::LockPoisoned)?;
    Ok(guard.apply(key, base_grind, base_time))
}
