//! Brew history log.
//!
//! A bounded ring of past brews with the feedback and diagnosis that came
//! with them.  Oldest entries are evicted first once `capacity` is reached.

use std::collections::VecDeque;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::diagnosis::{ExtractionDiagnosis, TasteRating};
use crate::recipe::{Recipe, Selections};

/// Current Unix time in milliseconds.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Maximum number of brews kept.
    pub capacity: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { capacity: 500 }
    }
}

/// What the taster reported.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    #[serde(default)]
    pub ratings: TasteRating,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// One logged brew.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrewRecord {
    pub id: Uuid,
    pub timestamp_ms: u64,
    pub selections: Selections,
    pub temperature_c: i32,
    pub ratio: String,
    pub grind: String,
    #[serde(default)]
    pub feedback: Feedback,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnosis: Option<ExtractionDiagnosis>,
}

impl BrewRecord {
    pub fn new(recipe: &Recipe, feedback: Feedback, diagnosis: Option<ExtractionDiagnosis>) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp_ms: now_ms(),
            selections: recipe.selections.clone(),
            temperature_c: recipe.temperature_c,
            ratio: recipe.ratio.clone(),
            grind: recipe.grind.clone(),
            feedback,
            diagnosis,
        }
    }

    /// Short multi-line summary for listings.
    pub fn summary(&self) -> String {
        let s = &self.selections;
        let mut out = format!(
            "Method: {} | Roast: {} | Grinder: {}\nTemp: {}°C | Ratio: {} | Grind: {}",
            s.method, s.roast, s.grinder, self.temperature_c, self.ratio, self.grind
        );
        if !self.feedback.ratings.is_empty() {
            let parts: Vec<String> = self
                .feedback
                .ratings
                .iter()
                .map(|(a, v)| format!("{} {}", a, v))
                .collect();
            out.push_str(&format!("\nFeedback: {}", parts.join(", ")));
        }
        if let Some(notes) = &self.feedback.notes {
            out.push_str(&format!("\nNotes: {}", notes));
        }
        if let Some(d) = &self.diagnosis {
            out.push_str(&format!(
                "\nDiagnosis: {} (confidence {})",
                d.state,
                d.confidence_display()
            ));
        }
        out
    }
}

/// Bounded brew log, oldest at the front.
#[derive(Debug, Clone)]
pub struct BrewHistory {
    entries: VecDeque<BrewRecord>,
    capacity: usize,
}

impl Default for BrewHistory {
    fn default() -> Self {
        Self::new(HistoryConfig::default())
    }
}

impl BrewHistory {
    pub fn new(config: HistoryConfig) -> Self {
        let capacity = config.capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity.min(256)),
            capacity,
        }
    }

    /// Rebuild from a persisted list, keeping the newest `capacity` entries.
    pub fn from_records(config: HistoryConfig, records: Vec<BrewRecord>) -> Self {
        let mut history = Self::new(config);
        for r in records {
            history.push(r);
        }
        history
    }

    pub fn push(&mut self, record: BrewRecord) {
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(record);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &BrewRecord> {
        self.entries.iter()
    }

    /// Newest first, at most `n`.
    pub fn recent(&self, n: usize) -> impl Iterator<Item = &BrewRecord> {
        self.entries.iter().rev().take(n)
    }

    pub fn get(&self, id: Uuid) -> Option<&BrewRecord> {
        self.entries.iter().find(|r| r.id == id)
    }

    pub fn to_records(&self) -> Vec<BrewRecord> {
        self.entries.iter().cloned().collect()
    }
}
