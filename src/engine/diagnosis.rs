//! # Stage: Extraction Diagnosis
//!
//! ## Responsibility
//! Converts a set of 0–10 taste ratings into an under / over / balanced
//! extraction classification with a confidence score.  Each rating is
//! centred on 5, weighted by a fixed per-attribute table, and accumulated
//! into an `under` or `over` score depending on the attribute's direction.
//!
//! ## Guarantees
//! - Deterministic: same ratings, same diagnosis
//! - Non-panicking: empty input yields `Balanced` with confidence 0
//! - `confidence >= 0` for every input
//!
//! ## NOT Responsible For
//! - Turning a diagnosis into grind / time offsets (see [`super::learning`])
//! - Parsing CLI arguments (the CLI hands over already-split pairs)

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Difference between the two scores required before a side wins.
pub const HYSTERESIS_MARGIN: f64 = 0.2;

/// Neutral point of the rating scale.
pub const NEUTRAL_SCORE: f64 = 5.0;

/// Upper end of the rating scale.
pub const MAX_SCORE: f64 = 10.0;

// ---------------------------------------------------------------------------
// TasteAttribute
// ---------------------------------------------------------------------------

/// A rated sensory attribute of a cup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TasteAttribute {
    Aroma,
    Flavor,
    Aftertaste,
    Acidity,
    Body,
    Balance,
    Sweetness,
    Overall,
}

impl TasteAttribute {
    pub fn name(self) -> &'static str {
        match self {
            TasteAttribute::Aroma      => "aroma",
            TasteAttribute::Flavor     => "flavor",
            TasteAttribute::Aftertaste => "aftertaste",
            TasteAttribute::Acidity    => "acidity",
            TasteAttribute::Body       => "body",
            TasteAttribute::Balance    => "balance",
            TasteAttribute::Sweetness  => "sweetness",
            TasteAttribute::Overall    => "overall",
        }
    }

    /// All eight attributes in form order.
    pub fn all() -> &'static [TasteAttribute] {
        &[
            TasteAttribute::Aroma,
            TasteAttribute::Flavor,
            TasteAttribute::Aftertaste,
            TasteAttribute::Acidity,
            TasteAttribute::Body,
            TasteAttribute::Balance,
            TasteAttribute::Sweetness,
            TasteAttribute::Overall,
        ]
    }

    /// Case-insensitive lookup by name.  Unknown names return `None`.
    pub fn parse(name: &str) -> Option<TasteAttribute> {
        let needle = name.trim().to_ascii_lowercase();
        Self::all().iter().copied().find(|a| a.name() == needle)
    }
}

impl std::fmt::Display for TasteAttribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

// ---------------------------------------------------------------------------
// TasteRating
// ---------------------------------------------------------------------------

/// Parse a raw form value into a score.
///
/// Blank, non-numeric, and non-finite values carry no signal and return
/// `None`.  Finite values are clamped into `[0, 10]`.
pub fn parse_score(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let v: f64 = trimmed.parse().ok()?;
    if !v.is_finite() {
        return None;
    }
    Some(v.clamp(0.0, MAX_SCORE))
}

/// Scores for whichever attributes the taster filled in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TasteRating {
    scores: BTreeMap<TasteAttribute, f64>,
}

impl TasteRating {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from raw `(attribute, value)` string pairs as a form would
    /// submit them.  Unknown attributes and unusable values are skipped.
    pub fn from_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut rating = Self::new();
        for (name, raw) in pairs {
            if let (Some(attr), Some(score)) = (TasteAttribute::parse(name), parse_score(raw)) {
                rating.scores.insert(attr, score);
            }
        }
        rating
    }

    /// Builder-style setter.  Non-finite scores are ignored.
    pub fn with(mut self, attr: TasteAttribute, score: f64) -> Self {
        self.set(attr, score);
        self
    }

    pub fn set(&mut self, attr: TasteAttribute, score: f64) {
        if score.is_finite() {
            self.scores.insert(attr, score.clamp(0.0, MAX_SCORE));
        }
    }

    pub fn get(&self, attr: TasteAttribute) -> Option<f64> {
        self.scores.get(&attr).copied()
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (TasteAttribute, f64)> + '_ {
        self.scores.iter().map(|(a, s)| (*a, *s))
    }
}

// ---------------------------------------------------------------------------
// Attribute table
// ---------------------------------------------------------------------------

/// Which side of extraction an attribute can testify to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Only a low score counts, and only toward under-extraction.
    Under,
    /// Only a high score counts, and only toward over-extraction.
    Over,
    /// Low scores count toward under, high scores toward over.
    Both,
}

/// Weight and direction for one attribute.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttributeSpec {
    pub weight: f64,
    pub direction: Direction,
}

/// Per-attribute weights and directions used by [`DiagnosisEngine`].
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeTable {
    specs: BTreeMap<TasteAttribute, AttributeSpec>,
}

impl AttributeTable {
    /// The stock table.
    pub fn builtin() -> Self {
        let mut specs = BTreeMap::new();
        for &attr in TasteAttribute::all() {
            specs.insert(attr, default_spec(attr));
        }
        Self { specs }
    }

    /// Override one attribute's spec.
    pub fn set(&mut self, attr: TasteAttribute, spec: AttributeSpec) {
        self.specs.insert(attr, spec);
    }

    pub fn get(&self, attr: TasteAttribute) -> Option<AttributeSpec> {
        self.specs.get(&attr).copied()
    }
}

impl Default for AttributeTable {
    fn default() -> Self {
        Self::builtin()
    }
}

fn default_spec(attr: TasteAttribute) -> AttributeSpec {
    let (weight, direction) = match attr {
        TasteAttribute::Aroma      => (0.5, Direction::Both),
        TasteAttribute::Flavor     => (1.5, Direction::Both),
        TasteAttribute::Aftertaste => (1.2, Direction::Both),
        TasteAttribute::Acidity    => (1.3, Direction::Under),
        TasteAttribute::Body       => (1.0, Direction::Both),
        TasteAttribute::Balance    => (1.5, Direction::Both),
        TasteAttribute::Sweetness  => (1.4, Direction::Under),
        TasteAttribute::Overall    => (1.0, Direction::Both),
    };
    AttributeSpec { weight, direction }
}

// ---------------------------------------------------------------------------
// Diagnosis types
// ---------------------------------------------------------------------------

/// Classified extraction state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionState {
    Under,
    Over,
    Balanced,
}

impl std::fmt::Display for ExtractionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractionState::Under    => write!(f, "under"),
            ExtractionState::Over     => write!(f, "over"),
            ExtractionState::Balanced => write!(f, "balanced"),
        }
    }
}

/// The side a single contribution was counted toward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lean {
    Under,
    Over,
}

/// How one rating fed into the diagnosis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionSignal {
    pub attribute: TasteAttribute,
    pub score: f64,
    /// `(score - 5) / 5`, in `[-1, 1]`.
    pub normalized: f64,
    /// `normalized * weight`.
    pub contribution: f64,
    /// `None` when the contribution was zero or pointed the way the
    /// attribute's direction ignores.
    pub counted: Option<Lean>,
}

/// Result of [`diagnose`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionDiagnosis {
    pub state: ExtractionState,
    /// `|under - over|`; unbounded, larger is more decisive.
    pub confidence: f64,
    #[serde(default)]
    pub signals: Vec<ExtractionSignal>,
}

impl ExtractionDiagnosis {
    /// A diagnosis with no signals, mostly useful in tests and replays.
    pub fn new(state: ExtractionState, confidence: f64) -> Self {
        Self { state, confidence, signals: Vec::new() }
    }

    /// Confidence formatted for display (two decimals).
    pub fn confidence_display(&self) -> String {
        format!("{:.2}", self.confidence)
    }

    /// One-line hint for the next brew.
    pub fn advice(&self) -> &'static str {
        match self.state {
            ExtractionState::Under    => "grind finer or extend contact time",
            ExtractionState::Over     => "grind coarser or shorten contact time",
            ExtractionState::Balanced => "keep the current recipe",
        }
    }
}

// ---------------------------------------------------------------------------
// DiagnosisEngine
// ---------------------------------------------------------------------------

/// Weighted taste-to-extraction classifier.
#[derive(Debug, Clone, Default)]
pub struct DiagnosisEngine {
    table: AttributeTable,
}

impl DiagnosisEngine {
    pub fn new(table: AttributeTable) -> Self {
        Self { table }
    }

    pub fn diagnose(&self, ratings: &TasteRating) -> ExtractionDiagnosis {
        let mut under = 0.0_f64;
        let mut over = 0.0_f64;
        let mut signals = Vec::with_capacity(ratings.len());

        for (attr, score) in ratings.iter() {
            let Some(spec) = self.table.get(attr) else { continue };
            let normalized = (score - NEUTRAL_SCORE) / NEUTRAL_SCORE;
            let contribution = normalized * spec.weight;

            let counted = match spec.direction {
                Direction::Under if contribution < 0.0 => Some(Lean::Under),
                Direction::Over if contribution > 0.0 => Some(Lean::Over),
                Direction::Both if contribution < 0.0 => Some(Lean::Under),
                Direction::Both if contribution > 0.0 => Some(Lean::Over),
                _ => None,
            };
            match counted {
                Some(Lean::Under) => under += contribution.abs(),
                Some(Lean::Over) => over += contribution,
                None => {}
            }

            signals.push(ExtractionSignal { attribute: attr, score, normalized, contribution, counted });
        }

        let state = if under > over + HYSTERESIS_MARGIN {
            ExtractionState::Under
        } else if over > under + HYSTERESIS_MARGIN {
            ExtractionState::Over
        } else {
            ExtractionState::Balanced
        };

        ExtractionDiagnosis { state, confidence: (under - over).abs(), signals }
    }
}

/// Diagnose with the stock attribute table.
pub fn diagnose(ratings: &TasteRating) -> ExtractionDiagnosis {
    DiagnosisEngine::default().diagnose(ratings)
}
