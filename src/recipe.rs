//! # Stage: Recipe Engine
//!
//! ## Responsibility
//! Turns roast / method / grinder selections into a base recipe (water
//! temperature, brew ratio, grind recommendation, base brew time) and layers
//! learned offsets from the [`LearningStore`] on top.
//!
//! ## Guarantees
//! - Unknown grinders or methods missing from a grinder's row fall back to
//!   the method's generic grind category
//! - Tables are plain values handed to [`RecipeEngine::new`]
//!
//! ## NOT Responsible For
//! - Updating learning data (see [`crate::journal::BrewJournal::record_feedback`])

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::engine::learning::{LearnedAdjustment, LearningKey, LearningStore};
use crate::error::BrewError;

/// Water temperature before roast adjustment, °C.
pub const BASE_TEMPERATURE_C: i32 = 92;

// ---------------------------------------------------------------------------
// Selections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Roast {
    Light,
    #[default]
    Medium,
    Dark,
}

impl Roast {
    pub fn id(self) -> &'static str {
        match self {
            Roast::Light  => "light",
            Roast::Medium => "medium",
            Roast::Dark   => "dark",
        }
    }

    /// Offset from [`BASE_TEMPERATURE_C`].
    pub fn temperature_offset(self) -> i32 {
        match self {
            Roast::Light  => 2,
            Roast::Medium => 0,
            Roast::Dark   => -2,
        }
    }
}

impl FromStr for Roast {
    type Err = BrewError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "light"  => Ok(Roast::Light),
            "medium" => Ok(Roast::Medium),
            "dark"   => Ok(Roast::Dark),
            other    => Err(BrewError::UnknownRoast(other.to_string())),
        }
    }
}

impl std::fmt::Display for Roast {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BrewMethod {
    Espresso,
    V60,
    Chemex,
    FrenchPress,
    Aeropress,
    Siphon,
    ColdBrew,
    MokaPot,
    BatchBrew,
}

impl BrewMethod {
    pub fn id(self) -> &'static str {
        match self {
            BrewMethod::Espresso    => "espresso",
            BrewMethod::V60         => "v60",
            BrewMethod::Chemex      => "chemex",
            BrewMethod::FrenchPress => "french_press",
            BrewMethod::Aeropress   => "aeropress",
            BrewMethod::Siphon      => "siphon",
            BrewMethod::ColdBrew    => "cold_brew",
            BrewMethod::MokaPot     => "moka_pot",
            BrewMethod::BatchBrew   => "batch_brew",
        }
    }

    pub fn all() -> &'static [BrewMethod] {
        &[
            BrewMethod::Espresso,
            BrewMethod::V60,
            BrewMethod::Chemex,
            BrewMethod::FrenchPress,
            BrewMethod::Aeropress,
            BrewMethod::Siphon,
            BrewMethod::ColdBrew,
            BrewMethod::MokaPot,
            BrewMethod::BatchBrew,
        ]
    }

    /// Brew ratio as coffee:water.
    pub fn ratio(self) -> &'static str {
        match self {
            BrewMethod::Espresso => "1:2",
            BrewMethod::ColdBrew => "1:8",
            _ => "1:16",
        }
    }

    /// Generic grind category, used when the grinder has no entry.
    pub fn grind_category(self) -> &'static str {
        match self {
            BrewMethod::Espresso    => "Fine",
            BrewMethod::FrenchPress => "Medium-Coarse",
            _ => "Medium-Fine",
        }
    }

    /// Starting contact / shot time in seconds.
    pub fn base_time_s(self) -> f64 {
        match self {
            BrewMethod::Espresso    => 28.0,
            BrewMethod::V60         => 180.0,
            BrewMethod::Chemex      => 240.0,
            BrewMethod::FrenchPress => 240.0,
            BrewMethod::Aeropress   => 120.0,
            BrewMethod::Siphon      => 90.0,
            BrewMethod::ColdBrew    => 43_200.0,
            BrewMethod::MokaPot     => 300.0,
            BrewMethod::BatchBrew   => 300.0,
        }
    }
}

impl FromStr for BrewMethod {
    type Err = BrewError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase().replace('-', "_");
        // Some grinder charts label the French press column plain "press".
        if needle == "press" {
            return Ok(BrewMethod::FrenchPress);
        }
        BrewMethod::all()
            .iter()
            .copied()
            .find(|m| m.id() == needle)
            .ok_or_else(|| BrewError::UnknownMethod(s.to_string()))
    }
}

impl std::fmt::Display for BrewMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id())
    }
}

/// Everything the user picked on the form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Selections {
    pub roast: Roast,
    pub method: BrewMethod,
    pub grinder: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub water: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hardness: Option<String>,
}

impl Selections {
    pub fn new(roast: Roast, method: BrewMethod, grinder: impl Into<String>) -> Self {
        Self {
            roast,
            method,
            grinder: grinder.into(),
            process: None,
            water: None,
            hardness: None,
        }
    }

    /// Learning slot for this grinder and method.
    pub fn learning_key(&self) -> LearningKey {
        LearningKey::new(self.grinder.clone(), self.method.id())
    }
}

// ---------------------------------------------------------------------------
// GrinderTable
// ---------------------------------------------------------------------------

/// Grind recommendation per grinder and method.
#[derive(Debug, Clone, Default)]
pub struct GrinderTable {
    rows: BTreeMap<String, BTreeMap<BrewMethod, String>>,
}

impl GrinderTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace one grinder / method cell.
    pub fn insert(&mut self, grinder: impl Into<String>, method: BrewMethod, label: impl Into<String>) {
        self.rows.entry(grinder.into()).or_default().insert(method, label.into());
    }

    pub fn lookup(&self, grinder: &str, method: BrewMethod) -> Option<&str> {
        self.rows.get(grinder)?.get(&method).map(String::as_str)
    }

    pub fn grinders(&self) -> impl Iterator<Item = &str> {
        self.rows.keys().map(String::as_str)
    }

    /// The stock chart of common grinders.
    pub fn builtin() -> Self {
        use BrewMethod::*;

        let mut t = Self::new();
        let encore = [
            (Espresso, "Fine (14-16)"),
            (V60, "Medium-Fine (20-22)"),
            (Chemex, "Medium-Fine (20-22)"),
            (FrenchPress, "Medium-Coarse (24-26)"),
            (Aeropress, "Medium-Fine (18-20)"),
            (Siphon, "Medium-Fine (20-22)"),
            (ColdBrew, "Coarse (25-27)"),
            (MokaPot, "Fine (15-17)"),
            (BatchBrew, "Medium-Fine (20-22)"),
        ];
        for (m, label) in encore {
            t.insert("baratza_Encore", m, label);
        }

        let three_col: &[(&str, &str, &str, &str, Option<&str>)] = &[
            ("baratza_S207", "Fine (9-11)", "Medium-Fine (15-17)", "Medium-Coarse (18-20)", Some("Medium-Fine (15-17)")),
            ("baratza_Vario", "Extra Fine (5-7)", "Medium-Fine (12-14)", "Medium-Coarse (16-18)", Some("Medium-Fine (12-14)")),
            ("fellow_Ottimo", "Fine (8-10)", "Medium-Fine (14-16)", "Medium (17-19)", None),
            ("mazzer_Super_Jolly", "Extra Fine (1-3)", "Medium-Fine (6-8)", "Medium-Coarse (9-11)", None),
            ("mazzer_minim", "Extra Fine (1-3)", "Medium-Fine (6-8)", "Medium-Coarse (9-11)", None),
            ("ek43", "Extra Fine (1-2)", "Medium (3-5)", "Medium-Coarse (6-7)", None),
            ("wilfa_SVart", "Fine (5-7)", "Medium-Fine (10-12)", "Medium-Coarse (13-15)", None),
            ("niche_zero", "Fine (5-6)", "Medium-Fine (10-11)", "Medium-Coarse (12-14)", None),
            ("liddell", "Fine (6-8)", "Medium-Fine (11-13)", "Medium-Coarse (14-16)", None),
            ("comandante_C40", "Fine (7-9)", "Medium-Fine (12-14)", "Medium-Coarse (15-17)", None),
            ("eureka_Mignon_Specialita", "Fine (5-6)", "Medium-Fine (10-12)", "Medium-Coarse (13-15)", None),
            ("rocket_R58_grinder", "Extra Fine (1-3)", "Medium-Fine (6-8)", "Medium-Coarse (9-11)", None),
            ("puteus", "Fine (6-8)", "Medium-Fine (11-13)", "Medium-Coarse (14-16)", None),
            ("breville_BCG820BSS", "Fine (5-7)", "Medium-Fine (10-12)", "Medium-Coarse (13-15)", None),
            ("rancilio_rocky", "Fine (5-6)", "Medium-Fine (10-12)", "Medium-Coarse (13-15)", None),
            ("baratza_preciso", "Fine (6-8)", "Medium-Fine (12-14)", "Medium-Coarse (15-17)", None),
            ("sbdx", "Fine (5-6)", "Medium-Fine (10-12)", "Medium-Coarse (13-15)", None),
            ("df64", "Extra Fine (1-3)", "Medium-Fine (6-8)", "Medium-Coarse (9-11)", None),
            ("other", "Fine", "Medium-Fine", "Medium-Coarse", None),
        ];
        for &(grinder, espresso, v60, press, chemex) in three_col {
            t.insert(grinder, Espresso, espresso);
            t.insert(grinder, V60, v60);
            t.insert(grinder, FrenchPress, press);
            if let Some(chemex) = chemex {
                t.insert(grinder, Chemex, chemex);
            }
        }
        t
    }
}

/// Midpoint of the `(a-b)` range in a grind label, e.g. `"Fine (14-16)"` → 15.
pub fn grind_setting_midpoint(label: &str) -> Option<f64> {
    let open = label.find('(')?;
    let close = label[open..].find(')')? + open;
    let inner = &label[open + 1..close];
    let (lo, hi) = match inner.split_once('-') {
        Some((lo, hi)) => (lo.trim().parse::<f64>().ok()?, hi.trim().parse::<f64>().ok()?),
        None => {
            let v = inner.trim().parse::<f64>().ok()?;
            (v, v)
        }
    };
    Some((lo + hi) / 2.0)
}

// ---------------------------------------------------------------------------
// Recipe
// ---------------------------------------------------------------------------

/// A base recipe before personal learning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub selections: Selections,
    pub temperature_c: i32,
    pub ratio: String,
    /// Grinder-specific label, or the generic category.
    pub grind: String,
    /// Numeric setting parsed from `grind`, if the label carries one.
    pub grind_setting: Option<f64>,
    pub brew_time_s: f64,
}

impl Recipe {
    /// Plain-text summary block.
    pub fn render(&self) -> String {
        let s = &self.selections;
        let mut out = String::from("=== Your Brew Recommendation ===\n");
        out.push_str(&format!("Roast: {}\n", s.roast));
        if let Some(process) = &s.process {
            out.push_str(&format!("Process: {}\n", process));
        }
        out.push_str(&format!("Brew Method: {}\n", s.method));
        out.push_str(&format!("Temperature: {}°C\n", self.temperature_c));
        out.push_str(&format!("Ratio: {}\n", self.ratio));
        out.push_str(&format!("Grind Recommendation: {}\n", self.grind));
        out.push_str(&format!("Brew Time: {}\n", format_duration(self.brew_time_s)));
        out.push_str(&format!("Grinder Used: {}", s.grinder.replace('_', " ")));
        match (&s.water, &s.hardness) {
            (Some(w), Some(h)) => out.push_str(&format!("\nWater: {} ({})", w.replace('_', " "), h)),
            (Some(w), None) => out.push_str(&format!("\nWater: {}", w.replace('_', " "))),
            (None, Some(h)) => out.push_str(&format!("\nWater hardness: {}", h)),
            (None, None) => {}
        }
        out
    }
}

/// A recipe plus whatever the learning store had to say about it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersonalizedRecipe {
    pub recipe: Recipe,
    pub adjustment: LearnedAdjustment,
}

impl PersonalizedRecipe {
    /// Learned grind offset in clicks (0 when learning is not applied).
    pub fn grind_offset(&self) -> f64 {
        self.adjustment.grind - self.recipe.grind_setting.unwrap_or(0.0)
    }

    pub fn time_offset(&self) -> f64 {
        self.adjustment.time - self.recipe.brew_time_s
    }

    pub fn render(&self) -> String {
        let mut out = self.recipe.render();
        if self.adjustment.learning_applied {
            out.push_str("\n\n--- Personal Adjustment ---\n");
            match self.recipe.grind_setting {
                Some(_) => out.push_str(&format!(
                    "Grind: {:.1} ({:+.1} clicks)\n",
                    self.adjustment.grind,
                    self.grind_offset()
                )),
                None => out.push_str(&format!("Grind: {:+.1} clicks from usual\n", self.grind_offset())),
            }
            out.push_str(&format!(
                "Time: {} ({:+.0}s)\n",
                format_duration(self.adjustment.time),
                self.time_offset()
            ));
            out.push_str(&format!("({})", self.adjustment.reason));
        } else {
            out.push_str(&format!("\n\nLearning: {}", self.adjustment.reason));
        }
        out
    }
}

fn format_duration(secs: f64) -> String {
    let total = secs.max(0.0).round() as u64;
    if total < 120 {
        format!("{}s", total)
    } else if total < 3 * 3600 {
        format!("{}:{:02}", total / 60, total % 60)
    } else {
        format!("{:.1}h", total as f64 / 3600.0)
    }
}

// ---------------------------------------------------------------------------
// RecipeEngine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct RecipeEngine {
    grinders: GrinderTable,
}

impl Default for RecipeEngine {
    fn default() -> Self {
        Self::new(GrinderTable::builtin())
    }
}

impl RecipeEngine {
    pub fn new(grinders: GrinderTable) -> Self {
        Self { grinders }
    }

    pub fn grinders(&self) -> &GrinderTable {
        &self.grinders
    }

    pub fn recommend(&self, selections: &Selections) -> Recipe {
        let method = selections.method;
        let grind = self
            .grinders
            .lookup(&selections.grinder, method)
            .unwrap_or(method.grind_category())
            .to_string();
        let grind_setting = grind_setting_midpoint(&grind);

        Recipe {
            selections: selections.clone(),
            temperature_c: BASE_TEMPERATURE_C + selections.roast.temperature_offset(),
            ratio: method.ratio().to_string(),
            grind,
            grind_setting,
            brew_time_s: method.base_time_s(),
        }
    }

    /// Layer learned offsets onto a base recipe.  Grinders without a numeric
    /// setting get the offset relative to zero.
    pub fn personalize(&self, recipe: &Recipe, store: &LearningStore) -> PersonalizedRecipe {
        let key = recipe.selections.learning_key();
        let adjustment = store.apply(&key, recipe.grind_setting.unwrap_or(0.0), recipe.brew_time_s);
        PersonalizedRecipe { recipe: recipe.clone(), adjustment }
    }
}
