//! # Stage: Capability Catalog
//!
//! ## Responsibility
//! Answers "can this espresso machine run this pressure profile?" by
//! comparing a machine's fixed capability set against the profile's declared
//! requirements.
//!
//! ## Guarantees
//! - Non-panicking: unknown machine or profile ids produce
//!   [`Compatibility::Incompatible`] with a reason
//! - Every missing capability is named in the reason
//!
//! ## NOT Responsible For
//! - Learning or diagnosis; this is a standalone rule evaluation

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Machines
// ---------------------------------------------------------------------------

/// How a machine exposes its pressure / flow features.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlGrade {
    /// Profiles can be programmed and replayed.
    Programmable,
    /// Features exist but the operator drives them by hand (paddle, lever).
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineCapabilities {
    pub pressure_profiling: bool,
    pub flow_control: bool,
    pub pre_infusion: bool,
    pub control: ControlGrade,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Machine {
    pub name: String,
    pub capabilities: MachineCapabilities,
}

// ---------------------------------------------------------------------------
// Profiles
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileRequirements {
    pub pressure_profiling: bool,
    pub flow_control: bool,
    pub pre_infusion: bool,
    /// The profile is meant to be pulled by hand.
    pub manual_control: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PressureProfile {
    pub name: String,
    pub description: String,
    pub requirements: ProfileRequirements,
}

// ---------------------------------------------------------------------------
// Compatibility
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Compatibility {
    Compatible,
    CompatibleWithWarning { warning: String },
    Incompatible { reason: String },
}

impl Compatibility {
    pub fn is_compatible(&self) -> bool {
        !matches!(self, Compatibility::Incompatible { .. })
    }

    /// The warning or rejection reason, if any.
    pub fn reason(&self) -> Option<&str> {
        match self {
            Compatibility::Compatible => None,
            Compatibility::CompatibleWithWarning { warning } => Some(warning.as_str()),
            Compatibility::Incompatible { reason } => Some(reason.as_str()),
        }
    }
}

/// Compare one machine with one profile.
pub fn evaluate(machine: &Machine, profile: &PressureProfile) -> Compatibility {
    let caps = &machine.capabilities;
    let req = &profile.requirements;

    let checks = [
        (req.pressure_profiling, caps.pressure_profiling, "pressure profiling"),
        (req.flow_control, caps.flow_control, "flow control"),
        (req.pre_infusion, caps.pre_infusion, "pre-infusion"),
    ];
    let missing: Vec<&str> = checks
        .iter()
        .filter(|(required, offered, _)| *required && !*offered)
        .map(|(_, _, name)| *name)
        .collect();

    if !missing.is_empty() {
        return Compatibility::Incompatible {
            reason: format!(
                "{} requires {}, which the {} does not support",
                profile.name,
                missing.join(" and "),
                machine.name
            ),
        };
    }

    if req.manual_control && caps.control == ControlGrade::Manual {
        return Compatibility::CompatibleWithWarning {
            warning: format!(
                "{} relies on manual operator control on the {}; results depend on technique",
                profile.name, machine.name
            ),
        };
    }

    Compatibility::Compatible
}

// ---------------------------------------------------------------------------
// CapabilityCatalog
// ---------------------------------------------------------------------------

/// Known machines and profiles keyed by id.
#[derive(Debug, Clone, Default)]
pub struct CapabilityCatalog {
    machines: BTreeMap<String, Machine>,
    profiles: BTreeMap<String, PressureProfile>,
}

impl CapabilityCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_machine(&mut self, id: impl Into<String>, machine: Machine) {
        self.machines.insert(id.into(), machine);
    }

    pub fn add_profile(&mut self, id: impl Into<String>, profile: PressureProfile) {
        self.profiles.insert(id.into(), profile);
    }

    pub fn machine(&self, id: &str) -> Option<&Machine> {
        self.machines.get(id)
    }

    pub fn profile(&self, id: &str) -> Option<&PressureProfile> {
        self.profiles.get(id)
    }

    pub fn machine_ids(&self) -> impl Iterator<Item = &str> {
        self.machines.keys().map(String::as_str)
    }

    pub fn profile_ids(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(String::as_str)
    }

    /// Look both ids up and evaluate.  Unknown ids are incompatible.
    pub fn evaluate_pressure_profile(&self, machine_id: &str, profile_id: &str) -> Compatibility {
        let Some(machine) = self.machine(machine_id) else {
            return Compatibility::Incompatible { reason: format!("unknown machine '{}'", machine_id) };
        };
        let Some(profile) = self.profile(profile_id) else {
            return Compatibility::Incompatible { reason: format!("unknown pressure profile '{}'", profile_id) };
        };
        evaluate(machine, profile)
    }

    /// Profiles the machine can run, with their verdicts.
    pub fn compatible_profiles(&self, machine_id: &str) -> Vec<(&str, Compatibility)> {
        let Some(machine) = self.machine(machine_id) else { return Vec::new() };
        self.profiles
            .iter()
            .map(|(id, p)| (id.as_str(), evaluate(machine, p)))
            .filter(|(_, c)| c.is_compatible())
            .collect()
    }

    pub fn builtin() -> Self {
        use ControlGrade::*;

        let mut cat = Self::new();
        let machines: &[(&str, &str, bool, bool, bool, ControlGrade)] = &[
            ("la-marzocco-linea-mini", "La Marzocco Linea Mini", false, false, true, Programmable),
            ("la-marzocco-gs3-mp", "La Marzocco GS3 MP", true, true, true, Manual),
            ("decent-de1", "Decent DE1", true, true, true, Programmable),
            ("lelit-bianca", "Lelit Bianca", true, true, true, Manual),
            ("breville-dual-boiler", "Breville Dual Boiler", false, false, true, Programmable),
            ("gaggia-classic-pro", "Gaggia Classic Pro", false, false, false, Manual),
            ("rancilio-silvia", "Rancilio Silvia", false, false, false, Manual),
            ("flair-58", "Flair 58", true, true, true, Manual),
            ("meticulous", "Meticulous", true, true, true, Programmable),
        ];
        for &(id, name, pressure_profiling, flow_control, pre_infusion, control) in machines {
            cat.add_machine(
                id,
                Machine {
                    name: name.to_string(),
                    capabilities: MachineCapabilities { pressure_profiling, flow_control, pre_infusion, control },
                },
            );
        }

        let profiles: &[(&str, &str, &str, ProfileRequirements)] = &[
            ("classic_9bar", "Classic 9 bar", "Flat 9 bar for the whole shot", ProfileRequirements::default()),
            (
                "long_preinfusion",
                "Long pre-infusion",
                "8-10 s soak at line pressure before ramping to 9 bar",
                ProfileRequirements { pre_infusion: true, ..Default::default() },
            ),
            (
                "blooming",
                "Blooming espresso",
                "Fill, pause to bloom at near-zero pressure, then extract at 6-9 bar",
                ProfileRequirements { pressure_profiling: true, pre_infusion: true, ..Default::default() },
            ),
            (
                "slayer_style",
                "Slayer-style",
                "Long low-flow pre-brew followed by full pressure",
                ProfileRequirements { flow_control: true, pre_infusion: true, ..Default::default() },
            ),
            (
                "turbo",
                "Turbo shot",
                "Coarser grind, 6 bar, fast 15 s shot",
                ProfileRequirements { pressure_profiling: true, ..Default::default() },
            ),
            (
                "lever_decline",
                "Lever decline",
                "Peak at 9 bar and taper down like a spring lever",
                ProfileRequirements { pressure_profiling: true, manual_control: true, ..Default::default() },
            ),
            (
                "adaptive_flow",
                "Adaptive flow",
                "Flow target that follows puck resistance",
                ProfileRequirements { pressure_profiling: true, flow_control: true, ..Default::default() },
            ),
        ];
        for (id, name, description, requirements) in profiles {
            cat.add_profile(
                *id,
                PressureProfile {
                    name: name.to_string(),
                    description: description.to_string(),
                    requirements: *requirements,
                },
            );
        }
        cat
    }
}
