//! Inbound commands to an ecosystem.
//!
//! These represent requests from the event layer (remote clients, a
//! dashboard, a script) that [`Ecosystem::handle_command`](super::ecosystem::Ecosystem::handle_command)
//! interprets.  Names arrive as strings and are parsed at dispatch, so an
//! unknown subroutine or capability surfaces as a typed error.

use serde::{Deserialize, Serialize};

use crate::config::{LightingHours, SunTimes};
use crate::hardware::HardwareRecord;

/// Commands that the event layer can send into an ecosystem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum EcosystemCommand {
    EnableSubroutine { name: String },
    DisableSubroutine { name: String },
    StartSubroutine { name: String },
    StopSubroutine { name: String },

    /// `mode` is `on`, `off` or `automatic`; `countdown` in seconds.
    TurnActuator {
        capability: String,
        mode: String,
        #[serde(default)]
        countdown: f64,
    },

    SetClimateParameter {
        parameter: String,
        day: f64,
        night: f64,
        #[serde(default)]
        hysteresis: f64,
    },
    DeleteClimateParameter { parameter: String },

    SetLightingMethod { method: String },
    SetLightingHours(LightingHours),
    UpdateSunTimes(SunTimes),

    AddHardware(HardwareRecord),
    UpdateHardware(HardwareRecord),
    RemoveHardware { uid: String },
}
