//! Hysteresis on/off decision for climate actuators.
//!
//! Each regulated parameter is coupled to at most one actuator per
//! direction.  An `Increase` actuator (heater, humidifier, fan) is on while
//! the value sits strictly below the lower band edge; a `Decrease`
//! actuator (cooler, dehumidifier) while it sits strictly above the upper
//! edge.  The band itself, edges included, is always off.
//!
//! ```text
//!          target-h        target        target+h
//!   ──────────┤──────────────┼──────────────├──────────
//!   increase ON │          dead band          │ decrease ON
//! ```

use serde::{Deserialize, Serialize};

use crate::config::ClimateParameter;
use crate::hardware::Capability;

/// Which way an actuator pushes the measured value when on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Increase,
    Decrease,
}

/// Actuators coupled to one parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActuatorCouple {
    pub increase: Option<Capability>,
    pub decrease: Option<Capability>,
}

impl ActuatorCouple {
    /// `(capability, direction)` pairs, increase first.
    pub fn iter(self) -> impl Iterator<Item = (Capability, Direction)> {
        self.increase
            .map(|c| (c, Direction::Increase))
            .into_iter()
            .chain(self.decrease.map(|c| (c, Direction::Decrease)))
    }
}

/// The actuator couple regulating `parameter`.  Light belongs to the Light
/// subroutine and has no climate couple.
pub const fn couple_for(parameter: ClimateParameter) -> ActuatorCouple {
    match parameter {
        ClimateParameter::Temperature => ActuatorCouple {
            increase: Some(Capability::Heater),
            decrease: Some(Capability::Cooler),
        },
        ClimateParameter::Humidity => ActuatorCouple {
            increase: Some(Capability::Humidifier),
            decrease: Some(Capability::Dehumidifier),
        },
        ClimateParameter::Wind => ActuatorCouple {
            increase: Some(Capability::Fan),
            decrease: None,
        },
        ClimateParameter::Light => ActuatorCouple {
            increase: None,
            decrease: None,
        },
    }
}

/// Decide whether an actuator should be on.
///
/// Without data (`current` or `target` unset) the answer is always `false`.
/// A non-positive or non-finite `hysteresis` disables the dead band.
pub fn expected_status(
    current: Option<f64>,
    target: Option<f64>,
    hysteresis: f64,
    direction: Direction,
) -> bool {
    let (Some(current), Some(target)) = (current, target) else {
        return false;
    };
    let band = if hysteresis.is_finite() && hysteresis > 0.0 {
        hysteresis
    } else {
        0.0
    };
    match direction {
        Direction::Increase => current < target - band,
        Direction::Decrease => current > target + band,
    }
}
