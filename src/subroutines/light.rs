//! Light subroutine.
//!
//! Holds the lighting hours derived from the sky configuration and the
//! latest sun times, and switches the light actuator when the computed
//! target differs from its status.

use std::collections::BTreeSet;

use log::{debug, info};

use crate::actuators::ActuatorMode;
use crate::config::{LightMethod, LightingHours};
use crate::control::lighting::{compute_lighting_hours, compute_target_status};
use crate::error::Result;
use crate::hardware::{Capability, HardwareRecord};

use super::context::{Context, EcosystemState};
use super::{Missing, Routine};

pub struct Light {
    /// Method actually applied, after any fallback to fixed.
    method: LightMethod,
    hours: LightingHours,
    claimed: bool,
}

impl Light {
    pub fn new(state: &EcosystemState) -> Self {
        let (method, hours) = compute_lighting_hours(&state.sky, state.sun_times.as_ref());
        Self {
            method,
            hours,
            claimed: false,
        }
    }

    pub fn method(&self) -> LightMethod {
        self.method
    }

    pub fn hours(&self) -> LightingHours {
        self.hours
    }

    /// Re-derive hours from the sky config and sun times.
    pub fn refresh(&mut self, state: &EcosystemState) -> LightingHours {
        let (method, hours) = compute_lighting_hours(&state.sky, state.sun_times.as_ref());
        self.method = method;
        self.hours = hours;
        hours
    }

    /// Override the derived hours until the next refresh.
    pub fn set_lighting_hours(&mut self, hours: LightingHours) {
        self.hours = hours;
    }

    pub fn compute_target_status(&self, now: chrono::NaiveTime) -> bool {
        compute_target_status(self.method, &self.hours, now)
    }
}

impl Routine for Light {
    fn check_resources(state: &EcosystemState) -> core::result::Result<(), Missing> {
        if state.inventory.has_capability(Capability::Light) {
            Ok(())
        } else {
            Err(Missing::Hardware)
        }
    }

    fn hardware_needed(state: &EcosystemState) -> BTreeSet<String> {
        state.inventory.uids_by_capability(Capability::Light)
    }

    fn accepts(record: &HardwareRecord) -> bool {
        record.capability == Capability::Light
    }

    fn on_start(&mut self, ctx: &Context) -> Result<()> {
        let hours = self.refresh(&ctx.state.read());
        ctx.hub.claim(Capability::Light);
        self.claimed = true;
        info!(
            "Light[{}]: {} method, {}-{} / {}-{}",
            ctx.ecosystem,
            self.method,
            hours.morning_start,
            hours.morning_end,
            hours.evening_start,
            hours.evening_end
        );
        Ok(())
    }

    fn on_stop(&mut self, ctx: &Context) {
        if std::mem::take(&mut self.claimed) {
            ctx.hub.release(Capability::Light);
        }
    }

    async fn routine(&mut self, ctx: &Context) -> Result<()> {
        let handler = ctx.hub.get_handler(Capability::Light)?;
        if handler.mode != ActuatorMode::Automatic {
            return Ok(());
        }
        let now = ctx.ports.clock.local_time();
        let target = self.compute_target_status(now);
        if target != handler.status {
            debug!(
                "Light[{}]: {} at {} -> {}",
                ctx.ecosystem,
                self.method,
                now,
                if target { "on" } else { "off" }
            );
            ctx.hub.apply_automatic(Capability::Light, target)?;
        }
        Ok(())
    }
}
