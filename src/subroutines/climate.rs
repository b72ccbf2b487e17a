//! Climate subroutine: hysteresis regulation of every configured parameter.
//!
//! Each cycle, for every regulated parameter and every coupled actuator in
//! automatic mode, the expected status is computed from the latest Sensors
//! average and the day or night target, and written only when it differs
//! from the handler's current status.

use std::collections::{BTreeMap, BTreeSet};

use log::{debug, info};

use crate::actuators::ActuatorMode;
use crate::config::{ClimateParameter, ClimateParameterConfig};
use crate::control::hysteresis::{couple_for, expected_status};
use crate::error::Result;
use crate::hardware::{Capability, HardwareInventory, HardwareRecord, Level};

use super::context::{Context, EcosystemState};
use super::{Missing, Routine};

/// Configured parameters with at least one coupled actuator present.
pub fn regulated_parameters(
    climate: &BTreeMap<ClimateParameter, ClimateParameterConfig>,
    inventory: &HardwareInventory,
) -> Vec<ClimateParameter> {
    climate
        .keys()
        .copied()
        .filter(|p| couple_for(*p).iter().any(|(c, _)| drivable(inventory, c)))
        .collect()
}

/// At least one actuator of `capability` that Climate accepts is present.
fn drivable(inventory: &HardwareInventory, capability: Capability) -> bool {
    inventory.by_capability(capability).any(Climate::accepts)
}

/// Actuator capabilities the regulated parameters drive.
fn regulated_capabilities(state: &EcosystemState) -> BTreeSet<Capability> {
    regulated_parameters(&state.climate, &state.inventory)
        .into_iter()
        .flat_map(|p| couple_for(p).iter().map(|(c, _)| c))
        .filter(|c| drivable(&state.inventory, *c))
        .collect()
}

/// Hysteresis regulator.
pub struct Climate {
    /// Capabilities claimed on the hub.
    claimed: BTreeSet<Capability>,
}

impl Climate {
    pub fn new() -> Self {
        Self {
            claimed: BTreeSet::new(),
        }
    }

    /// Align hub claims with what is currently regulated.
    fn refresh_claims(&mut self, ctx: &Context) {
        let wanted = regulated_capabilities(&ctx.state.read());
        for c in self.claimed.difference(&wanted) {
            ctx.hub.release(*c);
        }
        for c in wanted.difference(&self.claimed) {
            ctx.hub.claim(*c);
        }
        self.claimed = wanted;
    }
}

impl Default for Climate {
    fn default() -> Self {
        Self::new()
    }
}

impl Routine for Climate {
    fn check_resources(state: &EcosystemState) -> core::result::Result<(), Missing> {
        if state.climate.is_empty() {
            return Err(Missing::Configuration);
        }
        if regulated_parameters(&state.climate, &state.inventory).is_empty() {
            return Err(Missing::Hardware);
        }
        Ok(())
    }

    fn hardware_needed(state: &EcosystemState) -> BTreeSet<String> {
        state
            .climate
            .keys()
            .flat_map(|p| couple_for(*p).iter().map(|(c, _)| c))
            .flat_map(move |c| state.inventory.by_capability(c))
            .filter(|r| Self::accepts(r))
            .map(|r| r.uid.clone())
            .collect()
    }

    fn accepts(record: &HardwareRecord) -> bool {
        matches!(
            record.capability,
            Capability::Heater
                | Capability::Cooler
                | Capability::Humidifier
                | Capability::Dehumidifier
                | Capability::Fan
        ) && record.level == Level::Environment
    }

    fn attach(&mut self, _record: &HardwareRecord, ctx: &Context) -> Result<()> {
        self.refresh_claims(ctx);
        Ok(())
    }

    fn detach(&mut self, _uid: &str, ctx: &Context) {
        if ctx.state.read().is_started(super::SubroutineKind::Climate) {
            self.refresh_claims(ctx);
        }
    }

    fn on_start(&mut self, ctx: &Context) -> Result<()> {
        self.refresh_claims(ctx);
        let regulated = {
            let state = ctx.state.read();
            regulated_parameters(&state.climate, &state.inventory)
        };
        info!("Climate[{}]: regulating {:?}", ctx.ecosystem, regulated);
        Ok(())
    }

    fn on_stop(&mut self, ctx: &Context) {
        for c in std::mem::take(&mut self.claimed) {
            ctx.hub.release(c);
        }
    }

    async fn routine(&mut self, ctx: &Context) -> Result<()> {
        self.refresh_claims(ctx);
        let (targets, daytime, present) = {
            let state = ctx.state.read();
            let regulated = regulated_parameters(&state.climate, &state.inventory);
            let targets: Vec<(ClimateParameter, ClimateParameterConfig)> = regulated
                .into_iter()
                .filter_map(|p| state.climate.get(&p).map(|cfg| (p, *cfg)))
                .collect();
            let daytime = state.sky.day_window().contains(ctx.ports.clock.local_time());
            let present: BTreeSet<Capability> = Capability::ACTUATORS
                .into_iter()
                .filter(|c| drivable(&state.inventory, *c))
                .collect();
            (targets, daytime, present)
        };
        let max_age = ctx.timing.max_reading_age();

        for (parameter, cfg) in targets {
            let current = ctx.readings.average(parameter.as_str(), max_age);
            if current.is_none() {
                debug!(
                    "Climate[{}]: no usable {} reading, coupled actuators held off",
                    ctx.ecosystem, parameter
                );
            }
            let target = cfg.target(daytime);
            for (capability, direction) in couple_for(parameter).iter() {
                if !present.contains(&capability) {
                    continue;
                }
                let handler = ctx.hub.get_handler(capability)?;
                if handler.mode != ActuatorMode::Automatic {
                    continue;
                }
                let expected = expected_status(current, Some(target), cfg.hysteresis, direction);
                if expected != handler.status {
                    debug!(
                        "Climate[{}]: {} current={:?} target={} -> {} {}",
                        ctx.ecosystem,
                        parameter,
                        current,
                        target,
                        capability,
                        if expected { "on" } else { "off" }
                    );
                    ctx.hub.apply_automatic(capability, expected)?;
                }
            }
        }
        Ok(())
    }
}
