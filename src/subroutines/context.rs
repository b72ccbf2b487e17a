//! Shared per-ecosystem context handed to every subroutine.
//!
//! [`Context`] is built once per ecosystem and shared (`Arc`) with every
//! subroutine task.  The mutable part, [`EcosystemState`], sits behind a
//! synchronous `RwLock` that is only ever held for short, await-free
//! sections: routines copy what they need out of it before suspending.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::actuators::ActuatorHub;
use crate::app::ports::Ports;
use crate::config::{
    ClimateParameter, ClimateParameterConfig, EcosystemConfig, ManagementFlags, SkyConfig,
    SunTimes, TimingConfig,
};
use crate::error::Result;
use crate::events::EventQueue;
use crate::hardware::HardwareInventory;

use super::SubroutineKind;
use super::sensors::ReadingsStore;

/// Mutable view of one ecosystem's configuration and lifecycle.
#[derive(Debug, Clone)]
pub struct EcosystemState {
    pub management: ManagementFlags,
    pub sky: SkyConfig,
    pub sun_times: Option<SunTimes>,
    pub climate: BTreeMap<ClimateParameter, ClimateParameterConfig>,
    pub inventory: HardwareInventory,
    /// Subroutines currently started.
    pub started: BTreeSet<SubroutineKind>,
}

impl EcosystemState {
    pub fn from_config(config: &EcosystemConfig) -> Result<Self> {
        Ok(Self {
            management: config.management,
            sky: config.sky,
            sun_times: config.sun_times,
            climate: config.climate.clone(),
            inventory: HardwareInventory::from_records(config.hardware.iter().cloned())?,
            started: BTreeSet::new(),
        })
    }

    pub fn is_started(&self, kind: SubroutineKind) -> bool {
        self.started.contains(&kind)
    }
}

/// Everything a subroutine may touch.
pub struct Context {
    /// Ecosystem uid, used as log prefix.
    pub ecosystem: String,
    pub hub: Arc<ActuatorHub>,
    pub readings: Arc<ReadingsStore>,
    pub events: Arc<EventQueue>,
    pub ports: Ports,
    pub timing: TimingConfig,
    pub state: RwLock<EcosystemState>,
}
