//! Hardware inventory.
//!
//! Typed records of every sensor, actuator and camera attached to one
//! ecosystem.  The inventory is owned by the [`Ecosystem`](crate::app::ecosystem::Ecosystem);
//! subroutines only ever hold uid references into it.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ───────────────────────────────────────────────────────────────
// Capability / level
// ───────────────────────────────────────────────────────────────

/// Functional role of a hardware unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    Sensor,
    Light,
    Heater,
    Cooler,
    Humidifier,
    Dehumidifier,
    Fan,
    Camera,
}

impl Capability {
    /// Capabilities that the actuator hub tracks a handler for.
    pub const ACTUATORS: [Self; 6] = [
        Self::Light,
        Self::Heater,
        Self::Cooler,
        Self::Humidifier,
        Self::Dehumidifier,
        Self::Fan,
    ];

    pub fn is_actuator(self) -> bool {
        Self::ACTUATORS.contains(&self)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sensor => "sensor",
            Self::Light => "light",
            Self::Heater => "heater",
            Self::Cooler => "cooler",
            Self::Humidifier => "humidifier",
            Self::Dehumidifier => "dehumidifier",
            Self::Fan => "fan",
            Self::Camera => "camera",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Capability {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "sensor" => Ok(Self::Sensor),
            "light" => Ok(Self::Light),
            "heater" => Ok(Self::Heater),
            "cooler" => Ok(Self::Cooler),
            "humidifier" => Ok(Self::Humidifier),
            "dehumidifier" => Ok(Self::Dehumidifier),
            "fan" => Ok(Self::Fan),
            "camera" => Ok(Self::Camera),
            other => Err(Error::InvalidArgument(format!("unknown capability '{other}'"))),
        }
    }
}

/// Whether a unit serves the whole enclosure or a single plant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    #[default]
    Environment,
    Plant,
}

// ───────────────────────────────────────────────────────────────
// HardwareRecord
// ───────────────────────────────────────────────────────────────

/// One physical unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardwareRecord {
    pub uid: String,
    pub name: String,
    pub address: String,
    pub model: String,
    #[serde(rename = "type")]
    pub capability: Capability,
    #[serde(default)]
    pub level: Level,
    /// Measures this unit reports (sensors) or captures (cameras).
    #[serde(default)]
    pub measures: BTreeSet<String>,
    #[serde(default)]
    pub plants: BTreeSet<String>,
}

impl HardwareRecord {
    pub fn new(
        uid: impl Into<String>,
        name: impl Into<String>,
        model: impl Into<String>,
        capability: Capability,
    ) -> Self {
        Self {
            uid: uid.into(),
            name: name.into(),
            address: String::new(),
            model: model.into(),
            capability,
            level: Level::Environment,
            measures: BTreeSet::new(),
            plants: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
    }

    #[must_use]
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    #[must_use]
    pub fn with_measures<I, S>(mut self, measures: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.measures = measures.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_plants<I, S>(mut self, plants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.plants = plants.into_iter().map(Into::into).collect();
        self
    }

    pub fn measures(&self, measure: &str) -> bool {
        self.measures.contains(measure)
    }

    fn validate(&self) -> Result<()> {
        if self.uid.trim().is_empty() {
            return Err(Error::InvalidArgument("hardware uid must not be empty".into()));
        }
        if self.capability == Capability::Sensor && self.measures.is_empty() {
            return Err(Error::InvalidArgument(format!(
                "sensor '{}' declares no measure",
                self.uid
            )));
        }
        Ok(())
    }
}

// ───────────────────────────────────────────────────────────────
// HardwareInventory
// ───────────────────────────────────────────────────────────────

/// The set of records of one ecosystem, keyed by uid.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HardwareInventory {
    records: BTreeMap<String, HardwareRecord>,
}

impl HardwareInventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a list, rejecting duplicate uids.
    pub fn from_records(records: impl IntoIterator<Item = HardwareRecord>) -> Result<Self> {
        let mut inventory = Self::new();
        for record in records {
            inventory.insert(record)?;
        }
        Ok(inventory)
    }

    pub fn insert(&mut self, record: HardwareRecord) -> Result<()> {
        record.validate()?;
        if self.records.contains_key(&record.uid) {
            return Err(Error::InvalidArgument(format!(
                "hardware '{}' already exists",
                record.uid
            )));
        }
        self.records.insert(record.uid.clone(), record);
        Ok(())
    }

    /// Replace an existing record, returning the previous one.
    pub fn update(&mut self, record: HardwareRecord) -> Result<HardwareRecord> {
        record.validate()?;
        match self.records.get_mut(&record.uid) {
            Some(slot) => Ok(std::mem::replace(slot, record)),
            None => Err(Error::not_found("hardware", record.uid)),
        }
    }

    pub fn remove(&mut self, uid: &str) -> Result<HardwareRecord> {
        self.records
            .remove(uid)
            .ok_or_else(|| Error::not_found("hardware", uid))
    }

    pub fn get(&self, uid: &str) -> Option<&HardwareRecord> {
        self.records.get(uid)
    }

    pub fn iter(&self) -> impl Iterator<Item = &HardwareRecord> {
        self.records.values()
    }

    pub fn by_capability(&self, capability: Capability) -> impl Iterator<Item = &HardwareRecord> {
        self.records
            .values()
            .filter(move |r| r.capability == capability)
    }

    pub fn has_capability(&self, capability: Capability) -> bool {
        self.by_capability(capability).next().is_some()
    }

    pub fn uids_by_capability(&self, capability: Capability) -> BTreeSet<String> {
        self.by_capability(capability).map(|r| r.uid.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn to_records(&self) -> Vec<HardwareRecord> {
        self.records.values().cloned().collect()
    }
}
