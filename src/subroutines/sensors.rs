//! Sensors subroutine and the latest-readings store.
//!
//! Each cycle polls every attached sensor driver concurrently and publishes
//! one [`SensorsData`] snapshot.  Climate reads the per-measure average
//! from the [`ReadingsStore`] on its own cadence.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use log::{debug, warn};
use parking_lot::RwLock;
use tokio::time::Instant;

use crate::app::ports::SensorPort;
use crate::error::Result;
use crate::hardware::{Capability, HardwareRecord};

use super::context::{Context, EcosystemState};
use super::{Missing, Routine};

// ───────────────────────────────────────────────────────────────
// Published data
// ───────────────────────────────────────────────────────────────

/// One value from one unit.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorRecord {
    pub uid: String,
    pub measure: String,
    pub value: f64,
}

/// Everything read during one Sensors cycle.
#[derive(Debug, Clone)]
pub struct SensorsData {
    pub timestamp: DateTime<Utc>,
    /// Monotonic time of the cycle, used for staleness.
    pub taken_at: Instant,
    pub records: Vec<SensorRecord>,
    /// Mean of every record per measure.
    pub averages: BTreeMap<String, f64>,
}

impl SensorsData {
    pub fn new(timestamp: DateTime<Utc>, taken_at: Instant, records: Vec<SensorRecord>) -> Self {
        let mut sums: BTreeMap<String, (f64, u32)> = BTreeMap::new();
        for r in &records {
            let slot = sums.entry(r.measure.clone()).or_insert((0.0, 0));
            slot.0 += r.value;
            slot.1 += 1;
        }
        let averages = sums
            .into_iter()
            .map(|(measure, (sum, n))| (measure, sum / f64::from(n)))
            .collect();
        Self {
            timestamp,
            taken_at,
            records,
            averages,
        }
    }
}

/// Latest [`SensorsData`] of one ecosystem.  Readers get clones.
#[derive(Debug, Default)]
pub struct ReadingsStore {
    latest: RwLock<Option<SensorsData>>,
}

impl ReadingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, data: SensorsData) {
        *self.latest.write() = Some(data);
    }

    pub fn clear(&self) {
        *self.latest.write() = None;
    }

    pub fn snapshot(&self) -> Option<SensorsData> {
        self.latest.read().clone()
    }

    /// Average for `measure`.  With `max_age` set, a snapshot older than
    /// that counts as absent.
    pub fn average(&self, measure: &str, max_age: Option<Duration>) -> Option<f64> {
        let latest = self.latest.read();
        let data = latest.as_ref()?;
        if let Some(max_age) = max_age {
            if data.taken_at.elapsed() > max_age {
                return None;
            }
        }
        data.averages.get(measure).copied()
    }
}

// ───────────────────────────────────────────────────────────────
// Subroutine
// ───────────────────────────────────────────────────────────────

/// Polls sensor drivers.
pub struct Sensors {
    drivers: BTreeMap<String, Box<dyn SensorPort>>,
}

impl Sensors {
    pub fn new() -> Self {
        Self {
            drivers: BTreeMap::new(),
        }
    }
}

impl Default for Sensors {
    fn default() -> Self {
        Self::new()
    }
}

impl Routine for Sensors {
    fn check_resources(state: &EcosystemState) -> core::result::Result<(), Missing> {
        if state.inventory.has_capability(Capability::Sensor) {
            Ok(())
        } else {
            Err(Missing::Hardware)
        }
    }

    fn hardware_needed(state: &EcosystemState) -> BTreeSet<String> {
        state.inventory.uids_by_capability(Capability::Sensor)
    }

    fn accepts(record: &HardwareRecord) -> bool {
        record.capability == Capability::Sensor
    }

    fn attach(&mut self, record: &HardwareRecord, ctx: &Context) -> Result<()> {
        let driver = ctx.ports.hardware.sensor(record)?;
        self.drivers.insert(record.uid.clone(), driver);
        Ok(())
    }

    fn detach(&mut self, uid: &str, _ctx: &Context) {
        self.drivers.remove(uid);
    }

    fn on_stop(&mut self, ctx: &Context) {
        ctx.readings.clear();
    }

    async fn routine(&mut self, ctx: &Context) -> Result<()> {
        let uids: Vec<String> = self.drivers.keys().cloned().collect();
        let results = join_all(self.drivers.values_mut().map(|driver| driver.read())).await;

        let mut records = Vec::new();
        for (uid, result) in uids.into_iter().zip(results) {
            match result {
                Ok(readings) => records.extend(readings.into_iter().filter_map(|r| {
                    r.value.is_finite().then(|| SensorRecord {
                        uid: uid.clone(),
                        measure: r.measure,
                        value: r.value,
                    })
                })),
                Err(e) => warn!("Sensors[{}]: '{}' read failed: {}", ctx.ecosystem, uid, e),
            }
        }

        let data = SensorsData::new(ctx.ports.clock.now_utc(), Instant::now(), records);
        debug!(
            "Sensors[{}]: {} records, averages {:?}",
            ctx.ecosystem,
            data.records.len(),
            data.averages
        );
        ctx.readings.publish(data);
        Ok(())
    }
}
