//! Port traits — the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ Ecosystem / Subroutines (domain)
//! ```
//!
//! Driven adapters (sensor and camera drivers, output switches, the wall
//! clock, event sinks) implement these traits.  The
//! [`Ecosystem`](super::ecosystem::Ecosystem) holds them behind `Arc<dyn _>`
//! so one process can mix virtual and physical hardware.
//!
//! Reads and captures are async and may suspend; switching an output is
//! synchronous because it runs inside the actuator hub's critical section.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveTime, Utc};

use crate::error::HardwareError;
use crate::hardware::{Capability, HardwareRecord};

use super::events::EcosystemEvent;

// ───────────────────────────────────────────────────────────────
// Sensor port (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// One value for one measure.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasureReading {
    pub measure: String,
    pub value: f64,
}

impl MeasureReading {
    pub fn new(measure: impl Into<String>, value: f64) -> Self {
        Self {
            measure: measure.into(),
            value,
        }
    }
}

/// Driver for one sensor unit.
#[async_trait]
pub trait SensorPort: Send {
    /// Read every measure the unit reports.
    async fn read(&mut self) -> Result<Vec<MeasureReading>, HardwareError>;
}

// ───────────────────────────────────────────────────────────────
// Camera port
// ───────────────────────────────────────────────────────────────

/// Raw RGB frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    pub width: u32,
    pub height: u32,
    /// Row-major RGB triples, `width * height` long.
    pub pixels: Vec<[u8; 3]>,
}

impl Image {
    /// A frame filled with one colour.
    pub fn uniform(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        Self {
            width,
            height,
            pixels: vec![rgb; (width * height) as usize],
        }
    }
}

/// Driver for one camera.
#[async_trait]
pub trait CameraPort: Send {
    async fn capture(&mut self) -> Result<Image, HardwareError>;
}

// ───────────────────────────────────────────────────────────────
// Switch port (driven adapter: domain → hardware)
// ───────────────────────────────────────────────────────────────

/// Physical outputs of one ecosystem, addressed by capability.
///
/// Called with the actuator hub locked: implementations must not block
/// for long and must not call back into the hub.
pub trait SwitchPort: Send + Sync {
    fn set_status(&self, capability: Capability, on: bool) -> Result<(), HardwareError>;
}

// ───────────────────────────────────────────────────────────────
// Hardware factory
// ───────────────────────────────────────────────────────────────

/// Builds drivers from inventory records.
pub trait HardwareFactory: Send + Sync {
    fn sensor(&self, record: &HardwareRecord) -> Result<Box<dyn SensorPort>, HardwareError>;
    fn camera(&self, record: &HardwareRecord) -> Result<Box<dyn CameraPort>, HardwareError>;
}

// ───────────────────────────────────────────────────────────────
// Clock port
// ───────────────────────────────────────────────────────────────

/// Wall-clock source.  Regulation decisions use the local time of day.
pub trait ClockPort: Send + Sync {
    fn local_time(&self) -> NaiveTime;
    fn now_utc(&self) -> DateTime<Utc>;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / event layer)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`EcosystemEvent`]s through this port.
/// Adapters decide where they go (log, remote event layer, tests).
pub trait EventSink {
    fn emit(&mut self, event: &EcosystemEvent);
}

// ───────────────────────────────────────────────────────────────
// Bundle
// ───────────────────────────────────────────────────────────────

/// Everything an ecosystem needs from the outside world.
#[derive(Clone)]
pub struct Ports {
    pub switches: Arc<dyn SwitchPort>,
    pub hardware: Arc<dyn HardwareFactory>,
    pub clock: Arc<dyn ClockPort>,
}
