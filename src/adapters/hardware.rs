//! Virtual hardware adapter: a simulated enclosure behind the port traits.
//!
//! [`VirtualHardware`] implements [`SwitchPort`] and [`HardwareFactory`]
//! over one shared [`VirtualEnvironment`]: switching the heater warms it,
//! the humidifier wets it, and so on, while every output that is off lets
//! the value relax toward ambient.  The demo binary runs on it; physical
//! drivers would implement the same ports.
//!
//! Supported models: `virtualSensor` and `virtualCamera`.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use log::debug;
use parking_lot::Mutex;

use crate::app::ports::{
    CameraPort, HardwareFactory, Image, MeasureReading, SensorPort, SwitchPort,
};
use crate::error::HardwareError;
use crate::hardware::{Capability, HardwareRecord};

pub const VIRTUAL_SENSOR: &str = "virtualSensor";
pub const VIRTUAL_CAMERA: &str = "virtualCamera";

/// Change per read while an output pushes a measure.
const STEP: f64 = 0.5;
/// Fraction of the gap to ambient closed per read.
const RELAX: f64 = 0.1;

// ───────────────────────────────────────────────────────────────
// Simulated environment
// ───────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct VirtualEnvironment {
    ambient: BTreeMap<String, f64>,
    values: Mutex<BTreeMap<String, f64>>,
    outputs: Mutex<BTreeMap<Capability, bool>>,
}

impl VirtualEnvironment {
    /// Typical indoor conditions.
    pub fn new() -> Self {
        Self::with_ambient([
            ("temperature", 21.0),
            ("humidity", 55.0),
            ("light", 200.0),
            ("wind", 0.0),
        ])
    }

    pub fn with_ambient<I, S>(ambient: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        let ambient: BTreeMap<String, f64> =
            ambient.into_iter().map(|(m, v)| (m.into(), v)).collect();
        Self {
            values: Mutex::new(ambient.clone()),
            ambient,
            outputs: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn value(&self, measure: &str) -> Option<f64> {
        self.values.lock().get(measure).copied()
    }

    pub fn set_value(&self, measure: &str, value: f64) {
        self.values.lock().insert(measure.to_string(), value);
    }

    pub fn output(&self, capability: Capability) -> bool {
        self.outputs.lock().get(&capability).copied().unwrap_or(false)
    }

    /// Advance one step and return the new value of `measure`.
    fn step(&self, measure: &str) -> Option<f64> {
        let push = {
            let outputs = self.outputs.lock();
            let on = |c: Capability| outputs.get(&c).copied().unwrap_or(false);
            match measure {
                "temperature" => push_of(on(Capability::Heater), on(Capability::Cooler)),
                "humidity" => push_of(on(Capability::Humidifier), on(Capability::Dehumidifier)),
                "wind" => push_of(on(Capability::Fan), false),
                "light" => push_of(on(Capability::Light), false) * 100.0,
                _ => 0.0,
            }
        };
        let mut values = self.values.lock();
        let value = values.get_mut(measure)?;
        if push == 0.0 {
            let ambient = self.ambient.get(measure).copied().unwrap_or(*value);
            *value += (ambient - *value) * RELAX;
        } else {
            *value += push;
        }
        Some(*value)
    }
}

impl Default for VirtualEnvironment {
    fn default() -> Self {
        Self::new()
    }
}

fn push_of(increase: bool, decrease: bool) -> f64 {
    match (increase, decrease) {
        (true, false) => STEP,
        (false, true) => -STEP,
        _ => 0.0,
    }
}

// ───────────────────────────────────────────────────────────────
// Drivers
// ───────────────────────────────────────────────────────────────

struct VirtualSensor {
    uid: String,
    measures: Vec<String>,
    env: Arc<VirtualEnvironment>,
}

#[async_trait]
impl SensorPort for VirtualSensor {
    async fn read(&mut self) -> Result<Vec<MeasureReading>, HardwareError> {
        let mut readings = Vec::with_capacity(self.measures.len());
        for measure in &self.measures {
            let value = self.env.step(measure).ok_or_else(|| {
                HardwareError::ReadFailed(format!("'{}' has no {} probe", self.uid, measure))
            })?;
            readings.push(MeasureReading::new(measure.clone(), value));
        }
        Ok(readings)
    }
}

struct VirtualCamera {
    env: Arc<VirtualEnvironment>,
}

#[async_trait]
impl CameraPort for VirtualCamera {
    async fn capture(&mut self) -> Result<Image, HardwareError> {
        // Foliage reads green under the light, grey in the dark.
        let rgb = if self.env.output(Capability::Light) {
            [60, 170, 50]
        } else {
            [40, 45, 40]
        };
        Ok(Image::uniform(32, 24, rgb))
    }
}

// ───────────────────────────────────────────────────────────────
// VirtualHardware
// ───────────────────────────────────────────────────────────────

/// Ports of one simulated ecosystem.
#[derive(Debug, Clone, Default)]
pub struct VirtualHardware {
    env: Arc<VirtualEnvironment>,
}

impl VirtualHardware {
    pub fn new(env: Arc<VirtualEnvironment>) -> Self {
        Self { env }
    }

    pub fn environment(&self) -> &Arc<VirtualEnvironment> {
        &self.env
    }
}

impl SwitchPort for VirtualHardware {
    fn set_status(&self, capability: Capability, on: bool) -> Result<(), HardwareError> {
        debug!("VirtualHardware: {} -> {}", capability, if on { "on" } else { "off" });
        self.env.outputs.lock().insert(capability, on);
        Ok(())
    }
}

impl HardwareFactory for VirtualHardware {
    fn sensor(&self, record: &HardwareRecord) -> Result<Box<dyn SensorPort>, HardwareError> {
        if record.model != VIRTUAL_SENSOR {
            return Err(HardwareError::UnsupportedModel(record.model.clone()));
        }
        Ok(Box::new(VirtualSensor {
            uid: record.uid.clone(),
            measures: record.measures.iter().cloned().collect(),
            env: Arc::clone(&self.env),
        }))
    }

    fn camera(&self, record: &HardwareRecord) -> Result<Box<dyn CameraPort>, HardwareError> {
        if record.model != VIRTUAL_CAMERA {
            return Err(HardwareError::UnsupportedModel(record.model.clone()));
        }
        Ok(Box::new(VirtualCamera {
            env: Arc::clone(&self.env),
        }))
    }
}
