//! Health subroutine: daily plant-health capture.
//!
//! Captures one frame per health camera and scores it with the
//! excess-green index (`2g - r - b` on normalised channels).  The light is
//! forced on for the capture and handed back afterwards exactly as it was:
//! automatic, or manual with its status and remaining countdown.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{error, info, warn};
use tokio::time::Instant;

use crate::actuators::{ActuatorMode, ActuatorState, TurnTo};
use crate::app::ports::{CameraPort, Image};
use crate::error::Result;
use crate::hardware::{Capability, HardwareRecord};

use super::context::{Context, EcosystemState};
use super::{Missing, Routine, SubroutineKind};

/// Measure a camera must declare to be used for health.
pub const HEALTH_MEASURE: &str = "health";

/// Records kept in memory.
const HISTORY_DEPTH: usize = 64;

/// Excess-green above this marks a pixel as vegetation.
const GREEN_THRESHOLD: f64 = 0.1;

#[derive(Debug, Clone, PartialEq)]
pub struct HealthRecord {
    pub timestamp: DateTime<Utc>,
    pub camera: String,
    /// Mean excess-green, in `[-2, 2]`.
    pub green_index: f64,
    /// Share of vegetation pixels, in `[0, 1]`.
    pub green_coverage: f64,
}

/// `(mean excess-green, vegetation share)` of a frame.  An empty frame scores zero.
pub fn vegetation_index(image: &Image) -> (f64, f64) {
    if image.pixels.is_empty() {
        return (0.0, 0.0);
    }
    let mut sum = 0.0;
    let mut green = 0usize;
    for [r, g, b] in &image.pixels {
        let (r, g, b) = (
            f64::from(*r) / 255.0,
            f64::from(*g) / 255.0,
            f64::from(*b) / 255.0,
        );
        let exg = 2.0 * g - r - b;
        sum += exg;
        if exg > GREEN_THRESHOLD {
            green += 1;
        }
    }
    let n = image.pixels.len() as f64;
    (sum / n, green as f64 / n)
}

pub struct Health {
    cameras: BTreeMap<String, Box<dyn CameraPort>>,
    records: VecDeque<HealthRecord>,
    /// Light state to put back, and when it was taken over.  Also covers
    /// a capture interrupted by a stop.
    pending_restore: Option<(ActuatorState, Instant)>,
}

impl Health {
    pub fn new() -> Self {
        Self {
            cameras: BTreeMap::new(),
            records: VecDeque::new(),
            pending_restore: None,
        }
    }

    pub fn records(&self) -> impl Iterator<Item = &HealthRecord> {
        self.records.iter()
    }

    fn restore_light(&mut self, ctx: &Context) {
        let Some((prior, taken_at)) = self.pending_restore.take() else {
            return;
        };
        if let Err(e) = ctx.hub.restore(restore_target(prior, taken_at.elapsed(), ctx)) {
            error!("Health[{}]: could not restore light: {}", ctx.ecosystem, e);
        }
    }
}

impl Default for Health {
    fn default() -> Self {
        Self::new()
    }
}

/// What the light goes back to once the capture is over.
///
/// A manual countdown keeps running during the capture; one that ran out
/// meanwhile reverts to automatic.  The claim stays with Light if it
/// started in the meantime.
fn restore_target(prior: ActuatorState, elapsed: Duration, ctx: &Context) -> ActuatorState {
    let light_started = ctx.state.read().is_started(SubroutineKind::Light);
    let mut target = ActuatorState {
        active: prior.active || light_started,
        ..prior
    };
    if prior.mode == ActuatorMode::Manual && !prior.countdown.is_zero() {
        target.countdown = prior.countdown.saturating_sub(elapsed);
        if target.countdown.is_zero() {
            target.mode = ActuatorMode::Automatic;
        }
    }
    target
}

fn is_health_camera(record: &HardwareRecord) -> bool {
    record.capability == Capability::Camera && record.measures(HEALTH_MEASURE)
}

impl Routine for Health {
    fn check_resources(state: &EcosystemState) -> core::result::Result<(), Missing> {
        if state.inventory.iter().any(is_health_camera) {
            Ok(())
        } else {
            Err(Missing::Hardware)
        }
    }

    fn hardware_needed(state: &EcosystemState) -> BTreeSet<String> {
        state
            .inventory
            .iter()
            .filter(|r| is_health_camera(r))
            .map(|r| r.uid.clone())
            .collect()
    }

    fn accepts(record: &HardwareRecord) -> bool {
        is_health_camera(record)
    }

    fn attach(&mut self, record: &HardwareRecord, ctx: &Context) -> Result<()> {
        let camera = ctx.ports.hardware.camera(record)?;
        self.cameras.insert(record.uid.clone(), camera);
        Ok(())
    }

    fn detach(&mut self, uid: &str, _ctx: &Context) {
        self.cameras.remove(uid);
    }

    fn on_stop(&mut self, ctx: &Context) {
        self.restore_light(ctx);
    }

    async fn routine(&mut self, ctx: &Context) -> Result<()> {
        let has_light = ctx.state.read().inventory.has_capability(Capability::Light);
        if has_light {
            let prior = ctx.hub.get_handler(Capability::Light)?;
            ctx.hub
                .turn_actuator(Capability::Light, TurnTo::On, Duration::ZERO)?;
            self.pending_restore = Some((prior, Instant::now()));
        }

        let mut captured = Vec::new();
        for (uid, camera) in &mut self.cameras {
            match camera.capture().await {
                Ok(image) => captured.push((uid.clone(), image)),
                Err(e) => warn!("Health[{}]: '{}' capture failed: {}", ctx.ecosystem, uid, e),
            }
        }
        self.restore_light(ctx);

        for (camera, image) in captured {
            let (green_index, green_coverage) = vegetation_index(&image);
            info!(
                "Health[{}]: '{}' green index {:.3}, coverage {:.1}%",
                ctx.ecosystem,
                camera,
                green_index,
                green_coverage * 100.0
            );
            if self.records.len() == HISTORY_DEPTH {
                self.records.pop_front();
            }
            self.records.push_back(HealthRecord {
                timestamp: ctx.ports.clock.now_utc(),
                camera,
                green_index,
                green_coverage,
            });
        }
        Ok(())
    }
}
