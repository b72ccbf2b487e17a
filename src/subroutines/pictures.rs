//! Pictures subroutine: periodic capture, latest frame kept per camera.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use log::{debug, warn};

use crate::app::ports::{CameraPort, Image};
use crate::error::Result;
use crate::hardware::{Capability, HardwareRecord};

use super::context::{Context, EcosystemState};
use super::{Missing, Routine};

#[derive(Debug, Clone, PartialEq)]
pub struct Picture {
    pub timestamp: DateTime<Utc>,
    pub image: Image,
}

pub struct Pictures {
    cameras: BTreeMap<String, Box<dyn CameraPort>>,
    latest: BTreeMap<String, Picture>,
}

impl Pictures {
    pub fn new() -> Self {
        Self {
            cameras: BTreeMap::new(),
            latest: BTreeMap::new(),
        }
    }

    pub fn latest(&self) -> &BTreeMap<String, Picture> {
        &self.latest
    }
}

impl Default for Pictures {
    fn default() -> Self {
        Self::new()
    }
}

impl Routine for Pictures {
    fn check_resources(state: &EcosystemState) -> core::result::Result<(), Missing> {
        if state.inventory.has_capability(Capability::Camera) {
            Ok(())
        } else {
            Err(Missing::Hardware)
        }
    }

    fn hardware_needed(state: &EcosystemState) -> BTreeSet<String> {
        state.inventory.uids_by_capability(Capability::Camera)
    }

    fn accepts(record: &HardwareRecord) -> bool {
        record.capability == Capability::Camera
    }

    fn attach(&mut self, record: &HardwareRecord, ctx: &Context) -> Result<()> {
        let camera = ctx.ports.hardware.camera(record)?;
        self.cameras.insert(record.uid.clone(), camera);
        Ok(())
    }

    fn detach(&mut self, uid: &str, _ctx: &Context) {
        self.cameras.remove(uid);
        self.latest.remove(uid);
    }

    async fn routine(&mut self, ctx: &Context) -> Result<()> {
        for (uid, camera) in &mut self.cameras {
            match camera.capture().await {
                Ok(image) => {
                    debug!(
                        "Pictures[{}]: '{}' {}x{}",
                        ctx.ecosystem, uid, image.width, image.height
                    );
                    self.latest.insert(
                        uid.clone(),
                        Picture {
                            timestamp: ctx.ports.clock.now_utc(),
                            image,
                        },
                    );
                }
                Err(e) => warn!("Pictures[{}]: '{}' capture failed: {}", ctx.ecosystem, uid, e),
            }
        }
        Ok(())
    }
}
