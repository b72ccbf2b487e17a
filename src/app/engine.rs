//! Engine: every ecosystem of the process.
//!
//! Owns the [`Ecosystem`]s by uid, fans sun-time refreshes out to all of
//! them and tears everything down on shutdown.

use std::collections::BTreeMap;

use log::info;

use crate::config::{ControllerConfig, EcosystemConfig, SunTimes, TimingConfig};
use crate::error::{Error, Result};

use super::ecosystem::Ecosystem;
use super::ports::{EventSink, Ports};

pub struct Engine {
    timing: TimingConfig,
    ecosystems: BTreeMap<String, Ecosystem>,
}

impl Engine {
    pub fn new(timing: TimingConfig) -> Self {
        Self {
            timing,
            ecosystems: BTreeMap::new(),
        }
    }

    /// Build every configured ecosystem, wiring each to the ports
    /// `ports_for` returns.  Nothing is started.
    pub fn from_config(
        config: &ControllerConfig,
        mut ports_for: impl FnMut(&EcosystemConfig) -> Ports,
    ) -> Result<Self> {
        config.validate()?;
        let mut engine = Self::new(config.timing);
        for eco in &config.ecosystems {
            engine.add_ecosystem(eco, ports_for(eco))?;
        }
        Ok(engine)
    }

    pub fn timing(&self) -> &TimingConfig {
        &self.timing
    }

    pub fn add_ecosystem(&mut self, config: &EcosystemConfig, ports: Ports) -> Result<()> {
        if self.ecosystems.contains_key(&config.uid) {
            return Err(Error::InvalidArgument(format!(
                "ecosystem '{}' already exists",
                config.uid
            )));
        }
        let ecosystem = Ecosystem::new(config, self.timing, ports)?;
        self.ecosystems.insert(config.uid.clone(), ecosystem);
        Ok(())
    }

    /// Shut an ecosystem down and drop it.
    pub async fn remove_ecosystem(&mut self, uid: &str) -> Result<()> {
        let mut ecosystem = self
            .ecosystems
            .remove(uid)
            .ok_or_else(|| Error::not_found("ecosystem", uid))?;
        ecosystem.shutdown().await;
        info!("Engine: removed ecosystem '{}'", uid);
        Ok(())
    }

    pub fn ecosystem(&self, uid: &str) -> Option<&Ecosystem> {
        self.ecosystems.get(uid)
    }

    pub fn ecosystem_mut(&mut self, uid: &str) -> Option<&mut Ecosystem> {
        self.ecosystems.get_mut(uid)
    }

    pub fn ecosystems(&self) -> impl Iterator<Item = &Ecosystem> {
        self.ecosystems.values()
    }

    pub fn len(&self) -> usize {
        self.ecosystems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ecosystems.is_empty()
    }

    /// Start every ecosystem.
    pub async fn start(&mut self) {
        for ecosystem in self.ecosystems.values_mut() {
            ecosystem.start().await;
        }
        info!("Engine: {} ecosystem(s) running", self.ecosystems.len());
    }

    /// Hand fresh sun times to every ecosystem.
    pub async fn update_sun_times(&mut self, sun_times: SunTimes) {
        for ecosystem in self.ecosystems.values_mut() {
            ecosystem.update_sun_times(sun_times).await;
        }
    }

    /// Drain every ecosystem's outbound events into `sink`.
    pub fn drain_events(&self, sink: &mut dyn EventSink) -> usize {
        self.ecosystems.values().map(|e| e.drain_events(sink)).sum()
    }

    pub async fn shutdown(&mut self) {
        for ecosystem in self.ecosystems.values_mut() {
            ecosystem.shutdown().await;
        }
        info!("Engine: shut down");
    }
}
