//! Ecosystem: one growing enclosure and everything that drives it.
//!
//! [`Ecosystem`] owns the actuator hub, the hardware inventory, the config
//! view and one cell per [`SubroutineKind`].  It is the only place the
//! lifecycle moves, and it enforces `enabled && manageable` before any
//! start.  Started subroutines run as tokio tasks; the countdown sweep is
//! one more.
//!
//! ```text
//!   event layer ──▶ ┌──────────────────────────────┐ ──▶ EventQueue
//!                   │          Ecosystem           │
//!                   │  cells · inventory · config  │
//!                   └──────┬───────────────┬───────┘
//!             spawn/abort  │               │ Arc<Context>
//!                          ▼               ▼
//!              [routine tasks]       ActuatorHub ──▶ SwitchPort
//! ```

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::actuators::{ActuatorHub, ActuatorState, TurnTo, run_countdown_sweep};
use crate::config::{
    ClimateParameter, ClimateParameterConfig, EcosystemConfig, LightMethod, LightingHours,
    SunTimes, TimingConfig,
};
use crate::control::lighting::fixed_hours;
use crate::error::{Error, Result};
use crate::events::EventQueue;
use crate::hardware::{Capability, HardwareRecord};
use crate::scheduler::Cadence;
use crate::subroutines::climate::regulated_parameters;
use crate::subroutines::{
    Context, EcosystemState, HealthRecord, Missing, Picture, ReadingsStore, SensorsData,
    Subroutine, SubroutineCell, SubroutineKind,
};

use super::commands::EcosystemCommand;
use super::events::EcosystemEvent;
use super::ports::{EventSink, Ports};

type Cell = Arc<Mutex<SubroutineCell>>;

// ───────────────────────────────────────────────────────────────
// Ecosystem
// ───────────────────────────────────────────────────────────────

pub struct Ecosystem {
    uid: String,
    name: String,
    ctx: Arc<Context>,
    /// Indexed by `SubroutineKind as usize`, in `SubroutineKind::ALL` order.
    cells: [Cell; 5],
    tasks: [Option<JoinHandle<()>>; 5],
    sweep: Option<JoinHandle<()>>,
}

impl Ecosystem {
    /// Build an idle ecosystem.  Nothing runs until [`start`](Self::start)
    /// or [`start_subroutine`](Self::start_subroutine).
    pub fn new(config: &EcosystemConfig, timing: TimingConfig, ports: Ports) -> Result<Self> {
        config.validate()?;
        timing.validate()?;
        let state = EcosystemState::from_config(config)?;
        let events = Arc::new(EventQueue::new());
        let hub = Arc::new(ActuatorHub::new(
            config.uid.clone(),
            Arc::clone(&ports.switches),
            Arc::clone(&events),
        ));
        let cells = SubroutineKind::ALL
            .map(|kind| Arc::new(Mutex::new(SubroutineCell::new(kind, &state))));
        let ctx = Arc::new(Context {
            ecosystem: config.uid.clone(),
            hub,
            readings: Arc::new(ReadingsStore::new()),
            events,
            ports,
            timing,
            state: parking_lot::RwLock::new(state),
        });
        info!(
            "Ecosystem[{}]: '{}' loaded, {} hardware unit(s)",
            config.uid,
            config.name,
            config.hardware.len()
        );
        Ok(Self {
            uid: config.uid.clone(),
            name: config.name.clone(),
            ctx,
            cells,
            tasks: Default::default(),
            sweep: None,
        })
    }

    pub fn uid(&self) -> &str {
        &self.uid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn actuator_hub(&self) -> &ActuatorHub {
        &self.ctx.hub
    }

    /// Copy of the live config view.
    pub fn state(&self) -> EcosystemState {
        self.ctx.state.read().clone()
    }

    fn cell(&self, kind: SubroutineKind) -> &Cell {
        &self.cells[kind as usize]
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Spawn the countdown sweep and start every enabled, manageable
    /// subroutine in dependency order.  Refusals are logged, not returned.
    pub async fn start(&mut self) {
        if self.sweep.is_none() {
            self.sweep = Some(tokio::spawn(run_countdown_sweep(
                Arc::clone(&self.ctx.hub),
                self.ctx.timing.sweep_interval(),
            )));
        }
        for kind in SubroutineKind::ALL {
            if !self.is_enabled(kind) {
                continue;
            }
            if let Err(e) = self.start_kind(kind).await {
                info!("Ecosystem[{}]: {} not started: {}", self.uid, kind, e);
            }
        }
        info!(
            "Ecosystem[{}]: running {:?}",
            self.uid,
            self.ctx.state.read().started
        );
    }

    /// Stop every subroutine, disable all management and stop the sweep.
    pub async fn shutdown(&mut self) {
        for kind in SubroutineKind::ALL.into_iter().rev() {
            self.stop_kind(kind).await;
            self.ctx.state.write().management.set(kind, false);
        }
        if let Some(sweep) = self.sweep.take() {
            sweep.abort();
            let _ = sweep.await;
        }
        info!("Ecosystem[{}]: shut down", self.uid);
    }

    pub fn is_enabled(&self, kind: SubroutineKind) -> bool {
        self.ctx.state.read().management.get(kind)
    }

    pub fn is_started(&self, kind: SubroutineKind) -> bool {
        self.ctx.state.read().is_started(kind)
    }

    /// `Ok` when `kind` could start now, else what is missing.
    pub fn manageable(&self, kind: SubroutineKind) -> core::result::Result<(), Missing> {
        kind.manageable(&self.ctx.state.read())
    }

    pub fn get_hardware_needed_uid(&self, kind: SubroutineKind) -> BTreeSet<String> {
        kind.get_hardware_needed_uid(&self.ctx.state.read())
    }

    pub fn enable_subroutine(&mut self, name: &str) -> Result<()> {
        let kind: SubroutineKind = name.parse()?;
        self.ctx.state.write().management.set(kind, true);
        debug!("Ecosystem[{}]: {} enabled", self.uid, kind);
        Ok(())
    }

    /// Disable management, stopping the subroutine first if it runs.
    pub async fn disable_subroutine(&mut self, name: &str) -> Result<()> {
        let kind: SubroutineKind = name.parse()?;
        self.stop_kind(kind).await;
        self.ctx.state.write().management.set(kind, false);
        debug!("Ecosystem[{}]: {} disabled", self.uid, kind);
        Ok(())
    }

    pub async fn start_subroutine(&mut self, name: &str) -> Result<()> {
        let kind: SubroutineKind = name.parse()?;
        self.start_kind(kind).await
    }

    /// Stop a subroutine and, first, everything that requires it.
    /// Stopping one that is not started is a no-op.
    pub async fn stop_subroutine(&mut self, name: &str) -> Result<()> {
        let kind: SubroutineKind = name.parse()?;
        self.stop_kind(kind).await;
        Ok(())
    }

    async fn start_kind(&mut self, kind: SubroutineKind) -> Result<()> {
        if self.is_started(kind) {
            debug!("Ecosystem[{}]: {} already started", self.uid, kind);
            return Ok(());
        }
        let gate = {
            let state = self.ctx.state.read();
            if state.management.get(kind) {
                kind.manageable(&state)
            } else {
                Err(Missing::Disabled)
            }
        };
        if let Err(missing) = gate {
            warn!(
                "Ecosystem[{}]: {} is not manageable, missing {}",
                self.uid, kind, missing
            );
            return Err(Error::NotManageable { kind, missing });
        }

        {
            let mut cell = self.cell(kind).lock().await;
            self.ctx.state.write().started.insert(kind);
            if let Err(e) = cell.start(&self.ctx) {
                self.ctx.state.write().started.remove(&kind);
                cell.stop(&self.ctx);
                warn!("Ecosystem[{}]: {} failed to start: {}", self.uid, kind, e);
                return Err(e);
            }
        }

        let task = tokio::spawn(run_routine(
            kind,
            Arc::clone(self.cell(kind)),
            Arc::clone(&self.ctx),
        ));
        self.tasks[kind as usize] = Some(task);
        self.ctx.events.push(EcosystemEvent::SubroutineStarted(kind));
        info!("Ecosystem[{}]: {} started", self.uid, kind);
        Ok(())
    }

    async fn stop_kind(&mut self, kind: SubroutineKind) {
        for k in self.stop_order(kind) {
            self.stop_one(k).await;
        }
    }

    /// `kind` plus every started kind that transitively requires it,
    /// dependents first.
    fn stop_order(&self, kind: SubroutineKind) -> Vec<SubroutineKind> {
        let mut affected = BTreeSet::from([kind]);
        // ALL is dependency ordered, so one pass closes the set.
        for k in SubroutineKind::ALL {
            if k.requires().iter().any(|dep| affected.contains(dep)) {
                affected.insert(k);
            }
        }
        let state = self.ctx.state.read();
        SubroutineKind::ALL
            .into_iter()
            .rev()
            .filter(|k| affected.contains(k) && state.is_started(*k))
            .collect()
    }

    async fn stop_one(&mut self, kind: SubroutineKind) {
        if let Some(task) = self.tasks[kind as usize].take() {
            task.abort();
            let _ = task.await;
        }
        // Leave the started set before the stop hooks run, so detaching
        // hardware does not re-claim anything.
        if !self.ctx.state.write().started.remove(&kind) {
            return;
        }
        self.cell(kind).lock().await.stop(&self.ctx);
        self.ctx.events.push(EcosystemEvent::SubroutineStopped(kind));
        info!("Ecosystem[{}]: {} stopped", self.uid, kind);
    }

    /// Stop started subroutines whose resources disappeared.
    async fn refresh_subroutines(&mut self) {
        for kind in SubroutineKind::ALL.into_iter().rev() {
            if !self.is_started(kind) {
                continue;
            }
            let check = {
                let mut state = self.ctx.state.read().clone();
                // A kind's own start flag is not one of its resources.
                state.started.remove(&kind);
                kind.manageable(&state)
            };
            if let Err(missing) = check {
                warn!(
                    "Ecosystem[{}]: {} no longer manageable, missing {}; stopping",
                    self.uid, kind, missing
                );
                self.stop_kind(kind).await;
            }
        }
    }

    // ── Actuators ─────────────────────────────────────────────

    pub fn turn_actuator(
        &self,
        capability: &str,
        mode: &str,
        countdown_secs: f64,
    ) -> Result<ActuatorState> {
        self.ctx.hub.turn_actuator_str(capability, mode, countdown_secs)
    }

    pub fn turn_actuator_typed(
        &self,
        capability: Capability,
        turn_to: TurnTo,
        countdown: Duration,
    ) -> Result<ActuatorState> {
        self.ctx.hub.turn_actuator(capability, turn_to, countdown)
    }

    // ── Climate ───────────────────────────────────────────────

    /// Create or update the targets for one parameter.
    pub async fn set_climate_parameter(
        &mut self,
        parameter: ClimateParameter,
        day: f64,
        night: f64,
        hysteresis: f64,
    ) -> Result<()> {
        let config = ClimateParameterConfig::new(day, night, hysteresis);
        config.validate()?;
        self.ctx.state.write().climate.insert(parameter, config);
        info!(
            "Ecosystem[{}]: {} target day {} / night {} (±{})",
            self.uid, parameter, day, night, hysteresis
        );
        self.ctx.events.push(EcosystemEvent::ClimateChanged);
        self.refresh_subroutines().await;
        Ok(())
    }

    pub async fn delete_climate_parameter(&mut self, parameter: ClimateParameter) -> Result<()> {
        if self.ctx.state.write().climate.remove(&parameter).is_none() {
            return Err(Error::not_found("climate parameter", parameter.as_str()));
        }
        info!("Ecosystem[{}]: {} target deleted", self.uid, parameter);
        self.ctx.events.push(EcosystemEvent::ClimateChanged);
        self.refresh_subroutines().await;
        Ok(())
    }

    /// Configured parameters with a coupled actuator present.  Empty while
    /// Climate is stopped.
    pub fn regulated_parameters(&self) -> Vec<ClimateParameter> {
        let state = self.ctx.state.read();
        if !state.is_started(SubroutineKind::Climate) {
            return Vec::new();
        }
        regulated_parameters(&state.climate, &state.inventory)
    }

    // ── Lighting ──────────────────────────────────────────────

    pub async fn lighting_hours(&self) -> LightingHours {
        let cell = self.cell(SubroutineKind::Light).lock().await;
        match cell.inner() {
            Subroutine::Light(light) => light.hours(),
            _ => fixed_hours(&self.ctx.state.read().sky),
        }
    }

    /// Override the lighting hours until the next refresh.
    pub async fn set_lighting_hours(&mut self, hours: LightingHours) {
        {
            let mut cell = self.cell(SubroutineKind::Light).lock().await;
            if let Subroutine::Light(light) = cell.inner_mut() {
                light.set_lighting_hours(hours);
            }
        }
        self.ctx.events.push(EcosystemEvent::LightingHoursChanged(hours));
    }

    pub async fn set_lighting_method(&mut self, method: LightMethod) {
        self.ctx.state.write().sky.lighting = method;
        info!("Ecosystem[{}]: lighting method {}", self.uid, method);
        self.refresh_lighting().await;
    }

    pub async fn update_sun_times(&mut self, sun_times: SunTimes) {
        self.ctx.state.write().sun_times = Some(sun_times);
        debug!("Ecosystem[{}]: sun times updated", self.uid);
        self.refresh_lighting().await;
    }

    async fn refresh_lighting(&self) {
        let hours = {
            let mut cell = self.cell(SubroutineKind::Light).lock().await;
            let Subroutine::Light(light) = cell.inner_mut() else {
                return;
            };
            let state = self.ctx.state.read();
            light.refresh(&state)
        };
        self.ctx.events.push(EcosystemEvent::LightingHoursChanged(hours));
    }

    // ── Hardware ──────────────────────────────────────────────

    /// Add a record to the inventory and offer it to every subroutine that
    /// accepts it.
    pub async fn add_hardware(&mut self, record: HardwareRecord) -> Result<()> {
        self.ctx.state.write().inventory.insert(record.clone())?;
        info!(
            "Ecosystem[{}]: hardware '{}' ({}) added",
            self.uid, record.uid, record.capability
        );
        self.offer_hardware(&record).await;
        self.ctx.events.push(EcosystemEvent::HardwareChanged {
            uid: record.uid.clone(),
        });
        self.refresh_subroutines().await;
        Ok(())
    }

    /// Replace a record.  Drivers bound to the old record are rebuilt.
    pub async fn update_hardware(&mut self, record: HardwareRecord) -> Result<()> {
        self.ctx.state.write().inventory.update(record.clone())?;
        self.detach_everywhere(&record.uid).await;
        self.offer_hardware(&record).await;
        info!("Ecosystem[{}]: hardware '{}' updated", self.uid, record.uid);
        self.ctx.events.push(EcosystemEvent::HardwareChanged {
            uid: record.uid.clone(),
        });
        self.refresh_subroutines().await;
        Ok(())
    }

    /// Detach `uid` from every subroutine it is attached to.
    async fn detach_everywhere(&self, uid: &str) {
        for cell in &self.cells {
            let mut cell = cell.lock().await;
            match cell.remove_hardware(uid, &self.ctx) {
                // Not attached to this cell.
                Ok(()) | Err(Error::NotFound { .. }) => {}
                Err(e) => warn!(
                    "Ecosystem[{}]: detaching '{}' from {} failed: {}",
                    self.uid,
                    uid,
                    cell.kind(),
                    e
                ),
            }
        }
    }

    pub async fn remove_hardware(&mut self, uid: &str) -> Result<()> {
        let record = self.ctx.state.write().inventory.remove(uid)?;
        self.detach_everywhere(uid).await;
        info!(
            "Ecosystem[{}]: hardware '{}' ({}) removed",
            self.uid, uid, record.capability
        );
        self.ctx.events.push(EcosystemEvent::HardwareChanged { uid: uid.to_string() });
        self.refresh_subroutines().await;
        Ok(())
    }

    async fn offer_hardware(&self, record: &HardwareRecord) {
        for kind in SubroutineKind::ALL {
            if !kind.accepts(record) {
                continue;
            }
            let mut cell = self.cell(kind).lock().await;
            if let Err(e) = cell.add_hardware(record, &self.ctx) {
                warn!(
                    "Ecosystem[{}]: {} could not take '{}': {}",
                    self.uid, kind, record.uid, e
                );
            }
        }
    }

    /// Attach an inventory record to one named subroutine.  Refused with
    /// `HardwareIncompatible` when the kind does not accept it.
    pub async fn add_subroutine_hardware(&mut self, name: &str, uid: &str) -> Result<()> {
        let kind: SubroutineKind = name.parse()?;
        let record = self
            .ctx
            .state
            .read()
            .inventory
            .get(uid)
            .cloned()
            .ok_or_else(|| Error::not_found("hardware", uid))?;
        self.cell(kind).lock().await.add_hardware(&record, &self.ctx)
    }

    pub async fn remove_subroutine_hardware(&mut self, name: &str, uid: &str) -> Result<()> {
        let kind: SubroutineKind = name.parse()?;
        self.cell(kind).lock().await.remove_hardware(uid, &self.ctx)
    }

    /// Uids currently attached to a subroutine.
    pub async fn subroutine_hardware(&self, kind: SubroutineKind) -> BTreeSet<String> {
        self.cell(kind).lock().await.hardware().clone()
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn sensors_data(&self) -> Option<SensorsData> {
        self.ctx.readings.snapshot()
    }

    pub async fn health_records(&self) -> Vec<HealthRecord> {
        let cell = self.cell(SubroutineKind::Health).lock().await;
        match cell.inner() {
            Subroutine::Health(health) => health.records().cloned().collect(),
            _ => Vec::new(),
        }
    }

    pub async fn latest_pictures(&self) -> Vec<(String, Picture)> {
        let cell = self.cell(SubroutineKind::Pictures).lock().await;
        match cell.inner() {
            Subroutine::Pictures(pictures) => pictures
                .latest()
                .iter()
                .map(|(uid, p)| (uid.clone(), p.clone()))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Run one routine cycle now, outside the task cadence.
    pub async fn run_routine_once(&self, kind: SubroutineKind) -> Result<()> {
        self.cell(kind).lock().await.routine(&self.ctx).await
    }

    // ── Commands & events ─────────────────────────────────────

    /// Typed entry point for the event layer.
    pub async fn handle_command(&mut self, cmd: EcosystemCommand) -> Result<()> {
        match cmd {
            EcosystemCommand::EnableSubroutine { name } => self.enable_subroutine(&name),
            EcosystemCommand::DisableSubroutine { name } => self.disable_subroutine(&name).await,
            EcosystemCommand::StartSubroutine { name } => self.start_subroutine(&name).await,
            EcosystemCommand::StopSubroutine { name } => self.stop_subroutine(&name).await,
            EcosystemCommand::TurnActuator {
                capability,
                mode,
                countdown,
            } => self.turn_actuator(&capability, &mode, countdown).map(|_| ()),
            EcosystemCommand::SetClimateParameter {
                parameter,
                day,
                night,
                hysteresis,
            } => {
                self.set_climate_parameter(parameter.parse()?, day, night, hysteresis)
                    .await
            }
            EcosystemCommand::DeleteClimateParameter { parameter } => {
                self.delete_climate_parameter(parameter.parse()?).await
            }
            EcosystemCommand::SetLightingMethod { method } => {
                self.set_lighting_method(method.parse()?).await;
                Ok(())
            }
            EcosystemCommand::SetLightingHours(hours) => {
                self.set_lighting_hours(hours).await;
                Ok(())
            }
            EcosystemCommand::UpdateSunTimes(sun_times) => {
                self.update_sun_times(sun_times).await;
                Ok(())
            }
            EcosystemCommand::AddHardware(record) => self.add_hardware(record).await,
            EcosystemCommand::UpdateHardware(record) => self.update_hardware(record).await,
            EcosystemCommand::RemoveHardware { uid } => self.remove_hardware(&uid).await,
        }
    }

    /// Hand every queued outbound event to `sink`.
    pub fn drain_events(&self, sink: &mut dyn EventSink) -> usize {
        self.ctx.events.drain(sink)
    }
}

impl Drop for Ecosystem {
    fn drop(&mut self) {
        for task in self.tasks.iter().flatten() {
            task.abort();
        }
        if let Some(sweep) = &self.sweep {
            sweep.abort();
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Routine task
// ───────────────────────────────────────────────────────────────

async fn run_routine(kind: SubroutineKind, cell: Cell, ctx: Arc<Context>) {
    match kind.cadence(&ctx.timing) {
        Cadence::Every(period) => {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                run_cycle(kind, &cell, &ctx).await;
            }
        }
        cadence @ Cadence::DailyAt(at) => {
            debug!("{}[{}]: daily at {}", kind, ctx.ecosystem, at);
            loop {
                let delay = cadence.next_delay(ctx.ports.clock.local_time());
                tokio::time::sleep(delay).await;
                run_cycle(kind, &cell, &ctx).await;
            }
        }
    }
}

async fn run_cycle(kind: SubroutineKind, cell: &Mutex<SubroutineCell>, ctx: &Context) {
    let mut cell = cell.lock().await;
    if let Err(e) = cell.routine(ctx).await {
        warn!("{}[{}]: routine failed: {}", kind, ctx.ecosystem, e);
    }
}
