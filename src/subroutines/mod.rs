//! Subroutines: lifecycle-managed units of periodic behaviour.
//!
//! The kind set is closed ([`SubroutineKind`]); each kind implements the
//! same [`Routine`] contract and is wrapped in the [`Subroutine`] tagged
//! union.  [`SubroutineCell`] adds the parts every kind shares: the
//! manageable gate, hardware attachment and the `NotStarted` guard.
//!
//! ```text
//!   disabled ──enable──▶ enabled ──start──▶ started
//!      ▲                   │  ▲               │
//!      └─────disable───────┘  └─────stop──────┘
//! ```
//!
//! `start` additionally requires the subroutine to be manageable: its
//! hardware is present, its configuration exists and every kind it
//! [`requires`](SubroutineKind::requires) is started.

pub mod climate;
pub mod context;
pub mod health;
pub mod light;
pub mod pictures;
pub mod sensors;

use std::collections::BTreeSet;
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::time::Duration;

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::config::TimingConfig;
use crate::error::{Error, Result};
use crate::hardware::HardwareRecord;
use crate::scheduler::Cadence;

pub use climate::Climate;
pub use context::{Context, EcosystemState};
pub use health::{Health, HealthRecord};
pub use light::Light;
pub use pictures::{Picture, Pictures};
pub use sensors::{ReadingsStore, SensorRecord, Sensors, SensorsData};

// ═══════════════════════════════════════════════════════════════
//  Kind
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubroutineKind {
    Sensors,
    Light,
    Climate,
    Health,
    Pictures,
}

impl SubroutineKind {
    /// Dependency order: a kind appears after everything it requires.
    pub const ALL: [Self; 5] = [
        Self::Sensors,
        Self::Light,
        Self::Climate,
        Self::Health,
        Self::Pictures,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sensors => "sensors",
            Self::Light => "light",
            Self::Climate => "climate",
            Self::Health => "health",
            Self::Pictures => "pictures",
        }
    }

    /// Kinds that must be started for this one to be manageable.
    pub const fn requires(self) -> &'static [Self] {
        match self {
            Self::Climate => &[Self::Sensors],
            _ => &[],
        }
    }

    pub fn cadence(self, timing: &TimingConfig) -> Cadence {
        match self {
            Self::Sensors => Cadence::Every(Duration::from_secs(timing.sensors_period_secs)),
            Self::Light => Cadence::Every(Duration::from_secs(timing.light_period_secs)),
            Self::Climate => Cadence::Every(Duration::from_secs(timing.climate_period_secs)),
            Self::Health => Cadence::DailyAt(timing.health_capture_time),
            Self::Pictures => Cadence::Every(Duration::from_secs(timing.pictures_period_secs)),
        }
    }
}

impl fmt::Display for SubroutineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubroutineKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| Error::UnknownSubroutine(s.to_string()))
    }
}

/// Why a subroutine cannot start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Missing {
    /// Management flag is off.
    Disabled,
    /// Required hardware is absent.
    Hardware,
    /// Required configuration is absent.
    Configuration,
    /// A required subroutine is not started.
    Dependency(SubroutineKind),
}

impl fmt::Display for Missing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disabled => write!(f, "management (disabled)"),
            Self::Hardware => write!(f, "hardware"),
            Self::Configuration => write!(f, "configuration"),
            Self::Dependency(kind) => write!(f, "dependency ({kind} not started)"),
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Per-kind contract
// ═══════════════════════════════════════════════════════════════

/// What each kind implements.  Lifecycle bookkeeping lives in [`SubroutineCell`].
pub(crate) trait Routine {
    /// Hardware and configuration check, without side effects.
    fn check_resources(state: &EcosystemState) -> core::result::Result<(), Missing>;

    /// Inventory uids this kind drives.
    fn hardware_needed(state: &EcosystemState) -> BTreeSet<String>;

    /// Whether a record's capability and level suit this kind.
    fn accepts(record: &HardwareRecord) -> bool;

    /// Bind a driver or claim for an accepted record.  Only called while started.
    fn attach(&mut self, _record: &HardwareRecord, _ctx: &Context) -> Result<()> {
        Ok(())
    }

    fn detach(&mut self, _uid: &str, _ctx: &Context) {}

    fn on_start(&mut self, _ctx: &Context) -> Result<()> {
        Ok(())
    }

    fn on_stop(&mut self, _ctx: &Context) {}

    fn routine(&mut self, ctx: &Context) -> impl Future<Output = Result<()>> + Send;
}

macro_rules! per_kind {
    ($kind:expr, $t:ident => $body:expr) => {
        match $kind {
            SubroutineKind::Sensors => {
                type $t = Sensors;
                $body
            }
            SubroutineKind::Light => {
                type $t = Light;
                $body
            }
            SubroutineKind::Climate => {
                type $t = Climate;
                $body
            }
            SubroutineKind::Health => {
                type $t = Health;
                $body
            }
            SubroutineKind::Pictures => {
                type $t = Pictures;
                $body
            }
        }
    };
}

impl SubroutineKind {
    /// Whether this kind could start now: every required kind is started
    /// and its hardware and configuration are present.  Pure; the
    /// management flag is checked separately by the owner.
    pub fn manageable(self, state: &EcosystemState) -> core::result::Result<(), Missing> {
        if let Some(dep) = self.requires().iter().find(|dep| !state.is_started(**dep)) {
            return Err(Missing::Dependency(*dep));
        }
        per_kind!(self, K => K::check_resources(state))
    }

    /// Hardware this kind needs for `manageable` to ever hold.
    pub fn get_hardware_needed_uid(self, state: &EcosystemState) -> BTreeSet<String> {
        per_kind!(self, K => K::hardware_needed(state))
    }

    pub fn accepts(self, record: &HardwareRecord) -> bool {
        per_kind!(self, K => K::accepts(record))
    }
}

// ═══════════════════════════════════════════════════════════════
//  Tagged union
// ═══════════════════════════════════════════════════════════════

pub enum Subroutine {
    Sensors(Sensors),
    Light(Light),
    Climate(Climate),
    Health(Health),
    Pictures(Pictures),
}

macro_rules! dispatch {
    ($self:expr, $s:ident => $body:expr) => {
        match $self {
            Subroutine::Sensors($s) => $body,
            Subroutine::Light($s) => $body,
            Subroutine::Climate($s) => $body,
            Subroutine::Health($s) => $body,
            Subroutine::Pictures($s) => $body,
        }
    };
}

impl Subroutine {
    pub fn new(kind: SubroutineKind, state: &EcosystemState) -> Self {
        match kind {
            SubroutineKind::Sensors => Self::Sensors(Sensors::new()),
            SubroutineKind::Light => Self::Light(Light::new(state)),
            SubroutineKind::Climate => Self::Climate(Climate::new()),
            SubroutineKind::Health => Self::Health(Health::new()),
            SubroutineKind::Pictures => Self::Pictures(Pictures::new()),
        }
    }

    pub fn kind(&self) -> SubroutineKind {
        match self {
            Self::Sensors(_) => SubroutineKind::Sensors,
            Self::Light(_) => SubroutineKind::Light,
            Self::Climate(_) => SubroutineKind::Climate,
            Self::Health(_) => SubroutineKind::Health,
            Self::Pictures(_) => SubroutineKind::Pictures,
        }
    }

    fn attach(&mut self, record: &HardwareRecord, ctx: &Context) -> Result<()> {
        dispatch!(self, s => s.attach(record, ctx))
    }

    fn detach(&mut self, uid: &str, ctx: &Context) {
        dispatch!(self, s => s.detach(uid, ctx));
    }

    fn on_start(&mut self, ctx: &Context) -> Result<()> {
        dispatch!(self, s => s.on_start(ctx))
    }

    fn on_stop(&mut self, ctx: &Context) {
        dispatch!(self, s => s.on_stop(ctx));
    }

    async fn routine(&mut self, ctx: &Context) -> Result<()> {
        dispatch!(self, s => s.routine(ctx).await)
    }
}

// ═══════════════════════════════════════════════════════════════
//  Cell: shared lifecycle parts
// ═══════════════════════════════════════════════════════════════

/// One subroutine plus the uids of the hardware it currently drives.
pub struct SubroutineCell {
    kind: SubroutineKind,
    hardware: BTreeSet<String>,
    inner: Subroutine,
}

impl SubroutineCell {
    pub fn new(kind: SubroutineKind, state: &EcosystemState) -> Self {
        Self {
            kind,
            hardware: BTreeSet::new(),
            inner: Subroutine::new(kind, state),
        }
    }

    pub fn kind(&self) -> SubroutineKind {
        self.kind
    }

    pub fn inner(&self) -> &Subroutine {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut Subroutine {
        &mut self.inner
    }

    /// Uids currently attached.
    pub fn hardware(&self) -> &BTreeSet<String> {
        &self.hardware
    }

    /// Offer a record.  Incompatible records are refused with a warning.
    pub fn add_hardware(&mut self, record: &HardwareRecord, ctx: &Context) -> Result<()> {
        if !self.kind.accepts(record) {
            warn!(
                "{}[{}]: hardware '{}' ({}, {:?}) is incompatible, ignored",
                self.kind, ctx.ecosystem, record.uid, record.capability, record.level
            );
            return Err(Error::HardwareIncompatible {
                kind: self.kind,
                uid: record.uid.clone(),
            });
        }
        let started = ctx.state.read().is_started(self.kind);
        if !started {
            debug!(
                "{}[{}]: '{}' will be attached on start",
                self.kind, ctx.ecosystem, record.uid
            );
            return Ok(());
        }
        if self.hardware.contains(&record.uid) {
            self.inner.detach(&record.uid, ctx);
        }
        self.inner.attach(record, ctx)?;
        self.hardware.insert(record.uid.clone());
        Ok(())
    }

    pub fn remove_hardware(&mut self, uid: &str, ctx: &Context) -> Result<()> {
        if !self.hardware.remove(uid) {
            return Err(Error::not_found("hardware", uid));
        }
        self.inner.detach(uid, ctx);
        Ok(())
    }

    /// Attach needed hardware and run the kind's start hook.
    pub(crate) fn start(&mut self, ctx: &Context) -> Result<()> {
        let records: Vec<HardwareRecord> = {
            let state = ctx.state.read();
            self.kind
                .get_hardware_needed_uid(&state)
                .iter()
                .filter_map(|uid| state.inventory.get(uid).cloned())
                .collect()
        };
        for record in &records {
            if !self.kind.accepts(record) {
                continue;
            }
            match self.inner.attach(record, ctx) {
                Ok(()) => {
                    self.hardware.insert(record.uid.clone());
                }
                Err(e) => warn!(
                    "{}[{}]: could not attach '{}': {}",
                    self.kind, ctx.ecosystem, record.uid, e
                ),
            }
        }
        self.inner.on_start(ctx)
    }

    /// Run the kind's stop hook and detach everything.
    pub(crate) fn stop(&mut self, ctx: &Context) {
        self.inner.on_stop(ctx);
        for uid in std::mem::take(&mut self.hardware) {
            self.inner.detach(&uid, ctx);
        }
    }

    /// One periodic step.  Fails with `NotStarted` outside the started state.
    pub async fn routine(&mut self, ctx: &Context) -> Result<()> {
        let started = ctx.state.read().is_started(self.kind);
        if !started {
            return Err(Error::NotStarted(self.kind));
        }
        let begin = Instant::now();
        let result = self.inner.routine(ctx).await;
        debug!(
            "{}[{}]: routine took {:?}",
            self.kind,
            ctx.ecosystem,
            begin.elapsed()
        );
        result
    }
}
