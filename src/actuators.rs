//! Actuator hub: per-ecosystem actuator state machine.
//!
//! One [`ActuatorHub`] per ecosystem owns one handler per actuator
//! capability.  It is the only place actuator state changes, and every
//! change happens inside one short critical section that also drives the
//! physical output, so a change is applied entirely or not at all.
//!
//! ```text
//!                 turn_actuator(on|off, countdown)
//!   ┌───────────┐ ────────────────────────────────▶ ┌──────────┐
//!   │ AUTOMATIC │                                   │  MANUAL  │
//!   └───────────┘ ◀──────────────────────────────── └──────────┘
//!        ▲          turn_actuator(automatic)              │
//!        └────────────── countdown sweep (expired) ───────┘
//! ```
//!
//! Regulation subroutines only write through [`ActuatorHub::apply_automatic`],
//! which is a no-op on manual handlers.  Manual overrides therefore persist
//! until their countdown expires or the event layer changes the mode.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::time::{Instant, MissedTickBehavior};

use crate::app::events::EcosystemEvent;
use crate::app::ports::SwitchPort;
use crate::error::{Error, Result};
use crate::events::EventQueue;
use crate::hardware::Capability;

// ───────────────────────────────────────────────────────────────
// Modes
// ───────────────────────────────────────────────────────────────

/// Who decides the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActuatorMode {
    /// The owning regulation subroutine.
    Automatic,
    /// An external request.
    Manual,
}

impl fmt::Display for ActuatorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Automatic => "automatic",
            Self::Manual => "manual",
        })
    }
}

/// Requested transition for [`ActuatorHub::turn_actuator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnTo {
    On,
    Off,
    Automatic,
}

impl FromStr for TurnTo {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "on" => Ok(Self::On),
            "off" => Ok(Self::Off),
            "automatic" => Ok(Self::Automatic),
            other => Err(Error::InvalidArgument(format!("unknown actuator mode '{other}'"))),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Handler
// ───────────────────────────────────────────────────────────────

/// Read-only snapshot of one handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ActuatorState {
    pub capability: Capability,
    /// A subroutine or a manual request currently claims this actuator.
    pub active: bool,
    /// Physical output.
    pub status: bool,
    pub mode: ActuatorMode,
    /// Time left before reverting to automatic.  Zero when none is pending.
    pub countdown: Duration,
}

impl ActuatorState {
    pub fn countdown_secs(&self) -> f64 {
        self.countdown.as_secs_f64()
    }
}

#[derive(Debug, Clone)]
struct ActuatorHandler {
    capability: Capability,
    active: bool,
    status: bool,
    mode: ActuatorMode,
    /// Set only while `mode == Manual`.
    deadline: Option<Instant>,
}

impl ActuatorHandler {
    fn new(capability: Capability) -> Self {
        Self {
            capability,
            active: false,
            status: false,
            mode: ActuatorMode::Automatic,
            deadline: None,
        }
    }

    fn snapshot(&self, now: Instant) -> ActuatorState {
        ActuatorState {
            capability: self.capability,
            active: self.active,
            status: self.status,
            mode: self.mode,
            countdown: self
                .deadline
                .map_or(Duration::ZERO, |d| d.saturating_duration_since(now)),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Hub
// ───────────────────────────────────────────────────────────────

/// Owner of every actuator handler of one ecosystem.
pub struct ActuatorHub {
    ecosystem: String,
    handlers: Mutex<BTreeMap<Capability, ActuatorHandler>>,
    switches: Arc<dyn SwitchPort>,
    events: Arc<EventQueue>,
}

impl ActuatorHub {
    pub fn new(
        ecosystem: impl Into<String>,
        switches: Arc<dyn SwitchPort>,
        events: Arc<EventQueue>,
    ) -> Self {
        Self {
            ecosystem: ecosystem.into(),
            handlers: Mutex::new(BTreeMap::new()),
            switches,
            events,
        }
    }

    // ── Queries ───────────────────────────────────────────────

    /// Snapshot of the handler for `capability`, created on first reference.
    pub fn get_handler(&self, capability: Capability) -> Result<ActuatorState> {
        ensure_actuator(capability)?;
        let now = Instant::now();
        let mut handlers = self.handlers.lock();
        Ok(handlers
            .entry(capability)
            .or_insert_with(|| ActuatorHandler::new(capability))
            .snapshot(now))
    }

    /// Snapshot of every actuator capability, defaults for those never referenced.
    pub fn states(&self) -> Vec<ActuatorState> {
        let now = Instant::now();
        let handlers = self.handlers.lock();
        Capability::ACTUATORS
            .iter()
            .map(|&c| match handlers.get(&c) {
                Some(h) => h.snapshot(now),
                None => ActuatorHandler::new(c).snapshot(now),
            })
            .collect()
    }

    // ── External requests ─────────────────────────────────────

    /// Apply an external request.
    ///
    /// `on`/`off` switch the output, mark the handler active and manual, and
    /// arm `countdown` (zero means no automatic revert).  `automatic` hands
    /// the output back to the regulation subroutine.
    pub fn turn_actuator(
        &self,
        capability: Capability,
        turn_to: TurnTo,
        countdown: Duration,
    ) -> Result<ActuatorState> {
        ensure_actuator(capability)?;
        let now = Instant::now();
        let deadline = if turn_to == TurnTo::Automatic || countdown.is_zero() {
            None
        } else {
            Some(now.checked_add(countdown).ok_or_else(|| {
                Error::InvalidArgument(format!("countdown {countdown:?} is out of range"))
            })?)
        };
        let mut handlers = self.handlers.lock();
        let handler = handlers
            .entry(capability)
            .or_insert_with(|| ActuatorHandler::new(capability));

        match turn_to {
            TurnTo::On | TurnTo::Off => {
                let status = turn_to == TurnTo::On;
                self.switches.set_status(capability, status).map_err(|e| {
                    error!("ActuatorHub[{}]: {} output failed: {}", self.ecosystem, capability, e);
                    Error::from(e)
                })?;
                handler.active = true;
                handler.status = status;
                handler.mode = ActuatorMode::Manual;
                handler.deadline = deadline;
            }
            TurnTo::Automatic => {
                handler.mode = ActuatorMode::Automatic;
                handler.deadline = None;
            }
        }

        let state = handler.snapshot(now);
        drop(handlers);
        info!(
            "ActuatorHub[{}]: {} -> {:?} (status={}, countdown={:.1}s)",
            self.ecosystem,
            capability,
            turn_to,
            state.status,
            state.countdown_secs()
        );
        self.events.push(EcosystemEvent::ActuatorChanged(state));
        Ok(state)
    }

    /// String form used by the event layer.
    pub fn turn_actuator_str(
        &self,
        capability: &str,
        mode: &str,
        countdown_secs: f64,
    ) -> Result<ActuatorState> {
        let capability: Capability = capability.parse()?;
        let turn_to: TurnTo = mode.parse()?;
        let countdown = Duration::try_from_secs_f64(countdown_secs).map_err(|_| {
            Error::InvalidArgument(format!(
                "countdown must be a finite value >= 0, got {countdown_secs}"
            ))
        })?;
        self.turn_actuator(capability, turn_to, countdown)
    }

    /// Put a handler back into `prior` after a temporary takeover.
    ///
    /// `prior.countdown` is the countdown left to re-arm on a manual
    /// handler.  The output is written only if it differs.
    pub fn restore(&self, prior: ActuatorState) -> Result<ActuatorState> {
        let capability = prior.capability;
        ensure_actuator(capability)?;
        let now = Instant::now();
        let deadline = if prior.mode == ActuatorMode::Manual && !prior.countdown.is_zero() {
            Some(now.checked_add(prior.countdown).ok_or_else(|| {
                Error::InvalidArgument(format!("countdown {:?} is out of range", prior.countdown))
            })?)
        } else {
            None
        };
        let mut handlers = self.handlers.lock();
        let handler = handlers
            .entry(capability)
            .or_insert_with(|| ActuatorHandler::new(capability));
        if handler.status != prior.status {
            self.switches.set_status(capability, prior.status)?;
        }
        handler.active = prior.active;
        handler.status = prior.status;
        handler.mode = prior.mode;
        handler.deadline = deadline;
        let state = handler.snapshot(now);
        drop(handlers);
        info!(
            "ActuatorHub[{}]: {} restored to {:?} (status={}, countdown={:.1}s)",
            self.ecosystem,
            capability,
            state.mode,
            state.status,
            state.countdown_secs()
        );
        self.events.push(EcosystemEvent::ActuatorChanged(state));
        Ok(state)
    }

    // ── Regulation writes ─────────────────────────────────────

    /// Set the output on behalf of the regulation subroutine.
    ///
    /// Only applies while the handler is automatic and the status differs.
    /// Returns whether the output was written.
    pub fn apply_automatic(&self, capability: Capability, status: bool) -> Result<bool> {
        ensure_actuator(capability)?;
        let now = Instant::now();
        let mut handlers = self.handlers.lock();
        let handler = handlers
            .entry(capability)
            .or_insert_with(|| ActuatorHandler::new(capability));
        if handler.mode != ActuatorMode::Automatic || handler.status == status {
            return Ok(false);
        }
        self.switches.set_status(capability, status)?;
        handler.status = status;
        let state = handler.snapshot(now);
        drop(handlers);
        info!(
            "ActuatorHub[{}]: {} -> {} (automatic)",
            self.ecosystem,
            capability,
            if status { "on" } else { "off" }
        );
        self.events.push(EcosystemEvent::ActuatorChanged(state));
        Ok(true)
    }

    /// Mark `capability` as claimed by a started regulation subroutine.
    pub fn claim(&self, capability: Capability) {
        self.set_active(capability, true);
    }

    /// Release a claim.  An automatic output that is still on is switched off.
    pub fn release(&self, capability: Capability) {
        self.set_active(capability, false);
        if let Err(e) = self.apply_automatic(capability, false) {
            error!(
                "ActuatorHub[{}]: could not switch off released {}: {}",
                self.ecosystem, capability, e
            );
        }
    }

    fn set_active(&self, capability: Capability, active: bool) {
        if !capability.is_actuator() {
            return;
        }
        let now = Instant::now();
        let mut handlers = self.handlers.lock();
        let handler = handlers
            .entry(capability)
            .or_insert_with(|| ActuatorHandler::new(capability));
        if handler.active == active {
            return;
        }
        handler.active = active;
        let state = handler.snapshot(now);
        drop(handlers);
        debug!("ActuatorHub[{}]: {} active={}", self.ecosystem, capability, active);
        self.events.push(EcosystemEvent::ActuatorChanged(state));
    }

    // ── Countdown expiry ──────────────────────────────────────

    /// Revert every manual handler whose countdown is due at `now`.
    /// Returns the capabilities that reverted.
    pub fn expire_countdowns(&self, now: Instant) -> Vec<Capability> {
        let mut expired = Vec::new();
        let mut handlers = self.handlers.lock();
        for handler in handlers.values_mut() {
            if handler.deadline.is_some_and(|d| d <= now) {
                handler.mode = ActuatorMode::Automatic;
                handler.deadline = None;
                expired.push(handler.snapshot(now));
            }
        }
        drop(handlers);
        for state in &expired {
            info!(
                "ActuatorHub[{}]: {} countdown expired, back to automatic",
                self.ecosystem, state.capability
            );
            self.events.push(EcosystemEvent::ActuatorChanged(*state));
        }
        expired.into_iter().map(|s| s.capability).collect()
    }
}

fn ensure_actuator(capability: Capability) -> Result<()> {
    if capability.is_actuator() {
        Ok(())
    } else {
        Err(Error::InvalidArgument(format!("'{capability}' is not an actuator")))
    }
}

/// Body of the per-ecosystem countdown sweep task.
pub async fn run_countdown_sweep(hub: Arc<ActuatorHub>, period: Duration) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        hub.expire_countdowns(Instant::now());
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────
