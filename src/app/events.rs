//! Outbound ecosystem events.
//!
//! The actuator hub and the [`Ecosystem`](super::ecosystem::Ecosystem) push
//! these into the per-ecosystem [`EventQueue`](crate::events::EventQueue).
//! The event layer drains them through an
//! [`EventSink`](super::ports::EventSink) and decides what to do with
//! them: re-broadcast to remote clients, log, record in tests.

use crate::actuators::ActuatorState;
use crate::config::LightingHours;
use crate::subroutines::SubroutineKind;

/// Structured events emitted by the core.
#[derive(Debug, Clone, PartialEq)]
pub enum EcosystemEvent {
    /// An actuator handler changed (status, mode, countdown or active flag).
    ActuatorChanged(ActuatorState),

    /// A subroutine was started.
    SubroutineStarted(SubroutineKind),

    /// A subroutine was stopped, either on request or because a dependency stopped.
    SubroutineStopped(SubroutineKind),

    /// The hardware inventory gained, changed or lost a unit.
    HardwareChanged { uid: String },

    /// Climate targets were created, updated or deleted.
    ClimateChanged,

    /// The Light subroutine re-derived or received new lighting hours.
    LightingHoursChanged(LightingHours),
}
