//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing outbound ecosystem events to the
//! `log` facade.  A remote event layer would implement the same trait.

use log::info;

use crate::app::events::EcosystemEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`EcosystemEvent`], tagged with its ecosystem.
pub struct LogEventSink {
    ecosystem: String,
}

impl LogEventSink {
    pub fn new(ecosystem: impl Into<String>) -> Self {
        Self {
            ecosystem: ecosystem.into(),
        }
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &EcosystemEvent) {
        let eco = &self.ecosystem;
        match event {
            EcosystemEvent::ActuatorChanged(a) => {
                info!(
                    "ACTUATOR | {} | {} active={} status={} mode={} countdown={:.0}s",
                    eco,
                    a.capability,
                    a.active,
                    if a.status { "on" } else { "off" },
                    a.mode,
                    a.countdown_secs(),
                );
            }
            EcosystemEvent::SubroutineStarted(kind) => {
                info!("LIFECYCLE | {} | {} started", eco, kind);
            }
            EcosystemEvent::SubroutineStopped(kind) => {
                info!("LIFECYCLE | {} | {} stopped", eco, kind);
            }
            EcosystemEvent::HardwareChanged { uid } => {
                info!("HARDWARE | {} | '{}' changed", eco, uid);
            }
            EcosystemEvent::ClimateChanged => {
                info!("CLIMATE | {} | targets changed", eco);
            }
            EcosystemEvent::LightingHoursChanged(h) => {
                info!(
                    "LIGHTING | {} | {}-{} / {}-{}",
                    eco, h.morning_start, h.morning_end, h.evening_start, h.evening_end
                );
            }
        }
    }
}
