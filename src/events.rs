//! Per-ecosystem outbound event queue.
//!
//! Events are produced by:
//! - the actuator hub (every handler change, including countdown expiry)
//! - the ecosystem (lifecycle, inventory, climate and lighting changes)
//!
//! and consumed by the event layer, which drains the queue at its own pace.
//!
//! ```text
//! ┌──────────────┐     ┌──────────────┐     ┌──────────────┐
//! │ ActuatorHub  │────▶│              │     │              │
//! │ Ecosystem    │────▶│  EventQueue  │────▶│  EventSink   │
//! │ sweep task   │────▶│  (bounded)   │     │  (consumer)  │
//! └──────────────┘     └──────────────┘     └──────────────┘
//! ```
//!
//! Producers never block: when the queue is full the newest event is
//! dropped with a warning.  State is always re-readable from the hub, so a
//! dropped event loses a notification, never state.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Channel, TrySendError};
use log::warn;

use crate::app::events::EcosystemEvent;
use crate::app::ports::EventSink;

/// Maximum number of pending events per ecosystem.
pub const EVENT_QUEUE_DEPTH: usize = 64;

/// Bounded MPMC queue of [`EcosystemEvent`]s.
pub struct EventQueue {
    channel: Channel<CriticalSectionRawMutex, EcosystemEvent, EVENT_QUEUE_DEPTH>,
}

impl EventQueue {
    pub const fn new() -> Self {
        Self {
            channel: Channel::new(),
        }
    }

    /// Push an event.  Returns `false` if the queue was full and the event dropped.
    pub fn push(&self, event: EcosystemEvent) -> bool {
        match self.channel.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) => {
                warn!("Events: queue full, dropping {:?}", event);
                false
            }
        }
    }

    /// Pop the oldest pending event.
    pub fn pop(&self) -> Option<EcosystemEvent> {
        self.channel.try_receive().ok()
    }

    /// Hand every pending event to `sink`, oldest first.  Returns the count.
    pub fn drain(&self, sink: &mut dyn EventSink) -> usize {
        let mut count = 0;
        while let Some(event) = self.pop() {
            sink.emit(&event);
            count += 1;
        }
        count
    }

    pub fn len(&self) -> usize {
        self.channel.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channel.is_empty()
    }

    pub fn clear(&self) {
        self.channel.clear();
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}
