//! Growing-enclosure controller library.
//!
//! Exposes the ecosystem core (subroutine lifecycle, actuator hub, climate
//! and light regulation) together with the host adapters, for the binary
//! and for integration testing against mock ports.

#![deny(unused_must_use)]

pub mod actuators;
pub mod adapters;
pub mod app;
pub mod config;
pub mod control;
pub mod error;
pub mod events;
pub mod hardware;
pub mod scheduler;
pub mod subroutines;

pub use error::{Error, Result};
