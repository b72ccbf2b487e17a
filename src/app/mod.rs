//! Application core.
//!
//! The [`Ecosystem`](ecosystem::Ecosystem) orchestrates the subroutine
//! lifecycle, the actuator hub and the inventory of one enclosure; the
//! [`Engine`](engine::Engine) holds every ecosystem of the process.  All
//! interaction with hardware and the clock happens through the port traits
//! in [`ports`], so the whole core runs against mocks in tests.

pub mod commands;
pub mod ecosystem;
pub mod engine;
pub mod events;
pub mod ports;
