//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter    | Implements        | Connects to                 |
//! |------------|-------------------|-----------------------------|
//! | `hardware` | SwitchPort        | simulated outputs           |
//! |            | HardwareFactory   | simulated sensors, cameras  |
//! | `log_sink` | EventSink         | `log` facade                |
//! | `time`     | ClockPort         | host wall clock             |

pub mod hardware;
pub mod log_sink;
pub mod time;
