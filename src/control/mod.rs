//! Pure regulation algorithms.
//!
//! No I/O and no locking here: the subroutines feed in readings, targets
//! and the local time of day, and apply the returned decision through the
//! actuator hub.

pub mod hysteresis;
pub mod lighting;
