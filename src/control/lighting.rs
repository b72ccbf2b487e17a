//! Light schedule: derive the four lighting boundaries and decide on/off.
//!
//! `fixed` and `mimic` use one contiguous window `[morning_start,
//! evening_end)`.  `elongate` evaluates the dawn ramp, the core day and
//! the dusk ramp independently; its boundaries are widened to the
//! twilight moments so it always covers at least the fixed window.
//!
//! ```text
//!   twilight_begin  day   sunrise+Δ     sunset-Δ   night  twilight_end
//!        │───────────┼───────┤─────────────├────────┼────────│
//!        [ morning window    )[   core    )[  evening window  )
//! ```

use chrono::NaiveTime;
use log::warn;

use crate::config::{LightMethod, LightingHours, SkyConfig, SunTimes};
use crate::scheduler::TimeWindow;

/// Boundaries for the plain `[day, night)` window.
pub fn fixed_hours(sky: &SkyConfig) -> LightingHours {
    LightingHours {
        morning_start: sky.day,
        morning_end: sky.day,
        evening_start: sky.night,
        evening_end: sky.night,
    }
}

/// Derive lighting boundaries for `sky.lighting`.
///
/// Returns the method actually applied: `mimic` and `elongate` fall back
/// to `fixed` when sun times are missing or inconsistent, and `elongate`
/// also falls back when the day window wraps midnight.
pub fn compute_lighting_hours(
    sky: &SkyConfig,
    sun: Option<&SunTimes>,
) -> (LightMethod, LightingHours) {
    if sky.lighting == LightMethod::Fixed {
        return (LightMethod::Fixed, fixed_hours(sky));
    }
    let Some(sun) = sun.filter(|s| sun_times_are_ordered(s)) else {
        warn!(
            "Lighting: no usable sun times for '{}' method, falling back to fixed",
            sky.lighting
        );
        return (LightMethod::Fixed, fixed_hours(sky));
    };

    match sky.lighting {
        LightMethod::Fixed => (LightMethod::Fixed, fixed_hours(sky)),
        LightMethod::Mimic => (
            LightMethod::Mimic,
            LightingHours {
                morning_start: sun.sunrise,
                morning_end: sun.sunrise,
                evening_start: sun.sunset,
                evening_end: sun.sunset,
            },
        ),
        LightMethod::Elongate => {
            if sky.day_window().wraps_midnight() {
                warn!("Lighting: day window wraps midnight, elongate falls back to fixed");
                return (LightMethod::Fixed, fixed_hours(sky));
            }
            let offset = sun.sunrise - sun.twilight_begin;
            (
                LightMethod::Elongate,
                LightingHours {
                    morning_start: sky.day.min(sun.twilight_begin),
                    morning_end: sun.sunrise + offset,
                    evening_start: sun.sunset - offset,
                    evening_end: sky.night.max(sun.twilight_end),
                },
            )
        }
    }
}

fn sun_times_are_ordered(sun: &SunTimes) -> bool {
    sun.twilight_begin <= sun.sunrise && sun.sunrise < sun.sunset && sun.sunset <= sun.twilight_end
}

/// Whether the light should be on at `now`.
pub fn compute_target_status(method: LightMethod, hours: &LightingHours, now: NaiveTime) -> bool {
    match method {
        LightMethod::Fixed | LightMethod::Mimic => {
            TimeWindow::new(hours.morning_start, hours.evening_end).contains(now)
        }
        LightMethod::Elongate => {
            let morning = TimeWindow::new(hours.morning_start, hours.morning_end);
            let evening = TimeWindow::new(hours.evening_start, hours.evening_end);
            let core = hours.morning_end < hours.evening_start
                && TimeWindow::new(hours.morning_end, hours.evening_start).contains(now);
            morning.contains(now) || core || evening.contains(now)
        }
    }
}
