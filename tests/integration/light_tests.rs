//! Light regulation, plus the Health and Pictures capture paths that
//! borrow the light.

use std::sync::Arc;
use std::time::Duration;

use growctl::actuators::ActuatorMode;
use growctl::app::ecosystem::Ecosystem;
use growctl::app::events::EcosystemEvent;
use growctl::config::{
    EcosystemConfig, LightMethod, LightingHours, ManagementFlags, SunTimes, TimingConfig,
};
use growctl::hardware::Capability;
use growctl::subroutines::SubroutineKind;

use crate::mock_hw::{
    FixedClock, MockHardware, RecordingSink, actuator, fast_timing, health_camera, hms,
};

fn lit_config() -> EcosystemConfig {
    let mut eco = EcosystemConfig::new("eco-light", "Light tent");
    eco.management = ManagementFlags::all();
    eco.hardware = vec![actuator("lamp", Capability::Light), health_camera("cam")];
    eco
}

fn ecosystem(hour: u32, minute: u32) -> (Ecosystem, MockHardware, Arc<FixedClock>) {
    let hw = MockHardware::new();
    let clock = FixedClock::at(hour, minute);
    let eco = Ecosystem::new(&lit_config(), fast_timing(), hw.ports(clock.clone())).unwrap();
    (eco, hw, clock)
}

fn sun_times() -> SunTimes {
    SunTimes {
        twilight_begin: hms(6, 0),
        sunrise: hms(6, 30),
        sunset: hms(19, 30),
        twilight_end: hms(20, 30),
    }
}

async fn settle(secs: u64) {
    tokio::time::sleep(Duration::from_secs(secs)).await;
}

// ── Light ─────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn fixed_schedule_follows_the_clock() {
    let (mut eco, hw, clock) = ecosystem(6, 0);
    eco.start_subroutine("light").await.unwrap();
    settle(3).await;
    assert!(hw.calls_for(Capability::Light).is_empty());

    clock.set(9, 0);
    settle(3).await;
    assert_eq!(hw.calls_for(Capability::Light), vec![true]);

    clock.set(21, 0);
    settle(3).await;
    assert_eq!(hw.calls_for(Capability::Light), vec![true, false]);
}

#[tokio::test(start_paused = true)]
async fn elongate_widens_to_twilight() {
    let (mut eco, hw, _) = ecosystem(6, 15);
    eco.update_sun_times(sun_times()).await;
    eco.set_lighting_method(LightMethod::Elongate).await;
    assert_eq!(
        eco.lighting_hours().await,
        LightingHours {
            morning_start: hms(6, 0),
            morning_end: hms(7, 0),
            evening_start: hms(19, 0),
            evening_end: hms(20, 30),
        }
    );

    eco.start_subroutine("light").await.unwrap();
    settle(2).await;
    assert_eq!(hw.calls_for(Capability::Light), vec![true]);
}

#[tokio::test(start_paused = true)]
async fn elongate_without_sun_times_falls_back_to_fixed() {
    let (mut eco, _, _) = ecosystem(12, 0);
    eco.set_lighting_method(LightMethod::Elongate).await;
    assert_eq!(
        eco.lighting_hours().await,
        LightingHours {
            morning_start: hms(8, 0),
            morning_end: hms(8, 0),
            evening_start: hms(20, 0),
            evening_end: hms(20, 0),
        }
    );
}

#[tokio::test(start_paused = true)]
async fn manual_light_is_left_alone() {
    let (mut eco, hw, _) = ecosystem(12, 0);
    eco.turn_actuator("light", "off", 0.0).unwrap();
    eco.start_subroutine("light").await.unwrap();
    settle(5).await;
    assert_eq!(hw.calls_for(Capability::Light), vec![false]);
    assert_eq!(
        eco.actuator_hub().get_handler(Capability::Light).unwrap().mode,
        ActuatorMode::Manual
    );
}

#[tokio::test(start_paused = true)]
async fn hour_changes_are_announced() {
    let (mut eco, _, _) = ecosystem(12, 0);
    let hours = LightingHours {
        morning_start: hms(10, 0),
        morning_end: hms(10, 0),
        evening_start: hms(14, 0),
        evening_end: hms(14, 0),
    };
    eco.set_lighting_hours(hours).await;
    assert_eq!(eco.lighting_hours().await, hours);

    let mut sink = RecordingSink::default();
    eco.drain_events(&mut sink);
    assert!(sink.events.contains(&EcosystemEvent::LightingHoursChanged(hours)));
}

// ── Health ────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn health_capture_restores_automatic_light() {
    let (mut eco, hw, _) = ecosystem(6, 0);
    eco.start_subroutine("health").await.unwrap();
    eco.run_routine_once(SubroutineKind::Health).await.unwrap();

    assert_eq!(hw.light_at_capture(), vec![true]);
    assert_eq!(hw.calls_for(Capability::Light), vec![true, false]);
    let light = eco.actuator_hub().get_handler(Capability::Light).unwrap();
    assert_eq!(light.mode, ActuatorMode::Automatic);
    assert!(!light.status);

    let records = eco.health_records().await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].camera, "cam");
    assert!((records[0].green_coverage - 1.0).abs() < 1e-9);
}

#[tokio::test(start_paused = true)]
async fn health_capture_restores_manual_countdown() {
    let (mut eco, hw, _) = ecosystem(6, 0);
    eco.turn_actuator("light", "off", 300.0).unwrap();
    eco.start_subroutine("health").await.unwrap();
    eco.run_routine_once(SubroutineKind::Health).await.unwrap();

    assert_eq!(hw.light_at_capture(), vec![true]);
    let light = eco.actuator_hub().get_handler(Capability::Light).unwrap();
    assert_eq!(light.mode, ActuatorMode::Manual);
    assert!(!light.status);
    assert!(light.countdown > Duration::from_secs(299));
}

/// Health captures daily at 06:01 against a clock pinned at 06:00, with
/// every capture hanging.
fn hanging_health() -> (Ecosystem, MockHardware) {
    let hw = MockHardware::new();
    hw.hang_captures();
    let timing = TimingConfig {
        health_capture_time: hms(6, 1),
        ..fast_timing()
    };
    let eco = Ecosystem::new(&lit_config(), timing, hw.ports(FixedClock::at(6, 0))).unwrap();
    (eco, hw)
}

#[tokio::test(start_paused = true)]
async fn stop_during_capture_restores_automatic_light() {
    let (mut eco, hw) = hanging_health();
    eco.start_subroutine("health").await.unwrap();
    settle(61).await;
    assert_eq!(hw.light_at_capture(), vec![true]);
    assert!(eco.actuator_hub().get_handler(Capability::Light).unwrap().status);

    eco.stop_subroutine("health").await.unwrap();
    let light = eco.actuator_hub().get_handler(Capability::Light).unwrap();
    assert_eq!(light.mode, ActuatorMode::Automatic);
    assert!(!light.status);
    assert!(!light.active);
    assert_eq!(hw.calls_for(Capability::Light), vec![true, false]);
    assert!(eco.health_records().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn stop_during_capture_keeps_the_remaining_countdown() {
    let (mut eco, hw) = hanging_health();
    eco.turn_actuator("light", "off", 300.0).unwrap();
    eco.start_subroutine("health").await.unwrap();
    settle(160).await;
    assert_eq!(hw.light_at_capture(), vec![true]);

    eco.stop_subroutine("health").await.unwrap();
    let light = eco.actuator_hub().get_handler(Capability::Light).unwrap();
    assert_eq!(light.mode, ActuatorMode::Manual);
    assert!(!light.status);
    // 300 s armed at t=0, stopped at t=160.
    assert!(light.countdown <= Duration::from_secs(140));
    assert!(light.countdown > Duration::from_secs(139));
}

#[tokio::test(start_paused = true)]
async fn countdown_that_runs_out_during_capture_reverts_to_automatic() {
    let (mut eco, _) = hanging_health();
    eco.turn_actuator("light", "off", 90.0).unwrap();
    eco.start_subroutine("health").await.unwrap();
    settle(200).await;

    eco.stop_subroutine("health").await.unwrap();
    let light = eco.actuator_hub().get_handler(Capability::Light).unwrap();
    assert_eq!(light.mode, ActuatorMode::Automatic);
    assert_eq!(light.countdown, Duration::ZERO);
    assert!(!light.status);
}

// ── Pictures ──────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn pictures_keep_the_latest_frame_per_camera() {
    let (mut eco, _, _) = ecosystem(12, 0);
    eco.start_subroutine("pictures").await.unwrap();
    eco.run_routine_once(SubroutineKind::Pictures).await.unwrap();
    eco.run_routine_once(SubroutineKind::Pictures).await.unwrap();

    let pictures = eco.latest_pictures().await;
    assert_eq!(pictures.len(), 1);
    assert_eq!(pictures[0].0, "cam");
    assert_eq!(pictures[0].1.image.width, 4);

    eco.stop_subroutine("pictures").await.unwrap();
    assert!(eco.latest_pictures().await.is_empty());
}
