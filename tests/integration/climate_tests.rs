//! Climate regulation end to end: readings → hysteresis → hub → switches.

use std::time::Duration;

use growctl::actuators::ActuatorMode;
use growctl::app::ecosystem::Ecosystem;
use growctl::config::{ClimateParameter, TimingConfig};
use growctl::hardware::Capability;
use growctl::subroutines::{Missing, SubroutineKind};

use crate::mock_hw::{FixedClock, MockHardware, climate_config, fast_timing};

async fn running(timing: TimingConfig, hour: u32) -> (Ecosystem, MockHardware, std::sync::Arc<FixedClock>) {
    let hw = MockHardware::new();
    let clock = FixedClock::at(hour, 0);
    let mut eco = Ecosystem::new(&climate_config(), timing, hw.ports(clock.clone())).unwrap();
    eco.start().await;
    assert!(eco.is_started(SubroutineKind::Climate));
    (eco, hw, clock)
}

async fn settle(secs: u64) {
    tokio::time::sleep(Duration::from_secs(secs)).await;
}

#[tokio::test(start_paused = true)]
async fn heater_crosses_the_dead_band() {
    let (_eco, hw, _) = running(fast_timing(), 10).await;

    hw.set_value("temperature", 22.0);
    settle(3).await;
    assert_eq!(hw.calls_for(Capability::Heater), vec![true]);
    assert!(hw.calls_for(Capability::Cooler).is_empty());

    hw.set_value("temperature", 24.0);
    settle(3).await;
    assert_eq!(hw.calls_for(Capability::Heater), vec![true, false]);
}

#[tokio::test(start_paused = true)]
async fn steady_readings_write_once() {
    let (_eco, hw, _) = running(fast_timing(), 10).await;
    hw.set_value("temperature", 30.0);
    settle(20).await;
    assert_eq!(hw.calls_for(Capability::Cooler), vec![true]);
    assert!(hw.calls_for(Capability::Heater).is_empty());
}

#[tokio::test(start_paused = true)]
async fn night_target_applies_outside_the_day_window() {
    let (_eco, hw, clock) = running(fast_timing(), 21).await;

    // 19 °C sits inside the night band 20 ± 2.
    hw.set_value("temperature", 19.0);
    settle(3).await;
    assert!(hw.calls_for(Capability::Heater).is_empty());

    clock.set(10, 0);
    settle(3).await;
    assert_eq!(hw.calls_for(Capability::Heater), vec![true]);
}

#[tokio::test(start_paused = true)]
async fn manual_override_is_never_clobbered() {
    let (eco, hw, _) = running(fast_timing(), 10).await;
    eco.turn_actuator("heater", "off", 0.0).unwrap();
    hw.set_value("temperature", 15.0);
    settle(5).await;

    assert_eq!(hw.calls_for(Capability::Heater), vec![false]);
    let heater = eco.actuator_hub().get_handler(Capability::Heater).unwrap();
    assert_eq!(heater.mode, ActuatorMode::Manual);
    assert!(!heater.status);

    // Back to automatic: regulation resumes on the next cycle.
    eco.turn_actuator("heater", "automatic", 0.0).unwrap();
    settle(2).await;
    assert_eq!(hw.calls_for(Capability::Heater), vec![false, true]);
}

#[tokio::test(start_paused = true)]
async fn stale_readings_count_as_absent() {
    let timing = TimingConfig {
        sensors_period_secs: 60,
        max_reading_age_secs: Some(5),
        ..fast_timing()
    };
    let (_eco, hw, _) = running(timing, 10).await;
    hw.set_value("temperature", 22.0);

    settle(2).await;
    assert_eq!(hw.calls_for(Capability::Heater), vec![true]);

    settle(6).await;
    assert_eq!(hw.calls_for(Capability::Heater), vec![true, false]);
}

#[tokio::test(start_paused = true)]
async fn failed_sensor_read_holds_actuators_off() {
    let (eco, hw, _) = running(fast_timing(), 10).await;
    hw.fail_sensor("probe");
    hw.set_value("temperature", 10.0);
    settle(5).await;

    assert!(hw.calls_for(Capability::Heater).is_empty());
    assert!(eco.sensors_data().unwrap().records.is_empty());
}

#[tokio::test(start_paused = true)]
async fn stopping_climate_releases_its_actuators() {
    let (mut eco, hw, _) = running(fast_timing(), 10).await;
    hw.set_value("temperature", 22.0);
    settle(3).await;
    assert!(eco.actuator_hub().get_handler(Capability::Heater).unwrap().active);

    eco.stop_subroutine("climate").await.unwrap();
    let heater = eco.actuator_hub().get_handler(Capability::Heater).unwrap();
    assert!(!heater.active);
    assert!(!heater.status);
    assert_eq!(hw.calls_for(Capability::Heater), vec![true, false]);
}

#[tokio::test(start_paused = true)]
async fn deleting_the_only_parameter_makes_climate_unmanageable() {
    let (mut eco, _, _) = running(fast_timing(), 10).await;
    assert_eq!(eco.regulated_parameters(), vec![ClimateParameter::Temperature]);

    eco.delete_climate_parameter(ClimateParameter::Temperature)
        .await
        .unwrap();
    assert!(!eco.is_started(SubroutineKind::Climate));
    assert_eq!(
        eco.manageable(SubroutineKind::Climate),
        Err(Missing::Configuration)
    );
    assert!(eco.regulated_parameters().is_empty());

    eco.set_climate_parameter(ClimateParameter::Temperature, 25.0, 20.0, 2.0)
        .await
        .unwrap();
    assert_eq!(eco.manageable(SubroutineKind::Climate), Ok(()));
    eco.start_subroutine("climate").await.unwrap();
    assert_eq!(eco.regulated_parameters(), vec![ClimateParameter::Temperature]);
}

#[tokio::test(start_paused = true)]
async fn parameter_without_actuator_is_not_regulated() {
    let (mut eco, _, _) = running(fast_timing(), 10).await;
    eco.set_climate_parameter(ClimateParameter::Humidity, 60.0, 60.0, 5.0)
        .await
        .unwrap();
    assert_eq!(eco.regulated_parameters(), vec![ClimateParameter::Temperature]);

    assert!(
        eco.set_climate_parameter(ClimateParameter::Humidity, f64::NAN, 60.0, 5.0)
            .await
            .is_err()
    );
    assert!(
        eco.delete_climate_parameter(ClimateParameter::Wind)
            .await
            .is_err()
    );
}
