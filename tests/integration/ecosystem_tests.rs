//! Lifecycle, hardware routing and command dispatch through `Ecosystem`.

use std::time::Duration;

use growctl::actuators::{ActuatorMode, TurnTo};
use growctl::app::commands::EcosystemCommand;
use growctl::app::ecosystem::Ecosystem;
use growctl::app::engine::Engine;
use growctl::app::events::EcosystemEvent;
use growctl::config::{ControllerConfig, EcosystemConfig, ManagementFlags, SunTimes};
use growctl::error::Error;
use growctl::hardware::{Capability, Level};
use growctl::subroutines::{Missing, SubroutineKind};

use crate::mock_hw::{
    FixedClock, MockHardware, RecordingSink, actuator, climate_config, fast_timing, hms, sensor,
};

fn ecosystem(config: &EcosystemConfig) -> (Ecosystem, MockHardware) {
    let hw = MockHardware::new();
    let eco = Ecosystem::new(config, fast_timing(), hw.ports(FixedClock::at(10, 0))).unwrap();
    (eco, hw)
}

// ── Lifecycle ─────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn unknown_subroutine_is_rejected() {
    let (mut eco, _) = ecosystem(&climate_config());
    assert_eq!(
        eco.start_subroutine("irrigation").await,
        Err(Error::UnknownSubroutine("irrigation".into()))
    );
    assert_eq!(
        eco.enable_subroutine("irrigation"),
        Err(Error::UnknownSubroutine("irrigation".into()))
    );
}

#[tokio::test(start_paused = true)]
async fn start_requires_management_flag() {
    let mut config = climate_config();
    config.management = ManagementFlags::default();
    let (mut eco, _) = ecosystem(&config);

    assert_eq!(
        eco.start_subroutine("sensors").await,
        Err(Error::NotManageable {
            kind: SubroutineKind::Sensors,
            missing: Missing::Disabled
        })
    );
    eco.enable_subroutine("sensors").unwrap();
    eco.start_subroutine("sensors").await.unwrap();
    assert!(eco.is_started(SubroutineKind::Sensors));
}

#[tokio::test(start_paused = true)]
async fn start_twice_is_a_noop_and_stop_unstarted_is_ok() {
    let (mut eco, _) = ecosystem(&climate_config());
    eco.start_subroutine("sensors").await.unwrap();
    eco.start_subroutine("sensors").await.unwrap();
    assert!(eco.is_started(SubroutineKind::Sensors));

    eco.stop_subroutine("light").await.unwrap();
    assert!(!eco.is_started(SubroutineKind::Light));
}

#[tokio::test(start_paused = true)]
async fn missing_hardware_is_not_manageable() {
    let (mut eco, _) = ecosystem(&climate_config());
    assert_eq!(eco.manageable(SubroutineKind::Light), Err(Missing::Hardware));
    assert_eq!(
        eco.start_subroutine("light").await,
        Err(Error::NotManageable {
            kind: SubroutineKind::Light,
            missing: Missing::Hardware
        })
    );
}

#[tokio::test(start_paused = true)]
async fn climate_manageable_follows_sensors() {
    let (mut eco, _) = ecosystem(&climate_config());
    assert_eq!(
        eco.manageable(SubroutineKind::Climate),
        Err(Missing::Dependency(SubroutineKind::Sensors))
    );

    eco.start_subroutine("sensors").await.unwrap();
    assert_eq!(eco.manageable(SubroutineKind::Climate), Ok(()));
    eco.start_subroutine("climate").await.unwrap();

    // Stopping the dependency stops the dependent first.
    eco.stop_subroutine("sensors").await.unwrap();
    assert!(!eco.is_started(SubroutineKind::Climate));
    assert_eq!(
        eco.start_subroutine("climate").await,
        Err(Error::NotManageable {
            kind: SubroutineKind::Climate,
            missing: Missing::Dependency(SubroutineKind::Sensors)
        })
    );

    eco.start_subroutine("sensors").await.unwrap();
    assert_eq!(eco.manageable(SubroutineKind::Climate), Ok(()));
}

#[tokio::test(start_paused = true)]
async fn plant_level_heater_cannot_regulate_climate() {
    let mut config = climate_config();
    config.hardware = vec![
        sensor("probe", &["temperature"]),
        actuator("heater", Capability::Heater).with_level(Level::Plant),
    ];
    let (mut eco, hw) = ecosystem(&config);
    hw.set_value("temperature", 15.0);
    eco.start().await;

    assert!(eco.is_started(SubroutineKind::Sensors));
    assert!(!eco.is_started(SubroutineKind::Climate));
    assert_eq!(eco.manageable(SubroutineKind::Climate), Err(Missing::Hardware));
    assert!(eco.subroutine_hardware(SubroutineKind::Climate).await.is_empty());

    tokio::time::sleep(Duration::from_secs(3)).await;
    assert!(hw.calls_for(Capability::Heater).is_empty());
}

#[tokio::test(start_paused = true)]
async fn disable_stops_first() {
    let (mut eco, _) = ecosystem(&climate_config());
    eco.start_subroutine("sensors").await.unwrap();
    eco.disable_subroutine("sensors").await.unwrap();
    assert!(!eco.is_started(SubroutineKind::Sensors));
    assert!(!eco.is_enabled(SubroutineKind::Sensors));
}

#[tokio::test(start_paused = true)]
async fn routine_on_stopped_subroutine_fails() {
    let (eco, _) = ecosystem(&climate_config());
    assert_eq!(
        eco.run_routine_once(SubroutineKind::Sensors).await,
        Err(Error::NotStarted(SubroutineKind::Sensors))
    );
}

#[tokio::test(start_paused = true)]
async fn start_and_shutdown_cover_everything_enabled() {
    let (mut eco, _) = ecosystem(&climate_config());
    eco.start().await;
    assert!(eco.is_started(SubroutineKind::Sensors));
    assert!(eco.is_started(SubroutineKind::Climate));
    assert!(!eco.is_started(SubroutineKind::Light));

    eco.shutdown().await;
    for kind in SubroutineKind::ALL {
        assert!(!eco.is_started(kind));
        assert!(!eco.is_enabled(kind));
    }
}

// ── Hardware routing ──────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn incompatible_hardware_changes_nothing() {
    let (mut eco, _) = ecosystem(&climate_config());
    eco.start_subroutine("sensors").await.unwrap();
    let before = eco.subroutine_hardware(SubroutineKind::Sensors).await;

    assert_eq!(
        eco.add_subroutine_hardware("sensors", "heater").await,
        Err(Error::HardwareIncompatible {
            kind: SubroutineKind::Sensors,
            uid: "heater".into()
        })
    );
    assert_eq!(eco.subroutine_hardware(SubroutineKind::Sensors).await, before);
}

#[tokio::test(start_paused = true)]
async fn added_hardware_reaches_started_subroutines() {
    let (mut eco, _) = ecosystem(&climate_config());
    eco.start_subroutine("sensors").await.unwrap();
    eco.add_hardware(sensor("probe-2", &["humidity"])).await.unwrap();

    let attached = eco.subroutine_hardware(SubroutineKind::Sensors).await;
    assert!(attached.contains("probe") && attached.contains("probe-2"));
    assert_eq!(
        eco.get_hardware_needed_uid(SubroutineKind::Sensors).len(),
        2
    );
}

#[tokio::test(start_paused = true)]
async fn duplicate_hardware_uid_is_rejected() {
    let (mut eco, _) = ecosystem(&climate_config());
    assert!(matches!(
        eco.add_hardware(actuator("heater", Capability::Heater)).await,
        Err(Error::InvalidArgument(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn removing_last_sensor_stops_sensors_and_climate() {
    let (mut eco, _) = ecosystem(&climate_config());
    eco.start().await;
    eco.remove_hardware("probe").await.unwrap();
    assert!(!eco.is_started(SubroutineKind::Sensors));
    assert!(!eco.is_started(SubroutineKind::Climate));
    assert_eq!(
        eco.remove_hardware("probe").await,
        Err(Error::NotFound {
            entity: "hardware",
            id: "probe".into()
        })
    );
}

#[tokio::test(start_paused = true)]
async fn updated_sensor_is_rebound() {
    let (mut eco, hw) = ecosystem(&climate_config());
    hw.set_value("temperature", 21.0);
    hw.set_value("humidity", 70.0);
    eco.start_subroutine("sensors").await.unwrap();

    eco.update_hardware(sensor("probe", &["temperature", "humidity"]))
        .await
        .unwrap();
    eco.run_routine_once(SubroutineKind::Sensors).await.unwrap();
    let data = eco.sensors_data().unwrap();
    assert_eq!(data.averages.get("humidity"), Some(&70.0));
}

// ── Actuator commands ─────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn turn_actuator_validates_arguments() {
    let (eco, _) = ecosystem(&climate_config());
    assert!(matches!(
        eco.turn_actuator("sprinkler", "on", 0.0),
        Err(Error::InvalidArgument(_))
    ));
    assert!(matches!(
        eco.turn_actuator("heater", "blink", 0.0),
        Err(Error::InvalidArgument(_))
    ));
    assert!(matches!(
        eco.turn_actuator("heater", "on", -1.0),
        Err(Error::InvalidArgument(_))
    ));
    assert!(matches!(
        eco.turn_actuator("sensor", "on", 0.0),
        Err(Error::InvalidArgument(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn oversized_countdown_is_rejected_without_switching() {
    let (eco, hw) = ecosystem(&climate_config());
    assert!(matches!(
        eco.turn_actuator("heater", "on", 1e20),
        Err(Error::InvalidArgument(_))
    ));
    assert!(matches!(
        eco.turn_actuator_typed(Capability::Heater, TurnTo::On, Duration::MAX),
        Err(Error::InvalidArgument(_))
    ));
    assert!(hw.switch_calls().is_empty());
    let heater = eco.actuator_hub().get_handler(Capability::Heater).unwrap();
    assert_eq!(heater.mode, ActuatorMode::Automatic);
    assert!(!heater.status);
}

#[tokio::test(start_paused = true)]
async fn countdown_expires_through_the_sweep() {
    let (mut eco, hw) = ecosystem(&climate_config());
    eco.start().await;

    let state = eco.turn_actuator("cooler", "on", 2.0).unwrap();
    assert_eq!(state.mode, ActuatorMode::Manual);
    assert_eq!(state.countdown, Duration::from_secs(2));
    assert!(hw.output(Capability::Cooler));

    tokio::time::sleep(Duration::from_millis(1500)).await;
    let state = eco.actuator_hub().get_handler(Capability::Cooler).unwrap();
    assert_eq!(state.mode, ActuatorMode::Manual);
    assert!(state.countdown <= Duration::from_millis(500));

    tokio::time::sleep(Duration::from_secs(1)).await;
    let state = eco.actuator_hub().get_handler(Capability::Cooler).unwrap();
    assert_eq!(state.mode, ActuatorMode::Automatic);
    assert_eq!(state.countdown, Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn every_actuator_capability_has_a_handler() {
    let (eco, _) = ecosystem(&climate_config());
    let states = eco.actuator_hub().states();
    let caps: Vec<Capability> = states.iter().map(|s| s.capability).collect();
    assert_eq!(caps, Capability::ACTUATORS.to_vec());
    assert!(states.iter().all(|s| s.mode == ActuatorMode::Automatic && !s.status));
}

// ── Commands & events ─────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn json_commands_drive_the_ecosystem() {
    let (mut eco, hw) = ecosystem(&climate_config());
    let commands = [
        r#"{"command":"start_subroutine","name":"sensors"}"#,
        r#"{"command":"turn_actuator","capability":"heater","mode":"on"}"#,
        r#"{"command":"delete_climate_parameter","parameter":"temperature"}"#,
    ];
    for json in commands {
        let cmd: EcosystemCommand = serde_json::from_str(json).unwrap();
        eco.handle_command(cmd).await.unwrap();
    }
    assert!(eco.is_started(SubroutineKind::Sensors));
    assert_eq!(hw.calls_for(Capability::Heater), vec![true]);
    assert!(eco.state().climate.is_empty());

    let unknown = EcosystemCommand::SetLightingMethod {
        method: "strobe".into(),
    };
    assert!(matches!(
        eco.handle_command(unknown).await,
        Err(Error::InvalidArgument(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn lifecycle_and_actuator_events_are_drained() {
    let (mut eco, _) = ecosystem(&climate_config());
    eco.start_subroutine("sensors").await.unwrap();
    eco.turn_actuator("heater", "on", 0.0).unwrap();
    eco.stop_subroutine("sensors").await.unwrap();

    let mut sink = RecordingSink::default();
    let drained = eco.drain_events(&mut sink);
    assert_eq!(drained, sink.events.len());
    assert!(sink
        .events
        .contains(&EcosystemEvent::SubroutineStarted(SubroutineKind::Sensors)));
    assert!(sink
        .events
        .contains(&EcosystemEvent::SubroutineStopped(SubroutineKind::Sensors)));
    assert!(sink.events.iter().any(|e| matches!(
        e,
        EcosystemEvent::ActuatorChanged(s) if s.capability == Capability::Heater && s.status
    )));
    assert_eq!(eco.drain_events(&mut sink), 0);
}

// ── Engine ────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn engine_fans_out_sun_times() {
    let mut second = climate_config();
    second.uid = "eco-2".into();
    second.hardware.push(actuator("lamp", Capability::Light));
    let config = ControllerConfig {
        timing: fast_timing(),
        ecosystems: vec![climate_config(), second],
    };
    let clock = FixedClock::at(10, 0);
    let mut engine = Engine::from_config(&config, |_| MockHardware::new().ports(clock.clone())).unwrap();
    assert_eq!(engine.len(), 2);

    engine
        .update_sun_times(SunTimes {
            twilight_begin: hms(6, 0),
            sunrise: hms(6, 30),
            sunset: hms(19, 30),
            twilight_end: hms(20, 0),
        })
        .await;
    for uid in ["eco-1", "eco-2"] {
        assert!(engine.ecosystem(uid).unwrap().state().sun_times.is_some());
    }

    let duplicate = climate_config();
    assert!(matches!(
        engine.add_ecosystem(&duplicate, MockHardware::new().ports(clock.clone())),
        Err(Error::InvalidArgument(_))
    ));

    engine.remove_ecosystem("eco-2").await.unwrap();
    assert!(engine.ecosystem("eco-2").is_none());
    assert_eq!(
        engine.remove_ecosystem("eco-2").await,
        Err(Error::NotFound {
            entity: "ecosystem",
            id: "eco-2".into()
        })
    );
    engine.shutdown().await;
}
