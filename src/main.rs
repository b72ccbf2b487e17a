//! growctl: main entry point.
//!
//! Hexagonal architecture: the ecosystem core only sees port traits; this
//! binary wires them to the virtual hardware and the host clock.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  VirtualHardware        SystemClock       LogEventSink         │
//! │  (Switch+Factory)       (ClockPort)       (EventSink)          │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │   Engine ─▶ Ecosystem ─▶ Subroutines · ActuatorHub      │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  tokio: routine tasks · countdown sweep · event drain          │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Usage: `growctl [config.json]`.  Without a config file the defaults are
//! used and a demo ecosystem is created.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, Result};
use log::{info, warn};

use growctl::adapters::hardware::{VIRTUAL_CAMERA, VIRTUAL_SENSOR, VirtualHardware};
use growctl::adapters::log_sink::LogEventSink;
use growctl::adapters::time::SystemClock;
use growctl::app::engine::Engine;
use growctl::app::ports::Ports;
use growctl::config::{
    ClimateParameter, ClimateParameterConfig, ControllerConfig, EcosystemConfig, ManagementFlags,
};
use growctl::hardware::{Capability, HardwareRecord};

const EVENT_DRAIN_PERIOD: Duration = Duration::from_secs(1);

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("╔══════════════════════════════════════╗");
    info!("║  growctl v{}                       ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 1. Configuration ──────────────────────────────────────
    let mut config = match std::env::args().nth(1) {
        Some(path) => load_config(Path::new(&path))?,
        None => {
            info!("No config file given, using defaults");
            ControllerConfig::default()
        }
    };
    if config.ecosystems.is_empty() {
        warn!("No ecosystem configured, creating a virtual demo enclosure");
        config.ecosystems.push(demo_ecosystem());
    }

    // ── 2. Engine over virtual hardware ───────────────────────
    let clock = Arc::new(SystemClock::new());
    let mut engine = Engine::from_config(&config, |_| {
        let hw = Arc::new(VirtualHardware::default());
        Ports {
            switches: hw.clone(),
            hardware: hw,
            clock: clock.clone(),
        }
    })?;
    engine.start().await;

    let mut sinks: BTreeMap<String, LogEventSink> = engine
        .ecosystems()
        .map(|e| (e.uid().to_string(), LogEventSink::new(e.uid())))
        .collect();

    // ── 3. Event loop ─────────────────────────────────────────
    let mut drain = tokio::time::interval(EVENT_DRAIN_PERIOD);
    loop {
        tokio::select! {
            _ = drain.tick() => drain_all(&engine, &mut sinks),
            signal = tokio::signal::ctrl_c() => {
                signal.context("listening for ctrl-c")?;
                info!("Interrupt received, shutting down");
                break;
            }
        }
    }

    engine.shutdown().await;
    drain_all(&engine, &mut sinks);
    Ok(())
}

fn load_config(path: &Path) -> Result<ControllerConfig> {
    if !path.exists() {
        warn!("Config '{}' not found, using defaults", path.display());
        return Ok(ControllerConfig::default());
    }
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("reading '{}'", path.display()))?;
    let config = ControllerConfig::from_json(&json)
        .with_context(|| format!("loading '{}'", path.display()))?;
    info!(
        "Config loaded from '{}': {} ecosystem(s)",
        path.display(),
        config.ecosystems.len()
    );
    Ok(config)
}

fn drain_all(engine: &Engine, sinks: &mut BTreeMap<String, LogEventSink>) {
    for ecosystem in engine.ecosystems() {
        if let Some(sink) = sinks.get_mut(ecosystem.uid()) {
            ecosystem.drain_events(sink);
        }
    }
}

fn demo_ecosystem() -> EcosystemConfig {
    let mut eco = EcosystemConfig::new("demo", "Demo tent");
    eco.management = ManagementFlags::all();
    eco.climate.insert(
        ClimateParameter::Temperature,
        ClimateParameterConfig::new(24.0, 19.0, 1.0),
    );
    eco.climate.insert(
        ClimateParameter::Humidity,
        ClimateParameterConfig::new(60.0, 65.0, 5.0),
    );
    eco.hardware = vec![
        HardwareRecord::new("probe-1", "Air probe", VIRTUAL_SENSOR, Capability::Sensor)
            .with_measures(["temperature", "humidity"]),
        HardwareRecord::new("lamp-1", "Main lamp", "virtualSwitch", Capability::Light),
        HardwareRecord::new("heater-1", "Heater", "virtualSwitch", Capability::Heater),
        HardwareRecord::new("cooler-1", "Cooler", "virtualSwitch", Capability::Cooler),
        HardwareRecord::new("humid-1", "Humidifier", "virtualSwitch", Capability::Humidifier),
        HardwareRecord::new("cam-1", "Canopy camera", VIRTUAL_CAMERA, Capability::Camera)
            .with_measures(["health"]),
    ];
    eco
}
