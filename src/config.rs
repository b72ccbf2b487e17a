//! Controller configuration.
//!
//! The typed view the core consumes: per-ecosystem management flags, sky
//! (day/night + lighting method), climate targets and hardware inventory,
//! plus process-wide timing.  Persisted form and storage are owned by the
//! outside world; the binary only loads this from JSON.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Error};
use crate::hardware::{HardwareInventory, HardwareRecord};
use crate::scheduler::TimeWindow;
use crate::subroutines::SubroutineKind;

// ───────────────────────────────────────────────────────────────
// Climate parameters
// ───────────────────────────────────────────────────────────────

/// A regulated climate quantity.  The matching sensor measure has the same name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClimateParameter {
    Temperature,
    Humidity,
    Light,
    Wind,
}

impl ClimateParameter {
    pub const ALL: [Self; 4] = [Self::Temperature, Self::Humidity, Self::Light, Self::Wind];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Temperature => "temperature",
            Self::Humidity => "humidity",
            Self::Light => "light",
            Self::Wind => "wind",
        }
    }
}

impl fmt::Display for ClimateParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClimateParameter {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| Error::InvalidArgument(format!("unknown climate parameter '{s}'")))
    }
}

/// Day/night targets for one parameter.  `hysteresis == 0` means no dead band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClimateParameterConfig {
    pub day: f64,
    pub night: f64,
    #[serde(default)]
    pub hysteresis: f64,
}

impl ClimateParameterConfig {
    pub fn new(day: f64, night: f64, hysteresis: f64) -> Self {
        Self {
            day,
            night,
            hysteresis,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.day.is_finite() || !self.night.is_finite() {
            return Err(ConfigError::ValidationFailed(
                "day and night targets must be finite".into(),
            ));
        }
        if !self.hysteresis.is_finite() || self.hysteresis < 0.0 {
            return Err(ConfigError::ValidationFailed(
                "hysteresis must be a finite value >= 0".into(),
            ));
        }
        Ok(())
    }

    pub fn target(&self, daytime: bool) -> f64 {
        if daytime { self.day } else { self.night }
    }
}

// ───────────────────────────────────────────────────────────────
// Sky / lighting
// ───────────────────────────────────────────────────────────────

/// How the light window is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LightMethod {
    /// On between the configured day and night times.
    #[default]
    Fixed,
    /// Fixed window widened to cover twilight.
    Elongate,
    /// Follows sunrise and sunset.
    Mimic,
}

impl LightMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fixed => "fixed",
            Self::Elongate => "elongate",
            Self::Mimic => "mimic",
        }
    }
}

impl fmt::Display for LightMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LightMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "fixed" => Ok(Self::Fixed),
            "elongate" => Ok(Self::Elongate),
            "mimic" => Ok(Self::Mimic),
            other => Err(Error::InvalidArgument(format!("unknown lighting method '{other}'"))),
        }
    }
}

/// Day boundaries and lighting method of one ecosystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkyConfig {
    pub day: NaiveTime,
    pub night: NaiveTime,
    #[serde(default)]
    pub lighting: LightMethod,
}

impl SkyConfig {
    /// `[day, night)`, the window in which day targets apply.
    pub fn day_window(&self) -> TimeWindow {
        TimeWindow::new(self.day, self.night)
    }
}

impl Default for SkyConfig {
    fn default() -> Self {
        Self {
            day: NaiveTime::from_hms_opt(8, 0, 0).unwrap_or_default(),
            night: NaiveTime::from_hms_opt(20, 0, 0).unwrap_or_default(),
            lighting: LightMethod::Fixed,
        }
    }
}

/// Computed twilight moments, local time of day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SunTimes {
    pub twilight_begin: NaiveTime,
    pub sunrise: NaiveTime,
    pub sunset: NaiveTime,
    pub twilight_end: NaiveTime,
}

/// The four boundaries the Light subroutine evaluates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LightingHours {
    pub morning_start: NaiveTime,
    pub morning_end: NaiveTime,
    pub evening_start: NaiveTime,
    pub evening_end: NaiveTime,
}

// ───────────────────────────────────────────────────────────────
// Management flags
// ───────────────────────────────────────────────────────────────

/// Per-subroutine enable flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagementFlags {
    pub sensors: bool,
    pub light: bool,
    pub climate: bool,
    pub health: bool,
    pub pictures: bool,
}

impl ManagementFlags {
    pub fn get(&self, kind: SubroutineKind) -> bool {
        match kind {
            SubroutineKind::Sensors => self.sensors,
            SubroutineKind::Light => self.light,
            SubroutineKind::Climate => self.climate,
            SubroutineKind::Health => self.health,
            SubroutineKind::Pictures => self.pictures,
        }
    }

    pub fn set(&mut self, kind: SubroutineKind, enabled: bool) {
        let slot = match kind {
            SubroutineKind::Sensors => &mut self.sensors,
            SubroutineKind::Light => &mut self.light,
            SubroutineKind::Climate => &mut self.climate,
            SubroutineKind::Health => &mut self.health,
            SubroutineKind::Pictures => &mut self.pictures,
        };
        *slot = enabled;
    }

    /// Everything on.
    pub fn all() -> Self {
        Self {
            sensors: true,
            light: true,
            climate: true,
            health: true,
            pictures: true,
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Ecosystem config
// ───────────────────────────────────────────────────────────────

/// Configuration of one growing enclosure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EcosystemConfig {
    pub uid: String,
    pub name: String,
    #[serde(default)]
    pub management: ManagementFlags,
    #[serde(default)]
    pub sky: SkyConfig,
    #[serde(default)]
    pub climate: BTreeMap<ClimateParameter, ClimateParameterConfig>,
    #[serde(default)]
    pub hardware: Vec<HardwareRecord>,
    #[serde(default)]
    pub sun_times: Option<SunTimes>,
}

impl EcosystemConfig {
    pub fn new(uid: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            name: name.into(),
            management: ManagementFlags::default(),
            sky: SkyConfig::default(),
            climate: BTreeMap::new(),
            hardware: Vec::new(),
            sun_times: None,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.uid.trim().is_empty() {
            return Err(ConfigError::ValidationFailed("ecosystem uid must not be empty".into()));
        }
        for (parameter, cfg) in &self.climate {
            cfg.validate().map_err(|e| {
                ConfigError::ValidationFailed(format!("climate.{parameter}: {e}"))
            })?;
        }
        HardwareInventory::from_records(self.hardware.iter().cloned())
            .map_err(|e| ConfigError::ValidationFailed(e.to_string()))?;
        Ok(())
    }
}

// ───────────────────────────────────────────────────────────────
// Timing
// ───────────────────────────────────────────────────────────────

/// Cadences shared by every ecosystem of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Sensors polling period (seconds)
    pub sensors_period_secs: u64,
    /// Climate regulation period (seconds)
    pub climate_period_secs: u64,
    /// Light regulation period (seconds)
    pub light_period_secs: u64,
    /// Pictures capture period (seconds)
    pub pictures_period_secs: u64,
    /// Local time of the daily Health capture
    pub health_capture_time: NaiveTime,
    /// Countdown expiry sweep interval (milliseconds)
    pub sweep_interval_ms: u64,
    /// Readings older than this are treated as absent by Climate.
    /// `None` uses the most recent value regardless of age.
    pub max_reading_age_secs: Option<u64>,
}

impl TimingConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    pub fn max_reading_age(&self) -> Option<Duration> {
        self.max_reading_age_secs.map(Duration::from_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let periods = [
            ("sensors_period_secs", self.sensors_period_secs),
            ("climate_period_secs", self.climate_period_secs),
            ("light_period_secs", self.light_period_secs),
            ("pictures_period_secs", self.pictures_period_secs),
            ("sweep_interval_ms", self.sweep_interval_ms),
        ];
        for (name, value) in periods {
            if value == 0 {
                return Err(ConfigError::ValidationFailed(format!("{name} must be > 0")));
            }
        }
        if self.max_reading_age_secs == Some(0) {
            return Err(ConfigError::ValidationFailed(
                "max_reading_age_secs must be > 0 when set".into(),
            ));
        }
        Ok(())
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            sensors_period_secs: 10,
            climate_period_secs: 15,
            light_period_secs: 15,
            pictures_period_secs: 600,
            health_capture_time: NaiveTime::from_hms_opt(12, 0, 0).unwrap_or_default(),
            sweep_interval_ms: 500,
            max_reading_age_secs: None,
        }
    }
}

/// Whole-process configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ControllerConfig {
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub ecosystems: Vec<EcosystemConfig>,
}

impl ControllerConfig {
    /// Parse and validate a JSON document.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Malformed(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.timing.validate()?;
        let mut seen = std::collections::BTreeSet::new();
        for eco in &self.ecosystems {
            eco.validate()?;
            if !seen.insert(eco.uid.as_str()) {
                return Err(ConfigError::ValidationFailed(format!(
                    "duplicate ecosystem uid '{}'",
                    eco.uid
                )));
            }
        }
        Ok(())
    }
}
