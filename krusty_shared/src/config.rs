//! Shared configuration logic for the delta core, the CLI, and tests.
//!
//! ## Example: TOML Configuration
//!
//! ```toml
//! [board]
//! revision = "v2"
//!
//! [delta]
//! carriage_radius = 100.0
//! rod_length = 200.0
//! home_height = 300.0
//! build_radius = 100.0
//! steps_per_mm = 100.0
//! steps_per_mm_extruder = 100.0
//!
//! [stepper.a]
//! step_pin = "P1_11"
//! dir_pin = "P1_12"
//! enable_pin = "P1_15"
//!
//! [thermistor.hotend]
//! pin = "P1_16"
//! series_resistor = 500.0
//! capacitor_pf = 100.0
//! ```
//!
//! Every field has a default, so an empty document is a valid configuration.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::board_config::{BoardConfig, BoardRevision};
use crate::hardware_traits::PinId;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid value for `{field}`: {reason}")]
    Invalid { field: String, reason: String },
    #[error("unknown pin `{name}` for `{field}`")]
    UnknownPin { field: String, name: String },
}

impl ConfigError {
    fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub board: BoardSection,
    #[serde(default)]
    pub delta: DeltaConfig,
    #[serde(default)]
    pub stepper: BTreeMap<String, StepperConfig>,
    #[serde(default)]
    pub thermistor: BTreeMap<String, ThermistorConfig>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BoardSection {
    #[serde(default)]
    pub revision: BoardRevision,
    /// Minimum STEP pulse width of the driver IC, in microseconds.
    #[serde(default = "default_min_pulse_us")]
    pub min_pulse_us: f64,
}

impl Default for BoardSection {
    fn default() -> Self {
        Self {
            revision: BoardRevision::default(),
            min_pulse_us: default_min_pulse_us(),
        }
    }
}

impl BoardSection {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let valid = self.min_pulse_us.is_finite()
            && self.min_pulse_us >= 0.0
            && Duration::try_from_secs_f64(self.min_pulse_us * 1e-6).is_ok();
        if !valid {
            return Err(ConfigError::invalid(
                "board.min_pulse_us",
                "must be a finite number of microseconds >= 0",
            ));
        }
        Ok(())
    }

    /// Expects a validated section.
    pub fn board(&self) -> BoardConfig {
        let mut board = BoardConfig::new(self.revision);
        board.timing.min_pulse_width =
            Duration::try_from_secs_f64(self.min_pulse_us * 1e-6).unwrap_or_default();
        board
    }
}

/// Geometry of a linear (rail) delta machine.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeltaConfig {
    /// Distance from the machine axis to each carriage, mm.
    #[serde(default = "default_carriage_radius")]
    pub carriage_radius: f64,
    /// Length of the rods linking carriages to the effector, mm.
    #[serde(default = "default_rod_length")]
    pub rod_length: f64,
    /// Carriage height when homed, mm.
    #[serde(default = "default_home_height")]
    pub home_height: f64,
    #[serde(default = "default_build_radius")]
    pub build_radius: f64,
    #[serde(default = "default_steps_per_mm")]
    pub steps_per_mm: f64,
    #[serde(default = "default_steps_per_mm")]
    pub steps_per_mm_extruder: f64,
    /// Row-major bed-level correction matrix.
    #[serde(default = "default_bed_level")]
    pub bed_level: [[f64; 3]; 3],
}

impl Default for DeltaConfig {
    fn default() -> Self {
        Self {
            carriage_radius: default_carriage_radius(),
            rod_length: default_rod_length(),
            home_height: default_home_height(),
            build_radius: default_build_radius(),
            steps_per_mm: default_steps_per_mm(),
            steps_per_mm_extruder: default_steps_per_mm(),
            bed_level: default_bed_level(),
        }
    }
}

impl DeltaConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("delta.carriage_radius", self.carriage_radius),
            ("delta.rod_length", self.rod_length),
            ("delta.build_radius", self.build_radius),
            ("delta.steps_per_mm", self.steps_per_mm),
            ("delta.steps_per_mm_extruder", self.steps_per_mm_extruder),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::invalid(field, "must be a positive number"));
            }
        }
        if !self.home_height.is_finite() {
            return Err(ConfigError::invalid("delta.home_height", "must be finite"));
        }
        if self.rod_length <= self.carriage_radius {
            return Err(ConfigError::invalid(
                "delta.rod_length",
                "must be longer than delta.carriage_radius",
            ));
        }
        if self.bed_level.iter().flatten().any(|v| !v.is_finite()) {
            return Err(ConfigError::invalid("delta.bed_level", "must be finite"));
        }
        Ok(())
    }
}

/// Pins for one A4988-style driver. Omitted roles are left unconnected.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StepperConfig {
    #[serde(default)]
    pub step_pin: Option<String>,
    #[serde(default)]
    pub dir_pin: Option<String>,
    #[serde(default)]
    pub enable_pin: Option<String>,
    /// Delay between pulling STEP low and raising it again, microseconds.
    #[serde(default)]
    pub settle_delay_us: Option<u64>,
}

/// Pin ids for a stepper, resolved against the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepperPins {
    pub step: Option<PinId>,
    pub dir: Option<PinId>,
    pub enable: Option<PinId>,
}

impl StepperConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_micros(self.settle_delay_us.unwrap_or(DEFAULT_SETTLE_DELAY_US))
    }

    pub fn resolve_pins(&self, name: &str, board: &BoardConfig) -> Result<StepperPins, ConfigError> {
        let resolve = |role: &str, pin: &Option<String>| -> Result<Option<PinId>, ConfigError> {
            match pin {
                None => Ok(None),
                Some(pin) => board.resolve_pin(pin).map(Some).ok_or_else(|| ConfigError::UnknownPin {
                    field: format!("stepper.{name}.{role}"),
                    name: pin.clone(),
                }),
            }
        };
        Ok(StepperPins {
            step: resolve("step_pin", &self.step_pin)?,
            dir: resolve("dir_pin", &self.dir_pin)?,
            enable: resolve("enable_pin", &self.enable_pin)?,
        })
    }
}

pub const DEFAULT_SETTLE_DELAY_US: u64 = 8;

/// RC discharge circuit and Beta-model constants for one thermistor channel.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ThermistorConfig {
    #[serde(default)]
    pub pin: Option<String>,
    /// Resistor between the pin and the capacitor, ohms.
    #[serde(default = "default_series_resistor")]
    pub series_resistor: f64,
    #[serde(default = "default_capacitor_pf")]
    pub capacitor_pf: f64,
    #[serde(default = "default_vcc")]
    pub vcc: f64,
    /// Voltage at which the input flips from reading HIGH to LOW.
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    #[serde(default = "default_t0_celsius")]
    pub t0_celsius: f64,
    #[serde(default = "default_r0")]
    pub r0: f64,
    #[serde(default = "default_beta")]
    pub beta: f64,
    #[serde(default)]
    pub min_r: Option<f64>,
    /// Defaults to twice `r0`.
    #[serde(default)]
    pub max_r: Option<f64>,
}

impl Default for ThermistorConfig {
    fn default() -> Self {
        Self {
            pin: None,
            series_resistor: default_series_resistor(),
            capacitor_pf: default_capacitor_pf(),
            vcc: default_vcc(),
            threshold: default_threshold(),
            t0_celsius: default_t0_celsius(),
            r0: default_r0(),
            beta: default_beta(),
            min_r: None,
            max_r: None,
        }
    }
}

impl ThermistorConfig {
    pub fn min_r(&self) -> f64 {
        self.min_r.unwrap_or(0.0)
    }

    pub fn max_r(&self) -> f64 {
        self.max_r.unwrap_or(2.0 * self.r0)
    }

    pub fn validate(&self, name: &str) -> Result<(), ConfigError> {
        let field = |f: &str| format!("thermistor.{name}.{f}");
        for (f, value) in [
            ("series_resistor", self.series_resistor),
            ("capacitor_pf", self.capacitor_pf),
            ("vcc", self.vcc),
            ("threshold", self.threshold),
            ("r0", self.r0),
            ("beta", self.beta),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::invalid(field(f), "must be a positive number"));
            }
        }
        if self.threshold >= self.vcc {
            return Err(ConfigError::invalid(field("threshold"), "must be below vcc"));
        }
        if !(self.t0_celsius.is_finite() && self.t0_celsius > -273.15) {
            return Err(ConfigError::invalid(field("t0_celsius"), "must be above absolute zero"));
        }
        // the resistance search bisects [min_r, max_r] and needs a finite bracket
        if !(self.min_r().is_finite() && self.min_r() >= 0.0) {
            return Err(ConfigError::invalid(field("min_r"), "must be a finite number >= 0"));
        }
        if !(self.max_r().is_finite() && self.max_r() > self.min_r()) {
            return Err(ConfigError::invalid(field("max_r"), "must be finite and exceed min_r"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Quiet,
    #[default]
    Info,
    Debug,
    Verbose,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub level: LogLevel,
}

impl Config {
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.board.validate()?;
        self.delta.validate()?;
        let board = self.board.board();
        for (name, stepper) in &self.stepper {
            stepper.resolve_pins(name, &board)?;
            if stepper.settle_delay() <= board.timing.min_pulse_width {
                return Err(ConfigError::invalid(
                    format!("stepper.{name}.settle_delay_us"),
                    format!(
                        "must exceed the minimum pulse width of {:?}",
                        board.timing.min_pulse_width
                    ),
                ));
            }
        }
        for (name, thermistor) in &self.thermistor {
            thermistor.validate(name)?;
            if let Some(pin) = &thermistor.pin {
                if board.resolve_pin(pin).is_none() {
                    return Err(ConfigError::UnknownPin {
                        field: format!("thermistor.{name}.pin"),
                        name: pin.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

fn default_min_pulse_us() -> f64 { 1.0 }
fn default_carriage_radius() -> f64 { 100.0 }
fn default_rod_length() -> f64 { 200.0 }
fn default_home_height() -> f64 { 300.0 }
fn default_build_radius() -> f64 { 100.0 }
fn default_steps_per_mm() -> f64 { 100.0 }
fn default_bed_level() -> [[f64; 3]; 3] { [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]] }
fn default_series_resistor() -> f64 { 500.0 }
fn default_capacitor_pf() -> f64 { 100.0 }
fn default_vcc() -> f64 { 3.3 }
fn default_threshold() -> f64 { 1.5 }
fn default_t0_celsius() -> f64 { 25.0 }
fn default_r0() -> f64 { 100_000.0 }
fn default_beta() -> f64 { 3950.0 }

pub fn load_config(path: &str) -> Result<Config, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(contents) => match Config::from_toml_str(&contents) {
            Ok(config) => Ok(config),
            Err(e) => {
                tracing::error!("Failed to load config '{}': {}", path, e);
                Err(e)
            }
        },
        Err(e) => {
            tracing::error!("Failed to read config file '{}': {}", path, e);
            Err(ConfigError::Io(e))
        }
    }
}
