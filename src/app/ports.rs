//! Port traits — the hexagonal boundary between the control core and the
//! outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ ControlService (domain)
//! ```
//!
//! Driven adapters (thermocouple, heater, PID law, profile sequencer,
//! coefficient store, event sinks) implement these traits.  The
//! [`ControlService`](super::service::ControlService) consumes them via
//! generics, so the core never touches hardware directly.

use crate::config::SystemConfig;
use crate::error::SensorError;
use crate::sensors::thermocouple::TemperatureSample;

// ───────────────────────────────────────────────────────────────
// Temperature source (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// One acquisition per control update.
pub trait TemperatureSource {
    /// Read the latest conversion.  Sensor faults come back as a tagged
    /// sample; `Err` means no frame could be read at all.
    fn acquire(&mut self) -> Result<TemperatureSample, SensorError>;
}

// ───────────────────────────────────────────────────────────────
// PID controller
// ───────────────────────────────────────────────────────────────

/// Three 8-bit gains as kept in the coefficient store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PidGains {
    pub kp: u8,
    pub ki: u8,
    pub kd: u8,
}

/// Internal terms of the last PID step, reported on the Manual status line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PidTerms {
    /// Target minus current (0.25 °C units).
    pub error: i32,
    /// Change in error since the previous step.
    pub derivative: i32,
    /// Accumulated error after clamping.
    pub integral: i32,
}

/// Closed-loop temperature law.  The core only decides *when* it runs and
/// with which inputs; the law itself is opaque.
pub trait PidPort {
    /// Clear integrator and derivative history.
    fn reset(&mut self);

    /// One control step.  Both arguments are in 0.25 °C units; returns
    /// the heater command (0 = off, 255 = full power).
    fn update(&mut self, current: i16, target: i16) -> u8;

    /// Terms of the most recent [`update`](Self::update).
    fn terms(&self) -> PidTerms;

    fn gains(&self) -> PidGains;

    fn set_gains(&mut self, gains: PidGains);
}

// ───────────────────────────────────────────────────────────────
// Profile sequencer
// ───────────────────────────────────────────────────────────────

/// Outputs of one profile step, threaded through [`ProfilePort::update`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProfileProgress {
    /// Setpoint (0.25 °C units).
    pub target: i16,
    /// Current step index.
    pub step: u8,
    /// Seconds left in the current step.
    pub time_to_target: u16,
    /// Buzzer countdown requested by the step (0 = none).
    pub buzzer: u8,
}

/// Time-temperature profile sequencer.
pub trait ProfilePort {
    /// Select a profile and rewind it.
    fn reset(&mut self, index: u8);

    /// Advance by one control update.  Returns `true` once the profile
    /// has completed.
    fn update(&mut self, progress: &mut ProfileProgress) -> bool;

    /// Number of stored profiles.
    fn count(&self) -> u8;

    /// Number of steps in the selected profile.
    fn steps(&self) -> u8;
}

// ───────────────────────────────────────────────────────────────
// Heater actuator
// ───────────────────────────────────────────────────────────────

/// Zero-cross switched heater output.
pub trait HeaterPort {
    /// One-time output configuration.
    fn setup(&mut self);

    /// Latch a new power command (0–255) for the following half-cycles.
    fn set(&mut self, command: u8);

    /// Per-half-cycle actuation.  Called from the fast tick.
    fn update(&mut self);

    /// Switch the output off immediately and latch it off.  Later
    /// [`set`](Self::set) commands are stored but not applied.
    fn fault(&mut self);

    /// Release the fault latch.
    fn clear_fault(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Coefficient store
// ───────────────────────────────────────────────────────────────

/// Byte-addressed non-volatile store for the PID gains.
///
/// Layout: address 0 holds a validity flag (`1` = valid), addresses 1..=3
/// hold kp, ki and kd.
pub trait CoefficientStore {
    fn read_byte(&self, addr: u16) -> Result<u8, StorageError>;

    fn write_byte(&mut self, addr: u16, value: u8) -> Result<(), StorageError>;
}

// ───────────────────────────────────────────────────────────────
// Configuration port
// ───────────────────────────────────────────────────────────────

/// Loads and persists [`SystemConfig`].
///
/// Implementations MUST validate before persisting.  Invalid ranges are
/// rejected with [`ConfigError::ValidationFailed`], not clamped.
pub trait ConfigPort {
    /// Returns [`SystemConfig::default()`] if nothing is stored.
    fn load(&self) -> Result<SystemConfig, ConfigError>;

    fn save(&mut self, config: &SystemConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Outbound: events and indicators
// ───────────────────────────────────────────────────────────────

/// The core emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port: display rows, status lines, mode changes.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

/// Front-panel status LED.
pub trait IndicatorPort {
    fn set_led(&mut self, on: bool);
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Stored config failed deserialization.
    Corrupted,
    /// A config field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
    /// Underlying storage is full.
    StorageFull,
    /// Generic I/O error from the storage backend.
    IoError,
}

/// Errors from [`CoefficientStore`] and raw storage operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Requested key does not exist.
    NotFound,
    /// Address outside the store.
    OutOfRange,
    /// Storage partition is full.
    Full,
    /// Generic I/O error.
    IoError,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {msg}"),
            Self::StorageFull => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "key not found"),
            Self::OutOfRange => write!(f, "address out of range"),
            Self::Full => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}
