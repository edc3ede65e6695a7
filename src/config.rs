//! System configuration parameters
//!
//! All tunable parameters for the reflow controller.
//! Values can be overridden by a config blob in NVS.

use serde::{Deserialize, Serialize};

use crate::app::ports::ConfigError;
use crate::scheduler::TimerConfig;

/// Core system configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemConfig {
    // --- Mains synchronisation ---
    /// Mains frequency (Hz).  The fast tick runs just under twice this.
    pub mains_hz: u8,
    /// Tick timer resolution (Hz).
    pub timer_resolution_hz: u32,
    /// Free-running timer top (ticks).  Slightly longer than a half-cycle so
    /// the zero-cross edge always wins the race.
    pub timer_period_ticks: u32,
    /// Fast-tick compare point (ticks after the zero-cross edge).
    pub timer_compare_ticks: u32,

    // --- Derived rates ---
    /// Fast ticks per control update (25 → ~4 Hz).
    pub slow_tick_divider: u8,
    /// Fast ticks between button samples (3 → ~30 ms).
    pub button_sample_divider: u8,

    // --- Thermocouple ---
    /// Seed for the moving-average window (0.25 °C units).
    pub average_seed_raw: i16,

    // --- PID defaults (used when the coefficient store is blank) ---
    pub default_kp: u8,
    pub default_ki: u8,
    pub default_kd: u8,

    // --- Manual mode (0.25 °C units) ---
    /// Target loaded when the manual slot is selected.
    pub manual_default_target: i16,
    /// Increment per secondary-button press.
    pub manual_step: i16,
    /// Highest accepted manual target before wrapping.
    pub manual_max_target: i16,
    /// Target the increment wraps back to.
    pub manual_wrap_target: i16,

    // --- Completion ---
    /// Buzzer countdown armed when a profile completes.
    pub done_buzzer_ticks: u8,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            // Mains: 8 MHz / 8 prescaler equivalent, 99 Hz free-running
            mains_hz: 50,
            timer_resolution_hz: 1_000_000,
            timer_period_ticks: 10_101,
            timer_compare_ticks: 9_000,

            // Rates
            slow_tick_divider: 25,
            button_sample_divider: 3,

            // Thermocouple
            average_seed_raw: 100, // 25 °C

            // PID (kp is scaled by 10 in the controller: 23 → 2.3)
            default_kp: 23,
            default_ki: 0,
            default_kd: 0,

            // Manual
            manual_default_target: 600, // 150 °C
            manual_step: 20,            // 5 °C
            manual_max_target: 1000,    // 250 °C
            manual_wrap_target: 200,    // 50 °C

            done_buzzer_ticks: 8,
        }
    }
}

impl SystemConfig {
    /// Tick timer parameters derived from this config.
    pub fn timer(&self) -> TimerConfig {
        TimerConfig {
            resolution_hz: self.timer_resolution_hz,
            period_ticks: self.timer_period_ticks,
            compare_ticks: self.timer_compare_ticks,
        }
    }

    /// Control updates per second, rounded (≈4 with the defaults).  With
    /// mains present the fast tick runs at exactly twice `mains_hz`.
    pub fn slow_updates_per_second(&self) -> u8 {
        let fast = 2 * u32::from(self.mains_hz);
        let divider = u32::from(self.slow_tick_divider.max(1));
        ((fast + divider / 2) / divider).max(1) as u8
    }

    /// Range-check every field.  Invalid configs are rejected, never clamped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mains_hz != 50 && self.mains_hz != 60 {
            return Err(ConfigError::ValidationFailed("mains_hz must be 50 or 60"));
        }
        self.timer().validate(self.mains_hz)?;
        if self.slow_tick_divider < 2 {
            return Err(ConfigError::ValidationFailed(
                "slow_tick_divider must be at least 2",
            ));
        }
        if self.button_sample_divider == 0 {
            return Err(ConfigError::ValidationFailed(
                "button_sample_divider must be non-zero",
            ));
        }
        if self.manual_step <= 0 {
            return Err(ConfigError::ValidationFailed("manual_step must be positive"));
        }
        if !(0..=self.manual_max_target).contains(&self.manual_wrap_target) {
            return Err(ConfigError::ValidationFailed(
                "manual_wrap_target must be within 0..=manual_max_target",
            ));
        }
        if !(0..=self.manual_max_target).contains(&self.manual_default_target) {
            return Err(ConfigError::ValidationFailed(
                "manual_default_target must be within 0..=manual_max_target",
            ));
        }
        // 1000 quarter-degrees is already 250 °C; anything beyond ~300 °C
        // is outside what a reflow oven is ever asked to hold.
        if self.manual_max_target > 1200 {
            return Err(ConfigError::ValidationFailed(
                "manual_max_target must be at most 1200 (300 °C)",
            ));
        }
        Ok(())
    }
}
