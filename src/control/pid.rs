//! PID controller for oven temperature
//!
//! Integer proportional-integral-derivative law driving the heater command
//! (0–255).  Gains are 8-bit and scaled by 1/10 so the stored defaults
//! (kp = 23) mean 2.3 command counts per 0.25 °C of error.

use log::{info, warn};

use crate::app::ports::{CoefficientStore, PidGains, PidPort, PidTerms, StorageError};

/// Gain scale: stored gain / `GAIN_SCALE` = effective gain.
const GAIN_SCALE: i32 = 10;
/// Integrator clamp (error-ticks) so a long heat-up cannot wind it up.
const INTEGRAL_LIMIT: i32 = 20_000;

const ADDR_VALID: u16 = 0;
const ADDR_KP: u16 = 1;
const ADDR_KI: u16 = 2;
const ADDR_KD: u16 = 3;
const VALID_MARKER: u8 = 1;

impl PidGains {
    pub const DEFAULT: Self = Self {
        kp: 23,
        ki: 0,
        kd: 0,
    };
}

/// Read gains from the coefficient store.
///
/// A blank store (validity flag ≠ 1) or a failing one yields `defaults`.
pub fn load_gains(store: &impl CoefficientStore, defaults: PidGains) -> PidGains {
    match read_stored(store) {
        Ok(Some(gains)) => {
            info!("PID gains loaded: kp={} ki={} kd={}", gains.kp, gains.ki, gains.kd);
            gains
        }
        Ok(None) => {
            info!("No stored PID gains, using defaults");
            defaults
        }
        Err(e) => {
            warn!("PID gain load failed ({e}), using defaults");
            defaults
        }
    }
}

fn read_stored(store: &impl CoefficientStore) -> Result<Option<PidGains>, StorageError> {
    if store.read_byte(ADDR_VALID)? != VALID_MARKER {
        return Ok(None);
    }
    Ok(Some(PidGains {
        kp: store.read_byte(ADDR_KP)?,
        ki: store.read_byte(ADDR_KI)?,
        kd: store.read_byte(ADDR_KD)?,
    }))
}

/// Persist gains and mark the store valid.  The flag goes last so a
/// partial write leaves the store blank rather than half-updated.
pub fn store_gains(store: &mut impl CoefficientStore, gains: PidGains) -> Result<(), StorageError> {
    store.write_byte(ADDR_VALID, 0)?;
    store.write_byte(ADDR_KP, gains.kp)?;
    store.write_byte(ADDR_KI, gains.ki)?;
    store.write_byte(ADDR_KD, gains.kd)?;
    store.write_byte(ADDR_VALID, VALID_MARKER)
}

/// PID controller
pub struct PidController {
    gains: PidGains,
    integral: i32,
    prev_error: i32,
    derivative: i32,
}

impl PidController {
    pub fn new(gains: PidGains) -> Self {
        Self {
            gains,
            integral: 0,
            prev_error: 0,
            derivative: 0,
        }
    }

    /// Compute the heater command for one control step.
    pub fn compute(&mut self, current: i16, target: i16) -> u8 {
        let error = i32::from(target) - i32::from(current);

        let p = i32::from(self.gains.kp) * error;

        self.integral = (self.integral + error).clamp(-INTEGRAL_LIMIT, INTEGRAL_LIMIT);
        let i = i32::from(self.gains.ki) * self.integral / GAIN_SCALE;

        self.derivative = error - self.prev_error;
        let d = i32::from(self.gains.kd) * self.derivative;
        self.prev_error = error;

        let raw = (p + d) / GAIN_SCALE + i;
        let output = raw.clamp(0, i32::from(u8::MAX));

        // Anti-windup: if output is saturated, stop integrating
        if raw != output {
            self.integral -= error;
        }

        output as u8
    }
}

impl PidPort for PidController {
    fn reset(&mut self) {
        self.integral = 0;
        self.prev_error = 0;
        self.derivative = 0;
    }

    fn update(&mut self, current: i16, target: i16) -> u8 {
        self.compute(current, target)
    }

    fn terms(&self) -> PidTerms {
        PidTerms {
            error: self.prev_error,
            derivative: self.derivative,
            integral: self.integral,
        }
    }

    fn gains(&self) -> PidGains {
        self.gains
    }

    fn set_gains(&mut self, gains: PidGains) {
        self.gains = gains;
    }
}
