//! One-shot hardware peripheral initialization.
//!
//! Configures GPIO directions for the heater, indicators, buttons and the
//! zero-cross input using raw ESP-IDF sys calls.  Called once from `main()`
//! before the tick timer starts.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
use log::info;

#[cfg(target_os = "espidf")]
use crate::pins;

// ── Error type ────────────────────────────────────────────────

/// Errors during one-shot peripheral initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwInitError {
    GpioConfigFailed(i32),
    IsrInstallFailed(i32),
    TimerInitFailed(i32),
}

impl core::fmt::Display for HwInitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::GpioConfigFailed(rc) => write!(f, "GPIO config failed (rc={})", rc),
            Self::IsrInstallFailed(rc) => write!(f, "GPIO ISR service install failed (rc={})", rc),
            Self::TimerInitFailed(rc) => write!(f, "tick timer init failed (rc={})", rc),
        }
    }
}

impl core::error::Error for HwInitError {}

/// `esp_err_t` success.
const ESP_OK_CODE: i32 = 0;

/// Allocation flags for the shared GPIO ISR service.  The zero-cross
/// handler lives in flash, so no IRAM flag.
pub const ISR_SERVICE_FLAGS: i32 = 0;

/// Map an `esp_err_t` to `Ok` or the given error variant.
#[cfg_attr(not(target_os = "espidf"), allow(dead_code))]
fn check(ret: i32, err: fn(i32) -> HwInitError) -> Result<(), HwInitError> {
    if ret == ESP_OK_CODE { Ok(()) } else { Err(err(ret)) }
}

#[cfg(target_os = "espidf")]
pub fn init_peripherals() -> Result<(), HwInitError> {
    // SAFETY: Called once from main() before the tick timer; single-threaded.
    unsafe {
        init_gpio_outputs()?;
        init_gpio_inputs()?;
    }
    info!("hw_init: all peripherals configured");
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_peripherals() -> Result<(), HwInitError> {
    log::info!("hw_init(sim): peripheral init skipped");
    Ok(())
}

// ── GPIO Inputs ───────────────────────────────────────────────

#[cfg(target_os = "espidf")]
unsafe fn init_gpio_inputs() -> Result<(), HwInitError> {
    // Buttons are polled from the fast tick; no interrupt.
    let button_pins = [pins::PRIMARY_BUTTON_GPIO, pins::SECONDARY_BUTTON_GPIO];
    for &pin in &button_pins {
        let cfg = gpio_config_t {
            pin_bit_mask: 1u64 << pin,
            mode: gpio_mode_t_GPIO_MODE_INPUT,
            pull_up_en: gpio_pullup_t_GPIO_PULLUP_ENABLE,
            pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
            intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
        };
        let ret = unsafe { gpio_config(&cfg) };
        if ret != ESP_OK as i32 { return Err(HwInitError::GpioConfigFailed(ret)); }
    }

    // Opto-coupler pulls low at each crossing.
    let zc_cfg = gpio_config_t {
        pin_bit_mask: 1u64 << pins::ZERO_CROSS_GPIO,
        mode: gpio_mode_t_GPIO_MODE_INPUT,
        pull_up_en: gpio_pullup_t_GPIO_PULLUP_ENABLE,
        pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
        intr_type: gpio_int_type_t_GPIO_INTR_NEGEDGE,
    };
    let ret = unsafe { gpio_config(&zc_cfg) };
    if ret != ESP_OK as i32 { return Err(HwInitError::GpioConfigFailed(ret)); }

    info!("hw_init: GPIO inputs configured (buttons, zero-cross)");
    Ok(())
}

#[cfg(target_os = "espidf")]
pub fn gpio_read(pin: i32) -> bool {
    // SAFETY: gpio_get_level is a read-only register access on an
    // already-configured input pin; safe from ISR and task context.
    (unsafe { gpio_get_level(pin) }) != 0
}

/// Sim: inputs float high (buttons released).
#[cfg(not(target_os = "espidf"))]
pub fn gpio_read(_pin: i32) -> bool {
    true
}

// ── GPIO Outputs ──────────────────────────────────────────────

#[cfg(target_os = "espidf")]
unsafe fn init_gpio_outputs() -> Result<(), HwInitError> {
    // SSR first so the heater is off before anything else runs.
    let output_pins = [pins::SSR_GPIO, pins::STATUS_LED_GPIO, pins::BUZZER_GPIO];

    for &pin in &output_pins {
        let cfg = gpio_config_t {
            pin_bit_mask: 1u64 << pin,
            mode: gpio_mode_t_GPIO_MODE_OUTPUT,
            pull_up_en: gpio_pullup_t_GPIO_PULLUP_DISABLE,
            pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
            intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
        };
        let ret = unsafe { gpio_config(&cfg) };
        if ret != ESP_OK as i32 { return Err(HwInitError::GpioConfigFailed(ret)); }
        unsafe { gpio_set_level(pin, 0) };
    }

    info!("hw_init: GPIO outputs configured (SSR, LED, buzzer)");
    Ok(())
}

#[cfg(target_os = "espidf")]
pub fn gpio_write(pin: i32, high: bool) {
    // SAFETY: gpio_set_level writes to an already-configured output pin.
    // Each output has a single owner (SSR: heater cell, buzzer: fast tick,
    // LED: foreground).
    unsafe { gpio_set_level(pin, u32::from(high)); }
}

#[cfg(not(target_os = "espidf"))]
pub fn gpio_write(_pin: i32, _high: bool) {}

// ── GPIO ISR Service ──────────────────────────────────────────

/// Install the per-pin GPIO ISR service and attach the zero-cross handler.
/// `arg` is handed back to `handler` on every edge.
#[cfg(target_os = "espidf")]
pub fn init_isr_service(
    handler: unsafe extern "C" fn(*mut core::ffi::c_void),
    arg: *mut core::ffi::c_void,
) -> Result<(), HwInitError> {
    // SAFETY: gpio_install_isr_service is idempotent; ESP_ERR_INVALID_STATE
    // means it was already installed (acceptable).  `arg` must outlive the
    // handler registration; callers pass leaked statics.
    unsafe {
        let ret = gpio_install_isr_service(ISR_SERVICE_FLAGS);
        if ret != ESP_ERR_INVALID_STATE as i32 {
            check(ret, HwInitError::IsrInstallFailed)?;
        }

        check(
            gpio_set_intr_type(pins::ZERO_CROSS_GPIO, gpio_int_type_t_GPIO_INTR_NEGEDGE),
            HwInitError::GpioConfigFailed,
        )?;
        check(
            gpio_isr_handler_add(pins::ZERO_CROSS_GPIO, Some(handler), arg),
            HwInitError::IsrInstallFailed,
        )?;
        check(gpio_intr_enable(pins::ZERO_CROSS_GPIO), HwInitError::IsrInstallFailed)?;

        info!("hw_init: zero-cross ISR installed");
    }
    Ok(())
}
