//! Zero-cross solid-state relay driver.
//!
//! The SSR can only switch at a mains zero crossing, so power is metered
//! in whole half-cycles.  A command of `n` (0–255) conducts on `n` out of
//! every 255 half-cycles, spread evenly by an error accumulator:
//!
//! ```text
//!  cmd 64  ▁█▁▁▁█▁▁▁█▁▁▁█▁▁   (1 in 4)
//!  cmd 128 ▁█▁█▁█▁█▁█▁█▁█▁█   (1 in 2)
//! ```
//!
//! `update()` runs once per fast tick, just before the next crossing.
//! Both the interrupt and the foreground touch the driver, so it lives in
//! a [`HeaterCell`] and every access is a short critical section.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: drives the SSR GPIO via hw_init.
//! On host/test: tracks state in-memory only.

use core::cell::RefCell;

use critical_section::Mutex;
use log::warn;

use crate::app::ports::HeaterPort;
use crate::drivers::hw_init;
use crate::pins;

/// Full-scale command.
const FULL_SCALE: u16 = 255;

pub struct SsrDriver {
    command: u8,
    accumulator: u16,
    conducting: bool,
    faulted: bool,
    half_cycles: u32,
    on_cycles: u32,
}

impl Default for SsrDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl SsrDriver {
    pub const fn new() -> Self {
        Self {
            command: 0,
            accumulator: 0,
            conducting: false,
            faulted: false,
            half_cycles: 0,
            on_cycles: 0,
        }
    }

    fn write_output(&mut self, on: bool) {
        self.conducting = on;
        hw_init::gpio_write(pins::SSR_GPIO, on);
    }

    pub fn command(&self) -> u8 {
        self.command
    }

    pub fn is_conducting(&self) -> bool {
        self.conducting
    }

    pub fn is_faulted(&self) -> bool {
        self.faulted
    }

    /// `(half-cycles seen, half-cycles conducted)` since boot.
    pub fn duty_counters(&self) -> (u32, u32) {
        (self.half_cycles, self.on_cycles)
    }
}

impl HeaterPort for SsrDriver {
    fn setup(&mut self) {
        self.command = 0;
        self.accumulator = 0;
        self.faulted = false;
        self.write_output(false);
    }

    fn set(&mut self, command: u8) {
        self.command = command;
    }

    fn update(&mut self) {
        self.half_cycles = self.half_cycles.wrapping_add(1);
        if self.faulted {
            if self.conducting {
                self.write_output(false);
            }
            return;
        }

        self.accumulator += u16::from(self.command);
        let on = if self.accumulator >= FULL_SCALE {
            self.accumulator -= FULL_SCALE;
            true
        } else {
            false
        };
        if on {
            self.on_cycles = self.on_cycles.wrapping_add(1);
        }
        if on != self.conducting {
            self.write_output(on);
        }
    }

    fn fault(&mut self) {
        if !self.faulted {
            warn!("SSR: fault latch set, output off");
        }
        self.faulted = true;
        self.accumulator = 0;
        self.write_output(false);
    }

    fn clear_fault(&mut self) {
        self.faulted = false;
    }
}

// ── Interrupt-shared handle ───────────────────────────────────

/// The heater as shared between the fast tick and the foreground.
pub type HeaterMutex<H> = Mutex<RefCell<H>>;

/// The board's one heater output.
pub static HEATER: HeaterMutex<SsrDriver> = Mutex::new(RefCell::new(SsrDriver::new()));

/// [`HeaterPort`] view of a heater living in a critical-section mutex.
pub struct HeaterCell<'a, H> {
    cell: &'a HeaterMutex<H>,
}

impl<'a, H: HeaterPort> HeaterCell<'a, H> {
    pub fn new(cell: &'a HeaterMutex<H>) -> Self {
        Self { cell }
    }

    fn with<T>(&self, f: impl FnOnce(&mut H) -> T) -> T {
        critical_section::with(|cs| f(&mut self.cell.borrow_ref_mut(cs)))
    }

    /// Read-only access, e.g. for diagnostics.
    pub fn inspect<T>(&self, f: impl FnOnce(&H) -> T) -> T {
        critical_section::with(|cs| f(&self.cell.borrow_ref(cs)))
    }
}

impl<H: HeaterPort> HeaterPort for HeaterCell<'_, H> {
    fn setup(&mut self) {
        self.with(|h| h.setup());
    }

    fn set(&mut self, command: u8) {
        self.with(|h| h.set(command));
    }

    fn update(&mut self) {
        self.with(|h| h.update());
    }

    fn fault(&mut self) {
        self.with(|h| h.fault());
    }

    fn clear_fault(&mut self) {
        self.with(|h| h.clear_fault());
    }
}
