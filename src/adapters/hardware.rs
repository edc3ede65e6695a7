//! Hardware adapter — bridges real peripherals to domain port traits.
//!
//! Owns the thermocouple interface and a handle on the interrupt-shared
//! heater, exposing them through [`TemperatureSource`], [`HeaterPort`] and
//! [`IndicatorPort`].  This is the one value the control service touches
//! hardware through.  On non-espidf targets the GPIO writes are no-ops.

use embedded_hal::spi::SpiDevice;

use crate::app::ports::{HeaterPort, IndicatorPort, TemperatureSource};
use crate::drivers::hw_init;
use crate::drivers::ssr::{HeaterCell, HeaterMutex, SsrDriver};
use crate::error::SensorError;
use crate::pins;
use crate::sensors::thermocouple::{TemperatureSample, Thermocouple};

/// Concrete adapter that combines all foreground hardware behind port traits.
pub struct HardwareAdapter<'a, SPI> {
    thermocouple: Thermocouple<SPI>,
    heater: HeaterCell<'a, SsrDriver>,
    led_on: bool,
}

impl<'a, SPI: SpiDevice> HardwareAdapter<'a, SPI> {
    pub fn new(thermocouple: Thermocouple<SPI>, heater: &'a HeaterMutex<SsrDriver>) -> Self {
        Self {
            thermocouple,
            heater: HeaterCell::new(heater),
            led_on: false,
        }
    }

    pub fn thermocouple(&self) -> &Thermocouple<SPI> {
        &self.thermocouple
    }

    pub fn heater(&self) -> &HeaterCell<'a, SsrDriver> {
        &self.heater
    }

    pub fn led_on(&self) -> bool {
        self.led_on
    }
}

// ── TemperatureSource ─────────────────────────────────────────

impl<SPI: SpiDevice> TemperatureSource for HardwareAdapter<'_, SPI> {
    fn acquire(&mut self) -> Result<TemperatureSample, SensorError> {
        self.thermocouple.read()
    }
}

// ── HeaterPort ────────────────────────────────────────────────

impl<SPI: SpiDevice> HeaterPort for HardwareAdapter<'_, SPI> {
    fn setup(&mut self) {
        self.heater.setup();
    }

    fn set(&mut self, command: u8) {
        self.heater.set(command);
    }

    fn update(&mut self) {
        self.heater.update();
    }

    fn fault(&mut self) {
        self.heater.fault();
    }

    fn clear_fault(&mut self) {
        self.heater.clear_fault();
    }
}

// ── IndicatorPort ─────────────────────────────────────────────

impl<SPI: SpiDevice> IndicatorPort for HardwareAdapter<'_, SPI> {
    fn set_led(&mut self, on: bool) {
        if on != self.led_on {
            self.led_on = on;
            hw_init::gpio_write(pins::STATUS_LED_GPIO, on);
        }
    }
}
