//! MAX31855 thermocouple-to-digital converter.
//!
//! The converter clocks out one 32-bit frame per chip-select assertion and
//! starts the next conversion when chip-select is released, so every read
//! returns the *previous* conversion.
//!
//! ```text
//!  byte   0        1        2        3
//!        ┌────────────────┬────────────────┐
//!        │ hot (14b) r  F │ cold (12b) r SV SG OC │
//!        └────────────────┴────────────────┘
//!  F  = fault flag          OC/SG/SV = open / short-GND / short-VCC
//! ```
//!
//! Hot junction is in 0.25 °C units, cold junction in 0.0625 °C units.
//! A faulted frame is reported as data: the sample carries a fault tag and
//! the hot-junction field holds that fault's reserved sentinel code.

use embedded_hal::delay::DelayNs;
use embedded_hal::spi::{Operation, SpiDevice};
use log::warn;

use crate::app::ports::TemperatureSource;
use crate::error::SensorError;

/// Entries in the moving-average window.  Power of two.
pub const AVERAGE_LEN: usize = 4;
const AVERAGE_SHIFT: u32 = AVERAGE_LEN.trailing_zeros();

/// Window seed: 100 × 0.25 °C = 25 °C.
pub const DEFAULT_SEED: i16 = 100;

// ---------------------------------------------------------------------------
// Fault kinds
// ---------------------------------------------------------------------------

/// Thermocouple wiring faults reported by the converter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThermocoupleFault {
    OpenCircuit,
    ShortToGround,
    ShortToSupply,
}

impl ThermocoupleFault {
    pub const ALL: [Self; 3] = [Self::OpenCircuit, Self::ShortToGround, Self::ShortToSupply];

    /// Status bit in the low word of the frame.
    pub const fn status_bit(self) -> u8 {
        match self {
            Self::OpenCircuit => 0b001,
            Self::ShortToGround => 0b010,
            Self::ShortToSupply => 0b100,
        }
    }

    /// Reserved hot-junction code stored in place of a reading.
    pub const fn sentinel(self) -> i16 {
        match self {
            Self::OpenCircuit => 0xFFFF_u16 as i16,
            Self::ShortToGround => 0xFFFE_u16 as i16,
            Self::ShortToSupply => 0xFFFD_u16 as i16,
        }
    }

    /// Decode the three status bits.  Several bits at once: the lowest
    /// one wins.
    pub fn from_status_bits(bits: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|f| bits & f.status_bit() != 0)
    }

    pub fn from_sentinel(raw: i16) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.sentinel() == raw)
    }
}

// ---------------------------------------------------------------------------
// Sample
// ---------------------------------------------------------------------------

/// One decoded conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TemperatureSample {
    /// Hot junction (0.25 °C), or the fault sentinel.
    pub hot: i16,
    /// Cold junction (0.0625 °C).  Last valid value when faulted.
    pub cold: i16,
    pub fault: Option<ThermocoupleFault>,
}

impl TemperatureSample {
    pub const fn is_fault(&self) -> bool {
        self.fault.is_some()
    }

    /// Hot junction in whole degrees, `None` when faulted.
    pub fn whole_degrees(&self) -> Option<i16> {
        match self.fault {
            None => Some(self.hot >> 2),
            Some(_) => None,
        }
    }
}

/// Decode a raw frame.  `last_cold` is carried through on faulted frames.
pub fn decode_frame(frame: [u8; 4], last_cold: i16) -> TemperatureSample {
    let hi = u16::from_be_bytes([frame[0], frame[1]]);
    let lo = u16::from_be_bytes([frame[2], frame[3]]);

    if hi & 0x0001 != 0 {
        match ThermocoupleFault::from_status_bits((lo & 0x0007) as u8) {
            Some(fault) => {
                return TemperatureSample {
                    hot: fault.sentinel(),
                    cold: last_cold,
                    fault: Some(fault),
                };
            }
            None => warn!("MAX31855: fault flag without cause (frame {frame:02X?})"),
        }
    }

    TemperatureSample {
        hot: (hi as i16) >> 2,
        cold: (lo as i16) >> 4,
        fault: None,
    }
}

// ---------------------------------------------------------------------------
// Moving average
// ---------------------------------------------------------------------------

/// FIFO of the last [`AVERAGE_LEN`] hot-junction values, newest first.
#[derive(Debug, Clone)]
pub struct MovingAverage {
    window: [i16; AVERAGE_LEN],
}

impl MovingAverage {
    pub fn new(seed: i16) -> Self {
        Self {
            window: [seed; AVERAGE_LEN],
        }
    }

    pub fn push(&mut self, raw: i16) {
        self.window.copy_within(0..AVERAGE_LEN - 1, 1);
        self.window[0] = raw;
    }

    pub fn average(&self) -> i16 {
        let sum: i32 = self.window.iter().map(|&v| i32::from(v)).sum();
        (sum >> AVERAGE_SHIFT) as i16
    }

    pub fn window(&self) -> &[i16; AVERAGE_LEN] {
        &self.window
    }
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

pub struct Thermocouple<SPI> {
    spi: SPI,
    cold: i16,
    average: MovingAverage,
}

impl<SPI: SpiDevice> Thermocouple<SPI> {
    pub fn new(spi: SPI, seed: i16) -> Self {
        Self {
            spi,
            cold: 0,
            average: MovingAverage::new(seed),
        }
    }

    /// Pulse chip-select once so the first [`acquire`](Self::acquire)
    /// returns a real conversion.
    pub fn begin(&mut self, delay: &mut impl DelayNs) -> Result<(), SensorError> {
        delay.delay_us(100);
        self.spi
            .transaction(&mut [Operation::DelayNs(100_000)])
            .map_err(|_| SensorError::Bus)
    }

    /// Read and decode one frame.  The returned hot junction is the raw
    /// reading; the smoothed value is only available through
    /// [`average`](Self::average).
    pub fn read(&mut self) -> Result<TemperatureSample, SensorError> {
        let mut frame = [0u8; 4];
        self.spi.read(&mut frame).map_err(|_| SensorError::Bus)?;

        let sample = decode_frame(frame, self.cold);
        self.cold = sample.cold;
        self.average.push(sample.hot);
        Ok(sample)
    }

    pub fn average(&self) -> i16 {
        self.average.average()
    }

    pub fn window(&self) -> &MovingAverage {
        &self.average
    }

    pub fn release(self) -> SPI {
        self.spi
    }
}

impl<SPI: SpiDevice> TemperatureSource for Thermocouple<SPI> {
    fn acquire(&mut self) -> Result<TemperatureSample, SensorError> {
        self.read()
    }
}
