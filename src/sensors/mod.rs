//! Sensor drivers.
//!
//! Only the thermocouple converter today; it feeds the control core
//! through [`TemperatureSource`](crate::app::ports::TemperatureSource).

pub mod thermocouple;

pub use thermocouple::{TemperatureSample, Thermocouple, ThermocoupleFault};
