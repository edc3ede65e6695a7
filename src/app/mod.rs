//! Application core — pure domain logic, zero I/O.
//!
//! This module contains the business rules for the reflow controller:
//! command decoding, the control service that sequences acquisition,
//! profile, PID and heater, and the display/status text.  All interaction
//! with hardware happens through **port traits** defined in [`ports`],
//! keeping this layer fully testable without real peripherals.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
pub mod status;
