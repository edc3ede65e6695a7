//! GPIO / peripheral pin assignments for the reflow controller board.
//!
//! Single source of truth: every driver references this module rather than
//! hard-coding pin numbers.  Change a pin here and it propagates everywhere.

// ---------------------------------------------------------------------------
// Heater (zero-cross solid-state relay)
// ---------------------------------------------------------------------------

/// Digital output: HIGH = SSR conducting on the next zero-crossing.
pub const SSR_GPIO: i32 = 3;

/// Digital input: mains zero-cross detector (opto-coupler, open collector).
/// Falling edge on every mains half-cycle; needs the internal pull-up.
pub const ZERO_CROSS_GPIO: i32 = 2;

// ---------------------------------------------------------------------------
// MAX31855 thermocouple interface (SPI2, read-only)
// ---------------------------------------------------------------------------

/// Chip-select, active low.  De-asserting starts the next conversion.
pub const TC_CS_GPIO: i32 = 4;
pub const SPI_SCK_GPIO: i32 = 5;
pub const SPI_MISO_GPIO: i32 = 6;
/// MOSI is routed but unused by the MAX31855.
pub const SPI_MOSI_GPIO: i32 = 7;

/// SPI clock for the thermocouple converter (max 5 MHz).
pub const TC_SPI_BAUD_HZ: u32 = 1_000_000;

// ---------------------------------------------------------------------------
// User interface
// ---------------------------------------------------------------------------

/// Red (primary) push-button, active-low with pull-up.
pub const PRIMARY_BUTTON_GPIO: i32 = 16;
/// Green (secondary) push-button, active-low with pull-up.
pub const SECONDARY_BUTTON_GPIO: i32 = 17;

/// Red status LED: on while heating, blinking on fault.
pub const STATUS_LED_GPIO: i32 = 11;

/// Piezo buzzer (driven directly, toggled at the control rate).
pub const BUZZER_GPIO: i32 = 12;

// ---------------------------------------------------------------------------
// UART (status lines / host link)
// ---------------------------------------------------------------------------

pub const UART_TX_GPIO: i32 = 43;
pub const UART_RX_GPIO: i32 = 44;
