//! Adapters — concrete implementations of the hexagonal port traits.
//!
//! | Adapter     | Implements          | Connects to                  |
//! |-------------|---------------------|------------------------------|
//! | `hardware`  | TemperatureSource   | MAX31855 over SPI            |
//! |             | HeaterPort          | Zero-cross SSR (shared cell) |
//! |             | IndicatorPort       | Status LED GPIO              |
//! | `log_sink`  | EventSink           | Serial console / logger      |
//! | `nvs`       | ConfigPort          | NVS / in-memory store        |
//! |             | CoefficientStore    |                              |
//! | `time`      | (monotonic clock)   | ESP32 high-resolution timer  |

pub mod hardware;
pub mod log_sink;
pub mod nvs;
pub mod time;
