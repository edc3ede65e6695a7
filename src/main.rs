//! Reflow Oven Firmware — Main Entry Point
//!
//! Hexagonal core, interrupt-driven timing, foreground control loop.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  HardwareAdapter           LogEventSink   NvsAdapter           │
//! │  (Temp+Heater+Indicator)   (EventSink)    (Config+Coefs)       │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │           ControlService (pure logic)                  │    │
//! │  │  FSM · PID · Profile                                   │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                          ▲ SHARED (atomics)                    │
//! │  gptimer ISR: Scheduler::fast_tick   ZC ISR: counter reset     │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use anyhow::Result;
use esp_idf_hal::delay::{Ets, FreeRtos};
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_hal::spi::config::Config as SpiConfig;
use esp_idf_hal::spi::{SpiDeviceDriver, SpiDriver, SpiDriverConfig};
use esp_idf_hal::units::Hertz;
use log::{error, info, warn};

use reflow::adapters::hardware::HardwareAdapter;
use reflow::adapters::log_sink::LogEventSink;
use reflow::adapters::nvs::NvsAdapter;
use reflow::adapters::time::Esp32TimeAdapter;
use reflow::app::ports::{ConfigPort, HeaterPort, PidGains};
use reflow::app::service::ControlService;
use reflow::config::SystemConfig;
use reflow::control::pid::{load_gains, PidController};
use reflow::control::profile::ProfileSequencer;
use reflow::drivers::ssr::HEATER;
use reflow::drivers::watchdog::{Watchdog, DEFAULT_TIMEOUT_MS};
use reflow::drivers::{hw_init, hw_timer};
use reflow::pins;
use reflow::scheduler::{Scheduler, TickBudget};
use reflow::sensors::Thermocouple;
use reflow::shared::SHARED;

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  Reflow oven v{}                     ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. GPIO: heater off before anything else ──────────────
    init_board()?;

    // ── 3. Config + PID gains from NVS (or defaults) ──────────
    let nvs = match NvsAdapter::new() {
        Ok(n) => Some(n),
        Err(e) => {
            warn!("NVS init failed ({}), running with defaults and no persistence", e);
            None
        }
    };
    let config = load_config(nvs.as_ref()).unwrap_or_else(|e| {
        warn!("Config load failed ({}), using defaults", e);
        SystemConfig::default()
    });
    let defaults = PidGains {
        kp: config.default_kp,
        ki: config.default_ki,
        kd: config.default_kd,
    };
    let gains = match nvs.as_ref() {
        Some(store) => load_gains(store, defaults),
        None => defaults,
    };
    info!("PID gains: kp={} ki={} kd={}", gains.kp, gains.ki, gains.kd);

    // ── 4. Thermocouple on SPI2 ───────────────────────────────
    // GPIO numbers must match pins.rs (SCK 5, MOSI 7, MISO 6, CS 4).
    let p = Peripherals::take()?;
    let bus = SpiDriver::new(
        p.spi2,
        p.pins.gpio5,
        p.pins.gpio7,
        Some(p.pins.gpio6),
        &SpiDriverConfig::new(),
    )?;
    let spi = SpiDeviceDriver::new(
        bus,
        Some(p.pins.gpio4),
        &SpiConfig::new().baudrate(Hertz(pins::TC_SPI_BAUD_HZ)),
    )?;
    let mut thermocouple = Thermocouple::new(spi, config.average_seed_raw);
    if let Err(e) = thermocouple.begin(&mut Ets) {
        // The first acquisition will fail the same way and fault the machine.
        error!("Thermocouple start failed: {}", e);
    }

    // ── 5. Core ───────────────────────────────────────────────
    let mut hw = HardwareAdapter::new(thermocouple, &HEATER);
    let mut sink = LogEventSink::new();
    let mut service = ControlService::new(
        config.clone(),
        PidController::new(gains),
        ProfileSequencer::new(config.slow_updates_per_second()),
    );
    service.start(&SHARED, &mut hw, &mut sink);

    // ── 6. Tick timer + zero-cross ISR ────────────────────────
    let timer = config.timer();
    hw_timer::start_tick_timer(&timer, Scheduler::new(&config), &HEATER)?;

    let mut watchdog = Watchdog::new(DEFAULT_TIMEOUT_MS);
    let clock = Esp32TimeAdapter::new();
    let mut budget = TickBudget::for_timer(&timer);
    let mut reported_overruns = 0;

    info!("System ready. Entering control loop.");

    // ── 7. Foreground loop ────────────────────────────────────
    loop {
        if SHARED.slow_tick.take() {
            let started = clock.uptime_us();
            service.slow_tick(&SHARED, &mut hw, &mut sink);
            let elapsed = clock.elapsed_us(started);
            if !budget.record(elapsed) {
                warn!(
                    "Control update took {}us (budget {}us, worst {}us)",
                    elapsed,
                    budget.budget_us(),
                    budget.worst_us()
                );
            }
        }

        service.foreground(&SHARED, &mut hw, &mut sink);

        let overruns = SHARED.slow_tick.overruns();
        if overruns != reported_overruns {
            warn!("Slow tick overrun ({} total)", overruns);
            reported_overruns = overruns;
        }

        watchdog.feed();

        // Yield so the idle task runs; well under one fast tick.
        FreeRtos::delay_ms(1);
    }
}

/// GPIO directions, then the heater output driven off.
fn init_board() -> reflow::error::Result<()> {
    hw_init::init_peripherals()?;
    critical_section::with(|cs| HEATER.borrow_ref_mut(cs).setup());
    Ok(())
}

fn load_config(nvs: Option<&NvsAdapter>) -> reflow::error::Result<SystemConfig> {
    match nvs {
        Some(store) => Ok(store.load()?),
        None => Ok(SystemConfig::default()),
    }
}
