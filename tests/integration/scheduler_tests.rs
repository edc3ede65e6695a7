//! Whole-board timing on the host.
//!
//! A `Bench` wires the timer model, the fast-tick scheduler, the SSR driver
//! and the control service together the way the interrupt glue and the
//! foreground loop do on the device, then feeds it mains edges.

use core::cell::RefCell;
use std::collections::VecDeque;

use critical_section::Mutex;

use reflow::app::commands::ModeCommand;
use reflow::app::ports::{HeaterPort, IndicatorPort, TemperatureSource};
use reflow::app::service::ControlService;
use reflow::config::SystemConfig;
use reflow::drivers::ssr::{HeaterCell, HeaterMutex, SsrDriver};
use reflow::error::SensorError;
use reflow::fsm::OperatingMode;
use reflow::scheduler::{ButtonLevels, PhaseTimer, Scheduler, TickPort, TimerModel};
use reflow::sensors::{TemperatureSample, ThermocoupleFault};
use reflow::shared::SharedState;

use super::mock_hw::{sample_deg, sample_fault, Journal, MockPid, MockProfile, RecordingSink};

/// Timer ticks per 50 Hz half-cycle at 1 MHz.
const HALF_CYCLE_TICKS: u32 = 10_000;

// ── Ports ─────────────────────────────────────────────────────

/// What the fast tick sees: the shared heater plus scripted buttons.
struct BenchTickPort<'a> {
    heater: HeaterCell<'a, SsrDriver>,
    /// Levels returned by successive samples; released once drained.
    buttons: VecDeque<ButtonLevels>,
    buzzer: Vec<bool>,
}

impl TickPort for BenchTickPort<'_> {
    fn update_heater(&mut self) {
        self.heater.update();
    }

    fn sample_buttons(&mut self) -> ButtonLevels {
        self.buttons.pop_front().unwrap_or(ButtonLevels::RELEASED)
    }

    fn set_buzzer(&mut self, on: bool) {
        self.buzzer.push(on);
    }
}

/// What the foreground sees: a fixed sample and the same shared heater.
struct BenchHardware<'a> {
    heater: HeaterCell<'a, SsrDriver>,
    samples: VecDeque<TemperatureSample>,
    steady: TemperatureSample,
}

impl TemperatureSource for BenchHardware<'_> {
    fn acquire(&mut self) -> Result<TemperatureSample, SensorError> {
        Ok(self.samples.pop_front().unwrap_or(self.steady))
    }
}

impl HeaterPort for BenchHardware<'_> {
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

impl IndicatorPort for BenchHardware<'_> {
    fn set_led(&mut self, _on: bool) {}
}

// ── Bench ─────────────────────────────────────────────────────

struct Bench<'a> {
    timer: TimerModel,
    scheduler: Scheduler,
    tick_port: BenchTickPort<'a>,
    hw: BenchHardware<'a>,
    svc: ControlService<MockPid, MockProfile>,
    sink: RecordingSink,
    shared: SharedState,
    /// Run the foreground after every fast tick.
    serviced: bool,
    fast_ticks: u32,
}

impl<'a> Bench<'a> {
    fn new(heater: &'a HeaterMutex<SsrDriver>, pid_output: u8, profile_length: u32) -> Self {
        let config = SystemConfig::default();
        let journal = Journal::default();
        let mut bench = Self {
            timer: TimerModel::new(config.timer()),
            scheduler: Scheduler::new(&config),
            tick_port: BenchTickPort {
                heater: HeaterCell::new(heater),
                buttons: VecDeque::new(),
                buzzer: Vec::new(),
            },
            hw: BenchHardware {
                heater: HeaterCell::new(heater),
                samples: VecDeque::new(),
                steady: sample_deg(25),
            },
            svc: ControlService::new(
                config,
                MockPid::new(journal.clone(), pid_output),
                MockProfile::new(journal, profile_length),
            ),
            sink: RecordingSink::new(),
            shared: SharedState::new(),
            serviced: true,
            fast_ticks: 0,
        };
        bench.hw.setup();
        bench.svc.start(&bench.shared, &mut bench.hw, &mut bench.sink);
        bench
    }

    fn fast_tick(&mut self) {
        self.fast_ticks += 1;
        self.scheduler.fast_tick(&self.shared, &mut self.tick_port);
        if self.serviced {
            self.foreground();
        }
    }

    fn foreground(&mut self) {
        if self.shared.slow_tick.take() {
            self.svc.slow_tick(&self.shared, &mut self.hw, &mut self.sink);
        }
        self.svc.foreground(&self.shared, &mut self.hw, &mut self.sink);
    }

    /// One mains half-cycle: edge resets the counter, then the timer runs.
    fn half_cycle(&mut self) {
        self.timer.reset_counter();
        for _ in 0..self.timer.advance(HALF_CYCLE_TICKS) {
            self.fast_tick();
        }
    }

    fn half_cycles(&mut self, n: u32) {
        for _ in 0..n {
            self.half_cycle();
        }
    }

    fn conducted(&self) -> (u32, u32) {
        self.hw.heater.inspect(|h| h.duty_counters())
    }
}

fn heater() -> HeaterMutex<SsrDriver> {
    Mutex::new(RefCell::new(SsrDriver::new()))
}

// ── Timing ────────────────────────────────────────────────────

#[test]
fn one_fast_tick_per_mains_half_cycle() {
    let cell = heater();
    let mut b = Bench::new(&cell, 0, 1_000);
    b.half_cycles(100);
    assert_eq!(b.fast_ticks, 100);
    assert_eq!(b.scheduler.fast_ticks(), 100);
}

#[test]
fn control_runs_at_four_hertz_on_50hz_mains() {
    let cell = heater();
    let mut b = Bench::new(&cell, 0, 1_000);
    // Two seconds of mains.
    b.half_cycles(200);
    assert_eq!(b.svc.updates(), 8);
    assert_eq!(b.shared.slow_tick.overruns(), 0);
}

#[test]
fn free_running_timer_keeps_ticking_without_mains() {
    let cell = heater();
    let mut b = Bench::new(&cell, 0, 1_000);
    let period = SystemConfig::default().timer_period_ticks;
    let events = b.timer.advance(period * 50);
    assert!((49..=50).contains(&events), "got {events}");
}

#[test]
fn stalled_foreground_drops_slow_ticks() {
    let cell = heater();
    let mut b = Bench::new(&cell, 0, 1_000);
    b.serviced = false;
    b.half_cycles(60);
    assert_eq!(b.shared.slow_tick.overruns(), 1);

    // The pending tick is still there; the dropped one is gone.
    b.foreground();
    assert_eq!(b.svc.updates(), 1);
    b.foreground();
    assert_eq!(b.svc.updates(), 1);
}

// ── Buttons ───────────────────────────────────────────────────

#[test]
fn debounced_press_reaches_the_service() {
    let cell = heater();
    let mut b = Bench::new(&cell, 0, 1_000);
    let pressed = ButtonLevels {
        primary: false,
        secondary: true,
    };
    b.tick_port.buttons.extend([pressed, pressed, pressed]);

    // 3 presses at one sample per 3 fast ticks, then the release edge.
    b.half_cycles(12);
    assert_eq!(b.svc.context().profile_index, 1);
    assert_eq!(b.svc.mode(), OperatingMode::Idle);
}

#[test]
fn primary_press_starts_a_run_at_the_next_update() {
    let cell = heater();
    let mut b = Bench::new(&cell, 0, 1_000);
    b.tick_port.buttons.push_back(ButtonLevels {
        primary: true,
        secondary: false,
    });
    b.half_cycles(6);
    assert_eq!(b.svc.mode(), OperatingMode::Idle);
    assert_eq!(b.shared.command.take(), Some(ModeCommand::Go.code()));

    b.shared.command.post(ModeCommand::Go);
    b.half_cycles(25);
    assert_eq!(b.svc.mode(), OperatingMode::Run);
}

// ── Heater ────────────────────────────────────────────────────

#[test]
fn pid_command_sets_ssr_duty() {
    let cell = heater();
    let mut b = Bench::new(&cell, 128, 1_000);
    b.shared.command.post(ModeCommand::Go);
    // First update applies the command and loads 128 into the SSR.
    b.half_cycles(25);
    assert_eq!(b.svc.mode(), OperatingMode::Run);
    let (seen, on) = b.conducted();

    b.half_cycles(510);
    let (seen_after, on_after) = b.conducted();
    assert_eq!(seen_after - seen, 510);
    let conducted = on_after - on;
    assert!((250..=262).contains(&conducted), "got {conducted}");
}

#[test]
fn sensor_fault_stops_conduction_at_the_next_half_cycle() {
    let cell = heater();
    let mut b = Bench::new(&cell, 255, 1_000);
    b.shared.command.post(ModeCommand::Go);
    b.half_cycles(50);
    assert!(b.hw.heater.inspect(|h| h.is_conducting()));

    b.hw.samples.push_back(sample_fault(ThermocoupleFault::OpenCircuit));
    b.half_cycles(25);
    assert_eq!(b.svc.mode(), OperatingMode::Fault);
    let (_, on) = b.conducted();

    b.half_cycles(100);
    assert_eq!(b.conducted().1, on);
    assert!(b.hw.heater.inspect(|h| h.is_faulted()));

    b.shared.command.post(ModeCommand::Reset);
    b.half_cycles(25);
    assert_eq!(b.svc.mode(), OperatingMode::Idle);
    assert!(!b.hw.heater.inspect(|h| h.is_faulted()));
}

// ── Buzzer ────────────────────────────────────────────────────

#[test]
fn completion_beeps_four_times_and_ends_silent() {
    let cell = heater();
    let mut b = Bench::new(&cell, 0, 1);
    b.shared.command.post(ModeCommand::Go);
    b.half_cycles(25);
    assert_eq!(b.svc.mode(), OperatingMode::Done);
    assert_eq!(b.shared.buzzer.remaining(), 8);

    b.half_cycles(25 * 10);
    assert_eq!(
        b.tick_port.buzzer,
        vec![true, false, true, false, true, false, true, false]
    );
    assert_eq!(b.shared.buzzer.remaining(), 0);
}
