//! Mains-synchronised real-time scheduler.
//!
//! A hardware timer free-runs slightly slower than the mains half-cycle
//! rate.  Every zero-crossing edge resets its counter, so the fast tick
//! (the timer's compare event) lands at a fixed phase of every half-cycle
//! without a PLL.  Two slower rates are derived by counting fast ticks:
//!
//! ```text
//!  zero-cross ──▶ reset counter                       (ZC ISR, one write)
//!
//!  compare ─────▶ Scheduler::fast_tick                (timer ISR)
//!                 ├─ (a) heater update                every tick  ~99 Hz
//!                 ├─ (b) nesting point
//!                 ├─ (c) button sample + latch        every 3rd   ~33 Hz
//!                 └─ (d) slow tick signal + buzzer    every 25th  ~4 Hz
//!                                │
//!                                ▼
//!                     SlowTickSignal ──▶ foreground control update
//! ```
//!
//! The slow-rate "callback" only raises [`SlowTickSignal`]; the control
//! update itself runs in the foreground.  The divider is free-running: a
//! tick raised while the previous one is still pending is dropped and
//! counted, never queued.
//!
//! [`SlowTickSignal`]: crate::shared::SlowTickSignal

use crate::app::ports::ConfigError;
use crate::config::SystemConfig;
use crate::shared::{Button, SharedState};

// ═══════════════════════════════════════════════════════════════
//  Timer configuration
// ═══════════════════════════════════════════════════════════════

/// Tick timer parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerConfig {
    /// Counter clock (Hz).
    pub resolution_hz: u32,
    /// Free-running top; the counter wraps to 0 here.
    pub period_ticks: u32,
    /// Fast-tick event position, counted from the zero-cross reset.
    pub compare_ticks: u32,
}

impl TimerConfig {
    /// Free-running fast-tick rate (Hz) when no zero-cross edge arrives.
    pub fn fast_tick_hz(&self) -> f32 {
        self.resolution_hz as f32 / self.period_ticks as f32
    }

    /// Nominal fast-tick period in microseconds.
    pub fn period_us(&self) -> u32 {
        (u64::from(self.period_ticks) * 1_000_000 / u64::from(self.resolution_hz)) as u32
    }

    /// Counter value the zero-cross handler loads on timers that can only
    /// alarm at the top.  Puts the next alarm exactly `compare_ticks` after
    /// the edge, which is the same phase a compare-channel timer gives.
    pub fn zero_cross_preload(&self) -> u32 {
        self.period_ticks - self.compare_ticks
    }

    pub fn validate(&self, mains_hz: u8) -> Result<(), ConfigError> {
        if self.resolution_hz == 0 || self.period_ticks == 0 {
            return Err(ConfigError::ValidationFailed("timer resolution/period must be non-zero"));
        }
        if self.compare_ticks == 0 || self.compare_ticks >= self.period_ticks {
            return Err(ConfigError::ValidationFailed(
                "timer_compare_ticks must be within 1..timer_period_ticks",
            ));
        }
        let half_cycle_hz = 2.0 * f32::from(mains_hz);
        let hz = self.fast_tick_hz();
        // Must trail the mains so the edge always arrives first, but not by
        // so much that a missed edge shifts the phase by a visible amount.
        if hz >= half_cycle_hz || hz < 0.9 * half_cycle_hz {
            return Err(ConfigError::ValidationFailed(
                "timer must free-run within 90–100% of the half-cycle rate",
            ));
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════
//  Ports
// ═══════════════════════════════════════════════════════════════

/// Hardware the fast tick touches.  Implemented by the timer ISR glue on
/// the device and by recording mocks in tests.
pub trait TickPort {
    /// Per-half-cycle heater actuation.
    fn update_heater(&mut self);

    /// Nesting point: higher-priority interrupts may run from here on.
    /// Everything after this call only touches single-writer state.
    fn allow_nesting(&mut self) {}

    /// Current button levels (`true` = pressed).
    fn sample_buttons(&mut self) -> ButtonLevels;

    /// Drive the buzzer output.
    fn set_buzzer(&mut self, on: bool);
}

/// The counter the zero-cross handler resets.
pub trait PhaseTimer {
    /// Re-align the counter to the zero-cross edge.  Must be a single
    /// bounded write: its latency is the phase error of the whole schedule.
    fn reset_counter(&mut self);
}

/// Raw button levels at one sample instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ButtonLevels {
    pub primary: bool,
    pub secondary: bool,
}

impl ButtonLevels {
    pub const RELEASED: Self = Self {
        primary: false,
        secondary: false,
    };
}

// ═══════════════════════════════════════════════════════════════
//  Debounce
// ═══════════════════════════════════════════════════════════════

/// Two most recent samples of one button.
#[derive(Debug, Clone, Copy, Default)]
struct Debounce {
    previous: bool,
    current: bool,
}

impl Debounce {
    /// Shift in a sample; `true` on a pressed → released transition.
    fn sample(&mut self, pressed: bool) -> bool {
        self.previous = self.current;
        self.current = pressed;
        self.previous && !self.current
    }
}

// ═══════════════════════════════════════════════════════════════
//  Scheduler
// ═══════════════════════════════════════════════════════════════

/// What one fast tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub buttons_sampled: bool,
    pub slow_tick: bool,
    /// The slow tick fired while the previous one was still unserviced.
    pub overrun: bool,
}

/// Fast-tick state.  Owned exclusively by the timer interrupt.
pub struct Scheduler {
    button_divider: u8,
    button_countdown: u8,
    slow_divider: u8,
    slow_count: u8,
    primary: Debounce,
    secondary: Debounce,
    fast_ticks: u32,
}

impl Scheduler {
    pub fn new(config: &SystemConfig) -> Self {
        Self::with_dividers(config.button_sample_divider, config.slow_tick_divider)
    }

    pub fn with_dividers(button_divider: u8, slow_divider: u8) -> Self {
        Self {
            button_divider,
            button_countdown: button_divider,
            slow_divider,
            slow_count: 0,
            primary: Debounce::default(),
            secondary: Debounce::default(),
            fast_ticks: 0,
        }
    }

    /// The fast-tick handler body.
    pub fn fast_tick(&mut self, shared: &SharedState, port: &mut impl TickPort) -> TickReport {
        let mut report = TickReport::default();

        // (a) actuation stays on the mains cadence regardless of the slow rate
        port.update_heater();

        // (b)
        port.allow_nesting();
        self.fast_ticks = self.fast_ticks.wrapping_add(1);

        // (c)
        self.button_countdown -= 1;
        if self.button_countdown == 0 {
            let levels = port.sample_buttons();
            if self.primary.sample(levels.primary) {
                shared.buttons.latch(Button::Primary);
            }
            if self.secondary.sample(levels.secondary) {
                shared.buttons.latch(Button::Secondary);
            }
            self.button_countdown = self.button_divider;
            report.buttons_sampled = true;
        }

        // (d)
        self.slow_count += 1;
        if self.slow_count == self.slow_divider {
            self.slow_count = 0;
            report.slow_tick = true;
            report.overrun = !shared.slow_tick.raise();

            // Parity of the *remaining* count picks the level.
            if let Some(remaining) = shared.buzzer.step() {
                port.set_buzzer(remaining % 2 == 0);
            }
        }

        report
    }

    /// Fast ticks since boot (wrapping).
    pub fn fast_ticks(&self) -> u32 {
        self.fast_ticks
    }
}

// ═══════════════════════════════════════════════════════════════
//  Timer model
// ═══════════════════════════════════════════════════════════════

/// Behavioural model of the compare-channel tick timer.
///
/// Used by host simulation and tests to reproduce what the hardware does
/// between interrupts: the counter runs, wraps at the top, fires at the
/// compare point, and is zeroed by the zero-cross edge.
#[derive(Debug, Clone)]
pub struct TimerModel {
    config: TimerConfig,
    count: u32,
}

impl TimerModel {
    pub fn new(config: TimerConfig) -> Self {
        Self { config, count: 0 }
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    /// Run the counter for `ticks` clock cycles.  Returns the number of
    /// compare events (fast ticks) that fired.
    pub fn advance(&mut self, mut ticks: u32) -> u32 {
        let TimerConfig { period_ticks: top, compare_ticks: cmp, .. } = self.config;
        let mut events = 0;
        while ticks > 0 {
            let to_compare = if self.count < cmp {
                cmp - self.count
            } else {
                top - self.count + cmp
            };
            if ticks >= to_compare {
                ticks -= to_compare;
                self.count = cmp;
                events += 1;
            } else {
                self.count = (self.count + ticks) % top;
                ticks = 0;
            }
        }
        events
    }
}

impl PhaseTimer for TimerModel {
    fn reset_counter(&mut self) {
        self.count = 0;
    }
}

// ═══════════════════════════════════════════════════════════════
//  Timing budget
// ═══════════════════════════════════════════════════════════════

/// Tracks how long each control update takes against the fast-tick period.
///
/// The divider silently drops a slow tick if the foreground has not
/// finished the previous one, so the update has to stay well inside one
/// fast tick.  This makes that constraint measurable.
#[derive(Debug, Clone)]
pub struct TickBudget {
    budget_us: u32,
    worst_us: u32,
    exceeded: u32,
}

impl TickBudget {
    pub fn new(budget_us: u32) -> Self {
        Self {
            budget_us,
            worst_us: 0,
            exceeded: 0,
        }
    }

    /// Budget of one nominal fast-tick period.
    pub fn for_timer(timer: &TimerConfig) -> Self {
        Self::new(timer.period_us())
    }

    /// Record one update.  Returns `false` if it blew the budget.
    pub fn record(&mut self, elapsed_us: u32) -> bool {
        self.worst_us = self.worst_us.max(elapsed_us);
        if elapsed_us > self.budget_us {
            self.exceeded = self.exceeded.saturating_add(1);
            false
        } else {
            true
        }
    }

    pub fn budget_us(&self) -> u32 {
        self.budget_us
    }

    pub fn worst_us(&self) -> u32 {
        self.worst_us
    }

    pub fn exceeded(&self) -> u32 {
        self.exceeded
    }
}
