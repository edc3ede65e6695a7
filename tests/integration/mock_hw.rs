//! Mock hardware and collaborators for integration tests.
//!
//! Every mock appends to one shared [`Journal`] so tests can assert on the
//! exact order of calls across the heater, the PID law and the profile
//! sequencer without touching real GPIO or SPI.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use reflow::app::events::AppEvent;
use reflow::app::ports::{
    EventSink, HeaterPort, IndicatorPort, PidGains, PidPort, PidTerms, ProfilePort, ProfileProgress,
    TemperatureSource,
};
use reflow::error::SensorError;
use reflow::sensors::{TemperatureSample, ThermocoupleFault};

// ── Call journal ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    Acquire,
    HeaterSetup,
    HeaterSet(u8),
    HeaterFault,
    HeaterClearFault,
    Led(bool),
    PidReset,
    PidUpdate { current: i16, target: i16 },
    ProfileReset(u8),
    ProfileUpdate,
}

#[derive(Clone, Default)]
pub struct Journal(Rc<RefCell<Vec<Call>>>);

#[allow(dead_code)]
impl Journal {
    pub fn push(&self, call: Call) {
        self.0.borrow_mut().push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.0.borrow().clone()
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }

    pub fn position(&self, pred: impl Fn(&Call) -> bool) -> Option<usize> {
        self.0.borrow().iter().position(pred)
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.0.borrow().iter().filter(|c| pred(c)).count()
    }
}

// ── Samples ───────────────────────────────────────────────────

/// Normal sample at `deg` whole degrees.
pub fn sample_deg(deg: i16) -> TemperatureSample {
    TemperatureSample {
        hot: deg * 4,
        cold: 25 * 16,
        fault: None,
    }
}

pub fn sample_fault(fault: ThermocoupleFault) -> TemperatureSample {
    TemperatureSample {
        hot: fault.sentinel(),
        cold: 25 * 16,
        fault: Some(fault),
    }
}

// ── MockHardware ──────────────────────────────────────────────

/// Temperature source + heater + LED.
pub struct MockHardware {
    journal: Journal,
    /// Queued acquisitions; once empty, `steady` is returned.
    pub queue: VecDeque<Result<TemperatureSample, SensorError>>,
    pub steady: TemperatureSample,
    pub command: u8,
    pub faulted: bool,
    pub led: bool,
}

#[allow(dead_code)]
impl MockHardware {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            queue: VecDeque::new(),
            steady: sample_deg(25),
            command: 0,
            faulted: false,
            led: false,
        }
    }

    pub fn push_sample(&mut self, sample: TemperatureSample) {
        self.queue.push_back(Ok(sample));
    }

    pub fn push_bus_error(&mut self) {
        self.queue.push_back(Err(SensorError::Bus));
    }

    /// Heater output that would actually be applied.
    pub fn effective_command(&self) -> u8 {
        if self.faulted {
            0
        } else {
            self.command
        }
    }
}

impl TemperatureSource for MockHardware {
    fn acquire(&mut self) -> Result<TemperatureSample, SensorError> {
        self.journal.push(Call::Acquire);
        self.queue.pop_front().unwrap_or(Ok(self.steady))
    }
}

impl HeaterPort for MockHardware {
    fn setup(&mut self) {
        self.journal.push(Call::HeaterSetup);
        self.command = 0;
        self.faulted = false;
    }

    fn set(&mut self, command: u8) {
        self.journal.push(Call::HeaterSet(command));
        self.command = command;
    }

    fn update(&mut self) {}

    fn fault(&mut self) {
        self.journal.push(Call::HeaterFault);
        self.faulted = true;
    }

    fn clear_fault(&mut self) {
        self.journal.push(Call::HeaterClearFault);
        self.faulted = false;
    }
}

impl IndicatorPort for MockHardware {
    fn set_led(&mut self, on: bool) {
        // Only record changes; the service re-asserts every pass.
        if on != self.led {
            self.journal.push(Call::Led(on));
        }
        self.led = on;
    }
}

// ── MockPid ───────────────────────────────────────────────────

/// Records its inputs and returns a fixed command.  Its terms report the
/// error of the last update only.
pub struct MockPid {
    journal: Journal,
    pub output: u8,
    gains: PidGains,
    terms: PidTerms,
}

impl MockPid {
    pub fn new(journal: Journal, output: u8) -> Self {
        Self {
            journal,
            output,
            gains: PidGains { kp: 23, ki: 0, kd: 0 },
            terms: PidTerms::default(),
        }
    }
}

impl PidPort for MockPid {
    fn reset(&mut self) {
        self.journal.push(Call::PidReset);
    }

    fn update(&mut self, current: i16, target: i16) -> u8 {
        self.journal.push(Call::PidUpdate { current, target });
        self.terms.error = i32::from(target) - i32::from(current);
        self.output
    }

    fn terms(&self) -> PidTerms {
        self.terms
    }

    fn gains(&self) -> PidGains {
        self.gains
    }

    fn set_gains(&mut self, gains: PidGains) {
        self.gains = gains;
    }
}

// ── MockProfile ───────────────────────────────────────────────

/// Completes after `length` updates; the setpoint rises by `slope` per
/// update.  `buzz_at` arms the buzzer on that update (1-based).
pub struct MockProfile {
    journal: Journal,
    pub length: u32,
    pub slope: i16,
    pub buzz_at: Option<(u32, u8)>,
    pub selected: u8,
    updates: u32,
}

#[allow(dead_code)]
impl MockProfile {
    pub fn new(journal: Journal, length: u32) -> Self {
        Self {
            journal,
            length,
            slope: 0,
            buzz_at: None,
            selected: 0,
            updates: 0,
        }
    }

    pub fn updates(&self) -> u32 {
        self.updates
    }
}

impl ProfilePort for MockProfile {
    fn reset(&mut self, index: u8) {
        self.journal.push(Call::ProfileReset(index));
        self.selected = index;
        self.updates = 0;
    }

    fn update(&mut self, progress: &mut ProfileProgress) -> bool {
        self.journal.push(Call::ProfileUpdate);
        self.updates += 1;
        progress.target += self.slope;
        progress.step = 1;
        progress.time_to_target = self.length.saturating_sub(self.updates) as u16;
        if let Some((at, ticks)) = self.buzz_at {
            if at == self.updates {
                progress.buzzer = ticks;
            }
        }
        self.updates >= self.length
    }

    fn count(&self) -> u8 {
        3
    }

    fn steps(&self) -> u8 {
        5
    }
}

// ── RecordingSink ─────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn statuses(&self) -> Vec<String> {
        self.events
            .iter()
            .filter_map(|e| match e {
                AppEvent::Status(line) => Some(line.as_str().to_owned()),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}
