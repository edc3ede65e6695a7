//! Shared mutable context threaded through every FSM handler.
//!
//! `ControlContext` is the single struct that state handlers read from and
//! write to: setpoint and profile progress, the latest sample, manual-mode
//! selection, fault cause and the display/status dirty flags.  Handlers
//! never call a port; anything that needs one (resetting the PID, killing
//! the heater, arming the buzzer) is posted to [`ControlRequests`] and
//! applied by the service right after the transition.

use crate::app::ports::{PidTerms, ProfileProgress};
use crate::config::SystemConfig;
use crate::sensors::thermocouple::{TemperatureSample, ThermocoupleFault};

use super::OperatingMode;

// ---------------------------------------------------------------------------
// Fault cause
// ---------------------------------------------------------------------------

/// Why the machine is in `Fault`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultCause {
    /// The converter reported a wiring fault.
    Sensor(ThermocoupleFault),
    /// No frame could be read from the converter.
    Bus,
    /// A command slot held an unknown code.
    InvalidCommand(u8),
}

// ---------------------------------------------------------------------------
// Indicators and dirty flags
// ---------------------------------------------------------------------------

/// Status LED behaviour requested by the current mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedMode {
    Off,
    On,
    /// Toggled once per control update.
    Blink,
}

/// Display areas that need redrawing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DisplayDirty {
    /// Mode name, top-left.
    pub mode: bool,
    /// Current temperature, top-right.
    pub temperature: bool,
    /// Second row: profile / progress / fault text.
    pub detail: bool,
}

impl DisplayDirty {
    pub const ALL: Self = Self {
        mode: true,
        temperature: true,
        detail: true,
    };

    pub fn any(&self) -> bool {
        self.mode || self.temperature || self.detail
    }
}

// ---------------------------------------------------------------------------
// Requests (written by handlers; applied by the service)
// ---------------------------------------------------------------------------

/// Side effects a handler asks for.  Cleared by the service once applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControlRequests {
    /// Rewind the profile sequencer to this profile.
    pub select_profile: Option<u8>,
    /// Clear PID history.
    pub reset_pid: bool,
    /// Force the heater off now.
    pub heater_off: bool,
    /// Re-arm the heater after a fault.
    pub heater_rearm: bool,
    /// Start a buzzer countdown.
    pub buzzer: Option<u8>,
}

impl ControlRequests {
    pub fn take(&mut self) -> Self {
        core::mem::take(self)
    }
}

// ---------------------------------------------------------------------------
// ControlContext
// ---------------------------------------------------------------------------

/// The shared context passed to every state handler function.
pub struct ControlContext {
    // -- Setpoint --
    /// Target, step and time-to-target.  `progress.target` is the setpoint
    /// in every mode.
    pub progress: ProfileProgress,

    // -- Measurement --
    /// Hot junction of the latest sample (sentinel when faulted).
    pub temperature: i16,
    pub sample: Option<TemperatureSample>,

    // -- Output --
    /// Last heater command (0–255).
    pub heater: u8,
    pub pid_terms: PidTerms,

    // -- Timing --
    /// Control updates since boot.
    pub elapsed: u16,

    // -- Profile selection --
    /// Selected slot; `profile_count` is the manual-control slot.
    pub profile_index: u8,
    pub profile_count: u8,
    pub profile_steps: u8,

    // -- Manual control --
    /// Primary button in Idle starts Manual instead of Run.
    pub manual_select: bool,
    /// Proposed manual setpoint (0.25 °C).
    pub manual_target: i16,
    /// `manual_target` differs from the setpoint and awaits confirmation.
    pub manual_pending: bool,

    // -- Pause --
    /// Mode a Resume returns to.
    pub paused_from: OperatingMode,

    // -- Fault --
    pub fault: Option<FaultCause>,

    // -- Presentation --
    pub dirty: DisplayDirty,
    pub status_pending: bool,
    pub led: LedMode,
    /// Current blink phase.
    pub led_on: bool,

    pub requests: ControlRequests,

    // -- Configuration --
    pub config: SystemConfig,
}

impl ControlContext {
    pub fn new(config: SystemConfig) -> Self {
        Self {
            progress: ProfileProgress::default(),
            temperature: 0,
            sample: None,
            heater: 0,
            pid_terms: PidTerms::default(),
            elapsed: 0,
            profile_index: 0,
            profile_count: 0,
            profile_steps: 0,
            manual_select: false,
            manual_target: 0,
            manual_pending: false,
            paused_from: OperatingMode::Run,
            fault: None,
            dirty: DisplayDirty::default(),
            status_pending: false,
            led: LedMode::Off,
            led_on: false,
            requests: ControlRequests::default(),
            config,
        }
    }

    pub fn target(&self) -> i16 {
        self.progress.target
    }

    pub fn set_target(&mut self, target: i16) {
        self.progress.target = target;
    }

    /// The manual slot is selected in Idle.
    pub fn manual_slot_selected(&self) -> bool {
        self.profile_index >= self.profile_count
    }

    pub fn mark_all_dirty(&mut self) {
        self.dirty = DisplayDirty::ALL;
    }
}
