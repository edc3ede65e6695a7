//! Display and status-line text.
//!
//! Pure formatting over [`ControlContext`]; the service decides when to
//! render and the sinks decide where the text goes.

use core::fmt::{self, Write};

use heapless::String;

use super::events::{DisplayText, StatusLine};
use crate::fsm::context::{ControlContext, FaultCause};
use crate::fsm::OperatingMode;
use crate::sensors::thermocouple::ThermocoupleFault;

/// Idle second-row labels, one per selectable slot.
const PROFILE_LABELS: [&str; 4] = ["1.Lead", "2.Lead (KESTER)", "3.Lead-free", "4.Manual control"];

/// Mode names padded to the 8-column mode area.
pub const fn mode_label(mode: OperatingMode) -> &'static str {
    match mode {
        OperatingMode::Fault => "Fault   ",
        OperatingMode::Idle => "Idle    ",
        OperatingMode::Run => "Run     ",
        OperatingMode::Done => "Done    ",
        OperatingMode::Pause => "Pause   ",
        OperatingMode::Manual => "Manual  ",
    }
}

pub const fn fault_text(cause: FaultCause) -> &'static str {
    match cause {
        FaultCause::Sensor(ThermocoupleFault::OpenCircuit) => "TH.COUPLE OPEN!",
        FaultCause::Sensor(ThermocoupleFault::ShortToGround) => "TH.COUPLE SHRT G",
        FaultCause::Sensor(ThermocoupleFault::ShortToSupply) => "TH.COUPLE SHRT +",
        FaultCause::Bus => "TH.COUPLE BUS!",
        FaultCause::InvalidCommand(_) => "BAD COMMAND",
    }
}

/// Format into a fixed-capacity string, truncating on overflow.
fn format<const N: usize>(args: fmt::Arguments<'_>) -> String<N> {
    let mut s = String::new();
    // Overflow only drops the tail of the text.
    let _ = s.write_fmt(args);
    s
}

pub fn mode_text(mode: OperatingMode) -> DisplayText {
    format(format_args!("{}", mode_label(mode)))
}

/// Current temperature, whole degrees.  Dashes while faulted.
pub fn temperature_text(mode: OperatingMode, ctx: &ControlContext) -> DisplayText {
    if mode == OperatingMode::Fault {
        format(format_args!("--°C"))
    } else {
        format(format_args!("{}°C", ctx.temperature >> 2))
    }
}

/// Second display row.
pub fn detail_text(mode: OperatingMode, ctx: &ControlContext) -> DisplayText {
    match mode {
        OperatingMode::Idle => {
            let label = PROFILE_LABELS
                .get(usize::from(ctx.profile_index))
                .copied()
                .unwrap_or("UNKNOWN PROFILE");
            format(format_args!("{label}"))
        }
        OperatingMode::Fault => match ctx.fault {
            Some(cause) => format(format_args!("{}", fault_text(cause))),
            None => DisplayText::new(),
        },
        OperatingMode::Pause => format(format_args!("R stop, G resume")),
        OperatingMode::Manual if ctx.manual_pending => format(format_args!(
            "{}°C->{}°C?",
            ctx.target() >> 2,
            ctx.manual_target >> 2
        )),
        OperatingMode::Manual => format(format_args!("Target: {}°C", ctx.target() >> 2)),
        OperatingMode::Run => format(format_args!(
            "{}/{} {}s {}°C",
            ctx.progress.step,
            ctx.profile_steps,
            ctx.progress.time_to_target,
            ctx.target() >> 2
        )),
        OperatingMode::Done => DisplayText::new(),
    }
}

/// Serial status record.  Only Run and Manual report.
pub fn status_line(mode: OperatingMode, ctx: &ControlContext) -> Option<StatusLine> {
    match mode {
        OperatingMode::Run => Some(format(format_args!(
            "{},{},{},{},{},{},{}",
            mode.name(),
            ctx.progress.step,
            ctx.elapsed,
            ctx.temperature,
            ctx.progress.time_to_target,
            ctx.target(),
            ctx.heater
        ))),
        OperatingMode::Manual => Some(format(format_args!(
            "{},{},{},{},{},{},{}",
            ctx.elapsed,
            ctx.temperature,
            ctx.target(),
            ctx.heater,
            ctx.pid_terms.error,
            ctx.pid_terms.derivative,
            ctx.pid_terms.integral
        ))),
        _ => None,
    }
}
