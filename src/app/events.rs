//! Outbound application events.
//!
//! The [`ControlService`](super::service::ControlService) emits these
//! through the [`EventSink`](super::ports::EventSink) port.  Adapters on
//! the other side decide what to do with them: draw on the character
//! display, write to the serial link, or log.

use heapless::String;

use crate::fsm::context::FaultCause;
use crate::fsm::OperatingMode;

/// One display area's text.  16 columns, but `°` takes two bytes.
pub type DisplayText = String<32>;

/// One serial status line, without the trailing newline.
pub type StatusLine = String<64>;

/// Regions of the 16×2 character display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayArea {
    /// Row 0, columns 0–7.
    Mode,
    /// Row 0, columns 8–15.
    Temperature,
    /// Row 1.
    Detail,
}

impl DisplayArea {
    /// `(column, row)` of the area's first cell.
    pub const fn origin(self) -> (u8, u8) {
        match self {
            Self::Mode => (0, 0),
            Self::Temperature => (8, 0),
            Self::Detail => (0, 1),
        }
    }
}

/// Structured events emitted by the control core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    /// The service has started (carries the initial mode).
    Started(OperatingMode),

    /// The state machine changed mode.
    ModeChanged {
        from: OperatingMode,
        to: OperatingMode,
    },

    /// The machine was forced into Fault.
    FaultDetected(FaultCause),

    /// Redraw one display area.
    Display { area: DisplayArea, text: DisplayText },

    /// Periodic status record for the host.
    Status(StatusLine),
}
