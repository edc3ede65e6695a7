//! Inbound mode commands.
//!
//! Commands reach the [`ControlService`](super::service::ControlService)
//! through the single-slot [`CommandSlot`](crate::shared::CommandSlot):
//! the front-panel buttons post decoded commands, the serial link posts
//! raw codes.  The slot carries the wire code so that a corrupted code is
//! still seen by the state machine and faults it.

/// Operator requests to change the operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ModeCommand {
    /// Return to Idle (leaves Fault, Done, Pause and Manual).
    Reset = 1,
    /// Start the selected profile.
    Go = 2,
    /// Hold the current target.
    Pause = 3,
    /// Continue from where the pause was issued.
    Resume = 4,
    /// Enter manual temperature control.
    Manual = 5,
}

impl ModeCommand {
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Decode a wire code.  `None` for anything outside `1..=5`.
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Reset),
            2 => Some(Self::Go),
            3 => Some(Self::Pause),
            4 => Some(Self::Resume),
            5 => Some(Self::Manual),
            _ => None,
        }
    }
}
