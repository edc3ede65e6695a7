//! Function-pointer finite state machine engine.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │  StateTable                                                      │
//! │  ┌─────────┬──────────┬─────────┬──────────────────┬───────────┐ │
//! │  │ Mode    │ on_enter │ on_exit │ on_command       │ on_update │ │
//! │  ├─────────┼──────────┼─────────┼──────────────────┼───────────┤ │
//! │  │ Fault   │ fn(ctx)  │ fn(ctx) │ fn(ctx,cmd)->Opt │ fn(ctx)   │ │
//! │  │ Idle    │ fn(ctx)  │    —    │ fn(ctx,cmd)->Opt │ fn(ctx)   │ │
//! │  │ Run     │ fn(ctx)  │    —    │ fn(ctx,cmd)->Opt │ fn(ctx)   │ │
//! │  │ Done    │ fn(ctx)  │    —    │ fn(ctx,cmd)->Opt │ fn(ctx)   │ │
//! │  │ Pause   │ fn(ctx)  │    —    │ fn(ctx,cmd)->Opt │ fn(ctx)   │ │
//! │  │ Manual  │ fn(ctx)  │ fn(ctx) │ fn(ctx,cmd)->Opt │ fn(ctx)   │ │
//! │  └─────────┴──────────┴─────────┴──────────────────┴───────────┘ │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `on_command` decides what a decoded [`ModeCommand`] does in the current
//! mode; returning `Some(next)` runs `on_exit(current)` then
//! `on_enter(next)`.  A command may re-enter the current mode (Reset in
//! Idle), which runs both actions again.  `on_update` is the per-pass
//! steady-state hook.  Event-driven transitions (sensor fault, profile
//! completion) go through [`Fsm::force_transition`].

pub mod buttons;
pub mod context;
pub mod states;

use context::ControlContext;
use log::info;

use crate::app::commands::ModeCommand;

// ---------------------------------------------------------------------------
// Mode identity
// ---------------------------------------------------------------------------

/// Top-level operating modes.
/// Must stay in sync with the table built in [`states::build_state_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OperatingMode {
    Fault = 0,
    Idle = 1,
    Run = 2,
    Done = 3,
    Pause = 4,
    Manual = 5,
}

impl OperatingMode {
    pub const COUNT: usize = 6;

    pub const ALL: [Self; Self::COUNT] = [
        Self::Fault,
        Self::Idle,
        Self::Run,
        Self::Done,
        Self::Pause,
        Self::Manual,
    ];

    /// Convert an index back to a mode.  Out of range asserts in debug
    /// builds and yields `Fault` in release.
    pub fn from_index(idx: usize) -> Self {
        match Self::ALL.get(idx) {
            Some(mode) => *mode,
            None => {
                debug_assert!(false, "invalid mode index: {idx}");
                Self::Fault
            }
        }
    }

    /// Short name for logs and status lines.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Fault => "Fault",
            Self::Idle => "Idle",
            Self::Run => "Run",
            Self::Done => "Done",
            Self::Pause => "Pause",
            Self::Manual => "Manual",
        }
    }
}

// ---------------------------------------------------------------------------
// Function-pointer type aliases
// ---------------------------------------------------------------------------

/// Signature for `on_enter` and `on_exit` actions.
pub type StateActionFn = fn(&mut ControlContext);

/// Command handler.  Returns `Some(next)` to transition.
pub type CommandFn = fn(&mut ControlContext, ModeCommand) -> Option<OperatingMode>;

/// Per-pass steady-state handler.
pub type StateUpdateFn = fn(&mut ControlContext);

// ---------------------------------------------------------------------------
// State descriptor (one row in the table)
// ---------------------------------------------------------------------------

pub struct StateDescriptor {
    pub id: OperatingMode,
    pub name: &'static str,
    pub on_enter: Option<StateActionFn>,
    pub on_exit: Option<StateActionFn>,
    pub on_command: CommandFn,
    pub on_update: StateUpdateFn,
}

// ---------------------------------------------------------------------------
// FSM engine
// ---------------------------------------------------------------------------

pub struct Fsm {
    table: [StateDescriptor; OperatingMode::COUNT],
    current: usize,
    transitions: u32,
}

impl Fsm {
    pub fn new(table: [StateDescriptor; OperatingMode::COUNT], initial: OperatingMode) -> Self {
        Self {
            table,
            current: initial as usize,
            transitions: 0,
        }
    }

    /// Run the initial `on_enter`.  Call once before anything else.
    pub fn start(&mut self, ctx: &mut ControlContext) {
        info!("FSM starting in mode: {}", self.table[self.current].name);
        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }

    /// Apply a decoded command.  Returns `true` if a transition ran.
    pub fn handle_command(&mut self, command: ModeCommand, ctx: &mut ControlContext) -> bool {
        match (self.table[self.current].on_command)(ctx, command) {
            Some(next) => {
                self.transition(next, ctx);
                true
            }
            None => {
                info!(
                    "FSM: {:?} ignored in {}",
                    command, self.table[self.current].name
                );
                false
            }
        }
    }

    /// Steady-state pass for the current mode.
    pub fn update(&mut self, ctx: &mut ControlContext) {
        (self.table[self.current].on_update)(ctx);
    }

    /// Jump to `next` unless already there (sensor fault, completion).
    pub fn force_transition(&mut self, next: OperatingMode, ctx: &mut ControlContext) {
        if next as usize != self.current {
            self.transition(next, ctx);
        }
    }

    pub fn current_mode(&self) -> OperatingMode {
        OperatingMode::from_index(self.current)
    }

    /// Transitions since start, self-transitions included.
    pub fn transitions(&self) -> u32 {
        self.transitions
    }

    fn transition(&mut self, next: OperatingMode, ctx: &mut ControlContext) {
        let next_idx = next as usize;

        info!(
            "FSM transition: {} -> {}",
            self.table[self.current].name, self.table[next_idx].name
        );

        if let Some(exit) = self.table[self.current].on_exit {
            exit(ctx);
        }

        self.current = next_idx;
        self.transitions = self.transitions.wrapping_add(1);

        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }
}
