//! State shared between the interrupt handlers and the foreground loop.
//!
//! Every field has exactly one writer per bit of meaning and one reader.
//! Nothing here takes a lock; each cell is a single atomic and the
//! read-modify-write operations are the synchronisation.
//!
//! ```text
//! ┌──────────────┐  latch bits   ┌──────────────┐  take bits   ┌──────────────┐
//! │  Fast tick   │──────────────▶│ ButtonLatch  │─────────────▶│  Foreground  │
//! │  (timer ISR) │  raise        │ SlowTick     │  take        │  main loop   │
//! │              │──────────────▶│              │─────────────▶│              │
//! │              │  step         │ Buzzer       │  arm         │              │
//! │              │◀──────────────│              │◀─────────────│              │
//! └──────────────┘               │ CommandSlot  │◀── post ─────│ buttons/UART │
//!                                └──────────────┘              └──────────────┘
//! ```
//!
//! The cells are grouped in [`SharedState`]; firmware uses the [`SHARED`]
//! static, tests build their own instance.

use core::sync::atomic::{AtomicBool, AtomicU8, AtomicU32, Ordering};

use crate::app::commands::ModeCommand;

/// The two front-panel buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Button {
    /// Red button: start / pause / reset / confirm.
    Primary = 0b01,
    /// Green button: profile select / resume / manual increment.
    Secondary = 0b10,
}

impl Button {
    pub const fn mask(self) -> u8 {
        self as u8
    }
}

// ── Button latch ──────────────────────────────────────────────

/// Sticky "event pending" bit per button.
///
/// Set only by the fast tick, cleared only by the foreground.
pub struct ButtonLatch(AtomicU8);

impl ButtonLatch {
    pub const fn new() -> Self {
        Self(AtomicU8::new(0))
    }

    /// Post a press-and-release event.  Safe from ISR context.
    pub fn latch(&self, button: Button) {
        self.0.fetch_or(button.mask(), Ordering::Release);
    }

    /// Read-and-clear one button's pending bit.
    pub fn take(&self, button: Button) -> bool {
        self.0.fetch_and(!button.mask(), Ordering::AcqRel) & button.mask() != 0
    }

    /// Peek without clearing.
    pub fn is_pending(&self, button: Button) -> bool {
        self.0.load(Ordering::Acquire) & button.mask() != 0
    }
}

// ── Command slot ──────────────────────────────────────────────

/// Single pending mode command.  `0` = empty.
///
/// A newer command overwrites an unconsumed older one; the slot is drained
/// at most once per control update.  Raw codes are kept so a corrupted code
/// from the serial link reaches the state machine and faults it.
pub struct CommandSlot(AtomicU8);

impl CommandSlot {
    pub const fn new() -> Self {
        Self(AtomicU8::new(0))
    }

    pub fn post(&self, command: ModeCommand) {
        self.post_raw(command.code());
    }

    /// Post an undecoded command code (serial link path).
    pub fn post_raw(&self, code: u8) {
        self.0.store(code, Ordering::Release);
    }

    /// Take the pending code, leaving the slot empty.
    pub fn take(&self) -> Option<u8> {
        match self.0.swap(0, Ordering::AcqRel) {
            0 => None,
            code => Some(code),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.load(Ordering::Acquire) == 0
    }
}

// ── Slow tick signal ──────────────────────────────────────────

/// "Control update due" flag raised by the fast tick.
///
/// Raising while the previous update is still pending drops the tick and
/// counts an overrun; ticks are never queued.
pub struct SlowTickSignal {
    pending: AtomicBool,
    overruns: AtomicU32,
}

impl SlowTickSignal {
    pub const fn new() -> Self {
        Self {
            pending: AtomicBool::new(false),
            overruns: AtomicU32::new(0),
        }
    }

    /// Called from the fast tick.  Returns `false` if the tick overran.
    pub fn raise(&self) -> bool {
        if self.pending.swap(true, Ordering::AcqRel) {
            self.overruns.fetch_add(1, Ordering::Relaxed);
            false
        } else {
            true
        }
    }

    /// Called from the foreground.  `true` if an update is due.
    pub fn take(&self) -> bool {
        self.pending.swap(false, Ordering::AcqRel)
    }

    /// Total dropped slow ticks since boot.
    pub fn overruns(&self) -> u32 {
        self.overruns.load(Ordering::Relaxed)
    }
}

// ── Buzzer countdown ──────────────────────────────────────────

/// Remaining buzzer half-periods, stepped once per slow tick by the ISR.
pub struct BuzzerCountdown(AtomicU8);

impl BuzzerCountdown {
    pub const fn new() -> Self {
        Self(AtomicU8::new(0))
    }

    /// Foreground: (re)start the countdown.
    pub fn arm(&self, ticks: u8) {
        self.0.store(ticks, Ordering::Release);
    }

    /// ISR: decrement if active and return the count *before* the
    /// decrement, or `None` when idle.
    pub fn step(&self) -> Option<u8> {
        self.0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .ok()
    }

    pub fn remaining(&self) -> u8 {
        self.0.load(Ordering::Acquire)
    }
}

// ── Aggregate ─────────────────────────────────────────────────

/// All cross-context state in one place.
pub struct SharedState {
    pub buttons: ButtonLatch,
    pub command: CommandSlot,
    pub slow_tick: SlowTickSignal,
    pub buzzer: BuzzerCountdown,
}

impl SharedState {
    pub const fn new() -> Self {
        Self {
            buttons: ButtonLatch::new(),
            command: CommandSlot::new(),
            slow_tick: SlowTickSignal::new(),
            buzzer: BuzzerCountdown::new(),
        }
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}

/// Firmware instance, reachable from the interrupt handlers.
pub static SHARED: SharedState = SharedState::new();
