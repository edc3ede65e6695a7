//! Concrete mode handlers and table builder.
//!
//! ```text
//!          ┌──────── Reset ────────┐
//!          ▼                       │
//!   ──▶  IDLE ──Go──▶ RUN ──[profile complete]──▶ DONE
//!          │           │  ▲                        │
//!          │        Pause │Resume                Reset
//!          │           ▼  │                        │
//!          │          PAUSE ──Reset──▶ IDLE ◀──────┘
//!          │           ▲  │
//!        Manual    Pause │Resume
//!          │           │  ▼
//!          └───────▶ MANUAL ──Reset──▶ IDLE
//!
//!  any ──[sensor fault | bad command]──▶ FAULT ──Reset──▶ IDLE
//! ```

use log::{error, info};

use super::context::{ControlContext, LedMode};
use super::{OperatingMode, StateDescriptor};
use crate::app::commands::ModeCommand;

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

/// Build the static state table.  Called once at startup.
pub fn build_state_table() -> [StateDescriptor; OperatingMode::COUNT] {
    [
        // Index 0 — Fault
        StateDescriptor {
            id: OperatingMode::Fault,
            name: "Fault",
            on_enter: Some(fault_enter),
            on_exit: Some(fault_exit),
            on_command: fault_command,
            on_update: hold_zero_target,
        },
        // Index 1 — Idle
        StateDescriptor {
            id: OperatingMode::Idle,
            name: "Idle",
            on_enter: Some(idle_enter),
            on_exit: None,
            on_command: idle_command,
            on_update: no_update,
        },
        // Index 2 — Run
        StateDescriptor {
            id: OperatingMode::Run,
            name: "Run",
            on_enter: Some(run_enter),
            on_exit: None,
            on_command: run_command,
            on_update: no_update,
        },
        // Index 3 — Done
        StateDescriptor {
            id: OperatingMode::Done,
            name: "Done",
            on_enter: Some(done_enter),
            on_exit: None,
            on_command: reset_only,
            on_update: hold_zero_target,
        },
        // Index 4 — Pause
        StateDescriptor {
            id: OperatingMode::Pause,
            name: "Pause",
            on_enter: Some(pause_enter),
            on_exit: None,
            on_command: pause_command,
            on_update: no_update,
        },
        // Index 5 — Manual
        StateDescriptor {
            id: OperatingMode::Manual,
            name: "Manual",
            on_enter: Some(manual_enter),
            on_exit: Some(manual_exit),
            on_command: manual_command,
            on_update: no_update,
        },
    ]
}

// ═══════════════════════════════════════════════════════════════════════════
//  Shared handlers
// ═══════════════════════════════════════════════════════════════════════════

fn no_update(_ctx: &mut ControlContext) {}

/// Done and Fault drive the setpoint to zero on every pass.
fn hold_zero_target(ctx: &mut ControlContext) {
    ctx.set_target(0);
}

fn reset_only(_ctx: &mut ControlContext, cmd: ModeCommand) -> Option<OperatingMode> {
    match cmd {
        ModeCommand::Reset => Some(OperatingMode::Idle),
        _ => None,
    }
}

fn enter_common(ctx: &mut ControlContext, led: LedMode) {
    ctx.led = led;
    ctx.led_on = led == LedMode::On;
    ctx.dirty.mode = true;
    ctx.dirty.detail = true;
}

// ═══════════════════════════════════════════════════════════════════════════
//  FAULT
// ═══════════════════════════════════════════════════════════════════════════

fn fault_enter(ctx: &mut ControlContext) {
    ctx.requests.heater_off = true;
    ctx.set_target(0);
    ctx.led = LedMode::Blink;
    ctx.mark_all_dirty();
    error!("FAULT: {:?}, heater forced off", ctx.fault);
}

fn fault_exit(ctx: &mut ControlContext) {
    ctx.fault = None;
    ctx.requests.heater_rearm = true;
    info!("FAULT cleared by reset");
}

fn fault_command(ctx: &mut ControlContext, cmd: ModeCommand) -> Option<OperatingMode> {
    reset_only(ctx, cmd)
}

// ═══════════════════════════════════════════════════════════════════════════
//  IDLE
// ═══════════════════════════════════════════════════════════════════════════

fn idle_enter(ctx: &mut ControlContext) {
    let profile = if ctx.manual_slot_selected() {
        0
    } else {
        ctx.profile_index
    };
    ctx.requests.select_profile = Some(profile);
    ctx.requests.reset_pid = true;
    ctx.requests.heater_rearm = true;
    ctx.set_target(0);
    ctx.progress.step = 0;
    ctx.progress.time_to_target = 0;
    enter_common(ctx, LedMode::Off);
    ctx.dirty.temperature = true;
    info!("IDLE: heater idle, waiting for start");
}

fn idle_command(ctx: &mut ControlContext, cmd: ModeCommand) -> Option<OperatingMode> {
    match cmd {
        ModeCommand::Reset => Some(OperatingMode::Idle),
        ModeCommand::Go => Some(OperatingMode::Run),
        ModeCommand::Manual => {
            ctx.set_target(ctx.manual_target);
            Some(OperatingMode::Manual)
        }
        ModeCommand::Pause | ModeCommand::Resume => None,
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  RUN
// ═══════════════════════════════════════════════════════════════════════════

fn run_enter(ctx: &mut ControlContext) {
    enter_common(ctx, LedMode::On);
    info!("RUN: profile {} ({} steps)", ctx.profile_index + 1, ctx.profile_steps);
}

/// Run only leaves on Pause, completion or a fault.
fn run_command(ctx: &mut ControlContext, cmd: ModeCommand) -> Option<OperatingMode> {
    match cmd {
        ModeCommand::Pause => {
            ctx.paused_from = OperatingMode::Run;
            Some(OperatingMode::Pause)
        }
        _ => None,
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  DONE
// ═══════════════════════════════════════════════════════════════════════════

fn done_enter(ctx: &mut ControlContext) {
    ctx.requests.buzzer = Some(ctx.config.done_buzzer_ticks);
    ctx.set_target(0);
    enter_common(ctx, LedMode::Off);
    info!("DONE: profile complete after {} updates", ctx.elapsed);
}

// ═══════════════════════════════════════════════════════════════════════════
//  PAUSE
// ═══════════════════════════════════════════════════════════════════════════

fn pause_enter(ctx: &mut ControlContext) {
    enter_common(ctx, LedMode::On);
    info!("PAUSE: holding {} (from {})", ctx.target(), ctx.paused_from.name());
}

fn pause_command(ctx: &mut ControlContext, cmd: ModeCommand) -> Option<OperatingMode> {
    match cmd {
        ModeCommand::Reset => Some(OperatingMode::Idle),
        ModeCommand::Resume => Some(ctx.paused_from),
        _ => None,
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  MANUAL
// ═══════════════════════════════════════════════════════════════════════════

fn manual_enter(ctx: &mut ControlContext) {
    enter_common(ctx, LedMode::On);
    info!("MANUAL: target {}", ctx.target());
}

fn manual_exit(ctx: &mut ControlContext) {
    ctx.manual_pending = false;
}

fn manual_command(ctx: &mut ControlContext, cmd: ModeCommand) -> Option<OperatingMode> {
    match cmd {
        ModeCommand::Reset => Some(OperatingMode::Idle),
        ModeCommand::Pause => {
            ctx.paused_from = OperatingMode::Manual;
            Some(OperatingMode::Pause)
        }
        _ => None,
    }
}
