//! Front-panel button semantics.
//!
//! A button event either edits the context directly (profile selection,
//! manual setpoint) or turns into a [`ModeCommand`] that goes through the
//! command slot like a serial command would.

use super::context::ControlContext;
use super::OperatingMode;
use crate::app::commands::ModeCommand;

/// Primary (red) button: start / pause / reset / confirm.
pub fn primary(mode: OperatingMode, ctx: &mut ControlContext) -> Option<ModeCommand> {
    match mode {
        OperatingMode::Fault => {
            ctx.manual_select = false;
            if ctx.manual_slot_selected() {
                ctx.profile_index = 0;
            }
            Some(ModeCommand::Reset)
        }
        OperatingMode::Idle if ctx.manual_select => Some(ModeCommand::Manual),
        OperatingMode::Idle => Some(ModeCommand::Go),
        OperatingMode::Run => Some(ModeCommand::Pause),
        OperatingMode::Done | OperatingMode::Pause => Some(ModeCommand::Reset),
        OperatingMode::Manual if ctx.manual_pending => {
            ctx.set_target(ctx.manual_target);
            ctx.manual_pending = false;
            ctx.dirty.detail = true;
            None
        }
        OperatingMode::Manual => Some(ModeCommand::Pause),
    }
}

/// Secondary (green) button: profile select / resume / manual increment.
pub fn secondary(mode: OperatingMode, ctx: &mut ControlContext) -> Option<ModeCommand> {
    match mode {
        OperatingMode::Idle => {
            select_next_profile(ctx);
            None
        }
        OperatingMode::Pause => Some(ModeCommand::Resume),
        OperatingMode::Manual => {
            step_manual_target(ctx);
            None
        }
        OperatingMode::Fault | OperatingMode::Run | OperatingMode::Done => None,
    }
}

/// Cycle 0 → … → count-1 → manual slot → 0.
fn select_next_profile(ctx: &mut ControlContext) {
    ctx.profile_index = (ctx.profile_index + 1) % (ctx.profile_count + 1);
    ctx.manual_select = ctx.manual_slot_selected();
    if ctx.manual_select {
        ctx.manual_target = ctx.config.manual_default_target;
    } else {
        ctx.requests.select_profile = Some(ctx.profile_index);
    }
    ctx.dirty.detail = true;
}

fn step_manual_target(ctx: &mut ControlContext) {
    let next = ctx.manual_target.saturating_add(ctx.config.manual_step);
    ctx.manual_target = if next > ctx.config.manual_max_target {
        ctx.config.manual_wrap_target
    } else {
        next
    };
    ctx.manual_pending = true;
    ctx.dirty.detail = true;
}
