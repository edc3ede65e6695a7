//! Control service — the hexagonal core.
//!
//! [`ControlService`] owns the operating-mode FSM, its context, and the two
//! stateful control collaborators (PID law, profile sequencer).  Hardware
//! flows through port traits injected at call sites, so the whole service
//! runs against mocks on the host.
//!
//! ```text
//!  TemperatureSource ──▶ ┌──────────────────────────┐ ──▶ EventSink
//!                        │      ControlService      │
//!  HeaterPort ◀──────────│  FSM · PID · Profile     │◀── SharedState
//!  IndicatorPort ◀───────└──────────────────────────┘     (buttons, commands)
//! ```
//!
//! Two entry points, both called from the foreground loop:
//!
//! - [`slow_tick`](ControlService::slow_tick) once per raised slow-tick
//!   signal: command, acquisition, fault escalation, profile, PID, heater.
//! - [`foreground`](ControlService::foreground) on every pass: buttons,
//!   steady-state mode hooks, indicator, display and status output.

use log::{error, info, warn};

use crate::config::SystemConfig;
use crate::fsm::context::{ControlContext, FaultCause, LedMode};
use crate::fsm::states::build_state_table;
use crate::fsm::{buttons, Fsm, OperatingMode};
use crate::shared::{Button, SharedState};

use super::commands::ModeCommand;
use super::events::{AppEvent, DisplayArea};
use super::ports::{EventSink, HeaterPort, IndicatorPort, PidPort, ProfilePort, TemperatureSource};
use super::status;

// ───────────────────────────────────────────────────────────────
// ControlService
// ───────────────────────────────────────────────────────────────

pub struct ControlService<P, R> {
    fsm: Fsm,
    ctx: ControlContext,
    pid: P,
    profile: R,
    /// Mode last reported through the event sink.
    reported: OperatingMode,
    updates: u64,
}

impl<P: PidPort, R: ProfilePort> ControlService<P, R> {
    /// Does **not** start the FSM; call [`start`](Self::start) next.
    pub fn new(config: SystemConfig, pid: P, profile: R) -> Self {
        let mut ctx = ControlContext::new(config);
        ctx.profile_count = profile.count();
        ctx.profile_steps = profile.steps();

        Self {
            fsm: Fsm::new(build_state_table(), OperatingMode::Idle),
            ctx,
            pid,
            profile,
            reported: OperatingMode::Idle,
            updates: 0,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Enter Idle, reset the collaborators and draw the first screen.
    pub fn start(
        &mut self,
        shared: &SharedState,
        hw: &mut (impl HeaterPort + IndicatorPort),
        sink: &mut impl EventSink,
    ) {
        self.fsm.start(&mut self.ctx);
        self.apply_requests(shared, hw);
        self.apply_indicator(hw);
        self.reported = self.fsm.current_mode();
        sink.emit(&AppEvent::Started(self.reported));
        self.ctx.mark_all_dirty();
        self.render(sink);
        info!("ControlService started in {:?}", self.reported);
    }

    // ── Slow-rate control update ──────────────────────────────

    /// One control update.  Runs when the fast tick has raised the
    /// slow-tick signal.
    ///
    /// The `hw` parameter satisfies every hardware port at once, which
    /// avoids a double mutable borrow while keeping the boundary explicit.
    pub fn slow_tick(
        &mut self,
        shared: &SharedState,
        hw: &mut (impl TemperatureSource + HeaterPort + IndicatorPort),
        sink: &mut impl EventSink,
    ) {
        self.updates += 1;

        // 1. At most one command per update
        if let Some(code) = shared.command.take() {
            self.apply_code(code, shared, hw, sink);
        }

        // 2. Acquisition; any fault escalates before the profile or PID run
        let fault = match hw.acquire() {
            Ok(sample) => {
                self.ctx.temperature = sample.hot;
                self.ctx.sample = Some(sample);
                sample.fault.map(FaultCause::Sensor)
            }
            Err(e) => {
                warn!("Thermocouple read failed: {e}");
                Some(FaultCause::Bus)
            }
        };
        if let Some(cause) = fault {
            if self.fsm.current_mode() != OperatingMode::Fault {
                self.fault(cause, shared, hw, sink);
            }
        }

        // 3. Profile
        if self.fsm.current_mode() == OperatingMode::Run {
            self.advance_profile(shared);
        }

        // 4. PID → heater.  Faulted: the temperature is a sentinel, so the
        //    PID is held and the command pinned off.
        self.ctx.heater = if self.fsm.current_mode() == OperatingMode::Fault {
            0
        } else {
            let heater = self.pid.update(self.ctx.temperature, self.ctx.target());
            self.ctx.pid_terms = self.pid.terms();
            heater
        };
        hw.set(self.ctx.heater);

        // 5. Bookkeeping
        if self.ctx.led == LedMode::Blink {
            self.ctx.led_on = !self.ctx.led_on;
            hw.set_led(self.ctx.led_on);
        }
        self.ctx.elapsed = self.ctx.elapsed.wrapping_add(1);
        self.ctx.dirty.temperature = true;
        self.ctx.status_pending = true;

        self.apply_requests(shared, hw);
        self.report_mode(sink);
    }

    // ── Foreground pass ───────────────────────────────────────

    /// Steady-state work, every loop iteration.
    pub fn foreground(
        &mut self,
        shared: &SharedState,
        hw: &mut (impl HeaterPort + IndicatorPort),
        sink: &mut impl EventSink,
    ) {
        self.handle_buttons(shared);
        self.fsm.update(&mut self.ctx);
        self.apply_requests(shared, hw);
        self.apply_indicator(hw);
        self.render(sink);
    }

    /// Turn latched button events into context edits or queued commands.
    pub fn handle_buttons(&mut self, shared: &SharedState) {
        let mode = self.fsm.current_mode();
        if shared.buttons.take(Button::Primary) {
            if let Some(cmd) = buttons::primary(mode, &mut self.ctx) {
                shared.command.post(cmd);
            }
        }
        if shared.buttons.take(Button::Secondary) {
            if let Some(cmd) = buttons::secondary(mode, &mut self.ctx) {
                shared.command.post(cmd);
            }
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn mode(&self) -> OperatingMode {
        self.fsm.current_mode()
    }

    pub fn context(&self) -> &ControlContext {
        &self.ctx
    }

    pub fn pid(&self) -> &P {
        &self.pid
    }

    pub fn profile(&self) -> &R {
        &self.profile
    }

    /// Control updates executed since startup.
    pub fn updates(&self) -> u64 {
        self.updates
    }

    // ── Internal ──────────────────────────────────────────────

    fn apply_code(
        &mut self,
        code: u8,
        shared: &SharedState,
        hw: &mut impl HeaterPort,
        sink: &mut impl EventSink,
    ) {
        match ModeCommand::from_code(code) {
            Some(cmd) => {
                self.fsm.handle_command(cmd, &mut self.ctx);
            }
            None => {
                error!("Invalid command code {code}");
                self.fault(FaultCause::InvalidCommand(code), shared, hw, sink);
            }
        }
    }

    /// Enter Fault.  Already faulted: refresh the cause and re-assert the
    /// heater shutdown.
    fn fault(
        &mut self,
        cause: FaultCause,
        shared: &SharedState,
        hw: &mut impl HeaterPort,
        sink: &mut impl EventSink,
    ) {
        self.ctx.fault = Some(cause);
        if self.fsm.current_mode() == OperatingMode::Fault {
            self.ctx.requests.heater_off = true;
            self.ctx.mark_all_dirty();
        } else {
            self.fsm.force_transition(OperatingMode::Fault, &mut self.ctx);
        }
        self.apply_requests(shared, hw);
        sink.emit(&AppEvent::FaultDetected(cause));
    }

    fn advance_profile(&mut self, shared: &SharedState) {
        let mut progress = self.ctx.progress;
        progress.buzzer = 0;
        let complete = self.profile.update(&mut progress);

        if progress.buzzer != 0 {
            shared.buzzer.arm(progress.buzzer);
            progress.buzzer = 0;
        }
        self.ctx.progress = progress;
        self.ctx.dirty.detail = true;

        if complete {
            self.fsm.force_transition(OperatingMode::Done, &mut self.ctx);
        }
    }

    /// Carry out what the handlers asked for.
    fn apply_requests(&mut self, shared: &SharedState, hw: &mut impl HeaterPort) {
        let req = self.ctx.requests.take();

        if req.heater_off {
            hw.fault();
        }
        if req.heater_rearm && !req.heater_off {
            hw.clear_fault();
        }
        if let Some(index) = req.select_profile {
            self.profile.reset(index);
            self.ctx.profile_steps = self.profile.steps();
        }
        if req.reset_pid {
            self.pid.reset();
        }
        if let Some(ticks) = req.buzzer {
            shared.buzzer.arm(ticks);
        }
    }

    fn apply_indicator(&mut self, hw: &mut impl IndicatorPort) {
        match self.ctx.led {
            LedMode::On => hw.set_led(true),
            LedMode::Off => hw.set_led(false),
            LedMode::Blink => {}
        }
    }

    fn report_mode(&mut self, sink: &mut impl EventSink) {
        let now = self.fsm.current_mode();
        if now != self.reported {
            sink.emit(&AppEvent::ModeChanged {
                from: self.reported,
                to: now,
            });
            self.reported = now;
        }
    }

    /// Emit dirty display areas and a pending status line.
    fn render(&mut self, sink: &mut impl EventSink) {
        self.report_mode(sink);
        let mode = self.fsm.current_mode();

        let dirty = core::mem::take(&mut self.ctx.dirty);
        if dirty.mode {
            sink.emit(&AppEvent::Display {
                area: DisplayArea::Mode,
                text: status::mode_text(mode),
            });
        }
        if dirty.temperature {
            sink.emit(&AppEvent::Display {
                area: DisplayArea::Temperature,
                text: status::temperature_text(mode, &self.ctx),
            });
        }
        if dirty.detail {
            sink.emit(&AppEvent::Display {
                area: DisplayArea::Detail,
                text: status::detail_text(mode, &self.ctx),
            });
        }

        if core::mem::take(&mut self.ctx.status_pending) {
            if let Some(line) = status::status_line(mode, &self.ctx) {
                sink.emit(&AppEvent::Status(line));
            }
        }
    }
}
