//! Integration tests for the ControlService → FSM → ports pipeline.
//!
//! These run on the host and drive the service the way the foreground loop
//! does: commands and button latches go in through `SharedState`, control
//! updates run via `slow_tick`, steady-state work via `foreground`.

use reflow::app::commands::ModeCommand;
use reflow::app::events::{AppEvent, DisplayArea};
use reflow::app::ports::{PidPort, ProfilePort};
use reflow::app::service::ControlService;
use reflow::config::SystemConfig;
use reflow::control::{PidController, ProfileSequencer};
use reflow::fsm::context::FaultCause;
use reflow::fsm::OperatingMode;
use reflow::sensors::ThermocoupleFault;
use reflow::shared::{Button, SharedState};

use super::mock_hw::{sample_deg, sample_fault, Call, Journal, MockHardware, MockPid, MockProfile, RecordingSink};

const PID_OUTPUT: u8 = 77;

struct Rig<P, R> {
    svc: ControlService<P, R>,
    hw: MockHardware,
    sink: RecordingSink,
    shared: SharedState,
    journal: Journal,
}

impl<P: PidPort, R: ProfilePort> Rig<P, R> {
    fn with(journal: Journal, pid: P, profile: R) -> Self {
        let mut rig = Self {
            svc: ControlService::new(SystemConfig::default(), pid, profile),
            hw: MockHardware::new(journal.clone()),
            sink: RecordingSink::new(),
            shared: SharedState::new(),
            journal,
        };
        rig.svc.start(&rig.shared, &mut rig.hw, &mut rig.sink);
        rig
    }

    /// One control update followed by one foreground pass.
    fn tick(&mut self) {
        self.svc.slow_tick(&self.shared, &mut self.hw, &mut self.sink);
        self.svc.foreground(&self.shared, &mut self.hw, &mut self.sink);
    }

    fn command(&mut self, cmd: ModeCommand) {
        self.shared.command.post(cmd);
        self.tick();
    }

    /// Latch a button event and let the foreground consume it.
    fn press(&mut self, button: Button) {
        self.shared.buttons.latch(button);
        self.svc.foreground(&self.shared, &mut self.hw, &mut self.sink);
    }

    fn mode(&self) -> OperatingMode {
        self.svc.mode()
    }

    fn faults_reported(&self) -> usize {
        self.sink
            .events
            .iter()
            .filter(|e| matches!(e, AppEvent::FaultDetected(_)))
            .count()
    }
}

type MockRig = Rig<MockPid, MockProfile>;

/// Mock collaborators; the profile completes after `length` updates and
/// raises the setpoint by `slope` each time.
fn rig_with(length: u32, slope: i16) -> MockRig {
    let journal = Journal::default();
    let mut profile = MockProfile::new(journal.clone(), length);
    profile.slope = slope;
    Rig::with(journal.clone(), MockPid::new(journal, PID_OUTPUT), profile)
}

fn rig() -> MockRig {
    rig_with(1_000, 0)
}

// ── Startup ───────────────────────────────────────────────────

#[test]
fn starts_idle_with_collaborators_reset() {
    let r = rig();
    assert_eq!(r.mode(), OperatingMode::Idle);
    let calls = r.journal.calls();
    assert!(calls.contains(&Call::ProfileReset(0)));
    assert!(calls.contains(&Call::PidReset));
    assert!(calls.contains(&Call::HeaterClearFault));
    assert_eq!(r.sink.events.first(), Some(&AppEvent::Started(OperatingMode::Idle)));
    assert_eq!(r.svc.context().target(), 0);
}

#[test]
fn first_render_draws_every_area() {
    let r = rig();
    let areas: Vec<DisplayArea> = r
        .sink
        .events
        .iter()
        .filter_map(|e| match e {
            AppEvent::Display { area, .. } => Some(*area),
            _ => None,
        })
        .collect();
    assert!(areas.contains(&DisplayArea::Mode));
    assert!(areas.contains(&DisplayArea::Temperature));
    assert!(areas.contains(&DisplayArea::Detail));
}

// ── Scenario 1: Go → Run, PID drives the heater ───────────────

#[test]
fn go_enters_run_and_heater_follows_pid() {
    let mut r = rig();
    r.journal.clear();
    r.hw.steady = sample_deg(25);

    r.command(ModeCommand::Go);

    assert_eq!(r.mode(), OperatingMode::Run);
    let calls = r.journal.calls();
    let acquire = calls.iter().position(|c| *c == Call::Acquire).unwrap();
    let pid = calls
        .iter()
        .position(|c| *c == Call::PidUpdate { current: 100, target: 0 })
        .expect("PID called with the raw sample and the zero target");
    let set = calls.iter().position(|c| *c == Call::HeaterSet(PID_OUTPUT)).unwrap();
    assert!(acquire < pid && pid < set);
    assert_eq!(r.hw.effective_command(), PID_OUTPUT);
    assert_eq!(r.svc.context().heater, PID_OUTPUT);
}

// ── Scenario 2: sensor fault in Run ───────────────────────────

#[test]
fn open_circuit_in_run_faults_before_profile_and_pid() {
    let mut r = rig_with(1_000, 40);
    r.command(ModeCommand::Go);
    for _ in 0..10 {
        r.tick();
    }
    assert_eq!(r.mode(), OperatingMode::Run);
    assert!(r.svc.context().target() > 0);
    assert_eq!(r.hw.command, PID_OUTPUT);
    let profile_updates = r.svc.profile().updates();

    r.journal.clear();
    r.hw.push_sample(sample_fault(ThermocoupleFault::OpenCircuit));
    r.svc.slow_tick(&r.shared, &mut r.hw, &mut r.sink);

    // Checked before the foreground runs: the fault update itself is safe.
    assert_eq!(r.mode(), OperatingMode::Fault);
    assert_eq!(r.svc.profile().updates(), profile_updates, "profile must not advance");
    assert_eq!(r.svc.context().target(), 0);
    assert_eq!(r.svc.context().heater, 0);
    assert_eq!(r.hw.command, 0);
    let calls = r.journal.calls();
    assert_eq!(&calls[..3], &[Call::Acquire, Call::HeaterFault, Call::HeaterSet(0)]);
    assert!(
        !calls.iter().any(|c| matches!(c, Call::PidUpdate { .. })),
        "the sentinel never reaches the PID"
    );

    r.svc.foreground(&r.shared, &mut r.hw, &mut r.sink);
    assert_eq!(r.hw.effective_command(), 0);
    assert_eq!(
        r.svc.context().fault,
        Some(FaultCause::Sensor(ThermocoupleFault::OpenCircuit))
    );
    assert!(r
        .sink
        .events
        .contains(&AppEvent::FaultDetected(FaultCause::Sensor(ThermocoupleFault::OpenCircuit))));
}

#[test]
fn every_sensor_fault_kind_escalates() {
    for fault in ThermocoupleFault::ALL {
        let mut r = rig();
        r.hw.push_sample(sample_fault(fault));
        r.tick();
        assert_eq!(r.mode(), OperatingMode::Fault, "{fault:?}");
    }
}

#[test]
fn bus_error_faults_like_a_sensor_fault() {
    let mut r = rig();
    r.hw.push_bus_error();
    r.tick();
    assert_eq!(r.mode(), OperatingMode::Fault);
    assert_eq!(r.svc.context().fault, Some(FaultCause::Bus));
    assert!(r.hw.faulted);
}

// ── Scenario 3: profile selection ─────────────────────────────

#[test]
fn secondary_button_cycles_profiles_and_manual_slot() {
    let mut r = rig();
    r.journal.clear();

    let mut seen = Vec::new();
    for _ in 0..4 {
        r.press(Button::Secondary);
        let ctx = r.svc.context();
        seen.push((ctx.profile_index, ctx.manual_select));
    }
    assert_eq!(seen, vec![(1, false), (2, false), (3, true), (0, false)]);

    let resets: Vec<Call> = r
        .journal
        .calls()
        .into_iter()
        .filter(|c| matches!(c, Call::ProfileReset(_)))
        .collect();
    assert_eq!(resets, vec![Call::ProfileReset(1), Call::ProfileReset(2), Call::ProfileReset(0)]);
}

#[test]
fn manual_slot_sets_default_target() {
    let mut r = rig();
    for _ in 0..3 {
        r.press(Button::Secondary);
    }
    assert!(r.svc.context().manual_select);
    assert_eq!(r.svc.context().manual_target, 600);
}

// ── Scenario 4: manual target adjustment ──────────────────────

fn enter_manual(r: &mut MockRig) {
    for _ in 0..3 {
        r.press(Button::Secondary);
    }
    r.press(Button::Primary);
    r.tick();
    assert_eq!(r.mode(), OperatingMode::Manual);
}

#[test]
fn manual_mode_starts_at_manual_target() {
    let mut r = rig();
    enter_manual(&mut r);
    assert_eq!(r.svc.context().target(), 600);
    assert!(r.hw.led);
}

#[test]
fn manual_status_reports_pid_terms() {
    let mut r = rig();
    enter_manual(&mut r);
    let lines = r.sink.statuses();
    let last = lines.last().expect("a status line per update in Manual");
    // 25 °C against the 150 °C default: error 500 quarter-degrees.
    assert!(last.ends_with(&format!(",100,600,{PID_OUTPUT},500,0,0")), "{last}");
}

#[test]
fn manual_increments_need_confirmation() {
    let mut r = rig();
    enter_manual(&mut r);

    r.press(Button::Secondary);
    let ctx = r.svc.context();
    assert_eq!(ctx.manual_target, 620);
    assert!(ctx.manual_pending);
    assert_eq!(ctx.target(), 600, "setpoint unchanged until confirmed");

    r.press(Button::Primary);
    let ctx = r.svc.context();
    assert_eq!(ctx.target(), 620);
    assert!(!ctx.manual_pending);
    assert!(r.shared.command.is_empty(), "confirming is not a command");
}

#[test]
fn manual_target_wraps_above_maximum() {
    let mut r = rig();
    enter_manual(&mut r);

    let mut targets = Vec::new();
    for _ in 0..21 {
        r.press(Button::Secondary);
        assert!(r.svc.context().manual_pending);
        targets.push(r.svc.context().manual_target);
    }
    // 600 → 1000 in 20 steps, then wrap.
    assert_eq!(targets[19], 1000);
    assert_eq!(targets[20], 200);
    assert!(targets.windows(2).take(19).all(|w| w[1] - w[0] == 20));
}

#[test]
fn primary_without_pending_pauses_manual_and_resume_returns() {
    let mut r = rig();
    enter_manual(&mut r);

    r.press(Button::Primary);
    r.tick();
    assert_eq!(r.mode(), OperatingMode::Pause);

    r.press(Button::Secondary);
    r.tick();
    assert_eq!(r.mode(), OperatingMode::Manual);
    assert_eq!(r.svc.context().target(), 600);
}

#[test]
fn reset_leaves_manual() {
    let mut r = rig();
    enter_manual(&mut r);
    r.command(ModeCommand::Reset);
    assert_eq!(r.mode(), OperatingMode::Idle);
    assert_eq!(r.svc.context().target(), 0);
}

// ── Run transitions ───────────────────────────────────────────

#[test]
fn run_ignores_everything_but_pause() {
    let mut r = rig();
    r.command(ModeCommand::Go);

    for cmd in [ModeCommand::Reset, ModeCommand::Go, ModeCommand::Resume, ModeCommand::Manual] {
        r.command(cmd);
        assert_eq!(r.mode(), OperatingMode::Run, "{cmd:?} must not leave Run");
    }

    r.command(ModeCommand::Pause);
    assert_eq!(r.mode(), OperatingMode::Pause);
    r.command(ModeCommand::Resume);
    assert_eq!(r.mode(), OperatingMode::Run);
}

#[test]
fn pause_holds_the_profile() {
    let mut r = rig_with(1_000, 10);
    r.command(ModeCommand::Go);
    r.command(ModeCommand::Pause);
    let held = r.svc.context().target();
    let updates = r.svc.profile().updates();

    for _ in 0..5 {
        r.tick();
    }
    assert_eq!(r.svc.context().target(), held);
    assert_eq!(r.svc.profile().updates(), updates);
}

#[test]
fn completion_enters_done_and_arms_buzzer() {
    let mut r = rig_with(3, 40);

    r.command(ModeCommand::Go);
    r.tick();
    assert_eq!(r.mode(), OperatingMode::Run);
    assert_eq!(r.shared.buzzer.remaining(), 0);

    r.journal.clear();
    r.tick();
    assert_eq!(r.mode(), OperatingMode::Done);
    assert_eq!(r.shared.buzzer.remaining(), 8);
    // Done pins the setpoint to zero, already for the completing update.
    assert_eq!(r.svc.context().target(), 0);
    assert!(r
        .journal
        .calls()
        .contains(&Call::PidUpdate { current: 100, target: 0 }));
    assert!(!r.hw.led);

    r.command(ModeCommand::Go);
    assert_eq!(r.mode(), OperatingMode::Done);
    r.command(ModeCommand::Reset);
    assert_eq!(r.mode(), OperatingMode::Idle);
}

#[test]
fn profile_buzzer_request_is_armed() {
    let journal = Journal::default();
    let mut profile = MockProfile::new(journal.clone(), 100);
    profile.buzz_at = Some((2, 2));
    let mut r = Rig::with(journal.clone(), MockPid::new(journal, PID_OUTPUT), profile);

    r.command(ModeCommand::Go);
    assert_eq!(r.shared.buzzer.remaining(), 0);
    r.tick();
    assert_eq!(r.shared.buzzer.remaining(), 2);
}

// ── Fault handling ────────────────────────────────────────────

#[test]
fn fault_is_only_left_by_reset() {
    let mut r = rig();
    r.hw.push_bus_error();
    r.tick();
    assert_eq!(r.mode(), OperatingMode::Fault);

    for cmd in [ModeCommand::Go, ModeCommand::Pause, ModeCommand::Resume, ModeCommand::Manual] {
        r.command(cmd);
        assert_eq!(r.mode(), OperatingMode::Fault, "{cmd:?} must not leave Fault");
    }

    r.journal.clear();
    r.command(ModeCommand::Reset);
    assert_eq!(r.mode(), OperatingMode::Idle);
    assert!(r.journal.calls().contains(&Call::HeaterClearFault));
    assert!(!r.hw.faulted);
    assert_eq!(r.svc.context().fault, None);
}

#[test]
fn fault_while_faulted_is_a_no_op() {
    let mut r = rig();
    r.hw.push_sample(sample_fault(ThermocoupleFault::ShortToGround));
    r.tick();
    assert_eq!(r.faults_reported(), 1);
    let heater_faults = r.journal.count(|c| *c == Call::HeaterFault);

    r.hw.push_sample(sample_fault(ThermocoupleFault::OpenCircuit));
    r.tick();
    assert_eq!(r.mode(), OperatingMode::Fault);
    assert_eq!(r.faults_reported(), 1);
    assert_eq!(r.journal.count(|c| *c == Call::HeaterFault), heater_faults);
    assert_eq!(
        r.svc.context().fault,
        Some(FaultCause::Sensor(ThermocoupleFault::ShortToGround))
    );
}

#[test]
fn invalid_command_code_faults_from_any_mode() {
    let mut r = rig();
    r.command(ModeCommand::Go);
    r.shared.command.post_raw(9);
    r.tick();
    assert_eq!(r.mode(), OperatingMode::Fault);
    assert_eq!(r.svc.context().fault, Some(FaultCause::InvalidCommand(9)));
    assert!(r.hw.faulted);

    let detail = r.sink.events.iter().rev().find_map(|e| match e {
        AppEvent::Display { area: DisplayArea::Detail, text } => Some(text.as_str().to_owned()),
        _ => None,
    });
    assert_eq!(detail.as_deref(), Some("BAD COMMAND"));

    // Again while faulted: heater shutdown re-asserted, still Fault.
    let before = r.journal.count(|c| *c == Call::HeaterFault);
    r.shared.command.post_raw(200);
    r.tick();
    assert_eq!(r.mode(), OperatingMode::Fault);
    assert_eq!(r.journal.count(|c| *c == Call::HeaterFault), before + 1);
}

#[test]
fn fault_blinks_the_led() {
    let mut r = rig();
    r.hw.push_bus_error();
    r.tick();
    let first = r.hw.led;
    r.tick();
    assert_ne!(r.hw.led, first);
    r.tick();
    assert_eq!(r.hw.led, first);
}

#[test]
fn primary_button_resets_from_fault() {
    let mut r = rig();
    r.hw.push_bus_error();
    r.tick();
    r.press(Button::Primary);
    r.tick();
    assert_eq!(r.mode(), OperatingMode::Idle);
}

#[test]
fn reset_from_fault_clears_manual_slot() {
    let mut r = rig();
    for _ in 0..3 {
        r.press(Button::Secondary);
    }
    assert!(r.svc.context().manual_select);
    r.hw.push_bus_error();
    r.tick();
    r.press(Button::Primary);
    r.tick();
    assert_eq!(r.mode(), OperatingMode::Idle);
    assert!(!r.svc.context().manual_select);
    assert_eq!(r.svc.context().profile_index, 0);
}

// ── Command slot ──────────────────────────────────────────────

#[test]
fn later_command_overwrites_unconsumed_one() {
    let mut r = rig();
    r.shared.command.post(ModeCommand::Go);
    r.shared.command.post(ModeCommand::Manual);
    r.tick();
    assert_eq!(r.mode(), OperatingMode::Manual);
    assert!(r.shared.command.is_empty());
}

#[test]
fn one_command_per_update() {
    let mut r = rig();
    r.command(ModeCommand::Go);
    assert_eq!(r.svc.updates(), 1);
    r.shared.command.post(ModeCommand::Pause);
    r.svc.slow_tick(&r.shared, &mut r.hw, &mut r.sink);
    assert_eq!(r.mode(), OperatingMode::Pause);
    assert!(r.shared.command.is_empty());
}

// ── Status output ─────────────────────────────────────────────

#[test]
fn status_lines_only_in_run_and_manual() {
    let mut r = rig();
    r.tick();
    assert!(r.sink.statuses().is_empty());

    r.command(ModeCommand::Go);
    let lines = r.sink.statuses();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].starts_with("Run,1,"), "{}", lines[0]);
    assert!(lines[0].ends_with(&format!(",{PID_OUTPUT}")));
}

#[test]
fn mode_changes_are_reported_once() {
    let mut r = rig();
    r.command(ModeCommand::Go);
    r.command(ModeCommand::Pause);
    let changes: Vec<(OperatingMode, OperatingMode)> = r
        .sink
        .events
        .iter()
        .filter_map(|e| match e {
            AppEvent::ModeChanged { from, to } => Some((*from, *to)),
            _ => None,
        })
        .collect();
    assert_eq!(
        changes,
        vec![
            (OperatingMode::Idle, OperatingMode::Run),
            (OperatingMode::Run, OperatingMode::Pause),
        ]
    );
}

// ── Real collaborators ────────────────────────────────────────

#[test]
fn lead_profile_completes_with_real_collaborators() {
    let journal = Journal::default();
    let config = SystemConfig::default();
    let mut r = Rig::with(
        journal,
        PidController::new(reflow::app::ports::PidGains::DEFAULT),
        ProfileSequencer::new(config.slow_updates_per_second()),
    );
    r.hw.steady = sample_deg(25);

    // (60 + 60 + 90 + 45 + 90) s at 4 updates/s.
    r.command(ModeCommand::Go);
    let mut peak = r.hw.command;
    for _ in 1..1_379 {
        r.tick();
        assert_eq!(r.mode(), OperatingMode::Run);
        peak = peak.max(r.hw.command);
    }
    assert!(peak > 0, "cold oven with a rising setpoint heats");
    r.tick();
    assert_eq!(r.mode(), OperatingMode::Done);
    assert_eq!(r.shared.buzzer.remaining(), 8);
}
