//! Time-temperature reflow profiles.
//!
//! Each profile is a short table of steps.  A step ramps the setpoint
//! linearly from where the previous step ended to its own target over its
//! duration.  The sequencer is advanced once per control update.
//!
//! ```text
//!  °C
//!  225 ┤                    ╭──╮
//!  165 ┤          ╭─────────╯  │
//!  150 ┤     ╭────╯            ╰╮
//!   25 ┼─────╯                  ╰──────
//!       RAMP  PREHEAT  SOAK  REFLOW  COOL
//! ```

use log::info;

use crate::app::ports::{ProfilePort, ProfileProgress};

/// Quarter-degree helper for the tables below.
const fn c(deg: i16) -> i16 {
    deg * 4
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    Ramp,
    PreHeat,
    Soak,
    Reflow,
    Cool,
}

#[derive(Debug, Clone, Copy)]
pub struct ProfileStep {
    pub kind: StepKind,
    /// Setpoint at the end of the step (0.25 °C).
    pub target: i16,
    pub duration_s: u16,
    /// Buzzer countdown armed on entering the step.
    pub buzzer: u8,
}

#[derive(Debug, Clone, Copy)]
pub struct Profile {
    pub name: &'static str,
    pub steps: &'static [ProfileStep],
}

const fn step(kind: StepKind, deg: i16, duration_s: u16, buzzer: u8) -> ProfileStep {
    ProfileStep {
        kind,
        target: c(deg),
        duration_s,
        buzzer,
    }
}

/// Sn63/Pb37.
const LEAD: [ProfileStep; 5] = [
    step(StepKind::Ramp, 100, 60, 0),
    step(StepKind::PreHeat, 150, 60, 0),
    step(StepKind::Soak, 165, 90, 0),
    step(StepKind::Reflow, 225, 45, 2),
    step(StepKind::Cool, 50, 90, 0),
];

/// Kester recommendation for Sn63/Pb37 pastes.
const LEAD_KESTER: [ProfileStep; 5] = [
    step(StepKind::Ramp, 100, 50, 0),
    step(StepKind::PreHeat, 150, 50, 0),
    step(StepKind::Soak, 183, 120, 0),
    step(StepKind::Reflow, 215, 40, 2),
    step(StepKind::Cool, 50, 90, 0),
];

/// SAC305.
const LEAD_FREE: [ProfileStep; 5] = [
    step(StepKind::Ramp, 120, 60, 0),
    step(StepKind::PreHeat, 175, 60, 0),
    step(StepKind::Soak, 200, 90, 0),
    step(StepKind::Reflow, 245, 45, 2),
    step(StepKind::Cool, 50, 90, 0),
];

pub const PROFILES: [Profile; 3] = [
    Profile { name: "Lead", steps: &LEAD },
    Profile { name: "Lead (KESTER)", steps: &LEAD_KESTER },
    Profile { name: "Lead-free", steps: &LEAD_FREE },
];

/// Steps every built-in profile has.
pub const STEPS: u8 = 5;

/// Table-driven profile sequencer.
pub struct ProfileSequencer {
    profiles: &'static [Profile],
    selected: usize,
    step: usize,
    /// Setpoint the current step started from.
    start: i16,
    elapsed_updates: u32,
    updates_per_second: u8,
    started: bool,
}

impl ProfileSequencer {
    pub fn new(updates_per_second: u8) -> Self {
        Self::with_profiles(&PROFILES, updates_per_second)
    }

    pub fn with_profiles(profiles: &'static [Profile], updates_per_second: u8) -> Self {
        Self {
            profiles,
            selected: 0,
            step: 0,
            start: 0,
            elapsed_updates: 0,
            updates_per_second: updates_per_second.max(1),
            started: false,
        }
    }

    pub fn selected(&self) -> &Profile {
        &self.profiles[self.selected]
    }

    fn step_updates(&self, step: &ProfileStep) -> u32 {
        u32::from(step.duration_s) * u32::from(self.updates_per_second)
    }
}

impl ProfilePort for ProfileSequencer {
    fn reset(&mut self, index: u8) {
        self.selected = usize::from(index).min(self.profiles.len().saturating_sub(1));
        self.step = 0;
        self.start = 0;
        self.elapsed_updates = 0;
        self.started = false;
        info!("Profile {} selected", self.selected().name);
    }

    fn update(&mut self, progress: &mut ProfileProgress) -> bool {
        let steps = self.selected().steps;

        if !self.started {
            self.started = true;
            self.start = progress.target;
            if let Some(first) = steps.first() {
                progress.buzzer = first.buzzer;
            }
        }

        let Some(current) = steps.get(self.step).copied() else {
            return true;
        };

        self.elapsed_updates += 1;
        let total = self.step_updates(&current).max(1);
        let done = self.elapsed_updates.min(total);

        let span = i32::from(current.target) - i32::from(self.start);
        progress.target = (i32::from(self.start) + span * done as i32 / total as i32) as i16;
        progress.step = self.step as u8 + 1;
        progress.time_to_target =
            ((total - done) / u32::from(self.updates_per_second)) as u16;

        if done < total {
            return false;
        }

        self.step += 1;
        self.start = current.target;
        self.elapsed_updates = 0;
        match steps.get(self.step) {
            Some(next) => {
                progress.buzzer = next.buzzer;
                false
            }
            None => true,
        }
    }

    fn count(&self) -> u8 {
        self.profiles.len() as u8
    }

    fn steps(&self) -> u8 {
        self.selected().steps.len() as u8
    }
}
