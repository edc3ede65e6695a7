//! Closed-loop control: the PID law and the profile sequencer.

pub mod pid;
pub mod profile;

pub use pid::PidController;
pub use profile::ProfileSequencer;
