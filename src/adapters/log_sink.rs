//! Serial event sink adapter.
//!
//! Implements [`EventSink`] for the console link (UART / USB-CDC in
//! production).  Status records go out as bare CSV lines so a host can
//! plot a run; everything else goes through the logger.

use std::io::Write;

use log::{debug, info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;
use crate::app::status;

/// Adapter that writes status lines to `out` and logs every other event.
pub struct LogEventSink<W = std::io::Stdout> {
    out: W,
    write_failed: bool,
}

impl LogEventSink {
    /// Status lines on stdout (the console UART on the device).
    pub fn new() -> Self {
        Self::with_writer(std::io::stdout())
    }
}

impl Default for LogEventSink {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write> LogEventSink<W> {
    pub fn with_writer(out: W) -> Self {
        Self { out, write_failed: false }
    }

    pub fn writer(&self) -> &W {
        &self.out
    }

    fn write_status(&mut self, line: &str) {
        let result = writeln!(self.out, "{line}").and_then(|()| self.out.flush());
        match result {
            Ok(()) => self.write_failed = false,
            Err(e) => {
                // Report once per outage, not once per line.
                if !self.write_failed {
                    warn!("status write failed: {e}");
                }
                self.write_failed = true;
            }
        }
    }
}

impl<W: Write> EventSink for LogEventSink<W> {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Started(mode) => {
                info!("START | initial_mode={:?}", mode);
            }
            AppEvent::ModeChanged { from, to } => {
                info!("MODE | {:?} -> {:?}", from, to);
            }
            AppEvent::FaultDetected(cause) => {
                info!("FAULT | {:?} ({})", cause, status::fault_text(*cause));
            }
            AppEvent::Display { area, text } => {
                let (col, row) = area.origin();
                debug!("LCD | ({},{}) {}", col, row, text);
            }
            AppEvent::Status(line) => self.write_status(line),
        }
    }
}
