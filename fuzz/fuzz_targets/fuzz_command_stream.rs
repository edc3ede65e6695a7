//! Fuzz target: raw command codes into `ControlService`
//!
//! Every input byte is posted to the command slot as if it came over the
//! serial link, followed by one control update and one foreground pass.
//! The heater must be disabled exactly while the machine is in Fault.
//!
//! cargo fuzz run fuzz_command_stream

#![no_main]

use libfuzzer_sys::fuzz_target;
use reflow::app::events::AppEvent;
use reflow::app::ports::{EventSink, HeaterPort, IndicatorPort, PidGains, TemperatureSource};
use reflow::app::service::ControlService;
use reflow::config::SystemConfig;
use reflow::control::{PidController, ProfileSequencer};
use reflow::error::SensorError;
use reflow::fsm::OperatingMode;
use reflow::sensors::TemperatureSample;
use reflow::shared::SharedState;

#[derive(Default)]
struct Oven {
    faulted: bool,
}

impl TemperatureSource for Oven {
    fn acquire(&mut self) -> Result<TemperatureSample, SensorError> {
        Ok(TemperatureSample { hot: 100, cold: 400, fault: None })
    }
}

impl HeaterPort for Oven {
    fn setup(&mut self) {}
    fn set(&mut self, _command: u8) {}
    fn update(&mut self) {}
    fn fault(&mut self) {
        self.faulted = true;
    }
    fn clear_fault(&mut self) {
        self.faulted = false;
    }
}

impl IndicatorPort for Oven {
    fn set_led(&mut self, _on: bool) {}
}

struct Discard;

impl EventSink for Discard {
    fn emit(&mut self, _event: &AppEvent) {}
}

fuzz_target!(|data: &[u8]| {
    let config = SystemConfig::default();
    let updates = config.slow_updates_per_second();
    let mut svc = ControlService::new(
        config,
        PidController::new(PidGains::DEFAULT),
        ProfileSequencer::new(updates),
    );
    let shared = SharedState::new();
    let mut oven = Oven::default();
    svc.start(&shared, &mut oven, &mut Discard);

    for &code in data {
        shared.command.post_raw(code);
        svc.slow_tick(&shared, &mut oven, &mut Discard);
        if svc.mode() == OperatingMode::Fault {
            assert_eq!(svc.context().target(), 0);
            assert_eq!(svc.context().heater, 0);
        }
        svc.foreground(&shared, &mut oven, &mut Discard);
        assert_eq!(oven.faulted, svc.mode() == OperatingMode::Fault);
    }
});
