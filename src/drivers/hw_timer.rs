//! Mains-locked tick timer using ESP-IDF's gptimer API.
//!
//! One general-purpose timer counts at `resolution_hz` and alarms at
//! `period_ticks`, auto-reloading to 0.  That alone free-runs just below
//! the half-cycle rate.  The zero-cross GPIO interrupt loads the counter
//! with [`TimerConfig::zero_cross_preload`], so while mains is present the
//! alarm lands `compare_ticks` after every crossing.
//!
//! ```text
//!  ZC edge ──▶ zero_cross_isr ──▶ gptimer_set_raw_count(preload)
//!  alarm  ───▶ fast_tick_isr  ──▶ Scheduler::fast_tick(&SHARED, BoardTickPort)
//! ```
//!
//! Both ISR contexts are leaked boxes, created once at boot and never freed.
//! Host builds only get [`BoardTickPort`]; tests drive the
//! [`Scheduler`](crate::scheduler::Scheduler) directly.

use crate::app::ports::HeaterPort;
use crate::drivers::hw_init;
use crate::drivers::ssr::{HeaterCell, HeaterMutex, SsrDriver};
use crate::pins;
use crate::scheduler::{ButtonLevels, TickPort};

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
use log::info;

#[cfg(target_os = "espidf")]
use crate::drivers::hw_init::HwInitError;
#[cfg(target_os = "espidf")]
use crate::scheduler::{PhaseTimer, Scheduler, TimerConfig};
#[cfg(target_os = "espidf")]
use crate::shared::SHARED;

// ── Board tick port ───────────────────────────────────────────

/// What the fast tick touches on the real board.
pub struct BoardTickPort {
    heater: HeaterCell<'static, SsrDriver>,
}

impl BoardTickPort {
    pub fn new(heater: &'static HeaterMutex<SsrDriver>) -> Self {
        Self { heater: HeaterCell::new(heater) }
    }
}

impl TickPort for BoardTickPort {
    fn update_heater(&mut self) {
        self.heater.update();
    }

    // Xtensa interrupt levels already let higher-priority ISRs preempt the
    // alarm callback, so the nesting point needs no action here.

    fn sample_buttons(&mut self) -> ButtonLevels {
        // Active-low with pull-ups.
        ButtonLevels {
            primary: !hw_init::gpio_read(pins::PRIMARY_BUTTON_GPIO),
            secondary: !hw_init::gpio_read(pins::SECONDARY_BUTTON_GPIO),
        }
    }

    fn set_buzzer(&mut self, on: bool) {
        hw_init::gpio_write(pins::BUZZER_GPIO, on);
    }
}

// ── ESP-IDF timer glue ────────────────────────────────────────

#[cfg(target_os = "espidf")]
struct FastTickContext {
    scheduler: Scheduler,
    port: BoardTickPort,
}

/// Handle the zero-cross ISR writes through.
#[cfg(target_os = "espidf")]
struct GpTimerPhase {
    handle: gptimer_handle_t,
    preload: u64,
}

#[cfg(target_os = "espidf")]
impl PhaseTimer for GpTimerPhase {
    fn reset_counter(&mut self) {
        // SAFETY: handle is a started gptimer; set_raw_count is ISR-safe.
        unsafe {
            gptimer_set_raw_count(self.handle, self.preload);
        }
    }
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn fast_tick_isr(
    _timer: gptimer_handle_t,
    _edata: *const gptimer_alarm_event_data_t,
    user_ctx: *mut core::ffi::c_void,
) -> bool {
    // SAFETY: user_ctx is the leaked FastTickContext registered in
    // start_tick_timer(); only this ISR dereferences it.
    let ctx = unsafe { &mut *user_ctx.cast::<FastTickContext>() };
    ctx.scheduler.fast_tick(&SHARED, &mut ctx.port);
    // No task was woken.
    false
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn zero_cross_isr(arg: *mut core::ffi::c_void) {
    // SAFETY: arg is the leaked GpTimerPhase registered in
    // start_tick_timer(); only this ISR dereferences it.
    let phase = unsafe { &mut *arg.cast::<GpTimerPhase>() };
    phase.reset_counter();
}

/// Create, arm and start the tick timer, then hook the zero-cross edge.
///
/// Call after [`hw_init::init_peripherals`] and after the heater has been
/// set up.  The scheduler is moved into the ISR and owned by it from then on.
#[cfg(target_os = "espidf")]
pub fn start_tick_timer(
    timer: &TimerConfig,
    scheduler: Scheduler,
    heater: &'static HeaterMutex<SsrDriver>,
) -> Result<(), HwInitError> {
    let ctx: &'static mut FastTickContext = Box::leak(Box::new(FastTickContext {
        scheduler,
        port: BoardTickPort::new(heater),
    }));

    // SAFETY: called once from the main task before the loop starts.  The
    // handle and both ISR contexts are 'static (leaked) so they outlive
    // every callback.
    unsafe {
        let mut handle: gptimer_handle_t = core::ptr::null_mut();
        let cfg = gptimer_config_t {
            clk_src: soc_periph_gptimer_clk_src_t_GPTIMER_CLK_SRC_DEFAULT,
            direction: gptimer_count_direction_t_GPTIMER_COUNT_UP,
            resolution_hz: timer.resolution_hz,
            ..Default::default()
        };
        let ret = gptimer_new_timer(&cfg, &mut handle);
        if ret != ESP_OK {
            return Err(HwInitError::TimerInitFailed(ret));
        }

        let callbacks = gptimer_event_callbacks_t {
            on_alarm: Some(fast_tick_isr),
        };
        let ret = gptimer_register_event_callbacks(
            handle,
            &callbacks,
            (ctx as *mut FastTickContext).cast(),
        );
        if ret != ESP_OK {
            return Err(HwInitError::TimerInitFailed(ret));
        }

        let mut alarm = gptimer_alarm_config_t {
            alarm_count: u64::from(timer.period_ticks),
            reload_count: 0,
            ..Default::default()
        };
        alarm.flags.set_auto_reload_on_alarm(1);
        let ret = gptimer_set_alarm_action(handle, &alarm);
        if ret != ESP_OK {
            return Err(HwInitError::TimerInitFailed(ret));
        }

        let ret = gptimer_enable(handle);
        if ret != ESP_OK {
            return Err(HwInitError::TimerInitFailed(ret));
        }
        let ret = gptimer_start(handle);
        if ret != ESP_OK {
            return Err(HwInitError::TimerInitFailed(ret));
        }

        let phase: &'static mut GpTimerPhase = Box::leak(Box::new(GpTimerPhase {
            handle,
            preload: u64::from(timer.zero_cross_preload()),
        }));
        hw_init::init_isr_service(zero_cross_isr, (phase as *mut GpTimerPhase).cast())?;
    }

    info!(
        "hw_timer: fast tick {:.1} Hz free-running, compare {} ticks after zero-cross",
        timer.fast_tick_hz(),
        timer.compare_ticks
    );
    Ok(())
}
