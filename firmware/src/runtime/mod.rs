use core::time::Duration as CoreDuration;

use cortex_m::interrupt;
use cortex_m::register::primask;
use critical_section::{self, RawRestoreState};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_stm32 as hal;
use embassy_stm32::adc::{Adc, AdcChannel};
use embassy_stm32::gpio::{Input, Level, Output, Pull, Speed};
use embassy_time::{Duration, Instant, Timer, block_for};
use tester_core::buttons::ButtonTracker;
use tester_core::controller::{Dispatch, ModeController, ReadOutcome};
use tester_core::sequencer::{Pacer, Pause};
use tester_core::time::MonotonicInstant;

use crate::hw::adc::DividerAdc;
use crate::hw::{FrontPanel, GpioRelays};
use crate::indicator::LogIndicator;
use crate::log;
use crate::status;
use crate::time::FirmwareInstant;

/// Interval between button samples and controller ticks.
const SAMPLE_INTERVAL: Duration = Duration::from_millis(10);
/// Granularity of blocking waits inside a sequence.
const PACE_SLICE: CoreDuration = CoreDuration::from_millis(10);

critical_section::set_impl!(InterruptCriticalSection);

struct InterruptCriticalSection;

unsafe impl critical_section::Impl for InterruptCriticalSection {
    unsafe fn acquire() -> RawRestoreState {
        let primask = primask::read();
        interrupt::disable();
        primask.is_active()
    }

    unsafe fn release(restore_state: RawRestoreState) {
        if restore_state {
            unsafe {
                interrupt::enable();
            }
        }
    }
}

type Controller<'d> = ModeController<DividerAdc<'d>, GpioRelays<'d>, LogIndicator, FirmwareInstant>;

fn now() -> FirmwareInstant {
    FirmwareInstant::from(Instant::now())
}

/// Blocking pacer for sequences; a fresh mode press aborts the wait.
struct PanelPacer<'a, 'd> {
    panel: &'a FrontPanel<'d>,
    mode_was_pressed: bool,
}

impl<'a, 'd> PanelPacer<'a, 'd> {
    fn new(panel: &'a FrontPanel<'d>) -> Self {
        Self {
            mode_was_pressed: panel.mode_level().is_pressed(),
            panel,
        }
    }

    fn abort_requested(&mut self) -> bool {
        let pressed = self.panel.mode_level().is_pressed();
        let edge = pressed && !self.mode_was_pressed;
        self.mode_was_pressed = pressed;
        edge
    }
}

impl Pacer for PanelPacer<'_, '_> {
    type Instant = FirmwareInstant;

    fn now(&mut self) -> FirmwareInstant {
        now()
    }

    fn wait_until(&mut self, deadline: FirmwareInstant) -> Pause {
        loop {
            if self.abort_requested() {
                return Pause::Aborted;
            }
            let current = now();
            if current >= deadline {
                return Pause::Elapsed;
            }
            let remaining = deadline.saturating_duration_since(current);
            let slice = remaining.min(PACE_SLICE);
            block_for(Duration::from_micros(
                u64::try_from(slice.as_micros()).unwrap_or(u64::MAX),
            ));
        }
    }
}

fn record_read(outcome: &ReadOutcome) {
    status::record_finding_count(outcome.findings.len());
    for finding in &outcome.findings {
        log::log_finding(finding);
    }
}

fn report(dispatch: &Dispatch, timestamp: FirmwareInstant) {
    match dispatch {
        Dispatch::ModeChanged(_) | Dispatch::Ignored => {}
        Dispatch::SequenceFinished(sequence) => log::log_sequence(sequence, timestamp),
        Dispatch::ChannelsRead(outcome) => record_read(outcome),
        Dispatch::FullTest { sequence, read } => {
            log::log_sequence(sequence, timestamp);
            if let Some(outcome) = read {
                record_read(outcome);
            }
        }
    }
}

#[embassy_executor::main]
pub async fn main(_spawner: Spawner) {
    let config = hal::Config::default();
    let hal::Peripherals {
        ADC1,
        PA0,
        PA1,
        PA4,
        PA5,
        PA6,
        PA7,
        PB3,
        PB4,
        PB5,
        PB6,
        PB7,
        PB8,
        PA8,
        PA15,
        ..
    } = hal::init(config);

    // Catalog order: brake, tail, left, right, aux, reverse.
    let relays = GpioRelays::new([
        Output::new(PB3, Level::Low, Speed::Low),
        Output::new(PB4, Level::Low, Speed::Low),
        Output::new(PB5, Level::Low, Speed::Low),
        Output::new(PB6, Level::Low, Speed::Low),
        Output::new(PB7, Level::Low, Speed::Low),
        Output::new(PB8, Level::Low, Speed::Low),
    ]);
    let reader = DividerAdc::new(
        Adc::new(ADC1),
        [
            PA0.degrade_adc(),
            PA1.degrade_adc(),
            PA4.degrade_adc(),
            PA5.degrade_adc(),
            PA6.degrade_adc(),
            PA7.degrade_adc(),
        ],
    );
    defmt::info!("adc: vdda={=f32}V", reader.vdda());
    let panel = FrontPanel::new(Input::new(PA8, Pull::Up), Input::new(PA15, Pull::Up));

    let mut controller: Controller<'_> = ModeController::new(reader, relays, LogIndicator::new());
    if let Err(error) = controller.start() {
        log::log_error(&error);
    }

    let mut tracker = ButtonTracker::new();
    loop {
        let events = tracker.sample(panel.mode_level(), panel.action_level(), now());
        for input in events {
            let mut pacer = PanelPacer::new(&panel);
            match controller.handle(input, &mut pacer) {
                Ok(dispatch) => report(&dispatch, now()),
                Err(error) => log::log_error(&error),
            }
        }

        match controller.tick(now()) {
            Ok(Some(outcome)) => record_read(&outcome),
            Ok(None) => {}
            Err(error) => log::log_error(&error),
        }

        Timer::after(SAMPLE_INTERVAL).await;
    }
}
