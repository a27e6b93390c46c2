use core::ops::Add;
use core::time::Duration;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tester_core::buttons::{Button, ButtonEvent, ButtonTracker, InputEvent, Level};
use tester_core::channels::{Channel, VoltageSnapshot};
use tester_core::controller::{
    Dispatch, FULL_TEST_BANNER, GOODBYE_MESSAGE, ModeController, OperatingMode, READING_MESSAGE,
    TEST_ABORTED_MESSAGE, TEST_COMPLETE_MESSAGE, TESTING_MESSAGE, TesterError,
};
use tester_core::diagnostics::FaultKind;
use tester_core::peripherals::{
    ChannelReader, Indicator, PeripheralFault, RelayActuator, RelayStates,
};
use tester_core::sequencer::{Pacer, Pause, SequenceError, SequenceOutcome};
use tester_core::sequences::full_test;
use tester_core::time::MonotonicInstant;

#[test]
fn mode_press_cycles_modes_and_forces_all_off() {
    let bench = Bench::new();
    let mut controller = bench.controller();
    let mut pacer = ScriptedPacer::new();

    for expected in [
        OperatingMode::TrailerTester,
        OperatingMode::PassThrough,
        OperatingMode::VehicleTester,
    ] {
        let off_before = bench.all_off_calls.get();
        let dispatch = controller
            .handle(press(Button::Mode), &mut pacer)
            .expect("mode change should succeed");
        assert_eq!(dispatch, Dispatch::ModeChanged(expected));
        assert_eq!(controller.mode(), expected);
        assert_eq!(bench.all_off_calls.get(), off_before + 1);
        assert!(bench.relays.get().all_off());
        assert_eq!(bench.last_line().as_deref(), Some(expected.label()));
    }
}

#[test]
fn trailer_action_runs_full_sequence() {
    let bench = Bench::new();
    let mut controller = bench.controller();
    let mut pacer = ScriptedPacer::new();
    controller
        .handle(press(Button::Mode), &mut pacer)
        .expect("switch to trailer mode");

    let dispatch = controller
        .handle(press(Button::Action), &mut pacer)
        .expect("sequence should run");

    let report = match dispatch {
        Dispatch::SequenceFinished(report) => report,
        other => panic!("unexpected dispatch: {other:?}"),
    };
    assert_eq!(report.outcome, SequenceOutcome::Completed);
    assert_eq!(report.completed_steps, 6);
    assert_eq!(pacer.elapsed(), full_test().total_duration());
    assert_eq!(bench.max_energized.get(), 1, "relays must never overlap");
    assert!(bench.relays.get().all_off());

    let lines = bench.lines();
    assert!(lines.iter().any(|line| line == TESTING_MESSAGE));
    assert_eq!(lines.last().map(String::as_str), Some(TEST_COMPLETE_MESSAGE));
    assert!(lines.iter().any(|line| line == "channel tail"));
}

#[test]
fn vehicle_action_reads_and_diagnoses() {
    let bench = Bench::new();
    bench.set_voltage(Channel::Brake, 7.0);
    let mut controller = bench.controller();
    let mut pacer = ScriptedPacer::new();

    let dispatch = controller
        .handle(press(Button::Action), &mut pacer)
        .expect("detailed read");

    let outcome = match dispatch {
        Dispatch::ChannelsRead(outcome) => outcome,
        other => panic!("unexpected dispatch: {other:?}"),
    };
    assert_eq!(outcome.snapshot.get(Channel::Brake), 7.0);
    assert_eq!(outcome.findings.len(), 1);
    assert_eq!(outcome.findings[0].kind, FaultKind::VoltageDrop);
    assert_eq!(controller.history().len(), 1);
    assert_eq!(bench.all_off_calls.get(), 1, "only the start-up all-off");
}

#[test]
fn long_hold_in_vehicle_mode_runs_full_test_then_reads() {
    let bench = Bench::new();
    bench.set_voltage(Channel::Tail, 12.0);
    let mut controller = bench.controller();
    let mut pacer = ScriptedPacer::new();
    let mut tracker = ButtonTracker::new();

    assert!(tracker.sample(Level::High, Level::Low, MockInstant::millis(0)).is_empty());
    let events = tracker.sample(Level::High, Level::Low, MockInstant::millis(2_500));
    assert_eq!(
        events.as_slice(),
        &[InputEvent::new(Button::Action, ButtonEvent::LongPressed)]
    );

    let dispatch = controller
        .handle(events[0], &mut pacer)
        .expect("full test should succeed");
    let (sequence, read) = match dispatch {
        Dispatch::FullTest { sequence, read } => (sequence, read),
        other => panic!("unexpected dispatch: {other:?}"),
    };
    assert_eq!(sequence.outcome, SequenceOutcome::Completed);
    let read = read.expect("vehicle mode reads after the sequence");
    assert!(read.findings.is_empty());

    let expected = Duration::from_millis(1_000)
        + full_test().total_duration()
        + Duration::from_millis(500)
        + Duration::from_millis(1_000);
    assert_eq!(pacer.elapsed(), expected);

    let lines = bench.lines();
    let banner = position(&lines, FULL_TEST_BANNER);
    let testing = position(&lines, TESTING_MESSAGE);
    let complete = position(&lines, TEST_COMPLETE_MESSAGE);
    let reading = position(&lines, READING_MESSAGE);
    assert!(banner < testing && testing < complete && complete < reading);

    let release = tracker.sample(Level::High, Level::High, MockInstant::millis(2_600));
    assert!(release.is_empty(), "release after a long press emits nothing");
}

#[test]
fn short_hold_reports_pressed_on_release() {
    let mut tracker = ButtonTracker::new();
    tracker.sample(Level::High, Level::Low, MockInstant::millis(0));
    let events = tracker.sample(Level::High, Level::High, MockInstant::millis(1_000));
    assert_eq!(
        events.as_slice(),
        &[InputEvent::new(Button::Action, ButtonEvent::Pressed)]
    );
}

#[test]
fn long_hold_in_trailer_mode_skips_read() {
    let bench = Bench::new();
    let mut controller = bench.controller();
    let mut pacer = ScriptedPacer::new();
    controller.cycle_mode().expect("trailer mode");

    let dispatch = controller
        .handle(
            InputEvent::new(Button::Action, ButtonEvent::LongPressed),
            &mut pacer,
        )
        .expect("full test");
    match dispatch {
        Dispatch::FullTest { read: None, sequence } => {
            assert_eq!(sequence.outcome, SequenceOutcome::Completed);
        }
        other => panic!("unexpected dispatch: {other:?}"),
    }
    assert!(!bench.lines().iter().any(|line| line == READING_MESSAGE));
}

#[test]
fn abort_during_sequence_leaves_every_relay_off() {
    let bench = Bench::new();
    let mut controller = bench.controller();
    let mut pacer = ScriptedPacer::new();
    controller.cycle_mode().expect("trailer mode");
    pacer.abort_at = Some(MockInstant::millis(3_000));

    let dispatch = controller
        .handle(press(Button::Action), &mut pacer)
        .expect("abort is reported as an outcome");

    let report = match dispatch {
        Dispatch::SequenceFinished(report) => report,
        other => panic!("unexpected dispatch: {other:?}"),
    };
    assert_eq!(report.outcome, SequenceOutcome::Aborted);
    assert_eq!(report.completed_steps, 1);
    assert!(bench.relays.get().all_off());
    assert_eq!(bench.last_line().as_deref(), Some(TEST_ABORTED_MESSAGE));
}

#[test]
fn relay_failure_aborts_sequence_and_loop_recovers() {
    let bench = Bench::new();
    bench.fail_relay.set(Some(Channel::Brake));
    let mut controller = bench.controller();
    let mut pacer = ScriptedPacer::new();
    controller.cycle_mode().expect("trailer mode");

    let error = controller
        .handle(press(Button::Action), &mut pacer)
        .expect_err("brake relay fails");
    assert_eq!(
        error,
        TesterError::Sequence(SequenceError::Actuation {
            channel: Some(Channel::Brake),
            fault: PeripheralFault::Bus,
        })
    );
    assert!(bench.relays.get().all_off());
    assert_eq!(bench.terminal_errors.get(), 1);

    let mode = controller.cycle_mode().expect("controller keeps working");
    assert_eq!(mode, OperatingMode::PassThrough);
}

#[test]
fn read_failure_propagates_from_tick() {
    let bench = Bench::new();
    bench.fail_reads.set(true);
    let mut controller = bench.controller();

    let error = controller
        .tick(MockInstant::millis(0))
        .expect_err("reader is disconnected");
    assert_eq!(error, TesterError::Read(PeripheralFault::Disconnected));

    bench.fail_reads.set(false);
    assert!(
        controller
            .tick(MockInstant::millis(250))
            .expect("reader recovered")
            .is_some()
    );
}

#[test]
fn dropping_controller_forces_shutdown() {
    let bench = Bench::new();
    {
        let mut controller = bench.controller();
        let mut pacer = ScriptedPacer::new();
        controller.cycle_mode().expect("trailer mode");
        pacer.abort_at = Some(MockInstant::millis(100));
        controller
            .handle(press(Button::Action), &mut pacer)
            .expect("aborted run");
    }

    assert!(bench.relays.get().all_off());
    let lines = bench.lines();
    let goodbye = position(&lines, GOODBYE_MESSAGE);
    assert_eq!(lines.last().map(String::as_str), Some("<clear>"));
    assert_eq!(goodbye + 1, lines.len() - 1);
}

#[test]
fn failed_release_keeps_current_mode() {
    let bench = Bench::new();
    let mut controller = bench.controller();
    let mut pacer = ScriptedPacer::new();
    controller
        .handle(press(Button::Mode), &mut pacer)
        .expect("switch to trailer mode");
    controller
        .handle(press(Button::Action), &mut pacer)
        .expect("sequence runs");
    let lines_before = bench.lines().len();

    bench.failing_all_offs.set(1);
    let error = controller
        .handle(press(Button::Mode), &mut pacer)
        .expect_err("relays did not release");
    assert_eq!(error, TesterError::Relay(PeripheralFault::Bus));
    assert_eq!(controller.mode(), OperatingMode::TrailerTester);
    assert_eq!(bench.terminal_errors.get(), 1);
    assert_eq!(bench.lines().len(), lines_before, "banner must not change");

    let mode = controller.cycle_mode().expect("release succeeds on retry");
    assert_eq!(mode, OperatingMode::PassThrough);
    assert_eq!(bench.last_line().as_deref(), Some(OperatingMode::PassThrough.label()));
}

#[test]
fn failed_shutdown_is_retried_on_drop() {
    let bench = Bench::new();
    {
        let mut controller = bench.controller();
        bench.failing_all_offs.set(1);
        let calls_before = bench.all_off_calls.get();

        let error = controller.shutdown().expect_err("relays did not release");
        assert_eq!(error, TesterError::Relay(PeripheralFault::Bus));
        assert!(!controller.is_shut_down());
        assert_eq!(bench.all_off_calls.get(), calls_before + 1);
    }

    assert_eq!(bench.all_off_calls.get(), 3, "start, failed shutdown, retry on drop");
    assert!(bench.relays.get().all_off());
    assert_eq!(bench.lines().last().map(String::as_str), Some("<clear>"));

    let bench = Bench::new();
    let mut controller = bench.controller();
    controller.shutdown().expect("clean shutdown");
    let after_shutdown = bench.all_off_calls.get();
    drop(controller);
    assert_eq!(bench.all_off_calls.get(), after_shutdown, "no second release");
}

#[test]
fn abort_during_reading_banner_skips_read() {
    let bench = Bench::new();
    let mut controller = bench.controller();
    let mut pacer = ScriptedPacer::new();
    let banner_starts = Duration::from_millis(1_000)
        + full_test().total_duration()
        + Duration::from_millis(500);
    pacer.abort_at = Some(MockInstant::default() + banner_starts + Duration::from_millis(400));

    let dispatch = controller
        .handle(
            InputEvent::new(Button::Action, ButtonEvent::LongPressed),
            &mut pacer,
        )
        .expect("full test");
    match dispatch {
        Dispatch::FullTest { read: None, sequence } => {
            assert_eq!(sequence.outcome, SequenceOutcome::Completed);
        }
        other => panic!("unexpected dispatch: {other:?}"),
    }
    assert!(bench.lines().iter().any(|line| line == READING_MESSAGE));
    assert!(controller.history().is_empty());
}

fn press(button: Button) -> InputEvent {
    InputEvent::new(button, ButtonEvent::Pressed)
}

fn position(lines: &[String], needle: &str) -> usize {
    lines
        .iter()
        .position(|line| line == needle)
        .unwrap_or_else(|| panic!("missing indicator line {needle:?} in {lines:?}"))
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
struct MockInstant(u64);

impl MockInstant {
    fn millis(value: u64) -> Self {
        Self(value * 1_000)
    }
}

impl Add<Duration> for MockInstant {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self::Output {
        Self(self.0 + rhs.as_micros() as u64)
    }
}

impl MonotonicInstant for MockInstant {
    fn saturating_duration_since(&self, earlier: Self) -> Duration {
        Duration::from_micros(self.0.saturating_sub(earlier.0))
    }
}

/// Shared state observed through the peripherals the controller owns.
#[derive(Clone)]
struct Bench {
    voltages: Rc<Cell<VoltageSnapshot>>,
    fail_reads: Rc<Cell<bool>>,
    relays: Rc<Cell<RelayStates>>,
    max_energized: Rc<Cell<u32>>,
    all_off_calls: Rc<Cell<usize>>,
    fail_relay: Rc<Cell<Option<Channel>>>,
    failing_all_offs: Rc<Cell<usize>>,
    lines: Rc<RefCell<Vec<String>>>,
    terminal_errors: Rc<Cell<usize>>,
}

impl Bench {
    fn new() -> Self {
        Self {
            voltages: Rc::new(Cell::new(VoltageSnapshot::new())),
            fail_reads: Rc::new(Cell::new(false)),
            relays: Rc::new(Cell::new(RelayStates::new())),
            max_energized: Rc::new(Cell::new(0)),
            all_off_calls: Rc::new(Cell::new(0)),
            fail_relay: Rc::new(Cell::new(None)),
            failing_all_offs: Rc::new(Cell::new(0)),
            lines: Rc::new(RefCell::new(Vec::new())),
            terminal_errors: Rc::new(Cell::new(0)),
        }
    }

    fn controller(&self) -> ModeController<BenchReader, BenchRelays, BenchIndicator, MockInstant> {
        let mut controller = ModeController::new(
            BenchReader(self.clone()),
            BenchRelays(self.clone()),
            BenchIndicator(self.clone()),
        );
        controller.start().expect("controller start");
        controller
    }

    fn set_voltage(&self, channel: Channel, volts: f32) {
        let mut snapshot = self.voltages.get();
        snapshot.set(channel, volts);
        self.voltages.set(snapshot);
    }

    fn lines(&self) -> Vec<String> {
        self.lines.borrow().clone()
    }

    fn last_line(&self) -> Option<String> {
        self.lines.borrow().last().cloned()
    }
}

struct BenchReader(Bench);

impl ChannelReader for BenchReader {
    fn read_voltage(&mut self, channel: Channel) -> Result<f32, PeripheralFault> {
        if self.0.fail_reads.get() {
            return Err(PeripheralFault::Disconnected);
        }
        Ok(self.0.voltages.get().get(channel))
    }
}

struct BenchRelays(Bench);

impl RelayActuator for BenchRelays {
    fn set(&mut self, channel: Channel, energized: bool) -> Result<(), PeripheralFault> {
        if energized && self.0.fail_relay.get() == Some(channel) {
            return Err(PeripheralFault::Bus);
        }
        let mut states = self.0.relays.get();
        states.set(channel, energized);
        self.0.relays.set(states);
        let peak = self.0.max_energized.get().max(states.energized_count());
        self.0.max_energized.set(peak);
        Ok(())
    }

    fn all_off(&mut self) -> Result<(), PeripheralFault> {
        self.0.all_off_calls.set(self.0.all_off_calls.get() + 1);
        let failing = self.0.failing_all_offs.get();
        if failing > 0 {
            self.0.failing_all_offs.set(failing - 1);
            return Err(PeripheralFault::Bus);
        }
        self.0.relays.set(RelayStates::new());
        Ok(())
    }
}

struct BenchIndicator(Bench);

impl BenchIndicator {
    fn push(&self, line: String) {
        self.0.lines.borrow_mut().push(line);
    }
}

impl Indicator for BenchIndicator {
    fn show_mode(&mut self, mode: OperatingMode) -> Result<(), PeripheralFault> {
        self.push(mode.label().to_string());
        Ok(())
    }

    fn show_voltages(&mut self, _snapshot: &VoltageSnapshot) -> Result<(), PeripheralFault> {
        Ok(())
    }

    fn show_message(&mut self, message: &str) -> Result<(), PeripheralFault> {
        self.push(message.to_string());
        Ok(())
    }

    fn show_test_channel(&mut self, channel: Option<Channel>) -> Result<(), PeripheralFault> {
        if let Some(channel) = channel {
            self.push(format!("channel {channel}"));
        }
        Ok(())
    }

    fn clear(&mut self) -> Result<(), PeripheralFault> {
        self.push("<clear>".to_string());
        Ok(())
    }

    fn show_terminal_error(&mut self) {
        self.0.terminal_errors.set(self.0.terminal_errors.get() + 1);
    }
}

struct ScriptedPacer {
    start: MockInstant,
    now: MockInstant,
    abort_at: Option<MockInstant>,
}

impl ScriptedPacer {
    fn new() -> Self {
        Self {
            start: MockInstant::default(),
            now: MockInstant::default(),
            abort_at: None,
        }
    }

    fn elapsed(&self) -> Duration {
        self.now.saturating_duration_since(self.start)
    }
}

impl Pacer for ScriptedPacer {
    type Instant = MockInstant;

    fn now(&mut self) -> MockInstant {
        self.now
    }

    fn wait_until(&mut self, deadline: MockInstant) -> Pause {
        match self.abort_at {
            Some(abort_at) if abort_at <= deadline => {
                self.now = self.now.max(abort_at);
                Pause::Aborted
            }
            _ => {
                self.now = self.now.max(deadline);
                Pause::Elapsed
            }
        }
    }
}
