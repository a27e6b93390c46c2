//! Operating-mode state machine.
//!
//! [`ModeController`] owns the peripherals and reacts to debounced button
//! events. It is driven by one cooperative loop: feed it [`InputEvent`]s via
//! [`ModeController::handle`] and call [`ModeController::tick`] on every pass
//! so the vehicle and pass-through modes keep polling. Relays are only
//! commanded from here and from the sequencer while it borrows them.

use core::fmt;
use core::time::Duration;

use crate::buttons::{Button, ButtonEvent, InputEvent};
use crate::channels::VoltageSnapshot;
use crate::diagnostics::history::DEFAULT_HISTORY_CAPACITY;
use crate::diagnostics::{DiagnosisEngine, DiagnosticHistory, Findings};
use crate::peripherals::{ChannelReader, Indicator, PeripheralFault, RelayActuator};
use crate::sequencer::{
    self, Pacer, Pause, RunEvent, SequenceError, SequenceObserver, SequenceOutcome,
    SequenceReport,
};
use crate::sequences::SequencePreset;
use crate::time::MonotonicInstant;

/// Banner shown before a long-press full test.
pub const FULL_TEST_BANNER: &str = "FULL TEST";
/// Shown while a relay sequence runs.
pub const TESTING_MESSAGE: &str = "Testing trailer...";
pub const TEST_COMPLETE_MESSAGE: &str = "Test complete!";
pub const TEST_ABORTED_MESSAGE: &str = "Test aborted";
/// Shown before the vehicle-mode read that follows a full test.
pub const READING_MESSAGE: &str = "Reading inputs...";
pub const GOODBYE_MESSAGE: &str = "Goodbye!";

/// Delay between the full-test banner and the sequence.
pub const FULL_TEST_LEAD_IN: Duration = Duration::from_millis(1_000);
/// Delay after the full-test sequence before the read banner.
pub const FULL_TEST_READ_GAP: Duration = Duration::from_millis(500);
/// Time the read banner stays up before channels are read.
pub const FULL_TEST_READ_BANNER: Duration = Duration::from_millis(1_000);

/// Operating modes, cycled in a fixed round-robin.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum OperatingMode {
    /// Reads the tow vehicle's outputs.
    #[default]
    VehicleTester,
    /// Drives relays to exercise the trailer.
    TrailerTester,
    /// Monitors signals passing from vehicle to trailer.
    PassThrough,
}

impl OperatingMode {
    pub const ALL: [OperatingMode; 3] = [
        OperatingMode::VehicleTester,
        OperatingMode::TrailerTester,
        OperatingMode::PassThrough,
    ];

    #[must_use]
    pub const fn next(self) -> Self {
        match self {
            OperatingMode::VehicleTester => OperatingMode::TrailerTester,
            OperatingMode::TrailerTester => OperatingMode::PassThrough,
            OperatingMode::PassThrough => OperatingMode::VehicleTester,
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            OperatingMode::VehicleTester => "VEHICLE_TESTER",
            OperatingMode::TrailerTester => "TRAILER_TESTER",
            OperatingMode::PassThrough => "PASS_THROUGH",
        }
    }

    /// `true` for modes that poll the channel readers continuously.
    #[must_use]
    pub const fn polls_inputs(self) -> bool {
        matches!(
            self,
            OperatingMode::VehicleTester | OperatingMode::PassThrough
        )
    }
}

impl fmt::Display for OperatingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Runtime knobs for the controller.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ControllerConfig {
    /// Interval between continuous reads in the polling modes.
    pub poll_interval: Duration,
    /// Whether continuous reads are diagnosed and recorded in the history.
    pub analyze_polls: bool,
}

impl ControllerConfig {
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Self::DEFAULT_POLL_INTERVAL,
            analyze_polls: true,
        }
    }
}

/// Errors surfaced to the control loop.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TesterError {
    Read(PeripheralFault),
    Relay(PeripheralFault),
    Indicator(PeripheralFault),
    Sequence(SequenceError),
}

impl fmt::Display for TesterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TesterError::Read(fault) => write!(f, "channel read failed: {fault}"),
            TesterError::Relay(fault) => write!(f, "relay command failed: {fault}"),
            TesterError::Indicator(fault) => write!(f, "indicator update failed: {fault}"),
            TesterError::Sequence(error) => write!(f, "test sequence failed: {error}"),
        }
    }
}

impl From<SequenceError> for TesterError {
    fn from(error: SequenceError) -> Self {
        TesterError::Sequence(error)
    }
}

/// Snapshot read from the channels together with its diagnosis.
#[derive(Clone, Debug, PartialEq)]
pub struct ReadOutcome {
    pub snapshot: VoltageSnapshot,
    pub findings: Findings,
}

/// What a button event caused.
#[derive(Clone, Debug, PartialEq)]
pub enum Dispatch {
    ModeChanged(OperatingMode),
    SequenceFinished(SequenceReport),
    ChannelsRead(ReadOutcome),
    /// Long-press flow; `read` is present only in vehicle mode.
    FullTest {
        sequence: SequenceReport,
        read: Option<ReadOutcome>,
    },
    Ignored,
}

/// Forwards sequencer transitions to the indicator, keeping the first fault.
struct IndicatorObserver<'a, I: ?Sized> {
    indicator: &'a mut I,
    fault: Option<PeripheralFault>,
}

impl<I> SequenceObserver for IndicatorObserver<'_, I>
where
    I: Indicator + ?Sized,
{
    fn on_event(&mut self, event: RunEvent) {
        let shown = match event {
            RunEvent::StepStarted { step, .. } => self.indicator.show_test_channel(step.channel),
            RunEvent::Settling { .. } | RunEvent::Completed => {
                self.indicator.show_test_channel(None)
            }
        };
        if let (Err(fault), None) = (shown, self.fault) {
            self.fault = Some(fault);
        }
    }
}

/// Mode/test control state machine.
pub struct ModeController<R, A, I, T, const H: usize = DEFAULT_HISTORY_CAPACITY>
where
    R: ChannelReader,
    A: RelayActuator,
    I: Indicator,
    T: MonotonicInstant,
{
    mode: OperatingMode,
    reader: R,
    relays: A,
    indicator: I,
    engine: DiagnosisEngine,
    history: DiagnosticHistory<T, H>,
    config: ControllerConfig,
    last_poll: Option<T>,
    shut_down: bool,
}

impl<R, A, I, T, const H: usize> ModeController<R, A, I, T, H>
where
    R: ChannelReader,
    A: RelayActuator,
    I: Indicator,
    T: MonotonicInstant,
{
    pub fn new(reader: R, relays: A, indicator: I) -> Self {
        Self::with_config(reader, relays, indicator, ControllerConfig::default())
    }

    pub fn with_config(reader: R, relays: A, indicator: I, config: ControllerConfig) -> Self {
        Self {
            mode: OperatingMode::default(),
            reader,
            relays,
            indicator,
            engine: DiagnosisEngine::new(),
            history: DiagnosticHistory::new(),
            config,
            last_poll: None,
            shut_down: false,
        }
    }

    #[must_use]
    pub fn mode(&self) -> OperatingMode {
        self.mode
    }

    #[must_use]
    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    #[must_use]
    pub fn engine(&self) -> &DiagnosisEngine {
        &self.engine
    }

    #[must_use]
    pub fn history(&self) -> &DiagnosticHistory<T, H> {
        &self.history
    }

    #[must_use]
    pub fn relays(&self) -> &A {
        &self.relays
    }

    #[must_use]
    pub fn indicator(&self) -> &I {
        &self.indicator
    }

    pub fn reader_mut(&mut self) -> &mut R {
        &mut self.reader
    }

    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    /// Puts the hardware in its idle state and shows the initial mode.
    pub fn start(&mut self) -> Result<(), TesterError> {
        self.shut_down = false;
        self.relays.all_off().map_err(TesterError::Relay)?;
        let mode = self.mode;
        self.indicate(|indicator| indicator.show_mode(mode))
    }

    /// Dispatches one debounced button event.
    ///
    /// Sequences run to completion inside this call, blocking on `pacer`.
    pub fn handle<P>(&mut self, input: InputEvent, pacer: &mut P) -> Result<Dispatch, TesterError>
    where
        P: Pacer<Instant = T> + ?Sized,
    {
        match (input.button, input.event) {
            (Button::Mode, ButtonEvent::Pressed) => self.cycle_mode().map(Dispatch::ModeChanged),
            (Button::Action, ButtonEvent::Pressed) => match self.mode {
                OperatingMode::TrailerTester => self
                    .run_preset(SequencePreset::Full, pacer)
                    .map(Dispatch::SequenceFinished),
                OperatingMode::VehicleTester | OperatingMode::PassThrough => {
                    let now = pacer.now();
                    self.detailed_read(now).map(Dispatch::ChannelsRead)
                }
            },
            (Button::Action, ButtonEvent::LongPressed) => self.full_test(pacer),
            (Button::Mode, ButtonEvent::Released | ButtonEvent::LongPressed)
            | (Button::Action, ButtonEvent::Released) => Ok(Dispatch::Ignored),
        }
    }

    /// Advances to the next mode with every relay released.
    ///
    /// The mode only changes once the relays are confirmed off; a failed
    /// release keeps the current mode and shows the terminal error view.
    pub fn cycle_mode(&mut self) -> Result<OperatingMode, TesterError> {
        if let Err(fault) = self.relays.all_off() {
            self.indicator.show_terminal_error();
            return Err(TesterError::Relay(fault));
        }
        self.mode = self.mode.next();
        self.last_poll = None;
        let mode = self.mode;
        self.indicate(|indicator| indicator.clear())?;
        self.indicate(|indicator| indicator.show_mode(mode))?;
        Ok(mode)
    }

    /// Continuous polling for the vehicle and pass-through modes.
    ///
    /// Reads at most once per poll interval; the first call after start or a
    /// mode change reads immediately.
    pub fn tick(&mut self, now: T) -> Result<Option<ReadOutcome>, TesterError> {
        if !self.mode.polls_inputs() {
            return Ok(None);
        }
        if let Some(last) = self.last_poll {
            if now.saturating_duration_since(last) < self.config.poll_interval {
                return Ok(None);
            }
        }
        self.last_poll = Some(now);

        let snapshot = self.reader.snapshot().map_err(TesterError::Read)?;
        self.indicate(|indicator| indicator.show_voltages(&snapshot))?;
        let findings = if self.config.analyze_polls {
            self.record(now, snapshot)
        } else {
            Findings::new()
        };
        Ok(Some(ReadOutcome { snapshot, findings }))
    }

    /// Reads every channel, shows it and records the diagnosis.
    pub fn detailed_read(&mut self, now: T) -> Result<ReadOutcome, TesterError> {
        let snapshot = self.reader.snapshot().map_err(TesterError::Read)?;
        self.indicate(|indicator| indicator.show_voltages(&snapshot))?;
        let findings = self.record(now, snapshot);
        Ok(ReadOutcome { snapshot, findings })
    }

    /// Runs one relay sequence with the indicator following along.
    pub fn run_preset<P>(
        &mut self,
        preset: SequencePreset,
        pacer: &mut P,
    ) -> Result<SequenceReport, TesterError>
    where
        P: Pacer<Instant = T> + ?Sized,
    {
        self.indicate(|indicator| indicator.show_message(TESTING_MESSAGE))?;

        let mut observer = IndicatorObserver {
            indicator: &mut self.indicator,
            fault: None,
        };
        let result = sequencer::run_sequence(
            &mut self.relays,
            &preset.sequence(),
            pacer,
            &mut observer,
        );
        let display_fault = observer.fault;

        let report = match result {
            Ok(report) => report,
            Err(error) => {
                let _ = self.indicator.show_test_channel(None);
                self.indicator.show_terminal_error();
                return Err(TesterError::Sequence(error));
            }
        };
        if let Some(fault) = display_fault {
            self.indicator.show_terminal_error();
            return Err(TesterError::Indicator(fault));
        }

        let message = match report.outcome {
            SequenceOutcome::Completed => TEST_COMPLETE_MESSAGE,
            SequenceOutcome::Aborted => TEST_ABORTED_MESSAGE,
        };
        self.indicate(|indicator| indicator.show_message(message))?;
        Ok(report)
    }

    /// Long-press flow: banner, full sequence and, in vehicle mode, a read.
    fn full_test<P>(&mut self, pacer: &mut P) -> Result<Dispatch, TesterError>
    where
        P: Pacer<Instant = T> + ?Sized,
    {
        self.indicate(|indicator| indicator.show_message(FULL_TEST_BANNER))?;
        if pacer.pause(FULL_TEST_LEAD_IN) == Pause::Aborted {
            self.relays.all_off().map_err(TesterError::Relay)?;
            let sequence = SequenceReport {
                preset: SequencePreset::Full,
                outcome: SequenceOutcome::Aborted,
                completed_steps: 0,
            };
            return Ok(Dispatch::FullTest {
                sequence,
                read: None,
            });
        }

        let sequence = self.run_preset(SequencePreset::Full, pacer)?;

        let read_inputs = self.mode == OperatingMode::VehicleTester
            && sequence.outcome == SequenceOutcome::Completed
            && pacer.pause(FULL_TEST_READ_GAP) == Pause::Elapsed;
        let read = if read_inputs {
            self.indicate(|indicator| indicator.show_message(READING_MESSAGE))?;
            if pacer.pause(FULL_TEST_READ_BANNER) == Pause::Elapsed {
                let now = pacer.now();
                Some(self.detailed_read(now)?)
            } else {
                None
            }
        } else {
            None
        };

        Ok(Dispatch::FullTest { sequence, read })
    }

    /// Releases every relay, says goodbye and blanks the indicator.
    ///
    /// Runs every step even when an earlier one fails and reports the first
    /// failure. Once the relays are released, calling it again is a no-op;
    /// until then every call (including the one on drop) retries.
    pub fn shutdown(&mut self) -> Result<(), TesterError> {
        if self.shut_down {
            return Ok(());
        }

        let relays = self.relays.all_off().map_err(TesterError::Relay);
        self.shut_down = relays.is_ok();
        let goodbye = self
            .indicator
            .show_message(GOODBYE_MESSAGE)
            .map_err(TesterError::Indicator);
        let cleared = self.indicator.clear().map_err(TesterError::Indicator);
        if goodbye.is_err() || cleared.is_err() {
            self.indicator.show_terminal_error();
        }
        relays.and(goodbye).and(cleared)
    }

    fn record(&mut self, now: T, snapshot: VoltageSnapshot) -> Findings {
        let findings = self.engine.analyze(&snapshot);
        self.history.add(now, snapshot, findings.clone());
        findings
    }

    fn indicate<F>(&mut self, update: F) -> Result<(), TesterError>
    where
        F: FnOnce(&mut I) -> Result<(), PeripheralFault>,
    {
        update(&mut self.indicator).map_err(|fault| {
            self.indicator.show_terminal_error();
            TesterError::Indicator(fault)
        })
    }
}

impl<R, A, I, T, const H: usize> Drop for ModeController<R, A, I, T, H>
where
    R: ChannelReader,
    A: RelayActuator,
    I: Indicator,
    T: MonotonicInstant,
{
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::Channel;
    use crate::peripherals::RelayStates;
    use crate::time::MicrosInstant;

    #[derive(Default)]
    struct StaticReader {
        snapshot: VoltageSnapshot,
        reads: usize,
    }

    impl ChannelReader for StaticReader {
        fn read_voltage(&mut self, channel: Channel) -> Result<f32, PeripheralFault> {
            if channel == Channel::Brake {
                self.reads += 1;
            }
            Ok(self.snapshot.get(channel))
        }
    }

    #[derive(Default)]
    struct TrackedRelays {
        states: RelayStates,
        all_off_calls: usize,
    }

    impl RelayActuator for TrackedRelays {
        fn set(&mut self, channel: Channel, energized: bool) -> Result<(), PeripheralFault> {
            self.states.set(channel, energized);
            Ok(())
        }

        fn all_off(&mut self) -> Result<(), PeripheralFault> {
            self.all_off_calls += 1;
            self.states.clear();
            Ok(())
        }
    }

    #[derive(Default)]
    struct QuietIndicator {
        mode: Option<OperatingMode>,
        cleared: usize,
        terminal_errors: usize,
    }

    impl Indicator for QuietIndicator {
        fn show_mode(&mut self, mode: OperatingMode) -> Result<(), PeripheralFault> {
            self.mode = Some(mode);
            Ok(())
        }

        fn show_voltages(&mut self, _snapshot: &VoltageSnapshot) -> Result<(), PeripheralFault> {
            Ok(())
        }

        fn show_message(&mut self, _message: &str) -> Result<(), PeripheralFault> {
            Ok(())
        }

        fn clear(&mut self) -> Result<(), PeripheralFault> {
            self.cleared += 1;
            Ok(())
        }

        fn show_terminal_error(&mut self) {
            self.terminal_errors += 1;
        }
    }

    struct InstantPacer(MicrosInstant);

    impl Pacer for InstantPacer {
        type Instant = MicrosInstant;

        fn now(&mut self) -> MicrosInstant {
            self.0
        }

        fn wait_until(&mut self, deadline: MicrosInstant) -> Pause {
            self.0 = self.0.max(deadline);
            Pause::Elapsed
        }
    }

    type Controller = ModeController<StaticReader, TrackedRelays, QuietIndicator, MicrosInstant>;

    fn controller() -> Controller {
        let mut controller = ModeController::new(
            StaticReader::default(),
            TrackedRelays::default(),
            QuietIndicator::default(),
        );
        controller.start().expect("start");
        controller
    }

    #[test]
    fn modes_cycle_round_robin() {
        let mut mode = OperatingMode::VehicleTester;
        for expected in [
            OperatingMode::TrailerTester,
            OperatingMode::PassThrough,
            OperatingMode::VehicleTester,
        ] {
            mode = mode.next();
            assert_eq!(mode, expected);
        }
    }

    #[test]
    fn mode_change_releases_relays_and_clears_view() {
        let mut controller = controller();
        let before = controller.relays().all_off_calls;
        let mode = controller.cycle_mode().expect("cycle");
        assert_eq!(mode, OperatingMode::TrailerTester);
        assert_eq!(controller.relays().all_off_calls, before + 1);
        assert_eq!(controller.indicator().cleared, 1);
        assert_eq!(controller.indicator().mode, Some(OperatingMode::TrailerTester));
    }

    #[test]
    fn tick_respects_poll_interval() {
        let mut controller = controller();
        let start = MicrosInstant::from_millis(0);
        assert!(controller.tick(start).expect("first").is_some());
        assert!(
            controller
                .tick(start + Duration::from_millis(249))
                .expect("early")
                .is_none()
        );
        assert!(
            controller
                .tick(start + Duration::from_millis(250))
                .expect("due")
                .is_some()
        );
        assert_eq!(controller.reader_mut().reads, 2);
        assert_eq!(controller.history().len(), 2);
    }

    #[test]
    fn trailer_mode_does_not_poll() {
        let mut controller = controller();
        controller.cycle_mode().expect("cycle");
        assert!(
            controller
                .tick(MicrosInstant::from_millis(0))
                .expect("tick")
                .is_none()
        );
    }

    #[test]
    fn polls_without_analysis_skip_history() {
        let mut controller: Controller = ModeController::with_config(
            StaticReader::default(),
            TrackedRelays::default(),
            QuietIndicator::default(),
            ControllerConfig {
                analyze_polls: false,
                ..ControllerConfig::default()
            },
        );
        let outcome = controller
            .tick(MicrosInstant::from_millis(0))
            .expect("tick")
            .expect("first tick reads");
        assert!(outcome.findings.is_empty());
        assert!(controller.history().is_empty());
    }

    #[test]
    fn released_events_are_ignored() {
        let mut controller = controller();
        let mut pacer = InstantPacer(MicrosInstant::from_millis(0));
        let dispatch = controller
            .handle(InputEvent::new(Button::Mode, ButtonEvent::Released), &mut pacer)
            .expect("handled");
        assert_eq!(dispatch, Dispatch::Ignored);
        assert_eq!(controller.mode(), OperatingMode::VehicleTester);
    }

    #[test]
    fn shutdown_is_idempotent_and_runs_on_drop() {
        let mut controller = controller();
        controller.shutdown().expect("shutdown");
        let calls = controller.relays().all_off_calls;
        controller.shutdown().expect("second shutdown");
        assert_eq!(controller.relays().all_off_calls, calls);
        assert!(controller.is_shut_down());
    }
}
