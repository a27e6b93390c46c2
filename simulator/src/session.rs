use std::cell::{Cell, RefCell};
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::rc::Rc;
use std::time::Duration;

use crossterm::style::{StyledContent, Stylize};
use tester_core::buttons::{ButtonTracker, Level};
use tester_core::channels::{
    ADC_FULL_SCALE_VOLTS, Channel, DIVIDER_RATIO, VoltageSnapshot, scale_raw_counts,
};
use tester_core::console::{COMMANDS, ConsoleCommand, ConsoleError, command_help, parse_command};
use tester_core::controller::{Dispatch, ModeController, OperatingMode, ReadOutcome};
use tester_core::diagnostics::history::TREND_MIN_SAMPLES;
use tester_core::diagnostics::report::format_report;
use tester_core::diagnostics::{DiagnosisEngine, FaultKind};
use tester_core::peripherals::{
    ChannelReader, Indicator, PeripheralFault, RelayActuator, RelayStates,
};
use tester_core::sequencer::{Pacer, Pause, SequenceOutcome, SequenceReport};
use tester_core::signals::{PassThroughStatus, SignalStatus};
use tester_core::time::{MicrosInstant, MonotonicInstant};

/// Step of the virtual clock while buttons are held or time passes.
const SAMPLE_STEP: Duration = Duration::from_millis(10);
/// How long `mode` and `action` keep the button down.
const TAP: Duration = Duration::from_millis(100);
/// Voltage `toggle` switches a channel to.
const TOGGLE_ON_VOLTS: f32 = 12.0;

type Controller = ModeController<SimulatedVehicle, RelayBank, TextIndicator, MicrosInstant>;
type Output = Rc<RefCell<Vec<String>>>;

#[derive(Clone, Debug, Default)]
pub struct SessionOptions {
    /// Emit ANSI colors for signal states.
    pub styled: bool,
    /// Append a timestamped transcript to this file.
    pub transcript: Option<String>,
}

/// Virtual monotonic clock shared by the session, pacer and indicator.
#[derive(Clone, Debug, Default)]
struct SimClock(Rc<Cell<MicrosInstant>>);

impl SimClock {
    fn now(&self) -> MicrosInstant {
        self.0.get()
    }

    fn advance(&self, duration: Duration) {
        self.0.set(self.now() + duration);
    }

    fn advance_to(&self, instant: MicrosInstant) {
        self.0.set(self.now().max(instant));
    }
}

fn stamp(now: MicrosInstant, text: &str) -> String {
    #[allow(clippy::cast_precision_loss)]
    let seconds = now.as_micros() as f64 / 1_000_000.0;
    format!("[{seconds:>8.3}s] {text}")
}

/// Vehicle side of the bench, quantized like a 16-bit converter behind the divider.
#[derive(Debug, Default)]
pub struct SimulatedVehicle {
    signals: VoltageSnapshot,
}

impl SimulatedVehicle {
    pub fn signals(&self) -> &VoltageSnapshot {
        &self.signals
    }

    pub fn set(&mut self, channel: Channel, volts: f32) {
        self.signals.set(channel, volts.max(0.0));
    }

    pub fn load(&mut self, snapshot: VoltageSnapshot) {
        self.signals = snapshot;
    }
}

impl ChannelReader for SimulatedVehicle {
    fn read_voltage(&mut self, channel: Channel) -> Result<f32, PeripheralFault> {
        let pin_volts = self.signals.get(channel) / DIVIDER_RATIO;
        let counts = (pin_volts / ADC_FULL_SCALE_VOLTS * 32_768.0)
            .round()
            .clamp(f32::from(i16::MIN), f32::from(i16::MAX));
        #[allow(clippy::cast_possible_truncation)]
        let counts = counts as i16;
        Ok(scale_raw_counts(counts))
    }
}

/// Relay outputs with a switch counter.
#[derive(Debug, Default)]
pub struct RelayBank {
    states: RelayStates,
    switch_count: usize,
}

impl RelayBank {
    pub fn states(&self) -> RelayStates {
        self.states
    }

    pub fn switch_count(&self) -> usize {
        self.switch_count
    }
}

impl RelayActuator for RelayBank {
    fn set(&mut self, channel: Channel, energized: bool) -> Result<(), PeripheralFault> {
        if self.states.is_energized(channel) != energized {
            self.switch_count += 1;
        }
        self.states.set(channel, energized);
        Ok(())
    }

    fn all_off(&mut self) -> Result<(), PeripheralFault> {
        self.states.clear();
        Ok(())
    }
}

/// Indicator that narrates every view as a timestamped line.
struct TextIndicator {
    clock: SimClock,
    output: Output,
    shown: Option<VoltageSnapshot>,
    highlighted: Option<Channel>,
}

impl TextIndicator {
    fn push(&self, text: &str) {
        self.output.borrow_mut().push(stamp(self.clock.now(), text));
    }
}

impl Indicator for TextIndicator {
    fn show_mode(&mut self, mode: OperatingMode) -> Result<(), PeripheralFault> {
        self.push(&format!("mode: {mode}"));
        Ok(())
    }

    fn show_voltages(&mut self, snapshot: &VoltageSnapshot) -> Result<(), PeripheralFault> {
        if self.shown.as_ref() == Some(snapshot) {
            return Ok(());
        }
        self.shown = Some(*snapshot);
        let active: Vec<String> = snapshot
            .iter()
            .filter(|(_, volts)| SignalStatus::classify(*volts) != SignalStatus::Off)
            .map(|(channel, volts)| format!("{channel}={volts:.1}V"))
            .collect();
        if active.is_empty() {
            self.push("signals: all off");
        } else {
            self.push(&format!("signals: {}", active.join(" ")));
        }
        Ok(())
    }

    fn show_message(&mut self, message: &str) -> Result<(), PeripheralFault> {
        self.push(&format!("display: {message}"));
        Ok(())
    }

    fn show_test_channel(&mut self, channel: Option<Channel>) -> Result<(), PeripheralFault> {
        match channel {
            Some(channel) => {
                let profile = channel.profile();
                self.push(&format!(
                    "relay: {} ({}, pin {}) ON",
                    profile.name, profile.wire_color, profile.connector_pin
                ));
            }
            None if self.highlighted.is_some() => self.push("relay: all off"),
            None => {}
        }
        self.highlighted = channel;
        Ok(())
    }

    fn clear(&mut self) -> Result<(), PeripheralFault> {
        self.shown = None;
        self.highlighted = None;
        self.push("display: cleared");
        Ok(())
    }

    fn show_terminal_error(&mut self) {
        self.push("display: ERROR");
    }
}

/// Pacer over the virtual clock with an optional armed abort.
struct VirtualPacer {
    clock: SimClock,
    abort_at: Option<MicrosInstant>,
}

impl Pacer for VirtualPacer {
    type Instant = MicrosInstant;

    fn now(&mut self) -> MicrosInstant {
        self.clock.now()
    }

    fn wait_until(&mut self, deadline: MicrosInstant) -> Pause {
        match self.abort_at {
            Some(abort_at) if abort_at <= deadline => {
                self.clock.advance_to(abort_at);
                Pause::Aborted
            }
            _ => {
                self.clock.advance_to(deadline);
                Pause::Elapsed
            }
        }
    }
}

pub struct Session {
    controller: Controller,
    clock: SimClock,
    tracker: ButtonTracker<MicrosInstant>,
    output: Output,
    pending_abort: Option<Duration>,
    styled: bool,
    transcript: Option<TranscriptLogger>,
}

impl Session {
    pub fn new(options: SessionOptions) -> io::Result<Self> {
        let transcript = options
            .transcript
            .as_deref()
            .map(TranscriptLogger::new)
            .transpose()?;
        let clock = SimClock::default();
        let output = Output::default();
        let indicator = TextIndicator {
            clock: clock.clone(),
            output: Rc::clone(&output),
            shown: None,
            highlighted: None,
        };
        let mut controller =
            ModeController::new(SimulatedVehicle::default(), RelayBank::default(), indicator);
        controller
            .start()
            .map_err(|error| io::Error::other(error.to_string()))?;

        let mut session = Self {
            controller,
            clock,
            tracker: ButtonTracker::new(),
            output,
            pending_abort: None,
            styled: options.styled,
            transcript,
        };
        session.poll();
        Ok(session)
    }

    pub fn mode(&self) -> OperatingMode {
        self.controller.mode()
    }

    pub fn relays(&self) -> RelayStates {
        self.controller.relays().states()
    }

    /// Takes every narrated line not yet returned.
    pub fn drain(&mut self) -> Vec<String> {
        self.output.borrow_mut().drain(..).collect()
    }

    pub fn handle_command(&mut self, line: &str) -> io::Result<Vec<String>> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }
        let elapsed = self.elapsed();
        if let Some(transcript) = self.transcript.as_mut() {
            transcript.append_line(elapsed, TranscriptRole::Host, trimmed)?;
        }

        let mut lines = match parse_command(trimmed) {
            Ok(command) => self.execute(command),
            Err(ConsoleError::Empty) => Vec::new(),
            Err(error) => vec![format!("ERR {error}")],
        };
        let mut narrated = self.drain();
        narrated.append(&mut lines);
        self.record_output(&narrated)?;
        Ok(narrated)
    }

    /// Releases every relay and says goodbye.
    pub fn shutdown(&mut self) -> io::Result<Vec<String>> {
        let mut lines = Vec::new();
        if let Err(error) = self.controller.shutdown() {
            lines.push(format!("ERR {error}"));
        }
        let mut narrated = self.drain();
        narrated.append(&mut lines);
        self.record_output(&narrated)?;
        Ok(narrated)
    }

    fn execute(&mut self, command: ConsoleCommand<'_>) -> Vec<String> {
        match command {
            ConsoleCommand::Mode => {
                self.drive(Level::Low, Level::High, TAP);
                self.drive(Level::High, Level::High, Duration::ZERO);
                Vec::new()
            }
            ConsoleCommand::Action => {
                self.drive(Level::High, Level::Low, TAP);
                self.drive(Level::High, Level::High, Duration::ZERO);
                Vec::new()
            }
            ConsoleCommand::Hold(duration) => {
                self.drive(Level::High, Level::Low, duration);
                self.drive(Level::High, Level::High, Duration::ZERO);
                Vec::new()
            }
            ConsoleCommand::Set { channel, volts } => {
                self.controller.reader_mut().set(channel, volts);
                vec![format!("{channel} set to {volts:.1}V")]
            }
            ConsoleCommand::Toggle(channel) => {
                let vehicle = self.controller.reader_mut();
                let volts = if vehicle.signals().is_active(channel) {
                    0.0
                } else {
                    TOGGLE_ON_VOLTS
                };
                vehicle.set(channel, volts);
                vec![format!("{channel} set to {volts:.1}V")]
            }
            ConsoleCommand::Signals(scenario) => {
                self.controller.reader_mut().load(scenario.snapshot());
                vec![format!("signals: {} loaded", scenario.key())]
            }
            ConsoleCommand::Run(preset) => {
                let mut pacer = self.pacer();
                match self.controller.run_preset(preset, &mut pacer) {
                    Ok(report) => self.sequence_lines(&report),
                    Err(error) => vec![format!("ERR {error}")],
                }
            }
            ConsoleCommand::AbortAfter(delay) => {
                self.pending_abort = Some(delay);
                vec![format!("next sequence aborts after {}", format_duration(delay))]
            }
            ConsoleCommand::Wait(duration) => {
                self.drive(Level::High, Level::High, duration);
                vec![format!("waited {}", format_duration(duration))]
            }
            ConsoleCommand::Status => self.status_lines(),
            ConsoleCommand::Report => {
                let snapshot = self.controller.reader_mut().signals;
                let findings = DiagnosisEngine::new().analyze(&snapshot);
                format_report(&findings).lines().map(str::to_string).collect()
            }
            ConsoleCommand::Trend(channel) => self.trend_lines(channel),
            ConsoleCommand::Intermittent(kind) => self.intermittent_lines(kind),
            ConsoleCommand::Help(topic) => help_lines(topic),
        }
    }

    /// Holds the given button levels for `duration`, sampling and polling
    /// every [`SAMPLE_STEP`].
    fn drive(&mut self, mode: Level, action: Level, duration: Duration) {
        let until = self.clock.now() + duration;
        loop {
            self.sample(mode, action);
            self.poll();
            if self.clock.now() >= until {
                break;
            }
            self.clock.advance(SAMPLE_STEP);
        }
    }

    fn sample(&mut self, mode: Level, action: Level) {
        let events = self.tracker.sample(mode, action, self.clock.now());
        for input in events {
            let mut pacer = self.pacer();
            let result = self.controller.handle(input, &mut pacer);
            let lines = match result {
                Ok(dispatch) => self.dispatch_lines(&dispatch),
                Err(error) => vec![format!("ERR {error}")],
            };
            self.emit(lines);
        }
    }

    fn poll(&mut self) {
        if let Err(error) = self.controller.tick(self.clock.now()) {
            self.emit(vec![format!("ERR {error}")]);
        }
    }

    fn pacer(&self) -> VirtualPacer {
        VirtualPacer {
            clock: self.clock.clone(),
            abort_at: self.pending_abort.map(|delay| self.clock.now() + delay),
        }
    }

    fn emit(&self, lines: Vec<String>) {
        self.output.borrow_mut().extend(lines);
    }

    fn dispatch_lines(&mut self, dispatch: &Dispatch) -> Vec<String> {
        match dispatch {
            Dispatch::ModeChanged(_) | Dispatch::Ignored => Vec::new(),
            Dispatch::SequenceFinished(report) => self.sequence_lines(report),
            Dispatch::ChannelsRead(outcome) => read_lines(outcome),
            Dispatch::FullTest { sequence, read } => {
                let mut lines = self.sequence_lines(sequence);
                if let Some(outcome) = read {
                    lines.extend(read_lines(outcome));
                }
                lines
            }
        }
    }

    fn sequence_lines(&mut self, report: &SequenceReport) -> Vec<String> {
        self.pending_abort = None;
        let outcome = match report.outcome {
            SequenceOutcome::Completed => "completed",
            SequenceOutcome::Aborted => "aborted",
        };
        vec![format!(
            "sequence {} {outcome} ({}/{} steps)",
            report.preset,
            report.completed_steps,
            report.preset.sequence().step_count()
        )]
    }

    /// In pass-through mode each channel line also compares the vehicle
    /// signal with the last reading taken through the harness.
    fn status_lines(&mut self) -> Vec<String> {
        let history = self.controller.history().len();
        let mut lines = vec![
            format!("mode: {}", self.controller.mode()),
            format!("relays: {}", self.controller.relays().states()),
            format!("history: {history} samples"),
        ];
        let harness = match self.controller.mode() {
            OperatingMode::PassThrough => self
                .controller
                .history()
                .latest()
                .map(|entry| entry.snapshot),
            OperatingMode::VehicleTester | OperatingMode::TrailerTester => None,
        };
        let signals = self.controller.reader_mut().signals;
        for (channel, volts) in signals.iter() {
            let status = SignalStatus::classify(volts);
            let label = if self.styled {
                style_status(status).to_string()
            } else {
                status.label().to_string()
            };
            let mut line = format!("  {:<14}{volts:>5.1}V  {label}", channel.profile().name);
            if let Some(harness) = &harness {
                let pass = PassThroughStatus::compare(volts, harness.get(channel));
                line.push_str(&format!("  pass {pass}"));
            }
            lines.push(line);
        }
        lines
    }

    fn trend_lines(&self, channel: Channel) -> Vec<String> {
        let history = self.controller.history();
        match history.trend(channel) {
            Some(trend) => vec![format!("trend {channel}: {}", trend.label())],
            None => vec![format!(
                "trend {channel}: need {TREND_MIN_SAMPLES} samples, have {}",
                history.len()
            )],
        }
    }

    fn intermittent_lines(&self, kind: FaultKind) -> Vec<String> {
        let history = self.controller.history();
        let occurrences = history.entries().filter(|entry| entry.contains(kind)).count();
        let verdict = if history.is_intermittent(kind) {
            "intermittent"
        } else {
            "not intermittent"
        };
        vec![format!(
            "{kind}: {verdict} ({occurrences} of {} samples)",
            history.len()
        )]
    }

    fn elapsed(&self) -> Duration {
        self.clock
            .now()
            .saturating_duration_since(MicrosInstant::default())
    }

    fn record_output(&mut self, lines: &[String]) -> io::Result<()> {
        let elapsed = self.elapsed();
        if let Some(transcript) = self.transcript.as_mut() {
            for line in lines {
                transcript.append_line(elapsed, TranscriptRole::Simulator, line)?;
            }
        }
        Ok(())
    }
}

fn read_lines(outcome: &ReadOutcome) -> Vec<String> {
    format_report(&outcome.findings)
        .lines()
        .map(str::to_string)
        .collect()
}

fn style_status(status: SignalStatus) -> StyledContent<&'static str> {
    let label = status.label();
    match status {
        SignalStatus::Off => label.dark_grey(),
        SignalStatus::Low | SignalStatus::Weak => label.yellow(),
        SignalStatus::Ok => label.green(),
        SignalStatus::High => label.red().bold(),
    }
}

fn help_lines(topic: Option<&str>) -> Vec<String> {
    match topic {
        None => COMMANDS
            .iter()
            .map(|entry| format!("{:<36}- {}", entry.usage, entry.summary))
            .collect(),
        Some(name) => match command_help(name) {
            Some(entry) => vec![format!("{} - {}", entry.usage, entry.summary)],
            None => vec![format!("ERR no help for `{name}`")],
        },
    }
}

fn format_duration(duration: Duration) -> String {
    if duration.as_secs() == 0 {
        format!("{}ms", duration.as_millis())
    } else {
        format!("{:.3}s", duration.as_secs_f64())
    }
}

struct TranscriptLogger {
    writer: BufWriter<File>,
}

impl TranscriptLogger {
    fn new(path: &str) -> io::Result<Self> {
        let path = Path::new(path);
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = File::options().create(true).append(true).open(path)?;
        let mut logger = Self {
            writer: BufWriter::new(file),
        };
        writeln!(logger.writer, "# trailer tester simulator transcript")?;
        logger.writer.flush()?;
        Ok(logger)
    }

    fn append_line(&mut self, elapsed: Duration, role: TranscriptRole, line: &str) -> io::Result<()> {
        writeln!(
            self.writer,
            "[{:>10.3}s] {} {}",
            elapsed.as_secs_f64(),
            role.prefix(),
            line
        )?;
        self.writer.flush()
    }
}

enum TranscriptRole {
    Host,
    Simulator,
}

impl TranscriptRole {
    fn prefix(&self) -> &'static str {
        match self {
            TranscriptRole::Host => "HOST>",
            TranscriptRole::Simulator => "SIM <",
        }
    }
}
