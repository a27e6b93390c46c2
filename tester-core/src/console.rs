//! Line-oriented bench console grammar.
//!
//! The simulator (and any future serial console) feeds one line at a time to
//! [`parse_command`]. Parsing is done with `winnow` directly over the input
//! `&str`; nothing allocates.

use core::fmt;
use core::time::Duration;

use winnow::ascii::{digit1, space0, space1};
use winnow::combinator::{alt, eof, opt, preceded};
use winnow::prelude::*;
use winnow::token::take_while;

use crate::channels::{Channel, VoltageSnapshot};
use crate::diagnostics::FaultKind;
use crate::sequences::SequencePreset;

/// Canned vehicle signal patterns.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SignalScenario {
    /// Every circuit at 12.0 V.
    All,
    /// Every circuit at 0 V.
    Off,
    /// Running lights: tail 12.0 V, aux 13.2 V.
    Running,
    /// Running lights plus brake and both turn signals.
    Braking,
}

impl SignalScenario {
    pub const ALL: [SignalScenario; 4] = [
        SignalScenario::All,
        SignalScenario::Off,
        SignalScenario::Running,
        SignalScenario::Braking,
    ];

    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            SignalScenario::All => "all",
            SignalScenario::Off => "off",
            SignalScenario::Running => "running",
            SignalScenario::Braking => "braking",
        }
    }

    /// Voltages the vehicle presents in this scenario.
    #[must_use]
    pub const fn snapshot(self) -> VoltageSnapshot {
        let running = VoltageSnapshot::new()
            .with(Channel::Tail, 12.0)
            .with(Channel::Aux, 13.2);
        match self {
            SignalScenario::All => VoltageSnapshot::new()
                .with(Channel::Brake, 12.0)
                .with(Channel::Tail, 12.0)
                .with(Channel::Left, 12.0)
                .with(Channel::Right, 12.0)
                .with(Channel::Aux, 12.0)
                .with(Channel::Reverse, 12.0),
            SignalScenario::Off => VoltageSnapshot::new(),
            SignalScenario::Running => running,
            SignalScenario::Braking => running
                .with(Channel::Brake, 11.8)
                .with(Channel::Left, 12.0)
                .with(Channel::Right, 12.0),
        }
    }

    fn from_key(word: &str) -> Option<Self> {
        SignalScenario::ALL
            .into_iter()
            .find(|scenario| scenario.key().eq_ignore_ascii_case(word))
    }
}

/// Parsed console command.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum ConsoleCommand<'a> {
    /// Short press of the mode button.
    Mode,
    /// Short press of the action button.
    Action,
    /// Holds the action button for the given time before releasing it.
    Hold(Duration),
    /// Sets the simulated vehicle voltage of one channel.
    Set { channel: Channel, volts: f32 },
    /// Flips one channel between 0 V and 12 V.
    Toggle(Channel),
    Signals(SignalScenario),
    Run(SequencePreset),
    /// Arms an abort that fires this long into the next sequence.
    AbortAfter(Duration),
    /// Lets the clock advance while the controller keeps polling.
    Wait(Duration),
    Status,
    Report,
    Trend(Channel),
    Intermittent(FaultKind),
    Help(Option<&'a str>),
}

/// Longest duration accepted by `hold`, `wait` and `abort-after`.
pub const MAX_DURATION: Duration = Duration::from_secs(3_600);

/// Console parse failure.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ConsoleError {
    Empty,
    UnknownCommand,
    /// Arguments did not match; carries the command's usage line.
    Usage(&'static str),
}

impl fmt::Display for ConsoleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsoleError::Empty => f.write_str("empty command"),
            ConsoleError::UnknownCommand => f.write_str("unknown command (try `help`)"),
            ConsoleError::Usage(usage) => write!(f, "usage: {usage}"),
        }
    }
}

/// Help entry for one console command.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct CommandHelp {
    pub name: &'static str,
    pub usage: &'static str,
    pub summary: &'static str,
}

impl CommandHelp {
    const fn new(name: &'static str, usage: &'static str, summary: &'static str) -> Self {
        Self {
            name,
            usage,
            summary,
        }
    }
}

/// Every command the console understands, in help order.
pub const COMMANDS: [CommandHelp; 14] = [
    CommandHelp::new("mode", "mode", "press the mode button"),
    CommandHelp::new("action", "action", "press the action button"),
    CommandHelp::new(
        "hold",
        "hold <duration>",
        "hold the action button (over 2s is a long press)",
    ),
    CommandHelp::new("set", "set <channel> <volts>", "set a vehicle signal voltage"),
    CommandHelp::new("toggle", "toggle <channel>", "switch a vehicle signal on or off"),
    CommandHelp::new(
        "signals",
        "signals <all|off|running|braking>",
        "load a canned vehicle signal pattern",
    ),
    CommandHelp::new(
        "run",
        "run <full|quick|turn|hazard>",
        "run a relay test sequence",
    ),
    CommandHelp::new(
        "abort-after",
        "abort-after <duration>",
        "abort the next sequence after a delay",
    ),
    CommandHelp::new("wait", "wait <duration>", "let time pass while polling"),
    CommandHelp::new("status", "status", "show mode, relays and signals"),
    CommandHelp::new("report", "report", "diagnose the current signals"),
    CommandHelp::new("trend", "trend <channel>", "voltage trend from history"),
    CommandHelp::new(
        "intermittent",
        "intermittent <fault>",
        "check whether a fault comes and goes",
    ),
    CommandHelp::new("help", "help [command]", "list commands or describe one"),
];

/// Looks up help for a command name.
#[must_use]
pub fn command_help(name: &str) -> Option<&'static CommandHelp> {
    COMMANDS
        .iter()
        .find(|entry| entry.name.eq_ignore_ascii_case(name))
}

/// Parses one console line.
pub fn parse_command(line: &str) -> Result<ConsoleCommand<'_>, ConsoleError> {
    let mut input = line.trim();
    if input.is_empty() {
        return Err(ConsoleError::Empty);
    }

    let name = keyword
        .parse_next(&mut input)
        .map_err(|_| ConsoleError::UnknownCommand)?;
    let help = command_help(name).ok_or(ConsoleError::UnknownCommand)?;

    arguments(help.name, &mut input)
        .and_then(|command| (space0, eof).parse_next(&mut input).map(|_| command))
        .map_err(|_| ConsoleError::Usage(help.usage))
}

fn arguments<'a>(name: &str, input: &mut &'a str) -> ModalResult<ConsoleCommand<'a>> {
    match name {
        "mode" => Ok(ConsoleCommand::Mode),
        "action" => Ok(ConsoleCommand::Action),
        "hold" => preceded(space1, duration).map(ConsoleCommand::Hold).parse_next(input),
        "set" => (preceded(space1, channel), preceded(space1, volts))
            .map(|(channel, volts)| ConsoleCommand::Set { channel, volts })
            .parse_next(input),
        "toggle" => preceded(space1, channel).map(ConsoleCommand::Toggle).parse_next(input),
        "signals" => preceded(space1, scenario).map(ConsoleCommand::Signals).parse_next(input),
        "run" => preceded(space1, preset).map(ConsoleCommand::Run).parse_next(input),
        "abort-after" => preceded(space1, duration)
            .map(ConsoleCommand::AbortAfter)
            .parse_next(input),
        "wait" => preceded(space1, duration).map(ConsoleCommand::Wait).parse_next(input),
        "status" => Ok(ConsoleCommand::Status),
        "report" => Ok(ConsoleCommand::Report),
        "trend" => preceded(space1, channel).map(ConsoleCommand::Trend).parse_next(input),
        "intermittent" => preceded(space1, fault_kind)
            .map(ConsoleCommand::Intermittent)
            .parse_next(input),
        // help
        _ => opt(preceded(space1, word))
            .map(ConsoleCommand::Help)
            .parse_next(input),
    }
}

fn keyword<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    take_while(1.., |c: char| c.is_ascii_alphabetic() || c == '-').parse_next(input)
}

fn word<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    take_while(1.., |c: char| c.is_ascii_alphanumeric() || c == '-' || c == '_').parse_next(input)
}

fn channel(input: &mut &str) -> ModalResult<Channel> {
    word.verify_map(|name: &str| name.parse::<Channel>().ok())
        .parse_next(input)
}

fn scenario(input: &mut &str) -> ModalResult<SignalScenario> {
    word.verify_map(SignalScenario::from_key).parse_next(input)
}

fn preset(input: &mut &str) -> ModalResult<SequencePreset> {
    word.verify_map(|name: &str| name.parse::<SequencePreset>().ok())
        .parse_next(input)
}

fn fault_kind(input: &mut &str) -> ModalResult<FaultKind> {
    word.verify_map(FaultKind::from_code).parse_next(input)
}

fn volts(input: &mut &str) -> ModalResult<f32> {
    take_while(1.., |c: char| c.is_ascii_digit() || c == '.')
        .verify_map(|text: &str| text.parse::<f32>().ok())
        .parse_next(input)
}

/// `<digits>ms` or `<digits>s`, at most [`MAX_DURATION`].
fn duration(input: &mut &str) -> ModalResult<Duration> {
    (
        digit1.verify_map(|digits: &str| digits.parse::<u64>().ok()),
        alt(("ms", "s")),
    )
        .verify_map(|(amount, unit): (u64, &str)| {
            let duration = if unit == "ms" {
                Duration::from_millis(amount)
            } else {
                Duration::from_secs(amount)
            };
            (duration <= MAX_DURATION).then_some(duration)
        })
        .parse_next(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_commands_parse() {
        assert_eq!(parse_command("mode"), Ok(ConsoleCommand::Mode));
        assert_eq!(parse_command("  ACTION  "), Ok(ConsoleCommand::Action));
        assert_eq!(parse_command("status"), Ok(ConsoleCommand::Status));
        assert_eq!(parse_command("report"), Ok(ConsoleCommand::Report));
        assert_eq!(parse_command("help"), Ok(ConsoleCommand::Help(None)));
    }

    #[test]
    fn durations_accept_milliseconds_and_seconds() {
        assert_eq!(
            parse_command("hold 2500ms"),
            Ok(ConsoleCommand::Hold(Duration::from_millis(2_500)))
        );
        assert_eq!(
            parse_command("wait 3s"),
            Ok(ConsoleCommand::Wait(Duration::from_secs(3)))
        );
        assert_eq!(
            parse_command("abort-after 1200ms"),
            Ok(ConsoleCommand::AbortAfter(Duration::from_millis(1_200)))
        );
        assert_eq!(parse_command("hold 2500"), Err(ConsoleError::Usage("hold <duration>")));
    }

    #[test]
    fn durations_are_capped_at_one_hour() {
        assert_eq!(
            parse_command("wait 3600s"),
            Ok(ConsoleCommand::Wait(MAX_DURATION))
        );
        assert_eq!(
            parse_command("wait 3601s"),
            Err(ConsoleError::Usage("wait <duration>"))
        );
        assert_eq!(
            parse_command("wait 99999999999s"),
            Err(ConsoleError::Usage("wait <duration>"))
        );
    }

    #[test]
    fn channel_arguments_use_catalog_keys() {
        assert_eq!(
            parse_command("set brake 11.8"),
            Ok(ConsoleCommand::Set {
                channel: Channel::Brake,
                volts: 11.8
            })
        );
        assert_eq!(
            parse_command("toggle Reverse"),
            Ok(ConsoleCommand::Toggle(Channel::Reverse))
        );
        assert_eq!(
            parse_command("trend ground"),
            Err(ConsoleError::Usage("trend <channel>"))
        );
    }

    #[test]
    fn presets_scenarios_and_faults_parse() {
        assert_eq!(
            parse_command("run hazard"),
            Ok(ConsoleCommand::Run(SequencePreset::Hazard))
        );
        assert_eq!(
            parse_command("signals braking"),
            Ok(ConsoleCommand::Signals(SignalScenario::Braking))
        );
        assert_eq!(
            parse_command("intermittent voltage_drop"),
            Ok(ConsoleCommand::Intermittent(FaultKind::VoltageDrop))
        );
        assert_eq!(
            parse_command("run strobe"),
            Err(ConsoleError::Usage("run <full|quick|turn|hazard>"))
        );
    }

    #[test]
    fn trailing_input_and_unknown_commands_are_rejected() {
        assert_eq!(parse_command(""), Err(ConsoleError::Empty));
        assert_eq!(parse_command("reboot"), Err(ConsoleError::UnknownCommand));
        assert_eq!(parse_command("mode now"), Err(ConsoleError::Usage("mode")));
        assert_eq!(parse_command("help run"), Ok(ConsoleCommand::Help(Some("run"))));
    }

    #[test]
    fn braking_scenario_extends_running_lights() {
        let braking = SignalScenario::Braking.snapshot();
        assert_eq!(braking.get(Channel::Tail), 12.0);
        assert_eq!(braking.get(Channel::Aux), 13.2);
        assert_eq!(braking.get(Channel::Brake), 11.8);
        assert_eq!(braking.get(Channel::Reverse), 0.0);
        assert!(SignalScenario::Off.snapshot().iter().all(|(_, volts)| volts == 0.0));
    }

    #[test]
    fn every_command_has_help() {
        for entry in &COMMANDS {
            assert!(entry.usage.starts_with(entry.name));
            assert_eq!(command_help(entry.name), Some(entry));
        }
    }
}
