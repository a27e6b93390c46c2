#![cfg_attr(not(target_os = "none"), allow(dead_code))]

//! Paired defmt / stdout log helpers for the control loop.

use tester_core::channels::{Channel, VoltageSnapshot};
use tester_core::controller::{OperatingMode, TesterError};
use tester_core::diagnostics::FaultFinding;
use tester_core::sequencer::{SequenceOutcome, SequenceReport};
use tester_core::signals::SignalStatus;

use crate::time::FirmwareInstant;

fn outcome_label(outcome: SequenceOutcome) -> &'static str {
    match outcome {
        SequenceOutcome::Completed => "completed",
        SequenceOutcome::Aborted => "aborted",
    }
}

#[cfg(target_os = "none")]
pub fn log_mode(mode: OperatingMode) {
    defmt::info!("mode: {}", mode.label());
}

#[cfg(not(target_os = "none"))]
pub fn log_mode(mode: OperatingMode) {
    println!("mode: {}", mode.label());
}

#[cfg(target_os = "none")]
pub fn log_message(message: &str) {
    defmt::info!("display: {}", message);
}

#[cfg(not(target_os = "none"))]
pub fn log_message(message: &str) {
    println!("display: {message}");
}

#[cfg(target_os = "none")]
pub fn log_test_channel(channel: Option<Channel>) {
    match channel {
        Some(channel) => {
            let profile = channel.profile();
            defmt::info!(
                "relay:{} energized pin={=u8} wire={}",
                channel.key(),
                profile.connector_pin,
                profile.wire_color
            );
        }
        None => defmt::info!("relay: all released"),
    }
}

#[cfg(not(target_os = "none"))]
pub fn log_test_channel(channel: Option<Channel>) {
    match channel {
        Some(channel) => {
            let profile = channel.profile();
            println!(
                "relay:{} energized pin={} wire={}",
                channel.key(),
                profile.connector_pin,
                profile.wire_color
            );
        }
        None => println!("relay: all released"),
    }
}

#[cfg(target_os = "none")]
pub fn log_voltages(snapshot: &VoltageSnapshot) {
    for (channel, volts) in snapshot.iter() {
        defmt::debug!(
            "adc:{} {=f32}V {}",
            channel.key(),
            volts,
            SignalStatus::classify(volts).label()
        );
    }
}

#[cfg(not(target_os = "none"))]
pub fn log_voltages(snapshot: &VoltageSnapshot) {
    for (channel, volts) in snapshot.iter() {
        println!(
            "adc:{} {volts:.1}V {}",
            channel.key(),
            SignalStatus::classify(volts).label()
        );
    }
}

#[cfg(target_os = "none")]
pub fn log_sequence(report: &SequenceReport, timestamp: FirmwareInstant) {
    defmt::info!(
        "sequence:{} {} steps={=usize} t={}us",
        report.preset.key(),
        outcome_label(report.outcome),
        report.completed_steps,
        timestamp.as_micros()
    );
}

#[cfg(not(target_os = "none"))]
pub fn log_sequence(report: &SequenceReport, timestamp: FirmwareInstant) {
    println!(
        "sequence:{} {} steps={} t={}us",
        report.preset.key(),
        outcome_label(report.outcome),
        report.completed_steps,
        timestamp.as_micros()
    );
}

#[cfg(target_os = "none")]
pub fn log_finding(finding: &FaultFinding) {
    let channel = finding.channel.map_or("-", Channel::key);
    defmt::warn!(
        "fault:{} channel={} {=f32}V confidence={=u8}%",
        finding.kind.code(),
        channel,
        finding.volts,
        finding.confidence
    );
}

#[cfg(not(target_os = "none"))]
pub fn log_finding(finding: &FaultFinding) {
    let channel = finding.channel.map_or("-", Channel::key);
    println!(
        "fault:{} channel={} {:.1}V confidence={}%",
        finding.kind.code(),
        channel,
        finding.volts,
        finding.confidence
    );
}

#[cfg(target_os = "none")]
pub fn log_error(error: &TesterError) {
    defmt::error!("controller: {}", defmt::Display2Format(error));
}

#[cfg(not(target_os = "none"))]
pub fn log_error(error: &TesterError) {
    println!("controller: {error}");
}

#[cfg(target_os = "none")]
pub fn log_indicator_fault() {
    defmt::error!("display: unavailable, falling back to log only");
}

#[cfg(not(target_os = "none"))]
pub fn log_indicator_fault() {
    println!("display: unavailable, falling back to log only");
}
