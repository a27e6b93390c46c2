//! Fault diagnosis over voltage snapshots.
//!
//! [`DiagnosisEngine::analyze`] classifies one [`VoltageSnapshot`] into
//! [`FaultFinding`]s sorted by descending confidence. Findings are small
//! `Copy` values; their descriptions and remediation steps are rendered on
//! demand from the channel catalog so no text is stored.

use core::fmt;

use heapless::Vec;

use crate::channels::{ACTIVE_FLOOR_VOLTS, CHANNEL_COUNT, Channel, VoltageSnapshot};

pub mod history;
pub mod report;

pub use history::{DiagnosticHistory, HistoryEntry, Trend};
pub use report::{Report, write_report};

/// Nominal circuit voltage.
pub const EXPECTED_VOLTS: f32 = 12.0;
/// Lower bound of a healthy active circuit.
pub const NORMAL_MIN_VOLTS: f32 = 11.0;
/// Active readings below this are a significant drop rather than a weak signal.
pub const WEAK_FLOOR_VOLTS: f32 = 9.0;
/// Readings below this on an expected-active circuit are an open circuit.
pub const OPEN_CIRCUIT_VOLTS: f32 = 0.5;
/// Left and right closer than this are treated as driven together.
pub const CROSS_WIRE_DELTA_VOLTS: f32 = 1.0;
/// Minimum active channels before a shared ground is suspected.
pub const GROUND_FAULT_MIN_ACTIVE: usize = 3;

/// Maximum findings a single snapshot can produce (one per channel plus the
/// cross-wire and ground checks).
pub const MAX_FINDINGS: usize = CHANNEL_COUNT + 2;
/// Longest remediation list of any fault kind.
pub const MAX_REMEDY_STEPS: usize = 6;

pub type Findings = Vec<FaultFinding, MAX_FINDINGS>;
pub type Remedies = Vec<RemedyStep, MAX_REMEDY_STEPS>;

/// Fault classes the engine can report.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum FaultKind {
    OpenCircuit,
    VoltageDrop,
    WeakSignal,
    PossibleCrossWire,
    GroundFault,
}

impl FaultKind {
    pub const ALL: [FaultKind; 5] = [
        FaultKind::OpenCircuit,
        FaultKind::VoltageDrop,
        FaultKind::WeakSignal,
        FaultKind::PossibleCrossWire,
        FaultKind::GroundFault,
    ];

    /// Stable identifier used in reports and logs.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            FaultKind::OpenCircuit => "OPEN_CIRCUIT",
            FaultKind::VoltageDrop => "VOLTAGE_DROP",
            FaultKind::WeakSignal => "WEAK_SIGNAL",
            FaultKind::PossibleCrossWire => "POSSIBLE_CROSS_WIRE",
            FaultKind::GroundFault => "GROUND_FAULT",
        }
    }

    /// Fixed confidence attached to every finding of this kind.
    #[must_use]
    pub const fn confidence(self) -> u8 {
        match self {
            FaultKind::OpenCircuit => 95,
            FaultKind::GroundFault => 90,
            FaultKind::VoltageDrop => 85,
            FaultKind::WeakSignal => 70,
            FaultKind::PossibleCrossWire => 60,
        }
    }

    /// Looks a kind up by its code, ignoring case.
    #[must_use]
    pub fn from_code(code: &str) -> Option<Self> {
        FaultKind::ALL
            .into_iter()
            .find(|kind| kind.code().eq_ignore_ascii_case(code))
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// One diagnosed fault.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct FaultFinding {
    pub kind: FaultKind,
    /// Circuit the finding is about; `None` for cross-wire and ground faults.
    pub channel: Option<Channel>,
    /// Voltage that triggered the finding (the mean for ground faults).
    pub volts: f32,
    pub confidence: u8,
}

impl FaultFinding {
    #[must_use]
    pub const fn new(kind: FaultKind, channel: Option<Channel>, volts: f32) -> Self {
        Self {
            kind,
            channel,
            volts,
            confidence: kind.confidence(),
        }
    }

    /// Human-readable description, rendered lazily.
    #[must_use]
    pub const fn description(&self) -> Description<'_> {
        Description(self)
    }

    /// Ordered repair suggestions.
    #[must_use]
    pub fn remediation(&self) -> Remedies {
        use RemedyStep::{InspectPin, LoosePin, Text, VerifyCircuit};

        let steps: &[RemedyStep] = match (self.kind, self.channel) {
            (FaultKind::OpenCircuit, Some(channel)) => &[
                Text("Check fuse in vehicle fuse panel"),
                InspectPin(channel),
                VerifyCircuit(channel),
                Text("Test wire continuity with multimeter"),
                Text("Check for broken wire in harness"),
            ],
            (FaultKind::VoltageDrop, Some(channel)) => &[
                Text("Clean connector pins with electrical contact cleaner"),
                LoosePin(channel),
                Text("Inspect wire for damage or corrosion"),
                Text("Verify adequate wire gauge (16-18 AWG minimum)"),
                Text("Check ground connection (Pin 1, White wire)"),
                Text("Apply dielectric grease to prevent corrosion"),
            ],
            (FaultKind::WeakSignal, _) => &[
                Text("Check battery voltage (should be 12.6V resting)"),
                Text("Clean connector contacts"),
                Text("Verify ground connection quality"),
                Text("Check for high-resistance connections"),
                Text("Inspect wire run for excessive length"),
            ],
            (FaultKind::PossibleCrossWire, _) => &[
                Text("Verify this is not hazard lights mode"),
                Text("Check wire colors: Left=Red(4), Right=Brown(5)"),
                Text("Inspect connector for crossed pins"),
                Text("Verify trailer wiring matches RV 7-Way standard"),
                Text("Check for short circuit between left/right wires"),
            ],
            (FaultKind::GroundFault, _) => &[
                Text("Inspect ground wire (Pin 1, White) connection"),
                Text("Clean ground connection at trailer frame"),
                Text("Verify ground wire is securely attached"),
                Text("Check for rust/corrosion at ground point"),
                Text("Install additional ground strap if needed"),
                Text("Verify ground wire gauge is adequate"),
            ],
            (FaultKind::OpenCircuit | FaultKind::VoltageDrop, None) => &[],
        };

        steps.iter().copied().collect()
    }
}

/// Display adapter returned by [`FaultFinding::description`].
pub struct Description<'a>(&'a FaultFinding);

impl fmt::Display for Description<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let finding = self.0;
        let volts = finding.volts;
        match (finding.kind, finding.channel.map(Channel::profile)) {
            (FaultKind::OpenCircuit, Some(profile)) => write!(
                f,
                "No signal on {} ({}) - reads {volts:.1}V (expected 12V)",
                profile.name, profile.wire_color
            ),
            (FaultKind::VoltageDrop, Some(profile)) => write!(
                f,
                "{} ({}) shows {volts:.1}V - significant voltage drop",
                profile.name, profile.wire_color
            ),
            (FaultKind::WeakSignal, Some(profile)) => write!(
                f,
                "{} ({}) reads {volts:.1}V - below normal (11-12V expected)",
                profile.name, profile.wire_color
            ),
            (FaultKind::PossibleCrossWire, _) => f.write_str(
                "Left and Right turn signals both active - possible cross-wiring or hazards",
            ),
            (FaultKind::GroundFault, _) => write!(
                f,
                "All channels read low ({volts:.1}V avg) - likely ground issue"
            ),
            (kind, None) => write!(f, "{kind} at {volts:.1}V"),
        }
    }
}

/// One remediation suggestion.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RemedyStep {
    Text(&'static str),
    InspectPin(Channel),
    LoosePin(Channel),
    VerifyCircuit(Channel),
}

impl fmt::Display for RemedyStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            RemedyStep::Text(text) => f.write_str(text),
            RemedyStep::InspectPin(channel) => {
                let profile = channel.profile();
                write!(
                    f,
                    "Inspect connector pin {} ({}) for corrosion",
                    profile.connector_pin, profile.wire_color
                )
            }
            RemedyStep::LoosePin(channel) => write!(
                f,
                "Check for loose connections at pin {}",
                channel.profile().connector_pin
            ),
            RemedyStep::VerifyCircuit(channel) => {
                write!(f, "Verify {} circuit bulbs/lights are functional", channel.key())
            }
        }
    }
}

/// Voltage bands used to classify active circuits.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DiagnosisThresholds {
    pub active_floor: f32,
    pub weak_floor: f32,
    pub normal_min: f32,
    pub open_circuit: f32,
    pub cross_wire_delta: f32,
    pub ground_min_active: usize,
}

impl Default for DiagnosisThresholds {
    fn default() -> Self {
        Self {
            active_floor: ACTIVE_FLOOR_VOLTS,
            weak_floor: WEAK_FLOOR_VOLTS,
            normal_min: NORMAL_MIN_VOLTS,
            open_circuit: OPEN_CIRCUIT_VOLTS,
            cross_wire_delta: CROSS_WIRE_DELTA_VOLTS,
            ground_min_active: GROUND_FAULT_MIN_ACTIVE,
        }
    }
}

/// Stateless classifier for voltage snapshots.
#[derive(Copy, Clone, Debug, Default)]
pub struct DiagnosisEngine {
    thresholds: DiagnosisThresholds,
}

impl DiagnosisEngine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn with_thresholds(thresholds: DiagnosisThresholds) -> Self {
        Self { thresholds }
    }

    #[must_use]
    pub const fn thresholds(&self) -> &DiagnosisThresholds {
        &self.thresholds
    }

    /// Classifies `snapshot`, highest confidence first.
    ///
    /// Channels at or below the active floor are treated as intentionally
    /// off and never produce per-channel findings. Open circuits are not
    /// reported here; see [`DiagnosisEngine::check_open_circuit`].
    #[must_use]
    pub fn analyze(&self, snapshot: &VoltageSnapshot) -> Findings {
        let mut findings = Findings::new();

        for (channel, volts) in snapshot.iter() {
            if let Some(finding) = self.classify_active(channel, volts) {
                let _ = findings.push(finding);
            }
        }
        if let Some(finding) = self.detect_cross_wire(snapshot) {
            let _ = findings.push(finding);
        }
        if let Some(finding) = self.detect_ground_fault(snapshot) {
            let _ = findings.push(finding);
        }

        sort_by_confidence(&mut findings);
        findings
    }

    /// Reports an open circuit for a channel that is expected to be driven.
    #[must_use]
    pub fn check_open_circuit(&self, channel: Channel, volts: f32) -> Option<FaultFinding> {
        (volts < self.thresholds.open_circuit)
            .then(|| FaultFinding::new(FaultKind::OpenCircuit, Some(channel), volts))
    }

    fn classify_active(&self, channel: Channel, volts: f32) -> Option<FaultFinding> {
        let t = &self.thresholds;
        if volts <= t.active_floor {
            return None;
        }
        if volts < t.weak_floor {
            Some(FaultFinding::new(FaultKind::VoltageDrop, Some(channel), volts))
        } else if volts < t.normal_min {
            Some(FaultFinding::new(FaultKind::WeakSignal, Some(channel), volts))
        } else {
            None
        }
    }

    fn detect_cross_wire(&self, snapshot: &VoltageSnapshot) -> Option<FaultFinding> {
        let left = snapshot.get(Channel::Left);
        let right = snapshot.get(Channel::Right);
        let floor = self.thresholds.active_floor;
        if left > floor && right > floor && (left - right).abs() < self.thresholds.cross_wire_delta
        {
            Some(FaultFinding::new(FaultKind::PossibleCrossWire, None, left))
        } else {
            None
        }
    }

    fn detect_ground_fault(&self, snapshot: &VoltageSnapshot) -> Option<FaultFinding> {
        let floor = self.thresholds.active_floor;
        let (count, sum) = snapshot
            .iter()
            .filter(|(_, volts)| *volts > floor)
            .fold((0usize, 0.0f32), |(count, sum), (_, volts)| (count + 1, sum + volts));

        if count < self.thresholds.ground_min_active {
            return None;
        }
        #[allow(clippy::cast_precision_loss)]
        let mean = sum / count as f32;
        (mean < self.thresholds.normal_min)
            .then(|| FaultFinding::new(FaultKind::GroundFault, None, mean))
    }
}

/// Stable descending sort on confidence.
fn sort_by_confidence(findings: &mut [FaultFinding]) {
    for index in 1..findings.len() {
        let mut cursor = index;
        while cursor > 0 && findings[cursor - 1].confidence < findings[cursor].confidence {
            findings.swap(cursor - 1, cursor);
            cursor -= 1;
        }
    }
}
