//! Numbered text report for a set of findings.

use core::fmt;

use super::FaultFinding;

/// Message rendered for an empty finding list.
pub const NO_FAULTS: &str = "No faults detected - all signals normal";

const RULE_WIDTH: usize = 40;

/// Display adapter over a finding slice.
#[derive(Copy, Clone, Debug)]
pub struct Report<'a>(pub &'a [FaultFinding]);

impl fmt::Display for Report<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_report(f, self.0)
    }
}

/// Writes the report for `findings` into any formatter sink.
pub fn write_report<W>(out: &mut W, findings: &[FaultFinding]) -> fmt::Result
where
    W: fmt::Write + ?Sized,
{
    if findings.is_empty() {
        return out.write_str(NO_FAULTS);
    }

    out.write_str("FAULT DIAGNOSIS REPORT\n")?;
    for _ in 0..RULE_WIDTH {
        out.write_char('=')?;
    }
    out.write_str("\n\n")?;

    for (index, finding) in findings.iter().enumerate() {
        writeln!(
            out,
            "{}. {} ({}% confidence)",
            index + 1,
            finding.kind,
            finding.confidence
        )?;
        writeln!(out, "   {}\n", finding.description())?;
        out.write_str("   Suggested Fixes:\n")?;
        for (fix_index, fix) in finding.remediation().iter().enumerate() {
            writeln!(out, "   {}. {fix}", fix_index + 1)?;
        }
        out.write_str("\n")?;
    }
    Ok(())
}

/// Renders the report into an owned string.
#[cfg(feature = "alloc")]
#[must_use]
pub fn format_report(findings: &[FaultFinding]) -> alloc::string::String {
    use alloc::string::ToString;

    Report(findings).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::Channel;
    use crate::diagnostics::FaultKind;

    fn render(findings: &[FaultFinding]) -> heapless::String<1024> {
        let mut out = heapless::String::new();
        write_report(&mut out, findings).expect("report fits");
        out
    }

    #[test]
    fn empty_report_is_single_line() {
        assert_eq!(render(&[]).as_str(), NO_FAULTS);
    }

    #[test]
    fn report_numbers_findings_and_fixes() {
        let findings = [
            FaultFinding::new(FaultKind::VoltageDrop, Some(Channel::Brake), 7.0),
            FaultFinding::new(FaultKind::WeakSignal, Some(Channel::Tail), 9.5),
        ];
        let text = render(&findings);

        assert!(text.starts_with(
            "FAULT DIAGNOSIS REPORT\n========================================\n\n1. VOLTAGE_DROP (85% confidence)\n   Brake (Blue) shows 7.0V - significant voltage drop\n\n   Suggested Fixes:\n   1. Clean connector pins with electrical contact cleaner\n   2. Check for loose connections at pin 2\n"
        ));
        assert!(text.contains(
            "   6. Apply dielectric grease to prevent corrosion\n\n2. WEAK_SIGNAL (70% confidence)\n"
        ));
        assert!(text.ends_with("   5. Inspect wire run for excessive length\n\n"));
    }
}
