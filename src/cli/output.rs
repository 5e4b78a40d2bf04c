use protect::{ComplianceSummary, VerificationResult};
use serde::Serialize;
use std::path::Path;

#[derive(Serialize)]
struct ResultsOutput<'a> {
    valid: bool,
    results: &'a [VerificationResult],
    summary: &'a ComplianceSummary,
    report: String,
}

impl<'a> ResultsOutput<'a> {
    fn new(
        results: &'a [VerificationResult],
        summary: &'a ComplianceSummary,
        report: &Path,
    ) -> Self {
        Self {
            valid: results.iter().all(|result| result.compliant),
            results,
            summary,
            report: report.display().to_string(),
        }
    }
}

pub(super) fn print_results_human(
    results: &[VerificationResult],
    summary: &ComplianceSummary,
    report: &Path,
) {
    for result in results {
        let branch = result.default_branch.as_deref().unwrap_or("unknown");
        if result.compliant {
            println!("✓ {} [{branch}]: Compliant", result.repository);
        } else {
            println!("✗ {} [{branch}]: Non-compliant", result.repository);
            for issue in &result.issues {
                println!("  - {issue}");
            }
        }
    }
    println!(
        "Summary: {} total, {} compliant, {} non-compliant ({})",
        summary.total,
        summary.compliant,
        summary.non_compliant,
        summary.rate_label()
    );
    println!("Report: {}", report.display());
}

pub(super) fn print_results_json(
    results: &[VerificationResult],
    summary: &ComplianceSummary,
    report: &Path,
) -> anyhow::Result<()> {
    let output = ResultsOutput::new(results, summary, report);
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

pub(super) fn print_results_yaml(
    results: &[VerificationResult],
    summary: &ComplianceSummary,
    report: &Path,
) -> anyhow::Result<()> {
    let output = ResultsOutput::new(results, summary, report);
    println!("{}", serde_yaml::to_string(&output)?);
    Ok(())
}
