use crate::VerificationResult;
use chrono::NaiveDateTime;
use serde::Serialize;

pub const REPORT_TITLE: &str = "GitHub Branch Protection Report";

const RECOMMENDATIONS: &[&str] = &[
    "1. Ensure all repositories have branch protection rules enabled",
    "",
    "2. Required settings for optimal security:",
    "   - Require pull request reviews",
    "   - Require at least 1 approving review",
    "   - Dismiss stale pull request approvals",
    "   - Require status checks to pass",
    "   - Enforce for administrators",
    "   - Prevent force pushes",
    "   - Prevent branch deletions",
    "",
    "3. Regular audits of branch protection settings are recommended",
];

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ComplianceSummary {
    pub total: usize,
    pub compliant: usize,
    pub non_compliant: usize,
    /// Percentage in `0.0..=100.0`; `0.0` for an empty run.
    pub compliance_rate: f64,
}

impl ComplianceSummary {
    pub fn from_results(results: &[VerificationResult]) -> Self {
        let total = results.len();
        let compliant = results.iter().filter(|result| result.compliant).count();
        let compliance_rate = if total == 0 {
            0.0
        } else {
            compliant as f64 / total as f64 * 100.0
        };
        Self {
            total,
            compliant,
            non_compliant: total - compliant,
            compliance_rate,
        }
    }

    pub fn rate_label(&self) -> String {
        format!("{:.1}%", self.compliance_rate)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextStyle {
    Normal,
    Bold,
    Pass,
    Fail,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Text { text: String, style: TextStyle },
    Bullet(String),
    Spacer,
}

impl Block {
    fn text(text: impl Into<String>) -> Self {
        Block::Text {
            text: text.into(),
            style: TextStyle::Normal,
        }
    }

    fn styled(text: impl Into<String>, style: TextStyle) -> Self {
        Block::Text {
            text: text.into(),
            style,
        }
    }
}

/// A titled part of the report. Each section starts on a fresh page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub title: String,
    pub blocks: Vec<Block>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportDocument {
    pub title: String,
    pub generated_at: NaiveDateTime,
    pub summary: ComplianceSummary,
    pub sections: Vec<Section>,
}

impl ReportDocument {
    pub fn assemble(results: &[VerificationResult], generated_at: NaiveDateTime) -> Self {
        let summary = ComplianceSummary::from_results(results);
        let sections = vec![
            summary_section(&summary, generated_at),
            details_section(results),
            recommendations_section(),
        ];
        Self {
            title: REPORT_TITLE.to_string(),
            generated_at,
            summary,
            sections,
        }
    }
}

fn summary_section(summary: &ComplianceSummary, generated_at: NaiveDateTime) -> Section {
    Section {
        title: "Executive Summary".to_string(),
        blocks: vec![
            Block::text(format!(
                "Generated: {}",
                generated_at.format("%Y-%m-%d %H:%M:%S")
            )),
            Block::Spacer,
            Block::text(format!("Total Repositories Scanned: {}", summary.total)),
            Block::text(format!("Compliant Repositories: {}", summary.compliant)),
            Block::text(format!(
                "Non-compliant Repositories: {}",
                summary.non_compliant
            )),
            Block::text(format!("Compliance Rate: {}", summary.rate_label())),
        ],
    }
}

fn details_section(results: &[VerificationResult]) -> Section {
    let mut blocks = Vec::new();
    if results.is_empty() {
        blocks.push(Block::text("No repositories were processed."));
    }
    for result in results {
        let header_style = if result.compliant {
            TextStyle::Pass
        } else {
            TextStyle::Fail
        };
        blocks.push(Block::styled(
            format!("Repository: {}", result.repository),
            header_style,
        ));
        blocks.push(Block::text(format!(
            "Default Branch: {}",
            result.default_branch.as_deref().unwrap_or("unknown")
        )));
        blocks.push(Block::text(if result.compliant {
            "Status: [PASS] Compliant"
        } else {
            "Status: [FAIL] Non-compliant"
        }));
        if !result.compliant && !result.issues.is_empty() {
            blocks.push(Block::styled("Issues Found:", TextStyle::Bold));
            blocks.extend(result.issues.iter().cloned().map(Block::Bullet));
        }
        blocks.push(Block::Spacer);
    }
    Section {
        title: "Detailed Results".to_string(),
        blocks,
    }
}

fn recommendations_section() -> Section {
    Section {
        title: "Recommendations".to_string(),
        blocks: RECOMMENDATIONS.iter().map(|line| Block::text(*line)).collect(),
    }
}
