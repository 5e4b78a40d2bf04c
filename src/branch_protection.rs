use crate::ProtectionPolicy;
use serde::Serialize;

pub const NO_PROTECTION_ISSUE: &str = "No branch protection rules found";

/// Protection settings observed on a branch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BranchProtectionRules {
    pub required_pull_request_reviews: RequiredPullRequestReviews,
    pub required_status_checks: RequiredStatusChecks,
    pub enforce_admins: bool,
    pub required_linear_history: bool,
    pub allow_force_pushes: bool,
    pub allow_deletions: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RequiredPullRequestReviews {
    pub enabled: bool,
    pub required_approving_review_count: u8,
    pub dismiss_stale_reviews: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RequiredStatusChecks {
    pub enabled: bool,
    pub strict: bool,
    pub contexts: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Verification {
    pub compliant: bool,
    pub issues: Vec<String>,
}

impl Verification {
    fn from_issues(issues: Vec<String>) -> Self {
        Self {
            compliant: issues.is_empty(),
            issues,
        }
    }
}

/// Compares observed protection against the policy without touching the
/// network. Every check runs, so one failure never hides another.
pub fn verify(
    protection: Option<&BranchProtectionRules>,
    policy: &ProtectionPolicy,
) -> Verification {
    let Some(actual) = protection else {
        return Verification::from_issues(vec![NO_PROTECTION_ISSUE.to_string()]);
    };

    let mut issues = Vec::new();
    let reviews = &actual.required_pull_request_reviews;
    push_issue(
        &mut issues,
        reviews.enabled,
        "Required reviews not enabled".to_string(),
    );
    push_issue(
        &mut issues,
        reviews.required_approving_review_count >= policy.required_approving_review_count,
        format!(
            "Required review count is less than {}",
            policy.required_approving_review_count
        ),
    );
    push_issue(
        &mut issues,
        !actual.allow_force_pushes,
        "Force pushes are allowed".to_string(),
    );
    push_issue(
        &mut issues,
        !actual.allow_deletions,
        "Branch deletion is allowed".to_string(),
    );
    push_issue(
        &mut issues,
        !policy.enforce_admins || actual.enforce_admins,
        "Rules are not enforced for administrators".to_string(),
    );

    Verification::from_issues(issues)
}

fn push_issue(issues: &mut Vec<String>, passed: bool, message: String) {
    if !passed {
        issues.push(message);
    }
}
