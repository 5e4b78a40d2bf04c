use crate::{BranchProtectionRules, RequiredPullRequestReviews, RequiredStatusChecks, Settings};
use serde::Serialize;

/// The protection every audited default branch must carry.
///
/// Only the approval count and the two boolean flags come from settings;
/// the rest is fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProtectionPolicy {
    pub required_approving_review_count: u8,
    pub dismiss_stale_reviews: bool,
    pub enforce_admins: bool,
    pub require_status_checks: bool,
    pub strict_status_checks: bool,
    pub required_linear_history: bool,
    pub allow_force_pushes: bool,
    pub allow_deletions: bool,
}

impl Default for ProtectionPolicy {
    fn default() -> Self {
        Self {
            required_approving_review_count: 1,
            dismiss_stale_reviews: true,
            enforce_admins: true,
            require_status_checks: true,
            strict_status_checks: true,
            required_linear_history: true,
            allow_force_pushes: false,
            allow_deletions: false,
        }
    }
}

impl ProtectionPolicy {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            required_approving_review_count: settings.required_approvals,
            enforce_admins: settings.enforce_admins,
            require_status_checks: settings.require_status_checks,
            ..Self::default()
        }
    }

    /// The rules GitHub reports back once this policy has been applied.
    pub fn expected_rules(&self) -> BranchProtectionRules {
        BranchProtectionRules {
            required_pull_request_reviews: RequiredPullRequestReviews {
                enabled: true,
                required_approving_review_count: self.required_approving_review_count,
                dismiss_stale_reviews: self.dismiss_stale_reviews,
            },
            required_status_checks: RequiredStatusChecks {
                enabled: self.require_status_checks,
                strict: self.require_status_checks && self.strict_status_checks,
                contexts: Vec::new(),
            },
            enforce_admins: self.enforce_admins,
            required_linear_history: self.required_linear_history,
            allow_force_pushes: self.allow_force_pushes,
            allow_deletions: self.allow_deletions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expected_rules_follow_policy_flags() {
        let policy = ProtectionPolicy {
            required_approving_review_count: 3,
            require_status_checks: false,
            ..ProtectionPolicy::default()
        };
        let rules = policy.expected_rules();
        assert_eq!(
            rules.required_pull_request_reviews.required_approving_review_count,
            3
        );
        assert!(!rules.required_status_checks.enabled);
        assert!(!rules.required_status_checks.strict);
        assert!(!rules.allow_force_pushes);
        assert!(rules.enforce_admins);
    }
}
