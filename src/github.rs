use crate::{
    BranchProtectionRules, ProtectError, ProtectResult, ProtectionPolicy,
    RequiredPullRequestReviews, RequiredStatusChecks, Settings,
};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

pub const DEFAULT_API_URL: &str = "https://api.github.com";
const USER_AGENT: &str = "github-protect";
const ACCEPT: &str = "application/vnd.github+json";
const API_VERSION: &str = "2022-11-28";
// `/` stays literal: GitHub routes `release/1.0` as one branch name.
const BRANCH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// The GitHub operations the orchestrator depends on. Repository names are
/// given as configured; the implementation decides how to qualify them.
pub trait ProtectionApi {
    fn get_default_branch(&self, repo: &str) -> ProtectResult<String>;

    /// `Ok(None)` means the branch has no protection configured.
    fn get_branch_protection(
        &self,
        repo: &str,
        branch: &str,
    ) -> ProtectResult<Option<BranchProtectionRules>>;

    fn set_branch_protection(
        &self,
        repo: &str,
        branch: &str,
        policy: &ProtectionPolicy,
    ) -> ProtectResult<()>;
}

pub struct GithubClient {
    base_url: String,
    token: String,
    owner: String,
}

impl GithubClient {
    pub fn with_base_url(token: String, owner: String, base_url: String) -> Self {
        Self {
            base_url,
            token,
            owner,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::with_base_url(
            settings.token.clone(),
            settings.owner.clone(),
            settings.api_url.clone(),
        )
    }

    /// Login of the token's user. Fails with `Auth` on rejected credentials.
    pub fn authenticated_user(&self) -> ProtectResult<String> {
        let user: GithubUser = self.get_json("/user", "authenticated user")?;
        Ok(user.login)
    }

    fn repo_path(&self, repo: &str) -> String {
        if repo.contains('/') {
            repo.to_string()
        } else {
            format!("{}/{repo}", self.owner)
        }
    }

    fn protection_path(&self, repo: &str, branch: &str) -> String {
        format!(
            "/repos/{}/branches/{}/protection",
            self.repo_path(repo),
            utf8_percent_encode(branch, BRANCH_SEGMENT)
        )
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn get_optional_json<T: DeserializeOwned>(
        &self,
        path: &str,
        context: &str,
    ) -> ProtectResult<Option<T>> {
        let url = self.url(path);
        debug!(%url, "GET");
        let request = ureq::get(&url)
            .header("User-Agent", USER_AGENT)
            .header("Accept", ACCEPT)
            .header("X-GitHub-Api-Version", API_VERSION)
            .header("Authorization", &format!("Bearer {}", self.token));
        let mut response = match request.call() {
            Ok(response) => response,
            Err(ureq::Error::StatusCode(404)) => return Ok(None),
            Err(ureq::Error::StatusCode(status)) => return Err(status_error(status, context)),
            Err(error) => return Err(ProtectError::GitHubApi(format!("{context}: {error}"))),
        };
        let parsed = response
            .body_mut()
            .read_json::<T>()
            .map_err(|error| ProtectError::GitHubApi(format!("{context}: {error}")))?;
        Ok(Some(parsed))
    }

    fn get_json<T: DeserializeOwned>(&self, path: &str, context: &str) -> ProtectResult<T> {
        self.get_optional_json(path, context)?
            .ok_or_else(|| status_error(404, context))
    }

    fn put_json<B: Serialize>(&self, path: &str, body: &B, context: &str) -> ProtectResult<()> {
        let url = self.url(path);
        debug!(%url, "PUT");
        let request = ureq::put(&url)
            .header("User-Agent", USER_AGENT)
            .header("Accept", ACCEPT)
            .header("X-GitHub-Api-Version", API_VERSION)
            .header("Authorization", &format!("Bearer {}", self.token));
        match request.send_json(body) {
            Ok(_) => Ok(()),
            Err(ureq::Error::StatusCode(status)) => Err(status_error(status, context)),
            Err(error) => Err(ProtectError::GitHubApi(format!("{context}: {error}"))),
        }
    }
}

impl ProtectionApi for GithubClient {
    fn get_default_branch(&self, repo: &str) -> ProtectResult<String> {
        let repo_path = self.repo_path(repo);
        let path = format!("/repos/{repo_path}");
        let repository: GithubRepository =
            self.get_json(&path, &format!("repository {repo_path}"))?;
        Ok(repository.default_branch)
    }

    fn get_branch_protection(
        &self,
        repo: &str,
        branch: &str,
    ) -> ProtectResult<Option<BranchProtectionRules>> {
        let repo_path = self.repo_path(repo);
        let path = self.protection_path(repo, branch);
        let response: Option<GithubBranchProtection> = self.get_optional_json(
            &path,
            &format!("branch protection for {repo_path}@{branch}"),
        )?;
        Ok(response.map(convert_protection_rules))
    }

    fn set_branch_protection(
        &self,
        repo: &str,
        branch: &str,
        policy: &ProtectionPolicy,
    ) -> ProtectResult<()> {
        // PUT replaces the whole protection, so carry over the status check
        // contexts that are already required.
        let contexts = self
            .get_branch_protection(repo, branch)?
            .map(|rules| rules.required_status_checks.contexts)
            .unwrap_or_default();
        let repo_path = self.repo_path(repo);
        let path = self.protection_path(repo, branch);
        let body = protection_request(policy, contexts);
        self.put_json(
            &path,
            &body,
            &format!("updating branch protection for {repo_path}@{branch}"),
        )
    }
}

fn status_error(status: u16, context: &str) -> ProtectError {
    match status {
        401 => ProtectError::Auth(format!("{context}: bad credentials (status 401)")),
        403 => ProtectError::Permission(format!(
            "{context}: token lacks the required access (status 403)"
        )),
        404 => ProtectError::NotFound(format!("{context} does not exist or is not accessible")),
        _ => ProtectError::GitHubApi(format!("{context}: status code {status}")),
    }
}

#[derive(Debug, Deserialize)]
struct GithubUser {
    login: String,
}

#[derive(Debug, Deserialize)]
struct GithubRepository {
    default_branch: String,
}

#[derive(Debug, Deserialize)]
struct GithubBranchProtection {
    required_pull_request_reviews: Option<GithubPullRequestReviews>,
    required_status_checks: Option<GithubStatusChecks>,
    enforce_admins: Option<GithubEnabled>,
    required_linear_history: Option<GithubEnabled>,
    allow_force_pushes: Option<GithubEnabled>,
    allow_deletions: Option<GithubEnabled>,
}

#[derive(Debug, Deserialize)]
struct GithubPullRequestReviews {
    #[serde(default)]
    required_approving_review_count: u8,
    #[serde(default)]
    dismiss_stale_reviews: bool,
}

#[derive(Debug, Deserialize)]
struct GithubStatusChecks {
    #[serde(default)]
    strict: bool,
    #[serde(default)]
    contexts: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct GithubEnabled {
    enabled: bool,
}

#[derive(Debug, Serialize)]
struct ProtectionRequest {
    required_status_checks: Option<StatusChecksRequest>,
    enforce_admins: bool,
    required_pull_request_reviews: PullRequestReviewsRequest,
    restrictions: Option<Value>,
    required_linear_history: bool,
    allow_force_pushes: bool,
    allow_deletions: bool,
}

#[derive(Debug, Serialize)]
struct StatusChecksRequest {
    strict: bool,
    contexts: Vec<String>,
}

#[derive(Debug, Serialize)]
struct PullRequestReviewsRequest {
    dismiss_stale_reviews: bool,
    required_approving_review_count: u8,
}

fn protection_request(policy: &ProtectionPolicy, contexts: Vec<String>) -> ProtectionRequest {
    ProtectionRequest {
        required_status_checks: policy.require_status_checks.then(|| StatusChecksRequest {
            strict: policy.strict_status_checks,
            contexts,
        }),
        enforce_admins: policy.enforce_admins,
        required_pull_request_reviews: PullRequestReviewsRequest {
            dismiss_stale_reviews: policy.dismiss_stale_reviews,
            required_approving_review_count: policy.required_approving_review_count,
        },
        restrictions: None,
        required_linear_history: policy.required_linear_history,
        allow_force_pushes: policy.allow_force_pushes,
        allow_deletions: policy.allow_deletions,
    }
}

fn convert_protection_rules(protection: GithubBranchProtection) -> BranchProtectionRules {
    BranchProtectionRules {
        required_pull_request_reviews: convert_pull_request_reviews(
            protection.required_pull_request_reviews,
        ),
        required_status_checks: convert_status_checks(protection.required_status_checks),
        enforce_admins: enabled(protection.enforce_admins),
        required_linear_history: enabled(protection.required_linear_history),
        allow_force_pushes: enabled(protection.allow_force_pushes),
        allow_deletions: enabled(protection.allow_deletions),
    }
}

fn enabled(value: Option<GithubEnabled>) -> bool {
    value.map(|value| value.enabled).unwrap_or(false)
}

fn convert_pull_request_reviews(
    reviews: Option<GithubPullRequestReviews>,
) -> RequiredPullRequestReviews {
    match reviews {
        Some(reviews) => RequiredPullRequestReviews {
            enabled: true,
            required_approving_review_count: reviews.required_approving_review_count,
            dismiss_stale_reviews: reviews.dismiss_stale_reviews,
        },
        None => RequiredPullRequestReviews::default(),
    }
}

fn convert_status_checks(checks: Option<GithubStatusChecks>) -> RequiredStatusChecks {
    match checks {
        Some(checks) => RequiredStatusChecks {
            enabled: true,
            strict: checks.strict,
            contexts: checks.contexts,
        },
        None => RequiredStatusChecks::default(),
    }
}
