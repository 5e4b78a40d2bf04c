mod branch_protection;
mod config;
mod github;
mod loader;
mod logging;
mod orchestrator;
mod pdf;
mod policy;
mod report;

pub use crate::branch_protection::{
    verify, BranchProtectionRules, RequiredPullRequestReviews, RequiredStatusChecks,
    Verification, NO_PROTECTION_ISSUE,
};
pub use crate::config::{
    load_config_file, load_settings, resolve_log_settings, ConfigFile, LogLevel, LogSettings,
    RepositoryOverride, Settings,
};
pub use crate::github::{GithubClient, ProtectionApi, DEFAULT_API_URL};
pub use crate::loader::{load_repository_list, parse_repository_list};
pub use crate::logging::init_logging;
pub use crate::orchestrator::{exit_code, Orchestrator, VerificationResult};
pub use crate::pdf::{render_pdf, report_file_name, write_report};
pub use crate::policy::ProtectionPolicy;
pub use crate::report::{Block, ComplianceSummary, ReportDocument, Section, TextStyle};

pub type ProtectResult<T> = Result<T, ProtectError>;

#[derive(thiserror::Error, Debug)]
pub enum ProtectError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("GitHub authentication failed: {0}")]
    Auth(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Permission denied: {0}")]
    Permission(String),
    #[error("GitHub API error: {0}")]
    GitHubApi(String),
    #[error("Report generation failed: {0}")]
    Report(String),
    #[error("Logging setup failed: {0}")]
    Logging(String),
    #[error("Interrupted")]
    Interrupted,
}

impl ProtectError {
    /// Errors that end the whole run instead of a single repository.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ProtectError::Auth(_) | ProtectError::Interrupted)
    }
}
