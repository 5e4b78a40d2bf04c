use crate::{load_repository_list, ProtectError, ProtectResult, DEFAULT_API_URL};
use regex::Regex;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_LOG_FILE: &str = "branch_protection.log";
const DEFAULT_PAUSE_SECONDS: u64 = 1;
const MAX_REQUIRED_APPROVALS: i64 = 6;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ConfigFile {
    #[serde(default)]
    pub repositories: Vec<String>,
    #[serde(default)]
    pub github: GithubConfig,
    #[serde(default)]
    pub policy: PolicyConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub run: RunConfig,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct GithubConfig {
    pub token: Option<String>,
    pub owner: Option<String>,
    pub api_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct PolicyConfig {
    pub required_approvals: Option<i64>,
    pub enforce_admins: Option<bool>,
    pub require_status_checks: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LoggingConfig {
    pub level: Option<String>,
    pub file: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RunConfig {
    pub pause_seconds: Option<u64>,
}

pub fn load_config_file(path: &Path) -> ProtectResult<Option<ConfigFile>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)?;
    let config = toml::from_str(&content)?;
    Ok(Some(config))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warning" | "warn" => Some(LogLevel::Warning),
            "error" => Some(LogLevel::Error),
            "critical" => Some(LogLevel::Critical),
            _ => None,
        }
    }

    /// `tracing` has no critical level; it shares `error`.
    pub fn as_filter(self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warn",
            LogLevel::Error | LogLevel::Critical => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub level: LogLevel,
    pub file: PathBuf,
}

/// Where the repository list comes from when the command line supplies one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepositoryOverride {
    Inline(Vec<String>),
    File(PathBuf),
}

#[derive(Clone)]
pub struct Settings {
    pub token: String,
    pub owner: String,
    pub repositories: Vec<String>,
    pub required_approvals: u8,
    pub enforce_admins: bool,
    pub require_status_checks: bool,
    pub log: LogSettings,
    pub api_url: String,
    pub pause: Duration,
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("token", &"<redacted>")
            .field("owner", &self.owner)
            .field("repositories", &self.repositories)
            .field("required_approvals", &self.required_approvals)
            .field("enforce_admins", &self.enforce_admins)
            .field("require_status_checks", &self.require_status_checks)
            .field("log", &self.log)
            .field("api_url", &self.api_url)
            .field("pause", &self.pause)
            .finish()
    }
}

impl Settings {
    pub fn from_env(
        file: Option<&ConfigFile>,
        repositories: Option<&RepositoryOverride>,
    ) -> ProtectResult<Self> {
        load_settings(|key| std::env::var(key).ok(), file, repositories)
    }
}

pub fn resolve_log_settings<F>(lookup: F, file: Option<&ConfigFile>) -> ProtectResult<LogSettings>
where
    F: Fn(&str) -> Option<String>,
{
    let logging = file.map(|file| &file.logging);
    let level = match non_empty(&lookup, "LOG_LEVEL")
        .or_else(|| logging.and_then(|logging| logging.level.clone()))
    {
        Some(value) => LogLevel::parse(&value).ok_or_else(|| {
            ProtectError::InvalidConfig(format!(
                "LOG_LEVEL must be one of debug, info, warning, error, critical (got '{value}')"
            ))
        })?,
        None => LogLevel::Info,
    };
    let file = non_empty(&lookup, "LOG_FILE")
        .map(PathBuf::from)
        .or_else(|| logging.and_then(|logging| logging.file.clone()))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE));
    Ok(LogSettings { level, file })
}

/// Builds settings from an environment lookup, the optional config file and
/// a command-line repository override, in increasing precedence.
pub fn load_settings<F>(
    lookup: F,
    file: Option<&ConfigFile>,
    repositories: Option<&RepositoryOverride>,
) -> ProtectResult<Settings>
where
    F: Fn(&str) -> Option<String>,
{
    let defaults = ConfigFile::default();
    let file_config = file.unwrap_or(&defaults);

    let token = non_empty(&lookup, "GITHUB_TOKEN")
        .or_else(|| file_config.github.token.clone())
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| missing("GITHUB_TOKEN"))?;
    let owner = non_empty(&lookup, "GITHUB_OWNER")
        .or_else(|| file_config.github.owner.clone())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| missing("GITHUB_OWNER"))?;

    let repositories = resolve_repositories(&lookup, file_config, repositories)?;
    if repositories.is_empty() {
        return Err(ProtectError::InvalidConfig(
            "No repositories specified; set REPOSITORIES or pass --repos/--repos-file".to_string(),
        ));
    }
    validate_repository_names(&repositories)?;

    let required_approvals = match non_empty(&lookup, "REQUIRED_APPROVALS") {
        Some(value) => value.trim().parse::<i64>().map_err(|_| {
            ProtectError::InvalidConfig(format!(
                "REQUIRED_APPROVALS must be an integer (got '{value}')"
            ))
        })?,
        None => file_config.policy.required_approvals.unwrap_or(1),
    };
    if required_approvals < 1 {
        return Err(ProtectError::InvalidConfig(
            "Required approvals must be at least 1".to_string(),
        ));
    }
    if required_approvals > MAX_REQUIRED_APPROVALS {
        return Err(ProtectError::InvalidConfig(format!(
            "Required approvals must be at most {MAX_REQUIRED_APPROVALS}"
        )));
    }

    let enforce_admins = match non_empty(&lookup, "ENFORCE_ADMINS") {
        Some(value) => parse_bool("ENFORCE_ADMINS", &value)?,
        None => file_config.policy.enforce_admins.unwrap_or(true),
    };
    let require_status_checks = match non_empty(&lookup, "REQUIRE_STATUS_CHECKS")
        .map(|value| ("REQUIRE_STATUS_CHECKS", value))
        .or_else(|| non_empty(&lookup, "REQUIRE_CI").map(|value| ("REQUIRE_CI", value)))
    {
        Some((key, value)) => parse_bool(key, &value)?,
        None => file_config.policy.require_status_checks.unwrap_or(true),
    };

    let api_url = non_empty(&lookup, "GITHUB_API_URL")
        .or_else(|| file_config.github.api_url.clone())
        .unwrap_or_else(|| DEFAULT_API_URL.to_string());
    let pause_seconds = match non_empty(&lookup, "PAUSE_SECONDS") {
        Some(value) => value.trim().parse::<u64>().map_err(|_| {
            ProtectError::InvalidConfig(format!(
                "PAUSE_SECONDS must be a non-negative integer (got '{value}')"
            ))
        })?,
        None => file_config.run.pause_seconds.unwrap_or(DEFAULT_PAUSE_SECONDS),
    };

    Ok(Settings {
        token,
        owner,
        repositories,
        required_approvals: required_approvals as u8,
        enforce_admins,
        require_status_checks,
        log: resolve_log_settings(&lookup, file)?,
        api_url,
        pause: Duration::from_secs(pause_seconds),
    })
}

fn resolve_repositories<F>(
    lookup: &F,
    file_config: &ConfigFile,
    repositories: Option<&RepositoryOverride>,
) -> ProtectResult<Vec<String>>
where
    F: Fn(&str) -> Option<String>,
{
    match repositories {
        Some(RepositoryOverride::File(path)) => return load_repository_list(path),
        Some(RepositoryOverride::Inline(names)) if !names.is_empty() => {
            return Ok(names
                .iter()
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty())
                .collect());
        }
        _ => {}
    }
    if let Some(value) = non_empty(lookup, "REPOSITORIES") {
        return Ok(value
            .split(',')
            .map(|item| item.trim().to_string())
            .filter(|item| !item.is_empty())
            .collect());
    }
    Ok(file_config
        .repositories
        .iter()
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .collect())
}

fn validate_repository_names(repositories: &[String]) -> ProtectResult<()> {
    let pattern = Regex::new(r"^(?:[A-Za-z0-9][A-Za-z0-9-]*/)?[A-Za-z0-9._-]+$")
        .map_err(|error| ProtectError::InvalidConfig(error.to_string()))?;
    for name in repositories {
        let base = name.rsplit('/').next().unwrap_or(name);
        if !pattern.is_match(name) || base == "." || base == ".." {
            return Err(ProtectError::InvalidConfig(format!(
                "invalid repository name: {name}"
            )));
        }
    }
    Ok(())
}

fn non_empty<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).filter(|value| !value.trim().is_empty())
}

fn parse_bool(key: &str, value: &str) -> ProtectResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        _ => Err(ProtectError::InvalidConfig(format!(
            "{key} must be true or false (got '{value}')"
        ))),
    }
}

fn missing(key: &str) -> ProtectError {
    ProtectError::InvalidConfig(format!("Required environment variable '{key}' is not set"))
}
