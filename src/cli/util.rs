use super::args::Cli;
use anyhow::{anyhow, Context};
use protect::{
    load_config_file, resolve_log_settings, ConfigFile, LogLevel, LogSettings, RepositoryOverride,
};
use std::path::PathBuf;

const DEFAULT_CONFIG_FILE: &str = ".protect.toml";

/// Loads `--config` when given (it must exist) or the default file when
/// present.
pub(super) fn load_cli_config(cli: &Cli) -> anyhow::Result<Option<ConfigFile>> {
    let path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    let config = load_config_file(&path)
        .with_context(|| format!("failed to load config file {}", path.display()))?;
    if cli.config.is_some() && config.is_none() {
        return Err(anyhow!("config file not found: {}", path.display()));
    }
    Ok(config)
}

pub(super) fn log_settings(cli: &Cli, config: Option<&ConfigFile>) -> anyhow::Result<LogSettings> {
    let mut settings = resolve_log_settings(|key| std::env::var(key).ok(), config)?;
    if cli.verbose > 0 {
        settings.level = LogLevel::Debug;
    }
    Ok(settings)
}

/// `--repos-file` wins over `--repos`; neither means the environment or
/// config file decides.
pub(super) fn repository_override(cli: &Cli) -> Option<RepositoryOverride> {
    if let Some(path) = &cli.repos_file {
        return Some(RepositoryOverride::File(path.clone()));
    }
    if !cli.repos.is_empty() {
        return Some(RepositoryOverride::Inline(cli.repos.clone()));
    }
    None
}
