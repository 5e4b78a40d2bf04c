use crate::ProtectResult;
use std::path::Path;
use tracing::{info, warn};

/// Reads a newline-delimited repository list. Blank lines and lines starting
/// with `#` are skipped.
pub fn load_repository_list(path: &Path) -> ProtectResult<Vec<String>> {
    let content = std::fs::read_to_string(path).map_err(|error| {
        tracing::error!(path = %path.display(), %error, "failed to read repository list");
        error
    })?;
    let repositories = parse_repository_list(&content);
    if repositories.is_empty() {
        warn!(path = %path.display(), "no repository names found");
    } else {
        info!(
            path = %path.display(),
            count = repositories.len(),
            "loaded repository list"
        );
    }
    Ok(repositories)
}

pub fn parse_repository_list(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}
