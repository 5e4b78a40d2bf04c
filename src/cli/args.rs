use clap::{ArgAction, Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "github-protect",
    version,
    about = "Audit and enforce branch protection across GitHub repositories"
)]
pub(crate) struct Cli {
    /// Only verify existing protection rules without modifying them
    #[arg(long = "verify-only", default_value_t = false)]
    pub(crate) verify_only: bool,
    /// Repository names to process
    #[arg(long = "repos", value_name = "NAME", num_args = 1..)]
    pub(crate) repos: Vec<String>,
    /// Text file with one repository name per line
    #[arg(long = "repos-file", value_name = "PATH")]
    pub(crate) repos_file: Option<PathBuf>,
    #[arg(short = 'c', long = "config")]
    pub(crate) config: Option<PathBuf>,
    #[arg(long = "reports-dir", default_value = "reports")]
    pub(crate) reports_dir: PathBuf,
    #[arg(short = 'f', long = "format")]
    pub(crate) format: Option<OutputFormat>,
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub(crate) verbose: u8,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub(crate) enum OutputFormat {
    Human,
    Json,
    Yaml,
}
