use super::args::{Cli, OutputFormat};
use super::output::{print_results_human, print_results_json, print_results_yaml};
use super::util::{load_cli_config, log_settings, repository_override};
use super::INTERRUPTED_EXIT_CODE;
use anyhow::Context;
use chrono::Local;
use protect::{
    exit_code, init_logging, write_report, GithubClient, Orchestrator, ProtectError,
    ProtectionPolicy, ReportDocument, Settings,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};

pub(super) fn run(cli: Cli, interrupted: Arc<AtomicBool>) -> anyhow::Result<i32> {
    let config_file = load_cli_config(&cli)?;
    let log = log_settings(&cli, config_file.as_ref())?;
    init_logging(&log).context("failed to initialise logging")?;

    let overrides = repository_override(&cli);
    let settings = match Settings::from_env(config_file.as_ref(), overrides.as_ref()) {
        Ok(settings) => settings,
        Err(error) => {
            error!(%error, "configuration error");
            return Ok(1);
        }
    };

    info!("starting branch protection automation");
    info!(
        repositories = %settings.repositories.join(", "),
        verify_only = cli.verify_only,
        "processing repositories"
    );

    let client = GithubClient::from_settings(&settings);
    let login = client
        .authenticated_user()
        .context("failed to connect to GitHub")?;
    info!(%login, "connected to GitHub");

    let policy = ProtectionPolicy::from_settings(&settings);
    let outcome = Orchestrator::new(&client, policy)
        .verify_only(cli.verify_only)
        .pause(settings.pause)
        .interrupt_flag(Arc::clone(&interrupted))
        .run(&settings.repositories);
    let results = match outcome {
        Ok(results) => results,
        Err(ProtectError::Interrupted) => return Ok(INTERRUPTED_EXIT_CODE),
        Err(error) => {
            return Err(anyhow::Error::new(error).context("branch protection run aborted"))
        }
    };

    if is_interrupted(&interrupted) {
        return Ok(INTERRUPTED_EXIT_CODE);
    }
    let document = ReportDocument::assemble(&results, Local::now().naive_local());
    let report_path =
        write_report(&document, &cli.reports_dir).context("failed to generate report")?;
    info!(path = %report_path.display(), "report generated");

    match cli.format.unwrap_or(OutputFormat::Human) {
        OutputFormat::Human => print_results_human(&results, &document.summary, &report_path),
        OutputFormat::Json => print_results_json(&results, &document.summary, &report_path)?,
        OutputFormat::Yaml => print_results_yaml(&results, &document.summary, &report_path)?,
    }

    if is_interrupted(&interrupted) {
        return Ok(INTERRUPTED_EXIT_CODE);
    }
    let code = exit_code(&results);
    if code == 0 {
        info!("branch protection automation completed successfully");
    } else {
        error!("branch protection verification failed for one or more repositories");
    }
    Ok(code)
}

fn is_interrupted(flag: &AtomicBool) -> bool {
    let interrupted = flag.load(Ordering::SeqCst);
    if interrupted {
        warn!("operation cancelled by user");
    }
    interrupted
}
