mod args;
mod output;
mod runner;
mod util;

use clap::Parser;
use protect::ProtectError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub const INTERRUPTED_EXIT_CODE: i32 = 130;

pub fn run() -> i32 {
    let cli = args::Cli::parse();
    let interrupted = Arc::new(AtomicBool::new(false));
    let handler_flag = Arc::clone(&interrupted);
    if let Err(error) = ctrlc::set_handler(move || handler_flag.store(true, Ordering::SeqCst)) {
        eprintln!("warning: failed to install Ctrl-C handler: {error}");
    }
    match runner::run(cli, interrupted) {
        Ok(code) => code,
        Err(error) => {
            let code = error_exit_code(&error);
            if code != INTERRUPTED_EXIT_CODE {
                tracing::error!("unexpected error: {error:#}");
                eprintln!("error: {error:#}");
            }
            code
        }
    }
}

fn error_exit_code(error: &anyhow::Error) -> i32 {
    match error.downcast_ref::<ProtectError>() {
        Some(ProtectError::Interrupted) => INTERRUPTED_EXIT_CODE,
        _ => 1,
    }
}
