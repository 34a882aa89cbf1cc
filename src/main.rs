//! Uplift CLI entry point.

use std::io::Write;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use uplift::cli::{Cli, CommandDispatcher};
use uplift::config::find_project_root;

/// Initialize the tracing subscriber for logging.
///
/// Log level is controlled by:
/// 1. `--debug` flag sets level to DEBUG
/// 2. `RUST_LOG` environment variable (if set)
/// 3. Default is INFO
///
/// Logs go to stderr so reports on stdout stay machine-readable.
fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::new("uplift=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("uplift=info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    tracing::debug!("Uplift starting with args: {:?}", cli);

    // Determine project root
    let project_root = cli.project.clone().unwrap_or_else(|| {
        let cwd = std::env::current_dir().unwrap_or_default();
        find_project_root(&cwd).unwrap_or(cwd)
    });

    let dispatcher = CommandDispatcher::new(project_root).with_config(cli.config.clone());

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let code = match dispatcher.dispatch(&cli, &mut out) {
        Ok(result) => result.exit_code,
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    };
    let _ = out.flush();
    ExitCode::from(code as u8)
}
