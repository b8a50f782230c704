use clap::Parser;
use std::process::ExitCode;
use tracing::{error, info};

use dataset_health::cli::{self, Cli};
use dataset_health::logging::setup_logging;

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = setup_logging(cli.verbose, cli.quiet, cli.log_file.as_deref()) {
        eprintln!("Error: {e}");
        return ExitCode::from(cli::EXIT_USAGE);
    }
    info!("dataset-health {} starting", env!("CARGO_PKG_VERSION"));

    match cli::execute(&cli) {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            error!("{:#}", err);
            eprintln!("Error: {:#}", err);
            ExitCode::from(cli::exit_code_for(&err))
        }
    }
}
