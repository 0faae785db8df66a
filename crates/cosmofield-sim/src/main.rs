//! `cosmofield` batch runner
//!
//! Loads the configuration from the standard search path (or the file named
//! by `COSMOFIELD_CONFIG`), then runs every enabled stage. Exits with status 1
//! on any error.

use std::process::ExitCode;

use cosmofield_core::config::CosmofieldConfig;
use cosmofield_core::observe::init_logging;
use cosmofield_sim::Pipeline;

fn main() -> ExitCode {
    let config = match CosmofieldConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("cosmofield: {}", e);
            return ExitCode::FAILURE;
        }
    };

    init_logging(&config.logging);

    let result = Pipeline::new(config).and_then(|mut pipeline| pipeline.run());
    match result {
        Ok(report) => {
            for table in &report.tables {
                tracing::info!(
                    table = %table.table.display(),
                    z = ?table.redshift,
                    mean = table.gaussian.mean,
                    variance = table.gaussian.variance,
                    "done"
                );
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "pipeline failed");
            ExitCode::FAILURE
        }
    }
}
