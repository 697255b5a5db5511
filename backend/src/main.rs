//! Main entry point for titansync.
//!
//! This file initializes logging, reads the configuration from flags and
//! environment, builds the Drive and ServiceTitan clients, and runs one sync.
//! Fatal errors are printed to stderr and turn into a non-zero exit status.

mod config;
mod errors;
mod services;

use std::process::ExitCode;
use std::sync::Arc;

use adapters::{FileCredentialStore, GoogleDrive, ServiceTitan};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::errors::SyncError;
use crate::services::workflow::{summary, Workflow};

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("error: cannot start runtime: {err}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(&config)) {
        Ok(line) => {
            println!("{line}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            tracing::error!(error = %err, "sync failed");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: &Config) -> Result<String, SyncError> {
    let settings = config.sync_settings();
    let credentials = Arc::new(FileCredentialStore::new(config.credentials_file.clone()));
    let drive = GoogleDrive::new(config.drive(), credentials)?;
    let servicetitan = ServiceTitan::new(config.servicetitan())?;

    let outcome = Workflow::new(&drive, &servicetitan, &settings).run().await?;
    Ok(summary(&outcome, &settings.dump_file))
}
