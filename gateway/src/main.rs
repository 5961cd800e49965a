mod config;
mod logging;
mod statsd;

use clap::{Args, Parser, Subcommand};
use config::{Config, ConfigError};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "gateway", about = "JSON API over a school gradebook")]
struct Cli {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Runs the API server
    Serve(ConfigArgs),
    /// Loads and validates the config file, then exits
    ValidateConfig(ConfigArgs),
}

#[derive(Args)]
struct ConfigArgs {
    /// Path to the YAML config file
    #[arg(long, short)]
    config: PathBuf,
}

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Metrics(#[from] statsd::MetricsError),
    #[error("could not start runtime: {0}")]
    Runtime(#[from] std::io::Error),
    #[error(transparent)]
    Gateway(#[from] api::GatewayError),
}

fn serve(config: Config) -> Result<(), CliError> {
    // Kept alive until the server stops so pending events are flushed.
    let _sentry = logging::init(config.common.logging.as_ref());

    if let Some(metrics_config) = &config.common.metrics {
        statsd::init(metrics_config)?;
    }

    tracing::info!(
        host = %config.api.listener.host,
        port = config.api.listener.port,
        "starting gateway"
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(api::run(config.api))?;
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        CliCommand::Serve(args) => Config::from_file(&args.config)
            .map_err(CliError::from)
            .and_then(serve),
        CliCommand::ValidateConfig(args) => Config::from_file(&args.config)
            .map(|_| println!("{}: config is valid", args.config.display()))
            .map_err(CliError::from),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
