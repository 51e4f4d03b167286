//! FieldOps CLI entry point.

use clap::Parser;
use fieldops_cache::TracingNotifier;
use fieldops_cli::commands::{self, Context};
use fieldops_cli::config::CliConfig;
use fieldops_cli::error::CliError;
use fieldops_cli::{seed, telemetry, Cli};
use fieldops_client::{Backend, RestBackend};
use std::sync::Arc;

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("error: {}", err);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    let cli = Cli::parse();
    let config = CliConfig::load(cli.config.as_deref(), cli.memory)?;
    telemetry::init_tracing(&config.log_level, config.log_format)?;

    // One client for the whole process, handed to every cache.
    let backend: Arc<dyn Backend> = match (&config.backend, cli.memory) {
        (_, true) => Arc::new(seed::demo_backend()?),
        (Some(client), false) => Arc::new(RestBackend::new(client)?),
        (None, false) => {
            return Err(CliError::Usage(
                "no [backend] configured; pass --memory for a local demo".to_string(),
            ))
        }
    };

    let ctx = Context {
        backend,
        notifier: Arc::new(TracingNotifier),
        options: config.cache.to_options(),
    };

    let mut out = std::io::stdout();
    commands::run(cli.command, &ctx, &mut out).await
}
