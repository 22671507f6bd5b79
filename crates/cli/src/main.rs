use crate::{commands::Commands, error::CliError, shutdown::ShutdownCoordinator};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::Level;

mod commands;
mod error;
mod fleet;
mod output;
mod refresh;
mod shutdown;

#[derive(Parser)]
#[command(name = "fleetstream", version = "0.0.1", about = "Transit fleet batch engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    let cli = Cli::parse();

    let cancel_token = CancellationToken::new();
    let shutdown = ShutdownCoordinator::new(cancel_token.clone());
    shutdown.register_handlers();

    match cli.command {
        Commands::Refresh {
            vehicles,
            batch_size,
            parallelism,
            fail_line,
            progress_interval_ms,
        } => {
            refresh::run(
                vehicles,
                batch_size,
                parallelism,
                fail_line,
                progress_interval_ms,
                cancel_token,
            )
            .await?;
        }
        Commands::Plan {
            vehicles,
            batch_size,
            parallelism,
        } => {
            output::print_plan(vehicles, batch_size, parallelism);
        }
    }

    if shutdown.is_shutdown_requested() {
        std::process::exit(shutdown::ExitCode::ShutdownRequested.as_i32());
    }
    Ok(())
}
