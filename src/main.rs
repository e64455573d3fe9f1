use clap::Parser;
use color_eyre::Result;
use serial_sense::{cli, config::Config, logging, server};
use tracing::Level;

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

use tracing::{debug, error, info};

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = cli::Cli::parse();

    if let Some(command) = cli.command {
        cli::handle_command(command);

        return Ok(());
    }

    logging::init(
        cli.log_level,
        cli.log_dir.map(|dir| (Level::DEBUG, dir)),
    )
    .await;

    let config = if let Some(config_path) = cli.config {
        debug!(?config_path, "Config from path");
        Config::new_from_path(config_path)?
    } else {
        debug!("Default config");
        Config::default()
    };

    let mut config = config.apply_env_overrides(|variable| std::env::var(variable).ok())?;

    if let Some(port) = cli.port {
        config.port = port;
    }

    if cli.mock {
        config.force_mock = true;
    }

    info!(port = config.port, force_mock = config.force_mock, "Starting");

    #[cfg(unix)]
    let mut hangup = signal(SignalKind::hangup())?;

    let port = config.port;
    let server = server::run_on_port(config, port);

    #[cfg(unix)]
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl-C, quitting")
        }
        _ = hangup.recv() => {
            info!("Told to hang up, quitting")
        }
        result = server => {
            error!(?result, "Server returned");
            return Err(color_eyre::eyre::eyre!("Server stopped unexpectedly: {result:?}"));
        }
    }

    #[cfg(not(unix))]
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl-C, quitting")
        }
        result = server => {
            error!(?result, "Server returned");
            return Err(color_eyre::eyre::eyre!("Server stopped unexpectedly: {result:?}"));
        }
    }

    logging::shutdown();

    Ok(())
}
