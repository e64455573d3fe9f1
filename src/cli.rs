use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::Level;

use crate::{actions::ConnectRequest, config::Config, mock};

/// The command line interface for serial sense.
#[derive(Parser)]
#[command(author, version, about)]
pub struct Cli {
    /// Path to a configuration file
    pub config: Option<PathBuf>,

    /// Port to listen on, overrides the configuration file
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Only use mock devices
    #[arg(long)]
    pub mock: bool,

    /// Log level for stdout
    #[arg(long, default_value_t = Level::INFO)]
    pub log_level: Level,

    /// Also log to daily rotated files in this directory
    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    /// Subcommands
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Commands available in the command line interface.
#[derive(Subcommand)]
pub enum Commands {
    /// Examples for user convenience.
    #[clap(subcommand)]
    Examples(Examples),
}

/// Helpful examples for users.
#[derive(Subcommand, Clone)]
pub enum Examples {
    /// Show an example of a configuration file's contents.
    Config,

    /// Show the mock devices as `/devices` lists them.
    Devices,

    /// Show an example JSON body for `/connect`.
    ConnectRequest,

    /// Show an example JSON response from `/data`.
    Reading,
}

fn pretty_json<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("Could not serialize: {e}"))
}

/// Print the output of a command.
pub fn handle_command(command: Commands) {
    match command {
        Commands::Examples(example) => match example {
            Examples::Config => println!("{}", Config::example().serialize_pretty()),
            Examples::Devices => println!("{}", pretty_json(&mock::mock_devices())),
            Examples::ConnectRequest => println!("{}", pretty_json(&ConnectRequest::example())),
            Examples::Reading => println!("{}", pretty_json(&mock::mock_reading())),
        },
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn flags() {
        let cli = Cli::parse_from(["serial-sense", "sense.ron", "--port", "9000", "--mock"]);

        assert_eq!(cli.config, Some(PathBuf::from("sense.ron")));
        assert_eq!(cli.port, Some(9000));
        assert!(cli.mock);
        assert_eq!(cli.log_level, Level::INFO);
        assert!(cli.command.is_none());
    }

    #[test]
    fn examples_subcommand() {
        let cli = Cli::parse_from(["serial-sense", "examples", "connect-request"]);

        assert!(matches!(
            cli.command,
            Some(Commands::Examples(Examples::ConnectRequest))
        ));
    }
}
