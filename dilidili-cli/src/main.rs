//! Dilidili CLI - Command-line interface
//!
//! Downloads a Bilibili video's separate streams and saves the merged file.

mod commands;
mod save;
mod sink;

use std::path::PathBuf;

use clap::Parser;
use dilidili_core::tracing_setup::{CliLogLevel, init_tracing};

#[derive(Parser)]
#[command(name = "dilidili")]
#[command(about = "Download Bilibili videos as a single MP4")]
struct Cli {
    /// Console log level (DILIDILI_LOG overrides)
    #[arg(long, value_enum, default_value_t = CliLogLevel::Warn, global = true)]
    log_level: CliLogLevel,

    /// Write a full trace of this run into this directory
    #[arg(long, global = true)]
    logs_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: commands::Commands,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.log_level.as_tracing_level(), cli.logs_dir.as_deref())?;

    commands::handle_command(cli.command).await
}

#[cfg(test)]
mod tests {
    use dilidili_core::MuxStrategyKind;

    use super::*;
    use crate::commands::Commands;

    #[test]
    fn test_download_arguments() {
        let cli = Cli::try_parse_from([
            "dilidili",
            "download",
            "BV1GJ411x7h7",
            "--output-dir",
            "/tmp/videos",
            "--strategy",
            "external",
            "--keep-temp",
            "--log-level",
            "debug",
        ])
        .unwrap();

        assert_eq!(cli.log_level, CliLogLevel::Debug);
        match cli.command {
            Commands::Download {
                input,
                output_dir,
                scratch_dir,
                strategy,
                keep_temp,
            } => {
                assert_eq!(input, "BV1GJ411x7h7");
                assert_eq!(output_dir, PathBuf::from("/tmp/videos"));
                assert_eq!(scratch_dir, None);
                assert_eq!(strategy, Some(MuxStrategyKind::External));
                assert!(keep_temp);
            }
            Commands::Info { .. } => panic!("parsed the wrong subcommand"),
        }
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["dilidili", "download", "BV1x"]).unwrap();

        assert_eq!(cli.log_level, CliLogLevel::Warn);
        assert!(cli.logs_dir.is_none());
        match cli.command {
            Commands::Download {
                output_dir,
                strategy,
                keep_temp,
                ..
            } => {
                assert_eq!(output_dir, PathBuf::from("."));
                assert_eq!(strategy, None);
                assert!(!keep_temp);
            }
            Commands::Info { .. } => panic!("parsed the wrong subcommand"),
        }
    }

    #[test]
    fn test_unknown_strategy_is_rejected() {
        assert!(Cli::try_parse_from(["dilidili", "download", "BV1x", "--strategy", "magic"]).is_err());
    }
}
