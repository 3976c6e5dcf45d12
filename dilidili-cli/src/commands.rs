//! CLI command implementations

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Subcommand;
use dilidili_api::{BilibiliProvider, extract_identifier};
use dilidili_core::{DilidiliConfig, MetadataProvider, MuxStrategyKind, Pipeline};

use crate::save;
use crate::sink::ConsoleSink;

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Download a video and save it as one merged file
    Download {
        /// BV identifier or bilibili.com video link
        input: String,
        /// Directory the merged file is saved to
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,
        /// Root for per-video scratch directories
        #[arg(long)]
        scratch_dir: Option<PathBuf>,
        /// How video and audio are merged
        #[arg(long, value_enum)]
        strategy: Option<MuxStrategyKind>,
        /// Leave fragments and the merged file in the scratch directory
        #[arg(long)]
        keep_temp: bool,
    },
    /// Show the title and available streams without downloading
    Info {
        /// BV identifier or bilibili.com video link
        input: String,
    },
}

/// Handle the CLI command
///
/// # Errors
/// Returns the error of the command that failed
pub async fn handle_command(command: Commands) -> Result<()> {
    match command {
        Commands::Download {
            input,
            output_dir,
            scratch_dir,
            strategy,
            keep_temp,
        } => download(&input, output_dir, scratch_dir, strategy, keep_temp).await,
        Commands::Info { input } => show_info(&input).await,
    }
}

fn parse_identifier(input: &str) -> Result<String> {
    extract_identifier(input)
        .with_context(|| format!("No BV identifier found in '{}'", input.trim()))
}

/// Download, merge, save, and clean up one video.
///
/// # Errors
/// - Input has no identifier
/// - Any pipeline stage fails
/// - The merged file cannot be saved
pub async fn download(
    input: &str,
    output_dir: PathBuf,
    scratch_dir: Option<PathBuf>,
    strategy: Option<MuxStrategyKind>,
    keep_temp: bool,
) -> Result<()> {
    let identifier = parse_identifier(input)?;

    let mut config = DilidiliConfig::from_env();
    if let Some(dir) = scratch_dir {
        config.storage.scratch_root = dir;
    }
    if let Some(kind) = strategy {
        config.mux.strategy = kind;
    }
    tracing::debug!("Effective configuration: {:?}", config);

    let provider = BilibiliProvider::new(&config.network)?;
    let pipeline = Pipeline::from_config(config)?;
    let sink = Arc::new(ConsoleSink::new());

    let output = pipeline.run(&identifier, &provider, sink.clone()).await?;

    let Some((merged, title)) = sink.completed() else {
        bail!("Pipeline finished without handing over the merged file");
    };
    let saved = save::save_output(&merged, &title, &output_dir).await?;

    if keep_temp {
        println!("Scratch files kept in {}", output.scratch_dir.display());
    } else {
        save::cleanup(&output).await;
    }

    println!("Saved \"{title}\" to {}", saved.display());
    Ok(())
}

/// Print the resolved title and stream locations.
///
/// # Errors
/// - Input has no identifier
/// - Metadata lookup fails
pub async fn show_info(input: &str) -> Result<()> {
    let identifier = parse_identifier(input)?;
    let config = DilidiliConfig::from_env();
    let provider = BilibiliProvider::new(&config.network)?;

    let streams = provider.resolve_title_and_streams(&identifier).await?;

    println!("{identifier}: {}", streams.title);
    println!("{:-<60}", "");
    println!("Video streams: {}", streams.video_sources.len());
    for source in &streams.video_sources {
        println!("  {}", source.url);
    }
    println!("Audio streams: {}", streams.audio_sources.len());
    for source in &streams.audio_sources {
        println!("  {}", source.url);
    }
    if streams.primary_pair().is_none() {
        println!("\nNo downloadable video and audio pair.");
    }

    Ok(())
}
