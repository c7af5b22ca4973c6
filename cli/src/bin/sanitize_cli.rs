use clap::{Parser, Subcommand};
use cli::{build_pipeline, process_image, ImageReport, RunConfig};
use color_eyre::eyre::{eyre, Result};
use sanitize::Strategy;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{self, EnvFilter};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect intruding glyphs in a single crop
    Detect {
        /// Path to the glyph crop
        #[arg(short, long)]
        image: PathBuf,
        /// Strategy to run with default parameters (repeatable; all when omitted)
        #[arg(short, long = "strategy")]
        strategies: Vec<Strategy>,
        /// Directory for mask and sanitized images
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },
    /// Run every image and strategy listed in a configuration file
    Run {
        /// Path to the TOML or JSON configuration file
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Print the JSON schema of the strategy configuration
    Schema,
}

fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Detect { image, strategies, output_dir } => {
            let pipeline = build_pipeline(&strategies);
            let report = process_image(&image, &pipeline, output_dir.as_deref())?;
            summarize(&report);
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Run { config } => {
            let config = RunConfig::from_file(&config)?;
            let pipeline = config.pipeline();
            let mut reports = Vec::with_capacity(config.images.len());
            for image in &config.images {
                match process_image(image, &pipeline, config.output_dir.as_deref()) {
                    Ok(report) => {
                        summarize(&report);
                        reports.push(report);
                    }
                    Err(e) => warn!("Skipping {:?}: {}", image, e),
                }
            }
            if reports.is_empty() {
                return Err(eyre!("No image in {:?} could be processed", config.images));
            }
            println!("{}", serde_json::to_string_pretty(&reports)?);
        }
        Commands::Schema => {
            println!("{}", serde_json::to_string_pretty(&Strategy::schema())?);
        }
    }

    Ok(())
}

fn summarize(report: &ImageReport) {
    for result in &report.results {
        match (&result.error, &result.boundaries) {
            (Some(error), _) => warn!("{:?} [{}]: {}", report.image, result.strategy, error),
            (None, Some(b)) => info!(
                "{:?} [{}]: left={:?} right={:?} top={:?} bottom={:?}",
                report.image, result.strategy, b.left, b.right, b.top, b.bottom
            ),
            (None, None) => info!(
                "{:?} [{}]: {} masked pixels{}",
                report.image,
                result.strategy,
                result.masked_pixels,
                result.message.as_deref().map(|m| format!(" ({m})")).unwrap_or_default()
            ),
        }
    }
}
