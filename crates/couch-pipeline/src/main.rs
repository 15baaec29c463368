//! Couch colour pipeline binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use couch_pipeline::{stages, PipelineConfig};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Data directory [env: COUCH_DATA_DIR, default: "data"]
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the playlist, catalogue new videos and fetch thumbnails
    Harvest,
    /// Find the best couch frame in each new video
    Locate {
        /// Keep downloaded videos after scanning
        #[arg(long, default_value_t = false)]
        keep_videos: bool,
    },
    /// Segment couches and store their dominant colours
    Segment,
    /// Classify couch colours with the hosted model
    Label {
        /// Maximum detected couches considered this run
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Join detections with colour labels
    Join,
    /// One weighted colour strip per segmented couch
    Strips,
    /// Dominant colours sorted by HSV, stacked
    Composite,
    /// Dominant colours sorted by HSV, as a grid of squares
    Grid,
    /// Five-colour strips grouped by colour family
    Families,
    /// All stored colours in one sorted strip
    Swatch,
    /// Scrolling GIF over the family composite
    Scroll,
    /// Every stage in order
    All {
        #[arg(long)]
        limit: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env()
        .add_directive("couch=info".parse()?)
        .add_directive("ort=warn".parse()?)
        .add_directive("onnxruntime=warn".parse()?);

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }

    let cli = Cli::parse();

    let mut config = PipelineConfig::from_env();
    if let Some(dir) = cli.data_dir {
        config.paths.data_dir = dir;
    }

    info!(command = ?cli.command, data_dir = %config.paths.data_dir.display(), "Starting couch-pipeline");

    match cli.command {
        Commands::Harvest => {
            stages::run_harvest(&config).await?;
        }
        Commands::Locate { keep_videos } => {
            config.keep_videos |= keep_videos;
            stages::run_locate(&config).await?;
        }
        Commands::Segment => {
            stages::run_segment(&config).await?;
        }
        Commands::Label { limit } => {
            if limit.is_some() {
                config.labeler.limit = limit;
            }
            stages::run_label(&config).await?;
        }
        Commands::Join => {
            stages::run_join(&config).await?;
        }
        Commands::Strips => {
            stages::render_strips(&config).await?;
        }
        Commands::Composite => {
            stages::render_composite(&config).await?;
        }
        Commands::Grid => {
            stages::render_grid(&config).await?;
        }
        Commands::Families => {
            stages::render_families(&config).await?;
        }
        Commands::Swatch => {
            stages::render_swatch(&config).await?;
        }
        Commands::Scroll => {
            stages::render_scroll(&config).await?;
        }
        Commands::All { limit } => {
            if limit.is_some() {
                config.labeler.limit = limit;
            }
            stages::run_harvest(&config).await?;
            stages::run_locate(&config).await?;
            stages::run_segment(&config).await?;
            stages::run_label(&config).await?;
            stages::run_join(&config).await?;
            stages::render_strips(&config).await?;
            stages::render_composite(&config).await?;
            stages::render_grid(&config).await?;
            stages::render_families(&config).await?;
            stages::render_swatch(&config).await?;
            stages::render_scroll(&config).await?;
        }
    }

    info!("couch-pipeline finished");
    Ok(())
}
