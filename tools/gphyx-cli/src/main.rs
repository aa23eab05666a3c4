//! gPHYX CLI: track masks and render object removal over image sequences.
//!
//! Usage:
//!   gphyx check                       Check the processing service
//!   gphyx track <FRAMES> [OPTIONS]    Track a mask through a sequence
//!   gphyx render <FRAMES> [OPTIONS]   Remove the masked object from every frame
//!   gphyx info <MASK>                 Show mask information

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use gphyx_common::clock::Direction;
use gphyx_common::config::AppConfig;

mod commands;

#[derive(Parser)]
#[command(
    name = "gphyx",
    about = "Tracked object removal for image sequences",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to the standard location)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the processing service URL
    #[arg(long, global = true)]
    backend_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum DirectionArg {
    Forward,
    Backward,
    /// Forward to the end, then backward from the reference
    Both,
}

impl DirectionArg {
    /// First direction to walk, and whether to come back the other way.
    fn legs(self) -> (Direction, bool) {
        match self {
            DirectionArg::Forward => (Direction::Forward, false),
            DirectionArg::Backward => (Direction::Backward, false),
            DirectionArg::Both => (Direction::Forward, true),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Check that the processing service is reachable
    Check,

    /// Track a mask from a reference frame through an image sequence
    Track {
        /// Directory of PNG/JPEG frames, ordered by file name
        frames: PathBuf,

        /// Mask document (JSON)
        #[arg(short, long)]
        mask: PathBuf,

        /// Reference frame index (position in the sorted sequence)
        #[arg(short, long, default_value = "0")]
        reference: i64,

        /// Direction to walk from the reference frame
        #[arg(short, long, value_enum, default_value = "forward")]
        direction: DirectionArg,

        /// Alignment file to write
        #[arg(short, long, default_value = "alignment.json")]
        output: PathBuf,
    },

    /// Render the object-removed sequence
    Render {
        /// Directory of PNG/JPEG frames, ordered by file name
        frames: PathBuf,

        /// Mask document (JSON)
        #[arg(short, long)]
        mask: PathBuf,

        /// Alignment file from `gphyx track` (untracked when omitted)
        #[arg(short, long)]
        alignment: Option<PathBuf>,

        /// Output directory for rendered PNG frames
        #[arg(short, long, default_value = "rendered")]
        output_dir: PathBuf,

        /// Tile edge length in pixels (overrides config)
        #[arg(long)]
        tile_size: Option<u32>,
    },

    /// Show mask information
    Info {
        /// Mask document (JSON)
        mask: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from(path),
        None => AppConfig::load(),
    };
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    if let Some(url) = cli.backend_url {
        config.backend.url = url;
    }
    gphyx_common::logging::init_logging(&config.logging);

    match cli.command {
        Commands::Check => commands::check::run(&config).await,
        Commands::Track {
            frames,
            mask,
            reference,
            direction,
            output,
        } => {
            let (direction, both) = direction.legs();
            commands::track::run(&config, frames, mask, reference, direction, both, output).await
        }
        Commands::Render {
            frames,
            mask,
            alignment,
            output_dir,
            tile_size,
        } => {
            if let Some(size) = tile_size {
                config.render.tile_size = size;
            }
            commands::render::run(&config, frames, mask, alignment, output_dir).await
        }
        Commands::Info { mask } => commands::info::run(&config, mask),
    }
}
