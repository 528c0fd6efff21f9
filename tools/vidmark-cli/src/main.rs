//! Vidmark CLI: composite a still image onto a video.
//!
//! Usage:
//!   vidmark render <VIDEO> <IMAGE>   Render the image over the video
//!   vidmark positions                List overlay positions
//!   vidmark check                    Check the engine and effective config

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use vidmark_common::config::AppConfig;

mod commands;

#[derive(Parser)]
#[command(
    name = "vidmark",
    about = "Overlay an image onto a video with ffmpeg",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render an image over a video and store the result
    Render {
        /// Source video
        video: PathBuf,

        /// Overlay image
        image: PathBuf,

        /// Where the image lands on the frame
        #[arg(short, long, default_value = "bottom-center")]
        position: String,

        /// Name for the stored render (defaults to a timestamp)
        #[arg(short, long)]
        name: Option<String>,

        /// Storage root overriding the configured one
        #[arg(long)]
        storage_root: Option<PathBuf>,

        /// Print render events as JSON lines
        #[arg(long)]
        json: bool,
    },

    /// List overlay positions and their filter expressions
    Positions,

    /// Check engine availability and print the effective config
    Check {
        /// Write the effective config to the config file
        #[arg(long)]
        write_config: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load();

    let mut logging = config.logging.clone();
    if cli.verbose {
        logging.level = "debug".to_string();
    }
    vidmark_common::logging::init_logging(&logging);

    match cli.command {
        Commands::Render {
            video,
            image,
            position,
            name,
            storage_root,
            json,
        } => commands::render::run(config, video, image, position, name, storage_root, json).await,
        Commands::Positions => commands::positions::run(),
        Commands::Check { write_config } => commands::check::run(&config, write_config),
    }
}
