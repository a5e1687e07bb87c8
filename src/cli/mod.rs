//! Command-line interface, argument parsing via clap.

pub mod commands;

use clap::{Parser, Subcommand};

/// Finvault - offline download engine for your media server
#[derive(Parser)]
#[command(name = "finvault")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create default config file
    #[command(alias = "--init")]
    Init,

    /// Download an item, or a whole season, for offline playback
    #[command(alias = "dl", alias = "d")]
    Download {
        /// Catalog item id (movie, episode or season)
        item_id: String,

        /// Specific media source id to fetch
        #[arg(long)]
        source: Option<String>,

        /// Request a transcoded stream instead of the original file
        #[arg(long)]
        transcode: bool,

        /// Limit transcoded video width
        #[arg(long)]
        max_width: Option<u32>,

        /// Limit transcoded video height
        #[arg(long)]
        max_height: Option<u32>,

        /// Limit total bitrate in bits per second
        #[arg(long)]
        max_bitrate: Option<u64>,
    },

    /// List all download records
    #[command(alias = "ls", alias = "l")]
    List,

    /// Pause a queued download, or resume a paused one
    Pause {
        /// Source id of the download
        id: String,
    },

    /// Cancel a download and remove its files
    #[command(alias = "rm")]
    Cancel {
        /// Source id of the download
        id: String,
    },

    /// Remove orphaned temp files from the download root
    Sweep,
}
