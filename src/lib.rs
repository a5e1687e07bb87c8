pub mod cli;
pub mod clients;
pub mod config;
pub mod db;
pub mod downloader;
pub mod entities;
pub mod models;

pub use config::Config;

use clap::{CommandFactory, Parser};
use cli::commands::{
    DownloadArgs, cmd_cancel, cmd_download, cmd_init, cmd_list, cmd_pause, cmd_sweep,
};
use tracing_subscriber::EnvFilter;

pub async fn run() -> anyhow::Result<()> {
    let config = Config::load()?;
    config.validate()?;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.general.log_level));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let args = cli::Cli::parse();

    let Some(command) = args.command else {
        cli::Cli::command().print_help()?;
        return Ok(());
    };

    match command {
        cli::Commands::Init => cmd_init(),
        cli::Commands::Download {
            item_id,
            source,
            transcode,
            max_width,
            max_height,
            max_bitrate,
        } => {
            cmd_download(
                &config,
                DownloadArgs {
                    item_id,
                    source,
                    transcode,
                    max_width,
                    max_height,
                    max_bitrate,
                },
            )
            .await
        }
        cli::Commands::List => cmd_list(&config).await,
        cli::Commands::Pause { id } => cmd_pause(&config, &id).await,
        cli::Commands::Cancel { id } => cmd_cancel(&config, &id).await,
        cli::Commands::Sweep => cmd_sweep(&config),
    }
}
