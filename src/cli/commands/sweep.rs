use crate::config::Config;
use crate::downloader::sweep::sweep_orphaned_temp_files;
use std::path::Path;

pub fn cmd_sweep(config: &Config) -> anyhow::Result<()> {
    let removed = sweep_orphaned_temp_files(Path::new(&config.downloads.download_root));
    println!("Removed {removed} orphaned temp file(s)");
    Ok(())
}
