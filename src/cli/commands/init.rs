use crate::config::Config;

pub fn cmd_init() -> anyhow::Result<()> {
    if Config::create_default_if_missing()? {
        println!("✓ Created config.toml");
        println!("Edit it to point at your media server, then run 'finvault download <item_id>'.");
    } else {
        println!("config.toml already exists, leaving it alone.");
    }
    Ok(())
}
