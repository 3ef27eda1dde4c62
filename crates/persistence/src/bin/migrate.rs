#![deny(warnings)]

use persistence::{default_sqlite_url, list_slots, migrate, read_save, write_save};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let url = std::env::args().nth(1).unwrap_or_else(|| default_sqlite_url().to_string());
    // Ensure directory exists
    let path = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))
        .filter(|p| !p.starts_with(":memory:"));
    if let Some(path) = path {
        if let Some(parent) = std::path::Path::new(path).parent() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let pool = persistence::init_db(&url).await?;

    let mut upgraded = 0usize;
    for slot in list_slots(&pool).await? {
        let Some(raw) = read_save(&pool, &slot).await? else {
            warn!(slot, "slot vanished during migration");
            continue;
        };
        let envelope = migrate(&raw);
        write_save(&pool, &slot, &envelope).await?;
        info!(slot, version = envelope.schema_version, "slot rewritten");
        upgraded += 1;
    }
    println!("DB migrated at {} ({} slots)", url, upgraded);
    Ok(())
}
