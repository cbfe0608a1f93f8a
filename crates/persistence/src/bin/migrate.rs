#![deny(warnings)]

//! Create or upgrade the save database, then report the newest stored world.

use persistence::{default_sqlite_url, latest_save, load_latest_snapshot};
use std::path::Path;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| default_sqlite_url().to_string());
    let file = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))
        .filter(|p| !p.starts_with(":memory:"));
    if let Some(parent) = file.and_then(|p| Path::new(p).parent()) {
        std::fs::create_dir_all(parent)?;
    }

    let pool = persistence::init_db(&url).await?;
    let latest = match latest_save(&pool).await? {
        Some(save) => load_latest_snapshot(&pool, save).await?,
        None => None,
    };
    match latest {
        Some(snap) => println!(
            "{url}: schema ready, latest world dated {} ({} realms, {} cities)",
            snap.date,
            snap.realms.len(),
            snap.cities.len()
        ),
        None => {
            let id = persistence::create_save(&pool, "default", Some("initialized")).await?;
            println!("{url}: schema ready, empty save #{id} created");
        }
    }
    Ok(())
}
