//! List the reader catalog.

use versereel_common::config::AppConfig;
use versereel_project_model::CollectionNumber;

use super::shared::load_catalog;

pub fn run(config: &AppConfig) -> anyhow::Result<()> {
    let catalog = load_catalog(config)?;
    println!("Readers ({})", config.readers_path().display());

    if catalog.is_empty() {
        println!("  (none)");
        return Ok(());
    }

    for reader in catalog.iter() {
        let available: Vec<String> = CollectionNumber::all()
            .map(|n| {
                if reader.audio_locator(n.get()).is_some() {
                    n.to_string()
                } else {
                    "-".to_string()
                }
            })
            .collect();
        println!("  {} ({})", reader.name, reader.id);
        println!("    Audio: [{}]", available.join(" "));
    }
    Ok(())
}
