//! Retrieve and parse a collection from the text source.

use std::path::PathBuf;

use versereel_common::config::AppConfig;
use versereel_project_model::{Collection, CollectionNumber};
use versereel_text_source::CollectionFetcher;

pub async fn run(
    config: &AppConfig,
    collection: i64,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let number = CollectionNumber::new(collection)?;
    let fetcher = CollectionFetcher::new(&config.source)?;
    println!("Fetching collection {number} from {}", fetcher.source_url(number));

    let parsed = fetcher.fetch(number).await?;
    write_collection(&parsed, output)
}

/// Print a collection as JSON, or save it and print a summary.
pub fn write_collection(collection: &Collection, output: Option<PathBuf>) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(collection)?;
    match output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, json)?;
            let translated = collection
                .sentences
                .iter()
                .filter(|s| s.translation.is_some())
                .count();
            println!(
                "{}: {} sentences ({translated} with translation)",
                collection.title,
                collection.len()
            );
            println!("Saved to {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}
