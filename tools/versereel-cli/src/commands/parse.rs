//! Parse a saved collection page without network access.

use std::path::PathBuf;

use anyhow::Context;
use versereel_project_model::CollectionNumber;
use versereel_text_source::SourceDocumentParser;

use super::fetch::write_collection;

pub fn run(html: PathBuf, collection: i64, output: Option<PathBuf>) -> anyhow::Result<()> {
    let number = CollectionNumber::new(collection)?;
    let markup = std::fs::read_to_string(&html)
        .with_context(|| format!("Failed to read {}", html.display()))?;

    let parsed =
        SourceDocumentParser::new().parse_collection(number, &markup, html.display().to_string());
    if parsed.is_empty() {
        tracing::warn!(path = %html.display(), "No sentences found in page");
    }
    write_collection(&parsed, output)
}
