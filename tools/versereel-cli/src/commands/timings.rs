//! Edit persisted sentence timings.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Subcommand};
use versereel_common::config::AppConfig;
use versereel_common::format_clock;
use versereel_project_model::{
    parse_sentence_id, sentence_id, CollectionNumber, TimingDraft, TimingSet, TimingStore,
    TimingViolation,
};

use super::shared::{load_collection, timing_store};

/// Which timing set an action applies to.
#[derive(Args, Debug, Clone)]
pub struct TimingKey {
    /// Reader id
    #[arg(short, long)]
    pub reader: String,

    /// Collection number (1-8)
    #[arg(short, long)]
    pub collection: i64,
}

#[derive(Subcommand, Debug)]
pub enum TimingsAction {
    /// Print the stored intervals
    Show {
        #[command(flatten)]
        key: TimingKey,
    },

    /// Check the stored intervals against the collection's sentences
    Validate {
        #[command(flatten)]
        key: TimingKey,

        /// Saved collection page (.html) or parsed collection (.json) to use instead of fetching
        #[arg(long)]
        source: Option<PathBuf>,
    },

    /// Set the start and/or end of one sentence
    Set {
        #[command(flatten)]
        key: TimingKey,

        /// Sentence index (1-based)
        #[arg(short, long)]
        index: u32,

        /// Start time in seconds
        #[arg(long)]
        start: Option<f64>,

        /// End time in seconds
        #[arg(long)]
        end: Option<f64>,

        /// Take the start from the previous sentence's end
        #[arg(long, conflicts_with = "start")]
        start_from_previous: bool,
    },

    /// Remove one sentence's interval, or the whole set
    Clear {
        #[command(flatten)]
        key: TimingKey,

        /// Sentence index; clears the whole set when omitted
        #[arg(short, long)]
        index: Option<u32>,
    },

    /// Import a timing file into the store
    Import {
        /// Timing JSON file
        file: PathBuf,
    },

    /// Write the stored set to a portable file
    Export {
        #[command(flatten)]
        key: TimingKey,

        /// Output directory
        #[arg(short, long, default_value = ".")]
        dir: PathBuf,
    },
}

pub async fn run(config: &AppConfig, action: TimingsAction) -> anyhow::Result<()> {
    let store = timing_store(config);
    match action {
        TimingsAction::Show { key } => show(&store, &key),
        TimingsAction::Validate { key, source } => validate(config, &store, &key, source).await,
        TimingsAction::Set {
            key,
            index,
            start,
            end,
            start_from_previous,
        } => set(&store, &key, index, start, end, start_from_previous),
        TimingsAction::Clear { key, index } => clear(&store, &key, index),
        TimingsAction::Import { file } => {
            let set = TimingStore::import(&file)?;
            let number = CollectionNumber::new(i64::from(set.collection_number))?;
            let path = store.write(&set)?;
            println!(
                "Imported {} intervals for reader '{}', collection {}",
                set.len(),
                set.reader_id,
                number
            );
            println!("Stored at {}", path.display());
            Ok(())
        }
        TimingsAction::Export { key, dir } => {
            let number = CollectionNumber::new(key.collection)?;
            let set = load_existing(&store, &key.reader, number)?;
            let path = TimingStore::export_to(&set, &dir)?;
            println!("Exported {} intervals to {}", set.len(), path.display());
            Ok(())
        }
    }
}

fn load_existing(
    store: &TimingStore,
    reader: &str,
    number: CollectionNumber,
) -> anyhow::Result<TimingSet> {
    store
        .read(reader, number.get())?
        .with_context(|| format!("No timings stored for reader '{reader}', collection {number}"))
}

fn show(store: &TimingStore, key: &TimingKey) -> anyhow::Result<()> {
    let number = CollectionNumber::new(key.collection)?;
    let set = load_existing(store, &key.reader, number)?;

    println!(
        "Timings for reader '{}', collection {} (version {}, created {})",
        set.reader_id, set.collection_number, set.version, set.created_at
    );
    for item in &set.items {
        println!(
            "  {}  {} - {}  ({:.3}s)",
            item.sentence_id,
            format_clock(item.start_sec),
            format_clock(item.end_sec),
            item.duration_secs()
        );
    }
    println!("{} intervals", set.len());
    Ok(())
}

async fn validate(
    config: &AppConfig,
    store: &TimingStore,
    key: &TimingKey,
    source: Option<PathBuf>,
) -> anyhow::Result<()> {
    let number = CollectionNumber::new(key.collection)?;
    let set = load_existing(store, &key.reader, number)?;
    let collection = load_collection(config, number, source.as_deref()).await?;

    let violations = set.validate(collection.len() as u32);
    report(&violations);
    if !violations.is_empty() {
        anyhow::bail!("{} timing problem(s) found", violations.len());
    }
    println!(
        "OK: {} of {} sentences timed, no problems",
        set.len(),
        collection.len()
    );
    Ok(())
}

fn set(
    store: &TimingStore,
    key: &TimingKey,
    index: u32,
    start: Option<f64>,
    end: Option<f64>,
    start_from_previous: bool,
) -> anyhow::Result<()> {
    let number = CollectionNumber::new(key.collection)?;
    if index == 0 {
        anyhow::bail!("Sentence indices start at 1");
    }

    let mut draft = match store.read(&key.reader, number.get())? {
        Some(set) => TimingDraft::from_timing_set(&set),
        None => TimingDraft::new(&key.reader, number.get()),
    };

    if start_from_previous && !draft.derive_start(index) {
        anyhow::bail!(
            "Sentence {} has no complete interval to take a start from",
            index.saturating_sub(1)
        );
    }
    if let Some(secs) = start {
        draft.set_start(index, secs)?;
    }
    if let Some(secs) = end {
        draft.set_end(index, secs)?;
    }

    // Only complete intervals are stored.
    let interval = draft.get(index).unwrap_or_default();
    if interval.complete().is_none() {
        anyhow::bail!(
            "Sentence {index} needs both a start and an end (have start {:?}, end {:?})",
            interval.start_sec,
            interval.end_sec
        );
    }

    let set = draft.to_timing_set();
    let total = set
        .items
        .iter()
        .filter_map(|i| parse_sentence_id(&i.sentence_id))
        .map(|(_, idx)| idx)
        .max()
        .unwrap_or(index);
    let violations = draft.validate(total);
    let path = store.write(&set)?;

    if let Some((start, end)) = interval.complete() {
        println!(
            "{}: {} - {}",
            sentence_id(number.get(), index),
            format_clock(start),
            format_clock(end)
        );
    }
    report(&violations);
    println!("Stored at {}", path.display());
    Ok(())
}

fn clear(store: &TimingStore, key: &TimingKey, index: Option<u32>) -> anyhow::Result<()> {
    let number = CollectionNumber::new(key.collection)?;
    let Some(index) = index else {
        if store.remove(&key.reader, number.get())? {
            println!("Removed all timings for reader '{}', collection {number}", key.reader);
        } else {
            println!("Nothing stored for reader '{}', collection {number}", key.reader);
        }
        return Ok(());
    };

    let set = load_existing(store, &key.reader, number)?;
    let mut draft = TimingDraft::from_timing_set(&set);
    if !draft.clear(index) {
        println!("Sentence {index} has no interval");
        return Ok(());
    }
    store.write(&draft.to_timing_set())?;
    println!("Cleared {}", sentence_id(number.get(), index));
    Ok(())
}

fn report(violations: &[TimingViolation]) {
    for violation in violations {
        println!("  [WARN] {violation}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use versereel_project_model::TimingInterval;

    fn config_in(dir: &std::path::Path) -> AppConfig {
        AppConfig {
            data_dir: dir.to_path_buf(),
            ..AppConfig::default()
        }
    }

    #[tokio::test]
    async fn test_import_rejects_out_of_range_collection() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let set = TimingSet::from_items(
            "reader-1",
            12,
            vec![TimingInterval::new("p12s001", 0.0, 1.0)],
        );
        let file = TimingStore::export_to(&set, dir.path()).unwrap();

        let result = run(&config, TimingsAction::Import { file }).await;

        assert!(result.is_err());
        assert!(!config.timings_dir().join("timings.reader-1.part.12.json").exists());
    }

    #[tokio::test]
    async fn test_import_stores_valid_set() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let set = TimingSet::from_items(
            "reader-1",
            3,
            vec![TimingInterval::new("p3s001", 0.0, 1.0)],
        );
        let file = TimingStore::export_to(&set, dir.path()).unwrap();

        run(&config, TimingsAction::Import { file }).await.unwrap();

        let stored = timing_store(&config).read("reader-1", 3).unwrap();
        assert_eq!(stored, Some(set));
    }
}
