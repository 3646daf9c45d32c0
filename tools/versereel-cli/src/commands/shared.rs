//! Arguments and loading steps shared by several commands.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Args;
use versereel_common::config::AppConfig;
use versereel_project_model::{
    Background, Collection, CollectionNumber, Reader, ReaderCatalog, RenderState, RenderStyle,
    Selection, SentenceRange, TextPosition, TimingSet, TimingStore, DEFAULT_BACKGROUND,
};
use versereel_render_engine::FrameGeometry;
use versereel_text_source::{CollectionFetcher, SourceDocumentParser};

/// Which sentences of which collection, read by whom.
#[derive(Args, Debug, Clone)]
pub struct SelectionArgs {
    /// Collection number (1-8)
    #[arg(short, long)]
    pub collection: i64,

    /// First selected sentence (1-based)
    #[arg(long, default_value = "1")]
    pub from: i64,

    /// Last selected sentence (defaults to --from)
    #[arg(long)]
    pub to: Option<i64>,

    /// Reader id (defaults to the first reader in the catalog)
    #[arg(short, long)]
    pub reader: Option<String>,

    /// Saved collection page (.html) or parsed collection (.json) to use instead of fetching
    #[arg(long)]
    pub source: Option<PathBuf>,

    /// Output width
    #[arg(long)]
    pub width: Option<u32>,

    /// Output height
    #[arg(long)]
    pub height: Option<u32>,
}

/// Overrides for the default render style.
#[derive(Args, Debug, Clone, Default)]
pub struct StyleArgs {
    /// Primary text size in reference pixels
    #[arg(long)]
    pub font_size: Option<f32>,

    /// Line height multiplier
    #[arg(long)]
    pub line_height: Option<f32>,

    /// Primary text colour (#rrggbb or rgba(...))
    #[arg(long)]
    pub text_color: Option<String>,

    /// Vertical anchor: top, center, bottom
    #[arg(long)]
    pub position: Option<TextPosition>,

    /// Disable text shadows
    #[arg(long)]
    pub no_shadow: bool,

    /// Shadow blur in reference pixels
    #[arg(long)]
    pub shadow_strength: Option<f32>,

    /// Solid background colour
    #[arg(long)]
    pub background: Option<String>,

    /// Background image, scaled to cover the frame
    #[arg(long)]
    pub background_image: Option<PathBuf>,

    /// Show the translation under the text
    #[arg(long)]
    pub show_translation: bool,

    /// Hide the collection label
    #[arg(long)]
    pub hide_collection_label: bool,

    /// Hide the reader name
    #[arg(long)]
    pub hide_reader_name: bool,
}

impl StyleArgs {
    pub fn to_style(&self) -> RenderStyle {
        let mut style = RenderStyle::default();
        if let Some(size) = self.font_size {
            style.font_size = size;
        }
        if let Some(height) = self.line_height {
            style.line_height = height;
        }
        if let Some(color) = &self.text_color {
            style.text_color = color.clone();
        }
        if let Some(position) = self.position {
            style.position = position;
        }
        style.shadow.enabled = !self.no_shadow;
        if let Some(strength) = self.shadow_strength {
            style.shadow.strength = strength;
        }
        let color = self
            .background
            .clone()
            .unwrap_or_else(|| DEFAULT_BACKGROUND.to_string());
        style.background = match &self.background_image {
            Some(path) => Background::Image {
                path: path.clone(),
                fallback_color: color,
            },
            None => Background::Solid { color },
        };
        style.show_translation = self.show_translation;
        style.show_collection_label = !self.hide_collection_label;
        style.show_reader_name = !self.hide_reader_name;
        style
    }
}

/// Load a collection from a saved file, or fetch it.
pub async fn load_collection(
    config: &AppConfig,
    number: CollectionNumber,
    source: Option<&Path>,
) -> anyhow::Result<Collection> {
    let Some(path) = source else {
        let fetcher = CollectionFetcher::new(&config.source)?;
        return Ok(fetcher.fetch(number).await?);
    };

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    let collection = if is_json {
        let collection: Collection = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse collection JSON {}", path.display()))?;
        if collection.number != number.get() {
            anyhow::bail!(
                "{} holds collection {}, not {}",
                path.display(),
                collection.number,
                number
            );
        }
        collection
    } else {
        SourceDocumentParser::new().parse_collection(number, &content, path.display().to_string())
    };
    tracing::debug!(
        collection = collection.number,
        sentences = collection.len(),
        path = %path.display(),
        "Loaded collection from file"
    );
    Ok(collection)
}

/// The configured reader catalog; empty when the file does not exist.
pub fn load_catalog(config: &AppConfig) -> anyhow::Result<ReaderCatalog> {
    let path = config.readers_path();
    if !path.exists() {
        tracing::warn!(path = %path.display(), "Reader catalog not found");
        return Ok(ReaderCatalog::default());
    }
    Ok(ReaderCatalog::load(&path)?)
}

pub fn timing_store(config: &AppConfig) -> TimingStore {
    TimingStore::new(config.timings_dir())
}

/// A selection resolved against text, reader, and timing data.
pub struct Prepared {
    pub collection: Collection,
    pub reader: Option<Reader>,
    pub timing: Option<TimingSet>,
    pub range: SentenceRange,
    pub state: RenderState,
    pub geometry: FrameGeometry,
}

pub async fn prepare(
    config: &AppConfig,
    args: &SelectionArgs,
    style: &StyleArgs,
) -> anyhow::Result<Prepared> {
    let number = CollectionNumber::new(args.collection)?;
    let collection = load_collection(config, number, args.source.as_deref()).await?;
    if collection.is_empty() {
        anyhow::bail!("Collection {number} has no sentences");
    }

    let catalog = load_catalog(config)?;
    let reader = match args.reader.as_deref() {
        Some(id) => Some(
            catalog
                .find(id)
                .cloned()
                .with_context(|| format!("Unknown reader '{id}'"))?,
        ),
        None => catalog.first().cloned(),
    };

    let timing = match &reader {
        Some(r) => timing_store(config).read(&r.id, number.get())?,
        None => None,
    };

    let range = SentenceRange::clamped(
        args.from,
        args.to.unwrap_or(args.from),
        collection.len() as u32,
    );
    let state = {
        let selection = Selection::new(&collection, range);
        RenderState::from_selection(&selection, reader.as_ref(), timing.as_ref(), style.to_style())
    };
    let geometry = FrameGeometry::new(
        args.width.unwrap_or(config.render.width),
        args.height.unwrap_or(config.render.height),
    );

    Ok(Prepared {
        collection,
        reader,
        timing,
        range,
        state,
        geometry,
    })
}
