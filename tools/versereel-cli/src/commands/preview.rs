//! Render one frame of a selection.

use std::path::PathBuf;
use std::sync::Arc;

use versereel_common::config::AppConfig;
use versereel_common::format_clock;
use versereel_render_engine::{FontPainter, FrameRenderer};

use super::shared::{prepare, SelectionArgs, StyleArgs};

pub async fn run(
    config: &AppConfig,
    selection: SelectionArgs,
    style: StyleArgs,
    output: PathBuf,
) -> anyhow::Result<()> {
    let prepared = prepare(config, &selection, &style).await?;
    let painter = Arc::new(FontPainter::load(&config.render.fonts)?);
    let renderer = FrameRenderer::new(&prepared.state, prepared.geometry, painter)?;

    println!(
        "{}: sentences {} of {}",
        prepared.collection.title,
        prepared.range,
        prepared.collection.len()
    );
    match prepared.state.window {
        Some(window) => println!(
            "  Window: {} - {} ({:.1}s)",
            format_clock(window.start_secs),
            format_clock(window.end_secs),
            window.duration_secs()
        ),
        None => println!("  Window: not timed"),
    }
    if let (Some(reader), Some(timing)) = (&prepared.reader, &prepared.timing) {
        println!("  Reader: {} ({} sentences timed)", reader.name, timing.len());
    }

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    renderer.render_frame(0.0).save(&output)?;
    println!(
        "Preview written to {} ({}x{})",
        output.display(),
        prepared.geometry.width,
        prepared.geometry.height
    );
    Ok(())
}
