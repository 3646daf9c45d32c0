//! Export a selection to video.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use versereel_common::config::AppConfig;
use versereel_common::format_clock;
use versereel_project_model::ExportReadiness;
use versereel_render_engine::{
    CancelFlag, ExportJob, ExportPipeline, ExportProgress, ExportSettings, FontPainter,
    FrameRenderer, ProgressCallback,
};

use super::shared::{prepare, SelectionArgs, StyleArgs};

pub async fn run(
    config: &AppConfig,
    selection: SelectionArgs,
    style: StyleArgs,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let prepared = prepare(config, &selection, &style).await?;

    let (audio_locator, window) = match ExportReadiness::check(
        prepared.reader.as_ref(),
        &prepared.state,
        prepared.range,
    ) {
        ExportReadiness::Ready {
            audio_locator,
            window,
        } => (audio_locator, window),
        ExportReadiness::Blocked(reason) => {
            anyhow::bail!("Export is not possible: {reason}");
        }
    };

    let reader_id = prepared
        .reader
        .as_ref()
        .map(|r| r.id.as_str())
        .unwrap_or("reader");
    let output_path = output.unwrap_or_else(|| {
        PathBuf::from(format!(
            "{}_part-{}_{}.mp4",
            reader_id,
            prepared.state.collection_number,
            prepared.range
        ))
    });

    println!("Exporting {}", prepared.collection.title);
    println!("  Sentences: {}", prepared.range);
    println!(
        "  Window: {} - {} ({:.1}s)",
        format_clock(window.start_secs),
        format_clock(window.end_secs),
        window.duration_secs()
    );
    println!(
        "  Resolution: {}x{} @ {}fps",
        prepared.geometry.width, prepared.geometry.height, config.render.fps
    );
    println!("  Output: {}", output_path.display());

    let painter = Arc::new(FontPainter::load(&config.render.fonts)?);
    let renderer = FrameRenderer::new(&prepared.state, prepared.geometry, painter)?;
    let settings = ExportSettings::from_defaults(&config.render, config.work_dir());
    let pipeline = ExportPipeline::with_ffmpeg(settings)?;

    let cancel = CancelFlag::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let progress_cb: ProgressCallback = Box::new(|p: ExportProgress| {
        print!(
            "\r  Progress: {:>5.1}% {:<16} ({}/{} frames)  ",
            p.percent,
            p.stage.as_str(),
            p.frames_written,
            p.total_frames
        );
        let _ = std::io::stdout().flush();
    });

    let job = ExportJob {
        renderer: Arc::new(renderer),
        audio_locator,
        window,
        output_path,
    };

    match pipeline.run(job, cancel, Some(progress_cb)).await {
        Ok(report) => {
            println!();
            println!(
                "Export complete: {} ({} frames, {:.1}s in {:.1}s)",
                report.output.display(),
                report.frames,
                report.duration_secs,
                report.elapsed_secs
            );
            if let Some(probed) = report.probed_duration_secs {
                println!("  Probed duration: {probed:.2}s");
            }
            Ok(())
        }
        Err(e) => {
            println!();
            Err(anyhow::anyhow!("Export failed: {e}"))
        }
    }
}
