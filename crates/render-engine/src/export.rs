//! Export pipeline: frames, video encode, audio trim, mux.
//!
//! One export runs at a time per [`ExportSlot`]. Every stage checks the
//! [`CancelFlag`] before starting, and all intermediate files live in a
//! temporary workspace that is removed on every exit path.

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use image::ImageFormat;
use serde::Serialize;
use versereel_common::{frame_count, frame_time_secs, RenderDefaults, VersereelError, VersereelResult};
use versereel_project_model::SelectionWindow;

use crate::compositor::FrameRenderer;
use crate::ffmpeg::FfmpegBackend;

/// Printf-style pattern of frame image names inside the frames directory.
pub const FRAME_PATTERN: &str = "frame_%05d.png";

/// Name of the `index`-th frame image.
pub fn frame_file_name(index: u64) -> String {
    format!("frame_{index:05}.png")
}

/// Stages of the export process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportStage {
    Idle,
    RenderingFrames,
    EncodingVideo,
    TrimmingAudio,
    Muxing,
    Done,
    Failed,
}

impl ExportStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::RenderingFrames => "rendering frames",
            Self::EncodingVideo => "encoding video",
            Self::TrimmingAudio => "trimming audio",
            Self::Muxing => "muxing",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    /// Percent range this stage covers in the overall progress.
    fn span(&self) -> (f64, f64) {
        match self {
            Self::Idle => (0.0, 0.0),
            Self::RenderingFrames => (0.0, 40.0),
            Self::EncodingVideo => (40.0, 60.0),
            Self::TrimmingAudio => (60.0, 80.0),
            Self::Muxing => (80.0, 95.0),
            Self::Done => (100.0, 100.0),
            Self::Failed => (0.0, 0.0),
        }
    }
}

impl std::fmt::Display for ExportStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Export progress report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportProgress {
    /// Overall progress in `[0, 100]`; never decreases within one export.
    pub percent: f64,

    pub stage: ExportStage,

    pub frames_written: u64,

    pub total_frames: u64,
}

/// Progress callback for export runs.
pub type ProgressCallback = Box<dyn Fn(ExportProgress) + Send + Sync>;

/// Folds stage-local progress into one monotone percentage.
pub(crate) struct ProgressTracker {
    callback: Option<ProgressCallback>,
    latest: Mutex<ExportProgress>,
}

impl ProgressTracker {
    fn new(callback: Option<ProgressCallback>) -> Self {
        Self {
            callback,
            latest: Mutex::new(ExportProgress {
                percent: 0.0,
                stage: ExportStage::Idle,
                frames_written: 0,
                total_frames: 0,
            }),
        }
    }

    fn emit(&self, update: impl FnOnce(&mut ExportProgress)) {
        let snapshot = {
            let mut latest = match self.latest.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            let before = latest.percent;
            update(&mut latest);
            latest.percent = latest.percent.clamp(before, 100.0);
            latest.clone()
        };
        if let Some(cb) = &self.callback {
            cb(snapshot);
        }
    }

    /// Report `fraction` of `stage` done.
    fn stage(&self, stage: ExportStage, fraction: f64) {
        let (from, to) = stage.span();
        self.emit(|p| {
            p.stage = stage;
            p.percent = from + (to - from) * fraction.clamp(0.0, 1.0);
        });
    }

    fn frames(&self, written: u64, total: u64) {
        let fraction = if total == 0 {
            1.0
        } else {
            written as f64 / total as f64
        };
        let (from, to) = ExportStage::RenderingFrames.span();
        self.emit(|p| {
            p.stage = ExportStage::RenderingFrames;
            p.frames_written = written;
            p.total_frames = total;
            p.percent = from + (to - from) * fraction;
        });
    }

    fn done(&self) {
        self.emit(|p| {
            p.stage = ExportStage::Done;
            p.percent = 100.0;
        });
    }

    fn failed(&self) {
        self.emit(|p| p.stage = ExportStage::Failed);
    }
}

/// Shared cancellation signal. Cloning shares the flag.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// `Err(Cancelled)` naming `stage` if cancellation was requested.
    pub fn check(&self, stage: ExportStage) -> VersereelResult<()> {
        if self.is_cancelled() {
            tracing::info!(stage = stage.as_str(), "Export cancelled");
            return Err(VersereelError::cancelled(stage.as_str()));
        }
        Ok(())
    }
}

/// Single-permit guard around the encoder workspace.
#[derive(Debug, Clone, Default)]
pub struct ExportSlot(Arc<AtomicBool>);

/// Held for the duration of one export; releases the slot on drop.
#[derive(Debug)]
pub struct ExportLease(Arc<AtomicBool>);

impl ExportSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the slot, or fail with `Busy` if an export already holds it.
    pub fn try_acquire(&self) -> VersereelResult<ExportLease> {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| VersereelError::Busy)?;
        Ok(ExportLease(Arc::clone(&self.0)))
    }

    pub fn is_busy(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

impl Drop for ExportLease {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// What a backend stage is allowed to see of the running export.
pub struct StageContext<'a> {
    stage: ExportStage,
    cancel: &'a CancelFlag,
    tracker: &'a ProgressTracker,
    expected_secs: f64,
}

impl StageContext<'_> {
    pub fn stage(&self) -> ExportStage {
        self.stage
    }

    /// Media duration the stage is expected to produce.
    pub fn expected_secs(&self) -> f64 {
        self.expected_secs
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Report stage-local progress in `[0, 1]`.
    pub fn report(&self, fraction: f64) {
        self.tracker.stage(self.stage, fraction);
    }
}

/// Numbered frame images on disk.
#[derive(Debug, Clone)]
pub struct FrameSequence {
    pub dir: PathBuf,
    pub count: u64,
    pub fps: u32,
}

impl FrameSequence {
    /// Input pattern for the encoder.
    pub fn pattern(&self) -> PathBuf {
        self.dir.join(FRAME_PATTERN)
    }
}

/// Audio trim request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioTrim {
    pub start_secs: f64,
    pub duration_secs: f64,
    pub bitrate_kbps: u32,
}

impl AudioTrim {
    /// Shortest trim an encoder is asked for.
    pub const MIN_DURATION_SECS: f64 = 0.01;

    pub fn for_window(window: &SelectionWindow, bitrate_kbps: u32) -> Self {
        Self {
            start_secs: window.start_secs.max(0.0),
            duration_secs: window.duration_secs().max(Self::MIN_DURATION_SECS),
            bitrate_kbps,
        }
    }
}

/// Encoder used by the pipeline's three media stages.
///
/// Methods block; the pipeline calls them off the async runtime. A failing
/// method returns an error whose message is surfaced to the caller as is.
pub trait EncoderBackend: Send + Sync {
    fn name(&self) -> &str;

    fn is_available(&self) -> bool;

    /// Encode the frame images into a video-only stream.
    fn encode_video(
        &self,
        frames: &FrameSequence,
        output: &Path,
        ctx: &StageContext<'_>,
    ) -> VersereelResult<()>;

    /// Cut `trim` out of `source` and re-encode it as a compressed audio stream.
    fn trim_audio(
        &self,
        source: &Path,
        trim: &AudioTrim,
        output: &Path,
        ctx: &StageContext<'_>,
    ) -> VersereelResult<()>;

    /// Combine video and audio into one container, cut to the shorter stream.
    fn mux(
        &self,
        video: &Path,
        audio: &Path,
        bitrate_kbps: u32,
        output: &Path,
        ctx: &StageContext<'_>,
    ) -> VersereelResult<()>;

    /// Duration of a finished file, when the backend can tell.
    fn probe_duration(&self, _path: &Path) -> Option<f64> {
        None
    }
}

/// Where the export reads its audio from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioSource {
    Remote(String),
    Local(PathBuf),
}

impl AudioSource {
    pub fn parse(locator: &str) -> Self {
        let locator = locator.trim();
        let lower = locator.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            Self::Remote(locator.to_string())
        } else {
            let path = locator.strip_prefix("file://").unwrap_or(locator);
            Self::Local(PathBuf::from(path))
        }
    }

    /// Fail early when a local file is missing.
    pub fn check(&self) -> VersereelResult<()> {
        match self {
            Self::Local(path) if !path.is_file() => Err(VersereelError::precondition(format!(
                "Audio source not found: {}",
                path.display()
            ))),
            _ => Ok(()),
        }
    }

    /// File extension to keep for a downloaded copy.
    fn extension(&self) -> String {
        let name = match self {
            Self::Remote(url) => url
                .split(['?', '#'])
                .next()
                .and_then(|p| p.rsplit('/').next())
                .unwrap_or_default()
                .to_string(),
            Self::Local(path) => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        };
        name.rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .filter(|ext| !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
            .unwrap_or_else(|| "mp3".to_string())
    }
}

/// Export-wide settings.
#[derive(Debug, Clone)]
pub struct ExportSettings {
    pub fps: u32,
    pub audio_bitrate_kbps: u32,
    /// Parent directory of per-export workspaces.
    pub work_dir: PathBuf,
}

impl ExportSettings {
    pub fn from_defaults(defaults: &RenderDefaults, work_dir: PathBuf) -> Self {
        Self {
            fps: defaults.fps.max(1),
            audio_bitrate_kbps: defaults.audio_bitrate_kbps.max(32),
            work_dir,
        }
    }
}

/// One export request.
#[derive(Clone)]
pub struct ExportJob {
    pub renderer: Arc<FrameRenderer>,
    pub audio_locator: String,
    pub window: SelectionWindow,
    pub output_path: PathBuf,
}

/// Summary of a finished export.
#[derive(Debug, Clone, Serialize)]
pub struct ExportReport {
    pub output: PathBuf,
    pub frames: u64,
    pub duration_secs: f64,
    pub elapsed_secs: f64,
    /// Duration of the written file as probed by the backend, if available.
    pub probed_duration_secs: Option<f64>,
}

/// Runs exports against an encoder backend.
pub struct ExportPipeline {
    backend: Arc<dyn EncoderBackend>,
    settings: ExportSettings,
    slot: ExportSlot,
    http: reqwest::Client,
}

impl ExportPipeline {
    pub fn new(backend: Arc<dyn EncoderBackend>, settings: ExportSettings) -> VersereelResult<Self> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| VersereelError::retrieval(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            backend,
            settings,
            slot: ExportSlot::new(),
            http,
        })
    }

    /// Pipeline with the system ffmpeg.
    pub fn with_ffmpeg(settings: ExportSettings) -> VersereelResult<Self> {
        Self::new(Arc::new(FfmpegBackend::new()), settings)
    }

    /// Handle to this pipeline's slot, e.g. to report whether it is busy.
    pub fn slot(&self) -> ExportSlot {
        self.slot.clone()
    }

    pub fn backend(&self) -> &dyn EncoderBackend {
        self.backend.as_ref()
    }

    /// Render, encode, trim, and mux one selection into `job.output_path`.
    pub async fn run(
        &self,
        job: ExportJob,
        cancel: CancelFlag,
        progress: Option<ProgressCallback>,
    ) -> VersereelResult<ExportReport> {
        let _lease = self.slot.try_acquire()?;
        let started = Instant::now();

        if !self.backend.is_available() {
            return Err(VersereelError::precondition(format!(
                "Encoder backend '{}' is not available",
                self.backend.name()
            )));
        }
        let audio = AudioSource::parse(&job.audio_locator);
        audio.check()?;

        let work_dir = self.settings.work_dir.clone();
        let workspace = blocking(ExportStage::RenderingFrames, move || {
            std::fs::create_dir_all(&work_dir)?;
            Ok(tempfile::Builder::new()
                .prefix("versereel-export-")
                .tempdir_in(&work_dir)?)
        })
        .await?;

        tracing::info!(
            output = %job.output_path.display(),
            backend = self.backend.name(),
            start_secs = job.window.start_secs,
            end_secs = job.window.end_secs,
            workspace = %workspace.path().display(),
            "Starting export"
        );

        let tracker = Arc::new(ProgressTracker::new(progress));
        let result = self
            .run_stages(&job, &audio, workspace.path(), &cancel, &tracker)
            .await;

        remove_workspace(workspace).await;

        match result {
            Ok(frames) => {
                tracker.done();
                let probed_duration_secs = {
                    let backend = Arc::clone(&self.backend);
                    let output = job.output_path.clone();
                    tokio::task::spawn_blocking(move || backend.probe_duration(&output))
                        .await
                        .unwrap_or(None)
                };
                let report = ExportReport {
                    probed_duration_secs,
                    output: job.output_path,
                    frames,
                    duration_secs: job.window.duration_secs(),
                    elapsed_secs: started.elapsed().as_secs_f64(),
                };
                if let Some(probed) = report.probed_duration_secs {
                    if (probed - report.duration_secs).abs() > 0.5 {
                        tracing::warn!(
                            expected_secs = report.duration_secs,
                            probed_secs = probed,
                            "Exported duration differs from the selection window"
                        );
                    }
                }
                tracing::info!(
                    output = %report.output.display(),
                    frames = report.frames,
                    elapsed_secs = report.elapsed_secs,
                    "Export complete"
                );
                Ok(report)
            }
            Err(e) => {
                tracker.failed();
                tracing::warn!(error = %e, "Export failed");
                Err(e)
            }
        }
    }

    async fn run_stages(
        &self,
        job: &ExportJob,
        audio: &AudioSource,
        workspace: &Path,
        cancel: &CancelFlag,
        tracker: &Arc<ProgressTracker>,
    ) -> VersereelResult<u64> {
        let fps = self.settings.fps;
        let duration = job.window.duration_secs();
        let total_frames = frame_count(duration, fps);

        // Frames
        cancel.check(ExportStage::RenderingFrames)?;
        tracker.frames(0, total_frames);
        let frames = FrameSequence {
            dir: workspace.join("frames"),
            count: total_frames,
            fps,
        };
        {
            let renderer = Arc::clone(&job.renderer);
            let frames = frames.clone();
            let cancel = cancel.clone();
            let tracker = Arc::clone(tracker);
            blocking(ExportStage::RenderingFrames, move || {
                write_frames(&renderer, &frames, &cancel, &tracker)
            })
            .await?;
        }

        // Video
        cancel.check(ExportStage::EncodingVideo)?;
        let video = workspace.join("video.mp4");
        {
            let backend = Arc::clone(&self.backend);
            let frames = frames.clone();
            let video = video.clone();
            let cancel = cancel.clone();
            let tracker = Arc::clone(tracker);
            blocking(ExportStage::EncodingVideo, move || {
                tracker.stage(ExportStage::EncodingVideo, 0.0);
                let ctx = StageContext {
                    stage: ExportStage::EncodingVideo,
                    cancel: &cancel,
                    tracker: &tracker,
                    expected_secs: frames.count as f64 / frames.fps as f64,
                };
                backend.encode_video(&frames, &video, &ctx)?;
                ctx.report(1.0);
                Ok(())
            })
            .await?;
        }

        // Audio
        cancel.check(ExportStage::TrimmingAudio)?;
        tracker.stage(ExportStage::TrimmingAudio, 0.0);
        let source = match audio {
            AudioSource::Local(path) => path.clone(),
            AudioSource::Remote(url) => {
                let dest = workspace.join(format!("source.{}", audio.extension()));
                self.download_audio(url, &dest).await?;
                cancel.check(ExportStage::TrimmingAudio)?;
                dest
            }
        };
        let trimmed = workspace.join("audio.m4a");
        {
            let backend = Arc::clone(&self.backend);
            let trim = AudioTrim::for_window(&job.window, self.settings.audio_bitrate_kbps);
            let trimmed = trimmed.clone();
            let cancel = cancel.clone();
            let tracker = Arc::clone(tracker);
            blocking(ExportStage::TrimmingAudio, move || {
                let ctx = StageContext {
                    stage: ExportStage::TrimmingAudio,
                    cancel: &cancel,
                    tracker: &tracker,
                    expected_secs: trim.duration_secs,
                };
                backend.trim_audio(&source, &trim, &trimmed, &ctx)?;
                ctx.report(1.0);
                Ok(())
            })
            .await?;
        }

        // Mux
        cancel.check(ExportStage::Muxing)?;
        let muxed = workspace.join("output.mp4");
        {
            let backend = Arc::clone(&self.backend);
            let video = video.clone();
            let trimmed = trimmed.clone();
            let muxed = muxed.clone();
            let bitrate_kbps = self.settings.audio_bitrate_kbps;
            let output = job.output_path.clone();
            let cancel = cancel.clone();
            let tracker = Arc::clone(tracker);
            blocking(ExportStage::Muxing, move || {
                tracker.stage(ExportStage::Muxing, 0.0);
                let ctx = StageContext {
                    stage: ExportStage::Muxing,
                    cancel: &cancel,
                    tracker: &tracker,
                    expected_secs: duration,
                };
                backend.mux(&video, &trimmed, bitrate_kbps, &muxed, &ctx)?;
                deliver(&muxed, &output)?;
                ctx.report(1.0);
                Ok(())
            })
            .await?;
        }

        Ok(total_frames)
    }

    /// Fetch a remote audio source in full.
    async fn download_audio(&self, url: &str, dest: &Path) -> VersereelResult<()> {
        tracing::info!(url = %url, "Downloading audio source");
        let response = self.http.get(url).send().await.map_err(|e| {
            VersereelError::retrieval(format!("Failed to download audio {url}: {e}"))
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(VersereelError::Retrieval {
                message: format!("Failed to download audio {url} (status {status})"),
                collection: None,
                status: Some(status.as_u16()),
            });
        }

        let bytes = response.bytes().await.map_err(|e| VersereelError::Retrieval {
            message: format!("Failed to read audio {url}: {e}"),
            collection: None,
            status: Some(status.as_u16()),
        })?;
        tokio::fs::write(dest, &bytes).await?;
        tracing::debug!(bytes = bytes.len(), path = %dest.display(), "Audio source saved");
        Ok(())
    }
}

/// Copy the muxed file to the requested output, creating parent dirs.
fn deliver(muxed: &Path, output: &Path) -> VersereelResult<()> {
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::copy(muxed, output).map_err(|e| {
        VersereelError::encoding(
            ExportStage::Muxing.as_str(),
            format!("Failed to copy export to {}: {e}", output.display()),
        )
    })?;
    Ok(())
}

/// Delete the export workspace off the async workers. Failures are logged
/// and never replace the export result.
async fn remove_workspace(workspace: tempfile::TempDir) {
    let path = workspace.path().to_path_buf();
    let outcome = tokio::task::spawn_blocking(move || workspace.close()).await;
    let error = match outcome {
        Ok(Ok(())) => return,
        Ok(Err(e)) => e.to_string(),
        Err(e) => e.to_string(),
    };
    tracing::debug!(
        path = %path.display(),
        error = %error,
        "Failed to remove export workspace"
    );
}

/// Run a blocking stage body on the blocking pool.
async fn blocking<T, F>(stage: ExportStage, f: F) -> VersereelResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> VersereelResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        VersereelError::encoding(stage.as_str(), format!("{stage} task failed: {e}"))
    })?
}

/// Write every frame image. Static frames are encoded once and reused.
fn write_frames(
    renderer: &FrameRenderer,
    frames: &FrameSequence,
    cancel: &CancelFlag,
    tracker: &ProgressTracker,
) -> VersereelResult<()> {
    let stage = ExportStage::RenderingFrames;
    let frame_error = |index: u64, e: &dyn std::fmt::Display| {
        VersereelError::encoding(stage.as_str(), format!("Failed to write frame {index}: {e}"))
    };

    std::fs::create_dir_all(&frames.dir).map_err(|e| frame_error(0, &e))?;

    let mut encoded: Option<Vec<u8>> = None;
    for index in 0..frames.count {
        cancel.check(stage)?;

        if encoded.is_none() || !renderer.is_static() {
            let image = renderer.render_frame(frame_time_secs(index, frames.fps));
            let mut buf = Vec::new();
            image
                .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
                .map_err(|e| frame_error(index, &e))?;
            encoded = Some(buf);
        }
        let bytes = encoded.as_deref().unwrap_or_default();
        std::fs::write(frames.dir.join(frame_file_name(index)), bytes)
            .map_err(|e| frame_error(index, &e))?;

        tracker.frames(index + 1, frames.count);
    }

    tracing::debug!(frames = frames.count, dir = %frames.dir.display(), "Frames written");
    Ok(())
}
