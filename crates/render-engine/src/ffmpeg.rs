//! Encoder backend driving the system `ffmpeg` binary.

use std::ffi::OsString;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::process::{Command, Stdio};

use versereel_common::{ffmpeg_secs, VersereelError, VersereelResult};

use crate::export::{AudioTrim, EncoderBackend, FrameSequence, StageContext};

/// Runs `ffmpeg` once per stage, reading `-progress` output for reporting.
#[derive(Debug, Clone)]
pub struct FfmpegBackend {
    ffmpeg: String,
    ffprobe: String,
}

impl Default for FfmpegBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl FfmpegBackend {
    pub fn new() -> Self {
        Self {
            ffmpeg: "ffmpeg".to_string(),
            ffprobe: "ffprobe".to_string(),
        }
    }

    /// Use specific binaries instead of the ones on `PATH`.
    pub fn with_binaries(ffmpeg: impl Into<String>, ffprobe: impl Into<String>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }

    fn run(&self, args: Vec<OsString>, ctx: &StageContext<'_>) -> VersereelResult<()> {
        let stage = ctx.stage().as_str();
        tracing::debug!(stage, args = ?args, "Running ffmpeg");

        let mut child = Command::new(&self.ffmpeg)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| VersereelError::encoding(stage, format!("Failed to start ffmpeg: {e}")))?;

        tracing::info!(pid = child.id(), stage, "ffmpeg process started");

        let stdout = child.stdout.take().ok_or_else(|| {
            VersereelError::encoding(stage, "Failed to capture ffmpeg stdout")
        })?;
        let stderr = child.stderr.take().ok_or_else(|| {
            VersereelError::encoding(stage, "Failed to capture ffmpeg stderr")
        })?;

        // Drain stderr concurrently so ffmpeg never blocks on a full pipe.
        let stderr_task = std::thread::spawn(move || -> String {
            let mut reader = BufReader::new(stderr);
            let mut output = String::new();
            match reader.read_to_string(&mut output) {
                Ok(_) => output,
                Err(err) => format!("<failed to read ffmpeg stderr: {err}>"),
            }
        });

        let mut reader = BufReader::new(stdout);
        let mut line = String::new();
        let mut state = ProgressState::default();
        let mut cancelled = false;
        loop {
            if ctx.is_cancelled() {
                cancelled = true;
                if let Err(e) = child.kill() {
                    tracing::debug!(error = %e, "Failed to kill ffmpeg");
                }
                break;
            }

            line.clear();
            let bytes = reader.read_line(&mut line).map_err(|e| {
                VersereelError::encoding(stage, format!("Failed reading ffmpeg progress: {e}"))
            })?;
            if bytes == 0 {
                break;
            }

            if let Some((key, value)) = line.trim().split_once('=') {
                state.update(key, value);
                if key == "progress" {
                    ctx.report(state.fraction(ctx.expected_secs()));
                }
            }
        }

        let status = child
            .wait()
            .map_err(|e| VersereelError::encoding(stage, format!("Failed to wait on ffmpeg: {e}")))?;
        let stderr_output = stderr_task
            .join()
            .unwrap_or_else(|_| "<failed to join stderr reader>".to_string());

        if cancelled {
            return Err(VersereelError::cancelled(stage));
        }
        if !status.success() {
            return Err(VersereelError::encoding(
                stage,
                format!("ffmpeg {stage} failed (status {status}): {}", stderr_output.trim()),
            ));
        }
        Ok(())
    }
}

impl EncoderBackend for FfmpegBackend {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    fn is_available(&self) -> bool {
        command_exists(&self.ffmpeg)
    }

    fn encode_video(
        &self,
        frames: &FrameSequence,
        output: &Path,
        ctx: &StageContext<'_>,
    ) -> VersereelResult<()> {
        self.run(encode_video_args(frames, output), ctx)
    }

    fn trim_audio(
        &self,
        source: &Path,
        trim: &AudioTrim,
        output: &Path,
        ctx: &StageContext<'_>,
    ) -> VersereelResult<()> {
        self.run(trim_audio_args(source, trim, output), ctx)
    }

    fn mux(
        &self,
        video: &Path,
        audio: &Path,
        bitrate_kbps: u32,
        output: &Path,
        ctx: &StageContext<'_>,
    ) -> VersereelResult<()> {
        self.run(mux_args(video, audio, bitrate_kbps, output), ctx)
    }

    fn probe_duration(&self, path: &Path) -> Option<f64> {
        let output = Command::new(&self.ffprobe)
            .args([
                "-v",
                "error",
                "-show_entries",
                "format=duration",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
            ])
            .arg(path)
            .output()
            .ok()?;
        if !output.status.success() {
            return None;
        }
        let raw = String::from_utf8(output.stdout).ok()?;
        let secs = raw.lines().next()?.trim().parse::<f64>().ok()?;
        (secs.is_finite() && secs >= 0.0).then_some(secs)
    }
}

fn common_args() -> Vec<OsString> {
    ["-y", "-hide_banner", "-loglevel", "error", "-nostats", "-progress", "pipe:1"]
        .into_iter()
        .map(OsString::from)
        .collect()
}

fn push(args: &mut Vec<OsString>, items: &[&str]) {
    args.extend(items.iter().map(OsString::from));
}

/// Frames to H.264 in a pixel format players accept.
pub fn encode_video_args(frames: &FrameSequence, output: &Path) -> Vec<OsString> {
    let fps = frames.fps.max(1).to_string();
    let mut args = common_args();
    push(&mut args, &["-framerate", fps.as_str(), "-i"]);
    args.push(frames.pattern().into_os_string());
    push(&mut args, &["-c:v", "libx264", "-pix_fmt", "yuv420p", "-r", fps.as_str()]);
    args.push(output.as_os_str().to_owned());
    args
}

/// Seek to the window start and keep only the window's audio.
pub fn trim_audio_args(source: &Path, trim: &AudioTrim, output: &Path) -> Vec<OsString> {
    let mut args = common_args();
    push(
        &mut args,
        &[
            "-ss",
            ffmpeg_secs(trim.start_secs).as_str(),
            "-t",
            ffmpeg_secs(trim.duration_secs.max(AudioTrim::MIN_DURATION_SECS)).as_str(),
            "-i",
        ],
    );
    args.push(source.as_os_str().to_owned());
    push(
        &mut args,
        &["-vn", "-c:a", "aac", "-b:a", format!("{}k", trim.bitrate_kbps).as_str()],
    );
    args.push(output.as_os_str().to_owned());
    args
}

/// Copy the video stream, re-encode audio, stop at the shorter stream.
pub fn mux_args(video: &Path, audio: &Path, bitrate_kbps: u32, output: &Path) -> Vec<OsString> {
    let mut args = common_args();
    args.push("-i".into());
    args.push(video.as_os_str().to_owned());
    args.push("-i".into());
    args.push(audio.as_os_str().to_owned());
    push(
        &mut args,
        &[
            "-map",
            "0:v:0",
            "-map",
            "1:a:0",
            "-c:v",
            "copy",
            "-c:a",
            "aac",
            "-b:a",
            format!("{bitrate_kbps}k").as_str(),
            "-shortest",
            "-movflags",
            "+faststart",
        ],
    );
    args.push(output.as_os_str().to_owned());
    args
}

/// Whether `binary` resolves on `PATH`.
pub fn command_exists(binary: &str) -> bool {
    Command::new("sh")
        .arg("-c")
        .arg(format!("command -v {binary} >/dev/null 2>&1"))
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

#[derive(Debug, Default)]
struct ProgressState {
    out_time_secs: f64,
    complete: bool,
}

impl ProgressState {
    fn update(&mut self, key: &str, value: &str) {
        match key {
            // ffmpeg reports microseconds under both keys.
            "out_time_ms" | "out_time_us" => {
                if let Ok(us) = value.parse::<f64>() {
                    self.out_time_secs = us / 1_000_000.0;
                }
            }
            "progress" => {
                self.complete = value == "end";
            }
            _ => {}
        }
    }

    fn fraction(&self, expected_secs: f64) -> f64 {
        if self.complete {
            1.0
        } else if expected_secs <= 0.0 {
            0.0
        } else {
            (self.out_time_secs / expected_secs).clamp(0.0, 1.0)
        }
    }
}
