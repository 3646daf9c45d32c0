//! Media-time helpers shared by the timing editor and the export pipeline.
//!
//! All times are floating-point seconds relative to the start of the
//! collection's audio source.

/// Number of frames for a clip: `round(duration * fps)`, never below 1.
pub fn frame_count(duration_secs: f64, fps: u32) -> u64 {
    let frames = (duration_secs.max(0.0) * fps as f64).round() as u64;
    frames.max(1)
}

/// Presentation time of a frame index at the given rate.
pub fn frame_time_secs(frame_index: u64, fps: u32) -> f64 {
    frame_index as f64 / fps.max(1) as f64
}

/// Format seconds as `m:ss` for human-readable output.
pub fn format_clock(secs: f64) -> String {
    let s = secs.max(0.0);
    let minutes = (s / 60.0).floor() as u64;
    let rest = (s % 60.0).floor() as u64;
    format!("{minutes}:{rest:02}")
}

/// Format seconds as an ffmpeg time argument.
pub fn ffmpeg_secs(secs: f64) -> String {
    format!("{:.3}", secs.max(0.0))
}
