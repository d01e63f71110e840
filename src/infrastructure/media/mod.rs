pub mod ffmpeg;

#[cfg(test)]
pub mod mock;

pub use ffmpeg::FfmpegTranscoder;

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::process::Child;

#[derive(Debug, Error)]
pub enum TransformError {
    /// The media duration could not be determined; the input is treated as
    /// corrupt or unsupported rather than as an I/O failure.
    #[error("Duration parsing error: Invalid sample size - {0}")]
    DurationUnavailable(PathBuf),

    #[error("transform failed for {path}: {detail}")]
    TransformFailed { path: PathBuf, detail: String },

    #[error("unknown job kind {0}")]
    UnknownJobKind(i16),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Narrow capability over the external transcoder binary. The executor and
/// the streaming handlers depend on this instead of argv-building code.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Total duration of the file in seconds.
    async fn probe_duration(&self, path: &Path) -> Result<f64, TransformError>;

    /// Stream-copies `length_sec` seconds starting at `start_sec` into
    /// `output` without re-encoding.
    async fn cut_stream(
        &self,
        input: &Path,
        output: &Path,
        start_sec: f64,
        length_sec: f64,
    ) -> Result<(), TransformError>;

    /// Re-encodes `input` to H.264/AAC in an MP4 container at the given CRF,
    /// with metadata moved to the front for progressive playback.
    async fn reencode(&self, input: &Path, output: &Path, crf: &str) -> Result<(), TransformError>;

    /// Spawns a live transcode writing fragmented MP4 to stdout. The caller
    /// owns the child and its lifetime.
    fn spawn_live_stream(&self, input: &Path) -> Result<Child, TransformError>;
}
