use crate::infrastructure::media::{TransformError, Transcoder};
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use time::OffsetDateTime;
use tokio::fs;
use tracing::{debug, error, info};

/// Performs one blocking transformation of a file on disk. No timeout is
/// imposed here; arbitrarily large files may take arbitrarily long.
pub struct TransformExecutor {
    transcoder: Arc<dyn Transcoder>,
    thumbnail_dir: PathBuf,
}

impl TransformExecutor {
    pub fn new(transcoder: Arc<dyn Transcoder>, thumbnail_dir: PathBuf) -> Self {
        Self {
            transcoder,
            thumbnail_dir,
        }
    }

    /// Lossless trim: stream-copies `duration - start - trim_end` seconds
    /// from `start_sec` into a sibling `-cut` file, then replaces the source
    /// with it. The source is untouched when the subprocess fails.
    pub async fn cut(
        &self,
        source: &Path,
        start_sec: i64,
        trim_end_sec: i64,
    ) -> Result<(), TransformError> {
        let duration = self.transcoder.probe_duration(source).await?;
        debug!("duration: {}", duration);
        let length = duration - start_sec as f64 - trim_end_sec as f64;

        let target = cut_target(source);
        self.transcoder
            .cut_stream(source, &target, start_sec as f64, length)
            .await?;
        if !fs::try_exists(&target).await.unwrap_or(false) {
            return Err(TransformError::TransformFailed {
                path: source.to_path_buf(),
                detail: "cut output missing after ffmpeg exit".to_string(),
            });
        }

        fs::remove_file(source).await?;
        fs::rename(&target, source).await?;
        self.invalidate_thumbnail(source).await;
        info!("File cut successfully! second: {} - {}", start_sec, source.display());
        Ok(())
    }

    /// Full re-encode to H.264/AAC MP4. On success the original is deleted
    /// and the `-transcode.mp4` sibling becomes the canonical file; the
    /// caller repoints the catalog record at it.
    pub async fn transcode(&self, source: &Path) -> Result<PathBuf, TransformError> {
        // Rejects corrupt/unsupported input before spending encode time.
        let duration = self.transcoder.probe_duration(source).await?;
        debug!("duration: {}", duration);

        let size_mb = file_size_mb(source).await?;
        let crf = quality_crf(source, size_mb);
        let target = transcode_target(source);
        self.transcoder.reencode(source, &target, crf).await?;
        if !fs::try_exists(&target).await.unwrap_or(false) {
            return Err(TransformError::TransformFailed {
                path: source.to_path_buf(),
                detail: "transcode output missing after ffmpeg exit".to_string(),
            });
        }

        fs::remove_file(source).await?;
        self.invalidate_thumbnail(source).await;
        info!("File transcode successfully! {}", target.display());
        Ok(target)
    }

    /// Drops the cached thumbnail keyed by the hash of the (old) file path.
    async fn invalidate_thumbnail(&self, source: &Path) {
        let thumbnail = self
            .thumbnail_dir
            .join(format!("{}.png", thumbnail_key(source)));
        match fs::remove_file(&thumbnail).await {
            Ok(()) => info!("Thumbnail {} removed", thumbnail.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => error!("Thumbnail remove error: {}", e),
        }
    }
}

pub fn cut_target(source: &Path) -> PathBuf {
    let stem = source
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    let name = match source.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{stem}-cut.{ext}"),
        None => format!("{stem}-cut"),
    };
    source.with_file_name(name)
}

pub fn transcode_target(source: &Path) -> PathBuf {
    let stem = source
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    source.with_file_name(format!("{stem}-transcode.mp4"))
}

/// CRF tier by extension and size. Already-lossy `.avi` containers and very
/// large files are squeezed harder to bound output size.
pub fn quality_crf(source: &Path, size_mb: f64) -> &'static str {
    let ext = source
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase);
    if ext.as_deref() == Some("avi") {
        "10"
    } else if size_mb / 1024.0 > 4.0 {
        "15"
    } else {
        "12"
    }
}

/// Stable thumbnail cache key: SHA-256 of the file path.
pub fn thumbnail_key(source: &Path) -> String {
    let digest = Sha256::digest(source.display().to_string().as_bytes());
    hex::encode(digest)
}

/// File size in MB, two decimals.
pub async fn file_size_mb(path: &Path) -> Result<f64, std::io::Error> {
    let meta = fs::metadata(path).await?;
    let mb = meta.len() as f64 / (1024.0 * 1024.0);
    Ok((mb * 100.0).round() / 100.0)
}

pub async fn file_created_at(path: &Path) -> Result<OffsetDateTime, std::io::Error> {
    let meta = fs::metadata(path).await?;
    let created = meta
        .created()
        .or_else(|_| meta.modified())
        .unwrap_or_else(|_| SystemTime::now());
    Ok(OffsetDateTime::from(created))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::media::mock::MockTranscoder;
    use tempfile::TempDir;

    fn executor_with(mock: MockTranscoder, dir: &TempDir) -> (TransformExecutor, Arc<MockTranscoder>) {
        let transcoder = Arc::new(mock);
        let executor = TransformExecutor::new(transcoder.clone(), dir.path().join("thumbs"));
        (executor, transcoder)
    }

    async fn write_source(dir: &TempDir, name: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, b"original-bytes").await.unwrap();
        path
    }

    #[tokio::test]
    async fn cut_replaces_source_with_trimmed_output() {
        let dir = TempDir::new().unwrap();
        let source = write_source(&dir, "movie.ts").await;
        let (executor, transcoder) = executor_with(MockTranscoder::default(), &dir);

        executor.cut(&source, 3, 2).await.unwrap();

        // duration 120 - start 3 - trim 2
        assert_eq!(*transcoder.cuts.lock().unwrap(), vec![(3.0, 115.0)]);
        assert_eq!(fs::read(&source).await.unwrap(), b"cut-output");
        assert!(!cut_target(&source).exists());
    }

    #[tokio::test]
    async fn cut_fails_fast_without_duration() {
        let dir = TempDir::new().unwrap();
        let source = write_source(&dir, "broken.mp4").await;
        let (executor, transcoder) = executor_with(MockTranscoder::without_duration(), &dir);

        let err = executor.cut(&source, 5, 0).await.unwrap_err();
        assert!(matches!(err, TransformError::DurationUnavailable(_)));
        assert!(transcoder.cuts.lock().unwrap().is_empty());
        assert_eq!(fs::read(&source).await.unwrap(), b"original-bytes");
    }

    #[tokio::test]
    async fn cut_leaves_source_untouched_when_output_missing() {
        let dir = TempDir::new().unwrap();
        let source = write_source(&dir, "movie.mkv").await;
        let mock = MockTranscoder {
            write_output: false,
            ..MockTranscoder::default()
        };
        let (executor, _) = executor_with(mock, &dir);

        let err = executor.cut(&source, 0, 0).await.unwrap_err();
        assert!(matches!(err, TransformError::TransformFailed { .. }));
        assert_eq!(fs::read(&source).await.unwrap(), b"original-bytes");
    }

    #[tokio::test]
    async fn cut_leaves_source_untouched_on_nonzero_exit() {
        let dir = TempDir::new().unwrap();
        let source = write_source(&dir, "movie.mkv").await;
        let mock = MockTranscoder {
            fail_exit: true,
            ..MockTranscoder::default()
        };
        let (executor, _) = executor_with(mock, &dir);

        let err = executor.cut(&source, 10, 0).await.unwrap_err();
        assert!(matches!(err, TransformError::TransformFailed { .. }));
        assert_eq!(fs::read(&source).await.unwrap(), b"original-bytes");
    }

    #[tokio::test]
    async fn transcode_removes_source_and_keeps_mp4_sibling() {
        let dir = TempDir::new().unwrap();
        let source = write_source(&dir, "movie.ts").await;
        let (executor, transcoder) = executor_with(MockTranscoder::default(), &dir);

        let output = executor.transcode(&source).await.unwrap();

        assert_eq!(output, dir.path().join("movie-transcode.mp4"));
        assert!(output.exists());
        assert!(!source.exists());
        assert_eq!(*transcoder.crfs.lock().unwrap(), vec!["12".to_string()]);
    }

    #[tokio::test]
    async fn cut_invalidates_cached_thumbnail() {
        let dir = TempDir::new().unwrap();
        let source = write_source(&dir, "movie.mp4").await;
        let thumbs = dir.path().join("thumbs");
        fs::create_dir_all(&thumbs).await.unwrap();
        let thumbnail = thumbs.join(format!("{}.png", thumbnail_key(&source)));
        fs::write(&thumbnail, b"png").await.unwrap();

        let (executor, _) = executor_with(MockTranscoder::default(), &dir);
        executor.cut(&source, 1, 0).await.unwrap();
        assert!(!thumbnail.exists());
    }

    #[test]
    fn quality_crf_tiers() {
        // .avi wins even over the size threshold.
        assert_eq!(quality_crf(Path::new("/m/old.avi"), 100.0), "10");
        assert_eq!(quality_crf(Path::new("/m/huge.AVI"), 5.0 * 1024.0), "10");
        assert_eq!(quality_crf(Path::new("/m/huge.mkv"), 5.0 * 1024.0), "15");
        assert_eq!(quality_crf(Path::new("/m/normal.mp4"), 700.0), "12");
        assert_eq!(quality_crf(Path::new("/m/edge.mp4"), 4.0 * 1024.0), "12");
    }

    #[test]
    fn sibling_target_names() {
        assert_eq!(
            cut_target(Path::new("/media/movie.ts")),
            Path::new("/media/movie-cut.ts")
        );
        assert_eq!(
            cut_target(Path::new("/media/noext")),
            Path::new("/media/noext-cut")
        );
        assert_eq!(
            transcode_target(Path::new("/media/movie.avi")),
            Path::new("/media/movie-transcode.mp4")
        );
    }
}
