use crate::config::settings::AppConfig;
use crate::infrastructure::media::TransformError;
use crate::infrastructure::process::ProcessHandle;
use crate::modules::stream::range::{RangeOutcome, resolve_range};
use crate::state::AppState;
use axum::{
    body::Body,
    extract::{Path as UrlPath, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use bytes::{Bytes, BytesMut};
use futures_util::Stream;
use std::io::{self, ErrorKind, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::process::ChildStdout;
use tokio::time::timeout;
use tokio_util::io::ReaderStream;
use tracing::{error, info, warn};

const CHUNK_SIZE: usize = 1024 * 1024;
const LIVE_READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Containers the client cannot seek natively; everything else is served as
/// raw byte ranges because re-encoding a seekable container wastes CPU.
const LIVE_TRANSCODE_EXTS: [&str; 5] = ["avi", "wmv", "rmvb", "ts", "mpg"];

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("Invalid or unsafe path")]
    PathUnsafe,
    #[error("Video not found for streaming")]
    FileNotFound,
    #[error("Invalid request range")]
    InvalidRange,
    #[error("transcoder failed to start: {0}")]
    Transcode(#[from] TransformError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl IntoResponse for StreamError {
    fn into_response(self) -> Response {
        let (status, msg) = match &self {
            StreamError::PathUnsafe => (StatusCode::FORBIDDEN, "Invalid or unsafe path"),
            StreamError::FileNotFound => (StatusCode::NOT_FOUND, "Video not found for streaming"),
            StreamError::InvalidRange => (StatusCode::NOT_FOUND, "Invalid request range"),
            // No internals leak to the client.
            StreamError::Transcode(_) | StreamError::Io(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Server error")
            }
        };
        (status, msg).into_response()
    }
}

fn decode_source_path(encoded: &str) -> Result<PathBuf, StreamError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(encoded)
        .map_err(|_| StreamError::PathUnsafe)?;
    let path = String::from_utf8(bytes).map_err(|_| StreamError::PathUnsafe)?;
    Ok(PathBuf::from(path))
}

/// Rejects anything that is not an existing regular file inside the allowed
/// roots. Returns the file size.
async fn validate_source(config: &AppConfig, path: &Path) -> Result<u64, StreamError> {
    let meta = tokio::fs::metadata(path).await.map_err(|e| {
        if e.kind() == ErrorKind::NotFound {
            StreamError::FileNotFound
        } else {
            StreamError::Io(e)
        }
    })?;
    if !meta.is_file() {
        return Err(StreamError::PathUnsafe);
    }
    if !config.media_roots.is_empty() && !config.media_roots.iter().any(|root| path.starts_with(root))
    {
        return Err(StreamError::PathUnsafe);
    }
    Ok(meta.len())
}

fn wants_live_transcode(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .is_some_and(|ext| LIVE_TRANSCODE_EXTS.contains(&ext.as_str()))
}

/// Direct range mode: 200 with the whole file, or 206 with exactly the
/// requested slice read in bounded chunks.
async fn direct_range_response(
    path: &Path,
    file_size: u64,
    range_header: Option<&str>,
) -> Result<Response, StreamError> {
    let mime = mime_guess::from_path(path).first_or_octet_stream();

    match resolve_range(range_header, file_size) {
        RangeOutcome::Unsatisfiable => {
            warn!("Invalid request range: {:?}", range_header);
            Err(StreamError::InvalidRange)
        }
        RangeOutcome::Partial(start, end) => {
            let mut file = File::open(path).await?;
            file.seek(SeekFrom::Start(start)).await?;
            let len = end - start + 1;
            let stream = ReaderStream::with_capacity(file.take(len), CHUNK_SIZE);
            Response::builder()
                .status(StatusCode::PARTIAL_CONTENT)
                .header(header::CONTENT_TYPE, mime.as_ref())
                .header(header::CONTENT_LENGTH, len)
                .header(
                    header::CONTENT_RANGE,
                    format!("bytes {start}-{end}/{file_size}"),
                )
                .body(Body::from_stream(stream))
                .map_err(|e| StreamError::Io(io::Error::other(e)))
        }
        RangeOutcome::Full => {
            let file = File::open(path).await?;
            let stream = ReaderStream::with_capacity(file, CHUNK_SIZE);
            Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, mime.as_ref())
                .header(header::CONTENT_LENGTH, file_size)
                .header(header::ACCEPT_RANGES, "bytes")
                .body(Body::from_stream(stream))
                .map_err(|e| StreamError::Io(io::Error::other(e)))
        }
    }
}

/// Owns the subprocess handle for the lifetime of one response body; a
/// dropped body (client abort or normal end) kills the encoder.
struct LiveStreamGuard(ProcessHandle);

impl Drop for LiveStreamGuard {
    fn drop(&mut self) {
        self.0.kill();
    }
}

struct LiveState {
    stdout: ChildStdout,
    guard: LiveStreamGuard,
    done: bool,
}

fn live_chunk_stream(
    stdout: ChildStdout,
    handle: ProcessHandle,
    read_timeout: Duration,
) -> impl Stream<Item = Result<Bytes, io::Error>> {
    let state = LiveState {
        stdout,
        guard: LiveStreamGuard(handle),
        done: false,
    };
    futures_util::stream::unfold(state, move |mut st| async move {
        if st.done {
            return None;
        }
        let mut buf = BytesMut::with_capacity(CHUNK_SIZE);
        match timeout(read_timeout, st.stdout.read_buf(&mut buf)).await {
            Ok(Ok(0)) => None,
            Ok(Ok(_)) => Some((Ok(buf.freeze()), st)),
            Ok(Err(e)) => {
                st.done = true;
                Some((Err(e), st))
            }
            Err(_) => {
                // Hung encoder: kill it and end the stream with an empty
                // terminal chunk instead of hanging the player.
                error!("FFmpeg process timed out");
                st.guard.0.kill();
                st.done = true;
                Some((Ok(Bytes::new()), st))
            }
        }
    })
}

/// Live transcode mode. At most one live encode runs at a time; starting a
/// new one kills any predecessor, so the last viewer wins.
async fn live_transcode_response(state: &AppState, path: &Path) -> Result<Response, StreamError> {
    state.registry.kill_all_and_clear();

    let mut child = state.transcoder.spawn_live_stream(path)?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| StreamError::Io(io::Error::other("transcoder stdout not piped")))?;
    let handle = ProcessHandle::new(child);
    state.registry.register(handle.clone());
    info!("live transcode started: pid {:?} - {}", handle.pid(), path.display());

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "video/mp4")
        .body(Body::from_stream(live_chunk_stream(
            stdout,
            handle,
            LIVE_READ_TIMEOUT,
        )))
        .map_err(|e| StreamError::Io(io::Error::other(e)))
}

async fn direct_stream(
    state: &AppState,
    encoded: &str,
    headers: &HeaderMap,
) -> Result<Response, StreamError> {
    let path = decode_source_path(encoded)?;
    let file_size = validate_source(&state.config, &path).await?;
    let range = headers.get(header::RANGE).and_then(|v| v.to_str().ok());
    direct_range_response(&path, file_size, range).await
}

#[utoipa::path(
    get,
    path = "/api/stream/{id_name}/{base_name}",
    params(
        ("id_name" = String, Path, description = "Catalog file id"),
        ("base_name" = String, Path, description = "URL-safe base64 of the file path")
    ),
    responses(
        (status = 200, description = "Whole file"),
        (status = 206, description = "Partial Content"),
        (status = 403, description = "Invalid or unsafe path"),
        (status = 404, description = "Not found or unsatisfiable range"),
        (status = 500, description = "Internal Server Error")
    ),
    tag = "Stream"
)]
pub async fn stream_video(
    State(state): State<AppState>,
    UrlPath((id_name, base_name)): UrlPath<(String, String)>,
    headers: HeaderMap,
) -> Response {
    info!("/api/stream - id_name: {}", id_name);
    match direct_stream(&state, &base_name, &headers).await {
        Ok(response) => response,
        Err(e) => {
            warn!("/api/stream/{} - {}", id_name, e);
            e.into_response()
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/convert/{id_name}/{base_name}",
    params(
        ("id_name" = String, Path, description = "Catalog file id"),
        ("base_name" = String, Path, description = "URL-safe base64 of the file path")
    ),
    responses(
        (status = 200, description = "Chunked fragmented MP4 stream", content_type = "video/mp4"),
        (status = 403, description = "Invalid or unsafe path"),
        (status = 404, description = "Not found"),
        (status = 500, description = "Internal Server Error")
    ),
    tag = "Stream"
)]
pub async fn convert_video(
    State(state): State<AppState>,
    UrlPath((id_name, base_name)): UrlPath<(String, String)>,
) -> Response {
    info!("/api/convert - id_name: {}", id_name);
    let result = async {
        let path = decode_source_path(&base_name)?;
        validate_source(&state.config, &path).await?;
        live_transcode_response(&state, &path).await
    }
    .await;
    match result {
        Ok(response) => response,
        Err(e) => {
            warn!("/api/convert/{} - {}", id_name, e);
            e.into_response()
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/stream/convert/{id_name}/{base_name}",
    params(
        ("id_name" = String, Path, description = "Catalog file id"),
        ("base_name" = String, Path, description = "URL-safe base64 of the file path")
    ),
    responses(
        (status = 200, description = "Whole file or live transcode"),
        (status = 206, description = "Partial Content"),
        (status = 403, description = "Invalid or unsafe path"),
        (status = 404, description = "Not found or unsatisfiable range"),
        (status = 500, description = "Internal Server Error")
    ),
    tag = "Stream"
)]
pub async fn stream_or_convert_video(
    State(state): State<AppState>,
    UrlPath((id_name, base_name)): UrlPath<(String, String)>,
    headers: HeaderMap,
) -> Response {
    info!("/api/stream/convert - id_name: {}", id_name);
    let result = async {
        let path = decode_source_path(&base_name)?;
        let file_size = validate_source(&state.config, &path).await?;
        if wants_live_transcode(&path) {
            live_transcode_response(&state, &path).await
        } else {
            let range = headers.get(header::RANGE).and_then(|v| v.to_str().ok());
            direct_range_response(&path, file_size, range).await
        }
    }
    .await;
    match result {
        Ok(response) => response,
        Err(e) => {
            warn!("/api/stream/convert/{} - {}", id_name, e);
            e.into_response()
        }
    }
}
