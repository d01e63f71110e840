use crate::common::response::{ApiError, ApiResponse, ApiSuccess};
use crate::infrastructure::media::TransformError;
use crate::modules::jobs::model::{FileRecord, JobKind, JobStatus, JobSubmission};
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::{error, info, warn};

/// Looks up the catalog record and verifies the media is probeable before
/// accepting a job. Returns an error response when either check fails.
async fn checked_file_record(
    state: &AppState,
    id_name: &str,
) -> Result<FileRecord, ApiError> {
    let record = match state.store.fetch_file_record(id_name).await {
        Ok(Some(record)) => record,
        Ok(None) => {
            warn!("Database not found: {}", id_name);
            return Err(ApiError(
                "Database not found".to_string(),
                StatusCode::BAD_REQUEST,
            ));
        }
        Err(e) => {
            error!("Store error: {}", e);
            return Err(ApiError(
                "Server error".to_string(),
                StatusCode::INTERNAL_SERVER_ERROR,
            ));
        }
    };

    let source = record.source_path();
    match state.transcoder.probe_duration(&source).await {
        Ok(_) => Ok(record),
        Err(TransformError::DurationUnavailable(path)) => {
            error!("Duration parsing error: Invalid sample size - {}", path.display());
            Err(ApiError(
                "Duration parsing error: Invalid sample size".to_string(),
                StatusCode::BAD_REQUEST,
            ))
        }
        Err(e) => {
            error!("Probe error: {}", e);
            Err(ApiError(
                "Server error".to_string(),
                StatusCode::INTERNAL_SERVER_ERROR,
            ))
        }
    }
}

fn submission_response(
    submission: JobSubmission,
    in_progress: &str,
    completed: &str,
) -> ApiSuccess<String> {
    let data = match submission {
        JobSubmission::Created(_) => in_progress.to_string(),
        JobSubmission::Exists { status, .. } => match status {
            JobStatus::Done => completed.to_string(),
            _ => in_progress.to_string(),
        },
    };
    ApiSuccess(ApiResponse::success(data, "Success"), StatusCode::OK)
}

#[utoipa::path(
    get,
    path = "/api/cut/{id_name}/{second}",
    params(
        ("id_name" = String, Path, description = "Catalog file id"),
        ("second" = i64, Path, description = "Seconds to trim from the start")
    ),
    responses(
        (status = 200, description = "Cut job queued or already present", body = ApiResponse<String>),
        (status = 400, description = "Unknown file or unreadable media"),
        (status = 500, description = "Internal Server Error")
    ),
    tag = "Jobs"
)]
pub async fn submit_cut(
    State(state): State<AppState>,
    Path((id_name, second)): Path<(String, i64)>,
) -> impl IntoResponse {
    info!("/api/cut - id_name: {}", id_name);

    let record = match checked_file_record(&state, &id_name).await {
        Ok(record) => record,
        Err(e) => return e.into_response(),
    };

    match state
        .store
        .create_job_if_absent(&record, JobKind::Cut, second, 0)
        .await
    {
        Ok(submission) => {
            info!("Video cutting queued! id: {} - {}", id_name, second);
            submission_response(
                submission,
                "Video cutting in progress!",
                "Video cutting completed!",
            )
            .into_response()
        }
        Err(e) => {
            error!("Store error: {}", e);
            ApiError("Server error".to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response()
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/transcode/{id_name}",
    params(
        ("id_name" = String, Path, description = "Catalog file id")
    ),
    responses(
        (status = 200, description = "Transcode job queued or already present", body = ApiResponse<String>),
        (status = 400, description = "Unknown file or unreadable media"),
        (status = 500, description = "Internal Server Error")
    ),
    tag = "Jobs"
)]
pub async fn submit_transcode(
    State(state): State<AppState>,
    Path(id_name): Path<String>,
) -> impl IntoResponse {
    info!("/api/transcode - id_name: {}", id_name);

    let record = match checked_file_record(&state, &id_name).await {
        Ok(record) => record,
        Err(e) => return e.into_response(),
    };

    match state
        .store
        .create_job_if_absent(&record, JobKind::Transcode, 0, 0)
        .await
    {
        Ok(submission) => {
            info!("Video transcoding queued! id: {}", id_name);
            submission_response(
                submission,
                "Video transcoding in progress!",
                "Video transcoding completed!",
            )
            .into_response()
        }
        Err(e) => {
            error!("Store error: {}", e);
            ApiError("Server error".to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::settings::AppConfig;
    use crate::infrastructure::media::mock::MockTranscoder;
    use crate::infrastructure::process::ProcessRegistry;
    use crate::modules::jobs::repository::{CatalogStore, memory::MemoryCatalog};
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn state_with(catalog: Arc<MemoryCatalog>, transcoder: MockTranscoder) -> AppState {
        let config = AppConfig {
            server_port: 0,
            database_url: String::new(),
            media_roots: Vec::new(),
            thumbnail_dir: "/tmp/thumbs".into(),
            ffmpeg_bin: "ffmpeg".to_string(),
            ffprobe_bin: "ffprobe".to_string(),
            mission_interval_secs: 1,
        };
        AppState::new(
            config,
            catalog,
            Arc::new(transcoder),
            Arc::new(ProcessRegistry::new()),
        )
    }

    fn record(id: &str) -> FileRecord {
        FileRecord {
            id: id.to_string(),
            path: "/media".to_string(),
            file: "movie.mp4".to_string(),
            size_mb: 700.0,
            created: None,
        }
    }

    async fn get(state: AppState, uri: &str) -> (StatusCode, serde_json::Value) {
        let app = crate::modules::jobs::router().with_state(state);
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn cut_submission_queues_a_job() {
        let catalog = Arc::new(MemoryCatalog::new());
        catalog.insert_file(record("abc"));
        let state = state_with(catalog.clone(), MockTranscoder::default());

        let (status, body) = get(state, "/cut/abc/30").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"], "Video cutting in progress!");
        assert_eq!(catalog.job_count(), 1);
        assert_eq!(catalog.job(1).unwrap().start_sec, 30);
    }

    #[tokio::test]
    async fn repeated_submission_reports_the_existing_job() {
        let catalog = Arc::new(MemoryCatalog::new());
        catalog.insert_file(record("abc"));
        let state = state_with(catalog.clone(), MockTranscoder::default());

        let _ = get(state.clone(), "/transcode/abc").await;
        catalog
            .update_job_status(1, JobStatus::Done)
            .await
            .unwrap();

        let (status, body) = get(state, "/transcode/abc").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"], "Video transcoding completed!");
        assert_eq!(catalog.job_count(), 1);
    }

    #[tokio::test]
    async fn unknown_file_is_a_client_error() {
        let state = state_with(Arc::new(MemoryCatalog::new()), MockTranscoder::default());
        let (status, body) = get(state, "/cut/missing/10").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["msg"], "Database not found");
    }

    #[tokio::test]
    async fn unreadable_media_is_rejected_before_queueing() {
        let catalog = Arc::new(MemoryCatalog::new());
        catalog.insert_file(record("abc"));
        let state = state_with(catalog.clone(), MockTranscoder::without_duration());

        let (status, body) = get(state, "/transcode/abc").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["msg"], "Duration parsing error: Invalid sample size");
        assert_eq!(catalog.job_count(), 0);
    }
}
