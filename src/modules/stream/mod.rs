use crate::state::AppState;
use axum::Router;
use axum::routing::get;

pub mod handler;
pub mod range;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/stream/{id_name}/{base_name}", get(handler::stream_video))
        .route(
            "/stream/convert/{id_name}/{base_name}",
            get(handler::stream_or_convert_video),
        )
        .route("/convert/{id_name}/{base_name}", get(handler::convert_video))
}
