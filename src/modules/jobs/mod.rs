use crate::state::AppState;
use axum::Router;
use axum::routing::get;

pub mod executor;
pub mod handler;
pub mod model;
pub mod repository;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/cut/{id_name}/{second}", get(handler::submit_cut))
        .route("/transcode/{id_name}", get(handler::submit_transcode))
}
