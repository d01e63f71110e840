use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::modules::stream::handler::stream_video,
        crate::modules::stream::handler::convert_video,
        crate::modules::stream::handler::stream_or_convert_video,
        crate::modules::jobs::handler::submit_cut,
        crate::modules::jobs::handler::submit_transcode,
    ),
    components(
        schemas(crate::common::response::ApiResponse<String>)
    ),
    tags(
        (name = "Stream", description = "Range and live-transcode video streaming"),
        (name = "Jobs", description = "Cut/transcode job submission")
    )
)]
pub struct ApiDoc;
