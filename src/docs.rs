use crate::modules::status::dto::ServiceInfo;
use crate::modules::transcode::dto::{ErrorMessage, SkippedFrame, TranscodeRequest};
use crate::modules::transcode::progress::ProgressEvent;
use crate::modules::transcode::session::{AbortReason, Completion};
use utoipa::OpenApi;

/// The WebSocket protocol is described by the schemas: clients send
/// `{"event":"webp","data":TranscodeRequest}`, the server answers with binary
/// chunks plus `progress`, `download`, `skipped`, `error` and `done` events.
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::modules::status::handler::index,
        crate::modules::status::handler::health,
        crate::modules::transcode::handler::transcode_ws,
    ),
    components(
        schemas(
            ServiceInfo,
            TranscodeRequest,
            ProgressEvent,
            SkippedFrame,
            ErrorMessage,
            Completion,
            AbortReason,
        )
    ),
    tags(
        (name = "Status", description = "Service status"),
        (name = "Transcode", description = "Frame sequence to animation transcoding")
    )
)]
pub struct ApiDoc;
