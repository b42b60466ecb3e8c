use crate::common::response::not_found;
use crate::docs::ApiDoc;
use crate::state::AppState;
use axum::Router;
use axum::routing::get;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub fn configure_routes() -> Router<AppState> {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(crate::modules::status::router())
        .route("/ws", get(crate::modules::transcode::handler::transcode_ws))
        .nest("/api/v1/transcode", crate::modules::transcode::router())
        .fallback(not_found)
}
