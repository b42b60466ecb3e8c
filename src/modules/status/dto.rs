use crate::config::settings::FetchFailurePolicy;
use crate::state::AppState;
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct ServiceInfo {
    pub name: String,
    pub version: String,
    pub port: u16,
    pub frame_rate: u32,
    /// Longest accepted request, in frames.
    pub max_duration: u32,
    pub webp_width: u32,
    pub gif_width: u32,
    #[schema(value_type = String)]
    pub fetch_failure_policy: FetchFailurePolicy,
}

impl From<&AppState> for ServiceInfo {
    fn from(state: &AppState) -> Self {
        Self {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            port: state.config.server_port,
            frame_rate: state.transcode.frame_rate,
            max_duration: state.transcode.max_duration,
            webp_width: state.transcode.webp_width,
            gif_width: state.transcode.gif_width,
            fetch_failure_policy: state.transcode.fetch_failure_policy,
        }
    }
}
