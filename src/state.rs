use crate::config::settings::{AppConfig, TranscodeSettings};
use reqwest::Client;

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub transcode: TranscodeSettings,
    pub http: Client,
}

impl AppState {
    pub fn new(config: AppConfig, http: Client) -> Self {
        Self {
            transcode: config.transcode_settings(),
            config,
            http,
        }
    }
}
