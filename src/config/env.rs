use std::env;
use std::str::FromStr;

pub enum EnvKey {
    ServerPort,
    FfmpegPath,
    FrameRate,
    MaxDurationSeconds,
    WebpWidth,
    GifWidth,
    FetchTimeoutSecs,
    SessionTimeoutSecs,
    FetchFailurePolicy,
    FrameSources,
}

impl EnvKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvKey::ServerPort => "APP_PORT",
            EnvKey::FfmpegPath => "FFMPEG_PATH",
            EnvKey::FrameRate => "FRAME_RATE",
            EnvKey::MaxDurationSeconds => "MAX_DURATION_SECONDS",
            EnvKey::WebpWidth => "WEBP_WIDTH",
            EnvKey::GifWidth => "GIF_WIDTH",
            EnvKey::FetchTimeoutSecs => "FETCH_TIMEOUT_SECS",
            EnvKey::SessionTimeoutSecs => "SESSION_TIMEOUT_SECS",
            EnvKey::FetchFailurePolicy => "FETCH_FAILURE_POLICY",
            EnvKey::FrameSources => "FRAME_SOURCES",
        }
    }
}

pub fn get(key: EnvKey) -> Result<String, env::VarError> {
    env::var(key.as_str())
}

pub fn get_or(key: EnvKey, default: &str) -> String {
    env::var(key.as_str()).unwrap_or_else(|_| default.to_string())
}

pub fn get_parsed<T: FromStr>(key: EnvKey, default: T) -> T {
    match get(key) {
        Ok(val) => val.parse::<T>().unwrap_or(default),
        Err(_) => default,
    }
}
