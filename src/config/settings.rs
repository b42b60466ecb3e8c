use crate::config::env::{self, EnvKey};
use serde::Serialize;
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_FRAME_RATE: u32 = 12;
pub const DEFAULT_MAX_DURATION_SECONDS: u32 = 7;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

/// What to do when a single frame cannot be fetched.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchFailurePolicy {
    /// Leave the frame out and keep writing the rest in order.
    #[default]
    Skip,
    /// Stop the session at the first missing frame.
    Abort,
}

impl FromStr for FetchFailurePolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "skip" => Ok(Self::Skip),
            "abort" => Ok(Self::Abort),
            _ => Err(ConfigError::InvalidValue {
                key: EnvKey::FetchFailurePolicy.as_str(),
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub server_port: u16,
    pub ffmpeg_path: String,
    pub frame_rate: u32,
    pub max_duration_seconds: u32,
    pub webp_width: u32,
    pub gif_width: u32,
    pub fetch_timeout_secs: u64,
    pub session_timeout_secs: u64,
    pub fetch_failure_policy: FetchFailurePolicy,
    pub frame_sources: HashMap<String, String>,
}

impl AppConfig {
    pub fn new() -> Result<Self, ConfigError> {
        Ok(Self {
            server_port: env::get_parsed(EnvKey::ServerPort, 3000),
            ffmpeg_path: env::get_or(EnvKey::FfmpegPath, "ffmpeg"),
            frame_rate: env::get_parsed(EnvKey::FrameRate, DEFAULT_FRAME_RATE),
            max_duration_seconds: env::get_parsed(
                EnvKey::MaxDurationSeconds,
                DEFAULT_MAX_DURATION_SECONDS,
            ),
            webp_width: env::get_parsed(EnvKey::WebpWidth, 480),
            gif_width: env::get_parsed(EnvKey::GifWidth, 320),
            fetch_timeout_secs: env::get_parsed(EnvKey::FetchTimeoutSecs, 20),
            session_timeout_secs: env::get_parsed(EnvKey::SessionTimeoutSecs, 300),
            fetch_failure_policy: env::get_or(EnvKey::FetchFailurePolicy, "skip").parse()?,
            frame_sources: parse_frame_sources(&env::get_or(EnvKey::FrameSources, ""))?,
        })
    }

    pub fn transcode_settings(&self) -> TranscodeSettings {
        TranscodeSettings {
            ffmpeg_path: self.ffmpeg_path.clone(),
            frame_rate: self.frame_rate,
            max_duration: max_duration(self.frame_rate, self.max_duration_seconds),
            webp_width: self.webp_width,
            gif_width: self.gif_width,
            session_timeout: Duration::from_secs(self.session_timeout_secs),
            fetch_failure_policy: self.fetch_failure_policy,
            sources: self.frame_sources.clone(),
        }
    }
}

/// Per-session transcoding parameters, fixed when the server starts.
#[derive(Clone, Debug)]
pub struct TranscodeSettings {
    pub ffmpeg_path: String,
    pub frame_rate: u32,
    /// Upper bound on frames per session.
    pub max_duration: u32,
    pub webp_width: u32,
    pub gif_width: u32,
    pub session_timeout: Duration,
    pub fetch_failure_policy: FetchFailurePolicy,
    /// Named frame hosts, `name -> base url`.
    pub sources: HashMap<String, String>,
}

impl Default for TranscodeSettings {
    fn default() -> Self {
        Self {
            ffmpeg_path: "ffmpeg".to_string(),
            frame_rate: DEFAULT_FRAME_RATE,
            max_duration: max_duration(DEFAULT_FRAME_RATE, DEFAULT_MAX_DURATION_SECONDS),
            webp_width: 480,
            gif_width: 320,
            session_timeout: Duration::from_secs(300),
            fetch_failure_policy: FetchFailurePolicy::Skip,
            sources: HashMap::new(),
        }
    }
}

pub fn max_duration(frame_rate: u32, seconds: u32) -> u32 {
    frame_rate.saturating_mul(seconds)
}

/// Parses `name=https://host/path,other=https://...` into a lookup table.
pub fn parse_frame_sources(raw: &str) -> Result<HashMap<String, String>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (name, base) = entry.split_once('=').ok_or_else(|| ConfigError::InvalidValue {
                key: EnvKey::FrameSources.as_str(),
                value: entry.to_string(),
            })?;
            let (name, base) = (name.trim(), base.trim());
            if name.is_empty() || base.is_empty() {
                return Err(ConfigError::InvalidValue {
                    key: EnvKey::FrameSources.as_str(),
                    value: entry.to_string(),
                });
            }
            Ok((name.to_string(), base.to_string()))
        })
        .collect()
}
