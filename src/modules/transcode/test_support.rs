use super::error::TranscodeError;
use super::fetcher::FrameSource;
use crate::config::settings::{AppConfig, FetchFailurePolicy};
use axum::{Router, extract::Path, http::StatusCode, routing::get};
use bytes::Bytes;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;

const STEP: Duration = Duration::from_millis(5);

enum Latency {
    /// Frames at or past `last` complete first.
    Reverse { last: u64, step: Duration },
    /// Frame `i` completes after `(i + 1) * step`.
    Forward { step: Duration },
    Instant,
    Stalled,
}

/// In-memory frame host with scripted latency and failures.
pub struct ScriptedSource {
    latency: Latency,
    failing: HashSet<u64>,
}

impl ScriptedSource {
    fn with(latency: Latency) -> Self {
        Self {
            latency,
            failing: HashSet::new(),
        }
    }

    /// Higher indices finish first.
    pub fn reverse(start: u64, count: u64) -> Self {
        Self::with(Latency::Reverse {
            last: start + count.saturating_sub(1),
            step: STEP,
        })
    }

    /// Lower indices finish first, `step` apart.
    pub fn forward(step: Duration) -> Self {
        Self::with(Latency::Forward { step })
    }

    pub fn instant() -> Self {
        Self::with(Latency::Instant)
    }

    /// Never completes.
    pub fn stalled() -> Self {
        Self::with(Latency::Stalled)
    }

    pub fn failing(mut self, indices: impl IntoIterator<Item = u64>) -> Self {
        self.failing.extend(indices);
        self
    }

    pub fn frame_bytes(index: u64) -> Bytes {
        Bytes::from(format!("<frame {index:05}>"))
    }
}

fn times(step: Duration, n: u64) -> Duration {
    step * u32::try_from(n).unwrap_or(u32::MAX)
}

impl FrameSource for ScriptedSource {
    async fn fetch(&self, index: u64) -> Result<Bytes, TranscodeError> {
        let delay = match self.latency {
            Latency::Reverse { last, step } => times(step, last.saturating_sub(index)),
            Latency::Forward { step } => times(step, index.saturating_add(1)),
            Latency::Instant => Duration::ZERO,
            Latency::Stalled => std::future::pending().await,
        };
        tokio::time::sleep(delay).await;

        if self.failing.contains(&index) {
            return Err(TranscodeError::Fetch {
                index,
                reason: "scripted failure".to_string(),
            });
        }
        Ok(Self::frame_bytes(index))
    }
}

/// Serves `ScriptedSource::frame_bytes` over HTTP as `/{title}/{index}.jpg`,
/// each response held back by `delay`. Title `stall` never answers.
pub async fn serve_frames(delay: Duration) -> String {
    let app = Router::new().route(
        "/{title}/{file}",
        get(move |Path((title, file)): Path<(String, String)>| async move {
            if title == "stall" {
                std::future::pending::<()>().await;
            }
            tokio::time::sleep(delay).await;
            match file.strip_suffix(".jpg").and_then(|n| n.parse::<u64>().ok()) {
                Some(index) => (StatusCode::OK, ScriptedSource::frame_bytes(index)),
                None => (StatusCode::NOT_FOUND, Bytes::new()),
            }
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    format!("http://{addr}")
}

/// Executable that ignores its arguments, copies stdin to stdout and reports
/// one progress line, standing in for ffmpeg.
#[cfg(unix)]
pub fn stand_in_transcoder() -> PathBuf {
    static SCRIPT: OnceLock<PathBuf> = OnceLock::new();
    SCRIPT
        .get_or_init(|| {
            use std::os::unix::fs::PermissionsExt;

            let path = std::env::temp_dir().join(format!("stand-in-transcoder-{}.sh", std::process::id()));
            std::fs::write(
                &path,
                "#!/bin/sh\ncat\nprintf 'frame=    3 fps=0.0 q=0.0 size=0kB time=00:00:00.25 speed=1x\\r' >&2\n",
            )
            .unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path
        })
        .clone()
}

pub fn app_config(ffmpeg_path: &str) -> AppConfig {
    AppConfig {
        server_port: 0,
        ffmpeg_path: ffmpeg_path.to_string(),
        frame_rate: 12,
        max_duration_seconds: 7,
        webp_width: 480,
        gif_width: 320,
        fetch_timeout_secs: 5,
        session_timeout_secs: 30,
        fetch_failure_policy: FetchFailurePolicy::Skip,
        frame_sources: HashMap::new(),
    }
}
