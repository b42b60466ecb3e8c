//! Decoder for the transcoder's human-readable status lines.
//!
//! Only lines of the form
//! `frame=  42 fps= 11 q=... time=00:01:05.50 bitrate=... speed=1.2x`
//! carry progress. Everything else on the diagnostic stream is noise and
//! maps to `None`.

use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ProgressEvent {
    /// Frames processed so far, as reported by the transcoder.
    pub frame: String,
    /// Elapsed media time in seconds.
    pub time: f64,
    /// Processing speed multiplier, e.g. `1.2x`.
    pub speed: String,
}

pub fn parse_progress(line: &str) -> Option<ProgressEvent> {
    let line = line.trim_start();
    if !line.starts_with("frame") {
        return None;
    }

    let frame = between(line, "frame=", " fps=")?.trim();
    if frame.is_empty() {
        return None;
    }
    let time = timestamp_to_seconds(field(line, "time=")?)?;
    let speed = field(line, "speed=")?;

    Some(ProgressEvent {
        frame: frame.to_string(),
        time,
        speed: speed.to_string(),
    })
}

/// Converts `H:MM:SS[.frac]` into seconds.
pub fn timestamp_to_seconds(ts: &str) -> Option<f64> {
    let mut parts = ts.split(':');
    let hours: f64 = parts.next()?.parse().ok()?;
    let minutes: f64 = parts.next()?.parse().ok()?;
    let seconds: f64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }

    let total = hours * 3600.0 + minutes * 60.0 + seconds;
    total.is_finite().then_some(total)
}

fn between<'a>(line: &'a str, start: &str, end: &str) -> Option<&'a str> {
    let rest = &line[line.find(start)? + start.len()..];
    Some(&rest[..rest.find(end)?])
}

// ffmpeg right-aligns some values (`speed= 1.2x`), so leading padding is skipped.
fn field<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    let rest = line[line.find(key)? + key.len()..].trim_start();
    let value = rest.split(' ').next().unwrap_or_default();
    (!value.is_empty()).then_some(value)
}
