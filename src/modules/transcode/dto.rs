use super::process::EncodeTarget;
use super::progress::ProgressEvent;
use super::session::Completion;
use crate::config::settings::TranscodeSettings;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt::Display;
use std::str::FromStr;
use utoipa::ToSchema;
use validator::Validate;

// --- INBOUND ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum OutputFormat {
    /// Animated WebP.
    Webp,
    /// Palette GIF.
    Gif,
}

impl From<String> for OutputFormat {
    // Anything but "webp" falls back to GIF, as older clients expect.
    fn from(value: String) -> Self {
        if value.eq_ignore_ascii_case("webp") {
            Self::Webp
        } else {
            Self::Gif
        }
    }
}

/// One transcode job. Field aliases keep the legacy client payload working.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct TranscodeRequest {
    /// Configured source name or absolute base url of the frame host.
    #[validate(length(min = 1))]
    pub cloud: String,
    #[validate(length(min = 1))]
    pub title: String,
    /// First frame index.
    #[serde(deserialize_with = "number_from_any")]
    #[schema(value_type = u64)]
    pub cut: u64,
    /// Requested frame count, clamped server side.
    #[serde(deserialize_with = "number_from_any")]
    #[schema(value_type = u32)]
    pub duration: u32,
    #[serde(alias = "webpFormat")]
    #[schema(value_type = String)]
    pub format: OutputFormat,
    #[serde(default, alias = "WEBP_WIDTH")]
    #[validate(range(min = 1, max = 4096))]
    pub webp_width: Option<u32>,
    #[serde(default, alias = "GIF_WIDTH")]
    #[validate(range(min = 1, max = 4096))]
    pub gif_width: Option<u32>,
    /// Zero-pad width of frame file names.
    #[serde(alias = "PAD_LENGTH", deserialize_with = "number_from_any")]
    #[validate(range(max = 16))]
    #[schema(value_type = usize)]
    pub pad_length: usize,
}

impl TranscodeRequest {
    pub fn target(&self, settings: &TranscodeSettings) -> EncodeTarget {
        match self.format {
            OutputFormat::Webp => EncodeTarget::Webp {
                width: self.webp_width.unwrap_or(settings.webp_width),
            },
            OutputFormat::Gif => EncodeTarget::Gif {
                width: self.gif_width.unwrap_or(settings.gif_width),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientMessage {
    #[serde(rename = "webp", alias = "transcode")]
    Transcode(TranscodeRequest),
}

// --- OUTBOUND ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct SkippedFrame {
    pub index: u64,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ErrorMessage {
    pub message: String,
}

/// Text frames sent to the client. Encoded bytes travel as binary frames.
#[derive(Debug, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerMessage {
    Progress(ProgressEvent),
    Download(u32),
    Skipped(SkippedFrame),
    Error(ErrorMessage),
    Done(Completion),
}

impl ServerMessage {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(ErrorMessage {
            message: message.into(),
        })
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString<T> {
    Number(T),
    Text(String),
}

/// Accepts `7` as well as `"7"`.
fn number_from_any<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr + Deserialize<'de>,
    T::Err: Display,
{
    match NumberOrString::<T>::deserialize(deserializer)? {
        NumberOrString::Number(n) => Ok(n),
        NumberOrString::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_legacy_client_payload() {
        let msg: ClientMessage = serde_json::from_value(json!({
            "event": "webp",
            "data": {
                "cloud": "https://frames.example.com",
                "title": "Some Show/ep 01",
                "cut": 120,
                "duration": "36",
                "webpFormat": "webp",
                "WEBP_WIDTH": 400,
                "GIF_WIDTH": 240,
                "PAD_LENGTH": "5"
            }
        }))
        .unwrap();

        let ClientMessage::Transcode(req) = msg;
        assert_eq!(req.cut, 120);
        assert_eq!(req.duration, 36);
        assert_eq!(req.pad_length, 5);
        assert_eq!(req.format, OutputFormat::Webp);
        assert!(req.validate().is_ok());
        assert_eq!(
            req.target(&TranscodeSettings::default()),
            EncodeTarget::Webp { width: 400 }
        );
    }

    #[test]
    fn non_webp_format_means_gif_with_default_width() {
        let req: TranscodeRequest = serde_json::from_value(json!({
            "cloud": "main",
            "title": "clip",
            "cut": 0,
            "duration": 10,
            "format": "anything",
            "pad_length": 4
        }))
        .unwrap();

        assert_eq!(req.format, OutputFormat::Gif);
        assert_eq!(
            req.target(&TranscodeSettings::default()),
            EncodeTarget::Gif { width: 320 }
        );
    }

    #[test]
    fn rejects_out_of_range_fields() {
        let req: TranscodeRequest = serde_json::from_value(json!({
            "cloud": "main",
            "title": "",
            "cut": 0,
            "duration": 10,
            "format": "gif",
            "pad_length": 40
        }))
        .unwrap();

        let errors = req.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("title"));
        assert!(fields.contains_key("pad_length"));
    }

    #[test]
    fn rejects_non_numeric_duration() {
        let result = serde_json::from_value::<TranscodeRequest>(json!({
            "cloud": "main",
            "title": "clip",
            "cut": 0,
            "duration": "lots",
            "format": "gif",
            "pad_length": 4
        }));
        assert!(result.is_err());
    }

    #[test]
    fn server_messages_use_event_envelope() {
        let progress = ServerMessage::Progress(ProgressEvent {
            frame: "42".to_string(),
            time: 65.5,
            speed: "1.2x".to_string(),
        });
        assert_eq!(
            serde_json::to_value(&progress).unwrap(),
            json!({ "event": "progress", "data": { "frame": "42", "time": 65.5, "speed": "1.2x" } })
        );
        assert_eq!(
            serde_json::to_value(ServerMessage::Download(3)).unwrap(),
            json!({ "event": "download", "data": 3 })
        );
        assert_eq!(
            serde_json::to_value(ServerMessage::error("boom")).unwrap(),
            json!({ "event": "error", "data": { "message": "boom" } })
        );
    }
}
