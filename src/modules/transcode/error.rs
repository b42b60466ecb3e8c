use thiserror::Error;

#[derive(Debug, Error)]
pub enum TranscodeError {
    #[error("failed to spawn transcoder `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to fetch frame {index}: {reason}")]
    Fetch { index: u64, reason: String },

    #[error("invalid frame url `{url}`: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("unknown frame source `{0}`")]
    UnknownSource(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("transcoder stream error: {0}")]
    Io(#[from] std::io::Error),
}

impl TranscodeError {
    /// Frame index the error refers to, if it is a per-frame failure.
    pub fn frame_index(&self) -> Option<u64> {
        match self {
            Self::Fetch { index, .. } => Some(*index),
            _ => None,
        }
    }
}
