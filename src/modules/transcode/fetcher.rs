use super::error::TranscodeError;
use bytes::Bytes;
use reqwest::Client;
use std::collections::HashMap;
use std::future::Future;
use tracing::debug;
use url::Url;

/// Anything that can produce the raw bytes of frame `index`.
pub trait FrameSource: Send + Sync + 'static {
    fn fetch(&self, index: u64) -> impl Future<Output = Result<Bytes, TranscodeError>> + Send;
}

/// Fetches `{base}/{title}/{index:0pad}.jpg` over HTTP.
#[derive(Clone)]
pub struct HttpFrameFetcher {
    client: Client,
    base: String,
    title: String,
    pad_width: usize,
}

impl HttpFrameFetcher {
    pub fn new(client: Client, base: impl Into<String>, title: impl Into<String>, pad_width: usize) -> Self {
        Self {
            client,
            base: base.into(),
            title: title.into(),
            pad_width,
        }
    }

    /// `{base}/{title}/{index:0pad}.jpg`, with every title segment and the
    /// file name percent-encoded. `/` inside the title separates segments.
    pub fn frame_url(&self, index: u64) -> Result<Url, TranscodeError> {
        let invalid = |source: url::ParseError| TranscodeError::InvalidUrl {
            url: self.base.clone(),
            source,
        };
        let mut url = Url::parse(&self.base).map_err(invalid)?;
        let file = format!("{:0width$}.jpg", index, width = self.pad_width);

        url.path_segments_mut()
            .map_err(|()| invalid(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .pop_if_empty()
            .extend(self.title.split('/'))
            .push(&file);
        Ok(url)
    }
}

impl FrameSource for HttpFrameFetcher {
    async fn fetch(&self, index: u64) -> Result<Bytes, TranscodeError> {
        let url = self.frame_url(index)?;
        let failed = |e: reqwest::Error| TranscodeError::Fetch {
            index,
            reason: e.to_string(),
        };

        let bytes = self
            .client
            .get(url.clone())
            .send()
            .await
            .and_then(|resp| resp.error_for_status())
            .map_err(failed)?
            .bytes()
            .await
            .map_err(failed)?;

        debug!("⬇️ Frame {} ({} bytes) from {}", index, bytes.len(), url);
        Ok(bytes)
    }
}

/// Maps the request's `cloud` field to a base url: a configured source name
/// wins, otherwise an absolute http(s) url is used as given.
pub fn resolve_base(sources: &HashMap<String, String>, cloud: &str) -> Result<String, TranscodeError> {
    if let Some(base) = sources.get(cloud) {
        return Ok(base.clone());
    }
    match Url::parse(cloud) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(cloud.to_string()),
        _ => Err(TranscodeError::UnknownSource(cloud.to_string())),
    }
}
