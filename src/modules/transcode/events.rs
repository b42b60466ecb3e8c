use super::dto::SkippedFrame;
use super::progress::ProgressEvent;
use super::session::Completion;
use bytes::Bytes;
use tokio::sync::mpsc;

/// Everything a session reports back to its requester, in emission order.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    /// Raw transcoder output, forwarded verbatim.
    Chunk(Bytes),
    Progress(ProgressEvent),
    /// 1-based count of completed frame downloads.
    Download(u32),
    Skipped(SkippedFrame),
    Error(String),
    /// Terminal status. Always the last event of a session.
    Completed(Completion),
}

pub type EventSender = mpsc::UnboundedSender<PipelineEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<PipelineEvent>;

pub fn channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}
