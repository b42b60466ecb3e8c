//! Concurrent frame downloads, consumed strictly in index order.
//!
//! Every fetch starts immediately and owns a one-shot slot. The consumer
//! awaits slot `start`, then `start + 1`, and so on, so a frame that finished
//! early simply waits in its slot until its turn.

use super::error::TranscodeError;
use super::events::{EventSender, PipelineEvent};
use super::fetcher::FrameSource;
use bytes::Bytes;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::oneshot;
use tokio::task::JoinSet;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Absolute frame index.
    pub index: u64,
    pub data: Bytes,
}

type Slot = oneshot::Receiver<Result<Bytes, TranscodeError>>;

pub fn effective_duration(requested: u32, max_duration: u32) -> u32 {
    requested.min(max_duration)
}

/// Numbers completed downloads 1, 2, 3, ... in completion order.
struct DownloadCounter {
    completed: Mutex<u32>,
    events: EventSender,
}

impl DownloadCounter {
    fn record(&self) {
        // numbering and sending under one lock keeps the counters in order on the channel
        let mut completed = self.completed.lock().unwrap_or_else(PoisonError::into_inner);
        *completed += 1;
        let _ = self.events.send(PipelineEvent::Download(*completed));
    }

    fn completed(&self) -> u32 {
        *self.completed.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub struct FrameSequencer {
    slots: VecDeque<(u64, Slot)>,
    tasks: JoinSet<()>,
    counter: Arc<DownloadCounter>,
    count: u32,
}

impl FrameSequencer {
    pub fn start<S: FrameSource>(
        source: Arc<S>,
        start: u64,
        duration: u32,
        max_duration: u32,
        events: EventSender,
    ) -> Self {
        let count = effective_duration(duration, max_duration);
        let counter = Arc::new(DownloadCounter {
            completed: Mutex::new(0),
            events,
        });
        let mut tasks = JoinSet::new();
        let mut slots = VecDeque::with_capacity(count as usize);

        for index in (0..u64::from(count)).map_while(|offset| start.checked_add(offset)) {
            let (tx, rx) = oneshot::channel();
            let source = Arc::clone(&source);
            let counter = Arc::clone(&counter);

            tasks.spawn(async move {
                let result = source.fetch(index).await;
                match &result {
                    Ok(_) => counter.record(),
                    Err(e) => warn!("{}", e),
                }
                let _ = tx.send(result);
            });
            slots.push_back((index, rx));
        }

        debug!(
            "Started {} frame fetches from index {} (requested {}, max {})",
            slots.len(),
            start,
            duration,
            max_duration
        );

        Self {
            count: slots.len() as u32,
            slots,
            tasks,
            counter,
        }
    }

    /// Number of frames this sequencer will yield.
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Downloads completed so far.
    pub fn fetched(&self) -> u32 {
        self.counter.completed()
    }

    /// Waits for the next frame in index order. `None` once all are consumed.
    pub async fn next(&mut self) -> Option<Result<Frame, TranscodeError>> {
        let (index, slot) = self.slots.pop_front()?;
        let result = match slot.await {
            Ok(result) => result.map(|data| Frame { index, data }),
            Err(_) => Err(TranscodeError::Fetch {
                index,
                reason: "fetch task ended without a result".to_string(),
            }),
        };
        Some(result)
    }

    /// Cancels every outstanding fetch.
    pub fn abort(&mut self) {
        self.tasks.abort_all();
        self.slots.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::transcode::events;
    use crate::modules::transcode::test_support::ScriptedSource;

    #[test]
    fn clamps_to_max_duration() {
        assert_eq!(effective_duration(1000, 12 * 7), 84);
        assert_eq!(effective_duration(10, 84), 10);
        assert_eq!(effective_duration(0, 84), 0);
    }

    #[tokio::test]
    async fn yields_frames_in_index_order_despite_reverse_completion() {
        let source = Arc::new(ScriptedSource::reverse(100, 8));
        let (tx, mut rx) = events::channel();
        let mut sequencer = FrameSequencer::start(source, 100, 8, 84, tx);
        assert_eq!(sequencer.count(), 8);

        let mut indices = Vec::new();
        while let Some(frame) = sequencer.next().await {
            let frame = frame.unwrap();
            assert_eq!(frame.data, ScriptedSource::frame_bytes(frame.index));
            indices.push(frame.index);
        }
        assert_eq!(indices, (100..108).collect::<Vec<_>>());
        assert_eq!(sequencer.fetched(), 8);

        let mut counters = Vec::new();
        while let Ok(event) = rx.try_recv() {
            match event {
                PipelineEvent::Download(n) => counters.push(n),
                other => panic!("unexpected event {other:?}"),
            }
        }
        assert_eq!(counters, (1..=8).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn clamps_requested_duration() {
        let source = Arc::new(ScriptedSource::instant());
        let (tx, _rx) = events::channel();
        let mut sequencer = FrameSequencer::start(source, 0, 1000, 84, tx);
        assert_eq!(sequencer.count(), 84);

        let mut yielded = 0;
        while let Some(frame) = sequencer.next().await {
            frame.unwrap();
            yielded += 1;
        }
        assert_eq!(yielded, 84);
    }

    #[tokio::test]
    async fn failed_fetch_surfaces_at_its_own_slot() {
        let source = Arc::new(ScriptedSource::reverse(0, 4).failing([2]));
        let (tx, mut rx) = events::channel();
        let mut sequencer = FrameSequencer::start(source, 0, 4, 84, tx);

        let mut outcomes = Vec::new();
        while let Some(frame) = sequencer.next().await {
            outcomes.push(frame.map(|f| f.index).map_err(|e| e.frame_index()));
        }
        assert_eq!(outcomes, vec![Ok(0), Ok(1), Err(Some(2)), Ok(3)]);

        let mut counters = Vec::new();
        while let Ok(PipelineEvent::Download(n)) = rx.try_recv() {
            counters.push(n);
        }
        assert_eq!(counters, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn abort_drops_pending_frames() {
        let source = Arc::new(ScriptedSource::stalled());
        let (tx, _rx) = events::channel();
        let mut sequencer = FrameSequencer::start(source, 0, 5, 84, tx);
        sequencer.abort();
        assert!(sequencer.next().await.is_none());
        assert_eq!(sequencer.fetched(), 0);
    }
}
