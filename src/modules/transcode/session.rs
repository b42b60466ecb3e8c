//! Per-request pipeline: frames in, encoded bytes and telemetry out.
//!
//! `Created -> Transcoding -> Draining -> Closed`. The transcoder's stdin is
//! owned by the session as an `Option` and closed by `take()`, so it is
//! closed exactly once on every path, including zero frames and aborts.

use super::dto::SkippedFrame;
use super::events::{EventSender, PipelineEvent};
use super::fetcher::FrameSource;
use super::process::{TranscodeCommand, TranscodeProcess, forward_diagnostics, forward_output};
use super::sequencer::{FrameSequencer, effective_duration};
use crate::config::settings::FetchFailurePolicy;
use serde::Serialize;
use std::io;
use std::process::ExitStatus;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::ChildStdin;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use utoipa::ToSchema;

/// How long the stream pumps may keep running after the process exited.
const DRAIN_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Created,
    Transcoding,
    Draining,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AbortReason {
    Rejected,
    SpawnFailed,
    FetchFailed,
    Cancelled,
    TimedOut,
}

/// Terminal status of a session, sent as the final `done` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Completion {
    pub code: Option<i32>,
    pub signal: Option<i32>,
    pub success: bool,
    pub frames_requested: u32,
    pub frames_written: u32,
    pub skipped: Vec<u64>,
    pub aborted: Option<AbortReason>,
}

impl Completion {
    pub fn aborted_early(reason: AbortReason, frames_requested: u32) -> Self {
        Self {
            code: None,
            signal: None,
            success: false,
            frames_requested,
            frames_written: 0,
            skipped: Vec::new(),
            aborted: Some(reason),
        }
    }
}

#[cfg(unix)]
fn exit_signal(status: &ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn exit_signal(_status: &ExitStatus) -> Option<i32> {
    None
}

/// Everything needed to run one session.
#[derive(Debug, Clone)]
pub struct PipelineSpec {
    pub command: TranscodeCommand,
    pub start: u64,
    pub duration: u32,
    pub max_duration: u32,
    pub policy: FetchFailurePolicy,
    pub timeout: Duration,
}

enum FeedOutcome {
    Finished,
    InputClosed,
    Aborted(AbortReason),
}

enum WaitOutcome {
    Exited(io::Result<ExitStatus>),
    Cancelled,
    TimedOut,
}

pub struct PipelineSession {
    state: SessionState,
    process: TranscodeProcess,
    input: Option<ChildStdin>,
    frames_requested: u32,
    frames_written: u32,
    skipped: Vec<u64>,
    events: EventSender,
}

impl PipelineSession {
    pub fn new(process: TranscodeProcess, input: ChildStdin, events: EventSender) -> Self {
        Self {
            state: SessionState::Created,
            process,
            input: Some(input),
            frames_requested: 0,
            frames_written: 0,
            skipped: Vec::new(),
            events,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    fn transition(&mut self, next: SessionState) {
        debug!("Session {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Signals end-of-input. Returns `false` if the input was already closed.
    pub fn close_input(&mut self) -> bool {
        match self.input.take() {
            Some(stdin) => {
                drop(stdin);
                self.transition(SessionState::Draining);
                debug!("Transcoder input closed after {} frames", self.frames_written);
                true
            }
            None => false,
        }
    }

    async fn feed(&mut self, sequencer: &mut FrameSequencer, policy: FetchFailurePolicy) -> FeedOutcome {
        while let Some(next) = sequencer.next().await {
            let frame = match next {
                Ok(frame) => frame,
                Err(e) => {
                    let index = e.frame_index().unwrap_or_default();
                    match policy {
                        FetchFailurePolicy::Skip => {
                            warn!("Skipping frame {}: {}", index, e);
                            self.skipped.push(index);
                            let _ = self.events.send(PipelineEvent::Skipped(SkippedFrame {
                                index,
                                reason: e.to_string(),
                            }));
                            continue;
                        }
                        FetchFailurePolicy::Abort => {
                            error!("Aborting session at frame {}: {}", index, e);
                            let _ = self.events.send(PipelineEvent::Error(e.to_string()));
                            return FeedOutcome::Aborted(AbortReason::FetchFailed);
                        }
                    }
                }
            };

            let Some(input) = self.input.as_mut() else {
                return FeedOutcome::InputClosed;
            };
            if let Err(e) = input.write_all(&frame.data).await {
                warn!("Transcoder stopped accepting input at frame {}: {}", frame.index, e);
                let _ = self.events.send(PipelineEvent::Error(format!(
                    "transcoder stopped accepting frames at {}: {}",
                    frame.index, e
                )));
                return FeedOutcome::InputClosed;
            }
            self.frames_written += 1;
            debug!("Wrote frame {} ({} bytes)", frame.index, frame.data.len());
        }

        FeedOutcome::Finished
    }

    async fn stop(&mut self) -> io::Result<ExitStatus> {
        warn!("Stopping transcoder in state {:?}", self.state);
        self.process.kill();
        self.process.wait().await
    }

    fn completion(&self, status: Option<&ExitStatus>, aborted: Option<AbortReason>) -> Completion {
        Completion {
            code: status.and_then(ExitStatus::code),
            signal: status.and_then(exit_signal),
            success: aborted.is_none() && status.is_some_and(ExitStatus::success),
            frames_requested: self.frames_requested,
            frames_written: self.frames_written,
            skipped: self.skipped.clone(),
            aborted,
        }
    }
}

/// Runs one session to completion and reports it. Never returns early
/// without sending `PipelineEvent::Completed`.
pub async fn run_pipeline<S: FrameSource>(
    spec: PipelineSpec,
    source: Arc<S>,
    events: EventSender,
    cancel: CancellationToken,
) -> Completion {
    let deadline = Instant::now() + spec.timeout;
    let requested = effective_duration(spec.duration, spec.max_duration);

    let (process, streams) = match TranscodeProcess::spawn(&spec.command) {
        Ok(spawned) => spawned,
        Err(e) => {
            error!("❌ {}", e);
            let completion = Completion::aborted_early(AbortReason::SpawnFailed, requested);
            let _ = events.send(PipelineEvent::Error(e.to_string()));
            let _ = events.send(PipelineEvent::Completed(completion.clone()));
            return completion;
        }
    };

    let output: JoinHandle<u64> = tokio::spawn(forward_output(streams.stdout, events.clone()));
    let diagnostics: JoinHandle<usize> = tokio::spawn(forward_diagnostics(streams.stderr, events.clone()));

    let mut sequencer =
        FrameSequencer::start(source, spec.start, spec.duration, spec.max_duration, events.clone());
    let mut session = PipelineSession::new(process, streams.stdin, events.clone());
    session.frames_requested = sequencer.count();
    session.transition(SessionState::Transcoding);

    let fed = tokio::select! {
        outcome = session.feed(&mut sequencer, spec.policy) => outcome,
        _ = cancel.cancelled() => FeedOutcome::Aborted(AbortReason::Cancelled),
        _ = sleep_until(deadline) => FeedOutcome::Aborted(AbortReason::TimedOut),
    };

    let mut aborted = None;
    match fed {
        FeedOutcome::Finished => {}
        FeedOutcome::InputClosed => sequencer.abort(),
        FeedOutcome::Aborted(reason) => {
            warn!("Session aborted while writing frames: {:?}", reason);
            sequencer.abort();
            session.process.kill();
            aborted = Some(reason);
        }
    }
    session.close_input();

    let waited = tokio::select! {
        status = session.process.wait() => WaitOutcome::Exited(status),
        _ = cancel.cancelled(), if aborted.is_none() => WaitOutcome::Cancelled,
        _ = sleep_until(deadline), if aborted.is_none() => WaitOutcome::TimedOut,
    };
    let status = match waited {
        WaitOutcome::Exited(status) => status,
        WaitOutcome::Cancelled => {
            aborted = Some(AbortReason::Cancelled);
            session.stop().await
        }
        WaitOutcome::TimedOut => {
            aborted = Some(AbortReason::TimedOut);
            session.stop().await
        }
    };
    let status = status
        .inspect_err(|e| error!("Failed to collect transcoder exit status: {}", e))
        .ok();

    let output_bytes = join_pump(output, "stdout").await.unwrap_or_default();
    let progress_lines = join_pump(diagnostics, "stderr").await.unwrap_or_default();

    if matches!(aborted, Some(AbortReason::Cancelled | AbortReason::TimedOut)) {
        let _ = events.send(PipelineEvent::Error(match aborted {
            Some(AbortReason::TimedOut) => "session timed out".to_string(),
            _ => "session cancelled".to_string(),
        }));
    }

    let completion = session.completion(status.as_ref(), aborted);
    session.transition(SessionState::Closed);
    info!(
        "✅ Session closed: {} of {} frames written ({} fetched), {} bytes out, {} progress updates, status {:?}",
        completion.frames_written,
        completion.frames_requested,
        sequencer.fetched(),
        output_bytes,
        progress_lines,
        status
    );
    let _ = events.send(PipelineEvent::Completed(completion.clone()));
    completion
}

async fn join_pump<T>(mut handle: JoinHandle<T>, name: &str) -> Option<T> {
    match timeout(DRAIN_GRACE, &mut handle).await {
        Ok(Ok(value)) => Some(value),
        Ok(Err(e)) => {
            error!("Transcoder {} pump failed: {}", name, e);
            None
        }
        Err(_) => {
            warn!("Transcoder {} still open after exit, abandoning it", name);
            handle.abort();
            None
        }
    }
}
