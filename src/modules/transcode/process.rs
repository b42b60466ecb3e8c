//! Transcoder subprocess: argument grammar, spawning and stream pumps.

use super::error::TranscodeError;
use super::events::{EventSender, PipelineEvent};
use super::progress::parse_progress;
use futures_util::StreamExt;
use std::io;
use std::process::{ExitStatus, Stdio};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio_util::codec::{AnyDelimiterCodec, FramedRead};
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};

/// Output encoding plus its geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeTarget {
    Webp { width: u32 },
    Gif { width: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscodeCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl TranscodeCommand {
    pub fn new(program: impl Into<String>, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// JPEG frames on stdin, encoded animation on stdout.
    #[rustfmt::skip]
    pub fn ffmpeg(program: impl Into<String>, frame_rate: u32, target: EncodeTarget) -> Self {
        let frame_rate = frame_rate.to_string();
        let mut args = vec!["-framerate", frame_rate.as_str(), "-f", "jpeg_pipe", "-i", "pipe:"]
            .into_iter()
            .map(String::from)
            .collect::<Vec<_>>();

        match target {
            EncodeTarget::Webp { width } => {
                let scale = format!("scale={width}:-1");
                args.extend(
                    [
                        "-vf", scale.as_str(),
                        "-loop", "0",
                        "-preset", "drawing",
                        "-qscale", "90",
                        "-f", "webp",
                        "-c:v", "webp",
                    ]
                    .map(String::from),
                );
            }
            EncodeTarget::Gif { width } => {
                let graph = format!(
                    "split[a][b];[a]scale={width}:-1,palettegen[p];[b]scale={width}:-1[g];[g][p]paletteuse"
                );
                args.extend(["-lavfi", graph.as_str(), "-f", "gif", "-c:v", "gif"].map(String::from));
            }
        }

        args.push("pipe:1".to_string());
        Self::new(program, args)
    }
}

pub struct ProcessStreams {
    pub stdin: ChildStdin,
    pub stdout: ChildStdout,
    pub stderr: ChildStderr,
}

/// Owned handle to a running transcoder. Dropping it kills the process.
pub struct TranscodeProcess {
    child: Child,
    program: String,
}

impl TranscodeProcess {
    pub fn spawn(command: &TranscodeCommand) -> Result<(Self, ProcessStreams), TranscodeError> {
        let mut child = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| TranscodeError::Spawn {
                program: command.program.clone(),
                source,
            })?;

        let stdin = child.stdin.take().ok_or_else(|| missing_pipe("stdin"))?;
        let stdout = child.stdout.take().ok_or_else(|| missing_pipe("stdout"))?;
        let stderr = child.stderr.take().ok_or_else(|| missing_pipe("stderr"))?;

        info!(
            "🎞️ Spawned transcoder `{}` (pid {:?})",
            command.program,
            child.id()
        );

        Ok((
            Self {
                child,
                program: command.program.clone(),
            },
            ProcessStreams {
                stdin,
                stdout,
                stderr,
            },
        ))
    }

    pub async fn wait(&mut self) -> io::Result<ExitStatus> {
        self.child.wait().await
    }

    pub fn kill(&mut self) {
        match self.child.start_kill() {
            Ok(()) => debug!("Sent kill to transcoder `{}`", self.program),
            // already exited
            Err(e) if e.kind() == io::ErrorKind::InvalidInput => {}
            Err(e) => warn!("Failed to kill transcoder `{}`: {}", self.program, e),
        }
    }
}

fn missing_pipe(name: &str) -> TranscodeError {
    TranscodeError::Io(io::Error::other(format!("transcoder {name} was not captured")))
}

/// Forwards stdout chunks as they arrive. Returns the number of bytes seen.
pub async fn forward_output(stdout: ChildStdout, events: EventSender) -> u64 {
    let mut chunks = ReaderStream::new(stdout);
    let mut total = 0u64;

    while let Some(chunk) = chunks.next().await {
        match chunk {
            Ok(chunk) => {
                total += chunk.len() as u64;
                // keep draining even if nobody listens, so the process never blocks on a full pipe
                let _ = events.send(PipelineEvent::Chunk(chunk));
            }
            Err(e) => {
                warn!("Transcoder stdout read failed: {}", e);
                break;
            }
        }
    }

    debug!("Transcoder stdout closed after {} bytes", total);
    total
}

/// Splits stderr on `\r` / `\n` and forwards the lines that carry progress.
pub async fn forward_diagnostics(stderr: ChildStderr, events: EventSender) -> usize {
    let mut lines = FramedRead::new(stderr, AnyDelimiterCodec::new(b"\r\n".to_vec(), b"\n".to_vec()));
    let mut reported = 0usize;

    while let Some(line) = lines.next().await {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!("Transcoder stderr read failed: {}", e);
                break;
            }
        };
        let text = String::from_utf8_lossy(&line);
        let text = text.trim();
        if text.is_empty() {
            continue;
        }

        match parse_progress(text) {
            Some(progress) => {
                reported += 1;
                let _ = events.send(PipelineEvent::Progress(progress));
            }
            None => debug!(target: "transcoder", "{}", text),
        }
    }

    reported
}
