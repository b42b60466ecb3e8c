use super::dto::{ClientMessage, ServerMessage, TranscodeRequest};
use super::events::{self, PipelineEvent};
use super::service::TranscodeService;
use super::session::Completion;
use crate::state::AppState;
use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Upgrade to the transcoding WebSocket
#[utoipa::path(
    get,
    path = "/ws",
    responses(
        (status = 101, description = "Switching Protocols"),
        (status = 400, description = "Not a WebSocket handshake")
    ),
    tag = "Transcode"
)]
pub async fn transcode_ws(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sink, mut stream) = socket.split();
    info!("🔌 Client connected");

    while let Some(msg) = stream.next().await {
        let text = match msg {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                debug!("WebSocket receive failed: {}", e);
                break;
            }
        };

        let request = match serde_json::from_str::<ClientMessage>(text.as_str()) {
            Ok(ClientMessage::Transcode(req)) => req,
            Err(e) => {
                warn!("Malformed client message: {}", e);
                if send_message(&mut sink, &ServerMessage::error(format!("malformed request: {e}")))
                    .await
                    .is_err()
                {
                    break;
                }
                continue;
            }
        };

        let end = run_session(&state, request, &mut sink, &mut stream).await;
        if let Some(completion) = end.completion {
            debug!("Session finished: success={} aborted={:?}", completion.success, completion.aborted);
        }
        if !end.connected {
            break;
        }
    }

    info!("🔌 Client disconnected");
}

/// How a session ended, as seen by the connection.
struct SessionEnd {
    /// `false` if the client went away, in which case the session was cancelled.
    connected: bool,
    completion: Option<Completion>,
}

/// Pumps one session's events to the client while watching the socket for
/// disconnects and requests that arrive while busy.
async fn run_session<W, R>(state: &AppState, request: TranscodeRequest, sink: &mut W, stream: &mut R) -> SessionEnd
where
    W: Sink<Message, Error = axum::Error> + Unpin,
    R: Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    let (tx, mut rx) = events::channel();
    let cancel = CancellationToken::new();
    let session = tokio::spawn(TranscodeService::run(state.clone(), request, tx, cancel.clone()));
    let mut connected = true;

    loop {
        tokio::select! {
            event = rx.recv() => {
                let Some(event) = event else { break };
                let done = matches!(event, PipelineEvent::Completed(_));
                if connected && send_event(sink, event).await.is_err() {
                    connected = false;
                    cancel.cancel();
                }
                if done {
                    break;
                }
            }
            incoming = stream.next(), if connected => match incoming {
                Some(Ok(Message::Text(_))) => {
                    if send_message(sink, &ServerMessage::error("a session is already running")).await.is_err() {
                        connected = false;
                        cancel.cancel();
                    }
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => {
                    info!("Client left mid-session, cancelling");
                    connected = false;
                    cancel.cancel();
                }
                Some(Ok(_)) => {}
            },
        }
    }

    let completion = match session.await {
        Ok(completion) => Some(completion),
        Err(e) => {
            error!("Session task failed: {}", e);
            None
        }
    };
    SessionEnd { connected, completion }
}

async fn send_event<W>(sink: &mut W, event: PipelineEvent) -> Result<(), axum::Error>
where
    W: Sink<Message, Error = axum::Error> + Unpin,
{
    let message = match event {
        PipelineEvent::Chunk(bytes) => return sink.send(Message::Binary(bytes)).await,
        PipelineEvent::Progress(progress) => ServerMessage::Progress(progress),
        PipelineEvent::Download(n) => ServerMessage::Download(n),
        PipelineEvent::Skipped(skipped) => ServerMessage::Skipped(skipped),
        PipelineEvent::Error(message) => ServerMessage::error(message),
        PipelineEvent::Completed(completion) => ServerMessage::Done(completion),
    };
    send_message(sink, &message).await
}

async fn send_message<W>(sink: &mut W, message: &ServerMessage) -> Result<(), axum::Error>
where
    W: Sink<Message, Error = axum::Error> + Unpin,
{
    let json = serde_json::to_string(message).map_err(axum::Error::new)?;
    sink.send(Message::Text(json.into())).await
}
