//! WebSocket Handler
//!
//! One connection is one session. A reader task decodes frames into the
//! orchestrator's inbox, a writer task encodes its events, and the connection
//! handler runs the orchestrator itself.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{Sink, SinkExt, Stream, StreamExt};
use std::fmt::Display;
use std::time::Instant;
use tokio::sync::mpsc;

use retail_voice_pipeline::{ClientCommand, SessionEvent, SessionOrchestrator, SessionOutcome};

use crate::metrics::{record_error, record_session_ended, record_session_started};
use crate::protocol::{ClientMessage, WsMessage};
use crate::state::AppState;

/// WebSocket handler
pub struct WebSocketHandler;

impl WebSocketHandler {
    /// Handle WebSocket upgrade
    pub async fn handle(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
        ws.on_upgrade(move |socket: WebSocket| async move {
            let (sink, stream) = socket.split();
            Self::serve(sink, stream, state).await;
        })
    }

    /// Drive one session over an already split connection
    ///
    /// Returns `None` when the session could not be registered.
    pub async fn serve<S, R, E>(mut sink: S, stream: R, state: AppState) -> Option<SessionOutcome>
    where
        S: Sink<Message> + Unpin + Send + 'static,
        S::Error: Display + Send,
        R: Stream<Item = Result<Message, E>> + Unpin + Send + 'static,
        E: Display + Send + 'static,
    {
        let handle = match state.sessions.register() {
            Ok(handle) => handle,
            Err(e) => {
                tracing::warn!(error = %e, "Rejecting connection");
                record_error(e.kind());
                if let Ok(json) = serde_json::to_string(&WsMessage::error(e.to_string())) {
                    let _ = sink.send(Message::Text(json)).await;
                }
                let _ = sink.close().await;
                return None;
            }
        };
        let session_id = handle.session_id.clone();
        let started = Instant::now();
        record_session_started(state.sessions.count());

        let deps = state.orchestrator_deps();
        let session_config = deps.config.session.clone();
        let (inbox_tx, inbox_rx) = mpsc::channel(session_config.inbox_capacity);
        let (event_tx, event_rx) = mpsc::channel(session_config.event_capacity);

        let reader = tokio::spawn(read_frames(stream, inbox_tx, session_id.clone()));
        let mut writer = tokio::spawn(write_events(sink, event_rx, session_id.clone()));

        let outcome = {
            let mut orchestrator = SessionOrchestrator::new(session_id.clone(), deps, event_tx);
            orchestrator.run(inbox_rx, handle.shutdown).await
        };

        state.sessions.terminate(&session_id);

        // The orchestrator's event sender is gone, so the writer drains and exits
        if tokio::time::timeout(session_config.shutdown_grace(), &mut writer)
            .await
            .is_err()
        {
            tracing::warn!(session_id = %session_id, "Writer did not drain in time");
            writer.abort();
        }
        reader.abort();

        let label = match &outcome {
            SessionOutcome::Disconnected => "disconnected",
            SessionOutcome::Shutdown => "shutdown",
            SessionOutcome::Failed(e) => {
                record_error(e.kind());
                "failed"
            }
        };
        record_session_ended(label, started.elapsed(), state.sessions.count());
        tracing::info!(
            session_id = %session_id,
            outcome = label,
            duration_ms = started.elapsed().as_millis() as u64,
            "WebSocket closed"
        );

        Some(outcome)
    }
}

/// Decode client frames into orchestrator commands
///
/// Malformed frames are logged and skipped. Returning drops the inbox sender,
/// which the orchestrator sees as a disconnect.
async fn read_frames<R, E>(mut stream: R, inbox: mpsc::Sender<ClientCommand>, session_id: String)
where
    R: Stream<Item = Result<Message, E>> + Unpin + Send + 'static,
    E: Display + Send + 'static,
{
    while let Some(frame) = stream.next().await {
        let command = match frame {
            Ok(Message::Text(text)) => {
                match ClientMessage::parse(&text).and_then(ClientMessage::into_command) {
                    Ok(command) => command,
                    Err(e) => {
                        tracing::warn!(session_id = %session_id, error = %e, "Ignoring client frame");
                        record_error(e.kind());
                        continue;
                    }
                }
            }
            // Raw PCM
            Ok(Message::Binary(data)) => ClientCommand::Audio {
                data,
                store_id: None,
                product_context: None,
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                tracing::debug!(session_id = %session_id, error = %e, "WebSocket receive failed");
                break;
            }
        };

        if inbox.send(command).await.is_err() {
            break;
        }
    }
    tracing::debug!(session_id = %session_id, "Reader finished");
}

/// Encode orchestrator events onto the socket
async fn write_events<S>(mut sink: S, mut events: mpsc::Receiver<SessionEvent>, session_id: String)
where
    S: Sink<Message> + Unpin + Send + 'static,
    S::Error: Display + Send,
{
    while let Some(event) = events.recv().await {
        let message = WsMessage::from(event);
        let json = match serde_json::to_string(&message) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!(session_id = %session_id, error = %e, "Failed to encode event");
                continue;
            }
        };
        if let Err(e) = sink.send(Message::Text(json)).await {
            tracing::debug!(session_id = %session_id, error = %e, "WebSocket send failed");
            break;
        }
    }
    let _ = sink.close().await;
    tracing::debug!(session_id = %session_id, "Writer finished");
}
