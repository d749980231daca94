//! WebSocket gateway tests over in-memory frame channels

mod common;

use axum::extract::ws::Message;
use futures::channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};
use futures::StreamExt;
use std::io;
use std::time::Duration;
use tokio::task::JoinHandle;

use retail_voice_pipeline::SessionOutcome;
use retail_voice_server::{AppState, WebSocketHandler, WsMessage};

use common::{test_settings, test_state};

struct Client {
    frames: UnboundedSender<Result<Message, io::Error>>,
    replies: UnboundedReceiver<Message>,
    session: JoinHandle<Option<SessionOutcome>>,
}

impl Client {
    fn connect(state: AppState) -> Self {
        let (frames, server_in) = unbounded::<Result<Message, io::Error>>();
        let (server_out, replies) = unbounded::<Message>();
        let session = tokio::spawn(WebSocketHandler::serve(server_out, server_in, state));
        Self {
            frames,
            replies,
            session,
        }
    }

    fn send_json(&self, value: serde_json::Value) {
        self.frames
            .unbounded_send(Ok(Message::Text(value.to_string())))
            .unwrap();
    }

    fn send_raw(&self, message: Message) {
        self.frames.unbounded_send(Ok(message)).unwrap();
    }

    async fn next(&mut self) -> Option<WsMessage> {
        loop {
            let frame = tokio::time::timeout(Duration::from_secs(5), self.replies.next())
                .await
                .expect("timed out waiting for server frame")?;
            if let Message::Text(text) = frame {
                return Some(serde_json::from_str(&text).unwrap());
            }
        }
    }

    /// Collect messages up to and including the first matching one
    async fn until(&mut self, done: impl Fn(&WsMessage) -> bool) -> Vec<WsMessage> {
        let mut seen = Vec::new();
        while let Some(message) = self.next().await {
            let stop = done(&message);
            seen.push(message);
            if stop {
                break;
            }
        }
        seen
    }

    async fn disconnect(self) -> Option<SessionOutcome> {
        drop(self.frames);
        tokio::time::timeout(Duration::from_secs(5), self.session)
            .await
            .expect("session did not stop")
            .unwrap()
    }
}

#[tokio::test]
async fn test_butter_question_flow() {
    let state = test_state(test_settings(), "Where is the butter?", "It is in aisle four.");
    let mut client = Client::connect(state.clone());

    client.send_json(serde_json::json!({"type": "start_session"}));
    let Some(WsMessage::SessionStarted { session_id }) = client.next().await else {
        panic!("expected session_started");
    };
    assert!(state.sessions.contains(&session_id));

    for _ in 0..3 {
        client.send_json(serde_json::json!({"type": "audio_chunk", "audio": "AAAAAAAA"}));
    }
    client.send_json(serde_json::json!({"type": "end_audio", "store_id": "store_001"}));

    let messages = client
        .until(|m| matches!(m, WsMessage::ResponseComplete { .. }))
        .await;
    let kinds: Vec<&str> = messages.iter().map(WsMessage::kind).collect();

    assert_eq!(kinds[0], "final_transcript");
    assert_eq!(
        messages[0],
        WsMessage::FinalTranscript {
            text: "Where is the butter?".to_string(),
            is_final: true,
        }
    );
    assert_eq!(
        messages[1],
        WsMessage::ResponseChunk {
            text: "It is in aisle four.".to_string()
        }
    );
    assert!(kinds[2..kinds.len() - 1].iter().all(|k| *k == "audio_chunk"));
    assert!(kinds.len() >= 4, "expected at least one audio chunk: {:?}", kinds);
    for message in &messages[2..messages.len() - 1] {
        let WsMessage::AudioChunk { session_id: owner, .. } = message else {
            panic!("expected audio_chunk, got {:?}", message);
        };
        assert_eq!(owner, &session_id);
    }
    assert_eq!(
        messages.last(),
        Some(&WsMessage::ResponseComplete {
            full_text: "It is in aisle four.".to_string()
        })
    );

    assert_eq!(client.disconnect().await, Some(SessionOutcome::Disconnected));
    assert!(!state.sessions.contains(&session_id));
}

#[tokio::test]
async fn test_malformed_frames_are_ignored() {
    let state = test_state(test_settings(), "", "");
    let mut client = Client::connect(state);

    client.send_raw(Message::Text("{not json".to_string()));
    client.send_json(serde_json::json!({"type": "dance"}));
    client.send_json(serde_json::json!({"type": "audio_chunk", "audio": "%%%"}));
    client.send_json(serde_json::json!({"type": "get_voices"}));

    let Some(WsMessage::Voices { voices }) = client.next().await else {
        panic!("expected voices");
    };
    assert_eq!(voices.len(), 11);

    assert_eq!(client.disconnect().await, Some(SessionOutcome::Disconnected));
}

#[tokio::test]
async fn test_binary_frames_start_session() {
    let state = test_state(test_settings(), "", "");
    let mut client = Client::connect(state);

    client.send_raw(Message::Binary(vec![0u8; 320]));
    assert!(matches!(
        client.next().await,
        Some(WsMessage::SessionStarted { .. })
    ));

    assert_eq!(client.disconnect().await, Some(SessionOutcome::Disconnected));
}

#[tokio::test]
async fn test_registry_termination_stops_session() {
    let state = test_state(test_settings(), "", "");
    let mut client = Client::connect(state.clone());

    client.send_json(serde_json::json!({"type": "start_session"}));
    let Some(WsMessage::SessionStarted { session_id }) = client.next().await else {
        panic!("expected session_started");
    };

    assert!(state.sessions.terminate(&session_id));
    let outcome = tokio::time::timeout(Duration::from_secs(5), client.session)
        .await
        .expect("session did not stop")
        .unwrap();
    assert_eq!(outcome, Some(SessionOutcome::Shutdown));
    assert!(!state.sessions.terminate(&session_id));
}

#[tokio::test]
async fn test_capacity_rejects_with_single_error() {
    let mut settings = test_settings();
    settings.server.max_sessions = 1;
    let state = test_state(settings, "", "");

    let mut first = Client::connect(state.clone());
    first.send_json(serde_json::json!({"type": "start_session"}));
    assert!(matches!(
        first.next().await,
        Some(WsMessage::SessionStarted { .. })
    ));

    let mut second = Client::connect(state.clone());
    assert!(matches!(second.next().await, Some(WsMessage::Error { .. })));
    assert_eq!(second.next().await, None);
    assert_eq!(second.disconnect().await, None);

    assert_eq!(first.disconnect().await, Some(SessionOutcome::Disconnected));
    assert_eq!(state.sessions.count(), 0);
}
