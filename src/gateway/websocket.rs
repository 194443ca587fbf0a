use axum::{
    extract::{ws::Message, Path, State, WebSocketUpgrade},
    response::Response,
};
use futures::{Sink, SinkExt, Stream, StreamExt};
use serde_json::{json, Value};
use std::fmt::Display;
use tracing::{debug, error, info, warn};

use super::state::GatewayState;
use crate::errors::PipelineError;
use crate::models::DetectionResponse;

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    Path(room_id): Path<String>,
    State(state): State<GatewayState>,
) -> Response {
    ws.on_upgrade(move |socket| async move {
        let (sender, receiver) = socket.split();
        run_session(state, room_id, sender, receiver).await;
    })
}

pub fn error_payload(message: impl Into<String>) -> Value {
    json!({ "error": message.into() })
}

/// Sending half of a client connection. `close` runs at most once; later
/// calls are no-ops.
pub struct ClientConnection<S> {
    sink: S,
    closed: bool,
}

impl<S> ClientConnection<S>
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            closed: false,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub async fn send_json(&mut self, value: &Value) -> Result<(), String> {
        if self.closed {
            return Err("connection already closed".to_string());
        }
        self.sink
            .send(Message::Text(value.to_string()))
            .await
            .map_err(|e| e.to_string())
    }

    pub async fn close(&mut self) {
        if self.closed {
            debug!("WebSocket already closed");
            return;
        }
        self.closed = true;

        if let Err(e) = self.sink.send(Message::Close(None)).await {
            warn!("WebSocket already closed: {}", e);
        }
        if let Err(e) = self.sink.close().await {
            debug!("Closing WebSocket sink: {}", e);
        }
    }
}

/// Result of one client turn
#[derive(Debug)]
pub enum TurnOutcome {
    Reply(Value),
    /// Shutdown interrupted the turn; the connection must be torn down
    Cancelled,
}

/// One request/response turn: validate, detect, await the correlated
/// translation. Failures become error payloads; only shutdown cancels.
pub async fn handle_turn(state: &GatewayState, frame: &str) -> TurnOutcome {
    tokio::select! {
        _ = state.shutdown.wait() => {
            info!("WebSocket turn was cancelled during shutdown");
            TurnOutcome::Cancelled
        }
        reply = run_turn(state, frame) => TurnOutcome::Reply(reply),
    }
}

async fn run_turn(state: &GatewayState, frame: &str) -> Value {
    let request = match state.prepare_request(frame) {
        Ok(request) => request,
        Err(e) => {
            warn!("Rejected client message: {}", e);
            return error_payload(e.to_string());
        }
    };
    info!("Received request {} (target: {:?})", request.id, request.target_lang);

    let pending = state.results.register(&request.id);

    match state.detector.detect_language(&request).await {
        DetectionResponse::Success { data } => {
            info!("Detected {} for request {}", data.source_lang, request.id);
        }
        DetectionResponse::Error { message } => {
            error!("Language detection failed for {}: {}", request.id, message);
            return error_payload(format!("Language detection failed: {message}"));
        }
    }

    match pending.wait(state.result_timeout).await {
        Ok(result) => match serde_json::to_value(&result) {
            Ok(value) => value,
            Err(e) => {
                error!("Failed to encode translation result {}: {}", result.id, e);
                error_payload("An error occurred while processing the translation response.")
            }
        },
        Err(PipelineError::Timeout(_)) => {
            warn!("Translation response queue is empty for {}", request.id);
            error_payload("No translation response available.")
        }
        Err(e) => {
            error!("Error while processing translation response: {}", e);
            error_payload("An error occurred while processing the translation response.")
        }
    }
}

/// Drive one connection: `OPEN -> (receive -> detect -> await -> send)* -> CLOSED`.
pub async fn run_session<S, R, E>(state: GatewayState, room_id: String, sink: S, mut stream: R)
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
    R: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    info!("WebSocket connection established for room: {}", room_id);
    let mut connection = ClientConnection::new(sink);

    loop {
        let frame = tokio::select! {
            _ = state.shutdown.wait() => {
                info!("Shutting down WebSocket for room: {}", room_id);
                break;
            }
            frame = stream.next() => frame,
        };

        let text = match frame {
            Some(Ok(Message::Text(text))) => text,
            Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes) {
                Ok(text) => text,
                Err(_) => {
                    let reply = error_payload("binary frames must contain UTF-8 JSON");
                    if let Err(e) = connection.send_json(&reply).await {
                        error!("Failed to send to client: {}", e);
                        break;
                    }
                    continue;
                }
            },
            Some(Ok(Message::Close(_))) | None => {
                info!("Client in room {} disconnected", room_id);
                break;
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => {
                error!("Error in websocket: {}", e);
                break;
            }
        };
        debug!("Received message in room {}: {}", room_id, text);

        match handle_turn(&state, &text).await {
            TurnOutcome::Reply(reply) => {
                if let Err(e) = connection.send_json(&reply).await {
                    error!("Failed to send to client: {}", e);
                    break;
                }
            }
            TurnOutcome::Cancelled => break,
        }
    }

    connection.close().await;
    info!("WebSocket connection closed for room: {}", room_id);
}
