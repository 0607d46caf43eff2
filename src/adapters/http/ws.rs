use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use tokio::sync::broadcast::error::RecvError;
use tracing::debug;

use crate::adapters::http::state::HttpState;
use crate::application::ports::StreamEvent;
use crate::domain::stream::{WsFrameMetaMessage, WsStreamEndMessage};

pub async fn ws_handler(ws: WebSocketUpgrade, State(st): State<HttpState>) -> impl axum::response::IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, st))
}

async fn handle_socket(mut socket: WebSocket, st: HttpState) {
    let mut rx = match st.pipeline.subscribe().await {
        Ok(r) => r,
        Err(_) => return,
    };

    loop {
        let event = match rx.recv().await {
            Ok(event) => event,
            // Slow viewer: skip ahead to the newest frame.
            Err(RecvError::Lagged(n)) => {
                debug!("ws viewer lagged by {n} frames");
                continue;
            }
            Err(RecvError::Closed) => break,
        };

        match event {
            StreamEvent::Frame(meta, jpeg) => {
                let json = serde_json::to_string(&WsFrameMetaMessage { r#type: "frame".into(), meta }).unwrap_or_default();
                if socket.send(Message::Text(json)).await.is_err() { break; }
                if socket.send(Message::Binary(jpeg)).await.is_err() { break; }
            }
            StreamEvent::End { kind, frames, cancelled, error } => {
                let msg = WsStreamEndMessage { r#type: "end".into(), source: kind, frames, cancelled, error };
                let json = serde_json::to_string(&msg).unwrap_or_default();
                if socket.send(Message::Text(json)).await.is_err() { break; }
            }
        }
    }
}
