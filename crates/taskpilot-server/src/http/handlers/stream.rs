//! Live event stream over WebSocket.
//!
//! Every client gets its own hub subscription. The first frame is always
//! `connected` with the status at subscription time; the rest follow in
//! emission order. A `ping` from the client is answered with a `pong`.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::state::AppState;

const PONG: &str = r#"{"type":"pong"}"#;

pub async fn agent_stream(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| stream_events(socket, state))
}

async fn stream_events(socket: WebSocket, state: Arc<AppState>) {
    let Some(subscription) = state.controller.subscribe().await else {
        warn!("Event bridge closed, dropping stream client");
        return;
    };
    let subscriber = subscription.id;
    info!(subscriber = %subscriber, "Stream client connected");

    let (mut sender, mut receiver) = socket.split();
    let (pong_tx, mut pong_rx) = mpsc::channel::<()>(8);

    let mut send_task = tokio::spawn(async move {
        let mut events = subscription.into_stream();
        loop {
            let frame = tokio::select! {
                event = events.next() => match event {
                    Some(event) => match serde_json::to_string(&event) {
                        Ok(json) => json,
                        Err(e) => {
                            warn!(error = %e, "Failed to encode event");
                            continue;
                        }
                    },
                    None => break,
                },
                Some(()) = pong_rx.recv() => PONG.to_string(),
            };
            if sender.send(Message::Text(frame)).await.is_err() {
                break;
            }
        }
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) if is_ping(&text) => {
                    if pong_tx.send(()).await.is_err() {
                        break;
                    }
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    };

    if state.hub.unsubscribe(subscriber).await {
        debug!(subscriber = %subscriber, "Subscription removed");
    }
    info!(subscriber = %subscriber, "Stream client disconnected");
}

/// Accepts both a bare `ping` and `{"type":"ping"}`.
fn is_ping(text: &str) -> bool {
    let text = text.trim();
    if text.eq_ignore_ascii_case("ping") {
        return true;
    }
    serde_json::from_str::<serde_json::Value>(text)
        .ok()
        .and_then(|v| v.get("type").and_then(|t| t.as_str()).map(|t| t == "ping"))
        .unwrap_or(false)
}
