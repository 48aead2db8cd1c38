//! Read-only score followers: get the ranked listing on connect and a fresh
//! one whenever scores change.

use crate::{
    handler::{Liveness, PING_INTERVAL},
    model::{
        client_message::{ClientMessage, ScoreFilter},
        server_message::{ServerMessage, send_msg},
    },
    server::{AppState, Watcher},
};
use futures_util::{SinkExt, StreamExt};
use log::*;
use std::sync::Arc;
use tokio::{net::TcpStream, sync::mpsc};
use tokio_tungstenite::{WebSocketStream, tungstenite::Message};

pub async fn handle_watcher(
    state: Arc<AppState>,
    ws_stream: WebSocketStream<TcpStream>,
    filters: ScoreFilter,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    let watcher_id = state.next_watcher_id();

    info!("Watcher {watcher_id} connected");
    state.watchers.lock().await.push(Watcher {
        id: watcher_id,
        filters: filters.clone(),
        tx: tx.clone(),
    });
    send_msg(
        &tx,
        ServerMessage::Scores {
            scores: state.store.ranked_scores(&filters),
        },
    );

    let (mut ws_write, mut ws_read) = ws_stream.split();
    let mut liveness = Liveness::new();
    let mut ping_interval = tokio::time::interval(PING_INTERVAL);

    loop {
        tokio::select! {
            Some(msg) = rx.recv() => {
                if ws_write.send(msg).await.is_err() {
                    break;
                }
            }

            msg_result = ws_read.next() => {
                match msg_result {
                    Some(Ok(Message::Pong(_))) => {
                        liveness.pong();
                    }
                    Some(Ok(Message::Text(text))) => {
                        process_watcher_message(&text, &state, watcher_id, &tx).await;
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        break;
                    }
                    Some(Err(_)) => {
                        break;
                    }
                    _ => {} // Ignore Ping (auto-handled by tungstenite), Binary
                }
            }

            _ = ping_interval.tick() => {
                if liveness.expired() {
                    info!("Watcher {watcher_id} timed out (no pong received)");
                    break;
                }
                if ws_write.send(Message::Ping(vec![].into())).await.is_err() {
                    break;
                }
            }
        }
    }

    info!("Watcher {watcher_id} disconnected");
    state.watchers.lock().await.retain(|w| w.id != watcher_id);
}

/// Watchers may refresh or re-scope their listing; everything else is
/// rejected, they never mutate game state.
async fn process_watcher_message(
    text: &str,
    state: &Arc<AppState>,
    watcher_id: u64,
    tx: &tokio::sync::mpsc::UnboundedSender<Message>,
) {
    match serde_json::from_str::<ClientMessage>(text) {
        Ok(ClientMessage::GetScores { filters }) | Ok(ClientMessage::Watch { filters }) => {
            {
                let mut watchers = state.watchers.lock().await;
                if let Some(watcher) = watchers.iter_mut().find(|w| w.id == watcher_id) {
                    watcher.filters = filters.clone();
                }
            }
            send_msg(
                tx,
                ServerMessage::Scores {
                    scores: state.store.ranked_scores(&filters),
                },
            );
        }
        Ok(other) => {
            warn!("Watcher {watcher_id} sent a non-watcher action: {other:?}");
            send_msg(tx, ServerMessage::error("Watchers are read-only"));
        }
        Err(e) => {
            warn!("Failed to parse watcher message: {e}");
            send_msg(tx, ServerMessage::error(format!("Invalid message: {e}")));
        }
    }
}
