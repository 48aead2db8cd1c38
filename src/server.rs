use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::{SinkExt, StreamExt};
use log::*;
use tokio::{
    net::{TcpListener, TcpStream},
    sync::{Mutex, mpsc},
};
use tokio_tungstenite::{
    accept_async,
    tungstenite::{Error, Message, Result},
};

use crate::catalog::Catalog;
use crate::handler::{participant, watcher};
use crate::model::{
    client_message::{ClientMessage, ScoreFilter},
    server_message::ServerMessage,
};
use crate::store::GameStore;

pub type Tx = mpsc::UnboundedSender<Message>;
pub type Rx = mpsc::UnboundedReceiver<Message>;

pub struct Watcher {
    pub id: u64,
    pub filters: ScoreFilter,
    pub tx: Tx,
}

pub struct AppState {
    pub store: GameStore,
    pub watchers: Mutex<Vec<Watcher>>,
    next_watcher_id: AtomicU64,
}

impl AppState {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self {
            store: GameStore::new(catalog),
            watchers: Mutex::new(Vec::new()),
            next_watcher_id: AtomicU64::new(1),
        }
    }

    pub fn next_watcher_id(&self) -> u64 {
        self.next_watcher_id.fetch_add(1, Ordering::Relaxed)
    }
}

async fn accept_connection(peer: SocketAddr, stream: TcpStream, state: Arc<AppState>) {
    if let Err(e) = handle_connection(peer, stream, state).await {
        match e {
            Error::ConnectionClosed | Error::Protocol(_) | Error::Utf8(_) => (),
            err => error!("Error processing connection: {err}"),
        }
    }
}

/// Reads messages until one opens the connection's role: `createGame` and
/// `joinGame` hand off to the participant loop, `watch` to the watcher loop.
/// `register` and `getScores` are answered inline and leave the connection
/// unbound.
async fn handle_connection(peer: SocketAddr, stream: TcpStream, state: Arc<AppState>) -> Result<()> {
    let mut ws_stream = accept_async(stream).await?;
    info!("New WebSocket connection: {peer}");

    while let Some(msg) = ws_stream.next().await {
        let msg = msg?;
        let Ok(text) = msg.to_text() else {
            continue;
        };
        if text.is_empty() {
            continue;
        }
        info!("Received message: {text}");
        let reply = match serde_json::from_str::<ClientMessage>(text) {
            Ok(ClientMessage::Register { name, language }) => {
                match state.store.register_player(&name, &language) {
                    Ok(player) => ServerMessage::PlayerRegistered {
                        player: player.to_view(),
                    },
                    Err(e) => ServerMessage::error(e.to_string()),
                }
            }
            Ok(ClientMessage::CreateGame {
                player_token,
                config,
            }) => {
                participant::create_game(state, ws_stream, &player_token, config).await;
                return Ok(());
            }
            Ok(ClientMessage::JoinGame {
                game_token,
                player_token,
            }) => {
                participant::join_game(state, ws_stream, &game_token, &player_token).await;
                return Ok(());
            }
            Ok(ClientMessage::Watch { filters }) => {
                watcher::handle_watcher(state, ws_stream, filters).await;
                return Ok(());
            }
            Ok(ClientMessage::GetScores { filters }) => ServerMessage::Scores {
                scores: state.store.ranked_scores(&filters),
            },
            Ok(other) => {
                warn!("Unbound connection sent in-game action: {other:?}");
                ServerMessage::error("First action must be createGame, joinGame or watch")
            }
            Err(e) => {
                warn!("Failed to parse message: {e}");
                ServerMessage::error(format!("Invalid message: {e}"))
            }
        };
        let msg = serde_json::to_string(&reply)
            .unwrap_or_else(|e| format!("{{\"type\":\"error\",\"message\":\"{e}\"}}"));
        ws_stream.send(Message::text(msg)).await?;
    }

    Ok(())
}

/// Recompute the ranked listing for every registered watcher and push it.
/// Called after any mutation that may have changed scores; sends happen
/// outside any game guard.
pub async fn notify_watchers(state: &AppState) {
    let watchers = state.watchers.lock().await;
    for watcher in watchers.iter() {
        let scores = state.store.ranked_scores(&watcher.filters);
        crate::model::server_message::send_msg(
            &watcher.tx,
            ServerMessage::Scores { scores },
        );
    }
}

pub async fn start_ws_server(listener: TcpListener, state: Arc<AppState>) {
    if let Ok(addr) = listener.local_addr() {
        info!("Listening on: {addr}");
    }

    while let Ok((stream, peer)) = listener.accept().await {
        info!("Peer address: {peer}");
        tokio::spawn(accept_connection(peer, stream, state.clone()));
    }
}
