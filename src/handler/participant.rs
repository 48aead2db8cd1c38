//! Connection loop for game participants (hosts and joined players).

use crate::{
    handler::{Liveness, PING_INTERVAL},
    model::{
        client_message::ClientMessage,
        game::GameConfig,
        server_message::{ServerMessage, send_msg},
    },
    registry::Player,
    server::{AppState, Rx, Tx},
};
use futures_util::{SinkExt, StreamExt};
use log::*;
use std::sync::Arc;
use tokio::{net::TcpStream, sync::mpsc};
use tokio_tungstenite::{WebSocketStream, tungstenite::Message};

/// Replies for the acting connection itself. Group traffic goes out through
/// the store while it still holds the game's guard, which keeps every
/// participant's event stream in the game's own order.
struct ActionResult {
    own: Vec<ServerMessage>,
    /// Scores changed; watchers need a fresh listing.
    scores_changed: bool,
}

impl ActionResult {
    fn none() -> Self {
        Self {
            own: Vec::new(),
            scores_changed: false,
        }
    }

    fn to_self(msg: ServerMessage) -> Self {
        Self {
            own: vec![msg],
            scores_changed: false,
        }
    }
}

pub async fn create_game(
    state: Arc<AppState>,
    mut ws_stream: WebSocketStream<TcpStream>,
    player_token: &str,
    config: GameConfig,
) {
    let view = match state.store.create_game(player_token, config) {
        Ok(view) => view,
        Err(e) => {
            warn!("create game refused: {e}");
            let error_message = ServerMessage::error(e.to_string());
            if let Ok(msg) = serde_json::to_string(&error_message) {
                let _ = ws_stream.send(Message::text(msg)).await;
            }
            return;
        }
    };
    let player = match state.store.player_by_token(player_token) {
        Ok(player) => player,
        Err(e) => {
            error!("player vanished right after creating a game: {e}");
            return;
        }
    };

    let (tx, rx) = mpsc::unbounded_channel::<Message>();
    // The host's join row exists since creation; this attaches the socket.
    if let Err(e) = state.store.attach(&view.token, player.id, tx.clone()) {
        error!("host failed to attach to its own game: {e}");
        return;
    }

    let game_token = view.token.clone();
    send_msg(&tx, ServerMessage::GameCreated { game: view });
    handle_participant(ws_stream, state, rx, tx, game_token, player).await;
}

pub async fn join_game(
    state: Arc<AppState>,
    mut ws_stream: WebSocketStream<TcpStream>,
    game_token: &str,
    player_token: &str,
) {
    let player = match state.store.player_by_token(player_token) {
        Ok(player) => player,
        Err(e) => {
            info!("join of game {game_token} refused: {e}");
            let error_message = ServerMessage::error(e.to_string());
            if let Ok(msg) = serde_json::to_string(&error_message) {
                let _ = ws_stream.send(Message::text(msg)).await;
            }
            return;
        }
    };

    let (tx, rx) = mpsc::unbounded_channel::<Message>();
    // Attaches the connection and announces the join to the group; the
    // joiner's snapshot arrives on the channel just attached.
    if let Err(e) = state.store.join_game(game_token, player_token, tx.clone()) {
        info!("join of game {game_token} refused: {e}");
        let error_message = ServerMessage::error(e.to_string());
        if let Ok(msg) = serde_json::to_string(&error_message) {
            let _ = ws_stream.send(Message::text(msg)).await;
        }
        return;
    }
    info!("player {} joined game {game_token}", player.name);

    let game_token = game_token.to_string();
    handle_participant(ws_stream, state, rx, tx, game_token, player).await;
}

/// Run one action against the store. The store fans group messages out
/// under the game's guard; only this connection's own replies come back
/// here.
fn process_action(
    action: ClientMessage,
    state: &AppState,
    game_token: &str,
    player: &Player,
) -> ActionResult {
    match action {
        ClientMessage::StartGame => match state.store.start_game(game_token, player.id) {
            Ok(_) => ActionResult::none(),
            Err(e) => ActionResult::to_self(ServerMessage::error(e.to_string())),
        },

        ClientMessage::NextQuestion => match state.store.advance_game(game_token, player.id) {
            Ok(_) => ActionResult::none(),
            Err(e) => ActionResult::to_self(ServerMessage::error(e.to_string())),
        },

        ClientMessage::SubmitAnswer {
            question_id,
            species_id,
        } => match state.store.submit_answer(&player.token, question_id, species_id) {
            Ok(_) => ActionResult {
                own: Vec::new(),
                scores_changed: true,
            },
            Err(e) => ActionResult::to_self(ServerMessage::error(e.to_string())),
        },

        ClientMessage::Rematch => match state.store.create_rematch(game_token, player) {
            Ok(_) => ActionResult::none(),
            Err(e) => ActionResult::to_self(ServerMessage::error(e.to_string())),
        },

        ClientMessage::GetScores { filters } => ActionResult::to_self(ServerMessage::Scores {
            scores: state.store.ranked_scores(&filters),
        }),

        ClientMessage::Register { .. }
        | ClientMessage::CreateGame { .. }
        | ClientMessage::JoinGame { .. }
        | ClientMessage::Watch { .. } => {
            ActionResult::to_self(ServerMessage::error("Already in a game"))
        }
    }
}

async fn process_message(
    text: &str,
    state: &Arc<AppState>,
    game_token: &str,
    player: &Player,
    own_tx: &Tx,
) {
    // Parse before any guard is taken.
    let action = match serde_json::from_str::<ClientMessage>(text) {
        Ok(action) => action,
        Err(e) => {
            warn!("Failed to parse message from {}: {e}", player.name);
            send_msg(own_tx, ServerMessage::error(format!("Invalid message: {e}")));
            return;
        }
    };

    let result = process_action(action, state, game_token, player);

    for msg in result.own {
        if let ServerMessage::Error { message } = &msg {
            warn!("Sending error response '{message}' back to {}", player.name);
        }
        send_msg(own_tx, msg);
    }
    if result.scores_changed {
        crate::server::notify_watchers(state).await;
    }
}

async fn handle_participant(
    ws_stream: WebSocketStream<TcpStream>,
    state: Arc<AppState>,
    mut rx: Rx,
    own_tx: Tx,
    game_token: String,
    player: Player,
) {
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
                        info!("Received message: {text}");
                        process_message(&text, &state, &game_token, &player, &own_tx).await;
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
                    info!("{} connection timed out (no pong received)", player.name);
                    break;
                }
                if ws_write.send(Message::Ping(vec![].into())).await.is_err() {
                    break;
                }
            }
        }
    }

    // A gone connection never blocks the game for the others.
    info!("player {} disconnected from game {game_token}", player.name);
    state.store.detach(&game_token, player.id);
}
