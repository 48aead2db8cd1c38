use std::sync::Arc;
use std::time::Duration;

use birdquiz::catalog::{Catalog, MediaKind};
use birdquiz::model::client_message::ClientMessage;
use birdquiz::model::game::{GameConfig, Level, QuestionId};
use birdquiz::model::server_message::{
    AnswerView, GameView, PlayerView, QuestionView, ServerMessage,
};
use birdquiz::server::{AppState, start_ws_server};
use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};

pub struct TestServer {
    pub ws_port: u16,
}

impl TestServer {
    pub async fn start() -> Self {
        let ws_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let ws_port = ws_listener.local_addr().unwrap().port();

        let state = Arc::new(AppState::new(Arc::new(Catalog::sample())));
        tokio::spawn(async move {
            start_ws_server(ws_listener, state).await;
        });

        // Give the server a moment to start
        tokio::time::sleep(Duration::from_millis(10)).await;

        Self { ws_port }
    }

    pub fn ws_url(&self) -> String {
        format!("ws://127.0.0.1:{}", self.ws_port)
    }
}

/// Game setup used by most scenarios: the sample catalog's country `AW` has
/// exactly one species (id 100), so the correct answer is always 100 and any
/// sample `NL` id (1..=20) is a guaranteed-wrong answer.
pub const AW_SPECIES: u32 = 100;
pub const WRONG_SPECIES: u32 = 7;

pub fn aw_config(length: u32, multiplayer: bool) -> GameConfig {
    GameConfig {
        country: "AW".to_string(),
        level: Level::Advanced,
        length,
        media: MediaKind::Images,
        multiplayer,
        repeat: true,
        include_rare: false,
        include_escapes: false,
        tax_order: None,
        tax_family: None,
        language: "en".to_string(),
    }
}

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

pub struct TestClient {
    write: SplitSink<WsStream, Message>,
    read: SplitStream<WsStream>,
}

impl TestClient {
    pub async fn connect(url: &str) -> Self {
        let (ws_stream, _) = connect_async(url).await.expect("Failed to connect");
        let (write, read) = ws_stream.split();
        Self { write, read }
    }

    pub async fn send_json<T: Serialize>(&mut self, msg: &T) {
        let json = serde_json::to_string(msg).unwrap();
        self.write.send(Message::text(json)).await.unwrap();
    }

    pub async fn send_raw_text(&mut self, text: &str) {
        self.write.send(Message::text(text)).await.unwrap();
    }

    pub async fn recv_msg(&mut self) -> ServerMessage {
        let timeout_duration = Duration::from_secs(2);
        match tokio::time::timeout(timeout_duration, self.read.next()).await {
            Ok(Some(Ok(msg))) => serde_json::from_str(msg.to_text().unwrap()).unwrap(),
            Ok(Some(Err(e))) => panic!("WebSocket error: {e}"),
            Ok(None) => panic!("WebSocket stream closed"),
            Err(_) => {
                panic!("Timeout waiting for message from server (waited {timeout_duration:?})")
            }
        }
    }

    /// Skip broadcast chatter until a message matches, or panic on timeout.
    pub async fn recv_until<F>(&mut self, expectation: &str, pred: F) -> ServerMessage
    where
        F: Fn(&ServerMessage) -> bool,
    {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        loop {
            let remaining = deadline
                .checked_duration_since(tokio::time::Instant::now())
                .unwrap_or_else(|| panic!("Timeout waiting for {expectation}"));
            match tokio::time::timeout(remaining, self.read.next()).await {
                Ok(Some(Ok(msg))) => {
                    let Ok(parsed) = serde_json::from_str::<ServerMessage>(msg.to_text().unwrap())
                    else {
                        continue;
                    };
                    if pred(&parsed) {
                        return parsed;
                    }
                }
                Ok(Some(Err(e))) => panic!("WebSocket error while waiting for {expectation}: {e}"),
                Ok(None) => panic!("WebSocket stream closed while waiting for {expectation}"),
                Err(_) => panic!("Timeout waiting for {expectation}"),
            }
        }
    }

    /// Assert that nothing but broadcast-irrelevant frames arrive for a while.
    pub async fn assert_no_message(&mut self, wait: Duration) {
        match tokio::time::timeout(wait, self.read.next()).await {
            Ok(Some(Ok(msg))) => {
                if let Ok(text) = msg.to_text() {
                    if !text.is_empty() {
                        panic!("Expected silence, received: {text}");
                    }
                }
            }
            _ => {}
        }
    }

    // === scenario helpers ===

    pub async fn register(&mut self, name: &str) -> PlayerView {
        self.send_json(&ClientMessage::Register {
            name: name.to_string(),
            language: "en".to_string(),
        })
        .await;
        match self.recv_msg().await {
            ServerMessage::PlayerRegistered { player } => player,
            other => panic!("Expected PlayerRegistered, got {other:?}"),
        }
    }

    pub async fn create_game(&mut self, player_token: &str, config: GameConfig) -> GameView {
        self.send_json(&ClientMessage::CreateGame {
            player_token: player_token.to_string(),
            config,
        })
        .await;
        match self.recv_msg().await {
            ServerMessage::GameCreated { game } => game,
            other => panic!("Expected GameCreated, got {other:?}"),
        }
    }

    /// Join and wait for the snapshot the newcomer is owed.
    pub async fn join_game(&mut self, game_token: &str, player_token: &str) -> GameView {
        self.send_json(&ClientMessage::JoinGame {
            game_token: game_token.to_string(),
            player_token: player_token.to_string(),
        })
        .await;
        match self
            .recv_until("GameUpdated after join", |m| {
                matches!(m, ServerMessage::GameUpdated { .. } | ServerMessage::Error { .. })
            })
            .await
        {
            ServerMessage::GameUpdated { game } => game,
            other => panic!("Join failed: {other:?}"),
        }
    }

    pub async fn start_game(&mut self) -> QuestionView {
        self.send_json(&ClientMessage::StartGame).await;
        self.expect_question().await
    }

    pub async fn expect_question(&mut self) -> QuestionView {
        match self
            .recv_until("NewQuestion", |m| {
                matches!(m, ServerMessage::NewQuestion { .. } | ServerMessage::Error { .. })
            })
            .await
        {
            ServerMessage::NewQuestion { question } => question,
            other => panic!("Expected NewQuestion, got {other:?}"),
        }
    }

    pub async fn submit_answer(&mut self, question_id: QuestionId, species_id: u32) -> AnswerView {
        self.send_json(&ClientMessage::SubmitAnswer {
            question_id,
            species_id,
        })
        .await;
        match self
            .recv_until("AnswerChecked", |m| {
                matches!(m, ServerMessage::AnswerChecked { .. } | ServerMessage::Error { .. })
            })
            .await
        {
            ServerMessage::AnswerChecked { answer } => answer,
            other => panic!("Expected AnswerChecked, got {other:?}"),
        }
    }

    pub async fn expect_error(&mut self) -> String {
        match self
            .recv_until("Error", |m| matches!(m, ServerMessage::Error { .. }))
            .await
        {
            ServerMessage::Error { message } => message,
            other => panic!("Expected Error, got {other:?}"),
        }
    }
}
