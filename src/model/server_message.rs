use log::{debug, error};
use serde::{Deserialize, Serialize};
use tokio_tungstenite::tungstenite::Message;

use crate::catalog::{Country, MediaItem, MediaKind, SpeciesId};
use crate::model::game::{Level, QuestionId};
use crate::server::Tx;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    pub name: String,
    pub language: String,
    /// Secret bearer token; only ever sent to its owner.
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeciesView {
    pub id: SpeciesId,
    pub name: String,
    pub name_latin: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameView {
    pub token: String,
    pub country: Country,
    pub level: Level,
    pub length: u32,
    pub media: MediaKind,
    pub multiplayer: bool,
    pub repeat: bool,
    pub language: String,
    /// Number of closed questions.
    pub progress: u32,
    pub started: bool,
    pub ended: bool,
    pub host: String,
    /// Creation time, unix seconds.
    pub created: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionView {
    pub id: QuestionId,
    pub number: u32,
    pub done: bool,
    /// Index of the media item to show.
    pub sequence: usize,
    pub media: Vec<MediaItem>,
    /// Empty for levels without multiple choice. Never reveals which entry
    /// is the target.
    pub options: Vec<SpeciesView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerView {
    pub id: u64,
    pub question_id: QuestionId,
    pub number: u32,
    pub answer: Option<SpeciesView>,
    /// The correct species, revealed once the player has answered.
    pub species: Option<SpeciesView>,
    pub correct: bool,
    pub points: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StandingView {
    pub name: String,
    pub score: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreEntryView {
    pub rank: u32,
    pub name: String,
    pub score: u32,
    pub level: Level,
    pub country: String,
    pub media: MediaKind,
    pub length: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum ServerMessage {
    #[serde(rename_all = "camelCase")]
    PlayerRegistered { player: PlayerView },
    #[serde(rename_all = "camelCase")]
    GameCreated { game: GameView },
    #[serde(rename_all = "camelCase")]
    GameUpdated { game: GameView },
    #[serde(rename_all = "camelCase")]
    PlayerJoined { player_name: String },
    #[serde(rename_all = "camelCase")]
    PlayersUpdate { players: Vec<StandingView> },
    GameStarted,
    #[serde(rename_all = "camelCase")]
    NewQuestion { question: QuestionView },
    #[serde(rename_all = "camelCase")]
    AnswerChecked { answer: AnswerView },
    #[serde(rename_all = "camelCase")]
    GameFinished {
        game: GameView,
        players: Vec<StandingView>,
    },
    #[serde(rename_all = "camelCase")]
    RematchInvite { game_token: String },
    #[serde(rename_all = "camelCase")]
    Scores { scores: Vec<ScoreEntryView> },
    #[serde(rename_all = "camelCase")]
    Error { message: String },
}

impl ServerMessage {
    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
        }
    }
}

pub fn send_msg(tx: &Tx, msg: ServerMessage) {
    debug!("sending server message: {msg:?}");
    let msg = serde_json::to_string(&msg).unwrap_or_else(|e| {
        format!("{{\"type\":\"error\",\"message\":\"serialization failed: {e}\"}}")
    });
    tx.send(Message::text(&msg)).unwrap_or_else(|e| {
        error!("sending server message through channel failed: {e}");
        error!("tried to send message: {msg}");
    })
}
