use serde::{Deserialize, Serialize};

use crate::catalog::MediaKind;
use crate::model::game::{GameConfig, Level, QuestionId};

fn default_language() -> String {
    "en".to_string()
}

/// Optional constraints on the ranked score listing. Absent fields match
/// everything.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<Level>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media: Option<MediaKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<u32>,
}

/// Everything a client can send. The first message on a connection opens its
/// role: `createGame` and `joinGame` bind the connection to a game as a
/// participant, `watch` makes it a read-only score follower. `register` may
/// precede either and leaves the connection unbound.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum ClientMessage {
    #[serde(rename_all = "camelCase")]
    Register {
        name: String,
        #[serde(default = "default_language")]
        language: String,
    },

    #[serde(rename_all = "camelCase")]
    CreateGame {
        player_token: String,
        config: GameConfig,
    },

    #[serde(rename_all = "camelCase")]
    JoinGame {
        game_token: String,
        player_token: String,
    },

    #[serde(rename_all = "camelCase")]
    Watch {
        #[serde(default)]
        filters: ScoreFilter,
    },

    StartGame,

    NextQuestion,

    #[serde(rename_all = "camelCase")]
    SubmitAnswer {
        question_id: QuestionId,
        species_id: u32,
    },

    Rematch,

    #[serde(rename_all = "camelCase")]
    GetScores {
        #[serde(default)]
        filters: ScoreFilter,
    },
}
