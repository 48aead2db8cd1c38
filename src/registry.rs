//! Player identities. A player is created once with a display name and
//! preferred language and is afterwards identified exclusively by an opaque
//! bearer token.

use dashmap::DashMap;
use rand::Rng;
use rand::distr::Alphanumeric;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::GameError;
use crate::model::server_message::PlayerView;

pub type PlayerId = u64;

const TOKEN_LEN: usize = 32;

#[derive(Debug, Clone)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub language: String,
    pub token: String,
}

impl Player {
    pub fn to_view(&self) -> PlayerView {
        PlayerView {
            name: self.name.clone(),
            language: self.language.clone(),
            token: self.token.clone(),
        }
    }
}

/// Token-keyed player table. Tokens are secrets, never listed or enumerable;
/// the only way in is `player_by_token` with the exact token.
pub struct PlayerRegistry {
    players: DashMap<String, Player>,
    next_id: AtomicU64,
}

impl PlayerRegistry {
    pub fn new() -> Self {
        Self {
            players: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn create_player(&self, name: &str, language: &str) -> Result<Player, GameError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(GameError::validation("player name must not be empty"));
        }
        let player = Player {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            name: name.to_string(),
            language: language.to_string(),
            token: generate_token(),
        };
        self.players.insert(player.token.clone(), player.clone());
        Ok(player)
    }

    pub fn player_by_token(&self, token: &str) -> Result<Player, GameError> {
        self.players
            .get(token)
            .map(|p| p.clone())
            .ok_or(GameError::NotFound("player"))
    }
}

fn generate_token() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LEN)
        .map(char::from)
        .collect()
}
