//! In-process game store. Each game lives in its own dashmap slot; every
//! mutation that must be atomic runs to completion while holding that one
//! game's exclusive guard. There is no lock spanning games, so unrelated
//! games never serialize against each other.
//!
//! Group messages are enqueued on the participants' unbounded channels
//! while the guard is still held. Enqueueing never blocks, and holding the
//! guard across it is what keeps every participant's event stream in the
//! owning game's order even when two connections move the same game
//! forward at once.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use log::info;
use rand::Rng;
use rand::distr::Alphanumeric;

use crate::catalog::{Catalog, SpeciesId};
use crate::error::GameError;
use crate::model::client_message::ScoreFilter;
use crate::model::game::{Game, GameConfig, QuestionId};
use crate::model::server_message::{
    AnswerView, GameView, QuestionView, ScoreEntryView, ServerMessage, StandingView, send_msg,
};
use crate::registry::{Player, PlayerId, PlayerRegistry};
use crate::server::Tx;

const GAME_TOKEN_LEN: usize = 6;

/// What an advance produced: either the next question, or the terminal
/// snapshot when the game just ended (length reached or pool ran dry).
#[derive(Debug)]
pub enum Advance {
    Question(QuestionView),
    Finished {
        game: GameView,
        players: Vec<StandingView>,
    },
}

#[derive(Debug)]
pub struct SubmitOutcome {
    pub answer: AnswerView,
    /// Standings after the answer was credited.
    pub players: Vec<StandingView>,
    /// Present when this answer completed the question and moved the game
    /// forward.
    pub advance: Option<Advance>,
}

fn broadcast(game: &Game, msg: &ServerMessage) {
    for tx in game.connections.values() {
        send_msg(tx, msg.clone());
    }
}

fn send_to(game: &Game, player: PlayerId, msg: ServerMessage) {
    if let Some(tx) = game.connections.get(&player) {
        send_msg(tx, msg);
    }
}

fn broadcast_advance(game: &Game, advance: &Advance) {
    match advance {
        Advance::Question(question) => broadcast(
            game,
            &ServerMessage::NewQuestion {
                question: question.clone(),
            },
        ),
        Advance::Finished { game: view, players } => broadcast(
            game,
            &ServerMessage::GameFinished {
                game: view.clone(),
                players: players.clone(),
            },
        ),
    }
}

pub struct GameStore {
    registry: PlayerRegistry,
    games: DashMap<String, Game>,
    /// Routes a question id back to the game that owns it.
    question_index: DashMap<QuestionId, String>,
    next_question_id: AtomicU64,
    next_join_seq: AtomicU64,
    catalog: Arc<Catalog>,
}

impl GameStore {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self {
            registry: PlayerRegistry::new(),
            games: DashMap::new(),
            question_index: DashMap::new(),
            next_question_id: AtomicU64::new(1),
            next_join_seq: AtomicU64::new(1),
            catalog,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn register_player(&self, name: &str, language: &str) -> Result<Player, GameError> {
        self.registry.create_player(name, language)
    }

    pub fn player_by_token(&self, token: &str) -> Result<Player, GameError> {
        self.registry.player_by_token(token)
    }

    fn generate_game_token(&self) -> String {
        loop {
            let token: String = rand::rng()
                .sample_iter(&Alphanumeric)
                .take(GAME_TOKEN_LEN)
                .map(|c| (c as char).to_ascii_uppercase())
                .collect();
            if !self.games.contains_key(&token) {
                return token;
            }
        }
    }

    fn next_join_seq(&self) -> u64 {
        self.next_join_seq.fetch_add(1, Ordering::Relaxed)
    }

    /// Generate and index the game's next question. Must be called with the
    /// game's guard held; only the index registration reaches outside it.
    fn generate_question(&self, game: &mut Game) -> Result<QuestionView, GameError> {
        let id = self.next_question_id.fetch_add(1, Ordering::Relaxed);
        let token = game.token.clone();
        game.add_question(&self.catalog, id)?;
        self.question_index.insert(id, token);
        match game.current_question() {
            Some(question) => Ok(game.question_view(question, &self.catalog)),
            None => Err(GameError::NotFound("question")),
        }
    }

    pub fn create_game(
        &self,
        player_token: &str,
        config: GameConfig,
    ) -> Result<GameView, GameError> {
        let player = self.registry.player_by_token(player_token)?;
        if self.catalog.country(&config.country).is_none() {
            return Err(GameError::validation(format!(
                "unknown country {}",
                config.country
            )));
        }
        if config.length == 0 {
            return Err(GameError::validation("game length must be at least 1"));
        }

        let token = self.generate_game_token();
        let mut game = Game::new(token.clone(), config, &player);
        game.join(&player, self.next_join_seq());
        let view = game.to_game_view(&self.catalog);
        info!("game {token} created by {}", player.name);
        self.games.insert(token, game);
        Ok(view)
    }

    /// Attach the creator's connection to the game they just created. No
    /// join announcements; the creator gets GameCreated instead.
    pub fn attach(&self, game_token: &str, player: PlayerId, tx: Tx) -> Result<(), GameError> {
        let mut game = self
            .games
            .get_mut(game_token)
            .ok_or(GameError::NotFound("game"))?;
        game.connections.insert(player, tx);
        Ok(())
    }

    /// Get-or-create the player's join row, attach their connection, and
    /// announce the join: the group hears PlayerJoined and the fresh
    /// roster; the joiner gets the game snapshot, the current question
    /// (never a stale one) and, on reconnect, their own recorded answer to
    /// it. All of it under the game's guard.
    pub fn join_game(
        &self,
        game_token: &str,
        player_token: &str,
        tx: Tx,
    ) -> Result<(), GameError> {
        let player = self.registry.player_by_token(player_token)?;
        let mut game = self
            .games
            .get_mut(game_token)
            .ok_or(GameError::NotFound("game"))?;

        game.join(&player, self.next_join_seq());
        game.connections.insert(player.id, tx);

        broadcast(
            &game,
            &ServerMessage::PlayerJoined {
                player_name: player.name.clone(),
            },
        );
        broadcast(
            &game,
            &ServerMessage::PlayersUpdate {
                players: game.standings(),
            },
        );
        send_to(
            &game,
            player.id,
            ServerMessage::GameUpdated {
                game: game.to_game_view(&self.catalog),
            },
        );
        if let Some(question) = game.current_question() {
            send_to(
                &game,
                player.id,
                ServerMessage::NewQuestion {
                    question: game.question_view(question, &self.catalog),
                },
            );
            if let Some(answer) = question.answers.get(&player.id) {
                send_to(
                    &game,
                    player.id,
                    ServerMessage::AnswerChecked {
                        answer: game.answer_view(question, answer, &self.catalog),
                    },
                );
            }
        }
        Ok(())
    }

    pub fn detach(&self, game_token: &str, player: PlayerId) {
        if let Some(mut game) = self.games.get_mut(game_token) {
            game.connections.remove(&player);
        }
    }

    /// Host starts the game: generates and broadcasts the first question.
    /// A replayed start broadcasts the currently active question again
    /// instead of erroring.
    pub fn start_game(
        &self,
        game_token: &str,
        player: PlayerId,
    ) -> Result<QuestionView, GameError> {
        let mut game = self
            .games
            .get_mut(game_token)
            .ok_or(GameError::NotFound("game"))?;
        if game.host != player {
            return Err(GameError::Permission("Only the host can start the game"));
        }
        if game.ended {
            return Err(GameError::Finished);
        }

        let question = if game.started {
            match game.current_question() {
                Some(q) => game.question_view(q, &self.catalog),
                None => self.generate_question(&mut game)?,
            }
        } else {
            game.started = true;
            self.generate_question(&mut game)?
        };

        broadcast(&game, &ServerMessage::GameStarted);
        broadcast(
            &game,
            &ServerMessage::NewQuestion {
                question: question.clone(),
            },
        );
        Ok(question)
    }

    /// Host-driven advance: finalize the active question and move on.
    pub fn advance_game(&self, game_token: &str, player: PlayerId) -> Result<Advance, GameError> {
        let mut game = self
            .games
            .get_mut(game_token)
            .ok_or(GameError::NotFound("game"))?;
        if game.host != player {
            return Err(GameError::Permission("Only the host can advance the game"));
        }
        if !game.started {
            return Err(GameError::validation("game has not started yet"));
        }

        let advance = self.advance_under_guard(&mut game)?;
        broadcast_advance(&game, &advance);
        Ok(advance)
    }

    fn advance_under_guard(&self, game: &mut Game) -> Result<Advance, GameError> {
        match self.generate_question(game) {
            Ok(view) => Ok(Advance::Question(view)),
            Err(GameError::Finished) | Err(GameError::ExhaustedPool) => Ok(Advance::Finished {
                game: game.to_game_view(&self.catalog),
                players: game.standings(),
            }),
            Err(e) => Err(e),
        }
    }

    /// Record an answer, routed by question id. Idempotent: replays return
    /// the stored answer and never move the game. The submitter gets their
    /// AnswerChecked, the group the fresh standings and, when this answer
    /// completed the question, whatever came next.
    pub fn submit_answer(
        &self,
        player_token: &str,
        question_id: QuestionId,
        species_id: SpeciesId,
    ) -> Result<SubmitOutcome, GameError> {
        let player = self.registry.player_by_token(player_token)?;
        let game_token = self
            .question_index
            .get(&question_id)
            .map(|t| t.clone())
            .ok_or(GameError::NotFound("question"))?;
        let mut game = self
            .games
            .get_mut(&game_token)
            .ok_or(GameError::NotFound("game"))?;

        let record = game.record_answer(
            &player,
            question_id,
            species_id,
            self.next_join_seq(),
            &self.catalog,
        )?;
        let question = &game.questions[record.question_index];
        let answer = game.answer_view(question, &question.answers[&player.id], &self.catalog);

        let mut advance = None;
        if record.created && !game.ended {
            let question_done =
                !game.config.multiplayer || game.all_players_answered(record.question_index);
            let is_active = game.current_question().map(|q| q.id) == Some(question_id);
            if question_done && is_active {
                advance = Some(self.advance_under_guard(&mut game)?);
            }
        }
        let players = game.standings();

        send_to(
            &game,
            player.id,
            ServerMessage::AnswerChecked {
                answer: answer.clone(),
            },
        );
        broadcast(
            &game,
            &ServerMessage::PlayersUpdate {
                players: players.clone(),
            },
        );
        if let Some(advance) = &advance {
            broadcast_advance(&game, advance);
        }

        Ok(SubmitOutcome {
            answer,
            players,
            advance,
        })
    }

    /// Host-only: a fresh game with the same configuration, a new token,
    /// and empty question/score state. The old game is left untouched.
    pub fn create_rematch(&self, game_token: &str, player: &Player) -> Result<String, GameError> {
        let (config, group) = {
            let game = self
                .games
                .get(game_token)
                .ok_or(GameError::NotFound("game"))?;
            if game.host != player.id {
                return Err(GameError::Permission("Only the host can start a rematch"));
            }
            (
                game.config.clone(),
                game.connections.values().cloned().collect::<Vec<Tx>>(),
            )
        };

        // Old guard dropped; inserting the new game takes its own slot.
        let token = self.generate_game_token();
        let game = Game::new(token.clone(), config, player);
        info!("rematch {token} of {game_token} created by {}", player.name);
        self.games.insert(token.clone(), game);
        // Invites carry no ordinal relation to the question stream, so
        // they go out to the snapshotted group without a guard.
        for tx in &group {
            send_msg(
                tx,
                ServerMessage::RematchInvite {
                    game_token: token.clone(),
                },
            );
        }
        Ok(token)
    }

    /// Ranked score listing across games, strict score-descending with
    /// insertion order as the stable tiebreak. Ranks number from 1.
    pub fn ranked_scores(&self, filter: &ScoreFilter) -> Vec<ScoreEntryView> {
        let mut rows: Vec<(u64, ScoreEntryView)> = Vec::new();
        for game in self.games.iter() {
            let config = &game.config;
            if filter.level.is_some_and(|l| l != config.level)
                || filter.country.as_deref().is_some_and(|c| c != config.country)
                || filter.media.is_some_and(|m| m != config.media)
                || filter.length.is_some_and(|l| l != config.length)
            {
                continue;
            }
            for score in &game.scores {
                rows.push((
                    score.seq,
                    ScoreEntryView {
                        rank: 0,
                        name: score.name.clone(),
                        score: score.score,
                        level: config.level,
                        country: config.country.clone(),
                        media: config.media,
                        length: config.length,
                    },
                ));
            }
        }
        rows.sort_by(|a, b| b.1.score.cmp(&a.1.score).then(a.0.cmp(&b.0)));
        rows.into_iter()
            .enumerate()
            .map(|(i, (_, mut entry))| {
                entry.rank = i as u32 + 1;
                entry
            })
            .collect()
    }
}
