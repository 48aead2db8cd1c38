//! Game state: configuration, the question sequence a game exclusively owns,
//! per-player running scores, and the answer ledger.

use std::collections::{HashMap, HashSet};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use rand::Rng;
use rand::seq::{IndexedRandom, SliceRandom};
use serde::{Deserialize, Serialize};

use crate::catalog::{Catalog, MediaKind, SpeciesId};
use crate::error::GameError;
use crate::model::server_message::{AnswerView, GameView, QuestionView, SpeciesView, StandingView};
use crate::registry::{Player, PlayerId};
use crate::scoring;
use crate::server::Tx;

pub type QuestionId = u64;

/// Difficulty tier. A closed enum so that adding a tier forces every
/// per-tier strategy below through the compiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Level {
    Beginner,
    Advanced,
    Expert,
}

impl Level {
    /// Tiers that present a multiple-choice option set.
    pub fn has_options(self) -> bool {
        match self {
            Level::Beginner => false,
            Level::Advanced | Level::Expert => true,
        }
    }
}

fn default_language() -> String {
    "en".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameConfig {
    pub country: String,
    pub level: Level,
    pub length: u32,
    pub media: MediaKind,
    #[serde(default)]
    pub multiplayer: bool,
    /// Species may be asked more than once within the same game.
    #[serde(default)]
    pub repeat: bool,
    #[serde(default)]
    pub include_rare: bool,
    #[serde(default)]
    pub include_escapes: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tax_order: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tax_family: Option<String>,
    #[serde(default = "default_language")]
    pub language: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionState {
    Active,
    Closed,
}

#[derive(Debug)]
pub struct Question {
    pub id: QuestionId,
    /// 1-based ordinal within the owning game.
    pub number: u32,
    pub species: SpeciesId,
    /// Which media item of the species to show. Fixed at creation so every
    /// participant and reconnect sees the same asset.
    pub media_index: usize,
    /// Shuffled option set including the target; empty for tiers without
    /// multiple choice.
    pub options: Vec<SpeciesId>,
    pub state: QuestionState,
    pub created_at: Instant,
    pub answers: HashMap<PlayerId, Answer>,
}

#[derive(Debug, Clone)]
pub struct Answer {
    pub id: u64,
    pub player: PlayerId,
    pub chosen: SpeciesId,
    pub correct: bool,
    pub points: u32,
}

#[derive(Debug)]
pub struct PlayerScore {
    pub player: PlayerId,
    pub name: String,
    pub score: u32,
    /// Global creation sequence; the stable tiebreak for rankings.
    pub seq: u64,
}

#[derive(Debug)]
pub struct SubmitRecord {
    pub question_index: usize,
    pub created: bool,
}

pub struct Game {
    pub token: String,
    pub config: GameConfig,
    pub host: PlayerId,
    pub host_name: String,
    pub created: SystemTime,
    pub started: bool,
    pub ended: bool,
    pub questions: Vec<Question>,
    /// Insertion-ordered join rows; at most one per player.
    pub scores: Vec<PlayerScore>,
    /// Live connections of participants, for group fan-out.
    pub connections: HashMap<PlayerId, Tx>,
    answer_seq: u64,
}

const DECOY_COUNT: usize = 5;

/// Decoys neighboring the target in catalog-id order: up to two immediately
/// below, filled to five from above, refilling from below when above runs
/// short. The combined set (target included) is shuffled once at creation.
fn option_set(catalog: &Catalog, target: SpeciesId, rng: &mut impl Rng) -> Vec<SpeciesId> {
    let mut decoys: Vec<SpeciesId> = catalog.ids_below(target).take(2).collect();
    decoys.extend(catalog.ids_above(target).take(DECOY_COUNT - decoys.len()));
    if decoys.len() < DECOY_COUNT {
        let missing = DECOY_COUNT - decoys.len();
        decoys.extend(catalog.ids_below(target).skip(2).take(missing));
    }
    decoys.push(target);
    decoys.shuffle(rng);
    decoys
}

impl Game {
    pub fn new(token: String, config: GameConfig, host: &Player) -> Self {
        Self {
            token,
            config,
            host: host.id,
            host_name: host.name.clone(),
            created: SystemTime::now(),
            started: false,
            ended: false,
            questions: Vec::new(),
            scores: Vec::new(),
            connections: HashMap::new(),
            answer_seq: 0,
        }
    }

    /// The single question still accepting answers, if any. Always scoped to
    /// this game's own questions.
    pub fn current_question(&self) -> Option<&Question> {
        self.questions
            .iter()
            .find(|q| q.state == QuestionState::Active)
    }

    pub fn closed_count(&self) -> u32 {
        self.questions
            .iter()
            .filter(|q| q.state == QuestionState::Closed)
            .count() as u32
    }

    /// Get-or-create the join row for `player`. Returns true when the row was
    /// newly created.
    pub fn join(&mut self, player: &Player, seq: u64) -> bool {
        if self.scores.iter().any(|s| s.player == player.id) {
            return false;
        }
        self.scores.push(PlayerScore {
            player: player.id,
            name: player.name.clone(),
            score: 0,
            seq,
        });
        true
    }

    /// Generate the next question. Closes every still-active question of
    /// this game first, so an explicit advance finalizes the previous
    /// question even when no answer arrived.
    pub fn add_question(
        &mut self,
        catalog: &Catalog,
        id: QuestionId,
    ) -> Result<&Question, GameError> {
        self.close_active();

        if self.questions.len() as u32 >= self.config.length {
            self.ended = true;
            return Err(GameError::Finished);
        }

        let exclude: HashSet<SpeciesId> = if self.config.repeat {
            HashSet::new()
        } else {
            self.questions.iter().map(|q| q.species).collect()
        };
        let pool = catalog.species_for_country(&self.config.country, &exclude);
        let mut rng = rand::rng();
        let Some(&target) = pool.choose(&mut rng) else {
            self.ended = true;
            return Err(GameError::ExhaustedPool);
        };

        let options = if self.config.level.has_options() {
            option_set(catalog, target, &mut rng)
        } else {
            Vec::new()
        };

        let media_count = catalog.media_for(target, self.config.media).len();
        let media_index = match self.config.level {
            Level::Beginner => 0,
            Level::Advanced | Level::Expert if media_count > 0 => rng.random_range(0..media_count),
            _ => 0,
        };

        self.questions.push(Question {
            id,
            number: self.questions.len() as u32 + 1,
            species: target,
            media_index,
            options,
            state: QuestionState::Active,
            created_at: Instant::now(),
            answers: HashMap::new(),
        });
        Ok(&self.questions[self.questions.len() - 1])
    }

    /// Record one player's answer to one question. Idempotent: a replay
    /// returns the existing record and never re-credits the score. The
    /// answer map keyed by player id, checked and inserted under the same
    /// game guard, is the uniqueness constraint on (player, question).
    pub fn record_answer(
        &mut self,
        player: &Player,
        question_id: QuestionId,
        chosen: SpeciesId,
        join_seq: u64,
        catalog: &Catalog,
    ) -> Result<SubmitRecord, GameError> {
        let question_index = self
            .questions
            .iter()
            .position(|q| q.id == question_id)
            .ok_or(GameError::NotFound("question"))?;

        if self.questions[question_index]
            .answers
            .contains_key(&player.id)
        {
            return Ok(SubmitRecord {
                question_index,
                created: false,
            });
        }

        if catalog.species(chosen).is_none() {
            return Err(GameError::validation(format!("unknown species id {chosen}")));
        }

        self.join(player, join_seq);

        let question = &mut self.questions[question_index];
        let correct = chosen == question.species;
        let points = if correct {
            scoring::score_for(question.created_at.elapsed())
        } else {
            0
        };
        self.answer_seq += 1;
        question.answers.insert(
            player.id,
            Answer {
                id: self.answer_seq,
                player: player.id,
                chosen,
                correct,
                points,
            },
        );

        if let Some(entry) = self.scores.iter_mut().find(|s| s.player == player.id) {
            entry.score += points;
        }

        Ok(SubmitRecord {
            question_index,
            created: true,
        })
    }

    /// Whether every joined player has answered the given question.
    pub fn all_players_answered(&self, question_index: usize) -> bool {
        let answers = &self.questions[question_index].answers;
        self.scores.iter().all(|s| answers.contains_key(&s.player))
    }

    /// Finalize every question still accepting answers.
    pub fn close_active(&mut self) {
        for q in &mut self.questions {
            if q.state == QuestionState::Active {
                q.state = QuestionState::Closed;
            }
        }
    }

    // === serialized views ===

    pub fn to_game_view(&self, catalog: &Catalog) -> GameView {
        GameView {
            token: self.token.clone(),
            country: catalog
                .country(&self.config.country)
                .cloned()
                .unwrap_or_else(|| crate::catalog::Country {
                    code: self.config.country.clone(),
                    name: self.config.country.clone(),
                }),
            level: self.config.level,
            length: self.config.length,
            media: self.config.media,
            multiplayer: self.config.multiplayer,
            repeat: self.config.repeat,
            language: self.config.language.clone(),
            progress: self.closed_count(),
            started: self.started,
            ended: self.ended,
            host: self.host_name.clone(),
            created: self
                .created
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or_default(),
        }
    }

    pub fn question_view(&self, question: &Question, catalog: &Catalog) -> QuestionView {
        QuestionView {
            id: question.id,
            number: question.number,
            done: question.state == QuestionState::Closed,
            sequence: question.media_index,
            media: catalog
                .media_for(question.species, self.config.media)
                .to_vec(),
            options: question
                .options
                .iter()
                .filter_map(|&id| species_view(catalog, id))
                .collect(),
        }
    }

    pub fn answer_view(
        &self,
        question: &Question,
        answer: &Answer,
        catalog: &Catalog,
    ) -> AnswerView {
        AnswerView {
            id: answer.id,
            question_id: question.id,
            number: question.number,
            answer: species_view(catalog, answer.chosen),
            species: species_view(catalog, question.species),
            correct: answer.correct,
            points: answer.points,
        }
    }

    /// Roster snapshot ordered by score descending, join order as tiebreak.
    pub fn standings(&self) -> Vec<StandingView> {
        let mut rows: Vec<&PlayerScore> = self.scores.iter().collect();
        rows.sort_by(|a, b| b.score.cmp(&a.score).then(a.seq.cmp(&b.seq)));
        rows.iter()
            .map(|s| StandingView {
                name: s.name.clone(),
                score: s.score,
            })
            .collect()
    }
}

fn species_view(catalog: &Catalog, id: SpeciesId) -> Option<SpeciesView> {
    catalog.species(id).map(|s| SpeciesView {
        id: s.id,
        name: s.name.clone(),
        name_latin: s.name_latin.clone(),
    })
}
