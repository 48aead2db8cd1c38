/// Domain errors surfaced to clients as `ServerMessage::Error` (or, for
/// `Finished`, as a game-finished signal rather than an error).
#[derive(Debug, thiserror::Error)]
pub enum GameError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Permission(&'static str),

    #[error("no eligible species left for this game")]
    ExhaustedPool,

    #[error("game has already reached its final question")]
    Finished,
}

impl GameError {
    pub fn validation(message: impl Into<String>) -> Self {
        GameError::Validation(message.into())
    }
}
