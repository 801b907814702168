use shared::models::presence::{PlayerStatus, PresenceError};
use shared::repositories::errors::repository_errors::RepositoryError;
use shared::repositories::errors::store_errors::StoreError;

#[derive(Debug)]
pub enum CommandError {
    Malformed(String),
    PlayerNotFound(String),
    InvalidBet(f64),
    WrongState {
        command: &'static str,
        status: PlayerStatus,
    },
    MovePlayerMismatch,
    PresenceError(PresenceError),
    RepositoryError(RepositoryError),
    StoreError(StoreError),
}

impl CommandError {
    /// Rejections caused by the request itself rather than by the backend.
    pub fn is_validation(&self) -> bool {
        !matches!(
            self,
            CommandError::RepositoryError(_) | CommandError::StoreError(_)
        )
    }
}

impl std::fmt::Display for CommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommandError::Malformed(msg) => write!(f, "Malformed command: {}", msg),
            CommandError::PlayerNotFound(id) => write!(f, "Player not found: {}", id),
            CommandError::InvalidBet(bet) => write!(f, "Invalid bet amount: {}", bet),
            CommandError::WrongState { command, status } => {
                write!(f, "Cannot {} while {}", command, status)
            }
            CommandError::MovePlayerMismatch => {
                write!(f, "Move does not belong to the sending player")
            }
            CommandError::PresenceError(err) => write!(f, "{}", err),
            CommandError::RepositoryError(err) => write!(f, "Repository error: {}", err),
            CommandError::StoreError(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for CommandError {}

impl From<PresenceError> for CommandError {
    fn from(err: PresenceError) -> Self {
        CommandError::PresenceError(err)
    }
}

impl From<RepositoryError> for CommandError {
    fn from(err: RepositoryError) -> Self {
        CommandError::RepositoryError(err)
    }
}

impl From<StoreError> for CommandError {
    fn from(err: StoreError) -> Self {
        CommandError::StoreError(err)
    }
}

impl From<serde_json::Error> for CommandError {
    fn from(err: serde_json::Error) -> Self {
        CommandError::Malformed(err.to_string())
    }
}
