use shared::models::presence::PresenceError;
use shared::repositories::errors::repository_errors::RepositoryError;
use shared::repositories::errors::store_errors::StoreError;

#[derive(Debug)]
pub enum GameServiceError {
    GameNotFound(String),
    PlayerNotFound(String),
    PlayerNotInGame(String),
    RepositoryError(RepositoryError),
    StoreError(StoreError),
    PresenceError(PresenceError),
}

impl std::fmt::Display for GameServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GameServiceError::GameNotFound(id) => write!(f, "Game not found: {}", id),
            GameServiceError::PlayerNotFound(id) => write!(f, "Player not found: {}", id),
            GameServiceError::PlayerNotInGame(id) => {
                write!(f, "Player {} is not part of the game", id)
            }
            GameServiceError::RepositoryError(err) => write!(f, "Repository error: {}", err),
            GameServiceError::StoreError(err) => write!(f, "{}", err),
            GameServiceError::PresenceError(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for GameServiceError {}

impl From<RepositoryError> for GameServiceError {
    fn from(err: RepositoryError) -> Self {
        GameServiceError::RepositoryError(err)
    }
}

impl From<StoreError> for GameServiceError {
    fn from(err: StoreError) -> Self {
        GameServiceError::StoreError(err)
    }
}

impl From<PresenceError> for GameServiceError {
    fn from(err: PresenceError) -> Self {
        GameServiceError::PresenceError(err)
    }
}
