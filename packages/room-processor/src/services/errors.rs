use shared::models::presence::PresenceError;
use shared::repositories::errors::repository_errors::RepositoryError;
use shared::repositories::errors::store_errors::StoreError;
use shared::services::errors::wallet_errors::WalletError;

#[derive(Debug)]
pub enum MatchmakingServiceError {
    RepositoryError(RepositoryError),
    RoomError(RoomServiceError),
}

impl std::fmt::Display for MatchmakingServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchmakingServiceError::RepositoryError(err) => {
                write!(f, "Repository error: {}", err)
            }
            MatchmakingServiceError::RoomError(err) => write!(f, "Room error: {}", err),
        }
    }
}

impl std::error::Error for MatchmakingServiceError {}

impl From<RepositoryError> for MatchmakingServiceError {
    fn from(err: RepositoryError) -> Self {
        MatchmakingServiceError::RepositoryError(err)
    }
}

impl From<RoomServiceError> for MatchmakingServiceError {
    fn from(err: RoomServiceError) -> Self {
        MatchmakingServiceError::RoomError(err)
    }
}

#[derive(Debug)]
pub enum RoomServiceError {
    RoomNotFound(String),
    PlayerNotInRoom(String),
    RepositoryError(RepositoryError),
    StoreError(StoreError),
    PresenceError(PresenceError),
    WalletError(WalletError),
}

impl std::fmt::Display for RoomServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RoomServiceError::RoomNotFound(id) => write!(f, "Room not found: {}", id),
            RoomServiceError::PlayerNotInRoom(id) => write!(f, "Player {} is not in the room", id),
            RoomServiceError::RepositoryError(err) => write!(f, "Repository error: {}", err),
            RoomServiceError::StoreError(err) => write!(f, "{}", err),
            RoomServiceError::PresenceError(err) => write!(f, "{}", err),
            RoomServiceError::WalletError(err) => write!(f, "Wallet error: {}", err),
        }
    }
}

impl std::error::Error for RoomServiceError {}

impl From<RepositoryError> for RoomServiceError {
    fn from(err: RepositoryError) -> Self {
        RoomServiceError::RepositoryError(err)
    }
}

impl From<StoreError> for RoomServiceError {
    fn from(err: StoreError) -> Self {
        RoomServiceError::StoreError(err)
    }
}

impl From<PresenceError> for RoomServiceError {
    fn from(err: PresenceError) -> Self {
        RoomServiceError::PresenceError(err)
    }
}

impl From<WalletError> for RoomServiceError {
    fn from(err: WalletError) -> Self {
        RoomServiceError::WalletError(err)
    }
}
