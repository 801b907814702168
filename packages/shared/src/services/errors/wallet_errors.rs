use crate::repositories::errors::repository_errors::RepositoryError;

#[derive(Debug)]
pub enum WalletError {
    InvalidAmount(i64),
    MissingRoundId,
    MissingSession,
    SessionNotFound(String),
    UnknownOperator(String),
    Rejected(String),
    Repository(RepositoryError),
}

impl std::fmt::Display for WalletError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WalletError::InvalidAmount(amount) => write!(f, "Invalid amount: {}", amount),
            WalletError::MissingRoundId => write!(f, "Round id is required"),
            WalletError::MissingSession => write!(f, "Session id is required"),
            WalletError::SessionNotFound(id) => write!(f, "Session not found: {}", id),
            WalletError::UnknownOperator(name) => write!(f, "Unknown operator: {}", name),
            WalletError::Rejected(msg) => write!(f, "Wallet rejected the request: {}", msg),
            WalletError::Repository(err) => write!(f, "Repository error: {}", err),
        }
    }
}

impl std::error::Error for WalletError {}

impl From<RepositoryError> for WalletError {
    fn from(err: RepositoryError) -> Self {
        WalletError::Repository(err)
    }
}
