use crate::repositories::errors::store_errors::StoreError;

#[derive(Debug)]
pub enum RepositoryError {
    NotFound(String),
    Serialization(String),
    Store(StoreError),
}

impl std::fmt::Display for RepositoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RepositoryError::NotFound(key) => write!(f, "Record not found: {}", key),
            RepositoryError::Serialization(msg) => write!(f, "Serialization error: {}", msg),
            RepositoryError::Store(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for RepositoryError {}

impl From<StoreError> for RepositoryError {
    fn from(err: StoreError) -> Self {
        RepositoryError::Store(err)
    }
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        RepositoryError::Serialization(err.to_string())
    }
}
