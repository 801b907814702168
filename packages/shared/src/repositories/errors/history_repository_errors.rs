#[derive(Debug)]
pub enum GameHistoryRepositoryError {
    Serialization(String),
    DynamoDb(String),
}

impl std::fmt::Display for GameHistoryRepositoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GameHistoryRepositoryError::Serialization(msg) => {
                write!(f, "Serialization error: {}", msg)
            }
            GameHistoryRepositoryError::DynamoDb(msg) => write!(f, "DynamoDB error: {}", msg),
        }
    }
}

impl std::error::Error for GameHistoryRepositoryError {}
