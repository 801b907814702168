use std::sync::Arc;

use crate::models::session::Session;
use crate::repositories::errors::repository_errors::RepositoryError;
use crate::repositories::keys;
use crate::repositories::store::Store;

#[derive(Clone)]
pub struct SessionRepository {
    store: Arc<dyn Store>,
}

impl SessionRepository {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn get(&self, session_id: &str) -> Result<Option<Session>, RepositoryError> {
        match self.store.get(&keys::session(session_id)).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    pub async fn save(&self, session: &Session) -> Result<(), RepositoryError> {
        let raw = serde_json::to_string(session)?;
        self.store
            .set(&keys::session(&session.id), &raw, None)
            .await?;
        Ok(())
    }

    pub async fn update_balance(
        &self,
        session_id: &str,
        balance: i64,
    ) -> Result<Session, RepositoryError> {
        let mut session = self
            .get(session_id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(keys::session(session_id)))?;
        session.balance = balance;
        self.save(&session).await?;
        Ok(session)
    }
}
