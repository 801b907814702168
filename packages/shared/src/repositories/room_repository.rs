use std::sync::Arc;

use crate::models::room::Room;
use crate::repositories::errors::repository_errors::RepositoryError;
use crate::repositories::keys;
use crate::repositories::store::Store;

#[derive(Clone)]
pub struct RoomRepository {
    store: Arc<dyn Store>,
}

impl RoomRepository {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn get(&self, room_id: &str) -> Result<Option<Room>, RepositoryError> {
        match self.store.get(&keys::room(room_id)).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    pub async fn save(&self, room: &Room) -> Result<(), RepositoryError> {
        let raw = serde_json::to_string(room)?;
        self.store.set(&keys::room(&room.id), &raw, None).await?;
        Ok(())
    }

    pub async fn update(&self, room: &Room) -> Result<(), RepositoryError> {
        let key = keys::room(&room.id);
        if self.store.get(&key).await?.is_none() {
            return Err(RepositoryError::NotFound(key));
        }
        self.save(room).await
    }

    pub async fn remove(&self, room_id: &str) -> Result<bool, RepositoryError> {
        Ok(self.store.delete(&keys::room(room_id)).await?)
    }

    /// Hands a ready room to the game workers.
    pub async fn enqueue_create_game(&self, variant: &str, room: &Room) -> Result<(), RepositoryError> {
        let raw = serde_json::to_string(room)?;
        self.store.push_back(&keys::create_game(variant), &raw).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::player::{OperatorIdentifier, Player};
    use crate::repositories::memory_store::InMemoryStore;

    #[tokio::test]
    async fn test_room_lifecycle() {
        let store = Arc::new(InMemoryStore::new());
        let repo = RoomRepository::new(store.clone());
        let p1 = Player::new("p1", "Ana", "EUR", OperatorIdentifier::default());
        let p2 = Player::new("p2", "Bo", "EUR", OperatorIdentifier::default());
        let mut room = Room::new(p1, p2, 5.0, "p1");

        assert!(matches!(
            repo.update(&room).await,
            Err(RepositoryError::NotFound(_))
        ));

        repo.save(&room).await.unwrap();
        room.current_player_id = "p2".to_string();
        repo.update(&room).await.unwrap();
        assert_eq!(repo.get(&room.id).await.unwrap().unwrap().current_player_id, "p2");

        repo.enqueue_create_game("damas", &room).await.unwrap();
        assert_eq!(store.list("create_game:damas").len(), 1);

        assert!(repo.remove(&room.id).await.unwrap());
        assert!(!repo.remove(&room.id).await.unwrap());
    }
}
