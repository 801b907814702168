use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};

use shared::repositories::{
    player_repository::{PlayerRepository, ResolvedPlayer},
    queue_repository::{QueueEntry, QueueRepository},
};

use crate::services::{errors::MatchmakingServiceError, room_service::RoomService};

/// Disconnect snapshots older than this are dropped instead of paired.
const MAX_DISCONNECTED_SECS: i64 = 3600;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairingOutcome {
    /// The bucket was closed while waiting for the first player.
    Idle,
    Paired { room_id: String },
    Dropped { player_id: String },
    Requeued { player_id: String },
}

#[derive(Clone)]
pub struct MatchmakingService {
    players: PlayerRepository,
    queue: QueueRepository,
    rooms: RoomService,
    pair_timeout: Duration,
}

impl MatchmakingService {
    pub fn new(
        players: PlayerRepository,
        queue: QueueRepository,
        rooms: RoomService,
        pair_timeout: Duration,
    ) -> Self {
        MatchmakingService {
            players,
            queue,
            rooms,
            pair_timeout,
        }
    }

    /// Blocks until one pairing attempt on the `bet` bucket is settled.
    pub async fn pair_once(&self, bet: f64) -> Result<PairingOutcome, MatchmakingServiceError> {
        let Some(first) = self.queue.pop(bet, None).await? else {
            return Ok(PairingOutcome::Idle);
        };

        let Some(player1) = self.resolve_eligible(&first, bet).await? else {
            self.queue.decrement_count(bet).await?;
            return Ok(PairingOutcome::Dropped {
                player_id: first.player_id,
            });
        };

        let second = match self.queue.pop(bet, Some(self.pair_timeout)).await {
            Ok(Some(second)) => second,
            Ok(None) => {
                debug!(player_id = %first.player_id, bet, "No opponent yet, back to the queue");
                self.queue.push(player1.player()).await?;
                return Ok(PairingOutcome::Requeued {
                    player_id: first.player_id,
                });
            }
            Err(e) => {
                warn!(player_id = %first.player_id, bet, "Opponent wait failed: {}", e);
                self.queue.push(player1.player()).await?;
                return Err(e.into());
            }
        };

        let player2 = match self.resolve_eligible(&second, bet).await {
            Ok(player2) => player2,
            Err(e) => {
                self.queue.push(player1.player()).await?;
                return Err(e);
            }
        };
        let player2 = match player2 {
            Some(player2) if !player1.player().is_same_identity(player2.player()) => player2,
            other => {
                if other.is_some() {
                    warn!(
                        player_id = %second.player_id,
                        "Refusing to pair a player with their own identity"
                    );
                }
                self.queue.push(player1.player()).await?;
                self.queue.decrement_count(bet).await?;
                return Ok(PairingOutcome::Requeued {
                    player_id: first.player_id,
                });
            }
        };

        let room = self.rooms.handle_queue_paired(player1, player2, bet).await?;
        Ok(PairingOutcome::Paired { room_id: room.id })
    }

    /// The current record behind a queue entry, if it may still be paired.
    async fn resolve_eligible(
        &self,
        entry: &QueueEntry,
        bet: f64,
    ) -> Result<Option<ResolvedPlayer>, MatchmakingServiceError> {
        let Some(resolved) = self.players.resolve(&entry.player_id).await? else {
            info!(player_id = %entry.player_id, "Queued player no longer exists");
            return Ok(None);
        };

        if let ResolvedPlayer::Disconnected(player) = &resolved {
            let offline_for = Utc::now().timestamp() - player.disconnected_at;
            if offline_for > MAX_DISCONNECTED_SECS {
                info!(player_id = %player.id, offline_for, "Dropping stale disconnected player");
                self.players.delete_disconnected_in_queue(&player.id).await?;
                return Ok(None);
            }
        }

        if !resolved.player().is_eligible_for_queue(bet) {
            info!(
                player_id = %entry.player_id,
                status = %resolved.player().status,
                "Queued player is no longer waiting for this bet"
            );
            return Ok(None);
        }

        Ok(Some(resolved))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::room_service::tests::{fixture, queued_player, Fixture};
    use shared::models::presence::PlayerStatus;
    use async_trait::async_trait;
    use shared::repositories::errors::repository_errors::RepositoryError;
    use shared::repositories::errors::store_errors::StoreError;
    use shared::repositories::memory_store::InMemoryStore;
    use shared::repositories::store::{Store, Subscription};
    use std::sync::Arc;

    /// Delegates to the in-memory store but loses every timed wait, like a
    /// connection dropping mid-BLPOP.
    struct DroppingWaitStore {
        inner: Arc<InMemoryStore>,
    }

    #[async_trait]
    impl Store for DroppingWaitStore {
        async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError> {
            self.inner.set(key, value, ttl).await
        }

        async fn delete(&self, key: &str) -> Result<bool, StoreError> {
            self.inner.delete(key).await
        }

        async fn push_back(&self, list: &str, value: &str) -> Result<(), StoreError> {
            self.inner.push_back(list, value).await
        }

        async fn blocking_pop_front(
            &self,
            list: &str,
            timeout: Option<Duration>,
        ) -> Result<Option<String>, StoreError> {
            if timeout.is_some() {
                return Err(StoreError::Connection("timed out".to_string()));
            }
            self.inner.blocking_pop_front(list, timeout).await
        }

        async fn remove_from_list(&self, list: &str, value: &str) -> Result<i64, StoreError> {
            self.inner.remove_from_list(list, value).await
        }

        async fn incr(&self, key: &str) -> Result<i64, StoreError> {
            self.inner.incr(key).await
        }

        async fn decr(&self, key: &str) -> Result<i64, StoreError> {
            self.inner.decr(key).await
        }

        async fn publish(&self, topic: &str, payload: &str) -> Result<(), StoreError> {
            self.inner.publish(topic, payload).await
        }

        async fn subscribe(&self, topics: &[String]) -> Result<Subscription, StoreError> {
            self.inner.subscribe(topics).await
        }
    }

    const BUCKET: &str = "queue:damas:5.000000";
    const COUNT: &str = "queue_count:damas:room:5.000000";

    fn matchmaking(fx: &Fixture) -> MatchmakingService {
        MatchmakingService::new(
            PlayerRepository::new(fx.store.clone()),
            QueueRepository::new(fx.store.clone(), "damas"),
            fx.service.clone(),
            Duration::from_secs(10),
        )
    }

    async fn enqueue(fx: &Fixture, player: &shared::models::player::Player) {
        QueueRepository::new(fx.store.clone(), "damas")
            .push(player)
            .await
            .unwrap();
        fx.store.incr(COUNT).await.unwrap();
    }

    #[tokio::test]
    async fn test_pairs_two_waiting_players() {
        let fx = fixture().await;
        for id in ["p1", "p2"] {
            let player = queued_player(id);
            fx.players.save(&player).await.unwrap();
            enqueue(&fx, &player).await;
        }

        let outcome = matchmaking(&fx).pair_once(5.0).await.unwrap();

        let PairingOutcome::Paired { room_id } = outcome else {
            panic!("expected a pairing, got {:?}", outcome);
        };
        assert!(fx.rooms.get(&room_id).await.unwrap().is_some());
        assert!(fx.store.list(BUCKET).is_empty());
        assert_eq!(fx.store.get(COUNT).await.unwrap().as_deref(), Some("0"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_lone_player_is_requeued_after_timeout() {
        let fx = fixture().await;
        let player = queued_player("p1");
        fx.players.save(&player).await.unwrap();
        enqueue(&fx, &player).await;

        let outcome = matchmaking(&fx).pair_once(5.0).await.unwrap();

        assert_eq!(
            outcome,
            PairingOutcome::Requeued {
                player_id: "p1".to_string()
            }
        );
        assert_eq!(fx.store.list(BUCKET).len(), 1);
        assert_eq!(fx.store.get(COUNT).await.unwrap().as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn test_stale_entry_is_dropped() {
        let fx = fixture().await;
        let mut player = queued_player("p1");
        fx.players.save(&player).await.unwrap();
        enqueue(&fx, &player).await;
        // Left the queue without the entry being removed.
        player.status = PlayerStatus::Online;
        fx.players.update(&player).await.unwrap();

        let outcome = matchmaking(&fx).pair_once(5.0).await.unwrap();

        assert_eq!(
            outcome,
            PairingOutcome::Dropped {
                player_id: "p1".to_string()
            }
        );
        assert_eq!(fx.store.get(COUNT).await.unwrap().as_deref(), Some("0"));
    }

    #[tokio::test]
    async fn test_long_disconnected_player_is_dropped() {
        let fx = fixture().await;
        let mut player = queued_player("p1");
        player.disconnected_at = Utc::now().timestamp() - MAX_DISCONNECTED_SECS - 60;
        fx.players.save_disconnected_in_queue(&player).await.unwrap();
        enqueue(&fx, &player).await;

        let outcome = matchmaking(&fx).pair_once(5.0).await.unwrap();

        assert!(matches!(outcome, PairingOutcome::Dropped { .. }));
        assert!(fx
            .players
            .get_disconnected_in_queue("p1")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_recently_disconnected_player_is_paired() {
        let fx = fixture().await;
        let mut offline = queued_player("p1");
        offline.mark_disconnected();
        fx.players.save_disconnected_in_queue(&offline).await.unwrap();
        enqueue(&fx, &offline).await;
        let online = queued_player("p2");
        fx.players.save(&online).await.unwrap();
        enqueue(&fx, &online).await;

        let outcome = matchmaking(&fx).pair_once(5.0).await.unwrap();

        assert!(matches!(outcome, PairingOutcome::Paired { .. }));
        let snapshot = fx
            .players
            .get_disconnected_in_queue("p1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(snapshot.status, PlayerStatus::InRoom);
    }

    #[tokio::test]
    async fn test_same_identity_is_not_paired() {
        let fx = fixture().await;
        let first = queued_player("p1");
        let mut twin = queued_player("p2");
        twin.name = first.name.clone();
        for player in [&first, &twin] {
            fx.players.save(player).await.unwrap();
            enqueue(&fx, player).await;
        }

        let outcome = matchmaking(&fx).pair_once(5.0).await.unwrap();

        assert_eq!(
            outcome,
            PairingOutcome::Requeued {
                player_id: "p1".to_string()
            }
        );
        let bucket = fx.store.list(BUCKET);
        assert_eq!(bucket.len(), 1);
        assert!(bucket[0].contains("\"p1\""));
        assert_eq!(fx.store.get(COUNT).await.unwrap().as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn test_pairing_waits_for_second_player() {
        let fx = fixture().await;
        let first = queued_player("p1");
        fx.players.save(&first).await.unwrap();
        enqueue(&fx, &first).await;

        let service = matchmaking(&fx);
        let worker = tokio::spawn(async move { service.pair_once(5.0).await });

        let second = queued_player("p2");
        fx.players.save(&second).await.unwrap();
        let store: Arc<dyn Store> = fx.store.clone();
        QueueRepository::new(store, "damas").push(&second).await.unwrap();
        fx.store.incr(COUNT).await.unwrap();

        let outcome = worker.await.unwrap().unwrap();
        assert!(matches!(outcome, PairingOutcome::Paired { .. }));
    }

    #[tokio::test]
    async fn test_failed_opponent_wait_requeues_first_player() {
        let fx = fixture().await;
        let player = queued_player("p1");
        fx.players.save(&player).await.unwrap();
        enqueue(&fx, &player).await;
        let store: Arc<dyn Store> = Arc::new(DroppingWaitStore {
            inner: fx.store.clone(),
        });
        let service = MatchmakingService::new(
            PlayerRepository::new(store.clone()),
            QueueRepository::new(store, "damas"),
            fx.service.clone(),
            Duration::from_secs(10),
        );

        let result = service.pair_once(5.0).await;

        assert!(matches!(
            result,
            Err(MatchmakingServiceError::RepositoryError(RepositoryError::Store(
                StoreError::Connection(_)
            )))
        ));
        let bucket = fx.store.list(BUCKET);
        assert_eq!(bucket.len(), 1);
        assert!(bucket[0].contains("\"p1\""));
        assert_eq!(fx.store.get(COUNT).await.unwrap().as_deref(), Some("1"));
    }
}
