use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use shared::models::game::{Game, GameEndReason, TimerSetting};
use shared::repositories::errors::repository_errors::RepositoryError;
use shared::repositories::errors::store_errors::StoreError;
use shared::repositories::keys;
use shared::repositories::store::{StoreMessage, Subscription};

use crate::services::errors::GameServiceError;
use crate::services::game_service::GameService;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Clock {
    /// One countdown shared by whoever holds the turn.
    Reset { remaining: i64, base: i64 },
    /// A budget per player; only the active one drains.
    Cumulative { timers: [i64; 2] },
}

/// Per-game countdown. Listens on the game's stop and switch topics.
pub struct GameTimer {
    service: GameService,
    game_id: String,
    player_ids: [String; 2],
    active: usize,
    clock: Clock,
    stop_topic: String,
    subscription: Subscription,
}

impl GameTimer {
    pub async fn start(service: GameService, game: &Game) -> Result<JoinHandle<()>, StoreError> {
        let stop_topic = keys::game_stop_topic(&game.id);
        let subscription = service
            .store()
            .subscribe(&[stop_topic.clone(), keys::game_switch_topic(&game.id)])
            .await?;

        let clock = match game.timer_setting {
            TimerSetting::Reset => Clock::Reset {
                remaining: service.settings().base_timer,
                base: service.settings().base_timer,
            },
            TimerSetting::Cumulative => Clock::Cumulative {
                timers: [game.players[0].timer, game.players[1].timer],
            },
        };
        let player_ids = [game.players[0].id.clone(), game.players[1].id.clone()];
        let active = player_ids
            .iter()
            .position(|id| *id == game.current_player_id)
            .unwrap_or(0);

        let timer = GameTimer {
            service,
            game_id: game.id.clone(),
            player_ids,
            active,
            clock,
            stop_topic,
            subscription,
        };
        Ok(tokio::spawn(timer.run()))
    }

    async fn run(mut self) {
        info!(game_id = %self.game_id, "Game timer started");

        let mut ticker = interval(Duration::from_secs(1));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            let flow = tokio::select! {
                message = self.subscription.recv() => match message {
                    Some(message) => self.on_message(message),
                    None => {
                        warn!(game_id = %self.game_id, "Game subscription closed");
                        Flow::Stop
                    }
                },
                _ = ticker.tick() => self.on_tick().await,
            };

            if flow == Flow::Stop {
                break;
            }
        }

        info!(game_id = %self.game_id, "Game timer stopped");
    }

    fn on_message(&mut self, message: StoreMessage) -> Flow {
        if message.topic == self.stop_topic {
            return Flow::Stop;
        }

        self.active = match self.player_ids.iter().position(|id| *id == message.payload) {
            Some(index) => index,
            None => 1 - self.active,
        };
        if let Clock::Reset { remaining, base } = &mut self.clock {
            *remaining = *base;
        }
        debug!(game_id = %self.game_id, active = %self.player_ids[self.active], "Timer switched");
        Flow::Continue
    }

    async fn on_tick(&mut self) -> Flow {
        let active_id = self.player_ids[self.active].clone();

        match &mut self.clock {
            Clock::Reset { remaining, base } => {
                *remaining -= 1;
                let left = *remaining;
                if left <= 0 {
                    // The switch published by the turn advance flips `active`.
                    *remaining = *base;
                    info!(game_id = %self.game_id, player_id = %active_id, "Turn timed out");
                    return self.settle(self.service.advance_turn(&self.game_id).await.map(|_| ()));
                }
                if left % 2 == 0 {
                    self.service
                        .broadcast_timer(&self.player_ids, left, &active_id)
                        .await;
                }
                Flow::Continue
            }
            Clock::Cumulative { timers } => {
                timers[self.active] -= 1;
                let left = timers[self.active];
                self.service
                    .broadcast_timer(&self.player_ids, left, &active_id)
                    .await;

                if left <= 0 {
                    let winner = self.player_ids[1 - self.active].clone();
                    info!(game_id = %self.game_id, player_id = %active_id, "Player ran out of time");
                    let ended = self
                        .service
                        .handle_game_end(&self.game_id, GameEndReason::Timeout, &winner)
                        .await;
                    if let Err(e) = ended {
                        error!(game_id = %self.game_id, "Failed to end game on timeout: {}", e);
                    }
                    return Flow::Stop;
                }

                self.settle(
                    self.service
                        .persist_timer(&self.game_id, &active_id, left)
                        .await,
                )
            }
        }
    }

    fn settle(&self, result: Result<(), GameServiceError>) -> Flow {
        match result {
            Ok(()) => Flow::Continue,
            Err(GameServiceError::GameNotFound(_))
            | Err(GameServiceError::RepositoryError(RepositoryError::NotFound(_))) => {
                warn!(game_id = %self.game_id, "Game is gone");
                Flow::Stop
            }
            Err(e) => {
                error!(game_id = %self.game_id, "Timer update failed: {}", e);
                Flow::Continue
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::game_service::tests::{commands, fixture, piece_move, pos, seed_game};
    use shared::repositories::store::Store;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_cumulative_timeout_ends_game() {
        let fx = fixture(TimerSetting::Cumulative).await;
        let game = seed_game(&fx, None).await;
        let started = Instant::now();

        let handle = GameTimer::start(fx.service.clone(), &game).await.unwrap();
        handle.await.unwrap();

        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(151) && elapsed < Duration::from_secs(152));
        assert!(fx.games.get(&game.id).await.unwrap().is_none());
        let over = commands(&fx.store, "p1").pop().unwrap();
        assert_eq!(over["command"], "game_over");
        assert_eq!(over["value"]["reason"], "timeout");
        assert_eq!(over["value"]["winner"], "p2");
    }

    #[tokio::test(start_paused = true)]
    async fn test_switch_moves_the_draining_clock() {
        let fx = fixture(TimerSetting::Cumulative).await;
        let game = seed_game(&fx, None).await;
        let handle = GameTimer::start(fx.service.clone(), &game).await.unwrap();

        tokio::time::sleep(Duration::from_millis(5500)).await;
        fx.store
            .publish(&keys::game_switch_topic(&game.id), "p2")
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_secs(3)).await;

        let stored = fx.games.get(&game.id).await.unwrap().unwrap();
        assert_eq!(stored.players[0].timer, 146);
        assert_eq!(stored.players[1].timer, 148);

        fx.store
            .publish(&keys::game_stop_topic(&game.id), "stop")
            .await
            .unwrap();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_timeout_passes_the_turn() {
        let fx = fixture(TimerSetting::Reset).await;
        let game = seed_game(&fx, None).await;
        let handle = GameTimer::start(fx.service.clone(), &game).await.unwrap();

        tokio::time::sleep(Duration::from_millis(15500)).await;

        let stored = fx.games.get(&game.id).await.unwrap().unwrap();
        assert_eq!(stored.current_player_id, "p2");
        assert_eq!(stored.turn, 2);
        let timers: Vec<i64> = commands(&fx.store, "p1")
            .iter()
            .filter(|v| v["command"] == "game_timer")
            .filter_map(|v| v["value"]["player_timer"].as_i64())
            .collect();
        assert_eq!(timers, vec![14, 12, 10, 8, 6, 4, 2]);

        fx.store
            .publish(&keys::game_stop_topic(&game.id), "stop")
            .await
            .unwrap();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_switch_restarts_countdown() {
        let fx = fixture(TimerSetting::Reset).await;
        let game = seed_game(&fx, None).await;
        let handle = GameTimer::start(fx.service.clone(), &game).await.unwrap();

        tokio::time::sleep(Duration::from_millis(5500)).await;
        fx.store
            .publish(&keys::game_switch_topic(&game.id), "p2")
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;

        let timers: Vec<(i64, String)> = commands(&fx.store, "p1")
            .iter()
            .filter(|v| v["command"] == "game_timer")
            .filter_map(|v| {
                let left = v["value"]["player_timer"].as_i64()?;
                let current = v["value"]["current_player_id"].as_str()?;
                Some((left, current.to_string()))
            })
            .collect();
        assert_eq!(
            timers,
            vec![
                (14, "p1".to_string()),
                (12, "p1".to_string()),
                (10, "p1".to_string()),
                (14, "p2".to_string()),
            ]
        );

        fx.store
            .publish(&keys::game_stop_topic(&game.id), "stop")
            .await
            .unwrap();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_move_between_ticks_survives_clock_writes() {
        let fx = fixture(TimerSetting::Cumulative).await;
        let game = seed_game(&fx, None).await;
        let handle = GameTimer::start(fx.service.clone(), &game).await.unwrap();

        tokio::time::sleep(Duration::from_millis(2500)).await;
        fx.service
            .process_move(piece_move(&game, "p1", "C2", "D3", false))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_secs(3)).await;

        let stored = fx.games.get(&game.id).await.unwrap().unwrap();
        assert!(stored.board.get(pos("D3")).is_some());
        assert!(stored.board.get(pos("C2")).is_none());
        assert_eq!(stored.current_player_id, "p2");
        assert_eq!(stored.turn, 2);
        assert_eq!(stored.players[0].timer, 149);
        assert_eq!(stored.players[1].timer, 148);

        fx.store
            .publish(&keys::game_stop_topic(&game.id), "stop")
            .await
            .unwrap();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_stops_when_game_disappears() {
        let fx = fixture(TimerSetting::Cumulative).await;
        let game = seed_game(&fx, None).await;
        let handle = GameTimer::start(fx.service.clone(), &game).await.unwrap();

        fx.games.remove(&game.id).await.unwrap();
        handle.await.unwrap();

        assert!(fx.history.games.lock().unwrap().is_empty());
    }
}
