use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use shared::models::room::RoomSignal;
use shared::repositories::errors::store_errors::StoreError;
use shared::repositories::keys;
use shared::repositories::store::Subscription;

use crate::services::errors::RoomServiceError;
use crate::services::room_service::{RoomFlow, RoomService};

/// Countdown values at which both players get a `room_timer` update.
const ANNOUNCE_AT: [i64; 3] = [27, 10, 3];

/// One per open room: owns the countdown and serialises every signal
/// published on the room's topic.
pub struct ReadyCheckActor {
    service: RoomService,
    room_id: String,
    remaining: i64,
    subscription: Subscription,
}

impl ReadyCheckActor {
    /// Subscribes before returning so no signal published afterwards is lost.
    pub async fn start(
        service: RoomService,
        room_id: &str,
        countdown_secs: i64,
    ) -> Result<JoinHandle<()>, StoreError> {
        let subscription = service
            .store()
            .subscribe(&[keys::room_topic(room_id)])
            .await?;

        let actor = ReadyCheckActor {
            service,
            room_id: room_id.to_string(),
            remaining: countdown_secs,
            subscription,
        };
        Ok(tokio::spawn(actor.run()))
    }

    async fn run(mut self) {
        info!(room_id = %self.room_id, countdown = self.remaining, "Ready-check started");

        let mut ticker = interval(Duration::from_secs(1));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            let flow = tokio::select! {
                message = self.subscription.recv() => match message {
                    Some(message) => self.on_signal(&message.payload).await,
                    None => {
                        warn!(room_id = %self.room_id, "Room subscription closed");
                        RoomFlow::Close
                    }
                },
                _ = ticker.tick() => self.on_tick().await,
            };

            if flow == RoomFlow::Close {
                break;
            }
        }

        info!(room_id = %self.room_id, "Ready-check stopped");
    }

    async fn on_tick(&mut self) -> RoomFlow {
        self.remaining -= 1;

        if self.remaining <= 0 {
            info!(room_id = %self.room_id, "Ready-check timed out");
            return self.settle(self.service.handle_end_room(&self.room_id).await);
        }

        if ANNOUNCE_AT.contains(&self.remaining) {
            let result = self
                .service
                .broadcast_timer(&self.room_id, self.remaining)
                .await
                .map(|_| RoomFlow::Continue);
            return self.settle(result);
        }

        RoomFlow::Continue
    }

    async fn on_signal(&mut self, payload: &str) -> RoomFlow {
        let signal = match payload.parse::<RoomSignal>() {
            Ok(signal) => signal,
            Err(e) => {
                warn!(room_id = %self.room_id, "Ignoring room signal: {}", e);
                return RoomFlow::Continue;
            }
        };
        debug!(room_id = %self.room_id, signal = %signal, "Room signal");

        let result = match signal {
            RoomSignal::RoomEnd => self.service.handle_end_room(&self.room_id).await,
            // Collected stakes already moved the room on.
            RoomSignal::GameStart => Ok(RoomFlow::Close),
            RoomSignal::LeaveRoom(player_id) => {
                self.service
                    .handle_leave_room(&self.room_id, &player_id)
                    .await
            }
            RoomSignal::PlayerReady(player_id) => {
                self.service
                    .handle_player_ready(&self.room_id, &player_id)
                    .await
            }
            RoomSignal::PlayerUnready(player_id) => {
                self.service
                    .handle_player_unready(&self.room_id, &player_id)
                    .await
            }
            RoomSignal::PlayerReconnect(player_id) => {
                self.service
                    .handle_reconnect(&self.room_id, &player_id, self.remaining)
                    .await
            }
        };
        self.settle(result)
    }

    fn settle(&self, result: Result<RoomFlow, RoomServiceError>) -> RoomFlow {
        match result {
            Ok(flow) => flow,
            Err(RoomServiceError::RoomNotFound(_)) => {
                warn!(room_id = %self.room_id, "Room is gone");
                RoomFlow::Close
            }
            Err(e) => {
                error!(room_id = %self.room_id, "Room handler failed: {}", e);
                RoomFlow::Continue
            }
        }
    }
}
