use serde::{Deserialize, Serialize};

/// Where a player currently is in the queue -> room -> game pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlayerStatus {
    Offline,
    Online,
    InQueue,
    InRoom,
    InRoomReady,
    InGame,
}

impl PlayerStatus {
    pub const ALL: [PlayerStatus; 6] = [
        PlayerStatus::Offline,
        PlayerStatus::Online,
        PlayerStatus::InQueue,
        PlayerStatus::InRoom,
        PlayerStatus::InRoomReady,
        PlayerStatus::InGame,
    ];

    /// Only the edges listed here are legal; a self-transition never is.
    pub fn can_transition_to(self, next: PlayerStatus) -> bool {
        use PlayerStatus::*;

        matches!(
            (self, next),
            (Offline, Online)
                | (Online, Offline)
                | (Online, InQueue)
                | (InQueue, Online)
                | (InQueue, InRoom)
                | (InRoom, Online)
                | (InRoom, InRoomReady)
                | (InRoomReady, Online)
                | (InRoomReady, InRoom)
                | (InRoomReady, InGame)
                | (InGame, Online)
                | (InGame, Offline)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PlayerStatus::Offline => "OFFLINE",
            PlayerStatus::Online => "ONLINE",
            PlayerStatus::InQueue => "IN_QUEUE",
            PlayerStatus::InRoom => "IN_ROOM",
            PlayerStatus::InRoomReady => "IN_ROOM_READY",
            PlayerStatus::InGame => "IN_GAME",
        }
    }
}

impl std::fmt::Display for PlayerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenceError {
    InvalidTransition {
        from: PlayerStatus,
        to: PlayerStatus,
    },
}

impl std::fmt::Display for PresenceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PresenceError::InvalidTransition { from, to } => {
                write!(f, "Invalid status transition from {} to {}", from, to)
            }
        }
    }
}

impl std::error::Error for PresenceError {}

/// Moves `current` to `next` if the edge exists. The caller persists the result.
pub fn transition(current: &mut PlayerStatus, next: PlayerStatus) -> Result<(), PresenceError> {
    if !current.can_transition_to(next) {
        return Err(PresenceError::InvalidTransition {
            from: *current,
            to: next,
        });
    }
    *current = next;
    Ok(())
}
