use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::models::board::Board;
use crate::models::game::{GameEndReason, GamePlayer, Move};
use crate::models::player::OperatorIdentifier;
use crate::models::presence::PlayerStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Info,
    Invalid,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairedPayload {
    /// 0 black, 1 white.
    pub color: u8,
    pub opponent: String,
    pub room_id: String,
    pub winnings: f64,
    pub timer: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameStartPayload {
    pub game_id: String,
    pub board: Board,
    pub max_timer: i64,
    pub current_player_id: String,
    pub players: Vec<GamePlayer>,
    pub win_factor: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameOverPayload {
    pub reason: GameEndReason,
    pub winner: String,
    pub turns: u32,
    pub winnings: f64,
    /// Seconds.
    pub game_time: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueCountEntry {
    pub bet_value: f64,
    pub count: i64,
}

/// Everything the server pushes to a player, framed as `{"command", "value"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", content = "value", rename_all = "snake_case")]
pub enum ServerMessage {
    Message {
        message_type: MessageType,
        message: String,
    },
    QueueConfirmation(bool),
    Paired(PairedPayload),
    RoomTimer(String),
    OpponentReady {
        is_ready: bool,
    },
    OpponentLeftRoom(bool),
    RoomFailedReadyCheck(bool),
    BalanceUpdate(f64),
    GameStart(GameStartPayload),
    GameReconnect(GameStartPayload),
    GameTimer {
        player_timer: i64,
        current_player_id: String,
    },
    MovePiece(Move),
    InvalidMove {
        board: Board,
        reason: String,
    },
    TurnSwitch(String),
    OpponentDisconnectedGame(String),
    GameOver(GameOverPayload),
    GameInfo(Vec<QueueCountEntry>),
    Connected {
        player_id: String,
        player_name: String,
        money: f64,
        status: PlayerStatus,
    },
    Pong,
}

impl ServerMessage {
    pub fn info(message: &str) -> Self {
        ServerMessage::Message {
            message_type: MessageType::Info,
            message: message.to_string(),
        }
    }

    pub fn invalid(message: &str) -> Self {
        ServerMessage::Message {
            message_type: MessageType::Invalid,
            message: message.to_string(),
        }
    }

    pub fn error(message: &str) -> Self {
        ServerMessage::Message {
            message_type: MessageType::Error,
            message: message.to_string(),
        }
    }
}

/// Who a hub connection belongs to, sent along with `connect`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectPayload {
    pub name: String,
    pub currency: String,
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub operator_identifier: OperatorIdentifier,
}

/// Raw frame pushed by the transport hub onto `player_commands`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundCommand {
    pub player_id: String,
    pub command: String,
    #[serde(default)]
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", content = "value", rename_all = "snake_case")]
pub enum ClientCommand {
    Queue(f64),
    LeaveQueue,
    ReadyQueue(bool),
    LeaveRoom,
    LeaveGame,
    MovePiece(Move),
    GameInfo,
    Ping,
    Connect(ConnectPayload),
    Disconnect,
}

impl InboundCommand {
    pub fn new(player_id: &str, command: &str, value: Value) -> Self {
        InboundCommand {
            player_id: player_id.to_string(),
            command: command.to_string(),
            value,
        }
    }

    pub fn parse(&self) -> Result<ClientCommand, serde_json::Error> {
        let mut frame = Map::new();
        frame.insert("command".to_string(), Value::String(self.command.clone()));
        if !self.value.is_null() {
            frame.insert("value".to_string(), self.value.clone());
        }
        serde_json::from_value(Value::Object(frame))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_server_message_framing() {
        let msg = ServerMessage::QueueConfirmation(true);
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({"command": "queue_confirmation", "value": true})
        );

        let msg = ServerMessage::OpponentReady { is_ready: false };
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({"command": "opponent_ready", "value": {"is_ready": false}})
        );

        let msg = ServerMessage::invalid("nope");
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({"command": "message", "value": {"message_type": "invalid", "message": "nope"}})
        );
    }

    #[test]
    fn test_pong_has_no_value() {
        let value = serde_json::to_value(ServerMessage::Pong).unwrap();
        assert_eq!(value, json!({"command": "pong"}));
    }

    #[test]
    fn test_parse_inbound_commands() {
        let queue = InboundCommand::new("p1", "queue", json!(5.0));
        assert_eq!(queue.parse().unwrap(), ClientCommand::Queue(5.0));

        let ready = InboundCommand::new("p1", "ready_queue", json!(true));
        assert_eq!(ready.parse().unwrap(), ClientCommand::ReadyQueue(true));

        let leave = InboundCommand::new("p1", "leave_room", Value::Null);
        assert_eq!(leave.parse().unwrap(), ClientCommand::LeaveRoom);

        let mv = InboundCommand::new(
            "p1",
            "move_piece",
            json!({"player_id": "p1", "piece_id": "x", "from": "C3", "to": "D4", "is_capture": false}),
        );
        match mv.parse().unwrap() {
            ClientCommand::MovePiece(m) => {
                assert_eq!(m.from, "C3");
                assert!(!m.is_kinged);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(InboundCommand::new("p1", "fly", Value::Null).parse().is_err());
        assert!(InboundCommand::new("p1", "queue", json!("five")).parse().is_err());
    }

    #[test]
    fn test_inbound_frame_without_value() {
        let frame: InboundCommand =
            serde_json::from_str(r#"{"player_id": "p1", "command": "ping"}"#).unwrap();
        assert_eq!(frame.parse().unwrap(), ClientCommand::Ping);
    }
}
