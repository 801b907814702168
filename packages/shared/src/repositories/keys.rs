//! Every key, list and topic name shared between the workers.

pub const PLAYER_COMMANDS: &str = "player_commands";
pub const LEAVE_ROOM: &str = "leave_room";

/// Seconds an in-queue disconnect snapshot survives.
pub const DISCONNECTED_IN_QUEUE_TTL_SECS: u64 = 7200;

pub fn bet_key(bet: f64) -> String {
    format!("{:.6}", bet)
}

pub fn player(player_id: &str) -> String {
    format!("players:{}", player_id)
}

pub fn room(room_id: &str) -> String {
    format!("room:{}", room_id)
}

pub fn game(game_id: &str) -> String {
    format!("games:{}", game_id)
}

/// Running clocks of a game, kept apart from the game record.
pub fn game_timers(game_id: &str) -> String {
    format!("games:{}:timers", game_id)
}

pub fn session(session_id: &str) -> String {
    format!("session:{}", session_id)
}

pub fn disconnected_in_queue(player_id: &str) -> String {
    format!("players_disconnected_in_queue:{}", player_id)
}

pub fn disconnected_in_game(session_id: &str) -> String {
    format!("players_disconnected:{}", session_id)
}

pub fn queue(variant: &str, bet: f64) -> String {
    format!("queue:{}:{}", variant, bet_key(bet))
}

pub fn queue_count(variant: &str, bet: f64) -> String {
    format!("queue_count:{}:room:{}", variant, bet_key(bet))
}

pub fn ready_queue(variant: &str) -> String {
    format!("ready_queue:{}", variant)
}

pub fn create_game(variant: &str) -> String {
    format!("create_game:{}", variant)
}

pub fn move_piece(variant: &str) -> String {
    format!("move_piece:{}", variant)
}

pub fn leave_game(variant: &str) -> String {
    format!("leave_game:{}", variant)
}

pub fn disconnect_game(variant: &str) -> String {
    format!("disconnect_game:{}", variant)
}

pub fn reconnect_game(variant: &str) -> String {
    format!("reconnect_game:{}", variant)
}

pub fn room_topic(room_id: &str) -> String {
    format!("roompubsub:{}", room_id)
}

pub fn game_stop_topic(game_id: &str) -> String {
    format!("game:{}:stop_timer", game_id)
}

pub fn game_switch_topic(game_id: &str) -> String {
    format!("game:{}:switch", game_id)
}

pub fn player_topic(player_id: &str) -> String {
    format!("player:{}", player_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bet_keys_use_six_decimals() {
        assert_eq!(queue("damas", 5.0), "queue:damas:5.000000");
        assert_eq!(queue("damas", 0.5), "queue:damas:0.500000");
        assert_eq!(queue_count("damas", 100.0), "queue_count:damas:room:100.000000");
    }

    #[test]
    fn test_topics() {
        assert_eq!(room_topic("r1"), "roompubsub:r1");
        assert_eq!(game_stop_topic("g1"), "game:g1:stop_timer");
        assert_eq!(game_switch_topic("g1"), "game:g1:switch");
        assert_eq!(player_topic("p1"), "player:p1");
    }
}
