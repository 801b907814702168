pub mod errors;
pub mod game_repository;
pub mod history_repository;
pub mod keys;
pub mod memory_store;
pub mod player_repository;
pub mod queue_repository;
pub mod redis_store;
pub mod room_repository;
pub mod session_repository;
pub mod store;
