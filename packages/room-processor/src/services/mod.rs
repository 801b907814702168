pub mod errors;
pub mod matchmaking_service;
pub mod ready_check;
pub mod room_service;
