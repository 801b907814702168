pub mod board;
pub mod game;
pub mod messages;
pub mod player;
pub mod presence;
pub mod room;
pub mod session;
