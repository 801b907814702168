pub mod damas_service;
pub mod errors;
pub mod history_service;
pub mod notification_service;
pub mod wallet_service;
