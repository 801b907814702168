pub mod command_service;
pub mod errors;
