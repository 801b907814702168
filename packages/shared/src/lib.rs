pub mod bootstrap;
pub mod config;
pub mod logging;
pub mod models;
pub mod repositories;
pub mod services;
