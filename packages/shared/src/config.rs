use std::time::Duration;

use crate::models::game::TimerSetting;
use crate::repositories::history_repository::HistoryTables;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    Missing(String),
    Invalid { name: String, value: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Missing(name) => write!(f, "{} environment variable must be set", name),
            ConfigError::Invalid { name, value } => {
                write!(f, "Invalid value for {}: {}", name, value)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    Redis { url: String },
    Memory,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryBackend {
    DynamoDb(HistoryTables),
    Log,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub store: StoreBackend,
    pub history: HistoryBackend,
    /// Variant name used in every queue and list key.
    pub game_name: String,
    pub game_timer: i64,
    pub timer_setting: TimerSetting,
    pub pieces_in_match: i64,
    pub queue_pair_timeout: Duration,
    pub room_countdown_secs: i64,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let store = match lookup("STORE_BACKEND").as_deref().unwrap_or("redis") {
            "redis" => StoreBackend::Redis {
                url: required(&lookup, "REDIS_URL")?,
            },
            "memory" => StoreBackend::Memory,
            other => return Err(invalid("STORE_BACKEND", other)),
        };

        let history = match lookup("HISTORY_BACKEND").as_deref().unwrap_or("log") {
            "dynamodb" => HistoryBackend::DynamoDb(HistoryTables {
                games: required(&lookup, "GAME_HISTORY_TABLE")?,
                transactions: required(&lookup, "TRANSACTIONS_TABLE")?,
                sessions: required(&lookup, "SESSIONS_TABLE")?,
            }),
            "log" => HistoryBackend::Log,
            other => return Err(invalid("HISTORY_BACKEND", other)),
        };

        let timer_setting = match lookup("GAME_TIMER_SETTING") {
            Some(raw) => raw
                .parse::<TimerSetting>()
                .map_err(|_| invalid("GAME_TIMER_SETTING", &raw))?,
            None => TimerSetting::Cumulative,
        };

        Ok(AppConfig {
            store,
            history,
            game_name: lookup("GAME_NAME").unwrap_or_else(|| "damas".to_string()),
            game_timer: number(&lookup, "GAME_TIMER", 15)?,
            timer_setting,
            pieces_in_match: number(&lookup, "PIECES_IN_MATCH", 10)?,
            queue_pair_timeout: Duration::from_secs(
                number(&lookup, "QUEUE_PAIR_TIMEOUT_SECS", 10)? as u64,
            ),
            room_countdown_secs: number(&lookup, "ROOM_COUNTDOWN_SECS", 30)?,
        })
    }
}

fn invalid(name: &str, value: &str) -> ConfigError {
    ConfigError::Invalid {
        name: name.to_string(),
        value: value.to_string(),
    }
}

fn required<F>(lookup: &F, name: &str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| ConfigError::Missing(name.to_string()))
}

fn number<F>(lookup: &F, name: &str, default: i64) -> Result<i64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(raw) => match raw.parse::<i64>() {
            Ok(value) if value > 0 => Ok(value),
            _ => Err(invalid(name, &raw)),
        },
        None => Ok(default),
    }
}
