/// 환경 변수 설정
// region:    --- Imports
use crate::identity::RosterEntry;
use std::net::SocketAddr;
use thiserror::Error;

// endregion: --- Imports

const DEFAULT_ROSTER: &str = "sid:Sid:🦁:1111,rahul:Rahul:🐯:2222,anil:Anil:🦊:3333,bala:Bala:🐼:4444";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for `{field}`: {message}")]
    Invalid { field: &'static str, message: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    /// 없으면 인메모리 저장소 사용
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    /// 없으면 로컬 허브로 바로 전달
    pub kafka_brokers: Option<String>,
    pub events_topic: String,
    pub bind_addr: SocketAddr,
    pub lot_window_secs: i64,
    pub bid_extension_secs: i64,
    pub persist_retries: u32,
    /// 인메모리 모드에서 생성할 선수 수
    pub seed_players: i64,
    pub roster: Vec<RosterEntry>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Ok(Self {
            database_url: get("DATABASE_URL"),
            db_max_connections: parse_or(get("DB_MAX_CONNECTIONS"), "DB_MAX_CONNECTIONS", 5)?,
            kafka_brokers: get("KAFKA_BROKERS"),
            events_topic: get("EVENTS_TOPIC").unwrap_or_else(|| "auction-events".to_string()),
            bind_addr: parse_or(
                get("BIND_ADDR"),
                "BIND_ADDR",
                SocketAddr::from(([0, 0, 0, 0], 3000)),
            )?,
            lot_window_secs: positive(
                parse_or(get("LOT_WINDOW_SECS"), "LOT_WINDOW_SECS", 30)?,
                "LOT_WINDOW_SECS",
            )?,
            bid_extension_secs: parse_or(get("BID_EXTENSION_SECS"), "BID_EXTENSION_SECS", 10)?,
            persist_retries: positive(
                parse_or(get("PERSIST_RETRIES"), "PERSIST_RETRIES", 3)?,
                "PERSIST_RETRIES",
            )?,
            seed_players: parse_or(get("SEED_PLAYERS"), "SEED_PLAYERS", 120)?,
            roster: parse_roster(&get("USERS").unwrap_or_else(|| DEFAULT_ROSTER.to_string()))?,
        })
    }
}

fn parse_or<T>(raw: Option<String>, field: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            field,
            message: format!("{} ({})", value, e),
        }),
        None => Ok(default),
    }
}

fn positive<T>(value: T, field: &'static str) -> Result<T, ConfigError>
where
    T: PartialOrd + Default + std::fmt::Display,
{
    if value > T::default() {
        Ok(value)
    } else {
        Err(ConfigError::Invalid {
            field,
            message: format!("{} must be greater than zero", value),
        })
    }
}

/// `id:name:emoji:pin` 항목을 쉼표로 구분한 명단
pub fn parse_roster(raw: &str) -> Result<Vec<RosterEntry>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| {
            let parts: Vec<&str> = item.split(':').map(str::trim).collect();
            let &[id, name, emoji, pin] = parts.as_slice() else {
                return Err(ConfigError::Invalid {
                    field: "USERS",
                    message: format!("expected id:name:emoji:pin, got `{}`", item),
                });
            };
            RosterEntry::new(id, name, emoji, pin).map_err(|e| ConfigError::Invalid {
                field: "USERS",
                message: e.to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = config(&[]).unwrap();
        assert!(config.database_url.is_none());
        assert!(config.kafka_brokers.is_none());
        assert_eq!(config.events_topic, "auction-events");
        assert_eq!(config.bind_addr.port(), 3000);
        assert_eq!(config.lot_window_secs, 30);
        assert_eq!(config.bid_extension_secs, 10);
        assert_eq!(config.persist_retries, 3);
        assert_eq!(config.roster.len(), 4);
    }

    #[test]
    fn malformed_numbers_are_rejected() {
        let err = config(&[("PERSIST_RETRIES", "many")]).unwrap_err();
        assert!(err.to_string().contains("PERSIST_RETRIES"));
        assert!(config(&[("LOT_WINDOW_SECS", "0")]).is_err());
    }

    #[test]
    fn roster_entries_are_validated() {
        let roster = parse_roster("a:Ann:🐝:1234, b:Ben:🐙:5678").unwrap();
        assert_eq!(roster.len(), 2);
        assert_eq!(roster[1].name, "Ben");

        assert!(parse_roster("a:Ann:🐝").is_err());
        assert!(parse_roster("a:Ann:🐝:12345").is_err());
    }
}
