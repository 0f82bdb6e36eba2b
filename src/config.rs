//! Process configuration, read from the environment (and `.env` via dotenvy).

use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use sea_orm::sqlx::postgres::PgConnectOptions;

use crate::error::ConfigError;

/// Environment variable names
pub mod vars {
    pub const APP_ENV: &str = "APP_ENV";
    pub const HTTP_ADDR: &str = "HTTP_ADDR";
    pub const POSTGRES_HOST: &str = "POSTGRES_HOST";
    pub const POSTGRES_PORT: &str = "POSTGRES_PORT";
    pub const POSTGRES_USER: &str = "POSTGRES_USER";
    pub const POSTGRES_PASSWORD: &str = "POSTGRES_PASSWORD";
    pub const POSTGRES_DB: &str = "POSTGRES_DB";
    pub const POSTGRES_MAINTENANCE_DB: &str = "POSTGRES_MAINTENANCE_DB";
    pub const ORDER_FEED_URL: &str = "ORDER_FEED_URL";
    pub const ORDER_FEED_TOPIC: &str = "ORDER_FEED_TOPIC";
    pub const ORDER_FEED_RECONNECT_SECS: &str = "ORDER_FEED_RECONNECT_SECS";
    pub const INGEST_BUFFER: &str = "INGEST_BUFFER";
}

const DEFAULT_HTTP_PORT: u16 = 8080;
const DEFAULT_POSTGRES_PORT: u16 = 5432;
const DEFAULT_RECONNECT_SECS: u64 = 5;
const DEFAULT_INGEST_BUFFER: usize = 1024;

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// local, dev or prod; controls the default log filter
    pub env: String,
    pub http_addr: SocketAddr,
    pub postgres: PostgresConfig,
    pub feed: OrderFeedConfig,
}

#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub name: String,
    /// Database used to issue `CREATE DATABASE` when `name` is missing
    pub maintenance_db: String,
}

impl PostgresConfig {
    pub fn connect_options(&self) -> PgConnectOptions {
        self.options_for(&self.name)
    }

    pub fn maintenance_connect_options(&self) -> PgConnectOptions {
        self.options_for(&self.maintenance_db)
    }

    /// Credentials are passed as discrete options, never spliced into a URL.
    fn options_for(&self, db: &str) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(db)
    }
}

#[derive(Debug, Clone)]
pub struct OrderFeedConfig {
    /// WebSocket endpoint; ingestion is disabled when unset
    pub url: Option<String>,
    pub topic: String,
    pub reconnect_delay: Duration,
    /// Capacity of the channel between the feed and the ingestion worker
    pub buffer: usize,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build the config from any variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let required = |name: &'static str| get(name).ok_or(ConfigError::Missing(name));

        let env = get(vars::APP_ENV).unwrap_or_else(|| "local".to_string());
        let http_addr = parse_or(vars::HTTP_ADDR, get(vars::HTTP_ADDR), || {
            SocketAddr::from(([0, 0, 0, 0], DEFAULT_HTTP_PORT))
        })?;

        let postgres = PostgresConfig {
            host: get(vars::POSTGRES_HOST).unwrap_or_else(|| "localhost".to_string()),
            port: parse_or(vars::POSTGRES_PORT, get(vars::POSTGRES_PORT), || {
                DEFAULT_POSTGRES_PORT
            })?,
            user: required(vars::POSTGRES_USER)?,
            password: required(vars::POSTGRES_PASSWORD)?,
            name: get(vars::POSTGRES_DB).unwrap_or_else(|| "orders".to_string()),
            maintenance_db: get(vars::POSTGRES_MAINTENANCE_DB)
                .unwrap_or_else(|| "postgres".to_string()),
        };

        let reconnect_secs = parse_or(
            vars::ORDER_FEED_RECONNECT_SECS,
            get(vars::ORDER_FEED_RECONNECT_SECS),
            || DEFAULT_RECONNECT_SECS,
        )?;
        let buffer = parse_or(vars::INGEST_BUFFER, get(vars::INGEST_BUFFER), || {
            DEFAULT_INGEST_BUFFER
        })?;
        if buffer == 0 {
            return Err(ConfigError::Invalid {
                name: vars::INGEST_BUFFER,
                value: "0".to_string(),
            });
        }

        let feed = OrderFeedConfig {
            url: get(vars::ORDER_FEED_URL),
            topic: get(vars::ORDER_FEED_TOPIC).unwrap_or_else(|| "orders".to_string()),
            reconnect_delay: Duration::from_secs(reconnect_secs),
            buffer,
        };

        Ok(Self {
            env,
            http_addr,
            postgres,
            feed,
        })
    }

    /// Log filter used when `RUST_LOG` is unset
    pub const LOCAL_LOG_FILTER: &'static str = "info,order_service=debug";
    pub const DEPLOYED_LOG_FILTER: &'static str = "info,order_service=info";

    pub fn is_local(&self) -> bool {
        self.env == "local"
    }

    pub fn default_log_filter(&self) -> &'static str {
        if self.is_local() {
            Self::LOCAL_LOG_FILTER
        } else {
            Self::DEPLOYED_LOG_FILTER
        }
    }
}

fn parse_or<T, D>(name: &'static str, value: Option<String>, default: D) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    D: FnOnce() -> T,
{
    match value {
        Some(v) => parse_value(name, v),
        None => Ok(default()),
    }
}

fn parse_value<T: std::str::FromStr>(name: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Invalid { name, value })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn test_defaults_with_required_credentials() {
        let config = AppConfig::from_lookup(lookup(&[
            (vars::POSTGRES_USER, "orders_user"),
            (vars::POSTGRES_PASSWORD, "secret"),
        ]))
        .unwrap();

        assert_eq!(config.env, "local");
        assert!(config.is_local());
        assert_eq!(config.default_log_filter(), "info,order_service=debug");
        assert_eq!(config.http_addr.port(), 8080);
        let options = config.postgres.connect_options();
        assert_eq!(options.get_host(), "localhost");
        assert_eq!(options.get_port(), 5432);
        assert_eq!(options.get_username(), "orders_user");
        assert_eq!(options.get_database(), Some("orders"));
        assert_eq!(
            config.postgres.maintenance_connect_options().get_database(),
            Some("postgres")
        );
        assert!(config.feed.url.is_none());
        assert_eq!(config.feed.topic, "orders");
        assert_eq!(config.feed.reconnect_delay, Duration::from_secs(5));
        assert_eq!(config.feed.buffer, 1024);
    }

    #[test]
    fn test_missing_password_is_rejected() {
        let err = AppConfig::from_lookup(lookup(&[(vars::POSTGRES_USER, "u")])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing(vars::POSTGRES_PASSWORD)));
    }

    #[test]
    fn test_invalid_numbers_are_rejected() {
        let err = AppConfig::from_lookup(lookup(&[
            (vars::POSTGRES_USER, "u"),
            (vars::POSTGRES_PASSWORD, "p"),
            (vars::POSTGRES_PORT, "not-a-port"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: vars::POSTGRES_PORT, .. }));

        let err = AppConfig::from_lookup(lookup(&[
            (vars::POSTGRES_USER, "u"),
            (vars::POSTGRES_PASSWORD, "p"),
            (vars::INGEST_BUFFER, "0"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: vars::INGEST_BUFFER, .. }));
    }

    #[test]
    fn test_overrides() {
        let config = AppConfig::from_lookup(lookup(&[
            (vars::APP_ENV, "prod"),
            (vars::HTTP_ADDR, "127.0.0.1:9000"),
            (vars::POSTGRES_USER, "u"),
            (vars::POSTGRES_PASSWORD, "p"),
            (vars::POSTGRES_DB, "l0"),
            (vars::ORDER_FEED_URL, "ws://localhost:9092/stream"),
            (vars::ORDER_FEED_TOPIC, "orders-v2"),
        ]))
        .unwrap();

        assert!(!config.is_local());
        assert_eq!(config.default_log_filter(), "info,order_service=info");
        assert_eq!(config.http_addr.to_string(), "127.0.0.1:9000");
        assert_eq!(config.postgres.name, "l0");
        assert_eq!(config.feed.url.as_deref(), Some("ws://localhost:9092/stream"));
        assert_eq!(config.feed.topic, "orders-v2");
    }

    #[test]
    fn test_reserved_characters_in_credentials_keep_host_and_database() {
        let config = AppConfig::from_lookup(lookup(&[
            (vars::POSTGRES_HOST, "db.internal"),
            (vars::POSTGRES_USER, "ops:admin@corp"),
            (vars::POSTGRES_PASSWORD, "p@ss/w#rd"),
        ]))
        .unwrap();

        let options = config.postgres.connect_options();
        assert_eq!(options.get_host(), "db.internal");
        assert_eq!(options.get_port(), 5432);
        assert_eq!(options.get_username(), "ops:admin@corp");
        assert_eq!(options.get_database(), Some("orders"));
    }
}
