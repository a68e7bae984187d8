use findmyseat_core::Venue;
use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub venue: Venue,
    #[serde(default)]
    pub sweeper: SweeperConfig,
    #[serde(default)]
    pub broadcast: BroadcastConfig,
    pub seating: SeatingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    Redis,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub redis_url: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SweeperConfig {
    #[serde(default = "default_sweep_interval")]
    pub interval_seconds: u64,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self { interval_seconds: default_sweep_interval() }
    }
}

fn default_sweep_interval() -> u64 { 30 }

#[derive(Debug, Deserialize, Clone)]
pub struct BroadcastConfig {
    #[serde(default = "default_heartbeat")]
    pub heartbeat_seconds: u64,
    #[serde(default = "default_subscriber_buffer")]
    pub subscriber_buffer: usize,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            heartbeat_seconds: default_heartbeat(),
            subscriber_buffer: default_subscriber_buffer(),
        }
    }
}

fn default_heartbeat() -> u64 { 25 }
fn default_subscriber_buffer() -> usize { 64 }

/// Grid used to provision seats when the store holds none.
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct SeatingConfig {
    pub rows: u32,
    pub cols: u32,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Per-environment overrides are optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // Eg. `FINDMYSEAT_SERVER__PORT=8080` sets `server.port`
            .add_source(config::Environment::with_prefix("FINDMYSEAT").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_optional_sections() {
        let raw = r#"
            [server]
            port = 5000

            [store]
            backend = "memory"

            [auth]
            jwt_secret = "secret"

            [seating]
            rows = 4
            cols = 10
        "#;
        let config: Config = config::Config::builder()
            .add_source(config::File::from_str(raw, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.sweeper.interval_seconds, 30);
        assert_eq!(config.broadcast.heartbeat_seconds, 25);
        assert_eq!(config.broadcast.subscriber_buffer, 64);
        assert_eq!(config.venue, Venue::default());
    }

    #[test]
    fn test_venue_override() {
        let raw = r#"
            [server]
            port = 5000
            [store]
            backend = "redis"
            redis_url = "redis://127.0.0.1/"
            [auth]
            jwt_secret = "secret"
            [seating]
            rows = 1
            cols = 1
            [venue]
            latitude = 51.5
            longitude = -0.12
            radius_meters = 250.0
        "#;
        let config: Config = config::Config::builder()
            .add_source(config::File::from_str(raw, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.venue.radius_meters, 250.0);
        assert_eq!(config.store.redis_url.as_deref(), Some("redis://127.0.0.1/"));
    }
}
