use serde::Deserialize;
use std::env;
use stockline_core::FulfillmentRules;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub fulfillment: FulfillmentRules,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,
}

fn default_max_connections() -> u32 { 5 }
fn default_acquire_timeout() -> u64 { 3 }

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Postgres,
    /// Demo catalog held in process; nothing survives a restart.
    Memory,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Optional per-environment overrides
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // Eg. `STOCKLINE__DATABASE__URL=postgres://...`
            .add_source(config::Environment::with_prefix("STOCKLINE").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn parse(toml: &str) -> Config {
        config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_defaults_fill_optional_sections() {
        let cfg = parse(
            r#"
            [server]
            port = 3000

            [database]
            url = "postgres://localhost/stockline"
            "#,
        );

        assert_eq!(cfg.database.max_connections, 5);
        assert_eq!(cfg.storage.backend, StorageBackend::Postgres);
        assert_eq!(cfg.fulfillment.payment_tolerance, Decimal::new(1, 2));
        assert_eq!(cfg.fulfillment.event_buffer, 100);
    }

    #[test]
    fn test_memory_backend_and_tolerance_override() {
        let cfg = parse(
            r#"
            [server]
            port = 8080

            [database]
            url = "unused"

            [storage]
            backend = "memory"

            [fulfillment]
            payment_tolerance = 0.05
            "#,
        );

        assert_eq!(cfg.storage.backend, StorageBackend::Memory);
        assert_eq!(cfg.fulfillment.payment_tolerance, Decimal::new(5, 2));
    }
}
