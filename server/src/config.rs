//! Server configuration.

use std::time::Duration;

use tasa_engine::EngineConfig;

/// Main server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listen address.
    pub listen_addr: String,
    /// Listen port.
    pub listen_port: u16,
    /// Database URL.
    pub database_url: String,
    /// Connection pool size.
    pub max_db_connections: u32,
    /// Apply embedded migrations on startup.
    pub run_migrations: bool,
    /// Engine configuration, shared by every pair.
    pub engine: EngineConfig,
    /// Log level.
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0".to_string(),
            listen_port: 8080,
            database_url: "postgres://localhost/tasa".to_string(),
            max_db_connections: 5,
            run_migrations: true,
            engine: EngineConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(addr) = get("TASA_LISTEN_ADDR") {
            config.listen_addr = addr;
        }

        if let Some(port) = get("TASA_LISTEN_PORT").and_then(|p| p.parse().ok()) {
            config.listen_port = port;
        }

        if let Some(url) = get("DATABASE_URL") {
            config.database_url = url;
        }

        if let Some(max) = get("TASA_DB_MAX_CONNECTIONS").and_then(|m| m.parse().ok()) {
            config.max_db_connections = max;
        }

        if let Some(run) = get("TASA_RUN_MIGRATIONS").and_then(|r| r.parse().ok()) {
            config.run_migrations = run;
        }

        if let Some(secs) = get("TASA_FETCH_TIMEOUT_SECS").and_then(|s| s.parse().ok()) {
            config.engine.fetch_timeout = Duration::from_secs(secs);
        }

        if let Some(p) = get("TASA_CLEANUP_PROBABILITY").and_then(|p| p.parse().ok()) {
            config.engine.cleanup_probability = p;
        }

        if let Some(level) = get("LOG_LEVEL") {
            config.log_level = level;
        }

        config
    }

    /// Socket address string for the listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.listen_addr, self.listen_port)
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.listen_port == 0 {
            return Err("Listen port cannot be 0".to_string());
        }

        if self.database_url.is_empty() {
            return Err("Database URL cannot be empty".to_string());
        }

        if self.max_db_connections == 0 {
            return Err("Database pool needs at least one connection".to_string());
        }

        self.engine.validate()
    }
}
