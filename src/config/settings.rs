//! Application settings and configuration structures.

use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// Root configuration structure containing all application settings.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Server configuration (host, port)
    pub server: ServerSettings,

    /// Database configuration (PostgreSQL)
    pub database: DatabaseSettings,

    /// JWT verification settings
    pub jwt: JwtSettings,

    /// WebSocket transport configuration
    pub websocket: WebSocketSettings,

    /// Fan-out hub configuration
    pub hub: HubSettings,

    /// Log output configuration
    pub logging: LoggingSettings,

    /// Current environment (development, staging, production)
    pub environment: String,
}

/// Server binding configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    /// Host address to bind to (e.g., "0.0.0.0")
    pub host: String,

    /// Port number to listen on
    pub port: u16,
}

/// PostgreSQL database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    /// Database connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections to maintain
    pub min_connections: u32,

    /// Connection acquire timeout in seconds
    pub acquire_timeout: u64,
}

/// JWT verification configuration.
///
/// Tokens are issued by the upstream chat service; this service only verifies them.
#[derive(Debug, Clone, Deserialize)]
pub struct JwtSettings {
    /// Shared secret used to verify token signatures
    pub secret: String,
}

/// WebSocket transport configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct WebSocketSettings {
    /// Capacity of each connection's outbound mailbox
    pub mailbox_capacity: usize,

    /// Maximum inbound message size in bytes
    pub max_message_size: usize,

    /// Deadline for a single frame write, in seconds
    pub write_timeout_secs: u64,

    /// Peer is considered dead after this long without any inbound frame
    pub pong_timeout_secs: u64,

    /// Interval between keepalive pings; must be shorter than the pong timeout
    pub ping_interval_secs: u64,
}

/// Fan-out hub configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct HubSettings {
    /// Capacity of the shared inbound message queue
    pub inbound_queue_capacity: usize,

    /// Upper bound on a single persistence or membership call, in milliseconds
    pub collaborator_timeout_ms: u64,

    /// Page size used when resolving chat members
    pub members_page_limit: u32,

    /// Maximum number of persist/resolve pipelines running at once
    pub max_in_flight: usize,
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    pub format: LogFormat,
}

/// Minimum required length for JWT secret (256 bits = 32 bytes)
pub const MIN_JWT_SECRET_LENGTH: usize = 32;

impl Settings {
    /// Load settings from environment variables and configuration files.
    ///
    /// The loading order is:
    /// 1. config/default.toml (base configuration)
    /// 2. config/{RUN_ENV}.toml (environment-specific overrides)
    /// 3. Environment variables (highest priority)
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if configuration cannot be loaded or parsed,
    /// or if the loaded values fail [`Settings::validate`].
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        // Determine the running environment
        let environment = std::env::var("RUN_ENV").unwrap_or_else(|_| "development".into());

        let settings: Self = Config::builder()
            .set_default("environment", environment.clone())?
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("database.acquire_timeout", 30)?
            .set_default("websocket.mailbox_capacity", 256_i64)?
            .set_default("websocket.max_message_size", 4096_i64)?
            .set_default("websocket.write_timeout_secs", 10_i64)?
            .set_default("websocket.pong_timeout_secs", 60_i64)?
            .set_default("websocket.ping_interval_secs", 54_i64)?
            .set_default("hub.inbound_queue_capacity", 256_i64)?
            .set_default("hub.collaborator_timeout_ms", 5000_i64)?
            .set_default("hub.members_page_limit", 1000_i64)?
            .set_default("hub.max_in_flight", 64_i64)?
            .set_default("logging.format", "pretty")?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // APP__SERVER__PORT=8080 -> server.port = 8080
            .add_source(
                Environment::default()
                    .prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("server.host", std::env::var("SERVER_HOST").ok())?
            .set_override_option("server.port", std::env::var("SERVER_PORT").ok())?
            .set_override_option("database.url", std::env::var("DATABASE_URL").ok())?
            .set_override_option("jwt.secret", std::env::var("JWT_SECRET").ok())?
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    /// Reject configurations the service cannot run safely with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt.secret.len() < MIN_JWT_SECRET_LENGTH {
            return Err(ConfigError::Message(format!(
                "JWT secret must be at least {} characters for security. Current length: {}",
                MIN_JWT_SECRET_LENGTH,
                self.jwt.secret.len()
            )));
        }

        if self.websocket.ping_interval_secs >= self.websocket.pong_timeout_secs {
            return Err(ConfigError::Message(format!(
                "websocket.ping_interval_secs ({}) must be less than websocket.pong_timeout_secs ({})",
                self.websocket.ping_interval_secs, self.websocket.pong_timeout_secs
            )));
        }

        let zero_durations = [
            ("websocket.ping_interval_secs", self.websocket.ping_interval_secs),
            ("websocket.write_timeout_secs", self.websocket.write_timeout_secs),
            ("hub.collaborator_timeout_ms", self.hub.collaborator_timeout_ms),
        ];
        if let Some((key, _)) = zero_durations.iter().find(|(_, value)| *value == 0) {
            return Err(ConfigError::Message(format!("{} must be greater than zero", key)));
        }

        if self.websocket.mailbox_capacity == 0 {
            return Err(ConfigError::Message(
                "websocket.mailbox_capacity must be greater than zero".into(),
            ));
        }

        if self.hub.inbound_queue_capacity == 0 || self.hub.max_in_flight == 0 {
            return Err(ConfigError::Message(
                "hub.inbound_queue_capacity and hub.max_in_flight must be greater than zero".into(),
            ));
        }

        if self.hub.members_page_limit == 0 {
            return Err(ConfigError::Message(
                "hub.members_page_limit must be greater than zero".into(),
            ));
        }

        Ok(())
    }

    /// Get the full server address as a string.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl WebSocketSettings {
    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }

    pub fn pong_timeout(&self) -> Duration {
        Duration::from_secs(self.pong_timeout_secs)
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs)
    }
}

impl HubSettings {
    pub fn collaborator_timeout(&self) -> Duration {
        Duration::from_millis(self.collaborator_timeout_ms)
    }
}
