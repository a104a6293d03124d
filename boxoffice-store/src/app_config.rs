use boxoffice_shared::Masked;
use serde::Deserialize;
use std::env;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub broker: BrokerConfig,
    #[serde(default)]
    pub expiry: ExpiryConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,
    #[serde(default = "default_max_lifetime_secs")]
    pub max_lifetime_secs: u64,
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
    #[serde(default = "default_true")]
    pub run_migrations: bool,
}

fn default_max_connections() -> u32 { 25 }
fn default_min_connections() -> u32 { 5 }
fn default_acquire_timeout_secs() -> u64 { 3 }
fn default_max_lifetime_secs() -> u64 { 3600 }
fn default_idle_timeout_secs() -> u64 { 1800 }
fn default_true() -> bool { true }

impl DatabaseConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            acquire_timeout_secs: default_acquire_timeout_secs(),
            max_lifetime_secs: default_max_lifetime_secs(),
            idle_timeout_secs: default_idle_timeout_secs(),
            run_migrations: true,
        }
    }
}

/// AMQP connection settings. A non-empty `url` wins over the individual parts.
#[derive(Debug, Deserialize, Clone)]
pub struct BrokerConfig {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_broker_host")]
    pub host: String,
    #[serde(default = "default_broker_port")]
    pub port: u16,
    #[serde(default = "default_broker_user")]
    pub user: String,
    #[serde(default = "default_broker_password")]
    pub password: Masked<String>,
    #[serde(default = "default_vhost")]
    pub vhost: String,
    #[serde(default = "default_publish_timeout_ms")]
    pub publish_timeout_ms: u64,
    #[serde(default = "default_consumer_tag")]
    pub consumer_tag: String,
    #[serde(default = "default_prefetch")]
    pub prefetch: u16,
    #[serde(default = "default_reconnect_delay_secs")]
    pub reconnect_delay_secs: u64,
}

fn default_broker_host() -> String { "localhost".into() }
fn default_broker_port() -> u16 { 5672 }
fn default_broker_user() -> String { "guest".into() }
fn default_broker_password() -> Masked<String> { Masked::from("guest") }
fn default_vhost() -> String { "/".into() }
fn default_publish_timeout_ms() -> u64 { 5000 }
fn default_consumer_tag() -> String { "booking-expiry-worker".into() }
fn default_prefetch() -> u16 { 1 }
fn default_reconnect_delay_secs() -> u64 { 5 }

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            url: None,
            host: default_broker_host(),
            port: default_broker_port(),
            user: default_broker_user(),
            password: default_broker_password(),
            vhost: default_vhost(),
            publish_timeout_ms: default_publish_timeout_ms(),
            consumer_tag: default_consumer_tag(),
            prefetch: default_prefetch(),
            reconnect_delay_secs: default_reconnect_delay_secs(),
        }
    }
}

impl BrokerConfig {
    /// Connection URI. Contains the password, so never log it.
    pub fn url(&self) -> String {
        if let Some(url) = self.url.as_deref().filter(|u| !u.is_empty()) {
            return url.to_string();
        }

        let vhost = match self.vhost.trim_start_matches('/') {
            "" => "%2f".to_string(),
            name => name.to_string(),
        };

        format!(
            "amqp://{}:{}@{}:{}/{}",
            self.user,
            self.password.expose(),
            self.host,
            self.port,
            vhost
        )
    }

    pub fn publish_timeout(&self) -> Duration {
        Duration::from_millis(self.publish_timeout_ms)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExpiryConfig {
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    #[serde(default = "default_sweep_batch_size")]
    pub sweep_batch_size: i64,
}

fn default_sweep_interval_secs() -> u64 { 60 }
fn default_sweep_batch_size() -> i64 { 100 }

impl Default for ExpiryConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: default_sweep_interval_secs(),
            sweep_batch_size: default_sweep_batch_size(),
        }
    }
}

impl ExpiryConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
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
            // Eg. `BOXOFFICE__DATABASE__URL=postgres://...`
            .add_source(config::Environment::with_prefix("BOXOFFICE").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
