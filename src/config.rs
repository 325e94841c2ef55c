//! Server configuration.
//!
//! Two layers: `BUCKETCAST_*` environment variables (with defaults), then an
//! optional TOML file named by `BUCKETCAST_CONFIG` whose present keys
//! override.

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::startup::StartupSync;

/// Environment variable naming the TOML override file.
pub const CONFIG_PATH_ENV: &str = "BUCKETCAST_CONFIG";

const DEFAULT_QUEUE_ID: &str = "arn:minio:sqs::bucketcast:mqtt";
const DEFAULT_BROKER_HOST: &str = "localhost";
const DEFAULT_BROKER_PORT: u16 = 1883;
const DEFAULT_CLIENT_ID: &str = "bucketcast";
const DEFAULT_BASE_TOPIC: &str = "bucketcast";
const DEFAULT_QOS: u8 = 1;
const DEFAULT_KEEP_ALIVE_SECS: u64 = 30;
const DEFAULT_RECONNECT_DELAY_MS: u64 = 1000;
const DEFAULT_PUBLISH_TIMEOUT_MS: u64 = 5000;
const DEFAULT_WORKERS: usize = 4;
const DEFAULT_QUEUE_CAPACITY: usize = 1024;
const DEFAULT_ADMIN_PORT: u16 = 50051;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value '{value}' for {key}: {reason}")]
    Invalid {
        key: String,
        value: String,
        reason: String,
    },

    #[error("Failed to read config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

fn invalid(key: &str, value: impl ToString, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.into(),
    }
}

/// MQTT connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MqttConfig {
    /// Broker host name or address.
    pub broker_host: String,
    /// Broker TCP port.
    pub broker_port: u16,
    /// Client id prefix; `-recv` and `-send` are appended.
    pub client_id: String,
    /// Inbound topic, also the prefix of every outbound topic.
    pub base_topic: String,
    /// QoS for subscribe and publish (0, 1 or 2).
    pub qos: u8,
    /// MQTT keep-alive interval.
    pub keep_alive_secs: u64,
    /// Delay before polling again after a connection error.
    pub reconnect_delay_ms: u64,
    /// Bound on a single publish.
    pub publish_timeout_ms: u64,
}

impl MqttConfig {
    /// Keep-alive as a duration.
    #[must_use]
    pub const fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }

    /// Reconnect delay as a duration.
    #[must_use]
    pub const fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    /// Publish timeout as a duration.
    #[must_use]
    pub const fn publish_timeout(&self) -> Duration {
        Duration::from_millis(self.publish_timeout_ms)
    }
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            broker_host: DEFAULT_BROKER_HOST.to_string(),
            broker_port: DEFAULT_BROKER_PORT,
            client_id: DEFAULT_CLIENT_ID.to_string(),
            base_topic: DEFAULT_BASE_TOPIC.to_string(),
            qos: DEFAULT_QOS,
            keep_alive_secs: DEFAULT_KEEP_ALIVE_SECS,
            reconnect_delay_ms: DEFAULT_RECONNECT_DELAY_MS,
            publish_timeout_ms: DEFAULT_PUBLISH_TIMEOUT_MS,
        }
    }
}

/// Router worker pool settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouterSettings {
    /// Worker threads consuming inbound payloads.
    pub workers: usize,
    /// Bound of the inbound payload queue.
    pub queue_capacity: usize,
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

/// Full server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Queue id written into remote notification entries.
    pub queue_id: String,
    /// MQTT settings.
    pub mqtt: MqttConfig,
    /// Router worker pool.
    pub router: RouterSettings,
    /// gRPC admin listener.
    pub admin_bind: SocketAddr,
    /// Buckets seeded into the embedded backend.
    pub buckets: Vec<String>,
    /// Startup sync policy.
    pub startup: StartupSync,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            queue_id: DEFAULT_QUEUE_ID.to_string(),
            mqtt: MqttConfig::default(),
            router: RouterSettings::default(),
            admin_bind: SocketAddr::from(([0, 0, 0, 0], DEFAULT_ADMIN_PORT)),
            buckets: Vec::new(),
            startup: StartupSync::default(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigOverride {
    queue_id: Option<String>,
    admin_bind: Option<String>,
    buckets: Option<Vec<String>>,
    #[serde(default)]
    mqtt: MqttOverride,
    #[serde(default)]
    router: RouterOverride,
    #[serde(default)]
    startup: StartupOverride,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct MqttOverride {
    broker_host: Option<String>,
    broker_port: Option<u16>,
    client_id: Option<String>,
    base_topic: Option<String>,
    qos: Option<u8>,
    keep_alive_secs: Option<u64>,
    reconnect_delay_ms: Option<u64>,
    publish_timeout_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RouterOverride {
    workers: Option<usize>,
    queue_capacity: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct StartupOverride {
    export: Option<bool>,
    export_clear: Option<bool>,
    import: Option<bool>,
    import_clear: Option<bool>,
    halt_on_error: Option<bool>,
}

fn parse_flag(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(invalid(key, value, "expected a boolean")),
    }
}

fn parse_num<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| invalid(key, value, e.to_string()))
}

fn parse_bind(key: &str, value: &str) -> Result<SocketAddr, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|e: std::net::AddrParseError| invalid(key, value, e.to_string()))
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

impl ServerConfig {
    /// Build a configuration from a variable lookup, falling back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = lookup("BUCKETCAST_QUEUE_ID") {
            config.queue_id = v;
        }
        if let Some(v) = lookup("BUCKETCAST_ADMIN_BIND") {
            config.admin_bind = parse_bind("BUCKETCAST_ADMIN_BIND", &v)?;
        }
        if let Some(v) = lookup("BUCKETCAST_BUCKETS") {
            config.buckets = split_list(&v);
        }

        let mqtt = &mut config.mqtt;
        if let Some(v) = lookup("BUCKETCAST_MQTT_HOST") {
            mqtt.broker_host = v;
        }
        if let Some(v) = lookup("BUCKETCAST_MQTT_PORT") {
            mqtt.broker_port = parse_num("BUCKETCAST_MQTT_PORT", &v)?;
        }
        if let Some(v) = lookup("BUCKETCAST_MQTT_CLIENT_ID") {
            mqtt.client_id = v;
        }
        if let Some(v) = lookup("BUCKETCAST_BASE_TOPIC") {
            mqtt.base_topic = v;
        }
        if let Some(v) = lookup("BUCKETCAST_MQTT_QOS") {
            mqtt.qos = parse_num("BUCKETCAST_MQTT_QOS", &v)?;
        }
        if let Some(v) = lookup("BUCKETCAST_MQTT_KEEP_ALIVE_SECS") {
            mqtt.keep_alive_secs = parse_num("BUCKETCAST_MQTT_KEEP_ALIVE_SECS", &v)?;
        }
        if let Some(v) = lookup("BUCKETCAST_RECONNECT_DELAY_MS") {
            mqtt.reconnect_delay_ms = parse_num("BUCKETCAST_RECONNECT_DELAY_MS", &v)?;
        }
        if let Some(v) = lookup("BUCKETCAST_PUBLISH_TIMEOUT_MS") {
            mqtt.publish_timeout_ms = parse_num("BUCKETCAST_PUBLISH_TIMEOUT_MS", &v)?;
        }

        if let Some(v) = lookup("BUCKETCAST_ROUTER_WORKERS") {
            config.router.workers = parse_num("BUCKETCAST_ROUTER_WORKERS", &v)?;
        }
        if let Some(v) = lookup("BUCKETCAST_ROUTER_QUEUE_CAPACITY") {
            config.router.queue_capacity = parse_num("BUCKETCAST_ROUTER_QUEUE_CAPACITY", &v)?;
        }

        let startup = &mut config.startup;
        if let Some(v) = lookup("BUCKETCAST_STARTUP_EXPORT") {
            startup.export = parse_flag("BUCKETCAST_STARTUP_EXPORT", &v)?;
        }
        if let Some(v) = lookup("BUCKETCAST_STARTUP_EXPORT_CLEAR") {
            startup.export_clear = parse_flag("BUCKETCAST_STARTUP_EXPORT_CLEAR", &v)?;
        }
        if let Some(v) = lookup("BUCKETCAST_STARTUP_IMPORT") {
            startup.import = parse_flag("BUCKETCAST_STARTUP_IMPORT", &v)?;
        }
        if let Some(v) = lookup("BUCKETCAST_STARTUP_IMPORT_CLEAR") {
            startup.import_clear = parse_flag("BUCKETCAST_STARTUP_IMPORT_CLEAR", &v)?;
        }
        if let Some(v) = lookup("BUCKETCAST_STARTUP_HALT_ON_ERROR") {
            startup.halt_on_error = parse_flag("BUCKETCAST_STARTUP_HALT_ON_ERROR", &v)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Build a configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Environment first, then the file named by `BUCKETCAST_CONFIG` if set.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_env()?;
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            config.apply_file(Path::new(&path))?;
        }
        Ok(config)
    }

    /// Apply overrides from a TOML file.
    pub fn apply_file(&mut self, path: &Path) -> Result<(), ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.apply_toml(&contents, path)
    }

    /// Apply overrides from TOML text; `origin` is used in error messages.
    pub fn apply_toml(&mut self, contents: &str, origin: &Path) -> Result<(), ConfigError> {
        let file: ConfigOverride = toml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })?;

        if let Some(v) = file.queue_id {
            self.queue_id = v;
        }
        if let Some(v) = file.admin_bind {
            self.admin_bind = parse_bind("admin_bind", &v)?;
        }
        if let Some(v) = file.buckets {
            self.buckets = v;
        }

        let m = file.mqtt;
        if let Some(v) = m.broker_host {
            self.mqtt.broker_host = v;
        }
        if let Some(v) = m.broker_port {
            self.mqtt.broker_port = v;
        }
        if let Some(v) = m.client_id {
            self.mqtt.client_id = v;
        }
        if let Some(v) = m.base_topic {
            self.mqtt.base_topic = v;
        }
        if let Some(v) = m.qos {
            self.mqtt.qos = v;
        }
        if let Some(v) = m.keep_alive_secs {
            self.mqtt.keep_alive_secs = v;
        }
        if let Some(v) = m.reconnect_delay_ms {
            self.mqtt.reconnect_delay_ms = v;
        }
        if let Some(v) = m.publish_timeout_ms {
            self.mqtt.publish_timeout_ms = v;
        }

        if let Some(v) = file.router.workers {
            self.router.workers = v;
        }
        if let Some(v) = file.router.queue_capacity {
            self.router.queue_capacity = v;
        }

        let s = file.startup;
        if let Some(v) = s.export {
            self.startup.export = v;
        }
        if let Some(v) = s.export_clear {
            self.startup.export_clear = v;
        }
        if let Some(v) = s.import {
            self.startup.import = v;
        }
        if let Some(v) = s.import_clear {
            self.startup.import_clear = v;
        }
        if let Some(v) = s.halt_on_error {
            self.startup.halt_on_error = v;
        }

        self.validate()
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue_id.trim().is_empty() {
            return Err(invalid("queue_id", &self.queue_id, "must not be empty"));
        }
        if self.mqtt.base_topic.is_empty() || self.mqtt.base_topic.contains(['#', '+']) {
            return Err(invalid(
                "mqtt.base_topic",
                &self.mqtt.base_topic,
                "must be a non-empty topic without wildcards",
            ));
        }
        if self.mqtt.qos > 2 {
            return Err(invalid("mqtt.qos", self.mqtt.qos, "must be 0, 1 or 2"));
        }
        if self.mqtt.publish_timeout_ms == 0 {
            return Err(invalid("mqtt.publish_timeout_ms", 0, "must be positive"));
        }
        if self.router.workers == 0 {
            return Err(invalid("router.workers", 0, "must be positive"));
        }
        if self.router.queue_capacity == 0 {
            return Err(invalid("router.queue_capacity", 0, "must be positive"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_variables() {
        let config = ServerConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.admin_bind.to_string(), "0.0.0.0:50051");
        assert_eq!(config.mqtt.publish_timeout(), Duration::from_millis(5000));
    }

    #[test]
    fn environment_overrides_defaults() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("BUCKETCAST_QUEUE_ID", "arn:minio:sqs::primary:mqtt"),
            ("BUCKETCAST_MQTT_PORT", "8883"),
            ("BUCKETCAST_BUCKETS", "photos, videos,,"),
            ("BUCKETCAST_STARTUP_IMPORT", "yes"),
            ("BUCKETCAST_ROUTER_WORKERS", "2"),
        ]))
        .unwrap();
        assert_eq!(config.queue_id, "arn:minio:sqs::primary:mqtt");
        assert_eq!(config.mqtt.broker_port, 8883);
        assert_eq!(config.buckets, vec!["photos", "videos"]);
        assert!(config.startup.import);
        assert_eq!(config.router.workers, 2);
    }

    #[test]
    fn bad_environment_values_are_rejected() {
        let err = ServerConfig::from_lookup(lookup(&[("BUCKETCAST_MQTT_PORT", "http")])).unwrap_err();
        assert!(err.to_string().contains("BUCKETCAST_MQTT_PORT"));

        let err = ServerConfig::from_lookup(lookup(&[("BUCKETCAST_STARTUP_EXPORT", "maybe")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));

        assert!(ServerConfig::from_lookup(lookup(&[("BUCKETCAST_MQTT_QOS", "3")])).is_err());
        assert!(ServerConfig::from_lookup(lookup(&[("BUCKETCAST_BASE_TOPIC", "a/#")])).is_err());
    }

    #[test]
    fn file_overrides_environment() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
buckets = ["photos"]
admin_bind = "127.0.0.1:6000"

[mqtt]
base_topic = "minio/events"
qos = 0

[startup]
export = true
halt_on_error = true
"#
        )
        .unwrap();

        let mut config =
            ServerConfig::from_lookup(lookup(&[("BUCKETCAST_BASE_TOPIC", "from-env")])).unwrap();
        config.apply_file(file.path()).unwrap();

        assert_eq!(config.mqtt.base_topic, "minio/events");
        assert_eq!(config.mqtt.qos, 0);
        assert_eq!(config.buckets, vec!["photos"]);
        assert_eq!(config.admin_bind.port(), 6000);
        assert!(config.startup.export && config.startup.halt_on_error);
        assert_eq!(config.mqtt.broker_port, DEFAULT_BROKER_PORT);
    }

    #[test]
    fn unknown_file_keys_are_rejected() {
        let mut config = ServerConfig::default();
        let err = config
            .apply_toml("[mqtt]\nbroker = \"x\"\n", Path::new("inline.toml"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ServerConfig::default();
        let err = config.apply_file(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
