//! Relay configuration
//!
//! Static settings fixed at startup. Values come from built-in defaults, then
//! an optional TOML file, then the command line; the binary applies the last
//! layer. Mutable runtime settings live in [`RuntimeConfig`](super::runtime::RuntimeConfig).

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Deserializer};

use crate::auth::AuthToken;
use crate::error::{Error, Result};
use crate::protocol::constants::*;

/// Relay configuration options
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RelayConfig {
    /// Ingest listener address (`tcp://` prefix accepted)
    pub ingest_addr: String,

    /// Control-plane listener address (`http://` prefix accepted)
    pub control_addr: String,

    /// MQTT broker for heartbeats (`mqtt://` prefix accepted)
    pub heartbeat_addr: String,

    /// Credentials for the MQTT broker; also derive the subscriber token
    pub username: String,
    pub password: String,

    /// MQTT client identifier
    pub client_id: String,

    /// Initial event-loop poll interval
    pub poll_interval_ms: u32,

    /// Largest payload an ingest frame may declare
    pub max_payload_len: usize,

    /// Outbound queue depth per subscriber
    pub subscriber_queue: usize,

    /// Reconnect cadence for absent links
    #[serde(rename = "retry_interval_ms", deserialize_with = "millis")]
    pub retry_interval: Duration,

    /// Subscriber liveness probe cadence
    #[serde(rename = "keepalive_interval_ms", deserialize_with = "millis")]
    pub keepalive_interval: Duration,

    /// Heartbeat announcement cadence
    #[serde(rename = "heartbeat_interval_ms", deserialize_with = "millis")]
    pub heartbeat_interval: Duration,

    /// Heartbeat channel and message
    pub heartbeat_topic: String,
    pub heartbeat_message: String,

    /// Enable TCP_NODELAY on ingest connections
    pub tcp_nodelay: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            ingest_addr: "0.0.0.0:8888".into(),
            control_addr: "0.0.0.0:9999".into(),
            heartbeat_addr: "127.0.0.1:1883".into(),
            username: String::new(),
            password: String::new(),
            client_id: DEFAULT_CLIENT_ID.into(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            max_payload_len: DEFAULT_MAX_PAYLOAD_LEN,
            subscriber_queue: DEFAULT_SUBSCRIBER_QUEUE,
            retry_interval: Duration::from_millis(RETRY_INTERVAL_MS),
            keepalive_interval: Duration::from_millis(KEEPALIVE_INTERVAL_MS),
            heartbeat_interval: Duration::from_millis(HEARTBEAT_INTERVAL_MS),
            heartbeat_topic: HEARTBEAT_TOPIC.into(),
            heartbeat_message: HEARTBEAT_MESSAGE.into(),
            tcp_nodelay: true,
        }
    }
}

impl RelayConfig {
    /// Parse a TOML document; missing keys keep their defaults
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| Error::config(format!("invalid TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Reject values the relay cannot run with
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("ingest_addr", &self.ingest_addr),
            ("control_addr", &self.control_addr),
            ("heartbeat_addr", &self.heartbeat_addr),
        ] {
            if strip_scheme(value).is_empty() {
                return Err(Error::config(format!("{field} must not be empty")));
            }
        }
        if self.subscriber_queue == 0 {
            return Err(Error::config("subscriber_queue must be at least 1"));
        }
        for (field, value) in [
            ("retry_interval_ms", self.retry_interval),
            ("keepalive_interval_ms", self.keepalive_interval),
            ("heartbeat_interval_ms", self.heartbeat_interval),
        ] {
            if value.is_zero() {
                return Err(Error::config(format!("{field} must be positive")));
            }
        }
        self.heartbeat_endpoint()?;
        Ok(())
    }

    /// Set the ingest address
    pub fn ingest(mut self, addr: impl Into<String>) -> Self {
        self.ingest_addr = addr.into();
        self
    }

    /// Set the control-plane address
    pub fn control(mut self, addr: impl Into<String>) -> Self {
        self.control_addr = addr.into();
        self
    }

    /// Set the heartbeat broker address
    pub fn heartbeat(mut self, addr: impl Into<String>) -> Self {
        self.heartbeat_addr = addr.into();
        self
    }

    /// Set credentials
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    /// Set the initial poll interval
    pub fn poll_interval_ms(mut self, ms: u32) -> Self {
        self.poll_interval_ms = ms;
        self
    }

    /// Set the ingest payload ceiling
    pub fn max_payload_len(mut self, len: usize) -> Self {
        self.max_payload_len = len;
        self
    }

    /// Set the per-subscriber queue depth
    pub fn subscriber_queue(mut self, depth: usize) -> Self {
        self.subscriber_queue = depth.max(1);
        self
    }

    /// Set the reconnect cadence
    pub fn retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    /// Set the keepalive cadence
    pub fn keepalive_interval(mut self, interval: Duration) -> Self {
        self.keepalive_interval = interval;
        self
    }

    /// Set the heartbeat cadence
    pub fn heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Ingest bind address without scheme
    pub fn ingest_bind(&self) -> &str {
        strip_scheme(&self.ingest_addr)
    }

    /// Control-plane bind address without scheme
    pub fn control_bind(&self) -> &str {
        strip_scheme(&self.control_addr)
    }

    /// Broker host and port (port defaults to 1883)
    pub fn heartbeat_endpoint(&self) -> Result<(String, u16)> {
        let addr = strip_scheme(&self.heartbeat_addr);
        match addr.rsplit_once(':') {
            Some((host, port)) => {
                let port = port
                    .parse::<u16>()
                    .map_err(|_| Error::config(format!("invalid heartbeat port in '{addr}'")))?;
                Ok((host.trim_matches(|c| c == '[' || c == ']').to_string(), port))
            }
            None => Ok((addr.to_string(), 1883)),
        }
    }

    /// Subscriber token derived from the credentials, if any
    pub fn auth_token(&self) -> Option<AuthToken> {
        AuthToken::from_credentials(&self.username, &self.password)
    }
}

/// Drop a leading `scheme://`
pub fn strip_scheme(addr: &str) -> &str {
    addr.split_once("://").map_or(addr, |(_, rest)| rest)
}

fn millis<'de, D>(deserializer: D) -> std::result::Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    u64::deserialize(deserializer).map(Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_default_config() {
        let config = RelayConfig::default();

        assert_eq!(config.ingest_bind(), "0.0.0.0:8888");
        assert_eq!(config.control_bind(), "0.0.0.0:9999");
        assert_eq!(config.poll_interval_ms, 10);
        assert_eq!(config.retry_interval, Duration::from_secs(1));
        assert_eq!(config.keepalive_interval, Duration::from_secs(10));
        assert_eq!(config.heartbeat_interval, Duration::from_secs(5));
        assert!(config.auth_token().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_strip_scheme() {
        assert_eq!(strip_scheme("tcp://0.0.0.0:8888"), "0.0.0.0:8888");
        assert_eq!(strip_scheme("127.0.0.1:1"), "127.0.0.1:1");
        assert_eq!(strip_scheme("http://"), "");
    }

    #[test]
    fn test_heartbeat_endpoint() {
        let config = RelayConfig::default().heartbeat("mqtt://broker.local:2883");
        assert_eq!(config.heartbeat_endpoint().unwrap(), ("broker.local".to_string(), 2883));

        let config = RelayConfig::default().heartbeat("broker.local");
        assert_eq!(config.heartbeat_endpoint().unwrap().1, 1883);

        let config = RelayConfig::default().heartbeat("broker:notaport");
        assert!(config.heartbeat_endpoint().is_err());
    }

    #[test]
    fn test_builder_chaining() {
        let config = RelayConfig::default()
            .ingest("127.0.0.1:0")
            .control("127.0.0.1:0")
            .credentials("user", "pass")
            .poll_interval_ms(50)
            .max_payload_len(1024)
            .subscriber_queue(0)
            .retry_interval(Duration::from_millis(100));

        assert_eq!(config.ingest_bind(), "127.0.0.1:0");
        assert_eq!(config.poll_interval_ms, 50);
        assert_eq!(config.max_payload_len, 1024);
        assert_eq!(config.subscriber_queue, 1);
        assert_eq!(config.retry_interval, Duration::from_millis(100));
        assert!(config.auth_token().is_some());
    }

    #[test]
    fn test_from_toml() {
        let config = RelayConfig::from_toml_str(
            r#"
ingest_addr = "tcp://127.0.0.1:7000"
username = "relay"
password = "hunter2"
poll_interval_ms = 25
keepalive_interval_ms = 2500
"#,
        )
        .unwrap();

        assert_eq!(config.ingest_bind(), "127.0.0.1:7000");
        assert_eq!(config.poll_interval_ms, 25);
        assert_eq!(config.keepalive_interval, Duration::from_millis(2500));
        // Untouched keys keep defaults
        assert_eq!(config.control_bind(), "0.0.0.0:9999");
        assert_eq!(
            config.auth_token().unwrap(),
            AuthToken::derive("relay", "hunter2")
        );
    }

    #[test]
    fn test_toml_rejects_unknown_and_invalid() {
        assert!(RelayConfig::from_toml_str("bogus = 1").is_err());
        assert!(RelayConfig::from_toml_str("retry_interval_ms = 0").is_err());
        assert!(RelayConfig::from_toml_str("subscriber_queue = 0").is_err());
        assert!(RelayConfig::from_toml_str("ingest_addr = \"tcp://\"").is_err());
    }

    #[test]
    fn test_load_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "control_addr = \"http://127.0.0.1:9000\"").unwrap();

        let config = RelayConfig::load(file.path()).unwrap();
        assert_eq!(config.control_bind(), "127.0.0.1:9000");
    }
}
