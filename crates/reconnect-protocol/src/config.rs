//! Reconnect session configuration.

use std::path::Path;
use std::time::Duration;

use reconnect_stream::StreamConfig;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Tunables shared by the teacher and learner sides of a session.
///
/// Durations are written as integer milliseconds in JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    /// How long the teacher waits for a query response before sending a
    /// node anyway.
    #[serde(with = "millis")]
    pub max_ack_delay: Duration,

    /// Maximum wait for an anticipated stream message.
    #[serde(with = "millis")]
    pub stream_timeout: Duration,

    /// Capacity of each stream's message buffer.
    pub stream_buffer_size: usize,

    /// Largest accepted wire frame in bytes.
    pub max_frame_size: usize,

    /// Sleep of the teacher's receiving worker when no response is due.
    #[serde(with = "millis")]
    pub receiver_idle_sleep: Duration,

    /// Fail the session when an original node has no hash.
    pub strict_hash_checks: bool,

    /// Minimum spacing between hash anomaly warnings.
    #[serde(with = "millis")]
    pub hash_warning_interval: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_ack_delay: Duration::from_millis(10),
            stream_timeout: Duration::from_secs(100),
            stream_buffer_size: 10_000,
            max_frame_size: 64 * 1024 * 1024,
            receiver_idle_sleep: Duration::from_millis(1),
            strict_hash_checks: false,
            hash_warning_interval: Duration::from_secs(5),
        }
    }
}

impl ReconnectConfig {
    /// Create config from environment variables with sensible defaults.
    ///
    /// Unparseable values are ignored with a warning.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(ms) = env_parse::<u64>("RECONNECT_MAX_ACK_DELAY_MS") {
            config.max_ack_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = env_parse::<u64>("RECONNECT_STREAM_TIMEOUT_MS") {
            config.stream_timeout = Duration::from_millis(ms);
        }
        if let Some(size) = env_parse::<usize>("RECONNECT_STREAM_BUFFER_SIZE") {
            config.stream_buffer_size = size;
        }
        if let Some(strict) = env_parse::<bool>("RECONNECT_STRICT_HASH_CHECKS") {
            config.strict_hash_checks = strict;
        }

        config
    }

    /// Load config from a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("reading {}: {e}", path.display())))?;
        serde_json::from_str(&raw)
            .map_err(|e| Error::Config(format!("parsing {}: {e}", path.display())))
    }

    /// Set the acknowledgment delay.
    #[must_use]
    pub fn with_max_ack_delay(mut self, delay: Duration) -> Self {
        self.max_ack_delay = delay;
        self
    }

    /// Set the stream read timeout.
    #[must_use]
    pub fn with_stream_timeout(mut self, timeout: Duration) -> Self {
        self.stream_timeout = timeout;
        self
    }

    /// Set the stream buffer capacity.
    #[must_use]
    pub fn with_stream_buffer_size(mut self, size: usize) -> Self {
        self.stream_buffer_size = size;
        self
    }

    /// Enable or disable strict hash checks.
    #[must_use]
    pub fn with_strict_hash_checks(mut self, strict: bool) -> Self {
        self.strict_hash_checks = strict;
        self
    }

    /// Stream settings derived from this config.
    pub fn stream_config(&self) -> StreamConfig {
        StreamConfig {
            buffer_size: self.stream_buffer_size,
            timeout: self.stream_timeout,
            max_frame_size: self.max_frame_size,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("ignoring invalid {}={:?}", key, raw);
            None
        }
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ReconnectConfig::default();
        assert_eq!(config.max_ack_delay, Duration::from_millis(10));
        assert_eq!(config.stream_timeout, Duration::from_secs(100));
        assert_eq!(config.stream_buffer_size, 10_000);
        assert!(!config.strict_hash_checks);
    }

    /// Tests touching process environment run one at a time.
    static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

    const ENV_KEYS: [&str; 4] = [
        "RECONNECT_MAX_ACK_DELAY_MS",
        "RECONNECT_STREAM_TIMEOUT_MS",
        "RECONNECT_STREAM_BUFFER_SIZE",
        "RECONNECT_STRICT_HASH_CHECKS",
    ];

    fn with_env<T>(vars: &[(&str, &str)], f: impl FnOnce() -> T) -> T {
        let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        for key in ENV_KEYS {
            std::env::remove_var(key);
        }
        for (key, value) in vars {
            std::env::set_var(key, value);
        }
        let result = f();
        for key in ENV_KEYS {
            std::env::remove_var(key);
        }
        result
    }

    #[test]
    fn test_from_env_overrides() {
        let config = with_env(
            &[
                ("RECONNECT_MAX_ACK_DELAY_MS", "25"),
                ("RECONNECT_STREAM_TIMEOUT_MS", "3000"),
                ("RECONNECT_STREAM_BUFFER_SIZE", " 512 "),
                ("RECONNECT_STRICT_HASH_CHECKS", "true"),
            ],
            ReconnectConfig::from_env,
        );

        assert_eq!(config.max_ack_delay, Duration::from_millis(25));
        assert_eq!(config.stream_timeout, Duration::from_secs(3));
        assert_eq!(config.stream_buffer_size, 512);
        assert!(config.strict_hash_checks);
        assert_eq!(config.hash_warning_interval, Duration::from_secs(5));
    }

    #[test]
    fn test_from_env_ignores_invalid_values() {
        let config = with_env(
            &[
                ("RECONNECT_MAX_ACK_DELAY_MS", "soon"),
                ("RECONNECT_STREAM_BUFFER_SIZE", "-1"),
                ("RECONNECT_STRICT_HASH_CHECKS", "yes"),
                ("RECONNECT_STREAM_TIMEOUT_MS", "250"),
            ],
            ReconnectConfig::from_env,
        );

        let defaults = ReconnectConfig::default();
        assert_eq!(config.max_ack_delay, defaults.max_ack_delay);
        assert_eq!(config.stream_buffer_size, defaults.stream_buffer_size);
        assert_eq!(config.strict_hash_checks, defaults.strict_hash_checks);
        assert_eq!(config.stream_timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_from_env_without_variables_is_default() {
        let config = with_env(&[], ReconnectConfig::from_env);
        assert_eq!(config, ReconnectConfig::default());
    }

    #[test]
    fn test_builders() {
        let config = ReconnectConfig::default()
            .with_max_ack_delay(Duration::ZERO)
            .with_strict_hash_checks(true)
            .with_stream_buffer_size(16);

        assert_eq!(config.max_ack_delay, Duration::ZERO);
        assert!(config.strict_hash_checks);
        assert_eq!(config.stream_config().buffer_size, 16);
    }

    #[test]
    fn test_json_uses_millis_and_defaults() {
        let config: ReconnectConfig =
            serde_json::from_str(r#"{"max_ack_delay": 250, "strict_hash_checks": true}"#).unwrap();
        assert_eq!(config.max_ack_delay, Duration::from_millis(250));
        assert!(config.strict_hash_checks);
        assert_eq!(config.receiver_idle_sleep, Duration::from_millis(1));

        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["max_ack_delay"], 250);
    }

    #[test]
    fn test_from_json_file() {
        let path = std::env::temp_dir().join(format!("reconnect-config-{}.json", std::process::id()));
        std::fs::write(&path, r#"{"stream_timeout": 1500}"#).unwrap();

        let config = ReconnectConfig::from_json_file(&path).unwrap();
        assert_eq!(config.stream_timeout, Duration::from_millis(1500));

        std::fs::remove_file(&path).unwrap();
        assert!(ReconnectConfig::from_json_file(&path).is_err());
    }
}
