//! Backend client configuration.
//!
//! All fields are required unless explicitly marked optional. No defaults.

use serde::Deserialize;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    /// Base URL of the REST endpoint, e.g. `https://<project>.example.co/rest/v1`.
    pub rest_url: String,
    /// Base URL of the realtime endpoint, e.g. `wss://<project>.example.co/realtime/v1`.
    pub realtime_url: String,
    /// Project API key, sent as `apikey` on every request.
    pub api_key: String,
    /// Signed-in user's JWT. Falls back to the API key when absent.
    pub access_token: Option<String>,
    pub request_timeout_ms: u64,
    pub heartbeat_interval_ms: u64,
    /// Capacity of each subscription's delivery channel.
    pub feed_buffer: usize,
    pub reconnect: ReconnectConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReconnectConfig {
    pub initial_ms: u64,
    pub max_ms: u64,
    pub multiplier: f64,
    pub jitter_ms: u64,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid config value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

impl ClientConfig {
    /// Bearer token for `Authorization`: the user's JWT, else the API key.
    pub fn bearer_token(&self) -> &str {
        self.access_token.as_deref().unwrap_or(&self.api_key)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rest_url.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "rest_url",
                reason: "must not be empty".to_string(),
            });
        }
        if !(self.rest_url.starts_with("http://") || self.rest_url.starts_with("https://")) {
            return Err(ConfigError::InvalidValue {
                field: "rest_url",
                reason: "must be an http(s) URL".to_string(),
            });
        }
        if self.realtime_url.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "realtime_url",
                reason: "must not be empty".to_string(),
            });
        }
        if !(self.realtime_url.starts_with("ws://") || self.realtime_url.starts_with("wss://")) {
            return Err(ConfigError::InvalidValue {
                field: "realtime_url",
                reason: "must be a ws(s) URL".to_string(),
            });
        }
        if self.api_key.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "api_key",
                reason: "must not be empty".to_string(),
            });
        }
        if matches!(&self.access_token, Some(token) if token.trim().is_empty()) {
            return Err(ConfigError::InvalidValue {
                field: "access_token",
                reason: "must not be empty when set".to_string(),
            });
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "request_timeout_ms",
                reason: "must be > 0".to_string(),
            });
        }
        if self.heartbeat_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "heartbeat_interval_ms",
                reason: "must be > 0".to_string(),
            });
        }
        if self.feed_buffer == 0 {
            return Err(ConfigError::InvalidValue {
                field: "feed_buffer",
                reason: "must be > 0".to_string(),
            });
        }
        self.reconnect.validate()
    }
}

impl ReconnectConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.initial_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "reconnect.initial_ms",
                reason: "must be > 0".to_string(),
            });
        }
        if self.max_ms < self.initial_ms {
            return Err(ConfigError::InvalidValue {
                field: "reconnect.max_ms",
                reason: "must be >= initial_ms".to_string(),
            });
        }
        if self.multiplier < 1.0 {
            return Err(ConfigError::InvalidValue {
                field: "reconnect.multiplier",
                reason: "must be >= 1.0".to_string(),
            });
        }
        Ok(())
    }

    /// Delay after `current_ms`, grown by the multiplier and capped at `max_ms`.
    pub fn next_delay_ms(&self, current_ms: u64) -> u64 {
        let next = (current_ms as f64 * self.multiplier) as u64;
        next.max(self.initial_ms).min(self.max_ms)
    }

    /// `base_ms` plus up to `jitter_ms` of noise so feeds do not reconnect in step.
    pub fn jittered_delay_ms(&self, base_ms: u64) -> u64 {
        if self.jitter_ms == 0 {
            return base_ms;
        }
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| u64::from(elapsed.subsec_nanos()))
            .unwrap_or(0);
        base_ms.saturating_add(nanos % self.jitter_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn base_config() -> ClientConfig {
        ClientConfig {
            rest_url: "http://localhost:54321/rest/v1".to_string(),
            realtime_url: "ws://localhost:54321/realtime/v1".to_string(),
            api_key: "anon-key".to_string(),
            access_token: None,
            request_timeout_ms: 5_000,
            heartbeat_interval_ms: 30_000,
            feed_buffer: 256,
            reconnect: ReconnectConfig {
                initial_ms: 250,
                max_ms: 5_000,
                multiplier: 1.5,
                jitter_ms: 100,
            },
        }
    }

    #[test]
    fn test_base_config_is_valid() {
        assert_eq!(base_config().validate(), Ok(()));
    }

    #[test]
    fn test_config_rejects_wrong_schemes() {
        let mut config = base_config();
        config.rest_url = "ws://localhost".to_string();
        assert!(config.validate().is_err());

        let mut config = base_config();
        config.realtime_url = "https://localhost".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_requires_api_key() {
        let mut config = base_config();
        config.api_key = "  ".to_string();
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidValue {
                field: "api_key",
                reason: "must not be empty".to_string(),
            })
        );
    }

    #[test]
    fn test_bearer_token_prefers_access_token() {
        let mut config = base_config();
        assert_eq!(config.bearer_token(), "anon-key");
        config.access_token = Some("user-jwt".to_string());
        assert_eq!(config.bearer_token(), "user-jwt");
    }

    proptest! {
        #[test]
        fn reconnect_backoff_stays_in_bounds(
            initial in 1u64..1000,
            max_delta in 0u64..5000,
            multiplier in 1.0f64..4.0f64,
            steps in 0usize..30,
        ) {
            let reconnect = ReconnectConfig {
                initial_ms: initial,
                max_ms: initial + max_delta,
                multiplier,
                jitter_ms: 0,
            };
            prop_assert!(reconnect.validate().is_ok());

            let mut delay = reconnect.initial_ms;
            for _ in 0..steps {
                let next = reconnect.next_delay_ms(delay);
                prop_assert!(next >= delay);
                prop_assert!(next <= reconnect.max_ms);
                delay = next;
            }
        }

        #[test]
        fn jittered_delay_stays_within_jitter(base in 0u64..60_000, jitter in 0u64..5_000) {
            let reconnect = ReconnectConfig {
                initial_ms: 100,
                max_ms: 60_000,
                multiplier: 2.0,
                jitter_ms: jitter,
            };
            let delay = reconnect.jittered_delay_ms(base);
            prop_assert!(delay >= base);
            prop_assert!(delay <= base + jitter);
            if jitter == 0 {
                prop_assert_eq!(delay, base);
            }
        }

        #[test]
        fn invalid_reconnect_config_rejected(multiplier in 0.0f64..1.0f64) {
            let reconnect = ReconnectConfig {
                initial_ms: 100,
                max_ms: 1000,
                multiplier,
                jitter_ms: 0,
            };
            prop_assert!(reconnect.validate().is_err());
        }
    }
}
