//! Client configuration loaded from the environment.

use std::env;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "http://localhost:5197/api";
pub const DEFAULT_HUB_URL: &str = "ws://localhost:5197/gamehub";

/// Which transport the session manager drives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TransportMode {
    Hub,
    Poll,
    /// Hub first, polling when the hub cannot be opened
    #[default]
    Auto,
}

impl FromStr for TransportMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hub" | "ws" | "websocket" => Ok(TransportMode::Hub),
            "poll" | "http" => Ok(TransportMode::Poll),
            "auto" => Ok(TransportMode::Auto),
            other => Err(format!("Unknown transport mode: {}", other)),
        }
    }
}

/// Capped exponential backoff shared by join retries and reconnects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(1_000),
            max_delay: Duration::from_millis(5_000),
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after failed attempt number `attempt` (1-based).
    ///
    /// `base * 2^(attempt - 1)`, capped at `max_delay`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let factor = 1u32 << exponent;
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// REST base URL of the game authority
    pub api_url: String,
    /// WebSocket URL of the push hub
    pub hub_url: String,
    pub transport: TransportMode,
    pub poll_interval: Duration,
    pub retry: RetryPolicy,
    /// How long a single command may wait for its acknowledgement
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            hub_url: DEFAULT_HUB_URL.to_string(),
            transport: TransportMode::Auto,
            poll_interval: Duration::from_millis(1_000),
            retry: RetryPolicy::default(),
            request_timeout: Duration::from_millis(10_000),
            connect_timeout: Duration::from_millis(5_000),
        }
    }
}

impl ClientConfig {
    /// Load configuration from `PLAYTOGETHER_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// Unparseable values are logged and replaced by their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let millis = |key: &str, default: Duration| -> Duration {
            parse_or(&lookup, key, default.as_millis() as u64).map_or(default, Duration::from_millis)
        };
        // Intervals and timeouts of zero would spin or fail every request
        let positive_millis = |key: &str, default: Duration| -> Duration {
            let value = millis(key, default);
            if value.is_zero() {
                tracing::warn!(key, "Configuration value must be positive, using default");
                default
            } else {
                value
            }
        };

        Self {
            api_url: lookup("PLAYTOGETHER_API_URL").unwrap_or(defaults.api_url),
            hub_url: lookup("PLAYTOGETHER_HUB_URL").unwrap_or(defaults.hub_url),
            transport: parse_or(&lookup, "PLAYTOGETHER_TRANSPORT", defaults.transport)
                .unwrap_or(defaults.transport),
            poll_interval: positive_millis("PLAYTOGETHER_POLL_INTERVAL_MS", defaults.poll_interval),
            retry: RetryPolicy {
                max_attempts: parse_or(
                    &lookup,
                    "PLAYTOGETHER_MAX_ATTEMPTS",
                    defaults.retry.max_attempts,
                )
                .filter(|n| *n > 0)
                .unwrap_or(defaults.retry.max_attempts),
                base_delay: millis("PLAYTOGETHER_RETRY_BASE_MS", defaults.retry.base_delay),
                max_delay: millis("PLAYTOGETHER_RETRY_MAX_MS", defaults.retry.max_delay),
            },
            request_timeout: positive_millis("PLAYTOGETHER_REQUEST_TIMEOUT_MS", defaults.request_timeout),
            connect_timeout: positive_millis("PLAYTOGETHER_CONNECT_TIMEOUT_MS", defaults.connect_timeout),
        }
    }
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Option<T> {
    let Some(raw) = lookup(key) else {
        return Some(default);
    };
    match raw.parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, val = %raw, "Invalid configuration value, using default");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_delay_doubles_up_to_cap() {
        let policy = RetryPolicy::default();
        let delays: Vec<u64> = (1..=5)
            .map(|n| policy.delay_for(n).as_millis() as u64)
            .collect();
        assert_eq!(delays, vec![1_000, 2_000, 4_000, 5_000, 5_000]);
    }

    #[test]
    fn test_huge_attempt_saturates_at_cap() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(200), policy.max_delay);
    }

    #[test]
    fn test_defaults_without_environment() {
        let config = ClientConfig::from_lookup(|_| None);
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.transport, TransportMode::Auto);
        assert_eq!(config.poll_interval, Duration::from_millis(1_000));
        assert_eq!(config.retry, RetryPolicy::default());
    }

    #[test]
    fn test_overrides_and_bad_values() {
        let vars: HashMap<&str, &str> = [
            ("PLAYTOGETHER_TRANSPORT", "poll"),
            ("PLAYTOGETHER_POLL_INTERVAL_MS", "250"),
            ("PLAYTOGETHER_MAX_ATTEMPTS", "0"),
            ("PLAYTOGETHER_RETRY_BASE_MS", "not-a-number"),
        ]
        .into_iter()
        .collect();
        let config = ClientConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.transport, TransportMode::Poll);
        assert_eq!(config.poll_interval, Duration::from_millis(250));
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.base_delay, Duration::from_millis(1_000));
    }

    #[test]
    fn test_zero_durations_fall_back_to_defaults() {
        let vars: HashMap<&str, &str> = [
            ("PLAYTOGETHER_POLL_INTERVAL_MS", "0"),
            ("PLAYTOGETHER_REQUEST_TIMEOUT_MS", "0"),
            ("PLAYTOGETHER_RETRY_BASE_MS", "0"),
        ]
        .into_iter()
        .collect();
        let config = ClientConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.poll_interval, Duration::from_millis(1_000));
        assert_eq!(config.request_timeout, Duration::from_millis(10_000));
        // A zero base delay only means retrying immediately
        assert_eq!(config.retry.base_delay, Duration::ZERO);
    }
}
