use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::Credentials;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("malformed runtime config: {0}")]
    Malformed(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseFormat {
    Json,
    Html,
}

impl ResponseFormat {
    /// Resolves the build-time `MONITOR_RESPONSE_FORMAT` choice.
    pub fn from_build_env(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("html") => Self::Html,
            _ => Self::Json,
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            Self::Json => "application/json; charset=utf-8",
            Self::Html => "text/html; charset=utf-8",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub primary: Credentials,
    pub fallback: Credentials,
}

impl NetworkConfig {
    /// Fills credentials left empty by the stored config with build defaults.
    pub fn apply_build_defaults(&mut self, primary: Credentials, fallback: Credentials) {
        fill_missing(&mut self.primary, primary);
        fill_missing(&mut self.fallback, fallback);
    }
}

fn fill_missing(current: &mut Credentials, default: Credentials) {
    if current.ssid.trim().is_empty() {
        current.ssid = default.ssid;
    }
    if current.password.is_empty() {
        current.password = default.password;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    /// `None` retries forever.
    pub max_attempts: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay_ms: 2_000,
            max_delay_ms: 60_000,
            max_attempts: Some(10),
        }
    }
}

impl RetryPolicy {
    pub fn sanitize(&mut self) {
        self.initial_delay_ms = self.initial_delay_ms.clamp(100, 60_000);
        self.max_delay_ms = self.max_delay_ms.max(self.initial_delay_ms);
        if self.max_attempts == Some(0) {
            self.max_attempts = Some(1);
        }
    }

    /// Delay before the given 1-based attempt.
    pub fn delay_for(&self, attempt: u32) -> u64 {
        let shift = attempt.saturating_sub(1).min(63);
        let factor = 1_u64.checked_shl(shift).unwrap_or(u64::MAX);
        self.initial_delay_ms
            .saturating_mul(factor)
            .min(self.max_delay_ms)
    }

    pub fn exhausted(&self, attempt: u32) -> bool {
        self.max_attempts.is_some_and(|max| attempt >= max)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub network: NetworkConfig,
    pub retry: RetryPolicy,
    pub http_port: u16,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            network: NetworkConfig::default(),
            retry: RetryPolicy::default(),
            http_port: 80,
        }
    }
}

impl RuntimeConfig {
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let mut config: RuntimeConfig = serde_json::from_str(raw)?;
        config.retry.sanitize();
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn missing_sections_use_defaults() {
        let config = RuntimeConfig::from_json(r#"{"http_port": 8081}"#).unwrap();

        assert_eq!(config.http_port, 8081);
        assert_eq!(config.retry, RetryPolicy::default());
        assert_eq!(config.network, NetworkConfig::default());
    }

    #[test]
    fn parses_credentials_and_unbounded_retry() {
        let raw = r#"{
            "network": {
                "primary": {"ssid": "greenhouse", "password": "pw1"},
                "fallback": {"ssid": "shed", "password": "pw2"}
            },
            "retry": {"max_attempts": null}
        }"#;

        let config = RuntimeConfig::from_json(raw).unwrap();

        assert_eq!(config.network.primary, Credentials::new("greenhouse", "pw1"));
        assert_eq!(config.network.fallback.ssid, "shed");
        assert_eq!(config.retry.max_attempts, None);
        assert_eq!(config.retry.initial_delay_ms, 2_000);
    }

    #[test]
    fn malformed_json_is_rejected() {
        let err = RuntimeConfig::from_json("{not json").unwrap_err();
        assert!(err.to_string().starts_with("malformed runtime config"));
    }

    #[test]
    fn sanitize_clamps_retry_policy() {
        let mut policy = RetryPolicy {
            initial_delay_ms: 5,
            max_delay_ms: 1,
            max_attempts: Some(0),
        };

        policy.sanitize();

        assert_eq!(policy.initial_delay_ms, 100);
        assert_eq!(policy.max_delay_ms, 100);
        assert_eq!(policy.max_attempts, Some(1));
    }

    #[test]
    fn backoff_doubles_until_capped() {
        let policy = RetryPolicy::default();
        let delays: Vec<u64> = (1..=7).map(|attempt| policy.delay_for(attempt)).collect();

        assert_eq!(delays, vec![2_000, 4_000, 8_000, 16_000, 32_000, 60_000, 60_000]);
        assert_eq!(policy.delay_for(500), 60_000);
    }

    #[test]
    fn build_defaults_only_fill_gaps() {
        let mut network = NetworkConfig {
            primary: Credentials::new("greenhouse", ""),
            fallback: Credentials::default(),
        };

        network.apply_build_defaults(
            Credentials::new("ignored", "pw1"),
            Credentials::new("shed", "pw2"),
        );

        assert_eq!(network.primary, Credentials::new("greenhouse", "pw1"));
        assert_eq!(network.fallback, Credentials::new("shed", "pw2"));
    }

    #[test]
    fn response_format_from_build_env() {
        assert_eq!(ResponseFormat::from_build_env(None), ResponseFormat::Json);
        assert_eq!(
            ResponseFormat::from_build_env(Some("HTML")),
            ResponseFormat::Html
        );
        assert_eq!(
            ResponseFormat::from_build_env(Some("xml")),
            ResponseFormat::Json
        );
    }
}
