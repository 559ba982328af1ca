use medallion_common::LakeError;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

pub const DEFAULT_BUCKET: &str = "credit-card-transactions-project";
pub const DEFAULT_REGION: &str = "sa-east-1";

/// Connection settings for the lake bucket, built once by the driver and
/// passed to whatever needs store access.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Custom endpoint for S3-compatible stores (MinIO)
    pub endpoint: Option<String>,
    pub region: String,
    pub bucket: String,
    /// Static credentials; when absent the default AWS provider chain is used
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub path_style: bool,
    /// Total attempts per store call, including the first
    pub max_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
    /// Upper bound on in-flight requests per client
    pub max_connections: usize,
    /// Send `If-None-Match: *` on writes
    pub conditional_writes: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            region: DEFAULT_REGION.to_string(),
            bucket: DEFAULT_BUCKET.to_string(),
            access_key: None,
            secret_key: None,
            path_style: false,
            max_attempts: 3,
            retry_base_delay_ms: 200,
            retry_max_delay_ms: 5_000,
            max_connections: 10,
            conditional_writes: true,
        }
    }
}

impl StorageConfig {
    pub fn from_env() -> Result<Self, LakeError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Reads the same variables as [`StorageConfig::from_env`] through `lookup`.
    ///
    /// `S3_BUCKET`, `AWS_REGION` / `S3_REGION`, `S3_ENDPOINT`,
    /// `AWS_ACCESS_KEY_ID` / `S3_ACCESS_KEY`, `AWS_SECRET_ACCESS_KEY` /
    /// `S3_SECRET_KEY`, `S3_PATH_STYLE`, `S3_MAX_ATTEMPTS`,
    /// `S3_RETRY_BASE_DELAY_MS`, `S3_RETRY_MAX_DELAY_MS`,
    /// `S3_MAX_CONNECTIONS`, `S3_CONDITIONAL_WRITES`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, LakeError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let config = Self {
            endpoint: lookup("S3_ENDPOINT"),
            region: lookup("AWS_REGION")
                .or_else(|| lookup("S3_REGION"))
                .unwrap_or(defaults.region),
            bucket: lookup("S3_BUCKET").unwrap_or(defaults.bucket),
            access_key: lookup("S3_ACCESS_KEY").or_else(|| lookup("AWS_ACCESS_KEY_ID")),
            secret_key: lookup("S3_SECRET_KEY").or_else(|| lookup("AWS_SECRET_ACCESS_KEY")),
            path_style: parse_var(&lookup, "S3_PATH_STYLE", defaults.path_style)?,
            max_attempts: parse_var(&lookup, "S3_MAX_ATTEMPTS", defaults.max_attempts)?,
            retry_base_delay_ms: parse_var(
                &lookup,
                "S3_RETRY_BASE_DELAY_MS",
                defaults.retry_base_delay_ms,
            )?,
            retry_max_delay_ms: parse_var(
                &lookup,
                "S3_RETRY_MAX_DELAY_MS",
                defaults.retry_max_delay_ms,
            )?,
            max_connections: parse_var(&lookup, "S3_MAX_CONNECTIONS", defaults.max_connections)?,
            conditional_writes: parse_var(
                &lookup,
                "S3_CONDITIONAL_WRITES",
                defaults.conditional_writes,
            )?,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), LakeError> {
        if self.bucket.is_empty() {
            return Err(LakeError::Config("S3_BUCKET must not be empty".to_string()));
        }
        if self.max_attempts == 0 {
            return Err(LakeError::Config("S3_MAX_ATTEMPTS must be at least 1".to_string()));
        }
        if self.max_connections == 0 {
            return Err(LakeError::Config(
                "S3_MAX_CONNECTIONS must be at least 1".to_string(),
            ));
        }
        if self.access_key.is_some() != self.secret_key.is_some() {
            return Err(LakeError::Config(
                "access key and secret key must be set together".to_string(),
            ));
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
            max_delay: Duration::from_millis(self.retry_max_delay_ms),
        }
    }
}

fn parse_var<F, T>(lookup: &F, name: &str, default: T) -> Result<T, LakeError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| LakeError::Config(format!("{} has an invalid value: '{}'", name, raw))),
        None => Ok(default),
    }
}

/// Bounded exponential backoff for transient store failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        StorageConfig::default().retry_policy()
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based): base * 2^(attempt-1), capped
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults_without_env() {
        let config = StorageConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.bucket, DEFAULT_BUCKET);
        assert_eq!(config.region, DEFAULT_REGION);
        assert_eq!(config.max_attempts, 3);
        assert!(config.access_key.is_none());
        assert!(config.conditional_writes);
    }

    #[test]
    fn test_env_overrides() {
        let config = StorageConfig::from_lookup(lookup_from(&[
            ("S3_BUCKET", "lake"),
            ("AWS_REGION", "us-west-2"),
            ("AWS_ACCESS_KEY_ID", "id"),
            ("AWS_SECRET_ACCESS_KEY", "secret"),
            ("S3_MAX_ATTEMPTS", "5"),
            ("S3_PATH_STYLE", "true"),
            ("S3_CONDITIONAL_WRITES", "false"),
        ]))
        .unwrap();

        assert_eq!(config.bucket, "lake");
        assert_eq!(config.region, "us-west-2");
        assert_eq!(config.access_key.as_deref(), Some("id"));
        assert_eq!(config.max_attempts, 5);
        assert!(config.path_style);
        assert!(!config.conditional_writes);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(StorageConfig::from_lookup(lookup_from(&[("S3_MAX_ATTEMPTS", "many")])).is_err());
        assert!(StorageConfig::from_lookup(lookup_from(&[("S3_MAX_ATTEMPTS", "0")])).is_err());
        assert!(StorageConfig::from_lookup(lookup_from(&[("S3_ACCESS_KEY", "only-id")])).is_err());
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 10,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(1_000),
        };
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(4), Duration::from_millis(800));
        assert_eq!(policy.delay_for(5), Duration::from_millis(1_000));
        assert_eq!(policy.delay_for(40), Duration::from_millis(1_000));
    }
}
