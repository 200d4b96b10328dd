//! Configuration types
//!
//! Values are fixed at construction. Loading fails fast with a
//! [`ConfigError`]; nothing here is re-read during an operation.

use crate::{ConfigError, QuarryResult};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Default maximum calls per rolling window.
pub const DEFAULT_MAX_CALLS: u32 = 60;
/// Length of the rolling rate window.
pub const RATE_WINDOW: Duration = Duration::from_secs(60);
/// Default TTL for cached reads without a family-specific TTL.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);
/// Default per-request timeout for the HTTP transport.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// API KEY (TYPE-SAFE)
// ============================================================================

/// Credential for the remote service, wrapped so it never reaches a log line.
#[derive(Clone)]
pub struct ApiKey(SecretString);

impl ApiKey {
    /// # Errors
    /// Returns error if the key is empty or whitespace.
    pub fn new(key: impl Into<String>) -> Result<Self, ConfigError> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "api_key".to_string(),
            });
        }
        Ok(Self(SecretString::new(key.into())))
    }

    /// Expose the key (only for building the authorization header).
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ApiKey([REDACTED, {} chars])", self.0.expose_secret().len())
    }
}

// ============================================================================
// TTL POLICY
// ============================================================================

/// Default TTLs for read families whose data changes at different rates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TtlPolicy {
    /// Project listings and project metadata.
    pub project_list: Duration,
    /// Translated item queries and batch reads.
    pub item_query: Duration,
    /// Tracker field metadata.
    pub field_metadata: Duration,
    /// Root and child listings used by hierarchy walks.
    pub hierarchy: Duration,
}

impl Default for TtlPolicy {
    fn default() -> Self {
        Self {
            project_list: Duration::from_secs(600),
            item_query: Duration::from_secs(180),
            field_metadata: Duration::from_secs(3600),
            hierarchy: Duration::from_secs(600),
        }
    }
}

// ============================================================================
// QUARRY CONFIG
// ============================================================================

/// Construction-time configuration for one orchestrator instance.
#[derive(Debug, Clone)]
pub struct QuarryConfig {
    /// Base URL of the remote service, e.g. `https://tracker.example.com/api`.
    pub base_url: String,
    pub api_key: ApiKey,
    /// Maximum primitive calls per rolling 60-second window.
    pub max_calls_per_minute: u32,
    /// TTL for cached reads that have no family-specific TTL.
    pub default_cache_ttl: Duration,
    /// Verify TLS certificates of the remote service.
    pub ssl_verify: bool,
    pub request_timeout: Duration,
    pub ttls: TtlPolicy,
    /// Longest a call may wait for a rate slot; `None` waits indefinitely.
    pub acquire_timeout: Option<Duration>,
}

impl QuarryConfig {
    /// Build a configuration with defaults for everything but URL and key.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> QuarryResult<Self> {
        let config = Self {
            base_url: base_url.into(),
            api_key: ApiKey::new(api_key)?,
            max_calls_per_minute: DEFAULT_MAX_CALLS,
            default_cache_ttl: DEFAULT_CACHE_TTL,
            ssl_verify: true,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            ttls: TtlPolicy::default(),
            acquire_timeout: None,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_max_calls_per_minute(mut self, max: u32) -> Self {
        self.max_calls_per_minute = max;
        self
    }

    pub fn with_default_cache_ttl(mut self, ttl: Duration) -> Self {
        self.default_cache_ttl = ttl;
        self
    }

    pub fn with_ssl_verify(mut self, verify: bool) -> Self {
        self.ssl_verify = verify;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_ttls(mut self, ttls: TtlPolicy) -> Self {
        self.ttls = ttls;
        self
    }

    /// Fail calls with a timeout instead of waiting longer than `timeout` for a rate slot.
    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = Some(timeout);
        self
    }

    /// Load configuration from `QUARRY_*` environment variables.
    ///
    /// Required: `QUARRY_BASE_URL`, `QUARRY_API_KEY`.
    /// Optional: `QUARRY_MAX_CALLS` (60), `QUARRY_CACHE_TTL` seconds (300),
    /// `QUARRY_SSL_VERIFY` (true), `QUARRY_REQUEST_TIMEOUT_SECS` (30),
    /// `QUARRY_ACQUIRE_TIMEOUT_SECS` (unset, wait for a slot indefinitely).
    pub fn from_env() -> QuarryResult<Self> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an explicit variable lookup.
    pub fn from_vars<F>(lookup: F) -> QuarryResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_url = lookup("QUARRY_BASE_URL").ok_or_else(|| ConfigError::MissingRequired {
            field: "QUARRY_BASE_URL".to_string(),
        })?;
        let api_key = lookup("QUARRY_API_KEY").ok_or_else(|| ConfigError::MissingRequired {
            field: "QUARRY_API_KEY".to_string(),
        })?;

        let max_calls = parse_var(&lookup, "QUARRY_MAX_CALLS")?.unwrap_or(DEFAULT_MAX_CALLS);
        let cache_ttl = parse_var::<u64, _>(&lookup, "QUARRY_CACHE_TTL")?
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_CACHE_TTL);
        let timeout = parse_var::<u64, _>(&lookup, "QUARRY_REQUEST_TIMEOUT_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT);
        let acquire_timeout = parse_var::<u64, _>(&lookup, "QUARRY_ACQUIRE_TIMEOUT_SECS")?
            .map(Duration::from_secs);
        let ssl_verify = match lookup("QUARRY_SSL_VERIFY") {
            None => true,
            Some(raw) => parse_bool("QUARRY_SSL_VERIFY", &raw)?,
        };

        let config = Self {
            base_url,
            api_key: ApiKey::new(api_key)?,
            max_calls_per_minute: max_calls,
            default_cache_ttl: cache_ttl,
            ssl_verify,
            request_timeout: timeout,
            ttls: TtlPolicy::default(),
            acquire_timeout,
        };
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    pub fn from_path(path: &Path) -> QuarryResult<Self> {
        let display = path.display().to_string();
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: display.clone(),
            reason: e.to_string(),
        })?;
        let file: FileConfig = toml::from_str(&contents).map_err(|e| ConfigError::Parse {
            path: display,
            reason: e.to_string(),
        })?;
        file.into_config()
    }

    /// Load from the file named by `QUARRY_CONFIG`, else from the environment.
    pub fn load() -> QuarryResult<Self> {
        match std::env::var("QUARRY_CONFIG") {
            Ok(path) if !path.trim().is_empty() => Self::from_path(Path::new(&path)),
            _ => Self::from_env(),
        }
    }

    /// Validate the configuration.
    ///
    /// Validates:
    /// - base_url is an http(s) URL
    /// - max_calls_per_minute > 0
    /// - all durations, including a configured acquire timeout, are positive
    pub fn validate(&self) -> QuarryResult<()> {
        let url = self.base_url.trim();
        if url.is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "base_url".to_string(),
            }
            .into());
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(invalid("base_url", url, "must start with http:// or https://"));
        }
        if self.max_calls_per_minute == 0 {
            return Err(invalid("max_calls_per_minute", "0", "must be greater than 0"));
        }

        let durations = [
            ("default_cache_ttl", self.default_cache_ttl),
            ("request_timeout", self.request_timeout),
            ("ttls.project_list", self.ttls.project_list),
            ("ttls.item_query", self.ttls.item_query),
            ("ttls.field_metadata", self.ttls.field_metadata),
            ("ttls.hierarchy", self.ttls.hierarchy),
        ];
        for (field, value) in durations {
            if value.is_zero() {
                return Err(invalid(field, "0s", "must be positive"));
            }
        }
        if self.acquire_timeout.is_some_and(|t| t.is_zero()) {
            return Err(invalid("acquire_timeout", "0s", "must be positive"));
        }

        Ok(())
    }

    /// Base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        self.base_url.trim().trim_end_matches('/')
    }
}

fn invalid(field: &str, value: &str, reason: &str) -> crate::QuarryError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
    .into()
}

fn parse_var<T, F>(lookup: &F, name: &str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidValue {
                field: name.to_string(),
                value: raw.clone(),
                reason: e.to_string(),
            }),
    }
}

fn parse_bool(name: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            field: name.to_string(),
            value: raw.to_string(),
            reason: "expected true or false".to_string(),
        }),
    }
}

// ============================================================================
// FILE FORMAT
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    base_url: String,
    api_key: String,
    max_calls_per_minute: Option<u32>,
    default_cache_ttl_secs: Option<u64>,
    ssl_verify: Option<bool>,
    request_timeout_secs: Option<u64>,
    acquire_timeout_secs: Option<u64>,
    ttl: Option<FileTtl>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileTtl {
    project_list_secs: Option<u64>,
    item_query_secs: Option<u64>,
    field_metadata_secs: Option<u64>,
    hierarchy_secs: Option<u64>,
}

impl FileConfig {
    fn into_config(self) -> QuarryResult<QuarryConfig> {
        let defaults = TtlPolicy::default();
        let ttls = match self.ttl {
            None => defaults,
            Some(t) => TtlPolicy {
                project_list: t
                    .project_list_secs
                    .map_or(defaults.project_list, Duration::from_secs),
                item_query: t
                    .item_query_secs
                    .map_or(defaults.item_query, Duration::from_secs),
                field_metadata: t
                    .field_metadata_secs
                    .map_or(defaults.field_metadata, Duration::from_secs),
                hierarchy: t
                    .hierarchy_secs
                    .map_or(defaults.hierarchy, Duration::from_secs),
            },
        };

        let config = QuarryConfig {
            base_url: self.base_url,
            api_key: ApiKey::new(self.api_key)?,
            max_calls_per_minute: self.max_calls_per_minute.unwrap_or(DEFAULT_MAX_CALLS),
            default_cache_ttl: self
                .default_cache_ttl_secs
                .map_or(DEFAULT_CACHE_TTL, Duration::from_secs),
            ssl_verify: self.ssl_verify.unwrap_or(true),
            request_timeout: self
                .request_timeout_secs
                .map_or(DEFAULT_REQUEST_TIMEOUT, Duration::from_secs),
            ttls,
            acquire_timeout: self.acquire_timeout_secs.map(Duration::from_secs),
        };
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::QuarryError;
    use std::collections::HashMap;
    use std::io::Write;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_from_vars_defaults() {
        let config = QuarryConfig::from_vars(vars(&[
            ("QUARRY_BASE_URL", "https://tracker.example.com/api/"),
            ("QUARRY_API_KEY", "secret-key"),
        ]))
        .unwrap();
        assert_eq!(config.max_calls_per_minute, 60);
        assert_eq!(config.default_cache_ttl, Duration::from_secs(300));
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert!(config.ssl_verify);
        assert_eq!(config.base_url(), "https://tracker.example.com/api");
        assert_eq!(config.ttls, TtlPolicy::default());
        assert_eq!(config.acquire_timeout, None);
    }

    #[test]
    fn test_from_vars_overrides() {
        let config = QuarryConfig::from_vars(vars(&[
            ("QUARRY_BASE_URL", "http://localhost:8080"),
            ("QUARRY_API_KEY", "k"),
            ("QUARRY_MAX_CALLS", "120"),
            ("QUARRY_CACHE_TTL", "30"),
            ("QUARRY_SSL_VERIFY", "false"),
            ("QUARRY_REQUEST_TIMEOUT_SECS", "5"),
            ("QUARRY_ACQUIRE_TIMEOUT_SECS", "2"),
        ]))
        .unwrap();
        assert_eq!(config.max_calls_per_minute, 120);
        assert_eq!(config.default_cache_ttl, Duration::from_secs(30));
        assert!(!config.ssl_verify);
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.acquire_timeout, Some(Duration::from_secs(2)));
    }

    #[test]
    fn test_missing_credential_fails_fast() {
        let err = QuarryConfig::from_vars(vars(&[("QUARRY_BASE_URL", "https://x")])).unwrap_err();
        assert!(matches!(
            err,
            QuarryError::Config(ConfigError::MissingRequired { ref field }) if field == "QUARRY_API_KEY"
        ));

        let err = QuarryConfig::from_vars(vars(&[
            ("QUARRY_BASE_URL", "https://x"),
            ("QUARRY_API_KEY", "   "),
        ]))
        .unwrap_err();
        assert!(matches!(err, QuarryError::Config(ConfigError::MissingRequired { .. })));
    }

    #[test]
    fn test_malformed_values_rejected() {
        let err = QuarryConfig::from_vars(vars(&[
            ("QUARRY_BASE_URL", "https://x"),
            ("QUARRY_API_KEY", "k"),
            ("QUARRY_MAX_CALLS", "lots"),
        ]))
        .unwrap_err();
        assert!(matches!(err, QuarryError::Config(ConfigError::InvalidValue { .. })));

        assert!(QuarryConfig::new("ftp://x", "k").is_err());
        assert!(QuarryConfig::new("https://x", "k")
            .unwrap()
            .with_max_calls_per_minute(0)
            .validate()
            .is_err());
        assert!(QuarryConfig::from_vars(vars(&[
            ("QUARRY_BASE_URL", "https://x"),
            ("QUARRY_API_KEY", "k"),
            ("QUARRY_SSL_VERIFY", "maybe"),
        ]))
        .is_err());
        assert!(QuarryConfig::new("https://x", "k")
            .unwrap()
            .with_acquire_timeout(Duration::ZERO)
            .validate()
            .is_err());
    }

    #[test]
    fn test_api_key_is_redacted() {
        let config = QuarryConfig::new("https://x", "super-secret").unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("REDACTED"));
        assert_eq!(config.api_key.expose(), "super-secret");
    }

    #[test]
    fn test_from_path_reads_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
base_url = "https://tracker.example.com"
api_key = "from-file"
max_calls_per_minute = 30
acquire_timeout_secs = 10

[ttl]
item_query_secs = 60
"#
        )
        .unwrap();

        let config = QuarryConfig::from_path(file.path()).unwrap();
        assert_eq!(config.max_calls_per_minute, 30);
        assert_eq!(config.acquire_timeout, Some(Duration::from_secs(10)));
        assert_eq!(config.ttls.item_query, Duration::from_secs(60));
        assert_eq!(config.ttls.field_metadata, Duration::from_secs(3600));
    }

    #[test]
    fn test_from_path_rejects_unknown_fields() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "base_url = \"https://x\"\napi_key = \"k\"\nretries = 3"
        )
        .unwrap();
        let err = QuarryConfig::from_path(file.path()).unwrap_err();
        assert!(matches!(err, QuarryError::Config(ConfigError::Parse { .. })));
    }
}
