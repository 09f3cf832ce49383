//! Configuration for the prediction service client.

use std::env;
use std::time::Duration;

use crate::{Error, Result};

/// Service root used when `API_BASE_URL` is not set.
pub const DEFAULT_BASE_URL: &str = "http://localhost:5000";
/// Total per-request timeout used when `API_TIMEOUT_SECS` is not set.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
/// Connect timeout used when `API_CONNECT_TIMEOUT_SECS` is not set.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Remote endpoints exposed by the prediction service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Predict,
    Feedback,
    Heatmap,
    Metrics,
}

impl Endpoint {
    pub fn path(self) -> &'static str {
        match self {
            Endpoint::Predict => "/api/predict",
            Endpoint::Feedback => "/api/feedback",
            Endpoint::Heatmap => "/api/heatmap",
            Endpoint::Metrics => "/api/metrics",
        }
    }
}

/// Header presets recognized by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderPreset {
    /// Parameter-style GET requests.
    Json,
    /// Image uploads. The transport writes the content type itself so the
    /// boundary parameter is included; a fixed value here breaks the upload.
    Multipart,
    /// Url-encoded form posts; the transport sets the content type.
    Form,
}

impl HeaderPreset {
    /// Content type to set explicitly, if any.
    pub fn content_type(self) -> Option<&'static str> {
        match self {
            HeaderPreset::Json => Some("application/json"),
            HeaderPreset::Multipart | HeaderPreset::Form => None,
        }
    }
}

/// Client configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Service root, without a trailing slash
    pub api_base_url: String,
    /// Total timeout applied to every request
    pub timeout: Duration,
    /// Timeout for establishing the connection
    pub connect_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }
}

impl Config {
    /// Configuration pointing at `base_url` with default timeouts.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            api_base_url: base_url.trim_end_matches('/').to_string(),
            timeout: DEFAULT_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let base_url = lookup("API_BASE_URL")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let mut config = Self::with_base_url(base_url.trim());
        if let Some(raw) = lookup("API_TIMEOUT_SECS") {
            config.timeout = parse_secs("API_TIMEOUT_SECS", &raw)?;
        }
        if let Some(raw) = lookup("API_CONNECT_TIMEOUT_SECS") {
            config.connect_timeout = parse_secs("API_CONNECT_TIMEOUT_SECS", &raw)?;
        }
        Ok(config)
    }

    /// Override the total request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Full URL of an endpoint.
    pub fn endpoint(&self, endpoint: Endpoint) -> String {
        format!("{}{}", self.api_base_url, endpoint.path())
    }
}

fn parse_secs(key: &str, raw: &str) -> Result<Duration> {
    match raw.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
        _ => Err(Error::Config(format!(
            "{} must be a positive number of seconds, got {:?}",
            key, raw
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_env_missing() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.api_base_url, "http://localhost:5000");
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_endpoints_from_base_url() {
        let config =
            Config::from_lookup(lookup(&[("API_BASE_URL", "https://plants.example.com/")]))
                .unwrap();
        assert_eq!(
            config.endpoint(Endpoint::Predict),
            "https://plants.example.com/api/predict"
        );
        assert_eq!(
            config.endpoint(Endpoint::Feedback),
            "https://plants.example.com/api/feedback"
        );
        assert_eq!(
            config.endpoint(Endpoint::Heatmap),
            "https://plants.example.com/api/heatmap"
        );
        assert_eq!(
            config.endpoint(Endpoint::Metrics),
            "https://plants.example.com/api/metrics"
        );
    }

    #[test]
    fn test_invalid_timeout_rejected() {
        let err = Config::from_lookup(lookup(&[("API_TIMEOUT_SECS", "0")])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let err =
            Config::from_lookup(lookup(&[("API_CONNECT_TIMEOUT_SECS", "soon")])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_multipart_preset_leaves_content_type_to_transport() {
        assert_eq!(HeaderPreset::Json.content_type(), Some("application/json"));
        assert_eq!(HeaderPreset::Multipart.content_type(), None);
    }
}
