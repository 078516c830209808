//! Runtime configuration.
//!
//! Configuration is resolved once at process startup and then passed into services. Request
//! handling never reads process-wide environment variables. Missing upstream values are not a
//! startup failure: the process starts regardless and [`UpstreamConfig::validate`] reports the
//! specific missing value on each request that needs it.

use crate::constants::{
    AZURE_OPENAI_DOMAIN, DEFAULT_REST_ADDR, DEFAULT_STATIC_DIR, ENV_AZURE_OPENAI_API_KEY,
    ENV_AZURE_OPENAI_API_VERSION, ENV_AZURE_OPENAI_DEPLOYMENT, ENV_AZURE_OPENAI_ENDPOINT,
    ENV_DONE_MARKER, ENV_JWKS_URL, ENV_REST_ADDR, ENV_STATIC_DIR,
};
use crate::error::{ConfigError, ConfigResult};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Upstream provider settings as read at startup. Any value may be absent.
#[derive(Clone, Default)]
pub struct UpstreamConfig {
    endpoint: Option<String>,
    api_key: Option<String>,
    api_version: Option<String>,
    deployment: Option<String>,
}

impl UpstreamConfig {
    /// Create a new `UpstreamConfig`.
    ///
    /// Empty or whitespace-only values are treated as absent.
    pub fn new(
        endpoint: Option<String>,
        api_key: Option<String>,
        api_version: Option<String>,
        deployment: Option<String>,
    ) -> Self {
        Self {
            endpoint: non_blank(endpoint),
            api_key: non_blank(api_key),
            api_version: non_blank(api_version),
            deployment: non_blank(deployment),
        }
    }

    /// Read the four `AZURE_OPENAI_*` variables from the process environment.
    pub fn from_env() -> Self {
        Self::new(
            std::env::var(ENV_AZURE_OPENAI_ENDPOINT).ok(),
            std::env::var(ENV_AZURE_OPENAI_API_KEY).ok(),
            std::env::var(ENV_AZURE_OPENAI_API_VERSION).ok(),
            std::env::var(ENV_AZURE_OPENAI_DEPLOYMENT).ok(),
        )
    }

    /// Check that every value needed to reach the provider is present.
    ///
    /// Checks run in a fixed order (endpoint, key, deployment, API version) and the first
    /// failure is returned.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` naming the first missing or malformed value.
    pub fn validate(&self) -> ConfigResult<UpstreamTarget> {
        let endpoint = self
            .endpoint
            .as_deref()
            .filter(|e| e.contains(AZURE_OPENAI_DOMAIN))
            .ok_or(ConfigError::InvalidEndpoint)?;
        let api_key = self.api_key.as_deref().ok_or(ConfigError::MissingApiKey)?;
        let deployment = self
            .deployment
            .as_deref()
            .ok_or(ConfigError::MissingDeployment)?;
        let api_version = self
            .api_version
            .as_deref()
            .ok_or(ConfigError::MissingApiVersion)?;

        Ok(UpstreamTarget {
            endpoint: endpoint.trim().trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            api_version: api_version.trim().to_string(),
            deployment: deployment.trim().to_string(),
        })
    }
}

impl std::fmt::Debug for UpstreamConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("api_version", &self.api_version)
            .field("deployment", &self.deployment)
            .finish()
    }
}

/// A fully validated upstream target.
#[derive(Clone, PartialEq, Eq)]
pub struct UpstreamTarget {
    endpoint: String,
    api_key: String,
    api_version: String,
    deployment: String,
}

impl UpstreamTarget {
    /// Target pointing at an arbitrary endpoint, for tests against a local server.
    #[cfg(test)]
    pub(crate) fn for_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: "test-key".into(),
            api_version: "2024-01-01".into(),
            deployment: "gpt-test".into(),
        }
    }

    /// Resource endpoint without a trailing slash.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    pub fn deployment(&self) -> &str {
        &self.deployment
    }

    /// Chat-completions URL for the configured deployment and API version.
    pub fn chat_completions_url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.endpoint, self.deployment, self.api_version
        )
    }
}

impl std::fmt::Debug for UpstreamTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamTarget")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"<redacted>")
            .field("api_version", &self.api_version)
            .field("deployment", &self.deployment)
            .finish()
    }
}

/// HTTP server settings resolved at startup.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    rest_addr: SocketAddr,
    static_dir: PathBuf,
    jwks_url: Option<String>,
    done_marker: bool,
}

impl ServerConfig {
    /// Build server settings from optional raw values.
    ///
    /// Absent values fall back to `0.0.0.0:8000` and `static/`. An absent key-set URL is
    /// allowed; callers decide how to treat protected routes without one. The done marker is
    /// off unless the flag reads as true.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidAddress` if the listen address cannot be parsed.
    pub fn from_env_values(
        rest_addr: Option<String>,
        static_dir: Option<String>,
        jwks_url: Option<String>,
        done_marker: Option<String>,
    ) -> ConfigResult<Self> {
        let raw_addr = non_blank(rest_addr).unwrap_or_else(|| DEFAULT_REST_ADDR.into());
        let rest_addr = raw_addr
            .trim()
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidAddress(format!("{raw_addr}: {e}")))?;
        let static_dir =
            PathBuf::from(non_blank(static_dir).unwrap_or_else(|| DEFAULT_STATIC_DIR.into()));

        Ok(Self {
            rest_addr,
            static_dir,
            jwks_url: non_blank(jwks_url),
            done_marker: done_marker.as_deref().is_some_and(is_truthy),
        })
    }

    /// Read `CONSULT_REST_ADDR`, `CONSULT_STATIC_DIR`, `CLERK_JWKS_URL` and `CONSULT_DONE_MARKER`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidAddress` if `CONSULT_REST_ADDR` is not a socket address.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_env_values(
            std::env::var(ENV_REST_ADDR).ok(),
            std::env::var(ENV_STATIC_DIR).ok(),
            std::env::var(ENV_JWKS_URL).ok(),
            std::env::var(ENV_DONE_MARKER).ok(),
        )
    }

    pub fn rest_addr(&self) -> SocketAddr {
        self.rest_addr
    }

    pub fn static_dir(&self) -> &Path {
        &self.static_dir
    }

    pub fn jwks_url(&self) -> Option<&str> {
        self.jwks_url.as_deref()
    }

    /// Whether successful streams end with an explicit `done` event.
    pub fn done_marker(&self) -> bool {
        self.done_marker
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_config() -> UpstreamConfig {
        UpstreamConfig::new(
            Some("https://foo.openai.azure.com/".into()),
            Some("k".into()),
            Some("2024-01-01".into()),
            Some("gpt-x".into()),
        )
    }

    #[test]
    fn test_validate_accepts_complete_config() {
        let target = full_config().validate().expect("config should validate");
        assert_eq!(target.endpoint(), "https://foo.openai.azure.com");
        assert_eq!(target.api_key(), "k");
        assert_eq!(target.deployment(), "gpt-x");
        assert_eq!(target.api_version(), "2024-01-01");
        assert_eq!(
            target.chat_completions_url(),
            "https://foo.openai.azure.com/openai/deployments/gpt-x/chat/completions?api-version=2024-01-01"
        );
    }

    #[test]
    fn test_validate_rejects_missing_or_foreign_endpoint() {
        let missing = UpstreamConfig::new(None, Some("k".into()), Some("v".into()), Some("d".into()));
        assert_eq!(missing.validate(), Err(ConfigError::InvalidEndpoint));

        let foreign = UpstreamConfig::new(
            Some("https://api.openai.com/v1".into()),
            Some("k".into()),
            Some("v".into()),
            Some("d".into()),
        );
        assert_eq!(foreign.validate(), Err(ConfigError::InvalidEndpoint));
    }

    #[test]
    fn test_validate_reports_each_missing_value() {
        let endpoint = Some("https://foo.openai.azure.com/".to_string());

        let no_key = UpstreamConfig::new(endpoint.clone(), None, Some("v".into()), Some("d".into()));
        assert_eq!(no_key.validate(), Err(ConfigError::MissingApiKey));

        let no_deployment =
            UpstreamConfig::new(endpoint.clone(), Some("k".into()), Some("v".into()), None);
        assert_eq!(no_deployment.validate(), Err(ConfigError::MissingDeployment));

        let no_version = UpstreamConfig::new(endpoint, Some("k".into()), None, Some("d".into()));
        assert_eq!(no_version.validate(), Err(ConfigError::MissingApiVersion));
    }

    #[test]
    fn test_validate_checks_in_fixed_order() {
        let empty = UpstreamConfig::default();
        assert_eq!(empty.validate(), Err(ConfigError::InvalidEndpoint));

        let only_endpoint =
            UpstreamConfig::new(Some("https://foo.openai.azure.com".into()), None, None, None);
        assert_eq!(only_endpoint.validate(), Err(ConfigError::MissingApiKey));
    }

    #[test]
    fn test_blank_values_count_as_missing() {
        let cfg = UpstreamConfig::new(
            Some("https://foo.openai.azure.com".into()),
            Some("   ".into()),
            Some("v".into()),
            Some("d".into()),
        );
        assert_eq!(cfg.validate(), Err(ConfigError::MissingApiKey));
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let cfg = full_config();
        assert!(!format!("{cfg:?}").contains("\"k\""));
        let target = cfg.validate().unwrap();
        assert!(format!("{target:?}").contains("<redacted>"));
    }

    #[test]
    fn test_server_config_defaults() {
        let cfg = ServerConfig::from_env_values(None, None, None, None).unwrap();
        assert_eq!(cfg.rest_addr().to_string(), "0.0.0.0:8000");
        assert_eq!(cfg.static_dir(), Path::new("static"));
        assert_eq!(cfg.jwks_url(), None);
        assert!(!cfg.done_marker());
    }

    #[test]
    fn test_server_config_done_marker_flag() {
        for on in ["1", "true", "TRUE", " yes ", "on"] {
            let cfg = ServerConfig::from_env_values(None, None, None, Some(on.into())).unwrap();
            assert!(cfg.done_marker(), "{on:?} should enable the done marker");
        }
        for off in ["", "0", "false", "no", "maybe"] {
            let cfg = ServerConfig::from_env_values(None, None, None, Some(off.into())).unwrap();
            assert!(!cfg.done_marker(), "{off:?} should leave the done marker off");
        }
    }

    #[test]
    fn test_server_config_rejects_bad_address() {
        let err = ServerConfig::from_env_values(Some("not-an-addr".into()), None, None, None)
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidAddress(_)));
    }
}
