//! Usage: Client configuration (schema, TOML loading, sanitization).

use crate::shared::error::{ClientError, ClientResult};
use reqwest::header::HeaderValue;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use url::Url;

pub const DEFAULT_SERVER_ENDPOINT: &str = "http://127.0.0.1:8080";
pub const DEFAULT_CONNECT_TIMEOUT_SECONDS: u32 = 30;
pub const DEFAULT_REQUEST_TIMEOUT_SECONDS: u32 = 0;
pub const DEFAULT_AUTH_FAILURE_STATUS: u16 = 401;
pub const DEFAULT_PROACTIVE_REFRESH_LEAD_SECONDS: u32 = 0;
const DEFAULT_LOG_FILTER: &str = "info";
const MAX_CONNECT_TIMEOUT_SECONDS: u32 = 10 * 60;
const MAX_REQUEST_TIMEOUT_SECONDS: u32 = 60 * 60;
const MAX_PROACTIVE_REFRESH_LEAD_SECONDS: u32 = 24 * 60 * 60;

fn default_user_agent() -> String {
    format!("synapse-net/{}", env!("CARGO_PKG_VERSION"))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the backend; every endpoint path is joined onto it.
    pub server_endpoint: String,
    pub connect_timeout_secs: u32,
    /// 0 disables the whole-request timeout.
    pub request_timeout_secs: u32,
    pub user_agent: String,
    /// Response status that triggers the refresh-and-resend flow.
    pub auth_failure_status: u16,
    /// Refresh before sending when the access token expires within this window; 0 disables.
    pub proactive_refresh_lead_secs: u32,
    /// Fallback `tracing` filter when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_endpoint: DEFAULT_SERVER_ENDPOINT.to_string(),
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECONDS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECONDS,
            user_agent: default_user_agent(),
            auth_failure_status: DEFAULT_AUTH_FAILURE_STATUS,
            proactive_refresh_lead_secs: DEFAULT_PROACTIVE_REFRESH_LEAD_SECONDS,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

fn sanitize_timeouts(config: &mut ClientConfig) -> bool {
    let mut changed = false;

    if config.connect_timeout_secs == 0 {
        config.connect_timeout_secs = DEFAULT_CONNECT_TIMEOUT_SECONDS;
        changed = true;
    }
    if config.connect_timeout_secs > MAX_CONNECT_TIMEOUT_SECONDS {
        config.connect_timeout_secs = MAX_CONNECT_TIMEOUT_SECONDS;
        changed = true;
    }
    if config.request_timeout_secs > MAX_REQUEST_TIMEOUT_SECONDS {
        config.request_timeout_secs = MAX_REQUEST_TIMEOUT_SECONDS;
        changed = true;
    }

    changed
}

fn sanitize_auth_failure_status(config: &mut ClientConfig) -> bool {
    let valid = StatusCode::from_u16(config.auth_failure_status)
        .map(|s| s.is_client_error())
        .unwrap_or(false);
    if !valid {
        config.auth_failure_status = DEFAULT_AUTH_FAILURE_STATUS;
        return true;
    }
    false
}

fn sanitize_proactive_refresh_lead(config: &mut ClientConfig) -> bool {
    if config.proactive_refresh_lead_secs > MAX_PROACTIVE_REFRESH_LEAD_SECONDS {
        config.proactive_refresh_lead_secs = MAX_PROACTIVE_REFRESH_LEAD_SECONDS;
        return true;
    }
    false
}

fn sanitize_text_fields(config: &mut ClientConfig) -> bool {
    let mut changed = false;

    let trimmed = config.server_endpoint.trim().trim_end_matches('/');
    if trimmed != config.server_endpoint {
        config.server_endpoint = trimmed.to_string();
        changed = true;
    }
    if config.user_agent.trim().is_empty() || HeaderValue::from_str(&config.user_agent).is_err() {
        config.user_agent = default_user_agent();
        changed = true;
    }
    if config.log_filter.trim().is_empty() {
        config.log_filter = DEFAULT_LOG_FILTER.to_string();
        changed = true;
    }

    changed
}

impl ClientConfig {
    #[must_use]
    pub fn with_server_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.server_endpoint = endpoint.into();
        self.sanitize();
        self
    }

    #[must_use]
    pub fn with_proactive_refresh_lead_secs(mut self, lead_secs: u32) -> Self {
        self.proactive_refresh_lead_secs = lead_secs;
        self.sanitize();
        self
    }

    /// Clamp out-of-range values; returns whether anything changed.
    pub fn sanitize(&mut self) -> bool {
        let mut changed = false;
        changed |= sanitize_timeouts(self);
        changed |= sanitize_auth_failure_status(self);
        changed |= sanitize_proactive_refresh_lead(self);
        changed |= sanitize_text_fields(self);
        changed
    }

    pub fn from_toml_str(content: &str) -> ClientResult<Self> {
        let mut config: ClientConfig = toml::from_str(content)
            .map_err(|e| ClientError::Config(format!("invalid config toml: {e}")))?;
        if config.sanitize() {
            tracing::debug!("client config contained out-of-range values; sanitized");
        }
        config.server_url()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> ClientResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ClientError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn server_url(&self) -> ClientResult<Url> {
        let url = Url::parse(self.server_endpoint.trim()).map_err(|e| {
            ClientError::Config(format!(
                "invalid server_endpoint {:?}: {e}",
                self.server_endpoint
            ))
        })?;
        if !matches!(url.scheme(), "http" | "https") || url.cannot_be_a_base() {
            return Err(ClientError::Config(format!(
                "server_endpoint must be an absolute http(s) url: {:?}",
                self.server_endpoint
            )));
        }
        Ok(url)
    }

    /// `server_endpoint` joined with `path`; any path prefix on the endpoint is kept.
    pub fn endpoint(&self, path: &str) -> ClientResult<Url> {
        let base = self.server_url()?;
        let joined = format!(
            "{}/{}",
            base.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        Url::parse(&joined)
            .map_err(|e| ClientError::Config(format!("invalid endpoint path {path:?}: {e}")))
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        (self.connect_timeout_secs > 0).then(|| Duration::from_secs(self.connect_timeout_secs.into()))
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_secs > 0).then(|| Duration::from_secs(self.request_timeout_secs.into()))
    }

    pub fn auth_failure_status(&self) -> StatusCode {
        StatusCode::from_u16(self.auth_failure_status).unwrap_or(StatusCode::UNAUTHORIZED)
    }
}
