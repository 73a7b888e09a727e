//! Usage: Typed backend client (composition root for the transport chains and token lifecycle).
//!
//! Three chains share one transport:
//! - `public`: captcha, registration and login; no credentials attached.
//! - `authed`: everything behind the `RequestPipeline`.
//! - refresh: owned by the `RefreshClient` (refresh and validate); never carries the access token.

use crate::api::models::{Captcha, Envelope, LoginRequest, RegisterRequest, UserProfile};
use crate::auth::pipeline::RequestPipeline;
use crate::auth::refresh::{parse_token_response, RefreshClient};
use crate::auth::single_flight::{RefreshOutcome, SingleFlightCoordinator};
use crate::auth::token_store::{SessionState, TokenStore};
use crate::infra::settings::ClientConfig;
use crate::shared::error::ClientResult;
use crate::shared::security::mask_token;
use crate::transport::{
    ApiRequest, ApiResponse, Chain, DefaultHeaders, HttpTransport, RequestLogging, Transport,
};
use std::sync::Arc;
use tokio::sync::watch;
use url::Url;

const LOGIN_PATH: &str = "/auth/login";
const REFRESH_PATH: &str = "/auth/refresh";
const VALIDATE_PATH: &str = "/auth/validate";
const CAPTCHA_PATH: &str = "/auth/captcha";
const REGISTER_PATH: &str = "/registration/register";
const PROFILE_PATH: &str = "/profile/me";

/// Result of checking stored credentials when the application starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartupValidation {
    NoTokens,
    Refreshed,
    Invalid { reason: String },
}

pub struct ApiClient {
    config: ClientConfig,
    store: Arc<TokenStore>,
    refresher: Arc<RefreshClient>,
    coordinator: SingleFlightCoordinator,
    authed: Chain,
    public: Chain,
}

impl ApiClient {
    pub fn new(config: ClientConfig) -> ClientResult<Self> {
        let transport = Arc::new(HttpTransport::new(&config)?);
        Self::with_parts(config, transport, Arc::new(TokenStore::new()))
    }

    /// Wires the client over an explicit transport and store.
    pub fn with_parts(
        mut config: ClientConfig,
        transport: Arc<dyn Transport>,
        store: Arc<TokenStore>,
    ) -> ClientResult<Self> {
        config.sanitize();
        let headers = DefaultHeaders::new(&config.user_agent)?;

        let refresh_chain = Chain::new(Arc::clone(&transport))
            .with(headers.clone())
            .with(RequestLogging::new("refresh"));
        let refresher = Arc::new(RefreshClient::new(
            refresh_chain,
            config.endpoint(REFRESH_PATH)?,
            config.endpoint(VALIDATE_PATH)?,
        ));
        let coordinator = SingleFlightCoordinator::new(Arc::clone(&store), refresher.clone());

        let authed = Chain::new(Arc::clone(&transport))
            .with(headers.clone())
            .with(RequestPipeline::new(
                Arc::clone(&store),
                coordinator.clone(),
                &config,
            ))
            .with(RequestLogging::new("authed"));
        let public = Chain::new(transport)
            .with(headers)
            .with(RequestLogging::new("public"));

        tracing::debug!(
            server_endpoint = %config.server_endpoint,
            auth_failure_status = config.auth_failure_status,
            "api client ready"
        );
        Ok(Self {
            config,
            store,
            refresher,
            coordinator,
            authed,
            public,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn token_store(&self) -> &Arc<TokenStore> {
        &self.store
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.store.subscribe()
    }

    pub fn endpoint(&self, path: &str) -> ClientResult<Url> {
        self.config.endpoint(path)
    }

    pub async fn fetch_captcha(&self) -> ClientResult<Captcha> {
        let request = ApiRequest::get(self.endpoint(CAPTCHA_PATH)?);
        let response = self.public.send(request).await?;
        let raw = Envelope::<String>::decode(&response, "captcha")?.into_data()?;
        Captcha::parse(&raw)
    }

    /// Returns the `data` string the server sends back for a new account.
    pub async fn register(&self, form: &RegisterRequest) -> ClientResult<String> {
        let request = ApiRequest::post(self.endpoint(REGISTER_PATH)?).with_json(form)?;
        let response = self.public.send(request).await?;
        let data = Envelope::<String>::decode(&response, "register")?.into_data()?;
        tracing::info!(username = %form.username, "registration accepted");
        Ok(data)
    }

    /// Exchanges credentials for a token pair and stores it.
    pub async fn login(&self, identifier: &str, password: &str) -> ClientResult<()> {
        let payload = LoginRequest {
            identifier: identifier.trim().to_string(),
            password: password.to_string(),
        };
        let request = ApiRequest::post(self.endpoint(LOGIN_PATH)?).with_json(&payload)?;
        let response = self.public.send(request).await?;
        let pair = parse_token_response(&response, "login")?;
        tracing::info!(
            identifier = %payload.identifier,
            access_token = %mask_token(pair.access_token()),
            expires_at = pair.expires_at(),
            "login succeeded"
        );
        self.store.set(pair);
        Ok(())
    }

    pub async fn profile(&self) -> ClientResult<UserProfile> {
        let request = ApiRequest::get(self.endpoint(PROFILE_PATH)?);
        let response = self.authed.send(request).await?;
        Envelope::<UserProfile>::decode(&response, "profile")?.into_data()
    }

    pub fn logout(&self) {
        self.store.clear();
        tracing::info!("logged out; tokens cleared");
    }

    /// Checks the stored refresh token with the server, then runs one refresh cycle.
    ///
    /// Any failure clears the stored pair.
    pub async fn validate_on_startup(&self) -> StartupValidation {
        let Some(stored) = self.store.get() else {
            return StartupValidation::NoTokens;
        };
        if let Err(err) = self.refresher.validate(stored.refresh_token()).await {
            self.store.clear_if_refresh_token(stored.refresh_token());
            tracing::warn!(
                refresh_token = %mask_token(stored.refresh_token()),
                "stored refresh token failed validation: {}",
                err
            );
            return StartupValidation::Invalid {
                reason: err.to_string(),
            };
        }
        match self.coordinator.refresh().await {
            RefreshOutcome::Success(_) => StartupValidation::Refreshed,
            RefreshOutcome::Failure(reason) => {
                tracing::warn!("stored credentials rejected at startup: {}", reason);
                StartupValidation::Invalid { reason }
            }
        }
    }

    /// Authenticated call for endpoints without a typed wrapper.
    pub async fn send(&self, request: ApiRequest) -> ClientResult<ApiResponse> {
        self.authed.send(request).await
    }
}
