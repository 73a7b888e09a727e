//! Usage: Authenticating middleware (bearer attach, refresh on auth failure, single resend).

use crate::auth::single_flight::{RefreshOutcome, SingleFlightCoordinator};
use crate::auth::token_store::{TokenPair, TokenStore};
use crate::infra::settings::ClientConfig;
use crate::shared::error::{ClientError, ClientResult};
use crate::shared::time::now_unix_seconds;
use crate::transport::{ApiRequest, ApiResponse, Middleware, Next};
use futures_core::future::BoxFuture;
use reqwest::StatusCode;
use std::sync::Arc;

/// A call may be resent once after its token was refreshed.
const MAX_AUTH_RETRIES: u8 = 1;

struct RequestContext {
    request: ApiRequest,
    retry_count: u8,
}

impl RequestContext {
    fn new(request: ApiRequest) -> Self {
        Self {
            request,
            retry_count: 0,
        }
    }

    fn authorized(&self, pair: &TokenPair) -> ClientResult<ApiRequest> {
        let mut request = self.request.clone();
        request.set_bearer(pair.access_token())?;
        Ok(request)
    }
}

pub struct RequestPipeline {
    store: Arc<TokenStore>,
    coordinator: SingleFlightCoordinator,
    auth_failure_status: StatusCode,
    proactive_refresh_lead_secs: i64,
}

impl RequestPipeline {
    pub fn new(
        store: Arc<TokenStore>,
        coordinator: SingleFlightCoordinator,
        config: &ClientConfig,
    ) -> Self {
        Self {
            store,
            coordinator,
            auth_failure_status: config.auth_failure_status(),
            proactive_refresh_lead_secs: i64::from(config.proactive_refresh_lead_secs),
        }
    }

    async fn execute(&self, mut ctx: RequestContext, next: Next<'_>) -> ClientResult<ApiResponse> {
        let mut pair = self.store.get().ok_or(ClientError::Unauthenticated)?;
        if self.expires_soon(&pair) {
            tracing::debug!(
                expires_at = pair.expires_at(),
                "access token about to expire; refreshing before send"
            );
            pair = self.refresh_ahead_of_expiry(pair).await?;
        }

        loop {
            let response = next.run(ctx.authorized(&pair)?).await?;
            if response.status != self.auth_failure_status {
                return Ok(response);
            }

            if ctx.retry_count >= MAX_AUTH_RETRIES {
                tracing::warn!(
                    method = %ctx.request.method,
                    url = %ctx.request.url,
                    "request rejected again after token refresh"
                );
                return Err(ClientError::RefreshExhausted);
            }
            ctx.retry_count += 1;

            if !self.store.is_signed_in() {
                return Err(ClientError::AuthExpired(
                    "session was cleared while the request was in flight".to_string(),
                ));
            }
            // Returns the stored pair directly when another request already rotated it.
            pair = match self.coordinator.refresh_rejected(&pair).await {
                RefreshOutcome::Success(fresh) => fresh,
                RefreshOutcome::Failure(reason) => return Err(ClientError::AuthExpired(reason)),
            };
        }
    }

    async fn refresh_ahead_of_expiry(&self, pair: Arc<TokenPair>) -> ClientResult<Arc<TokenPair>> {
        let reason = match self.coordinator.refresh_expiring(&pair).await {
            RefreshOutcome::Success(fresh) => return Ok(fresh),
            RefreshOutcome::Failure(reason) => reason,
        };
        match self.store.get() {
            Some(current) if !current.is_expired(now_unix_seconds()) => {
                tracing::warn!(
                    "early token refresh failed; sending with current token: {}",
                    reason
                );
                Ok(current)
            }
            _ => Err(ClientError::AuthExpired(reason)),
        }
    }

    fn expires_soon(&self, pair: &TokenPair) -> bool {
        self.proactive_refresh_lead_secs > 0
            && pair.expires_within(self.proactive_refresh_lead_secs, now_unix_seconds())
    }
}

impl Middleware for RequestPipeline {
    fn handle<'a>(
        &'a self,
        request: ApiRequest,
        next: Next<'a>,
    ) -> BoxFuture<'a, ClientResult<ApiResponse>> {
        Box::pin(self.execute(RequestContext::new(request), next))
    }
}
