//! Usage: Ordered middleware composition around a base `Transport`.
//!
//! A `Chain` runs its middlewares in insertion order; each one receives a `Next`
//! handle that runs the rest of the chain and may call it more than once.

use super::{ApiRequest, ApiResponse, Transport};
use crate::shared::error::{ClientError, ClientResult};
use crate::shared::security::mask_authorization;
use futures_core::future::BoxFuture;
use reqwest::header::{HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use std::sync::Arc;
use std::time::Instant;

pub trait Middleware: Send + Sync {
    fn handle<'a>(
        &'a self,
        request: ApiRequest,
        next: Next<'a>,
    ) -> BoxFuture<'a, ClientResult<ApiResponse>>;
}

/// The remainder of a chain.
#[derive(Clone, Copy)]
pub struct Next<'a> {
    middlewares: &'a [Arc<dyn Middleware>],
    transport: &'a dyn Transport,
}

impl<'a> Next<'a> {
    pub fn run(self, request: ApiRequest) -> BoxFuture<'a, ClientResult<ApiResponse>> {
        match self.middlewares.split_first() {
            Some((current, rest)) => current.handle(
                request,
                Next {
                    middlewares: rest,
                    transport: self.transport,
                },
            ),
            None => self.transport.send(request),
        }
    }
}

#[derive(Clone)]
pub struct Chain {
    middlewares: Vec<Arc<dyn Middleware>>,
    transport: Arc<dyn Transport>,
}

impl Chain {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            middlewares: Vec::new(),
            transport,
        }
    }

    #[must_use]
    pub fn with(mut self, middleware: impl Middleware + 'static) -> Self {
        self.middlewares.push(Arc::new(middleware));
        self
    }

    pub async fn send(&self, request: ApiRequest) -> ClientResult<ApiResponse> {
        Next {
            middlewares: &self.middlewares,
            transport: self.transport.as_ref(),
        }
        .run(request)
        .await
    }
}

/// Client identification headers, set only when the caller did not provide them.
#[derive(Debug, Clone)]
pub struct DefaultHeaders {
    user_agent: HeaderValue,
}

impl DefaultHeaders {
    pub fn new(user_agent: &str) -> ClientResult<Self> {
        let user_agent = HeaderValue::from_str(user_agent.trim())
            .map_err(|_| ClientError::Config(format!("invalid user agent: {user_agent:?}")))?;
        Ok(Self { user_agent })
    }
}

impl Middleware for DefaultHeaders {
    fn handle<'a>(
        &'a self,
        mut request: ApiRequest,
        next: Next<'a>,
    ) -> BoxFuture<'a, ClientResult<ApiResponse>> {
        request
            .headers
            .entry(USER_AGENT)
            .or_insert_with(|| self.user_agent.clone());
        request
            .headers
            .entry(ACCEPT)
            .or_insert_with(|| HeaderValue::from_static("application/json"));
        next.run(request)
    }
}

/// One `tracing` event per wire exchange; the bearer credential is masked.
#[derive(Debug, Clone, Copy)]
pub struct RequestLogging {
    client: &'static str,
}

impl RequestLogging {
    pub fn new(client: &'static str) -> Self {
        Self { client }
    }
}

impl Middleware for RequestLogging {
    fn handle<'a>(
        &'a self,
        request: ApiRequest,
        next: Next<'a>,
    ) -> BoxFuture<'a, ClientResult<ApiResponse>> {
        Box::pin(async move {
            let method = request.method.clone();
            let url = request.url.clone();
            let authorization = request
                .headers
                .get(AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .map(mask_authorization)
                .unwrap_or_default();
            let started = Instant::now();

            let result = next.run(request).await;
            let elapsed_ms = started.elapsed().as_millis() as u64;
            match &result {
                Ok(response) if response.status.is_success() => tracing::debug!(
                    client = self.client,
                    method = %method,
                    url = %url,
                    status = response.status.as_u16(),
                    elapsed_ms,
                    authorization = %authorization,
                    "http exchange completed"
                ),
                Ok(response) => tracing::warn!(
                    client = self.client,
                    method = %method,
                    url = %url,
                    status = response.status.as_u16(),
                    elapsed_ms,
                    authorization = %authorization,
                    "http exchange returned non-success status"
                ),
                Err(err) => tracing::warn!(
                    client = self.client,
                    method = %method,
                    url = %url,
                    elapsed_ms,
                    "http exchange failed: {}",
                    err
                ),
            }
            result
        })
    }
}
