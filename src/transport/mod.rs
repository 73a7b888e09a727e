//! Usage: Request/response descriptors and the base HTTP transport the middleware chain ends in.

pub mod middleware;

use crate::infra::settings::ClientConfig;
use crate::shared::error::{ClientError, ClientResult};
use bytes::Bytes;
use futures_core::future::BoxFuture;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use url::Url;

pub use middleware::{Chain, DefaultHeaders, Middleware, Next, RequestLogging};

/// An outbound call, kept as plain data so it can be rebuilt and resent.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

impl ApiRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: Url) -> Self {
        Self::new(Method::POST, url)
    }

    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_json<T: Serialize>(mut self, payload: &T) -> ClientResult<Self> {
        let body = serde_json::to_vec(payload)?;
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        self.body = Some(Bytes::from(body));
        Ok(self)
    }

    #[must_use]
    pub fn with_form(mut self, fields: &[(&str, &str)]) -> Self {
        let encoded = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(fields)
            .finish();
        self.headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/x-www-form-urlencoded"),
        );
        self.body = Some(Bytes::from(encoded));
        self
    }

    /// Replaces any existing `Authorization` header with `Bearer <token>`.
    pub fn set_bearer(&mut self, token: &str) -> ClientResult<()> {
        let mut value = HeaderValue::from_str(&format!("Bearer {}", token.trim()))
            .map_err(|_| ClientError::Decode("access token is not a valid header value".into()))?;
        value.set_sensitive(true);
        self.headers.insert(AUTHORIZATION, value);
        Ok(())
    }

    pub fn bearer_token(&self) -> Option<&str> {
        self.headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
    }
}

/// A fully buffered response.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ApiResponse {
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn json<T: DeserializeOwned>(&self) -> ClientResult<T> {
        serde_json::from_slice(&self.body).map_err(Into::into)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// The network call at the end of every chain.
pub trait Transport: Send + Sync {
    fn send(&self, request: ApiRequest) -> BoxFuture<'_, ClientResult<ApiResponse>>;
}

/// `reqwest`-backed transport.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> ClientResult<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.connect_timeout() {
            builder = builder.connect_timeout(timeout);
        }
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
        })
    }

    /// Use an existing client (connection pool reuse).
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: ApiRequest) -> BoxFuture<'_, ClientResult<ApiResponse>> {
        Box::pin(async move {
            let mut builder = self
                .client
                .request(request.method, request.url)
                .headers(request.headers);
            if let Some(body) = request.body {
                builder = builder.body(body);
            }

            let response = builder.send().await?;
            let status = response.status();
            let headers = response.headers().clone();
            let body = response.bytes().await?;
            Ok(ApiResponse {
                status,
                headers,
                body,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(raw: &str) -> Url {
        raw.parse().expect("valid url")
    }

    #[test]
    fn form_body_is_url_encoded() {
        let req = ApiRequest::post(url("http://localhost/auth/refresh"))
            .with_form(&[("refreshToken", "r/1+2 3")]);
        assert_eq!(
            req.body.as_deref(),
            Some(b"refreshToken=r%2F1%2B2+3".as_slice())
        );
        assert_eq!(
            req.headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok()),
            Some("application/x-www-form-urlencoded")
        );
    }

    #[test]
    fn set_bearer_replaces_previous_token() {
        let mut req = ApiRequest::get(url("http://localhost/profile/me"));
        req.set_bearer("A1").expect("bearer");
        req.set_bearer("A2").expect("bearer");
        assert_eq!(req.bearer_token(), Some("A2"));
        assert_eq!(req.headers.get_all(AUTHORIZATION).iter().count(), 1);
        assert!(req.headers.get(AUTHORIZATION).is_some_and(|v| v.is_sensitive()));
    }

    #[test]
    fn set_bearer_rejects_control_characters() {
        let mut req = ApiRequest::get(url("http://localhost/"));
        let err = req.set_bearer("bad\ntoken").expect_err("must reject");
        assert_eq!(err.code(), "DECODE_ERROR");
    }

    #[test]
    fn response_json_reports_decode_error() {
        let resp = ApiResponse::new(StatusCode::OK, "not json");
        let err = resp
            .json::<serde_json::Value>()
            .expect_err("invalid json");
        assert_eq!(err.code(), "DECODE_ERROR");
    }
}
