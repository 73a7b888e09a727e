//! Usage: Refresh-token exchange and validation against the unauthenticated auth endpoints.

use crate::api::models::{Envelope, TokenResponse};
use crate::auth::token_store::TokenPair;
use crate::shared::error::ClientResult;
use crate::shared::security::mask_token;
use crate::shared::time::now_unix_seconds;
use crate::transport::{ApiRequest, ApiResponse, Chain};
use futures_core::future::BoxFuture;
use serde_json::Value;
use url::Url;

/// Exchanges a refresh token for a new pair.
pub trait TokenRefresher: Send + Sync {
    fn refresh<'a>(&'a self, refresh_token: &'a str) -> BoxFuture<'a, ClientResult<TokenPair>>;
}

/// Talks only to the refresh and validate endpoints.
///
/// Its chain is built without the authenticating middleware, so it never attaches
/// the access token being replaced and never re-enters 401 handling.
pub struct RefreshClient {
    chain: Chain,
    refresh_url: Url,
    validate_url: Url,
}

impl RefreshClient {
    pub fn new(chain: Chain, refresh_url: Url, validate_url: Url) -> Self {
        Self {
            chain,
            refresh_url,
            validate_url,
        }
    }

    /// Asks the server whether `refresh_token` is still accepted without rotating it.
    pub async fn validate(&self, refresh_token: &str) -> ClientResult<()> {
        let request = ApiRequest::post(self.validate_url.clone())
            .with_form(&[("token", refresh_token.trim())]);
        let response = self.chain.send(request).await?;
        parse_validation_response(&response)
    }

    async fn exchange(&self, refresh_token: &str) -> ClientResult<TokenPair> {
        let request = ApiRequest::post(self.refresh_url.clone())
            .with_form(&[("refreshToken", refresh_token.trim())]);
        let response = self.chain.send(request).await?;
        parse_token_response(&response, "token refresh")
    }
}

impl TokenRefresher for RefreshClient {
    fn refresh<'a>(&'a self, refresh_token: &'a str) -> BoxFuture<'a, ClientResult<TokenPair>> {
        Box::pin(async move {
            let result = self.exchange(refresh_token).await;
            if let Err(err) = &result {
                tracing::warn!(
                    refresh_token = %mask_token(refresh_token),
                    url = %self.refresh_url,
                    "refresh token exchange failed: {}",
                    err
                );
            }
            result
        })
    }
}

/// Decodes a login or refresh response into a `TokenPair`.
pub(crate) fn parse_token_response(
    response: &ApiResponse,
    operation: &'static str,
) -> ClientResult<TokenPair> {
    Envelope::<TokenResponse>::decode(response, operation)?
        .into_data()?
        .into_token_pair(now_unix_seconds())
}

/// Accepted only when the envelope succeeds and carries data.
fn parse_validation_response(response: &ApiResponse) -> ClientResult<()> {
    Envelope::<Value>::decode(response, "token validation")?
        .into_data()
        .map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::error::ClientError;
    use reqwest::StatusCode;
    use serde_json::json;

    fn json_response(status: StatusCode, body: serde_json::Value) -> ApiResponse {
        ApiResponse::new(status, serde_json::to_vec(&body).expect("encode"))
    }

    #[test]
    fn parse_token_response_accepts_success_envelope() {
        let resp = json_response(
            StatusCode::OK,
            json!({"code": 0, "message": "ok", "data": {"accessToken": "A2", "refreshToken": "R2"}}),
        );
        let pair = parse_token_response(&resp, "test").expect("pair");
        assert_eq!(pair.access_token(), "A2");
        assert_eq!(pair.refresh_token(), "R2");
    }

    #[test]
    fn parse_token_response_maps_status_to_http_error() {
        let resp = json_response(
            StatusCode::UNAUTHORIZED,
            json!({"code": 401, "message": "refresh token expired"}),
        );
        assert!(matches!(
            parse_token_response(&resp, "test"),
            Err(ClientError::Http { status: 401 })
        ));
    }

    #[test]
    fn parse_token_response_maps_rejected_code_to_api_error() {
        let resp = json_response(
            StatusCode::OK,
            json!({"code": 40102, "message": "refresh token revoked"}),
        );
        assert!(matches!(
            parse_token_response(&resp, "test"),
            Err(ClientError::Api { code: 40102, .. })
        ));
    }

    #[test]
    fn parse_token_response_rejects_garbage_body() {
        let resp = ApiResponse::new(StatusCode::OK, "<html>bad gateway</html>");
        assert_eq!(
            parse_token_response(&resp, "test").expect_err("garbage").code(),
            "DECODE_ERROR"
        );
    }

    #[test]
    fn validation_requires_success_code_and_data() {
        let accepted = json_response(
            StatusCode::OK,
            json!({"code": 0, "message": "ok", "data": "user-7"}),
        );
        assert!(parse_validation_response(&accepted).is_ok());

        let empty = json_response(StatusCode::OK, json!({"code": 0, "data": null}));
        assert!(parse_validation_response(&empty).is_err());

        let revoked = json_response(
            StatusCode::OK,
            json!({"code": 40102, "message": "token revoked", "data": null}),
        );
        assert!(matches!(
            parse_validation_response(&revoked),
            Err(ClientError::Api { code: 40102, .. })
        ));
    }
}
