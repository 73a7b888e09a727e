//! Usage: Backend wire models (response envelope, auth payloads, profile).

use crate::auth::token_store::TokenPair;
use crate::shared::error::{ClientError, ClientResult};
use crate::shared::security::sanitize_body_snippet;
use crate::transport::ApiResponse;
use base64::Engine as _;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Every backend response is wrapped as `{code, message, data}`; `code == 0` is success.
#[derive(Debug, Clone, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct Envelope<T> {
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Option<T>,
}

impl<T: DeserializeOwned> Envelope<T> {
    /// Decodes a typed response; a non-success HTTP status becomes `Http`.
    pub(crate) fn decode(response: &ApiResponse, operation: &'static str) -> ClientResult<Self> {
        if !response.is_success() {
            tracing::warn!(
                operation,
                status = response.status.as_u16(),
                body = %sanitize_body_snippet(&response.text()),
                "backend returned non-success status"
            );
            return Err(ClientError::Http {
                status: response.status.as_u16(),
            });
        }
        response.json()
    }
}

impl<T> Envelope<T> {
    pub fn into_data(self) -> ClientResult<T> {
        match (self.code, self.data) {
            (Some(0), Some(data)) => Ok(data),
            (Some(0), None) => Err(ClientError::Decode(
                "response envelope is missing data".to_string(),
            )),
            (code, _) => Err(api_error(code, self.message)),
        }
    }
}

fn api_error(code: Option<i64>, message: Option<String>) -> ClientError {
    ClientError::Api {
        code: code.unwrap_or(-1),
        message: message
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| "request failed".to_string()),
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<Value>,
}

impl TokenResponse {
    /// Builds the pair to store. A missing refresh token is rejected: tokens rotate on every use.
    pub fn into_token_pair(self, now_unix: i64) -> ClientResult<TokenPair> {
        let access_token = non_empty(self.access_token)
            .ok_or_else(|| ClientError::Decode("token response missing accessToken".into()))?;
        let refresh_token = non_empty(self.refresh_token)
            .ok_or_else(|| ClientError::Decode("token response missing refreshToken".into()))?;
        let expires_at = self
            .expires_in
            .as_ref()
            .and_then(parse_i64_lossy)
            .filter(|v| *v > 0)
            .map(|v| now_unix.saturating_add(v));
        TokenPair::new(access_token, refresh_token, expires_at)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_i64_lossy(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub identifier: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub captcha_id: String,
    pub captcha_code: String,
}

/// Captcha issued by the backend; the image is base64 encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Captcha {
    pub id: String,
    pub image_base64: String,
}

impl Captcha {
    /// Parses the backend's `"<captcha id>:<base64 image>"` payload.
    pub fn parse(raw: &str) -> ClientResult<Self> {
        let (id, image) = raw
            .split_once(':')
            .ok_or_else(|| ClientError::Decode(format!("invalid captcha payload: {raw:?}")))?;
        let (id, image) = (id.trim(), image.trim());
        if id.is_empty() || image.is_empty() {
            return Err(ClientError::Decode(format!(
                "invalid captcha payload: {raw:?}"
            )));
        }
        Ok(Self {
            id: id.to_string(),
            image_base64: image.to_string(),
        })
    }

    pub fn image_bytes(&self) -> ClientResult<Vec<u8>> {
        // Some backends send a data URL instead of bare base64.
        let encoded = self
            .image_base64
            .split_once("base64,")
            .map(|(_, rest)| rest)
            .unwrap_or(&self.image_base64);
        base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| ClientError::Decode(format!("captcha image is not base64: {e}")))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub user_id: i64,
    pub username: String,
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub signature: Option<String>,
    #[serde(default)]
    pub avatar_image: Option<String>,
    #[serde(default)]
    pub background_image: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

impl UserProfile {
    pub fn display_name(&self) -> &str {
        self.nickname
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or(&self.username)
    }
}
