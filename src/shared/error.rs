//! Usage: Client error taxonomy (every variant renders as `CODE: message`).

pub type ClientResult<T> = Result<T, ClientError>;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ClientError {
    /// No token pair is stored; the caller has to log in first.
    #[error("AUTH_UNAUTHENTICATED: no access token available, login required")]
    Unauthenticated,

    #[error("AUTH_REFRESH_EXHAUSTED: request still unauthorized after token refresh")]
    RefreshExhausted,

    /// The refresh token itself was rejected. The token store has been cleared.
    #[error("AUTH_EXPIRED: {0}")]
    AuthExpired(String),

    #[error("TRANSPORT_ERROR: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("API_ERROR: server returned code={code} message={message}")]
    Api { code: i64, message: String },

    #[error("HTTP_ERROR: unexpected status={status}")]
    Http { status: u16 },

    #[error("DECODE_ERROR: {0}")]
    Decode(String),

    #[error("CONFIG_ERROR: {0}")]
    Config(String),
}

impl ClientError {
    /// Stable machine-readable code (the part before `:` in the display form).
    pub fn code(&self) -> &'static str {
        match self {
            ClientError::Unauthenticated => "AUTH_UNAUTHENTICATED",
            ClientError::RefreshExhausted => "AUTH_REFRESH_EXHAUSTED",
            ClientError::AuthExpired(_) => "AUTH_EXPIRED",
            ClientError::Transport(_) => "TRANSPORT_ERROR",
            ClientError::Api { .. } => "API_ERROR",
            ClientError::Http { .. } => "HTTP_ERROR",
            ClientError::Decode(_) => "DECODE_ERROR",
            ClientError::Config(_) => "CONFIG_ERROR",
        }
    }

    /// Errors that end the current session; the UI layer must re-authenticate.
    pub fn requires_login(&self) -> bool {
        matches!(
            self,
            ClientError::Unauthenticated
                | ClientError::RefreshExhausted
                | ClientError::AuthExpired(_)
        )
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(value: serde_json::Error) -> Self {
        ClientError::Decode(format!("invalid json payload: {value}"))
    }
}
