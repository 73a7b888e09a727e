//! Authenticated HTTP client core: in-memory token storage, single-flight token refresh,
//! and a middleware pipeline that retries a request once after refreshing its credentials.

pub mod api;
pub mod auth;
pub mod infra;
pub mod shared;
pub mod transport;

pub use api::{ApiClient, Captcha, RegisterRequest, StartupValidation, UserProfile};
pub use auth::{
    RefreshClient, RefreshOutcome, RequestPipeline, SessionState, SingleFlightCoordinator,
    TokenPair, TokenRefresher, TokenStore,
};
pub use infra::settings::ClientConfig;
pub use shared::error::{ClientError, ClientResult};
pub use transport::{ApiRequest, ApiResponse, Chain, HttpTransport, Middleware, Next, Transport};
