//! Usage: Token lifecycle (storage, refresh exchange, single-flight coordination, request pipeline).

pub mod pipeline;
pub mod refresh;
pub mod single_flight;
pub mod token_store;

pub use pipeline::RequestPipeline;
pub use refresh::{RefreshClient, TokenRefresher};
pub use single_flight::{RefreshOutcome, SingleFlightCoordinator};
pub use token_store::{SessionState, TokenPair, TokenStore};
