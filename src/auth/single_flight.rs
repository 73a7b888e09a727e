//! Usage: Single-flight coordination of token refreshes.
//!
//! The first caller that finds no pending refresh becomes the leader and spawns the
//! refresh work; every later caller subscribes to the same outcome. The pending slot
//! is cleared right before the outcome is published, so the next auth failure starts
//! a new cycle.

use crate::auth::refresh::TokenRefresher;
use crate::auth::token_store::{TokenPair, TokenStore};
use crate::shared::mutex_ext::MutexExt;
use crate::shared::security::{constant_time_eq, mask_token};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    Success(Arc<TokenPair>),
    Failure(String),
}

/// Receiving side of one in-flight refresh; `None` until the leader publishes.
type PendingRefresh = watch::Receiver<Option<RefreshOutcome>>;

/// Why a caller wants new credentials.
#[derive(Clone, Copy)]
enum Trigger<'a> {
    /// Unconditional (startup validation).
    Explicit,
    /// The server rejected this pair's access token.
    Rejected(&'a TokenPair),
    /// This pair is about to expire but is still usable.
    Expiring(&'a TokenPair),
}

impl<'a> Trigger<'a> {
    /// Pair the caller is holding; a newer stored pair already answers the request.
    fn held_pair(self) -> Option<&'a TokenPair> {
        match self {
            Trigger::Explicit => None,
            Trigger::Rejected(pair) | Trigger::Expiring(pair) => Some(pair),
        }
    }

    fn ends_session_on_failure(self) -> bool {
        !matches!(self, Trigger::Expiring(_))
    }
}

enum Joined {
    Ready(RefreshOutcome),
    Waiting(PendingRefresh),
}

struct CoordinatorInner {
    store: Arc<TokenStore>,
    refresher: Arc<dyn TokenRefresher>,
    pending: Mutex<Option<PendingRefresh>>,
}

#[derive(Clone)]
pub struct SingleFlightCoordinator {
    inner: Arc<CoordinatorInner>,
}

impl SingleFlightCoordinator {
    pub fn new(store: Arc<TokenStore>, refresher: Arc<dyn TokenRefresher>) -> Self {
        Self {
            inner: Arc::new(CoordinatorInner {
                store,
                refresher,
                pending: Mutex::new(None),
            }),
        }
    }

    /// Joins the in-flight refresh or starts one.
    ///
    /// Dropping the returned future detaches this caller only; the refresh keeps
    /// running for the remaining waiters. On failure the stored pair is cleared.
    pub async fn refresh(&self) -> RefreshOutcome {
        let basis = self.inner.store.get();
        let outcome = self.run(Trigger::Explicit).await;
        if let Some(basis) = basis {
            self.end_session_on_failure(&outcome, &basis);
        }
        outcome
    }

    /// Refresh after the server rejected `rejected`.
    ///
    /// Returns the stored pair without a network call when it no longer matches
    /// `rejected`. On failure the session is cleared.
    pub async fn refresh_rejected(&self, rejected: &TokenPair) -> RefreshOutcome {
        let outcome = self.run(Trigger::Rejected(rejected)).await;
        self.end_session_on_failure(&outcome, rejected);
        outcome
    }

    /// Refresh ahead of expiry. A failed cycle started here leaves the store untouched.
    pub async fn refresh_expiring(&self, expiring: &TokenPair) -> RefreshOutcome {
        self.run(Trigger::Expiring(expiring)).await
    }

    pub fn is_refreshing(&self) -> bool {
        self.inner
            .pending
            .lock_or_recover()
            .as_ref()
            .is_some_and(is_live)
    }

    async fn run(&self, trigger: Trigger<'_>) -> RefreshOutcome {
        let mut pending = match self.join_or_lead(trigger) {
            Joined::Ready(outcome) => return outcome,
            Joined::Waiting(pending) => pending,
        };
        let published = pending
            .wait_for(Option::is_some)
            .await
            .ok()
            .and_then(|outcome| (*outcome).clone());

        published.unwrap_or_else(|| {
            RefreshOutcome::Failure("token refresh ended without an outcome".to_string())
        })
    }

    // Covers cycles that did not clear the store themselves: ones led by an expiring
    // caller, and leaders that died before publishing.
    fn end_session_on_failure(&self, outcome: &RefreshOutcome, basis: &TokenPair) {
        if matches!(outcome, RefreshOutcome::Failure(_))
            && self.inner.store.clear_if_refresh_token(basis.refresh_token())
        {
            tracing::warn!(
                refresh_token = %mask_token(basis.refresh_token()),
                "session cleared after failed token refresh"
            );
        }
    }

    fn join_or_lead(&self, trigger: Trigger<'_>) -> Joined {
        let mut pending = self.inner.pending.lock_or_recover();
        if let Some(existing) = pending.as_ref().filter(|rx| is_live(rx)) {
            tracing::debug!("joining in-flight token refresh");
            return Joined::Waiting(existing.clone());
        }

        let snapshot = self.inner.store.get();
        if let (Some(held), Some(current)) = (trigger.held_pair(), snapshot.as_ref()) {
            if !same_access_token(held, current) {
                tracing::debug!("access token already rotated; skipping refresh");
                return Joined::Ready(RefreshOutcome::Success(Arc::clone(current)));
            }
        }

        let (tx, rx) = watch::channel(None);
        *pending = Some(rx.clone());
        drop(pending);

        let ends_session = trigger.ends_session_on_failure();
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let outcome = inner.run_refresh(snapshot, ends_session).await;
            let mut pending = inner.pending.lock_or_recover();
            *pending = None;
            tx.send_replace(Some(outcome));
        });
        Joined::Waiting(rx)
    }
}

fn same_access_token(a: &TokenPair, b: &TokenPair) -> bool {
    constant_time_eq(a.access_token().as_bytes(), b.access_token().as_bytes())
}

// A leader task that died before publishing leaves a closed channel behind.
fn is_live(pending: &PendingRefresh) -> bool {
    pending.has_changed().is_ok()
}

impl CoordinatorInner {
    async fn run_refresh(
        &self,
        snapshot: Option<Arc<TokenPair>>,
        ends_session: bool,
    ) -> RefreshOutcome {
        let Some(current) = snapshot else {
            return RefreshOutcome::Failure("no refresh token stored".to_string());
        };
        let refresh_token = current.refresh_token();
        tracing::info!(
            refresh_token = %mask_token(refresh_token),
            ends_session,
            "token refresh started"
        );

        match self.refresher.refresh(refresh_token).await {
            Ok(next) => {
                let next = Arc::new(next);
                if !self
                    .store
                    .replace_if_refresh_token(refresh_token, Arc::clone(&next))
                {
                    tracing::warn!("session changed while refreshing; refreshed pair discarded");
                    return RefreshOutcome::Failure(
                        "session changed while refreshing".to_string(),
                    );
                }
                tracing::info!(
                    access_token = %mask_token(next.access_token()),
                    expires_at = next.expires_at(),
                    "token refresh succeeded"
                );
                RefreshOutcome::Success(next)
            }
            Err(err) => {
                let cleared = ends_session && self.store.clear_if_refresh_token(refresh_token);
                tracing::warn!(cleared, "token refresh failed: {}", err);
                RefreshOutcome::Failure(err.to_string())
            }
        }
    }
}
