//! Usage: In-memory token pair storage with whole-pair swaps and session change notifications.

use crate::shared::error::{ClientError, ClientResult};
use crate::shared::mutex_ext::MutexExt;
use crate::shared::security::mask_token;
use crate::shared::time::now_unix_seconds;
use std::fmt;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

/// Access/refresh credentials issued together. Never mutated in place.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenPair {
    access_token: String,
    refresh_token: String,
    expires_at: Option<i64>,
    issued_at: i64,
}

impl TokenPair {
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        expires_at: Option<i64>,
    ) -> ClientResult<Self> {
        let access_token = access_token.into().trim().to_string();
        let refresh_token = refresh_token.into().trim().to_string();
        if access_token.is_empty() || refresh_token.is_empty() {
            return Err(ClientError::Decode(
                "token pair requires non-empty access and refresh tokens".to_string(),
            ));
        }
        Ok(Self {
            access_token,
            refresh_token,
            expires_at,
            issued_at: now_unix_seconds(),
        })
    }

    #[cfg(test)]
    pub(crate) fn with_issued_at(mut self, issued_at: i64) -> Self {
        self.issued_at = issued_at;
        self
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn refresh_token(&self) -> &str {
        &self.refresh_token
    }

    /// Unix seconds; `None` when the server did not report a lifetime.
    pub fn expires_at(&self) -> Option<i64> {
        self.expires_at
    }

    /// Unix seconds at which this pair was received.
    pub fn issued_at(&self) -> i64 {
        self.issued_at
    }

    pub fn is_expired(&self, now_unix: i64) -> bool {
        self.expires_at.is_some_and(|expiry| expiry <= now_unix)
    }

    /// Whether the pair expires within `lead_secs` of `now_unix`.
    ///
    /// The lead is capped at half the pair's lifetime, so a server issuing tokens shorter
    /// than the configured lead does not cause a refresh on every request.
    pub fn expires_within(&self, lead_secs: i64, now_unix: i64) -> bool {
        let Some(expiry) = self.expires_at else {
            return false;
        };
        let lifetime = expiry.saturating_sub(self.issued_at).max(0);
        let lead = lead_secs.clamp(0, lifetime / 2);
        expiry.saturating_sub(lead) <= now_unix
    }
}

impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &mask_token(&self.access_token))
            .field("refresh_token", &mask_token(&self.refresh_token))
            .field("expires_at", &self.expires_at)
            .field("issued_at", &self.issued_at)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    SignedOut,
    SignedIn,
}

/// Thread-safe holder of the current `TokenPair`.
///
/// The lock only guards a pointer swap, so readers always see one complete pair.
#[derive(Debug)]
pub struct TokenStore {
    current: Mutex<Option<Arc<TokenPair>>>,
    state: watch::Sender<SessionState>,
}

impl Default for TokenStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenStore {
    pub fn new() -> Self {
        let (state, _) = watch::channel(SessionState::SignedOut);
        Self {
            current: Mutex::new(None),
            state,
        }
    }

    pub fn with_pair(pair: TokenPair) -> Self {
        let store = Self::new();
        store.set(pair);
        store
    }

    pub fn get(&self) -> Option<Arc<TokenPair>> {
        self.current.lock_or_recover().clone()
    }

    pub fn set(&self, pair: TokenPair) {
        self.set_shared(Arc::new(pair));
    }

    pub(crate) fn set_shared(&self, pair: Arc<TokenPair>) {
        let mut current = self.current.lock_or_recover();
        *current = Some(pair);
        self.publish(SessionState::SignedIn);
    }

    pub fn clear(&self) {
        let mut current = self.current.lock_or_recover();
        *current = None;
        self.publish(SessionState::SignedOut);
    }

    /// Swaps in `next` only if the stored pair still carries `expected_refresh_token`.
    pub(crate) fn replace_if_refresh_token(
        &self,
        expected_refresh_token: &str,
        next: Arc<TokenPair>,
    ) -> bool {
        let mut current = self.current.lock_or_recover();
        let matches = current
            .as_ref()
            .is_some_and(|pair| pair.refresh_token == expected_refresh_token);
        if matches {
            *current = Some(next);
            self.publish(SessionState::SignedIn);
        }
        matches
    }

    /// Clears only if the stored pair still carries `refresh_token`.
    pub fn clear_if_refresh_token(&self, refresh_token: &str) -> bool {
        let mut current = self.current.lock_or_recover();
        let matches = current
            .as_ref()
            .is_some_and(|pair| pair.refresh_token == refresh_token);
        if matches {
            *current = None;
            self.publish(SessionState::SignedOut);
        }
        matches
    }

    pub fn is_signed_in(&self) -> bool {
        self.current.lock_or_recover().is_some()
    }

    /// Session transitions for the UI boundary.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    // Called with `current` locked so notifications follow store order.
    fn publish(&self, next: SessionState) {
        self.state.send_if_modified(|state| {
            let changed = *state != next;
            *state = next;
            changed
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(access: &str, refresh: &str) -> TokenPair {
        TokenPair::new(access, refresh, None).expect("pair")
    }

    #[test]
    fn token_pair_rejects_blank_tokens() {
        assert!(TokenPair::new(" ", "R1", None).is_err());
        assert!(TokenPair::new("A1", "", None).is_err());
    }

    #[test]
    fn token_pair_debug_masks_tokens() {
        let p = pair("access-token-0123456789", "refresh-token-0123456789");
        let text = format!("{p:?}");
        assert!(!text.contains("access-token-0123456789"));
        assert!(!text.contains("refresh-token-0123456789"));
    }

    #[test]
    fn pair_without_expiry_never_expires() {
        let p = pair("A1", "R1");
        assert!(!p.expires_within(3600, i64::MAX));
        assert!(!p.is_expired(i64::MAX));
    }

    #[test]
    fn expires_within_uses_lead_window() {
        // One-hour token issued at t=0.
        let p = TokenPair::new("A1", "R1", Some(3_600))
            .expect("pair")
            .with_issued_at(0);
        assert!(!p.expires_within(300, 3_200));
        assert!(p.expires_within(300, 3_300));
        assert!(p.expires_within(300, 4_000));
        assert!(p.is_expired(3_600));
        assert!(!p.is_expired(3_599));
    }

    #[test]
    fn expires_within_caps_lead_at_half_lifetime() {
        // Server hands out 60s tokens while the client asks for a 300s lead.
        let p = TokenPair::new("A2", "R2", Some(1_060))
            .expect("pair")
            .with_issued_at(1_000);
        assert!(!p.expires_within(300, 1_000));
        assert!(!p.expires_within(300, 1_029));
        assert!(p.expires_within(300, 1_030));
    }

    #[test]
    fn set_get_clear_round() {
        let store = TokenStore::new();
        assert!(store.get().is_none());

        store.set(pair("A1", "R1"));
        let current = store.get().expect("pair");
        assert_eq!(current.access_token(), "A1");
        assert_eq!(current.refresh_token(), "R1");

        store.clear();
        assert!(store.get().is_none());
        assert!(!store.is_signed_in());
    }

    #[test]
    fn clear_if_refresh_token_ignores_newer_pair() {
        let store = TokenStore::with_pair(pair("A2", "R2"));
        assert!(!store.clear_if_refresh_token("R1"));
        assert!(store.is_signed_in());
        assert!(store.clear_if_refresh_token("R2"));
        assert!(!store.is_signed_in());
    }

    #[test]
    fn replace_if_refresh_token_requires_expected_pair() {
        let store = TokenStore::with_pair(pair("A1", "R1"));
        assert!(!store.replace_if_refresh_token("R0", Arc::new(pair("A9", "R9"))));
        assert!(store.replace_if_refresh_token("R1", Arc::new(pair("A2", "R2"))));
        assert_eq!(store.get().expect("pair").access_token(), "A2");

        store.clear();
        assert!(!store.replace_if_refresh_token("R2", Arc::new(pair("A3", "R3"))));
        assert!(store.get().is_none());
    }

    #[test]
    fn subscribers_see_session_transitions() {
        let store = TokenStore::new();
        let mut rx = store.subscribe();
        assert_eq!(*rx.borrow(), SessionState::SignedOut);

        store.set(pair("A1", "R1"));
        assert!(rx.has_changed().expect("sender alive"));
        assert_eq!(*rx.borrow_and_update(), SessionState::SignedIn);

        // A pair swap inside a session is not a transition.
        store.set(pair("A2", "R2"));
        assert!(!rx.has_changed().expect("sender alive"));

        store.clear();
        assert_eq!(*rx.borrow_and_update(), SessionState::SignedOut);
    }

    #[test]
    fn concurrent_readers_never_see_mixed_pairs() {
        let store = Arc::new(TokenStore::with_pair(pair("A0", "R0")));
        let writer = {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                for i in 1..=2_000 {
                    store.set(pair(&format!("A{i}"), &format!("R{i}")));
                }
            })
        };
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for _ in 0..2_000 {
                        let current = store.get().expect("always signed in");
                        assert_eq!(
                            current.access_token()[1..],
                            current.refresh_token()[1..],
                            "mixed pair observed"
                        );
                    }
                })
            })
            .collect();

        writer.join().expect("writer");
        for reader in readers {
            reader.join().expect("reader");
        }
    }
}
