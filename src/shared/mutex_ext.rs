//! Usage: Locking that survives a panicked holder (token slot, pending refresh slot).

use std::sync::{Mutex, MutexGuard};

pub(crate) trait MutexExt<T> {
    /// Locks; a poisoned lock keeps its last written value and is un-poisoned.
    fn lock_or_recover(&self) -> MutexGuard<'_, T>;
}

impl<T> MutexExt<T> for Mutex<T> {
    #[track_caller]
    fn lock_or_recover(&self) -> MutexGuard<'_, T> {
        self.lock().unwrap_or_else(|poisoned| {
            let caller = std::panic::Location::caller();
            tracing::error!(
                slot = std::any::type_name::<T>(),
                at = %caller,
                "lock held by a panicked task; continuing with its last written value"
            );
            self.clear_poison();
            poisoned.into_inner()
        })
    }
}
