use std::sync::{Mutex, MutexGuard};

/// Take the lock even if a previous holder panicked; the guarded data here is
/// always left in a consistent state between operations.
pub(crate) fn lock_or_recover<'a, T>(lock: &'a Mutex<T>, context: &str) -> MutexGuard<'a, T> {
    match lock.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!("mutex poisoned in {context}; recovering");
            poisoned.into_inner()
        }
    }
}
