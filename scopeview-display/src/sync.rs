//! Lock helpers shared by the worker threads.

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Locks `mutex`, recovering the data if a holder panicked.
///
/// Render passes run inside `catch_unwind`, so a poisoned lock only means
/// a pass was abandoned; the protected state is still consistent.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
