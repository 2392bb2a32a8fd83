//! Type aliases for commonly used complex types.
//!
//! Gives names to the shared-state and callback shapes that recur across
//! the printer host crates.

use parking_lot::{Mutex, RwLock};
use std::sync::Arc;

/// A thread-safe, mutex-protected wrapper for cross-task sharing.
///
/// Uses `parking_lot::Mutex`; never hold the guard across an `.await`.
pub type ThreadSafe<T> = Arc<Mutex<T>>;

/// A thread-safe optional wrapper for lazily-initialized state.
pub type ThreadSafeOption<T> = Arc<Mutex<Option<T>>>;

/// A thread-safe reader-writer lock wrapper for read-heavy workloads.
pub type ThreadSafeRw<T> = Arc<RwLock<T>>;

/// A callback that receives a single parameter.
///
/// Invoked synchronously, in order, from the task producing the data.
pub type DataCallback<T> = Arc<dyn Fn(T) + Send + Sync>;

/// Wrap a value in `Arc<Mutex<T>>`.
pub fn thread_safe<T>(value: T) -> ThreadSafe<T> {
    Arc::new(Mutex::new(value))
}

/// Create an empty `Arc<Mutex<Option<T>>>`.
pub fn thread_safe_none<T>() -> ThreadSafeOption<T> {
    Arc::new(Mutex::new(None))
}

/// Wrap a value in `Arc<RwLock<T>>`.
pub fn thread_safe_rw<T>(value: T) -> ThreadSafeRw<T> {
    Arc::new(RwLock::new(value))
}
