//! Resource factory trait
//!
//! The `Factory` trait defines how the pool creates, validates and destroys
//! the resources it manages. The pool never inspects a resource beyond these
//! three calls.

use std::future::Future;

use crate::error::Result;

/// Creates, validates and destroys pooled resources.
///
/// Implementations can use `async fn` for `create` and `destroy`; the
/// returned futures must be `Send` so pool operations can run on a
/// multi-threaded runtime.
///
/// # Example
///
/// ```
/// use nebula_pool::{Factory, Result};
///
/// struct Counter(std::sync::atomic::AtomicU64);
///
/// impl Factory for Counter {
///     type Resource = u64;
///
///     async fn create(&self) -> Result<u64> {
///         Ok(self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst))
///     }
/// }
/// ```
pub trait Factory: Send + Sync + 'static {
    /// The resource type handed out by the pool.
    type Resource: Send + 'static;

    /// Create a new resource.
    ///
    /// Errors are returned unchanged to the acquire that triggered the
    /// creation. Use [`Error::creation`](crate::Error::creation) to wrap a
    /// driver error.
    fn create(&self) -> impl Future<Output = Result<Self::Resource>> + Send;

    /// Permanently retire a resource.
    fn destroy(&self, resource: Self::Resource) -> impl Future<Output = Result<()>> + Send {
        drop(resource);
        async { Ok(()) }
    }

    /// Check whether a resource may still be handed out.
    ///
    /// Called when a resource leaves the idle set and when it is released,
    /// before it is passed to a waiting caller. Must not block. The pool
    /// lock is not held during the call, so the check may read pool stats.
    fn validate(&self, _resource: &Self::Resource) -> bool {
        true
    }
}
