//! RAII handle for a checked out resource

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::Result;
use crate::factory::Factory;
use crate::logging::LogLevel;
use crate::pool::Shared;

/// Identity of a pooled resource, unique within its pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceId(u64);

impl ResourceId {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw numeric identifier.
    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Exclusive access to one pooled resource.
///
/// Dropping the lease returns the resource to its pool: straight to the
/// next waiter if one is queued, otherwise to the idle set. Use
/// [`Lease::destroy`] to retire the resource instead.
///
/// After [`Pool::release`](crate::Pool::release) empties a lease, the lease
/// no longer dereferences; [`Lease::is_held`] reports this.
pub struct Lease<F: Factory> {
    id: ResourceId,
    resource: Option<F::Resource>,
    created_at: Instant,
    pool: Arc<Shared<F>>,
}

impl<F: Factory> Lease<F> {
    pub(crate) fn new(
        id: ResourceId,
        resource: F::Resource,
        created_at: Instant,
        pool: Arc<Shared<F>>,
    ) -> Self {
        Self {
            id,
            resource: Some(resource),
            created_at,
            pool,
        }
    }

    /// Identity of the leased resource.
    #[must_use]
    pub fn id(&self) -> ResourceId {
        self.id
    }

    /// Whether the lease still holds its resource.
    #[must_use]
    pub fn is_held(&self) -> bool {
        self.resource.is_some()
    }

    /// Time since the resource was created.
    #[must_use]
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Return the resource to the pool now.
    pub fn release(self) {
        drop(self);
    }

    /// Permanently retire the resource through the factory.
    ///
    /// The resource's capacity is handed to the next waiter, if any, as
    /// room to create a replacement.
    pub async fn destroy(mut self) -> Result<()> {
        let Some(resource) = self.resource.take() else {
            self.pool.log(
                LogLevel::Warn,
                format_args!("ignored destroy of released resource {}", self.id),
            );
            return Ok(());
        };
        let pool = Arc::clone(&self.pool);
        let _retiring = pool.begin_retiring();
        pool.retire(self.id);
        pool.factory.destroy(resource).await
    }

    pub(crate) fn created_at(&self) -> Instant {
        self.created_at
    }

    pub(crate) fn take(&mut self) -> Option<F::Resource> {
        self.resource.take()
    }

    pub(crate) fn belongs_to(&self, pool: &Arc<Shared<F>>) -> bool {
        Arc::ptr_eq(&self.pool, pool)
    }
}

impl<F: Factory> std::ops::Deref for Lease<F> {
    type Target = F::Resource;

    fn deref(&self) -> &F::Resource {
        self.resource.as_ref().expect("lease used after release")
    }
}

impl<F: Factory> std::ops::DerefMut for Lease<F> {
    fn deref_mut(&mut self) -> &mut F::Resource {
        self.resource.as_mut().expect("lease used after release")
    }
}

impl<F: Factory> Drop for Lease<F> {
    fn drop(&mut self) {
        if let Some(resource) = self.resource.take() {
            self.pool.check_in(self.id, resource, self.created_at);
        }
    }
}

impl<F: Factory> fmt::Debug for Lease<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lease")
            .field("id", &self.id)
            .field("pool", &self.pool.name)
            .field("held", &self.is_held())
            .finish()
    }
}
