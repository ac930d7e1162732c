//! Shared pool state.
//!
//! Every mutation happens inside a `parking_lot` critical section that never
//! spans an `.await`, and user code is never dropped while the lock is held.

use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::Instant;

use super::PoolState;
use super::handoff::{Grant, Reservation, Waiter};
use crate::config::PoolConfig;
use crate::error::{Error, Result};
use crate::factory::Factory;
use crate::lease::ResourceId;
use crate::logging::LogLevel;
use crate::queue::PriorityQueue;

/// An idle resource and its timestamps.
pub(crate) struct IdleEntry<T> {
    pub(crate) id: ResourceId,
    pub(crate) resource: T,
    pub(crate) created_at: Instant,
    pub(crate) last_used: Instant,
}

impl<T> IdleEntry<T> {
    pub(crate) fn is_expired(&self, config: &PoolConfig) -> bool {
        config
            .idle_timeout
            .is_some_and(|timeout| self.last_used.elapsed() > timeout)
            || outlived(self.created_at, config)
    }
}

pub(crate) fn outlived(created_at: Instant, config: &PoolConfig) -> bool {
    config
        .max_lifetime
        .is_some_and(|lifetime| created_at.elapsed() > lifetime)
}

/// Monotonic counters reported through `PoolStats`.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Counters {
    pub(crate) acquired: u64,
    pub(crate) released: u64,
    pub(crate) created: u64,
    pub(crate) destroyed: u64,
}

/// Mutable pool state.
pub(crate) struct State<F: Factory> {
    pub(crate) phase: PoolState,
    pub(crate) idle: VecDeque<IdleEntry<F::Resource>>,
    pub(crate) in_use: HashSet<ResourceId>,
    pub(crate) pending: PriorityQueue<Waiter<F>>,
    /// Capacity reserved for creations that have not finished yet.
    pub(crate) creating: usize,
    /// Detached destructions still running.
    pub(crate) retiring: usize,
    pub(crate) counters: Counters,
    next_id: u64,
}

impl<F: Factory> State<F> {
    fn new(config: &PoolConfig) -> Self {
        Self {
            phase: PoolState::Active,
            idle: VecDeque::with_capacity(config.max_size),
            in_use: HashSet::with_capacity(config.max_size),
            pending: PriorityQueue::new(config.priority_levels),
            creating: 0,
            retiring: 0,
            counters: Counters::default(),
            next_id: 0,
        }
    }

    /// Resources counted against `max_size`: idle, in use and reserved.
    pub(crate) fn total(&self) -> usize {
        self.idle.len() + self.in_use.len() + self.creating
    }

    pub(crate) fn next_resource_id(&mut self) -> ResourceId {
        self.next_id += 1;
        ResourceId::new(self.next_id)
    }

    /// Whether drain may finish: nothing checked out, being created or
    /// being destroyed.
    pub(crate) fn is_settled(&self) -> bool {
        self.in_use.is_empty() && self.creating == 0 && self.retiring == 0
    }

    /// Reserve capacity for the next waiter if one is queued and the pool
    /// has room for it.
    pub(crate) fn reserve_for_waiter(
        &mut self,
        shared: &Arc<Shared<F>>,
    ) -> Option<Reservation<F>> {
        if self.phase == PoolState::Active
            && !self.pending.is_empty()
            && self.total() < shared.config.max_size
        {
            self.creating += 1;
            Some(Reservation::new(Arc::clone(shared)))
        } else {
            None
        }
    }

    /// Store a grant nobody is waiting for.
    pub(crate) fn park(&mut self, grant: Grant<F>, config: &PoolConfig) {
        match grant {
            Grant::Lease(mut lease) => {
                let id = lease.id();
                let created_at = lease.created_at();
                if let Some(resource) = lease.take() {
                    self.in_use.remove(&id);
                    let entry = IdleEntry {
                        id,
                        resource,
                        created_at,
                        last_used: Instant::now(),
                    };
                    if config.return_to_head {
                        self.idle.push_front(entry);
                    } else {
                        self.idle.push_back(entry);
                    }
                }
            }
            Grant::Create(mut reservation) => {
                reservation.disarm();
                self.creating -= 1;
            }
            Grant::Rejected(_) => {}
        }
    }
}

/// State shared by every `Pool` handle, lease and pending request.
pub(crate) struct Shared<F: Factory> {
    pub(crate) factory: F,
    pub(crate) name: String,
    pub(crate) config: PoolConfig,
    pub(crate) state: Mutex<State<F>>,
    /// Woken whenever resources are returned, retired or created, so that
    /// `drain` can re-check whether the pool has settled.
    pub(crate) settled: Notify,
}

impl<F: Factory> Shared<F> {
    pub(crate) fn new(factory: F, config: PoolConfig) -> Self {
        let name = config.name.clone().unwrap_or_else(|| "pool".to_string());
        Self {
            factory,
            name,
            state: Mutex::new(State::new(&config)),
            config,
            settled: Notify::new(),
        }
    }

    pub(crate) fn log(&self, level: LogLevel, message: fmt::Arguments<'_>) {
        self.config.log.emit(&self.name, level, message);
    }

    /// Return a resource that was checked out.
    ///
    /// A resource that fails validation or outlived `max_lifetime` is
    /// destroyed instead, and its capacity goes to the next waiter.
    pub(crate) fn check_in(
        self: &Arc<Self>,
        id: ResourceId,
        resource: F::Resource,
        created_at: Instant,
    ) {
        self.state.lock().counters.released += 1;

        if self.factory.validate(&resource) && !outlived(created_at, &self.config) {
            self.log(LogLevel::Verbose, format_args!("released resource {id}"));
            let lease = crate::lease::Lease::new(id, resource, created_at, Arc::clone(self));
            self.hand_off(Grant::Lease(lease));
        } else {
            self.log(
                LogLevel::Info,
                format_args!("resource {id} is no longer usable, destroying it"),
            );
            self.retire(id);
            self.destroy_detached(resource);
        }
    }

    /// Forget a checked out resource and pass its capacity on.
    pub(crate) fn retire(self: &Arc<Self>, id: ResourceId) {
        let replacement = {
            let mut state = self.state.lock();
            if state.in_use.remove(&id) {
                state.counters.destroyed += 1;
            }
            state.reserve_for_waiter(self)
        };
        self.log(LogLevel::Info, format_args!("destroyed resource {id}"));
        if let Some(reservation) = replacement {
            self.log(
                LogLevel::Verbose,
                format_args!("creating a replacement for resource {id}"),
            );
            self.hand_off(Grant::Create(reservation));
        }
        self.settled.notify_waiters();
    }

    /// Count a destruction in progress until the returned guard drops.
    pub(crate) fn begin_retiring(self: &Arc<Self>) -> Retiring<F> {
        self.state.lock().retiring += 1;
        Retiring::counted(Arc::clone(self))
    }

    /// Destroy a resource on a background task.
    ///
    /// Used from synchronous paths (drop, acquire). Without a runtime the
    /// resource is simply dropped.
    pub(crate) fn destroy_detached(self: &Arc<Self>, resource: F::Resource) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            drop(resource);
            return;
        };
        let retiring = self.begin_retiring();
        drop(handle.spawn(async move {
            let shared = &retiring.shared;
            if let Err(err) = shared.factory.destroy(resource).await {
                shared.log(
                    LogLevel::Error,
                    format_args!("failed to destroy resource: {err}"),
                );
            }
        }));
    }

    /// Destroy one resource that is already out of the books, logging a
    /// factory failure.
    pub(crate) async fn destroy_one(&self, resource: F::Resource) -> Result<()> {
        let outcome = self.factory.destroy(resource).await;
        if let Err(err) = &outcome {
            self.log(
                LogLevel::Error,
                format_args!("failed to destroy resource: {err}"),
            );
        }
        outcome
    }

    /// Destroy resources that are already out of the books, returning the
    /// first factory error after attempting all of them.
    pub(crate) async fn destroy_all(&self, resources: Vec<F::Resource>) -> Result<()> {
        let mut first_error: Option<Error> = None;
        for resource in resources {
            if let Err(err) = self.destroy_one(resource).await {
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

/// Keeps `drain` waiting while a resource is being destroyed.
pub(crate) struct Retiring<F: Factory> {
    shared: Arc<Shared<F>>,
}

impl<F: Factory> Retiring<F> {
    /// The caller must already have incremented `State::retiring`.
    pub(crate) fn counted(shared: Arc<Shared<F>>) -> Self {
        Self { shared }
    }
}

impl<F: Factory> Drop for Retiring<F> {
    fn drop(&mut self) {
        self.shared.state.lock().retiring -= 1;
        self.shared.settled.notify_waiters();
    }
}
