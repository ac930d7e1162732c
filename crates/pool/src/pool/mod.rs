//! Bounded resource pool with a priority waiter queue.
//!
//! `Pool<F>` creates resources through a [`Factory`] up to `max_size`,
//! hands idle ones out first, and queues callers by priority once the pool
//! is saturated. Released resources go straight to the next waiter when
//! there is one (direct handoff) and to the idle set otherwise.
//!
//! Lifecycle: `Active` → `drain()` → `Draining` → `Drained`.

mod handoff;
mod shared;

use std::fmt;
use std::future::Future;
use std::pin::{Pin, pin};
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::FutureExt;
use futures::future::{BoxFuture, join_all};
use tokio::sync::oneshot;

use crate::config::PoolConfig;
use crate::error::{Error, Result};
use crate::factory::Factory;
use crate::lease::Lease;
use crate::logging::LogLevel;

use self::handoff::{Grant, Reservation, Waiter};
use self::shared::Retiring;
pub(crate) use self::shared::Shared;

/// Pool lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoolState {
    /// Accepting acquire requests.
    Active,
    /// `drain()` was called; waiting for checked out resources to return.
    Draining,
    /// Every resource has been destroyed. Terminal.
    Drained,
}

impl fmt::Display for PoolState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Active => "active",
            Self::Draining => "draining",
            Self::Drained => "drained",
        })
    }
}

/// Pool statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Total leases handed to callers.
    pub total_acquisitions: u64,
    /// Total leases returned to the pool.
    pub total_releases: u64,
    /// Total resources ever created.
    pub created: u64,
    /// Total resources ever destroyed.
    pub destroyed: u64,
    /// Resources currently checked out.
    pub active: usize,
    /// Resources currently idle.
    pub idle: usize,
    /// Acquire requests queued for capacity.
    pub pending: usize,
    /// Resources currently being created.
    pub creating: usize,
}

/// Generic resource pool.
///
/// Cloning a `Pool` yields another handle to the same pool.
pub struct Pool<F: Factory> {
    shared: Arc<Shared<F>>,
}

impl<F: Factory> Clone for Pool<F> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<F: Factory> fmt::Debug for Pool<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("name", &self.shared.name)
            .field("state", &self.state())
            .field("stats", &self.stats())
            .finish()
    }
}

/// Next thing a drain has to do.
enum DrainStep<T> {
    Destroy(T),
    Wait,
    Done,
}

/// Outcome of the synchronous part of `acquire`.
enum Plan<F: Factory> {
    Ready(Lease<F>),
    Create(Reservation<F>),
    Wait(oneshot::Receiver<Grant<F>>),
}

impl<F: Factory> Pool<F> {
    /// Create an empty pool.
    ///
    /// # Errors
    /// Returns `Error::Configuration` if `config` is invalid.
    pub fn new(factory: F, config: PoolConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            shared: Arc::new(Shared::new(factory, config)),
        })
    }

    /// Create a pool and fill it up to `min_size`.
    pub async fn start(factory: F, config: PoolConfig) -> Result<Self> {
        let pool = Self::new(factory, config)?;
        pool.maintain().await?;
        Ok(pool)
    }

    /// The pool name used in logs and errors.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// The validated configuration.
    #[must_use]
    pub fn config(&self) -> &PoolConfig {
        &self.shared.config
    }

    /// The factory backing this pool.
    #[must_use]
    pub fn factory(&self) -> &F {
        &self.shared.factory
    }

    /// Request a resource.
    ///
    /// Bookkeeping happens before this returns: an idle resource is checked
    /// out, capacity is reserved for a new one, or the request joins the
    /// waiter queue at `priority` (0 is the most urgent). Waiters are served
    /// in priority order, first come first served within a priority.
    ///
    /// Dropping the returned future gives up the request without leaking
    /// anything: a resource granted to it later goes to the next waiter.
    ///
    /// # Errors
    /// Returns `Error::Draining` immediately once `drain` has been called.
    pub fn acquire(&self, priority: usize) -> Result<Acquire<F>> {
        let shared = &self.shared;
        let plan = loop {
            // The candidate stays counted in `in_use` while it is validated
            // outside the lock.
            let (entry, expired) = {
                let mut state = shared.state.lock();
                if state.phase != PoolState::Active {
                    drop(state);
                    shared.log(
                        LogLevel::Warn,
                        format_args!("rejected acquire: pool is draining"),
                    );
                    return Err(Error::draining(&shared.name));
                }
                match state.idle.pop_front() {
                    Some(entry) if entry.is_expired(&shared.config) => {
                        state.counters.destroyed += 1;
                        (entry, true)
                    }
                    Some(entry) => {
                        state.in_use.insert(entry.id);
                        (entry, false)
                    }
                    None if state.total() < shared.config.max_size => {
                        state.creating += 1;
                        break Plan::Create(Reservation::new(Arc::clone(shared)));
                    }
                    None => {
                        let (sender, receiver) = oneshot::channel();
                        state.pending.retain(|waiter| !waiter.is_abandoned());
                        state.pending.enqueue(Waiter { sender }, priority);
                        break Plan::Wait(receiver);
                    }
                }
            };

            if expired {
                shared.log(
                    LogLevel::Info,
                    format_args!("destroying expired idle resource {}", entry.id),
                );
            } else if shared.factory.validate(&entry.resource) {
                break Plan::Ready(Lease::new(
                    entry.id,
                    entry.resource,
                    entry.created_at,
                    Arc::clone(shared),
                ));
            } else {
                shared.log(
                    LogLevel::Info,
                    format_args!("idle resource {} failed validation", entry.id),
                );
                shared.retire(entry.id);
            }
            shared.destroy_detached(entry.resource);
        };

        match &plan {
            Plan::Ready(lease) => shared.log(
                LogLevel::Verbose,
                format_args!("checking out idle resource {}", lease.id()),
            ),
            Plan::Create(_) => shared.log(
                LogLevel::Verbose,
                format_args!("no idle resource, creating a new one"),
            ),
            Plan::Wait(_) => shared.log(
                LogLevel::Verbose,
                format_args!("pool saturated, queued request at priority {priority}"),
            ),
        }

        Ok(Acquire::new(Arc::clone(shared), plan))
    }

    /// Run `callback` with a resource and return its result.
    ///
    /// The resource goes back to the pool exactly once when the callback
    /// finishes, fails, panics, or the returned future is dropped. The
    /// callback's error is returned as is; pool errors are converted
    /// through `E: From<Error>`.
    ///
    /// # Example
    ///
    /// ```
    /// # use nebula_pool::{Factory, Pool, PoolConfig, Result};
    /// # struct Numbers;
    /// # impl Factory for Numbers {
    /// #     type Resource = Vec<u32>;
    /// #     async fn create(&self) -> Result<Vec<u32>> { Ok(Vec::new()) }
    /// # }
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() -> Result<()> {
    /// let pool = Pool::new(Numbers, PoolConfig::default())?;
    /// let len = pool
    ///     .with(0, async |numbers: &mut Vec<u32>| {
    ///         numbers.push(1);
    ///         Ok::<_, nebula_pool::Error>(numbers.len())
    ///     })
    ///     .await?;
    /// assert_eq!(len, 1);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn with<T, E, C>(&self, priority: usize, callback: C) -> std::result::Result<T, E>
    where
        C: AsyncFnOnce(&mut F::Resource) -> std::result::Result<T, E>,
        E: From<Error>,
    {
        let mut lease = self.acquire(priority)?.await?;
        callback(&mut *lease).await
    }

    /// Return a leased resource before the lease is dropped.
    ///
    /// Releasing an already released lease, or a lease that belongs to
    /// another pool, is logged and otherwise ignored.
    pub fn release(&self, lease: &mut Lease<F>) {
        if !lease.belongs_to(&self.shared) {
            self.shared.log(
                LogLevel::Warn,
                format_args!(
                    "ignored release of resource {} owned by another pool",
                    lease.id()
                ),
            );
            return;
        }
        match lease.take() {
            Some(resource) => self
                .shared
                .check_in(lease.id(), resource, lease.created_at()),
            None => self.shared.log(
                LogLevel::Warn,
                format_args!("ignored double release of resource {}", lease.id()),
            ),
        }
    }

    /// Permanently retire a leased resource.
    ///
    /// Its capacity is handed to the next waiter as room for a replacement.
    pub async fn destroy(&self, lease: Lease<F>) -> Result<()> {
        if !lease.belongs_to(&self.shared) {
            self.shared.log(
                LogLevel::Warn,
                format_args!(
                    "resource {} is owned by another pool, destroying it there",
                    lease.id()
                ),
            );
        }
        lease.destroy().await
    }

    /// Shut the pool down.
    ///
    /// The transition happens when this is called, not when the returned
    /// future is first polled: from then on `acquire` fails with
    /// `Error::Draining`, and every queued request has already been rejected
    /// the same way. The future destroys idle resources one at a time and
    /// resolves once all checked out resources have come back and been
    /// destroyed, returning the first factory destroy error, if any.
    ///
    /// Idle resources stay in the pool until the future destroys them, so a
    /// dropped or cancelled drain can be resumed by calling `drain` again.
    pub fn drain(&self) -> impl Future<Output = Result<()>> + Send + use<F> {
        let shared = Arc::clone(&self.shared);
        let (waiters, idle) = {
            let mut state = shared.state.lock();
            if state.phase == PoolState::Active {
                state.phase = PoolState::Draining;
            }
            let waiters: Vec<_> = state.pending.drain().collect();
            (waiters, state.idle.len())
        };
        shared.log(
            LogLevel::Info,
            format_args!(
                "draining: rejecting {} queued request(s), {idle} idle resource(s) to destroy",
                waiters.len()
            ),
        );

        for waiter in waiters {
            // A refused rejection only means the waiter already gave up.
            let _ = waiter.sender.send(Grant::Rejected(Error::draining(&shared.name)));
        }

        async move {
            let mut result = Ok(());
            loop {
                let mut notified = pin!(shared.settled.notified());
                notified.as_mut().enable();
                let step = {
                    let mut state = shared.state.lock();
                    match state.idle.pop_front() {
                        Some(entry) => {
                            state.counters.destroyed += 1;
                            state.retiring += 1;
                            DrainStep::Destroy(entry.resource)
                        }
                        None if state.is_settled() => {
                            state.phase = PoolState::Drained;
                            DrainStep::Done
                        }
                        None => DrainStep::Wait,
                    }
                };
                match step {
                    DrainStep::Destroy(resource) => {
                        let _retiring = Retiring::counted(Arc::clone(&shared));
                        let outcome = shared.destroy_one(resource).await;
                        if result.is_ok() {
                            result = outcome;
                        }
                    }
                    DrainStep::Wait => notified.await,
                    DrainStep::Done => break,
                }
            }
            shared.log(LogLevel::Info, format_args!("drained"));
            result
        }
    }

    /// Evict expired idle resources and create resources up to `min_size`.
    ///
    /// New resources go to queued waiters first. Does nothing once the pool
    /// is draining.
    pub async fn maintain(&self) -> Result<()> {
        let shared = &self.shared;
        let (expired, reservations) = {
            let mut state = shared.state.lock();
            if state.phase != PoolState::Active {
                return Ok(());
            }
            let (expired, kept): (Vec<_>, Vec<_>) = state
                .idle
                .drain(..)
                .partition(|entry| entry.is_expired(&shared.config));
            state.idle = kept.into();
            state.counters.destroyed += expired.len() as u64;

            let needed = shared.config.min_size.saturating_sub(state.total());
            state.creating += needed;
            let reservations: Vec<_> = (0..needed)
                .map(|_| Reservation::new(Arc::clone(shared)))
                .collect();
            (expired, reservations)
        };

        if !expired.is_empty() {
            shared.log(
                LogLevel::Info,
                format_args!("evicting {} expired idle resource(s)", expired.len()),
            );
        }
        let mut result = shared
            .destroy_all(expired.into_iter().map(|entry| entry.resource).collect())
            .await;

        let created = join_all(reservations.into_iter().map(Reservation::fulfil)).await;
        for outcome in created {
            match outcome {
                Ok(lease) => shared.hand_off(Grant::Lease(lease)),
                Err(err) => {
                    if result.is_ok() {
                        result = Err(err);
                    }
                }
            }
        }
        result
    }

    /// Current lifecycle phase.
    #[must_use]
    pub fn state(&self) -> PoolState {
        self.shared.state.lock().phase
    }

    /// Resources counted against `max_size` (idle, in use, being created).
    #[must_use]
    pub fn size(&self) -> usize {
        self.shared.state.lock().total()
    }

    /// Number of idle resources.
    #[must_use]
    pub fn idle_count(&self) -> usize {
        self.shared.state.lock().idle.len()
    }

    /// Number of queued acquire requests.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.shared.state.lock().pending.len()
    }

    /// Get current pool statistics.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        let state = self.shared.state.lock();
        PoolStats {
            total_acquisitions: state.counters.acquired,
            total_releases: state.counters.released,
            created: state.counters.created,
            destroyed: state.counters.destroyed,
            active: state.in_use.len(),
            idle: state.idle.len(),
            pending: state.pending.len(),
            creating: state.creating,
        }
    }
}

/// Future returned by [`Pool::acquire`].
#[must_use = "an acquire request does nothing unless awaited"]
pub struct Acquire<F: Factory> {
    inner: BoxFuture<'static, Result<Lease<F>>>,
}

impl<F: Factory> Acquire<F> {
    fn new(shared: Arc<Shared<F>>, plan: Plan<F>) -> Self {
        let inner = async move {
            let lease = match plan {
                Plan::Ready(lease) => lease,
                Plan::Create(reservation) => reservation.fulfil().await?,
                Plan::Wait(receiver) => match receiver.await {
                    Ok(Grant::Lease(lease)) => lease,
                    Ok(Grant::Create(reservation)) => reservation.fulfil().await?,
                    Ok(Grant::Rejected(err)) => return Err(err),
                    Err(_) => return Err(Error::closed(&shared.name)),
                },
            };
            shared.state.lock().counters.acquired += 1;
            shared.log(
                LogLevel::Verbose,
                format_args!("acquired resource {}", lease.id()),
            );
            Ok(lease)
        };
        Self {
            inner: inner.boxed(),
        }
    }
}

impl<F: Factory> Future for Acquire<F> {
    type Output = Result<Lease<F>>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner.as_mut().poll(cx)
    }
}

impl<F: Factory> fmt::Debug for Acquire<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Acquire").finish_non_exhaustive()
    }
}
