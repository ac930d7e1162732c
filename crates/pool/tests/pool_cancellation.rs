//! Cancellation safety: dropping an acquire at any point must not leak
//! capacity or resources.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use nebula_pool::{Factory, Pool, PoolConfig, Result};

// ---------------------------------------------------------------------------
// Test factory
// ---------------------------------------------------------------------------

struct Slow {
    next: AtomicU64,
    delay: Duration,
}

impl Factory for Slow {
    type Resource = u64;

    async fn create(&self) -> Result<u64> {
        tokio::time::sleep(self.delay).await;
        Ok(self.next.fetch_add(1, Ordering::SeqCst))
    }
}

fn pool(max_size: usize, delay: Duration) -> Pool<Slow> {
    let factory = Slow {
        next: AtomicU64::new(0),
        delay,
    };
    let config = PoolConfig::default()
        .with_name("cancellation")
        .with_size(0, max_size)
        .with_log(false);
    Pool::new(factory, config).unwrap()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn timed_out_waiter_does_not_swallow_the_resource() {
    let pool = pool(1, Duration::ZERO);
    let held = pool.acquire(0).unwrap().await.unwrap();
    let id = held.id();

    let timed_out = tokio::time::timeout(Duration::from_millis(50), pool.acquire(0).unwrap()).await;
    assert!(timed_out.is_err());

    drop(held);
    assert_eq!(pool.idle_count(), 1);
    assert_eq!(pool.pending_count(), 0);

    let lease = pool.acquire(0).unwrap().await.unwrap();
    assert_eq!(lease.id(), id);
}

#[tokio::test]
async fn grant_to_a_dropped_waiter_returns_to_the_pool() {
    let pool = pool(1, Duration::ZERO);
    let held = pool.acquire(0).unwrap().await.unwrap();
    let queued = pool.acquire(0).unwrap();

    // The lease is handed to the queued request, which never collects it.
    drop(held);
    assert_eq!(pool.idle_count(), 0);
    drop(queued);

    let stats = pool.stats();
    assert_eq!(stats.idle, 1);
    assert_eq!(stats.active, 0);
    assert_eq!(stats.created, 1);
}

#[tokio::test(start_paused = true)]
async fn cancelled_creation_frees_its_reservation() {
    let pool = pool(1, Duration::from_secs(1));

    let timed_out = tokio::time::timeout(Duration::from_millis(10), pool.acquire(0).unwrap()).await;
    assert!(timed_out.is_err());

    let stats = pool.stats();
    assert_eq!(stats.creating, 0);
    assert_eq!(stats.created, 0);
    assert_eq!(pool.size(), 0);

    let lease = pool.acquire(0).unwrap().await.unwrap();
    assert_eq!(*lease, 0);
}

#[tokio::test(start_paused = true)]
async fn unpolled_creation_passes_capacity_to_waiter() {
    let pool = pool(1, Duration::from_millis(5));

    let creating = pool.acquire(0).unwrap();
    let queued = pool.acquire(0).unwrap();
    assert_eq!(pool.pending_count(), 1);

    drop(creating);
    assert_eq!(pool.pending_count(), 0);
    assert_eq!(pool.stats().creating, 1);

    let lease = queued.await.unwrap();
    assert_eq!(*lease, 0);
    assert_eq!(pool.size(), 1);
}

#[tokio::test]
async fn abandoned_waiters_are_pruned() {
    let pool = pool(1, Duration::ZERO);
    let held = pool.acquire(0).unwrap().await.unwrap();

    for _ in 0..10 {
        drop(pool.acquire(0).unwrap());
    }
    assert!(pool.pending_count() <= 1);

    drop(held);
    assert_eq!(pool.pending_count(), 0);
    assert_eq!(pool.idle_count(), 1);
}
