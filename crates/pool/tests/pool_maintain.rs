//! Warm start, minimum size upkeep and idle/lifetime eviction.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

use nebula_pool::{Factory, Pool, PoolConfig, PoolState, Result};

// ---------------------------------------------------------------------------
// Test factory
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Tracked {
    next: AtomicU64,
    destroyed: Arc<Mutex<Vec<u64>>>,
}

impl Factory for Tracked {
    type Resource = u64;

    async fn create(&self) -> Result<u64> {
        Ok(self.next.fetch_add(1, Ordering::SeqCst))
    }

    async fn destroy(&self, resource: u64) -> Result<()> {
        self.destroyed.lock().push(resource);
        Ok(())
    }
}

fn config(min_size: usize, max_size: usize) -> PoolConfig {
    PoolConfig::default()
        .with_name("maintain")
        .with_size(min_size, max_size)
        .with_log(false)
}

fn tracked() -> (Tracked, Arc<Mutex<Vec<u64>>>) {
    let factory = Tracked::default();
    let destroyed = Arc::clone(&factory.destroyed);
    (factory, destroyed)
}

// ---------------------------------------------------------------------------
// Minimum size
// ---------------------------------------------------------------------------

#[tokio::test]
async fn start_creates_min_size_resources() {
    let (factory, _destroyed) = tracked();
    let pool = Pool::start(factory, config(3, 5)).await.unwrap();

    let stats = pool.stats();
    assert_eq!(stats.created, 3);
    assert_eq!(stats.idle, 3);
    assert_eq!(stats.active, 0);
}

#[tokio::test]
async fn maintain_replaces_destroyed_resources() {
    let (factory, destroyed) = tracked();
    let pool = Pool::start(factory, config(2, 4)).await.unwrap();

    let lease = pool.acquire(0).unwrap().await.unwrap();
    lease.destroy().await.unwrap();
    assert_eq!(pool.size(), 1);

    pool.maintain().await.unwrap();
    assert_eq!(pool.idle_count(), 2);
    assert_eq!(pool.stats().created, 3);
    assert_eq!(destroyed.lock().len(), 1);
}

#[tokio::test]
async fn maintain_does_nothing_after_drain() {
    let (factory, _destroyed) = tracked();
    let pool = Pool::start(factory, config(2, 2)).await.unwrap();
    pool.drain().await.unwrap();

    pool.maintain().await.unwrap();
    assert_eq!(pool.state(), PoolState::Drained);
    assert_eq!(pool.size(), 0);
}

// ---------------------------------------------------------------------------
// Eviction
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn idle_timeout_evicts_unused_resources() {
    let (factory, destroyed) = tracked();
    let config = PoolConfig {
        idle_timeout: Some(Duration::from_secs(30)),
        ..config(0, 2)
    };
    let pool = Pool::new(factory, config).unwrap();
    drop(pool.acquire(0).unwrap().await.unwrap());
    assert_eq!(pool.idle_count(), 1);

    tokio::time::advance(Duration::from_secs(10)).await;
    pool.maintain().await.unwrap();
    assert_eq!(pool.idle_count(), 1, "still fresh");

    tokio::time::advance(Duration::from_secs(31)).await;
    pool.maintain().await.unwrap();
    assert_eq!(pool.idle_count(), 0);
    assert_eq!(*destroyed.lock(), vec![0]);
    assert_eq!(pool.stats().destroyed, 1);
}

#[tokio::test(start_paused = true)]
async fn expired_idle_resource_is_skipped_on_acquire() {
    let (factory, _destroyed) = tracked();
    let config = PoolConfig {
        idle_timeout: Some(Duration::from_secs(30)),
        ..config(0, 2)
    };
    let pool = Pool::new(factory, config).unwrap();
    drop(pool.acquire(0).unwrap().await.unwrap());

    tokio::time::advance(Duration::from_secs(31)).await;
    let lease = pool.acquire(0).unwrap().await.unwrap();

    assert_eq!(*lease, 1, "a fresh resource replaces the expired one");
    assert_eq!(pool.stats().destroyed, 1);
}

#[tokio::test(start_paused = true)]
async fn max_lifetime_retires_resource_on_release() {
    let (factory, _destroyed) = tracked();
    let config = PoolConfig {
        max_lifetime: Some(Duration::from_secs(60)),
        ..config(0, 1)
    };
    let pool = Pool::new(factory, config).unwrap();

    let lease = pool.acquire(0).unwrap().await.unwrap();
    tokio::time::advance(Duration::from_secs(61)).await;
    assert!(lease.age() > Duration::from_secs(60));
    drop(lease);

    let stats = pool.stats();
    assert_eq!(stats.idle, 0);
    assert_eq!(stats.destroyed, 1);

    let next = pool.acquire(0).unwrap().await.unwrap();
    assert_eq!(*next, 1);
}
