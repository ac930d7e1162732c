//! # Nebula Pool
//!
//! A generic, bounded resource pool for expensive objects such as
//! connections. Resources are created lazily through a [`Factory`] up to a
//! hard maximum; once the pool is saturated, callers wait in a
//! priority-ordered queue and are served as resources are released or
//! replaced. [`Pool::drain`] shuts the pool down gracefully.
//!
//! ```
//! use nebula_pool::{Factory, Pool, PoolConfig, Result};
//!
//! struct Connections;
//!
//! impl Factory for Connections {
//!     type Resource = String;
//!
//!     async fn create(&self) -> Result<String> {
//!         Ok("connection".to_string())
//!     }
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<()> {
//! let pool = Pool::new(Connections, PoolConfig::default().with_size(0, 4))?;
//!
//! let conn = pool.acquire(0)?.await?;
//! assert_eq!(*conn, "connection");
//! drop(conn); // back to the pool
//!
//! pool.drain().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod factory;
pub mod lease;
pub mod logging;
pub mod pool;
pub mod queue;

pub use config::PoolConfig;
pub use error::{BoxError, Error, Result};
pub use factory::Factory;
pub use lease::{Lease, ResourceId};
pub use logging::{LogLevel, LogSink, PoolLogger};
pub use pool::{Acquire, Pool, PoolState, PoolStats};
pub use queue::PriorityQueue;
