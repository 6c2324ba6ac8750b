//! Budgeted bump arenas over the system allocator
//!
//! This crate provides a fixed-count pool of arenas for programs that build
//! many short-lived objects and free them all at once:
//!
//! - **Bump allocation**: each arena serves aligned memory by advancing a
//!   cursor through a chain of chunks
//! - **Cheap resets**: a reset rewinds the chain; later lifetimes reuse the
//!   chunks without going back to the backing allocator
//! - **Shared budget**: every chunk is charged against one ceiling, taken
//!   from available physical memory or set explicitly
//! - **Instrumentation**: an optional observer counts chunks and serves per
//!   arena and reports on teardown
//!
//! # Example
//!
//! ```
//! use arenapool_mem::{ArenaPool, PoolConfig};
//!
//! let mut pool = ArenaPool::configure(1, PoolConfig::new().with_ceiling(1 << 20));
//! pool.create(0, 4096);
//!
//! for _ in 0..3 {
//!     let _name = pool.alloc_str(0, "scratch").unwrap();
//!     let _scratch = pool.allocate_zeroed(0, 64, 8).unwrap();
//!     pool.reset(0);
//! }
//! assert_eq!(pool.stats(0).unwrap().chunk_count, 1);
//! ```

mod arena;
mod backing;
mod budget;
mod chunk;
mod config;
mod error;
mod observer;
mod registry;
mod sink;

pub use arena::ArenaStats;
pub use backing::{
    BACKING_OVERHEAD, BackingAllocator, FixedProbe, MemoryProbe, PlatformProbe, SystemAllocator,
};
pub use budget::Budget;
pub use chunk::CHUNK_HEADER_SIZE;
pub use config::{DEFAULT_ALIGNMENT, LOG_ENV, MAX_ALIGNMENT, MAX_ALLOC_ENV, PoolConfig};
pub use error::{ArenaError, Result};
pub use observer::{ArenaObserver, ArenaUsage, NoopObserver, UsageCounters, UsageLevel};
pub use registry::ArenaPool;
pub use sink::{AbortSink, DiagnosticSink, PanicSink};
