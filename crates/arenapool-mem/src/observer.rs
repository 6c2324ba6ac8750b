//! Optional instrumentation.
//!
//! The pool reports every chunk it grants and every allocation it serves to
//! an [`ArenaObserver`]. Observers only watch; nothing they record feeds
//! back into allocation decisions. [`NoopObserver`] compiles to nothing,
//! [`UsageCounters`] keeps per-arena totals and prints the usage report to
//! standard error when the pool is torn down.

use std::fmt::Write as _;
use std::io::{self, Write};

/// Read-only observer of pool activity.
pub trait ArenaObserver {
    /// A chunk of `bytes` (header included) was granted to `arena`.
    fn chunk_granted(&mut self, arena: usize, bytes: usize);

    /// An allocation of `bytes` was served from `arena`.
    fn bytes_served(&mut self, arena: usize, bytes: usize);

    /// Called once when the pool is torn down, after every arena has been
    /// destroyed.
    fn report(&self) {}
}

/// Observer that records nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ArenaObserver for NoopObserver {
    #[inline(always)]
    fn chunk_granted(&mut self, _arena: usize, _bytes: usize) {}

    #[inline(always)]
    fn bytes_served(&mut self, _arena: usize, _bytes: usize) {}
}

/// How much [`UsageCounters`] records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum UsageLevel {
    /// Chunks granted to each arena.
    Chunks,
    /// Chunks granted plus every allocation served.
    Full,
}

/// Counters for one arena.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ArenaUsage {
    /// Number of chunks granted.
    pub chunks_granted: u64,
    /// Bytes granted across those chunks.
    pub bytes_granted: u64,
    /// Number of allocations served (`UsageLevel::Full` only).
    pub serves: u64,
    /// Bytes requested across those allocations (`UsageLevel::Full` only).
    pub bytes_served: u64,
}

/// Per-arena usage counters.
///
/// # Examples
///
/// ```
/// use arenapool_mem::{ArenaPool, PoolConfig, UsageCounters, UsageLevel};
/// use arenapool_mem::{PanicSink, SystemAllocator};
///
/// let config = PoolConfig::new().with_ceiling(1 << 20);
/// let mut pool = ArenaPool::with_parts(
///     2,
///     config,
///     SystemAllocator,
///     UsageCounters::new(UsageLevel::Full),
///     Box::new(PanicSink::new()),
/// );
/// pool.create(1, 4096);
/// pool.allocate(1, 100).unwrap();
///
/// let usage = pool.observer().usage(1);
/// assert_eq!(usage.chunks_granted, 1);
/// assert_eq!(usage.serves, 1);
/// assert_eq!(usage.bytes_served, 100);
/// ```
#[derive(Debug, Clone)]
pub struct UsageCounters {
    level: UsageLevel,
    arenas: Vec<ArenaUsage>,
}

impl UsageCounters {
    /// Creates empty counters recording at `level`.
    #[must_use]
    pub const fn new(level: UsageLevel) -> Self {
        Self {
            level,
            arenas: Vec::new(),
        }
    }

    /// The recording level.
    #[must_use]
    pub const fn level(&self) -> UsageLevel {
        self.level
    }

    /// Counters for `arena`; all zero if it never saw activity.
    #[must_use]
    pub fn usage(&self, arena: usize) -> ArenaUsage {
        self.arenas.get(arena).copied().unwrap_or_default()
    }

    /// Renders the usage report, one line per arena that saw activity.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::from("Report of arena memory usage:\n=============================\n");
        for (arena, usage) in self.arenas.iter().enumerate() {
            let _ = writeln!(
                out,
                "Arena nr {arena} was granted {} bytes of memory in {} allocations.",
                usage.bytes_granted, usage.chunks_granted
            );
            if self.level == UsageLevel::Full {
                let _ = writeln!(
                    out,
                    "Arena nr {arena} gave away {} bytes of memory in {} serves.",
                    usage.bytes_served, usage.serves
                );
            }
        }
        out
    }

    /// Writes the rendered report to `out`.
    pub fn write_report<W: Write + ?Sized>(&self, out: &mut W) -> io::Result<()> {
        out.write_all(self.render().as_bytes())?;
        out.flush()
    }

    fn slot(&mut self, arena: usize) -> &mut ArenaUsage {
        if arena >= self.arenas.len() {
            self.arenas.resize(arena + 1, ArenaUsage::default());
        }
        &mut self.arenas[arena]
    }
}

impl ArenaObserver for UsageCounters {
    fn chunk_granted(&mut self, arena: usize, bytes: usize) {
        let usage = self.slot(arena);
        usage.chunks_granted += 1;
        usage.bytes_granted += bytes as u64;
    }

    fn bytes_served(&mut self, arena: usize, bytes: usize) {
        if self.level < UsageLevel::Full {
            return;
        }
        let usage = self.slot(arena);
        usage.serves += 1;
        usage.bytes_served += bytes as u64;
    }

    /// Prints the report to standard error, independent of the log level.
    fn report(&self) {
        if let Err(err) = self.write_report(&mut io::stderr().lock()) {
            arenapool_log::warn!("could not write usage report: {err}");
        }
    }
}
