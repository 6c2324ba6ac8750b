//! The arena registry: a fixed-size table of arenas sharing one budget.
//!
//! An [`ArenaPool`] is configured once with the number of arenas it holds.
//! Each arena id then moves through its own lifecycle:
//!
//! ```text
//!   Uninitialized ──create──▶ Live ◀──allocate / reset──┐
//!                              │  └────────────────────┘
//!                           destroy
//!                              ▼
//!                          Destroyed ──create──▶ Live
//! ```
//!
//! # Error tiers
//!
//! Every operation comes in two flavours. The `try_*` methods return the
//! full [`ArenaError`]. The plain methods follow the pool's contract:
//! recoverable errors become `None`, fatal ones go to the pool's
//! [`DiagnosticSink`], which by default aborts the process so a caller never
//! observes a half-grown arena or a breached budget.
//!
//! # Thread safety
//!
//! None. A pool holds raw chunk pointers and is neither `Send` nor `Sync`;
//! separate pools may be used on separate threads.

use std::ptr::NonNull;

use crate::arena::{Arena, ArenaStats, ChunkSource};
use crate::backing::{BackingAllocator, PlatformProbe, SystemAllocator};
use crate::budget::Budget;
use crate::config::PoolConfig;
use crate::error::{ArenaError, Result};
use crate::observer::{ArenaObserver, NoopObserver};
use crate::sink::{AbortSink, DiagnosticSink};

/// Lifecycle state of one arena id.
enum Slot {
    Uninitialized,
    Live(Arena),
    Destroyed,
}

/// A fixed-count pool of bump arenas over a backing allocator.
///
/// # Examples
///
/// ```
/// use arenapool_mem::{ArenaPool, PoolConfig};
///
/// let mut pool = ArenaPool::configure(2, PoolConfig::new().with_ceiling(1 << 20));
/// pool.create(0, 4096);
///
/// let a = pool.allocate(0, 24).unwrap();
/// let b = pool.allocate(0, 24).unwrap();
/// assert_eq!(a.as_ptr() as usize % 16, 0);
/// assert_eq!(b.as_ptr() as usize - a.as_ptr() as usize, 32);
///
/// // New lifetime, same chunks.
/// pool.reset(0);
/// assert_eq!(pool.allocate(0, 24), Some(a));
///
/// pool.destroy(0);
/// assert_eq!(pool.budget().used(), 0);
/// ```
pub struct ArenaPool<B: BackingAllocator = SystemAllocator, O: ArenaObserver = NoopObserver> {
    slots: Box<[Slot]>,
    source: ChunkSource<B, O>,
    sink: Box<dyn DiagnosticSink>,
}

impl ArenaPool {
    /// Configures a pool of `count` arenas over the system allocator.
    ///
    /// Terminates the process if the configuration is invalid or the
    /// platform cannot report its memory.
    #[must_use]
    pub fn configure(count: usize, config: PoolConfig) -> Self {
        Self::with_parts(count, config, SystemAllocator, NoopObserver, Box::new(AbortSink))
    }

    /// Like [`configure`](Self::configure), returning configuration errors.
    pub fn try_configure(count: usize, config: PoolConfig) -> Result<Self> {
        Self::try_with_parts(count, config, SystemAllocator, NoopObserver, Box::new(AbortSink))
    }
}

impl<B: BackingAllocator, O: ArenaObserver> ArenaPool<B, O> {
    /// Configures a pool with explicit collaborators.
    ///
    /// Configuration errors are handed to `sink`.
    #[must_use]
    pub fn with_parts(
        count: usize,
        config: PoolConfig,
        backing: B,
        observer: O,
        sink: Box<dyn DiagnosticSink>,
    ) -> Self {
        match Self::prepare(count, &config) {
            Ok(budget) => Self::assemble(count, config, budget, backing, observer, sink),
            Err(err) => fatal_with(sink.as_ref(), err),
        }
    }

    /// Like [`with_parts`](Self::with_parts), returning configuration errors.
    pub fn try_with_parts(
        count: usize,
        config: PoolConfig,
        backing: B,
        observer: O,
        sink: Box<dyn DiagnosticSink>,
    ) -> Result<Self> {
        let budget = Self::prepare(count, &config)?;
        Ok(Self::assemble(count, config, budget, backing, observer, sink))
    }

    fn prepare(count: usize, config: &PoolConfig) -> Result<Budget> {
        if count == 0 {
            return Err(ArenaError::EmptyRegistry);
        }
        config.validate()?;
        match config.ceiling {
            Some(ceiling) => Ok(Budget::new(ceiling)),
            None => Budget::from_probe(&PlatformProbe),
        }
    }

    fn assemble(
        count: usize,
        config: PoolConfig,
        budget: Budget,
        backing: B,
        observer: O,
        sink: Box<dyn DiagnosticSink>,
    ) -> Self {
        if let Some(level) = config.log_level {
            arenapool_log::set_level(level);
        }
        arenapool_log::debug!(
            "configured {count} arenas, alignment {}, ceiling {} bytes",
            config.alignment,
            budget.ceiling()
        );

        Self {
            slots: (0..count).map(|_| Slot::Uninitialized).collect(),
            source: ChunkSource {
                budget,
                backing,
                observer,
                alignment: config.alignment,
            },
            sink,
        }
    }

    /// Creates arena `arena` with chunks of `nominal_chunk_size` bytes.
    ///
    /// The size is what each chunk costs from the backing allocator's point
    /// of view; page-sized values (or powers of two of at least 1 KiB) keep
    /// the heap tidy. Terminates on any failure: an arena cannot be
    /// half-created.
    pub fn create(&mut self, arena: usize, nominal_chunk_size: usize) {
        if let Err(err) = self.try_create(arena, nominal_chunk_size) {
            self.fatal(err);
        }
    }

    /// Like [`create`](Self::create), returning the error.
    pub fn try_create(&mut self, arena: usize, nominal_chunk_size: usize) -> Result<()> {
        self.check_range(arena)?;
        if matches!(self.slots[arena], Slot::Live(_)) {
            return Err(ArenaError::ArenaAlreadyLive { arena });
        }

        let created = Arena::create(arena, nominal_chunk_size, &mut self.source)?;
        arenapool_log::debug!(
            "arena {arena}: created with nominal chunk size {}",
            created.stats().nominal_chunk_size
        );
        self.slots[arena] = Slot::Live(created);
        Ok(())
    }

    /// Allocates `size` bytes from `arena`.
    ///
    /// The memory is aligned to the pool alignment, uninitialised apart from
    /// the alignment padding behind it, and valid until the arena is reset
    /// or destroyed. Returns `None` if `size` is zero or too large to ever
    /// serve, or if the backing allocator refused a new chunk.
    pub fn allocate(&mut self, arena: usize, size: usize) -> Option<NonNull<u8>> {
        let result = self.try_allocate(arena, size);
        self.settle(result)
    }

    /// Like [`allocate`](Self::allocate), returning the error.
    pub fn try_allocate(&mut self, arena: usize, size: usize) -> Result<NonNull<u8>> {
        let (live, source) = self.live_parts(arena)?;
        live.allocate(arena, size, source)
    }

    /// Allocates `count * size` zeroed bytes from `arena`.
    ///
    /// Returns `None` if the product is zero, overflows, or cannot be served.
    pub fn allocate_zeroed(&mut self, arena: usize, count: usize, size: usize) -> Option<NonNull<u8>> {
        let result = self.try_allocate_zeroed(arena, count, size);
        self.settle(result).flatten()
    }

    /// Like [`allocate_zeroed`](Self::allocate_zeroed), returning the error.
    ///
    /// A zero product is `Ok(None)`, not an error.
    pub fn try_allocate_zeroed(
        &mut self,
        arena: usize,
        count: usize,
        size: usize,
    ) -> Result<Option<NonNull<u8>>> {
        let (live, source) = self.live_parts(arena)?;
        live.allocate_zeroed(arena, count, size, source)
    }

    /// Moves `value` into `arena` and returns a pointer to it.
    ///
    /// The value is never dropped; its memory is reclaimed with the arena.
    /// Terminates if `T` needs stricter alignment than the pool provides.
    ///
    /// # Examples
    ///
    /// ```
    /// use arenapool_mem::{ArenaPool, PoolConfig};
    ///
    /// let mut pool = ArenaPool::configure(1, PoolConfig::new().with_ceiling(1 << 20));
    /// pool.create(0, 1024);
    ///
    /// let value = pool.alloc_value(0, 42u64).unwrap();
    /// unsafe { assert_eq!(*value.as_ptr(), 42) };
    /// ```
    pub fn alloc_value<T>(&mut self, arena: usize, value: T) -> Option<NonNull<T>> {
        let result = self.try_alloc_value(arena, value);
        self.settle(result)
    }

    fn try_alloc_value<T>(&mut self, arena: usize, value: T) -> Result<NonNull<T>> {
        let alignment = self.source.alignment;
        if align_of::<T>() > alignment {
            return Err(ArenaError::UnalignedType {
                align: align_of::<T>(),
                alignment,
            });
        }
        let ptr = if size_of::<T>() == 0 {
            self.live_parts(arena)?;
            NonNull::dangling()
        } else {
            self.try_allocate(arena, size_of::<T>())?.cast::<T>()
        };
        // SAFETY: `ptr` is dangling only for zero-sized `T`; otherwise it
        // points at `size_of::<T>()` fresh bytes aligned to at least
        // `align_of::<T>()`.
        unsafe { ptr.as_ptr().write(value) };
        Ok(ptr)
    }

    /// Copies `s` into `arena` followed by a NUL byte.
    ///
    /// Returns a pointer to the first byte; the copy is `s.len() + 1` bytes.
    pub fn alloc_str(&mut self, arena: usize, s: &str) -> Option<NonNull<u8>> {
        let result = self.try_alloc_str(arena, s);
        self.settle(result)
    }

    fn try_alloc_str(&mut self, arena: usize, s: &str) -> Result<NonNull<u8>> {
        let len = s.len();
        let size = len
            .checked_add(1)
            .ok_or(ArenaError::ImpossibleSize { requested: len })?;
        let ptr = self.try_allocate(arena, size)?;
        // SAFETY: `ptr` is valid for `len + 1` bytes of fresh arena memory,
        // which cannot overlap the borrowed `s`.
        unsafe {
            std::ptr::copy_nonoverlapping(s.as_ptr(), ptr.as_ptr(), len);
            ptr.as_ptr().add(len).write(0);
        }
        Ok(ptr)
    }

    /// Starts a new lifetime in `arena`, keeping its chunks.
    ///
    /// Every pointer previously served from the arena becomes invalid.
    /// Resetting an arena that is not live does nothing.
    pub fn reset(&mut self, arena: usize) {
        if let Err(err) = self.try_reset(arena) {
            self.fatal(err);
        }
    }

    /// Like [`reset`](Self::reset), returning the error.
    pub fn try_reset(&mut self, arena: usize) -> Result<()> {
        self.check_range(arena)?;
        if let Slot::Live(live) = &mut self.slots[arena] {
            live.reset();
            arenapool_log::trace!("arena {arena}: reset");
        }
        Ok(())
    }

    /// Returns every chunk of `arena` to the backing allocator.
    ///
    /// The arena must be created again before further use.
    pub fn destroy(&mut self, arena: usize) {
        if let Err(err) = self.try_destroy(arena) {
            self.fatal(err);
        }
    }

    /// Like [`destroy`](Self::destroy), returning the error.
    pub fn try_destroy(&mut self, arena: usize) -> Result<()> {
        self.check_range(arena)?;
        if !matches!(self.slots[arena], Slot::Live(_)) {
            return Ok(());
        }
        if let Slot::Live(live) = std::mem::replace(&mut self.slots[arena], Slot::Destroyed) {
            let chunks = live.stats().chunk_count;
            live.destroy(&mut self.source);
            arenapool_log::debug!("arena {arena}: destroyed, released {chunks} chunks");
        }
        Ok(())
    }

    /// Number of arenas the pool was configured with.
    #[must_use]
    pub fn arena_count(&self) -> usize {
        self.slots.len()
    }

    /// Whether `arena` has been created and not destroyed since.
    #[must_use]
    pub fn is_live(&self, arena: usize) -> bool {
        matches!(self.slots.get(arena), Some(Slot::Live(_)))
    }

    /// Chain statistics for `arena`, or `None` if it is not live.
    #[must_use]
    pub fn stats(&self, arena: usize) -> Option<ArenaStats> {
        match self.slots.get(arena) {
            Some(Slot::Live(live)) => Some(live.stats()),
            _ => None,
        }
    }

    /// Index within `arena`'s chain of the chunk holding `[ptr, ptr + len)`.
    ///
    /// `None` if the range is not inside a single chunk of a live `arena`.
    #[must_use]
    pub fn locate(&self, arena: usize, ptr: *const u8, len: usize) -> Option<usize> {
        match self.slots.get(arena) {
            Some(Slot::Live(live)) => live.locate(ptr, len),
            _ => None,
        }
    }

    /// The shared memory budget.
    #[must_use]
    pub fn budget(&self) -> &Budget {
        &self.source.budget
    }

    /// The instrumentation observer.
    #[must_use]
    pub fn observer(&self) -> &O {
        &self.source.observer
    }

    /// The backing allocator.
    #[must_use]
    pub fn backing(&self) -> &B {
        &self.source.backing
    }

    /// Alignment of every pointer the pool hands out.
    #[must_use]
    pub fn alignment(&self) -> usize {
        self.source.alignment
    }

    fn check_range(&self, arena: usize) -> Result<()> {
        if arena >= self.slots.len() {
            return Err(ArenaError::ArenaOutOfRange {
                arena,
                count: self.slots.len(),
            });
        }
        Ok(())
    }

    fn live_parts(&mut self, arena: usize) -> Result<(&mut Arena, &mut ChunkSource<B, O>)> {
        self.check_range(arena)?;
        match &mut self.slots[arena] {
            Slot::Live(live) => Ok((live, &mut self.source)),
            Slot::Uninitialized | Slot::Destroyed => Err(ArenaError::ArenaNotLive { arena }),
        }
    }

    /// Applies the error-tier policy: recoverable errors become `None`.
    fn settle<T>(&self, result: Result<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(err) if err.is_recoverable() => {
                arenapool_log::debug!("{err}");
                None
            }
            Err(err) => self.fatal(err),
        }
    }

    fn fatal(&self, err: ArenaError) -> ! {
        fatal_with(self.sink.as_ref(), err)
    }
}

impl<B: BackingAllocator, O: ArenaObserver> Drop for ArenaPool<B, O> {
    fn drop(&mut self) {
        for slot in self.slots.iter_mut() {
            if let Slot::Live(live) = std::mem::replace(slot, Slot::Destroyed) {
                live.destroy(&mut self.source);
            }
        }
        self.source.observer.report();
    }
}

fn fatal_with(sink: &dyn DiagnosticSink, err: ArenaError) -> ! {
    sink.emit(&err.to_string());
    sink.terminate()
}
