// Common test utilities for integration tests
//
// Provides a backing allocator that records every block it hands out and
// can be told to refuse, plus constructors for pools that panic instead of
// aborting on fatal errors.

#![allow(dead_code)]

use std::alloc::Layout;
use std::cell::Cell;
use std::ptr::NonNull;
use std::rc::Rc;

use arenapool_mem::{
    ArenaPool, BackingAllocator, NoopObserver, PanicSink, PoolConfig,
    SystemAllocator, UsageCounters, UsageLevel,
};

/// Shared view of what a [`CountingAllocator`] has done.
#[derive(Debug, Default)]
pub struct Ledger {
    pub obtained: Cell<usize>,
    pub released: Cell<usize>,
    pub live_bytes: Cell<usize>,
    pub refuse: Cell<bool>,
}

impl Ledger {
    pub fn live_blocks(&self) -> usize {
        self.obtained.get() - self.released.get()
    }
}

/// System allocator wrapper that counts blocks and can refuse on demand.
#[derive(Debug, Clone)]
pub struct CountingAllocator {
    ledger: Rc<Ledger>,
}

impl CountingAllocator {
    pub fn new() -> (Self, Rc<Ledger>) {
        let ledger = Rc::new(Ledger::default());
        (
            Self {
                ledger: Rc::clone(&ledger),
            },
            ledger,
        )
    }
}

impl BackingAllocator for CountingAllocator {
    fn obtain(&mut self, layout: Layout) -> Option<NonNull<u8>> {
        if self.ledger.refuse.get() {
            return None;
        }
        let block = SystemAllocator.obtain(layout)?;
        self.ledger.obtained.set(self.ledger.obtained.get() + 1);
        self.ledger
            .live_bytes
            .set(self.ledger.live_bytes.get() + layout.size());
        Some(block)
    }

    unsafe fn release(&mut self, block: NonNull<u8>, layout: Layout) {
        self.ledger.released.set(self.ledger.released.get() + 1);
        self.ledger
            .live_bytes
            .set(self.ledger.live_bytes.get() - layout.size());
        unsafe { SystemAllocator.release(block, layout) }
    }
}

/// Default ceiling for test pools: 16 MiB.
pub const TEST_CEILING: usize = 16 << 20;

/// A pool over the system allocator that panics on fatal errors.
pub fn panicking_pool(count: usize, ceiling: usize) -> ArenaPool {
    ArenaPool::with_parts(
        count,
        PoolConfig::new().with_ceiling(ceiling),
        SystemAllocator,
        NoopObserver,
        Box::new(PanicSink::new()),
    )
}

/// A pool over a [`CountingAllocator`], returned with its ledger.
pub fn counting_pool(
    count: usize,
    ceiling: usize,
) -> (ArenaPool<CountingAllocator, UsageCounters>, Rc<Ledger>) {
    let (backing, ledger) = CountingAllocator::new();
    let pool = ArenaPool::with_parts(
        count,
        PoolConfig::new().with_ceiling(ceiling),
        backing,
        UsageCounters::new(UsageLevel::Full),
        Box::new(PanicSink::new()),
    );
    (pool, ledger)
}

/// Reads `len` bytes at `ptr`.
///
/// # Safety
///
/// `ptr` must be valid for `len` bytes of reads.
pub unsafe fn bytes<'a>(ptr: NonNull<u8>, len: usize) -> &'a [u8] {
    unsafe { std::slice::from_raw_parts(ptr.as_ptr(), len) }
}

/// Fills an allocation with a recognisable pattern.
pub fn scribble(ptr: NonNull<u8>, len: usize) {
    unsafe { ptr.as_ptr().write_bytes(0xA5, len) };
}

/// Chunks granted to `arena` so far, according to the pool's observer.
pub fn grants<B: BackingAllocator>(pool: &ArenaPool<B, UsageCounters>, arena: usize) -> u64 {
    pool.observer().usage(arena).chunks_granted
}

