//! The bump-allocation and chunk-growth engine.
//!
//! An [`Arena`] owns a chain of chunks and a cursor naming the chunk
//! currently being bumped. Serving a request walks three steps, cheapest
//! first:
//!
//! 1. bump the current chunk if the (padded) request fits;
//! 2. otherwise advance to the next chunk already in the chain, rewinding
//!    it, and try again;
//! 3. at the end of the chain, grant a new chunk sized to the larger of the
//!    padded request plus header and the arena's nominal chunk size.
//!
//! Step 2 is what makes reset cheap: after the first lifetime has grown
//! the chain, later lifetimes walk the same chunks without touching the
//! backing allocator. Step 3's sizing rule lets a single oversized request
//! through without changing the nominal size later growth uses.
//!
//! All size arithmetic is checked in the signed size domain. Overflow
//! indicates corrupted bookkeeping and is fatal; only impossible requests
//! and a refusing backing allocator are reported as recoverable.

use std::ptr::NonNull;

use crate::backing::{BACKING_OVERHEAD, BackingAllocator};
use crate::budget::Budget;
use crate::chunk::{CHUNK_HEADER_SIZE, Chunk};
use crate::error::{ArenaError, Result};
use crate::observer::ArenaObserver;

/// Statistics about one arena's chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaStats {
    /// Chunks in the chain.
    pub chunk_count: usize,
    /// Index of the chunk currently being bumped.
    pub current_chunk: usize,
    /// Bytes charged for the whole chain, headers included.
    pub total_capacity: usize,
    /// Bytes handed out (padding included) in the chunks up to the current
    /// one; chunks past it are stale until the cursor reaches them.
    pub used: usize,
    /// Effective nominal chunk size new chunks default to.
    pub nominal_chunk_size: usize,
}

/// Everything chunk growth draws on: the budget, the backing allocator and
/// the observer told about each grant.
pub(crate) struct ChunkSource<B, O> {
    pub(crate) budget: Budget,
    pub(crate) backing: B,
    pub(crate) observer: O,
    pub(crate) alignment: usize,
}

impl<B: BackingAllocator, O: ArenaObserver> ChunkSource<B, O> {
    /// Reserves `capacity` bytes, obtains the chunk and reports the grant.
    ///
    /// A refusing backing allocator gives the reservation back.
    fn grant(&mut self, arena: usize, capacity: usize) -> Result<Chunk> {
        self.budget.reserve(capacity)?;

        let chunk = match Chunk::obtain(&mut self.backing, capacity, self.alignment) {
            Ok(chunk) => chunk,
            Err(err) => {
                self.budget.release(capacity);
                arenapool_log::warn!("arena {arena}: backing allocator refused {capacity} bytes");
                return Err(err);
            }
        };

        self.observer.chunk_granted(arena, capacity);
        arenapool_log::debug!(
            "arena {arena}: granted chunk of {capacity} bytes ({} of {} in use)",
            self.budget.used(),
            self.budget.ceiling()
        );
        Ok(chunk)
    }

    /// Releases a chunk to the backing allocator and the budget.
    fn reclaim(&mut self, chunk: Chunk) {
        let capacity = chunk.capacity();
        chunk.release(&mut self.backing);
        self.budget.release(capacity);
    }
}

/// Rounds `requested` up to `alignment`, returning `requested + padding`.
///
/// `requested` of zero or beyond `isize::MAX` is impossible; a rounded size
/// that no longer fits `isize` is an overflow.
pub(crate) fn padded_size(requested: usize, alignment: usize) -> Result<usize> {
    if requested == 0 || requested > isize::MAX as usize {
        return Err(ArenaError::ImpossibleSize { requested });
    }
    debug_assert!(alignment.is_power_of_two() && alignment <= crate::config::MAX_ALIGNMENT);

    let signed = requested as isize;
    let padding = -signed & (alignment as isize - 1);
    signed
        .checked_add(padding)
        .map(|step| step as usize)
        .ok_or(ArenaError::SizeOverflow { size: requested })
}

/// Converts a requested nominal chunk size into the size chunks really get.
///
/// The backing allocator's per-block overhead is subtracted, the rest is
/// rounded down to the alignment, and what is left must exceed the chunk
/// header so at least one aligned unit is usable.
pub(crate) fn effective_chunk_size(requested: usize, alignment: usize) -> Result<usize> {
    if requested > isize::MAX as usize {
        return Err(ArenaError::SizeOverflow { size: requested });
    }
    let trimmed = requested
        .checked_sub(BACKING_OVERHEAD)
        .ok_or(ArenaError::ChunkTooSmall { requested })?;
    let effective = trimmed & !(alignment - 1);
    if effective <= CHUNK_HEADER_SIZE {
        return Err(ArenaError::ChunkTooSmall { requested });
    }
    Ok(effective)
}

/// One arena: a chain of chunks and the index of the chunk being bumped.
///
/// `chunks[0]` is the head the arena's sentinel owns; each later chunk is
/// the successor of the one before it. The chain is never empty.
pub(crate) struct Arena {
    chunks: Vec<Chunk>,
    current: usize,
    nominal: usize,
}

impl Arena {
    /// Creates an arena with one chunk of the effective nominal size.
    pub(crate) fn create<B, O>(
        id: usize,
        nominal_chunk_size: usize,
        source: &mut ChunkSource<B, O>,
    ) -> Result<Self>
    where
        B: BackingAllocator,
        O: ArenaObserver,
    {
        let nominal = effective_chunk_size(nominal_chunk_size, source.alignment)?;
        let head = source.grant(id, nominal)?;
        Ok(Arena {
            chunks: vec![head],
            current: 0,
            nominal,
        })
    }

    /// Serves `requested` bytes, growing the chain if needed.
    pub(crate) fn allocate<B, O>(
        &mut self,
        id: usize,
        requested: usize,
        source: &mut ChunkSource<B, O>,
    ) -> Result<NonNull<u8>>
    where
        B: BackingAllocator,
        O: ArenaObserver,
    {
        let step = padded_size(requested, source.alignment)?;
        let padding = step - requested;

        loop {
            let chunk = &mut self.chunks[self.current];
            if let Some(offset) = chunk.try_bump(step) {
                chunk.zero(offset + requested, padding);
                source.observer.bytes_served(id, requested);
                return Ok(chunk.ptr_at(offset));
            }

            if self.current + 1 < self.chunks.len() {
                self.current += 1;
                self.chunks[self.current].rewind();
                arenapool_log::trace!("arena {id}: reusing linked chunk {}", self.current);
                continue;
            }

            let capacity = step
                .checked_add(CHUNK_HEADER_SIZE)
                .filter(|&size| size <= isize::MAX as usize)
                .ok_or(ArenaError::SizeOverflow { size: requested })?
                .max(self.nominal);
            let chunk = source.grant(id, capacity)?;
            self.chunks.push(chunk);
            self.current = self.chunks.len() - 1;
        }
    }

    /// Serves `count * size` zeroed bytes.
    ///
    /// Returns `Ok(None)` when the product is zero.
    pub(crate) fn allocate_zeroed<B, O>(
        &mut self,
        id: usize,
        count: usize,
        size: usize,
        source: &mut ChunkSource<B, O>,
    ) -> Result<Option<NonNull<u8>>>
    where
        B: BackingAllocator,
        O: ArenaObserver,
    {
        let total = count
            .checked_mul(size)
            .ok_or(ArenaError::ImpossibleSize { requested: usize::MAX })?;
        if total == 0 {
            return Ok(None);
        }

        let ptr = self.allocate(id, total, source)?;
        // SAFETY: `allocate` reserved `total` bytes at `ptr` inside a live chunk.
        unsafe { ptr.as_ptr().write_bytes(0, total) };
        Ok(Some(ptr))
    }

    /// Rewinds the arena to the start of its first chunk.
    pub(crate) fn reset(&mut self) {
        self.current = 0;
        self.chunks[0].rewind();
    }

    /// Releases every chunk, head first.
    pub(crate) fn destroy<B, O>(self, source: &mut ChunkSource<B, O>)
    where
        B: BackingAllocator,
        O: ArenaObserver,
    {
        for chunk in self.chunks {
            source.reclaim(chunk);
        }
    }

    /// Index of the chunk holding `[ptr, ptr + len)`, if any.
    pub(crate) fn locate(&self, ptr: *const u8, len: usize) -> Option<usize> {
        self.chunks.iter().position(|chunk| chunk.contains(ptr, len))
    }

    pub(crate) fn stats(&self) -> ArenaStats {
        ArenaStats {
            chunk_count: self.chunks.len(),
            current_chunk: self.current,
            total_capacity: self.chunks.iter().map(Chunk::capacity).sum(),
            used: self.chunks[..=self.current].iter().map(Chunk::cursor).sum(),
            nominal_chunk_size: self.nominal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backing::SystemAllocator;
    use crate::observer::NoopObserver;

    fn source(ceiling: usize) -> ChunkSource<SystemAllocator, NoopObserver> {
        ChunkSource {
            budget: Budget::new(ceiling),
            backing: SystemAllocator,
            observer: NoopObserver,
            alignment: 16,
        }
    }

    #[test]
    fn test_padded_size() {
        assert_eq!(padded_size(1, 16), Ok(16));
        assert_eq!(padded_size(16, 16), Ok(16));
        assert_eq!(padded_size(17, 16), Ok(32));
        assert_eq!(padded_size(5, 8), Ok(8));
        assert_eq!(padded_size(0, 16), Err(ArenaError::ImpossibleSize { requested: 0 }));
        assert_eq!(
            padded_size(isize::MAX as usize + 1, 16),
            Err(ArenaError::ImpossibleSize { requested: isize::MAX as usize + 1 })
        );
        assert_eq!(
            padded_size(isize::MAX as usize, 16),
            Err(ArenaError::SizeOverflow { size: isize::MAX as usize })
        );
    }

    #[test]
    fn test_effective_chunk_size() {
        assert_eq!(effective_chunk_size(4096, 16), Ok(4080));
        assert_eq!(effective_chunk_size(1024, 16), Ok(1008));
        assert_eq!(effective_chunk_size(1000, 16), Ok(992));
        assert_eq!(
            effective_chunk_size(4, 16),
            Err(ArenaError::ChunkTooSmall { requested: 4 })
        );
        let tiny = CHUNK_HEADER_SIZE + BACKING_OVERHEAD;
        assert_eq!(
            effective_chunk_size(tiny, 16),
            Err(ArenaError::ChunkTooSmall { requested: tiny })
        );
        assert_eq!(effective_chunk_size(tiny + 16, 16), Ok(CHUNK_HEADER_SIZE + 16));
    }

    #[test]
    fn test_fast_path_is_contiguous() {
        let mut src = source(1 << 20);
        let mut arena = Arena::create(0, 4096, &mut src).unwrap();

        let a = arena.allocate(0, 10, &mut src).unwrap();
        let b = arena.allocate(0, 10, &mut src).unwrap();
        assert_eq!(b.as_ptr() as usize - a.as_ptr() as usize, 16);
        assert_eq!(arena.stats().used, 32);
        assert_eq!(arena.stats().chunk_count, 1);

        arena.destroy(&mut src);
        assert_eq!(src.budget.used(), 0);
    }

    #[test]
    fn test_padding_tail_is_zeroed() {
        let mut src = source(1 << 20);
        let mut arena = Arena::create(0, 1024, &mut src).unwrap();

        let p = arena.allocate(0, 16, &mut src).unwrap();
        unsafe { p.as_ptr().write_bytes(0xFF, 16) };
        arena.reset();

        let p = arena.allocate(0, 3, &mut src).unwrap();
        let bytes = unsafe { std::slice::from_raw_parts(p.as_ptr(), 16) };
        assert!(bytes[..3].iter().all(|&b| b == 0xFF));
        assert!(bytes[3..].iter().all(|&b| b == 0));

        arena.destroy(&mut src);
    }

    #[test]
    fn test_oversized_request_gets_own_chunk() {
        let mut src = source(1 << 20);
        let mut arena = Arena::create(0, 1024, &mut src).unwrap();
        let nominal = arena.stats().nominal_chunk_size;

        arena.allocate(0, 5000, &mut src).unwrap();
        let stats = arena.stats();
        assert_eq!(stats.chunk_count, 2);
        assert_eq!(stats.nominal_chunk_size, nominal);
        assert_eq!(stats.total_capacity, nominal + 5008 + CHUNK_HEADER_SIZE);

        // The oversized chunk is exactly full; growth falls back to nominal.
        arena.allocate(0, 16, &mut src).unwrap();
        let stats = arena.stats();
        assert_eq!(stats.chunk_count, 3);
        assert_eq!(stats.total_capacity, 2 * nominal + 5008 + CHUNK_HEADER_SIZE);

        arena.destroy(&mut src);
        assert_eq!(src.budget.used(), 0);
    }

    #[test]
    fn test_growth_refused_by_budget() {
        let mut src = source(4096);
        let mut arena = Arena::create(0, 4096, &mut src).unwrap();

        let err = arena.allocate(0, 8000, &mut src).unwrap_err();
        assert!(matches!(err, ArenaError::BudgetExceeded { .. }));
        assert_eq!(arena.stats().chunk_count, 1);

        arena.destroy(&mut src);
    }

    #[test]
    fn test_growth_overflow_is_fatal() {
        let mut src = source(usize::MAX);
        let mut arena = Arena::create(0, 4096, &mut src).unwrap();

        let huge = isize::MAX as usize - 15;
        let err = arena.allocate(0, huge, &mut src).unwrap_err();
        assert_eq!(err, ArenaError::SizeOverflow { size: huge });
        assert!(!err.is_recoverable());

        arena.destroy(&mut src);
    }

    #[test]
    fn test_reset_rewinds_to_head() {
        let mut src = source(1 << 20);
        let mut arena = Arena::create(0, 1024, &mut src).unwrap();

        let first = arena.allocate(0, 64, &mut src).unwrap();
        for _ in 0..40 {
            arena.allocate(0, 64, &mut src).unwrap();
        }
        assert!(arena.stats().chunk_count > 1);

        arena.reset();
        assert_eq!(arena.stats().current_chunk, 0);
        assert_eq!(arena.allocate(0, 64, &mut src).unwrap(), first);

        arena.destroy(&mut src);
    }

    #[test]
    fn test_allocate_zeroed() {
        let mut src = source(1 << 20);
        let mut arena = Arena::create(0, 1024, &mut src).unwrap();

        let p = arena.allocate(0, 100, &mut src).unwrap();
        unsafe { p.as_ptr().write_bytes(0xEE, 100) };
        arena.reset();

        let z = arena.allocate_zeroed(0, 25, 4, &mut src).unwrap().unwrap();
        assert_eq!(z, p);
        let bytes = unsafe { std::slice::from_raw_parts(z.as_ptr(), 100) };
        assert!(bytes.iter().all(|&b| b == 0));

        assert_eq!(arena.allocate_zeroed(0, 0, 8, &mut src), Ok(None));
        assert_eq!(arena.allocate_zeroed(0, 8, 0, &mut src), Ok(None));
        assert_eq!(
            arena.allocate_zeroed(0, usize::MAX / 2, 3, &mut src),
            Err(ArenaError::ImpossibleSize { requested: usize::MAX })
        );

        arena.destroy(&mut src);
    }
}
