//! Chunks: the unit of memory an arena obtains from the backing allocator.
//!
//! A chunk is a header (this struct) plus a contiguous usable block. The
//! header's size is charged to the budget together with the block, so a
//! chunk's `capacity` is what the arena really costs. Offsets are measured
//! inside the usable block: a fresh chunk has `cursor == 0` and
//! `limit == capacity - CHUNK_HEADER_SIZE`.
//!
//! ```text
//!   capacity
//!   ├──────────────┬───────────────────────────────────────┐
//!   │    header    │ served │ served │      free           │
//!   └──────────────┴────────┴────────┴─────────────────────┘
//!                  0                 ▲ cursor              ▲ limit
//! ```

use std::alloc::Layout;
use std::ptr::NonNull;

use crate::backing::BackingAllocator;
use crate::error::{ArenaError, Result};

/// Bytes of bookkeeping charged per chunk.
///
/// `size_of::<Chunk>()` rounded up to 16 bytes.
pub const CHUNK_HEADER_SIZE: usize = (size_of::<Chunk>() + 15) & !15;

/// A block of memory with a bump cursor.
///
/// Only `cursor` changes after creation. It never decreases except through
/// [`rewind`](Self::rewind), and `cursor <= limit` always holds.
pub(crate) struct Chunk {
    /// Start of the usable block.
    block: NonNull<u8>,
    /// Layout the block was obtained with; its size is the chunk's limit.
    layout: Layout,
    /// Bytes charged to the budget: header plus block.
    capacity: usize,
    /// Offset of the next free byte.
    cursor: usize,
}

impl Chunk {
    /// Obtains a chunk of `capacity` bytes whose block is aligned to `align`.
    ///
    /// The caller guarantees `capacity > CHUNK_HEADER_SIZE` and that
    /// `capacity` has already been reserved against the budget.
    pub(crate) fn obtain<B>(backing: &mut B, capacity: usize, align: usize) -> Result<Self>
    where
        B: BackingAllocator + ?Sized,
    {
        debug_assert!(capacity > CHUNK_HEADER_SIZE);
        let limit = capacity - CHUNK_HEADER_SIZE;
        let layout = Layout::from_size_align(limit, align)
            .map_err(|_| ArenaError::SizeOverflow { size: capacity })?;
        let block = backing
            .obtain(layout)
            .ok_or(ArenaError::BackingExhausted { size: capacity })?;

        Ok(Chunk {
            block,
            layout,
            capacity,
            cursor: 0,
        })
    }

    /// Returns the block to the backing allocator it was obtained from.
    pub(crate) fn release<B>(self, backing: &mut B)
    where
        B: BackingAllocator + ?Sized,
    {
        // SAFETY: chunks are only created by `obtain` and every pool releases
        // its chunks to the same backing allocator that produced them.
        unsafe { backing.release(self.block, self.layout) }
    }

    /// Advances the cursor by `step` bytes, returning the old cursor.
    ///
    /// Returns `None`, leaving the chunk untouched, when fewer than `step`
    /// bytes remain.
    #[inline(always)]
    pub(crate) fn try_bump(&mut self, step: usize) -> Option<usize> {
        if step > self.remaining() {
            return None;
        }
        let offset = self.cursor;
        self.cursor += step;
        Some(offset)
    }

    /// Rewinds the cursor to the start of the block.
    #[inline]
    pub(crate) fn rewind(&mut self) {
        self.cursor = 0;
    }

    /// Pointer to `offset` bytes into the block.
    #[inline(always)]
    pub(crate) fn ptr_at(&self, offset: usize) -> NonNull<u8> {
        debug_assert!(offset <= self.limit());
        // SAFETY: offset <= limit, so the result stays inside the block or
        // one past its end.
        unsafe { self.block.add(offset) }
    }

    /// Zeroes `len` bytes starting at `offset`.
    #[inline(always)]
    pub(crate) fn zero(&mut self, offset: usize, len: usize) {
        debug_assert!(offset + len <= self.limit());
        // SAFETY: the range lies within the block (asserted above) and the
        // block is valid for writes for as long as the chunk exists.
        unsafe { self.ptr_at(offset).as_ptr().write_bytes(0, len) }
    }

    /// Whether `[ptr, ptr + len)` lies entirely inside the block.
    pub(crate) fn contains(&self, ptr: *const u8, len: usize) -> bool {
        let start = self.block.as_ptr() as usize;
        let addr = ptr as usize;
        addr >= start
            && addr
                .checked_add(len)
                .is_some_and(|end| end <= start + self.limit())
    }

    /// Bytes charged for this chunk, header included.
    #[inline]
    pub(crate) const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Offset of the next free byte.
    #[inline]
    pub(crate) const fn cursor(&self) -> usize {
        self.cursor
    }

    /// Offset one past the usable block.
    #[inline]
    pub(crate) const fn limit(&self) -> usize {
        self.layout.size()
    }

    /// Free bytes left in the block.
    #[inline]
    pub(crate) const fn remaining(&self) -> usize {
        self.limit() - self.cursor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backing::SystemAllocator;

    #[test]
    fn test_header_size_is_aligned() {
        assert_eq!(CHUNK_HEADER_SIZE % 16, 0);
        assert!(CHUNK_HEADER_SIZE >= size_of::<Chunk>());
    }

    #[test]
    fn test_fresh_chunk_bounds() {
        let mut backing = SystemAllocator;
        let chunk = Chunk::obtain(&mut backing, 1024, 16).unwrap();

        assert_eq!(chunk.capacity(), 1024);
        assert_eq!(chunk.cursor(), 0);
        assert_eq!(chunk.limit(), 1024 - CHUNK_HEADER_SIZE);
        assert_eq!(chunk.ptr_at(0).as_ptr() as usize % 16, 0);

        chunk.release(&mut backing);
    }

    #[test]
    fn test_bump_until_full() {
        let mut backing = SystemAllocator;
        let mut chunk = Chunk::obtain(&mut backing, CHUNK_HEADER_SIZE + 64, 16).unwrap();

        assert_eq!(chunk.try_bump(32), Some(0));
        assert_eq!(chunk.try_bump(32), Some(32));
        assert_eq!(chunk.try_bump(16), None);
        assert_eq!(chunk.cursor(), 64);
        assert_eq!(chunk.remaining(), 0);

        chunk.rewind();
        assert_eq!(chunk.try_bump(64), Some(0));

        chunk.release(&mut backing);
    }

    #[test]
    fn test_contains() {
        let mut backing = SystemAllocator;
        let chunk = Chunk::obtain(&mut backing, CHUNK_HEADER_SIZE + 64, 16).unwrap();
        let base = chunk.ptr_at(0).as_ptr();

        assert!(chunk.contains(base, 64));
        assert!(chunk.contains(base.wrapping_add(48), 16));
        assert!(!chunk.contains(base.wrapping_add(48), 17));
        assert!(!chunk.contains(base.wrapping_sub(1), 1));
        assert!(!chunk.contains(base, usize::MAX));

        chunk.release(&mut backing);
    }

    #[test]
    fn test_zero_writes_only_the_range() {
        let mut backing = SystemAllocator;
        let mut chunk = Chunk::obtain(&mut backing, CHUNK_HEADER_SIZE + 32, 16).unwrap();
        let base = chunk.ptr_at(0).as_ptr();

        unsafe { base.write_bytes(0xFF, 32) };
        chunk.zero(8, 8);

        let bytes = unsafe { std::slice::from_raw_parts(base, 32) };
        assert!(bytes[..8].iter().all(|&b| b == 0xFF));
        assert!(bytes[8..16].iter().all(|&b| b == 0));
        assert!(bytes[16..].iter().all(|&b| b == 0xFF));

        chunk.release(&mut backing);
    }
}
