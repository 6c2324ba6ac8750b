//! Collaborators below the pool: the allocator chunks come from, and the
//! platform query that sizes the memory budget.

use std::alloc::{self, Layout};
use std::ptr::NonNull;

/// Bytes the backing allocator keeps in front of every block it hands out.
///
/// Subtracted from nominal chunk sizes so that a pool configured with
/// page-sized chunks asks the heap for blocks that, bookkeeping included,
/// still fit a page.
pub const BACKING_OVERHEAD: usize = 8;

/// The general-purpose allocator arena chunks are obtained from.
///
/// Only whole chunk blocks ever cross this interface; pointers handed to
/// pool callers are never released through it.
pub trait BackingAllocator {
    /// Obtains a block for `layout`, or `None` if the allocator is exhausted.
    ///
    /// `layout.size()` is never zero.
    fn obtain(&mut self, layout: Layout) -> Option<NonNull<u8>>;

    /// Returns a block to the allocator.
    ///
    /// # Safety
    ///
    /// `block` must have been returned by [`obtain`](Self::obtain) on this
    /// allocator with the same `layout`, and not released since.
    unsafe fn release(&mut self, block: NonNull<u8>, layout: Layout);
}

/// Backing allocator over the global Rust allocator (`std::alloc`).
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemAllocator;

impl BackingAllocator for SystemAllocator {
    fn obtain(&mut self, layout: Layout) -> Option<NonNull<u8>> {
        debug_assert!(layout.size() > 0);
        // SAFETY: chunk layouts always have a non-zero size (asserted above,
        // guaranteed by `Chunk::obtain`).
        NonNull::new(unsafe { alloc::alloc(layout) })
    }

    unsafe fn release(&mut self, block: NonNull<u8>, layout: Layout) {
        // SAFETY: forwarded from the caller's contract: `block` came from
        // `alloc::alloc` with this exact layout.
        unsafe { alloc::dealloc(block.as_ptr(), layout) }
    }
}

/// Source of the memory ceiling.
pub trait MemoryProbe {
    /// Bytes of physical memory available to the process, if known.
    fn available_physical_bytes(&self) -> Option<usize>;
}

/// Queries the operating system for available physical memory.
///
/// On Linux this is the currently free physical memory
/// (`_SC_AVPHYS_PAGES`); on other Unix systems the installed physical memory
/// (`_SC_PHYS_PAGES`). Non-Unix targets report nothing, so pools there need
/// an explicit ceiling.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlatformProbe;

impl MemoryProbe for PlatformProbe {
    #[cfg(unix)]
    fn available_physical_bytes(&self) -> Option<usize> {
        #[cfg(target_os = "linux")]
        let pages_name = libc::_SC_AVPHYS_PAGES;
        #[cfg(not(target_os = "linux"))]
        let pages_name = libc::_SC_PHYS_PAGES;

        // SAFETY: sysconf has no preconditions; failure is reported as -1.
        let (pages, page_size) =
            unsafe { (libc::sysconf(pages_name), libc::sysconf(libc::_SC_PAGESIZE)) };
        if pages <= 0 || page_size <= 0 {
            return None;
        }

        usize::try_from(pages)
            .ok()?
            .checked_mul(usize::try_from(page_size).ok()?)
    }

    #[cfg(not(unix))]
    fn available_physical_bytes(&self) -> Option<usize> {
        None
    }
}

/// A probe reporting a fixed amount, for tests and embedded targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedProbe(pub Option<usize>);

impl MemoryProbe for FixedProbe {
    fn available_physical_bytes(&self) -> Option<usize> {
        self.0
    }
}
