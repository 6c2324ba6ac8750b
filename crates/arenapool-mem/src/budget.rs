//! Process-wide memory budget.
//!
//! Every chunk an arena obtains from the backing allocator is charged here
//! first. The ceiling is fixed when the pool is configured, usually from the
//! amount of physical memory the platform reports as available, and a grant
//! that would cross it is refused.
//!
//! All arithmetic runs in the signed size domain (`isize`), the same domain
//! pointer distances live in, so an amount that would turn negative there is
//! rejected as an overflow before it can touch the counters.

use crate::backing::MemoryProbe;
use crate::error::{ArenaError, Result};

/// Bytes granted to arenas versus the ceiling they must stay under.
///
/// Invariant: `used <= ceiling <= isize::MAX` after every operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Budget {
    used: usize,
    ceiling: usize,
}

impl Budget {
    /// Creates a budget with the given ceiling and nothing used.
    ///
    /// Ceilings beyond `isize::MAX` are clamped to it.
    #[must_use]
    pub const fn new(ceiling: usize) -> Self {
        let max = isize::MAX as usize;
        Self {
            used: 0,
            ceiling: if ceiling > max { max } else { ceiling },
        }
    }

    /// Creates a budget whose ceiling is the probe's available memory.
    ///
    /// This is the only place the platform is queried.
    pub fn from_probe<P: MemoryProbe + ?Sized>(probe: &P) -> Result<Self> {
        probe
            .available_physical_bytes()
            .map(Self::new)
            .ok_or(ArenaError::PlatformQuery)
    }

    /// Charges `amount` bytes against the budget.
    ///
    /// Fails with [`ArenaError::SizeOverflow`] if `amount` is not
    /// representable as a non-negative `isize` or the sum overflows, and
    /// with [`ArenaError::BudgetExceeded`] if the sum would exceed the
    /// ceiling. The budget is unchanged on failure.
    pub fn reserve(&mut self, amount: usize) -> Result<()> {
        let signed =
            isize::try_from(amount).map_err(|_| ArenaError::SizeOverflow { size: amount })?;
        // used <= ceiling <= isize::MAX, so this conversion is lossless.
        let used = self.used as isize;
        let total = used
            .checked_add(signed)
            .ok_or(ArenaError::SizeOverflow { size: amount })?;

        if total as usize > self.ceiling {
            return Err(ArenaError::BudgetExceeded {
                requested: amount,
                used: self.used,
                ceiling: self.ceiling,
            });
        }

        self.used = total as usize;
        Ok(())
    }

    /// Returns `amount` previously reserved bytes to the budget.
    pub fn release(&mut self, amount: usize) {
        debug_assert!(
            amount <= self.used,
            "releasing {amount} bytes with only {} in use",
            self.used
        );
        self.used = self.used.saturating_sub(amount);
    }

    /// Bytes currently granted.
    #[must_use]
    pub const fn used(&self) -> usize {
        self.used
    }

    /// The ceiling in bytes.
    #[must_use]
    pub const fn ceiling(&self) -> usize {
        self.ceiling
    }

    /// Bytes that can still be granted.
    #[must_use]
    pub const fn available(&self) -> usize {
        self.ceiling - self.used
    }
}
