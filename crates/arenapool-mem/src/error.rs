//! Error types for arena pool operations.
//!
//! Errors fall into two tiers. Recoverable errors are handed back to the
//! caller as a missing pointer; everything else means the pool's bookkeeping
//! or the caller's use of it can no longer be trusted, and the pool's
//! [`DiagnosticSink`](crate::sink::DiagnosticSink) terminates the process.

use std::fmt;

/// Errors that can occur while configuring a pool or serving allocations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArenaError {
    /// The request can never be served: zero bytes, zero elements times a
    /// size that overflows, or more than `isize::MAX` bytes.
    ImpossibleSize {
        /// The requested size in bytes (`usize::MAX` when the product
        /// of element count and size overflowed).
        requested: usize,
    },

    /// The backing allocator refused a chunk the budget had already approved.
    BackingExhausted {
        /// The chunk capacity that could not be obtained.
        size: usize,
    },

    /// The arena id is outside the configured range.
    ArenaOutOfRange {
        /// The offending arena id.
        arena: usize,
        /// Number of arenas the pool was configured with.
        count: usize,
    },

    /// Allocation was attempted on an arena that was never created or has
    /// been destroyed.
    ArenaNotLive {
        /// The arena id.
        arena: usize,
    },

    /// `create` was called on an arena that is already live.
    ArenaAlreadyLive {
        /// The arena id.
        arena: usize,
    },

    /// A size computation overflowed the signed size domain.
    SizeOverflow {
        /// The size that triggered the overflow.
        size: usize,
    },

    /// Granting the chunk would push total usage past the ceiling.
    BudgetExceeded {
        /// Bytes requested for the chunk.
        requested: usize,
        /// Bytes already granted across all arenas.
        used: usize,
        /// The process-wide ceiling.
        ceiling: usize,
    },

    /// The nominal chunk size cannot hold a header and one aligned unit.
    ChunkTooSmall {
        /// The nominal chunk size passed to `create`.
        requested: usize,
    },

    /// The configured alignment is not a power of two, or exceeds
    /// [`MAX_ALIGNMENT`](crate::config::MAX_ALIGNMENT).
    InvalidAlignment {
        /// The rejected alignment.
        alignment: usize,
    },

    /// The pool was configured with zero arenas.
    EmptyRegistry,

    /// The platform did not report its available physical memory.
    PlatformQuery,

    /// A typed allocation needs stricter alignment than the pool provides.
    UnalignedType {
        /// Alignment required by the type.
        align: usize,
        /// Alignment the pool guarantees.
        alignment: usize,
    },
}

impl ArenaError {
    /// Returns `true` for errors that are reported to the caller instead of
    /// terminating the process.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ArenaError::ImpossibleSize { .. } | ArenaError::BackingExhausted { .. }
        )
    }
}

impl fmt::Display for ArenaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArenaError::ImpossibleSize { requested } => {
                write!(f, "Impossible allocation size: {requested} bytes")
            }
            ArenaError::BackingExhausted { size } => {
                write!(f, "Backing allocator could not provide a chunk of {size} bytes")
            }
            ArenaError::ArenaOutOfRange { arena, count } => {
                write!(f, "Bad arena {arena}: pool has {count} arenas")
            }
            ArenaError::ArenaNotLive { arena } => {
                write!(f, "Arena {arena} is not live: create it before allocating")
            }
            ArenaError::ArenaAlreadyLive { arena } => {
                write!(f, "Arena {arena} is already live: destroy it before recreating")
            }
            ArenaError::SizeOverflow { size } => {
                write!(f, "Size computation overflowed for {size} bytes")
            }
            ArenaError::BudgetExceeded { requested, used, ceiling } => write!(
                f,
                "Memory budget exceeded: requested {requested} bytes with {used} of {ceiling} bytes in use"
            ),
            ArenaError::ChunkTooSmall { requested } => {
                write!(f, "The chunk size requested is too small: {requested} bytes")
            }
            ArenaError::InvalidAlignment { alignment } => {
                write!(
                    f,
                    "Invalid alignment: {alignment} is not a power of two no larger than {}",
                    crate::config::MAX_ALIGNMENT
                )
            }
            ArenaError::EmptyRegistry => write!(f, "Arena pool configured with zero arenas"),
            ArenaError::PlatformQuery => {
                write!(f, "Could not query available physical memory")
            }
            ArenaError::UnalignedType { align, alignment } => write!(
                f,
                "Type alignment {align} exceeds the pool alignment of {alignment}"
            ),
        }
    }
}

impl std::error::Error for ArenaError {}

/// Result type for arena pool operations.
pub type Result<T> = std::result::Result<T, ArenaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            format!("{}", ArenaError::ArenaOutOfRange { arena: 9, count: 4 }),
            "Bad arena 9: pool has 4 arenas"
        );
        assert_eq!(
            format!(
                "{}",
                ArenaError::BudgetExceeded { requested: 8192, used: 0, ceiling: 4096 }
            ),
            "Memory budget exceeded: requested 8192 bytes with 0 of 4096 bytes in use"
        );
    }

    #[test]
    fn test_recoverable_tier() {
        assert!(ArenaError::ImpossibleSize { requested: 0 }.is_recoverable());
        assert!(ArenaError::BackingExhausted { size: 4096 }.is_recoverable());

        assert!(!ArenaError::SizeOverflow { size: 1 }.is_recoverable());
        assert!(!ArenaError::ArenaNotLive { arena: 0 }.is_recoverable());
        assert!(!ArenaError::EmptyRegistry.is_recoverable());
        assert!(
            !ArenaError::BudgetExceeded { requested: 1, used: 1, ceiling: 1 }.is_recoverable()
        );
    }
}
