//! Pool configuration.
//!
//! [`PoolConfig`] carries everything fixed at configuration time: the
//! alignment every allocation honours, an optional override for the memory
//! ceiling, and an optional log level. [`PoolConfig::from_env`] fills the
//! latter two from `ARENAPOOL_LOG` and `ARENAPOOL_MAX_ALLOC`.

use arenapool_log::Level;

use crate::error::{ArenaError, Result};

/// Default alignment for arena allocations (16 bytes).
///
/// Large enough for `u128`, `long double` and 16-byte SIMD loads.
pub const DEFAULT_ALIGNMENT: usize = 16;

/// Largest accepted alignment: one 4 KiB page.
///
/// Keeps `alignment - 1` and the padding arithmetic well inside `isize`.
pub const MAX_ALIGNMENT: usize = 4096;

/// Environment variable holding the log level.
pub const LOG_ENV: &str = "ARENAPOOL_LOG";

/// Environment variable holding a ceiling override, in bytes.
///
/// Accepts a plain byte count or a binary `K`/`M`/`G` suffix (`"512M"`).
pub const MAX_ALLOC_ENV: &str = "ARENAPOOL_MAX_ALLOC";

/// Configuration for an [`ArenaPool`](crate::ArenaPool).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    /// Alignment of every pointer handed out. Must be a power of two no
    /// larger than [`MAX_ALIGNMENT`].
    pub alignment: usize,
    /// Memory ceiling in bytes. `None` queries available physical memory.
    pub ceiling: Option<usize>,
    /// Log level applied when the pool is configured.
    pub log_level: Option<Level>,
}

impl PoolConfig {
    /// Creates the default configuration: 16-byte alignment, platform
    /// ceiling, logger untouched.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            alignment: DEFAULT_ALIGNMENT,
            ceiling: None,
            log_level: None,
        }
    }

    /// Sets the allocation alignment.
    #[must_use]
    pub const fn with_alignment(mut self, alignment: usize) -> Self {
        self.alignment = alignment;
        self
    }

    /// Sets a fixed memory ceiling instead of querying the platform.
    #[must_use]
    pub const fn with_ceiling(mut self, ceiling: usize) -> Self {
        self.ceiling = Some(ceiling);
        self
    }

    /// Sets the log level applied at configuration time.
    #[must_use]
    pub const fn with_log_level(mut self, level: Level) -> Self {
        self.log_level = Some(level);
        self
    }

    /// Builds a configuration from `ARENAPOOL_LOG` and `ARENAPOOL_MAX_ALLOC`.
    ///
    /// Unparsable values are reported at warn level and ignored.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from an arbitrary variable lookup.
    ///
    /// # Examples
    ///
    /// ```
    /// use arenapool_mem::PoolConfig;
    /// use arenapool_log::Level;
    ///
    /// let config = PoolConfig::from_lookup(|key| match key {
    ///     "ARENAPOOL_LOG" => Some("debug".to_owned()),
    ///     "ARENAPOOL_MAX_ALLOC" => Some("64M".to_owned()),
    ///     _ => None,
    /// });
    /// assert_eq!(config.log_level, Some(Level::Debug));
    /// assert_eq!(config.ceiling, Some(64 * 1024 * 1024));
    /// ```
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::new();

        if let Some(raw) = lookup(LOG_ENV) {
            config.log_level = arenapool_log::level_from_var(LOG_ENV, &raw);
        }

        if let Some(raw) = lookup(MAX_ALLOC_ENV) {
            match parse_byte_count(&raw) {
                Some(ceiling) => config.ceiling = Some(ceiling),
                None => arenapool_log::warn!("{MAX_ALLOC_ENV}: ignoring invalid size {raw:?}"),
            }
        }

        config
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if !self.alignment.is_power_of_two() || self.alignment > MAX_ALIGNMENT {
            return Err(ArenaError::InvalidAlignment {
                alignment: self.alignment,
            });
        }
        Ok(())
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Parses `"4096"`, `"64K"`, `"512m"`, `"2G"` into a byte count.
fn parse_byte_count(raw: &str) -> Option<usize> {
    let raw = raw.trim();
    let (digits, shift) = match raw.char_indices().last()? {
        (i, 'k' | 'K') => (&raw[..i], 10),
        (i, 'm' | 'M') => (&raw[..i], 20),
        (i, 'g' | 'G') => (&raw[..i], 30),
        _ => (raw, 0),
    };
    let value: usize = digits.trim().parse().ok()?;
    value.checked_mul(1usize << shift)
}
