//! Leveled diagnostic logging for the `arenapool` allocator.
//!
//! The allocator core never formats or prints anything itself. Chunk growth,
//! arena lifecycle events, usage reports and fatal diagnostics all go through
//! the macros in this crate, which write to standard error so that they never
//! interleave with a program's regular output.
//!
//! # Example
//!
//! ```
//! use arenapool_log::{error, warn, info, debug, Level};
//!
//! // Set the minimum log level
//! arenapool_log::set_level(Level::Debug);
//!
//! let arena = 3;
//! info!("arena {} created", arena);
//! debug!("chunk sizes: {:?}", vec![4096, 8192]);
//! warn!("ceiling override ignored");
//! error!("budget exceeded");
//! ```
//!
//! # Environment
//!
//! [`level_from_var`] parses the value of a level variable such as
//! `ARENAPOOL_LOG`, accepting either a level name (`"debug"`) or its numeric
//! severity (`"3"`).

use std::fmt::Arguments;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU8, Ordering};

/// Log levels representing the severity/priority of log messages.
///
/// `Levels` are ordered from most severe (Error) to least severe (Trace).
/// Lower numeric values indicate higher severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    /// Fatal allocator conditions, emitted right before termination.
    Error = 0,
    /// Recoverable oddities such as an ignored configuration value.
    Warn = 1,
    /// Usage reports and pool lifecycle.
    Info = 2,
    /// Chunk growth and arena creation/destruction.
    Debug = 3,
    /// Per-arena resets and chain walks.
    Trace = 4,
}

impl Level {
    /// Returns the ANSI color code for this log level.
    const fn color_code(&self) -> &'static str {
        match self {
            Level::Error => "\x1b[31m", // Red
            Level::Warn => "\x1b[33m",  // Yellow
            Level::Info => "\x1b[32m",  // Green
            Level::Debug => "\x1b[36m", // Cyan
            Level::Trace => "\x1b[35m", // Magenta
        }
    }

    /// Returns the string representation of this log level.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Level::Error => "ERROR",
            Level::Warn => "WARN",
            Level::Info => "INFO",
            Level::Debug => "DEBUG",
            Level::Trace => "TRACE",
        }
    }

    const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Level::Error),
            1 => Some(Level::Warn),
            2 => Some(Level::Info),
            3 => Some(Level::Debug),
            4 => Some(Level::Trace),
            _ => None,
        }
    }

    /// Parses a string into a Level.
    ///
    /// Accepts level names in any case, or the numeric severity `0..=4`.
    ///
    /// # Example
    ///
    /// ```
    /// use arenapool_log::Level;
    ///
    /// assert_eq!(Level::from_str("error"), Ok(Level::Error));
    /// assert_eq!(Level::from_str("INFO"), Ok(Level::Info));
    /// assert_eq!(Level::from_str("3"), Ok(Level::Debug));
    /// assert!(Level::from_str("invalid").is_err());
    /// ```
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self, String> {
        let trimmed = s.trim();
        if let Ok(n) = trimmed.parse::<u8>() {
            return Level::from_u8(n)
                .ok_or_else(|| format!("Invalid log level: {s}"));
        }
        match trimmed.to_uppercase().as_str() {
            "ERROR" => Ok(Level::Error),
            "WARN" | "WARNING" => Ok(Level::Warn),
            "INFO" => Ok(Level::Info),
            "DEBUG" => Ok(Level::Debug),
            "TRACE" => Ok(Level::Trace),
            _ => Err(format!("Invalid log level: {s}")),
        }
    }
}

/// The global logger instance.
///
/// This struct uses atomic operations for level management so that the
/// level can be read from any thread that owns a pool.
pub struct Logger {
    level: AtomicU8,
}

impl Logger {
    /// Creates a new logger with the specified minimum level.
    const fn new(level: Level) -> Self {
        Logger {
            level: AtomicU8::new(level as u8),
        }
    }

    /// Sets the minimum log level.
    ///
    /// Messages below this level will not be logged.
    pub fn set_level(&self, level: Level) {
        self.level.store(level as u8, Ordering::SeqCst);
    }

    /// Returns the current minimum log level.
    pub fn level(&self) -> Level {
        Level::from_u8(self.level.load(Ordering::Relaxed)).unwrap_or(Level::Warn)
    }

    /// Checks if a message at the given level would be logged.
    pub fn enabled(&self, level: Level) -> bool {
        level as u8 <= self.level.load(Ordering::Relaxed)
    }
}

/// Global logger singleton.
static LOGGER: OnceLock<Logger> = OnceLock::new();

/// Returns a reference to the global logger instance.
///
/// The logger starts at `Level::Warn`: an allocator should stay silent
/// unless something is wrong or the user asked for more.
///
/// # Example
///
/// ```
/// use arenapool_log::get_logger;
///
/// let logger = get_logger();
/// logger.set_level(arenapool_log::Level::Debug);
/// ```
pub fn get_logger() -> &'static Logger {
    LOGGER.get_or_init(|| Logger::new(Level::Warn))
}

/// Sets the minimum log level for the global logger.
pub fn set_level(level: Level) {
    get_logger().set_level(level);
}

/// Sets the minimum log level from a string.
///
/// # Example
///
/// ```
/// use arenapool_log::set_level_from_str;
///
/// set_level_from_str("debug").unwrap();
/// ```
pub fn set_level_from_str(s: &str) -> Result<(), String> {
    let level = Level::from_str(s)?;
    set_level(level);
    Ok(())
}

/// Parses `raw`, the value of the level variable `var`.
///
/// An unparsable value is reported at warn level and yields `None`. The
/// global level is not touched.
///
/// # Example
///
/// ```
/// use arenapool_log::{level_from_var, Level};
///
/// assert_eq!(level_from_var("ARENAPOOL_LOG", "trace"), Some(Level::Trace));
/// assert_eq!(level_from_var("ARENAPOOL_LOG", "loud"), None);
/// ```
pub fn level_from_var(var: &str, raw: &str) -> Option<Level> {
    match Level::from_str(raw) {
        Ok(level) => Some(level),
        Err(msg) => {
            crate::warn!("{var}: {msg}");
            None
        }
    }
}

/// Internal function that performs the actual logging.
///
/// This function is called by the log macros after checking if the level is enabled.
#[doc(hidden)]
pub fn __log_with_target(level: Level, target: &str, args: Arguments) {
    static RESET: &str = "\x1b[0m";

    if !get_logger().enabled(level) {
        return;
    }

    let color = level.color_code();
    let level_str = level.as_str();

    eprintln!("{color}[{level_str}]{RESET} {target}: {args}");
}

/// The primary logging macro.
///
/// Logs a message at the specified level. The macro automatically captures
/// the module path where it was called.
///
/// # Example
///
/// ```
/// use arenapool_log::{log, Level};
///
/// log!(level: Level::Info, "arena {} reset", 0);
/// ```
#[macro_export]
macro_rules! log {
    (level: $level:expr, $($arg:tt)*) => {
        {
            if $crate::get_logger().enabled($level) {
                $crate::__log_with_target(
                    $level,
                    module_path!(),
                    format_args!($($arg)*)
                );
            }
        }
    };
}

/// Logs a message at the Error level.
#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => {
        $crate::log!(level: $crate::Level::Error, $($arg)*)
    };
}

/// Logs a message at the Warn level.
#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {
        $crate::log!(level: $crate::Level::Warn, $($arg)*)
    };
}

/// Logs a message at the Info level.
#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => {
        $crate::log!(level: $crate::Level::Info, $($arg)*)
    };
}

/// Logs a message at the Debug level.
#[macro_export]
macro_rules! debug {
    ($($arg:tt)*) => {
        $crate::log!(level: $crate::Level::Debug, $($arg)*)
    };
}

/// Logs a message at the Trace level.
///
/// # Example
///
/// ```
/// use arenapool_log::trace;
///
/// # arenapool_log::set_level(arenapool_log::Level::Trace);
/// trace!("walking chain of arena {}", 2);
/// ```
#[macro_export]
macro_rules! trace {
    ($($arg:tt)*) => {
        $crate::log!(level: $crate::Level::Trace, $($arg)*)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_ordering() {
        assert!(Level::Error < Level::Warn);
        assert!(Level::Warn < Level::Info);
        assert!(Level::Info < Level::Debug);
        assert!(Level::Debug < Level::Trace);
    }

    #[test]
    fn test_level_from_str() {
        assert_eq!(Level::from_str("error"), Ok(Level::Error));
        assert_eq!(Level::from_str("WARN"), Ok(Level::Warn));
        assert_eq!(Level::from_str("warning"), Ok(Level::Warn));
        assert_eq!(Level::from_str("Info"), Ok(Level::Info));
        assert_eq!(Level::from_str(" DEBUG "), Ok(Level::Debug));
        assert_eq!(Level::from_str("trace"), Ok(Level::Trace));
        assert!(Level::from_str("invalid").is_err());
    }

    #[test]
    fn test_level_from_numeric_str() {
        assert_eq!(Level::from_str("0"), Ok(Level::Error));
        assert_eq!(Level::from_str("2"), Ok(Level::Info));
        assert_eq!(Level::from_str("4"), Ok(Level::Trace));
        assert!(Level::from_str("5").is_err());
    }

    #[test]
    fn test_level_as_str() {
        assert_eq!(Level::Error.as_str(), "ERROR");
        assert_eq!(Level::Warn.as_str(), "WARN");
        assert_eq!(Level::Info.as_str(), "INFO");
        assert_eq!(Level::Debug.as_str(), "DEBUG");
        assert_eq!(Level::Trace.as_str(), "TRACE");
    }

    #[test]
    fn test_logger_level_filtering() {
        let logger = Logger::new(Level::Info);

        assert!(logger.enabled(Level::Error));
        assert!(logger.enabled(Level::Warn));
        assert!(logger.enabled(Level::Info));
        assert!(!logger.enabled(Level::Debug));
        assert!(!logger.enabled(Level::Trace));

        logger.set_level(Level::Debug);

        assert!(logger.enabled(Level::Debug));
        assert!(!logger.enabled(Level::Trace));

        logger.set_level(Level::Trace);

        assert!(logger.enabled(Level::Trace));
        assert_eq!(logger.level(), Level::Trace);
    }

    // The global level is shared by every test in this binary, so all the
    // assertions that mutate it live in one test.
    #[test]
    fn test_global_level_configuration() {
        set_level_from_str("debug").unwrap();
        assert_eq!(get_logger().level(), Level::Debug);

        set_level_from_str("ERROR").unwrap();
        assert_eq!(get_logger().level(), Level::Error);

        assert!(set_level_from_str("invalid").is_err());
        assert_eq!(get_logger().level(), Level::Error);

        let logger1 = get_logger();
        let logger2 = get_logger();
        logger1.set_level(Level::Warn);
        assert_eq!(logger2.level(), Level::Warn);
        assert!(std::ptr::eq(logger1, logger2));

        assert_eq!(level_from_var("TEST_LOG", "debug"), Some(Level::Debug));
        assert_eq!(level_from_var("TEST_LOG", "9"), None);
        assert_eq!(get_logger().level(), Level::Warn);
    }

    #[test]
    fn test_macros_basic() {
        info!("This is an info message");
        debug!("arena {} grew by {} bytes", 1, 4096);
        trace!("{:?}", [1, 2, 3]);
    }
}
