//! Where fatal conditions go.
//!
//! A fatal error means the pool can no longer honour its budget or the
//! caller misused it; the pool hands a human-readable message to its
//! [`DiagnosticSink`] and then asks it to terminate. No error codes cross
//! this boundary.

use std::cell::RefCell;

/// Receives fatal diagnostics and ends the process.
pub trait DiagnosticSink {
    /// Records or prints a diagnostic message.
    fn emit(&self, message: &str);

    /// Terminates. Never returns.
    fn terminate(&self) -> !;
}

/// Default sink: logs at error level, then aborts the process.
///
/// With the `fatal-backtrace` feature the diagnostic is followed by a
/// backtrace of the failing call.
#[derive(Debug, Default, Clone, Copy)]
pub struct AbortSink;

impl DiagnosticSink for AbortSink {
    fn emit(&self, message: &str) {
        arenapool_log::error!("{message}");

        #[cfg(feature = "fatal-backtrace")]
        arenapool_log::error!("{:?}", backtrace::Backtrace::new());
    }

    fn terminate(&self) -> ! {
        arenapool_log::error!("Aborting.");
        std::process::abort()
    }
}

/// Sink that panics with the last emitted message instead of aborting.
///
/// Lets tests observe fatal paths with `#[should_panic]` or
/// `std::panic::catch_unwind`.
#[derive(Debug, Default)]
pub struct PanicSink {
    last: RefCell<Option<String>>,
}

impl PanicSink {
    /// Creates a sink with no recorded message.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl DiagnosticSink for PanicSink {
    fn emit(&self, message: &str) {
        *self.last.borrow_mut() = Some(message.to_owned());
    }

    fn terminate(&self) -> ! {
        let message = self
            .last
            .borrow_mut()
            .take()
            .unwrap_or_else(|| "arena pool terminated".to_owned());
        panic!("{message}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[should_panic(expected = "Bad arena 7")]
    fn test_panic_sink_carries_message() {
        let sink = PanicSink::new();
        sink.emit("Bad arena 7: pool has 2 arenas");
        sink.terminate();
    }

    #[test]
    #[should_panic(expected = "arena pool terminated")]
    fn test_panic_sink_without_message() {
        PanicSink::new().terminate();
    }
}
