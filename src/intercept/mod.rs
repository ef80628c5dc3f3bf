//! Host output surface and its interception.
//!
//! The host's output is modelled as an injected capability: a [`Console`]
//! holds the current [`OutputSink`] and every emit goes through it. Installing
//! the interceptor swaps that sink for a capturing wrapper that records the
//! call and then forwards it unchanged to the original sink; uninstalling
//! swaps the original back. There is no process-wide registry involved.

pub mod capture;
pub mod layer;

pub use capture::{pass_through, Interceptor, Recorder};
pub use layer::CaptureLayer;

use crate::types::{render_args, LogArg, LogLevel};
use arc_swap::ArcSwap;
use std::io::Write;
use std::sync::Arc;

/// Output channels a host can write to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputChannel {
    /// General output
    Log,
    /// Debug output
    Debug,
    /// Informational output
    Info,
    /// Warnings
    Warn,
    /// Errors
    Error,
}

impl OutputChannel {
    /// Severity recorded for calls on this channel
    pub fn level(self) -> LogLevel {
        match self {
            OutputChannel::Log | OutputChannel::Info => LogLevel::Info,
            OutputChannel::Debug => LogLevel::Debug,
            OutputChannel::Warn => LogLevel::Warn,
            OutputChannel::Error => LogLevel::Error,
        }
    }
}

/// A destination for host output, one method per channel.
///
/// Implementations must not panic; they are called from arbitrary host code.
pub trait OutputSink: Send + Sync {
    /// Write one call's arguments to `channel`
    fn emit(&self, channel: OutputChannel, args: &[LogArg]);

    /// General output
    fn log(&self, args: &[LogArg]) {
        self.emit(OutputChannel::Log, args)
    }

    /// Debug output
    fn debug(&self, args: &[LogArg]) {
        self.emit(OutputChannel::Debug, args)
    }

    /// Informational output
    fn info(&self, args: &[LogArg]) {
        self.emit(OutputChannel::Info, args)
    }

    /// Warnings
    fn warn(&self, args: &[LogArg]) {
        self.emit(OutputChannel::Warn, args)
    }

    /// Errors
    fn error(&self, args: &[LogArg]) {
        self.emit(OutputChannel::Error, args)
    }
}

/// Writes log/debug/info to stdout and warn/error to stderr
#[derive(Debug, Clone, Copy, Default)]
pub struct StdioSink;

impl OutputSink for StdioSink {
    fn emit(&self, channel: OutputChannel, args: &[LogArg]) {
        let line = render_args(args);
        // A closed stdout/stderr must not take the host down with it.
        let _ = match channel {
            OutputChannel::Warn | OutputChannel::Error => writeln!(std::io::stderr().lock(), "{}", line),
            _ => writeln!(std::io::stdout().lock(), "{}", line),
        };
    }
}

/// The host's output surface.
///
/// Cloning the `Arc<Console>` shares the surface; swapping its sink is
/// visible to every holder immediately.
pub struct Console {
    sink: ArcSwap<Arc<dyn OutputSink>>,
}

impl Console {
    /// Create a surface writing to `sink`
    pub fn new(sink: Arc<dyn OutputSink>) -> Self {
        Self {
            sink: ArcSwap::from_pointee(sink),
        }
    }

    /// Create a surface writing to stdout/stderr
    pub fn stdio() -> Self {
        Self::new(Arc::new(StdioSink))
    }

    /// The sink currently receiving output
    pub fn current(&self) -> Arc<dyn OutputSink> {
        Arc::clone(&**self.sink.load())
    }

    /// Install `sink` and return the one it replaced
    pub fn replace(&self, sink: Arc<dyn OutputSink>) -> Arc<dyn OutputSink> {
        let previous = self.sink.swap(Arc::new(sink));
        Arc::clone(&*previous)
    }

    /// Install `sink` only if `expected` is still the current sink
    pub(crate) fn replace_if_current(&self, expected: &Arc<dyn OutputSink>, sink: Arc<dyn OutputSink>) -> bool {
        let current = self.sink.load();
        if !same_sink(&**current, expected) {
            return false;
        }
        let previous = self.sink.compare_and_swap(&current, Arc::new(sink));
        Arc::ptr_eq(&*previous, &*current)
    }

    /// Write to `channel` through the current sink
    pub fn emit(&self, channel: OutputChannel, args: &[LogArg]) {
        let sink = self.current();
        sink.emit(channel, args);
    }

    /// General output
    pub fn log(&self, args: &[LogArg]) {
        self.emit(OutputChannel::Log, args)
    }

    /// Debug output
    pub fn debug(&self, args: &[LogArg]) {
        self.emit(OutputChannel::Debug, args)
    }

    /// Informational output
    pub fn info(&self, args: &[LogArg]) {
        self.emit(OutputChannel::Info, args)
    }

    /// Warnings
    pub fn warn(&self, args: &[LogArg]) {
        self.emit(OutputChannel::Warn, args)
    }

    /// Errors
    pub fn error(&self, args: &[LogArg]) {
        self.emit(OutputChannel::Error, args)
    }
}

/// Identity of two sinks, ignoring vtable metadata
fn same_sink(a: &Arc<dyn OutputSink>, b: &Arc<dyn OutputSink>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

impl Default for Console {
    fn default() -> Self {
        Self::stdio()
    }
}

impl std::fmt::Debug for Console {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Console").finish_non_exhaustive()
    }
}
