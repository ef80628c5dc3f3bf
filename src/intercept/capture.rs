//! Installing and removing the capturing wrapper on a [`Console`]

use super::{Console, OutputChannel, OutputSink};
use crate::types::{render_args, LogArg, LogLevel, LogMetadata};
use parking_lot::Mutex;
use std::cell::Cell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

thread_local! {
    static PASS_THROUGH: Cell<bool> = const { Cell::new(false) };
}

/// Resets the pass-through flag even if the closure panics
struct PassThroughGuard {
    previous: bool,
}

impl Drop for PassThroughGuard {
    fn drop(&mut self) {
        PASS_THROUGH.with(|flag| flag.set(self.previous));
    }
}

/// Run `f` with capture disabled on this thread.
///
/// Output emitted inside `f` still reaches the host's sinks, but no capturing
/// wrapper records it, whichever agent installed the wrapper.
pub fn pass_through<R>(f: impl FnOnce() -> R) -> R {
    let _guard = PassThroughGuard {
        previous: PASS_THROUGH.with(|flag| flag.replace(true)),
    };
    f()
}

fn capture_suppressed() -> bool {
    PASS_THROUGH.with(Cell::get)
}

/// Receives every captured output call
pub trait Recorder: Send + Sync {
    /// Record one call. Must not block on I/O and must not panic.
    fn record(&self, level: LogLevel, message: String, metadata: LogMetadata);

    /// Whether captures are currently wanted
    fn is_intercepting(&self) -> bool {
        true
    }
}

/// Wrapper installed in place of the host's sink while intercepting.
///
/// Once deactivated it only forwards; a wrapper that another sink was stacked
/// on top of cannot be unlinked and stays in the chain that way.
struct CapturingSink {
    original: Arc<dyn OutputSink>,
    recorder: Arc<dyn Recorder>,
    active: AtomicBool,
}

impl OutputSink for CapturingSink {
    fn emit(&self, channel: OutputChannel, args: &[LogArg]) {
        if self.active.load(Ordering::Acquire)
            && !capture_suppressed()
            && self.recorder.is_intercepting()
        {
            let mut metadata = LogMetadata::new();
            metadata.insert("source".to_string(), "console".into());
            self.recorder.record(channel.level(), render_args(args), metadata);
        }

        self.original.emit(channel, args);
    }
}

/// Owns the hook registration on one [`Console`]
pub struct Interceptor {
    console: Arc<Console>,
    recorder: Arc<dyn Recorder>,
    installed: Mutex<Option<Arc<CapturingSink>>>,
}

impl Interceptor {
    /// Prepare an interceptor; nothing is installed yet
    pub fn new(console: Arc<Console>, recorder: Arc<dyn Recorder>) -> Self {
        Self {
            console,
            recorder,
            installed: Mutex::new(None),
        }
    }

    /// Install the capturing wrapper. Returns `false` if it was already installed.
    pub fn install(&self) -> bool {
        let mut installed = self.installed.lock();
        if installed.is_some() {
            return false;
        }

        let wrapper = Arc::new(CapturingSink {
            original: self.console.current(),
            recorder: Arc::clone(&self.recorder),
            active: AtomicBool::new(true),
        });
        self.console.replace(wrapper.clone());
        *installed = Some(wrapper);

        debug!("Output interception installed");
        true
    }

    /// Stop capturing and restore the original sink. Returns `false` if
    /// nothing was installed.
    ///
    /// If another sink was installed on top of this one in the meantime, the
    /// console is left alone and the wrapper degrades to pass-through.
    pub fn uninstall(&self) -> bool {
        let Some(wrapper) = self.installed.lock().take() else {
            return false;
        };
        wrapper.active.store(false, Ordering::Release);

        let ours: Arc<dyn OutputSink> = wrapper.clone();
        if self.console.replace_if_current(&ours, Arc::clone(&wrapper.original)) {
            debug!("Output interception removed");
        } else {
            warn!("Console sink was replaced after interception started, leaving it in place");
        }
        true
    }

    /// Whether the wrapper is currently installed
    pub fn is_installed(&self) -> bool {
        self.installed.lock().is_some()
    }

    /// The surface this interceptor hooks
    pub fn console(&self) -> &Arc<Console> {
        &self.console
    }
}
