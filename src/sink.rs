//! Progress sinks: where status lines from a monitored enumeration go.
//!
//! The default sink logs through `tracing` under the `SIGINFO` target, so
//! subscribers can filter or route progress lines separately
//! (e.g. `RUST_LOG=SIGINFO=info`).
use std::rc::Rc;
use std::sync::Arc;

/// Tracing target used by [`TracingSink`].
pub const SIGINFO_TARGET: &str = "SIGINFO";

/// Receiver for the two kinds of line a monitored enumeration emits.
///
/// Status replies are sent from the watcher thread, so sinks handed to
/// [`crate::Monitor::sink`] must be `Send + 'static`.
pub trait ProgressSink {
    /// Usage hint, sent once before iteration starts.
    fn debug(&self, message: &str);

    /// Answer to a status request.
    fn info(&self, message: &str);
}

/// Default sink: `tracing` events under the `SIGINFO` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl ProgressSink for TracingSink {
    fn debug(&self, message: &str) {
        tracing::debug!(target: SIGINFO_TARGET, "{message}");
    }

    fn info(&self, message: &str) {
        tracing::info!(target: SIGINFO_TARGET, "{message}");
    }
}

impl<S: ProgressSink + ?Sized> ProgressSink for &S {
    fn debug(&self, message: &str) {
        (**self).debug(message)
    }

    fn info(&self, message: &str) {
        (**self).info(message)
    }
}

impl<S: ProgressSink + ?Sized> ProgressSink for Box<S> {
    fn debug(&self, message: &str) {
        (**self).debug(message)
    }

    fn info(&self, message: &str) {
        (**self).info(message)
    }
}

impl<S: ProgressSink + ?Sized> ProgressSink for Rc<S> {
    fn debug(&self, message: &str) {
        (**self).debug(message)
    }

    fn info(&self, message: &str) {
        (**self).info(message)
    }
}

impl<S: ProgressSink + ?Sized> ProgressSink for Arc<S> {
    fn debug(&self, message: &str) {
        (**self).debug(message)
    }

    fn info(&self, message: &str) {
        (**self).info(message)
    }
}
