//! Iterator extension trait

use crate::enumerate::{Monitor, MonitoredEnumerate};
use crate::partition::partition;
use crate::signals::MonitorError;
use crate::sink::ProgressSink;
use crate::tap::{tap, SideEffectTap};
use crate::take::{bounded_take, BoundedTake};

/// Method-call forms of the crate's helpers.
pub trait IterExt: Iterator + Sized {
    /// [`crate::monitored_enumerate`] on `self`.
    fn monitored(self) -> Result<MonitoredEnumerate<Self>, MonitorError> {
        Monitor::new().enumerate(self)
    }

    /// Monitored enumeration with explicit options.
    fn monitored_with<S: ProgressSink + Send + 'static>(
        self,
        monitor: Monitor<S>,
    ) -> Result<MonitoredEnumerate<Self>, MonitorError> {
        monitor.enumerate(self)
    }

    /// At most the first `n` items.
    fn bounded_take(self, n: usize) -> BoundedTake<Self> {
        bounded_take(self, n)
    }

    /// Call `f(index, &item)` on every item as it passes through.
    fn tap_each<F>(self, f: F) -> SideEffectTap<Self, F>
    where
        F: FnMut(usize, &Self::Item),
    {
        tap(self, f)
    }

    /// Split into `(matching, rest)`, consuming `self`.
    fn split_by<P>(self, pred: P) -> (Vec<Self::Item>, Vec<Self::Item>)
    where
        P: FnMut(&Self::Item) -> bool,
    {
        partition(self, pred)
    }
}

impl<I: Iterator> IterExt for I {}
