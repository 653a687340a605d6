//! `enumerate()` that answers a status-request signal with the current index.
//!
//! While a [`MonitoredEnumerate`] is alive and not exhausted it owns the
//! status signal (SIGINFO by default, so Ctrl-T in a BSD/macOS terminal).
//! Requests are answered right away by the guard's watcher thread, from the
//! index the iterating thread last published, even while the loop body or the
//! input is blocked. Monitored enumerations nest; the innermost one answers.
use crate::signals::{status_signal, MonitorError, SignalGuard};
use crate::sink::{ProgressSink, TracingSink};
use nix::sys::signal::Signal;
use std::iter::FusedIterator;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Options for a monitored enumeration.
#[derive(Debug, Clone)]
pub struct Monitor<S = TracingSink> {
    start: usize,
    signal: Option<Signal>,
    sink: S,
}

impl Monitor<TracingSink> {
    /// Start at 0, platform status signal, progress to `tracing`.
    pub fn new() -> Self {
        Self {
            start: 0,
            signal: None,
            sink: TracingSink,
        }
    }
}

impl Default for Monitor<TracingSink> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: ProgressSink + Send + 'static> Monitor<S> {
    /// First index handed out.
    pub fn start(mut self, start: usize) -> Self {
        self.start = start;
        self
    }

    /// Listen on `signal` instead of the platform status signal.
    pub fn signal(mut self, signal: Signal) -> Self {
        self.signal = Some(signal);
        self
    }

    /// Send progress lines to `sink`.
    pub fn sink<T: ProgressSink + Send + 'static>(self, sink: T) -> Monitor<T> {
        Monitor {
            start: self.start,
            signal: self.signal,
            sink,
        }
    }

    /// Install the handler and wrap `iter`.
    ///
    /// Fails before touching the signal table if the platform has no status
    /// signal and none was chosen.
    pub fn enumerate<I: IntoIterator>(
        self,
        iter: I,
    ) -> Result<MonitoredEnumerate<I::IntoIter>, MonitorError> {
        let signal = match self.signal {
            Some(signal) => signal,
            None => status_signal()?,
        };

        self.sink.debug(&usage_hint(signal));
        let progress = Arc::new(Progress::default());
        let report = Arc::clone(&progress);
        let sink = self.sink;
        let guard = SignalGuard::install(signal, move || sink.info(&report.message()))?;

        Ok(MonitoredEnumerate {
            iter: iter.into_iter(),
            next_index: Some(self.start),
            progress,
            guard: Some(guard),
        })
    }
}

/// Enumerate `iter` from 0 with the default signal and sink.
pub fn monitored_enumerate<I: IntoIterator>(
    iter: I,
) -> Result<MonitoredEnumerate<I::IntoIter>, MonitorError> {
    Monitor::new().enumerate(iter)
}

fn usage_hint(signal: Signal) -> String {
    if status_signal().ok() == Some(signal) {
        "enumerating... type Ctrl-T to show current iteration".to_string()
    } else {
        format!(
            "enumerating... send {} to show current iteration",
            signal.as_str()
        )
    }
}

/// Last yielded index, shared with the status watcher.
#[derive(Debug, Default)]
struct Progress {
    started: AtomicBool,
    last: AtomicUsize,
}

impl Progress {
    fn record(&self, index: usize) {
        self.last.store(index, Ordering::Relaxed);
        self.started.store(true, Ordering::Release);
    }

    fn message(&self) -> String {
        if self.started.load(Ordering::Acquire) {
            format!("Iteration: {}", self.last.load(Ordering::Relaxed))
        } else {
            "Iteration: -1".to_string()
        }
    }
}

/// Iterator of `(index, item)` pairs returned by [`Monitor::enumerate`].
///
/// Ends after handing out index `usize::MAX`, without pulling further input.
pub struct MonitoredEnumerate<I> {
    iter: I,
    /// `None` once `usize::MAX` has been handed out.
    next_index: Option<usize>,
    progress: Arc<Progress>,
    /// `None` once the input is exhausted and the handler is back.
    guard: Option<SignalGuard>,
}

impl<I> MonitoredEnumerate<I> {
    /// The line a status request would produce right now.
    pub fn message(&self) -> String {
        self.progress.message()
    }

    /// Whether the status handler is still installed.
    pub fn is_monitoring(&self) -> bool {
        self.guard.is_some()
    }
}

impl<I: Iterator> Iterator for MonitoredEnumerate<I> {
    type Item = (usize, I::Item);

    fn next(&mut self) -> Option<Self::Item> {
        self.guard.as_ref()?;
        let Some(index) = self.next_index else {
            self.guard = None;
            return None;
        };

        match self.iter.next() {
            Some(item) => {
                self.next_index = index.checked_add(1);
                self.progress.record(index);
                Some((index, item))
            }
            None => {
                self.guard = None;
                None
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match (&self.guard, self.next_index) {
            (Some(_), Some(index)) => {
                let room = (usize::MAX - index).saturating_add(1);
                let (lower, upper) = self.iter.size_hint();
                (lower.min(room), Some(upper.map_or(room, |u| u.min(room))))
            }
            _ => (0, Some(0)),
        }
    }
}

impl<I: Iterator> FusedIterator for MonitoredEnumerate<I> {}

impl<I> std::fmt::Debug for MonitoredEnumerate<I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonitoredEnumerate")
            .field("next_index", &self.next_index)
            .field("progress", &self.progress)
            .field("guard", &self.guard)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::tests::{current_handler, eventually, serial, set_handler};
    use crate::sink::tests::{Level, RecordingSink};
    use nix::sys::signal::{raise, sigaction, SigHandler};
    use std::cell::Cell;
    use std::panic::{catch_unwind, AssertUnwindSafe};

    fn usr1(sink: &Arc<RecordingSink>) -> Monitor<Arc<RecordingSink>> {
        Monitor::new().signal(Signal::SIGUSR1).sink(Arc::clone(sink))
    }

    fn infos_become(sink: &RecordingSink, expected: &[&str]) -> bool {
        eventually(|| sink.infos() == expected)
    }

    #[test]
    fn test_pairs_follow_start_index() {
        let _serial = serial();
        let sink = Arc::new(RecordingSink::default());
        let pairs: Vec<_> = usr1(&sink)
            .start(5)
            .enumerate(vec!['a', 'b', 'c'])
            .unwrap()
            .collect();
        assert_eq!(pairs, vec![(5, 'a'), (6, 'b'), (7, 'c')]);
    }

    #[test]
    fn test_default_start_is_zero() {
        let _serial = serial();
        let sink = Arc::new(RecordingSink::default());
        let indices: Vec<usize> = usr1(&sink)
            .enumerate(["x", "y"])
            .unwrap()
            .map(|(i, _)| i)
            .collect();
        assert_eq!(indices, vec![0, 1]);
    }

    #[test]
    fn test_usage_hint_logged_at_debug_before_iteration() {
        let _serial = serial();
        let sink = Arc::new(RecordingSink::default());
        let iter = usr1(&sink).enumerate(0..3).unwrap();
        assert_eq!(
            sink.lines(),
            vec![(
                Level::Debug,
                "enumerating... send SIGUSR1 to show current iteration".to_string()
            )]
        );
        drop(iter);
    }

    #[test]
    fn test_status_request_answered_without_next_call() {
        let _serial = serial();
        let sink = Arc::new(RecordingSink::default());
        let mut iter = usr1(&sink).enumerate(10..20).unwrap();

        assert_eq!(iter.next(), Some((0, 10)));
        assert_eq!(iter.next(), Some((1, 11)));
        raise(Signal::SIGUSR1).unwrap();
        assert!(infos_become(&sink, &["Iteration: 1"]));

        // One request, one line.
        assert_eq!(iter.next(), Some((2, 12)));
        assert_eq!(sink.infos(), vec!["Iteration: 1"]);
        drop(iter);
    }

    #[test]
    fn test_status_request_answered_while_input_blocks() {
        let _serial = serial();
        let sink = Arc::new(RecordingSink::default());
        let watching = Arc::clone(&sink);
        let mut pulls = 0;
        let input = std::iter::from_fn(move || {
            pulls += 1;
            if pulls == 2 {
                // Stuck inside the input: the reply has to arrive from elsewhere.
                raise(Signal::SIGUSR1).unwrap();
                let answered = infos_become(&watching, &["Iteration: 0"]);
                return Some(answered);
            }
            (pulls < 3).then_some(true)
        });

        let pairs: Vec<_> = usr1(&sink).enumerate(input).unwrap().collect();
        assert_eq!(pairs, vec![(0, true), (1, true)]);
        assert_eq!(sink.infos(), vec!["Iteration: 0"]);
    }

    #[test]
    fn test_request_before_first_item_reports_minus_one() {
        let _serial = serial();
        let sink = Arc::new(RecordingSink::default());
        let mut iter = usr1(&sink).start(100).enumerate(["a"]).unwrap();
        assert_eq!(iter.message(), "Iteration: -1");

        raise(Signal::SIGUSR1).unwrap();
        assert!(infos_become(&sink, &["Iteration: -1"]));
        assert_eq!(iter.next(), Some((100, "a")));
        assert_eq!(iter.message(), "Iteration: 100");
    }

    #[test]
    fn test_empty_input_reports_minus_one_and_restores() {
        let _serial = serial();
        let original = set_handler(Signal::SIGUSR1, SigHandler::SigIgn);
        let sink = Arc::new(RecordingSink::default());

        let mut iter = usr1(&sink).enumerate(Vec::<u8>::new()).unwrap();
        raise(Signal::SIGUSR1).unwrap();
        assert_eq!(iter.next(), None);
        assert_eq!(sink.infos(), vec!["Iteration: -1"]);
        assert_eq!(current_handler(Signal::SIGUSR1), SigHandler::SigIgn);

        drop(iter);
        unsafe { sigaction(Signal::SIGUSR1, &original) }.unwrap();
    }

    #[test]
    fn test_handler_restored_on_exhaustion_while_iterator_alive() {
        let _serial = serial();
        let original = set_handler(Signal::SIGUSR1, SigHandler::SigIgn);
        let sink = Arc::new(RecordingSink::default());

        let mut iter = usr1(&sink).enumerate(vec![1, 2, 3]).unwrap();
        assert!(iter.is_monitoring());
        assert_ne!(current_handler(Signal::SIGUSR1), SigHandler::SigIgn);

        let seen: Vec<_> = iter.by_ref().collect();
        assert_eq!(seen, vec![(0, 1), (1, 2), (2, 3)]);
        assert!(!iter.is_monitoring());
        assert_eq!(current_handler(Signal::SIGUSR1), SigHandler::SigIgn);
        assert_eq!(iter.next(), None);
        assert_eq!(iter.size_hint(), (0, Some(0)));

        drop(iter);
        unsafe { sigaction(Signal::SIGUSR1, &original) }.unwrap();
    }

    #[test]
    fn test_handler_restored_on_abandonment() {
        let _serial = serial();
        let original = set_handler(Signal::SIGUSR1, SigHandler::SigIgn);
        let sink = Arc::new(RecordingSink::default());

        let mut iter = usr1(&sink).enumerate(0..).unwrap();
        assert_eq!(iter.next(), Some((0, 0)));
        assert_eq!(iter.next(), Some((1, 1)));
        raise(Signal::SIGUSR1).unwrap();
        drop(iter);

        // Pending request answered before drop returns.
        assert_eq!(sink.infos(), vec!["Iteration: 1"]);
        assert_eq!(current_handler(Signal::SIGUSR1), SigHandler::SigIgn);
        unsafe { sigaction(Signal::SIGUSR1, &original) }.unwrap();
    }

    #[test]
    fn test_handler_restored_when_loop_body_panics() {
        let _serial = serial();
        let original = set_handler(Signal::SIGUSR1, SigHandler::SigIgn);
        let sink = Arc::new(RecordingSink::default());

        let result = catch_unwind(AssertUnwindSafe(|| {
            for (index, _) in usr1(&sink).enumerate(0..10).unwrap() {
                if index == 3 {
                    panic!("boom");
                }
            }
        }));
        assert!(result.is_err());
        assert_eq!(current_handler(Signal::SIGUSR1), SigHandler::SigIgn);
        unsafe { sigaction(Signal::SIGUSR1, &original) }.unwrap();
    }

    #[test]
    fn test_nested_enumerations_answer_innermost_then_restore() {
        let _serial = serial();
        let original = set_handler(Signal::SIGUSR1, SigHandler::SigIgn);
        let sink = Arc::new(RecordingSink::default());

        let mut outer = usr1(&sink).enumerate(0..).unwrap();
        assert_eq!(outer.nth(2), Some((2, 2)));
        {
            let mut inner = usr1(&sink).start(100).enumerate(0..).unwrap();
            assert_eq!(inner.next(), Some((100, 0)));
            raise(Signal::SIGUSR1).unwrap();
            assert!(infos_become(&sink, &["Iteration: 100"]));
        }
        assert!(outer.is_monitoring());
        assert_ne!(current_handler(Signal::SIGUSR1), SigHandler::SigIgn);

        raise(Signal::SIGUSR1).unwrap();
        assert!(infos_become(&sink, &["Iteration: 100", "Iteration: 2"]));

        drop(outer);
        assert_eq!(current_handler(Signal::SIGUSR1), SigHandler::SigIgn);
        unsafe { sigaction(Signal::SIGUSR1, &original) }.unwrap();
    }

    #[test]
    fn test_index_overflow_ends_without_pulling() {
        let _serial = serial();
        let sink = Arc::new(RecordingSink::default());
        let pulled = Cell::new(0);
        let mut iter = usr1(&sink)
            .start(usize::MAX)
            .enumerate((0..).inspect(|_| pulled.set(pulled.get() + 1)))
            .unwrap();

        assert_eq!(iter.size_hint(), (1, Some(1)));
        assert_eq!(iter.next(), Some((usize::MAX, 0)));
        assert_eq!(iter.next(), None);
        assert!(!iter.is_monitoring());
        assert_eq!(pulled.get(), 1);
        assert_eq!(iter.message(), format!("Iteration: {}", usize::MAX));
    }

    #[test]
    fn test_infinite_input_is_lazy() {
        let _serial = serial();
        let sink = Arc::new(RecordingSink::default());
        let firsts: Vec<_> = usr1(&sink).enumerate(0u64..).unwrap().take(3).collect();
        assert_eq!(firsts, vec![(0, 0), (1, 1), (2, 2)]);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_default_signal_unsupported_fails_before_logging() {
        let _serial = serial();
        let sink = Arc::new(RecordingSink::default());
        let err = Monitor::new()
            .sink(Arc::clone(&sink))
            .enumerate(0..3)
            .unwrap_err();
        assert!(matches!(err, MonitorError::Unsupported { .. }));
        assert!(sink.lines().is_empty());

        assert!(monitored_enumerate(vec![1]).is_err());
    }
}
