//! Small iteration helpers.
//!
//! - [`monitored_enumerate`]: `enumerate()` that answers SIGINFO (Ctrl-T) with
//!   the current index.
//! - [`bounded_take`]: at most the first N items, without pulling item N+1.
//! - [`tap`]: pass items through unchanged, calling a callback on each.
//! - [`partition`]: split a sequence in one pass.
//!
//! [`IterExt`] offers the same helpers as iterator methods.
pub mod config;
pub mod enumerate;
pub mod ext;
pub mod partition;
pub mod signals;
pub mod sink;
pub mod take;
pub mod tap;

pub use enumerate::{monitored_enumerate, Monitor, MonitoredEnumerate};
pub use ext::IterExt;
pub use partition::{partition, try_partition};
pub use signals::{parse_signal, status_signal, MonitorError, SignalGuard};
pub use sink::{ProgressSink, TracingSink};
pub use take::{bounded_take, try_bounded_take, BoundError, BoundedTake};
pub use tap::{tap, try_tap, SideEffectTap, TryTap};
