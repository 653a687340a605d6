//! Scoped ownership of the process-wide status-request signal.
//!
//! [`SignalGuard::install`] swaps in a handler that writes one byte to a
//! socketpair, and starts a watcher thread that reads it and runs the guard's
//! callback. Replies therefore go out while the iterating thread is busy,
//! without any work inside the handler besides `write(2)`.
//!
//! Guards stack. Each keeps the disposition it replaced; a request wakes the
//! innermost live guard; dropping a guard restores what it replaced. A guard
//! dropped out of order hands its saved disposition to the guard installed
//! right after it on the same signal, so the original still comes back last.
use nix::errno::Errno;
use nix::libc::c_int;
use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};
use std::io::Read;
use std::net::Shutdown;
use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::net::UnixStream;
use std::sync::atomic::{AtomicI32, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;

/// Write end of the innermost guard's socketpair, or -1.
static WAKE_FD: AtomicI32 = AtomicI32::new(-1);

static NEXT_ID: AtomicU64 = AtomicU64::new(0);

/// Live guards, innermost last.
static STACK: Mutex<Vec<Frame>> = Mutex::new(Vec::new());

static REQUEST: u8 = b'?';

struct Frame {
    id: u64,
    signal: Signal,
    previous: SigAction,
    wake_fd: RawFd,
}

fn stack() -> MutexGuard<'static, Vec<Frame>> {
    STACK.lock().unwrap_or_else(PoisonError::into_inner)
}

extern "C" fn on_status_request(_signum: c_int) {
    let fd = WAKE_FD.load(Ordering::SeqCst);
    if fd >= 0 {
        // SAFETY: write(2) is async-signal-safe. The write end is non-blocking,
        // so a full buffer drops the wakeup instead of stalling the handler.
        let _ = unsafe { nix::libc::write(fd, std::ptr::addr_of!(REQUEST).cast(), 1) };
    }
}

/// Errors raised while setting up status monitoring.
#[derive(Debug)]
pub enum MonitorError {
    /// The platform has no such signal (SIGINFO outside BSD/macOS).
    Unsupported { signal: &'static str },
    /// A signal name that does not parse.
    UnknownSignal { name: String },
    /// The wakeup socketpair or the watcher thread could not be created.
    Watcher { source: std::io::Error },
    /// The OS refused the new handler.
    Install { signal: Signal, source: Errno },
}

impl std::fmt::Display for MonitorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MonitorError::Unsupported { signal } => {
                write!(
                    f,
                    "{} is not available on this platform; pick another signal such as SIGUSR1",
                    signal
                )
            }
            MonitorError::UnknownSignal { name } => {
                write!(f, "unknown signal name '{}'", name)
            }
            MonitorError::Watcher { source } => {
                write!(f, "failed to start status watcher: {}", source)
            }
            MonitorError::Install { signal, source } => {
                write!(
                    f,
                    "failed to install status handler for {}: {}",
                    signal.as_str(),
                    source
                )
            }
        }
    }
}

impl std::error::Error for MonitorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MonitorError::Watcher { source } => Some(source),
            MonitorError::Install { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// The interactive status-request signal of the host platform (SIGINFO, Ctrl-T).
#[cfg(any(
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd",
    target_os = "dragonfly",
    target_os = "netbsd",
    target_os = "openbsd"
))]
pub fn status_signal() -> Result<Signal, MonitorError> {
    Ok(Signal::SIGINFO)
}

/// The interactive status-request signal of the host platform (SIGINFO, Ctrl-T).
#[cfg(not(any(
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd",
    target_os = "dragonfly",
    target_os = "netbsd",
    target_os = "openbsd"
)))]
pub fn status_signal() -> Result<Signal, MonitorError> {
    Err(MonitorError::Unsupported { signal: "SIGINFO" })
}

/// Parse a signal name such as `SIGUSR1`, `usr1` or `INFO`.
pub fn parse_signal(name: &str) -> Result<Signal, MonitorError> {
    let upper = name.trim().to_ascii_uppercase();
    let full = if upper.starts_with("SIG") {
        upper
    } else {
        format!("SIG{upper}")
    };

    if full == "SIGINFO" {
        return status_signal();
    }

    full.parse::<Signal>()
        .map_err(|_| MonitorError::UnknownSignal {
            name: name.to_string(),
        })
}

/// Our handler on `signal`, with a watcher thread answering requests.
pub struct SignalGuard {
    id: u64,
    signal: Signal,
    wake: UnixStream,
    watcher: Option<JoinHandle<()>>,
}

impl SignalGuard {
    /// Install the status handler for `signal` and run `on_request` on a
    /// watcher thread once per request until the guard drops.
    pub fn install<F>(signal: Signal, on_request: F) -> Result<Self, MonitorError>
    where
        F: FnMut() + Send + 'static,
    {
        let (reader, wake) =
            UnixStream::pair().map_err(|source| MonitorError::Watcher { source })?;
        wake.set_nonblocking(true)
            .map_err(|source| MonitorError::Watcher { source })?;
        let watcher = std::thread::Builder::new()
            .name("iter8-status".to_string())
            .spawn(move || watch(reader, on_request))
            .map_err(|source| MonitorError::Watcher { source })?;

        let action = SigAction::new(
            SigHandler::Handler(on_status_request),
            SaFlags::SA_RESTART,
            SigSet::empty(),
        );
        let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        let mut frames = stack();
        // SAFETY: the handler only calls write(2) on a descriptor we own.
        match unsafe { sigaction(signal, &action) } {
            Ok(previous) => {
                frames.push(Frame {
                    id,
                    signal,
                    previous,
                    wake_fd: wake.as_raw_fd(),
                });
                WAKE_FD.store(wake.as_raw_fd(), Ordering::SeqCst);
                tracing::debug!(
                    signal = signal.as_str(),
                    depth = frames.len(),
                    "status handler installed"
                );
                Ok(Self {
                    id,
                    signal,
                    wake,
                    watcher: Some(watcher),
                })
            }
            Err(source) => {
                drop(frames);
                stop_watcher(&wake, watcher);
                Err(MonitorError::Install { signal, source })
            }
        }
    }

    /// The signal this guard answers.
    pub fn signal(&self) -> Signal {
        self.signal
    }

    fn unstack(&self) {
        let mut frames = stack();
        let Some(pos) = frames.iter().position(|f| f.id == self.id) else {
            return;
        };
        let frame = frames.remove(pos);
        if pos != frames.len() {
            tracing::warn!(
                signal = self.signal.as_str(),
                "status guard dropped out of order"
            );
        }

        match frames[pos..].iter_mut().find(|f| f.signal == frame.signal) {
            // A later guard replaced ours; it restores our predecessor instead.
            Some(above) => above.previous = frame.previous,
            // SAFETY: reinstalls the disposition sigaction handed back at install.
            None => match unsafe { sigaction(frame.signal, &frame.previous) } {
                Ok(_) => tracing::debug!(signal = frame.signal.as_str(), "status handler restored"),
                Err(e) => tracing::warn!(
                    error = %e,
                    signal = frame.signal.as_str(),
                    "failed to restore previous signal handler"
                ),
            },
        }

        let top = frames.last().map_or(-1, |f| f.wake_fd);
        WAKE_FD.store(top, Ordering::SeqCst);
    }
}

/// Answer one request per byte until the write end shuts down.
fn watch<F: FnMut()>(mut reader: UnixStream, mut on_request: F) {
    let mut buf = [0u8; 64];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                for _ in 0..n {
                    on_request();
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                tracing::warn!(error = %e, "status watcher stopped");
                break;
            }
        }
    }
}

/// Close the write end so the watcher drains pending requests and exits.
fn stop_watcher(wake: &UnixStream, watcher: JoinHandle<()>) {
    if let Err(e) = wake.shutdown(Shutdown::Write) {
        tracing::warn!(error = %e, "failed to shut down status wakeup");
        return;
    }
    if watcher.join().is_err() {
        tracing::warn!("status watcher panicked");
    }
}

impl std::fmt::Debug for SignalGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalGuard")
            .field("id", &self.id)
            .field("signal", &self.signal)
            .finish_non_exhaustive()
    }
}

impl Drop for SignalGuard {
    fn drop(&mut self) {
        self.unstack();
        if let Some(watcher) = self.watcher.take() {
            stop_watcher(&self.wake, watcher);
        }
    }
}
