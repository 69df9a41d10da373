//! Cooperative shutdown for the tick loops.
//!
//! SIGINT and SIGTERM set a process-wide flag. The loops check the flag
//! between ticks and poll it during the sleep, so the current tick always
//! completes and the process exits within a fraction of a second of the
//! signal rather than after the full interval.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};

static SHUTDOWN: AtomicBool = AtomicBool::new(false);

/// How often the cancellable sleep re-checks the flag.
const POLL_SLICE: Duration = Duration::from_millis(200);

extern "C" fn handle_signal(_signal: i32) {
    SHUTDOWN.store(true, Ordering::SeqCst);
}

/// Handle to the process-wide shutdown flag.
#[derive(Debug, Clone, Copy)]
pub struct ShutdownFlag;

impl ShutdownFlag {
    /// Install the SIGINT/SIGTERM handlers and return the flag handle.
    pub fn install() -> anyhow::Result<Self> {
        let action = SigAction::new(
            SigHandler::Handler(handle_signal),
            SaFlags::empty(),
            SigSet::empty(),
        );
        for signal in [Signal::SIGINT, Signal::SIGTERM] {
            // SAFETY: the handler only performs an atomic store, which is
            // async-signal-safe. No allocation, locking, or I/O happens in
            // signal context.
            unsafe {
                sigaction(signal, &action)?;
            }
        }
        Ok(Self)
    }

    /// Whether shutdown has been requested.
    #[must_use]
    pub fn is_set(self) -> bool {
        SHUTDOWN.load(Ordering::SeqCst)
    }

    /// Sleep up to `duration`, returning early once the flag is set.
    pub fn sleep(self, duration: Duration) {
        let deadline = Instant::now() + duration;
        while !self.is_set() {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            std::thread::sleep(POLL_SLICE.min(deadline - now));
        }
    }
}
