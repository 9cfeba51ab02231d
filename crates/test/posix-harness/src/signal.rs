//! Signal delivery counters.
//!
//! Each signal number has one process-wide atomic counter. A
//! [`SignalCounter`] installs a handler that increments it, resets it to zero,
//! and restores the previous disposition when dropped, so a case owns the
//! handler for exactly as long as it holds the counter.
//!
//! The handler does nothing but an atomic increment, which is
//! async-signal-safe. The main thread reads the counter with atomic loads only.

use std::io;
use std::mem;
use std::ptr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use crate::rendezvous::poll_until;

/// Highest signal number plus one (glibc `_NSIG`).
const NSIG: usize = 65;

static COUNTS: [AtomicU32; NSIG] = [const { AtomicU32::new(0) }; NSIG];

extern "C" fn count_signal(signo: libc::c_int) {
    if let Some(counter) = usize::try_from(signo).ok().and_then(|i| COUNTS.get(i)) {
        counter.fetch_add(1, Ordering::SeqCst);
    }
}

fn slot(signo: libc::c_int) -> io::Result<&'static AtomicU32> {
    usize::try_from(signo)
        .ok()
        .filter(|&i| i > 0)
        .and_then(|i| COUNTS.get(i))
        .ok_or_else(|| io::Error::from_raw_os_error(libc::EINVAL))
}

/// A counting handler installed for one signal.
pub struct SignalCounter {
    signo: libc::c_int,
    counter: &'static AtomicU32,
    previous: libc::sigaction,
}

impl SignalCounter {
    /// Installs the counting handler for `signo` and zeroes its counter.
    ///
    /// Only one counter per signal should be alive at a time; a second one
    /// would share the count and restore the first one's handler on drop.
    pub fn install(signo: libc::c_int) -> io::Result<Self> {
        let counter = slot(signo)?;
        counter.store(0, Ordering::SeqCst);

        // SAFETY: `sigaction` is plain old data; all-zero is a valid empty
        // action with an empty mask.
        let mut action: libc::sigaction = unsafe { mem::zeroed() };
        action.sa_sigaction = count_signal as extern "C" fn(libc::c_int) as libc::sighandler_t;
        action.sa_flags = 0;
        // SAFETY: `sa_mask` is a valid, writable sigset_t.
        unsafe { libc::sigemptyset(&mut action.sa_mask) };

        // SAFETY: as above.
        let mut previous: libc::sigaction = unsafe { mem::zeroed() };
        // SAFETY: both pointers refer to live, initialized sigaction values;
        // the handler only touches a static atomic.
        if unsafe { libc::sigaction(signo, &action, &mut previous) } != 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(Self {
            signo,
            counter,
            previous,
        })
    }

    /// The signal this counter is installed for.
    pub fn signo(&self) -> libc::c_int {
        self.signo
    }

    /// Deliveries since install or the last reset.
    pub fn count(&self) -> u32 {
        self.counter.load(Ordering::SeqCst)
    }

    /// Zeroes the counter.
    pub fn reset(&self) {
        self.counter.store(0, Ordering::SeqCst);
    }

    /// Polls until the count reaches `n` or `deadline` elapses.
    ///
    /// Returns whether `n` was reached. Polling is needed because a sleep
    /// interrupted by the signal is restarted by the standard library.
    pub fn wait_for(&self, n: u32, deadline: Duration) -> bool {
        poll_until(deadline, Duration::from_millis(1), || self.count() >= n)
    }
}

impl Drop for SignalCounter {
    fn drop(&mut self) {
        // SAFETY: `previous` was filled in by the kernel when the handler was
        // installed and is a valid action to restore.
        unsafe {
            libc::sigaction(self.signo, &self.previous, ptr::null_mut());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_signals_are_rejected() {
        assert!(SignalCounter::install(0).is_err());
        assert!(SignalCounter::install(1000).is_err());
        assert!(SignalCounter::install(-1).is_err());
    }

    #[test]
    fn raised_signal_is_counted_then_reset() {
        // SIGURG is ignored by default, so a delivery after the counter is
        // dropped cannot kill the test process.
        let counter = SignalCounter::install(libc::SIGURG).unwrap();
        assert_eq!(counter.count(), 0);
        // SAFETY: the counting handler is installed.
        unsafe { libc::raise(libc::SIGURG) };
        assert!(counter.wait_for(1, Duration::from_secs(1)));
        counter.reset();
        assert_eq!(counter.count(), 0);
    }
}
