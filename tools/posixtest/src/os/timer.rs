//! Per-process timers and `alarm`.

use std::mem;
use std::ptr;
use std::time::Duration;

use super::errno::{SysResult, cvt};
use super::time::timespec;

/// A `timer_create` timer that delivers a signal. Deleted on drop.
pub struct PosixTimer {
    id: libc::timer_t,
}

impl PosixTimer {
    /// Creates a `CLOCK_MONOTONIC` timer that raises `signo` on expiry.
    pub fn create(signo: libc::c_int) -> SysResult<Self> {
        // SAFETY: sigevent is plain old data; glibc has a private union tail.
        let mut event: libc::sigevent = unsafe { mem::zeroed() };
        event.sigev_notify = libc::SIGEV_SIGNAL;
        event.sigev_signo = signo;
        let mut id: libc::timer_t = ptr::null_mut();
        // SAFETY: `event` and `id` are valid for the call.
        cvt(unsafe { libc::timer_create(libc::CLOCK_MONOTONIC, &mut event, &mut id) })?;
        Ok(Self { id })
    }

    /// Arms the timer: first expiry after `value`, then every `interval`
    /// (zero for one-shot).
    pub fn set(&self, value: Duration, interval: Duration) -> SysResult<()> {
        set_raw(self.id, value, interval)
    }
}

impl Drop for PosixTimer {
    fn drop(&mut self) {
        // SAFETY: `id` came from a successful timer_create.
        unsafe { libc::timer_delete(self.id) };
    }
}

fn set_raw(id: libc::timer_t, value: Duration, interval: Duration) -> SysResult<()> {
    let spec = libc::itimerspec {
        it_interval: timespec(interval),
        it_value: timespec(value),
    };
    // SAFETY: `spec` is initialized; an invalid `id` is reported, not dereferenced.
    cvt(unsafe { libc::timer_settime(id, 0, &spec, ptr::null_mut()) }).map(drop)
}

/// A kernel timer id far above anything a test process allocates. Negative
/// ids are glibc's encoding for `SIGEV_THREAD` timers and are dereferenced.
const UNUSED_TIMER_ID: usize = 0x7fff_fff0;

/// `timer_settime` on a timer id that was never created.
pub fn set_invalid() -> SysResult<()> {
    set_raw(
        ptr::without_provenance_mut(UNUSED_TIMER_ID),
        Duration::ZERO,
        Duration::ZERO,
    )
}

/// Arms `SIGALRM` after `secs` seconds (0 cancels); returns the seconds that
/// were left on the previous alarm.
pub fn alarm(secs: u32) -> u32 {
    // SAFETY: no preconditions.
    unsafe { libc::alarm(secs) }
}
