//! Clock and timespec helpers.
//!
//! POSIX timed waits take an absolute `CLOCK_REALTIME` deadline. The suites
//! think in relative timeouts, so [`deadline_after`] does the conversion at
//! the moment of the call.

use std::mem;
use std::time::Duration;

use super::errno::{SysResult, cvt};

const NANOS_PER_SEC: libc::c_long = 1_000_000_000;

/// Reads `clock`.
pub fn now(clock: libc::clockid_t) -> SysResult<libc::timespec> {
    // SAFETY: timespec is plain old data.
    let mut ts: libc::timespec = unsafe { mem::zeroed() };
    // SAFETY: `ts` is a valid out-pointer.
    cvt(unsafe { libc::clock_gettime(clock, &mut ts) })?;
    Ok(ts)
}

/// `ts + d`, normalized.
pub fn add(ts: libc::timespec, d: Duration) -> libc::timespec {
    let secs = libc::time_t::try_from(d.as_secs()).unwrap_or(libc::time_t::MAX);
    let mut out = ts;
    out.tv_sec = out.tv_sec.saturating_add(secs);
    out.tv_nsec += d.subsec_nanos() as libc::c_long;
    if out.tv_nsec >= NANOS_PER_SEC {
        out.tv_sec = out.tv_sec.saturating_add(1);
        out.tv_nsec -= NANOS_PER_SEC;
    }
    out
}

/// Absolute `CLOCK_REALTIME` deadline `timeout` from now.
pub fn deadline_after(timeout: Duration) -> SysResult<libc::timespec> {
    Ok(add(now(libc::CLOCK_REALTIME)?, timeout))
}

/// A relative timespec.
pub fn timespec(d: Duration) -> libc::timespec {
    // SAFETY: timespec is plain old data.
    let zero: libc::timespec = unsafe { mem::zeroed() };
    add(zero, d)
}

/// Seconds since the epoch, as `time()` reports them.
pub fn time_now() -> i64 {
    // SAFETY: a null argument is allowed.
    i64::from(unsafe { libc::time(std::ptr::null_mut()) })
}

/// Sets `CLOCK_REALTIME` to `secs` since the epoch.
pub fn set_time(secs: i64) -> SysResult<()> {
    let mut ts = timespec(Duration::ZERO);
    ts.tv_sec = secs as libc::time_t;
    // SAFETY: `ts` is a valid, initialized timespec.
    cvt(unsafe { libc::clock_settime(libc::CLOCK_REALTIME, &ts) })?;
    Ok(())
}

/// Broken-down UTC time of `secs`.
pub fn utc(secs: i64) -> SysResult<libc::tm> {
    let t = secs as libc::time_t;
    // SAFETY: tm is plain old data.
    let mut tm: libc::tm = unsafe { mem::zeroed() };
    // SAFETY: both pointers are valid for the duration of the call.
    if unsafe { libc::gmtime_r(&t, &mut tm) }.is_null() {
        return Err(super::errno::Errno::last());
    }
    Ok(tm)
}
