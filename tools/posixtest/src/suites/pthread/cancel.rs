//! Thread cancellation.
//!
//! The cancelled threads are raw pthreads. glibc delivers a cancellation by
//! force-unwinding the thread, so their entry functions keep nothing with a
//! destructor alive across a cancellation point.

use std::ptr;
use std::time::Duration;

use libc::c_void;
use posix_harness::{Case, CaseResult, Check, Printer, Termination, TimingWindow};

use super::INVALID;
use crate::os::Errno;
use crate::os::ffi::{
    PTHREAD_CANCEL_ASYNCHRONOUS, PTHREAD_CANCEL_DEFERRED, PTHREAD_CANCEL_DISABLE,
    PTHREAD_CANCEL_ENABLE, PTHREAD_CANCELED,
};
use crate::os::thread::{self, RawThread};

/// Time given to a new thread to reach its first cancellation point.
const SETTLE: Duration = Duration::from_millis(50);
const DISABLED_FOR: Duration = Duration::from_millis(250);
const FIRST_CANCEL: Duration = Duration::from_millis(100);
const CANCEL_INTERVAL: Duration = Duration::from_millis(10);

/// Sleeps in a cancellation point for up to ten seconds.
extern "C-unwind" fn sleep_until_cancelled(_: *mut c_void) -> *mut c_void {
    for _ in 0..100 {
        thread::sleep_cancellable(Duration::from_millis(100));
    }
    ptr::null_mut()
}

/// Ignores cancellation for [`DISABLED_FOR`], then acts on a pending request.
extern "C-unwind" fn cancel_disabled(_: *mut c_void) -> *mut c_void {
    if thread::set_cancel_state(PTHREAD_CANCEL_DISABLE).is_err() {
        return ptr::null_mut();
    }
    std::thread::sleep(DISABLED_FOR);
    if thread::set_cancel_state(PTHREAD_CANCEL_ENABLE).is_ok() {
        thread::test_cancel();
    }
    ptr::null_mut()
}

pub(super) fn cancel<P: Printer>(case: &mut Case<'_, P>) -> CaseResult {
    case.object("deferred", deferred)?;
    case.object("disabled", disabled)?;
    case.object("type", cancel_type)
}

fn deferred<P: Printer>(case: &mut Case<'_, P>) -> CaseResult {
    let thread = case.require_ok(
        "pthread_create",
        RawThread::spawn(None, sleep_until_cancelled, ptr::null_mut()),
    )?;
    let mut termination = case.require_ok("watch", Termination::watch(case.clock(), move || thread.join()))?;
    std::thread::sleep(SETTLE);

    let requested = case.now();
    case.require_ok("pthread_cancel", thread.cancel())?;
    let Some(at) = termination.wait(case.deadline()) else {
        return case.require(Check::that(false, "terminated").detail("thread survived cancellation"));
    };
    let latency = at.saturating_sub(requested);
    case.duration("cancelLatency", latency);
    case.expect(Check::within("cancelLatency", latency, TimingWindow::from_millis(0, 10)));
    case.expect(Check::eq("exit value", termination.into_value(), Some(Ok(PTHREAD_CANCELED))));
    Ok(())
}

fn disabled<P: Printer>(case: &mut Case<'_, P>) -> CaseResult {
    let clock = case.clock();
    let deadline = case.deadline();

    let mut scope = case.timed("cancelDisabled", TimingWindow::from_millis(250, 500));
    let thread = scope.require_ok(
        "pthread_create",
        RawThread::spawn(None, cancel_disabled, ptr::null_mut()),
    )?;
    let mut termination = scope.require_ok("watch", Termination::watch(clock, move || thread.join()))?;
    std::thread::sleep(FIRST_CANCEL);
    let terminated = termination.cancel_until_terminated(
        || {
            let _ = thread.cancel();
        },
        CANCEL_INTERVAL,
        deadline,
    );
    scope.finish();

    case.require_ok("terminated", terminated)?;
    case.expect(Check::eq("exit value", termination.into_value(), Some(Ok(PTHREAD_CANCELED))));
    Ok(())
}

fn cancel_type<P: Printer>(case: &mut Case<'_, P>) -> CaseResult {
    case.expect(Check::fails_with(
        "invalid type",
        &thread::set_cancel_type(INVALID),
        Errno::EINVAL,
    ));
    case.expect(Check::fails_with(
        "invalid state",
        &thread::set_cancel_state(INVALID),
        Errno::EINVAL,
    ));
    let previous = thread::set_cancel_type(PTHREAD_CANCEL_ASYNCHRONOUS);
    case.expect(Check::eq("set asynchronous", previous, Ok(PTHREAD_CANCEL_DEFERRED)));
    let restored = thread::set_cancel_type(PTHREAD_CANCEL_DEFERRED);
    case.expect(Check::eq("restore deferred", restored, Ok(PTHREAD_CANCEL_ASYNCHRONOUS)));
    Ok(())
}
