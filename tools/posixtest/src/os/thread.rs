//! Raw pthreads, their attributes and cancellation.
//!
//! Threads that are cancelled run on raw pthreads rather than
//! `std::thread`: glibc cancels by force-unwinding the target from inside a
//! cancellation point, so everything on such a thread's stack must be a
//! plain frame without destructors. Entry functions are
//! [`ThreadEntry`](ffi::ThreadEntry) (`extern "C-unwind"`) for that reason.

use std::mem;
use std::ptr;
use std::time::Duration;

use libc::{c_int, c_void};

use super::errno::{SysResult, cvt_pthread};
use super::ffi::{self, ThreadEntry};
use super::sched;

/// `pthread_attr_t`.
pub struct ThreadAttr {
    raw: Box<libc::pthread_attr_t>,
}

impl ThreadAttr {
    pub fn new() -> SysResult<Self> {
        // SAFETY: the attribute object is plain old data until initialized.
        let mut raw: Box<libc::pthread_attr_t> = Box::new(unsafe { mem::zeroed() });
        // SAFETY: `raw` is valid, writable storage.
        cvt_pthread(unsafe { libc::pthread_attr_init(&mut *raw) })?;
        Ok(Self { raw })
    }

    fn as_ptr(&self) -> *const libc::pthread_attr_t {
        &*self.raw
    }

    fn get(
        &self,
        f: unsafe extern "C" fn(*const libc::pthread_attr_t, *mut c_int) -> c_int,
    ) -> SysResult<c_int> {
        let mut value = 0;
        // SAFETY: the attribute object is initialized; `value` is a valid out-pointer.
        cvt_pthread(unsafe { f(self.as_ptr(), &mut value) })?;
        Ok(value)
    }

    fn set(
        &mut self,
        f: unsafe extern "C" fn(*mut libc::pthread_attr_t, c_int) -> c_int,
        value: c_int,
    ) -> SysResult<()> {
        // SAFETY: the attribute object is initialized and exclusively borrowed.
        cvt_pthread(unsafe { f(&mut *self.raw, value) })
    }

    /// `PTHREAD_CREATE_JOINABLE` or `PTHREAD_CREATE_DETACHED`.
    pub fn set_detach_state(&mut self, state: c_int) -> SysResult<()> {
        self.set(libc::pthread_attr_setdetachstate, state)
    }

    pub fn detach_state(&self) -> SysResult<c_int> {
        self.get(ffi::pthread_attr_getdetachstate)
    }

    /// `PTHREAD_INHERIT_SCHED` or `PTHREAD_EXPLICIT_SCHED`.
    pub fn set_inherit_sched(&mut self, inherit: c_int) -> SysResult<()> {
        self.set(ffi::pthread_attr_setinheritsched, inherit)
    }

    pub fn inherit_sched(&self) -> SysResult<c_int> {
        self.get(ffi::pthread_attr_getinheritsched)
    }

    pub fn set_sched_policy(&mut self, policy: c_int) -> SysResult<()> {
        self.set(ffi::pthread_attr_setschedpolicy, policy)
    }

    pub fn sched_policy(&self) -> SysResult<c_int> {
        self.get(ffi::pthread_attr_getschedpolicy)
    }

    /// Checked against the range of the attribute's current policy.
    pub fn set_sched_priority(&mut self, priority: c_int) -> SysResult<()> {
        let param = sched::param(priority);
        // SAFETY: the attribute object is initialized; `param` outlives the call.
        cvt_pthread(unsafe { ffi::pthread_attr_setschedparam(&mut *self.raw, &param) })
    }

    pub fn sched_priority(&self) -> SysResult<c_int> {
        let mut param = sched::param(0);
        // SAFETY: the attribute object is initialized; `param` is a valid out-pointer.
        cvt_pthread(unsafe { ffi::pthread_attr_getschedparam(self.as_ptr(), &mut param) })?;
        Ok(param.sched_priority)
    }

    pub fn set_stack_size(&mut self, size: usize) -> SysResult<()> {
        // SAFETY: the attribute object is initialized.
        cvt_pthread(unsafe { libc::pthread_attr_setstacksize(&mut *self.raw, size) })
    }

    pub fn stack_size(&self) -> SysResult<usize> {
        let mut size = 0;
        // SAFETY: the attribute object is initialized; `size` is a valid out-pointer.
        cvt_pthread(unsafe { libc::pthread_attr_getstacksize(self.as_ptr(), &mut size) })?;
        Ok(size)
    }
}

impl Drop for ThreadAttr {
    fn drop(&mut self) {
        // SAFETY: initialized in `new`.
        unsafe { libc::pthread_attr_destroy(&mut *self.raw) };
    }
}

/// A pthread identifier. Joining is explicit; dropping does nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawThread(libc::pthread_t);

impl RawThread {
    /// Starts `entry(arg)` on a new thread.
    ///
    /// `arg` must stay valid for as long as the thread uses it.
    pub fn spawn(attr: Option<&ThreadAttr>, entry: ThreadEntry, arg: *mut c_void) -> SysResult<Self> {
        let mut native: libc::pthread_t = 0;
        let attr = attr.map_or(ptr::null(), ThreadAttr::as_ptr);
        // SAFETY: `native` is a valid out-pointer and `attr` is null or
        // initialized; the caller guarantees `arg`.
        cvt_pthread(unsafe { ffi::pthread_create(&mut native, attr, entry, arg) })?;
        Ok(Self(native))
    }

    pub fn current() -> Self {
        // SAFETY: no preconditions.
        Self(unsafe { libc::pthread_self() })
    }

    /// Waits for the thread and returns its exit value as an address
    /// ([`ffi::PTHREAD_CANCELED`] for a cancelled thread).
    pub fn join(self) -> SysResult<usize> {
        let mut value: *mut c_void = ptr::null_mut();
        // SAFETY: `value` is a valid out-pointer. Joining an unjoinable
        // thread is reported as EINVAL by glibc, which cases check for.
        cvt_pthread(unsafe { libc::pthread_join(self.0, &mut value) })?;
        Ok(value as usize)
    }

    pub fn cancel(self) -> SysResult<()> {
        // SAFETY: cancelling an exited but unjoined thread is harmless.
        cvt_pthread(unsafe { ffi::pthread_cancel(self.0) })
    }

    /// The thread's scheduling policy and priority.
    pub fn sched(self) -> SysResult<(c_int, c_int)> {
        let mut policy = 0;
        let mut param = sched::param(0);
        // SAFETY: both are valid out-pointers.
        cvt_pthread(unsafe { ffi::pthread_getschedparam(self.0, &mut policy, &mut param) })?;
        Ok((policy, param.sched_priority))
    }

    /// Moves the thread to `policy` at `priority`. Real-time policies
    /// usually need privileges and fail with `EPERM` without them.
    pub fn set_sched(self, policy: c_int, priority: c_int) -> SysResult<()> {
        let param = sched::param(priority);
        // SAFETY: `param` outlives the call.
        cvt_pthread(unsafe { ffi::pthread_setschedparam(self.0, policy, &param) })
    }
}

/// Sets the calling thread's cancel state; returns the previous one.
pub fn set_cancel_state(state: c_int) -> SysResult<c_int> {
    let mut old = 0;
    // SAFETY: `old` is a valid out-pointer.
    cvt_pthread(unsafe { ffi::pthread_setcancelstate(state, &mut old) })?;
    Ok(old)
}

/// Sets the calling thread's cancel type; returns the previous one.
pub fn set_cancel_type(kind: c_int) -> SysResult<c_int> {
    let mut old = 0;
    // SAFETY: `old` is a valid out-pointer.
    cvt_pthread(unsafe { ffi::pthread_setcanceltype(kind, &mut old) })?;
    Ok(old)
}

/// Acts on a pending cancellation request, if cancellation is enabled.
pub fn test_cancel() {
    // SAFETY: no preconditions; does not return if a request is pending.
    unsafe { ffi::pthread_testcancel() };
}

/// Sleeps in `usleep`, a cancellation point.
pub fn sleep_cancellable(d: Duration) {
    let micros = libc::c_uint::try_from(d.as_micros()).unwrap_or(libc::c_uint::MAX);
    // SAFETY: no preconditions; may not return if the thread is cancelled.
    unsafe { ffi::usleep(micros) };
}
