//! `pthread_mutex_t` and its attributes.
//!
//! Setters take raw `c_int` values so that the suites can pass invalid ones
//! and check for `EINVAL`.

use std::cell::UnsafeCell;
use std::mem;
use std::time::Duration;

use libc::c_int;

use super::errno::{SysResult, cvt_pthread};
use super::{ffi, time};

/// `pthread_mutexattr_t`.
pub struct MutexAttr {
    raw: Box<libc::pthread_mutexattr_t>,
}

impl MutexAttr {
    pub fn new() -> SysResult<Self> {
        // SAFETY: the attribute object is plain old data until initialized.
        let mut raw: Box<libc::pthread_mutexattr_t> = Box::new(unsafe { mem::zeroed() });
        // SAFETY: `raw` is valid, writable storage for the attribute object.
        cvt_pthread(unsafe { libc::pthread_mutexattr_init(&mut *raw) })?;
        Ok(Self { raw })
    }

    pub(super) fn as_ptr(&self) -> *const libc::pthread_mutexattr_t {
        &*self.raw
    }

    fn get(
        &self,
        f: unsafe extern "C" fn(*const libc::pthread_mutexattr_t, *mut c_int) -> c_int,
    ) -> SysResult<c_int> {
        let mut value = 0;
        // SAFETY: the attribute object is initialized; `value` is a valid out-pointer.
        cvt_pthread(unsafe { f(self.as_ptr(), &mut value) })?;
        Ok(value)
    }

    fn set(
        &mut self,
        f: unsafe extern "C" fn(*mut libc::pthread_mutexattr_t, c_int) -> c_int,
        value: c_int,
    ) -> SysResult<()> {
        // SAFETY: the attribute object is initialized and exclusively borrowed.
        cvt_pthread(unsafe { f(&mut *self.raw, value) })
    }

    /// `PTHREAD_MUTEX_NORMAL`, `PTHREAD_MUTEX_RECURSIVE`, ...
    pub fn set_type(&mut self, kind: c_int) -> SysResult<()> {
        self.set(libc::pthread_mutexattr_settype, kind)
    }

    pub fn kind(&self) -> SysResult<c_int> {
        self.get(ffi::pthread_mutexattr_gettype)
    }

    /// `PTHREAD_PRIO_NONE`, `PTHREAD_PRIO_INHERIT` or `PTHREAD_PRIO_PROTECT`.
    pub fn set_protocol(&mut self, protocol: c_int) -> SysResult<()> {
        self.set(ffi::pthread_mutexattr_setprotocol, protocol)
    }

    pub fn protocol(&self) -> SysResult<c_int> {
        self.get(ffi::pthread_mutexattr_getprotocol)
    }

    pub fn set_prioceiling(&mut self, ceiling: c_int) -> SysResult<()> {
        self.set(ffi::pthread_mutexattr_setprioceiling, ceiling)
    }

    pub fn prioceiling(&self) -> SysResult<c_int> {
        self.get(ffi::pthread_mutexattr_getprioceiling)
    }

    /// `PTHREAD_PROCESS_SHARED` or `PTHREAD_PROCESS_PRIVATE`.
    pub fn set_pshared(&mut self, pshared: c_int) -> SysResult<()> {
        self.set(ffi::pthread_mutexattr_setpshared, pshared)
    }

    pub fn pshared(&self) -> SysResult<c_int> {
        self.get(ffi::pthread_mutexattr_getpshared)
    }
}

impl Drop for MutexAttr {
    fn drop(&mut self) {
        // SAFETY: initialized in `new` and not used afterwards.
        unsafe { libc::pthread_mutexattr_destroy(&mut *self.raw) };
    }
}

/// `pthread_mutex_t`.
///
/// Lock and unlock are separate calls returning the raw result, because the
/// return codes of unbalanced and non-owner unlocks are what the suites
/// check. [`Mutex::scope`] is the guarded form for ordinary use.
pub struct Mutex {
    raw: Box<UnsafeCell<libc::pthread_mutex_t>>,
}

// SAFETY: a pthread mutex is designed to be used from several threads; the
// boxed storage never moves after initialization.
unsafe impl Send for Mutex {}
// SAFETY: as above; every access goes through the pthread API.
unsafe impl Sync for Mutex {}

impl Mutex {
    pub fn new(attr: Option<&MutexAttr>) -> SysResult<Self> {
        let raw = Box::new(UnsafeCell::new(libc::PTHREAD_MUTEX_INITIALIZER));
        let attr = attr.map_or(std::ptr::null(), MutexAttr::as_ptr);
        // SAFETY: `raw` is valid storage; `attr` is null or initialized.
        cvt_pthread(unsafe { libc::pthread_mutex_init(raw.get(), attr) })?;
        Ok(Self { raw })
    }

    pub(super) fn as_ptr(&self) -> *mut libc::pthread_mutex_t {
        self.raw.get()
    }

    pub fn lock(&self) -> SysResult<()> {
        // SAFETY: the mutex is initialized.
        cvt_pthread(unsafe { libc::pthread_mutex_lock(self.as_ptr()) })
    }

    /// Fails with `EBUSY` instead of blocking.
    pub fn try_lock(&self) -> SysResult<()> {
        // SAFETY: the mutex is initialized.
        cvt_pthread(unsafe { libc::pthread_mutex_trylock(self.as_ptr()) })
    }

    /// Fails with `ETIMEDOUT` if the mutex is not acquired within `timeout`.
    pub fn lock_timeout(&self, timeout: Duration) -> SysResult<()> {
        let deadline = time::deadline_after(timeout)?;
        // SAFETY: the mutex is initialized; `deadline` outlives the call.
        cvt_pthread(unsafe { ffi::pthread_mutex_timedlock(self.as_ptr(), &deadline) })
    }

    pub fn unlock(&self) -> SysResult<()> {
        // SAFETY: the mutex is initialized. Unlocking a mutex the caller does
        // not hold is exactly what some cases check; glibc reports it.
        cvt_pthread(unsafe { libc::pthread_mutex_unlock(self.as_ptr()) })
    }

    /// Locks and returns a guard that unlocks on drop.
    pub fn scope(&self) -> SysResult<MutexScope<'_>> {
        self.lock()?;
        Ok(MutexScope { mutex: self })
    }
}

impl Drop for Mutex {
    fn drop(&mut self) {
        // SAFETY: no guard can outlive `self`; destroying a locked mutex only
        // returns EBUSY.
        unsafe { libc::pthread_mutex_destroy(self.as_ptr()) };
    }
}

/// Holds a [`Mutex`] locked for its lifetime.
pub struct MutexScope<'a> {
    mutex: &'a Mutex,
}

impl Drop for MutexScope<'_> {
    fn drop(&mut self) {
        let _ = self.mutex.unlock();
    }
}
