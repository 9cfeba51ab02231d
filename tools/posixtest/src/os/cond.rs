//! `pthread_cond_t` and its attributes.

use std::cell::UnsafeCell;
use std::mem;
use std::time::Duration;

use libc::c_int;

use super::errno::{SysResult, cvt_pthread};
use super::mutex::Mutex;
use super::{ffi, time};

/// `pthread_condattr_t`.
pub struct CondAttr {
    raw: Box<libc::pthread_condattr_t>,
}

impl CondAttr {
    pub fn new() -> SysResult<Self> {
        // SAFETY: the attribute object is plain old data until initialized.
        let mut raw: Box<libc::pthread_condattr_t> = Box::new(unsafe { mem::zeroed() });
        // SAFETY: `raw` is valid, writable storage.
        cvt_pthread(unsafe { libc::pthread_condattr_init(&mut *raw) })?;
        Ok(Self { raw })
    }

    /// `PTHREAD_PROCESS_SHARED` or `PTHREAD_PROCESS_PRIVATE`.
    pub fn set_pshared(&mut self, pshared: c_int) -> SysResult<()> {
        // SAFETY: the attribute object is initialized.
        cvt_pthread(unsafe { ffi::pthread_condattr_setpshared(&mut *self.raw, pshared) })
    }

    pub fn pshared(&self) -> SysResult<c_int> {
        let mut value = 0;
        // SAFETY: the attribute object is initialized; `value` is a valid out-pointer.
        cvt_pthread(unsafe { ffi::pthread_condattr_getpshared(&*self.raw, &mut value) })?;
        Ok(value)
    }
}

impl Drop for CondAttr {
    fn drop(&mut self) {
        // SAFETY: initialized in `new`.
        unsafe { libc::pthread_condattr_destroy(&mut *self.raw) };
    }
}

/// `pthread_cond_t`.
pub struct Cond {
    raw: Box<UnsafeCell<libc::pthread_cond_t>>,
}

// SAFETY: condition variables are shared between threads by design; the
// boxed storage never moves after initialization.
unsafe impl Send for Cond {}
// SAFETY: as above.
unsafe impl Sync for Cond {}

impl Cond {
    pub fn new() -> SysResult<Self> {
        let raw = Box::new(UnsafeCell::new(libc::PTHREAD_COND_INITIALIZER));
        // SAFETY: `raw` is valid storage; default attributes.
        cvt_pthread(unsafe { libc::pthread_cond_init(raw.get(), std::ptr::null()) })?;
        Ok(Self { raw })
    }

    /// Waits at most `timeout`. `mutex` must be held by the caller.
    pub fn wait_timeout(&self, mutex: &Mutex, timeout: Duration) -> SysResult<()> {
        let deadline = time::deadline_after(timeout)?;
        // SAFETY: both objects are initialized; the caller holds `mutex`.
        cvt_pthread(unsafe {
            libc::pthread_cond_timedwait(self.raw.get(), mutex.as_ptr(), &deadline)
        })
    }

    pub fn signal(&self) -> SysResult<()> {
        // SAFETY: the condition variable is initialized.
        cvt_pthread(unsafe { libc::pthread_cond_signal(self.raw.get()) })
    }

    pub fn broadcast(&self) -> SysResult<()> {
        // SAFETY: the condition variable is initialized.
        cvt_pthread(unsafe { libc::pthread_cond_broadcast(self.raw.get()) })
    }
}

impl Drop for Cond {
    fn drop(&mut self) {
        // SAFETY: no waiter can outlive `self`.
        unsafe { libc::pthread_cond_destroy(self.raw.get()) };
    }
}
