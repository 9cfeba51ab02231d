//! Unnamed and named POSIX semaphores.

use std::cell::UnsafeCell;
use std::ffi::CString;
use std::mem;
use std::time::Duration;

use super::errno::{Errno, SysResult, cvt};
use super::time;

/// Operations shared by both kinds of semaphore.
pub trait Semaphore {
    /// The underlying `sem_t`.
    fn as_ptr(&self) -> *mut libc::sem_t;

    fn wait(&self) -> SysResult<()> {
        // SAFETY: implementors return a pointer to an initialized semaphore.
        cvt(unsafe { libc::sem_wait(self.as_ptr()) }).map(drop)
    }

    /// Fails with `EAGAIN` instead of blocking.
    fn try_wait(&self) -> SysResult<()> {
        // SAFETY: as above.
        cvt(unsafe { libc::sem_trywait(self.as_ptr()) }).map(drop)
    }

    /// Fails with `ETIMEDOUT` if no count becomes available within `timeout`.
    fn wait_timeout(&self, timeout: Duration) -> SysResult<()> {
        let deadline = time::deadline_after(timeout)?;
        // SAFETY: as above; `deadline` outlives the call.
        cvt(unsafe { libc::sem_timedwait(self.as_ptr(), &deadline) }).map(drop)
    }

    fn post(&self) -> SysResult<()> {
        // SAFETY: as above.
        cvt(unsafe { libc::sem_post(self.as_ptr()) }).map(drop)
    }

    fn value(&self) -> SysResult<i32> {
        let mut value = 0;
        // SAFETY: as above; `value` is a valid out-pointer.
        cvt(unsafe { libc::sem_getvalue(self.as_ptr(), &mut value) })?;
        Ok(value)
    }
}

/// A semaphore initialized with `sem_init`.
pub struct UnnamedSem {
    raw: Box<UnsafeCell<libc::sem_t>>,
}

// SAFETY: semaphores are shared between threads by design; the boxed storage
// never moves after initialization.
unsafe impl Send for UnnamedSem {}
// SAFETY: as above.
unsafe impl Sync for UnnamedSem {}

impl UnnamedSem {
    pub fn new(process_shared: bool, value: u32) -> SysResult<Self> {
        // SAFETY: sem_t is plain old data until initialized.
        let raw: Box<UnsafeCell<libc::sem_t>> = Box::new(UnsafeCell::new(unsafe { mem::zeroed() }));
        // SAFETY: `raw` is valid storage.
        cvt(unsafe { libc::sem_init(raw.get(), libc::c_int::from(process_shared), value) })?;
        Ok(Self { raw })
    }
}

impl Semaphore for UnnamedSem {
    fn as_ptr(&self) -> *mut libc::sem_t {
        self.raw.get()
    }
}

impl Drop for UnnamedSem {
    fn drop(&mut self) {
        // SAFETY: initialized in `new`; no waiter outlives `self`.
        unsafe { libc::sem_destroy(self.raw.get()) };
    }
}

/// A semaphore opened with `sem_open`. Closed on drop.
pub struct NamedSem {
    raw: *mut libc::sem_t,
}

// SAFETY: the handle is process-wide and usable from any thread.
unsafe impl Send for NamedSem {}
// SAFETY: as above.
unsafe impl Sync for NamedSem {}

fn c_name(name: &str) -> SysResult<CString> {
    CString::new(name).map_err(|_| Errno::EINVAL)
}

impl NamedSem {
    /// Creates `name`, failing with `EEXIST` if it exists.
    pub fn create_exclusive(name: &str, value: u32) -> SysResult<Self> {
        Self::open_with(name, libc::O_CREAT | libc::O_EXCL, value)
    }

    /// Creates `name` or opens it if it exists.
    pub fn create(name: &str, value: u32) -> SysResult<Self> {
        Self::open_with(name, libc::O_CREAT, value)
    }

    /// Opens an existing semaphore, failing with `ENOENT` if there is none.
    pub fn open(name: &str) -> SysResult<Self> {
        let name = c_name(name)?;
        // SAFETY: `name` is a valid C string.
        let raw = unsafe { libc::sem_open(name.as_ptr(), 0) };
        Self::from_raw(raw)
    }

    fn open_with(name: &str, flags: libc::c_int, value: u32) -> SysResult<Self> {
        let name = c_name(name)?;
        let mode: libc::c_uint = 0o666;
        // SAFETY: `name` is a valid C string; the variadic arguments match
        // what sem_open reads when O_CREAT is set.
        let raw = unsafe { libc::sem_open(name.as_ptr(), flags, mode, value) };
        Self::from_raw(raw)
    }

    fn from_raw(raw: *mut libc::sem_t) -> SysResult<Self> {
        if raw == libc::SEM_FAILED {
            Err(Errno::last())
        } else {
            Ok(Self { raw })
        }
    }

    /// Removes `name`. Open handles stay usable until closed.
    pub fn unlink(name: &str) -> SysResult<()> {
        let name = c_name(name)?;
        // SAFETY: `name` is a valid C string.
        cvt(unsafe { libc::sem_unlink(name.as_ptr()) }).map(drop)
    }
}

impl Semaphore for NamedSem {
    fn as_ptr(&self) -> *mut libc::sem_t {
        self.raw
    }
}

impl Drop for NamedSem {
    fn drop(&mut self) {
        // SAFETY: `raw` came from a successful sem_open.
        unsafe { libc::sem_close(self.raw) };
    }
}
