//! Error numbers reported by the primitives under test.
//!
//! POSIX reports errors two ways: most calls return `-1` and set `errno`,
//! while the `pthread_*` family returns the error number directly. [`cvt`]
//! and [`cvt_pthread`] turn both into a [`SysResult`].

use std::fmt;
use std::io;

/// A raw POSIX error number.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Errno(pub i32);

/// Result of a call into the system under test.
pub type SysResult<T> = Result<T, Errno>;

impl Errno {
    pub const EPERM: Errno = Errno(libc::EPERM);
    pub const ENOENT: Errno = Errno(libc::ENOENT);
    pub const ESRCH: Errno = Errno(libc::ESRCH);
    pub const EINTR: Errno = Errno(libc::EINTR);
    pub const EAGAIN: Errno = Errno(libc::EAGAIN);
    pub const EACCES: Errno = Errno(libc::EACCES);
    pub const EBUSY: Errno = Errno(libc::EBUSY);
    pub const EEXIST: Errno = Errno(libc::EEXIST);
    pub const EINVAL: Errno = Errno(libc::EINVAL);
    pub const ENAMETOOLONG: Errno = Errno(libc::ENAMETOOLONG);
    pub const ENOSYS: Errno = Errno(libc::ENOSYS);
    pub const ENOTSUP: Errno = Errno(libc::ENOTSUP);
    pub const EMSGSIZE: Errno = Errno(libc::EMSGSIZE);
    pub const ETIMEDOUT: Errno = Errno(libc::ETIMEDOUT);
    pub const EDEADLK: Errno = Errno(libc::EDEADLK);

    /// The calling thread's current `errno`.
    pub fn last() -> Self {
        Self(io::Error::last_os_error().raw_os_error().unwrap_or(0))
    }

    /// Symbolic name, if this is one of the numbers the suites check for.
    pub fn name(self) -> Option<&'static str> {
        let name = match self.0 {
            libc::EPERM => "EPERM",
            libc::ENOENT => "ENOENT",
            libc::ESRCH => "ESRCH",
            libc::EINTR => "EINTR",
            libc::EAGAIN => "EAGAIN",
            libc::EACCES => "EACCES",
            libc::EBUSY => "EBUSY",
            libc::EEXIST => "EEXIST",
            libc::EINVAL => "EINVAL",
            libc::ENAMETOOLONG => "ENAMETOOLONG",
            libc::ENOSYS => "ENOSYS",
            libc::ENOTSUP => "ENOTSUP",
            libc::EMSGSIZE => "EMSGSIZE",
            libc::ETIMEDOUT => "ETIMEDOUT",
            libc::EDEADLK => "EDEADLK",
            _ => return None,
        };
        Some(name)
    }

    /// Returns `true` for errors meaning "this optional feature is absent".
    pub fn is_unsupported(self) -> bool {
        self == Self::ENOSYS || self == Self::ENOTSUP
    }
}

impl fmt::Debug for Errno {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "errno {}", self.0),
        }
    }
}

impl fmt::Display for Errno {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} ({})", self, io::Error::from_raw_os_error(self.0))
    }
}

impl std::error::Error for Errno {}

impl From<Errno> for io::Error {
    fn from(e: Errno) -> Self {
        io::Error::from_raw_os_error(e.0)
    }
}

/// Converts a `-1`-and-`errno` return value.
pub fn cvt(ret: libc::c_int) -> SysResult<libc::c_int> {
    if ret == -1 { Err(Errno::last()) } else { Ok(ret) }
}

/// Converts a returned error number (`pthread_*`, `posix_*`).
pub fn cvt_pthread(ret: libc::c_int) -> SysResult<()> {
    if ret == 0 { Ok(()) } else { Err(Errno(ret)) }
}
