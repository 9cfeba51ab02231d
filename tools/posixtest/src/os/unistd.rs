//! `access` and process credentials.

use std::ffi::CString;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

use libc::c_int;

use super::errno::{Errno, SysResult, cvt};

/// Checks `path` for `mode` (`F_OK` or a mask of `R_OK`, `W_OK`, `X_OK`).
pub fn access(path: &Path, mode: c_int) -> SysResult<()> {
    let path = CString::new(path.as_os_str().as_bytes()).map_err(|_| Errno::EINVAL)?;
    // SAFETY: `path` is a valid C string.
    cvt(unsafe { libc::access(path.as_ptr(), mode) }).map(drop)
}

pub fn is_root() -> bool {
    // SAFETY: geteuid has no preconditions.
    unsafe { libc::geteuid() == 0 }
}
