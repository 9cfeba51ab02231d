//! Thin typed wrappers over the POSIX primitives under test.
//!
//! Nothing here hides or retries an error: every call reports exactly what
//! the system returned, because that is what the suites assert on.

pub mod cond;
pub mod errno;
pub mod ffi;
pub mod mq;
pub mod mutex;
pub mod sched;
pub mod sem;
pub mod thread;
pub mod time;
pub mod timer;
pub mod unistd;

pub use errno::{Errno, SysResult};
