//! glibc declarations the `libc` crate does not provide uniformly.
//!
//! The cancellation-related functions are declared `C-unwind`: glibc
//! implements `pthread_cancel` by force-unwinding the target thread from
//! inside a cancellation point, and that unwind passes through these calls
//! and the thread entry functions in `thread.rs`.

use libc::{
    c_int, c_uint, c_void, pthread_attr_t, pthread_condattr_t, pthread_mutex_t,
    pthread_mutexattr_t, pthread_t, sched_param, timespec,
};

// glibc <pthread.h> enumerators.
pub const PTHREAD_PRIO_NONE: c_int = 0;
pub const PTHREAD_PRIO_INHERIT: c_int = 1;
pub const PTHREAD_PRIO_PROTECT: c_int = 2;
pub const PTHREAD_INHERIT_SCHED: c_int = 0;
pub const PTHREAD_EXPLICIT_SCHED: c_int = 1;
pub const PTHREAD_CANCEL_ENABLE: c_int = 0;
pub const PTHREAD_CANCEL_DISABLE: c_int = 1;
pub const PTHREAD_CANCEL_DEFERRED: c_int = 0;
pub const PTHREAD_CANCEL_ASYNCHRONOUS: c_int = 1;
/// `PTHREAD_CANCELED`, the exit value of a cancelled thread.
pub const PTHREAD_CANCELED: usize = usize::MAX;

/// Entry point of a thread created by [`pthread_create`].
pub type ThreadEntry = extern "C-unwind" fn(*mut c_void) -> *mut c_void;

unsafe extern "C" {
    pub fn pthread_create(
        native: *mut pthread_t,
        attr: *const pthread_attr_t,
        entry: ThreadEntry,
        arg: *mut c_void,
    ) -> c_int;
    pub fn pthread_cancel(thread: pthread_t) -> c_int;
    pub fn pthread_getschedparam(
        thread: pthread_t,
        policy: *mut c_int,
        param: *mut sched_param,
    ) -> c_int;
    pub fn pthread_setschedparam(
        thread: pthread_t,
        policy: c_int,
        param: *const sched_param,
    ) -> c_int;

    pub fn pthread_mutexattr_gettype(attr: *const pthread_mutexattr_t, kind: *mut c_int) -> c_int;
    pub fn pthread_mutexattr_setprotocol(attr: *mut pthread_mutexattr_t, protocol: c_int) -> c_int;
    pub fn pthread_mutexattr_getprotocol(
        attr: *const pthread_mutexattr_t,
        protocol: *mut c_int,
    ) -> c_int;
    pub fn pthread_mutexattr_setprioceiling(
        attr: *mut pthread_mutexattr_t,
        ceiling: c_int,
    ) -> c_int;
    pub fn pthread_mutexattr_getprioceiling(
        attr: *const pthread_mutexattr_t,
        ceiling: *mut c_int,
    ) -> c_int;
    pub fn pthread_mutexattr_setpshared(attr: *mut pthread_mutexattr_t, pshared: c_int) -> c_int;
    pub fn pthread_mutexattr_getpshared(
        attr: *const pthread_mutexattr_t,
        pshared: *mut c_int,
    ) -> c_int;
    pub fn pthread_mutex_timedlock(mutex: *mut pthread_mutex_t, abstime: *const timespec) -> c_int;

    pub fn pthread_condattr_setpshared(attr: *mut pthread_condattr_t, pshared: c_int) -> c_int;
    pub fn pthread_condattr_getpshared(
        attr: *const pthread_condattr_t,
        pshared: *mut c_int,
    ) -> c_int;

    pub fn pthread_attr_getdetachstate(attr: *const pthread_attr_t, state: *mut c_int) -> c_int;
    pub fn pthread_attr_setinheritsched(attr: *mut pthread_attr_t, inherit: c_int) -> c_int;
    pub fn pthread_attr_getinheritsched(attr: *const pthread_attr_t, inherit: *mut c_int) -> c_int;
    pub fn pthread_attr_setschedpolicy(attr: *mut pthread_attr_t, policy: c_int) -> c_int;
    pub fn pthread_attr_getschedpolicy(attr: *const pthread_attr_t, policy: *mut c_int) -> c_int;
    pub fn pthread_attr_setschedparam(attr: *mut pthread_attr_t, param: *const sched_param)
    -> c_int;
    pub fn pthread_attr_getschedparam(attr: *const pthread_attr_t, param: *mut sched_param)
    -> c_int;
}

unsafe extern "C-unwind" {
    pub fn pthread_setcancelstate(state: c_int, old: *mut c_int) -> c_int;
    pub fn pthread_setcanceltype(kind: c_int, old: *mut c_int) -> c_int;
    pub fn pthread_testcancel();
    pub fn usleep(usec: c_uint) -> c_int;
}
