//! Process scheduling parameters.

use std::mem;

use libc::c_int;

use super::errno::{SysResult, cvt};

pub(super) fn param(priority: c_int) -> libc::sched_param {
    // SAFETY: sched_param is plain old data; some libcs add private fields.
    let mut param: libc::sched_param = unsafe { mem::zeroed() };
    param.sched_priority = priority;
    param
}

/// Name of a scheduling policy, for reports.
pub fn policy_name(policy: c_int) -> &'static str {
    match policy {
        libc::SCHED_OTHER => "SCHED_OTHER",
        libc::SCHED_FIFO => "SCHED_FIFO",
        libc::SCHED_RR => "SCHED_RR",
        _ => "unknown",
    }
}

pub fn pid() -> libc::pid_t {
    // SAFETY: getpid has no preconditions.
    unsafe { libc::getpid() }
}

pub fn priority_min(policy: c_int) -> SysResult<c_int> {
    // SAFETY: no pointers involved.
    cvt(unsafe { libc::sched_get_priority_min(policy) })
}

pub fn priority_max(policy: c_int) -> SysResult<c_int> {
    // SAFETY: no pointers involved.
    cvt(unsafe { libc::sched_get_priority_max(policy) })
}

/// Priority of process `pid`.
pub fn get_param(pid: libc::pid_t) -> SysResult<c_int> {
    let mut p = param(0);
    // SAFETY: `p` is a valid out-pointer.
    cvt(unsafe { libc::sched_getparam(pid, &mut p) })?;
    Ok(p.sched_priority)
}

pub fn set_param(pid: libc::pid_t, priority: c_int) -> SysResult<()> {
    let p = param(priority);
    // SAFETY: `p` is initialized.
    cvt(unsafe { libc::sched_setparam(pid, &p) }).map(drop)
}

pub fn get_scheduler(pid: libc::pid_t) -> SysResult<c_int> {
    // SAFETY: no pointers involved.
    cvt(unsafe { libc::sched_getscheduler(pid) })
}

pub fn set_scheduler(pid: libc::pid_t, policy: c_int, priority: c_int) -> SysResult<()> {
    let p = param(priority);
    // SAFETY: `p` is initialized.
    cvt(unsafe { libc::sched_setscheduler(pid, policy, &p) }).map(drop)
}

pub fn yield_now() {
    // SAFETY: no preconditions.
    unsafe { libc::sched_yield() };
}
