//! Thread attributes and thread creation.

use std::ptr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use libc::{c_int, c_void};
use posix_harness::{Case, CaseResult, Check, Printer, poll_until};

use super::{INVALID, join_bounded};
use crate::os::ffi::{PTHREAD_EXPLICIT_SCHED, PTHREAD_INHERIT_SCHED};
use crate::os::thread::{RawThread, ThreadAttr};
use crate::os::{Errno, SysResult, sched};

const POLICIES: [c_int; 3] = [libc::SCHED_OTHER, libc::SCHED_FIFO, libc::SCHED_RR];

/// Requested stack size, raised to the platform minimum where that is larger.
const STACK_SIZE: usize = 65536;

/// Exit value of threads that only prove they ran.
const RAN: usize = 7;

/// Exit value of [`report_sched`] when the thread cannot read its own policy.
const SCHED_UNKNOWN: usize = usize::MAX - 1;

static DETACHED_RELEASE: AtomicBool = AtomicBool::new(false);
static DETACHED_DONE: AtomicBool = AtomicBool::new(false);

extern "C-unwind" fn ran(_: *mut c_void) -> *mut c_void {
    ptr::without_provenance_mut(RAN)
}

/// Exits with its own policy and priority packed into the exit value.
extern "C-unwind" fn report_sched(_: *mut c_void) -> *mut c_void {
    let packed = RawThread::current()
        .sched()
        .ok()
        .and_then(|(policy, priority)| {
            let policy = usize::try_from(policy).ok()?;
            let priority = usize::try_from(priority).ok()?;
            Some((policy << 16) | priority)
        })
        .unwrap_or(SCHED_UNKNOWN);
    ptr::without_provenance_mut(packed)
}

fn unpack_sched(value: usize) -> Option<(c_int, c_int)> {
    if value == SCHED_UNKNOWN {
        return None;
    }
    let policy = c_int::try_from(value >> 16).ok()?;
    let priority = c_int::try_from(value & 0xffff).ok()?;
    Some((policy, priority))
}

/// Stays alive until released, so joining it cannot race with its exit.
extern "C-unwind" fn detached(_: *mut c_void) -> *mut c_void {
    poll_until(Duration::from_secs(10), Duration::from_millis(1), || {
        DETACHED_RELEASE.load(Ordering::SeqCst)
    });
    DETACHED_DONE.store(true, Ordering::SeqCst);
    ptr::null_mut()
}

fn stack_size() -> usize {
    STACK_SIZE.max(libc::PTHREAD_STACK_MIN)
}

// ---------------------------------------------------------------------------
// pthreadattributes
// ---------------------------------------------------------------------------

pub(super) fn attributes<P: Printer>(case: &mut Case<'_, P>) -> CaseResult {
    let mut attr = case.require_ok("pthread_attr_init", ThreadAttr::new())?;

    case.object("detachstate", |case| {
        for (name, state) in [
            ("detached", libc::PTHREAD_CREATE_DETACHED),
            ("joinable", libc::PTHREAD_CREATE_JOINABLE),
        ] {
            case.expect(Check::ok(format!("set {name}"), &attr.set_detach_state(state)));
            case.expect(Check::eq(format!("get {name}"), attr.detach_state(), Ok(state)));
        }
        case.expect(Check::fails_with("invalid", &attr.set_detach_state(INVALID), Errno::EINVAL));
        Ok(())
    })?;

    case.object("inheritsched", |case| {
        for (name, inherit) in [
            ("explicit", PTHREAD_EXPLICIT_SCHED),
            ("inherit", PTHREAD_INHERIT_SCHED),
        ] {
            case.expect(Check::ok(format!("set {name}"), &attr.set_inherit_sched(inherit)));
            case.expect(Check::eq(format!("get {name}"), attr.inherit_sched(), Ok(inherit)));
        }
        case.expect(Check::fails_with("invalid", &attr.set_inherit_sched(INVALID), Errno::EINVAL));
        Ok(())
    })?;

    for policy in POLICIES {
        case.object(sched::policy_name(policy), |case| {
            case.expect(Check::ok("set policy", &attr.set_sched_policy(policy)));
            case.expect(Check::eq("get policy", attr.sched_policy(), Ok(policy)));

            let min = case.require_ok("priority min", sched::priority_min(policy))?;
            let max = case.require_ok("priority max", sched::priority_max(policy))?;
            let rejected: Vec<c_int> = (min..=max)
                .filter(|&prio| {
                    attr.set_sched_priority(prio).is_err() || attr.sched_priority() != Ok(prio)
                })
                .collect();
            case.expect(Check::eq("priorities", rejected, Vec::new()));
            case.expect(Check::fails_with(
                "below min",
                &attr.set_sched_priority(min - 1),
                Errno::EINVAL,
            ));
            case.expect(Check::fails_with(
                "above max",
                &attr.set_sched_priority(max + 1),
                Errno::EINVAL,
            ));
            Ok(())
        })?;
    }
    case.expect(Check::fails_with("invalid policy", &attr.set_sched_policy(INVALID), Errno::EINVAL));

    case.object("stacksize", |case| {
        let size = stack_size();
        case.expect(Check::ok("set", &attr.set_stack_size(size)));
        case.expect(Check::eq("get", attr.stack_size(), Ok(size)));
        case.expect(Check::fails_with("below minimum", &attr.set_stack_size(1), Errno::EINVAL));
        Ok(())
    })
}

// ---------------------------------------------------------------------------
// pthread
// ---------------------------------------------------------------------------

pub(super) fn pthread<P: Printer>(case: &mut Case<'_, P>) -> CaseResult {
    case.object("joinable", |case| {
        let thread = case.require_ok("pthread_create", RawThread::spawn(None, ran, ptr::null_mut()))?;
        let joined = join_bounded(case, thread)?;
        case.expect(Check::eq("pthread_join", joined, Ok(RAN)));
        Ok(())
    })?;
    case.object("detached", detached_join)?;

    let caller = case.require_ok("pthread_getschedparam", RawThread::current().sched())?;
    for policy in POLICIES {
        case.object(sched::policy_name(policy), |case| explicit_sched(case, policy))?;
    }

    case.object("inherit", |case| {
        let mut attr = case.require_ok("pthread_attr_init", ThreadAttr::new())?;
        case.require_ok("inherit", attr.set_inherit_sched(PTHREAD_INHERIT_SCHED))?;
        // Ignored under PTHREAD_INHERIT_SCHED.
        case.require_ok("policy", attr.set_sched_policy(libc::SCHED_RR))?;
        let thread = case.require_ok(
            "pthread_create",
            RawThread::spawn(Some(&attr), report_sched, ptr::null_mut()),
        )?;
        let reported = join_bounded(case, thread)?;
        case.expect(Check::eq("sched", reported.map(unpack_sched), Ok(Some(caller))));
        Ok(())
    })?;

    case.object("stacksize", |case| {
        let mut attr = case.require_ok("pthread_attr_init", ThreadAttr::new())?;
        case.require_ok("pthread_attr_setstacksize", attr.set_stack_size(stack_size()))?;
        let thread = case.require_ok("pthread_create", RawThread::spawn(Some(&attr), ran, ptr::null_mut()))?;
        let joined = join_bounded(case, thread)?;
        case.expect(Check::eq("pthread_join", joined, Ok(RAN)));
        Ok(())
    })
}

fn detached_join<P: Printer>(case: &mut Case<'_, P>) -> CaseResult {
    DETACHED_RELEASE.store(false, Ordering::SeqCst);
    DETACHED_DONE.store(false, Ordering::SeqCst);

    let mut attr = case.require_ok("pthread_attr_init", ThreadAttr::new())?;
    case.require_ok("detach", attr.set_detach_state(libc::PTHREAD_CREATE_DETACHED))?;
    let thread = case.require_ok(
        "pthread_create",
        RawThread::spawn(Some(&attr), detached, ptr::null_mut()),
    )?;
    case.expect(Check::fails_with("pthread_join", &thread.join(), Errno::EINVAL));

    DETACHED_RELEASE.store(true, Ordering::SeqCst);
    let done = poll_until(case.deadline(), Duration::from_millis(1), || {
        DETACHED_DONE.load(Ordering::SeqCst)
    });
    case.expect(Check::that(done, "detached thread ran"));
    Ok(())
}

fn explicit_sched<P: Printer>(case: &mut Case<'_, P>, policy: c_int) -> CaseResult {
    let min = case.require_ok("priority min", sched::priority_min(policy))?;
    let max = case.require_ok("priority max", sched::priority_max(policy))?;
    let priority = min + (max - min) / 2;

    let attr = case.require_ok("attributes", explicit_attr(policy, priority))?;
    let thread = match RawThread::spawn(Some(&attr), report_sched, ptr::null_mut()) {
        Err(Errno::EPERM) => return case.skip("real-time scheduling not permitted"),
        other => case.require_ok("pthread_create", other)?,
    };
    let reported = join_bounded(case, thread)?;
    case.expect(Check::eq("sched", reported.map(unpack_sched), Ok(Some((policy, priority)))));
    Ok(())
}

fn explicit_attr(policy: c_int, priority: c_int) -> SysResult<ThreadAttr> {
    let mut attr = ThreadAttr::new()?;
    attr.set_inherit_sched(PTHREAD_EXPLICIT_SCHED)?;
    attr.set_sched_policy(policy)?;
    attr.set_sched_priority(priority)?;
    Ok(attr)
}
