//! Condition variable attributes and wakeups.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use posix_harness::{Case, CaseResult, Check, Printer, poll_until};

use super::INVALID;
use crate::os::cond::{Cond, CondAttr};
use crate::os::mutex::Mutex;
use crate::os::{Errno, SysResult};

const POLL: Duration = Duration::from_millis(1);

pub(super) fn attributes<P: Printer>(case: &mut Case<'_, P>) -> CaseResult {
    let mut attr = case.require_ok("pthread_condattr_init", CondAttr::new())?;
    for (name, pshared) in [
        ("shared", libc::PTHREAD_PROCESS_SHARED),
        ("private", libc::PTHREAD_PROCESS_PRIVATE),
    ] {
        case.expect(Check::ok(format!("set {name}"), &attr.set_pshared(pshared)));
        case.expect(Check::eq(format!("get {name}"), attr.pshared(), Ok(pshared)));
    }
    case.expect(Check::fails_with("invalid", &attr.set_pshared(INVALID), Errno::EINVAL));
    Ok(())
}

/// A condition with two predicates: a broadcast flag and signal tokens.
struct Condition {
    mutex: Mutex,
    cond: Cond,
    broadcast: AtomicBool,
    tokens: AtomicUsize,
    /// Total waits entered, so the main thread knows when to wake.
    arrivals: AtomicUsize,
    /// Waits that ended on a signal token.
    signalled: AtomicUsize,
}

impl Condition {
    fn new() -> SysResult<Self> {
        Ok(Self {
            mutex: Mutex::new(None)?,
            cond: Cond::new()?,
            broadcast: AtomicBool::new(false),
            tokens: AtomicUsize::new(0),
            arrivals: AtomicUsize::new(0),
            signalled: AtomicUsize::new(0),
        })
    }

    /// Waits on the condition until `ready` holds, at most `deadline`.
    ///
    /// `ready` runs with the mutex held.
    fn wait_until(&self, deadline: Duration, mut ready: impl FnMut(&Self) -> bool) -> SysResult<()> {
        self.mutex.lock()?;
        self.arrivals.fetch_add(1, Ordering::SeqCst);
        let limit = Instant::now() + deadline;
        let mut result = Ok(());
        while !ready(self) {
            let left = limit.saturating_duration_since(Instant::now());
            if left.is_zero() {
                result = Err(Errno::ETIMEDOUT);
                break;
            }
            match self.cond.wait_timeout(&self.mutex, left) {
                Ok(()) | Err(Errno::ETIMEDOUT) => {}
                Err(e) => {
                    result = Err(e);
                    break;
                }
            }
        }
        self.mutex.unlock()?;
        result
    }

    fn take_token(&self) -> bool {
        let tokens = self.tokens.load(Ordering::SeqCst);
        if tokens == 0 {
            return false;
        }
        self.tokens.store(tokens - 1, Ordering::SeqCst);
        self.signalled.fetch_add(1, Ordering::SeqCst);
        true
    }

    /// Changes the predicate under the mutex, then wakes waiters.
    fn release(&self, update: impl FnOnce(&Self), wake: fn(&Cond) -> SysResult<()>) -> SysResult<()> {
        self.mutex.lock()?;
        update(self);
        let woken = wake(&self.cond);
        self.mutex.unlock()?;
        woken
    }
}

fn waiter(condition: &Condition, deadline: Duration) -> Check {
    let broadcast = condition.wait_until(deadline, |c| c.broadcast.load(Ordering::SeqCst));
    let signal = condition.wait_until(deadline, Condition::take_token);
    Check::ok("released by broadcast", &broadcast) & Check::ok("released by signal", &signal)
}

pub(super) fn condition<P: Printer>(case: &mut Case<'_, P>) -> CaseResult {
    let condition = Arc::new(case.require_ok("init", Condition::new())?);
    let deadline = case.deadline();
    let mut rendezvous = case.rendezvous(Arc::clone(&condition));
    for name in ["waiter 1", "waiter 2"] {
        case.require_ok("spawn", rendezvous.spawn(name, move |c| waiter(c, deadline)))?;
    }

    let arrived = |n: usize| poll_until(deadline, POLL, || condition.arrivals.load(Ordering::SeqCst) >= n);

    case.require(Check::that(arrived(2), "both waiting"))?;
    case.require_ok(
        "pthread_cond_broadcast",
        condition.release(|c| c.broadcast.store(true, Ordering::SeqCst), Cond::broadcast),
    )?;

    case.require(Check::that(arrived(4), "both waiting again"))?;
    for round in 1..=2 {
        case.require_ok(
            "pthread_cond_signal",
            condition.release(|c| {
                c.tokens.fetch_add(1, Ordering::SeqCst);
            }, Cond::signal),
        )?;
        let woken = poll_until(deadline, POLL, || condition.signalled.load(Ordering::SeqCst) >= round);
        case.expect(Check::that(woken, format!("signal {round} wakes a waiter")));
    }

    for check in case.require_ok("join", rendezvous.join_values())? {
        case.expect(check);
    }
    Ok(())
}
