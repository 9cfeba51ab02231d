//! Mutex attributes, contention and recursion.

use std::sync::Arc;
use std::time::Duration;

use libc::c_int;
use posix_harness::{Case, CaseResult, Check, Printer, TimingWindow};

use super::{INVALID, on_worker};
use crate::os::ffi::{PTHREAD_PRIO_INHERIT, PTHREAD_PRIO_NONE, PTHREAD_PRIO_PROTECT};
use crate::os::mutex::{Mutex, MutexAttr};
use crate::os::{Errno, SysResult, sched};

/// Upper bound on recursive locking; EAGAIN before it is also conforming.
const RECURSION_BOUND: u32 = 5000;

const TIMED_LOCK: Duration = Duration::from_millis(100);

pub(super) fn attributes<P: Printer>(case: &mut Case<'_, P>) -> CaseResult {
    let mut attr = case.require_ok("pthread_mutexattr_init", MutexAttr::new())?;

    case.object("type", |case| {
        for (name, kind) in [
            ("normal", libc::PTHREAD_MUTEX_NORMAL),
            ("recursive", libc::PTHREAD_MUTEX_RECURSIVE),
        ] {
            case.expect(Check::ok(format!("set {name}"), &attr.set_type(kind)));
            case.expect(Check::eq(format!("get {name}"), attr.kind(), Ok(kind)));
        }
        case.expect(Check::fails_with("invalid", &attr.set_type(INVALID), Errno::EINVAL));
        Ok(())
    })?;

    case.object("protocol", |case| {
        for (name, protocol) in [
            ("none", PTHREAD_PRIO_NONE),
            ("inherit", PTHREAD_PRIO_INHERIT),
            ("protect", PTHREAD_PRIO_PROTECT),
        ] {
            case.expect(Check::ok(format!("set {name}"), &attr.set_protocol(protocol)));
            case.expect(Check::eq(format!("get {name}"), attr.protocol(), Ok(protocol)));
        }
        case.expect(Check::fails_with("invalid", &attr.set_protocol(INVALID), Errno::EINVAL));
        Ok(())
    })?;

    case.object("prioceiling", |case| {
        let min = case.require_ok("priority min", sched::priority_min(libc::SCHED_FIFO))?;
        let max = case.require_ok("priority max", sched::priority_max(libc::SCHED_FIFO))?;
        let rejected: Vec<c_int> = (min..=max)
            .filter(|&ceiling| {
                attr.set_prioceiling(ceiling).is_err() || attr.prioceiling() != Ok(ceiling)
            })
            .collect();
        case.expect(Check::eq("in range", rejected, Vec::new()));
        case.expect(Check::fails_with("above max", &attr.set_prioceiling(max + 1), Errno::EINVAL));
        case.expect(Check::fails_with("below min", &attr.set_prioceiling(min - 1), Errno::EINVAL));
        Ok(())
    })?;

    case.object("pshared", |case| {
        for (name, pshared) in [
            ("shared", libc::PTHREAD_PROCESS_SHARED),
            ("private", libc::PTHREAD_PROCESS_PRIVATE),
        ] {
            case.expect(Check::ok(format!("set {name}"), &attr.set_pshared(pshared)));
            case.expect(Check::eq(format!("get {name}"), attr.pshared(), Ok(pshared)));
        }
        case.expect(Check::fails_with("invalid", &attr.set_pshared(INVALID), Errno::EINVAL));
        Ok(())
    })
}

#[derive(Debug, Clone, Copy)]
enum Flavour {
    Default,
    Private,
    Shared,
    Recursive,
}

impl Flavour {
    const ALL: [Flavour; 4] = [
        Flavour::Default,
        Flavour::Private,
        Flavour::Shared,
        Flavour::Recursive,
    ];

    fn name(self) -> &'static str {
        match self {
            Flavour::Default => "default",
            Flavour::Private => "private",
            Flavour::Shared => "shared",
            Flavour::Recursive => "recursive",
        }
    }

    fn build(self) -> SysResult<Mutex> {
        let mut attr = MutexAttr::new()?;
        match self {
            Flavour::Default => return Mutex::new(None),
            Flavour::Private => attr.set_pshared(libc::PTHREAD_PROCESS_PRIVATE)?,
            Flavour::Shared => attr.set_pshared(libc::PTHREAD_PROCESS_SHARED)?,
            Flavour::Recursive => attr.set_type(libc::PTHREAD_MUTEX_RECURSIVE)?,
        }
        Mutex::new(Some(&attr))
    }
}

pub(super) fn mutex<P: Printer>(case: &mut Case<'_, P>) -> CaseResult {
    for flavour in Flavour::ALL {
        case.object(flavour.name(), |case| {
            let mutex = Arc::new(case.require_ok("pthread_mutex_init", flavour.build())?);
            contention(case, &mutex)
        })?;
    }
    case.object("recursion", recursion)
}

/// Trylock and timed lock from a second thread against the main thread.
fn contention<P: Printer>(case: &mut Case<'_, P>, mutex: &Arc<Mutex>) -> CaseResult {
    let free = on_worker(case, "trylock free", mutex, |m: &Mutex| {
        let locked = m.try_lock();
        if locked.is_ok() {
            let _ = m.unlock();
        }
        locked
    })?;
    case.expect(Check::ok("trylock free", &free));

    case.require_ok("lock", mutex.lock())?;
    {
        let mut scope = case.timed("trylockBusy", TimingWindow::from_millis(0, 100));
        let busy = on_worker(&mut *scope, "trylock held", mutex, Mutex::try_lock)?;
        scope.expect(Check::fails_with("trylock held", &busy, Errno::EBUSY));
    }
    {
        let mut scope = case.timed("timedLock", TimingWindow::from_millis(100, 500));
        let timed = on_worker(&mut *scope, "timedlock held", mutex, |m: &Mutex| {
            m.lock_timeout(TIMED_LOCK)
        })?;
        scope.expect(Check::fails_with("timedlock held", &timed, Errno::ETIMEDOUT));
    }
    case.require_ok("unlock", mutex.unlock())?;

    let released = on_worker(case, "trylock released", mutex, |m: &Mutex| {
        let locked = m.try_lock();
        if locked.is_ok() {
            let _ = m.unlock();
        }
        locked
    })?;
    case.expect(Check::ok("trylock released", &released));
    Ok(())
}

fn recursion<P: Printer>(case: &mut Case<'_, P>) -> CaseResult {
    let mutex = Arc::new(case.require_ok("pthread_mutex_init", Flavour::Recursive.build())?);

    let mut depth = 0;
    while depth < RECURSION_BOUND {
        match mutex.lock() {
            Ok(()) => depth += 1,
            Err(Errno::EAGAIN) => break,
            Err(e) => {
                case.expect(Check::that(false, "lock").detail(format!("failed at depth {depth}: {e:?}")));
                break;
            }
        }
    }
    case.key("lockCount", depth);
    case.require(Check::that(depth > 1, "lock recursively"))?;

    let foreign = on_worker(case, "unlock foreign", &mutex, Mutex::unlock)?;
    case.expect(Check::fails_with("unlock not owner", &foreign, Errno::EPERM));

    let partial = (1..depth).try_for_each(|_| mutex.unlock());
    case.expect(Check::ok("unlock all but one", &partial));
    let held = on_worker(case, "trylock after partial unlock", &mutex, Mutex::try_lock)?;
    case.expect(Check::fails_with("still held", &held, Errno::EBUSY));

    case.expect(Check::ok("unlock last", &mutex.unlock()));
    case.expect(Check::fails_with("unlock too often", &mutex.unlock(), Errno::EPERM));
    Ok(())
}
