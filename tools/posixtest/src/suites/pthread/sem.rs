//! Unnamed and named semaphores.

use std::sync::Arc;
use std::time::Duration;

use posix_harness::{Case, CaseResult, Check, Gate, Printer, TimingWindow};

use crate::os::Errno;
use crate::os::sem::{NamedSem, Semaphore, UnnamedSem};

const INITIAL: u32 = 5;
const TIMED_WAIT: Duration = Duration::from_millis(100);
/// Time given to a worker to block in `sem_wait` before the post.
const SETTLE: Duration = Duration::from_millis(50);

const NAME: &str = "/posixtest-sem0";
const MISSING: &str = "/posixtest-sem1";

pub(super) fn sem<P: Printer>(case: &mut Case<'_, P>) -> CaseResult {
    case.object("unnamed", unnamed)?;
    let _ = NamedSem::unlink(NAME);
    let result = case.object("named", named);
    let _ = NamedSem::unlink(NAME);
    result
}

/// Waits down from [`INITIAL`] to zero, checking `sem_getvalue` each step,
/// then checks that an empty semaphore blocks.
fn count_down<P: Printer, S: Semaphore>(case: &mut Case<'_, P>, sem: &S) {
    case.expect(Check::eq("value", sem.value(), Ok(INITIAL as i32)));
    for remaining in (0..INITIAL).rev() {
        case.expect(Check::ok("sem_wait", &sem.wait()));
        case.expect(Check::eq(format!("value {remaining}"), sem.value(), Ok(remaining as i32)));
    }

    let mut scope = case.timed("timedWait", TimingWindow::from_millis(100, 500));
    let timed = sem.wait_timeout(TIMED_WAIT);
    scope.expect(Check::fails_with("sem_timedwait", &timed, Errno::ETIMEDOUT));
    scope.finish();

    case.expect(Check::fails_with("sem_trywait", &sem.try_wait(), Errno::EAGAIN));
}

fn unnamed<P: Printer>(case: &mut Case<'_, P>) -> CaseResult {
    let sem = Arc::new(case.require_ok("sem_init", UnnamedSem::new(false, INITIAL))?);
    count_down(case, &*sem);

    let deadline = case.deadline();
    let mut rendezvous = case.rendezvous(Arc::clone(&sem));
    case.require_ok(
        "spawn",
        rendezvous.spawn("waiter", move |sem: &UnnamedSem| sem.wait_timeout(deadline)),
    )?;
    std::thread::sleep(SETTLE);
    case.expect(Check::ok("sem_post", &sem.post()));
    for released in case.require_ok("join", rendezvous.join_values())? {
        case.expect(Check::ok("waiter released", &released));
    }
    Ok(())
}

fn named<P: Printer>(case: &mut Case<'_, P>) -> CaseResult {
    let sem = match NamedSem::create_exclusive(NAME, INITIAL) {
        Err(e) if e.is_unsupported() => return case.skip("named semaphores not supported"),
        other => case.require_ok("create exclusive", other)?,
    };
    case.expect(Check::fails_with(
        "create exclusive again",
        &NamedSem::create_exclusive(NAME, INITIAL),
        Errno::EEXIST,
    ));
    case.expect(Check::ok("create existing", &NamedSem::create(NAME, 0)));
    case.expect(Check::ok("open existing", &NamedSem::open(NAME)));

    count_down(case, &sem);

    let _ = NamedSem::unlink(MISSING);
    case.expect(Check::fails_with("open missing", &NamedSem::open(MISSING), Errno::ENOENT));

    // A worker opens its own handle, the name is unlinked, and the handle
    // must keep working until it is closed.
    let gate = Arc::new(Gate::new(2));
    let deadline = case.deadline();
    let mut rendezvous = case.rendezvous(Arc::clone(&gate));
    case.require_ok(
        "spawn",
        rendezvous.spawn("holder", move |gate: &Gate| {
            let handle = NamedSem::open(NAME);
            let opened = gate.arrive_and_wait(deadline);
            let unlinked = gate.arrive_and_wait(deadline);
            match handle {
                Ok(handle) => {
                    Check::that(opened && unlinked, "worker gates")
                        & Check::ok("post after unlink", &handle.post())
                        & Check::ok("wait after unlink", &handle.wait_timeout(deadline))
                }
                Err(e) => Check::that(false, "worker open").detail(format!("failed: {e:?}")),
            }
        }),
    )?;
    let opened = gate.arrive_and_wait(deadline);
    case.expect(Check::ok("sem_unlink", &NamedSem::unlink(NAME)));
    let unlinked = gate.arrive_and_wait(deadline);
    case.expect(Check::that(opened && unlinked, "main gates"));
    for check in case.require_ok("join", rendezvous.join_values())? {
        case.expect(check);
    }

    case.expect(Check::fails_with("reopen after unlink", &NamedSem::open(NAME), Errno::ENOENT));
    drop(sem);
    Ok(())
}
