//! Threads, mutexes, condition variables, cancellation and semaphores.

use std::sync::Arc;

use posix_harness::{Case, CaseExit, Check, Printer, Suite, Termination};

use crate::os::SysResult;
use crate::os::thread::RawThread;

mod cancel;
mod cond;
mod mutex;
mod sem;
mod thread;

/// A value no attribute setter accepts.
const INVALID: libc::c_int = 99;

pub fn run<P: Printer>(suite: &mut Suite<P>) {
    suite.run("mutexattributes", mutex::attributes);
    suite.run("mutex", mutex::mutex);
    suite.run("conditionattributes", cond::attributes);
    suite.run("condition", cond::condition);
    suite.run("cancel", cancel::cancel);
    suite.run("pthreadattributes", thread::attributes);
    suite.run("pthread", thread::pthread);
    suite.run("sem", sem::sem);
}

/// Runs `op` against `resource` on one worker thread and returns its result.
fn on_worker<P, R, T, F>(
    case: &mut Case<'_, P>,
    name: &str,
    resource: &Arc<R>,
    op: F,
) -> Result<T, CaseExit>
where
    P: Printer,
    R: Send + Sync + 'static,
    T: Send + 'static,
    F: FnOnce(&R) -> T + Send + 'static,
{
    let mut rendezvous = case.rendezvous(Arc::clone(resource));
    case.require_ok("spawn", rendezvous.spawn(name, op))?;
    let mut values = case.require_ok(name, rendezvous.join_values())?;
    values.pop().ok_or_else(|| CaseExit::Aborted {
        label: name.to_owned(),
    })
}

/// Joins a raw thread, giving up after the case deadline.
fn join_bounded<P: Printer>(case: &mut Case<'_, P>, thread: RawThread) -> Result<SysResult<usize>, CaseExit> {
    let mut termination = case.require_ok("watch", Termination::watch(case.clock(), move || thread.join()))?;
    let terminated = termination.wait(case.deadline()).is_some();
    case.require(Check::that(terminated, "pthread_join").detail("thread did not terminate"))?;
    termination.into_value().ok_or_else(|| CaseExit::Aborted {
        label: "pthread_join".to_owned(),
    })
}
