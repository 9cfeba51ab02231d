//! Signal delivery within the process and between processes.

use std::os::unix::process::ExitStatusExt;
use std::process::{Child, Command, ExitStatus};
use std::sync::Arc;
use std::time::Duration;

use posix_harness::{Case, CaseResult, Check, Printer, SignalCounter, Suite, TimingWindow, poll_until};

use super::Env;
use crate::os::thread::RawThread;
use crate::os::{Errno, sched};

const SENDS_PER_WORKER: u32 = 4;
/// `SCHED_FIFO` priority of the raising worker.
const RAISE_PRIORITY: libc::c_int = 25;
const POLL: Duration = Duration::from_millis(1);

/// Exit status of `signalprocess --user`.
const USER_EXIT: i32 = 190;
const WAIT_MS: u64 = 200;

pub fn run<P: Printer>(suite: &mut Suite<P>, env: &Env) {
    suite.run("self", signal_self);
    suite.run("process", |case| process(case, env));
}

/// Raises `SIGUSR1` on the calling thread, which delivers it before returning.
fn raise_usr1() -> bool {
    // SAFETY: no preconditions; the installed handler only counts.
    unsafe { libc::raise(libc::SIGUSR1) == 0 }
}

/// Sends `SIGUSR1` to the whole process.
fn kill_usr1(pid: libc::pid_t) -> bool {
    // SAFETY: no preconditions; the installed handler only counts.
    unsafe { libc::kill(pid, libc::SIGUSR1) == 0 }
}

fn signal_self<P: Printer>(case: &mut Case<'_, P>) -> CaseResult {
    let counter = Arc::new(case.require_ok("sigaction", SignalCounter::install(libc::SIGUSR1))?);
    let deadline = case.deadline();

    case.require(Check::that(raise_usr1(), "raise"))?;
    case.expect(Check::eq("raise once", counter.count(), 1));

    let pid = sched::pid();
    let mut expected = 1;
    type Sender = fn(&SignalCounter, libc::pid_t, u32, Duration) -> bool;
    let workers: [(&str, Option<libc::c_int>, Sender); 3] = [
        ("raise", Some(RAISE_PRIORITY), |_, _, _, _| {
            (0..SENDS_PER_WORKER).all(|_| raise_usr1())
        }),
        ("kill", None, |counter, pid, from, deadline| {
            // A pending signal is not queued twice, so each send waits for
            // the previous delivery.
            (1..=SENDS_PER_WORKER).all(|i| kill_usr1(pid) && counter.wait_for(from + i, deadline))
        }),
        ("yield", None, |_, _, _, _| {
            (0..SENDS_PER_WORKER).all(|_| {
                sched::yield_now();
                raise_usr1()
            })
        }),
    ];
    for (name, priority, send) in workers {
        let from = expected;
        let mut rendezvous = case.rendezvous(Arc::clone(&counter));
        case.require_ok(
            "spawn",
            rendezvous.spawn(name, move |counter| {
                let scheduled = match priority {
                    Some(priority) => RawThread::current().set_sched(libc::SCHED_FIFO, priority),
                    None => Ok(()),
                };
                (scheduled, send(counter, pid, from, deadline))
            }),
        )?;
        let joined = case.require_ok("join", rendezvous.join_values())?;
        let (scheduled, sent): (Vec<_>, Vec<_>) = joined.into_iter().unzip();
        for scheduled in scheduled {
            match scheduled {
                Ok(()) => {}
                Err(Errno::EPERM) => case.object(name, |case| case.skip("SCHED_FIFO not permitted"))?,
                Err(e) => {
                    case.expect(Check::that(false, format!("{name} SCHED_FIFO")).detail(format!("{e:?}")));
                }
            }
        }
        case.expect(Check::eq(format!("{name} sent"), sent, vec![true]));

        expected += SENDS_PER_WORKER;
        counter.wait_for(expected, deadline);
        case.key(&format!("{name}Count"), counter.count());
        case.expect(Check::eq(format!("after {name}"), counter.count(), expected));
    }
    Ok(())
}

/// Polls `child` until it exits or `deadline` elapses; kills it on timeout.
fn wait_child(child: &mut Child, deadline: Duration) -> Option<ExitStatus> {
    let mut status = None;
    poll_until(deadline, POLL, || match child.try_wait() {
        Ok(Some(exited)) => {
            status = Some(exited);
            true
        }
        Ok(None) => false,
        Err(_) => true,
    });
    if status.is_none() {
        let _ = child.kill();
        let _ = child.wait();
    }
    status
}

fn process<P: Printer>(case: &mut Case<'_, P>, env: &Env) -> CaseResult {
    let helper = env.signal_process.as_path();
    if !helper.is_file() {
        return case.not_supported(format!("helper not found at {}", helper.display()));
    }
    let deadline = case.deadline();

    case.object("wait", |case| {
        let mut scope = case.timed("exit", TimingWindow::from_millis(WAIT_MS, WAIT_MS + 100));
        let mut child = scope.require_ok(
            "spawn",
            Command::new(helper).arg(format!("--wait={WAIT_MS}")).spawn(),
        )?;
        let status = wait_child(&mut child, deadline);
        scope.finish();
        case.expect(Check::eq("exit status", status.and_then(|s| s.code()), Some(200)));
        Ok(())
    })?;

    case.object("user", |case| {
        let counter = case.require_ok("sigaction", SignalCounter::install(libc::SIGUSR1))?;
        let mut child = case.require_ok("spawn", Command::new(helper).arg("--user").spawn())?;
        let status = wait_child(&mut child, deadline);
        case.expect(Check::eq("exit status", status.and_then(|s| s.code()), Some(USER_EXIT)));
        case.expect(Check::that(counter.wait_for(1, deadline), "SIGUSR1 from child"));
        case.key("signalCount", counter.count());
        Ok(())
    })?;

    case.object("terminate", |case| {
        let mut child = case.require_ok("spawn", Command::new(helper).arg("--infinite").spawn())?;
        let pid = case.require_ok("pid", libc::pid_t::try_from(child.id()))?;
        std::thread::sleep(Duration::from_millis(50));
        // SAFETY: `pid` is our unreaped child, so it cannot have been reused.
        let killed = unsafe { libc::kill(pid, libc::SIGTERM) } == 0;
        case.expect(Check::that(killed, "kill"));
        let status = wait_child(&mut child, deadline);
        case.expect(Check::eq(
            "terminating signal",
            status.and_then(|s| s.signal()),
            Some(libc::SIGTERM),
        ));
        Ok(())
    })
}
