//! Process scheduling parameters.

use libc::c_int;
use posix_harness::{Case, CaseResult, Check, Printer, Suite};

use crate::os::{Errno, sched};

/// Above the kernel's `pid_max` ceiling (2^22), so never a live process.
const NONEXISTENT_PIDS: [libc::pid_t; 3] = [4_194_305, 10_000_000, libc::pid_t::MAX];

const POLICIES: [c_int; 3] = [libc::SCHED_FIFO, libc::SCHED_RR, libc::SCHED_OTHER];

pub fn run<P: Printer>(suite: &mut Suite<P>) {
    suite.run("param", param);
}

fn param<P: Printer>(case: &mut Case<'_, P>) -> CaseResult {
    let pid = sched::pid();
    let policy = case.require_ok("sched_getscheduler", sched::get_scheduler(pid))?;
    let priority = case.require_ok("sched_getparam", sched::get_param(pid))?;
    case.key("policy", sched::policy_name(policy));
    case.key("priority", priority);
    if policy == libc::SCHED_OTHER {
        case.expect(Check::eq("sched_getparam", priority, 0));
    }

    for bad in NONEXISTENT_PIDS {
        case.expect(Check::fails_with(
            format!("sched_getparam({bad})"),
            &sched::get_param(bad),
            Errno::ESRCH,
        ));
    }

    let ranges = POLICIES
        .into_iter()
        .try_for_each(|p| case.object(sched::policy_name(p), |case| policy_range(case, pid, p)));

    // Whatever the ranges did to this process, put it back.
    let restored = sched::set_scheduler(pid, policy, priority);
    case.expect(Check::ok("restore policy", &restored));
    ranges?;

    case.expect(Check::that(sched::set_param(-1, 0).is_err(), "sched_setparam(-1)"));
    case.expect(Check::fails_with(
        "sched_setparam out of range",
        &sched::set_param(pid, 100),
        Errno::EINVAL,
    ));
    case.expect(Check::ok("sched_setparam", &sched::set_param(pid, priority)));
    Ok(())
}

fn policy_range<P: Printer>(case: &mut Case<'_, P>, pid: libc::pid_t, policy: c_int) -> CaseResult {
    let min = case.require_ok("sched_get_priority_min", sched::priority_min(policy))?;
    let max = case.require_ok("sched_get_priority_max", sched::priority_max(policy))?;
    case.key("min", min);
    case.key("max", max);

    case.expect(Check::fails_with(
        "below min",
        &sched::set_scheduler(pid, policy, min - 1),
        Errno::EINVAL,
    ));
    case.expect(Check::fails_with(
        "above max",
        &sched::set_scheduler(pid, policy, max + 1),
        Errno::EINVAL,
    ));

    let mut accepted = 0;
    for prio in min..=max {
        match sched::set_scheduler(pid, policy, prio) {
            Ok(()) => accepted += 1,
            Err(Errno::EPERM) if accepted == 0 && policy != libc::SCHED_OTHER => {
                return case.skip("real-time scheduling not permitted");
            }
            Err(e) => {
                case.expect(Check::that(false, format!("priority {prio}")).detail(format!("failed: {e:?}")));
            }
        }
    }
    case.key("accepted", accepted);
    Ok(())
}
