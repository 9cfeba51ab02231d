//! Wall-clock time, per-process timers and `alarm`.

use std::time::{Duration, Instant};

use posix_harness::{Case, CaseResult, Check, Printer, SignalCounter, Suite, TimingWindow};

use super::Env;
use crate::os::time::{self, time_now};
use crate::os::timer::{self, PosixTimer, alarm};
use crate::os::{Errno, SysResult};

/// 2020-08-01 03:30:55 UTC.
const REFERENCE_TIME: i64 = 1_596_252_655;

const ONE_SHOT: Duration = Duration::from_millis(50);
const INTERVAL: Duration = Duration::from_millis(50);
const INTERVAL_TICKS: u32 = 5;
/// How long a cancelled or replaced alarm is watched for a stray delivery.
const QUIET_PERIOD: Duration = Duration::from_secs(2);

pub fn run<P: Printer>(suite: &mut Suite<P>, env: &Env) {
    suite.run("timeofday", |case| timeofday(case, env));
    suite.run("timer", timers);
}

fn timeofday<P: Printer>(case: &mut Case<'_, P>, env: &Env) -> CaseResult {
    let before = time_now();
    std::thread::sleep(Duration::from_secs(1));
    let advanced = time_now() - before;
    case.key("advanced (s)", advanced);
    case.expect(Check::that(
        (1..=2).contains(&advanced),
        "time() advances across a 1 s sleep",
    ).detail(format!("advanced by {advanced} s")));

    case.object("settime", |case| {
        if !env.set_time {
            return case.skip("setting the clock needs --set-time");
        }
        set_reference_time(case)
    })
}

fn set_reference_time<P: Printer>(case: &mut Case<'_, P>) -> CaseResult {
    let original = time_now();
    let since = Instant::now();
    case.require_ok("clock_settime", time::set_time(REFERENCE_TIME))?;
    let now = time_now();
    let broken_down = time::utc(now);

    // Put the real time back before judging anything.
    let elapsed = i64::try_from(since.elapsed().as_secs()).unwrap_or(0);
    let restored = time::set_time(original + elapsed);
    case.expect(Check::ok("restore clock", &restored));

    case.expect(Check::that(
        (REFERENCE_TIME..=REFERENCE_TIME + 1).contains(&now),
        "time() after clock_settime",
    ).detail(format!("got {now}")));
    let tm = case.require_ok("gmtime", broken_down)?;
    let date = (tm.tm_year + 1900, tm.tm_mon + 1, tm.tm_mday, tm.tm_hour, tm.tm_min);
    case.expect(Check::eq("utc date", date, (2020, 8, 1, 3, 30)));
    Ok(())
}

/// Disarms `alarm` on every exit path.
struct AlarmGuard;

impl Drop for AlarmGuard {
    fn drop(&mut self) {
        alarm(0);
    }
}

fn timers<P: Printer>(case: &mut Case<'_, P>) -> CaseResult {
    let counter = case.require_ok("sigaction", SignalCounter::install(libc::SIGUSR1))?;
    let posix_timer = match PosixTimer::create(libc::SIGUSR1) {
        Err(e) if e.is_unsupported() => return case.not_supported("timer_create not supported"),
        other => case.require_ok("timer_create", other)?,
    };
    case.expect(Check::fails_with("settime invalid timer", &timer::set_invalid(), Errno::EINVAL));

    case.object("oneshot", |case| {
        counter.reset();
        let mut scope = case.timed("fired", TimingWindow::from_millis(50, 70));
        let armed: SysResult<()> = posix_timer.set(ONE_SHOT, Duration::ZERO);
        scope.require_ok("timer_settime", armed)?;
        let deadline = scope.deadline();
        let fired = counter.wait_for(1, deadline);
        scope.finish();
        case.expect(Check::that(fired, "expired"));
        std::thread::sleep(ONE_SHOT * 2);
        case.expect(Check::eq("fires once", counter.count(), 1));
        Ok(())
    })?;

    case.object("interval", |case| {
        counter.reset();
        let deadline = case.deadline();
        case.require_ok("timer_settime", posix_timer.set(INTERVAL, INTERVAL))?;
        let mut previous = case.now();
        for tick in 1..=INTERVAL_TICKS {
            let fired = counter.wait_for(tick, deadline);
            let now = case.now();
            let spacing = now.saturating_sub(previous);
            previous = now;
            case.duration(&format!("tick {tick}"), spacing);
            case.expect(Check::that(fired, format!("tick {tick} fired")));
            case.expect(Check::within(format!("tick {tick}"), spacing, TimingWindow::from_millis(40, 70)));
        }
        case.expect(Check::ok("disarm", &posix_timer.set(Duration::ZERO, Duration::ZERO)));
        Ok(())
    })?;
    drop(posix_timer);
    drop(counter);

    alarms(case)
}

fn alarms<P: Printer>(case: &mut Case<'_, P>) -> CaseResult {
    let counter = case.require_ok("sigaction", SignalCounter::install(libc::SIGALRM))?;
    let _disarm = AlarmGuard;
    let deadline = case.deadline();

    case.object("alarm", |case| {
        let scope = case.timed("fired", TimingWindow::from_millis(1000, 1200));
        alarm(1);
        let fired = counter.wait_for(1, deadline);
        scope.finish();
        case.expect(Check::that(fired, "alarm(1) fired"));
        Ok(())
    })?;

    case.object("cancelled", |case| {
        counter.reset();
        alarm(1);
        let left = alarm(0);
        case.expect(Check::eq("seconds left", left, 1));
        case.expect(Check::that(!counter.wait_for(1, QUIET_PERIOD), "cancelled alarm stays quiet"));
        Ok(())
    })?;

    case.object("rearmed", |case| {
        counter.reset();
        alarm(2);
        let scope = case.timed("fired", TimingWindow::from_millis(1000, 1200));
        let left = alarm(1);
        let fired = counter.wait_for(1, deadline);
        scope.finish();
        case.expect(Check::eq("seconds left", left, 2));
        case.expect(Check::that(fired, "replacement alarm fired"));
        case.expect(Check::that(!counter.wait_for(2, QUIET_PERIOD), "replaced alarm stays quiet"));
        Ok(())
    })
}
