//! Timed scopes.
//!
//! A [`TimedScope`] starts measuring when it is opened and, when it goes out
//! of scope, reports the elapsed time as `"<name> (ms)"` and records a soft
//! assertion that the time falls in its [`TimingWindow`]. The report and the
//! assertion happen on every exit path, including an early `?` and a panic.
//!
//! ```ignore
//! {
//!     let _scope = case.timed("receiveTimed", TimingWindow::from_millis(100, 250));
//!     let err = queue.receive_timeout(&mut buf, Duration::from_millis(100));
//! } // "receiveTimed (ms)" emitted, window checked
//! ```
//!
//! The scope dereferences to its [`Case`], so assertions can be made while it
//! is open.

use std::ops::{Deref, DerefMut};
use std::panic::Location;
use std::time::Duration;

use crate::case::Case;
use crate::check::Check;
use crate::printer::Printer;
use crate::vprintln;
use crate::window::{TimingWindow, millis};

/// Measures a bracketed operation against a timing window.
pub struct TimedScope<'c, 's, P: Printer> {
    case: &'c mut Case<'s, P>,
    name: String,
    window: TimingWindow,
    started: Duration,
    location: &'static Location<'static>,
    closed: bool,
}

impl<'c, 's, P: Printer> TimedScope<'c, 's, P> {
    /// Starts measuring on the case's clock.
    #[track_caller]
    pub(crate) fn open(case: &'c mut Case<'s, P>, name: &str, window: TimingWindow) -> Self {
        let started = case.now();
        Self {
            case,
            name: name.to_owned(),
            window,
            started,
            location: Location::caller(),
            closed: false,
        }
    }

    /// Time since the scope was opened.
    pub fn elapsed(&self) -> Duration {
        self.case.now().saturating_sub(self.started)
    }

    /// The window the elapsed time is checked against.
    pub fn window(&self) -> TimingWindow {
        self.window
    }

    /// Closes the scope now and returns the measured duration.
    pub fn finish(mut self) -> Duration {
        self.close()
    }

    fn close(&mut self) -> Duration {
        let elapsed = self.elapsed();
        self.closed = true;
        self.case.duration(&self.name, elapsed);
        vprintln!(
            "  {}: {} ms (window {})",
            self.name,
            millis(elapsed),
            self.window
        );
        let check = Check::within(self.name.as_str(), elapsed, self.window).at(self.location);
        self.case.expect(check);
        elapsed
    }
}

impl<'s, P: Printer> Deref for TimedScope<'_, 's, P> {
    type Target = Case<'s, P>;

    fn deref(&self) -> &Self::Target {
        &*self.case
    }
}

impl<P: Printer> DerefMut for TimedScope<'_, '_, P> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut *self.case
    }
}

impl<P: Printer> Drop for TimedScope<'_, '_, P> {
    fn drop(&mut self) {
        if !self.closed {
            self.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::case::Suite;
    use crate::check::Verdict;
    use crate::clock::ManualClock;
    use crate::printer::JsonPrinter;

    fn run_with_offset(offset_ms: u64, window: TimingWindow) -> (Verdict, serde_json::Value) {
        let clock = Arc::new(ManualClock::new());
        let mut printer = JsonPrinter::new();
        let mut suite = Suite::new("posix::timed", &mut printer).with_clock(clock.clone());
        let verdict = suite.run("scope", |case| {
            let _scope = case.timed("op", window);
            clock.advance(Duration::from_millis(offset_ms));
            Ok(())
        });
        suite.finalize();
        (verdict.unwrap(), printer.finish())
    }

    #[test]
    fn boundaries_with_a_fake_clock() {
        let window = TimingWindow::from_millis(100, 250);
        assert_eq!(run_with_offset(99, window).0, Verdict::Fail);
        assert_eq!(run_with_offset(100, window).0, Verdict::Pass);
        assert_eq!(run_with_offset(249, window).0, Verdict::Pass);
        assert_eq!(run_with_offset(250, window).0, Verdict::Fail);
    }

    #[test]
    fn duration_is_reported_on_failure_too() {
        let (verdict, doc) = run_with_offset(400, TimingWindow::from_millis(100, 250));
        assert_eq!(verdict, Verdict::Fail);
        let case = &doc["posix::timed"]["scope"];
        assert_eq!(case["op (ms)"], json!(400));
        assert_eq!(case["failures"][0]["detail"], json!("400 ms is above [100 ms, 250 ms)"));
    }

    #[test]
    fn scope_closes_on_early_return() {
        let clock = Arc::new(ManualClock::new());
        let mut printer = JsonPrinter::new();
        let mut suite = Suite::new("posix::timed", &mut printer).with_clock(clock.clone());
        let mut after = false;
        suite.run("early", |case| {
            let mut scope = case.timed("op", TimingWindow::from_millis(10, 20));
            clock.advance(Duration::from_millis(15));
            scope.require(Check::that(false, "precondition"))?;
            after = true;
            Ok(())
        });
        assert!(!after);
        suite.finalize();
        let doc = printer.finish();
        assert_eq!(doc["posix::timed"]["early"]["op (ms)"], json!(15));
    }

    #[test]
    fn finish_returns_the_measurement() {
        let clock = Arc::new(ManualClock::new());
        let mut printer = JsonPrinter::new();
        let mut suite = Suite::new("posix::timed", &mut printer).with_clock(clock.clone());
        suite.run("finish", |case| {
            let scope = case.timed("op", TimingWindow::from_millis(5, 10));
            clock.advance(Duration::from_millis(7));
            let elapsed = scope.finish();
            case.expect(Check::eq("measured", elapsed, Duration::from_millis(7)));
            Ok(())
        });
        let report = suite.finalize();
        assert_eq!(report.verdict, Verdict::Pass);
        let doc = printer.finish();
        assert_eq!(doc["posix::timed"]["finish"]["op (ms)"], json!(7));
        assert!(doc["posix::timed"]["finish"].get("op (ms)#2").is_none());
    }

    #[test]
    fn failure_points_at_the_scope() {
        let clock = Arc::new(ManualClock::new());
        let mut printer = JsonPrinter::new();
        let mut suite = Suite::new("posix::timed", &mut printer).with_clock(clock);
        suite.run("location", |case| {
            let _scope = case.timed("instant", TimingWindow::from_millis(1, 2));
            Ok(())
        });
        let report = suite.finalize();
        assert_eq!(report.cases[0].failures[0].location().file(), file!());
    }
}
