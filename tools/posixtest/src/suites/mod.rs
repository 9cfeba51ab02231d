//! The conformance suites.
//!
//! Each suite module exposes `run`, which executes its cases in order on a
//! [`Suite`] it is handed. Cases never share state: anything a case creates
//! (a queue name, a signal handler, a scheduling policy) is removed or
//! restored before it returns.

use std::path::PathBuf;

use posix_harness::{HarnessConfig, Printer, Suite, SuiteReport};

mod mq;
mod pthread;
mod sched;
mod signal;
mod time;
mod unistd;

/// Settings that only some suites need.
#[derive(Debug, Clone)]
pub struct Env {
    /// Path of the `signalprocess` helper binary.
    pub signal_process: PathBuf,
    /// The time suite may change `CLOCK_REALTIME`.
    pub set_time: bool,
}

/// The suites posixtest can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuiteKind {
    Sched,
    Pthread,
    Mq,
    Signal,
    Time,
    Unistd,
}

impl SuiteKind {
    /// Every suite, in execution order.
    pub const ALL: [SuiteKind; 6] = [
        SuiteKind::Sched,
        SuiteKind::Pthread,
        SuiteKind::Mq,
        SuiteKind::Signal,
        SuiteKind::Time,
        SuiteKind::Unistd,
    ];

    /// Report name of the suite.
    pub fn name(self) -> &'static str {
        match self {
            SuiteKind::Sched => "posix::sched",
            SuiteKind::Pthread => "posix::pthread",
            SuiteKind::Mq => "posix::mq",
            SuiteKind::Signal => "posix::signal",
            SuiteKind::Time => "posix::time",
            SuiteKind::Unistd => "posix::unistd",
        }
    }

    /// Runs every case of the suite through `printer`.
    pub fn run<P: Printer>(self, printer: P, config: HarnessConfig, env: &Env) -> SuiteReport {
        let mut suite = Suite::new(self.name(), printer).with_config(config);
        match self {
            SuiteKind::Sched => sched::run(&mut suite),
            SuiteKind::Pthread => pthread::run(&mut suite),
            SuiteKind::Mq => mq::run(&mut suite),
            SuiteKind::Signal => signal::run(&mut suite, env),
            SuiteKind::Time => time::run(&mut suite, env),
            SuiteKind::Unistd => unistd::run(&mut suite),
        }
        suite.finalize()
    }
}
