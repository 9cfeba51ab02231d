//! Command-line interface definitions for posixtest.

use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgGroup, Parser, ValueEnum};
use posix_harness::{CaseFilter, HarnessConfig};

use crate::suites::SuiteKind;

/// POSIX conformance tests for threads, synchronization, queues, signals and timers.
#[derive(Parser)]
#[command(name = "posixtest", version, about)]
#[command(group(
    ArgGroup::new("suites")
        .required(true)
        .multiple(true)
        .args(["sched", "pthread", "mq", "signal", "time", "unistd", "all"]),
))]
pub struct Cli {
    /// Run the scheduling parameter suite.
    #[arg(long)]
    pub sched: bool,

    /// Run the mutex, condition, cancellation, thread and semaphore suite.
    #[arg(long)]
    pub pthread: bool,

    /// Run the message queue suite.
    #[arg(long)]
    pub mq: bool,

    /// Run the signal suite.
    #[arg(long)]
    pub signal: bool,

    /// Run the time-of-day and timer suite.
    #[arg(long)]
    pub time: bool,

    /// Run the unistd (access) suite.
    #[arg(long)]
    pub unistd: bool,

    /// Run every suite.
    #[arg(long)]
    pub all: bool,

    /// Only run cases whose `<suite>::<case>` name contains this string.
    #[arg(long)]
    pub filter: Option<String>,

    /// Require the filter to match the case name exactly.
    #[arg(long, requires = "filter")]
    pub exact: bool,

    /// Suppress per-case progress; show only failures and the final summary.
    #[arg(long, short = 'q', conflicts_with = "verbose")]
    pub quiet: bool,

    /// Enable verbose output with worker and timing diagnostics.
    #[arg(long, short = 'v')]
    pub verbose: bool,

    /// Result format written to stdout.
    #[arg(long, value_enum, default_value_t = Format::Json)]
    pub format: Format,

    /// Upper bound in milliseconds for every worker join and polling loop.
    #[arg(long, default_value_t = 5000)]
    pub deadline_ms: u64,

    /// Report results only; exit 0 even if cases failed.
    #[arg(long)]
    pub informational: bool,

    /// Path of the signalprocess helper (default: next to this executable).
    #[arg(long)]
    pub signal_process: Option<PathBuf>,

    /// Allow the time suite to change the system clock.
    #[arg(long)]
    pub set_time: bool,
}

/// Output formats for structured results.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Format {
    /// One pretty-printed JSON document.
    Json,
    /// Indented `key: value` lines.
    Text,
}

impl Cli {
    /// Suites selected on the command line, in execution order.
    pub fn selected(&self) -> Vec<SuiteKind> {
        SuiteKind::ALL
            .into_iter()
            .filter(|kind| {
                self.all
                    || match kind {
                        SuiteKind::Sched => self.sched,
                        SuiteKind::Pthread => self.pthread,
                        SuiteKind::Mq => self.mq,
                        SuiteKind::Signal => self.signal,
                        SuiteKind::Time => self.time,
                        SuiteKind::Unistd => self.unistd,
                    }
            })
            .collect()
    }

    /// Harness settings shared by every suite.
    pub fn harness_config(&self) -> HarnessConfig {
        HarnessConfig {
            deadline: Duration::from_millis(self.deadline_ms),
            filter: CaseFilter::new(self.filter.clone(), self.exact),
        }
    }
}
