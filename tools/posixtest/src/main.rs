//! POSIX conformance test runner.
//!
//! Runs the selected suites in order, writes the structured results to
//! stdout and diagnostics to stderr, and fails unless every case passed.
//!
//! Pipeline: parse flags → run suites → emit summary → decide exit status.

mod cli;
mod os;
mod suites;

use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use posix_harness::{HarnessConfig, JsonPrinter, Printer, SuiteReport, TextPrinter, dprintln, verbose};
use serde::Serialize;

use cli::{Cli, Format};
use suites::{Env, SuiteKind};

/// Totals appended to the results after the last suite.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Summary {
    suites: usize,
    cases: usize,
    not_tested: usize,
    skipped: usize,
    failed: Vec<String>,
    result: bool,
}

impl Summary {
    fn new(reports: &[SuiteReport]) -> Self {
        let failed: Vec<String> = reports
            .iter()
            .flat_map(|report| {
                report
                    .failed_cases()
                    .map(move |case| format!("{}::{}", report.name, case.name))
            })
            .collect();
        Self {
            suites: reports.len(),
            cases: reports.iter().map(|r| r.cases.len()).sum(),
            not_tested: reports
                .iter()
                .flat_map(|r| &r.cases)
                .filter(|c| c.not_tested.is_some())
                .count(),
            skipped: reports
                .iter()
                .flat_map(|r| &r.cases)
                .map(|c| c.skipped.len())
                .sum(),
            result: failed.is_empty(),
            failed,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    verbose::init(cli.quiet, cli.verbose);

    let env = Env {
        signal_process: match &cli.signal_process {
            Some(path) => path.clone(),
            None => default_helper()?,
        },
        set_time: cli.set_time,
    };
    let selected = cli.selected();
    let config = cli.harness_config();

    let summary = match cli.format {
        Format::Json => {
            let mut printer = JsonPrinter::new();
            let summary = run_suites(&mut printer, &selected, &config, &env)?;
            printer
                .write_to(io::stdout().lock())
                .context("failed to write results")?;
            summary
        }
        Format::Text => {
            let mut printer = TextPrinter::new(io::stdout().lock());
            run_suites(&mut printer, &selected, &config, &env)?
        }
    };

    if summary.result {
        dprintln!(
            "posixtest: ok. {} case(s) in {} suite(s), {} not tested, {} part(s) skipped",
            summary.cases,
            summary.suites,
            summary.not_tested,
            summary.skipped
        );
        return Ok(());
    }
    if cli.informational {
        eprintln!(
            "posixtest: {} case(s) failed (informational run): {}",
            summary.failed.len(),
            summary.failed.join(", ")
        );
        return Ok(());
    }
    bail!(
        "{} case(s) failed: {}",
        summary.failed.len(),
        summary.failed.join(", ")
    )
}

fn run_suites<P: Printer>(
    printer: &mut P,
    selected: &[SuiteKind],
    config: &HarnessConfig,
    env: &Env,
) -> Result<Summary> {
    let reports: Vec<SuiteReport> = selected
        .iter()
        .map(|kind| kind.run(&mut *printer, config.clone(), env))
        .collect();
    let summary = Summary::new(&reports);
    printer.key(
        "summary",
        serde_json::to_value(&summary).context("failed to serialize summary")?,
    );
    Ok(summary)
}

/// `signalprocess` next to the running executable.
fn default_helper() -> Result<PathBuf> {
    let exe = std::env::current_exe().context("failed to locate the running executable")?;
    let dir = exe
        .parent()
        .context("running executable has no parent directory")?;
    Ok(dir.join("signalprocess"))
}
