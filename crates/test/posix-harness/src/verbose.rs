//! Diagnostic levels.
//!
//! Structured results go through a [`Printer`]. Everything else a run has to
//! say (case progress, worker spawns and joins, measured timings, failed
//! assertions) is a diagnostic line on stderr, filtered by the process-wide
//! level held here.
//!
//! | Level     | Flag | Shown                                   |
//! |-----------|------|-----------------------------------------|
//! | `Quiet`   | `-q` | failed assertions, suite failures       |
//! | `Default` |      | plus one line per closed case           |
//! | `Verbose` | `-v` | plus worker lifecycles and every timing |
//!
//! [`Printer`]: crate::Printer

use std::sync::atomic::{AtomicU8, Ordering};

/// How much diagnostic output a run produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum Verbosity {
    /// Failures only.
    Quiet,
    /// Per-case progress.
    Default,
    /// Worker and timing detail.
    Verbose,
}

static LEVEL: AtomicU8 = AtomicU8::new(Verbosity::Default as u8);

impl Verbosity {
    const LEVELS: [Verbosity; 3] = [Verbosity::Quiet, Verbosity::Default, Verbosity::Verbose];

    /// The level selected by the `-q` and `-v` flags. `-q` wins.
    pub fn from_flags(quiet: bool, verbose: bool) -> Self {
        match (quiet, verbose) {
            (true, _) => Verbosity::Quiet,
            (false, true) => Verbosity::Verbose,
            (false, false) => Verbosity::Default,
        }
    }

    /// Returns `true` if lines at this level are shown at the current level.
    pub fn enabled(self) -> bool {
        current() >= self
    }
}

/// Sets the process-wide level from the command-line flags.
pub fn init(quiet: bool, verbose: bool) {
    set(Verbosity::from_flags(quiet, verbose));
}

/// Sets the process-wide level.
pub fn set(level: Verbosity) {
    LEVEL.store(level as u8, Ordering::Relaxed);
}

/// The process-wide level.
pub fn current() -> Verbosity {
    let raw = LEVEL.load(Ordering::Relaxed);
    Verbosity::LEVELS
        .into_iter()
        .find(|level| *level as u8 == raw)
        .unwrap_or(Verbosity::Default)
}

/// Returns `true` when worker and timing detail is shown.
pub fn is_verbose() -> bool {
    Verbosity::Verbose.enabled()
}

/// Returns `true` when only failures are shown.
pub fn is_quiet() -> bool {
    current() == Verbosity::Quiet
}

/// `eprintln!` at [`Verbosity::Verbose`].
///
/// ```ignore
/// vprintln!("  spawned worker '{name}'");
/// ```
#[macro_export]
macro_rules! vprintln {
    ($($arg:tt)*) => {
        if $crate::verbose::Verbosity::Verbose.enabled() {
            eprintln!($($arg)*);
        }
    };
}

/// `eprintln!` at [`Verbosity::Default`], i.e. unless `-q` was given.
#[macro_export]
macro_rules! dprintln {
    ($($arg:tt)*) => {
        if $crate::verbose::Verbosity::Default.enabled() {
            eprintln!($($arg)*);
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiet_flag_overrides_verbose() {
        assert_eq!(Verbosity::from_flags(true, true), Verbosity::Quiet);
        assert_eq!(Verbosity::from_flags(false, true), Verbosity::Verbose);
        assert_eq!(Verbosity::from_flags(false, false), Verbosity::Default);
    }

    #[test]
    fn levels_round_trip_through_the_global() {
        for level in Verbosity::LEVELS {
            set(level);
            assert_eq!(current(), level);
            assert!(level.enabled());
        }
        set(Verbosity::Quiet);
        assert!(is_quiet());
        assert!(!Verbosity::Default.enabled());
        set(Verbosity::Default);
        assert!(!is_verbose());
    }
}
