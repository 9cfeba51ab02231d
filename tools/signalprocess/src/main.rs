//! Child process for the posixtest signal suite.
//!
//! Each flag makes the process behave in one observable way: exit after a
//! delay with a known status, signal its parent, or block until it is killed.
//! Flags are handled in the order they are listed.

use std::time::Duration;
use std::{env, fs, process, thread};

use anyhow::{Context, Result, bail};
use clap::Parser;

/// Exit status after `--user` signalled the parent.
const USER_EXIT: i32 = 190;

/// Child process driven by the posixtest signal suite.
#[derive(Parser)]
#[command(name = "signalprocess", version, about)]
struct Cli {
    /// Write this text to `orphan.txt` in the temp directory.
    #[arg(long, value_name = "TEXT")]
    orphan: Option<String>,

    /// Sleep this many milliseconds, then exit with it (low 8 bits) as status.
    #[arg(long, value_name = "MS")]
    wait: Option<u64>,

    /// Send SIGUSR1 to the parent process and exit with status 190.
    #[arg(long)]
    user: bool,

    /// Sleep until killed.
    #[arg(long)]
    infinite: bool,
}

/// Low 8 bits of `ms`, which is all a parent can observe of an exit status.
fn wait_status(ms: u64) -> i32 {
    i32::from((ms & 0xff) as u8)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(text) = &cli.orphan {
        let path = env::temp_dir().join("orphan.txt");
        fs::write(&path, text).with_context(|| format!("failed to write {}", path.display()))?;
    }

    if let Some(ms) = cli.wait {
        thread::sleep(Duration::from_millis(ms));
        process::exit(wait_status(ms));
    }

    if cli.user {
        // SAFETY: getppid has no preconditions.
        let parent = unsafe { libc::getppid() };
        // SAFETY: sending a signal has no memory-safety preconditions.
        if unsafe { libc::kill(parent, libc::SIGUSR1) } != 0 {
            bail!(
                "failed to signal parent {parent}: {}",
                std::io::Error::last_os_error()
            );
        }
        process::exit(USER_EXIT);
    }

    if cli.infinite {
        loop {
            thread::sleep(Duration::from_secs(3600));
        }
    }

    Ok(())
}
