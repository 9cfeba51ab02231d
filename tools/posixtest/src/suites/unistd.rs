//! File accessibility checks.

use std::fs::{self, File, Permissions};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use posix_harness::{Case, CaseResult, Check, Printer, Suite};

use crate::os::unistd::{access, is_root};
use crate::os::{Errno, sched};

/// Longer than `NAME_MAX` (255).
const LONG_COMPONENT: usize = 300;
/// Longer than `PATH_MAX` (4096) when repeated as `a/`.
const LONG_PATH_COMPONENTS: usize = 2100;

pub fn run<P: Printer>(suite: &mut Suite<P>) {
    suite.run("access", access_case);
}

/// A file in the temp directory, removed on drop.
struct TempFile {
    path: PathBuf,
}

impl TempFile {
    fn create(name: &str) -> std::io::Result<Self> {
        let path = std::env::temp_dir().join(format!("posixtest-{}-{name}", sched::pid()));
        File::create(&path)?;
        Ok(Self { path })
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

fn access_case<P: Printer>(case: &mut Case<'_, P>) -> CaseResult {
    let exe = case.require_ok("current_exe", std::env::current_exe())?;
    case.key("executable", exe.display().to_string());
    for (label, mode) in [
        ("exists", libc::F_OK),
        ("readable", libc::R_OK),
        ("executable", libc::X_OK),
    ] {
        case.expect(Check::ok(label, &access(&exe, mode)));
    }

    let missing = std::env::temp_dir().join(format!("posixtest-{}-missing", sched::pid()));
    case.expect(Check::fails_with("missing file", &access(&missing, libc::F_OK), Errno::ENOENT));
    case.expect(Check::fails_with(
        "missing directory",
        &access(&missing.join("file"), libc::F_OK),
        Errno::ENOENT,
    ));

    let long_component = Path::new("/").join("a".repeat(LONG_COMPONENT));
    case.expect(Check::fails_with(
        "long component",
        &access(&long_component, libc::F_OK),
        Errno::ENAMETOOLONG,
    ));
    let long_path = PathBuf::from(format!("/{}", "a/".repeat(LONG_PATH_COMPONENTS)));
    case.expect(Check::fails_with(
        "long path",
        &access(&long_path, libc::F_OK),
        Errno::ENAMETOOLONG,
    ));

    let writable = case.require_ok("create temp file", TempFile::create("writable"))?;
    case.expect(Check::ok("writable", &access(&writable.path, libc::W_OK)));

    let read_only = case.require_ok("create temp file", TempFile::create("readonly"))?;
    case.require_ok(
        "chmod",
        fs::set_permissions(&read_only.path, Permissions::from_mode(0o444)),
    )?;
    if is_root() {
        case.key("readOnly", "not tested (root may write anything)");
    } else {
        case.expect(Check::fails_with(
            "read-only",
            &access(&read_only.path, libc::W_OK),
            Errno::EACCES,
        ));
    }
    Ok(())
}
