//! Enumerating the processes visible under a process root.
//!
//! Listing `/proc` and reading each process's files are separate steps, and
//! processes keep starting and exiting in between. Enumeration is therefore
//! best effort: a process that vanishes mid-scan is dropped, and the caller
//! gets every process that could be read in one pass.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use super::error::Error;
use super::filter::ProcessFilter;
use super::process::Process;
use super::source::ProcFs;
use super::system::boot_time;

impl ProcFs {
    /// Every process that could be read, in pid order.
    pub fn all_processes(&self) -> Result<Vec<Process>, Error> {
        let pids = self.list_pids()?;
        let boot = boot_time(self)?;
        let mut processes = Vec::with_capacity(pids.len());
        for pid in pids {
            match Process::from_source(&self.live(pid), boot, self) {
                Ok(process) => processes.push(process),
                // Already counted and logged where it was detected.
                Err(Error::Vanished { .. }) => {}
                Err(e) => warn!("skipping pid {}: {}", pid, e),
            }
        }
        debug!(
            "read {} processes from {}",
            processes.len(),
            self.root().display()
        );
        Ok(processes)
    }

    /// Processes matching `filter`, in pid order.
    pub fn processes_matching<F>(&self, filter: &F) -> Result<Vec<Process>, Error>
    where
        F: ProcessFilter + ?Sized,
    {
        let mut processes = self.all_processes()?;
        processes.retain(|p| filter.matches(p));
        Ok(processes)
    }
}

/// Every process currently visible in `/proc`.
///
/// Only failure to list `/proc` itself (or to read `/proc/uptime`) is an
/// error; individual processes that cannot be read are skipped.
pub fn find_all_processes() -> Result<Vec<Process>, Error> {
    ProcFs::default().all_processes()
}

/// Processes in `/proc` matching `filter`.
pub fn find_processes<F>(filter: &F) -> Result<Vec<Process>, Error>
where
    F: ProcessFilter + ?Sized,
{
    ProcFs::default().processes_matching(filter)
}

/// Search the environments of all readable processes for `names`.
///
/// Each name maps to the first non-empty value found, scanning in pid order.
/// Names no process has set to something non-empty are absent from the
/// result. This is how a session helper
/// recovers variables such as `DBUS_SESSION_BUS_ADDRESS` from a desktop
/// session it was not started in.
pub fn find_environment_variables(
    processes: &[Process],
    names: &[&str],
) -> BTreeMap<String, String> {
    let mut found = BTreeMap::new();
    for process in processes {
        for name in names {
            if found.contains_key(*name) {
                continue;
            }
            match process.environ().get(*name) {
                Some(value) if !value.is_empty() => {
                    found.insert(name.to_string(), value.clone());
                }
                _ => {}
            }
        }
        if found.len() == names.len() {
            break;
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proc::process::tests::{stat_line, status_text};
    use crate::proc::source::{race_conditions, ProcFile};
    use std::fs;
    use std::path::Path;

    fn write_process(root: &Path, pid: u64, ppid: u64, environ: &[u8]) {
        let dir = root.join(pid.to_string());
        fs::create_dir(&dir).unwrap();
        fs::write(dir.join("stat"), stat_line(pid, ppid, "proc", 100 + pid)).unwrap();
        fs::write(dir.join("status"), status_text(1000)).unwrap();
        fs::write(dir.join("cmdline"), format!("proc-{}\0", pid)).unwrap();
        fs::write(dir.join("environ"), environ).unwrap();
    }

    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("uptime"), "5000.0 100.0\n").unwrap();
        write_process(dir.path(), 1, 0, b"PATH=/bin\0");
        write_process(dir.path(), 20, 1, b"DISPLAY=:0\0PATH=/usr/bin\0");
        write_process(dir.path(), 300, 20, b"DISPLAY=:1\0XAUTHORITY=/x\0");
        dir
    }

    #[test]
    fn enumerates_fixture_in_pid_order() {
        let dir = fixture();
        let pids: Vec<u64> = ProcFs::new(dir.path())
            .all_processes()
            .unwrap()
            .iter()
            .map(Process::pid)
            .collect();
        assert_eq!(pids, vec![1, 20, 300]);
    }

    #[test]
    fn half_written_process_is_skipped() {
        let dir = fixture();
        // Directory listed, but its files are already gone.
        fs::create_dir(dir.path().join("4000")).unwrap();
        // Present but corrupt.
        write_process(dir.path(), 4001, 1, b"");
        fs::write(dir.path().join("4001").join("stat"), "garbage").unwrap();

        let before = race_conditions().get(ProcFile::Stat);
        let processes = ProcFs::new(dir.path()).all_processes().unwrap();
        assert_eq!(processes.len(), 3);
        assert!(race_conditions().get(ProcFile::Stat) > before);
    }

    #[test]
    fn filters_by_query() {
        let dir = fixture();
        let procfs = ProcFs::new(dir.path());
        let matched = procfs
            .processes_matching(&crate::Query::new().cmdline_contains("proc-20"))
            .unwrap();
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].pid(), 20);
    }

    #[test]
    fn missing_root_is_an_error() {
        assert!(ProcFs::new("/nonexistent/proc").all_processes().is_err());
    }

    #[test]
    fn environment_search_takes_first_value() {
        let dir = fixture();
        let processes = ProcFs::new(dir.path()).all_processes().unwrap();
        let found = find_environment_variables(&processes, &["DISPLAY", "XAUTHORITY", "NOPE"]);
        assert_eq!(found.len(), 2);
        assert_eq!(found["DISPLAY"], ":0");
        assert_eq!(found["XAUTHORITY"], "/x");
    }

    #[test]
    fn environment_search_skips_empty_values() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("uptime"), "5000.0 100.0\n").unwrap();
        write_process(dir.path(), 1, 0, b"DISPLAY=\0XAUTHORITY=\0");
        write_process(dir.path(), 20, 1, b"DISPLAY=:0\0");

        let processes = ProcFs::new(dir.path()).all_processes().unwrap();
        let found = find_environment_variables(&processes, &["DISPLAY", "XAUTHORITY"]);
        assert_eq!(found.get("DISPLAY").map(String::as_str), Some(":0"));
        assert!(!found.contains_key("XAUTHORITY"));
    }
}
