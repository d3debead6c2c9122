use std::io;
use std::time::Duration;

use nix::errno::Errno;
use nix::libc;
use nix::sys::signal::Signal;

/// Unified error type for proctree operations.
///
/// Reading `/proc` races against processes exiting, so "the process is gone"
/// is a distinct variant rather than a generic I/O failure. Callers usually
/// treat [`Error::Vanished`] as an expected outcome and everything else as
/// something worth reporting.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The process exited (or was reaped) between discovery and read.
    #[error("process {pid} vanished")]
    Vanished { pid: u64 },

    /// The caller may not read this file of the process.
    #[error("permission denied reading /proc/{pid}/{file}")]
    PermissionDenied { pid: u64, file: &'static str },

    /// File content did not have the expected format.
    #[error("Error parsing {file}: {reason}")]
    Parse { file: String, reason: String },

    /// Signal delivery failed for a reason other than "no such process".
    #[error("cannot send {signal} to {pid}: {source}")]
    Signal {
        pid: u64,
        signal: String,
        #[source]
        source: Errno,
    },

    /// A wait deadline passed while processes were still running.
    #[error("timed out after {waited:?} waiting for {pids:?}")]
    Timeout { pids: Vec<u64>, waited: Duration },

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    pub fn parse(item: &str, reason: &str) -> Self {
        Error::Parse {
            file: item.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn in_file(file: &str, reason: &str) -> Self {
        Error::Parse {
            file: format!("/proc/[pid]/{}", file),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn signal(pid: u64, signal: Option<Signal>, source: Errno) -> Self {
        Error::Signal {
            pid,
            signal: signal.map_or_else(|| "signal 0".to_string(), |s| s.to_string()),
            source,
        }
    }

    /// Classify an I/O error from reading `/proc/[pid]/<file>`.
    ///
    /// `ENOENT` and `ESRCH` both mean the process went away underneath us.
    pub(crate) fn from_read(pid: u64, file: &'static str, e: io::Error) -> Self {
        match e.raw_os_error() {
            Some(libc::ENOENT) | Some(libc::ESRCH) => Error::Vanished { pid },
            Some(libc::EACCES) | Some(libc::EPERM) => Error::PermissionDenied { pid, file },
            _ if e.kind() == io::ErrorKind::NotFound => Error::Vanished { pid },
            _ if e.kind() == io::ErrorKind::PermissionDenied => {
                Error::PermissionDenied { pid, file }
            }
            _ => Error::Io(e),
        }
    }

    /// Whether this is the race outcome of a process exiting mid-read.
    pub fn is_vanished(&self) -> bool {
        matches!(self, Error::Vanished { .. })
    }

    pub fn is_permission_denied(&self) -> bool {
        matches!(self, Error::PermissionDenied { .. })
    }
}

impl From<std::num::ParseIntError> for Error {
    fn from(e: std::num::ParseIntError) -> Self {
        Error::parse("integer", &e.to_string())
    }
}
