use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

use super::error::Error;

/// Where the kernel exposes process information.
pub const DEFAULT_PROC_ROOT: &str = "/proc";

/// Abstraction over per-process data sources.
///
/// The live backend reads `<root>/[pid]/...`; tests substitute in-memory
/// sources to inject races and malformed content.
pub trait ProcSource {
    fn pid(&self) -> u64;

    fn read_stat(&self) -> io::Result<String>;
    fn read_status(&self) -> io::Result<String>;
    fn read_cmdline(&self) -> io::Result<Vec<u8>>;
    fn read_environ(&self) -> io::Result<Vec<u8>>;
    fn read_exe(&self) -> io::Result<PathBuf>;
}

/// The per-process files whose reads can race with process exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcFile {
    Stat,
    Status,
    Cmdline,
    Environ,
}

impl ProcFile {
    pub const ALL: [ProcFile; 4] = [
        ProcFile::Stat,
        ProcFile::Status,
        ProcFile::Cmdline,
        ProcFile::Environ,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ProcFile::Stat => "stat",
            ProcFile::Status => "status",
            ProcFile::Cmdline => "cmdline",
            ProcFile::Environ => "environ",
        }
    }

    fn index(self) -> usize {
        match self {
            ProcFile::Stat => 0,
            ProcFile::Status => 1,
            ProcFile::Cmdline => 2,
            ProcFile::Environ => 3,
        }
    }
}

static RACES: [AtomicU64; 4] = [
    AtomicU64::new(0),
    AtomicU64::new(0),
    AtomicU64::new(0),
    AtomicU64::new(0),
];

/// Number of races observed so far, per file, across the whole program.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RaceStats {
    counts: [u64; 4],
}

impl RaceStats {
    pub fn get(&self, file: ProcFile) -> u64 {
        self.counts[file.index()]
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }
}

/// Snapshot of the race counters.
pub fn race_conditions() -> RaceStats {
    let mut counts = [0; 4];
    for file in ProcFile::ALL {
        counts[file.index()] = RACES[file.index()].load(Ordering::Relaxed);
    }
    RaceStats { counts }
}

/// Turn the outcome of a raw read into a classified result, counting races.
pub(crate) fn classify<T>(pid: u64, file: ProcFile, result: io::Result<T>) -> Result<T, Error> {
    result.map_err(|e| {
        let err = Error::from_read(pid, file.name(), e);
        if err.is_vanished() {
            RACES[file.index()].fetch_add(1, Ordering::Relaxed);
            debug!("pid {} vanished while reading {}", pid, file.name());
        }
        err
    })
}

/// A process root directory, `/proc` unless pointed elsewhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcFs {
    root: PathBuf,
}

impl Default for ProcFs {
    fn default() -> Self {
        ProcFs::new(DEFAULT_PROC_ROOT)
    }
}

impl ProcFs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        ProcFs { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// All numeric entries of the root, ascending.
    pub fn list_pids(&self) -> io::Result<Vec<u64>> {
        let mut pids: Vec<u64> = fs::read_dir(&self.root)?
            .filter_map(|e| e.ok())
            .filter_map(|e| e.file_name().to_str()?.parse::<u64>().ok())
            .filter(|pid| *pid > 0)
            .collect();
        pids.sort_unstable();
        Ok(pids)
    }

    pub fn live(&self, pid: u64) -> LiveProcess {
        LiveProcess {
            dir: self.root.join(pid.to_string()),
            pid,
        }
    }

    pub(crate) fn read_uptime(&self) -> io::Result<String> {
        fs::read_to_string(self.root.join("uptime"))
    }
}

/// Live-process backend: reads everything from `<root>/[pid]/...`.
#[derive(Debug, Clone)]
pub struct LiveProcess {
    dir: PathBuf,
    pid: u64,
}

impl ProcSource for LiveProcess {
    fn pid(&self) -> u64 {
        self.pid
    }

    fn read_stat(&self) -> io::Result<String> {
        fs::read_to_string(self.dir.join("stat"))
    }

    fn read_status(&self) -> io::Result<String> {
        fs::read_to_string(self.dir.join("status"))
    }

    fn read_cmdline(&self) -> io::Result<Vec<u8>> {
        fs::read(self.dir.join("cmdline"))
    }

    fn read_environ(&self) -> io::Result<Vec<u8>> {
        fs::read(self.dir.join("environ"))
    }

    fn read_exe(&self) -> io::Result<PathBuf> {
        fs::read_link(self.dir.join("exe"))
    }
}
