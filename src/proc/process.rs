use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fs;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use nix::sys::signal::Signal;
use once_cell::sync::OnceCell;
use tracing::debug;

use super::args::{parse_cmdline, parse_environ};
use super::cred::{group_name, parse_cred, user_name, Ids, ProcCred};
use super::error::Error;
use super::signal;
use super::source::{classify, ProcFile, ProcFs, ProcSource};
use super::stat::{parse_stat, ProcessState, Stat};
use super::system::{boot_time, ticks_to_duration, ticks_to_time, PAGE_SIZE};

/// One process, as observed at one instant.
///
/// All fields are read in a single best-effort pass over several files, so
/// they are only as coherent as the process was still while we read them.
/// A record never changes after construction; observe the process again to
/// get a newer one.
///
/// Two records are equal when they have the same pid and the same start
/// time, so a recycled PID never compares equal to the process that used to
/// own it.
#[derive(Debug, Clone)]
pub struct Process {
    stat: Stat,
    cred: ProcCred,
    cmdline: Vec<String>,
    environ: BTreeMap<String, String>,
    exe: Option<PathBuf>,
    start_time: SystemTime,
    procfs: ProcFs,
    user: OnceCell<String>,
    group: OnceCell<String>,
}

/// Outcome of looking up a single PID.
#[derive(Debug)]
pub enum Lookup {
    Found(Process),
    /// The process exited before (or while) its files were read.
    Vanished,
    /// `stat` or `status` of the process may not be read by us.
    PermissionDenied,
    ParseFailed(Error),
}

impl Lookup {
    pub fn found(self) -> Option<Process> {
        match self {
            Lookup::Found(process) => Some(process),
            _ => None,
        }
    }
}

impl From<Result<Process, Error>> for Lookup {
    fn from(result: Result<Process, Error>) -> Self {
        match result {
            Ok(process) => Lookup::Found(process),
            Err(Error::Vanished { .. }) => Lookup::Vanished,
            Err(Error::PermissionDenied { .. }) => Lookup::PermissionDenied,
            Err(e) => Lookup::ParseFailed(e),
        }
    }
}

/// Read an optional file: permission denied degrades to empty content.
fn read_optional(pid: u64, file: ProcFile, result: std::io::Result<Vec<u8>>) -> Result<Vec<u8>, Error> {
    match classify(pid, file, result) {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.is_permission_denied() => {
            debug!("{}; treating /proc/{}/{} as empty", e, pid, file.name());
            Ok(Vec::new())
        }
        Err(e) => Err(e),
    }
}

impl ProcFs {
    /// Construct a record for `pid` under this root.
    pub fn process(&self, pid: u64) -> Result<Process, Error> {
        let boot = boot_time(self)?;
        Process::from_source(&self.live(pid), boot, self)
    }

    pub fn lookup(&self, pid: u64) -> Lookup {
        self.process(pid).into()
    }
}

impl Process {
    /// Construct a record for `pid` from `/proc`.
    pub fn from_pid(pid: u64) -> Result<Process, Error> {
        ProcFs::default().process(pid)
    }

    /// Like [`Process::from_pid`], but with races and failures as variants.
    pub fn lookup(pid: u64) -> Lookup {
        Process::from_pid(pid).into()
    }

    /// Construct a record from a process directory such as `/proc/self` or
    /// `/proc/1234`. Symbolic links are followed one level, which is what
    /// `/proc/self` and `/proc/thread-self` need.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Process, Error> {
        let path = path.as_ref();
        let resolved = match fs::read_link(path) {
            Ok(target) if target.is_relative() => match path.parent() {
                Some(parent) => parent.join(target),
                None => target,
            },
            Ok(target) => target,
            Err(_) => path.to_path_buf(),
        };
        let pid = resolved
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(|name| name.parse::<u64>().ok())
            .ok_or_else(|| {
                Error::parse(&path.display().to_string(), "not a process directory")
            })?;
        let root = resolved
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(super::source::DEFAULT_PROC_ROOT));
        ProcFs::new(root).process(pid)
    }

    /// Gather every field from `source`. `stat` and `status` are required;
    /// `cmdline` and `environ` degrade to empty when we may not read them.
    pub fn from_source(
        source: &dyn ProcSource,
        boot: SystemTime,
        procfs: &ProcFs,
    ) -> Result<Process, Error> {
        let pid = source.pid();
        let stat = parse_stat(&classify(pid, ProcFile::Stat, source.read_stat())?)?;
        if stat.pid != pid {
            return Err(Error::in_file(
                "stat",
                &format!("expected pid {}, found {}", pid, stat.pid),
            ));
        }
        let cred = parse_cred(&classify(pid, ProcFile::Status, source.read_status())?)?;
        let cmdline = parse_cmdline(&read_optional(
            pid,
            ProcFile::Cmdline,
            source.read_cmdline(),
        )?);
        let environ = parse_environ(&read_optional(
            pid,
            ProcFile::Environ,
            source.read_environ(),
        )?);
        // Kernel threads and other users' processes have no readable exe.
        let exe = source.read_exe().ok();
        let start_time = ticks_to_time(boot, stat.starttime);

        Ok(Process {
            stat,
            cred,
            cmdline,
            environ,
            exe,
            start_time,
            procfs: procfs.clone(),
            user: OnceCell::new(),
            group: OnceCell::new(),
        })
    }

    pub fn pid(&self) -> u64 {
        self.stat.pid
    }

    /// Parent pid; 0 for the init process and kernel thread roots.
    pub fn ppid(&self) -> u64 {
        self.stat.ppid
    }

    pub fn pgrp(&self) -> u64 {
        self.stat.pgrp
    }

    pub fn session(&self) -> u64 {
        self.stat.session
    }

    pub fn tty_nr(&self) -> i64 {
        self.stat.tty_nr
    }

    /// Short process name, truncated by the kernel to 15 bytes.
    pub fn comm(&self) -> &str {
        &self.stat.comm
    }

    pub fn state(&self) -> ProcessState {
        self.stat.state
    }

    pub fn num_threads(&self) -> u64 {
        self.stat.num_threads
    }

    pub fn cmdline(&self) -> &[String] {
        &self.cmdline
    }

    pub fn environ(&self) -> &BTreeMap<String, String> {
        &self.environ
    }

    pub fn uids(&self) -> Ids {
        self.cred.uids
    }

    pub fn gids(&self) -> Ids {
        self.cred.gids
    }

    pub fn groups(&self) -> &[u32] {
        &self.cred.groups
    }

    /// Resident set size in bytes.
    pub fn rss(&self) -> u64 {
        self.stat.rss_pages * *PAGE_SIZE
    }

    /// Virtual memory size in bytes.
    pub fn vsize(&self) -> u64 {
        self.stat.vsize
    }

    /// User plus system CPU time consumed so far.
    pub fn cpu_time(&self) -> Duration {
        ticks_to_duration(self.stat.utime + self.stat.stime)
    }

    /// Start time in clock ticks since boot, as the kernel reports it.
    pub fn start_ticks(&self) -> u64 {
        self.stat.starttime
    }

    pub fn start_time(&self) -> SystemTime {
        self.start_time
    }

    /// How long the process has been running.
    pub fn runtime(&self) -> Duration {
        SystemTime::now()
            .duration_since(self.start_time)
            .unwrap_or_default()
    }

    /// Target of `/proc/[pid]/exe`.
    pub fn exe(&self) -> Option<&Path> {
        self.exe.as_deref()
    }

    /// The executable's pathname, falling back to an absolute `argv[0]`
    /// when the exe link is unreadable.
    pub fn exe_path(&self) -> Option<PathBuf> {
        if let Some(exe) = &self.exe {
            return Some(exe.clone());
        }
        let argv0 = Path::new(self.cmdline.first()?);
        (argv0.is_absolute() && argv0.is_file()).then(|| argv0.to_path_buf())
    }

    /// The executable's base name: from [`Process::exe_path`], else from
    /// `argv[0]`, else the comm field.
    pub fn exe_name(&self) -> String {
        if let Some(name) = self
            .exe_path()
            .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        {
            return name;
        }
        self.cmdline
            .first()
            .and_then(|arg| arg.split_whitespace().next())
            .and_then(|arg| Path::new(arg).file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.stat.comm.clone())
    }

    /// Name of the effective user, or the numeric uid when it has none.
    pub fn user(&self) -> &str {
        self.user.get_or_init(|| user_name(self.cred.uids.effective))
    }

    /// Name of the effective group, or the numeric gid when it has none.
    pub fn group(&self) -> &str {
        self.group.get_or_init(|| group_name(self.cred.gids.effective))
    }

    /// Whether this very process is still running: the pid exists, has the
    /// same start time, and is not a zombie. Checked live on every call.
    pub fn is_alive(&self) -> bool {
        if !signal::pid_exists(self.pid()) {
            return false;
        }
        match self
            .procfs
            .live(self.pid())
            .read_stat()
            .ok()
            .and_then(|s| parse_stat(&s).ok())
        {
            Some(now) => now.starttime == self.stat.starttime && now.state != ProcessState::Zombie,
            None => false,
        }
    }

    /// Send `sig` to this process. Returns `Ok(false)` when the process is
    /// already gone (or its pid now belongs to another process).
    pub fn send_signal(&self, sig: Signal) -> Result<bool, Error> {
        if !self.is_alive() {
            return Ok(false);
        }
        signal::send_signal(self.pid(), sig)
    }

    pub fn terminate(&self) -> Result<bool, Error> {
        self.send_signal(Signal::SIGTERM)
    }

    pub fn kill(&self) -> Result<bool, Error> {
        self.send_signal(Signal::SIGKILL)
    }

    pub fn suspend(&self) -> Result<bool, Error> {
        self.send_signal(Signal::SIGSTOP)
    }

    pub fn resume(&self) -> Result<bool, Error> {
        self.send_signal(Signal::SIGCONT)
    }
}

impl PartialEq for Process {
    fn eq(&self, other: &Self) -> bool {
        self.pid() == other.pid() && self.start_ticks() == other.start_ticks()
    }
}

impl Eq for Process {}

impl Hash for Process {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.pid().hash(state);
        self.start_ticks().hash(state);
    }
}

impl PartialOrd for Process {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Process {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.pid(), self.start_ticks()).cmp(&(other.pid(), other.start_ticks()))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io;

    /// In-memory process files. `None` means the file has gone away.
    #[derive(Clone)]
    pub(crate) struct FakeSource {
        pub pid: u64,
        pub stat: Option<String>,
        pub status: Option<String>,
        pub cmdline: Result<Vec<u8>, i32>,
        pub environ: Result<Vec<u8>, i32>,
    }

    fn gone<T>(file: &Option<T>) -> io::Result<T>
    where
        T: Clone,
    {
        file.clone()
            .ok_or_else(|| io::Error::from_raw_os_error(nix::libc::ENOENT))
    }

    impl FakeSource {
        pub(crate) fn new(pid: u64, ppid: u64, comm: &str) -> Self {
            FakeSource {
                pid,
                stat: Some(stat_line(pid, ppid, comm, 500)),
                status: Some(status_text(1000)),
                cmdline: Ok(format!("{}\0--flag\0", comm).into_bytes()),
                environ: Ok(b"HOME=/home/test\0LANG=C\0".to_vec()),
            }
        }
    }

    impl ProcSource for FakeSource {
        fn pid(&self) -> u64 {
            self.pid
        }
        fn read_stat(&self) -> io::Result<String> {
            gone(&self.stat)
        }
        fn read_status(&self) -> io::Result<String> {
            gone(&self.status)
        }
        fn read_cmdline(&self) -> io::Result<Vec<u8>> {
            self.cmdline.clone().map_err(io::Error::from_raw_os_error)
        }
        fn read_environ(&self) -> io::Result<Vec<u8>> {
            self.environ.clone().map_err(io::Error::from_raw_os_error)
        }
        fn read_exe(&self) -> io::Result<PathBuf> {
            Err(io::Error::from_raw_os_error(nix::libc::EACCES))
        }
    }

    pub(crate) fn stat_line(pid: u64, ppid: u64, comm: &str, starttime: u64) -> String {
        format!(
            "{} ({}) S {} {} {} 0 -1 4194304 100 0 0 0 10 5 0 0 20 0 1 0 {} 8192000 300 \
             18446744073709551615 0 0 0 0 0 0 0 0 0 0 0 0 17 1 0 0 0 0 0\n",
            pid, comm, ppid, pid, pid, starttime
        )
    }

    pub(crate) fn status_text(uid: u32) -> String {
        format!(
            "Name:\ttest\nState:\tS (sleeping)\nUid:\t{uid}\t{uid}\t{uid}\t{uid}\n\
             Gid:\t{uid}\t{uid}\t{uid}\t{uid}\nGroups:\t\n",
            uid = uid
        )
    }

    pub(crate) fn fake_process(pid: u64, ppid: u64) -> Process {
        let source = FakeSource::new(pid, ppid, "fake");
        Process::from_source(&source, SystemTime::UNIX_EPOCH, &ProcFs::default()).unwrap()
    }

    #[test]
    fn builds_record_from_source() {
        let source = FakeSource::new(42, 1, "worker");
        let p = Process::from_source(&source, SystemTime::UNIX_EPOCH, &ProcFs::default()).unwrap();
        assert_eq!(p.pid(), 42);
        assert_eq!(p.ppid(), 1);
        assert_eq!(p.comm(), "worker");
        assert_eq!(p.cmdline(), ["worker", "--flag"]);
        assert_eq!(p.environ()["HOME"], "/home/test");
        assert_eq!(p.uids().effective, 1000);
        assert_eq!(p.vsize(), 8192000);
        assert_eq!(p.rss(), 300 * *PAGE_SIZE);
        assert_eq!(p.exe(), None);
        assert_eq!(p.exe_name(), "worker");
        assert_eq!(
            p.start_time(),
            SystemTime::UNIX_EPOCH + ticks_to_duration(500)
        );
    }

    #[test]
    fn empty_cmdline_is_not_an_error() {
        let mut source = FakeSource::new(2, 0, "kthreadd");
        source.cmdline = Ok(Vec::new());
        let p = Process::from_source(&source, SystemTime::UNIX_EPOCH, &ProcFs::default()).unwrap();
        assert!(p.cmdline().is_empty());
        assert_eq!(p.exe_name(), "kthreadd");
    }

    #[test]
    fn unreadable_environ_becomes_empty() {
        let mut source = FakeSource::new(7, 1, "sshd");
        source.environ = Err(nix::libc::EACCES);
        let p = Process::from_source(&source, SystemTime::UNIX_EPOCH, &ProcFs::default()).unwrap();
        assert!(p.environ().is_empty());
    }

    #[test]
    fn cmdline_vanishing_after_stat_is_a_race() {
        let mut source = FakeSource::new(9, 1, "short");
        source.cmdline = Err(nix::libc::ESRCH);
        let lookup: Lookup =
            Process::from_source(&source, SystemTime::UNIX_EPOCH, &ProcFs::default()).into();
        assert!(matches!(lookup, Lookup::Vanished));
    }

    #[test]
    fn missing_stat_is_vanished() {
        let mut source = FakeSource::new(9, 1, "short");
        source.stat = None;
        let err =
            Process::from_source(&source, SystemTime::UNIX_EPOCH, &ProcFs::default()).unwrap_err();
        assert!(err.is_vanished());
    }

    #[test]
    fn malformed_status_is_a_parse_failure() {
        let mut source = FakeSource::new(9, 1, "odd");
        source.status = Some("Name:\todd\n".to_string());
        let lookup: Lookup =
            Process::from_source(&source, SystemTime::UNIX_EPOCH, &ProcFs::default()).into();
        assert!(matches!(lookup, Lookup::ParseFailed(Error::Parse { .. })));
    }

    #[test]
    fn equality_uses_pid_and_start_time() {
        let a = fake_process(10, 1);
        let b = fake_process(10, 1);
        assert_eq!(a, b);

        let mut recycled = FakeSource::new(10, 1, "fake");
        recycled.stat = Some(stat_line(10, 1, "fake", 9000));
        let c = Process::from_source(&recycled, SystemTime::UNIX_EPOCH, &ProcFs::default()).unwrap();
        assert_ne!(a, c);
        assert!(a < c);
        assert!(fake_process(3, 1) < a);
    }

    #[test]
    fn user_name_is_memoized() {
        let mut source = FakeSource::new(11, 1, "fake");
        source.status = Some(status_text(0));
        let p = Process::from_source(&source, SystemTime::UNIX_EPOCH, &ProcFs::default()).unwrap();
        let first = p.user() as *const str;
        assert_eq!(p.user(), "root");
        assert_eq!(first, p.user() as *const str);
    }

    #[test]
    fn unknown_uid_falls_back_to_number() {
        let mut source = FakeSource::new(12, 1, "fake");
        source.status = Some(status_text(3_999_999_999));
        let p = Process::from_source(&source, SystemTime::UNIX_EPOCH, &ProcFs::default()).unwrap();
        assert_eq!(p.user(), "3999999999");
    }

    #[test]
    fn process_from_fixture_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("uptime"), "1000.0 10.0\n").unwrap();
        let pdir = dir.path().join("77");
        std::fs::create_dir(&pdir).unwrap();
        std::fs::write(pdir.join("stat"), stat_line(77, 1, "fixture", 100)).unwrap();
        std::fs::write(pdir.join("status"), status_text(1000)).unwrap();
        std::fs::write(pdir.join("cmdline"), b"").unwrap();
        std::fs::write(pdir.join("environ"), b"A=1\0").unwrap();

        let procfs = ProcFs::new(dir.path());
        let p = procfs.process(77).unwrap();
        assert_eq!(p.pid(), 77);
        assert!(p.cmdline().is_empty());
        assert_eq!(p.environ()["A"], "1");

        assert!(matches!(procfs.lookup(78), Lookup::Vanished));
    }
}
