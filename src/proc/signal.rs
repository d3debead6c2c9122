//! Signal delivery and liveness checks.

use std::str::FromStr;
use std::thread;
use std::time::{Duration, Instant};

use nix::errno::Errno;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use tracing::{debug, info};

use super::error::Error;
use super::process::Process;
use super::source::{ProcFs, ProcSource};
use super::stat::{parse_stat, ProcessState};

fn to_pid(pid: u64) -> Option<Pid> {
    i32::try_from(pid).ok().filter(|p| *p > 0).map(Pid::from_raw)
}

/// Whether any process, zombies included, holds this pid.
///
/// Signal 0 performs the permission and existence checks without sending
/// anything: `EPERM` means the process exists but belongs to someone else.
pub fn pid_exists(pid: u64) -> bool {
    let Some(nix_pid) = to_pid(pid) else {
        return false;
    };
    match signal::kill(nix_pid, None) {
        Ok(()) => true,
        Err(Errno::EPERM) => true,
        Err(_) => false,
    }
}

/// Whether the process with this pid has not yet terminated.
///
/// A zombie is dead: it has exited and only waits for its parent to
/// collect the exit status.
pub fn is_alive(pid: u64) -> bool {
    if !pid_exists(pid) {
        return false;
    }
    match ProcFs::default()
        .live(pid)
        .read_stat()
        .ok()
        .and_then(|s| parse_stat(&s).ok())
    {
        Some(stat) => stat.state != ProcessState::Zombie,
        None => false,
    }
}

/// Deliver `sig` to `pid`.
///
/// Returns `Ok(true)` when delivered and `Ok(false)` when the process no
/// longer exists, which callers usually want anyway.
pub fn send_signal(pid: u64, sig: Signal) -> Result<bool, Error> {
    let nix_pid = to_pid(pid).ok_or(Error::Signal {
        pid,
        signal: sig.to_string(),
        source: Errno::EINVAL,
    })?;
    match signal::kill(nix_pid, sig) {
        Ok(()) => {
            debug!("sent {} to {}", sig, pid);
            Ok(true)
        }
        Err(Errno::ESRCH) => {
            debug!("{} already gone, not sending {}", pid, sig);
            Ok(false)
        }
        Err(e) => Err(Error::signal(pid, Some(sig), e)),
    }
}

/// Parse a signal given as a name (`TERM`, `SIGTERM`, `term`) or a number.
pub fn parse_signal(s: &str) -> Result<Signal, Error> {
    let s = s.trim();
    if let Ok(num) = s.parse::<i32>() {
        return Signal::try_from(num)
            .map_err(|_| Error::parse("signal", &format!("unknown signal number {}", num)));
    }
    let upper = s.to_ascii_uppercase();
    let name = if upper.starts_with("SIG") {
        upper
    } else {
        format!("SIG{}", upper)
    };
    Signal::from_str(&name).map_err(|_| Error::parse("signal", &format!("unknown signal '{}'", s)))
}

/// How long and how often to poll in the wait helpers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOptions {
    /// `None` waits until the processes are gone, however long that takes.
    pub timeout: Option<Duration>,
    /// First sleep between polls; doubled after each poll.
    pub initial_interval: Duration,
    pub max_interval: Duration,
}

impl Default for WaitOptions {
    fn default() -> Self {
        WaitOptions {
            timeout: Some(Duration::from_secs(60)),
            initial_interval: Duration::from_millis(10),
            max_interval: Duration::from_millis(100),
        }
    }
}

impl WaitOptions {
    pub fn with_timeout(timeout: Duration) -> Self {
        WaitOptions {
            timeout: Some(timeout),
            ..Default::default()
        }
    }

    /// Wait without a deadline.
    pub fn forever() -> Self {
        WaitOptions {
            timeout: None,
            ..Default::default()
        }
    }
}

/// Poll until `running` returns an empty list, or the deadline passes.
fn wait_while<F>(opts: &WaitOptions, mut running: F) -> Result<(), Error>
where
    F: FnMut() -> Vec<u64>,
{
    let start = Instant::now();
    let mut backoff = opts.initial_interval.max(Duration::from_millis(1));
    loop {
        let pids = running();
        if pids.is_empty() {
            return Ok(());
        }
        let mut sleep = backoff;
        if let Some(timeout) = opts.timeout {
            let waited = start.elapsed();
            if waited >= timeout {
                return Err(Error::Timeout { pids, waited });
            }
            sleep = sleep.min(timeout - waited);
        }
        thread::sleep(sleep);
        backoff = backoff.saturating_mul(2).min(opts.max_interval.max(backoff));
    }
}

/// Block until [`is_alive`] turns false for `pid` or the timeout expires.
pub fn wait_until_terminated(pid: u64, opts: &WaitOptions) -> Result<(), Error> {
    wait_while(opts, || {
        if is_alive(pid) {
            vec![pid]
        } else {
            Vec::new()
        }
    })
}

/// Block until every process in `processes` has terminated.
///
/// Liveness is checked per record, so a recycled pid is not mistaken for
/// the process we were waiting for.
pub fn wait_for_processes(processes: &[Process], opts: &WaitOptions) -> Result<(), Error> {
    wait_for_each(processes, opts, |_| {})
}

/// Like [`wait_for_processes`], calling `on_exit` once for each process as
/// it is seen to have terminated.
pub fn wait_for_each<F>(processes: &[Process], opts: &WaitOptions, mut on_exit: F) -> Result<(), Error>
where
    F: FnMut(&Process),
{
    let mut remaining: Vec<&Process> = processes.iter().collect();
    wait_while(opts, || {
        remaining.retain(|p| {
            let alive = p.is_alive();
            if !alive {
                on_exit(p);
            }
            alive
        });
        remaining.iter().map(|p| p.pid()).collect()
    })
}

/// How [`terminate_gracefully`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// There was no such process to begin with.
    AlreadyGone,
    /// The process exited within the grace period after SIGTERM.
    Terminated,
    /// The process ignored SIGTERM and was killed with SIGKILL.
    Killed,
}

/// Send SIGTERM, give the process `grace` to exit, then SIGKILL it.
pub fn terminate_gracefully(pid: u64, grace: Duration) -> Result<Termination, Error> {
    if !send_signal(pid, Signal::SIGTERM)? {
        return Ok(Termination::AlreadyGone);
    }
    match wait_until_terminated(pid, &WaitOptions::with_timeout(grace)) {
        Ok(()) => return Ok(Termination::Terminated),
        Err(Error::Timeout { .. }) => {
            info!("{} did not exit within {:?}, sending SIGKILL", pid, grace);
        }
        Err(e) => return Err(e),
    }
    if !send_signal(pid, Signal::SIGKILL)? {
        return Ok(Termination::Terminated);
    }
    wait_until_terminated(pid, &WaitOptions::with_timeout(grace.max(Duration::from_secs(1))))?;
    Ok(Termination::Killed)
}
