pub mod args;
pub mod cred;
pub mod error;
pub mod filter;
pub mod process;
pub mod scan;
pub mod signal;
pub mod source;
pub mod stat;
pub mod system;

pub use cred::{Ids, ProcCred};
pub use error::Error;
pub use filter::{ProcessFilter, Query};
pub use process::{Lookup, Process};
pub use scan::{find_all_processes, find_environment_variables, find_processes};
pub use signal::{
    is_alive, parse_signal, pid_exists, send_signal, terminate_gracefully, wait_for_each,
    wait_for_processes, wait_until_terminated, Termination, WaitOptions,
};
pub use source::{race_conditions, ProcFile, ProcFs, ProcSource, RaceStats};
pub use stat::ProcessState;

/// Read the process state from /proc/[pid]/stat.
pub fn proc_state(pid: u64) -> Result<ProcessState, Error> {
    let live = ProcFs::default().live(pid);
    let stat = source::classify(pid, ProcFile::Stat, live.read_stat())?;
    Ok(stat::parse_stat(&stat)?.state)
}
