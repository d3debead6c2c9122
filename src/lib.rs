//
//   Copyright 2018 Delphix
//
//   Licensed under the Apache License, Version 2.0 (the "License");
//   you may not use this file except in compliance with the License.
//   You may obtain a copy of the License at
//
//       http://www.apache.org/licenses/LICENSE-2.0
//
//   Unless required by applicable law or agreed to in writing, software
//   distributed under the License is distributed on an "AS IS" BASIS,
//   WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//   See the License for the specific language governing permissions and
//   limitations under the License.
//

//! Snapshots of Linux processes read from `/proc`, the trees they form, and
//! helpers for signalling and waiting on them.
//!
//! Processes start and exit while we read them. Every read is allowed to
//! find its process gone: single lookups report it as [`Lookup::Vanished`],
//! enumeration silently drops it, and signalling a process that no longer
//! exists is not an error.

// Error handling philosophy: these tools are run on systems in unusual and
// bad states. When what we read in /proc doesn't match our expectations we
// skip that record and keep going; we only give up when /proc itself can't be
// listed. Internal invariants may still be asserted.

pub mod cli;
pub mod display;
pub mod proc;
pub mod tree;

pub use proc::{
    find_all_processes, find_environment_variables, find_processes, is_alive, parse_signal,
    pid_exists, race_conditions, send_signal, terminate_gracefully, wait_for_each,
    wait_for_processes, wait_until_terminated, Error, Lookup, ProcFile, ProcFs, Process,
    ProcessFilter, ProcessState, Query, RaceStats, Termination, WaitOptions,
};
pub use tree::{get_process_tree, KillReport, Node, ProcessTree};

use nix::sys::signal::{signal, SigHandler, Signal};
use tracing_subscriber::EnvFilter;

/// Restore the default SIGPIPE action, so writing to a closed pipe (e.g.
/// `ptree | head`) terminates quietly instead of panicking in `println!`.
pub fn reset_sigpipe() {
    // SAFETY: SIG_DFL installs no handler code of ours.
    let _ = unsafe { signal(Signal::SIGPIPE, SigHandler::SigDfl) };
}

/// Send log output to stderr. `RUST_LOG` takes precedence; otherwise only
/// warnings are shown, or everything down to debug when `verbose` is set.
pub fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .try_init();
}
