//
//   Copyright 2026 Basil Crow
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

use std::collections::HashSet;
use std::process;

use clap::Parser;
use proctree::cli::{seconds, PwaitCli};
use proctree::{wait_for_each, Error, Lookup, Process, WaitOptions};

fn main() {
    proctree::reset_sigpipe();
    let args = PwaitCli::parse();
    proctree::init_logging(false);
    let mut failed = false;

    let opts = match args.timeout {
        Some(secs) => match seconds(secs) {
            Some(timeout) => WaitOptions::with_timeout(timeout),
            None => {
                eprintln!("pwait: invalid timeout '{}'", secs);
                process::exit(2);
            }
        },
        None => WaitOptions::forever(),
    };

    // Deduplicate PIDs while preserving order.
    let mut seen = HashSet::new();
    let pids: Vec<u64> = args.pid.into_iter().filter(|p| seen.insert(*p)).collect();

    let mut targets: Vec<Process> = Vec::with_capacity(pids.len());
    for pid in pids {
        match Process::lookup(pid) {
            Lookup::Found(p) if p.is_alive() => targets.push(p),
            Lookup::Found(_) | Lookup::Vanished => {
                eprintln!("pwait: no such process: {}", pid);
                failed = true;
            }
            Lookup::PermissionDenied => {
                eprintln!("pwait: permission denied reading process {}", pid);
                failed = true;
            }
            Lookup::ParseFailed(e) => {
                eprintln!("pwait: cannot read process {}: {}", pid, e);
                failed = true;
            }
        }
    }

    let result = wait_for_each(&targets, &opts, |p| {
        if args.verbose {
            println!("{}: terminated", p.pid());
        }
    });

    match result {
        Ok(()) => {}
        Err(Error::Timeout { pids, waited }) => {
            let pids: Vec<String> = pids.iter().map(u64::to_string).collect();
            eprintln!(
                "pwait: still running after {:.1}s: {}",
                waited.as_secs_f64(),
                pids.join(" ")
            );
            process::exit(1);
        }
        Err(e) => {
            eprintln!("pwait: {}", e);
            process::exit(1);
        }
    }

    if failed {
        process::exit(1);
    }
}
