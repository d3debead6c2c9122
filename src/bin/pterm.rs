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
use std::process::exit;

use clap::Parser;
use nix::sys::signal::Signal;
use proctree::cli::{seconds, PtermCli};
use proctree::display::cmd_summary;
use proctree::{
    get_process_tree, parse_signal, wait_for_processes, Error, Node, Process, WaitOptions,
};

/// The subtree below `node`, children before their parents.
fn kill_order<'t>(node: Node<'t>) -> Vec<Node<'t>> {
    let mut order: Vec<Node<'t>> = std::iter::once(node).chain(node.descendants()).collect();
    order.reverse();
    order
}

fn main() {
    proctree::reset_sigpipe();
    let args = PtermCli::parse();
    proctree::init_logging(args.verbose);

    let sig = match parse_signal(&args.signal) {
        Ok(sig) => sig,
        Err(e) => {
            eprintln!("pterm: {}", e);
            exit(2);
        }
    };
    let grace = match args.grace.map(seconds) {
        None => None,
        Some(Some(grace)) => Some(grace),
        Some(None) => {
            eprintln!("pterm: invalid grace period");
            exit(2);
        }
    };

    let tree = match get_process_tree(None) {
        Ok(tree) => tree,
        Err(e) => {
            eprintln!("Error reading process table: {}", e);
            exit(1);
        }
    };

    let me = std::process::id() as u64;
    let mut failed = false;
    let mut targets: Vec<Node> = Vec::new();

    for pid in &args.pid {
        let Some(node) = tree.get(*pid) else {
            eprintln!("pterm: no such process: {}", pid);
            failed = true;
            continue;
        };
        if *pid == me || node.find(me).is_some() {
            eprintln!("pterm: refusing to signal {}: pterm is part of its tree", pid);
            failed = true;
            continue;
        }
        if !targets.iter().any(|t| t.pid() == *pid) {
            targets.push(node);
        }
    }

    // A target inside another target's subtree is signaled with that subtree.
    let requested: HashSet<u64> = targets.iter().map(Node::pid).collect();
    targets.retain(|t| !t.ancestors().any(|a| requested.contains(&a.pid())));

    let mut signaled: Vec<Process> = Vec::new();
    for node in targets {
        if args.dry_run {
            for n in kill_order(node) {
                println!("{}  {}", n.pid(), cmd_summary(n.process()));
            }
            continue;
        }

        let report = node.kill_subtree(sig);
        for signaled_pid in &report.signaled {
            if args.verbose {
                println!("{}: sent {}", signaled_pid, sig);
            }
            if let Some(n) = tree.get(*signaled_pid) {
                signaled.push(n.process().clone());
            }
        }
        for (failed_pid, e) in &report.failed {
            eprintln!("pterm: {}: {}", failed_pid, e);
            failed = true;
        }
    }

    if let Some(grace) = grace {
        if sig != Signal::SIGKILL && !signaled.is_empty() {
            match wait_for_processes(&signaled, &WaitOptions::with_timeout(grace)) {
                Ok(()) => {}
                Err(Error::Timeout { pids, .. }) => {
                    for p in signaled.iter().filter(|p| pids.contains(&p.pid())) {
                        match p.kill() {
                            Ok(true) => {
                                if args.verbose {
                                    println!("{}: sent {}", p.pid(), Signal::SIGKILL);
                                }
                            }
                            Ok(false) => {}
                            Err(e) => {
                                eprintln!("pterm: {}: {}", p.pid(), e);
                                failed = true;
                            }
                        }
                    }
                }
                Err(e) => {
                    eprintln!("pterm: {}", e);
                    failed = true;
                }
            }
        }
    }

    if failed {
        exit(1);
    }
}
