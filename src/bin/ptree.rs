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

use std::collections::HashSet;
use std::io::{self, Write};
use std::process::exit;

use clap::Parser;
use proctree::cli::PtreeCli;
use proctree::display::{graph_chars, TreePrinter};
use proctree::proc::cred::lookup_uid_by_username;
use proctree::{get_process_tree, ProcessFilter, ProcessTree, Query};

fn pids_for_user(tree: &ProcessTree, username: &str) -> Result<Vec<u64>, String> {
    let uid = lookup_uid_by_username(username)
        .ok_or_else(|| format!("No such user '{}'", username))?;
    let query = Query::new().uid(uid);
    Ok(tree
        .processes()
        .filter(|p| query.matches(p))
        .map(|p| p.pid())
        .collect())
}

fn print_tree<W: Write>(
    out: &mut W,
    tree: &ProcessTree,
    printer: &TreePrinter,
    pid: u64,
    ancestors: bool,
) -> bool {
    let Some(node) = tree.get(pid) else {
        eprintln!("No such pid {}", pid);
        return false;
    };
    match printer.write_tree(out, node, ancestors) {
        Ok(()) => true,
        Err(e) => {
            eprintln!("ptree: {}", e);
            false
        }
    }
}

fn main() {
    proctree::reset_sigpipe();
    let args = PtreeCli::parse();
    proctree::init_logging(args.verbose);

    let tree = match get_process_tree(None) {
        Ok(tree) => tree,
        Err(e) => {
            eprintln!("Error reading process table: {}", e);
            exit(1);
        }
    };

    let printer = TreePrinter::new(args.graph.then(graph_chars));
    let stdout = io::stdout();
    let mut out = stdout.lock();

    let mut error = false;
    if !args.target.is_empty() {
        let mut printed = HashSet::new();
        for target in &args.target {
            let pids = if let Ok(pid) = target.parse::<u64>() {
                if pid == 0 {
                    eprintln!("PID must be > 0: {}", pid);
                    error = true;
                    continue;
                }
                vec![pid]
            } else {
                match pids_for_user(&tree, target) {
                    Ok(pids) => pids,
                    Err(e) => {
                        eprintln!("{}", e);
                        error = true;
                        continue;
                    }
                }
            };
            for pid in pids {
                if printed.insert(pid) && !print_tree(&mut out, &tree, &printer, pid, true) {
                    error = true;
                }
            }
        }
    } else if args.all || tree.get(1).is_none() {
        for root in tree.roots() {
            if !print_tree(&mut out, &tree, &printer, root.pid(), false) {
                error = true;
            }
        }
    } else if !print_tree(&mut out, &tree, &printer, 1, false) {
        error = true;
    }

    if error {
        exit(1);
    }
}
