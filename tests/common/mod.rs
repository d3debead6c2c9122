//
//   Copyright 2018, 2019 Delphix
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

#![allow(dead_code)]

use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use proctree::proc::proc_state;
use proctree::{get_process_tree, ProcessState};

// Find an executable produced by the Cargo build
pub fn find_exec(name: &str) -> PathBuf {
    // Find the path where Cargo has placed the executables by looking at this test process's
    // executable, which was also built by Cargo.
    let this_exec = std::env::current_exe().unwrap();
    let exec_dir = this_exec.parent().unwrap().parent().unwrap();

    exec_dir.join(name)
}

/// A `sleep` child of the test process.
pub fn spawn_sleeper(secs: u32) -> Child {
    Command::new("sleep")
        .arg(secs.to_string())
        .stdin(Stdio::null())
        .spawn()
        .expect("failed to spawn sleep")
}

/// A shell child with one `sleep` child of its own, returned once the
/// grandchild shows up in /proc. Returns the shell and the sleep's pid.
pub fn spawn_shell_with_sleeper() -> (Child, u64) {
    let mut shell = Command::new("sh")
        .args(["-c", "sleep 60 & wait"])
        .stdin(Stdio::null())
        .spawn()
        .expect("failed to spawn sh");
    let shell_pid = shell.id() as u64;
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let tree = get_process_tree(None).unwrap();
        let grandchild = tree
            .get(shell_pid)
            .and_then(|node| node.children().find(|c| c.process().comm() == "sleep"));
        if let Some(grandchild) = grandchild {
            return (shell, grandchild.pid());
        }
        if let Some(status) = shell.try_wait().unwrap() {
            panic!("sh exited too soon with status {}", status);
        }
        if Instant::now() >= deadline {
            let _ = shell.kill();
            panic!("sleep child of sh {} never appeared", shell_pid);
        }
        thread::sleep(Duration::from_millis(10));
    }
}

/// Wait (with timeout) until the process reaches one of the expected states.
pub fn wait_for_state(pid: u64, expected: &[ProcessState], timeout: Duration) -> ProcessState {
    let deadline = Instant::now() + timeout;
    loop {
        if let Ok(state) = proc_state(pid) {
            if expected.contains(&state) {
                return state;
            }
        }
        if Instant::now() >= deadline {
            panic!(
                "Timed out waiting for pid {} to reach state {:?} (current: {:?})",
                pid,
                expected,
                proc_state(pid).ok()
            );
        }
        thread::sleep(Duration::from_millis(10));
    }
}
