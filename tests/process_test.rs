mod common;

use std::process::{Command, Stdio};
use std::time::Duration;

use common::{spawn_sleeper, wait_for_state};
use proctree::{
    find_all_processes, find_environment_variables, find_processes, Lookup, ProcFs, Process,
    ProcessState, Query,
};

#[test]
fn self_from_path_matches_our_ids() {
    let me = Process::from_path("/proc/self").unwrap();
    assert_eq!(me.pid(), std::process::id() as u64);
    assert_eq!(me.ppid(), nix::unistd::getppid().as_raw() as u64);
    assert_eq!(me.uids().effective, nix::unistd::geteuid().as_raw());
    assert!(!me.cmdline().is_empty());
    assert!(me.environ().contains_key("PATH") || std::env::var_os("PATH").is_none());
    assert!(me.is_alive());
}

#[test]
fn from_path_and_from_pid_agree() {
    let by_path = Process::from_path("/proc/self").unwrap();
    let by_pid = Process::from_pid(std::process::id() as u64).unwrap();
    assert_eq!(by_path, by_pid);
    assert_eq!(by_path.start_ticks(), by_pid.start_ticks());
}

#[test]
fn enumeration_includes_init_and_self() {
    let me = std::process::id() as u64;
    let all = find_all_processes().unwrap();
    assert!(all.iter().any(|p| p.pid() == 1));
    assert!(all.iter().any(|p| p.pid() == me));
    // In pid order, without duplicates.
    assert!(all.windows(2).all(|w| w[0].pid() < w[1].pid()));

    let found = find_processes(&Query::new().pid(me)).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].pid(), me);
}

#[test]
fn lookup_of_missing_pid_is_vanished() {
    // Above the kernel's pid_max ceiling, so never in use.
    assert!(matches!(Process::lookup(4_194_305), Lookup::Vanished));
    assert!(Process::from_pid(4_194_305).unwrap_err().is_vanished());
}

#[test]
fn child_details() {
    let mut child = spawn_sleeper(60);
    let pid = child.id() as u64;
    let p = Process::from_pid(pid).unwrap();

    assert_eq!(p.ppid(), std::process::id() as u64);
    assert_eq!(p.cmdline(), ["sleep", "60"]);
    assert_eq!(p.comm(), "sleep");
    assert!(p.start_time() <= std::time::SystemTime::now());
    assert!(p.runtime() < Duration::from_secs(60));
    assert!(p.rss() > 0);

    child.kill().unwrap();
    child.wait().unwrap();
    assert!(!p.is_alive());
}

#[test]
fn environment_of_a_child_is_searchable() {
    let mut child = Command::new("sleep")
        .arg("60")
        .env("PROCTREE_TEST_MARKER", "needle")
        .stdin(Stdio::null())
        .spawn()
        .unwrap();
    let pid = child.id() as u64;

    let processes = find_processes(&Query::new().pid(pid)).unwrap();
    let found =
        find_environment_variables(&processes, &["PROCTREE_TEST_MARKER", "NOT_SET_ANYWHERE"]);

    child.kill().unwrap();
    child.wait().unwrap();

    assert_eq!(
        found.get("PROCTREE_TEST_MARKER").map(String::as_str),
        Some("needle")
    );
    assert!(!found.contains_key("NOT_SET_ANYWHERE"));
}

#[test]
fn zombie_has_empty_cmdline() {
    let mut child = Command::new("true").stdin(Stdio::null()).spawn().unwrap();
    let pid = child.id() as u64;
    // Exited but not yet reaped.
    wait_for_state(pid, &[ProcessState::Zombie], Duration::from_secs(5));

    let p = Process::from_pid(pid).unwrap();
    assert_eq!(p.state(), ProcessState::Zombie);
    assert!(p.cmdline().is_empty());
    assert_eq!(p.exe_name(), "true");
    assert!(!p.is_alive());
    assert!(proctree::pid_exists(pid));
    assert!(!proctree::is_alive(pid));

    child.wait().unwrap();
}

#[test]
fn enumeration_survives_churn() {
    let procfs = ProcFs::default();
    let spawner = std::thread::spawn(|| {
        for _ in 0..50 {
            if let Ok(mut c) = Command::new("true").stdin(Stdio::null()).spawn() {
                let _ = c.wait();
            }
        }
    });
    for _ in 0..20 {
        let all = procfs.all_processes().unwrap();
        assert!(!all.is_empty());
    }
    spawner.join().unwrap();
}
