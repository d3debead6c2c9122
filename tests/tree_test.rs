mod common;

use std::collections::HashSet;
use std::time::Duration;

use common::spawn_shell_with_sleeper;
use nix::sys::signal::Signal;
use proctree::{find_all_processes, get_process_tree, ProcessTree, Query};

#[test]
fn tree_of_live_system() {
    let tree = get_process_tree(None).unwrap();
    let me = std::process::id() as u64;

    let node = tree.get(me).expect("own process in tree");
    let ancestors: Vec<u64> = node.ancestors().map(|n| n.pid()).collect();
    assert_eq!(
        ancestors.first().copied(),
        Some(nix::unistd::getppid().as_raw() as u64)
    );

    // Every pid appears exactly once across the forest.
    let mut seen = HashSet::new();
    for n in tree.iter() {
        assert!(seen.insert(n.pid()));
    }
    assert_eq!(seen.len(), tree.len());
}

#[test]
fn tree_from_given_records() {
    let all = find_all_processes().unwrap();
    let tree = get_process_tree(Some(all.clone())).unwrap();
    assert_eq!(tree, ProcessTree::build(all));
}

#[test]
fn shell_child_and_grandchild() {
    let (mut shell, sleeper) = spawn_shell_with_sleeper();
    let shell_pid = shell.id() as u64;
    let me = std::process::id() as u64;

    let tree = get_process_tree(None).unwrap();
    let me_node = tree.get(me).unwrap();
    let descendants: Vec<u64> = me_node.descendants().map(|n| n.pid()).collect();
    assert!(descendants.contains(&shell_pid));
    assert!(descendants.contains(&sleeper));
    assert!(me_node.grandchildren().any(|n| n.pid() == sleeper));
    assert_eq!(me_node.find(sleeper).map(|n| n.pid()), Some(sleeper));
    assert_eq!(
        tree.find(&Query::new().ppid(shell_pid)).map(|n| n.pid()),
        Some(sleeper)
    );

    let shell_node = tree.get(shell_pid).unwrap();
    assert!(shell_node.is_alive_subtree());
    let report = shell_node.kill_subtree(Signal::SIGKILL);
    assert!(report.is_success(), "{:?}", report);
    // Children first.
    assert_eq!(report.signaled, vec![sleeper, shell_pid]);

    shell.wait().unwrap();
    let sleeper_node = tree.get(sleeper).unwrap();
    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    while sleeper_node.is_alive_subtree() {
        assert!(std::time::Instant::now() < deadline, "sleep survived SIGKILL");
        std::thread::sleep(Duration::from_millis(10));
    }
    assert!(!shell_node.is_alive_subtree());
}

#[test]
fn kill_subtree_skips_gone_processes() {
    let (mut shell, _) = spawn_shell_with_sleeper();
    let shell_pid = shell.id() as u64;
    let tree = get_process_tree(None).unwrap();

    shell.kill().unwrap();
    shell.wait().unwrap();

    let report = tree.get(shell_pid).unwrap().kill_subtree(Signal::SIGKILL);
    assert!(report.is_success());
    assert!(report.vanished.contains(&shell_pid));
}
