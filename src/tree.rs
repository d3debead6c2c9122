//! Parent/child relationships between process records.
//!
//! The tree is an overlay over a captured collection of [`Process`] records:
//! all records live in one arena and nodes refer to each other by index, so
//! children are owned by the tree rather than by their parent process and
//! parent links cannot form ownership cycles. A tree is never updated; build
//! a new one from a new enumeration to observe changes.

use std::collections::HashMap;
use std::fmt;

use nix::sys::signal::Signal;
use tracing::{debug, warn};

use crate::proc::{find_all_processes, Error, Process, ProcessFilter};

#[derive(Debug, Clone, PartialEq, Eq)]
struct Slot {
    process: Process,
    parent: Option<usize>,
    children: Vec<usize>,
}

/// A forest of processes linked by parent pid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessTree {
    nodes: Vec<Slot>,
    index: HashMap<u64, usize>,
    roots: Vec<usize>,
}

/// Build a tree from `processes`, or from a fresh enumeration of `/proc`.
pub fn get_process_tree(processes: Option<Vec<Process>>) -> Result<ProcessTree, Error> {
    let processes = match processes {
        Some(processes) => processes,
        None => find_all_processes()?,
    };
    Ok(ProcessTree::build(processes))
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    OnPath,
    Done,
}

/// Cut parent links that would make a node its own ancestor.
///
/// Kernel parentage cannot loop, but the records were read at different
/// instants and may come from a corrupt or synthetic source. Each walk
/// follows parent links upwards; reaching a node already on the current
/// path means the last link taken closes a cycle, and that node becomes a
/// root.
fn break_cycles(nodes: &mut [Slot]) {
    let mut marks = vec![Mark::Unvisited; nodes.len()];
    let mut path = Vec::new();
    for start in 0..nodes.len() {
        let mut cur = start;
        loop {
            match marks[cur] {
                Mark::Done => break,
                Mark::OnPath => {
                    // path is non-empty: cur was pushed onto it earlier.
                    if let Some(&last) = path.last() {
                        let slot: &mut Slot = &mut nodes[last];
                        warn!(
                            "parent links of pid {} form a cycle; treating it as a root",
                            slot.process.pid()
                        );
                        slot.parent = None;
                    }
                    break;
                }
                Mark::Unvisited => {
                    marks[cur] = Mark::OnPath;
                    path.push(cur);
                    match nodes[cur].parent {
                        Some(parent) => cur = parent,
                        None => break,
                    }
                }
            }
        }
        for idx in path.drain(..) {
            marks[idx] = Mark::Done;
        }
    }
}

impl ProcessTree {
    /// Link `processes` by parent pid.
    ///
    /// A process becomes a root when its parent is missing from the
    /// collection (it exited, or was never captured), when it names itself
    /// as parent, or when its parent link would close a cycle. Roots and
    /// each node's children are ordered by pid, so building twice from the
    /// same records gives equal trees.
    pub fn build(processes: impl IntoIterator<Item = Process>) -> ProcessTree {
        let mut processes: Vec<Process> = processes.into_iter().collect();
        processes.sort();

        let mut nodes: Vec<Slot> = Vec::with_capacity(processes.len());
        let mut index = HashMap::with_capacity(processes.len());
        for process in processes {
            let pid = process.pid();
            if index.contains_key(&pid) {
                warn!("ignoring duplicate record for pid {}", pid);
                continue;
            }
            index.insert(pid, nodes.len());
            nodes.push(Slot {
                process,
                parent: None,
                children: Vec::new(),
            });
        }

        for slot in nodes.iter_mut() {
            let (pid, ppid) = (slot.process.pid(), slot.process.ppid());
            if ppid != pid {
                slot.parent = index.get(&ppid).copied();
            }
        }
        break_cycles(&mut nodes);

        let mut roots = Vec::new();
        for idx in 0..nodes.len() {
            match nodes[idx].parent {
                Some(parent) => nodes[parent].children.push(idx),
                None => roots.push(idx),
            }
        }
        debug!(
            "built process tree: {} processes, {} roots",
            nodes.len(),
            roots.len()
        );

        ProcessTree {
            nodes,
            index,
            roots,
        }
    }

    fn node(&self, idx: usize) -> Node<'_> {
        Node { tree: self, idx }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Processes without a parent in the tree, in pid order.
    pub fn roots(&self) -> impl ExactSizeIterator<Item = Node<'_>> + '_ {
        self.roots.iter().map(move |&idx| self.node(idx))
    }

    pub fn get(&self, pid: u64) -> Option<Node<'_>> {
        self.index.get(&pid).map(|&idx| self.node(idx))
    }

    /// Every node, depth first from each root in turn.
    pub fn iter(&self) -> impl Iterator<Item = Node<'_>> + '_ {
        self.roots()
            .flat_map(|root| std::iter::once(root).chain(root.descendants()))
    }

    /// The first node, in [`ProcessTree::iter`] order, matching `filter`.
    pub fn find<F>(&self, filter: &F) -> Option<Node<'_>>
    where
        F: ProcessFilter + ?Sized,
    {
        self.iter().find(|node| filter.matches(node.process()))
    }

    /// All records, in pid order.
    pub fn processes(&self) -> impl Iterator<Item = &Process> + '_ {
        self.nodes.iter().map(|slot| &slot.process)
    }
}

/// A position in a [`ProcessTree`].
#[derive(Clone, Copy)]
pub struct Node<'t> {
    tree: &'t ProcessTree,
    idx: usize,
}

impl fmt::Debug for Node<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("pid", &self.pid())
            .field("comm", &self.process().comm())
            .finish()
    }
}

impl PartialEq for Node<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.tree, other.tree) && self.idx == other.idx
    }
}

impl Eq for Node<'_> {}

impl<'t> Node<'t> {
    fn slot(&self) -> &'t Slot {
        &self.tree.nodes[self.idx]
    }

    pub fn process(&self) -> &'t Process {
        &self.slot().process
    }

    pub fn pid(&self) -> u64 {
        self.process().pid()
    }

    pub fn is_root(&self) -> bool {
        self.slot().parent.is_none()
    }

    pub fn parent(&self) -> Option<Node<'t>> {
        self.slot().parent.map(|idx| self.tree.node(idx))
    }

    /// Direct children, in pid order.
    pub fn children(&self) -> impl ExactSizeIterator<Item = Node<'t>> + 't {
        let tree = self.tree;
        self.slot().children.iter().map(move |&idx| tree.node(idx))
    }

    pub fn grandchildren(&self) -> impl Iterator<Item = Node<'t>> + 't {
        self.children().flat_map(|child| child.children())
    }

    /// Other children of this node's parent. Roots have no siblings.
    pub fn siblings(&self) -> impl Iterator<Item = Node<'t>> + 't {
        let me = self.idx;
        self.parent()
            .into_iter()
            .flat_map(|parent| parent.children())
            .filter(move |node| node.idx != me)
    }

    /// Number of ancestors.
    pub fn depth(&self) -> usize {
        self.ancestors().count()
    }

    /// From the immediate parent up to the root.
    pub fn ancestors(&self) -> Ancestors<'t> {
        Ancestors {
            tree: self.tree,
            next: self.slot().parent,
        }
    }

    /// All nodes below this one, depth first, parents before children.
    pub fn descendants(&self) -> Descendants<'t> {
        Descendants {
            tree: self.tree,
            stack: self.slot().children.iter().rev().copied().collect(),
        }
    }

    /// The descendant with this pid.
    pub fn find(&self, pid: u64) -> Option<Node<'t>> {
        let found = self.tree.get(pid)?;
        found.ancestors().any(|a| a.idx == self.idx).then_some(found)
    }

    /// Whether this node's process still exists. Checked live on every call.
    pub fn is_alive_subtree(&self) -> bool {
        self.process().is_alive()
    }

    /// Send `sig` to every process in this subtree, children before their
    /// parent, so a parent dying first cannot orphan still-running children
    /// to init before we reach them.
    ///
    /// Processes that are already gone are skipped. Failures are collected
    /// per pid instead of stopping the walk.
    pub fn kill_subtree(&self, sig: Signal) -> KillReport {
        let mut order: Vec<Node<'t>> = std::iter::once(*self).chain(self.descendants()).collect();
        order.reverse();

        let mut report = KillReport::default();
        for node in order {
            let pid = node.pid();
            match node.process().send_signal(sig) {
                Ok(true) => report.signaled.push(pid),
                Ok(false) => report.vanished.push(pid),
                Err(e) => {
                    debug!("failed to signal {}: {}", pid, e);
                    report.failed.push((pid, e));
                }
            }
        }
        report
    }
}

/// Iterator over a node's ancestors; see [`Node::ancestors`].
#[derive(Clone)]
pub struct Ancestors<'t> {
    tree: &'t ProcessTree,
    next: Option<usize>,
}

impl<'t> Iterator for Ancestors<'t> {
    type Item = Node<'t>;

    fn next(&mut self) -> Option<Node<'t>> {
        let idx = self.next?;
        self.next = self.tree.nodes[idx].parent;
        Some(self.tree.node(idx))
    }
}

/// Depth-first iterator over a node's descendants; see [`Node::descendants`].
#[derive(Clone)]
pub struct Descendants<'t> {
    tree: &'t ProcessTree,
    stack: Vec<usize>,
}

impl<'t> Iterator for Descendants<'t> {
    type Item = Node<'t>;

    fn next(&mut self) -> Option<Node<'t>> {
        let idx = self.stack.pop()?;
        self.stack
            .extend(self.tree.nodes[idx].children.iter().rev().copied());
        Some(self.tree.node(idx))
    }
}

/// What [`Node::kill_subtree`] did, per pid.
#[derive(Debug, Default)]
pub struct KillReport {
    /// Delivered, in delivery order.
    pub signaled: Vec<u64>,
    /// Already gone before the signal could be sent.
    pub vanished: Vec<u64>,
    pub failed: Vec<(u64, Error)>,
}

impl KillReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}
