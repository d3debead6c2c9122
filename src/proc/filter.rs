use super::process::Process;

/// A predicate over process records.
pub trait ProcessFilter {
    fn matches(&self, process: &Process) -> bool;
}

impl<F> ProcessFilter for F
where
    F: Fn(&Process) -> bool,
{
    fn matches(&self, process: &Process) -> bool {
        self(process)
    }
}

/// Conjunction of simple conditions. An empty query matches every process.
///
/// ```no_run
/// use proctree::{find_processes, Query};
///
/// let agents = find_processes(&Query::new().comm("gpg-agent").user("alice")).unwrap();
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    pid: Option<u64>,
    ppid: Option<u64>,
    comm: Option<String>,
    cmdline: Vec<String>,
    uid: Option<u32>,
    user: Option<String>,
}

impl Query {
    pub fn new() -> Self {
        Query::default()
    }

    pub fn pid(mut self, pid: u64) -> Self {
        self.pid = Some(pid);
        self
    }

    pub fn ppid(mut self, ppid: u64) -> Self {
        self.ppid = Some(ppid);
        self
    }

    /// Exact match on the comm field.
    pub fn comm(mut self, comm: impl Into<String>) -> Self {
        self.comm = Some(comm.into());
        self
    }

    /// Some argument contains `needle`. May be given more than once.
    pub fn cmdline_contains(mut self, needle: impl Into<String>) -> Self {
        self.cmdline.push(needle.into());
        self
    }

    /// Effective user ID.
    pub fn uid(mut self, uid: u32) -> Self {
        self.uid = Some(uid);
        self
    }

    /// Effective user name, as resolved from the user database.
    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }
}

impl ProcessFilter for Query {
    fn matches(&self, p: &Process) -> bool {
        if self.pid.is_some_and(|pid| pid != p.pid()) {
            return false;
        }
        if self.ppid.is_some_and(|ppid| ppid != p.ppid()) {
            return false;
        }
        if self.comm.as_deref().is_some_and(|comm| comm != p.comm()) {
            return false;
        }
        if self.uid.is_some_and(|uid| uid != p.uids().effective) {
            return false;
        }
        if !self
            .cmdline
            .iter()
            .all(|needle| p.cmdline().iter().any(|arg| arg.contains(needle.as_str())))
        {
            return false;
        }
        // Last: resolving the owner may consult the user database.
        if self.user.as_deref().is_some_and(|user| user != p.user()) {
            return false;
        }
        true
    }
}
