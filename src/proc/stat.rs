use super::error::Error;

/// Process state from `/proc/[pid]/stat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessState {
    Running,
    Sleeping,
    DiskSleep,
    Zombie,
    Stopped,
    TracingStop,
    Dead,
    Idle,
    /// A state character not covered by the known variants.
    Other(char),
}

impl ProcessState {
    pub fn from_char(c: char) -> Self {
        match c {
            'R' => Self::Running,
            'S' => Self::Sleeping,
            'D' => Self::DiskSleep,
            'Z' => Self::Zombie,
            'T' => Self::Stopped,
            't' => Self::TracingStop,
            'X' | 'x' => Self::Dead,
            'I' => Self::Idle,
            other => Self::Other(other),
        }
    }

    /// The single-character code the kernel uses for this state.
    pub fn code(self) -> char {
        match self {
            Self::Running => 'R',
            Self::Sleeping => 'S',
            Self::DiskSleep => 'D',
            Self::Zombie => 'Z',
            Self::Stopped => 'T',
            Self::TracingStop => 't',
            Self::Dead => 'X',
            Self::Idle => 'I',
            Self::Other(c) => c,
        }
    }
}

impl std::fmt::Display for ProcessState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Sleeping => write!(f, "sleeping"),
            Self::DiskSleep => write!(f, "uninterruptible sleep"),
            Self::Zombie => write!(f, "zombie"),
            Self::Stopped => write!(f, "stopped"),
            Self::TracingStop => write!(f, "tracing stop"),
            Self::Dead => write!(f, "dead"),
            Self::Idle => write!(f, "idle"),
            Self::Other(c) => write!(f, "unknown state '{}'", c),
        }
    }
}

/// The fields of `/proc/[pid]/stat` this crate cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stat {
    pub pid: u64,
    pub comm: String,
    pub state: ProcessState,
    pub ppid: u64,
    pub pgrp: u64,
    pub session: u64,
    pub tty_nr: i64,
    pub utime: u64,
    pub stime: u64,
    pub num_threads: u64,
    /// Start time in clock ticks since boot.
    pub starttime: u64,
    /// Virtual memory size in bytes.
    pub vsize: u64,
    /// Resident set size in pages.
    pub rss_pages: u64,
}

// Offsets of the fields following the comm field, starting with state at 0.
const PPID: usize = 1;
const PGRP: usize = 2;
const SESSION: usize = 3;
const TTY_NR: usize = 4;
const UTIME: usize = 11;
const STIME: usize = 12;
const NUM_THREADS: usize = 17;
const STARTTIME: usize = 19;
const VSIZE: usize = 20;
const RSS: usize = 21;

fn field<'a>(fields: &[&'a str], idx: usize, name: &str) -> Result<&'a str, Error> {
    fields
        .get(idx)
        .copied()
        .ok_or_else(|| Error::in_file("stat", &format!("missing {} field", name)))
}

fn unsigned(fields: &[&str], idx: usize, name: &str) -> Result<u64, Error> {
    field(fields, idx, name)?
        .parse::<u64>()
        .map_err(|e| Error::in_file("stat", &format!("invalid {}: {}", name, e)))
}

/// Parse the contents of `/proc/[pid]/stat`.
///
/// The comm field is wrapped in parentheses and may itself contain spaces
/// and parentheses, e.g. `(a) (b)`. The kernel never escapes it, so the only
/// reliable terminator is the last `)` on the line.
pub fn parse_stat(stat: &str) -> Result<Stat, Error> {
    let open_paren = stat
        .find('(')
        .ok_or_else(|| Error::in_file("stat", "missing '(' in comm field"))?;
    let close_paren = stat
        .rfind(')')
        .ok_or_else(|| Error::in_file("stat", "missing ')' in comm field"))?;
    if close_paren < open_paren {
        return Err(Error::in_file("stat", "unbalanced comm field"));
    }

    let pid = stat[..open_paren]
        .trim()
        .parse::<u64>()
        .map_err(|e| Error::in_file("stat", &format!("invalid pid: {}", e)))?;
    let comm = stat[open_paren + 1..close_paren].to_string();

    let fields: Vec<&str> = stat[close_paren + 1..].split_whitespace().collect();
    let state = field(&fields, 0, "state")?
        .chars()
        .next()
        .map(ProcessState::from_char)
        .ok_or_else(|| Error::in_file("stat", "empty state field"))?;
    let tty_nr = field(&fields, TTY_NR, "tty_nr")?
        .parse::<i64>()
        .map_err(|e| Error::in_file("stat", &format!("invalid tty_nr: {}", e)))?;

    Ok(Stat {
        pid,
        comm,
        state,
        ppid: unsigned(&fields, PPID, "ppid")?,
        pgrp: unsigned(&fields, PGRP, "pgrp")?,
        session: unsigned(&fields, SESSION, "session")?,
        tty_nr,
        utime: unsigned(&fields, UTIME, "utime")?,
        stime: unsigned(&fields, STIME, "stime")?,
        num_threads: unsigned(&fields, NUM_THREADS, "num_threads")?,
        starttime: unsigned(&fields, STARTTIME, "starttime")?,
        vsize: unsigned(&fields, VSIZE, "vsize")?,
        rss_pages: unsigned(&fields, RSS, "rss")?,
    })
}
