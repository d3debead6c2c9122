use clap::Parser;

#[derive(Parser)]
#[command(
    name = "ptree",
    version,
    about = "Print process trees",
    long_about = "Print process trees containing the specified pids or users, with child processes \
indented from their respective parent processes. Treat an argument of all digits as a process \
ID (PID); otherwise, treat it as a user login name. Default to the tree below init."
)]
pub struct PtreeCli {
    /// Print every tree
    ///
    /// All. Print all process trees, including kernel threads and processes whose
    /// parent could not be read.
    #[arg(short = 'a', long = "all")]
    pub all: bool,

    /// Use line drawing characters
    ///
    /// Use line drawing characters. If the current locale is a UTF-8 locale, the
    /// UTF-8 line drawing characters are used, otherwise ASCII line drawing characters
    /// are used.
    #[arg(short = 'g', long = "graph")]
    pub graph: bool,

    /// Log processes skipped while reading /proc
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Process ID (PID) or username
    ///
    /// A list of process IDs (PIDs) or usernames
    #[arg(value_name = "pid|user", num_args = 0..)]
    pub target: Vec<String>,
}

#[derive(Parser)]
#[command(
    name = "pwait",
    version,
    about = "Wait for processes to terminate",
    long_about = "Wait for all of the specified processes to terminate. Unlike wait(1), the \
target processes do not need to be children of the calling process.",
    trailing_var_arg = true
)]
pub struct PwaitCli {
    /// Report terminations
    ///
    /// Verbose. Report terminations to standard output.
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Give up after SECONDS
    ///
    /// Give up after waiting SECONDS and exit with status 1. Without this option,
    /// wait however long it takes.
    #[arg(short = 't', long = "timeout", value_name = "SECONDS")]
    pub timeout: Option<f64>,

    /// Process ID (PID)
    ///
    /// A list of process IDs (PIDs)
    #[arg(value_name = "PID", required = true, num_args = 1.., value_parser = clap::value_parser!(u64).range(1..))]
    pub pid: Vec<u64>,
}

#[derive(Parser)]
#[command(
    name = "pterm",
    version,
    about = "Signal process trees",
    long_about = "Send a signal to each process and to every process below it in the process \
tree. Children are signaled before their parents, so no child is orphaned while its subtree is \
still being walked.",
    trailing_var_arg = true
)]
pub struct PtermCli {
    /// Signal to send (default TERM)
    ///
    /// The signal to send, by name (TERM, SIGTERM) or number.
    #[arg(short = 's', long = "signal", value_name = "SIGNAL", default_value = "TERM")]
    pub signal: String,

    /// Escalate to KILL after SECONDS
    ///
    /// Wait up to SECONDS for the signaled processes to exit, then send SIGKILL to
    /// whatever is left.
    #[arg(short = 'g', long = "grace", value_name = "SECONDS")]
    pub grace: Option<f64>,

    /// Dry run
    ///
    /// Print the processes that would be signaled, children first, without
    /// signaling anything.
    #[arg(short = 'n', long = "dry-run")]
    pub dry_run: bool,

    /// Report each signal sent
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Process ID (PID)
    ///
    /// A list of process IDs (PIDs)
    #[arg(value_name = "PID", required = true, num_args = 1.., value_parser = clap::value_parser!(u64).range(1..))]
    pub pid: Vec<u64>,
}

/// Parse a non-negative number of seconds.
pub fn seconds(value: f64) -> Option<std::time::Duration> {
    std::time::Duration::try_from_secs_f64(value).ok()
}
