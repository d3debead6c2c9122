use roff::{bold, roman, Roff};
use std::fs;
use std::path::Path;

struct Example<'a> {
    title: &'a str,
    description: &'a str,
    code: &'a str,
}

struct ManPage<'a> {
    name: &'a str,
    about: &'a str,
    description: &'a str,
    synopsis: &'a str,
    options: &'a [(&'a str, &'a str)],
    examples: &'a [Example<'a>],
    exit_status: &'a str,
    environment: &'a str,
    see_also: &'a str,
}

const DEFAULT_EXIT_STATUS: &str =
    "0 on success, 1 if an operation failed (such as no such process or permission \
     denied), 2 on invalid usage.";

const FILES: &str = "/proc/pid/*\tProcess information and control files.\n\
                     /proc/uptime\tTime since boot, used to compute process start times.";

const ENVIRONMENT: &str = "RUST_LOG\tLog filter for diagnostics written to standard error, \
                           for example RUST_LOG=debug.";

fn section(roff: &mut Roff, title: &str, body: &str) {
    roff.control("SH", [title]);
    for line in body.lines() {
        if let Some((term, desc)) = line.split_once('\t') {
            roff.control("TP", []);
            roff.text([roman(term)]);
            roff.text([roman(desc)]);
        } else {
            roff.text([roman(line)]);
        }
    }
}

fn render_man_page(page: &ManPage, out_dir: &Path) {
    let version = env!("CARGO_PKG_VERSION");
    let upper_name = page.name.to_uppercase();
    let date_version = format!("{} {}", page.name, version);
    let mut roff = Roff::default();
    roff.control("TH", [upper_name.as_str(), "1", date_version.as_str()]);
    roff.control("SH", ["NAME"]);
    roff.text([roman(format!("{} - {}", page.name, page.about))]);
    roff.control("SH", ["SYNOPSIS"]);
    roff.text([bold(page.name), roman(format!(" {}", page.synopsis))]);
    roff.control("SH", ["DESCRIPTION"]);
    roff.text([roman(page.description)]);
    if !page.options.is_empty() {
        roff.control("SH", ["OPTIONS"]);
        for (flag, help) in page.options {
            roff.control("TP", []);
            roff.text([bold(*flag)]);
            roff.text([roman(*help)]);
        }
    }
    if !page.examples.is_empty() {
        roff.control("SH", ["EXAMPLES"]);
        for example in page.examples {
            roff.text([bold(example.title)]);
            roff.text([roman(example.description)]);
            roff.control("sp", [] as [&str; 0]);
            roff.control("nf", [] as [&str; 0]);
            roff.control("RS", ["4"]);
            for line in example.code.lines() {
                roff.text([roman(line)]);
            }
            roff.control("RE", [] as [&str; 0]);
            roff.control("fi", [] as [&str; 0]);
        }
    }
    section(&mut roff, "EXIT STATUS", page.exit_status);
    if !page.environment.is_empty() {
        section(&mut roff, "ENVIRONMENT", page.environment);
    }
    section(&mut roff, "FILES", FILES);
    roff.control("SH", ["SEE ALSO"]);
    roff.text([roman(page.see_also)]);
    fs::write(out_dir.join(format!("{}.1", page.name)), roff.to_roff()).unwrap();
}

fn main() {
    let out_dir = Path::new("target/man");
    fs::create_dir_all(out_dir).unwrap();

    render_man_page(
        &ManPage {
            name: "ptree",
            about: "print process trees",
            description: "Print process trees containing the specified pids or users, with \
                          child processes indented from their respective parent processes. An \
                          argument of all digits is taken to be a process ID; otherwise it is \
                          assumed to be a user login name. For each selected process, its \
                          ancestors below init are printed first. With no arguments, the tree \
                          below init is printed. Processes whose parent could not be read are \
                          printed as the roots of their own trees.",
            synopsis: "[-agv] [pid|user]...",
            options: &[
                (
                    "-a, --all",
                    "All. Print every process tree, including kernel threads and \
                     processes whose parent could not be read.",
                ),
                (
                    "-g, --graph",
                    "Use line drawing characters. If the current locale is a UTF-8 \
                     locale, the UTF-8 line drawing characters are used, otherwise \
                     ASCII line drawing characters are used.",
                ),
                (
                    "-v, --verbose",
                    "Log processes that could not be read to standard error.",
                ),
            ],
            examples: &[Example {
                title: "Example 1 Using ptree",
                description: "The following example prints the ancestors and descendants \
                              of the current shell with ASCII line drawing characters:",
                code: "\
$ ptree -g $$
569150  /usr/bin/sshd
`-569157  /usr/bin/sshd
  `-569159  -bash
    `-569193  ptree -g 569159",
            }],
            exit_status: DEFAULT_EXIT_STATUS,
            environment: ENVIRONMENT,
            see_also: "pterm(1), pwait(1), pgrep(1), ps(1), proc(5)",
        },
        out_dir,
    );

    render_man_page(
        &ManPage {
            name: "pwait",
            about: "wait for processes to terminate",
            description: "Wait for all of the specified processes to terminate. Unlike \
                          wait(1), the target processes do not need to be children of \
                          the calling process. A process that has exited but not yet been \
                          reaped by its parent counts as terminated, and a process ID \
                          reused by a new process is not mistaken for the original.",
            synopsis: "[-v] [-t SECONDS] PID...",
            options: &[
                (
                    "-v, --verbose",
                    "Verbose. Reports terminations to standard output.",
                ),
                (
                    "-t, --timeout SECONDS",
                    "Give up after waiting SECONDS, report the processes still \
                     running to standard error and exit with status 1.",
                ),
            ],
            examples: &[],
            exit_status: DEFAULT_EXIT_STATUS,
            environment: "",
            see_also: "wait(1), ptree(1), proc(5)",
        },
        out_dir,
    );

    render_man_page(
        &ManPage {
            name: "pterm",
            about: "signal process trees",
            description: "Send a signal to each process and to every process below it in \
                          the process tree. Children are signaled before their parents. \
                          Processes that exit while the tree is being walked are skipped. A \
                          failure to signal one process is reported, and the remaining \
                          processes are still signaled. pterm refuses to signal a tree it is \
                          itself part of.",
            synopsis: "[-s SIGNAL] [-g SECONDS] [-n] [-v] PID...",
            options: &[
                (
                    "-s, --signal SIGNAL",
                    "Send SIGNAL, given by name (TERM, SIGTERM) or number. The default \
                     is TERM.",
                ),
                (
                    "-g, --grace SECONDS",
                    "Wait up to SECONDS for the signaled processes to exit, then send \
                     SIGKILL to those still running.",
                ),
                (
                    "-n, --dry-run",
                    "Print the processes that would be signaled, in the order they \
                     would be signaled, without sending anything.",
                ),
                ("-v, --verbose", "Report each signal sent to standard output."),
            ],
            examples: &[],
            exit_status: DEFAULT_EXIT_STATUS,
            environment: ENVIRONMENT,
            see_also: "kill(1), pkill(1), ptree(1), signal(7)",
        },
        out_dir,
    );

    println!("cargo:rerun-if-changed=build.rs");
}
