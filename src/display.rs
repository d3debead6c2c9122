use std::io::{self, Write};

use crate::proc::{Process, ProcessState};
use crate::tree::Node;

pub struct GraphChars {
    last: &'static str,
    non_last: &'static str,
    pipe: &'static str,
    space: &'static str,
}

pub const UTF8_GRAPH: GraphChars = GraphChars {
    last: "└─",
    non_last: "├─",
    pipe: "│ ",
    space: "  ",
};

pub const ASCII_GRAPH: GraphChars = GraphChars {
    last: "`-",
    non_last: "|-",
    pipe: "| ",
    space: "  ",
};

fn names_utf8(locale: &str) -> bool {
    let locale = locale.to_ascii_lowercase();
    locale.contains("utf-8") || locale.contains("utf8")
}

/// The first of `LC_ALL`, `LC_CTYPE` and `LANG` that is set decides.
fn is_utf8_locale() -> bool {
    for var in &["LC_ALL", "LC_CTYPE", "LANG"] {
        if let Ok(val) = std::env::var(var) {
            if !val.is_empty() {
                return names_utf8(&val);
            }
        }
    }
    false
}

/// Line drawing characters suited to the current locale.
pub fn graph_chars() -> &'static GraphChars {
    if is_utf8_locale() {
        &UTF8_GRAPH
    } else {
        &ASCII_GRAPH
    }
}

/// The process's arguments on one line, or its command name when it has
/// none (kernel threads, zombies).
pub fn cmd_summary(process: &Process) -> String {
    let mut summary = process
        .cmdline()
        .iter()
        .filter(|arg| !arg.is_empty())
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(" ");
    if summary.is_empty() {
        summary = if process.comm().is_empty() {
            "<unknown>".to_string()
        } else {
            process.comm().to_string()
        };
        if process.state() == ProcessState::Zombie {
            summary.push_str(" <defunct>");
        }
    }
    summary
}

/// Writes process trees, one process per line, children indented below
/// their parent.
pub struct TreePrinter {
    graph: Option<&'static GraphChars>,
}

impl TreePrinter {
    /// Plain indentation, or line drawing with `graph`.
    pub fn new(graph: Option<&'static GraphChars>) -> Self {
        TreePrinter { graph }
    }

    /// Print `node` and everything below it. With `ancestors`, the chain of
    /// parents leading to it is printed first, starting below init: init
    /// rarely started the process in any meaningful sense.
    pub fn write_tree<W: Write>(
        &self,
        out: &mut W,
        node: Node<'_>,
        ancestors: bool,
    ) -> io::Result<()> {
        let mut cont = Vec::new();
        let mut depth = 0;
        if ancestors {
            let mut chain: Vec<Node<'_>> =
                node.ancestors().take_while(|a| a.pid() != 1).collect();
            chain.reverse();
            for ancestor in chain {
                self.write_line(out, ancestor.process(), depth, &cont, true)?;
                // A single chain: nothing follows at this level.
                cont.push(false);
                depth += 1;
            }
        }
        self.write_subtree(out, node, depth, &mut cont, true)
    }

    fn write_subtree<W: Write>(
        &self,
        out: &mut W,
        node: Node<'_>,
        depth: usize,
        cont: &mut Vec<bool>,
        is_last: bool,
    ) -> io::Result<()> {
        self.write_line(out, node.process(), depth, cont, is_last)?;
        // Oldest first, like the order they were started in.
        let mut children: Vec<Node<'_>> = node.children().collect();
        children.sort_by_key(|c| (c.process().start_ticks(), c.pid()));
        let count = children.len();
        for (i, child) in children.into_iter().enumerate() {
            let child_is_last = i + 1 == count;
            cont.push(!child_is_last);
            self.write_subtree(out, child, depth + 1, cont, child_is_last)?;
            cont.pop();
        }
        Ok(())
    }

    fn write_line<W: Write>(
        &self,
        out: &mut W,
        process: &Process,
        depth: usize,
        cont: &[bool],
        is_last: bool,
    ) -> io::Result<()> {
        match self.graph {
            Some(g) if depth > 0 => {
                for more in cont.iter().take(depth - 1) {
                    out.write_all(if *more { g.pipe } else { g.space }.as_bytes())?;
                }
                out.write_all(if is_last { g.last } else { g.non_last }.as_bytes())?;
            }
            _ => {
                for _ in 0..depth {
                    out.write_all(b"  ")?;
                }
            }
        }
        writeln!(out, "{}  {}", process.pid(), cmd_summary(process))
    }
}
