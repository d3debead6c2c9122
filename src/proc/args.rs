use std::collections::BTreeMap;

/// Split the NUL-delimited contents of `/proc/[pid]/cmdline` into arguments.
///
/// An empty file (kernel threads, zombies, or an unreadable process) yields
/// no arguments. A trailing NUL does not produce an empty last argument.
pub fn parse_cmdline(bytes: &[u8]) -> Vec<String> {
    if bytes.is_empty() {
        return Vec::new();
    }
    let mut args: Vec<String> = bytes
        .split(|b| *b == b'\0')
        .map(|b| String::from_utf8_lossy(b).into_owned())
        .collect();
    if args.last().is_some_and(|arg| arg.is_empty()) {
        args.pop();
    }
    args
}

/// Parse the NUL-delimited contents of `/proc/[pid]/environ`.
///
/// Entries that lack an `=` or have an empty key are skipped: processes like
/// sshd overwrite their environ memory with status text. When a key repeats,
/// the first occurrence wins, matching getenv(3).
pub fn parse_environ(bytes: &[u8]) -> BTreeMap<String, String> {
    let mut vars = BTreeMap::new();
    for chunk in bytes.split(|b| *b == b'\0') {
        if let Some(pos) = chunk.iter().position(|b| *b == b'=') {
            if pos > 0 {
                let key = String::from_utf8_lossy(&chunk[..pos]).into_owned();
                let value = String::from_utf8_lossy(&chunk[pos + 1..]).into_owned();
                vars.entry(key).or_insert(value);
            }
        }
    }
    vars
}
