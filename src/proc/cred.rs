use nix::unistd::{Gid, Group, Uid, User};

use super::error::Error;

/// One line of user or group IDs, in the order the kernel prints them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ids {
    pub real: u32,
    pub effective: u32,
    pub saved: u32,
    pub filesystem: u32,
}

/// Process credentials parsed from /proc/[pid]/status
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcCred {
    pub uids: Ids,
    pub gids: Ids,
    pub groups: Vec<u32>,
}

fn parse_ids(key: &str, value: &str) -> Result<Ids, Error> {
    let fields = value
        .split_whitespace()
        .map(|s| s.parse::<u32>())
        .collect::<Result<Vec<u32>, _>>()
        .map_err(|e| Error::in_file("status", &format!("invalid {}: {}", key, e)))?;
    match fields[..] {
        [real, effective, saved, filesystem, ..] => Ok(Ids {
            real,
            effective,
            saved,
            filesystem,
        }),
        _ => Err(Error::in_file(
            "status",
            &format!("{} field has too few values", key),
        )),
    }
}

/// Parse credentials from the text of /proc/[pid]/status.
pub fn parse_cred(status: &str) -> Result<ProcCred, Error> {
    let mut uids = None;
    let mut gids = None;
    let mut groups = Vec::new();

    for line in status.lines() {
        if let Some((key, value)) = line.split_once(':') {
            match key {
                "Uid" => uids = Some(parse_ids(key, value)?),
                "Gid" => gids = Some(parse_ids(key, value)?),
                "Groups" => {
                    groups = value
                        .split_whitespace()
                        .filter_map(|s| s.parse().ok())
                        .collect();
                }
                _ => {}
            }
        }
    }

    Ok(ProcCred {
        uids: uids.ok_or_else(|| Error::in_file("status", "missing Uid"))?,
        gids: gids.ok_or_else(|| Error::in_file("status", "missing Gid"))?,
        groups,
    })
}

pub fn resolve_uid(uid: u32) -> Option<String> {
    match User::from_uid(Uid::from_raw(uid)) {
        Ok(Some(user)) => Some(user.name),
        _ => None,
    }
}

pub fn resolve_gid(gid: u32) -> Option<String> {
    match Group::from_gid(Gid::from_raw(gid)) {
        Ok(Some(group)) => Some(group.name),
        _ => None,
    }
}

/// Name of `uid`, or the number itself when the user database has none.
pub fn user_name(uid: u32) -> String {
    resolve_uid(uid).unwrap_or_else(|| uid.to_string())
}

/// Name of `gid`, or the number itself when the group database has none.
pub fn group_name(gid: u32) -> String {
    resolve_gid(gid).unwrap_or_else(|| gid.to_string())
}

impl Ids {
    /// Names for real, effective, saved and filesystem IDs, in that order.
    pub fn user_names(&self) -> [String; 4] {
        [self.real, self.effective, self.saved, self.filesystem].map(user_name)
    }

    pub fn group_names(&self) -> [String; 4] {
        [self.real, self.effective, self.saved, self.filesystem].map(group_name)
    }
}

pub fn lookup_uid_by_username(username: &str) -> Option<u32> {
    match User::from_name(username) {
        Ok(Some(user)) => Some(user.uid.as_raw()),
        _ => None,
    }
}
