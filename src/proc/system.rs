//! System-wide values needed to interpret per-process fields.

use std::time::{Duration, SystemTime};

use nix::unistd::{sysconf, SysconfVar};
use once_cell::sync::Lazy;

use super::error::Error;
use super::source::ProcFs;

fn sysconf_or(var: SysconfVar, fallback: u64) -> u64 {
    match sysconf(var) {
        Ok(Some(v)) if v > 0 => v as u64,
        _ => fallback,
    }
}

/// System clock ticks per second (usually 100).
pub static CLK_TCK: Lazy<u64> = Lazy::new(|| sysconf_or(SysconfVar::CLK_TCK, 100));

/// Page size in bytes, used to convert the rss field of stat.
pub static PAGE_SIZE: Lazy<u64> = Lazy::new(|| sysconf_or(SysconfVar::PAGE_SIZE, 4096));

/// Parse `/proc/uptime`: seconds since boot, then idle seconds.
pub fn parse_uptime(content: &str) -> Result<f64, Error> {
    let first = content
        .split_whitespace()
        .next()
        .ok_or_else(|| Error::parse("/proc/uptime", "no fields found"))?;
    let uptime = first
        .parse::<f64>()
        .map_err(|e| Error::parse("/proc/uptime", &format!("invalid uptime: {}", e)))?;
    if !uptime.is_finite() || uptime < 0.0 {
        return Err(Error::parse("/proc/uptime", "uptime out of range"));
    }
    Ok(uptime)
}

/// Boot time derived as now minus uptime.
pub fn boot_time(procfs: &ProcFs) -> Result<SystemTime, Error> {
    let uptime = parse_uptime(&procfs.read_uptime()?)?;
    SystemTime::now()
        .checked_sub(Duration::from_secs_f64(uptime))
        .ok_or_else(|| Error::parse("/proc/uptime", "uptime predates the epoch"))
}

/// Convert a tick count since boot into an absolute time.
pub fn ticks_to_time(boot: SystemTime, ticks: u64) -> SystemTime {
    boot + ticks_to_duration(ticks)
}

pub fn ticks_to_duration(ticks: u64) -> Duration {
    let hz = *CLK_TCK;
    Duration::from_secs(ticks / hz) + Duration::from_nanos((ticks % hz) * 1_000_000_000 / hz)
}
