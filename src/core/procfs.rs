//! Procfs listings for the console: threads of this process and its open
//! file descriptors.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;
use nix::unistd::{sysconf, SysconfVar};

/// One row of the thread table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskStat {
    pub tid: u32,
    pub comm: String,
    pub state: char,
    /// Clock ticks in user mode
    pub utime: u64,
    /// Clock ticks in kernel mode
    pub stime: u64,
}

/// One row of the fd table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FdEntry {
    pub fd: u32,
    /// Symlink target, or the readlink error message
    pub target: Result<String, String>,
    pub pos: u64,
    pub flags: u32,
    pub mnt_id: u32,
}

/// Parse `/proc/<pid>/task/<tid>/stat`. The comm field may contain spaces
/// and parentheses, so fields are counted from the last `)`.
pub fn parse_task_stat(tid: u32, stat: &str) -> Option<TaskStat> {
    let open = stat.find('(')?;
    let close = stat.rfind(')')?;
    let comm = stat.get(open + 1..close)?.to_string();

    let fields: Vec<&str> = stat[close + 1..].split_whitespace().collect();
    let state = fields.first()?.chars().next()?;
    // proc(5): utime and stime are fields 14 and 15; state is field 3
    let utime = fields.get(11)?.parse().ok()?;
    let stime = fields.get(12)?.parse().ok()?;

    Some(TaskStat {
        tid,
        comm,
        state,
        utime,
        stime,
    })
}

/// Parse `/proc/<pid>/fdinfo/<fd>`; missing keys stay zero. `flags` is octal.
pub fn parse_fdinfo(fd: u32, target: Result<String, String>, info: &str) -> FdEntry {
    let mut entry = FdEntry {
        fd,
        target,
        pos: 0,
        flags: 0,
        mnt_id: 0,
    };
    for line in info.lines() {
        let Some((key, value)) = line.split_once(':') else { continue };
        let value = value.trim();
        match key {
            "pos" => entry.pos = value.parse().unwrap_or(0),
            "flags" => entry.flags = u32::from_str_radix(value, 8).unwrap_or(0),
            "mnt_id" => entry.mnt_id = value.parse().unwrap_or(0),
            _ => {}
        }
    }
    entry
}

/// Numeric directory entries, sorted
fn numeric_entries(dir: &Path) -> io::Result<Vec<u32>> {
    let mut ids: Vec<u32> = fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .filter_map(|e| e.file_name().to_str().and_then(|n| n.parse().ok()))
        .collect();
    ids.sort_unstable();
    Ok(ids)
}

pub fn list_threads() -> Result<Vec<TaskStat>> {
    let task_dir = Path::new("/proc/self/task");
    let tids = numeric_entries(task_dir).with_context(|| format!("Failed to list {}", task_dir.display()))?;

    Ok(tids
        .into_iter()
        .filter_map(|tid| {
            let stat = fs::read_to_string(task_dir.join(tid.to_string()).join("stat")).ok()?;
            parse_task_stat(tid, &stat)
        })
        .collect())
}

pub fn list_fds() -> Result<Vec<FdEntry>> {
    let fd_dir = Path::new("/proc/self/fd");
    let fds = numeric_entries(fd_dir).with_context(|| format!("Failed to list {}", fd_dir.display()))?;

    Ok(fds
        .into_iter()
        .map(|fd| {
            let target = fs::read_link(fd_dir.join(fd.to_string()))
                .map(|t| t.display().to_string())
                .map_err(|e| e.to_string());
            let info = fs::read_to_string(format!("/proc/self/fdinfo/{}", fd)).unwrap_or_default();
            parse_fdinfo(fd, target, &info)
        })
        .collect())
}

fn clock_ticks() -> u64 {
    match sysconf(SysconfVar::CLK_TCK) {
        Ok(Some(ticks)) if ticks > 0 => ticks as u64,
        _ => 100,
    }
}

pub fn write_threads(out: &mut dyn Write, threads: &[TaskStat]) -> io::Result<()> {
    let ticks = clock_ticks() as f64;
    writeln!(out, "{}", "=== Threads (tid, comm, state, utime, stime) ===".bold().cyan())?;
    writeln!(out, "{:<7} {:<16} {}  {:>9}  {:>9}", "TID", "COMM", "S", "utime(s)", "stime(s)")?;
    for t in threads {
        writeln!(
            out,
            "{:<7} {:<16} {}  {:8.2}s  {:8.2}s",
            t.tid,
            t.comm,
            t.state,
            t.utime as f64 / ticks,
            t.stime as f64 / ticks
        )?;
    }
    writeln!(out, "{}", "=== end threads ===".bold().cyan())
}

pub fn write_fds(out: &mut dyn Write, fds: &[FdEntry]) -> io::Result<()> {
    writeln!(out, "{}", "=== Open file descriptors ===".bold().cyan())?;
    writeln!(out, "{:<6} {:<8} {:>12} {:>8}  target", "fd", "flags", "pos", "mnt_id")?;
    for e in fds {
        let target = match &e.target {
            Ok(target) => target.clone(),
            Err(err) => format!("(readlink: {})", err),
        };
        writeln!(
            out,
            "{:<6} 0{:07o} {:>12} {:>8}  {}",
            e.fd,
            e.flags,
            e.pos,
            e.mnt_id,
            target
        )?;
    }
    writeln!(out, "{}", "=== end fd ===".bold().cyan())
}

/// List this process's threads into `out`
pub fn dump_threads(out: &mut dyn Write) -> Result<()> {
    let threads = list_threads()?;
    write_threads(out, &threads)?;
    Ok(())
}

/// List this process's open file descriptors into `out`
pub fn dump_fds(out: &mut dyn Write) -> Result<()> {
    let fds = list_fds()?;
    write_fds(out, &fds)?;
    Ok(())
}
