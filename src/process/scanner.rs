//! Process scanning utilities for discovering live processes in /proc.
//!
//! This module lists numeric pid directories, reads each process's resident
//! memory from `statm` and applies the name filters used in fleet mode.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing::debug;

use crate::error::CensusError;
use crate::residency::PAGE_SIZE;

/// A live process worth inspecting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessDescriptor {
    pub pid: u32,
    /// Resident set size in bytes.
    pub rss_bytes: u64,
}

/// Name based process selection (exclude wins over include).
#[derive(Debug, Clone, Default)]
pub struct ProcessFilter {
    pub include_names: Option<Vec<String>>,
    pub exclude_names: Option<Vec<String>>,
}

impl ProcessFilter {
    fn is_empty(&self) -> bool {
        self.include_names.as_ref().map_or(true, |v| v.is_empty())
            && self.exclude_names.as_ref().map_or(true, |v| v.is_empty())
    }
}

/// Scans the proc root for processes with non-zero resident memory.
///
/// Failing to read the proc root itself is fatal. Processes that vanish or
/// cannot be read while scanning are skipped. The result is ordered by pid.
pub fn collect_processes(
    root: &Path,
    max: Option<usize>,
    filter: &ProcessFilter,
) -> Result<Vec<ProcessDescriptor>, CensusError> {
    let entries = fs::read_dir(root).map_err(|source| CensusError::ProcessTable {
        path: root.to_path_buf(),
        source,
    })?;

    let mut pids: Vec<u32> = entries
        .flatten()
        .filter_map(|entry| entry.file_name().to_str()?.parse::<u32>().ok())
        .collect();
    pids.sort_unstable();

    if pids.is_empty() {
        return Err(CensusError::NoProcesses);
    }

    let mut out = Vec::new();
    for pid in pids {
        let proc_path = root.join(pid.to_string());
        let rss_bytes = match read_resident_bytes(&proc_path) {
            Ok(v) => v,
            Err(e) => {
                debug!("Skipping pid {}: cannot read statm: {}", pid, e);
                continue;
            }
        };
        if rss_bytes == 0 {
            continue;
        }
        if !filter.is_empty() {
            let name = read_process_name(&proc_path).unwrap_or_default();
            if !should_include_process(&name, filter) {
                debug!("Skipping process {} ({}): filtered by name", pid, name);
                continue;
            }
        }
        out.push(ProcessDescriptor { pid, rss_bytes });
        if let Some(maxp) = max {
            if out.len() >= maxp {
                break;
            }
        }
    }
    Ok(out)
}

/// Reads the resident set size in bytes from /proc/<pid>/statm.
pub fn read_resident_bytes(proc_path: &Path) -> Result<u64, std::io::Error> {
    let content = fs::read_to_string(proc_path.join("statm"))?;
    let resident: u64 = content
        .split_whitespace()
        .nth(1)
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| std::io::Error::new(ErrorKind::InvalidData, "Invalid statm format"))?;
    Ok(resident * *PAGE_SIZE)
}

/// Reads process name from comm file or extracts from cmdline.
pub fn read_process_name(proc_path: &Path) -> Option<String> {
    if let Ok(s) = fs::read_to_string(proc_path.join("comm")) {
        let t = s.trim();
        if !t.is_empty() {
            return Some(t.into());
        }
    }

    let content = fs::read(proc_path.join("cmdline")).ok()?;
    let argv0 = content.split(|&b| b == 0u8).next()?;
    let argv0 = std::str::from_utf8(argv0).ok()?;
    Path::new(argv0)
        .file_name()
        .and_then(|n| n.to_str())
        .map(|s| s.to_string())
}

/// Determines if a process should be included based on the name filters.
pub fn should_include_process(name: &str, filter: &ProcessFilter) -> bool {
    if let Some(ex) = &filter.exclude_names {
        if ex.iter().any(|s| name.contains(s)) {
            return false;
        }
    }
    if let Some(inc) = &filter.include_names {
        if !inc.is_empty() {
            return inc.iter().any(|s| name.contains(s));
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_process(root: &Path, pid: u32, resident_pages: u64, comm: &str) {
        let dir = root.join(pid.to_string());
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("statm"), format!("1000 {} 50 10 0 200 0\n", resident_pages)).unwrap();
        fs::write(dir.join("comm"), format!("{}\n", comm)).unwrap();
    }

    // -------------------------------------------------------------------------
    // Tests for collect_processes
    // -------------------------------------------------------------------------

    #[test]
    fn test_collect_processes_skips_zero_rss_and_non_numeric() {
        let root = tempfile::tempdir().unwrap();
        fake_process(root.path(), 30, 12, "postgres");
        fake_process(root.path(), 2, 0, "kthreadd");
        fake_process(root.path(), 7, 3, "nginx");
        fs::create_dir_all(root.path().join("self")).unwrap();
        fs::create_dir_all(root.path().join("sys")).unwrap();

        let procs = collect_processes(root.path(), None, &ProcessFilter::default()).unwrap();
        let pids: Vec<u32> = procs.iter().map(|p| p.pid).collect();
        assert_eq!(pids, vec![7, 30]);
        assert_eq!(procs[0].rss_bytes, 3 * *PAGE_SIZE);
    }

    #[test]
    fn test_collect_processes_skips_unreadable_statm() {
        let root = tempfile::tempdir().unwrap();
        fake_process(root.path(), 1, 5, "init");
        fs::create_dir_all(root.path().join("99")).unwrap();

        let procs = collect_processes(root.path(), None, &ProcessFilter::default()).unwrap();
        assert_eq!(procs.len(), 1);
        assert_eq!(procs[0].pid, 1);
    }

    #[test]
    fn test_collect_processes_max() {
        let root = tempfile::tempdir().unwrap();
        for pid in 1..=5 {
            fake_process(root.path(), pid, 1, "worker");
        }
        let procs = collect_processes(root.path(), Some(2), &ProcessFilter::default()).unwrap();
        assert_eq!(procs.len(), 2);
        assert_eq!(procs[1].pid, 2);
    }

    #[test]
    fn test_collect_processes_missing_root_is_fatal() {
        let root = tempfile::tempdir().unwrap();
        let err = collect_processes(&root.path().join("nope"), None, &ProcessFilter::default())
            .unwrap_err();
        assert!(matches!(err, CensusError::ProcessTable { .. }));
    }

    #[test]
    fn test_collect_processes_empty_table() {
        let root = tempfile::tempdir().unwrap();
        let err = collect_processes(root.path(), None, &ProcessFilter::default()).unwrap_err();
        assert!(matches!(err, CensusError::NoProcesses));
    }

    #[test]
    fn test_collect_processes_name_filter() {
        let root = tempfile::tempdir().unwrap();
        fake_process(root.path(), 10, 4, "nginx");
        fake_process(root.path(), 11, 4, "test_app");
        fake_process(root.path(), 12, 4, "postgres");

        let filter = ProcessFilter {
            include_names: None,
            exclude_names: Some(vec!["test".to_string()]),
        };
        let pids: Vec<u32> = collect_processes(root.path(), None, &filter)
            .unwrap()
            .iter()
            .map(|p| p.pid)
            .collect();
        assert_eq!(pids, vec![10, 12]);
    }

    // -------------------------------------------------------------------------
    // Tests for read_process_name
    // -------------------------------------------------------------------------

    #[test]
    fn test_read_process_name_falls_back_to_cmdline() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("42");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("cmdline"), b"/usr/sbin/sshd\0-D\0").unwrap();
        assert_eq!(read_process_name(&dir), Some("sshd".to_string()));
    }

    // -------------------------------------------------------------------------
    // Tests for should_include_process
    // -------------------------------------------------------------------------

    #[test]
    fn test_should_include_process_no_filters() {
        let filter = ProcessFilter::default();
        assert!(should_include_process("nginx", &filter));
        assert!(should_include_process("any_process", &filter));
    }

    #[test]
    fn test_should_include_process_with_include() {
        let filter = ProcessFilter {
            include_names: Some(vec!["nginx".to_string(), "postgres".to_string()]),
            exclude_names: None,
        };
        assert!(should_include_process("nginx-worker", &filter));
        assert!(should_include_process("postgres", &filter));
        assert!(!should_include_process("mysql", &filter));
    }

    #[test]
    fn test_should_include_process_exclude_takes_priority() {
        let filter = ProcessFilter {
            include_names: Some(vec!["app".to_string()]),
            exclude_names: Some(vec!["test".to_string()]),
        };
        assert!(!should_include_process("test_app", &filter));
        assert!(should_include_process("prod_app", &filter));
    }
}
