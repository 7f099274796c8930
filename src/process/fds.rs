//! Open file discovery from /proc/<pid>/fd.
//!
//! Every open descriptor shows up as a symlink to its target. Targets are
//! resolved to canonical paths and only regular files outside the excluded
//! pseudo-filesystem roots are kept. Sockets, pipes, directories and device
//! nodes are dropped.

use nix::dir::Dir;
use nix::errno::Errno;
use nix::fcntl::{readlinkat, OFlag};
use nix::sys::stat::Mode;
use std::ffi::{CStr, CString};
use std::fs;
use std::io::ErrorKind;
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::dedup::dedup_in_place;

/// Pseudo-filesystem roots excluded by default.
pub const DEFAULT_EXCLUDED_PREFIXES: &[&str] = &["/dev", "/proc"];

/// Default excluded prefixes as owned paths.
pub fn default_excluded_prefixes() -> Vec<PathBuf> {
    DEFAULT_EXCLUDED_PREFIXES.iter().map(PathBuf::from).collect()
}

/// Whether `target` lies under one of the excluded roots (component-wise).
pub fn is_excluded_target(target: &Path, excluded: &[PathBuf]) -> bool {
    excluded.iter().any(|prefix| target.starts_with(prefix))
}

/// Open handle on `<proc_root>/<pid>/fd`.
///
/// The handle is taken in the caller's own namespace, where `proc_root` is
/// the procfs that knows `pid`. Descriptor links are then read through it,
/// so resolution keeps working after the thread has entered the mount
/// namespace of `pid` (whose `/proc` may belong to another pid namespace).
pub struct FdTable {
    pid: u32,
    path: PathBuf,
    dir: Dir,
}

impl FdTable {
    pub fn open(proc_root: &Path, pid: u32) -> nix::Result<Self> {
        let path = proc_root.join(pid.to_string()).join("fd");
        let dir = Dir::open(
            &path,
            OFlag::O_RDONLY | OFlag::O_DIRECTORY | OFlag::O_CLOEXEC,
            Mode::empty(),
        )?;
        Ok(Self { pid, path, dir })
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Lists the regular files behind the open descriptors, resolved to
    /// canonical paths in the calling thread's current mount namespace.
    ///
    /// Descriptors are visited in ascending descriptor number and the result
    /// keeps that order with duplicates removed. Per-descriptor failures
    /// never abort the scan.
    pub fn resolve(mut self, excluded: &[PathBuf]) -> Vec<PathBuf> {
        let mut fds: Vec<(u64, CString)> = Vec::new();
        for entry in self.dir.iter() {
            match entry {
                Ok(entry) => {
                    let name = entry.file_name();
                    if let Some(fd) = name.to_str().ok().and_then(|n| n.parse::<u64>().ok()) {
                        fds.push((fd, name.to_owned()));
                    }
                }
                Err(e) => {
                    warn!("Could not list '{}': {}", self.path.display(), e);
                    break;
                }
            }
        }
        fds.sort_unstable_by_key(|(fd, _)| *fd);

        let dir_fd = self.dir.as_raw_fd();
        let mut out: Vec<PathBuf> = fds
            .iter()
            .filter_map(|(fd, name)| self.read_link(dir_fd, *fd, name))
            .filter_map(|text| resolve_target(&text))
            .filter(|target| !is_excluded_target(target, excluded) && is_regular_file(target))
            .collect();
        dedup_in_place(&mut out);

        debug!("pid {}: {} open regular files", self.pid, out.len());
        out
    }

    /// Link text of one descriptor. Non-links and closed descriptors yield None.
    fn read_link(&self, dir_fd: RawFd, fd: u64, name: &CStr) -> Option<PathBuf> {
        match readlinkat(Some(dir_fd), name) {
            Ok(text) => Some(PathBuf::from(text)),
            Err(Errno::ENOENT) => {
                debug!("Descriptor {} of pid {} went away", fd, self.pid);
                None
            }
            Err(Errno::EINVAL) => None,
            Err(e) => {
                warn!("Could not read link '{}/{}': {}", self.path.display(), fd, e);
                None
            }
        }
    }
}

/// Lists the regular files `pid` holds open without changing namespace.
///
/// An unreadable fd directory yields an empty list.
pub fn resolve_open_files(proc_root: &Path, pid: u32, excluded: &[PathBuf]) -> Vec<PathBuf> {
    match FdTable::open(proc_root, pid) {
        Ok(table) => table.resolve(excluded),
        Err(Errno::ENOENT) => {
            debug!("Skipping pid {}: no fd directory", pid);
            Vec::new()
        }
        Err(e) => {
            warn!("Could not open dir '{}/{}/fd': {}", proc_root.display(), pid, e);
            Vec::new()
        }
    }
}

/// Canonical form of an absolute link target. Sockets, pipes and anon
/// inodes (`socket:[..]`, `pipe:[..]`) are not absolute and are dropped.
fn resolve_target(text: &Path) -> Option<PathBuf> {
    if !text.is_absolute() {
        return None;
    }
    match fs::canonicalize(text) {
        Ok(target) => Some(target),
        // Deleted files show up as "<path> (deleted)".
        Err(e) if e.kind() == ErrorKind::NotFound => None,
        Err(e) => {
            warn!("Could not inspect symlink target '{}': {}", text.display(), e);
            None
        }
    }
}

fn is_regular_file(target: &Path) -> bool {
    fs::metadata(target).map(|m| m.is_file()).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::unistd::mkfifo;
    use std::os::unix::fs::symlink;

    // -------------------------------------------------------------------------
    // Tests for is_excluded_target
    // -------------------------------------------------------------------------

    #[test]
    fn test_is_excluded_target_component_wise() {
        let excluded = default_excluded_prefixes();
        assert!(is_excluded_target(Path::new("/dev/null"), &excluded));
        assert!(is_excluded_target(Path::new("/proc/1/status"), &excluded));
        assert!(is_excluded_target(Path::new("/dev"), &excluded));
        assert!(!is_excluded_target(Path::new("/devices/x"), &excluded));
        assert!(!is_excluded_target(Path::new("/var/lib/db"), &excluded));
    }

    // -------------------------------------------------------------------------
    // Tests for resolve_open_files
    // -------------------------------------------------------------------------

    #[test]
    fn test_resolve_open_files_filters_and_orders() {
        let root = tempfile::tempdir().unwrap();
        let data = tempfile::tempdir().unwrap();
        let a = data.path().join("a.db");
        let b = data.path().join("b.log");
        fs::write(&a, b"aaaa").unwrap();
        fs::write(&b, b"bbbb").unwrap();

        let fd_dir = root.path().join("77/fd");
        fs::create_dir_all(&fd_dir).unwrap();
        symlink(&b, fd_dir.join("10")).unwrap();
        symlink(&a, fd_dir.join("3")).unwrap();
        symlink(&b, fd_dir.join("4")).unwrap();
        symlink("/dev/null", fd_dir.join("0")).unwrap();
        symlink("socket:[12345]", fd_dir.join("5")).unwrap();
        symlink(data.path().join("deleted"), fd_dir.join("6")).unwrap();
        fs::write(fd_dir.join("7"), b"not a link").unwrap();

        let files = resolve_open_files(root.path(), 77, &default_excluded_prefixes());
        let expected = vec![fs::canonicalize(&a).unwrap(), fs::canonicalize(&b).unwrap()];
        assert_eq!(files, expected);
    }

    #[test]
    fn test_resolve_open_files_keeps_only_regular_files() {
        let root = tempfile::tempdir().unwrap();
        let data = tempfile::tempdir().unwrap();
        let file = data.path().join("table.ibd");
        let fifo = data.path().join("pipe");
        let subdir = data.path().join("wal");
        fs::write(&file, b"rows").unwrap();
        mkfifo(&fifo, Mode::S_IRUSR | Mode::S_IWUSR).unwrap();
        fs::create_dir(&subdir).unwrap();

        let fd_dir = root.path().join("900/fd");
        fs::create_dir_all(&fd_dir).unwrap();
        symlink(data.path(), fd_dir.join("3")).unwrap();
        symlink(&fifo, fd_dir.join("4")).unwrap();
        symlink(&subdir, fd_dir.join("5")).unwrap();
        symlink(&file, fd_dir.join("6")).unwrap();

        let files = resolve_open_files(root.path(), 900, &default_excluded_prefixes());
        assert_eq!(files, vec![fs::canonicalize(&file).unwrap()]);
    }

    #[test]
    fn test_fd_table_survives_proc_root_going_away() {
        let root = tempfile::tempdir().unwrap();
        let data = tempfile::tempdir().unwrap();
        let f = data.path().join("f");
        fs::write(&f, b"x").unwrap();

        let fd_dir = root.path().join("41/fd");
        fs::create_dir_all(&fd_dir).unwrap();
        symlink(&f, fd_dir.join("3")).unwrap();

        let table = FdTable::open(root.path(), 41).unwrap();
        // The pid is no longer reachable by path, as in a namespace whose
        // /proc belongs to another pid namespace.
        fs::rename(root.path().join("41"), root.path().join("gone")).unwrap();
        assert!(resolve_open_files(root.path(), 41, &[]).is_empty());

        assert_eq!(table.pid(), 41);
        assert_eq!(table.resolve(&[]), vec![fs::canonicalize(&f).unwrap()]);
    }

    #[test]
    fn test_resolve_open_files_custom_exclusion() {
        let root = tempfile::tempdir().unwrap();
        let data = tempfile::tempdir().unwrap();
        let f = data.path().join("f");
        fs::write(&f, b"x").unwrap();

        let fd_dir = root.path().join("5/fd");
        fs::create_dir_all(&fd_dir).unwrap();
        symlink(&f, fd_dir.join("3")).unwrap();

        let canonical_dir = fs::canonicalize(data.path()).unwrap();
        assert!(resolve_open_files(root.path(), 5, &[canonical_dir]).is_empty());
    }

    #[test]
    fn test_resolve_open_files_missing_process() {
        let root = tempfile::tempdir().unwrap();
        assert!(resolve_open_files(root.path(), 1234, &default_excluded_prefixes()).is_empty());
    }
}
