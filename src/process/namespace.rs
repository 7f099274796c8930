//! Mount namespace switching for descriptor resolution.
//!
//! Descriptor symlink targets only make sense inside the mount namespace of
//! the process that owns them. `setns(CLONE_NEWNS)` changes the view of the
//! calling thread, so switching happens on a scan worker, never on the main
//! thread, and is always undone by dropping the returned guard.

use nix::sched::{setns, unshare, CloneFlags};
use std::fs::{self, File};
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use tracing::{debug, error};

use crate::error::NamespaceError;

/// Enters the mount namespace of another process for the current thread.
pub trait NamespaceSwitcher: Sync {
    /// Switches the calling thread into the mount namespace of `pid`.
    /// The original namespace is restored when the guard drops.
    fn enter(&self, pid: u32) -> Result<MountNamespaceGuard, NamespaceError>;
}

impl<T: NamespaceSwitcher + ?Sized> NamespaceSwitcher for &T {
    fn enter(&self, pid: u32) -> Result<MountNamespaceGuard, NamespaceError> {
        (**self).enter(pid)
    }
}

/// Restores the thread's original mount namespace on drop.
#[must_use = "the namespace is restored as soon as the guard is dropped"]
#[derive(Debug)]
pub struct MountNamespaceGuard {
    original: Option<File>,
    pid: u32,
}

impl MountNamespaceGuard {
    /// Guard for a namespace that was never left.
    pub fn unchanged(pid: u32) -> Self {
        Self {
            original: None,
            pid,
        }
    }

    /// Whether the thread actually switched namespace.
    pub fn switched(&self) -> bool {
        self.original.is_some()
    }
}

impl Drop for MountNamespaceGuard {
    fn drop(&mut self) {
        if let Some(original) = self.original.take() {
            match setns(&original, CloneFlags::CLONE_NEWNS) {
                Ok(()) => debug!("Restored original mount namespace after pid {}", self.pid),
                Err(e) => error!(
                    "Failed to restore original mount namespace after pid {}: {}",
                    self.pid, e
                ),
            }
        }
    }
}

/// `setns(2)` based switcher reading namespace handles from a proc root.
#[derive(Debug, Clone)]
pub struct ProcMountNamespace {
    proc_root: PathBuf,
}

impl ProcMountNamespace {
    pub fn new(proc_root: impl Into<PathBuf>) -> Self {
        Self {
            proc_root: proc_root.into(),
        }
    }

    fn open_ns(path: &Path, pid: u32) -> Result<File, NamespaceError> {
        File::open(path).map_err(|source| NamespaceError::Open { pid, source })
    }
}

impl Default for ProcMountNamespace {
    fn default() -> Self {
        Self::new("/proc")
    }
}

impl NamespaceSwitcher for ProcMountNamespace {
    fn enter(&self, pid: u32) -> Result<MountNamespaceGuard, NamespaceError> {
        let own_path = self.proc_root.join("thread-self/ns/mnt");
        let target_path = self.proc_root.join(pid.to_string()).join("ns/mnt");

        let original = Self::open_ns(&own_path, pid)?;
        let target = Self::open_ns(&target_path, pid)?;

        // Same namespace: nothing to do.
        if let (Ok(a), Ok(b)) = (fs::metadata(&own_path), fs::metadata(&target_path)) {
            if a.dev() == b.dev() && a.ino() == b.ino() {
                return Ok(MountNamespaceGuard::unchanged(pid));
            }
        }

        // setns(CLONE_NEWNS) is refused while the thread shares its fs
        // attributes with other threads.
        unshare(CloneFlags::CLONE_FS).map_err(|source| NamespaceError::Unshare { pid, source })?;
        setns(&target, CloneFlags::CLONE_NEWNS)
            .map_err(|source| NamespaceError::Setns { pid, source })?;

        debug!("Entered mount namespace of pid {}", pid);
        Ok(MountNamespaceGuard {
            original: Some(original),
            pid,
        })
    }
}

/// Switcher that never leaves the current namespace.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNamespace;

impl NamespaceSwitcher for NoopNamespace {
    fn enter(&self, pid: u32) -> Result<MountNamespaceGuard, NamespaceError> {
        Ok(MountNamespaceGuard::unchanged(pid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noop_namespace_never_switches() {
        let guard = NoopNamespace.enter(1).unwrap();
        assert!(!guard.switched());
    }

    #[test]
    fn test_enter_own_namespace_is_unchanged() {
        let pid = std::process::id();
        let guard = ProcMountNamespace::default().enter(pid).unwrap();
        assert!(!guard.switched());
    }

    #[test]
    fn test_enter_missing_process_fails() {
        let root = tempfile::tempdir().unwrap();
        let err = ProcMountNamespace::new(root.path()).enter(4242).unwrap_err();
        assert!(matches!(err, NamespaceError::Open { pid: 4242, .. }));
    }
}
