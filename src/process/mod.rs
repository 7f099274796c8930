//! Process-related modules for discovering processes and the files they hold open.
//!
//! This module provides:
//! - `scanner`: Process discovery and filtering
//! - `fds`: Open regular file resolution from /proc/<pid>/fd
//! - `namespace`: Mount namespace switching around descriptor resolution

pub mod fds;
pub mod namespace;
pub mod scanner;

// Re-export commonly used types
pub use fds::{
    default_excluded_prefixes, is_excluded_target, resolve_open_files, FdTable,
    DEFAULT_EXCLUDED_PREFIXES,
};
pub use namespace::{MountNamespaceGuard, NamespaceSwitcher, NoopNamespace, ProcMountNamespace};
pub use scanner::{
    collect_processes, read_process_name, read_resident_bytes, should_include_process,
    ProcessDescriptor, ProcessFilter,
};
