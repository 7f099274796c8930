//! Startup requirement validation for herakles-pcstat.
//!
//! Process inspection needs to read other processes' descriptor tables and to
//! enter their mount namespaces. Both usually require root (or
//! CAP_SYS_PTRACE + CAP_SYS_ADMIN). These checks only warn at startup; the
//! `check-requirements` subcommand turns failures into a non-zero exit.

use nix::unistd::geteuid;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing::{debug, error, info, warn};

/// Validate all runtime requirements for process inspection
pub fn validate_requirements(proc_root: &Path) -> Result<(), ValidationError> {
    info!("Validating runtime requirements...");

    check_user_privileges();
    check_proc_access(proc_root)?;
    check_namespace_support(proc_root)?;

    info!("All runtime requirements validated");
    Ok(())
}

/// Check if running with sufficient privileges
fn check_user_privileges() {
    if !geteuid().is_root() {
        warn!("Not running as root - descriptors and mount namespaces of other users' processes are not accessible");
        warn!("   Recommendation: run as root for a full census");
    } else {
        debug!("Running as root (uid=0)");
    }
}

/// Check that descriptor tables of foreign processes are readable
fn check_proc_access(proc_root: &Path) -> Result<(), ValidationError> {
    if !proc_root.exists() {
        error!("{} not found - proc filesystem not mounted", proc_root.display());
        return Err(ValidationError::ProcNotMounted(
            proc_root.display().to_string(),
        ));
    }

    // pid 1 is always owned by root
    let test_dir = proc_root.join("1/fd");
    match fs::read_dir(&test_dir) {
        Ok(_) => {
            debug!("{} is readable", test_dir.display());
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::PermissionDenied => {
            error!("Cannot read {} - insufficient permissions", test_dir.display());
            error!("   Only processes owned by the current user will be inspected!");
            error!("   Solutions:");
            error!("   1. Run as root");
            error!("   2. Grant capabilities:");
            error!("      setcap cap_dac_read_search,cap_sys_ptrace,cap_sys_admin+ep /path/to/binary");
            Err(ValidationError::InsufficientPermissions(e.to_string()))
        }
        Err(e) => {
            warn!("Could not test {} access: {}", test_dir.display(), e);
            Ok(())
        }
    }
}

/// Check that mount namespace handles are exposed
fn check_namespace_support(proc_root: &Path) -> Result<(), ValidationError> {
    let ns = proc_root.join("self/ns/mnt");
    if fs::symlink_metadata(&ns).is_err() {
        error!("{} not found - mount namespaces unsupported", ns.display());
        return Err(ValidationError::NoMountNamespaces);
    }
    debug!("Mount namespace handles available");
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("proc filesystem not found at {0}")]
    ProcNotMounted(String),

    #[error("Insufficient permissions: {0}")]
    InsufficientPermissions(String),

    #[error("mount namespace handles not available")]
    NoMountNamespaces,
}
