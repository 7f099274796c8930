//! Error types for the page cache census.
//!
//! Per-item errors (`ResidencyError`, `NamespaceError`) are consumed by the
//! batch driver and only logged. `CensusError` is the only error that aborts
//! a run.

use std::path::PathBuf;

/// Failure to query the residency of a single file.
#[derive(Debug, thiserror::Error)]
pub enum ResidencyError {
    #[error("could not open {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("could not stat {path}: {source}")]
    Metadata {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{path} is not a regular file")]
    NotRegularFile { path: PathBuf },

    #[error("could not mmap {path}: {source}")]
    Mmap {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("mincore failed for {path}: {source}")]
    Mincore {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Failure to enter (or prepare to enter) another process's mount namespace.
#[derive(Debug, thiserror::Error)]
pub enum NamespaceError {
    #[error("could not open mount namespace of pid {pid}: {source}")]
    Open { pid: u32, source: std::io::Error },

    #[error("could not unshare filesystem attributes before entering pid {pid}: {source}")]
    Unshare { pid: u32, source: nix::Error },

    #[error("setns into mount namespace of pid {pid} failed: {source}")]
    Setns { pid: u32, source: nix::Error },
}

/// Whole-run failures. Everything else is contained per item.
#[derive(Debug, thiserror::Error)]
pub enum CensusError {
    #[error("could not read process table at {path}: {source}")]
    ProcessTable {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot find any process")]
    NoProcesses,

    #[error("no input files")]
    NoInputFiles,

    #[error("could not build scan worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}
