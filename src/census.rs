//! The page cache census pipeline.
//!
//! ```text
//! collect_processes -> (per pid) open fd table + enter namespace + resolve
//!                   -> dedup -> residency checks -> rank/truncate
//! ```
//!
//! Explicit files and single-pid requests skip process enumeration. Process
//! scans run on a census-local rayon pool: each scan opens the fd directory
//! in our own namespace, switches namespace, resolves descriptors and
//! restores the namespace on one worker without interleaving other work, so
//! results come back in traversal order.

use nix::errno::Errno;
use rayon::prelude::*;
use std::cmp::Ordering;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::dedup::dedup_in_place;
use crate::error::{CensusError, NamespaceError};
use crate::process::{
    collect_processes, default_excluded_prefixes, FdTable, NamespaceSwitcher, ProcessFilter,
};
use crate::residency::{CacheStatus, ResidencyChecker};

/// What to take a census of.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CensusRequest {
    /// Explicit files, reported in argument order.
    Files(Vec<PathBuf>),
    /// Explicit files plus every regular file `pid` holds open.
    Process { pid: u32, files: Vec<PathBuf> },
    /// Every live process with resident memory, top `n` files by occupancy.
    Top(usize),
}

impl CensusRequest {
    /// Picks the mode from CLI style inputs. A `top` of zero or below and a
    /// `pid` of zero mean "not requested".
    pub fn from_args(files: Vec<PathBuf>, pid: Option<u32>, top: Option<i64>) -> Self {
        if let Some(n) = top.filter(|n| *n > 0) {
            return Self::Top(usize::try_from(n).unwrap_or(usize::MAX));
        }
        match pid.filter(|p| *p != 0) {
            Some(pid) => Self::Process { pid, files },
            None => Self::Files(files),
        }
    }
}

/// Tunables for one census run.
#[derive(Debug, Clone)]
pub struct CensusOptions {
    pub proc_root: PathBuf,
    pub excluded_prefixes: Vec<PathBuf>,
    /// Report only the base file name.
    pub basename: bool,
    /// Scan worker threads (None or 0 = rayon default).
    pub parallelism: Option<usize>,
    pub max_processes: Option<usize>,
    pub filter: ProcessFilter,
}

impl Default for CensusOptions {
    fn default() -> Self {
        Self {
            proc_root: PathBuf::from("/proc"),
            excluded_prefixes: default_excluded_prefixes(),
            basename: false,
            parallelism: None,
            max_processes: None,
            filter: ProcessFilter::default(),
        }
    }
}

/// Drives one census over a residency checker and a namespace switcher.
pub struct Census<C, N> {
    checker: C,
    switcher: N,
    options: CensusOptions,
    self_pid: u32,
}

impl<C, N> Census<C, N>
where
    C: ResidencyChecker,
    N: NamespaceSwitcher,
{
    pub fn new(checker: C, switcher: N, options: CensusOptions) -> Self {
        Self {
            checker,
            switcher,
            options,
            self_pid: std::process::id(),
        }
    }

    /// Overrides the pid treated as "ourselves".
    pub fn with_self_pid(mut self, pid: u32) -> Self {
        self.self_pid = pid;
        self
    }

    /// Runs the whole pipeline for `request`.
    #[instrument(skip_all)]
    pub fn run(&self, request: CensusRequest) -> Result<Vec<CacheStatus>, CensusError> {
        let start = Instant::now();

        let (paths, top) = match request {
            CensusRequest::Files(files) => (self.explicit_paths(files)?, None),
            CensusRequest::Process { pid, mut files } => {
                files.extend(self.discover(&[pid])?);
                (self.explicit_paths(files)?, None)
            }
            CensusRequest::Top(n) => {
                let processes = collect_processes(
                    &self.options.proc_root,
                    self.options.max_processes,
                    &self.options.filter,
                )?;
                let resident: u64 = processes.iter().map(|p| p.rss_bytes).sum();
                info!(
                    "Scanning {} processes with resident memory ({:.1} MiB total)",
                    processes.len(),
                    resident as f64 / (1024.0 * 1024.0)
                );
                let pids: Vec<u32> = processes.iter().map(|p| p.pid).collect();
                (self.discover(&pids)?, Some(n))
            }
        };

        let stats = self.collect(&paths);
        let ranked = match top {
            Some(n) => rank_top(stats, n),
            None => stats,
        };

        info!(
            "Census done: {} files queried, {} reported in {:.2}ms",
            paths.len(),
            ranked.len(),
            start.elapsed().as_secs_f64() * 1000.0
        );
        Ok(ranked)
    }

    fn explicit_paths(&self, mut files: Vec<PathBuf>) -> Result<Vec<PathBuf>, CensusError> {
        if files.is_empty() {
            return Err(CensusError::NoInputFiles);
        }
        dedup_in_place(&mut files);
        Ok(files)
    }

    /// Open regular files of all `pids`, deduplicated in traversal order.
    pub fn discover(&self, pids: &[u32]) -> Result<Vec<PathBuf>, CensusError> {
        if pids.is_empty() {
            return Ok(Vec::new());
        }

        let threads = self
            .options
            .parallelism
            .filter(|n| *n > 0)
            .unwrap_or_else(rayon::current_num_threads)
            .clamp(1, pids.len());

        // Workers are discarded with the pool once the scan is over.
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("pcstat-scan-{}", i))
            .build()?;

        let per_process: Vec<Vec<PathBuf>> =
            pool.install(|| pids.par_iter().map(|&pid| self.scan_process(pid)).collect());

        let mut files: Vec<PathBuf> = per_process.into_iter().flatten().collect();
        dedup_in_place(&mut files);
        debug!("Discovered {} unique files across {} processes", files.len(), pids.len());
        Ok(files)
    }

    /// Open regular files of one process, resolved inside its mount namespace.
    #[instrument(skip(self))]
    pub fn scan_process(&self, pid: u32) -> Vec<PathBuf> {
        if pid == self.self_pid {
            debug!("Ignoring our own process");
            return Vec::new();
        }

        // Taken before switching: the target namespace's /proc may not know `pid`.
        let table = match FdTable::open(&self.options.proc_root, pid) {
            Ok(table) => table,
            Err(Errno::ENOENT) => {
                debug!("Process {} went away", pid);
                return Vec::new();
            }
            Err(e) => {
                warn!("Skipping pid {}: cannot open fd directory: {}", pid, e);
                return Vec::new();
            }
        };

        let guard = match self.switcher.enter(pid) {
            Ok(guard) => guard,
            Err(NamespaceError::Open { source, .. }) if source.kind() == ErrorKind::NotFound => {
                debug!("Process {} went away", pid);
                return Vec::new();
            }
            Err(e) => {
                warn!("Skipping pid {}: {}", pid, e);
                return Vec::new();
            }
        };

        let files = table.resolve(&self.options.excluded_prefixes);
        drop(guard);
        files
    }

    /// Queries every path, skipping the ones that fail.
    pub fn collect(&self, paths: &[PathBuf]) -> Vec<CacheStatus> {
        let mut stats = Vec::with_capacity(paths.len());
        for path in paths {
            match self.checker.check(path) {
                Ok(mut status) => {
                    // The query is done; the real path is never used again.
                    if self.options.basename {
                        status.name = display_basename(path);
                    }
                    stats.push(status);
                }
                Err(e) => warn!("Skipping {:?}: {}", path, e),
            }
        }
        stats
    }
}

fn display_basename(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// Higher occupancy first: percent desc, resident pages desc, name asc.
pub fn compare_by_occupancy(a: &CacheStatus, b: &CacheStatus) -> Ordering {
    b.percent_cached
        .total_cmp(&a.percent_cached)
        .then_with(|| b.resident_pages.cmp(&a.resident_pages))
        .then_with(|| a.name.cmp(&b.name))
}

/// Sorts by occupancy and keeps at most `n` records.
pub fn rank_top(mut stats: Vec<CacheStatus>, n: usize) -> Vec<CacheStatus> {
    stats.sort_by(compare_by_occupancy);
    stats.truncate(n);
    stats
}
