//! Herakles Page Cache Census Library
//!
//! This library reports which portions of files are resident in the Linux
//! page cache. Files come from explicit paths, from the descriptors of a single
//! process, or from every live process with resident memory ("top" mode).
//!
//! # Features
//!
//! - **Namespace-aware discovery**: descriptors are resolved inside the mount
//!   namespace of the owning process, so containerized processes report the
//!   paths they actually see
//! - **Deterministic output**: discovery order, deduplication and ranking are
//!   stable for a given process table
//! - **Partial failure containment**: one bad descriptor or file never aborts
//!   a census
//!
//! # Usage
//!
//! ```no_run
//! use herakles_pcstat::{
//!     render, Census, CensusOptions, CensusRequest, MincoreChecker, ProcMountNamespace,
//!     ReportOptions,
//! };
//!
//! let census = Census::new(
//!     MincoreChecker::default(),
//!     ProcMountNamespace::default(),
//!     CensusOptions::default(),
//! );
//!
//! let stats = census.run(CensusRequest::Top(10)).expect("census failed");
//! render(&mut std::io::stdout(), &stats, &ReportOptions::default()).unwrap();
//! ```

pub mod census;
pub mod dedup;
pub mod error;
pub mod process;
pub mod report;
pub mod residency;

// Re-export main types for convenience
pub use census::{compare_by_occupancy, rank_top, Census, CensusOptions, CensusRequest};
pub use dedup::{dedup_in_place, unique};
pub use error::{CensusError, NamespaceError, ResidencyError};
pub use process::{
    MountNamespaceGuard, NamespaceSwitcher, NoopNamespace, ProcMountNamespace, ProcessDescriptor,
    ProcessFilter,
};
pub use report::{render, OutputFormat, ReportOptions};
pub use residency::{CacheStatus, MincoreChecker, ResidencyChecker, PAGE_SIZE};
