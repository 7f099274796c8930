//! Page residency of a single file.
//!
//! `MincoreChecker` maps the file read-only and asks the kernel which of the
//! mapped pages are present in the page cache via `mincore(2)`.

use chrono::{DateTime, Utc};
use memmap2::Mmap;
use once_cell::sync::Lazy;
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

use crate::error::ResidencyError;

/// Get the system page size (usually 4096).
fn get_page_size() -> u64 {
    // SAFETY: sysconf is safe to call with _SC_PAGESIZE
    // Returns -1 on error - handled by the > 0 check
    unsafe {
        let size = libc::sysconf(libc::_SC_PAGESIZE);
        if size > 0 {
            return size as u64;
        }
    }
    4096
}

/// System page size in bytes.
pub static PAGE_SIZE: Lazy<u64> = Lazy::new(get_page_size);

/// Residency record for one successfully queried file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStatus {
    /// Display name. The full path unless narrowed to the basename.
    #[serde(rename = "filename")]
    pub name: String,
    #[serde(rename = "size")]
    pub size_bytes: u64,
    #[serde(skip)]
    pub page_size: u64,
    /// Time of the residency query.
    pub timestamp: DateTime<Utc>,
    /// File modification time.
    pub mtime: DateTime<Utc>,
    #[serde(rename = "pages")]
    pub total_pages: u64,
    #[serde(rename = "cached")]
    pub resident_pages: u64,
    #[serde(rename = "uncached")]
    pub uncached_pages: u64,
    /// Resident share in percent (0..=100).
    #[serde(rename = "percent")]
    pub percent_cached: f64,
    #[serde(rename = "status", skip_serializing_if = "Option::is_none")]
    pub per_page_resident: Option<Vec<bool>>,
}

impl CacheStatus {
    /// Builds a record from raw page counts. `percent_cached` is 0 for empty files.
    pub fn new(
        name: impl Into<String>,
        size_bytes: u64,
        page_size: u64,
        total_pages: u64,
        resident_pages: u64,
    ) -> Self {
        let now = Utc::now();
        Self {
            name: name.into(),
            size_bytes,
            page_size,
            timestamp: now,
            mtime: now,
            total_pages,
            resident_pages,
            uncached_pages: total_pages.saturating_sub(resident_pages),
            percent_cached: percent_cached(resident_pages, total_pages),
            per_page_resident: None,
        }
    }
}

/// Resident share in percent, 0 when there are no pages.
pub fn percent_cached(resident_pages: u64, total_pages: u64) -> f64 {
    if total_pages == 0 {
        return 0.0;
    }
    (resident_pages as f64 / total_pages as f64) * 100.0
}

/// Number of pages needed to cover `size` bytes.
pub fn page_count(size: u64, page_size: u64) -> u64 {
    size.div_ceil(page_size.max(1))
}

/// Answers "how much of this file is in the page cache".
pub trait ResidencyChecker: Sync {
    fn check(&self, path: &Path) -> Result<CacheStatus, ResidencyError>;
}

impl<T: ResidencyChecker + ?Sized> ResidencyChecker for &T {
    fn check(&self, path: &Path) -> Result<CacheStatus, ResidencyError> {
        (**self).check(path)
    }
}

/// `mincore(2)` backed residency checker.
#[derive(Debug, Clone, Copy, Default)]
pub struct MincoreChecker {
    /// Keep the per-page bitmap in the returned status.
    pub per_page: bool,
}

impl MincoreChecker {
    pub fn new(per_page: bool) -> Self {
        Self { per_page }
    }
}

impl ResidencyChecker for MincoreChecker {
    fn check(&self, path: &Path) -> Result<CacheStatus, ResidencyError> {
        // Opening a FIFO without a writer blocks, so stat first.
        let metadata = fs::metadata(path).map_err(|source| ResidencyError::Metadata {
            path: path.to_path_buf(),
            source,
        })?;
        if !metadata.is_file() {
            return Err(ResidencyError::NotRegularFile {
                path: path.to_path_buf(),
            });
        }

        // The path can be swapped between stat and open.
        let file = OpenOptions::new()
            .read(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(path)
            .map_err(|source| ResidencyError::Open {
                path: path.to_path_buf(),
                source,
            })?;
        let metadata = file.metadata().map_err(|source| ResidencyError::Metadata {
            path: path.to_path_buf(),
            source,
        })?;
        if !metadata.is_file() {
            return Err(ResidencyError::NotRegularFile {
                path: path.to_path_buf(),
            });
        }

        let size = metadata.len();
        let page_size = *PAGE_SIZE;
        let residency = if size == 0 {
            Vec::new()
        } else {
            mincore_pages(&file, path)?
        };

        let resident = residency.iter().filter(|r| **r).count() as u64;
        let mut status = CacheStatus::new(
            path.to_string_lossy(),
            size,
            page_size,
            page_count(size, page_size),
            resident,
        );
        if let Ok(modified) = metadata.modified() {
            status.mtime = DateTime::<Utc>::from(modified);
        }
        if self.per_page {
            status.per_page_resident = Some(residency);
        }
        Ok(status)
    }
}

/// Maps `file` and returns one residency flag per page.
fn mincore_pages(file: &File, path: &Path) -> Result<Vec<bool>, ResidencyError> {
    // SAFETY: the mapping is read-only and never dereferenced; mincore only
    // inspects the page tables behind it.
    let map = unsafe { Mmap::map(file) }.map_err(|source| ResidencyError::Mmap {
        path: path.to_path_buf(),
        source,
    })?;

    let pages = page_count(map.len() as u64, *PAGE_SIZE) as usize;
    let mut vec = vec![0u8; pages];

    // SAFETY: `vec` holds one byte per page of the mapping, which is what
    // mincore writes. The mapping outlives the call.
    let ret = unsafe { libc::mincore(map.as_ptr() as *mut libc::c_void, map.len(), vec.as_mut_ptr()) };
    if ret != 0 {
        return Err(ResidencyError::Mincore {
            path: path.to_path_buf(),
            source: std::io::Error::last_os_error(),
        });
    }

    Ok(vec.into_iter().map(|b| b & 0x1 == 1).collect())
}
