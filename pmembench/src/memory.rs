//! Memory regions
//!
//! Acquisition and release of the raw memory ranges a workload runs
//! against. Persistent ranges are backed by a file mapped shared from a
//! DAX-capable directory; volatile ranges are anonymous private mappings.

// Imports
use {
	crate::access::{AccessSpan, CACHE_LINE_SIZE, WRITE_PATTERN},
	std::{
		ffi::c_void,
		fs,
		io,
		path::PathBuf,
		ptr,
	},
};

/// Page size assumed when prefaulting
const PAGE_SIZE: usize = 4096;

/// Backing source of a memory region
#[derive(Clone, Debug)]
pub enum RegionSource {
	/// A file created at the given path, mapped shared
	File(PathBuf),

	/// An anonymous private mapping
	Anonymous,
}

/// Resource error
#[derive(Debug)]
#[derive(thiserror::Error)]
pub enum ResourceError {
	/// Unable to create the backing file
	#[error("Unable to create backing file {path:?}")]
	CreateFile {
		path:   PathBuf,
		source: io::Error,
	},

	/// Unable to size the backing file
	#[error("Unable to size backing file {path:?} to {size} B")]
	SizeFile {
		path:   PathBuf,
		size:   u64,
		source: io::Error,
	},

	/// `mmap` failed
	#[error("Unable to map {size} B region")]
	Map {
		size:   u64,
		source: io::Error,
	},
}

/// A mapped memory region, unmapped (and its backing file removed) on drop
#[derive(Debug)]
pub struct MemoryRegion {
	/// Mapped base address
	ptr: *mut u8,

	/// Mapped length
	len: usize,

	/// Backing source, kept for cleanup
	source: RegionSource,
}

// SAFETY: The region owns its mapping; sharing across worker threads is
// the workload itself.
unsafe impl Send for MemoryRegion {}
unsafe impl Sync for MemoryRegion {}

impl MemoryRegion {
	/// Acquires a region of `size` bytes from `source`
	pub fn acquire(source: RegionSource, size: u64) -> Result<Self, ResourceError> {
		let ptr = match &source {
			RegionSource::File(path) => {
				let file = fs::OpenOptions::new()
					.read(true)
					.write(true)
					.create(true)
					.truncate(true)
					.open(path)
					.map_err(|source| ResourceError::CreateFile {
						path: path.clone(),
						source,
					})?;
				file.set_len(size).map_err(|source| ResourceError::SizeFile {
					path: path.clone(),
					size,
					source,
				})?;

				// SAFETY: The file descriptor is valid and sized to `size`
				let ptr = unsafe {
					libc::mmap(
						ptr::null_mut(),
						size as usize,
						libc::PROT_READ | libc::PROT_WRITE,
						libc::MAP_SHARED,
						std::os::fd::AsRawFd::as_raw_fd(&file),
						0,
					)
				};
				Self::check_map(ptr, size)?
			},
			RegionSource::Anonymous => {
				// SAFETY: Anonymous mappings carry no other requirements
				let ptr = unsafe {
					libc::mmap(
						ptr::null_mut(),
						size as usize,
						libc::PROT_READ | libc::PROT_WRITE,
						libc::MAP_ANONYMOUS | libc::MAP_PRIVATE,
						-1,
						0,
					)
				};
				Self::check_map(ptr, size)?
			},
		};

		Ok(Self {
			ptr,
			len: size as usize,
			source,
		})
	}

	/// Checks an `mmap` return value
	fn check_map(ptr: *mut c_void, size: u64) -> Result<*mut u8, ResourceError> {
		match ptr == libc::MAP_FAILED {
			true => Err(ResourceError::Map {
				size,
				source: io::Error::last_os_error(),
			}),
			false => Ok(ptr.cast()),
		}
	}

	/// Returns the full region as an access span
	pub fn span(&self) -> AccessSpan {
		AccessSpan::new(self.ptr, self.len)
	}

	/// Touches one byte per page so later accesses hit mapped memory
	pub fn prefault(&mut self) {
		for page in (0..self.len).step_by(PAGE_SIZE) {
			// SAFETY: `page` is within the mapping
			unsafe {
				self.ptr.add(page).write_volatile(0);
			}
		}
	}

	/// Fills the region with the fixed pattern so reads return real data
	pub fn fill_with_pattern(&mut self) {
		for line in (0..self.len).step_by(CACHE_LINE_SIZE) {
			let len = CACHE_LINE_SIZE.min(self.len - line);
			// SAFETY: `line..line + len` is within the mapping
			unsafe {
				self.ptr.add(line).copy_from_nonoverlapping(WRITE_PATTERN.as_ptr(), len);
			}
		}
	}
}

impl Drop for MemoryRegion {
	fn drop(&mut self) {
		// SAFETY: `ptr` and `len` are the values returned by `mmap`
		let res = unsafe { libc::munmap(self.ptr.cast(), self.len) };
		if res != 0 {
			tracing::warn!(len = self.len, "Unable to unmap region");
		}

		if let RegionSource::File(path) = &self.source {
			if let Err(err) = fs::remove_file(path) {
				tracing::warn!(?path, ?err, "Unable to remove backing file");
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use {
		super::*,
		std::{env, process},
	};

	/// A unique path in the system temporary directory
	fn temp_path(name: &str) -> PathBuf {
		env::temp_dir().join(format!("pmembench-test-{}-{name}", process::id()))
	}

	#[test]
	fn anonymous_region_lifecycle() {
		let mut region = MemoryRegion::acquire(RegionSource::Anonymous, 1 << 20).unwrap();
		region.prefault();

		let span = region.span();
		assert_eq!(span.len, 1 << 20);
		assert!(!span.ptr.is_null());
	}

	#[test]
	fn file_region_is_removed_on_drop() {
		let path = temp_path("file-region");
		{
			let region = MemoryRegion::acquire(RegionSource::File(path.clone()), 1 << 20).unwrap();
			assert!(path.exists());
			drop(region);
		}
		assert!(!path.exists());
	}

	#[test]
	fn pattern_fill_covers_region() {
		let mut region = MemoryRegion::acquire(RegionSource::Anonymous, 4096).unwrap();
		region.fill_with_pattern();

		let span = region.span();
		// SAFETY: The span covers the mapping
		let bytes = unsafe { std::slice::from_raw_parts(span.ptr, span.len) };
		for line in bytes.chunks(CACHE_LINE_SIZE) {
			assert_eq!(line, WRITE_PATTERN);
		}
	}
}
