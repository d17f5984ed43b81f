//! Access primitives
//!
//! The capability contract consumed by the execution engine: durably
//! write or read a span of bytes with a selectable persistence strength.
//! Hardware flush-instruction selection per microarchitecture is an
//! external concern; the default implementation here uses the portable
//! cache-line flush plus a store fence.

// Imports
use {
	crate::config::PersistInstruction,
	std::hint,
};

/// Cache line size in bytes
pub const CACHE_LINE_SIZE: usize = crate::config::CACHE_LINE_SIZE as usize;

/// Fixed pattern deposited by writes, exactly one cache line
pub const WRITE_PATTERN: [u8; CACHE_LINE_SIZE] =
	*b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+-";

/// A span of raw memory accessed by one operation.
///
/// Spans may alias across threads in shared-partition mode; all accesses
/// through them are volatile.
#[derive(Clone, Copy, Debug)]
pub struct AccessSpan {
	/// Base pointer
	pub ptr: *mut u8,

	/// Length in bytes, a multiple of the cache line size
	pub len: usize,
}

// SAFETY: Spans are raw views into a region that outlives the run;
// concurrent access is part of the workload.
unsafe impl Send for AccessSpan {}
unsafe impl Sync for AccessSpan {}

impl AccessSpan {
	/// Creates a span over `len` bytes at `ptr`
	pub fn new(ptr: *mut u8, len: usize) -> Self {
		Self { ptr, len }
	}

	/// Returns a sub-span at `offset` of `len` bytes.
	///
	/// # Panics
	/// Panics if the sub-span is out of bounds.
	pub fn slice(&self, offset: u64, len: u64) -> Self {
		let (offset, len) = (offset as usize, len as usize);
		assert!(
			offset.checked_add(len).is_some_and(|end| end <= self.len),
			"Sub-span out of bounds: {offset}+{len} > {}",
			self.len
		);
		// SAFETY: `offset` is within the span
		let ptr = unsafe { self.ptr.add(offset) };
		Self { ptr, len }
	}
}

/// Access error
#[derive(Clone, Debug)]
#[derive(thiserror::Error)]
pub enum AccessError {
	/// Span is not cache-line aligned in size
	#[error("Access span of {len} B is not a multiple of the cache line size")]
	UnalignedSpan { len: usize },

	/// Span has no backing memory
	#[error("Access span has no backing memory")]
	NullSpan,
}

/// Access primitive consumed by the execution engine.
///
/// Shared by all worker threads of a run.
pub trait AccessPrimitive: Sync {
	/// Reads `span`, returning a value derived from the read bytes so
	/// the loads cannot be elided
	fn read(&self, span: AccessSpan) -> Result<u64, AccessError>;

	/// Writes the fixed pattern to `span` and applies `persist`
	fn write(&self, span: AccessSpan, persist: PersistInstruction) -> Result<(), AccessError>;
}

/// The real memory access primitive
#[derive(Clone, Copy, Debug, Default)]
pub struct MemoryAccess;

impl MemoryAccess {
	/// Checks that `span` is accessible
	fn check(span: AccessSpan) -> Result<(), AccessError> {
		if span.ptr.is_null() || span.len == 0 {
			return Err(AccessError::NullSpan);
		}
		if span.len % CACHE_LINE_SIZE != 0 {
			return Err(AccessError::UnalignedSpan { len: span.len });
		}
		Ok(())
	}
}

impl AccessPrimitive for MemoryAccess {
	fn read(&self, span: AccessSpan) -> Result<u64, AccessError> {
		Self::check(span)?;

		let mut acc = 0u64;
		for line in 0..span.len / CACHE_LINE_SIZE {
			// SAFETY: `span` covers `len` bytes and lines are in bounds
			let value = unsafe { span.ptr.add(line * CACHE_LINE_SIZE).cast::<u64>().read_volatile() };
			acc = acc.wrapping_add(value);
		}

		Ok(hint::black_box(acc))
	}

	fn write(&self, span: AccessSpan, persist: PersistInstruction) -> Result<(), AccessError> {
		Self::check(span)?;

		for line in 0..span.len / CACHE_LINE_SIZE {
			// SAFETY: `span` covers `len` bytes and lines are in bounds
			let line_ptr = unsafe { span.ptr.add(line * CACHE_LINE_SIZE) };
			unsafe {
				line_ptr.copy_from_nonoverlapping(WRITE_PATTERN.as_ptr(), CACHE_LINE_SIZE);
			}

			match persist {
				// Leave the lines cached
				PersistInstruction::None => (),
				PersistInstruction::NoCache | PersistInstruction::Cache | PersistInstruction::CacheInvalidate =>
					flush_cache_line(line_ptr),
			}
		}

		if persist != PersistInstruction::None {
			store_fence();
		}

		Ok(())
	}
}

/// Flushes the cache line at `ptr`
#[cfg(target_arch = "x86_64")]
fn flush_cache_line(ptr: *mut u8) {
	// SAFETY: `clflush` on a valid address has no other requirements
	unsafe {
		core::arch::x86_64::_mm_clflush(ptr);
	}
}

#[cfg(not(target_arch = "x86_64"))]
fn flush_cache_line(_ptr: *mut u8) {
	// No portable flush; the fence below still orders the stores
}

/// Orders preceding stores before subsequent ones
#[cfg(target_arch = "x86_64")]
fn store_fence() {
	// SAFETY: `sfence` has no requirements
	unsafe {
		core::arch::x86_64::_mm_sfence();
	}
}

#[cfg(not(target_arch = "x86_64"))]
fn store_fence() {
	std::sync::atomic::fence(std::sync::atomic::Ordering::SeqCst);
}
