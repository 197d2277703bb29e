//! Segmented free-list pools for small, frequently churned network buffers.
//!
//! Ten independent pools, each behind its own lock, serve size-prefixed
//! buffers carved from large chunks. Requests above the largest size class
//! go straight to the system allocator. Callers hand back only the pointer
//! they were given; the pool recovers the size from a hidden header.
//!
//! ```
//! let buf = segpool::allocate(1500, 3);
//! assert!(!buf.is_null());
//! unsafe {
//!   assert!(segpool::usable_size(buf) >= 1500);
//!   let buf = segpool::reallocate(buf, 9000, 3);
//!   segpool::deallocate(buf, 3);
//! }
//! ```
//!
//! A buffer must always go back to the pool index it came from.

#![allow(clippy::missing_safety_doc)]

use core::ptr::{NonNull, null_mut};

use tracing::{debug, warn};

mod buffer;
mod chunk;
pub mod clock;
mod error;
mod free_list;
#[cfg(feature = "c_api")]
pub mod ffi;
mod pool;
pub mod registry;
pub mod size_class;
mod system;

pub use buffer::{HEADER_BYTES, buffer_usable_size};
pub use chunk::{BIG_OBJECT_BYTES, CHUNK_RETRY_SIZE, CHUNK_SIZE, REFILL_BATCH};
pub use error::{PoolError, Result};
pub use pool::{FreeListToken, Pool, PoolInfo, granted_size};
pub use registry::{POOL_COUNT, PoolId};
pub use size_class::{CLASS_COUNT, MAX_CLASS_SIZE};
pub use system::{LibcMemory, SystemMemory};

// =============================================================================
// Pointer API
// =============================================================================

fn reject(op: &'static str, pool: usize, err: PoolError) {
  match err {
    PoolError::OutOfMemory(_) => debug!(op, pool, %err, "request failed"),
    _ => warn!(op, pool, %err, "request rejected"),
  }
}

/// Allocates a buffer of at least `size` bytes from pool `pool`.
///
/// Returns null when `pool` is out of range or memory is exhausted.
pub fn allocate(size: usize, pool: usize) -> *mut u8 {
  match registry::pool(pool).and_then(|p| p.alloc_buffer(size)) {
    Ok(buf) => buf.as_ptr(),
    Err(err) => {
      reject("allocate", pool, err);
      null_mut()
    }
  }
}

/// Resizes `buf` to at least `new_size` bytes.
///
/// Null `buf` allocates. `new_size == 0` frees and returns null. On failure
/// returns null and `buf` stays valid.
///
/// # Safety
/// `buf` must be null or a live buffer obtained from pool `pool`.
pub unsafe fn reallocate(buf: *mut u8, new_size: usize, pool: usize) -> *mut u8 {
  let result = registry::pool(pool)
    .and_then(|p| unsafe { p.realloc_buffer(NonNull::new(buf), new_size) });
  match result {
    Ok(Some(buf)) => buf.as_ptr(),
    Ok(None) => null_mut(),
    Err(err) => {
      reject("reallocate", pool, err);
      null_mut()
    }
  }
}

/// Returns `buf` to pool `pool`. Null, an invalid index, or a damaged header
/// make this a no-op.
///
/// # Safety
/// `buf` must be null or a live buffer obtained from pool `pool`.
pub unsafe fn deallocate(buf: *mut u8, pool: usize) {
  let Some(buf) = NonNull::new(buf) else {
    return;
  };
  if let Err(err) = registry::pool(pool).and_then(|p| unsafe { p.free_buffer(buf) }) {
    reject("deallocate", pool, err);
  }
}

/// Payload bytes available through `buf`; 0 for null or a damaged header.
///
/// # Safety
/// `buf` must be null or a live buffer from any pool.
pub unsafe fn usable_size(buf: *mut u8) -> usize {
  NonNull::new(buf)
    .and_then(|buf| unsafe { buffer_usable_size(buf) }.ok())
    .unwrap_or(0)
}

/// Snapshot of pool `pool`, or an all-zero snapshot for an invalid index.
pub fn get_info(pool: usize) -> PoolInfo {
  registry::pool(pool).map(Pool::info).unwrap_or_default()
}
