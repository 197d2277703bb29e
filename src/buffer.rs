//! Size-prefixed buffers.
//!
//! Every buffer handed to callers is preceded by a two-word header holding
//! the size the pool actually granted:
//!
//! ```text
//! +-----------+-----------+------------------------+
//! | used size | reserved  | payload ...            |
//! +-----------+-----------+------------------------+
//! ^ pool block            ^ pointer the caller sees
//! ```
//!
//! Callers only ever see the payload pointer. The header is read back on
//! free and realloc, so callers never track sizes themselves. All header
//! arithmetic stays in this module.

use core::ptr::NonNull;

use crate::error::{PoolError, Result};
use crate::pool::{Pool, granted_size};
use crate::size_class::{self, MAX_CLASS_SIZE};
use crate::system::SystemMemory;

#[repr(C)]
struct BufferHeader {
  used: usize,
  /// Always zero. Keeps payloads two words past the block start.
  #[allow(dead_code)]
  reserved: usize,
}

/// Bytes of bookkeeping in front of every payload.
pub const HEADER_BYTES: usize = size_of::<BufferHeader>();

/// Smallest stored size a live buffer can have: header plus one byte.
const MIN_STORED: usize = HEADER_BYTES + 1;

const _: () = assert!(HEADER_BYTES == 2 * size_of::<usize>());

#[inline]
unsafe fn block_of(buf: NonNull<u8>) -> NonNull<u8> {
  unsafe { buf.sub(HEADER_BYTES) }
}

/// Writes the header at the start of `block` and returns the payload.
#[inline]
unsafe fn stamp(block: NonNull<u8>, granted: usize) -> NonNull<u8> {
  unsafe {
    block.cast::<BufferHeader>().write(BufferHeader {
      used: granted,
      reserved: 0,
    });
    block.add(HEADER_BYTES)
  }
}

/// Reads and validates the stored size of `buf`.
///
/// Pooled buffers always store an exact class size; anything else means the
/// header was overwritten.
unsafe fn stored_size(buf: NonNull<u8>) -> Result<usize> {
  let stored = unsafe { block_of(buf).cast::<BufferHeader>().read().used };
  let pooled_mismatch = stored <= MAX_CLASS_SIZE && size_class::round_up(stored) != stored;
  if stored < MIN_STORED || pooled_mismatch {
    return Err(PoolError::CorruptHeader { stored });
  }
  Ok(stored)
}

#[inline]
fn total_for(size: usize) -> Result<usize> {
  HEADER_BYTES
    .checked_add(size)
    .ok_or(PoolError::OutOfMemory(size))
}

/// Payload bytes usable through `buf`.
///
/// # Safety
/// `buf` must be a live buffer from any pool's buffer methods.
pub unsafe fn buffer_usable_size(buf: NonNull<u8>) -> Result<usize> {
  unsafe { stored_size(buf) }.map(|stored| stored - HEADER_BYTES)
}

impl<S: SystemMemory> Pool<S> {
  /// Allocates a buffer with room for at least `size` payload bytes.
  ///
  /// A zero `size` is served as one byte.
  pub fn alloc_buffer(&self, size: usize) -> Result<NonNull<u8>> {
    let total = total_for(size.max(1))?;
    let block = self.allocate(total).ok_or(PoolError::OutOfMemory(total))?;
    Ok(unsafe { stamp(block, granted_size(total)) })
  }

  /// Resizes a buffer, moving it only when the size class changes.
  ///
  /// `None` allocates; `new_size == 0` frees and yields `Ok(None)`. On any
  /// error the original buffer is untouched and still owned by the caller.
  ///
  /// # Safety
  /// `buf` must be a live buffer from this pool; on `Ok` it must not be used
  /// again unless it was returned.
  pub unsafe fn realloc_buffer(
    &self,
    buf: Option<NonNull<u8>>,
    new_size: usize,
  ) -> Result<Option<NonNull<u8>>> {
    let Some(buf) = buf else {
      return self.alloc_buffer(new_size).map(Some);
    };
    if new_size == 0 {
      unsafe { self.free_buffer(buf)? };
      return Ok(None);
    }

    let old = unsafe { stored_size(buf)? };
    let total = total_for(new_size)?;
    let block = unsafe { self.reallocate(block_of(buf), old, total) }
      .ok_or(PoolError::OutOfMemory(total))?;
    Ok(Some(unsafe { stamp(block, granted_size(total)) }))
  }

  /// Returns a buffer to this pool.
  ///
  /// # Safety
  /// `buf` must be a live buffer from this pool and not be used afterwards.
  pub unsafe fn free_buffer(&self, buf: NonNull<u8>) -> Result<()> {
    let stored = unsafe { stored_size(buf)? };
    unsafe { self.deallocate(block_of(buf), stored) };
    Ok(())
  }
}
