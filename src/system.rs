//! The system allocator behind the pools.
//!
//! Pools only talk to the system allocator for two things: fresh chunks and
//! oversize passthrough. Both go through [`SystemMemory`] so the growth
//! fallback path can be driven with an allocator that runs dry.

use core::ptr::NonNull;

/// Backing allocator for chunk growth and oversize requests.
///
/// Returned memory must be aligned to at least the machine word.
pub trait SystemMemory: Send + Sync {
  /// Requests `size` bytes. `None` means the system is out of memory.
  fn allocate(&self, size: usize) -> Option<NonNull<u8>>;

  /// Releases memory from [`SystemMemory::allocate`] or
  /// [`SystemMemory::reallocate`].
  ///
  /// # Safety
  /// `ptr` must come from this allocator and not have been released.
  unsafe fn deallocate(&self, ptr: NonNull<u8>);

  /// Resizes `ptr` to `size` bytes, preserving the common prefix. On `None`
  /// the original block is untouched.
  ///
  /// # Safety
  /// `ptr` must come from this allocator and not have been released.
  unsafe fn reallocate(&self, ptr: NonNull<u8>, size: usize) -> Option<NonNull<u8>>;
}

/// The C library heap.
#[derive(Debug, Default, Clone, Copy)]
pub struct LibcMemory;

impl SystemMemory for LibcMemory {
  #[inline]
  fn allocate(&self, size: usize) -> Option<NonNull<u8>> {
    NonNull::new(unsafe { libc::malloc(size.max(1)) } as *mut u8)
  }

  #[inline]
  unsafe fn deallocate(&self, ptr: NonNull<u8>) {
    unsafe { libc::free(ptr.as_ptr().cast()) };
  }

  #[inline]
  unsafe fn reallocate(&self, ptr: NonNull<u8>, size: usize) -> Option<NonNull<u8>> {
    NonNull::new(unsafe { libc::realloc(ptr.as_ptr().cast(), size.max(1)) } as *mut u8)
  }
}

#[cfg(test)]
pub(crate) mod testing {
  use super::*;
  use core::sync::atomic::{AtomicUsize, Ordering};

  /// Libc-backed memory that refuses requests above `largest` bytes and
  /// stops granting after `grants` successful allocations.
  pub(crate) struct Budget {
    grants: AtomicUsize,
    largest: usize,
  }

  impl Budget {
    pub(crate) fn new(grants: usize, largest: usize) -> Self {
      Self {
        grants: AtomicUsize::new(grants),
        largest,
      }
    }

    pub(crate) fn unlimited() -> Self {
      Self::new(usize::MAX, usize::MAX)
    }

    pub(crate) fn exhausted() -> Self {
      Self::new(0, 0)
    }
  }

  impl SystemMemory for Budget {
    fn allocate(&self, size: usize) -> Option<NonNull<u8>> {
      if size > self.largest {
        return None;
      }
      self
        .grants
        .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |g| g.checked_sub(1))
        .ok()?;
      LibcMemory.allocate(size)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>) {
      unsafe { LibcMemory.deallocate(ptr) };
    }

    unsafe fn reallocate(&self, ptr: NonNull<u8>, size: usize) -> Option<NonNull<u8>> {
      if size > self.largest {
        return None;
      }
      unsafe { LibcMemory.reallocate(ptr, size) }
    }
  }
}
