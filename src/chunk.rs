//! Chunk growth: carving class blocks out of a pool's bump region.
//!
//! A pool keeps one bump region. Refills carve batches of blocks from it;
//! when it runs dry the leftover tail is donated to the free lists and a new
//! chunk is requested. If the system allocator refuses, a spare free-list
//! block of a large enough class becomes the new bump region instead.

use core::ptr::{NonNull, null_mut};

use tracing::{debug, warn};

use crate::pool::PoolState;
use crate::size_class::{self, CLASS_COUNT};
use crate::system::SystemMemory;

/// Preferred chunk size requested from the system allocator.
pub const CHUNK_SIZE: usize = 4 << 20;

/// Chunk size tried after [`CHUNK_SIZE`] is refused.
pub const CHUNK_RETRY_SIZE: usize = 2 << 20;

/// Blocks carved per refill for small classes.
pub const REFILL_BATCH: usize = 20;

/// A refill never carves more than this many bytes in one batch.
pub const BIG_OBJECT_BYTES: usize = 64 << 10;

/// Batch size for `size`-byte objects, clamped to [`BIG_OBJECT_BYTES`].
#[inline]
fn batch_for(size: usize, nobjs: usize) -> usize {
  if size > BIG_OBJECT_BYTES {
    1
  } else if size * nobjs > BIG_OBJECT_BYTES {
    BIG_OBJECT_BYTES / size
  } else {
    nobjs
  }
}

impl PoolState {
  /// Carves a batch for `class`, keeps all but the first block on the class
  /// free list, and returns the first.
  pub(crate) fn refill<S: SystemMemory>(&mut self, memory: &S, class: usize) -> Option<NonNull<u8>> {
    let size = size_class::class_size(class);
    let (first, nobjs) = self.chunk_alloc(memory, size, REFILL_BATCH)?;

    self.total[class] += nobjs;
    if nobjs > 1 {
      // The batch is contiguous; blocks after the first go on the list.
      // Linked ahead of the old head: leftover donation may have filled it.
      let rest = unsafe { first.add(size) };
      unsafe { self.free[class].push_run(rest, size, nobjs - 1) };
    }
    Some(first)
  }

  /// Carves up to `nobjs` contiguous `size`-byte blocks.
  ///
  /// Returns the start of the run and the number of blocks actually carved,
  /// or `None` once every fallback is exhausted.
  pub(crate) fn chunk_alloc<S: SystemMemory>(
    &mut self,
    memory: &S,
    size: usize,
    nobjs: usize,
  ) -> Option<(NonNull<u8>, usize)> {
    let mut nobjs = batch_for(size, nobjs);

    loop {
      let left = self.bump_len();
      if left >= size * nobjs {
        return self.carve(size * nobjs).map(|p| (p, nobjs));
      }
      if left >= size {
        nobjs = left / size;
        return self.carve(size * nobjs).map(|p| (p, nobjs));
      }

      self.donate_leftover();
      if self.grow(memory) || self.cannibalize(size_class::index_of(size)) {
        continue;
      }

      warn!(pool = self.id, size, "pool growth failed");
      return None;
    }
  }

  fn carve(&mut self, bytes: usize) -> Option<NonNull<u8>> {
    let start = NonNull::new(self.bump)?;
    self.bump = unsafe { self.bump.add(bytes) };
    Some(start)
  }

  /// Moves the bump region's tail onto the free lists, largest fitting class
  /// first. A tail smaller than the smallest class is abandoned.
  fn donate_leftover(&mut self) {
    while let Some(class) = size_class::floor_index(self.bump_len()) {
      let size = size_class::class_size(class);
      let Some(block) = self.carve(size) else {
        break;
      };
      unsafe { self.free[class].push(block) };
      self.total[class] += 1;
    }
    self.bump = null_mut();
    self.bump_end = null_mut();
  }

  /// Requests a fresh chunk, retrying once at the smaller size.
  fn grow<S: SystemMemory>(&mut self, memory: &S) -> bool {
    for chunk in [CHUNK_SIZE, CHUNK_RETRY_SIZE] {
      if let Some(base) = memory.allocate(chunk) {
        self.bump = base.as_ptr();
        self.bump_end = unsafe { self.bump.add(chunk) };
        self.heap_bytes += chunk;
        debug!(pool = self.id, chunk, heap_bytes = self.heap_bytes, "pool grew");
        return true;
      }
      warn!(pool = self.id, chunk, "system allocator refused chunk");
    }
    false
  }

  /// Turns one free block from `from_class` or above into the bump region.
  fn cannibalize(&mut self, from_class: usize) -> bool {
    for class in from_class..CLASS_COUNT {
      let Some(block) = self.free[class].pop() else {
        continue;
      };
      let size = size_class::class_size(class);
      self.total[class] -= 1;
      self.bump = block.as_ptr();
      self.bump_end = unsafe { self.bump.add(size) };
      warn!(pool = self.id, class, size, "reusing free block as bump space");
      return true;
    }
    false
  }
}
