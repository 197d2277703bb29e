//! A single lock-protected pool.
//!
//! All mutation of a pool's free lists, bump region and counters happens with
//! its mutex held, including oversize passthrough so every entry point has
//! one critical section.

use core::ptr::{self, NonNull, null_mut};

use parking_lot::Mutex;
use tracing::warn;

use crate::error::PoolError;
use crate::free_list::FreeList;
use crate::size_class::{self, CLASS_COUNT, MAX_CLASS_SIZE};
use crate::system::{LibcMemory, SystemMemory};

// =============================================================================
// Snapshot types
// =============================================================================

/// Opaque identity of a free-list head. Only useful for comparing snapshots.
#[repr(transparent)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FreeListToken(usize);

impl FreeListToken {
  pub const EMPTY: Self = Self(0);

  #[inline]
  pub fn is_empty(self) -> bool {
    self.0 == 0
  }
}

/// Point-in-time view of a pool, copied out under its lock.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolInfo {
  pub free_list_heads: [FreeListToken; CLASS_COUNT],
  pub class_sizes: [usize; CLASS_COUNT],
  /// Objects per class currently held by callers.
  pub busy: [usize; CLASS_COUNT],
  /// Objects per class ever carved or donated, minus cannibalized ones.
  pub total: [usize; CLASS_COUNT],
  /// Bytes obtained from the system allocator as chunks.
  pub heap_bytes: usize,
}

impl PoolInfo {
  /// All-zero snapshot, reported for out-of-range pool indices.
  pub const ZEROED: Self = Self {
    free_list_heads: [FreeListToken::EMPTY; CLASS_COUNT],
    class_sizes: [0; CLASS_COUNT],
    busy: [0; CLASS_COUNT],
    total: [0; CLASS_COUNT],
    heap_bytes: 0,
  };

  pub fn busy_objects(&self) -> usize {
    self.busy.iter().sum()
  }

  /// Blocks sitting on free lists.
  pub fn free_objects(&self) -> usize {
    self.total.iter().zip(&self.busy).map(|(t, b)| t - b).sum()
  }
}

impl Default for PoolInfo {
  fn default() -> Self {
    Self::ZEROED
  }
}

// =============================================================================
// Pool state
// =============================================================================

/// Everything behind the pool lock.
pub(crate) struct PoolState {
  /// Registry index, for log context.
  pub(crate) id: usize,
  pub(crate) free: [FreeList; CLASS_COUNT],
  /// Next unused byte of the bump region.
  pub(crate) bump: *mut u8,
  /// End of the bump region.
  pub(crate) bump_end: *mut u8,
  pub(crate) heap_bytes: usize,
  pub(crate) busy: [usize; CLASS_COUNT],
  pub(crate) total: [usize; CLASS_COUNT],
}

// Raw pointers only ever touched with the owning pool's mutex held.
unsafe impl Send for PoolState {}

impl PoolState {
  pub(crate) const fn new(id: usize) -> Self {
    Self {
      id,
      free: [const { FreeList::new() }; CLASS_COUNT],
      bump: null_mut(),
      bump_end: null_mut(),
      heap_bytes: 0,
      busy: [0; CLASS_COUNT],
      total: [0; CLASS_COUNT],
    }
  }

  #[inline]
  pub(crate) fn bump_len(&self) -> usize {
    self.bump_end as usize - self.bump as usize
  }
}

// =============================================================================
// Pool
// =============================================================================

/// Size actually granted for a request of `n` bytes.
///
/// Pooled requests get their whole class; oversize requests get exactly `n`.
#[inline]
pub fn granted_size(n: usize) -> usize {
  if n > MAX_CLASS_SIZE { n } else { size_class::round_up(n) }
}

/// One independently locked allocator instance.
pub struct Pool<S: SystemMemory = LibcMemory> {
  memory: S,
  state: Mutex<PoolState>,
}

impl Pool<LibcMemory> {
  /// A pool backed by the C library heap. `id` only labels log events.
  pub fn new(id: usize) -> Self {
    Self::with_memory(id, LibcMemory)
  }
}

impl<S: SystemMemory> Pool<S> {
  pub fn with_memory(id: usize, memory: S) -> Self {
    Self {
      memory,
      state: Mutex::new(PoolState::new(id)),
    }
  }

  /// Allocates a block of at least `n` bytes.
  ///
  /// Requests above [`MAX_CLASS_SIZE`] go straight to the system allocator.
  pub fn allocate(&self, n: usize) -> Option<NonNull<u8>> {
    let mut state = self.state.lock();
    self.allocate_locked(&mut state, n)
  }

  /// Returns a block to the pool.
  ///
  /// # Safety
  /// `ptr` must come from [`Pool::allocate`] or [`Pool::reallocate`] on this
  /// pool with a size in the same class as `n` (exactly `n` if oversize),
  /// and must not be used afterwards.
  pub unsafe fn deallocate(&self, ptr: NonNull<u8>, n: usize) {
    let mut state = self.state.lock();
    unsafe { self.deallocate_locked(&mut state, ptr, n) };
  }

  /// Resizes a block from `old` to `new` bytes.
  ///
  /// Returns `ptr` itself when both sizes round to the same class. `new == 0`
  /// releases the block and returns `None`. On allocation failure returns
  /// `None` and leaves `ptr` valid.
  ///
  /// # Safety
  /// Same contract as [`Pool::deallocate`] for `ptr` and `old`.
  pub unsafe fn reallocate(&self, ptr: NonNull<u8>, old: usize, new: usize) -> Option<NonNull<u8>> {
    if new == 0 {
      unsafe { self.deallocate(ptr, old) };
      return None;
    }

    let mut state = self.state.lock();

    if old > MAX_CLASS_SIZE && new > MAX_CLASS_SIZE {
      return unsafe { self.memory.reallocate(ptr, new) };
    }

    if old <= MAX_CLASS_SIZE
      && new <= MAX_CLASS_SIZE
      && size_class::round_up(old) == size_class::round_up(new)
    {
      return Some(ptr);
    }

    let fresh = self.allocate_locked(&mut state, new)?;
    unsafe {
      ptr::copy_nonoverlapping(ptr.as_ptr(), fresh.as_ptr(), old.min(new));
      self.deallocate_locked(&mut state, ptr, old);
    }
    Some(fresh)
  }

  pub fn info(&self) -> PoolInfo {
    let state = self.state.lock();
    let mut info = PoolInfo::ZEROED;
    for class in 0..CLASS_COUNT {
      info.free_list_heads[class] = FreeListToken(state.free[class].head_addr());
    }
    info.class_sizes = *size_class::class_sizes();
    info.busy = state.busy;
    info.total = state.total;
    info.heap_bytes = state.heap_bytes;
    info
  }

  /// Verifies every free list against the counters: each list must be
  /// acyclic, free of duplicates, and hold exactly `total - busy` blocks.
  pub fn check_integrity(&self) -> Result<(), PoolError> {
    let state = self.state.lock();
    if state.bump_end < state.bump {
      return Err(PoolError::FreeListCorrupt {
        class: 0,
        reason: "bump region end precedes start",
      });
    }
    for class in 0..CLASS_COUNT {
      let (total, busy) = (state.total[class], state.busy[class]);
      if busy > total {
        return Err(PoolError::FreeListCorrupt {
          class,
          reason: "more busy objects than carved",
        });
      }
      state.free[class]
        .verify(total - busy)
        .map_err(|reason| PoolError::FreeListCorrupt { class, reason })?;
    }
    Ok(())
  }

  fn allocate_locked(&self, state: &mut PoolState, n: usize) -> Option<NonNull<u8>> {
    if n > MAX_CLASS_SIZE {
      return self.memory.allocate(n);
    }

    let class = size_class::index_of(n);
    let block = match state.free[class].pop() {
      Some(block) => block,
      None => state.refill(&self.memory, class)?,
    };
    state.busy[class] += 1;
    Some(block)
  }

  unsafe fn deallocate_locked(&self, state: &mut PoolState, ptr: NonNull<u8>, n: usize) {
    if n > MAX_CLASS_SIZE {
      unsafe { self.memory.deallocate(ptr) };
      return;
    }

    let class = size_class::index_of(n);
    if state.busy[class] == 0 {
      warn!(pool = state.id, class, ptr = ?ptr, "free of a block this pool never handed out ignored");
      return;
    }

    #[cfg(feature = "debug-tripwire")]
    {
      if state.free[class].contains(ptr) {
        tracing::error!(pool = state.id, class, ptr = ?ptr, "double free ignored");
        return;
      }
      let word = size_of::<*mut u8>();
      unsafe {
        ptr
          .as_ptr()
          .add(word)
          .write_bytes(0xDD, size_class::class_size(class) - word)
      };
    }

    unsafe { state.free[class].push(ptr) };
    state.busy[class] -= 1;
  }
}
