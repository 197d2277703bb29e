use thiserror::Error;

use crate::registry::POOL_COUNT;

/// Reasons a pool operation is refused.
///
/// The pointer-level entry points flatten these to null or a no-op; the typed
/// [`Pool`](crate::Pool) and buffer methods return them directly.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PoolError {
  #[error("pool index {0} out of range (0..{max})", max = POOL_COUNT)]
  InvalidPool(usize),

  #[error("buffer header records {stored} bytes, not a size this pool grants")]
  CorruptHeader { stored: usize },

  #[error("out of memory allocating {0} bytes")]
  OutOfMemory(usize),

  #[error("free list for class {class} is inconsistent: {reason}")]
  FreeListCorrupt { class: usize, reason: &'static str },
}

pub type Result<T> = std::result::Result<T, PoolError>;
