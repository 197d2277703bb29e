//! The ten process-wide pools.
//!
//! Pools are created together on first use and never torn down. Subsystems
//! pick a fixed index so unrelated traffic never shares a lock.

use std::sync::OnceLock;

use crate::error::{PoolError, Result};
use crate::pool::Pool;

/// Number of independent pools.
pub const POOL_COUNT: usize = 10;

static POOLS: OnceLock<[Pool; POOL_COUNT]> = OnceLock::new();

/// Validated pool index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PoolId(u8);

impl PoolId {
  pub const fn new(index: usize) -> Option<Self> {
    if index < POOL_COUNT {
      Some(Self(index as u8))
    } else {
      None
    }
  }

  #[inline]
  pub const fn index(self) -> usize {
    self.0 as usize
  }

  /// Every valid id, in order.
  pub fn all() -> impl Iterator<Item = PoolId> {
    (0..POOL_COUNT).map(|i| PoolId(i as u8))
  }
}

impl TryFrom<usize> for PoolId {
  type Error = PoolError;

  fn try_from(index: usize) -> Result<Self> {
    PoolId::new(index).ok_or(PoolError::InvalidPool(index))
  }
}

fn pools() -> &'static [Pool; POOL_COUNT] {
  POOLS.get_or_init(|| std::array::from_fn(Pool::new))
}

/// The pool registered under `id`.
#[inline]
pub fn get(id: PoolId) -> &'static Pool {
  &pools()[id.index()]
}

/// The pool registered under a raw index.
pub fn pool(index: usize) -> Result<&'static Pool> {
  PoolId::try_from(index).map(get)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn rejects_out_of_range_indices() {
    assert!(PoolId::new(POOL_COUNT - 1).is_some());
    assert!(PoolId::new(POOL_COUNT).is_none());
    assert_eq!(pool(10).err(), Some(PoolError::InvalidPool(10)));
    assert_eq!(pool(usize::MAX).err(), Some(PoolError::InvalidPool(usize::MAX)));
  }

  #[test]
  fn indices_resolve_to_distinct_pools() {
    let addrs: Vec<_> = PoolId::all().map(|id| get(id) as *const Pool).collect();
    assert_eq!(addrs.len(), POOL_COUNT);
    for (i, a) in addrs.iter().enumerate() {
      for b in &addrs[i + 1..] {
        assert_ne!(a, b);
      }
      assert!(core::ptr::eq(*a, pool(i).unwrap()));
    }
  }

  #[test]
  fn concurrent_first_use_sees_one_registry() {
    let addrs: Vec<usize> = std::thread::scope(|s| {
      let handles: Vec<_> = (0..8)
        .map(|_| s.spawn(|| pools() as *const _ as usize))
        .collect();
      handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    assert!(addrs.windows(2).all(|w| w[0] == w[1]));
  }
}
