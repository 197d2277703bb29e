//! C ABI (enabled with --features c_api).
//!
//! Thin wrappers over the pointer API with C-friendly integer types.

use crate::{PoolInfo, allocate, deallocate, get_info, reallocate, usable_size};

#[unsafe(no_mangle)]
pub extern "C" fn segpool_alloc(size: usize, pool: u32) -> *mut u8 {
  allocate(size, pool as usize)
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn segpool_realloc(buf: *mut u8, size: usize, pool: u32) -> *mut u8 {
  unsafe { reallocate(buf, size, pool as usize) }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn segpool_free(buf: *mut u8, pool: u32) {
  unsafe { deallocate(buf, pool as usize) }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn segpool_usable_size(buf: *mut u8) -> usize {
  unsafe { usable_size(buf) }
}

/// Fills `out` with a snapshot of `pool`. Returns 0 on success, 22 (EINVAL)
/// for a null `out` or an out-of-range pool, in which case `out` is zeroed.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn segpool_info(pool: u32, out: *mut PoolInfo) -> i32 {
  if out.is_null() {
    return 22; // EINVAL
  }
  let valid = (pool as usize) < crate::POOL_COUNT;
  unsafe { out.write(get_info(pool as usize)) };
  if valid { 0 } else { 22 }
}
