//! Size classes for pooled allocations.
//!
//! Every pooled block is exactly one of these sizes. Sizes are multiples of
//! the word size so blocks carved back to back from a chunk stay aligned. The
//! `2^k + 8` entries leave room for a power-of-two payload plus a small prefix.

/// Number of size classes.
pub const CLASS_COUNT: usize = 57;

#[rustfmt::skip]
const CLASS_SIZES: [usize; CLASS_COUNT] = [
  16, 24, 32, 40, 48, 56, 64, 72,
  80, 96, 112, 128, 136, 160, 192, 224,
  256, 264, 320, 384, 448, 512, 520, 640,
  768, 896, 1024, 1032, 1280, 1536, 1792, 2048,
  2056, 2560, 3072, 3584, 4096, 4104, 5120, 6144,
  7168, 8192, 8200, 10240, 12288, 14336, 16384, 16392,
  20480, 24576, 28672, 32768, 32776, 49152, 65544, 98304,
  131080,
];

/// Smallest block the pools hand out.
pub const MIN_CLASS_SIZE: usize = CLASS_SIZES[0];

/// Largest pooled size. Anything bigger goes to the system allocator.
pub const MAX_CLASS_SIZE: usize = CLASS_SIZES[CLASS_COUNT - 1];

const fn strictly_increasing(table: &[usize]) -> bool {
  let mut i = 1;
  while i < table.len() {
    if table[i] <= table[i - 1] {
      return false;
    }
    i += 1;
  }
  true
}

const fn word_multiples(table: &[usize]) -> bool {
  let mut i = 0;
  while i < table.len() {
    if table[i] % size_of::<usize>() != 0 {
      return false;
    }
    i += 1;
  }
  true
}

const _: () = assert!(strictly_increasing(&CLASS_SIZES));
const _: () = assert!(word_multiples(&CLASS_SIZES));
const _: () = assert!(MIN_CLASS_SIZE >= size_of::<*mut u8>());
const _: () = assert!(MAX_CLASS_SIZE == 128 * 1024 + 8);

/// Index of the smallest class that holds `bytes`.
///
/// Sizes at or below the first class map to 0 and sizes at or above the last
/// class map to the last index; callers filter oversize requests first.
#[inline]
pub fn index_of(bytes: usize) -> usize {
  if bytes <= MIN_CLASS_SIZE {
    return 0;
  }
  if bytes >= MAX_CLASS_SIZE {
    return CLASS_COUNT - 1;
  }
  match CLASS_SIZES.binary_search(&bytes) {
    Ok(i) | Err(i) => i,
  }
}

/// Index of the largest class that fits inside `bytes`, if any.
#[inline]
pub fn floor_index(bytes: usize) -> Option<usize> {
  match CLASS_SIZES.binary_search(&bytes) {
    Ok(i) => Some(i),
    Err(0) => None,
    Err(i) => Some(i - 1),
  }
}

/// Byte size of class `index`.
#[inline(always)]
pub fn class_size(index: usize) -> usize {
  CLASS_SIZES[index]
}

/// Rounds `bytes` up to its class size.
#[inline]
pub fn round_up(bytes: usize) -> usize {
  CLASS_SIZES[index_of(bytes)]
}

/// The full table, in ascending order.
pub fn class_sizes() -> &'static [usize; CLASS_COUNT] {
  &CLASS_SIZES
}
