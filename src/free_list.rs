//! Intrusive per-class free lists.
//!
//! A free block stores the link to the next free block in its first word.
//! That word only means something while the block sits on a list: once `pop`
//! hands a block out, the list forgets it and never reads it again until it
//! comes back through `push`. This is the only place block memory is
//! reinterpreted as a link.

use core::ptr::{NonNull, null_mut};
use std::collections::HashSet;

#[repr(C)]
struct FreeBlock {
  next: *mut FreeBlock,
}

/// Singly-linked stack of released blocks of one size class.
pub(crate) struct FreeList {
  head: *mut FreeBlock,
}

impl FreeList {
  pub(crate) const fn new() -> Self {
    Self { head: null_mut() }
  }

  #[inline]
  pub(crate) fn is_empty(&self) -> bool {
    self.head.is_null()
  }

  /// Address of the head block, for diagnostics only.
  #[inline]
  pub(crate) fn head_addr(&self) -> usize {
    self.head as usize
  }

  /// Takes ownership of `block`.
  ///
  /// # Safety
  /// `block` must be word-aligned, at least one word long, and not reachable
  /// from this or any other list.
  #[inline]
  pub(crate) unsafe fn push(&mut self, block: NonNull<u8>) {
    let node = block.as_ptr() as *mut FreeBlock;
    unsafe { node.write(FreeBlock { next: self.head }) };
    self.head = node;
  }

  /// Hands the head block to the caller.
  #[inline]
  pub(crate) fn pop(&mut self) -> Option<NonNull<u8>> {
    let node = NonNull::new(self.head)?;
    // Every node was written by `push` or `push_run` and is still owned here.
    self.head = unsafe { node.as_ptr().read().next };
    Some(node.cast())
  }

  /// Links `count` contiguous blocks of `size` bytes starting at `first`,
  /// in address order, ahead of the current head.
  ///
  /// # Safety
  /// The `count * size` bytes at `first` must be unused, word-aligned and
  /// owned by the caller; `size` must be a multiple of the word size.
  pub(crate) unsafe fn push_run(&mut self, first: NonNull<u8>, size: usize, count: usize) {
    if count == 0 {
      return;
    }
    let base = first.as_ptr();
    for i in 0..count - 1 {
      unsafe {
        let node = base.add(i * size) as *mut FreeBlock;
        let next = base.add((i + 1) * size) as *mut FreeBlock;
        node.write(FreeBlock { next });
      }
    }
    unsafe {
      let last = base.add((count - 1) * size) as *mut FreeBlock;
      last.write(FreeBlock { next: self.head });
    }
    self.head = base as *mut FreeBlock;
  }

  /// Whether `block` is currently linked. Walks the whole list.
  #[cfg_attr(not(feature = "debug-tripwire"), allow(dead_code))]
  pub(crate) fn contains(&self, block: NonNull<u8>) -> bool {
    let target = block.as_ptr() as *mut FreeBlock;
    let mut cur = self.head;
    while !cur.is_null() {
      if cur == target {
        return true;
      }
      cur = unsafe { (*cur).next };
    }
    false
  }

  /// Walks the list checking it holds exactly `expected` distinct blocks.
  ///
  /// Stops after `expected + 1` nodes, so a cycle cannot hang the walk.
  pub(crate) fn verify(&self, expected: usize) -> Result<(), &'static str> {
    let mut seen = HashSet::with_capacity(expected);
    let mut cur = self.head;
    while !cur.is_null() {
      if !seen.insert(cur as usize) {
        return Err("block linked twice");
      }
      if seen.len() > expected {
        return Err("more free blocks than the counters allow");
      }
      cur = unsafe { (*cur).next };
    }
    if seen.len() < expected {
      return Err("fewer free blocks than the counters require");
    }
    Ok(())
  }
}
