//! Millisecond ticks and timer ids for the networking layer above the pools.

use core::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::Instant;

/// Extends a wrapping 32-bit millisecond counter to 64 bits.
///
/// Each observer keeps its own high word. A reading lower than the previous
/// one means the counter wrapped, so the high word advances.
#[derive(Debug, Default, Clone, Copy)]
pub struct TickExtender {
  high: u32,
  last_low: u32,
}

impl TickExtender {
  pub const fn new() -> Self {
    Self { high: 0, last_low: 0 }
  }

  /// Feeds the next raw reading and returns the extended tick.
  pub fn extend(&mut self, low: u32) -> u64 {
    if low < self.last_low {
      self.high = self.high.wrapping_add(1);
    }
    self.last_low = low;
    ((self.high as u64) << 32) | low as u64
  }
}

/// Milliseconds since the first call in this process. Never decreases.
pub fn monotonic_ms() -> u64 {
  static EPOCH: OnceLock<Instant> = OnceLock::new();
  EPOCH.get_or_init(Instant::now).elapsed().as_millis() as u64
}

/// Source of strictly increasing, never-zero ids.
#[derive(Debug)]
pub struct TimerIds {
  next: AtomicU64,
}

impl TimerIds {
  pub const fn new() -> Self {
    Self {
      next: AtomicU64::new(1),
    }
  }

  pub fn next_id(&self) -> u64 {
    self.next.fetch_add(1, Ordering::Relaxed)
  }
}

impl Default for TimerIds {
  fn default() -> Self {
    Self::new()
  }
}
