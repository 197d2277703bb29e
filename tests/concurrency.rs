//! Threads on separate pools run independently; threads sharing a pool never
//! receive the same block twice or leave its free lists damaged.

use std::thread;

use segpool::{CHUNK_SIZE, HEADER_BYTES, allocate, deallocate, get_info, reallocate, registry, usable_size};

const SHARED_POOL: usize = 9;

#[derive(Clone, Copy, Debug)]
struct XorShift64 {
  state: u64,
}

impl XorShift64 {
  fn new(seed: u64) -> Self {
    Self { state: seed }
  }

  fn next_u64(&mut self) -> u64 {
    let mut x = self.state;
    x ^= x >> 12;
    x ^= x << 25;
    x ^= x >> 27;
    self.state = x;
    x.wrapping_mul(0x2545_F491_4F6C_DD1D)
  }

  fn gen_range_usize(&mut self, low: usize, high_inclusive: usize) -> usize {
    let span = high_inclusive - low + 1;
    low + (self.next_u64() as usize % span)
  }
}

/// Fills the first bytes of `buf` with a tag unique to its current owner.
unsafe fn stamp(buf: *mut u8, tag: u64) {
  unsafe { (buf as *mut u64).write_unaligned(tag) };
}

unsafe fn assert_stamp(buf: *mut u8, tag: u64) {
  let found = unsafe { (buf as *const u64).read_unaligned() };
  assert_eq!(found, tag, "buffer {buf:p} was handed to another owner");
}

#[test]
fn distinct_pools_do_not_interfere() {
  let workers = SHARED_POOL;

  thread::scope(|s| {
    for pool in 0..workers {
      s.spawn(move || {
        let size = 64 * (pool + 1);
        for round in 0..20 {
          let bufs: Vec<_> = (0..500).map(|_| allocate(size, pool)).collect();
          for (i, &buf) in bufs.iter().enumerate() {
            assert!(!buf.is_null());
            unsafe { buf.write_bytes((pool + i + round) as u8, size) };
          }
          for (i, &buf) in bufs.iter().enumerate() {
            let byte = (pool + i + round) as u8;
            for off in [0, size / 2, size - 1] {
              assert_eq!(unsafe { buf.add(off).read() }, byte);
            }
            unsafe { deallocate(buf, pool) };
          }
        }
      });
    }
  });

  for pool in 0..workers {
    let info = get_info(pool);
    let class = segpool::size_class::index_of(64 * (pool + 1) + HEADER_BYTES);
    assert_eq!(info.busy_objects(), 0, "pool {pool}");
    assert_eq!(info.heap_bytes, CHUNK_SIZE, "pool {pool}");
    // Only this pool's own class was ever carved.
    for (c, &total) in info.total.iter().enumerate() {
      if c == class {
        assert!(total >= 500, "pool {pool}");
      } else {
        assert_eq!(total, 0, "pool {pool} class {c}");
      }
    }
    registry::pool(pool).unwrap().check_integrity().unwrap();
  }
}

#[test]
fn shared_pool_survives_random_churn() {
  const THREADS: u64 = 8;
  const STEPS: usize = 5_000;
  const SLOTS: usize = 64;

  thread::scope(|s| {
    for seed in 1..=THREADS {
      s.spawn(move || {
        let mut rng = XorShift64::new(seed);
        let mut bufs = [std::ptr::null_mut::<u8>(); SLOTS];
        let mut tags = [0u64; SLOTS];

        for step in 0..STEPS {
          let slot = rng.gen_range_usize(0, SLOTS - 1);
          let tag = (seed << 48) | ((slot as u64) << 32) | step as u64;
          let buf = bufs[slot];

          match rng.gen_range_usize(0, 9) {
            // Fresh allocation, or release of whatever sits in the slot.
            0..=4 => unsafe {
              if buf.is_null() {
                let size = rng.gen_range_usize(8, 3000);
                let fresh = allocate(size, SHARED_POOL);
                assert!(!fresh.is_null());
                stamp(fresh, tag);
                bufs[slot] = fresh;
                tags[slot] = tag;
              } else {
                assert_stamp(buf, tags[slot]);
                deallocate(buf, SHARED_POOL);
                bufs[slot] = std::ptr::null_mut();
              }
            },
            // Resize, occasionally into the oversize range.
            5..=8 if !buf.is_null() => unsafe {
              assert_stamp(buf, tags[slot]);
              let size = if rng.gen_range_usize(0, 49) == 0 {
                rng.gen_range_usize(140_000, 200_000)
              } else {
                rng.gen_range_usize(8, 6000)
              };
              let moved = reallocate(buf, size, SHARED_POOL);
              assert!(!moved.is_null());
              assert!(usable_size(moved) >= size);
              assert_stamp(moved, tags[slot]);
              stamp(moved, tag);
              bufs[slot] = moved;
              tags[slot] = tag;
            },
            _ => {}
          }
        }

        for (slot, &buf) in bufs.iter().enumerate() {
          if !buf.is_null() {
            unsafe {
              assert_stamp(buf, tags[slot]);
              deallocate(buf, SHARED_POOL);
            }
          }
        }
      });
    }
  });

  let info = get_info(SHARED_POOL);
  assert_eq!(info.busy_objects(), 0);
  registry::pool(SHARED_POOL).unwrap().check_integrity().unwrap();
}
