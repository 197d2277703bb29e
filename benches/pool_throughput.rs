use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;

const OPS: u64 = 100_000;

/// segpool alloc/free throughput on one pool.
fn segpool_alloc_free(size: usize) {
  for _ in 0..OPS {
    unsafe {
      let ptr = segpool::allocate(size, 0);
      black_box(ptr);
      segpool::deallocate(ptr, 0);
    }
  }
}

/// libc alloc/free throughput.
fn libc_malloc_free(size: usize) {
  for _ in 0..OPS {
    unsafe {
      let ptr = libc::malloc(size);
      black_box(ptr);
      libc::free(ptr);
    }
  }
}

/// Grow a buffer through the in-place and moving realloc paths.
fn segpool_realloc_ladder() {
  unsafe {
    let mut ptr = segpool::allocate(16, 1);
    for size in [24, 40, 100, 500, 1400, 9000, 60_000] {
      ptr = segpool::reallocate(ptr, size, 1);
    }
    black_box(ptr);
    segpool::deallocate(ptr, 1);
  }
}

fn benchmark_alloc_throughput(c: &mut Criterion) {
  let mut group = c.benchmark_group("alloc_throughput");

  for size in [16, 64, 256, 1500, 9000] {
    group.throughput(Throughput::Elements(OPS));

    group.bench_with_input(BenchmarkId::new("segpool", size), &size, |b, &size| {
      b.iter(|| segpool_alloc_free(size))
    });

    group.bench_with_input(BenchmarkId::new("libc", size), &size, |b, &size| {
      b.iter(|| libc_malloc_free(size))
    });
  }

  group.finish();
}

fn benchmark_realloc(c: &mut Criterion) {
  c.bench_function("realloc_ladder", |b| b.iter(segpool_realloc_ladder));
}

fn benchmark_burst(c: &mut Criterion) {
  let mut group = c.benchmark_group("alloc_burst");
  group.bench_function("1000x64B", |b| {
    b.iter(|| {
      let bufs: Vec<*mut u8> = (0..1000).map(|_| segpool::allocate(64, 2)).collect();
      for buf in bufs {
        unsafe { segpool::deallocate(black_box(buf), 2) };
      }
    })
  });
  group.finish();
}

criterion_group!(benches, benchmark_alloc_throughput, benchmark_realloc, benchmark_burst);
criterion_main!(benches);
