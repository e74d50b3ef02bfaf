//! # Arena Benchmark
//!
//! Measures bump allocation and pooled buffer recycling.
//!
//! Target: pooled acquire/release stays flat no matter how long the server runs.

#![allow(missing_docs)]

use std::rc::Rc;

use ashgate_core::{Arena, BufferPool};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

/// Bump allocation of small blocks from a fresh arena
fn bench_arena_alloc(c: &mut Criterion) {
    let mut group = c.benchmark_group("arena_alloc");

    for size in [64usize, 2048, 16 * 1024] {
        group.bench_with_input(BenchmarkId::new("alloc", size), &size, |b, &size| {
            b.iter_batched(
                || Arena::reserve(64 * 1024 * 1024, 1024 * 1024).expect("reserve"),
                |arena| {
                    for _ in 0..256 {
                        black_box(arena.alloc(size, 8));
                    }
                },
                criterion::BatchSize::LargeInput,
            );
        });
    }

    group.finish();
}

/// Steady-state acquire/release through the buffer pool
fn bench_buffer_pool(c: &mut Criterion) {
    let arena = Rc::new(Arena::reserve(16 * 1024 * 1024, 1024 * 1024).expect("reserve"));
    let mut pool = BufferPool::new(arena, 16 * 1024);

    c.bench_function("buffer_pool_cycle", |b| {
        b.iter(|| {
            let block = pool.acquire();
            pool.release(black_box(block));
        });
    });
}

criterion_group!(benches, bench_arena_alloc, bench_buffer_pool);
criterion_main!(benches);
