//! # Crypto Benchmark
//!
//! Per-frame cost (checksum + XTEA) and per-connection cost (RSA decode).

#![allow(missing_docs)]

use ashgate_crypto::{adler32, RsaKey, XteaKey};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

fn bench_frame_primitives(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_primitives");
    let key = XteaKey([0x1234_5678, 0x9ABC_DEF0, 0x0F1E_2D3C, 0x4B5A_6978]);

    for size in [64usize, 1024, 16 * 1024] {
        let mut data = vec![0x5Au8; size];
        group.throughput(Throughput::Bytes(size as u64));

        group.bench_with_input(BenchmarkId::new("adler32", size), &size, |b, _| {
            b.iter(|| adler32(black_box(&data)));
        });
        group.bench_with_input(BenchmarkId::new("xtea_encrypt", size), &size, |b, _| {
            b.iter(|| key.encrypt(black_box(&mut data)));
        });
    }

    group.finish();
}

fn bench_rsa_decode(c: &mut Criterion) {
    let key = RsaKey::builtin().expect("builtin key");
    let mut block = [0u8; 128];
    for (i, byte) in block.iter_mut().enumerate().skip(1) {
        *byte = i as u8;
    }
    let encoded = key.encode(&mut block, 128).expect("encode");
    let ciphertext = block;

    c.bench_function("rsa_decode_crt", |b| {
        b.iter(|| {
            let mut buf = ciphertext;
            black_box(key.decode(&mut buf, encoded))
        });
    });
}

criterion_group!(benches, bench_frame_primitives, bench_rsa_decode);
criterion_main!(benches);
