//! Envelope and PIN derivation benchmarks
//!
//! Benchmarks cover:
//! - PIN to key derivation
//! - Envelope sealing and opening at key-file sizes

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use pdfseal::keys::envelope::{decrypt, encrypt};
use pdfseal::keys::derive_key;

/// A 4096-bit PKCS#1 PEM is a little over 3 KiB.
const SIZES: [usize; 4] = [256, 1024, 3272, 16 * 1024];

fn bench_derive(c: &mut Criterion) {
    c.bench_function("derive_key", |b| b.iter(|| derive_key(black_box("4821"))));
}

fn bench_envelope(c: &mut Criterion) {
    let key = derive_key("4821").expect("valid pin");
    let mut group = c.benchmark_group("envelope");

    for &size in &SIZES {
        let plaintext = vec![0x42u8; size];
        let sealed = encrypt(&plaintext, &key).expect("encrypt");
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("encrypt", size), &plaintext, |b, data| {
            b.iter(|| encrypt(black_box(data), &key))
        });
        group.bench_with_input(BenchmarkId::new("decrypt", size), &sealed, |b, data| {
            b.iter(|| decrypt(black_box(data), &key))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_derive, bench_envelope);
criterion_main!(benches);
