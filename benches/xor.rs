//! Criterion benchmarks for the XOR engine.
//!
//! Run with:
//!   cargo bench --bench xor

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use pirstore::xor::{xor_into, AlignedBuf};

fn bench_xor_into(c: &mut Criterion) {
    let mut group = c.benchmark_group("xor_into");

    for &len in &[4_096usize, 65_536, 1_048_576] {
        let mut dest = AlignedBuf::zeroed(len).unwrap();
        let mut src = AlignedBuf::zeroed(len).unwrap();
        for (i, b) in src.as_mut_slice().iter_mut().enumerate() {
            *b = (i % 251) as u8;
        }

        group.throughput(Throughput::Bytes(len as u64));
        group.bench_with_input(BenchmarkId::new("aligned", len), &len, |b, _| {
            b.iter(|| xor_into(dest.as_mut_slice(), src.as_slice()))
        });

        // Shared misalignment: head and tail leave the vector path.
        group.bench_with_input(BenchmarkId::new("offset_3", len), &len, |b, _| {
            b.iter(|| {
                let (d, s) = (dest.as_mut_slice(), src.as_slice());
                xor_into(&mut d[3..len - 5], &s[3..len - 5]);
            })
        });
    }
    group.finish();
}

fn bench_xor_buffers(c: &mut Criterion) {
    let mut group = c.benchmark_group("xor_buffers");

    for &len in &[4_096usize, 262_144] {
        let a: Vec<u8> = (0..len).map(|i| (i % 253) as u8).collect();
        let b_buf: Vec<u8> = (0..len).map(|i| (i % 241) as u8).collect();
        group.throughput(Throughput::Bytes(len as u64));
        group.bench_with_input(BenchmarkId::from_parameter(len), &len, |bench, _| {
            bench.iter(|| pirstore::xor_buffers(&a, &b_buf).unwrap())
        });
    }
    group.finish();
}

criterion_group!(benches, bench_xor_into, bench_xor_buffers);
criterion_main!(benches);
