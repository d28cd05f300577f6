//! Criterion benchmarks for the bitstring reducers: plain vs precomputed,
//! single vs batched multi-query.
//!
//! Run with:
//!   cargo bench --bench reduce

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use pirstore::Registry;

/// Deterministic byte stream for query bitstrings.
fn query_bytes(len: usize, seed: u32) -> Vec<u8> {
    let mut state = seed.wrapping_mul(0x9E37_79B9) | 1;
    (0..len)
        .map(|_| {
            state = state.wrapping_mul(1664525).wrapping_add(1013904223);
            (state >> 24) as u8
        })
        .collect()
}

fn populated_registry(block_size: usize, num_blocks: usize) -> (Registry, pirstore::Descriptor) {
    let mut reg = Registry::new();
    let d = reg.allocate(block_size, num_blocks).unwrap();
    for i in 0..num_blocks {
        let block = query_bytes(block_size, i as u32 + 7);
        reg.set_data(d, i * block_size, &block).unwrap();
    }
    reg.do_preprocessing(d).unwrap();
    (reg, d)
}

fn bench_single_reduction(c: &mut Criterion) {
    let mut group = c.benchmark_group("single_reduction");

    // A half-set query touches half the table per reduction either way;
    // throughput is measured in datastore bytes walked.
    for &(block_size, num_blocks) in &[(4_096usize, 256usize), (4_096, 1_024)] {
        let (reg, d) = populated_registry(block_size, num_blocks);
        let bits = query_bytes(num_blocks / 8, 42);
        let touched = (block_size * num_blocks) as u64;

        group.throughput(Throughput::Bytes(touched));
        group.bench_with_input(
            BenchmarkId::new("plain", num_blocks),
            &bits,
            |b, bits| b.iter(|| reg.produce_xor_from_bitstring(d, bits, false).unwrap()),
        );
        group.bench_with_input(
            BenchmarkId::new("precomputed", num_blocks),
            &bits,
            |b, bits| b.iter(|| reg.produce_xor_from_bitstring(d, bits, true).unwrap()),
        );
    }
    group.finish();
}

fn bench_multi_reduction(c: &mut Criterion) {
    let mut group = c.benchmark_group("multi_reduction");

    let block_size = 4_096;
    let num_blocks = 256;
    let (reg, d) = populated_registry(block_size, num_blocks);
    let slice_len = num_blocks / 8;

    for &n in &[2u32, 4, 8] {
        let concat: Vec<u8> = (0..n).flat_map(|j| query_bytes(slice_len, j + 99)).collect();
        let touched = (block_size * num_blocks) as u64 * n as u64;

        group.throughput(Throughput::Bytes(touched));
        group.bench_with_input(BenchmarkId::new("batched", n), &concat, |b, concat| {
            b.iter(|| reg.produce_xor_from_bitstrings(d, concat, n, true).unwrap())
        });
        // Baseline: the same queries issued one at a time.
        group.bench_with_input(BenchmarkId::new("singles", n), &concat, |b, concat| {
            b.iter(|| {
                for j in 0..n as usize {
                    reg.produce_xor_from_bitstring(
                        d,
                        &concat[j * slice_len..][..slice_len],
                        true,
                    )
                    .unwrap();
                }
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_single_reduction, bench_multi_reduction);
criterion_main!(benches);
