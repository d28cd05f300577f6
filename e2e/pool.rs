//! E2E: worker-pool fan-out — many concurrent queries over one shared
//! registry produce the same answers as a serial host.

use std::sync::{Arc, Mutex};

use pirstore::pool::WorkerPool;
use pirstore::Registry;

#[test]
fn concurrent_queries_match_serial_answers() {
    let mut reg = Registry::new();
    let block_size = 256;
    let num_blocks = 40;
    let d = reg.allocate(block_size, num_blocks).unwrap();
    for i in 0..num_blocks {
        let block: Vec<u8> = (0..block_size)
            .map(|j| ((i * 31 + j) % 255) as u8)
            .collect();
        reg.set_data(d, i * block_size, &block).unwrap();
    }
    reg.do_preprocessing(d).unwrap();

    // Mutation phase over; share read-only.
    let reg = Arc::new(reg);

    let queries: Vec<Vec<u8>> = (0..64u32)
        .map(|q| {
            (0..num_blocks.div_ceil(8))
                .map(|b| (q.wrapping_mul(97).wrapping_add(b as u32 * 13) % 256) as u8)
                .collect()
        })
        .collect();

    let serial: Vec<Vec<u8>> = queries
        .iter()
        .map(|q| reg.produce_xor_from_bitstring(d, q, true).unwrap())
        .collect();

    let pool = WorkerPool::new(4, 8).unwrap();
    let answers = Arc::new(Mutex::new(vec![Vec::new(); queries.len()]));
    for (i, q) in queries.iter().cloned().enumerate() {
        let reg = Arc::clone(&reg);
        let answers = Arc::clone(&answers);
        pool.submit(move || {
            let a = reg.produce_xor_from_bitstring(d, &q, true).unwrap();
            answers.lock().unwrap()[i] = a;
        });
    }
    pool.wait_idle();

    let answers = answers.lock().unwrap();
    for (i, (got, want)) in answers.iter().zip(&serial).enumerate() {
        assert_eq!(got, want, "query {i}");
    }
}

#[test]
fn pool_handles_mixed_descriptors() {
    let mut reg = Registry::new();
    let d1 = reg.allocate(64, 8).unwrap();
    let d2 = reg.allocate(64, 8).unwrap();
    reg.set_data(d1, 0, &[0x11; 64]).unwrap();
    reg.set_data(d2, 0, &[0x22; 64]).unwrap();
    let reg = Arc::new(reg);

    let pool = WorkerPool::new(2, 4).unwrap();
    let results = Arc::new(Mutex::new(Vec::new()));
    for (d, expect) in [(d1, 0x11u8), (d2, 0x22u8)] {
        for _ in 0..8 {
            let reg = Arc::clone(&reg);
            let results = Arc::clone(&results);
            pool.submit(move || {
                let a = reg.produce_xor_from_bitstring(d, &[0x80], false).unwrap();
                results.lock().unwrap().push((expect, a));
            });
        }
    }
    pool.wait_idle();

    for (expect, answer) in results.lock().unwrap().iter() {
        assert_eq!(answer, &vec![*expect; 64]);
    }
}
