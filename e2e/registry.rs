//! E2E: registry lifecycle — allocation, data round-trips, release.

use pirstore::{BackendKind, Error, Registry, DEFAULT_CAPACITY};

// ─────────────────────────────────────────────────────────────────────────────
// Round-trip: SetData then GetData returns the same bytes
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn set_then_get_roundtrip() {
    let mut reg = Registry::new();
    let d = reg.allocate(64, 32).unwrap();

    // Deterministic "random" payload covering the whole span.
    let payload: Vec<u8> = (0..64 * 32)
        .map(|i| (i as u32).wrapping_mul(2654435761) as u8)
        .collect();
    reg.set_data(d, 0, &payload).unwrap();

    let back = reg.get_data(d, 0, payload.len()).unwrap();
    assert_eq!(back, payload);
}

#[test]
fn fresh_datastore_reads_zero() {
    let mut reg = Registry::new();
    let d = reg.allocate(128, 4).unwrap();
    let bytes = reg.get_data(d, 0, 512).unwrap();
    assert!(bytes.iter().all(|&b| b == 0));
}

#[test]
fn partial_writes_land_at_offset() {
    let mut reg = Registry::new();
    let d = reg.allocate(64, 4).unwrap();
    reg.set_data(d, 100, &[0xEE; 8]).unwrap();

    let back = reg.get_data(d, 98, 12).unwrap();
    assert_eq!(&back, &[0, 0, 0xEE, 0xEE, 0xEE, 0xEE, 0xEE, 0xEE, 0xEE, 0xEE, 0, 0]);
}

// ─────────────────────────────────────────────────────────────────────────────
// Bounds and validity errors
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn get_data_rejects_out_of_bounds() {
    let mut reg = Registry::new();
    let d = reg.allocate(64, 2).unwrap();
    assert!(reg.get_data(d, 0, 128).is_ok());
    assert!(matches!(
        reg.get_data(d, 64, 65),
        Err(Error::OutOfBounds {
            offset: 64,
            quantity: 65,
            limit: 128
        })
    ));
    // Overflowing offsets must not wrap around the bounds check.
    assert!(matches!(
        reg.get_data(d, usize::MAX, 2),
        Err(Error::OutOfBounds { .. })
    ));
}

#[test]
fn operations_on_released_descriptor_fail() {
    let mut reg = Registry::new();
    let d = reg.allocate(64, 2).unwrap();
    reg.deallocate(d).unwrap();

    assert!(matches!(
        reg.get_data(d, 0, 1),
        Err(Error::BadDescriptor { index: 0 })
    ));
    assert!(matches!(
        reg.set_data(d, 0, &[0]),
        Err(Error::BadDescriptor { index: 0 })
    ));
    assert!(matches!(
        reg.produce_xor_from_bitstring(d, &[0xFF], false),
        Err(Error::BadDescriptor { index: 0 })
    ));
    assert!(matches!(
        reg.do_preprocessing(d),
        Err(Error::BadDescriptor { index: 0 })
    ));
}

// ─────────────────────────────────────────────────────────────────────────────
// Capacity behaviour
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn default_capacity_is_sixteen_slots() {
    let mut reg = Registry::new();
    assert_eq!(reg.capacity(), DEFAULT_CAPACITY);
    let descriptors: Vec<_> = (0..DEFAULT_CAPACITY)
        .map(|_| reg.allocate(64, 1).unwrap())
        .collect();
    assert!(matches!(
        reg.allocate(64, 1),
        Err(Error::RegistryFull { capacity }) if capacity == DEFAULT_CAPACITY
    ));

    // Releasing any descriptor frees exactly its slot.
    reg.deallocate(descriptors[7]).unwrap();
    assert_eq!(reg.allocate(64, 1).unwrap().index(), 7);
}

#[test]
fn deallocate_frees_groups_with_storage() {
    // A released slot must be reusable even after preprocessing built the
    // (much larger) lookup region; both go in one release.
    let mut reg = Registry::with_capacity(1);
    let d = reg.allocate(64, 8).unwrap();
    reg.do_preprocessing(d).unwrap();
    reg.deallocate(d).unwrap();

    let d2 = reg.allocate(64, 8).unwrap();
    assert_eq!(d2.index(), 0);
    assert!(!reg.has_precomputed(d2).unwrap());
}

#[test]
fn backend_kind_is_reported() {
    let mut reg = Registry::new();
    let d = reg.allocate(64, 1).unwrap();
    assert_eq!(reg.backend_kind(d).unwrap(), BackendKind::InMemory);
    assert_eq!(reg.block_size(d).unwrap(), 64);
    assert_eq!(reg.num_blocks(d).unwrap(), 1);
}
