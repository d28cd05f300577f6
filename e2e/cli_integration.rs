//! E2E: the `pirstore` binary as a black box — format, query, exit codes.

use std::fs;
use std::path::PathBuf;
use std::process::Command;

use tempfile::TempDir;

/// Locate the binary produced by Cargo for integration tests.
fn pirstore_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_pirstore"))
}

/// A payload whose blocks are easy to recognise: block i is 64 bytes of
/// value i+1.
fn make_payload(dir: &TempDir, num_blocks: usize) -> PathBuf {
    let path = dir.path().join("payload.bin");
    let payload: Vec<u8> = (0..num_blocks)
        .flat_map(|i| vec![(i + 1) as u8; 64])
        .collect();
    fs::write(&path, payload).unwrap();
    path
}

/// Run `pirstore format` quietly and assert success.
fn format_db(payload: &PathBuf, db: &PathBuf) {
    let status = Command::new(pirstore_bin())
        .args([
            "-q",
            "format",
            payload.to_str().unwrap(),
            db.to_str().unwrap(),
            "--block-size",
            "64",
        ])
        .status()
        .expect("failed to run pirstore format");
    assert!(status.success());
}

// ─────────────────────────────────────────────────────────────────────────────
// format then query round-trip
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn format_reports_block_count() {
    let dir = TempDir::new().unwrap();
    let payload = make_payload(&dir, 8);
    let db = dir.path().join("mirror.db");

    let out = Command::new(pirstore_bin())
        .args([
            "-q",
            "format",
            payload.to_str().unwrap(),
            db.to_str().unwrap(),
            "--block-size",
            "64",
        ])
        .output()
        .expect("failed to run pirstore format");
    assert!(out.status.success());
    assert_eq!(String::from_utf8_lossy(&out.stdout).trim(), "8");
    assert!(db.exists());
}

#[test]
fn query_returns_selected_block() {
    let dir = TempDir::new().unwrap();
    let payload = make_payload(&dir, 8);
    let db = dir.path().join("mirror.db");
    format_db(&payload, &db);

    // Bit 2 selects block 2, filled with 0x03.
    let out = Command::new(pirstore_bin())
        .args([
            "-q",
            "query",
            db.to_str().unwrap(),
            "--block-size",
            "64",
            "--num-blocks",
            "8",
            "--bits",
            "20",
        ])
        .output()
        .unwrap();
    assert!(out.status.success());
    assert_eq!(out.stdout, vec![0x03u8; 64]);
}

#[test]
fn query_paths_and_backends_agree() {
    let dir = TempDir::new().unwrap();
    let payload = make_payload(&dir, 10);
    let db = dir.path().join("mirror.db");
    format_db(&payload, &db);

    let mut answers = Vec::new();
    for extra in [
        vec![],
        vec!["--preprocess"],
        vec!["--in-memory"],
        vec!["--preprocess", "--in-memory"],
    ] {
        let mut args = vec![
            "-q",
            "query",
            db.to_str().unwrap(),
            "--block-size",
            "64",
            "--num-blocks",
            "10",
            "--bits",
            "a5c0",
        ];
        args.extend(extra);
        let out = Command::new(pirstore_bin()).args(&args).output().unwrap();
        assert!(out.status.success(), "args {args:?}");
        answers.push(out.stdout);
    }
    for pair in answers.windows(2) {
        assert_eq!(pair[0], pair[1]);
    }
}

#[test]
fn multi_bits_emit_concatenated_blocks() {
    let dir = TempDir::new().unwrap();
    let payload = make_payload(&dir, 8);
    let db = dir.path().join("mirror.db");
    format_db(&payload, &db);

    let out = Command::new(pirstore_bin())
        .args([
            "-q",
            "query",
            db.to_str().unwrap(),
            "--block-size",
            "64",
            "--num-blocks",
            "8",
            "--bits",
            "80",
            "--bits",
            "40",
        ])
        .output()
        .unwrap();
    assert!(out.status.success());
    assert_eq!(out.stdout.len(), 128);
    assert_eq!(&out.stdout[..64], &vec![0x01u8; 64][..]);
    assert_eq!(&out.stdout[64..], &vec![0x02u8; 64][..]);
}

// ─────────────────────────────────────────────────────────────────────────────
// Failure modes exit nonzero
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn corrupt_magic_fails_cleanly() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("bogus.db");
    fs::write(&db, b"not a database at all, sorry").unwrap();

    let out = Command::new(pirstore_bin())
        .args([
            "query",
            db.to_str().unwrap(),
            "--block-size",
            "64",
            "--num-blocks",
            "1",
            "--bits",
            "80",
            "--in-memory",
        ])
        .output()
        .unwrap();
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("not a RAID-PIR database"), "stderr: {stderr}");
}

#[test]
fn bad_hex_fails_cleanly() {
    let dir = TempDir::new().unwrap();
    let payload = make_payload(&dir, 2);
    let db = dir.path().join("mirror.db");
    format_db(&payload, &db);

    let out = Command::new(pirstore_bin())
        .args([
            "query",
            db.to_str().unwrap(),
            "--block-size",
            "64",
            "--num-blocks",
            "2",
            "--bits",
            "zz",
        ])
        .output()
        .unwrap();
    assert!(!out.status.success());
}
