//! Command-line host: format database files, run queries, time the
//! reduction paths. Argument parsing and I/O only; the kernel does the
//! work.

use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Context};
use clap::{ArgAction, Parser, Subcommand};

use crate::dbfile;
use crate::pool::WorkerPool;
use crate::store::{Descriptor, Registry};

// ─────────────────────────────────────────────────────────────────────────────
// Display level
// ─────────────────────────────────────────────────────────────────────────────

/// Stderr verbosity. 0 = silent, 1 = errors, 2 = normal, 3+ = verbose.
pub static DISPLAY_LEVEL: AtomicI32 = AtomicI32::new(2);

#[inline]
pub fn display_level() -> i32 {
    DISPLAY_LEVEL.load(Ordering::Relaxed)
}

#[inline]
pub fn set_display_level(level: i32) {
    DISPLAY_LEVEL.store(level, Ordering::Relaxed);
}

/// Print to stderr when the display level is at least `$lvl`.
#[macro_export]
macro_rules! display {
    ($lvl:expr, $($arg:tt)*) => {
        if $crate::cli::display_level() >= $lvl {
            eprintln!($($arg)*);
        }
    };
}

// ─────────────────────────────────────────────────────────────────────────────
// Argument surface
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "pirstore",
    version,
    about = "XOR datastore tool for RAID-PIR mirrors"
)]
pub struct Cli {
    /// Increase stderr verbosity (repeatable).
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Errors only.
    #[arg(short = 'q', long = "quiet", global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Write a database file from a raw payload file.
    ///
    /// Prints the resulting block count on stdout; the format stores no
    /// size metadata, so callers must carry the geometry to `query`.
    Format {
        /// Payload file; it is zero-padded up to a whole block.
        input: PathBuf,
        /// Database file to write.
        output: PathBuf,
        /// Bytes per block; must be a multiple of 64.
        #[arg(long, default_value_t = 4096)]
        block_size: usize,
    },

    /// Run one or more bitstring queries against a database file.
    Query {
        /// Database file (magic + raw blocks).
        db: PathBuf,
        /// Bytes per block; must be a multiple of 64.
        #[arg(long)]
        block_size: usize,
        /// Block count (out-of-band geometry).
        #[arg(long)]
        num_blocks: usize,
        /// Query bitstring in hex, MSB of the first byte selecting
        /// block 0. Repeat for a batched multi-query.
        #[arg(long = "bits", required = true)]
        bits: Vec<String>,
        /// Build the 4-Russians tables and answer via the nibble path.
        #[arg(long)]
        preprocess: bool,
        /// Load through the writable in-memory backend instead of mmap.
        #[arg(long)]
        in_memory: bool,
        /// Write the answer blocks here instead of stdout.
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Time plain vs precomputed reduction over random queries.
    Bench {
        /// Database file (magic + raw blocks).
        db: PathBuf,
        /// Bytes per block; must be a multiple of 64.
        #[arg(long)]
        block_size: usize,
        /// Block count (out-of-band geometry).
        #[arg(long)]
        num_blocks: usize,
        /// Number of random queries per timed pass.
        #[arg(long, default_value_t = 64)]
        queries: usize,
        /// Fan queries out over this many worker threads
        /// (default: one per CPU; 1 keeps everything on the caller).
        #[arg(long)]
        jobs: Option<usize>,
    },
}

// ─────────────────────────────────────────────────────────────────────────────
// Dispatch
// ─────────────────────────────────────────────────────────────────────────────

/// Execute the parsed command. Errors carry context chains for `main` to
/// report.
pub fn run(cli: Cli) -> anyhow::Result<()> {
    set_display_level(if cli.quiet { 1 } else { 2 + cli.verbose as i32 });

    match cli.command {
        Command::Format {
            input,
            output,
            block_size,
        } => {
            let payload = std::fs::read(&input)
                .with_context(|| format!("cannot read payload {}", input.display()))?;
            let num_blocks = dbfile::write_db(&output, block_size, &payload)?;
            display!(
                2,
                "{}: {} blocks of {} bytes ({} payload bytes)",
                output.display(),
                num_blocks,
                block_size,
                payload.len()
            );
            println!("{num_blocks}");
            Ok(())
        }

        Command::Query {
            db,
            block_size,
            num_blocks,
            bits,
            preprocess,
            in_memory,
            output,
        } => {
            let mut registry = Registry::new();
            let d = load_db(&mut registry, &db, block_size, num_blocks, in_memory)?;
            display!(
                3,
                "loaded {} as descriptor {} ({:?})",
                db.display(),
                d.index(),
                registry.backend_kind(d)?
            );

            if preprocess {
                let started = Instant::now();
                registry.do_preprocessing(d)?;
                display!(3, "preprocessing took {:?}", started.elapsed());
            }

            let queries = parse_bitstrings(&bits)?;
            let answer = if queries.len() == 1 {
                registry.produce_xor_from_bitstring(d, &queries[0], preprocess)?
            } else {
                let slice_len = queries[0].len();
                let concat: Vec<u8> = queries.concat();
                registry.produce_xor_from_bitstrings(
                    d,
                    &concat,
                    (concat.len() / slice_len) as u32,
                    preprocess,
                )?
            };

            match output {
                Some(path) => std::fs::write(&path, &answer)
                    .with_context(|| format!("cannot write result to {}", path.display()))?,
                None => std::io::stdout()
                    .write_all(&answer)
                    .context("cannot write result to stdout")?,
            }
            display!(
                2,
                "{} answer block(s) of {} bytes",
                answer.len() / block_size,
                block_size
            );
            Ok(())
        }

        Command::Bench {
            db,
            block_size,
            num_blocks,
            queries,
            jobs,
        } => bench(&db, block_size, num_blocks, queries, jobs),
    }
}

/// Map (or load) the database into a fresh descriptor.
fn load_db(
    registry: &mut Registry,
    db: &PathBuf,
    block_size: usize,
    num_blocks: usize,
    in_memory: bool,
) -> anyhow::Result<Descriptor> {
    if in_memory {
        let (available, data) = dbfile::read_db(db, block_size)?;
        if available < num_blocks {
            bail!(
                "{} holds {} blocks, geometry says {}",
                db.display(),
                available,
                num_blocks
            );
        }
        let d = registry.allocate(block_size, num_blocks)?;
        registry.set_data(d, 0, &data[..num_blocks * block_size])?;
        Ok(d)
    } else {
        Ok(registry.initialize(block_size, num_blocks, db)?)
    }
}

/// Decode `--bits` values; all slices must share one length.
fn parse_bitstrings(bits: &[String]) -> anyhow::Result<Vec<Vec<u8>>> {
    let queries: Vec<Vec<u8>> = bits
        .iter()
        .map(|s| parse_hex(s))
        .collect::<anyhow::Result<_>>()?;
    if let Some(first) = queries.first() {
        if queries.iter().any(|q| q.len() != first.len()) {
            bail!("all --bits values must have the same length");
        }
        if first.is_empty() {
            bail!("--bits must not be empty");
        }
    }
    Ok(queries)
}

fn parse_hex(s: &str) -> anyhow::Result<Vec<u8>> {
    if !s.is_ascii() {
        bail!("invalid hex bitstring {s:?}");
    }
    if s.len() % 2 != 0 {
        bail!("hex bitstring {s:?} has odd length");
    }
    (0..s.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&s[i..i + 2], 16)
                .with_context(|| format!("invalid hex bitstring {s:?}"))
        })
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Bench
// ─────────────────────────────────────────────────────────────────────────────

/// Deterministic 64-bit generator for reproducible benchmark queries.
struct SplitMix64(u64);

impl SplitMix64 {
    fn next(&mut self) -> u64 {
        self.0 = self.0.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = self.0;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }
}

fn bench(
    db: &PathBuf,
    block_size: usize,
    num_blocks: usize,
    queries: usize,
    jobs: Option<usize>,
) -> anyhow::Result<()> {
    let mut registry = Registry::new();
    let d = registry.initialize(block_size, num_blocks, db)?;

    let started = Instant::now();
    registry.do_preprocessing(d)?;
    display!(2, "preprocessing: {:?}", started.elapsed());

    let mut rng = SplitMix64(0x5EED);
    let query_len = num_blocks.div_ceil(8);
    let batch: Vec<Vec<u8>> = (0..queries)
        .map(|_| (0..query_len).map(|_| rng.next() as u8).collect())
        .collect();

    let jobs = jobs.unwrap_or_else(num_cpus::get).max(1);
    let registry = Arc::new(registry);
    let touched = (queries * num_blocks * block_size) as f64;

    for use_precomputed in [false, true] {
        let label = if use_precomputed { "precomputed" } else { "plain" };
        let started = Instant::now();
        if jobs == 1 {
            for q in &batch {
                registry.produce_xor_from_bitstring(d, q, use_precomputed)?;
            }
        } else {
            let pool = WorkerPool::new(jobs, jobs * 2)
                .context("cannot build worker pool")?;
            for q in batch.iter().cloned() {
                let registry = Arc::clone(&registry);
                pool.submit(move || {
                    if let Err(err) = registry.produce_xor_from_bitstring(d, &q, use_precomputed)
                    {
                        display!(1, "bench query failed: {err}");
                    }
                });
            }
            pool.wait_idle();
        }
        let elapsed = started.elapsed();
        display!(
            1,
            "{label:>11}: {queries} queries in {elapsed:?} ({:.1} MB/s effective)",
            touched / elapsed.as_secs_f64() / 1e6
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_decodes_and_rejects() {
        assert_eq!(parse_hex("0a1B").unwrap(), vec![0x0A, 0x1B]);
        assert!(parse_hex("abc").is_err());
        assert!(parse_hex("zz").is_err());
    }

    #[test]
    fn bitstrings_must_align() {
        let ok = parse_bitstrings(&["aa".into(), "bb".into()]).unwrap();
        assert_eq!(ok.len(), 2);
        assert!(parse_bitstrings(&["aa".into(), "bbbb".into()]).is_err());
        assert!(parse_bitstrings(&["".into()]).is_err());
    }
}
