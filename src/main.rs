//! Binary entry point for the `pirstore` command-line tool.
//!
//! Parsing and dispatch live in `pirstore::cli`; this shim reports errors
//! through the display machinery and maps them to the process exit code.

use clap::Parser;

use pirstore::cli::{run, Cli};
use pirstore::display;

fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        display!(1, "pirstore: {err:#}");
        std::process::exit(1);
    }
}
