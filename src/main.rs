//! Twine Compiler (twinec).

#![deny(missing_docs)]
#![warn(missing_debug_implementations)]
#![warn(rust_2018_idioms)]
// The IR construction library keeps a slightly broader surface than the
// emitter currently exercises.
#![allow(dead_code)]

pub mod args;
pub mod compiler;

use clap::Parser as _;

use crate::args::Args;

fn main() {
    let args = Args::parse();

    if let Err(err) = compiler::driver::run_compiler(&args) {
        eprintln!("\x1b[1;31merror:\x1b[0m {err:#}");
        std::process::exit(1);
    }
}
