//! Module for parsing command-line arguments passed to the compiler.

use std::path::PathBuf;

use clap::Parser;

/// Ahead-of-time compiler for the _Twine_ scripting language.
#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Input Twine source file (must end in `.tw`).
    pub input: PathBuf,

    /// Output executable name. Defaults to the input path without its
    /// extension.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Stop after writing textual IR.
    #[arg(long)]
    pub emit_ir: bool,

    /// Stop after generating assembly.
    #[arg(long)]
    pub emit_asm: bool,

    /// Stop after generating an object file.
    #[arg(long)]
    pub emit_obj: bool,

    /// Narrate each stage and keep intermediate files.
    #[arg(long)]
    pub verbose: bool,
}
