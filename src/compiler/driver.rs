//! Compiler driver that orchestrates the multi-stage process of compiling a
//! _Twine_ source file into a native executable.
//!
//! The core pipeline produces textual _IR_; everything downstream is
//! delegated to the external toolchain: `opt -O2` (optional), `llc` for
//! assembly and object code, and `gcc` (falling back to `g++`) for linking.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context as _, Result, bail};

use crate::args::Args;
use crate::compiler::{Compiler, Lexer, Parser};

/// Executes the compilation pipeline for a _Twine_ source file.
///
/// # Errors
///
/// Returns an error if the input cannot be read, any compilation stage
/// fails, or a required toolchain invocation fails. Diagnostics from the
/// lexer and parser are printed as the stage finishes; only a parse that
/// produces no program at all is fatal.
pub fn run_compiler(args: &Args) -> Result<()> {
    let in_path = &args.input;

    if in_path.extension().and_then(|ext| ext.to_str()) != Some("tw") {
        bail!("input file must have a .tw extension: '{}'", in_path.display());
    }

    let source = fs::read_to_string(in_path)
        .with_context(|| format!("failed to read input file '{}'", in_path.display()))?;

    if args.verbose {
        println!("Performing lexical analysis...");
    }

    let mut lexer = Lexer::new(&source);
    let tokens = lexer.tokenize();
    for diagnostic in lexer.diagnostics() {
        eprintln!("{diagnostic}");
    }

    if args.verbose {
        println!("Found {} tokens", tokens.len());
        println!("Parsing...");
    }

    let mut parser = Parser::new(tokens);
    let program = parser.parse();
    for diagnostic in parser.diagnostics() {
        eprintln!("{diagnostic}");
    }
    let Some(program) = program else {
        bail!("parsing failed");
    };

    let module_name = in_path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("module");

    if args.verbose {
        println!("Generating IR...");
    }

    let mut compiler = Compiler::new(module_name);
    compiler.compile(&program)?;

    let ir_path = in_path.with_extension("ll");
    if args.verbose {
        println!("Writing IR to: {}", ir_path.display());
    }
    compiler
        .write_ir(&ir_path)
        .with_context(|| format!("failed to write IR file '{}'", ir_path.display()))?;

    if args.emit_ir {
        println!("IR written to: {}", ir_path.display());
        return Ok(());
    }

    // Optimization is best-effort; a missing or failing `opt` falls back to
    // the unoptimized IR.
    let opt_path = ir_path.with_file_name(format!("{module_name}_opt.ll"));
    let optimized = run_command(
        Command::new("opt")
            .args(["-O2", "-S"])
            .arg(&ir_path)
            .arg("-o")
            .arg(&opt_path),
        args.verbose,
    );
    let best_ir = if optimized {
        opt_path.clone()
    } else {
        if args.verbose {
            println!("Optimization skipped (opt not available or failed)");
        }
        ir_path.clone()
    };

    let asm_path = in_path.with_extension("s");
    if args.verbose {
        println!("Generating assembly...");
    }
    if !run_command(
        Command::new("llc")
            .args(["-filetype=asm"])
            .arg(&best_ir)
            .arg("-o")
            .arg(&asm_path),
        args.verbose,
    ) {
        bail!("assembly generation failed");
    }

    if args.emit_asm {
        println!("Assembly written to: {}", asm_path.display());
        return Ok(());
    }

    let obj_path = in_path.with_extension("o");
    if args.verbose {
        println!("Generating object file...");
    }
    if !run_command(
        Command::new("llc")
            .args(["-filetype=obj"])
            .arg(&best_ir)
            .arg("-o")
            .arg(&obj_path),
        args.verbose,
    ) {
        bail!("object file generation failed");
    }

    if args.emit_obj {
        println!("Object file written to: {}", obj_path.display());
        return Ok(());
    }

    let out_path = match &args.output {
        Some(path) => path.clone(),
        None => default_executable(in_path),
    };

    if args.verbose {
        println!("Linking executable...");
    }
    let linked = run_command(
        Command::new("gcc")
            .arg(&obj_path)
            .arg("-o")
            .arg(&out_path)
            .arg("-lm"),
        args.verbose,
    ) || run_command(
        Command::new("g++")
            .arg(&obj_path)
            .arg("-o")
            .arg(&out_path)
            .arg("-lm"),
        args.verbose,
    );
    if !linked {
        bail!("linking failed");
    }

    println!("Compilation successful!");
    println!("Executable: {}", out_path.display());

    if !args.verbose {
        cleanup(&[
            ir_path.as_path(),
            opt_path.as_path(),
            asm_path.as_path(),
            obj_path.as_path(),
        ]);
    }

    Ok(())
}

/// Default executable path: input path without extension (plus `.exe` on
/// Windows).
fn default_executable(in_path: &Path) -> PathBuf {
    if cfg!(target_os = "windows") {
        in_path.with_extension("exe")
    } else {
        in_path.with_extension("")
    }
}

/// Runs an external toolchain command, returning `true` on exit status 0.
/// A command that cannot be spawned counts as failed.
fn run_command(command: &mut Command, verbose: bool) -> bool {
    if verbose {
        println!("Running: {command:?}");
    }

    match command.status() {
        Ok(status) => status.success(),
        Err(_) => false,
    }
}

/// Best-effort removal of intermediate files.
fn cleanup(paths: &[&Path]) {
    for path in paths {
        let _ = fs::remove_file(path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::Args;

    fn args_for(input: PathBuf) -> Args {
        Args {
            input,
            output: None,
            emit_ir: true,
            emit_asm: false,
            emit_obj: false,
            verbose: false,
        }
    }

    #[test]
    fn rejects_non_tw_extensions() {
        let err = run_compiler(&args_for(PathBuf::from("program.txt"))).unwrap_err();
        assert!(err.to_string().contains(".tw extension"));
    }

    #[test]
    fn reports_missing_input() {
        let err = run_compiler(&args_for(PathBuf::from("no_such_file.tw"))).unwrap_err();
        assert!(err.to_string().contains("failed to read input file"));
    }

    #[test]
    fn emit_ir_writes_a_verified_module() {
        let dir = tempfile::tempdir().expect("tempdir");
        let src_path = dir.path().join("demo.tw");
        fs::write(&src_path, "let x = 2; print(x * 21);").expect("write source");

        run_compiler(&args_for(src_path.clone())).expect("compilation should succeed");

        let ir = fs::read_to_string(src_path.with_extension("ll")).expect("IR file exists");
        assert!(ir.contains("; ModuleID = 'demo'"));
        assert!(ir.contains("define i32 @main() {"));
    }

    #[test]
    fn fatal_parse_failure_stops_the_pipeline() {
        let dir = tempfile::tempdir().expect("tempdir");
        let src_path = dir.path().join("broken.tw");
        fs::write(&src_path, ")").expect("write source");

        let err = run_compiler(&args_for(src_path)).unwrap_err();
        assert!(err.to_string().contains("parsing failed"));
    }

    #[test]
    fn emission_errors_propagate() {
        let dir = tempfile::tempdir().expect("tempdir");
        let src_path = dir.path().join("undef.tw");
        fs::write(&src_path, "print(missing);").expect("write source");

        let err = run_compiler(&args_for(src_path)).unwrap_err();
        assert!(err.to_string().contains("undefined variable 'missing'"));
    }
}
