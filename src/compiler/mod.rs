//! Multi-stage pipeline for compiling _Twine_ source code into textual SSA
//! _IR_ for the downstream `opt`/`llc`/`gcc` toolchain.
//!
//! The stages run strictly in order, each consuming the previous stage's
//! output: [`lexer`] (tokens), [`parser`] (_AST_), [`codegen`] (_IR_). The
//! [`ir`] module is the construction library the code generator targets.

pub mod ast;
pub mod codegen;
pub mod driver;
pub mod ir;
pub mod lexer;
pub mod parser;

pub use codegen::{Compiler, EmitError};
pub use lexer::Lexer;
pub use parser::Parser;

#[cfg(test)]
mod tests {
    use super::*;

    /// Full pipeline: source text in, verified textual _IR_ out.
    fn compile(source: &str) -> String {
        let mut lexer = Lexer::new(source);
        let tokens = lexer.tokenize();
        assert!(lexer.diagnostics().is_empty());

        let mut parser = Parser::new(tokens);
        let program = parser.parse().expect("program should parse");
        assert!(parser.diagnostics().is_empty());

        let mut compiler = Compiler::new("pipeline");
        compiler.compile(&program).expect("program should compile");
        compiler.dump_ir()
    }

    #[test]
    fn pipeline_compiles_arithmetic() {
        let ir = compile("print(1 + 2 * 3);");
        assert!(ir.contains("define i32 @main() {"));
        assert!(ir.contains("fmul double"));
    }

    #[test]
    fn pipeline_compiles_functions_and_arrays() {
        let ir = compile(
            "function twice(x) { return x * 2; } let a = [1, 2, 3]; let t = 0; \
             for (let i = 0; i < len(a); i = i + 1) { t = t + a[i]; } print(twice(t));",
        );

        assert!(ir.contains("define internal ptr @twice(double %x)"));
        assert!(ir.contains("for.cond:"));
        assert!(ir.contains("len.arr:"));
    }

    #[test]
    fn pipeline_reports_emission_errors() {
        let tokens = Lexer::new("print(missing);").tokenize();
        let program = Parser::new(tokens).parse().expect("parses");

        let mut compiler = Compiler::new("pipeline");
        let err = compiler.compile(&program).unwrap_err();
        assert_eq!(err.to_string(), "codegen error: undefined variable 'missing'");
    }
}
