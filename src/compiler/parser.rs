//! Syntax Analysis
//!
//! Compiler pass that parses a token sequence into an abstract syntax tree
//! (_AST_) by recursive descent with one level per precedence tier.
//!
//! On a parse error the parser reports a diagnostic and enters panic-mode
//! recovery: it advances to the token following a `;` or to the start of the
//! next statement keyword, then resumes. Multiple diagnostics may be reported
//! per file.

use thiserror::Error;

use crate::compiler::ast::{DeclKind, Expr, Program, Stmt};
use crate::compiler::lexer::{Keyword, OperatorKind, Token, TokenKind};

/// Diagnostic produced during parsing, located at the offending token.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("parse error at line {line}, column {col} at {found}: {message}")]
pub struct ParseError {
    /// Human-readable description of what was expected or invalid.
    pub message: String,
    /// Rendering of the offending token (`'lexeme'` or `end of file`).
    pub found: String,
    #[allow(missing_docs)]
    pub line: usize,
    #[allow(missing_docs)]
    pub col: usize,
}

/// Recursive-descent parser for _Twine_ token sequences.
#[derive(Debug)]
pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
    diagnostics: Vec<ParseError>,
}

impl Parser {
    /// Returns a new `Parser` over the given tokens. The sequence is expected
    /// to be terminated by an `Eof` token, as produced by the lexer.
    pub fn new(tokens: Vec<Token>) -> Self {
        debug_assert!(
            matches!(tokens.last(), Some(t) if t.kind == TokenKind::Eof),
            "token stream should be terminated by Eof"
        );

        Self {
            tokens,
            current: 0,
            diagnostics: Vec::new(),
        }
    }

    /// Parses the token sequence into a `Program`.
    ///
    /// Returns `None` when recovery produced zero complete statements;
    /// otherwise `Some`, possibly after diagnostics have been reported.
    pub fn parse(&mut self) -> Option<Program> {
        let mut statements = Vec::new();

        while !self.is_at_end() {
            match self.parse_statement() {
                Ok(stmt) => statements.push(stmt),
                Err(err) => {
                    self.diagnostics.push(err);
                    self.synchronize();
                }
            }
        }

        if statements.is_empty() && !self.diagnostics.is_empty() {
            return None;
        }

        Some(Program { statements })
    }

    /// Returns the diagnostics collected so far.
    pub fn diagnostics(&self) -> &[ParseError] {
        &self.diagnostics
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn parse_statement(&mut self) -> Result<Stmt, ParseError> {
        match self.peek().kind {
            TokenKind::Keyword(Keyword::Function) => {
                self.advance();
                self.parse_function_declaration()
            }
            TokenKind::Keyword(Keyword::Let | Keyword::Var | Keyword::Const) => {
                let kind = self.decl_kind();
                self.advance();
                self.parse_variable_declaration(kind)
            }
            TokenKind::Keyword(Keyword::If) => {
                self.advance();
                self.parse_if_statement()
            }
            TokenKind::Keyword(Keyword::While) => {
                self.advance();
                self.parse_while_statement()
            }
            TokenKind::Keyword(Keyword::For) => {
                self.advance();
                self.parse_for_statement()
            }
            TokenKind::Keyword(Keyword::Return) => {
                self.advance();
                self.parse_return_statement()
            }
            TokenKind::BraceOpen => {
                self.advance();
                Ok(Stmt::Block(self.parse_block()?))
            }
            _ => self.parse_expression_statement(),
        }
    }

    fn parse_variable_declaration(&mut self, kind: DeclKind) -> Result<Stmt, ParseError> {
        let name = self
            .consume_ident("expected variable name")?
            .lexeme;

        let init = if self.match_op(OperatorKind::Assign) {
            Some(self.parse_expression()?)
        } else {
            None
        };

        self.consume(
            TokenKind::Semicolon,
            "expected ';' after variable declaration",
        )?;

        Ok(Stmt::VarDecl { kind, name, init })
    }

    fn parse_function_declaration(&mut self) -> Result<Stmt, ParseError> {
        let name = self.consume_ident("expected function name")?.lexeme;

        self.consume(TokenKind::ParenOpen, "expected '(' after function name")?;

        let mut params = Vec::new();

        if !self.check(&TokenKind::ParenClose) {
            loop {
                let param = self.consume_ident("expected parameter name")?;
                params.push(param.lexeme);

                if !self.match_kind(&TokenKind::Comma) {
                    break;
                }
            }
        }

        self.consume(TokenKind::ParenClose, "expected ')' after parameters")?;
        self.consume(TokenKind::BraceOpen, "expected '{' before function body")?;

        let body = self.parse_block()?;

        Ok(Stmt::FuncDecl { name, params, body })
    }

    fn parse_if_statement(&mut self) -> Result<Stmt, ParseError> {
        self.consume(TokenKind::ParenOpen, "expected '(' after 'if'")?;
        let cond = self.parse_expression()?;
        self.consume(TokenKind::ParenClose, "expected ')' after if condition")?;

        let then = Box::new(self.parse_statement()?);

        let opt_else = if self.match_keyword(Keyword::Else) {
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };

        Ok(Stmt::If {
            cond,
            then,
            opt_else,
        })
    }

    fn parse_while_statement(&mut self) -> Result<Stmt, ParseError> {
        self.consume(TokenKind::ParenOpen, "expected '(' after 'while'")?;
        let cond = self.parse_expression()?;
        self.consume(TokenKind::ParenClose, "expected ')' after while condition")?;

        let body = Box::new(self.parse_statement()?);

        Ok(Stmt::While { cond, body })
    }

    fn parse_for_statement(&mut self) -> Result<Stmt, ParseError> {
        self.consume(TokenKind::ParenOpen, "expected '(' after 'for'")?;

        let init = if self.match_kind(&TokenKind::Semicolon) {
            None
        } else if matches!(
            self.peek().kind,
            TokenKind::Keyword(Keyword::Let | Keyword::Var | Keyword::Const)
        ) {
            let kind = self.decl_kind();
            self.advance();
            Some(Box::new(self.parse_variable_declaration(kind)?))
        } else {
            let expr = self.parse_expression()?;
            self.consume(
                TokenKind::Semicolon,
                "expected ';' after for loop initializer",
            )?;
            Some(Box::new(Stmt::Expression(expr)))
        };

        let cond = if self.check(&TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.consume(TokenKind::Semicolon, "expected ';' after for loop condition")?;

        let update = if self.check(&TokenKind::ParenClose) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.consume(TokenKind::ParenClose, "expected ')' after for clauses")?;

        let body = Box::new(self.parse_statement()?);

        Ok(Stmt::For {
            init,
            cond,
            update,
            body,
        })
    }

    fn parse_return_statement(&mut self) -> Result<Stmt, ParseError> {
        let value = if self.check(&TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_expression()?)
        };

        self.consume(TokenKind::Semicolon, "expected ';' after return value")?;

        Ok(Stmt::Return(value))
    }

    /// Parses statements until the closing `}`. The opening `{` has already
    /// been consumed.
    fn parse_block(&mut self) -> Result<Vec<Stmt>, ParseError> {
        let mut statements = Vec::new();

        while !self.check(&TokenKind::BraceClose) && !self.is_at_end() {
            statements.push(self.parse_statement()?);
        }

        self.consume(TokenKind::BraceClose, "expected '}' after block")?;

        Ok(statements)
    }

    fn parse_expression_statement(&mut self) -> Result<Stmt, ParseError> {
        let expr = self.parse_expression()?;
        self.consume(TokenKind::Semicolon, "expected ';' after expression")?;
        Ok(Stmt::Expression(expr))
    }

    // ------------------------------------------------------------------
    // Expressions, precedence rising
    // ------------------------------------------------------------------

    fn parse_expression(&mut self) -> Result<Expr, ParseError> {
        self.parse_assignment()
    }

    /// `assign := logicalOr ("=" assign)?`
    ///
    /// Right-associative. The left-hand side must be an identifier or an
    /// index expression; anything else reports `invalid assignment target`
    /// and parsing continues with the left-hand side unchanged.
    fn parse_assignment(&mut self) -> Result<Expr, ParseError> {
        let expr = self.parse_logical_or()?;

        if self.match_op(OperatorKind::Assign) {
            let assign_token = self.previous().clone();

            return match expr {
                Expr::Ident(name) => {
                    let value = Box::new(self.parse_assignment()?);
                    Ok(Expr::Assign { name, value })
                }
                Expr::Index { array, index } => {
                    let value = Box::new(self.parse_assignment()?);
                    Ok(Expr::IndexAssign {
                        array,
                        index,
                        value,
                    })
                }
                other => {
                    self.report(&assign_token, "invalid assignment target");
                    Ok(other)
                }
            };
        }

        Ok(expr)
    }

    fn parse_logical_or(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_logical_and()?;

        while self.match_op(OperatorKind::LogOr) {
            let op = self.previous().lexeme.clone();
            let rhs = self.parse_logical_and()?;
            expr = binary(expr, op, rhs);
        }

        Ok(expr)
    }

    fn parse_logical_and(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_equality()?;

        while self.match_op(OperatorKind::LogAnd) {
            let op = self.previous().lexeme.clone();
            let rhs = self.parse_equality()?;
            expr = binary(expr, op, rhs);
        }

        Ok(expr)
    }

    fn parse_equality(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_comparison()?;

        while self.match_ops(&[OperatorKind::Eq, OperatorKind::NotEq]) {
            let op = self.previous().lexeme.clone();
            let rhs = self.parse_comparison()?;
            expr = binary(expr, op, rhs);
        }

        Ok(expr)
    }

    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_addition()?;

        while self.match_ops(&[
            OperatorKind::GreaterThan,
            OperatorKind::GreaterThanEq,
            OperatorKind::LessThan,
            OperatorKind::LessThanEq,
        ]) {
            let op = self.previous().lexeme.clone();
            let rhs = self.parse_addition()?;
            expr = binary(expr, op, rhs);
        }

        Ok(expr)
    }

    fn parse_addition(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_multiplication()?;

        while self.match_ops(&[OperatorKind::Plus, OperatorKind::Minus]) {
            let op = self.previous().lexeme.clone();
            let rhs = self.parse_multiplication()?;
            expr = binary(expr, op, rhs);
        }

        Ok(expr)
    }

    fn parse_multiplication(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_unary()?;

        while self.match_ops(&[
            OperatorKind::Asterisk,
            OperatorKind::Division,
            OperatorKind::Remainder,
        ]) {
            let op = self.previous().lexeme.clone();
            let rhs = self.parse_unary()?;
            expr = binary(expr, op, rhs);
        }

        Ok(expr)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        if self.match_ops(&[OperatorKind::LogNot, OperatorKind::Minus]) {
            let op = self.previous().lexeme.clone();
            let operand = Box::new(self.parse_unary()?);
            return Ok(Expr::Unary { op, operand });
        }

        self.parse_call()
    }

    /// `call := primary ( "(" argList? ")" | "[" expr "]" )*`
    fn parse_call(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_primary()?;

        loop {
            if self.match_kind(&TokenKind::ParenOpen) {
                let paren = self.previous().clone();
                let args = self.parse_arguments()?;

                match expr {
                    Expr::Ident(name) => {
                        expr = Expr::Call { name, args };
                    }
                    other => {
                        // Keep the callee expression so parsing can continue
                        // past the reported call.
                        self.report(&paren, "can only call functions");
                        expr = other;
                    }
                }
            } else if self.match_kind(&TokenKind::BracketOpen) {
                let index = Box::new(self.parse_expression()?);
                self.consume(TokenKind::BracketClose, "expected ']' after index")?;

                expr = Expr::Index {
                    array: Box::new(expr),
                    index,
                };
            } else {
                break;
            }
        }

        Ok(expr)
    }

    /// Parses a comma-separated argument list through the closing `)`.
    fn parse_arguments(&mut self) -> Result<Vec<Expr>, ParseError> {
        let mut args = Vec::new();

        if !self.check(&TokenKind::ParenClose) {
            loop {
                args.push(self.parse_expression()?);

                if !self.match_kind(&TokenKind::Comma) {
                    break;
                }
            }
        }

        self.consume(TokenKind::ParenClose, "expected ')' after arguments")?;

        Ok(args)
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let token = self.peek().clone();

        match token.kind {
            TokenKind::Keyword(Keyword::True) => {
                self.advance();
                Ok(Expr::Bool(true))
            }
            TokenKind::Keyword(Keyword::False) => {
                self.advance();
                Ok(Expr::Bool(false))
            }
            TokenKind::Keyword(Keyword::Null) => {
                self.advance();
                Ok(Expr::Null)
            }
            TokenKind::Number => {
                self.advance();
                // The lexer only produces digits and at most one '.', so the
                // decimal parse cannot fail.
                let value = token
                    .lexeme
                    .parse::<f64>()
                    .expect("number lexeme should parse as f64");
                Ok(Expr::Number(value))
            }
            TokenKind::Str => {
                self.advance();
                Ok(Expr::Str(token.lexeme))
            }
            TokenKind::Ident => {
                self.advance();
                Ok(Expr::Ident(token.lexeme))
            }
            TokenKind::ParenOpen => {
                self.advance();
                let expr = self.parse_expression()?;
                self.consume(TokenKind::ParenClose, "expected ')' after expression")?;
                Ok(expr)
            }
            TokenKind::BracketOpen => {
                self.advance();
                let mut elements = Vec::new();

                if !self.check(&TokenKind::BracketClose) {
                    loop {
                        elements.push(self.parse_expression()?);

                        if !self.match_kind(&TokenKind::Comma) {
                            break;
                        }
                    }
                }

                self.consume(TokenKind::BracketClose, "expected ']' after array elements")?;

                Ok(Expr::ArrayLit(elements))
            }
            _ => Err(self.error_at(&token, "expected expression")),
        }
    }

    // ------------------------------------------------------------------
    // Recovery and token-stream helpers
    // ------------------------------------------------------------------

    /// Panic-mode recovery: advance until just past a `;` or to the start of
    /// the next statement keyword.
    fn synchronize(&mut self) {
        self.advance();

        while !self.is_at_end() {
            if self.previous().kind == TokenKind::Semicolon {
                return;
            }

            match self.peek().kind {
                TokenKind::Keyword(
                    Keyword::Function
                    | Keyword::Var
                    | Keyword::Let
                    | Keyword::Const
                    | Keyword::For
                    | Keyword::If
                    | Keyword::While
                    | Keyword::Return,
                ) => return,
                _ => {}
            }

            self.advance();
        }
    }

    /// Returns the declaration keyword at the cursor.
    ///
    /// # Panics
    ///
    /// Panics if the current token is not `let`, `var` or `const`.
    fn decl_kind(&self) -> DeclKind {
        match self.peek().kind {
            TokenKind::Keyword(Keyword::Let) => DeclKind::Let,
            TokenKind::Keyword(Keyword::Var) => DeclKind::Var,
            TokenKind::Keyword(Keyword::Const) => DeclKind::Const,
            _ => unreachable!("caller checked for a declaration keyword"),
        }
    }

    fn peek(&self) -> &Token {
        // The Eof terminator guarantees a last token.
        self.tokens
            .get(self.current)
            .unwrap_or_else(|| self.tokens.last().expect("token stream is never empty"))
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current - 1]
    }

    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous()
    }

    fn is_at_end(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    fn check(&self, kind: &TokenKind) -> bool {
        !self.is_at_end() && self.peek().kind == *kind
    }

    fn match_kind(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            return true;
        }
        false
    }

    fn match_op(&mut self, op: OperatorKind) -> bool {
        self.match_kind(&TokenKind::Operator(op))
    }

    fn match_ops(&mut self, ops: &[OperatorKind]) -> bool {
        ops.iter().any(|op| self.match_op(*op))
    }

    fn match_keyword(&mut self, keyword: Keyword) -> bool {
        self.match_kind(&TokenKind::Keyword(keyword))
    }

    fn consume(&mut self, kind: TokenKind, message: &str) -> Result<Token, ParseError> {
        if self.check(&kind) {
            return Ok(self.advance().clone());
        }

        Err(self.error_at(&self.peek().clone(), message))
    }

    fn consume_ident(&mut self, message: &str) -> Result<Token, ParseError> {
        self.consume(TokenKind::Ident, message)
    }

    /// Builds a diagnostic located at `token` without recording it.
    fn error_at(&self, token: &Token, message: &str) -> ParseError {
        ParseError {
            message: message.to_owned(),
            found: token.to_string(),
            line: token.line,
            col: token.col,
        }
    }

    /// Records a diagnostic located at `token` and continues parsing.
    fn report(&mut self, token: &Token, message: &str) {
        let err = self.error_at(token, message);
        self.diagnostics.push(err);
    }
}

fn binary(lhs: Expr, op: String, rhs: Expr) -> Expr {
    Expr::Binary {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::lexer::Lexer;

    fn parse(source: &str) -> (Option<Program>, Vec<ParseError>) {
        let tokens = Lexer::new(source).tokenize();
        let mut parser = Parser::new(tokens);
        let program = parser.parse();
        let diagnostics = parser.diagnostics().to_vec();
        (program, diagnostics)
    }

    fn parse_ok(source: &str) -> Program {
        let (program, diagnostics) = parse(source);
        assert!(diagnostics.is_empty(), "diagnostics: {diagnostics:?}");
        program.expect("program should parse")
    }

    fn first_expr(program: &Program) -> &Expr {
        match &program.statements[0] {
            Stmt::Expression(expr) => expr,
            other => panic!("expected expression statement, got {other:?}"),
        }
    }

    #[test]
    fn parser_precedence_mul_binds_tighter() {
        let program = parse_ok("1 + 2 * 3;");
        assert_eq!(first_expr(&program).to_string(), "(Num(1) + (Num(2) * Num(3)))");

        let program = parse_ok("1 * 2 + 3;");
        assert_eq!(first_expr(&program).to_string(), "((Num(1) * Num(2)) + Num(3))");
    }

    #[test]
    fn parser_left_associative_subtraction() {
        let program = parse_ok("10 - 4 - 3;");
        assert_eq!(
            first_expr(&program).to_string(),
            "((Num(10) - Num(4)) - Num(3))"
        );
    }

    #[test]
    fn parser_assignment_is_right_associative() {
        let program = parse_ok("a = b = 1;");

        let Expr::Assign { name, value } = first_expr(&program) else {
            panic!("expected assignment");
        };
        assert_eq!(name, "a");
        assert!(matches!(**value, Expr::Assign { .. }));
    }

    #[test]
    fn parser_logical_precedence() {
        // `||` binds loosest: (a && b) || c.
        let program = parse_ok("a && b || c;");
        assert_eq!(
            first_expr(&program).to_string(),
            "((Var(\"a\") && Var(\"b\")) || Var(\"c\"))"
        );
    }

    #[test]
    fn parser_unary_chain() {
        let program = parse_ok("!-x;");
        assert_eq!(first_expr(&program).to_string(), "!-Var(\"x\")");
    }

    #[test]
    fn parser_call_with_arguments() {
        let program = parse_ok("min(1, 2, x);");

        let Expr::Call { name, args } = first_expr(&program) else {
            panic!("expected call");
        };
        assert_eq!(name, "min");
        assert_eq!(args.len(), 3);
    }

    #[test]
    fn parser_array_literal_and_index() {
        let program = parse_ok("let a = [10, 20, 30]; a[1];");

        let Stmt::VarDecl { init, .. } = &program.statements[0] else {
            panic!("expected declaration");
        };
        assert!(matches!(init, Some(Expr::ArrayLit(elements)) if elements.len() == 3));

        let Stmt::Expression(Expr::Index { array, index }) = &program.statements[1] else {
            panic!("expected index expression");
        };
        assert!(matches!(**array, Expr::Ident(ref name) if name == "a"));
        assert!(matches!(**index, Expr::Number(v) if v == 1.0));
    }

    #[test]
    fn parser_empty_array_literal() {
        let program = parse_ok("let a = [];");
        let Stmt::VarDecl { init, .. } = &program.statements[0] else {
            panic!("expected declaration");
        };
        assert!(matches!(init, Some(Expr::ArrayLit(elements)) if elements.is_empty()));
    }

    #[test]
    fn parser_index_assignment() {
        let program = parse_ok("a[1] = 99;");
        assert!(matches!(
            first_expr(&program),
            Expr::IndexAssign { .. }
        ));
    }

    #[test]
    fn parser_invalid_assignment_target() {
        // The invalid target is reported, then the unconsumed `= 2` trips the
        // statement terminator check, mirroring the cascade the recovery
        // design accepts.
        let (_, diagnostics) = parse("1 = 2;");

        assert!(diagnostics[0].message.contains("invalid assignment target"));
    }

    #[test]
    fn parser_can_only_call_functions() {
        let (_, diagnostics) = parse("1(2);");
        assert!(
            diagnostics
                .iter()
                .any(|d| d.message.contains("can only call functions"))
        );
    }

    #[test]
    fn parser_function_declaration() {
        let program = parse_ok("function add(a, b) { return a + b; }");

        let Stmt::FuncDecl { name, params, body } = &program.statements[0] else {
            panic!("expected function declaration");
        };
        assert_eq!(name, "add");
        assert_eq!(params, &["a", "b"]);
        assert!(matches!(body[0], Stmt::Return(Some(_))));
    }

    #[test]
    fn parser_if_else_binds_to_nearest() {
        let program = parse_ok("if (a) if (b) x = 1; else x = 2;");

        let Stmt::If { then, opt_else, .. } = &program.statements[0] else {
            panic!("expected if");
        };
        assert!(opt_else.is_none());
        assert!(matches!(**then, Stmt::If { ref opt_else, .. } if opt_else.is_some()));
    }

    #[test]
    fn parser_for_with_all_clauses() {
        let program = parse_ok("for (let i = 0; i < 3; i = i + 1) { print(i); }");

        let Stmt::For {
            init,
            cond,
            update,
            ..
        } = &program.statements[0]
        else {
            panic!("expected for");
        };
        assert!(init.is_some());
        assert!(cond.is_some());
        assert!(update.is_some());
    }

    #[test]
    fn parser_for_with_empty_clauses() {
        let program = parse_ok("for (;;) { }");

        let Stmt::For {
            init,
            cond,
            update,
            ..
        } = &program.statements[0]
        else {
            panic!("expected for");
        };
        assert!(init.is_none());
        assert!(cond.is_none());
        assert!(update.is_none());
    }

    #[test]
    fn parser_recovers_and_reports_multiple_errors() {
        let (program, diagnostics) = parse("let = 1; let x = 2; let = 3; let y = 4;");

        let program = program.expect("recovery should keep complete statements");
        assert_eq!(program.statements.len(), 2);
        assert_eq!(diagnostics.len(), 2);
    }

    #[test]
    fn parser_returns_none_when_nothing_parses() {
        let (program, diagnostics) = parse(")");
        assert!(program.is_none());
        assert!(!diagnostics.is_empty());
    }

    #[test]
    fn parser_empty_input_is_empty_program() {
        let (program, diagnostics) = parse("");
        assert_eq!(program.expect("empty program").statements.len(), 0);
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn parser_dot_is_rejected() {
        // `.` is lexed but has no expression production attached.
        let (_, diagnostics) = parse("a.b;");
        assert!(!diagnostics.is_empty());
    }
}
