//! Abstract Syntax Tree
//!
//! Owned tree of _Twine_ statements and expressions produced by the parser.
//! Every child node is uniquely owned by its parent; there are no cycles.

use std::fmt;

/// Root of a parsed _Twine_ source file.
#[derive(Debug, PartialEq)]
pub struct Program {
    /// Top-level statements in source order.
    pub statements: Vec<Stmt>,
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "AST Program")?;

        for stmt in &self.statements {
            stmt.fmt_with_indent(f, 2)?;
        }

        Ok(())
    }
}

/// Declaring keyword of a variable declaration.
///
/// `const` declarations reject re-assignment during IR emission; `let` and
/// `var` are otherwise interchangeable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum DeclKind {
    Let,
    Var,
    Const,
}

impl fmt::Display for DeclKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kw = match self {
            DeclKind::Let => "let",
            DeclKind::Var => "var",
            DeclKind::Const => "const",
        };
        write!(f, "{kw}")
    }
}

/// _AST_ statement.
#[derive(Debug, PartialEq)]
pub enum Stmt {
    /// An expression evaluated for its side effects; the value is discarded.
    Expression(Expr),
    /// `let`/`var`/`const` declaration with optional initializer.
    #[allow(missing_docs)]
    VarDecl {
        kind: DeclKind,
        name: String,
        init: Option<Expr>,
    },
    /// `{ ... }` statement list opening a new scope.
    Block(Vec<Stmt>),
    #[allow(missing_docs)]
    If {
        cond: Expr,
        then: Box<Stmt>,
        opt_else: Option<Box<Stmt>>,
    },
    #[allow(missing_docs)]
    While { cond: Expr, body: Box<Stmt> },
    /// `for` loop; all three clauses are optional.
    #[allow(missing_docs)]
    For {
        init: Option<Box<Stmt>>,
        cond: Option<Expr>,
        update: Option<Expr>,
        body: Box<Stmt>,
    },
    /// `return` with optional value.
    Return(Option<Expr>),
    /// `function name(params) { ... }`.
    #[allow(missing_docs)]
    FuncDecl {
        name: String,
        params: Vec<String>,
        body: Vec<Stmt>,
    },
}

impl Stmt {
    fn fmt_with_indent(&self, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
        let pad = "  ".repeat(indent);

        match self {
            Stmt::Expression(expr) => writeln!(f, "{pad}Expr: {expr}"),
            Stmt::VarDecl { kind, name, init } => match init {
                Some(expr) => writeln!(f, "{pad}Decl({kind}): {name:?} = {expr}"),
                None => writeln!(f, "{pad}Decl({kind}): {name:?} = uninit"),
            },
            Stmt::Block(stmts) => {
                writeln!(f, "{pad}Block: {{")?;

                for stmt in stmts {
                    stmt.fmt_with_indent(f, indent + 2)?;
                }

                writeln!(f, "{pad}}}")
            }
            Stmt::If {
                cond,
                then,
                opt_else,
            } => {
                writeln!(f, "{pad}If ({cond})")?;
                writeln!(f, "{pad}Then:")?;
                then.fmt_with_indent(f, indent + 2)?;

                if let Some(else_stmt) = opt_else {
                    writeln!(f, "{pad}Else:")?;
                    else_stmt.fmt_with_indent(f, indent + 2)?;
                }

                Ok(())
            }
            Stmt::While { cond, body } => {
                writeln!(f, "{pad}While ({cond})")?;
                body.fmt_with_indent(f, indent + 2)
            }
            Stmt::For {
                init,
                cond,
                update,
                body,
            } => {
                let cond_fmt = cond.as_ref().map(Expr::to_string).unwrap_or_default();
                let update_fmt = update.as_ref().map(Expr::to_string).unwrap_or_default();

                writeln!(f, "{pad}For (..; {cond_fmt}; {update_fmt})")?;

                if let Some(init) = init {
                    writeln!(f, "{pad}Init:")?;
                    init.fmt_with_indent(f, indent + 2)?;
                }

                body.fmt_with_indent(f, indent + 2)
            }
            Stmt::Return(value) => match value {
                Some(expr) => writeln!(f, "{pad}Return {expr}"),
                None => writeln!(f, "{pad}Return"),
            },
            Stmt::FuncDecl { name, params, body } => {
                writeln!(f, "{pad}Fn {:?}({})", name, params.join(", "))?;

                for stmt in body {
                    stmt.fmt_with_indent(f, indent + 2)?;
                }

                Ok(())
            }
        }
    }
}

/// _AST_ expression.
///
/// Operators are stored as their source spelling (`"+"`, `"=="`, `"&&"`, ...).
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Number literal; all _Twine_ numbers are IEEE-754 doubles.
    Number(f64),
    /// String literal, already unescaped.
    Str(String),
    /// `true` or `false`.
    Bool(bool),
    /// `null`.
    Null,
    /// Variable reference.
    Ident(String),
    /// Binary operator applied to two expressions.
    #[allow(missing_docs)]
    Binary {
        op: String,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// Unary operator (`-` or `!`) applied to an expression.
    #[allow(missing_docs)]
    Unary { op: String, operand: Box<Expr> },
    /// `name = value`.
    #[allow(missing_docs)]
    Assign { name: String, value: Box<Expr> },
    /// `array[index] = value`.
    #[allow(missing_docs)]
    IndexAssign {
        array: Box<Expr>,
        index: Box<Expr>,
        value: Box<Expr>,
    },
    /// Call of a built-in or user-defined function by name.
    #[allow(missing_docs)]
    Call { name: String, args: Vec<Expr> },
    /// `[e1, e2, ...]`.
    ArrayLit(Vec<Expr>),
    /// `array[index]`.
    #[allow(missing_docs)]
    Index { array: Box<Expr>, index: Box<Expr> },
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Number(v) => write!(f, "Num({v})"),
            Expr::Str(s) => write!(f, "Str({s:?})"),
            Expr::Bool(b) => write!(f, "Bool({b})"),
            Expr::Null => write!(f, "Null"),
            Expr::Ident(name) => write!(f, "Var({name:?})"),
            Expr::Binary { op, lhs, rhs } => write!(f, "({lhs} {op} {rhs})"),
            Expr::Unary { op, operand } => write!(f, "{op}{operand}"),
            Expr::Assign { name, value } => write!(f, "{name:?} = {value}"),
            Expr::IndexAssign {
                array,
                index,
                value,
            } => write!(f, "{array}[{index}] = {value}"),
            Expr::Call { name, args } => {
                let args_fmt = args
                    .iter()
                    .map(Expr::to_string)
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "{name:?}({args_fmt})")
            }
            Expr::ArrayLit(elements) => {
                let elems_fmt = elements
                    .iter()
                    .map(Expr::to_string)
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "[{elems_fmt}]")
            }
            Expr::Index { array, index } => write!(f, "{array}[{index}]"),
        }
    }
}
