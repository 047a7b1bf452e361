//! Code Generation
//!
//! Compiler pass that lowers a _Twine_ abstract syntax tree into SSA _IR_.
//!
//! _Twine_ is dynamically typed while the _IR_ is statically typed, so the
//! emitter reconciles type variance at three choke points: assignment
//! re-slots variables whose runtime type changed, ambiguous pointers are
//! discriminated at use sites by sniffing their first byte, and doubles are
//! boxed into heap cells whenever a pointer-shaped value is required. See
//! [`values`] for the conversion helpers and [`builtins`] for the built-in
//! call lowerings.

mod builtins;
mod values;

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;

use thiserror::Error;

use crate::compiler::ast::{DeclKind, Expr, Program, Stmt};
use crate::compiler::ir::{
    BinOp, Builder, FloatPred, FnTy, FuncId, GlobalId, GlobalInit, IntPred, Linkage, Ty, Value,
    verify::{self, VerifyError},
};

/// Fatal errors raised during _IR_ emission. Any of these unwinds the current
/// compilation; no _IR_ is produced afterwards.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EmitError {
    /// Reference to a name with no visible declaration.
    #[error("codegen error: undefined variable '{0}'")]
    UndefinedVariable(String),
    /// Call of a name that is neither a built-in nor a declared function.
    #[error("codegen error: undefined function '{0}'")]
    UndefinedFunction(String),
    /// Operator spelling with no lowering.
    #[error("codegen error: unknown operator '{0}'")]
    UnknownOperator(String),
    /// Call with the wrong number of arguments.
    #[error("codegen error: {name}() expects {expected} argument(s), got {got}")]
    ArityMismatch {
        #[allow(missing_docs)]
        name: String,
        /// Human-readable arity, e.g. `"exactly 1"` or `"at least 2"`.
        expected: String,
        #[allow(missing_docs)]
        got: usize,
    },
    /// Call with an argument of a compile-time-known wrong shape.
    #[error("codegen error: {name}() argument {position} must be {expected}")]
    ArgumentTypeError {
        #[allow(missing_docs)]
        name: String,
        /// 1-based argument position.
        position: usize,
        #[allow(missing_docs)]
        expected: &'static str,
    },
    /// Assignment to a `const`-declared name.
    #[error("codegen error: cannot assign to constant '{0}'")]
    ConstReassignment(String),
    /// A generated function failed structural verification and was erased.
    #[error("codegen error: generated function '{name}' failed verification: {source}")]
    FunctionVerificationFailed {
        #[allow(missing_docs)]
        name: String,
        #[allow(missing_docs)]
        source: VerifyError,
    },
    /// The finished module failed structural verification.
    #[error("codegen error: module verification failed: {0}")]
    ModuleVerificationFailed(VerifyError),
}

/// A stack slot backing a mutable variable.
#[derive(Debug, Clone)]
struct Slot {
    /// The `alloca` in the owning function's entry block.
    ptr: Value,
    /// Allocated type; assignment of a differently-typed value re-slots.
    ty: Ty,
    /// Set for `const` declarations; assignment is rejected.
    is_const: bool,
}

/// How emitted code reaches the C `stdin` stream.
#[derive(Debug, Clone, Copy)]
enum StdinAccess {
    /// Load from the external `stdin` global (Unix-like C runtimes).
    Global(GlobalId),
    /// Call the emitted `get_stdin_ptr` helper wrapping `__acrt_iob_func(0)`
    /// (MSVC-compatible C runtimes).
    Helper(FuncId),
}

/// Lowers a parsed `Program` into an _IR_ module and serializes it.
#[derive(Debug)]
pub struct Compiler {
    builder: Builder,
    /// Scope stack, innermost scope last. Never empty during emission.
    scopes: Vec<HashMap<String, Slot>>,
    /// Function table: built-in runtime symbols plus user-defined functions.
    functions: HashMap<String, FuncId>,
    /// Interned C-string constants, keyed by their bytes without the NUL.
    cstrings: HashMap<Vec<u8>, GlobalId>,
    current_function: Option<FuncId>,
    stdin_access: StdinAccess,
    /// `(_random_state, _random_seeded)`, created on first `random()` call.
    random_globals: Option<(GlobalId, GlobalId)>,
}

impl Compiler {
    /// Returns a new `Compiler` for a module named `module_name`, with every
    /// runtime-facing symbol already declared.
    #[must_use]
    pub fn new(module_name: &str) -> Self {
        let mut builder = Builder::new(module_name);
        let mut functions = HashMap::new();

        let f64_1 = FnTy::new(vec![Ty::F64], Ty::F64, false);
        let f64_2 = FnTy::new(vec![Ty::F64, Ty::F64], Ty::F64, false);
        let str_fns: [(&str, &str, FnTy); 20] = [
            ("printf", "printf", FnTy::new(vec![Ty::Ptr], Ty::I32, true)),
            ("scanf", "scanf", FnTy::new(vec![Ty::Ptr], Ty::I32, true)),
            (
                "fgets",
                "fgets",
                FnTy::new(vec![Ty::Ptr, Ty::I32, Ty::Ptr], Ty::Ptr, false),
            ),
            (
                "snprintf",
                "snprintf",
                FnTy::new(vec![Ty::Ptr, Ty::I64, Ty::Ptr], Ty::I32, true),
            ),
            ("atof", "atof", FnTy::new(vec![Ty::Ptr], Ty::F64, false)),
            ("atoi", "atoi", FnTy::new(vec![Ty::Ptr], Ty::I32, false)),
            ("puts", "puts", FnTy::new(vec![Ty::Ptr], Ty::I32, false)),
            ("fabs", "fabs", f64_1.clone()),
            // The math functions are table-aliased so the built-ins `round`,
            // `pow` and `sqrt` do not shadow the C symbols they call.
            ("mathRound", "round", f64_1.clone()),
            ("mathPow", "pow", f64_2.clone()),
            ("mathSqrt", "sqrt", f64_1.clone()),
            ("rand", "rand", FnTy::new(vec![], Ty::I32, false)),
            ("srand", "srand", FnTy::new(vec![Ty::I32], Ty::Void, false)),
            ("time", "time", FnTy::new(vec![Ty::Ptr], Ty::I64, false)),
            ("strlen", "strlen", FnTy::new(vec![Ty::Ptr], Ty::I64, false)),
            ("malloc", "malloc", FnTy::new(vec![Ty::I64], Ty::Ptr, false)),
            (
                "strcpy",
                "strcpy",
                FnTy::new(vec![Ty::Ptr, Ty::Ptr], Ty::Ptr, false),
            ),
            (
                "strcat",
                "strcat",
                FnTy::new(vec![Ty::Ptr, Ty::Ptr], Ty::Ptr, false),
            ),
            (
                "strstr",
                "strstr",
                FnTy::new(vec![Ty::Ptr, Ty::Ptr], Ty::Ptr, false),
            ),
            (
                "strncpy",
                "strncpy",
                FnTy::new(vec![Ty::Ptr, Ty::Ptr, Ty::I64], Ty::Ptr, false),
            ),
        ];

        for (table_name, symbol, ty) in str_fns {
            let id = builder.module_mut().add_function(symbol, ty, Linkage::External);
            functions.insert(table_name.to_owned(), id);
        }

        let stdin_access = if cfg!(target_os = "windows") {
            StdinAccess::Helper(declare_stdin_helper(&mut builder))
        } else {
            let id =
                builder
                    .module_mut()
                    .add_global("stdin", Ty::Ptr, Linkage::External, None, false);
            StdinAccess::Global(id)
        };

        Self {
            builder,
            // Global scope; alive for the duration of one compilation.
            scopes: vec![HashMap::new()],
            functions,
            cstrings: HashMap::new(),
            current_function: None,
            stdin_access,
            random_globals: None,
        }
    }

    /// Lowers `program` into the module: top-level statements into `main`
    /// (`() -> i32`, external linkage), function declarations into internal
    /// `(double, ...) -> ptr` definitions.
    ///
    /// # Errors
    ///
    /// Returns the first fatal [`EmitError`]; no partial _IR_ should be
    /// consumed afterwards.
    pub fn compile(&mut self, program: &Program) -> Result<(), EmitError> {
        let result = self.compile_inner(program);

        // Symbol tables do not outlive a compilation, even an aborted one.
        self.scopes.clear();
        self.scopes.push(HashMap::new());
        self.current_function = None;

        result
    }

    fn compile_inner(&mut self, program: &Program) -> Result<(), EmitError> {
        let main = self.builder.module_mut().add_function(
            "main",
            FnTy::new(vec![], Ty::I32, false),
            Linkage::External,
        );
        let entry = self.builder.append_block(main, "entry");
        self.builder.position_at_end(main, entry);
        self.current_function = Some(main);

        // Pre-declare user functions so forward references and recursion
        // resolve during statement emission.
        for stmt in &program.statements {
            if let Stmt::FuncDecl { name, params, .. } = stmt {
                self.declare_user_function(name, params.len());
            }
        }

        for stmt in &program.statements {
            self.emit_stmt(stmt)?;
        }

        if !self.builder.current_block_terminated() {
            self.builder.build_ret(Some(Value::I32(0)));
        }

        self.builder.clear_insertion_point();

        verify::verify_module(self.builder.module()).map_err(EmitError::ModuleVerificationFailed)
    }

    /// Serializes the module to textual _IR_.
    #[must_use]
    pub fn dump_ir(&self) -> String {
        self.builder.module().to_string()
    }

    /// Writes the textual _IR_ to `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn write_ir(&self, path: &Path) -> io::Result<()> {
        fs::write(path, self.dump_ir())
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn emit_stmt(&mut self, stmt: &Stmt) -> Result<(), EmitError> {
        // Once a block is terminated the rest of its statement list is dead
        // code; skipping it keeps the one-terminator invariant. Function
        // declarations are still emitted since they are not control flow.
        if self.builder.current_block_terminated() && !matches!(stmt, Stmt::FuncDecl { .. }) {
            return Ok(());
        }

        match stmt {
            Stmt::Expression(expr) => {
                // Evaluated for side effects; the value is discarded.
                self.emit_expr(expr)?;
                Ok(())
            }
            Stmt::VarDecl { kind, name, init } => {
                let value = match init {
                    Some(expr) => self.emit_expr(expr)?,
                    None => Value::F64(0.0),
                };

                let ty = self.builder.value_ty(&value);
                let func = self.func();
                let ptr = self.builder.build_entry_alloca(func, ty.clone(), name);
                self.builder.build_store(value, ptr);

                self.scopes
                    .last_mut()
                    .expect("scope stack is never empty during emission")
                    .insert(
                        name.clone(),
                        Slot {
                            ptr,
                            ty,
                            is_const: *kind == DeclKind::Const,
                        },
                    );

                Ok(())
            }
            Stmt::Block(stmts) => {
                self.scopes.push(HashMap::new());
                let result = stmts.iter().try_for_each(|s| self.emit_stmt(s));
                // Popped on the error path too.
                self.scopes.pop();
                result
            }
            Stmt::If {
                cond,
                then,
                opt_else,
            } => self.emit_if(cond, then, opt_else.as_deref()),
            Stmt::While { cond, body } => self.emit_while(cond, body),
            Stmt::For {
                init,
                cond,
                update,
                body,
            } => self.emit_for(init.as_deref(), cond.as_ref(), update.as_ref(), body),
            Stmt::Return(value) => self.emit_return(value.as_ref()),
            Stmt::FuncDecl { name, params, body } => self.emit_function(name, params, body),
        }
    }

    fn emit_if(
        &mut self,
        cond: &Expr,
        then: &Stmt,
        opt_else: Option<&Stmt>,
    ) -> Result<(), EmitError> {
        let cond = self.emit_expr(cond)?;
        let cond = self.to_bool(cond);

        let func = self.func();
        let then_bb = self.builder.append_block(func, "then");
        let else_bb = opt_else.map(|_| self.builder.append_block(func, "else"));
        let merge_bb = self.builder.append_block(func, "merge");

        self.builder
            .build_cond_br(cond, then_bb, else_bb.unwrap_or(merge_bb));

        self.builder.position_at_end(func, then_bb);
        self.emit_stmt(then)?;
        if !self.builder.current_block_terminated() {
            self.builder.build_br(merge_bb);
        }

        if let (Some(else_bb), Some(else_stmt)) = (else_bb, opt_else) {
            self.builder.position_at_end(func, else_bb);
            self.emit_stmt(else_stmt)?;
            if !self.builder.current_block_terminated() {
                self.builder.build_br(merge_bb);
            }
        }

        self.builder.position_at_end(func, merge_bb);
        Ok(())
    }

    fn emit_while(&mut self, cond: &Expr, body: &Stmt) -> Result<(), EmitError> {
        let func = self.func();
        let cond_bb = self.builder.append_block(func, "while.cond");
        let body_bb = self.builder.append_block(func, "while.body");
        let end_bb = self.builder.append_block(func, "while.end");

        self.builder.build_br(cond_bb);

        self.builder.position_at_end(func, cond_bb);
        let cond = self.emit_expr(cond)?;
        let cond = self.to_bool(cond);
        self.builder.build_cond_br(cond, body_bb, end_bb);

        self.builder.position_at_end(func, body_bb);
        self.emit_stmt(body)?;
        if !self.builder.current_block_terminated() {
            self.builder.build_br(cond_bb);
        }

        self.builder.position_at_end(func, end_bb);
        Ok(())
    }

    fn emit_for(
        &mut self,
        init: Option<&Stmt>,
        cond: Option<&Expr>,
        update: Option<&Expr>,
        body: &Stmt,
    ) -> Result<(), EmitError> {
        if let Some(init) = init {
            self.emit_stmt(init)?;
        }

        let func = self.func();
        let cond_bb = self.builder.append_block(func, "for.cond");
        let body_bb = self.builder.append_block(func, "for.body");
        let update_bb = self.builder.append_block(func, "for.update");
        let end_bb = self.builder.append_block(func, "for.end");

        self.builder.build_br(cond_bb);

        self.builder.position_at_end(func, cond_bb);
        match cond {
            Some(cond) => {
                let cond = self.emit_expr(cond)?;
                let cond = self.to_bool(cond);
                self.builder.build_cond_br(cond, body_bb, end_bb);
            }
            None => self.builder.build_br(body_bb),
        }

        self.builder.position_at_end(func, body_bb);
        self.emit_stmt(body)?;
        if !self.builder.current_block_terminated() {
            self.builder.build_br(update_bb);
        }

        self.builder.position_at_end(func, update_bb);
        if let Some(update) = update {
            // Result discarded.
            self.emit_expr(update)?;
        }
        self.builder.build_br(cond_bb);

        self.builder.position_at_end(func, end_bb);
        Ok(())
    }

    fn emit_return(&mut self, value: Option<&Expr>) -> Result<(), EmitError> {
        let func = self.func();
        let ret_ty = self.builder.module().function(func).ty.ret.clone();

        match value {
            Some(expr) => {
                let value = self.emit_expr(expr)?;
                let value = self.coerce_return(value, &ret_ty);
                self.builder.build_ret(Some(value));
            }
            None => {
                if ret_ty == Ty::Void {
                    self.builder.build_ret(None);
                } else {
                    let zero = values::zero_of(&ret_ty);
                    self.builder.build_ret(Some(zero));
                }
            }
        }

        Ok(())
    }

    fn emit_function(
        &mut self,
        name: &str,
        params: &[String],
        body: &[Stmt],
    ) -> Result<(), EmitError> {
        let func = match self.functions.get(name) {
            Some(id) => *id,
            // Nested declarations are not pre-declared by the top-level walk.
            None => self.declare_user_function(name, params.len()),
        };

        let saved_point = self.builder.insertion_point();
        let saved_function = self.current_function;
        self.current_function = Some(func);

        {
            let module = self.builder.module_mut();
            let function = module.function_mut(func);
            function.param_names = params.to_vec();
        }

        let entry = self.builder.append_block(func, "entry");
        self.builder.position_at_end(func, entry);

        self.scopes.push(HashMap::new());
        for (i, param) in params.iter().enumerate() {
            let ptr = self.builder.build_entry_alloca(func, Ty::F64, param);
            self.builder.build_store(Value::Arg(i), ptr);
            self.scopes
                .last_mut()
                .expect("function scope was just pushed")
                .insert(
                    param.clone(),
                    Slot {
                        ptr,
                        ty: Ty::F64,
                        is_const: false,
                    },
                );
        }

        let result = body.iter().try_for_each(|s| self.emit_stmt(s));

        if result.is_ok() && !self.builder.current_block_terminated() {
            self.builder.build_ret(Some(Value::NullPtr));
        }

        // Scope, insertion point and current function are restored on the
        // error path too.
        self.scopes.pop();
        self.current_function = saved_function;
        match saved_point {
            Some((f, b)) => self.builder.position_at_end(f, b),
            None => self.builder.clear_insertion_point(),
        }

        result?;

        if let Err(err) = verify::verify_function(self.builder.module(), func) {
            self.builder.module_mut().erase_function(func);
            return Err(EmitError::FunctionVerificationFailed {
                name: name.to_owned(),
                source: err,
            });
        }

        Ok(())
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    fn emit_expr(&mut self, expr: &Expr) -> Result<Value, EmitError> {
        match expr {
            Expr::Number(v) => Ok(Value::F64(*v)),
            Expr::Str(s) => {
                let bytes = s.as_bytes().to_vec();
                Ok(Value::Global(self.cstring(bytes)))
            }
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Null => Ok(Value::NullPtr),
            Expr::Ident(name) => self.get_variable(name),
            Expr::Binary { op, lhs, rhs } => self.emit_binary(op, lhs, rhs),
            Expr::Unary { op, operand } => self.emit_unary(op, operand),
            Expr::Assign { name, value } => {
                let value = self.emit_expr(value)?;
                self.set_variable(name, value)?;
                Ok(value)
            }
            Expr::IndexAssign {
                array,
                index,
                value,
            } => {
                let array = self.emit_expr(array)?;
                let index = self.emit_expr(index)?;
                let index = self.to_index(index);
                let value = self.emit_expr(value)?;
                let value = self.to_f64(value);

                let slot = self.builder.build_gep(Ty::F64, array, index, "elem");
                self.builder.build_store(value, slot);

                Ok(value)
            }
            Expr::Call { name, args } => self.emit_call(name, args),
            Expr::ArrayLit(elements) => self.emit_array_literal(elements),
            Expr::Index { array, index } => {
                let array = self.emit_expr(array)?;
                let index = self.emit_expr(index)?;
                let index = self.to_index(index);

                let slot = self.builder.build_gep(Ty::F64, array, index, "elem");
                Ok(self.builder.build_load(Ty::F64, slot, "elemval"))
            }
        }
    }

    fn emit_binary(&mut self, op: &str, lhs: &Expr, rhs: &Expr) -> Result<Value, EmitError> {
        // Both sides are evaluated eagerly, `&&`/`||` included: logical
        // operators do not short-circuit in this language.
        let lhs = self.emit_expr(lhs)?;
        let rhs = self.emit_expr(rhs)?;

        let lhs_ty = self.builder.value_ty(&lhs);
        let rhs_ty = self.builder.value_ty(&rhs);
        let any_ptr = lhs_ty.is_ptr() || rhs_ty.is_ptr();
        let both_ptr = lhs_ty.is_ptr() && rhs_ty.is_ptr();

        let result = match op {
            "+" if any_ptr => self.string_concat(lhs, rhs),
            // Pointer identity for compares between two pointers.
            "==" if both_ptr => self.builder.build_icmp(IntPred::Eq, lhs, rhs, "eq"),
            "!=" if both_ptr => self.builder.build_icmp(IntPred::Ne, lhs, rhs, "ne"),
            "<" if both_ptr => self.builder.build_icmp(IntPred::Slt, lhs, rhs, "lt"),
            ">" if both_ptr => self.builder.build_icmp(IntPred::Sgt, lhs, rhs, "gt"),
            "<=" if both_ptr => self.builder.build_icmp(IntPred::Sle, lhs, rhs, "le"),
            ">=" if both_ptr => self.builder.build_icmp(IntPred::Sge, lhs, rhs, "ge"),
            "&&" => {
                let lhs = self.to_bool(lhs);
                let rhs = self.to_bool(rhs);
                self.builder.build_binop(BinOp::And, lhs, rhs, "and")
            }
            "||" => {
                let lhs = self.to_bool(lhs);
                let rhs = self.to_bool(rhs);
                self.builder.build_binop(BinOp::Or, lhs, rhs, "or")
            }
            _ => {
                // Numeric operator: a pointer operand (a boxed double or a
                // numeric string, e.g. a user-call result) is unboxed first.
                let lhs = if lhs_ty.is_ptr() {
                    self.unbox_to_f64(lhs)
                } else {
                    lhs
                };
                let rhs = if rhs_ty.is_ptr() {
                    self.unbox_to_f64(rhs)
                } else {
                    rhs
                };
                let any_f64 =
                    self.builder.value_ty(&lhs).is_f64() || self.builder.value_ty(&rhs).is_f64();

                match op {
                    "+" => self.arith(BinOp::FAdd, BinOp::Add, any_f64, lhs, rhs, "add"),
                    "-" => self.arith(BinOp::FSub, BinOp::Sub, any_f64, lhs, rhs, "sub"),
                    "*" => self.arith(BinOp::FMul, BinOp::Mul, any_f64, lhs, rhs, "mul"),
                    "/" => {
                        // Division is always floating-point.
                        let lhs = self.to_f64(lhs);
                        let rhs = self.to_f64(rhs);
                        self.builder.build_binop(BinOp::FDiv, lhs, rhs, "div")
                    }
                    "%" => self.arith(BinOp::FRem, BinOp::SRem, any_f64, lhs, rhs, "mod"),
                    "==" => self.compare(FloatPred::Oeq, IntPred::Eq, any_f64, lhs, rhs, "eq"),
                    "!=" => self.compare(FloatPred::One, IntPred::Ne, any_f64, lhs, rhs, "ne"),
                    "<" => self.compare(FloatPred::Olt, IntPred::Slt, any_f64, lhs, rhs, "lt"),
                    ">" => self.compare(FloatPred::Ogt, IntPred::Sgt, any_f64, lhs, rhs, "gt"),
                    "<=" => self.compare(FloatPred::Ole, IntPred::Sle, any_f64, lhs, rhs, "le"),
                    ">=" => self.compare(FloatPred::Oge, IntPred::Sge, any_f64, lhs, rhs, "ge"),
                    _ => return Err(EmitError::UnknownOperator(op.to_owned())),
                }
            }
        };

        Ok(result)
    }

    /// Floating-point op when either side is a double, integer op otherwise.
    fn arith(
        &mut self,
        float_op: BinOp,
        int_op: BinOp,
        any_f64: bool,
        lhs: Value,
        rhs: Value,
        hint: &str,
    ) -> Value {
        if any_f64 {
            let lhs = self.to_f64(lhs);
            let rhs = self.to_f64(rhs);
            self.builder.build_binop(float_op, lhs, rhs, hint)
        } else {
            self.builder.build_binop(int_op, lhs, rhs, hint)
        }
    }

    /// Ordered fp compare when either side is a double, signed integer
    /// compare otherwise.
    fn compare(
        &mut self,
        float_pred: FloatPred,
        int_pred: IntPred,
        any_f64: bool,
        lhs: Value,
        rhs: Value,
        hint: &str,
    ) -> Value {
        if any_f64 {
            let lhs = self.to_f64(lhs);
            let rhs = self.to_f64(rhs);
            self.builder.build_fcmp(float_pred, lhs, rhs, hint)
        } else {
            self.builder.build_icmp(int_pred, lhs, rhs, hint)
        }
    }

    fn emit_unary(&mut self, op: &str, operand: &Expr) -> Result<Value, EmitError> {
        let operand = self.emit_expr(operand)?;
        let ty = self.builder.value_ty(&operand);

        match op {
            "-" => {
                if ty.is_f64() {
                    Ok(self.builder.build_fneg(operand, "neg"))
                } else {
                    let zero = values::zero_of(&ty);
                    Ok(self.builder.build_binop(BinOp::Sub, zero, operand, "neg"))
                }
            }
            "!" => {
                let operand = self.to_bool(operand);
                Ok(self
                    .builder
                    .build_binop(BinOp::Xor, operand, Value::Bool(true), "not"))
            }
            _ => Err(EmitError::UnknownOperator(op.to_owned())),
        }
    }

    fn emit_array_literal(&mut self, elements: &[Expr]) -> Result<Value, EmitError> {
        let count = elements.len();

        // N+1 contiguous doubles: slot 0 holds the element count, the handed
        // out pointer aims at slot 1.
        let bytes = ((count + 1) * 8) as i64;
        let malloc = self.functions["malloc"];
        let raw = self
            .builder
            .build_call(malloc, vec![Value::I64(bytes)], "array");
        self.builder.build_store(Value::F64(count as f64), raw);

        let data = self
            .builder
            .build_gep(Ty::F64, raw, Value::I64(1), "arraydata");

        for (i, element) in elements.iter().enumerate() {
            let value = self.emit_expr(element)?;
            let value = self.to_f64(value);
            let slot = self
                .builder
                .build_gep(Ty::F64, data, Value::I64(i as i64), "elem");
            self.builder.build_store(value, slot);
        }

        Ok(data)
    }

    // ------------------------------------------------------------------
    // Symbol tables
    // ------------------------------------------------------------------

    /// Loads `name` from the innermost scope declaring it.
    fn get_variable(&mut self, name: &str) -> Result<Value, EmitError> {
        for scope in self.scopes.iter().rev() {
            if let Some(slot) = scope.get(name) {
                let slot = slot.clone();
                return Ok(self.builder.build_load(slot.ty, slot.ptr, name));
            }
        }

        Err(EmitError::UndefinedVariable(name.to_owned()))
    }

    /// Stores `value` into `name`. When the incoming type differs from the
    /// slot's allocated type a fresh entry-block slot is allocated and the
    /// symbol-table entry is redirected to it; assignment to an undeclared
    /// name creates it in the current scope.
    fn set_variable(&mut self, name: &str, value: Value) -> Result<(), EmitError> {
        let value_ty = self.builder.value_ty(&value);
        let func = self.func();

        for scope in self.scopes.iter_mut().rev() {
            if let Some(slot) = scope.get_mut(name) {
                if slot.is_const {
                    return Err(EmitError::ConstReassignment(name.to_owned()));
                }

                if slot.ty == value_ty {
                    self.builder.build_store(value, slot.ptr);
                } else {
                    // Runtime type changed; re-slot. Loads through the old
                    // slot stay valid but become unreachable from here on.
                    let ptr = self.builder.build_entry_alloca(
                        func,
                        value_ty.clone(),
                        &format!("{name}_new"),
                    );
                    self.builder.build_store(value, ptr);
                    *slot = Slot {
                        ptr,
                        ty: value_ty,
                        is_const: false,
                    };
                }

                return Ok(());
            }
        }

        let ptr = self.builder.build_entry_alloca(func, value_ty.clone(), name);
        self.builder.build_store(value, ptr);
        self.scopes
            .last_mut()
            .expect("scope stack is never empty during emission")
            .insert(
                name.to_owned(),
                Slot {
                    ptr,
                    ty: value_ty,
                    is_const: false,
                },
            );

        Ok(())
    }

    // ------------------------------------------------------------------
    // Shared plumbing
    // ------------------------------------------------------------------

    fn declare_user_function(&mut self, name: &str, arity: usize) -> FuncId {
        let ty = FnTy::new(vec![Ty::F64; arity], Ty::Ptr, false);
        let id = self
            .builder
            .module_mut()
            .add_function(name, ty, Linkage::Internal);
        self.functions.insert(name.to_owned(), id);
        id
    }

    /// Returns the function currently being emitted into.
    ///
    /// # Panics
    ///
    /// Panics outside of a `compile` call.
    fn func(&self) -> FuncId {
        self.current_function
            .expect("emission is always inside a function")
    }

    /// Interns a NUL-terminated string constant and returns its global.
    fn cstring(&mut self, bytes: Vec<u8>) -> GlobalId {
        if let Some(id) = self.cstrings.get(&bytes) {
            return *id;
        }

        let id = self.builder.module_mut().add_global_string(&bytes);
        self.cstrings.insert(bytes, id);
        id
    }

    /// Value handle for an interned C string.
    fn cstr(&mut self, text: &str) -> Value {
        Value::Global(self.cstring(text.as_bytes().to_vec()))
    }

    /// `(_random_state, _random_seeded)`, creating the globals on first use.
    fn random_globals(&mut self) -> (GlobalId, GlobalId) {
        if let Some(ids) = self.random_globals {
            return ids;
        }

        let module = self.builder.module_mut();
        let state = module.add_global(
            "_random_state",
            Ty::I64,
            Linkage::Internal,
            Some(GlobalInit::I64(0)),
            false,
        );
        let seeded = module.add_global(
            "_random_seeded",
            Ty::I1,
            Linkage::Internal,
            Some(GlobalInit::Bool(false)),
            false,
        );

        self.random_globals = Some((state, seeded));
        (state, seeded)
    }
}

/// Emits the MSVC-runtime `stdin` shim: an internal `get_stdin_ptr` function
/// returning `__acrt_iob_func(0)`.
fn declare_stdin_helper(builder: &mut Builder) -> FuncId {
    let iob = builder.module_mut().add_function(
        "__acrt_iob_func",
        FnTy::new(vec![Ty::I32], Ty::Ptr, false),
        Linkage::External,
    );
    let helper = builder.module_mut().add_function(
        "get_stdin_ptr",
        FnTy::new(vec![], Ty::Ptr, false),
        Linkage::Internal,
    );

    let entry = builder.append_block(helper, "entry");
    builder.position_at_end(helper, entry);
    let stdin_ptr = builder.build_call(iob, vec![Value::I32(0)], "stdin_ptr");
    builder.build_ret(Some(stdin_ptr));
    builder.clear_insertion_point();

    helper
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::lexer::Lexer;
    use crate::compiler::parser::Parser;

    fn compile(source: &str) -> Result<String, EmitError> {
        let tokens = Lexer::new(source).tokenize();
        let mut parser = Parser::new(tokens);
        let program = parser.parse().expect("test sources parse");
        assert!(
            parser.diagnostics().is_empty(),
            "unexpected parse diagnostics: {:?}",
            parser.diagnostics()
        );

        let mut compiler = Compiler::new("test");
        compiler.compile(&program)?;
        Ok(compiler.dump_ir())
    }

    fn compile_ok(source: &str) -> String {
        compile(source).expect("source should compile")
    }

    #[test]
    fn emits_main_returning_zero() {
        let ir = compile_ok("");
        assert!(ir.contains("define i32 @main() {"));
        assert!(ir.contains("ret i32 0"));
    }

    #[test]
    fn arithmetic_folds_to_fp_ops() {
        let ir = compile_ok("print(1 + 2 * 3);");

        assert!(ir.contains("fmul double"));
        assert!(ir.contains("fadd double"));
        // Printed through the %f format string.
        assert!(ir.contains("c\"%f\\0A\\00\""));
        assert!(ir.contains("call i32 (ptr, ...) @printf"));
    }

    #[test]
    fn division_is_always_floating_point() {
        let ir = compile_ok("let x = 7 / 2;");
        assert!(ir.contains("fdiv double"));
    }

    #[test]
    fn string_concatenation_uses_the_c_string_runtime() {
        let ir = compile_ok(r#"let x = "hello"; print(x + " " + "world");"#);

        assert!(ir.contains("declare i64 @strlen(ptr)"));
        assert!(ir.contains("call ptr @strcpy"));
        assert!(ir.contains("call ptr @strcat"));
        assert!(ir.contains("call ptr @malloc"));
    }

    #[test]
    fn variables_reslot_on_type_change() {
        let ir = compile_ok(r#"let x = 1; x = "now a string"; print(x);"#);

        // First slot is a double, the re-slot is a pointer.
        assert!(ir.contains("%x = alloca double"));
        assert!(ir.contains("%x_new = alloca ptr"));
    }

    #[test]
    fn const_reassignment_is_rejected() {
        let err = compile("const k = 1; k = 2;").unwrap_err();
        assert_eq!(err, EmitError::ConstReassignment("k".into()));
    }

    #[test]
    fn undefined_variable_is_fatal() {
        let err = compile("print(missing);").unwrap_err();
        assert_eq!(err, EmitError::UndefinedVariable("missing".into()));
    }

    #[test]
    fn undefined_function_is_fatal() {
        let err = compile("nope(1);").unwrap_err();
        assert_eq!(err, EmitError::UndefinedFunction("nope".into()));
    }

    #[test]
    fn user_functions_are_internal_and_recursive() {
        let ir = compile_ok(
            "function fact(n) { if (n <= 1) { return 1; } else { return n * fact(n - 1); } } \
             print(fact(5));",
        );

        assert!(ir.contains("define internal ptr @fact(double %n) {"));
        // Recursive call inside the body.
        assert!(ir.contains("call ptr @fact(double"));
        // A double return value is boxed into a ptr.
        assert!(ir.contains("call ptr @malloc(i64 8)"));
    }

    #[test]
    fn forward_references_resolve() {
        let ir = compile_ok("print(later(1)); function later(x) { return x; }");
        assert!(ir.contains("define internal ptr @later(double %x)"));
    }

    #[test]
    fn function_without_return_yields_null() {
        let ir = compile_ok("function noop() { } noop();");
        assert!(ir.contains("ret ptr null"));
    }

    #[test]
    fn top_level_return_after_if_suppresses_duplicates() {
        // The then-arm returns; the merge block still carries the trailing
        // print and the implicit final return.
        let ir = compile_ok("if (true) { return; } print(1);");
        assert!(ir.contains("merge:"));
        assert!(ir.contains("call i32 (ptr, ...) @printf"));
    }

    #[test]
    fn while_loop_blocks_are_named() {
        let ir = compile_ok("let i = 0; while (i < 3) { i = i + 1; }");

        assert!(ir.contains("while.cond:"));
        assert!(ir.contains("while.body:"));
        assert!(ir.contains("while.end:"));
    }

    #[test]
    fn for_loop_blocks_are_named() {
        let ir = compile_ok("for (let i = 0; i < 3; i = i + 1) { print(i); }");

        assert!(ir.contains("for.cond:"));
        assert!(ir.contains("for.body:"));
        assert!(ir.contains("for.update:"));
        assert!(ir.contains("for.end:"));
    }

    #[test]
    fn array_literal_stores_count_and_elements() {
        let ir = compile_ok("let a = [10, 20, 30]; a[1] = 99; print(a[1]);");

        // 4 slots of 8 bytes: count plus three elements.
        assert!(ir.contains("call ptr @malloc(i64 32)"));
        // The handed-out pointer aims at slot 1.
        assert!(ir.contains("getelementptr inbounds double, ptr %array, i64 1"));
    }

    #[test]
    fn logical_operators_are_eager() {
        let ir = compile_ok("let x = true && false;");

        assert!(ir.contains("and i1"));
        // No extra control flow for the right-hand side.
        assert!(!ir.contains("then:"));
    }

    #[test]
    fn unary_not_and_negate() {
        let ir = compile_ok("let a = !true; let b = -2; let c = -b;");

        assert!(ir.contains("xor i1 true, true"));
        assert!(ir.contains("fneg double"));
    }

    #[test]
    fn every_block_has_exactly_one_terminator() {
        // Both arms return, leaving an unreachable merge block that must
        // still verify.
        compile_ok(
            "function pick(n) { if (n < 0) { return 0; } else { return 1; } } print(pick(3));",
        );
    }

    #[test]
    fn symbol_tables_are_cleared_between_compilations() {
        let tokens = Lexer::new("let x = 1;").tokenize();
        let program = Parser::new(tokens).parse().expect("parses");

        let mut compiler = Compiler::new("test");
        compiler.compile(&program).expect("compiles");
        assert_eq!(compiler.scopes.len(), 1);
        assert!(compiler.scopes[0].is_empty());
    }

    #[test]
    fn module_ir_verifies_for_the_end_to_end_scenarios() {
        let scenarios = [
            "print(1 + 2 * 3);",
            r#"let x = "hello"; print(x + " " + "world");"#,
            "function fact(n) { if (n <= 1) { return 1; } else { return n * fact(n - 1); } } print(fact(5));",
            "let a = [10, 20, 30]; print(len(a)); a[1] = 99; print(a[1]);",
            r#"let s = "Hello"; print(upper(s)); print(includes(s, "ell"));"#,
            "for (let i = 0; i < 3; i = i + 1) { print(i); }",
        ];

        for source in scenarios {
            compile_ok(source);
        }
    }
}
