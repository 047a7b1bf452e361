//! _IR_ Serialization
//!
//! Textual _LLVM_-compatible rendering of a [`Module`], exposed through its
//! `Display` implementation. Doubles are printed in hexadecimal bit form so
//! the round-trip through the downstream toolchain is exact.

use std::fmt::{self, Write as _};

use super::{
    BinOp, CastOp, FloatPred, FnTy, FuncId, Function, Global, GlobalInit, Instr, InstrKind,
    IntPred, Linkage, Module, Ty, Value,
};

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "; ModuleID = '{}'", self.name)?;
        writeln!(f, "source_filename = \"{}\"", self.name)?;

        let mut globals = self.globals().peekable();
        if globals.peek().is_some() {
            writeln!(f)?;
        }
        for global in globals {
            writeln!(f, "{}", render_global(global))?;
        }

        for (_, function) in self.functions() {
            if function.erased || !function.is_declaration() {
                continue;
            }
            writeln!(f)?;
            writeln!(f, "{}", render_declaration(function))?;
        }

        for (id, function) in self.functions() {
            if function.erased || function.is_declaration() {
                continue;
            }
            writeln!(f)?;
            self.render_definition(id, function, f)?;
        }

        Ok(())
    }
}

impl Module {
    fn render_definition(
        &self,
        id: FuncId,
        function: &Function,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let linkage = match function.linkage {
            Linkage::External => "",
            Linkage::Internal => "internal ",
            Linkage::Private => "private ",
        };

        let params = function
            .ty
            .params
            .iter()
            .zip(&function.param_names)
            .map(|(ty, name)| format!("{ty} %{name}"))
            .collect::<Vec<_>>()
            .join(", ");

        writeln!(
            f,
            "define {linkage}{} @{}({params}) {{",
            function.ty.ret, function.name
        )?;

        for (i, block) in function.blocks.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            writeln!(f, "{}:", block.name)?;

            for instr_id in &block.instrs {
                writeln!(f, "  {}", self.render_instr(id, &function.instrs[*instr_id]))?;
            }
        }

        writeln!(f, "}}")
    }

    fn render_instr(&self, func: FuncId, instr: &Instr) -> String {
        let function = self.function(func);

        let mut out = String::new();
        if instr.ty.is_some() {
            let _ = write!(out, "%{} = ", instr.name);
        }

        match &instr.kind {
            InstrKind::Alloca(ty) => {
                let _ = write!(out, "alloca {ty}");
            }
            InstrKind::Load { ty, ptr } => {
                let _ = write!(out, "load {ty}, ptr {}", self.val(func, ptr));
            }
            InstrKind::Store { value, ptr } => {
                let _ = write!(
                    out,
                    "store {}, ptr {}",
                    self.typed_val(func, value),
                    self.val(func, ptr)
                );
            }
            InstrKind::BinOp { op, lhs, rhs } => {
                let _ = write!(
                    out,
                    "{} {} {}, {}",
                    binop_mnemonic(*op),
                    self.value_ty(func, lhs),
                    self.val(func, lhs),
                    self.val(func, rhs)
                );
            }
            InstrKind::FNeg(value) => {
                let _ = write!(out, "fneg double {}", self.val(func, value));
            }
            InstrKind::ICmp { pred, lhs, rhs } => {
                let _ = write!(
                    out,
                    "icmp {} {} {}, {}",
                    int_pred_mnemonic(*pred),
                    self.value_ty(func, lhs),
                    self.val(func, lhs),
                    self.val(func, rhs)
                );
            }
            InstrKind::FCmp { pred, lhs, rhs } => {
                let _ = write!(
                    out,
                    "fcmp {} double {}, {}",
                    float_pred_mnemonic(*pred),
                    self.val(func, lhs),
                    self.val(func, rhs)
                );
            }
            InstrKind::Cast { op, value, to } => {
                let mnemonic = match op {
                    CastOp::SIToFP => "sitofp",
                    CastOp::FPToSI => "fptosi",
                    CastOp::FPToUI => "fptoui",
                    CastOp::UIToFP => "uitofp",
                    CastOp::ZExt => "zext",
                    CastOp::PtrToInt => "ptrtoint",
                };
                let _ = write!(
                    out,
                    "{mnemonic} {} to {to}",
                    self.typed_val(func, value)
                );
            }
            InstrKind::Select {
                cond,
                then_v,
                else_v,
            } => {
                let _ = write!(
                    out,
                    "select i1 {}, {}, {}",
                    self.val(func, cond),
                    self.typed_val(func, then_v),
                    self.typed_val(func, else_v)
                );
            }
            InstrKind::Call { callee, args } => {
                let target = self.function(*callee);
                let args_fmt = args
                    .iter()
                    .map(|a| self.typed_val(func, a))
                    .collect::<Vec<_>>()
                    .join(", ");

                // Variadic callees require the full function type at the
                // call site.
                if target.ty.variadic {
                    let _ = write!(
                        out,
                        "call {} @{}({args_fmt})",
                        render_fn_ty(&target.ty),
                        target.name
                    );
                } else {
                    let _ = write!(out, "call {} @{}({args_fmt})", target.ty.ret, target.name);
                }
            }
            InstrKind::Gep {
                elem_ty,
                base,
                index,
            } => {
                let _ = write!(
                    out,
                    "getelementptr inbounds {elem_ty}, ptr {}, {}",
                    self.val(func, base),
                    self.typed_val(func, index)
                );
            }
            InstrKind::Phi { ty, incoming } => {
                let edges = incoming
                    .iter()
                    .map(|(value, block)| {
                        format!(
                            "[ {}, %{} ]",
                            self.val(func, value),
                            function.blocks[block.0].name
                        )
                    })
                    .collect::<Vec<_>>()
                    .join(", ");
                let _ = write!(out, "phi {ty} {edges}");
            }
            InstrKind::Br(dest) => {
                let _ = write!(out, "br label %{}", function.blocks[dest.0].name);
            }
            InstrKind::CondBr {
                cond,
                then_bb,
                else_bb,
            } => {
                let _ = write!(
                    out,
                    "br i1 {}, label %{}, label %{}",
                    self.val(func, cond),
                    function.blocks[then_bb.0].name,
                    function.blocks[else_bb.0].name
                );
            }
            InstrKind::Ret(value) => match value {
                Some(value) => {
                    let _ = write!(out, "ret {}", self.typed_val(func, value));
                }
                None => {
                    let _ = write!(out, "ret void");
                }
            },
        }

        out
    }

    /// Renders a value operand without its type.
    fn val(&self, func: FuncId, value: &Value) -> String {
        match value {
            Value::F64(v) => format!("0x{:016X}", v.to_bits()),
            Value::Bool(b) => b.to_string(),
            Value::I8(v) => v.to_string(),
            Value::I32(v) => v.to_string(),
            Value::I64(v) => v.to_string(),
            Value::NullPtr => "null".to_owned(),
            Value::Instr(id) => format!("%{}", self.function(func).instrs[*id].name),
            Value::Arg(i) => format!("%{}", self.function(func).param_names[*i]),
            Value::Global(id) => format!("@{}", self.global(*id).name),
            Value::Func(id) => format!("@{}", self.function(*id).name),
        }
    }

    /// Renders a value operand preceded by its type.
    fn typed_val(&self, func: FuncId, value: &Value) -> String {
        format!("{} {}", self.value_ty(func, value), self.val(func, value))
    }
}

fn render_declaration(function: &Function) -> String {
    format!("declare {} @{}{}", function.ty.ret, function.name, {
        let params = function
            .ty
            .params
            .iter()
            .map(Ty::to_string)
            .collect::<Vec<_>>();
        render_param_list(params, function.ty.variadic)
    })
}

fn render_fn_ty(ty: &FnTy) -> String {
    let params = ty.params.iter().map(Ty::to_string).collect::<Vec<_>>();
    format!("{} {}", ty.ret, render_param_list(params, ty.variadic))
}

fn render_param_list(mut params: Vec<String>, variadic: bool) -> String {
    if variadic {
        params.push("...".to_owned());
    }
    format!("({})", params.join(", "))
}

fn render_global(global: &Global) -> String {
    let kind = if global.is_const { "constant" } else { "global" };

    match (&global.init, global.linkage) {
        (None, _) => format!("@{} = external {kind} {}", global.name, global.ty),
        (Some(init), linkage) => {
            let linkage = match linkage {
                Linkage::External => "",
                Linkage::Internal => "internal ",
                Linkage::Private => "private unnamed_addr ",
            };
            format!(
                "@{} = {linkage}{kind} {} {}",
                global.name,
                global.ty,
                render_init(init)
            )
        }
    }
}

fn render_init(init: &GlobalInit) -> String {
    match init {
        GlobalInit::Bytes(bytes) => {
            let mut out = String::with_capacity(bytes.len() + 4);
            out.push_str("c\"");
            for b in bytes {
                match b {
                    0x20..=0x7e if *b != b'"' && *b != b'\\' => out.push(*b as char),
                    _ => {
                        let _ = write!(out, "\\{b:02X}");
                    }
                }
            }
            out.push('"');
            out
        }
        GlobalInit::I64(v) => v.to_string(),
        GlobalInit::Bool(b) => b.to_string(),
        GlobalInit::NullPtr => "null".to_owned(),
    }
}

fn binop_mnemonic(op: BinOp) -> &'static str {
    match op {
        BinOp::Add => "add",
        BinOp::Sub => "sub",
        BinOp::Mul => "mul",
        BinOp::SRem => "srem",
        BinOp::And => "and",
        BinOp::Or => "or",
        BinOp::Xor => "xor",
        BinOp::LShr => "lshr",
        BinOp::FAdd => "fadd",
        BinOp::FSub => "fsub",
        BinOp::FMul => "fmul",
        BinOp::FDiv => "fdiv",
        BinOp::FRem => "frem",
    }
}

fn int_pred_mnemonic(pred: IntPred) -> &'static str {
    match pred {
        IntPred::Eq => "eq",
        IntPred::Ne => "ne",
        IntPred::Slt => "slt",
        IntPred::Sle => "sle",
        IntPred::Sgt => "sgt",
        IntPred::Sge => "sge",
        IntPred::Ult => "ult",
    }
}

fn float_pred_mnemonic(pred: FloatPred) -> &'static str {
    match pred {
        FloatPred::Oeq => "oeq",
        FloatPred::One => "one",
        FloatPred::Olt => "olt",
        FloatPred::Ole => "ole",
        FloatPred::Ogt => "ogt",
        FloatPred::Oge => "oge",
    }
}

#[cfg(test)]
mod tests {
    use super::super::{Builder, FnTy, Linkage, Ty, Value};
    use super::*;

    #[test]
    fn prints_declarations_and_globals() {
        let mut builder = Builder::new("unit");
        let module = builder.module_mut();

        module.add_function(
            "printf",
            FnTy::new(vec![Ty::Ptr], Ty::I32, true),
            Linkage::External,
        );
        module.add_global("stdin", Ty::Ptr, Linkage::External, None, false);
        module.add_global(
            "_random_state",
            Ty::I64,
            Linkage::Internal,
            Some(GlobalInit::I64(0)),
            false,
        );
        module.add_global_string(b"%f\n");

        let text = builder.finish().to_string();

        assert!(text.contains("; ModuleID = 'unit'"));
        assert!(text.contains("declare i32 @printf(ptr, ...)"));
        assert!(text.contains("@stdin = external global ptr"));
        assert!(text.contains("@_random_state = internal global i64 0"));
        assert!(
            text.contains("@.str = private unnamed_addr constant [4 x i8] c\"%f\\0A\\00\""),
            "got: {text}"
        );
    }

    #[test]
    fn prints_a_small_function_body() {
        let mut builder = Builder::new("unit");
        let main = builder.module_mut().add_function(
            "main",
            FnTy::new(vec![], Ty::I32, false),
            Linkage::External,
        );
        let entry = builder.append_block(main, "entry");
        builder.position_at_end(main, entry);

        let sum = builder.build_binop(
            super::super::BinOp::FAdd,
            Value::F64(1.0),
            Value::F64(2.0),
            "add",
        );
        let as_int = builder.build_cast(CastOp::FPToSI, sum, Ty::I32, "cast");
        builder.build_ret(Some(as_int));

        let text = builder.finish().to_string();

        assert!(text.contains("define i32 @main() {"));
        assert!(text.contains("entry:"));
        assert!(
            text.contains("%add = fadd double 0x3FF0000000000000, 0x4000000000000000"),
            "got: {text}"
        );
        assert!(text.contains("%cast = fptosi double %add to i32"));
        assert!(text.contains("ret i32 %cast"));
    }

    #[test]
    fn variadic_call_sites_spell_the_function_type() {
        let mut builder = Builder::new("unit");
        let printf = builder.module_mut().add_function(
            "printf",
            FnTy::new(vec![Ty::Ptr], Ty::I32, true),
            Linkage::External,
        );
        let fmt = builder.module_mut().add_global_string(b"%f\n");
        let main = builder.module_mut().add_function(
            "main",
            FnTy::new(vec![], Ty::I32, false),
            Linkage::External,
        );
        let entry = builder.append_block(main, "entry");
        builder.position_at_end(main, entry);

        builder.build_call(printf, vec![Value::Global(fmt), Value::F64(7.0)], "");
        builder.build_ret(Some(Value::I32(0)));

        let text = builder.finish().to_string();

        assert!(
            text.contains("call i32 (ptr, ...) @printf(ptr @.str, double 0x401C000000000000)"),
            "got: {text}"
        );
    }

    #[test]
    fn phi_edges_name_their_predecessors() {
        let mut builder = Builder::new("unit");
        let func = builder.module_mut().add_function(
            "f",
            FnTy::new(vec![Ty::I1], Ty::F64, false),
            Linkage::Internal,
        );
        let entry = builder.append_block(func, "entry");
        let a = builder.append_block(func, "a");
        let b = builder.append_block(func, "b");
        let join = builder.append_block(func, "join");

        builder.position_at_end(func, entry);
        builder.build_cond_br(Value::Arg(0), a, b);
        builder.position_at_end(func, a);
        builder.build_br(join);
        builder.position_at_end(func, b);
        builder.build_br(join);
        builder.position_at_end(func, join);
        let phi = builder.build_phi(
            Ty::F64,
            vec![(Value::F64(1.0), a), (Value::F64(2.0), b)],
            "merge",
        );
        builder.build_ret(Some(phi));

        let text = builder.finish().to_string();

        assert!(
            text.contains(
                "%merge = phi double [ 0x3FF0000000000000, %a ], [ 0x4000000000000000, %b ]"
            ),
            "got: {text}"
        );
    }
}
