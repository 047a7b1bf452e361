//! Built-in call lowering.
//!
//! Each _Twine_ built-in is lowered inline at the call site; anything not in
//! the built-in set is dispatched through the function table as a direct
//! call with every argument coerced to `double`.

use super::{Compiler, EmitError, StdinAccess};
use crate::compiler::ast::Expr;
use crate::compiler::ir::{BinOp, CastOp, FloatPred, IntPred, Ty, Value};

impl Compiler {
    /// Lowers a call expression, built-in or user-defined.
    pub(super) fn emit_call(&mut self, name: &str, args: &[Expr]) -> Result<Value, EmitError> {
        match name {
            "print" => self.lower_print(args),
            "input" => self.lower_input(args),
            "str" => self.lower_str(args),
            "num" => self.lower_num(args),
            "int" => self.lower_int(args),
            "abs" => self.lower_abs(args),
            "round" => self.lower_round(args),
            "min" => self.lower_min_max(name, args, FloatPred::Olt),
            "max" => self.lower_min_max(name, args, FloatPred::Ogt),
            "pow" => self.lower_pow(args),
            "sqrt" => self.lower_sqrt(args),
            "random" => self.lower_random(args),
            "len" => self.lower_len(args),
            "upper" => self.lower_case_map(name, args, true),
            "lower" => self.lower_case_map(name, args, false),
            "includes" => self.lower_includes(args),
            "replace" => self.lower_replace(args),
            "append" => self.lower_append(args),
            _ => self.lower_user_call(name, args),
        }
    }

    /// `print(...)`: newline alone for zero arguments; otherwise one line
    /// per argument, dispatched on the argument's runtime shape.
    fn lower_print(&mut self, args: &[Expr]) -> Result<Value, EmitError> {
        let printf = self.functions["printf"];

        if args.is_empty() {
            let newline = self.cstr("\n");
            self.builder.build_call(printf, vec![newline], "");
            return Ok(Value::I32(0));
        }

        for arg in args {
            let value = self.emit_expr(arg)?;

            match self.builder.value_ty(&value) {
                Ty::Ptr => {
                    // A pointer is either a C string or a boxed double. The
                    // sniff must exclude NUL: a boxed whole number stores a
                    // zero low mantissa byte first, and accepting NUL would
                    // print every such value as an empty string.
                    let is_str = self.is_string_pointer(value, false);

                    let func = self.func();
                    let str_bb = self.builder.append_block(func, "print.str");
                    let num_bb = self.builder.append_block(func, "print.num");
                    let join_bb = self.builder.append_block(func, "print.join");

                    self.builder.build_cond_br(is_str, str_bb, num_bb);

                    self.builder.position_at_end(func, str_bb);
                    let fmt = self.cstr("%s\n");
                    self.builder.build_call(printf, vec![fmt, value], "");
                    self.builder.build_br(join_bb);

                    self.builder.position_at_end(func, num_bb);
                    let boxed = self.builder.build_load(Ty::F64, value, "boxed");
                    let fmt = self.cstr("%f\n");
                    self.builder.build_call(printf, vec![fmt, boxed], "");
                    self.builder.build_br(join_bb);

                    self.builder.position_at_end(func, join_bb);
                }
                Ty::F64 => {
                    let fmt = self.cstr("%f\n");
                    self.builder.build_call(printf, vec![fmt, value], "");
                }
                Ty::I1 => {
                    // Promote to i32 for the varargs call.
                    let wide = self.builder.build_cast(CastOp::ZExt, value, Ty::I32, "wide");
                    let fmt = self.cstr("%d\n");
                    self.builder.build_call(printf, vec![fmt, wide], "");
                }
                ty if ty.is_integer() => {
                    let fmt = self.cstr("%d\n");
                    self.builder.build_call(printf, vec![fmt, value], "");
                }
                _ => {}
            }
        }

        Ok(Value::I32(0))
    }

    /// `input()`: read a line from `stdin` into a 1024-byte stack buffer and
    /// strip the trailing newline if present.
    fn lower_input(&mut self, args: &[Expr]) -> Result<Value, EmitError> {
        self.expect_exact("input", args, 0)?;

        let func = self.func();
        let buffer =
            self.builder
                .build_entry_alloca(func, Ty::Array(1024, Box::new(Ty::I8)), "input_buffer");

        let stdin_ptr = match self.stdin_access {
            StdinAccess::Global(id) => {
                self.builder
                    .build_load(Ty::Ptr, Value::Global(id), "stdin_load")
            }
            StdinAccess::Helper(id) => self.builder.build_call(id, vec![], "stdin_ptr"),
        };

        let fgets = self.functions["fgets"];
        self.builder
            .build_call(fgets, vec![buffer, Value::I32(1024), stdin_ptr], "");

        let strlen = self.functions["strlen"];
        let len = self.builder.build_call(strlen, vec![buffer], "len");
        let last_idx = self
            .builder
            .build_binop(BinOp::Sub, len, Value::I64(1), "lastidx");
        let last_ptr = self.builder.build_gep(Ty::I8, buffer, last_idx, "lastchar");
        let last = self.builder.build_load(Ty::I8, last_ptr, "ch");
        let is_nl = self
            .builder
            .build_icmp(IntPred::Eq, last, Value::I8(10), "isnl");

        let trim_bb = self.builder.append_block(func, "trim");
        let done_bb = self.builder.append_block(func, "input.done");
        self.builder.build_cond_br(is_nl, trim_bb, done_bb);

        self.builder.position_at_end(func, trim_bb);
        self.builder.build_store(Value::I8(0), last_ptr);
        self.builder.build_br(done_bb);

        self.builder.position_at_end(func, done_bb);
        Ok(buffer)
    }

    /// `str(x)`: format through a 32-byte stack buffer with `%g`.
    fn lower_str(&mut self, args: &[Expr]) -> Result<Value, EmitError> {
        self.expect_exact("str", args, 1)?;

        let value = self.emit_expr(&args[0])?;
        let value = self.to_f64(value);
        Ok(self.to_string_ptr(value))
    }

    /// `num(s)`: `atof`.
    fn lower_num(&mut self, args: &[Expr]) -> Result<Value, EmitError> {
        self.expect_exact("num", args, 1)?;

        let value = self.emit_expr(&args[0])?;
        self.expect_ptr("num", 1, "a string", &value)?;

        let atof = self.functions["atof"];
        Ok(self.builder.build_call(atof, vec![value], "numval"))
    }

    /// `int(s)`: `atoi`, then widen back to the canonical `double`.
    fn lower_int(&mut self, args: &[Expr]) -> Result<Value, EmitError> {
        self.expect_exact("int", args, 1)?;

        let value = self.emit_expr(&args[0])?;
        self.expect_ptr("int", 1, "a string", &value)?;

        let atoi = self.functions["atoi"];
        let parsed = self.builder.build_call(atoi, vec![value], "parsed");
        Ok(self
            .builder
            .build_cast(CastOp::SIToFP, parsed, Ty::F64, "intval"))
    }

    fn lower_abs(&mut self, args: &[Expr]) -> Result<Value, EmitError> {
        self.expect_exact("abs", args, 1)?;

        let value = self.emit_expr(&args[0])?;
        let value = self.to_f64(value);
        let fabs = self.functions["fabs"];
        Ok(self.builder.build_call(fabs, vec![value], "absval"))
    }

    /// `round(x)` rounds to an integer; `round(x, d)` scales by `10^d`,
    /// rounds, and scales back.
    fn lower_round(&mut self, args: &[Expr]) -> Result<Value, EmitError> {
        if args.is_empty() || args.len() > 2 {
            return Err(EmitError::ArityMismatch {
                name: "round".to_owned(),
                expected: "1 or 2".to_owned(),
                got: args.len(),
            });
        }

        let value = self.emit_expr(&args[0])?;
        let value = self.to_f64(value);
        let math_round = self.functions["mathRound"];

        if args.len() == 1 {
            return Ok(self.builder.build_call(math_round, vec![value], "rounded"));
        }

        let digits = self.emit_expr(&args[1])?;
        let digits = self.to_f64(digits);

        let math_pow = self.functions["mathPow"];
        let scale = self
            .builder
            .build_call(math_pow, vec![Value::F64(10.0), digits], "scale");
        let scaled = self.builder.build_binop(BinOp::FMul, value, scale, "scaled");
        let rounded = self.builder.build_call(math_round, vec![scaled], "rounded");
        Ok(self
            .builder
            .build_binop(BinOp::FDiv, rounded, scale, "descaled"))
    }

    /// `min(...)`/`max(...)`: pairwise compare-and-select fold.
    fn lower_min_max(
        &mut self,
        name: &str,
        args: &[Expr],
        keep_when: FloatPred,
    ) -> Result<Value, EmitError> {
        if args.len() < 2 {
            return Err(EmitError::ArityMismatch {
                name: name.to_owned(),
                expected: "at least 2".to_owned(),
                got: args.len(),
            });
        }

        let first = self.emit_expr(&args[0])?;
        let mut best = self.to_f64(first);

        for arg in &args[1..] {
            let candidate = self.emit_expr(arg)?;
            let candidate = self.to_f64(candidate);
            let better = self
                .builder
                .build_fcmp(keep_when, candidate, best, "better");
            best = self.builder.build_select(better, candidate, best, name);
        }

        Ok(best)
    }

    fn lower_pow(&mut self, args: &[Expr]) -> Result<Value, EmitError> {
        self.expect_exact("pow", args, 2)?;

        let base = self.emit_expr(&args[0])?;
        let base = self.to_f64(base);
        let exponent = self.emit_expr(&args[1])?;
        let exponent = self.to_f64(exponent);

        let math_pow = self.functions["mathPow"];
        Ok(self
            .builder
            .build_call(math_pow, vec![base, exponent], "powval"))
    }

    fn lower_sqrt(&mut self, args: &[Expr]) -> Result<Value, EmitError> {
        self.expect_exact("sqrt", args, 1)?;

        let value = self.emit_expr(&args[0])?;
        let value = self.to_f64(value);
        let math_sqrt = self.functions["mathSqrt"];
        Ok(self.builder.build_call(math_sqrt, vec![value], "sqrtval"))
    }

    /// `random()`: linear congruential generator with multiplier 1664525 and
    /// increment 1013904223, seeded once from `time(NULL)` mixed with a
    /// stack address. Returns the upper 32 state bits scaled into `[0, 1)`.
    fn lower_random(&mut self, args: &[Expr]) -> Result<Value, EmitError> {
        self.expect_exact("random", args, 0)?;

        let (state_g, seeded_g) = self.random_globals();
        let func = self.func();

        let seeded = self
            .builder
            .build_load(Ty::I1, Value::Global(seeded_g), "seeded");

        let seed_bb = self.builder.append_block(func, "rand.seed");
        let next_bb = self.builder.append_block(func, "rand.next");
        self.builder.build_cond_br(seeded, next_bb, seed_bb);

        self.builder.position_at_end(func, seed_bb);
        let time = self.functions["time"];
        let now = self.builder.build_call(time, vec![Value::NullPtr], "now");
        // Stack ASLR gives the address a little entropy beyond the clock.
        let slot = self.builder.build_entry_alloca(func, Ty::I32, "seed_slot");
        let addr = self
            .builder
            .build_cast(CastOp::PtrToInt, slot, Ty::I64, "stackaddr");
        let mixed = self
            .builder
            .build_binop(BinOp::Mul, now, Value::I64(1_664_525), "mix");
        let seed = self.builder.build_binop(BinOp::Add, mixed, addr, "seed");
        self.builder.build_store(seed, Value::Global(state_g));
        self.builder
            .build_store(Value::Bool(true), Value::Global(seeded_g));
        self.builder.build_br(next_bb);

        self.builder.position_at_end(func, next_bb);
        let state = self
            .builder
            .build_load(Ty::I64, Value::Global(state_g), "state");
        let multiplied =
            self.builder
                .build_binop(BinOp::Mul, state, Value::I64(1_664_525), "lcgmul");
        let advanced =
            self.builder
                .build_binop(BinOp::Add, multiplied, Value::I64(1_013_904_223), "lcg");
        self.builder.build_store(advanced, Value::Global(state_g));

        let high = self
            .builder
            .build_binop(BinOp::LShr, advanced, Value::I64(32), "hi");
        let high_f = self
            .builder
            .build_cast(CastOp::UIToFP, high, Ty::F64, "randf");
        Ok(self.builder.build_binop(
            BinOp::FDiv,
            high_f,
            Value::F64(4_294_967_296.0),
            "rand",
        ))
    }

    /// `len(v)`: `strlen` for strings, the count slot for arrays.
    fn lower_len(&mut self, args: &[Expr]) -> Result<Value, EmitError> {
        self.expect_exact("len", args, 1)?;

        let value = self.emit_expr(&args[0])?;
        self.expect_ptr("len", 1, "a string or array", &value)?;

        let is_str = self.is_string_pointer(value, false);

        let func = self.func();
        let str_bb = self.builder.append_block(func, "len.str");
        let arr_bb = self.builder.append_block(func, "len.arr");
        let join_bb = self.builder.append_block(func, "len.join");

        self.builder.build_cond_br(is_str, str_bb, arr_bb);

        self.builder.position_at_end(func, str_bb);
        let strlen = self.functions["strlen"];
        let chars = self.builder.build_call(strlen, vec![value], "chars");
        let chars_f = self
            .builder
            .build_cast(CastOp::UIToFP, chars, Ty::F64, "charsf");
        self.builder.build_br(join_bb);

        self.builder.position_at_end(func, arr_bb);
        // The element count lives one slot before the handed-out pointer.
        let count_ptr = self
            .builder
            .build_gep(Ty::F64, value, Value::I64(-1), "count");
        let count = self.builder.build_load(Ty::F64, count_ptr, "countval");
        self.builder.build_br(join_bb);

        self.builder.position_at_end(func, join_bb);
        Ok(self
            .builder
            .build_phi(Ty::F64, vec![(chars_f, str_bb), (count, arr_bb)], "length"))
    }

    /// `upper(s)`/`lower(s)`: byte-wise copy into a fresh allocation,
    /// shifting letters by 32 where they fall in the source case range.
    fn lower_case_map(
        &mut self,
        name: &str,
        args: &[Expr],
        to_upper: bool,
    ) -> Result<Value, EmitError> {
        self.expect_exact(name, args, 1)?;

        let source = self.emit_expr(&args[0])?;
        self.expect_ptr(name, 1, "a string", &source)?;

        let strlen = self.functions["strlen"];
        let len = self.builder.build_call(strlen, vec![source], "srclen");
        let size = self
            .builder
            .build_binop(BinOp::Add, len, Value::I64(1), "size");

        let malloc = self.functions["malloc"];
        let out = self.builder.build_call(malloc, vec![size], name);

        let func = self.func();
        let index_slot = self.builder.build_entry_alloca(func, Ty::I64, "i");
        self.builder.build_store(Value::I64(0), index_slot);

        let cond_bb = self.builder.append_block(func, "case.cond");
        let body_bb = self.builder.append_block(func, "case.body");
        let done_bb = self.builder.append_block(func, "case.done");

        self.builder.build_br(cond_bb);

        // Iterate i < len + 1 so the NUL terminator is copied too.
        self.builder.position_at_end(func, cond_bb);
        let i = self.builder.build_load(Ty::I64, index_slot, "i");
        let in_bounds = self.builder.build_icmp(IntPred::Ult, i, size, "incopy");
        self.builder.build_cond_br(in_bounds, body_bb, done_bb);

        self.builder.position_at_end(func, body_bb);
        let src = self.builder.build_gep(Ty::I8, source, i, "srcp");
        let byte = self.builder.build_load(Ty::I8, src, "ch");

        let (low, high, shift_op) = if to_upper {
            (b'a', b'z', BinOp::Sub)
        } else {
            (b'A', b'Z', BinOp::Add)
        };
        let ge = self
            .builder
            .build_icmp(IntPred::Sge, byte, Value::I8(low as i8), "ge");
        let le = self
            .builder
            .build_icmp(IntPred::Sle, byte, Value::I8(high as i8), "le");
        let in_range = self.builder.build_binop(BinOp::And, ge, le, "isletter");
        let shifted = self
            .builder
            .build_binop(shift_op, byte, Value::I8(32), "shifted");
        let mapped = self.builder.build_select(in_range, shifted, byte, "mapped");

        let dst = self.builder.build_gep(Ty::I8, out, i, "dstp");
        self.builder.build_store(mapped, dst);

        let next = self.builder.build_binop(BinOp::Add, i, Value::I64(1), "next");
        self.builder.build_store(next, index_slot);
        self.builder.build_br(cond_bb);

        self.builder.position_at_end(func, done_bb);
        Ok(out)
    }

    /// `includes(haystack, needle)`: `strstr` for string needles, a linear
    /// `fcmp oeq` scan for array membership. Returns 1.0 or 0.0.
    fn lower_includes(&mut self, args: &[Expr]) -> Result<Value, EmitError> {
        self.expect_exact("includes", args, 2)?;

        let haystack = self.emit_expr(&args[0])?;
        self.expect_ptr("includes", 1, "a string or array", &haystack)?;

        let needle = self.emit_expr(&args[1])?;

        if self.builder.value_ty(&needle).is_ptr() {
            let strstr = self.functions["strstr"];
            let found = self
                .builder
                .build_call(strstr, vec![haystack, needle], "found");
            let has = self
                .builder
                .build_icmp(IntPred::Ne, found, Value::NullPtr, "has");
            return Ok(self.builder.build_cast(CastOp::UIToFP, has, Ty::F64, "hasf"));
        }

        let needle = self.to_f64(needle);

        let count_ptr = self
            .builder
            .build_gep(Ty::F64, haystack, Value::I64(-1), "count");
        let count_f = self.builder.build_load(Ty::F64, count_ptr, "countval");
        let count = self
            .builder
            .build_cast(CastOp::FPToUI, count_f, Ty::I64, "count64");

        let func = self.func();
        let found_slot = self.builder.build_entry_alloca(func, Ty::I1, "found");
        self.builder.build_store(Value::Bool(false), found_slot);
        let index_slot = self.builder.build_entry_alloca(func, Ty::I64, "scan");
        self.builder.build_store(Value::I64(0), index_slot);

        let cond_bb = self.builder.append_block(func, "inc.cond");
        let body_bb = self.builder.append_block(func, "inc.body");
        let hit_bb = self.builder.append_block(func, "inc.hit");
        let step_bb = self.builder.append_block(func, "inc.step");
        let done_bb = self.builder.append_block(func, "inc.done");

        self.builder.build_br(cond_bb);

        self.builder.position_at_end(func, cond_bb);
        let i = self.builder.build_load(Ty::I64, index_slot, "i");
        let in_bounds = self.builder.build_icmp(IntPred::Ult, i, count, "inscan");
        self.builder.build_cond_br(in_bounds, body_bb, done_bb);

        self.builder.position_at_end(func, body_bb);
        let slot = self.builder.build_gep(Ty::F64, haystack, i, "slot");
        let element = self.builder.build_load(Ty::F64, slot, "element");
        let matches = self
            .builder
            .build_fcmp(FloatPred::Oeq, element, needle, "match");
        self.builder.build_cond_br(matches, hit_bb, step_bb);

        self.builder.position_at_end(func, hit_bb);
        self.builder.build_store(Value::Bool(true), found_slot);
        self.builder.build_br(done_bb);

        self.builder.position_at_end(func, step_bb);
        let next = self.builder.build_binop(BinOp::Add, i, Value::I64(1), "next");
        self.builder.build_store(next, index_slot);
        self.builder.build_br(cond_bb);

        self.builder.position_at_end(func, done_bb);
        let found = self.builder.build_load(Ty::I1, found_slot, "foundval");
        Ok(self
            .builder
            .build_cast(CastOp::UIToFP, found, Ty::F64, "foundf"))
    }

    /// `replace(haystack, old, new)`: first occurrence only. A miss copies
    /// the haystack; a hit splices prefix, replacement and tail into a fresh
    /// allocation.
    fn lower_replace(&mut self, args: &[Expr]) -> Result<Value, EmitError> {
        self.expect_exact("replace", args, 3)?;

        let haystack = self.emit_expr(&args[0])?;
        self.expect_ptr("replace", 1, "a string", &haystack)?;
        let old = self.emit_expr(&args[1])?;
        self.expect_ptr("replace", 2, "a string", &old)?;
        let new = self.emit_expr(&args[2])?;
        self.expect_ptr("replace", 3, "a string", &new)?;

        let strstr = self.functions["strstr"];
        let strlen = self.functions["strlen"];
        let malloc = self.functions["malloc"];

        let pos = self.builder.build_call(strstr, vec![haystack, old], "pos");
        let missing = self
            .builder
            .build_icmp(IntPred::Eq, pos, Value::NullPtr, "missing");

        let func = self.func();
        let copy_bb = self.builder.append_block(func, "rep.copy");
        let subst_bb = self.builder.append_block(func, "rep.subst");
        let join_bb = self.builder.append_block(func, "rep.join");

        self.builder.build_cond_br(missing, copy_bb, subst_bb);

        self.builder.position_at_end(func, copy_bb);
        let src_len = self.builder.build_call(strlen, vec![haystack], "srclen");
        let dup_size = self
            .builder
            .build_binop(BinOp::Add, src_len, Value::I64(1), "dupsize");
        let dup = self.builder.build_call(malloc, vec![dup_size], "dup");
        let strcpy = self.functions["strcpy"];
        self.builder.build_call(strcpy, vec![dup, haystack], "");
        self.builder.build_br(join_bb);

        self.builder.position_at_end(func, subst_bb);
        // Prefix length by pointer arithmetic.
        let base = self
            .builder
            .build_cast(CastOp::PtrToInt, haystack, Ty::I64, "base");
        let at = self.builder.build_cast(CastOp::PtrToInt, pos, Ty::I64, "at");
        let prefix = self.builder.build_binop(BinOp::Sub, at, base, "prefixlen");

        let old_len = self.builder.build_call(strlen, vec![old], "oldlen");
        let new_len = self.builder.build_call(strlen, vec![new], "newlen");
        let tail = self.builder.build_gep(Ty::I8, pos, old_len, "tail");
        let tail_len = self.builder.build_call(strlen, vec![tail], "taillen");

        let with_new = self
            .builder
            .build_binop(BinOp::Add, prefix, new_len, "withnew");
        let with_tail = self
            .builder
            .build_binop(BinOp::Add, with_new, tail_len, "withtail");
        let total = self
            .builder
            .build_binop(BinOp::Add, with_tail, Value::I64(1), "total");

        let out = self.builder.build_call(malloc, vec![total], "replaced");
        let strncpy = self.functions["strncpy"];
        self.builder
            .build_call(strncpy, vec![out, haystack, prefix], "");
        let prefix_end = self.builder.build_gep(Ty::I8, out, prefix, "prefixend");
        self.builder.build_store(Value::I8(0), prefix_end);
        let strcat = self.functions["strcat"];
        self.builder.build_call(strcat, vec![out, new], "");
        self.builder.build_call(strcat, vec![out, tail], "");
        self.builder.build_br(join_bb);

        self.builder.position_at_end(func, join_bb);
        Ok(self
            .builder
            .build_phi(Ty::Ptr, vec![(dup, copy_bb), (out, subst_bb)], "result"))
    }

    /// `append(arr, v)`: copy into a block one slot larger; the previous
    /// allocation is leaked.
    fn lower_append(&mut self, args: &[Expr]) -> Result<Value, EmitError> {
        self.expect_exact("append", args, 2)?;

        let array = self.emit_expr(&args[0])?;
        self.expect_ptr("append", 1, "an array", &array)?;

        let value = self.emit_expr(&args[1])?;
        let value = self.to_f64(value);

        let count_ptr = self
            .builder
            .build_gep(Ty::F64, array, Value::I64(-1), "count");
        let count_f = self.builder.build_load(Ty::F64, count_ptr, "countval");
        let count = self
            .builder
            .build_cast(CastOp::FPToUI, count_f, Ty::I64, "len");

        // Count slot plus the old elements plus the appended one.
        let slots = self
            .builder
            .build_binop(BinOp::Add, count, Value::I64(2), "slots");
        let bytes = self
            .builder
            .build_binop(BinOp::Mul, slots, Value::I64(8), "bytes");
        let malloc = self.functions["malloc"];
        let raw = self.builder.build_call(malloc, vec![bytes], "grown");

        let new_count = self
            .builder
            .build_binop(BinOp::FAdd, count_f, Value::F64(1.0), "newcount");
        self.builder.build_store(new_count, raw);
        let data = self
            .builder
            .build_gep(Ty::F64, raw, Value::I64(1), "growndata");

        let func = self.func();
        let index_slot = self.builder.build_entry_alloca(func, Ty::I64, "copy");
        self.builder.build_store(Value::I64(0), index_slot);

        let cond_bb = self.builder.append_block(func, "app.cond");
        let body_bb = self.builder.append_block(func, "app.body");
        let done_bb = self.builder.append_block(func, "app.done");

        self.builder.build_br(cond_bb);

        self.builder.position_at_end(func, cond_bb);
        let i = self.builder.build_load(Ty::I64, index_slot, "i");
        let in_bounds = self.builder.build_icmp(IntPred::Ult, i, count, "incopy");
        self.builder.build_cond_br(in_bounds, body_bb, done_bb);

        self.builder.position_at_end(func, body_bb);
        let src = self.builder.build_gep(Ty::F64, array, i, "srcslot");
        let element = self.builder.build_load(Ty::F64, src, "oldelem");
        let dst = self.builder.build_gep(Ty::F64, data, i, "dstslot");
        self.builder.build_store(element, dst);
        let next = self.builder.build_binop(BinOp::Add, i, Value::I64(1), "next");
        self.builder.build_store(next, index_slot);
        self.builder.build_br(cond_bb);

        self.builder.position_at_end(func, done_bb);
        let last = self.builder.build_gep(Ty::F64, data, count, "newslot");
        self.builder.build_store(value, last);

        Ok(data)
    }

    /// Anything else dispatches through the function table with the
    /// `double`-slot calling convention.
    fn lower_user_call(&mut self, name: &str, args: &[Expr]) -> Result<Value, EmitError> {
        let Some(&func) = self.functions.get(name) else {
            return Err(EmitError::UndefinedFunction(name.to_owned()));
        };

        let (param_count, variadic) = {
            let ty = &self.builder.module().function(func).ty;
            (ty.params.len(), ty.variadic)
        };

        if (!variadic && args.len() != param_count) || (variadic && args.len() < param_count) {
            return Err(EmitError::ArityMismatch {
                name: name.to_owned(),
                expected: if variadic {
                    format!("at least {param_count}")
                } else {
                    format!("exactly {param_count}")
                },
                got: args.len(),
            });
        }

        let mut lowered = Vec::with_capacity(args.len());
        for arg in args {
            let value = self.emit_expr(arg)?;
            lowered.push(self.arg_to_f64(value));
        }

        Ok(self.builder.build_call(func, lowered, "call"))
    }

    fn expect_exact(&self, name: &str, args: &[Expr], count: usize) -> Result<(), EmitError> {
        if args.len() == count {
            Ok(())
        } else {
            Err(EmitError::ArityMismatch {
                name: name.to_owned(),
                expected: format!("exactly {count}"),
                got: args.len(),
            })
        }
    }

    fn expect_ptr(
        &self,
        name: &str,
        position: usize,
        expected: &'static str,
        value: &Value,
    ) -> Result<(), EmitError> {
        if self.builder.value_ty(value).is_ptr() {
            Ok(())
        } else {
            Err(EmitError::ArgumentTypeError {
                name: name.to_owned(),
                position,
                expected,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::{Compiler, EmitError};
    use crate::compiler::lexer::Lexer;
    use crate::compiler::parser::Parser;

    fn compile(source: &str) -> Result<String, EmitError> {
        let tokens = Lexer::new(source).tokenize();
        let program = Parser::new(tokens).parse().expect("test sources parse");

        let mut compiler = Compiler::new("test");
        compiler.compile(&program)?;
        Ok(compiler.dump_ir())
    }

    fn compile_ok(source: &str) -> String {
        compile(source).expect("source should compile")
    }

    #[test]
    fn print_without_arguments_prints_a_newline() {
        let ir = compile_ok("print();");
        assert!(ir.contains("c\"\\0A\\00\""));
        assert!(ir.contains("call i32 (ptr, ...) @printf(ptr @.str)"));
    }

    #[test]
    fn print_of_a_pointer_sniffs_before_formatting() {
        let ir = compile_ok(r#"let s = "hi"; print(s);"#);

        assert!(ir.contains("print.str:"));
        assert!(ir.contains("print.num:"));
        // Both the %s and %f format strings are interned.
        assert!(ir.contains("c\"%s\\0A\\00\""));
        assert!(ir.contains("c\"%f\\0A\\00\""));
    }

    #[test]
    fn input_reads_through_fgets_and_trims() {
        let ir = compile_ok("let line = input();");

        assert!(ir.contains("%input_buffer = alloca [1024 x i8]"));
        assert!(ir.contains("load ptr, ptr @stdin"));
        assert!(ir.contains("call ptr @fgets(ptr %input_buffer, i32 1024, ptr %stdin_load)"));
        assert!(ir.contains("trim:"));
        assert!(ir.contains("store i8 0, ptr %lastchar"));
    }

    #[test]
    fn conversions_lower_to_libc_calls() {
        let ir = compile_ok(r#"let a = num("1.5"); let b = int("7"); let c = str(3);"#);

        assert!(ir.contains("call double @atof"));
        assert!(ir.contains("call i32 @atoi"));
        assert!(ir.contains("sitofp i32 %parsed to double"));
        assert!(ir.contains("call i32 (ptr, i64, ptr, ...) @snprintf"));
        assert!(ir.contains("c\"%g\\00\""));
    }

    #[test]
    fn math_builtins_use_table_aliases() {
        let ir = compile_ok("let x = abs(-1) + round(2.6) + pow(2, 10) + sqrt(9);");

        assert!(ir.contains("call double @fabs"));
        assert!(ir.contains("call double @round"));
        assert!(ir.contains("call double @pow"));
        assert!(ir.contains("call double @sqrt"));
    }

    #[test]
    fn round_with_digits_scales_through_pow() {
        let ir = compile_ok("let x = round(3.14159, 2);");

        assert!(ir.contains("call double @pow(double 0x4024000000000000, double"));
        assert!(ir.contains("fmul double"));
        assert!(ir.contains("fdiv double %rounded, %scale"));
    }

    #[test]
    fn min_max_fold_with_selects() {
        let ir = compile_ok("let a = min(3, 1, 2); let b = max(a, 9);");

        assert!(ir.contains("fcmp olt double"));
        assert!(ir.contains("fcmp ogt double"));
        assert!(ir.contains("select i1 %better"));
    }

    #[test]
    fn random_is_a_seeded_lcg() {
        let ir = compile_ok("let r = random();");

        assert!(ir.contains("@_random_state = internal global i64 0"));
        assert!(ir.contains("@_random_seeded = internal global i1 false"));
        assert!(ir.contains("rand.seed:"));
        assert!(ir.contains("call i64 @time(ptr null)"));
        assert!(ir.contains("ptrtoint ptr %seed_slot to i64"));
        assert!(ir.contains("mul i64 %state, 1664525"));
        assert!(ir.contains("add i64 %lcgmul, 1013904223"));
        assert!(ir.contains("lshr i64 %lcg, 32"));
        assert!(ir.contains("fdiv double %randf, 0x41F0000000000000"));
    }

    #[test]
    fn len_branches_on_runtime_shape() {
        let ir = compile_ok(r#"let s = "abc"; print(len(s));"#);

        assert!(ir.contains("len.str:"));
        assert!(ir.contains("len.arr:"));
        assert!(ir.contains("call i64 @strlen"));
        assert!(ir.contains("getelementptr inbounds double, ptr %s"));
        assert!(ir.contains("phi double"));
    }

    #[test]
    fn upper_walks_bytes_shifting_lowercase() {
        let ir = compile_ok(r#"let u = upper("ab");"#);

        assert!(ir.contains("case.cond:"));
        assert!(ir.contains("icmp sge i8 %ch, 97"));
        assert!(ir.contains("icmp sle i8 %ch, 122"));
        assert!(ir.contains("sub i8 %ch, 32"));
        assert!(ir.contains("select i1 %isletter"));
    }

    #[test]
    fn lower_walks_bytes_shifting_uppercase() {
        let ir = compile_ok(r#"let l = lower("AB");"#);

        assert!(ir.contains("icmp sge i8 %ch, 65"));
        assert!(ir.contains("icmp sle i8 %ch, 90"));
        assert!(ir.contains("add i8 %ch, 32"));
    }

    #[test]
    fn includes_on_strings_uses_strstr() {
        let ir = compile_ok(r#"print(includes("hello", "ell"));"#);

        assert!(ir.contains("call ptr @strstr"));
        assert!(ir.contains("icmp ne ptr %found, null"));
        assert!(ir.contains("uitofp i1 %has to double"));
    }

    #[test]
    fn includes_on_arrays_scans_elements() {
        let ir = compile_ok("let a = [1, 2, 3]; print(includes(a, 2));");

        assert!(ir.contains("inc.cond:"));
        assert!(ir.contains("inc.hit:"));
        assert!(ir.contains("fcmp oeq double %element"));
    }

    #[test]
    fn replace_splices_first_occurrence() {
        let ir = compile_ok(r#"let r = replace("aXb", "X", "Y");"#);

        assert!(ir.contains("rep.copy:"));
        assert!(ir.contains("rep.subst:"));
        assert!(ir.contains("call ptr @strncpy"));
        assert!(ir.contains("ptrtoint ptr %pos to i64"));
        assert!(ir.contains("phi ptr [ %dup, %rep.copy ], [ %replaced, %rep.subst ]"));
    }

    #[test]
    fn append_grows_by_one_slot() {
        let ir = compile_ok("let a = [1]; let b = append(a, 2);");

        assert!(ir.contains("app.cond:"));
        assert!(ir.contains("add i64 %len, 2"));
        assert!(ir.contains("mul i64 %slots, 8"));
        assert!(ir.contains("fadd double %countval, 0x3FF0000000000000"));
    }

    #[test]
    fn builtin_arity_is_checked() {
        let err = compile("sqrt(1, 2);").unwrap_err();
        assert!(matches!(err, EmitError::ArityMismatch { name, got: 2, .. } if name == "sqrt"));

        let err = compile("min(1);").unwrap_err();
        assert!(
            matches!(err, EmitError::ArityMismatch { expected, .. } if expected == "at least 2")
        );
    }

    #[test]
    fn builtin_argument_shapes_are_checked() {
        let err = compile("num(1);").unwrap_err();
        assert!(matches!(
            err,
            EmitError::ArgumentTypeError {
                position: 1,
                expected: "a string",
                ..
            }
        ));

        let err = compile("append(1, 2);").unwrap_err();
        assert!(matches!(
            err,
            EmitError::ArgumentTypeError {
                expected: "an array",
                ..
            }
        ));
    }

    #[test]
    fn user_call_arguments_are_unboxed_doubles() {
        let ir = compile_ok(
            r#"function f(x) { return x; } let s = "2"; print(f(s));"#,
        );

        // The string argument goes through the sniffing unbox before the
        // call, honoring the double-slot convention.
        assert!(ir.contains("unbox.join:"));
        assert!(ir.contains("call ptr @f(double %unboxed)"));
    }

    #[test]
    fn user_call_arity_is_checked() {
        let err = compile("function f(a, b) { return a; } f(1);").unwrap_err();
        assert!(
            matches!(err, EmitError::ArityMismatch { name, expected, got: 1 } if name == "f" && expected == "exactly 2")
        );
    }
}
