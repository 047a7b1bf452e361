//! Runtime value conversions.
//!
//! The lowering of _Twine_'s dynamic typing onto static _IR_ types: numeric
//! and boolean coercions, first-byte discrimination of ambiguous pointers,
//! boxing of doubles into heap cells, and C-string concatenation.
//!
//! A `ptr` temporary can hold one of three runtime shapes: a NUL-terminated
//! C string, a boxed double, or an array of doubles whose count sits in the
//! slot before the handed-out pointer. The discriminator is a heuristic: the
//! first byte of a C string is printable ASCII, which the first byte of a
//! boxed double is unlikely to be.

use super::Compiler;
use crate::compiler::ir::{BinOp, CastOp, FloatPred, IntPred, Ty, Value};

/// Returns the zero of `ty`, used for value-less returns.
pub(super) fn zero_of(ty: &Ty) -> Value {
    match ty {
        Ty::F64 => Value::F64(0.0),
        Ty::I1 => Value::Bool(false),
        Ty::I8 => Value::I8(0),
        Ty::I32 => Value::I32(0),
        Ty::I64 => Value::I64(0),
        _ => Value::NullPtr,
    }
}

impl Compiler {
    /// Promotes integer values to `double` with a signed conversion.
    /// Pointers pass through unchanged; callers that need a numeric pointer
    /// payload unbox first.
    pub(super) fn to_f64(&mut self, value: Value) -> Value {
        let ty = self.builder.value_ty(&value);

        if ty.is_integer() {
            self.builder.build_cast(CastOp::SIToFP, value, Ty::F64, "cast")
        } else {
            value
        }
    }

    /// Coerces a user-call argument to the `double` calling convention,
    /// unboxing pointer-shaped values.
    pub(super) fn arg_to_f64(&mut self, value: Value) -> Value {
        if self.builder.value_ty(&value).is_ptr() {
            self.unbox_to_f64(value)
        } else {
            self.to_f64(value)
        }
    }

    /// Coerces `value` to `i1` by comparing against the natural zero of its
    /// type: integer zero, `0.0`, or `null`.
    pub(super) fn to_bool(&mut self, value: Value) -> Value {
        match self.builder.value_ty(&value) {
            Ty::I1 => value,
            ty if ty.is_integer() => {
                let zero = zero_of(&ty);
                self.builder.build_icmp(IntPred::Ne, value, zero, "tobool")
            }
            Ty::F64 => self
                .builder
                .build_fcmp(FloatPred::One, value, Value::F64(0.0), "tobool"),
            Ty::Ptr => self
                .builder
                .build_icmp(IntPred::Ne, value, Value::NullPtr, "tobool"),
            _ => value,
        }
    }

    /// Coerces an index expression to `i64` for address arithmetic.
    pub(super) fn to_index(&mut self, value: Value) -> Value {
        match self.builder.value_ty(&value) {
            Ty::I64 => value,
            Ty::F64 => self
                .builder
                .build_cast(CastOp::FPToUI, value, Ty::I64, "idx"),
            ty if ty.is_integer() => self
                .builder
                .build_cast(CastOp::ZExt, value, Ty::I64, "idx"),
            Ty::Ptr => {
                let unboxed = self.unbox_to_f64(value);
                self.builder
                    .build_cast(CastOp::FPToUI, unboxed, Ty::I64, "idx")
            }
            _ => value,
        }
    }

    /// Emits the printable-ASCII sniff over the first byte at `ptr`:
    /// `byte in [32, 126]`, optionally also accepting `byte == 0` so the
    /// empty string counts.
    pub(super) fn is_string_pointer(&mut self, ptr: Value, allow_empty: bool) -> Value {
        let byte = self.builder.build_load(Ty::I8, ptr, "tag");
        let ge = self
            .builder
            .build_icmp(IntPred::Sge, byte, Value::I8(32), "ge");
        let le = self
            .builder
            .build_icmp(IntPred::Sle, byte, Value::I8(126), "le");
        let printable = self.builder.build_binop(BinOp::And, ge, le, "printable");

        if allow_empty {
            let empty = self
                .builder
                .build_icmp(IntPred::Eq, byte, Value::I8(0), "empty");
            self.builder.build_binop(BinOp::Or, printable, empty, "strlike")
        } else {
            printable
        }
    }

    /// Boxes a double into a fresh 8-byte heap cell, returning the cell
    /// pointer. The cell is never freed.
    pub(super) fn box_f64(&mut self, value: Value) -> Value {
        let malloc = self.functions["malloc"];
        let cell = self.builder.build_call(malloc, vec![Value::I64(8)], "box");
        self.builder.build_store(value, cell);
        cell
    }

    /// Turns an ambiguous pointer into a double: strings go through `atof`,
    /// anything else is read as a boxed double. Joins with a phi.
    pub(super) fn unbox_to_f64(&mut self, ptr: Value) -> Value {
        let is_str = self.is_string_pointer(ptr, false);

        let func = self.func();
        let str_bb = self.builder.append_block(func, "unbox.str");
        let raw_bb = self.builder.append_block(func, "unbox.raw");
        let join_bb = self.builder.append_block(func, "unbox.join");

        self.builder.build_cond_br(is_str, str_bb, raw_bb);

        self.builder.position_at_end(func, str_bb);
        let atof = self.functions["atof"];
        let parsed = self.builder.build_call(atof, vec![ptr], "parsed");
        self.builder.build_br(join_bb);

        self.builder.position_at_end(func, raw_bb);
        let loaded = self.builder.build_load(Ty::F64, ptr, "boxed");
        self.builder.build_br(join_bb);

        self.builder.position_at_end(func, join_bb);
        self.builder.build_phi(
            Ty::F64,
            vec![(parsed, str_bb), (loaded, raw_bb)],
            "unboxed",
        )
    }

    /// Coerces a non-pointer value into a C string through a 32-byte stack
    /// buffer and `snprintf("%g", ...)`. Pointers pass through unchanged.
    pub(super) fn to_string_ptr(&mut self, value: Value) -> Value {
        if self.builder.value_ty(&value).is_ptr() {
            return value;
        }

        let value = self.to_f64(value);

        let func = self.func();
        let buffer = self.builder.build_entry_alloca(
            func,
            Ty::Array(32, Box::new(Ty::I8)),
            "str_buffer",
        );

        let format = self.cstr("%g");
        let snprintf = self.functions["snprintf"];
        self.builder.build_call(
            snprintf,
            vec![buffer, Value::I64(32), format, value],
            "",
        );

        buffer
    }

    /// `left + right` where either side is a pointer: stringify both sides,
    /// measure, allocate, `strcpy` then `strcat`. The result leaks.
    pub(super) fn string_concat(&mut self, left: Value, right: Value) -> Value {
        let left = self.to_string_ptr(left);
        let right = self.to_string_ptr(right);

        let strlen = self.functions["strlen"];
        let left_len = self.builder.build_call(strlen, vec![left], "leftlen");
        let right_len = self.builder.build_call(strlen, vec![right], "rightlen");

        let sum = self
            .builder
            .build_binop(BinOp::Add, left_len, right_len, "addlen");
        let total = self
            .builder
            .build_binop(BinOp::Add, sum, Value::I64(1), "totallen");

        let malloc = self.functions["malloc"];
        let result = self.builder.build_call(malloc, vec![total], "concat");

        let strcpy = self.functions["strcpy"];
        self.builder.build_call(strcpy, vec![result, left], "");
        let strcat = self.functions["strcat"];
        self.builder.build_call(strcat, vec![result, right], "");

        result
    }

    /// Coerces a `return` operand to the current function's return type.
    ///
    /// In an `i32` function a pointer value collapses to constant `0` (the
    /// lossy `main` path); in a `ptr` function non-pointer values are boxed.
    pub(super) fn coerce_return(&mut self, value: Value, ret_ty: &Ty) -> Value {
        let ty = self.builder.value_ty(&value);

        match ret_ty {
            Ty::I32 => match ty {
                Ty::I32 => value,
                Ty::F64 => self
                    .builder
                    .build_cast(CastOp::FPToSI, value, Ty::I32, "retcast"),
                Ty::Ptr => Value::I32(0),
                ty if ty.is_integer() => self
                    .builder
                    .build_cast(CastOp::ZExt, value, Ty::I32, "retcast"),
                _ => value,
            },
            Ty::Ptr => {
                if ty.is_ptr() {
                    value
                } else {
                    let value = self.to_f64(value);
                    self.box_f64(value)
                }
            }
            _ => value,
        }
    }

}
