//! Intermediate Representation
//!
//! SSA _IR_ construction library used by the code generator: types, values,
//! constants, basic blocks, global variables, function declarations and
//! definitions, and an instruction builder with a current insertion point.
//!
//! The module serializes to textual _LLVM_-compatible IR (`Display` on
//! [`Module`], implemented in [`print`]) and carries a structural verifier
//! ([`verify`]). Only the subset of the LLVM surface the _Twine_ front-end
//! emits is modeled; there is no data layout and no target triple, which the
//! downstream toolchain supplies.

pub mod print;
pub mod verify;

use std::collections::HashMap;
use std::fmt;

/// _IR_ first-class types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ty {
    /// Absence of a value; only valid as a function return type.
    Void,
    /// 1-bit boolean.
    I1,
    /// 8-bit integer (byte).
    I8,
    /// 32-bit integer.
    I32,
    /// 64-bit integer.
    I64,
    /// IEEE-754 double.
    F64,
    /// Opaque pointer; pointees are untyped.
    Ptr,
    /// Fixed-size array, used for stack and global byte buffers.
    Array(usize, Box<Ty>),
}

impl Ty {
    /// Returns `true` for the integer types (`i1`, `i8`, `i32`, `i64`).
    #[must_use]
    pub const fn is_integer(&self) -> bool {
        matches!(self, Ty::I1 | Ty::I8 | Ty::I32 | Ty::I64)
    }

    /// Returns `true` for the `double` type.
    #[must_use]
    pub const fn is_f64(&self) -> bool {
        matches!(self, Ty::F64)
    }

    /// Returns `true` for the opaque pointer type.
    #[must_use]
    pub const fn is_ptr(&self) -> bool {
        matches!(self, Ty::Ptr)
    }
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ty::Void => write!(f, "void"),
            Ty::I1 => write!(f, "i1"),
            Ty::I8 => write!(f, "i8"),
            Ty::I32 => write!(f, "i32"),
            Ty::I64 => write!(f, "i64"),
            Ty::F64 => write!(f, "double"),
            Ty::Ptr => write!(f, "ptr"),
            Ty::Array(len, elem) => write!(f, "[{len} x {elem}]"),
        }
    }
}

/// _IR_ function type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FnTy {
    /// Parameter types in order.
    pub params: Vec<Ty>,
    /// Return type; `Ty::Void` for none.
    pub ret: Ty,
    /// `true` for C-variadic functions such as `printf`.
    pub variadic: bool,
}

impl FnTy {
    /// Returns a new function type.
    #[must_use]
    pub fn new(params: Vec<Ty>, ret: Ty, variadic: bool) -> Self {
        Self {
            params,
            ret,
            variadic,
        }
    }
}

/// Linkage of a global symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Linkage {
    /// Visible across object files; also used for external declarations.
    External,
    /// Local to the emitted module.
    Internal,
    /// Local and renamable, used for string constants.
    Private,
}

/// Handle to a function in a [`Module`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FuncId(usize);

/// Handle to a global variable in a [`Module`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GlobalId(usize);

/// Handle to a basic block within a function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockId(usize);

/// An SSA value: a constant, or a handle to an instruction result, function
/// argument, global or function address.
///
/// Instruction and argument handles are only meaningful within the function
/// that produced them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    /// `double` constant.
    F64(f64),
    /// `i1` constant.
    Bool(bool),
    /// `i8` constant.
    I8(i8),
    /// `i32` constant.
    I32(i32),
    /// `i64` constant.
    I64(i64),
    /// `ptr null`.
    NullPtr,
    /// Result of the instruction with this index in the current function.
    Instr(usize),
    /// Incoming argument with this index of the current function.
    Arg(usize),
    /// Address of a global variable.
    Global(GlobalId),
    /// Address of a function.
    Func(FuncId),
}

/// Integer comparison predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum IntPred {
    Eq,
    Ne,
    Slt,
    Sle,
    Sgt,
    Sge,
    Ult,
}

/// Ordered floating-point comparison predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum FloatPred {
    Oeq,
    One,
    Olt,
    Ole,
    Ogt,
    Oge,
}

/// Two-operand arithmetic and bitwise operations. The result type is the
/// type of the left operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    SRem,
    And,
    Or,
    Xor,
    LShr,
    FAdd,
    FSub,
    FMul,
    FDiv,
    FRem,
}

/// Value-conversion operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum CastOp {
    SIToFP,
    FPToSI,
    FPToUI,
    UIToFP,
    ZExt,
    PtrToInt,
}

/// _IR_ instructions.
#[derive(Debug, Clone, PartialEq)]
#[allow(missing_docs)]
pub enum InstrKind {
    /// Stack slot of the given type; always placed in the entry block.
    Alloca(Ty),
    Load { ty: Ty, ptr: Value },
    Store { value: Value, ptr: Value },
    BinOp { op: BinOp, lhs: Value, rhs: Value },
    FNeg(Value),
    ICmp { pred: IntPred, lhs: Value, rhs: Value },
    FCmp { pred: FloatPred, lhs: Value, rhs: Value },
    Cast { op: CastOp, value: Value, to: Ty },
    Select { cond: Value, then_v: Value, else_v: Value },
    Call { callee: FuncId, args: Vec<Value> },
    /// Single-index `getelementptr inbounds`.
    Gep { elem_ty: Ty, base: Value, index: Value },
    Phi { ty: Ty, incoming: Vec<(Value, BlockId)> },
    Br(BlockId),
    CondBr { cond: Value, then_bb: BlockId, else_bb: BlockId },
    Ret(Option<Value>),
}

impl InstrKind {
    /// Returns `true` if this instruction ends a basic block.
    #[must_use]
    pub const fn is_terminator(&self) -> bool {
        matches!(
            self,
            InstrKind::Br(_) | InstrKind::CondBr { .. } | InstrKind::Ret(_)
        )
    }
}

/// An instruction together with its result type and assigned name.
#[derive(Debug)]
pub struct Instr {
    /// Operation performed.
    pub kind: InstrKind,
    /// Result type, or `None` for instructions that produce no value.
    pub ty: Option<Ty>,
    /// Unique result name within the function (empty when `ty` is `None`).
    pub name: String,
}

/// A basic block: an ordered run of instructions ending in one terminator.
#[derive(Debug)]
pub struct Block {
    /// Unique label within the function.
    pub name: String,
    /// Indices into the owning function's instruction arena.
    pub instrs: Vec<usize>,
}

/// A function declaration or definition.
#[derive(Debug)]
pub struct Function {
    /// Symbol name.
    pub name: String,
    /// Signature.
    pub ty: FnTy,
    #[allow(missing_docs)]
    pub linkage: Linkage,
    /// Parameter names used for textual serialization.
    pub param_names: Vec<String>,
    /// Basic blocks in layout order; empty for declarations.
    pub blocks: Vec<Block>,
    /// Instruction arena indexed by [`Value::Instr`].
    pub instrs: Vec<Instr>,
    /// Erased functions are skipped by serialization and verification.
    pub erased: bool,
    // Uniquifier state for instruction and block names.
    name_counts: HashMap<String, usize>,
    next_tmp: usize,
}

impl Function {
    /// Returns `true` if this function has no body.
    #[must_use]
    pub fn is_declaration(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Returns a name unique within this function, derived from `hint`.
    fn uniquify(&mut self, hint: &str) -> String {
        if hint.is_empty() {
            let name = format!("t{}", self.next_tmp);
            self.next_tmp += 1;
            return name;
        }

        let count = self.name_counts.entry(hint.to_owned()).or_insert(0);
        let name = if *count == 0 {
            hint.to_owned()
        } else {
            format!("{hint}{count}")
        };
        *count += 1;

        name
    }
}

/// Initializer of a global variable definition.
#[derive(Debug, Clone, PartialEq)]
pub enum GlobalInit {
    /// NUL-included byte array, serialized as a `c"..."` string constant.
    Bytes(Vec<u8>),
    #[allow(missing_docs)]
    I64(i64),
    #[allow(missing_docs)]
    Bool(bool),
    #[allow(missing_docs)]
    NullPtr,
}

/// A global variable declaration or definition.
#[derive(Debug)]
pub struct Global {
    /// Symbol name.
    pub name: String,
    /// Value type of the global (the global itself has type `ptr`).
    pub ty: Ty,
    #[allow(missing_docs)]
    pub linkage: Linkage,
    /// `None` for external declarations.
    pub init: Option<GlobalInit>,
    /// Serialized as `constant` instead of `global`.
    pub is_const: bool,
}

/// A compilation unit: globals plus functions, serializable to textual _IR_.
#[derive(Debug)]
pub struct Module {
    /// Module identifier recorded in the serialized output.
    pub name: String,
    functions: Vec<Function>,
    globals: Vec<Global>,
    next_str: usize,
}

impl Module {
    /// Returns a new, empty module.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            functions: Vec::new(),
            globals: Vec::new(),
            next_str: 0,
        }
    }

    /// Adds a function declaration. A body may be attached later through a
    /// [`Builder`].
    pub fn add_function(&mut self, name: &str, ty: FnTy, linkage: Linkage) -> FuncId {
        let param_names = (0..ty.params.len()).map(|i| format!("arg{i}")).collect();

        self.functions.push(Function {
            name: name.to_owned(),
            ty,
            linkage,
            param_names,
            blocks: Vec::new(),
            instrs: Vec::new(),
            erased: false,
            name_counts: HashMap::new(),
            next_tmp: 0,
        });

        FuncId(self.functions.len() - 1)
    }

    /// Returns the function with the given symbol name, if present.
    #[must_use]
    pub fn get_function(&self, name: &str) -> Option<FuncId> {
        self.functions
            .iter()
            .position(|f| f.name == name && !f.erased)
            .map(FuncId)
    }

    /// Returns a shared reference to a function.
    #[must_use]
    pub fn function(&self, id: FuncId) -> &Function {
        &self.functions[id.0]
    }

    /// Returns a mutable reference to a function.
    pub fn function_mut(&mut self, id: FuncId) -> &mut Function {
        &mut self.functions[id.0]
    }

    /// Iterates over all functions in declaration order.
    pub fn functions(&self) -> impl Iterator<Item = (FuncId, &Function)> {
        self.functions.iter().enumerate().map(|(i, f)| (FuncId(i), f))
    }

    /// Marks a function erased: it is skipped by serialization and
    /// verification, and its name is no longer resolvable.
    pub fn erase_function(&mut self, id: FuncId) {
        let func = &mut self.functions[id.0];
        func.erased = true;
        func.blocks.clear();
        func.instrs.clear();
    }

    /// Adds a global variable.
    pub fn add_global(
        &mut self,
        name: &str,
        ty: Ty,
        linkage: Linkage,
        init: Option<GlobalInit>,
        is_const: bool,
    ) -> GlobalId {
        self.globals.push(Global {
            name: name.to_owned(),
            ty,
            linkage,
            init,
            is_const,
        });

        GlobalId(self.globals.len() - 1)
    }

    /// Adds a private constant byte-array global holding `bytes` plus a NUL
    /// terminator, returning its handle. Names follow the `.str` convention.
    pub fn add_global_string(&mut self, bytes: &[u8]) -> GlobalId {
        let name = if self.next_str == 0 {
            ".str".to_owned()
        } else {
            format!(".str.{}", self.next_str)
        };
        self.next_str += 1;

        let mut data = bytes.to_vec();
        data.push(0);
        let ty = Ty::Array(data.len(), Box::new(Ty::I8));

        self.add_global(&name, ty, Linkage::Private, Some(GlobalInit::Bytes(data)), true)
    }

    /// Returns a shared reference to a global.
    #[must_use]
    pub fn global(&self, id: GlobalId) -> &Global {
        &self.globals[id.0]
    }

    /// Iterates over all globals in declaration order.
    pub fn globals(&self) -> impl Iterator<Item = &Global> {
        self.globals.iter()
    }

    /// Returns the type of `value` in the context of `func`.
    ///
    /// # Panics
    ///
    /// Panics on a handle to an instruction that produces no value: such
    /// handles must never be used as operands.
    #[must_use]
    pub fn value_ty(&self, func: FuncId, value: &Value) -> Ty {
        match value {
            Value::F64(_) => Ty::F64,
            Value::Bool(_) => Ty::I1,
            Value::I8(_) => Ty::I8,
            Value::I32(_) => Ty::I32,
            Value::I64(_) => Ty::I64,
            Value::NullPtr | Value::Global(_) | Value::Func(_) => Ty::Ptr,
            Value::Instr(id) => self.functions[func.0].instrs[*id]
                .ty
                .clone()
                .expect("use of an instruction that produces no value"),
            Value::Arg(i) => self.functions[func.0].ty.params[*i].clone(),
        }
    }

    /// Returns `true` if the block ends in a terminator instruction.
    #[must_use]
    pub fn block_terminated(&self, func: FuncId, block: BlockId) -> bool {
        let function = &self.functions[func.0];
        function.blocks[block.0]
            .instrs
            .last()
            .is_some_and(|id| function.instrs[*id].kind.is_terminator())
    }
}

/// Instruction builder with a current insertion point.
///
/// The builder owns the module under construction; [`Builder::finish`]
/// releases it. All `build_*` methods append at the insertion point and
/// panic when none is set, mirroring builder misuse being a compiler bug
/// rather than an input error.
#[derive(Debug)]
pub struct Builder {
    module: Module,
    point: Option<(FuncId, BlockId)>,
}

impl Builder {
    /// Returns a builder over a fresh module with no insertion point.
    #[must_use]
    pub fn new(module_name: &str) -> Self {
        Self {
            module: Module::new(module_name),
            point: None,
        }
    }

    /// Returns the module under construction.
    #[must_use]
    pub fn module(&self) -> &Module {
        &self.module
    }

    /// Returns the module under construction for direct mutation.
    pub fn module_mut(&mut self) -> &mut Module {
        &mut self.module
    }

    /// Releases the finished module.
    #[must_use]
    pub fn finish(self) -> Module {
        self.module
    }

    /// Appends a new basic block named after `hint` to `func`.
    pub fn append_block(&mut self, func: FuncId, hint: &str) -> BlockId {
        let function = self.module.function_mut(func);
        let name = function.uniquify(hint);

        function.blocks.push(Block {
            name,
            instrs: Vec::new(),
        });

        BlockId(function.blocks.len() - 1)
    }

    /// Moves the insertion point to the end of `block`.
    pub fn position_at_end(&mut self, func: FuncId, block: BlockId) {
        self.point = Some((func, block));
    }

    /// Removes the insertion point.
    pub fn clear_insertion_point(&mut self) {
        self.point = None;
    }

    /// Returns the current insertion point, if any.
    #[must_use]
    pub const fn insertion_point(&self) -> Option<(FuncId, BlockId)> {
        self.point
    }

    /// Returns the function containing the insertion point.
    ///
    /// # Panics
    ///
    /// Panics when no insertion point is set.
    #[must_use]
    pub fn current_function(&self) -> FuncId {
        self.point.expect("no insertion point set").0
    }

    /// Returns `true` if the insertion block already ends in a terminator.
    ///
    /// # Panics
    ///
    /// Panics when no insertion point is set.
    #[must_use]
    pub fn current_block_terminated(&self) -> bool {
        let (func, block) = self.point.expect("no insertion point set");
        self.module.block_terminated(func, block)
    }

    /// Returns the type of `value` in the context of the insertion function.
    #[must_use]
    pub fn value_ty(&self, value: &Value) -> Ty {
        self.module.value_ty(self.current_function(), value)
    }

    /// Appends `kind` at the insertion point, returning its result value.
    fn push(&mut self, kind: InstrKind, ty: Option<Ty>, hint: &str) -> Value {
        let (func, block) = self.point.expect("no insertion point set");
        let function = self.module.function_mut(func);

        let name = if ty.is_some() {
            function.uniquify(hint)
        } else {
            String::new()
        };

        function.instrs.push(Instr { kind, ty, name });
        let id = function.instrs.len() - 1;
        function.blocks[block.0].instrs.push(id);

        Value::Instr(id)
    }

    /// Allocates a stack slot in the entry block of `func`, before the first
    /// non-`alloca` instruction, so that every slot dominates the whole body.
    pub fn build_entry_alloca(&mut self, func: FuncId, ty: Ty, hint: &str) -> Value {
        let function = self.module.function_mut(func);
        let name = function.uniquify(hint);

        function.instrs.push(Instr {
            kind: InstrKind::Alloca(ty),
            ty: Some(Ty::Ptr),
            name,
        });
        let id = function.instrs.len() - 1;

        let at = {
            let entry = &function.blocks[0];
            entry
                .instrs
                .iter()
                .position(|i| !matches!(function.instrs[*i].kind, InstrKind::Alloca(_)))
                .unwrap_or(entry.instrs.len())
        };
        function.blocks[0].instrs.insert(at, id);

        Value::Instr(id)
    }

    /// Appends a typed load.
    pub fn build_load(&mut self, ty: Ty, ptr: Value, hint: &str) -> Value {
        self.push(
            InstrKind::Load {
                ty: ty.clone(),
                ptr,
            },
            Some(ty),
            hint,
        )
    }

    /// Appends a store.
    pub fn build_store(&mut self, value: Value, ptr: Value) {
        self.push(InstrKind::Store { value, ptr }, None, "");
    }

    /// Appends a two-operand arithmetic instruction. The result takes the
    /// left operand's type.
    pub fn build_binop(&mut self, op: BinOp, lhs: Value, rhs: Value, hint: &str) -> Value {
        let ty = self.value_ty(&lhs);
        self.push(InstrKind::BinOp { op, lhs, rhs }, Some(ty), hint)
    }

    /// Appends a floating-point negation.
    pub fn build_fneg(&mut self, value: Value, hint: &str) -> Value {
        self.push(InstrKind::FNeg(value), Some(Ty::F64), hint)
    }

    /// Appends an integer comparison producing `i1`.
    pub fn build_icmp(&mut self, pred: IntPred, lhs: Value, rhs: Value, hint: &str) -> Value {
        self.push(InstrKind::ICmp { pred, lhs, rhs }, Some(Ty::I1), hint)
    }

    /// Appends an ordered floating-point comparison producing `i1`.
    pub fn build_fcmp(&mut self, pred: FloatPred, lhs: Value, rhs: Value, hint: &str) -> Value {
        self.push(InstrKind::FCmp { pred, lhs, rhs }, Some(Ty::I1), hint)
    }

    /// Appends a conversion to `to`.
    pub fn build_cast(&mut self, op: CastOp, value: Value, to: Ty, hint: &str) -> Value {
        self.push(
            InstrKind::Cast {
                op,
                value,
                to: to.clone(),
            },
            Some(to),
            hint,
        )
    }

    /// Appends a select between two values of the same type.
    pub fn build_select(&mut self, cond: Value, then_v: Value, else_v: Value, hint: &str) -> Value {
        let ty = self.value_ty(&then_v);
        self.push(
            InstrKind::Select {
                cond,
                then_v,
                else_v,
            },
            Some(ty),
            hint,
        )
    }

    /// Appends a direct call. The returned value must not be used as an
    /// operand when the callee returns `void`.
    pub fn build_call(&mut self, callee: FuncId, args: Vec<Value>, hint: &str) -> Value {
        let ret = self.module.function(callee).ty.ret.clone();
        let ty = match ret {
            Ty::Void => None,
            other => Some(other),
        };

        self.push(InstrKind::Call { callee, args }, ty, hint)
    }

    /// Appends a single-index `getelementptr inbounds`.
    pub fn build_gep(&mut self, elem_ty: Ty, base: Value, index: Value, hint: &str) -> Value {
        self.push(
            InstrKind::Gep {
                elem_ty,
                base,
                index,
            },
            Some(Ty::Ptr),
            hint,
        )
    }

    /// Appends a phi joining `incoming` (value, predecessor) pairs.
    pub fn build_phi(&mut self, ty: Ty, incoming: Vec<(Value, BlockId)>, hint: &str) -> Value {
        self.push(
            InstrKind::Phi {
                ty: ty.clone(),
                incoming,
            },
            Some(ty),
            hint,
        )
    }

    /// Appends an unconditional branch.
    pub fn build_br(&mut self, dest: BlockId) {
        debug_assert!(!self.current_block_terminated(), "block already terminated");
        self.push(InstrKind::Br(dest), None, "");
    }

    /// Appends a conditional branch.
    pub fn build_cond_br(&mut self, cond: Value, then_bb: BlockId, else_bb: BlockId) {
        debug_assert!(!self.current_block_terminated(), "block already terminated");
        self.push(
            InstrKind::CondBr {
                cond,
                then_bb,
                else_bb,
            },
            None,
            "",
        );
    }

    /// Appends a return.
    pub fn build_ret(&mut self, value: Option<Value>) {
        debug_assert!(!self.current_block_terminated(), "block already terminated");
        self.push(InstrKind::Ret(value), None, "");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_names_are_uniquified() {
        let mut builder = Builder::new("test");
        let func = builder
            .module_mut()
            .add_function("f", FnTy::new(vec![], Ty::F64, false), Linkage::Internal);
        let entry = builder.append_block(func, "entry");
        builder.position_at_end(func, entry);

        let a = builder.build_binop(BinOp::FAdd, Value::F64(1.0), Value::F64(2.0), "add");
        let b = builder.build_binop(BinOp::FAdd, a, Value::F64(3.0), "add");
        builder.build_ret(Some(b));

        let module = builder.finish();
        let function = module.function(func);
        assert_eq!(function.instrs[0].name, "add");
        assert_eq!(function.instrs[1].name, "add1");
    }

    #[test]
    fn entry_allocas_stay_grouped_at_block_start() {
        let mut builder = Builder::new("test");
        let func = builder
            .module_mut()
            .add_function("f", FnTy::new(vec![], Ty::Void, false), Linkage::Internal);
        let entry = builder.append_block(func, "entry");
        builder.position_at_end(func, entry);

        let slot_a = builder.build_entry_alloca(func, Ty::F64, "a");
        builder.build_store(Value::F64(1.0), slot_a);
        let _slot_b = builder.build_entry_alloca(func, Ty::F64, "b");
        builder.build_ret(None);

        let module = builder.finish();
        let function = module.function(func);
        let entry_instrs = &function.blocks[0].instrs;

        assert!(matches!(
            function.instrs[entry_instrs[0]].kind,
            InstrKind::Alloca(_)
        ));
        assert!(matches!(
            function.instrs[entry_instrs[1]].kind,
            InstrKind::Alloca(_)
        ));
        assert!(matches!(
            function.instrs[entry_instrs[2]].kind,
            InstrKind::Store { .. }
        ));
    }

    #[test]
    fn block_terminated_tracks_terminators() {
        let mut builder = Builder::new("test");
        let func = builder
            .module_mut()
            .add_function("f", FnTy::new(vec![], Ty::Void, false), Linkage::Internal);
        let entry = builder.append_block(func, "entry");
        builder.position_at_end(func, entry);

        assert!(!builder.current_block_terminated());
        builder.build_ret(None);
        assert!(builder.current_block_terminated());
    }

    #[test]
    fn value_types_resolve() {
        let mut builder = Builder::new("test");
        let func = builder.module_mut().add_function(
            "f",
            FnTy::new(vec![Ty::F64], Ty::Void, false),
            Linkage::Internal,
        );
        let entry = builder.append_block(func, "entry");
        builder.position_at_end(func, entry);

        assert_eq!(builder.value_ty(&Value::Arg(0)), Ty::F64);
        assert_eq!(builder.value_ty(&Value::Bool(true)), Ty::I1);
        assert_eq!(builder.value_ty(&Value::NullPtr), Ty::Ptr);

        let loaded = builder.build_load(Ty::I8, Value::NullPtr, "byte");
        assert_eq!(builder.value_ty(&loaded), Ty::I8);
    }

    #[test]
    fn erased_functions_are_not_resolvable() {
        let mut module = Module::new("test");
        let func = module.add_function("gone", FnTy::new(vec![], Ty::Void, false), Linkage::Internal);

        assert!(module.get_function("gone").is_some());
        module.erase_function(func);
        assert!(module.get_function("gone").is_none());
    }
}
