//! _IR_ Verification
//!
//! Structural checks run over built functions before serialization: every
//! block ends in exactly one terminator, returns agree with the function
//! signature, phi edges come from real predecessors, and every SSA
//! definition dominates its uses.

use std::collections::HashSet;

use thiserror::Error;

use super::{FuncId, Function, InstrKind, Module, Ty, Value};

/// Structural defects detected in a built function.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[allow(missing_docs)]
pub enum VerifyError {
    #[error("function '{func}' has no basic blocks")]
    NoBlocks { func: String },
    #[error("function '{func}', block '{block}' is empty")]
    EmptyBlock { func: String, block: String },
    #[error("function '{func}', block '{block}' does not end in a terminator")]
    MissingTerminator { func: String, block: String },
    #[error("function '{func}', block '{block}' has a terminator before its end")]
    TerminatorNotAtEnd { func: String, block: String },
    #[error("function '{func}': return of {found} from a function returning {expected}")]
    RetTypeMismatch {
        func: String,
        expected: Ty,
        found: Ty,
    },
    #[error("function '{func}', block '{block}': phi edge from non-predecessor '{pred}'")]
    PhiFromNonPredecessor {
        func: String,
        block: String,
        pred: String,
    },
    #[error("function '{func}': %{name} does not dominate all of its uses")]
    DefDoesNotDominateUse { func: String, name: String },
}

/// Verifies every defined, non-erased function in the module.
///
/// # Errors
///
/// Returns the first defect found, in function declaration order.
pub fn verify_module(module: &Module) -> Result<(), VerifyError> {
    for (id, function) in module.functions() {
        if function.erased || function.is_declaration() {
            continue;
        }
        verify_function(module, id)?;
    }

    Ok(())
}

/// Verifies a single function definition.
///
/// # Errors
///
/// Returns the first defect found. Declarations trivially verify.
pub fn verify_function(module: &Module, id: FuncId) -> Result<(), VerifyError> {
    let function = module.function(id);

    if function.erased || function.is_declaration() {
        return Ok(());
    }

    if function.blocks.is_empty() {
        return Err(VerifyError::NoBlocks {
            func: function.name.clone(),
        });
    }

    check_block_structure(function)?;
    check_returns(module, id, function)?;

    let successors = successor_map(function);
    let predecessors = predecessor_map(function, &successors);
    check_phi_edges(function, &predecessors)?;

    let reachable = reachable_blocks(function, &successors);
    let dominators = dominator_sets(function, &predecessors, &reachable);
    check_dominance(function, &reachable, &dominators)
}

/// Every block is non-empty and contains exactly one terminator, at its end.
fn check_block_structure(function: &Function) -> Result<(), VerifyError> {
    for block in &function.blocks {
        let Some((last, rest)) = block.instrs.split_last() else {
            return Err(VerifyError::EmptyBlock {
                func: function.name.clone(),
                block: block.name.clone(),
            });
        };

        if !function.instrs[*last].kind.is_terminator() {
            return Err(VerifyError::MissingTerminator {
                func: function.name.clone(),
                block: block.name.clone(),
            });
        }

        if rest
            .iter()
            .any(|i| function.instrs[*i].kind.is_terminator())
        {
            return Err(VerifyError::TerminatorNotAtEnd {
                func: function.name.clone(),
                block: block.name.clone(),
            });
        }
    }

    Ok(())
}

fn check_returns(module: &Module, id: FuncId, function: &Function) -> Result<(), VerifyError> {
    for instr in &function.instrs {
        if let InstrKind::Ret(value) = &instr.kind {
            let found = match value {
                Some(value) => module.value_ty(id, value),
                None => Ty::Void,
            };

            if found != function.ty.ret {
                return Err(VerifyError::RetTypeMismatch {
                    func: function.name.clone(),
                    expected: function.ty.ret.clone(),
                    found,
                });
            }
        }
    }

    Ok(())
}

fn successor_map(function: &Function) -> Vec<Vec<usize>> {
    function
        .blocks
        .iter()
        .map(|block| {
            let Some(last) = block.instrs.last() else {
                return Vec::new();
            };

            match &function.instrs[*last].kind {
                InstrKind::Br(dest) => vec![dest.0],
                InstrKind::CondBr {
                    then_bb, else_bb, ..
                } => vec![then_bb.0, else_bb.0],
                _ => Vec::new(),
            }
        })
        .collect()
}

fn predecessor_map(function: &Function, successors: &[Vec<usize>]) -> Vec<Vec<usize>> {
    let mut predecessors = vec![Vec::new(); function.blocks.len()];

    for (from, succs) in successors.iter().enumerate() {
        for to in succs {
            predecessors[*to].push(from);
        }
    }

    predecessors
}

fn check_phi_edges(function: &Function, predecessors: &[Vec<usize>]) -> Result<(), VerifyError> {
    for (block_idx, block) in function.blocks.iter().enumerate() {
        for instr_id in &block.instrs {
            if let InstrKind::Phi { incoming, .. } = &function.instrs[*instr_id].kind {
                for (_, pred) in incoming {
                    if !predecessors[block_idx].contains(&pred.0) {
                        return Err(VerifyError::PhiFromNonPredecessor {
                            func: function.name.clone(),
                            block: block.name.clone(),
                            pred: function.blocks[pred.0].name.clone(),
                        });
                    }
                }
            }
        }
    }

    Ok(())
}

fn reachable_blocks(function: &Function, successors: &[Vec<usize>]) -> Vec<bool> {
    let mut reachable = vec![false; function.blocks.len()];
    let mut worklist = vec![0];

    while let Some(block) = worklist.pop() {
        if reachable[block] {
            continue;
        }
        reachable[block] = true;
        worklist.extend_from_slice(&successors[block]);
    }

    reachable
}

/// Iterative dominator-set computation over the reachable subgraph. The
/// control-flow graphs the emitter produces are small, so the quadratic
/// set-intersection formulation is plenty.
fn dominator_sets(
    function: &Function,
    predecessors: &[Vec<usize>],
    reachable: &[bool],
) -> Vec<HashSet<usize>> {
    let n = function.blocks.len();
    let all: HashSet<usize> = (0..n).filter(|b| reachable[*b]).collect();

    let mut dominators = vec![all; n];
    dominators[0] = HashSet::from([0]);

    let mut changed = true;
    while changed {
        changed = false;

        for block in 1..n {
            if !reachable[block] {
                continue;
            }

            let mut new: Option<HashSet<usize>> = None;
            for pred in &predecessors[block] {
                if !reachable[*pred] {
                    continue;
                }

                new = Some(match new {
                    None => dominators[*pred].clone(),
                    Some(acc) => acc.intersection(&dominators[*pred]).copied().collect(),
                });
            }

            let mut new = new.unwrap_or_default();
            new.insert(block);

            if new != dominators[block] {
                dominators[block] = new;
                changed = true;
            }
        }
    }

    dominators
}

fn check_dominance(
    function: &Function,
    reachable: &[bool],
    dominators: &[HashSet<usize>],
) -> Result<(), VerifyError> {
    // Map each result-producing instruction to its (block, position).
    let mut def_site = vec![None; function.instrs.len()];
    for (block_idx, block) in function.blocks.iter().enumerate() {
        for (pos, instr_id) in block.instrs.iter().enumerate() {
            def_site[*instr_id] = Some((block_idx, pos));
        }
    }

    let dominates = |def: (usize, usize), use_block: usize, use_pos: usize| -> bool {
        let (def_block, def_pos) = def;
        if def_block == use_block {
            def_pos < use_pos
        } else {
            dominators[use_block].contains(&def_block)
        }
    };

    for (block_idx, block) in function.blocks.iter().enumerate() {
        // Dominance is undefined in unreachable code.
        if !reachable[block_idx] {
            continue;
        }

        for (pos, instr_id) in block.instrs.iter().enumerate() {
            let instr = &function.instrs[*instr_id];

            if let InstrKind::Phi { incoming, .. } = &instr.kind {
                // A phi operand must dominate the end of its incoming edge.
                for (value, pred) in incoming {
                    if let Value::Instr(def_id) = value {
                        let def = def_site[*def_id].expect("definition belongs to a block");
                        let end = function.blocks[pred.0].instrs.len();
                        if reachable[pred.0] && !dominates(def, pred.0, end) {
                            return Err(VerifyError::DefDoesNotDominateUse {
                                func: function.name.clone(),
                                name: instr.name.clone(),
                            });
                        }
                    }
                }
                continue;
            }

            for value in instr_operands(&instr.kind) {
                if let Value::Instr(def_id) = value {
                    let def = def_site[def_id].expect("definition belongs to a block");
                    if !dominates(def, block_idx, pos) {
                        return Err(VerifyError::DefDoesNotDominateUse {
                            func: function.name.clone(),
                            name: function.instrs[def_id].name.clone(),
                        });
                    }
                }
            }
        }
    }

    Ok(())
}

fn instr_operands(kind: &InstrKind) -> Vec<Value> {
    match kind {
        InstrKind::Alloca(_) | InstrKind::Br(_) => Vec::new(),
        InstrKind::Load { ptr, .. } => vec![*ptr],
        InstrKind::Store { value, ptr } => vec![*value, *ptr],
        InstrKind::BinOp { lhs, rhs, .. } => vec![*lhs, *rhs],
        InstrKind::FNeg(value) => vec![*value],
        InstrKind::ICmp { lhs, rhs, .. } => vec![*lhs, *rhs],
        InstrKind::FCmp { lhs, rhs, .. } => vec![*lhs, *rhs],
        InstrKind::Cast { value, .. } => vec![*value],
        InstrKind::Select {
            cond,
            then_v,
            else_v,
        } => vec![*cond, *then_v, *else_v],
        InstrKind::Call { args, .. } => args.clone(),
        InstrKind::Gep { base, index, .. } => vec![*base, *index],
        InstrKind::Phi { incoming, .. } => incoming.iter().map(|(v, _)| *v).collect(),
        InstrKind::CondBr { cond, .. } => vec![*cond],
        InstrKind::Ret(value) => value.iter().copied().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::super::{BinOp, Builder, FnTy, Linkage, Ty, Value};
    use super::*;

    fn new_func(builder: &mut Builder, ret: Ty) -> FuncId {
        builder
            .module_mut()
            .add_function("f", FnTy::new(vec![Ty::I1], ret, false), Linkage::Internal)
    }

    #[test]
    fn verifies_a_diamond_with_phi() {
        let mut builder = Builder::new("unit");
        let func = new_func(&mut builder, Ty::F64);
        let entry = builder.append_block(func, "entry");
        let a = builder.append_block(func, "a");
        let b = builder.append_block(func, "b");
        let join = builder.append_block(func, "join");

        builder.position_at_end(func, entry);
        builder.build_cond_br(Value::Arg(0), a, b);
        builder.position_at_end(func, a);
        let x = builder.build_binop(BinOp::FAdd, Value::F64(1.0), Value::F64(2.0), "x");
        builder.build_br(join);
        builder.position_at_end(func, b);
        builder.build_br(join);
        builder.position_at_end(func, join);
        let phi = builder.build_phi(Ty::F64, vec![(x, a), (Value::F64(0.0), b)], "merge");
        builder.build_ret(Some(phi));

        let module = builder.finish();
        assert_eq!(verify_function(&module, func), Ok(()));
        assert_eq!(verify_module(&module), Ok(()));
    }

    #[test]
    fn rejects_missing_terminator() {
        let mut builder = Builder::new("unit");
        let func = new_func(&mut builder, Ty::F64);
        let entry = builder.append_block(func, "entry");
        builder.position_at_end(func, entry);
        builder.build_binop(BinOp::FAdd, Value::F64(1.0), Value::F64(2.0), "x");

        let module = builder.finish();
        assert!(matches!(
            verify_function(&module, func),
            Err(VerifyError::MissingTerminator { .. })
        ));
    }

    #[test]
    fn rejects_code_after_terminator() {
        let mut builder = Builder::new("unit");
        let func = new_func(&mut builder, Ty::F64);
        let entry = builder.append_block(func, "entry");
        builder.position_at_end(func, entry);
        builder.build_ret(Some(Value::F64(0.0)));
        builder.build_binop(BinOp::FAdd, Value::F64(1.0), Value::F64(2.0), "dead");

        let module = builder.finish();
        assert!(matches!(
            verify_function(&module, func),
            Err(VerifyError::MissingTerminator { .. } | VerifyError::TerminatorNotAtEnd { .. })
        ));
    }

    #[test]
    fn rejects_return_type_mismatch() {
        let mut builder = Builder::new("unit");
        let func = new_func(&mut builder, Ty::I32);
        let entry = builder.append_block(func, "entry");
        builder.position_at_end(func, entry);
        builder.build_ret(Some(Value::F64(0.0)));

        let module = builder.finish();
        assert!(matches!(
            verify_function(&module, func),
            Err(VerifyError::RetTypeMismatch { .. })
        ));
    }

    #[test]
    fn rejects_phi_from_non_predecessor() {
        let mut builder = Builder::new("unit");
        let func = new_func(&mut builder, Ty::F64);
        let entry = builder.append_block(func, "entry");
        let a = builder.append_block(func, "a");
        let join = builder.append_block(func, "join");

        builder.position_at_end(func, entry);
        builder.build_cond_br(Value::Arg(0), a, join);
        builder.position_at_end(func, a);
        builder.build_br(join);
        builder.position_at_end(func, join);
        // "entry" reaches "join" directly, but a phi edge from an unrelated
        // block (itself) is invalid.
        let phi = builder.build_phi(
            Ty::F64,
            vec![(Value::F64(1.0), a), (Value::F64(2.0), join)],
            "merge",
        );
        builder.build_ret(Some(phi));

        let module = builder.finish();
        assert!(matches!(
            verify_function(&module, func),
            Err(VerifyError::PhiFromNonPredecessor { .. })
        ));
    }

    #[test]
    fn rejects_use_that_is_not_dominated() {
        let mut builder = Builder::new("unit");
        let func = new_func(&mut builder, Ty::F64);
        let entry = builder.append_block(func, "entry");
        let a = builder.append_block(func, "a");
        let b = builder.append_block(func, "b");
        let join = builder.append_block(func, "join");

        builder.position_at_end(func, entry);
        builder.build_cond_br(Value::Arg(0), a, b);
        builder.position_at_end(func, a);
        let x = builder.build_binop(BinOp::FAdd, Value::F64(1.0), Value::F64(2.0), "x");
        builder.build_br(join);
        builder.position_at_end(func, b);
        builder.build_br(join);
        builder.position_at_end(func, join);
        // `x` is only defined on the `a` path.
        let bad = builder.build_binop(BinOp::FAdd, x, Value::F64(1.0), "bad");
        builder.build_ret(Some(bad));

        let module = builder.finish();
        assert!(matches!(
            verify_function(&module, func),
            Err(VerifyError::DefDoesNotDominateUse { .. })
        ));
    }

    #[test]
    fn declarations_trivially_verify() {
        let mut builder = Builder::new("unit");
        let func = builder.module_mut().add_function(
            "printf",
            FnTy::new(vec![Ty::Ptr], Ty::I32, true),
            Linkage::External,
        );

        let module = builder.finish();
        assert_eq!(verify_function(&module, func), Ok(()));
    }
}
