//! Lowering of optimized expression trees to register bytecode.

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::format::{SampleType, VideoFormat};

use super::ops::{ExprInstruction, ExprOp, ExprOpType};
use super::optimize::{
    apply_algebraic_cleanup, apply_algebraic_optimizations, apply_comparison_optimizations,
    apply_local_optimizations, apply_op_fusion, apply_strength_reduction,
};
use super::parser::ExprError;
use super::tree::{postorder, ExpressionTree};

/// Scans the instruction list and reuses registers whose last use has
/// passed, reducing register pressure to roughly the stack depth of the
/// original expression.
fn rename_registers(code: &mut [ExprInstruction]) {
    let mut table: HashMap<i32, i32> = HashMap::new();
    let mut free_list: BTreeSet<i32> = BTreeSet::new();

    for i in 0..code.len() {
        let orig = [code[i].dst, code[i].src1, code[i].src2, code[i].src3];
        let mut renamed = orig;

        for n in 1..4 {
            if orig[n] < 0 {
                continue;
            }

            if let Some(&mapped) = table.get(&orig[n]) {
                renamed[n] = mapped;
            }

            let dead = !code[i + 1..]
                .iter()
                .any(|insn| insn.src1 == orig[n] || insn.src2 == orig[n] || insn.src3 == orig[n]);
            if dead {
                free_list.insert(renamed[n]);
            }
        }

        if orig[0] >= 0 {
            if let Some(&slot) = free_list.iter().next() {
                renamed[0] = slot;
                table.insert(orig[0], slot);
                free_list.remove(&slot);
                free_list.insert(orig[0]);
            }
        }

        code[i].dst = renamed[0];
        code[i].src1 = renamed[1];
        code[i].src2 = renamed[2];
        code[i].src3 = renamed[3];
    }
}

/// Optimizes the tree, numbers values and emits one instruction per distinct
/// value number, followed by a store selected by the output format.
pub(crate) fn compile(
    tree: &mut ExpressionTree,
    format: &VideoFormat,
    optimize: bool,
) -> Result<Vec<ExprInstruction>, ExprError> {
    let mut code: Vec<ExprInstruction> = Vec::new();

    let Some(root) = tree.root() else {
        return Ok(code);
    };

    if optimize {
        const MAX_PASSES: u32 = 1000;
        let mut num_passes = 0u32;

        while apply_local_optimizations(tree)
            || apply_algebraic_optimizations(tree)
            || apply_comparison_optimizations(tree)
        {
            num_passes += 1;
            if num_passes > MAX_PASSES {
                return Err(ExprError::OptimizationDidNotConverge);
            }
        }

        while apply_algebraic_cleanup(tree)
            || apply_strength_reduction(tree)
            || apply_op_fusion(tree)
        {
            num_passes += 1;
            if num_passes > MAX_PASSES {
                return Err(ExprError::OptimizationDidNotConverge);
            }
        }
    }

    tree.apply_value_numbering();

    let mut found: HashSet<i32> = HashSet::new();
    postorder(tree, root, &mut |tree, id| {
        if tree.op(id).ty == ExprOpType::Mux {
            return;
        }
        if found.contains(&tree.value_num(id)) {
            return;
        }

        let mut insn = ExprInstruction::new(tree.op(id));
        insn.dst = tree.value_num(id);

        if let Some(left) = tree.left(id) {
            debug_assert!(tree.value_num(left) >= 0);
            insn.src1 = tree.value_num(left);
        }
        if let Some(right) = tree.right(id) {
            if tree.op(right).ty == ExprOpType::Mux {
                insn.src2 = tree.value_num(tree.left(right).unwrap());
                insn.src3 = tree.value_num(tree.right(right).unwrap());
            } else {
                insn.src2 = tree.value_num(right);
            }
        }

        found.insert(insn.dst);
        code.push(insn);
    });

    let store_ty = match (format.sample_type, format.bytes_per_sample) {
        (SampleType::Integer, 1) => ExprOpType::MemStoreU8,
        (SampleType::Integer, _) => ExprOpType::MemStoreU16,
        (SampleType::Float, 2) => ExprOpType::MemStoreF16,
        (SampleType::Float, _) => ExprOpType::MemStoreF32,
    };
    let store_op = if store_ty == ExprOpType::MemStoreU16 {
        ExprOp::with_u(store_ty, format.bits_per_sample as u32)
    } else {
        ExprOp::new(store_ty)
    };
    let mut store = ExprInstruction::new(store_op);
    store.src1 = code.last().map(|i| i.dst).unwrap_or(-1);
    code.push(store);

    rename_registers(&mut code);
    Ok(code)
}
