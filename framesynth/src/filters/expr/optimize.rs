//! Algebraic optimization passes over expression trees.
//!
//! The passes run in fixpoint rounds: local rewrites and the additive /
//! multiplicative normalization first, then cleanup, strength reduction and
//! FMA fusion. Every pass leaves the tree valid; detached nodes stay in the
//! arena until the tree is dropped.

use std::collections::HashMap;

use super::ops::{ComparisonType, ExprOp, ExprOpType, FmaType};
use super::tree::{postorder, preorder, ExpressionTree, NodeId};

type ValueIndex = HashMap<i32, NodeId>;

fn is_op(tree: &ExpressionTree, id: NodeId, types: &[ExprOpType]) -> bool {
    types.contains(&tree.op(id).ty)
}

fn is_constant(tree: &ExpressionTree, id: NodeId) -> bool {
    tree.op(id).ty == ExprOpType::Constant
}

fn is_constant_value(tree: &ExpressionTree, id: NodeId, val: f32) -> bool {
    is_constant(tree, id) && tree.op(id).imm.f() == val
}

fn is_constant_expr(tree: &ExpressionTree, id: NodeId) -> bool {
    match tree.op(id).ty {
        ExprOpType::MemLoadU8
        | ExprOpType::MemLoadU16
        | ExprOpType::MemLoadF16
        | ExprOpType::MemLoadF32 => false,
        ExprOpType::Constant => true,
        _ => {
            tree.left(id).map_or(true, |l| is_constant_expr(tree, l))
                && tree.right(id).map_or(true, |r| is_constant_expr(tree, r))
        }
    }
}

fn is_integer(x: f32) -> bool {
    x.floor() == x
}

fn eval_constant_expr(tree: &ExpressionTree, id: NodeId) -> f32 {
    let bool2float = |x: bool| if x { 1.0f32 } else { 0.0f32 };
    let float2bool = |x: f32| x > 0.0;

    let left = || eval_constant_expr(tree, tree.left(id).unwrap());
    let right = || eval_constant_expr(tree, tree.right(id).unwrap());
    let right_left = || eval_constant_expr(tree, tree.left(tree.right(id).unwrap()).unwrap());
    let right_right = || eval_constant_expr(tree, tree.right(tree.right(id).unwrap()).unwrap());

    let op = tree.op(id);
    match op.ty {
        ExprOpType::Constant => op.imm.f(),
        ExprOpType::Add => left() + right(),
        ExprOpType::Sub => left() - right(),
        ExprOpType::Mul => left() * right(),
        ExprOpType::Div => left() / right(),
        ExprOpType::Fma => match FmaType::from_u32(op.imm.u()) {
            FmaType::Fmadd => right_left() * right_right() + left(),
            FmaType::Fmsub => right_left() * right_right() - left(),
            FmaType::Fnmadd => -(right_left() * right_right()) + left(),
            FmaType::Fnmsub => -(right_left() * right_right()) - left(),
        },
        ExprOpType::Sqrt => left().sqrt(),
        ExprOpType::Abs => left().abs(),
        ExprOpType::Neg => -left(),
        ExprOpType::Max => left().max(right()),
        ExprOpType::Min => left().min(right()),
        ExprOpType::Cmp => match ComparisonType::from_u32(op.imm.u()) {
            ComparisonType::Eq => bool2float(left() == right()),
            ComparisonType::Lt => bool2float(left() < right()),
            ComparisonType::Le => bool2float(left() <= right()),
            ComparisonType::Neq => bool2float(left() != right()),
            ComparisonType::Nlt => bool2float(left() >= right()),
            ComparisonType::Nle => bool2float(left() > right()),
        },
        ExprOpType::And => bool2float(float2bool(left()) && float2bool(right())),
        ExprOpType::Or => bool2float(float2bool(left()) || float2bool(right())),
        ExprOpType::Xor => bool2float(float2bool(left()) != float2bool(right())),
        ExprOpType::Not => bool2float(!float2bool(left())),
        ExprOpType::Exp => left().exp(),
        ExprOpType::Log => left().ln(),
        ExprOpType::Pow => left().powf(right()),
        ExprOpType::Sin => left().sin(),
        ExprOpType::Cos => left().cos(),
        ExprOpType::Ternary => {
            if float2bool(left()) {
                right_left()
            } else {
                right_right()
            }
        }
        _ => f32::NAN,
    }
}

/// x^k for positive integer k as a balanced multiplication tree.
fn emit_integer_pow(tree: &mut ExpressionTree, base: NodeId, exponent: i32) -> NodeId {
    if exponent == 1 {
        return tree.clone_subtree(base);
    }

    let half = (exponent + 1) / 2;
    let left = emit_integer_pow(tree, base, half);
    let right = emit_integer_pow(tree, base, exponent - half);
    let mul = tree.make_node(ExprOp::new(ExprOpType::Mul));
    tree.set_left(mul, Some(left));
    tree.set_right(mul, Some(right));
    mul
}

const MEM_OPS: [ExprOpType; 4] = [
    ExprOpType::MemLoadU8,
    ExprOpType::MemLoadU16,
    ExprOpType::MemLoadF16,
    ExprOpType::MemLoadF32,
];

/// Canonical ordering among factored terms: complex values, then memory
/// loads, then constants. Constants order by value, loads by clip index,
/// everything else by value number.
fn canonical_less(
    tree: &ExpressionTree,
    index: &ValueIndex,
    lhs: (i32, f32),
    rhs: (i32, f32),
) -> bool {
    // Order equivalent terms by exponent.
    if lhs.0 == rhs.0 {
        return lhs.1 < rhs.1;
    }

    let lhs_node = index[&lhs.0];
    let rhs_node = index[&rhs.0];

    let category = |id: NodeId| {
        if is_constant(tree, id) {
            2
        } else if is_op(tree, id, &MEM_OPS) {
            1
        } else {
            0
        }
    };
    let lhs_category = category(lhs_node);
    let rhs_category = category(rhs_node);

    if lhs_category != rhs_category {
        return lhs_category < rhs_category;
    }

    if lhs_category == 2 {
        tree.op(lhs_node).imm.f() < tree.op(rhs_node).imm.f()
    } else if lhs_category == 1 {
        tree.op(lhs_node).imm.u() < tree.op(rhs_node).imm.u()
    } else {
        lhs.0 < rhs.0
    }
}

/// One multiplicative term: a coefficient times a product of exponentiated
/// value numbers, e.g. `3 * v0^2 * v1^3`.
#[derive(Clone)]
struct ExponentMap {
    /// value number -> exponent, ordered by value number.
    map: std::collections::BTreeMap<i32, f32>,
    orig_sequence: Vec<i32>,
    coeff: f32,
}

impl ExponentMap {
    fn new() -> Self {
        Self {
            map: Default::default(),
            orig_sequence: Vec::new(),
            coeff: 1.0,
        }
    }

    fn add_term(&mut self, value_num: i32, exp: f32) {
        *self.map.entry(value_num).or_insert(0.0) += exp;
        self.orig_sequence.push(value_num);
    }

    fn add_coeff(&mut self, val: f32) {
        self.coeff += val;
    }

    fn mul_coeff(&mut self, val: f32) {
        self.coeff *= val;
    }

    fn coeff(&self) -> f32 {
        self.coeff
    }

    fn is_scalar(&self) -> bool {
        self.map.is_empty()
    }

    fn num_terms(&self) -> usize {
        self.map.len() + 1
    }

    fn is_same_term(&self, other: &ExponentMap) -> bool {
        self.map.len() == other.map.len()
            && self
                .map
                .iter()
                .zip(other.map.iter())
                .all(|((k1, v1), (k2, v2))| k1 == k2 && v1 == v2)
    }

    fn expand_one_pass(&mut self, tree: &ExpressionTree, index: &mut ValueIndex) -> bool {
        let mut changed = false;

        let keys: Vec<i32> = self.map.keys().copied().collect();
        for key in keys {
            let value = index[&key];
            let exp = self.map[&key];
            let ty = tree.op(value).ty;

            if ty == ExprOpType::Pow && is_constant(tree, tree.right(value).unwrap()) {
                let left = tree.left(value).unwrap();
                index.insert(tree.value_num(left), left);
                let factor = tree.op(tree.right(value).unwrap()).imm.f();
                self.map.remove(&key);
                *self.map.entry(tree.value_num(left)).or_insert(0.0) += exp * factor;
                changed = true;
            } else if ty == ExprOpType::Mul || ty == ExprOpType::Div {
                let left = tree.left(value).unwrap();
                let right = tree.right(value).unwrap();
                index.insert(tree.value_num(left), left);
                index.insert(tree.value_num(right), right);

                self.map.remove(&key);
                *self.map.entry(tree.value_num(left)).or_insert(0.0) += exp;
                let sign = if ty == ExprOpType::Mul { 1.0 } else { -1.0 };
                *self.map.entry(tree.value_num(right)).or_insert(0.0) += sign * exp;
                changed = true;
            }
        }

        changed
    }

    fn expand_orig_sequence(&mut self, tree: &ExpressionTree, index: &ValueIndex) -> bool {
        let mut changed = false;

        let mut i = 0;
        while i < self.orig_sequence.len() {
            let value = index[&self.orig_sequence[i]];
            let ty = tree.op(value).ty;

            if ty == ExprOpType::Pow && is_constant(tree, tree.right(value).unwrap()) {
                self.orig_sequence[i] = tree.value_num(tree.left(value).unwrap());
                changed = true;
            } else if ty == ExprOpType::Mul || ty == ExprOpType::Div {
                self.orig_sequence[i] = tree.value_num(tree.left(value).unwrap());
                self.orig_sequence
                    .insert(i + 1, tree.value_num(tree.right(value).unwrap()));
                changed = true;
            }
            i += 1;
        }

        changed
    }

    fn combine_constants(&mut self, tree: &ExpressionTree, index: &ValueIndex) {
        let keys: Vec<i32> = self.map.keys().copied().collect();
        for key in keys {
            let node = index[&key];
            if is_constant(tree, node) {
                let exp = self.map.remove(&key).unwrap();
                self.coeff *= tree.op(node).imm.f().powf(exp);
            }
        }
    }

    fn expand(&mut self, tree: &ExpressionTree, index: &mut ValueIndex) {
        while self.expand_one_pass(tree, index) {}
        self.combine_constants(tree, index);
        while self.expand_orig_sequence(tree, index) {}
    }

    fn is_canonical(&self, tree: &ExpressionTree, index: &ValueIndex) -> bool {
        let tmp: Vec<(i32, f32)> = self.orig_sequence.iter().map(|&x| (x, 1.0)).collect();
        tmp.windows(2)
            .all(|w| !canonical_less(tree, index, w[1], w[0]))
    }

    fn sorted_terms(&self, tree: &ExpressionTree, index: &ValueIndex) -> Vec<(i32, f32)> {
        let mut flat: Vec<(i32, f32)> = self.map.iter().map(|(&k, &v)| (k, v)).collect();
        flat.sort_by(|&a, &b| {
            if canonical_less(tree, index, a, b) {
                std::cmp::Ordering::Less
            } else if canonical_less(tree, index, b, a) {
                std::cmp::Ordering::Greater
            } else {
                std::cmp::Ordering::Equal
            }
        });
        flat
    }

    fn emit(&self, tree: &mut ExpressionTree, index: &ValueIndex) -> NodeId {
        let flat = self.sorted_terms(tree, index);

        let mut node: Option<NodeId> = None;
        for (value_num, exp) in flat {
            let base = tree.clone_subtree(index[&value_num]);
            let pow = tree.make_node(ExprOp::new(ExprOpType::Pow));
            tree.set_left(pow, Some(base));
            let e = tree.make_node(ExprOp::constant(exp));
            tree.set_right(pow, Some(e));

            node = Some(match node {
                Some(prev) => {
                    let mul = tree.make_node(ExprOp::new(ExprOpType::Mul));
                    tree.set_left(mul, Some(prev));
                    tree.set_right(mul, Some(pow));
                    mul
                }
                None => pow,
            });
        }

        match node {
            Some(prev) => {
                let mul = tree.make_node(ExprOp::new(ExprOpType::Mul));
                tree.set_left(mul, Some(prev));
                let c = tree.make_node(ExprOp::constant(self.coeff));
                tree.set_right(mul, Some(c));
                mul
            }
            None => tree.make_node(ExprOp::constant(self.coeff)),
        }
    }

    fn canonical_order(
        &self,
        other: &ExponentMap,
        tree: &ExpressionTree,
        index: &ValueIndex,
    ) -> bool {
        let lhs = self.sorted_terms(tree, index);
        let rhs = other.sorted_terms(tree, index);

        // Lexicographical comparison under the canonical predicate.
        for (a, b) in lhs.iter().zip(rhs.iter()) {
            if canonical_less(tree, index, *a, *b) {
                return true;
            }
            if canonical_less(tree, index, *b, *a) {
                return false;
            }
        }
        lhs.len() < rhs.len()
    }
}

/// A sum of signed multiplicative terms plus a scalar.
struct AdditiveSequence {
    terms: Vec<ExponentMap>,
    scalar_term: f32,
}

impl AdditiveSequence {
    fn new() -> Self {
        Self {
            terms: Vec::new(),
            scalar_term: 0.0,
        }
    }

    fn add_term(&mut self, value_num: i32, sign: i32) {
        let mut map = ExponentMap::new();
        map.add_term(value_num, 1.0);
        map.mul_coeff(sign as f32);
        self.terms.push(map);
    }

    fn num_terms(&self) -> usize {
        self.terms.len() + 1
    }

    fn expand(&mut self, tree: &ExpressionTree, index: &mut ValueIndex) {
        for term in &mut self.terms {
            term.expand(tree, index);
        }

        let mut kept = Vec::with_capacity(self.terms.len());
        for term in std::mem::take(&mut self.terms) {
            if term.is_scalar() {
                self.scalar_term += term.coeff();
            } else {
                kept.push(term);
            }
        }
        self.terms = kept;

        // Combine like terms.
        let mut i = 0;
        while i < self.terms.len() {
            let mut j = i + 1;
            while j < self.terms.len() {
                if self.terms[i].is_same_term(&self.terms[j]) {
                    let coeff = self.terms[j].coeff();
                    self.terms[i].add_coeff(coeff);
                    self.terms[j].mul_coeff(0.0);
                }
                j += 1;
            }

            if self.terms[i].coeff() == 0.0 {
                self.terms.remove(i);
                continue;
            }
            i += 1;
        }
    }

    fn canonicalize(&mut self, tree: &ExpressionTree, index: &ValueIndex) -> bool {
        let sorted = self
            .terms
            .windows(2)
            .all(|w| !w[1].canonical_order(&w[0], tree, index));
        if sorted {
            return true;
        }

        self.terms.sort_by(|a, b| {
            if a.canonical_order(b, tree, index) {
                std::cmp::Ordering::Less
            } else if b.canonical_order(a, tree, index) {
                std::cmp::Ordering::Greater
            } else {
                std::cmp::Ordering::Equal
            }
        });
        false
    }

    fn emit(&self, tree: &mut ExpressionTree, index: &ValueIndex) -> NodeId {
        let mut head: Option<NodeId> = None;

        for term in &self.terms {
            let node = term.emit(tree, index);
            head = Some(match head {
                Some(prev) => {
                    let add = tree.make_node(ExprOp::new(ExprOpType::Add));
                    tree.set_left(add, Some(prev));
                    tree.set_right(add, Some(node));
                    add
                }
                None => node,
            });
        }

        match head {
            Some(prev) => {
                let ty = if self.scalar_term < 0.0 {
                    ExprOpType::Sub
                } else {
                    ExprOpType::Add
                };
                let add = tree.make_node(ExprOp::new(ty));
                tree.set_left(add, Some(prev));
                let c = tree.make_node(ExprOp::constant(self.scalar_term.abs()));
                tree.set_right(add, Some(c));
                add
            }
            None => tree.make_node(ExprOp::constant(0.0)),
        }
    }
}

const ADD_SUB: [ExprOpType; 2] = [ExprOpType::Add, ExprOpType::Sub];
const MUL_DIV: [ExprOpType; 2] = [ExprOpType::Mul, ExprOpType::Div];

/// Net sign of a term inside a maximal +/- (or *,/) tree.
fn polarity(tree: &ExpressionTree, id: NodeId, ops: &[ExprOpType], negator: ExprOpType) -> i32 {
    let mut polarity = 1;
    let mut cur = id;
    let mut parent = tree.parent(id);

    while let Some(p) = parent {
        if !is_op(tree, p, ops) {
            break;
        }
        if tree.op(p).ty == negator && tree.right(p) == Some(cur) {
            polarity = -polarity;
        }
        cur = p;
        parent = tree.parent(p);
    }

    polarity
}

fn analyze_additive_expression(tree: &mut ExpressionTree, node: NodeId) -> bool {
    let mut orig_num_terms = 0usize;
    let mut expr = AdditiveSequence::new();
    let mut index = ValueIndex::new();

    preorder(tree, node, &mut |tree, id| {
        if is_op(tree, id, &ADD_SUB) {
            return false;
        }

        let sign = polarity(tree, id, &ADD_SUB, ExprOpType::Sub);
        orig_num_terms += 1;
        expr.add_term(tree.value_num(id), sign);
        index.insert(tree.value_num(id), id);
        true
    });

    expr.expand(tree, &mut index);
    let canonical = expr.canonicalize(tree, &index);

    if expr.num_terms() < orig_num_terms || !canonical {
        let seq = expr.emit(tree, &index);
        tree.replace(node, seq);
        return true;
    }

    false
}

fn analyze_multiplicative_expression(tree: &mut ExpressionTree, node: NodeId) -> bool {
    let mut index = ValueIndex::new();
    let mut expr = ExponentMap::new();
    let mut orig_num_terms = 0usize;
    let mut num_divs = 0usize;

    preorder(tree, node, &mut |tree, id| {
        if tree.op(id).ty == ExprOpType::Div {
            num_divs += 1;
        }
        if is_op(tree, id, &MUL_DIV) {
            return false;
        }

        let sign = polarity(tree, id, &MUL_DIV, ExprOpType::Div);
        expr.add_term(tree.value_num(id), sign as f32);
        index.insert(tree.value_num(id), id);
        orig_num_terms += 1;
        true
    });

    expr.expand(tree, &mut index);

    if expr.num_terms() < orig_num_terms || !expr.is_canonical(tree, &index) || num_divs > 0 {
        let seq = expr.emit(tree, &index);
        tree.replace(node, seq);
        return true;
    }

    false
}

pub(crate) fn apply_algebraic_optimizations(tree: &mut ExpressionTree) -> bool {
    let mut changed = false;

    tree.apply_value_numbering();
    let root = tree.root().unwrap();

    preorder(tree, root, &mut |tree, id| {
        let top_of_sum = is_op(tree, id, &ADD_SUB)
            && tree.parent(id).map_or(true, |p| !is_op(tree, p, &ADD_SUB));
        if top_of_sum {
            if !changed {
                changed = analyze_additive_expression(tree, id);
            }
            return changed;
        }

        let top_of_product = is_op(tree, id, &MUL_DIV)
            && tree.parent(id).map_or(true, |p| !is_op(tree, p, &MUL_DIV));
        if top_of_product {
            if !changed {
                changed = analyze_multiplicative_expression(tree, id);
            }
            return changed;
        }

        false
    });

    changed
}

pub(crate) fn apply_comparison_optimizations(tree: &mut ExpressionTree) -> bool {
    let mut changed = false;

    tree.apply_value_numbering();
    let root = tree.root().unwrap();

    preorder(tree, root, &mut |tree, id| {
        let op = tree.op(id);

        // Eliminate constant conditions.
        if op.ty == ExprOpType::Cmp {
            let (left, right) = (tree.left(id).unwrap(), tree.right(id).unwrap());
            if tree.value_num(left) == tree.value_num(right) {
                let ty = ComparisonType::from_u32(op.imm.u());
                let truth = matches!(
                    ty,
                    ComparisonType::Eq | ComparisonType::Le | ComparisonType::Nlt
                );
                tree.replace_with_leaf(id, ExprOp::constant(if truth { 1.0 } else { 0.0 }));
                changed = true;
                return changed;
            }
        }

        // Eliminate identical branches.
        if op.ty == ExprOpType::Ternary {
            let mux = tree.right(id).unwrap();
            let (t, f) = (tree.left(mux).unwrap(), tree.right(mux).unwrap());
            if tree.value_num(t) == tree.value_num(f) {
                tree.replace(id, t);
                changed = true;
                return changed;
            }
        }

        // MIN/MAX detection.
        if op.ty == ExprOpType::Ternary {
            let cond = tree.left(id).unwrap();
            if tree.op(cond).ty == ExprOpType::Cmp {
                let ty = ComparisonType::from_u32(tree.op(cond).imm.u());
                let mux = tree.right(id).unwrap();
                let cmp_terms = [
                    tree.value_num(tree.left(cond).unwrap()),
                    tree.value_num(tree.right(cond).unwrap()),
                ];
                let mux_terms = [
                    tree.value_num(tree.left(mux).unwrap()),
                    tree.value_num(tree.right(mux).unwrap()),
                ];

                let same_terms = (cmp_terms[0] == mux_terms[0] && cmp_terms[1] == mux_terms[1])
                    || (cmp_terms[0] == mux_terms[1] && cmp_terms[1] == mux_terms[0]);
                let less_or_greater = matches!(
                    ty,
                    ComparisonType::Lt | ComparisonType::Le | ComparisonType::Nle | ComparisonType::Nlt
                );

                if same_terms && less_or_greater {
                    // a < b ? a : b --> min(a, b)     a > b ? b : a --> min(a, b)
                    // a > b ? a : b --> max(a, b)     a < b ? b : a --> max(a, b)
                    let is_min = if matches!(ty, ComparisonType::Lt | ComparisonType::Le) {
                        cmp_terms[0] == mux_terms[0]
                    } else {
                        cmp_terms[0] != mux_terms[0]
                    };
                    let a = tree.left(cond).unwrap();
                    let b = tree.right(cond).unwrap();

                    tree.replace_with_leaf(
                        id,
                        ExprOp::new(if is_min { ExprOpType::Min } else { ExprOpType::Max }),
                    );
                    tree.set_left(id, Some(a));
                    tree.set_right(id, Some(b));

                    changed = true;
                    return changed;
                }
            }
        }

        // CMP to SUB conversion. Lower priority than the other comparison
        // transformations.
        if op.ty == ExprOpType::Cmp {
            let parent_logical = tree.parent(id).map_or(false, |p| {
                is_op(
                    tree,
                    p,
                    &[ExprOpType::And, ExprOpType::Or, ExprOpType::Xor, ExprOpType::Ternary],
                )
            });
            if parent_logical {
                let ty = ComparisonType::from_u32(op.imm.u());

                // a < b --> b - a    a > b --> a - b
                if matches!(ty, ComparisonType::Lt | ComparisonType::Nle) {
                    if ty == ComparisonType::Lt {
                        tree.swap_children((id, true), (id, false));
                    }
                    tree.set_op(id, ExprOp::new(ExprOpType::Sub));
                    changed = true;
                    return changed;
                }
            }
        }

        false
    });

    changed
}

pub(crate) fn apply_local_optimizations(tree: &mut ExpressionTree) -> bool {
    let mut changed = false;
    let root = tree.root().unwrap();

    postorder(tree, root, &mut |tree, id| {
        if tree.op(id).ty == ExprOpType::Mux {
            return;
        }

        // Constant folding.
        if tree.op(id).ty != ExprOpType::Constant && is_constant_expr(tree, id) {
            let val = eval_constant_expr(tree, id);
            tree.replace_with_leaf(id, ExprOp::constant(val));
            changed = true;
        }

        // Move constants to the right-hand side to simplify identities.
        if is_op(tree, id, &[ExprOpType::Add, ExprOpType::Mul])
            && is_constant(tree, tree.left(id).unwrap())
            && !is_constant(tree, tree.right(id).unwrap())
        {
            tree.swap_children((id, true), (id, false));
            changed = true;
        }

        // x * 0 = 0    0 / x = 0
        let op = tree.op(id);
        if (op.ty == ExprOpType::Mul && is_constant_value(tree, tree.right(id).unwrap(), 0.0))
            || (op.ty == ExprOpType::Div && is_constant_value(tree, tree.left(id).unwrap(), 0.0))
        {
            tree.replace_with_leaf(id, ExprOp::constant(0.0));
            changed = true;
        }

        // sqrt(x) = x ** 0.5
        if tree.op(id).ty == ExprOpType::Sqrt {
            tree.set_op(id, ExprOp::new(ExprOpType::Pow));
            let half = tree.make_node(ExprOp::constant(0.5));
            tree.set_right(id, Some(half));
            changed = true;
        }

        // log(exp(x)) = x    exp(log(x)) = x
        let op = tree.op(id);
        if matches!(op.ty, ExprOpType::Log | ExprOpType::Exp) {
            let left = tree.left(id).unwrap();
            let inverse = if op.ty == ExprOpType::Log {
                ExprOpType::Exp
            } else {
                ExprOpType::Log
            };
            if tree.op(left).ty == inverse {
                let inner = tree.left(left).unwrap();
                tree.replace(id, inner);
                changed = true;
            }
        }

        // x ** 0 = 1
        if tree.op(id).ty == ExprOpType::Pow
            && is_constant_value(tree, tree.right(id).unwrap(), 0.0)
        {
            tree.replace_with_leaf(id, ExprOp::constant(1.0));
            changed = true;
        }

        // (a ** b) ** c = a ** (b * c) for integer constants b, c
        if tree.op(id).ty == ExprOpType::Pow {
            let left = tree.left(id).unwrap();
            let right = tree.right(id).unwrap();
            if tree.op(left).ty == ExprOpType::Pow {
                let b = tree.right(left).unwrap();
                if is_constant(tree, b)
                    && is_integer(tree.op(b).imm.f())
                    && is_constant(tree, right)
                    && is_integer(tree.op(right).imm.f())
                {
                    let a = tree.left(left).unwrap();
                    tree.replace(left, a);
                    let mul = tree.make_node(ExprOp::new(ExprOpType::Mul));
                    tree.set_left(mul, Some(b));
                    tree.set_right(mul, Some(right));
                    tree.set_right(id, Some(mul));
                    changed = true;
                }
            }
        }

        // 0 ? x : y = y    1 ? x : y = x
        if tree.op(id).ty == ExprOpType::Ternary
            && is_constant(tree, tree.left(id).unwrap())
        {
            let mux = tree.right(id).unwrap();
            let replacement = if tree.op(tree.left(id).unwrap()).imm.f() > 0.0 {
                tree.left(mux).unwrap()
            } else {
                tree.right(mux).unwrap()
            };
            tree.replace(id, replacement);
            changed = true;
        }

        // a <= b ? x : y --> a > b ? y : x    a >= b ? x : y --> a < b ? y : x
        if tree.op(id).ty == ExprOpType::Ternary {
            let cond = tree.left(id).unwrap();
            if tree.op(cond).ty == ExprOpType::Cmp {
                let ty = ComparisonType::from_u32(tree.op(cond).imm.u());
                if matches!(ty, ComparisonType::Le | ComparisonType::Nlt) {
                    let new_ty = if ty == ComparisonType::Le {
                        ComparisonType::Nle
                    } else {
                        ComparisonType::Lt
                    };
                    let mut op = tree.op(cond);
                    op.imm.set_u(new_ty as u32);
                    tree.set_op(cond, op);
                    let mux = tree.right(id).unwrap();
                    tree.swap_children((mux, true), (mux, false));
                    changed = true;
                }
            }
        }

        // !a ? b : c --> a ? c : b
        if tree.op(id).ty == ExprOpType::Ternary {
            let cond = tree.left(id).unwrap();
            if tree.op(cond).ty == ExprOpType::Not {
                let inner = tree.left(cond).unwrap();
                tree.replace(cond, inner);
                let mux = tree.right(id).unwrap();
                tree.swap_children((mux, true), (mux, false));
                changed = true;
            }
        }

        // !(a < b) --> a >= b
        if tree.op(id).ty == ExprOpType::Not {
            let left = tree.left(id).unwrap();
            if tree.op(left).ty == ExprOpType::Cmp {
                let inverted = match ComparisonType::from_u32(tree.op(left).imm.u()) {
                    ComparisonType::Eq => ComparisonType::Neq,
                    ComparisonType::Lt => ComparisonType::Nlt,
                    ComparisonType::Le => ComparisonType::Nle,
                    ComparisonType::Neq => ComparisonType::Eq,
                    ComparisonType::Nlt => ComparisonType::Lt,
                    ComparisonType::Nle => ComparisonType::Le,
                };
                let mut op = tree.op(left);
                op.imm.set_u(inverted as u32);
                tree.set_op(left, op);
                tree.replace(id, left);
                changed = true;
            }
        }
    });

    changed
}

pub(crate) fn apply_algebraic_cleanup(tree: &mut ExpressionTree) -> bool {
    let mut changed = false;
    let root = tree.root().unwrap();

    // Prune extra terms introduced by the algebraic analysis. These need to
    // run in a later pass to prevent cycles.
    postorder(tree, root, &mut |tree, id| {
        // x + 0 = x    x - 0 = x
        if is_op(tree, id, &ADD_SUB) && is_constant_value(tree, tree.right(id).unwrap(), 0.0) {
            let left = tree.left(id).unwrap();
            tree.replace(id, left);
            changed = true;
        }

        // x * 1 = x    x / 1 = x
        if is_op(tree, id, &MUL_DIV) && is_constant_value(tree, tree.right(id).unwrap(), 1.0) {
            let left = tree.left(id).unwrap();
            tree.replace(id, left);
            changed = true;
        }

        // x ** 1 = x
        if tree.op(id).ty == ExprOpType::Pow
            && is_constant_value(tree, tree.right(id).unwrap(), 1.0)
        {
            let left = tree.left(id).unwrap();
            tree.replace(id, left);
            changed = true;
        }
    });

    changed
}

pub(crate) fn apply_strength_reduction(tree: &mut ExpressionTree) -> bool {
    let mut changed = false;
    let root = tree.root().unwrap();

    postorder(tree, root, &mut |tree, id| {
        if tree.op(id).ty == ExprOpType::Mux {
            return;
        }

        // 0 - x = -x
        if tree.op(id).ty == ExprOpType::Sub
            && is_constant_value(tree, tree.left(id).unwrap(), 0.0)
        {
            let tmp = tree.right(id).unwrap();
            tree.replace_with_leaf(id, ExprOp::new(ExprOpType::Neg));
            tree.set_left(id, Some(tmp));
            changed = true;
        }

        // x * -1 = -x    x / -1 = -x
        if is_op(tree, id, &MUL_DIV) && is_constant_value(tree, tree.right(id).unwrap(), -1.0) {
            let tmp = tree.left(id).unwrap();
            tree.replace_with_leaf(id, ExprOp::new(ExprOpType::Neg));
            tree.set_left(id, Some(tmp));
            changed = true;
        }

        // a + -b = a - b    a - -b = a + b
        if is_op(tree, id, &ADD_SUB) && tree.op(tree.right(id).unwrap()).ty == ExprOpType::Neg {
            let flipped = if tree.op(id).ty == ExprOpType::Add {
                ExprOpType::Sub
            } else {
                ExprOpType::Add
            };
            tree.set_op(id, ExprOp::new(flipped));
            let right = tree.right(id).unwrap();
            let inner = tree.left(right).unwrap();
            tree.replace(right, inner);
            changed = true;
        }

        // -a + b = b - a
        if tree.op(id).ty == ExprOpType::Add
            && tree.op(tree.left(id).unwrap()).ty == ExprOpType::Neg
        {
            tree.set_op(id, ExprOp::new(ExprOpType::Sub));
            let left = tree.left(id).unwrap();
            let inner = tree.left(left).unwrap();
            tree.replace(left, inner);
            tree.swap_children((id, true), (id, false));
        }

        // -(a - b) = b - a
        if tree.op(id).ty == ExprOpType::Neg
            && tree.op(tree.left(id).unwrap()).ty == ExprOpType::Sub
        {
            let left = tree.left(id).unwrap();
            tree.replace(id, left);
            tree.swap_children((id, true), (id, false));
            changed = true;
        }

        // x * 2 = x + x
        if tree.op(id).ty == ExprOpType::Mul
            && is_constant_value(tree, tree.right(id).unwrap(), 2.0)
            && tree.parent(id).map_or(true, |p| tree.op(p).ty != ExprOpType::Add)
        {
            let copy = tree.clone_subtree(tree.left(id).unwrap());
            tree.set_op(id, ExprOp::new(ExprOpType::Add));
            let right = tree.right(id).unwrap();
            tree.replace(right, copy);
            changed = true;
        }

        // x / y = x * (1 / y) for constant y
        if tree.op(id).ty == ExprOpType::Div && is_constant(tree, tree.right(id).unwrap()) {
            tree.set_op(id, ExprOp::new(ExprOpType::Mul));
            let right = tree.right(id).unwrap();
            let mut op = tree.op(right);
            op.imm.set_f(1.0 / op.imm.f());
            tree.set_op(right, op);
            changed = true;
        }

        // (1 / x) * y = y / x
        if tree.op(id).ty == ExprOpType::Mul {
            let left = tree.left(id).unwrap();
            if tree.op(left).ty == ExprOpType::Div
                && is_constant_value(tree, tree.left(left).unwrap(), 1.0)
            {
                tree.set_op(id, ExprOp::new(ExprOpType::Div));
                let denom = tree.right(left).unwrap();
                tree.replace(left, denom);
                tree.swap_children((id, true), (id, false));
                changed = true;
            }
        }

        // x * (1 / y) = x / y
        if tree.op(id).ty == ExprOpType::Mul {
            let right = tree.right(id).unwrap();
            if tree.op(right).ty == ExprOpType::Div
                && is_constant_value(tree, tree.left(right).unwrap(), 1.0)
            {
                tree.set_op(id, ExprOp::new(ExprOpType::Div));
                let denom = tree.right(right).unwrap();
                tree.replace(right, denom);
                changed = true;
            }
        }

        // (a / b) * c = (a * c) / b
        if tree.op(id).ty == ExprOpType::Mul
            && tree.op(tree.left(id).unwrap()).ty == ExprOpType::Div
        {
            tree.set_op(id, ExprOp::new(ExprOpType::Div));
            let left = tree.left(id).unwrap();
            tree.set_op(left, ExprOp::new(ExprOpType::Mul));
            let b = tree.right(left).unwrap();
            let c = tree.right(id).unwrap();
            tree.swap_contents(b, c);
            changed = true;
        }

        // a * (b / c) = (a * b) / c
        if tree.op(id).ty == ExprOpType::Mul
            && tree.op(tree.right(id).unwrap()).ty == ExprOpType::Div
        {
            tree.set_op(id, ExprOp::new(ExprOpType::Div));
            let right = tree.right(id).unwrap();
            tree.set_op(right, ExprOp::new(ExprOpType::Mul));
            tree.swap_children((id, true), (id, false)); // (b * c) / a
            let left = tree.left(id).unwrap();
            let ll = tree.left(left).unwrap();
            let lr = tree.right(left).unwrap();
            tree.swap_contents(ll, lr); // (c * b) / a
            let ll = tree.left(tree.left(id).unwrap()).unwrap();
            let r = tree.right(id).unwrap();
            tree.swap_contents(ll, r); // (a * b) / c
            changed = true;
        }

        // a / (b / c) = (a * c) / b
        if tree.op(id).ty == ExprOpType::Div
            && tree.op(tree.right(id).unwrap()).ty == ExprOpType::Div
        {
            let right = tree.right(id).unwrap();
            tree.set_op(right, ExprOp::new(ExprOpType::Mul)); // a / (b * c)
            tree.swap_children((id, true), (id, false)); // (b * c) / a
            let ll = tree.left(tree.left(id).unwrap()).unwrap();
            let r = tree.right(id).unwrap();
            tree.swap_contents(ll, r); // (a * c) / b
            changed = true;
        }

        // (a / b) / c = a / (b * c)
        if tree.op(id).ty == ExprOpType::Div
            && tree.op(tree.left(id).unwrap()).ty == ExprOpType::Div
        {
            let left = tree.left(id).unwrap();
            tree.set_op(left, ExprOp::new(ExprOpType::Mul)); // (a * b) / c
            tree.swap_children((id, true), (id, false)); // c / (a * b)
            let l = tree.left(id).unwrap();
            let rl = tree.left(tree.right(id).unwrap()).unwrap();
            tree.swap_contents(l, rl); // a / (c * b)
            let right = tree.right(id).unwrap();
            let rl = tree.left(right).unwrap();
            let rr = tree.right(right).unwrap();
            tree.swap_contents(rl, rr); // a / (b * c)
            changed = true;
        }

        // x ** (n / 2) = sqrt(x ** n)    x ** (n / 4) = sqrt(sqrt(x ** n))
        if tree.op(id).ty == ExprOpType::Pow {
            let right = tree.right(id).unwrap();
            if is_constant(tree, right) {
                let e = tree.op(right).imm.f();
                if !is_integer(e) && is_integer(e * 4.0) {
                    let dup = tree.clone_subtree(id);
                    tree.replace_with_leaf(id, ExprOp::new(ExprOpType::Sqrt));
                    tree.set_left(id, Some(dup));
                    let inner_exp = tree.right(dup).unwrap();
                    let mut op = tree.op(inner_exp);
                    op.imm.set_f(op.imm.f() * 2.0);
                    tree.set_op(inner_exp, op);
                    changed = true;
                }
            }
        }

        // x ** -N = 1 / (x ** N)
        if tree.op(id).ty == ExprOpType::Pow {
            let right = tree.right(id).unwrap();
            if is_constant(tree, right) {
                let e = tree.op(right).imm.f();
                if is_integer(e) && e < 0.0 {
                    let dup = tree.clone_subtree(id);
                    tree.replace_with_leaf(id, ExprOp::new(ExprOpType::Div));
                    let one = tree.make_node(ExprOp::constant(1.0));
                    tree.set_left(id, Some(one));
                    tree.set_right(id, Some(dup));
                    let inner_exp = tree.right(dup).unwrap();
                    let mut op = tree.op(inner_exp);
                    op.imm.set_f(-op.imm.f());
                    tree.set_op(inner_exp, op);
                    changed = true;
                }
            }
        }

        // x ** N = x * x * x * ...
        //
        // Required, or else the canonical expressions generated by the
        // algebraic pass will evaluate incorrectly with the inexact pow()
        // used at runtime, e.g. negative bases are unsupported.
        if tree.op(id).ty == ExprOpType::Pow {
            let right = tree.right(id).unwrap();
            if is_constant(tree, right) {
                let e = tree.op(right).imm.f();
                if is_integer(e) && e > 0.0 {
                    let base = tree.left(id).unwrap();
                    let replacement = emit_integer_pow(tree, base, e as i32);
                    tree.replace(id, replacement);
                    changed = true;
                }
            }
        }
    });

    changed
}

pub(crate) fn apply_op_fusion(tree: &mut ExpressionTree) -> bool {
    let mut ref_count: HashMap<i32, usize> = HashMap::new();
    let mut changed = false;

    tree.apply_value_numbering();
    let root = tree.root().unwrap();

    postorder(tree, root, &mut |tree, id| {
        if tree.op(id).ty == ExprOpType::Mux {
            return;
        }
        *ref_count.entry(tree.value_num(id)).or_insert(0) += 1;
    });

    postorder(tree, root, &mut |tree, id| {
        if tree.op(id).ty == ExprOpType::Mux {
            return;
        }

        let can_elide = |tree: &ExpressionTree, node: NodeId, candidate: NodeId| {
            ref_count.get(&tree.value_num(node)).copied().unwrap_or(0) > 1
                || ref_count
                    .get(&tree.value_num(candidate))
                    .copied()
                    .unwrap_or(0)
                    <= 1
        };

        // a + (b * c)    (b * c) + a    a - (b * c)    (b * c) - a
        if tree.op(id).ty == ExprOpType::Add {
            let right = tree.right(id).unwrap();
            if tree.op(right).ty == ExprOpType::Mul && can_elide(tree, id, right) {
                tree.set_op(right, ExprOp::new(ExprOpType::Mux));
                tree.set_op(id, ExprOp::with_u(ExprOpType::Fma, FmaType::Fmadd as u32));
                changed = true;
            }
        }
        if tree.op(id).ty == ExprOpType::Add {
            let left = tree.left(id).unwrap();
            if tree.op(left).ty == ExprOpType::Mul && can_elide(tree, id, left) {
                tree.swap_children((id, true), (id, false));
                let right = tree.right(id).unwrap();
                tree.set_op(right, ExprOp::new(ExprOpType::Mux));
                tree.set_op(id, ExprOp::with_u(ExprOpType::Fma, FmaType::Fmadd as u32));
                changed = true;
            }
        }
        if tree.op(id).ty == ExprOpType::Sub {
            let right = tree.right(id).unwrap();
            if tree.op(right).ty == ExprOpType::Mul && can_elide(tree, id, right) {
                tree.set_op(right, ExprOp::new(ExprOpType::Mux));
                tree.set_op(id, ExprOp::with_u(ExprOpType::Fma, FmaType::Fnmadd as u32));
                changed = true;
            }
        }
        if tree.op(id).ty == ExprOpType::Sub {
            let left = tree.left(id).unwrap();
            if tree.op(left).ty == ExprOpType::Mul && can_elide(tree, id, left) {
                tree.swap_children((id, true), (id, false));
                let right = tree.right(id).unwrap();
                tree.set_op(right, ExprOp::new(ExprOpType::Mux));
                tree.set_op(id, ExprOp::with_u(ExprOpType::Fma, FmaType::Fmsub as u32));
                changed = true;
            }
        }

        // (a + b) * c = (a * c) + b * c for constant b, c
        if tree.op(id).ty == ExprOpType::Mul {
            let left = tree.left(id).unwrap();
            let right = tree.right(id).unwrap();
            if is_op(tree, left, &ADD_SUB)
                && is_constant(tree, right)
                && is_constant(tree, tree.right(left).unwrap())
                && can_elide(tree, id, left)
            {
                let node_op = tree.op(id);
                let left_op = tree.op(left);
                tree.set_op(id, left_op);
                tree.set_op(left, node_op);
                let lr = tree.right(left).unwrap();
                let r = tree.right(id).unwrap();
                tree.swap_contents(r, lr);
                let mut op = tree.op(tree.right(id).unwrap());
                let factor = tree.op(tree.right(tree.left(id).unwrap()).unwrap()).imm.f();
                op.imm.set_f(op.imm.f() * factor);
                tree.set_op(tree.right(id).unwrap(), op);
                changed = true;
            }
        }

        // Negative FMA.
        if tree.op(id).ty == ExprOpType::Neg {
            let left = tree.left(id).unwrap();
            if tree.op(left).ty == ExprOpType::Fma && can_elide(tree, id, left) {
                tree.replace(id, left);
                let mut op = tree.op(id);
                let flipped = match FmaType::from_u32(op.imm.u()) {
                    FmaType::Fmadd => FmaType::Fnmsub,
                    FmaType::Fmsub => FmaType::Fnmadd,
                    FmaType::Fnmadd => FmaType::Fmsub,
                    FmaType::Fnmsub => FmaType::Fmadd,
                };
                op.imm.set_u(flipped as u32);
                tree.set_op(id, op);
                changed = true;
            }
        }
    });

    changed
}
