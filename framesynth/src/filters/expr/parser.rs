//! Tokenizer and stack-language parser for the expression engine.

use thiserror::Error;

use crate::format::{SampleType, VideoFormat};

use super::ops::{num_operands, ComparisonType, ExprOp, ExprOpType};
use super::tree::{ExpressionTree, NodeId};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExprError {
    #[error("illegal token: {0}")]
    UnknownToken(String),
    #[error("insufficient values on stack: {0}")]
    InsufficientStack(String),
    #[error("reference to undefined clip: {0}")]
    UndefinedClip(String),
    #[error("empty expression")]
    EmptyExpression,
    #[error("unconsumed values on stack")]
    UnconsumedStack,
    #[error("expression compilation did not complete")]
    OptimizationDidNotConverge,
}

pub(crate) fn tokenize(expr: &str) -> Vec<&str> {
    expr.split_whitespace().collect()
}

fn decode_token(token: &str) -> Result<ExprOp, ExprError> {
    use ExprOpType::*;
    match token {
        "+" => return Ok(ExprOp::new(Add)),
        "-" => return Ok(ExprOp::new(Sub)),
        "*" => return Ok(ExprOp::new(Mul)),
        "/" => return Ok(ExprOp::new(Div)),
        "sqrt" => return Ok(ExprOp::new(Sqrt)),
        "abs" => return Ok(ExprOp::new(Abs)),
        "max" => return Ok(ExprOp::new(Max)),
        "min" => return Ok(ExprOp::new(Min)),
        "<" => return Ok(ExprOp::with_u(Cmp, ComparisonType::Lt as u32)),
        ">" => return Ok(ExprOp::with_u(Cmp, ComparisonType::Nle as u32)),
        "=" => return Ok(ExprOp::with_u(Cmp, ComparisonType::Eq as u32)),
        ">=" => return Ok(ExprOp::with_u(Cmp, ComparisonType::Nlt as u32)),
        "<=" => return Ok(ExprOp::with_u(Cmp, ComparisonType::Le as u32)),
        "and" => return Ok(ExprOp::new(And)),
        "or" => return Ok(ExprOp::new(Or)),
        "xor" => return Ok(ExprOp::new(Xor)),
        "not" => return Ok(ExprOp::new(Not)),
        "?" => return Ok(ExprOp::new(Ternary)),
        "exp" => return Ok(ExprOp::new(Exp)),
        "log" => return Ok(ExprOp::new(Log)),
        "pow" => return Ok(ExprOp::new(Pow)),
        "sin" => return Ok(ExprOp::new(Sin)),
        "cos" => return Ok(ExprOp::new(Cos)),
        "dup" => return Ok(ExprOp::with_u(Dup, 0)),
        "swap" => return Ok(ExprOp::with_u(Swap, 1)),
        _ => {}
    }

    let bytes = token.as_bytes();
    if bytes.len() == 1 && bytes[0].is_ascii_lowercase() {
        // x, y, z address the first three clips, a..w the rest.
        let idx = if bytes[0] >= b'x' {
            bytes[0] - b'x'
        } else {
            bytes[0] - b'a' + 3
        };
        return Ok(ExprOp::with_u(MemLoadU8, u32::from(idx)));
    }

    if let Some(rest) = token.strip_prefix("dup") {
        let idx: u32 = rest
            .parse()
            .map_err(|_| ExprError::UnknownToken(token.to_owned()))?;
        return Ok(ExprOp::with_u(Dup, idx));
    }
    if let Some(rest) = token.strip_prefix("swap") {
        let idx: u32 = rest
            .parse()
            .map_err(|_| ExprError::UnknownToken(token.to_owned()))?;
        return Ok(ExprOp::with_u(Swap, idx));
    }

    // Numeric literal; the whole token must parse.
    let f: f32 = token
        .parse()
        .map_err(|_| ExprError::UnknownToken(token.to_owned()))?;
    Ok(ExprOp::constant(f))
}

/// Parses a whitespace-delimited postfix expression into a tree. `vi` lists
/// the input clip formats for load typing; the ternary operator's branches
/// get packaged under a `Mux` meta-node to keep arity at two.
pub(crate) fn parse_expr(
    expr: &str,
    vi: &[VideoFormat],
) -> Result<ExpressionTree, ExprError> {
    let tokens = tokenize(expr);

    let mut tree = ExpressionTree::new();
    let mut stack: Vec<NodeId> = Vec::new();

    for token in tokens {
        let mut op = decode_token(token)?;

        // Check validity.
        if op.ty == ExprOpType::MemLoadU8 && op.imm.u() as usize >= vi.len() {
            return Err(ExprError::UndefinedClip(token.to_owned()));
        }
        if matches!(op.ty, ExprOpType::Dup | ExprOpType::Swap)
            && op.imm.u() as usize >= stack.len()
        {
            return Err(ExprError::InsufficientStack(token.to_owned()));
        }
        if stack.len() < num_operands(op.ty) {
            return Err(ExprError::InsufficientStack(token.to_owned()));
        }

        // Rename load operations with the correct data type.
        if op.ty == ExprOpType::MemLoadU8 {
            let format = &vi[op.imm.u() as usize];
            op.ty = match (format.sample_type, format.bytes_per_sample) {
                (SampleType::Integer, 1) => ExprOpType::MemLoadU8,
                (SampleType::Integer, _) => ExprOpType::MemLoadU16,
                (SampleType::Float, 2) => ExprOpType::MemLoadF16,
                (SampleType::Float, _) => ExprOpType::MemLoadF32,
            };
        }

        // Apply DUP and SWAP in the frontend.
        if op.ty == ExprOpType::Dup {
            let target = stack[stack.len() - 1 - op.imm.u() as usize];
            let copy = tree.clone_subtree(target);
            stack.push(copy);
        } else if op.ty == ExprOpType::Swap {
            let len = stack.len();
            let idx = len - 1 - op.imm.u() as usize;
            stack.swap(len - 1, idx);
        } else {
            match num_operands(op.ty) {
                0 => {
                    let node = tree.make_node(op);
                    stack.push(node);
                }
                1 => {
                    let child = stack.pop().unwrap();
                    let node = tree.make_node(op);
                    tree.set_left(node, Some(child));
                    stack.push(node);
                }
                2 => {
                    let right = stack.pop().unwrap();
                    let left = stack.pop().unwrap();
                    let node = tree.make_node(op);
                    tree.set_left(node, Some(left));
                    tree.set_right(node, Some(right));
                    stack.push(node);
                }
                _ => {
                    let arg3 = stack.pop().unwrap();
                    let arg2 = stack.pop().unwrap();
                    let arg1 = stack.pop().unwrap();

                    let mux = tree.make_node(ExprOp::new(ExprOpType::Mux));
                    tree.set_left(mux, Some(arg2));
                    tree.set_right(mux, Some(arg3));

                    let node = tree.make_node(op);
                    tree.set_left(node, Some(arg1));
                    tree.set_right(node, Some(mux));
                    stack.push(node);
                }
            }
        }
    }

    if stack.is_empty() {
        return Err(ExprError::EmptyExpression);
    }
    if stack.len() > 1 {
        return Err(ExprError::UnconsumedStack);
    }

    tree.set_root(stack.pop());
    Ok(tree)
}
