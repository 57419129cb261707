use crate::format::{ColorFamily, SampleType, VideoFormat};

use super::bytecode::compile;
use super::interp::ExprInterpreter;
use super::parser::{parse_expr, ExprError};
use super::vector::ExprVectorEvaluator;

fn gray8() -> VideoFormat {
    VideoFormat::gray8()
}

fn gray10() -> VideoFormat {
    VideoFormat::query(ColorFamily::Gray, SampleType::Integer, 10, 0, 0).unwrap()
}

/// Compiles `expr` for 8-bit gray inputs/output and evaluates it over the
/// given input rows with the scalar interpreter.
fn run_u8(expr: &str, inputs: &[&[u8]], optimize: bool) -> Vec<u8> {
    let formats = vec![gray8(); inputs.len()];
    let mut tree = parse_expr(expr, &formats).unwrap();
    let code = compile(&mut tree, &gray8(), optimize).unwrap();

    let width = inputs[0].len();
    let mut out = vec![0u8; width];
    let mut interp = ExprInterpreter::new(&code);
    for x in 0..width {
        interp.eval(inputs, &mut out, x);
    }
    out
}

#[test]
fn test_parse_errors() {
    let formats = [gray8()];

    assert!(matches!(
        parse_expr("x +", &formats),
        Err(ExprError::InsufficientStack(_))
    ));
    assert!(matches!(
        parse_expr("x bogus +", &formats),
        Err(ExprError::UnknownToken(_))
    ));
    assert!(matches!(
        parse_expr("", &formats),
        Err(ExprError::EmptyExpression)
    ));
    assert!(matches!(
        parse_expr("x 1", &formats),
        Err(ExprError::UnconsumedStack)
    ));
    assert!(matches!(
        parse_expr("y", &formats),
        Err(ExprError::UndefinedClip(_))
    ));
    assert!(matches!(
        parse_expr("1.5.2", &formats),
        Err(ExprError::UnknownToken(_))
    ));
    assert!(matches!(
        parse_expr("x dup2 +", &formats),
        Err(ExprError::InsufficientStack(_))
    ));
}

#[test]
fn test_identity() {
    let input: Vec<u8> = (0..=255).collect();
    assert_eq!(run_u8("x", &[&input], true), input);
}

#[test]
fn test_saturating_fold() {
    // An all-128 frame doubled saturates to 255.
    let input = vec![128u8; 16];
    assert_eq!(run_u8("x 2 *", &[&input], true), vec![255u8; 16]);

    let input = vec![100u8; 16];
    assert_eq!(run_u8("x 2 *", &[&input], true), vec![200u8; 16]);
}

#[test]
fn test_arithmetic_and_stack_ops() {
    let x = vec![10u8; 4];
    let y = vec![3u8; 4];

    assert_eq!(run_u8("x y -", &[&x, &y], true), vec![7u8; 4]);
    // y - x is negative and saturates to zero.
    assert_eq!(run_u8("x y swap -", &[&x, &y], true), vec![0u8; 4]);
    assert_eq!(run_u8("x dup +", &[&x], true), vec![20u8; 4]);
    assert_eq!(run_u8("x y min", &[&x, &y], true), vec![3u8; 4]);
    assert_eq!(run_u8("x y max", &[&x, &y], true), vec![10u8; 4]);
    assert_eq!(run_u8("x 5 > 255 0 ?", &[&x], true), vec![255u8; 4]);
    assert_eq!(run_u8("x 50 > 255 0 ?", &[&x], true), vec![0u8; 4]);
}

#[test]
fn test_fma_fusion_matches_unfused_operand_orders() {
    // "x y z * +" and "y z * x +" fuse into the same FMA and must produce
    // identical frames for every input value.
    let mut x = Vec::new();
    let mut y = Vec::new();
    let mut z = Vec::new();
    for v in 0..=255u16 {
        x.push((v % 256) as u8);
        y.push(((v * 7) % 256) as u8);
        z.push(((v * 13 + 5) % 256) as u8);
    }

    let a = run_u8("x y z * +", &[&x, &y, &z], true);
    let b = run_u8("y z * x +", &[&x, &y, &z], true);
    assert_eq!(a, b);
}

#[test]
fn test_canonicalization_preserves_integer_output() {
    let mut x = Vec::new();
    let mut y = Vec::new();
    for v in 0..=255u16 {
        x.push((v % 256) as u8);
        y.push(((255 - v) % 256) as u8);
    }

    for expr in [
        "x 2 * 3 +",
        "x y + y -",
        "x x + x +",
        "x y * y x * +",
        "x 1 * 0 +",
        "x y < x y ?",
        "x y > x y ?",
        "x not not",
        "x y < not 255 0 ?",
    ] {
        let optimized = run_u8(expr, &[&x, &y], true);
        let unoptimized = run_u8(expr, &[&x, &y], false);
        assert_eq!(optimized, unoptimized, "mismatch for {:?}", expr);
    }
}

#[test]
fn test_constant_folding() {
    let formats = [gray8()];
    let mut tree = parse_expr("x 2 3 + 4 * 0 + *", &formats).unwrap();
    let code = compile(&mut tree, &gray8(), true).unwrap();

    // x * ((2 + 3) * 4) folds to a single multiply by 20 plus the store:
    // load, constant, mul, store.
    assert!(code.len() <= 4, "expected folded program, got {:?}", code);

    let input = vec![3u8; 8];
    assert_eq!(run_u8("x 2 3 + 4 * 0 + *", &[&input], true), vec![60u8; 8]);
}

#[test]
fn test_optimizer_terminates_on_deep_expression() {
    let formats = [gray8()];
    // A pile of nested sums, products and comparisons.
    let expr = "x 1 + 2 * x 3 - 4 * + x x * x + x / 0.5 pow min x max";
    let mut tree = parse_expr(expr, &formats).unwrap();
    assert!(compile(&mut tree, &gray8(), true).is_ok());
}

#[test]
fn test_store_clamps_to_bit_depth() {
    // 10-bit output saturates to 1023.
    let formats = [gray10()];
    let mut tree = parse_expr("x 4000 +", &formats).unwrap();
    let code = compile(&mut tree, &gray10(), true).unwrap();

    let input: Vec<u8> = [100u16, 900, 1000]
        .iter()
        .flat_map(|v| v.to_ne_bytes())
        .collect();
    let mut out = vec![0u8; 6];
    let mut interp = ExprInterpreter::new(&code);
    for x in 0..3 {
        interp.eval(&[&input], &mut out, x);
    }

    let decoded: Vec<u16> = out
        .chunks(2)
        .map(|c| u16::from_ne_bytes([c[0], c[1]]))
        .collect();
    assert_eq!(decoded, vec![1023, 1023, 1023]);
}

#[test]
fn test_vector_path_matches_scalar() {
    let width = 21;
    let x: Vec<u8> = (0..width as u8).collect();
    let y: Vec<u8> = (0..width as u8).map(|v| v.wrapping_mul(11)).collect();

    for expr in ["x y + 2 /", "x y * 255 /", "x y < x y ?", "x sqrt 16 *"] {
        let formats = vec![gray8(); 2];
        let mut tree = parse_expr(expr, &formats).unwrap();
        let code = compile(&mut tree, &gray8(), true).unwrap();

        let mut scalar_out = vec![0u8; width];
        let mut interp = ExprInterpreter::new(&code);
        for i in 0..width {
            interp.eval(&[&x, &y], &mut scalar_out, i);
        }

        let mut vector_out = vec![0u8; width];
        let mut vector = ExprVectorEvaluator::new(&code);
        vector.eval_row(&[&x, &y], &mut vector_out, width);

        assert_eq!(scalar_out, vector_out, "mismatch for {:?}", expr);
    }
}

#[test]
fn test_register_renaming_bounds_register_count() {
    let formats = [gray8()];
    let mut tree = parse_expr("x 1 + 2 + 3 + 4 + 5 + 6 + 7 + 8 +", &formats).unwrap();
    // Without optimization this is a long chain; renaming keeps the
    // register file small because each intermediate dies immediately.
    let code = compile(&mut tree, &gray8(), false).unwrap();
    let maxreg = code.iter().map(|i| i.dst).max().unwrap();
    assert!(maxreg <= 3, "register file too large: {}", maxreg);
}
