//! Per-pixel arithmetic expressions over up to 26 input clips.
//!
//! Expressions are written in a postfix stack language, parsed into a tree,
//! algebraically optimized, compiled to register bytecode and evaluated
//! either pixel-by-pixel or in batches of eight.

mod bytecode;
mod interp;
mod ops;
mod optimize;
mod parser;
mod tree;
mod vector;

#[cfg(test)]
mod tests;

pub use parser::ExprError;

use crate::core::Core;
use crate::filter::{
    ActivationReason, Filter, FilterDependency, FilterMode, FrameData, RequestPattern,
};
use crate::format::{ColorFamily, SampleType, VideoFormat, VideoInfo};
use crate::frame::{Frame, FrameContext};
use crate::map::Map;
use crate::node::Node;

use self::bytecode::compile;
use self::interp::ExprInterpreter;
use self::ops::ExprInstruction;
use self::parser::parse_expr;
use self::vector::{ExprVectorEvaluator, LANES};

const MAX_EXPR_INPUTS: usize = 26;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PlaneOp {
    Process,
    Copy,
    Undefined,
}

pub struct Expr {
    nodes: Vec<Node>,
    vi: VideoInfo,
    plane_op: [PlaneOp; 3],
    bytecode: [Vec<ExprInstruction>; 3],
}

fn supported_input(format: &VideoFormat) -> bool {
    match format.sample_type {
        SampleType::Integer => format.bits_per_sample <= 16,
        #[cfg(feature = "f16-pixel-type")]
        SampleType::Float => format.bits_per_sample == 16 || format.bits_per_sample == 32,
        #[cfg(not(feature = "f16-pixel-type"))]
        SampleType::Float => format.bits_per_sample == 32,
    }
}

impl Expr {
    /// Arguments: `clips` (1-26 video clips), `expr` (one string per output
    /// plane; missing entries repeat the last; an empty string copies the
    /// plane), optional `format` (packed id overriding sample type and
    /// depth).
    pub fn create(core: &Core, args: &Map) -> Result<Node, String> {
        let err = |e: crate::map::MapError| format!("Expr: {}", e);

        let nodes: Vec<Node> = args.get_node_iter("clips").map_err(err)?.collect();
        if nodes.is_empty() {
            return Err("Expr: at least one clip required".to_owned());
        }
        if nodes.len() > MAX_EXPR_INPUTS {
            return Err("Expr: More than 26 input clips provided".to_owned());
        }

        let mut vi_in = Vec::with_capacity(nodes.len());
        for node in &nodes {
            let vi = node.video_info().ok_or("Expr: clips must be video")?;
            if !vi.is_constant() {
                return Err(
                    "Expr: Only clips with constant format and dimensions allowed".to_owned(),
                );
            }
            vi_in.push(vi);
        }

        let reference = vi_in[0];
        for vi in &vi_in {
            if vi.format.num_planes != reference.format.num_planes
                || vi.format.sub_sampling_w != reference.format.sub_sampling_w
                || vi.format.sub_sampling_h != reference.format.sub_sampling_h
                || vi.width != reference.width
                || vi.height != reference.height
            {
                return Err(
                    "Expr: All inputs must have the same number of planes and the same dimensions, subsampling included"
                        .to_owned(),
                );
            }
            if !supported_input(&vi.format) {
                return Err(
                    "Expr: Input clips must be 8-16 bit integer or 32 bit float format".to_owned(),
                );
            }
        }

        let mut vi = reference;
        if let Some(format_id) = super::opt_int(args, "format").map_err(err)? {
            if let Ok(f) = VideoFormat::from_id(format_id as i32) {
                if f.color_family != ColorFamily::Undefined {
                    if vi.format.num_planes != f.num_planes {
                        return Err(
                            "Expr: The number of planes in the inputs and output must match"
                                .to_owned(),
                        );
                    }
                    vi.format = VideoFormat::query(
                        vi.format.color_family,
                        f.sample_type,
                        f.bits_per_sample,
                        vi.format.sub_sampling_w,
                        vi.format.sub_sampling_h,
                    )
                    .map_err(|e| format!("Expr: {}", e))?;
                }
            }
        }

        let num_planes = vi.format.num_planes as usize;
        let exprs: Vec<String> = match args.get_iter::<String>("expr") {
            Ok(iter) => iter.collect(),
            Err(crate::map::MapError::KeyNotFound) => Vec::new(),
            Err(e) => return Err(err(e)),
        };
        if exprs.len() > num_planes {
            return Err("Expr: More expressions given than there are planes".to_owned());
        }

        let mut plane_exprs = vec![String::new(); 3];
        for (i, e) in exprs.iter().enumerate() {
            plane_exprs[i] = e.clone();
        }
        for i in exprs.len()..3 {
            plane_exprs[i] = exprs.last().cloned().unwrap_or_default();
        }

        let input_formats: Vec<VideoFormat> = vi_in.iter().map(|v| v.format).collect();

        let mut plane_op = [PlaneOp::Undefined; 3];
        let mut code: [Vec<ExprInstruction>; 3] = Default::default();
        for plane in 0..num_planes {
            if !plane_exprs[plane].is_empty() {
                plane_op[plane] = PlaneOp::Process;
            } else if vi.format.bits_per_sample == reference.format.bits_per_sample
                && vi.format.sample_type == reference.format.sample_type
            {
                plane_op[plane] = PlaneOp::Copy;
                continue;
            } else {
                plane_op[plane] = PlaneOp::Undefined;
                continue;
            }

            let mut tree = parse_expr(&plane_exprs[plane], &input_formats)
                .map_err(|e| format!("Expr: {}", e))?;
            code[plane] =
                compile(&mut tree, &vi.format, true).map_err(|e| format!("Expr: {}", e))?;
        }

        let deps = nodes
            .iter()
            .map(|node| {
                let pattern = if vi.num_frames <= node.video_info().unwrap().num_frames {
                    RequestPattern::StrictSpatial
                } else {
                    RequestPattern::General
                };
                FilterDependency::new(node.clone(), pattern)
            })
            .collect();

        core.create_video_filter("Expr", &vi, FilterMode::Parallel, deps, Expr {
            nodes,
            vi,
            plane_op,
            bytecode: code,
        })
    }

    fn process_plane(&self, src: &[Frame], dst: &mut Frame, plane: i32) {
        let program = &self.bytecode[plane as usize];
        let width = dst.get_width(plane) as usize;
        let height = dst.get_height(plane);
        let dst_stride = dst.get_stride(plane) as usize;

        let src_strides: Vec<usize> = src.iter().map(|f| f.get_stride(plane) as usize).collect();
        let src_planes: Vec<Vec<u8>> =
            src.iter().map(|f| f.get_read_slice(plane).to_vec()).collect();

        let dst_data = dst.get_write_slice(plane);

        if width >= LANES {
            let mut evaluator = ExprVectorEvaluator::new(program);
            for y in 0..height as usize {
                let rows: Vec<&[u8]> = src_planes
                    .iter()
                    .zip(&src_strides)
                    .map(|(p, &stride)| &p[y * stride..])
                    .collect();
                evaluator.eval_row(&rows, &mut dst_data[y * dst_stride..], width);
            }
        } else {
            let mut interpreter = ExprInterpreter::new(program);
            for y in 0..height as usize {
                let rows: Vec<&[u8]> = src_planes
                    .iter()
                    .zip(&src_strides)
                    .map(|(p, &stride)| &p[y * stride..])
                    .collect();
                let dst_row = &mut dst_data[y * dst_stride..];
                for x in 0..width {
                    interpreter.eval(&rows, dst_row, x);
                }
            }
        }
    }
}

impl Filter for Expr {
    fn get_frame(
        &self,
        n: i32,
        reason: ActivationReason,
        _frame_data: &mut FrameData,
        ctx: &mut FrameContext,
    ) -> Result<Option<Frame>, String> {
        match reason {
            ActivationReason::Initial => {
                for node in &self.nodes {
                    node.request_frame_filter(n, ctx);
                }
                Ok(None)
            }
            ActivationReason::AllFramesReady => {
                let mut src = Vec::with_capacity(self.nodes.len());
                for node in &self.nodes {
                    src.push(
                        node.get_frame_filter(n, ctx)
                            .ok_or("Expr: upstream frame missing")?,
                    );
                }

                let plane_src: Vec<Option<&Frame>> = (0..3)
                    .map(|p| {
                        if self.plane_op[p] == PlaneOp::Copy {
                            Some(&src[0])
                        } else {
                            None
                        }
                    })
                    .collect();
                let mut dst = Frame::new_video_frame2(
                    &self.vi.format,
                    src[0].get_width(0),
                    src[0].get_height(0),
                    &plane_src,
                    &[0, 1, 2],
                    Some(&src[0]),
                );

                for plane in 0..self.vi.format.num_planes {
                    if self.plane_op[plane as usize] == PlaneOp::Process {
                        self.process_plane(&src, &mut dst, plane);
                    }
                }

                Ok(Some(dst))
            }
            ActivationReason::Error => Ok(None),
        }
    }
}
