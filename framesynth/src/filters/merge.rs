//! Weighted and mask-driven frame blending.

use crate::core::Core;
use crate::filter::{
    ActivationReason, Filter, FilterDependency, FilterMode, FrameData, RequestPattern,
};
use crate::format::{ColorFamily, SampleType};
use crate::frame::{Frame, FrameContext};
use crate::map::Map;
use crate::node::Node;

use super::{is_8to16_or_float, opt_float_array, opt_int, planes_arg};

const MERGE_SHIFT: u32 = 15;
const MERGE_ROUND: i32 = 1 << (MERGE_SHIFT - 1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PlaneOp {
    /// Take the plane from the first clip unchanged.
    CopyFirst,
    /// Take the plane from the second clip unchanged.
    CopySecond,
    Process,
}

//////////////////////////////////////////
// Merge

pub struct Merge {
    node1: Node,
    node2: Node,
    ops: [PlaneOp; 3],
    /// 15-bit fixed point weights for integer formats.
    weight: [i32; 3],
    fweight: [f32; 3],
}

impl Merge {
    /// Arguments: `clipa`, `clipb`, `weight` (up to one per plane, default
    /// 0.5).
    pub fn create(core: &Core, args: &Map) -> Result<Node, String> {
        let err = |e: crate::map::MapError| format!("Merge: {}", e);

        let weights = opt_float_array(args, "weight").map_err(err)?.unwrap_or_default();
        let mut fweight = [0.5f32; 3];
        match weights.len() {
            0 => {}
            1 => fweight = [weights[0] as f32; 3],
            2 => {
                fweight[0] = weights[0] as f32;
                fweight[1] = weights[1] as f32;
                fweight[2] = weights[1] as f32;
            }
            _ => {
                for (i, &w) in weights.iter().take(3).enumerate() {
                    fweight[i] = w as f32;
                }
            }
        }

        let mut weight = [0i32; 3];
        for i in 0..3 {
            if !(0.0..=1.0).contains(&fweight[i]) {
                return Err("Merge: weights must be between 0 and 1".to_owned());
            }
            weight[i] =
                ((fweight[i] * (1 << MERGE_SHIFT) as f32 + 0.5) as i32).min((1 << MERGE_SHIFT) - 1);
        }

        let node1 = args.get_node("clipa").map_err(err)?;
        let node2 = args.get_node("clipb").map_err(err)?;
        let vi = node1.video_info().ok_or("Merge: clips must be video")?;
        let vi2 = node2.video_info().ok_or("Merge: clips must be video")?;

        if !is_8to16_or_float(&vi.format) {
            return Err(
                "Merge: only 8-16 bit integer and 32 bit float formats supported".to_owned(),
            );
        }
        if vi.format != vi2.format || vi.width != vi2.width || vi.height != vi2.height {
            return Err(
                "Merge: both clips must have the same constant format and dimensions".to_owned(),
            );
        }
        if weights.len() > vi.format.num_planes as usize {
            return Err("Merge: more weights given than the number of planes to merge".to_owned());
        }

        let mut ops = [PlaneOp::Process; 3];
        for i in 0..3 {
            if fweight[i] == 0.0 {
                ops[i] = PlaneOp::CopyFirst;
            } else if fweight[i] == 1.0 {
                ops[i] = PlaneOp::CopySecond;
            }
        }

        let deps = vec![
            FilterDependency::new(node1.clone(), RequestPattern::StrictSpatial),
            FilterDependency::new(node2.clone(), RequestPattern::StrictSpatial),
        ];
        core.create_video_filter("Merge", &vi, FilterMode::Parallel, deps, Merge {
            node1,
            node2,
            ops,
            weight,
            fweight,
        })
    }

    fn merge_plane(&self, src1: &Frame, src2: &Frame, dst: &mut Frame, plane: i32) {
        let format = src1.get_video_format().unwrap();
        let height = src1.get_height(plane);
        let width = src1.get_width(plane) as usize;
        let p = plane as usize;

        for y in 0..height {
            match (format.sample_type, format.bytes_per_sample) {
                (SampleType::Integer, 1) => {
                    let a: Vec<u8> = src1.row::<u8>(plane, y).to_vec();
                    let b: Vec<u8> = src2.row::<u8>(plane, y).to_vec();
                    let out = dst.row_mut::<u8>(plane, y);
                    for x in 0..width {
                        let v1 = i32::from(a[x]);
                        let v2 = i32::from(b[x]);
                        out[x] = (v1
                            + (((v2 - v1) * self.weight[p] + MERGE_ROUND) >> MERGE_SHIFT))
                            as u8;
                    }
                }
                (SampleType::Integer, _) => {
                    let a: Vec<u16> = src1.row::<u16>(plane, y).to_vec();
                    let b: Vec<u16> = src2.row::<u16>(plane, y).to_vec();
                    let out = dst.row_mut::<u16>(plane, y);
                    for x in 0..width {
                        let v1 = i32::from(a[x]);
                        let v2 = i32::from(b[x]);
                        out[x] = (v1
                            + (((v2 - v1) * self.weight[p] + MERGE_ROUND) >> MERGE_SHIFT))
                            as u16;
                    }
                }
                (SampleType::Float, _) => {
                    let a: Vec<f32> = src1.row::<f32>(plane, y).to_vec();
                    let b: Vec<f32> = src2.row::<f32>(plane, y).to_vec();
                    let out = dst.row_mut::<f32>(plane, y);
                    for x in 0..width {
                        out[x] = a[x] + (b[x] - a[x]) * self.fweight[p];
                    }
                }
            }
        }
    }
}

impl Filter for Merge {
    fn get_frame(
        &self,
        n: i32,
        reason: ActivationReason,
        _frame_data: &mut FrameData,
        ctx: &mut FrameContext,
    ) -> Result<Option<Frame>, String> {
        match reason {
            ActivationReason::Initial => {
                self.node1.request_frame_filter(n, ctx);
                self.node2.request_frame_filter(n, ctx);
                Ok(None)
            }
            ActivationReason::AllFramesReady => {
                let src1 = self
                    .node1
                    .get_frame_filter(n, ctx)
                    .ok_or("Merge: upstream frame missing")?;
                let src2 = self
                    .node2
                    .get_frame_filter(n, ctx)
                    .ok_or("Merge: upstream frame missing")?;

                let format = src1.get_video_format().unwrap();
                let plane_src: Vec<Option<&Frame>> = self
                    .ops
                    .iter()
                    .map(|op| match op {
                        PlaneOp::CopyFirst => Some(&src1),
                        PlaneOp::CopySecond => Some(&src2),
                        PlaneOp::Process => None,
                    })
                    .collect();
                let mut dst = Frame::new_video_frame2(
                    &format,
                    src1.get_width(0),
                    src1.get_height(0),
                    &plane_src,
                    &[0, 1, 2],
                    Some(&src1),
                );

                for plane in 0..format.num_planes {
                    if self.ops[plane as usize] == PlaneOp::Process {
                        self.merge_plane(&src1, &src2, &mut dst, plane);
                    }
                }
                Ok(Some(dst))
            }
            ActivationReason::Error => Ok(None),
        }
    }
}

//////////////////////////////////////////
// MaskedMerge

pub struct MaskedMerge {
    node1: Node,
    node2: Node,
    mask: Node,
    process: [bool; 3],
    first_plane: bool,
}

impl MaskedMerge {
    /// Arguments: `clipa`, `clipb`, `mask`, `planes`, `first_plane`.
    pub fn create(core: &Core, args: &Map) -> Result<Node, String> {
        let err = |e: crate::map::MapError| format!("MaskedMerge: {}", e);

        let node1 = args.get_node("clipa").map_err(err)?;
        let node2 = args.get_node("clipb").map_err(err)?;
        let mask = args.get_node("mask").map_err(err)?;

        let vi = node1
            .video_info()
            .ok_or("MaskedMerge: clips must be video")?;
        let vi2 = node2
            .video_info()
            .ok_or("MaskedMerge: clips must be video")?;
        let mvi = mask
            .video_info()
            .ok_or("MaskedMerge: mask must be video")?;

        if !is_8to16_or_float(&vi.format) {
            return Err(
                "MaskedMerge: only 8-16 bit integer and 32 bit float formats supported".to_owned(),
            );
        }
        if vi.format != vi2.format || vi.width != vi2.width || vi.height != vi2.height {
            return Err(
                "MaskedMerge: both clips must have the same constant format and dimensions"
                    .to_owned(),
            );
        }

        let gray_mask = mvi.format.color_family == ColorFamily::Gray;
        let compatible = mvi.width == vi.width
            && mvi.height == vi.height
            && mvi.format.sample_type == vi.format.sample_type
            && mvi.format.bits_per_sample == vi.format.bits_per_sample
            && (gray_mask || mvi.format == vi.format);
        if !compatible {
            return Err(
                "MaskedMerge: mask must be the same dimensions and depth as the clips, and either gray or the same format"
                    .to_owned(),
            );
        }

        let mut first_plane = opt_int(args, "first_plane").map_err(err)?.unwrap_or(0) != 0;
        if gray_mask {
            first_plane = true;
        }

        let process =
            planes_arg(args, vi.format.num_planes).map_err(|e| format!("MaskedMerge: {}", e))?;

        let deps = vec![
            FilterDependency::new(node1.clone(), RequestPattern::StrictSpatial),
            FilterDependency::new(node2.clone(), RequestPattern::StrictSpatial),
            FilterDependency::new(mask.clone(), RequestPattern::StrictSpatial),
        ];
        core.create_video_filter("MaskedMerge", &vi, FilterMode::Parallel, deps, MaskedMerge {
            node1,
            node2,
            mask,
            process,
            first_plane,
        })
    }

    /// Mask samples for one output plane, downsampled from the first mask
    /// plane by block averaging when the target plane is subsampled.
    fn mask_values_int<T: Copy + Into<i32>>(
        mask: &Frame,
        mask_plane: i32,
        width: i32,
        height: i32,
        y: i32,
    ) -> Vec<i32> {
        let mw = mask.get_width(mask_plane);
        let mh = mask.get_height(mask_plane);
        if mw == width && mh == height {
            return mask
                .row::<T>(mask_plane, y)
                .iter()
                .map(|&v| v.into())
                .collect();
        }

        let sx = (mw / width).max(1);
        let sy = (mh / height).max(1);
        let mut out = Vec::with_capacity(width as usize);
        for x in 0..width {
            let mut acc = 0i32;
            for dy in 0..sy {
                let row = mask.row::<T>(mask_plane, (y * sy + dy).min(mh - 1));
                for dx in 0..sx {
                    acc += row[((x * sx + dx).min(mw - 1)) as usize].into();
                }
            }
            out.push((acc + sx * sy / 2) / (sx * sy));
        }
        out
    }

    fn mask_values_float(
        mask: &Frame,
        mask_plane: i32,
        width: i32,
        height: i32,
        y: i32,
    ) -> Vec<f32> {
        let mw = mask.get_width(mask_plane);
        let mh = mask.get_height(mask_plane);
        if mw == width && mh == height {
            return mask.row::<f32>(mask_plane, y).to_vec();
        }

        let sx = (mw / width).max(1);
        let sy = (mh / height).max(1);
        let mut out = Vec::with_capacity(width as usize);
        for x in 0..width {
            let mut acc = 0.0f32;
            for dy in 0..sy {
                let row = mask.row::<f32>(mask_plane, (y * sy + dy).min(mh - 1));
                for dx in 0..sx {
                    acc += row[((x * sx + dx).min(mw - 1)) as usize];
                }
            }
            out.push(acc / (sx * sy) as f32);
        }
        out
    }

    fn merge_plane(&self, src1: &Frame, src2: &Frame, mask: &Frame, dst: &mut Frame, plane: i32) {
        let format = src1.get_video_format().unwrap();
        let width = src1.get_width(plane);
        let height = src1.get_height(plane);
        let mask_plane = if self.first_plane { 0 } else { plane };
        let maxval = (1i64 << format.bits_per_sample) - 1;

        for y in 0..height {
            match (format.sample_type, format.bytes_per_sample) {
                (SampleType::Integer, 1) => {
                    let m = Self::mask_values_int::<u8>(mask, mask_plane, width, height, y);
                    let a: Vec<u8> = src1.row::<u8>(plane, y).to_vec();
                    let b: Vec<u8> = src2.row::<u8>(plane, y).to_vec();
                    let out = dst.row_mut::<u8>(plane, y);
                    for x in 0..width as usize {
                        let v1 = i64::from(a[x]);
                        let diff = i64::from(b[x]) - v1;
                        let blended =
                            v1 + (diff as f64 * m[x] as f64 / maxval as f64).round() as i64;
                        out[x] = blended as u8;
                    }
                }
                (SampleType::Integer, _) => {
                    let m = Self::mask_values_int::<u16>(mask, mask_plane, width, height, y);
                    let a: Vec<u16> = src1.row::<u16>(plane, y).to_vec();
                    let b: Vec<u16> = src2.row::<u16>(plane, y).to_vec();
                    let out = dst.row_mut::<u16>(plane, y);
                    for x in 0..width as usize {
                        let v1 = i64::from(a[x]);
                        let diff = i64::from(b[x]) - v1;
                        let blended =
                            v1 + (diff as f64 * m[x] as f64 / maxval as f64).round() as i64;
                        out[x] = blended as u16;
                    }
                }
                (SampleType::Float, _) => {
                    let m = Self::mask_values_float(mask, mask_plane, width, height, y);
                    let a: Vec<f32> = src1.row::<f32>(plane, y).to_vec();
                    let b: Vec<f32> = src2.row::<f32>(plane, y).to_vec();
                    let out = dst.row_mut::<f32>(plane, y);
                    for x in 0..width as usize {
                        out[x] = a[x] + (b[x] - a[x]) * m[x];
                    }
                }
            }
        }
    }
}

impl Filter for MaskedMerge {
    fn get_frame(
        &self,
        n: i32,
        reason: ActivationReason,
        _frame_data: &mut FrameData,
        ctx: &mut FrameContext,
    ) -> Result<Option<Frame>, String> {
        match reason {
            ActivationReason::Initial => {
                self.node1.request_frame_filter(n, ctx);
                self.node2.request_frame_filter(n, ctx);
                self.mask.request_frame_filter(n, ctx);
                Ok(None)
            }
            ActivationReason::AllFramesReady => {
                let src1 = self
                    .node1
                    .get_frame_filter(n, ctx)
                    .ok_or("MaskedMerge: upstream frame missing")?;
                let src2 = self
                    .node2
                    .get_frame_filter(n, ctx)
                    .ok_or("MaskedMerge: upstream frame missing")?;
                let mask = self
                    .mask
                    .get_frame_filter(n, ctx)
                    .ok_or("MaskedMerge: upstream frame missing")?;

                let format = src1.get_video_format().unwrap();
                let mut dst = super::new_frame_sharing_planes(&src1, &self.process);

                for plane in 0..format.num_planes {
                    if self.process[plane as usize] {
                        self.merge_plane(&src1, &src2, &mask, &mut dst, plane);
                    }
                }
                Ok(Some(dst))
            }
            ActivationReason::Error => Ok(None),
        }
    }
}
