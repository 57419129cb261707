//! Separable box blur with a running-sum horizontal kernel.
//!
//! The vertical pass transposes the plane, reuses the horizontal kernel and
//! transposes back.

use crate::core::Core;
use crate::filter::{
    ActivationReason, Filter, FilterDependency, FilterMode, FrameData, RequestPattern,
};
use crate::format::SampleType;
use crate::frame::{Frame, FrameContext};
use crate::map::Map;
use crate::node::Node;

use super::{is_8to16_or_float, new_frame_sharing_planes, opt_int, planes_arg};

/// One horizontal blur pass over a single row, integer samples.
/// The accumulator mirrors a `2r+1` wide window with edge clamping.
fn blur_h_int<T>(src: &[T], dst: &mut [T], radius: usize, div: u32, round: u32)
where
    T: Copy + Into<u32> + TryFrom<u32>,
    <T as TryFrom<u32>>::Error: std::fmt::Debug,
{
    let width = src.len();
    let last = width - 1;

    let mut acc: u32 = radius as u32 * src[0].into();
    for x in 0..radius {
        acc += src[x.min(last)].into();
    }

    for x in 0..radius.min(width) {
        acc += src[(x + radius).min(last)].into();
        dst[x] = T::try_from((acc + round) / div).unwrap();
        acc -= src[x.saturating_sub(radius)].into();
    }

    if width > radius {
        for x in radius..width - radius {
            acc += src[x + radius].into();
            dst[x] = T::try_from((acc + round) / div).unwrap();
            acc -= src[x - radius].into();
        }

        for x in (width - radius).max(radius)..width {
            acc += src[(x + radius).min(last)].into();
            dst[x] = T::try_from((acc + round) / div).unwrap();
            acc -= src[x.saturating_sub(radius)].into();
        }
    }
}

fn blur_h_float(src: &[f32], dst: &mut [f32], radius: usize, div: f32) {
    let width = src.len();
    let last = width - 1;

    let mut acc: f32 = radius as f32 * src[0];
    for x in 0..radius {
        acc += src[x.min(last)];
    }

    for x in 0..radius.min(width) {
        acc += src[(x + radius).min(last)];
        dst[x] = acc * div;
        acc -= src[x.saturating_sub(radius)];
    }

    if width > radius {
        for x in radius..width - radius {
            acc += src[x + radius];
            dst[x] = acc * div;
            acc -= src[x - radius];
        }

        for x in (width - radius).max(radius)..width {
            acc += src[(x + radius).min(last)];
            dst[x] = acc * div;
            acc -= src[x.saturating_sub(radius)];
        }
    }
}

/// Radius-1 specialization: a three-tap rolling window without the generic
/// accumulator bookkeeping.
fn blur_h_r1_int<T>(src: &[T], dst: &mut [T], round: u32)
where
    T: Copy + Into<u32> + TryFrom<u32>,
    <T as TryFrom<u32>>::Error: std::fmt::Debug,
{
    let width = src.len();
    if width < 3 {
        let div = 3;
        for x in 0..width {
            let a = src[x.saturating_sub(1)].into();
            let b = src[x].into();
            let c = src[(x + 1).min(width - 1)].into();
            dst[x] = T::try_from((a + b + c + round) / div).unwrap();
        }
        return;
    }

    let mut tmp = [src[0].into(), src[1].into()];
    let mut acc = tmp[0] * 2 + tmp[1];
    dst[0] = T::try_from((acc + round) / 3).unwrap();
    acc -= tmp[0];

    let mut v = src[2].into();
    acc += v;
    dst[1] = T::try_from((acc + round) / 3).unwrap();
    acc -= tmp[0];
    tmp[0] = v;

    let mut x = 2;
    while x < width - 2 {
        v = src[x + 1].into();
        acc += v;
        dst[x] = T::try_from((acc + round) / 3).unwrap();
        acc -= tmp[1];
        tmp[1] = v;

        v = src[x + 2].into();
        acc += v;
        dst[x + 1] = T::try_from((acc + round) / 3).unwrap();
        acc -= tmp[0];
        tmp[0] = v;

        x += 2;
    }

    if width & 1 != 0 {
        acc += tmp[0];
        dst[width - 1] = T::try_from((acc + round) / 3).unwrap();
    } else {
        v = src[width - 1].into();
        acc += v;
        dst[width - 2] = T::try_from((acc + round) / 3).unwrap();
        acc -= tmp[1];

        acc += v;
        dst[width - 1] = T::try_from((acc + round) / 3).unwrap();
    }
}

fn blur_row_int<T>(row: &mut [T], radius: usize, passes: i32)
where
    T: Copy + Into<u32> + TryFrom<u32> + Default,
    <T as TryFrom<u32>>::Error: std::fmt::Debug,
{
    let mut tmp = vec![T::default(); row.len()];
    if radius == 1 {
        for p in 0..passes {
            let round = if p & 1 != 0 { 0 } else { 2 };
            tmp.copy_from_slice(row);
            blur_h_r1_int(&tmp, row, round);
        }
    } else {
        let div = radius as u32 * 2 + 1;
        for p in 0..passes {
            let round = if p & 1 != 0 { 0 } else { div - 1 };
            tmp.copy_from_slice(row);
            blur_h_int(&tmp, row, radius, div, round);
        }
    }
}

fn blur_row_float(row: &mut [f32], radius: usize, passes: i32) {
    let div = 1.0f32 / (radius as f32 * 2.0 + 1.0);
    let mut tmp = vec![0.0f32; row.len()];
    for _ in 0..passes {
        tmp.copy_from_slice(row);
        blur_h_float(&tmp, row, radius, div);
    }
}

pub struct BoxBlur {
    node: Node,
    process: [bool; 3],
    hradius: i32,
    hpasses: i32,
    vradius: i32,
    vpasses: i32,
}

impl BoxBlur {
    /// Arguments: `clip`, `planes`, `hradius`, `hpasses`, `vradius`,
    /// `vpasses`.
    pub fn create(core: &Core, args: &Map) -> Result<Node, String> {
        let err = |e: crate::map::MapError| format!("BoxBlur: {}", e);

        let node = args.get_node("clip").map_err(err)?;
        let vi = node.video_info().ok_or("BoxBlur: clip must be video")?;

        if !is_8to16_or_float(&vi.format) {
            return Err(
                "BoxBlur: clip must be constant format and of integer 8-16 bit type or 32 bit float"
                    .to_owned(),
            );
        }

        let process =
            planes_arg(args, vi.format.num_planes).map_err(|e| format!("BoxBlur: {}", e))?;

        let hradius = opt_int(args, "hradius").map_err(err)?.unwrap_or(1) as i32;
        let hpasses = opt_int(args, "hpasses").map_err(err)?.unwrap_or(1) as i32;
        let vradius = opt_int(args, "vradius").map_err(err)?.unwrap_or(1) as i32;
        let vpasses = opt_int(args, "vpasses").map_err(err)?.unwrap_or(1) as i32;

        if hpasses < 0 || vpasses < 0 {
            return Err("BoxBlur: number of passes can't be negative".to_owned());
        }
        if hradius < 0 || vradius < 0 {
            return Err("BoxBlur: radius can't be negative".to_owned());
        }
        if hradius > 30000 || vradius > 30000 {
            return Err("BoxBlur: radius must be less than 30000".to_owned());
        }

        let hblur = hradius > 0 && hpasses > 0;
        let vblur = vradius > 0 && vpasses > 0;
        if !hblur && !vblur {
            return Err("BoxBlur: nothing to be performed".to_owned());
        }

        let deps = vec![FilterDependency::new(node.clone(), RequestPattern::StrictSpatial)];
        core.create_video_filter("BoxBlur", &vi, FilterMode::Parallel, deps, BoxBlur {
            node,
            process,
            hradius,
            hpasses,
            vradius,
            vpasses,
        })
    }

    fn process_plane<T>(&self, src: &Frame, dst: &mut Frame, plane: i32, float: bool)
    where
        T: Copy + Into<u32> + TryFrom<u32> + Default,
        <T as TryFrom<u32>>::Error: std::fmt::Debug,
    {
        let width = src.get_width(plane) as usize;
        let height = src.get_height(plane) as usize;
        let hblur = self.hradius > 0 && self.hpasses > 0;
        let vblur = self.vradius > 0 && self.vpasses > 0;

        if hblur {
            for y in 0..height as i32 {
                if float {
                    let mut row: Vec<f32> = src.row::<f32>(plane, y).to_vec();
                    blur_row_float(&mut row, self.hradius as usize, self.hpasses);
                    dst.row_mut::<f32>(plane, y).copy_from_slice(&row);
                } else {
                    let mut row: Vec<T> = src.row::<T>(plane, y).to_vec();
                    blur_row_int(&mut row, self.hradius as usize, self.hpasses);
                    dst.row_mut::<T>(plane, y).copy_from_slice(&row);
                }
            }
        } else {
            for y in 0..height as i32 {
                if float {
                    let row = src.row::<f32>(plane, y).to_vec();
                    dst.row_mut::<f32>(plane, y).copy_from_slice(&row);
                } else {
                    let row = src.row::<T>(plane, y).to_vec();
                    dst.row_mut::<T>(plane, y).copy_from_slice(&row);
                }
            }
        }

        if vblur {
            // Transpose, blur horizontally, transpose back.
            if float {
                let mut transposed = vec![0.0f32; width * height];
                for y in 0..height as i32 {
                    for (x, &v) in dst.row::<f32>(plane, y).iter().enumerate() {
                        transposed[x * height + y as usize] = v;
                    }
                }
                for column in transposed.chunks_mut(height) {
                    blur_row_float(column, self.vradius as usize, self.vpasses);
                }
                for y in 0..height as i32 {
                    let row = dst.row_mut::<f32>(plane, y);
                    for (x, slot) in row.iter_mut().enumerate() {
                        *slot = transposed[x * height + y as usize];
                    }
                }
            } else {
                let mut transposed = vec![T::default(); width * height];
                for y in 0..height as i32 {
                    for (x, &v) in dst.row::<T>(plane, y).iter().enumerate() {
                        transposed[x * height + y as usize] = v;
                    }
                }
                for column in transposed.chunks_mut(height) {
                    blur_row_int(column, self.vradius as usize, self.vpasses);
                }
                for y in 0..height as i32 {
                    let row = dst.row_mut::<T>(plane, y);
                    for (x, slot) in row.iter_mut().enumerate() {
                        *slot = transposed[x * height + y as usize];
                    }
                }
            }
        }
    }
}

impl Filter for BoxBlur {
    fn get_frame(
        &self,
        n: i32,
        reason: ActivationReason,
        _frame_data: &mut FrameData,
        ctx: &mut FrameContext,
    ) -> Result<Option<Frame>, String> {
        match reason {
            ActivationReason::Initial => {
                self.node.request_frame_filter(n, ctx);
                Ok(None)
            }
            ActivationReason::AllFramesReady => {
                let src = self
                    .node
                    .get_frame_filter(n, ctx)
                    .ok_or("BoxBlur: upstream frame missing")?;
                let format = src.get_video_format().unwrap();
                let mut dst = new_frame_sharing_planes(&src, &self.process);

                for plane in 0..format.num_planes {
                    if !self.process[plane as usize] {
                        continue;
                    }
                    match (format.sample_type, format.bytes_per_sample) {
                        (SampleType::Integer, 1) => {
                            self.process_plane::<u8>(&src, &mut dst, plane, false)
                        }
                        (SampleType::Integer, _) => {
                            self.process_plane::<u16>(&src, &mut dst, plane, false)
                        }
                        (SampleType::Float, _) => {
                            self.process_plane::<u16>(&src, &mut dst, plane, true)
                        }
                    }
                }

                Ok(Some(dst))
            }
            ActivationReason::Error => Ok(None),
        }
    }
}
