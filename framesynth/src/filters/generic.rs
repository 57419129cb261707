//! Neighborhood kernels: Convolution, Minimum, Maximum, Median, Deflate,
//! Inflate, Prewitt and Sobel.
//!
//! All of them are pure per-plane transforms over a clamped-edge
//! neighborhood; out-of-bounds taps reuse the nearest in-bounds pixel.

use crate::core::Core;
use crate::filter::{
    ActivationReason, Filter, FilterDependency, FilterMode, FrameData, RequestPattern,
};
use crate::format::{ColorFamily, SampleType, VideoFormat};
use crate::frame::{Frame, FrameContext};
use crate::map::Map;
use crate::node::Node;

use super::{is_8to16_or_float, new_frame_sharing_planes, opt_float, opt_int, opt_int_array, planes_arg};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GenericOp {
    Prewitt,
    Sobel,
    Minimum,
    Maximum,
    Median,
    Deflate,
    Inflate,
    Convolution,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConvolutionType {
    Square,
    Horizontal,
    Vertical,
}

struct GenericParams {
    // Prewitt, Sobel
    scale: f32,

    // Minimum, Maximum, Deflate, Inflate
    th: u16,
    thf: f32,

    // Minimum, Maximum: stencil over the eight neighbors
    stencil: u8,

    // Convolution
    convolution_type: ConvolutionType,
    matrix: Vec<i32>,
    matrixf: Vec<f32>,
    rdiv: f32,
    bias: f32,
    saturate: bool,
}

impl Default for GenericParams {
    fn default() -> Self {
        Self {
            scale: 1.0,
            th: u16::MAX,
            thf: f32::MAX,
            stencil: 0xFF,
            convolution_type: ConvolutionType::Square,
            matrix: Vec::new(),
            matrixf: Vec::new(),
            rdiv: 1.0,
            bias: 0.0,
            saturate: true,
        }
    }
}

pub struct Generic {
    node: Node,
    name: &'static str,
    op: GenericOp,
    process: [bool; 3],
    params: GenericParams,
}

fn float_to_i64_saturated(f: f64) -> i64 {
    if f > i64::MAX as f64 {
        i64::MAX
    } else if f < i64::MIN as f64 {
        i64::MIN
    } else {
        f.round() as i64
    }
}

fn create_generic(
    core: &Core,
    args: &Map,
    op: GenericOp,
    name: &'static str,
) -> Result<Node, String> {
    let err = |e: crate::map::MapError| format!("{}: {}", name, e);
    let fail = |msg: &str| format!("{}: {}", name, msg);

    let node = args.get_node("clip").map_err(err)?;
    let vi = node
        .video_info()
        .ok_or_else(|| fail("clip must be video"))?;

    if !is_8to16_or_float(&vi.format) {
        return Err(fail(
            "Clip must be constant format and of integer 8-16 bit type or 32 bit float.",
        ));
    }

    let min_plane = vi.format.num_planes - 1;
    if vi.format.plane_width(vi.width, min_plane) < 4
        || vi.format.plane_height(vi.height, min_plane) < 4
    {
        return Err(fail(
            "Cannot process frames with subsampled planes smaller than 4x4.",
        ));
    }

    let process = planes_arg(args, vi.format.num_planes).map_err(|e| fail(&e))?;

    let mut params = GenericParams::default();

    if matches!(
        op,
        GenericOp::Minimum | GenericOp::Maximum | GenericOp::Deflate | GenericOp::Inflate
    ) {
        match opt_float(args, "threshold").map_err(err)? {
            None => {
                params.th = ((1u32 << vi.format.bits_per_sample) - 1).min(u16::MAX as u32) as u16;
                params.thf = f32::MAX;
            }
            Some(threshold) => {
                params.thf = threshold as f32;
                if vi.format.sample_type == SampleType::Integer {
                    let ith = float_to_i64_saturated(threshold);
                    if ith < 0 || ith > i64::from((1u32 << vi.format.bits_per_sample) - 1) {
                        return Err(fail("threshold bigger than sample value."));
                    }
                    params.th = ith as u16;
                } else if params.thf < 0.0 {
                    return Err(fail("threshold must be a positive value."));
                }
            }
        }
    }

    if matches!(op, GenericOp::Minimum | GenericOp::Maximum) {
        match opt_int_array(args, "coordinates").map_err(err)? {
            None => params.stencil = 0xFF,
            Some(enable) => {
                if enable.len() != 8 {
                    return Err(fail("coordinates must contain exactly 8 numbers."));
                }
                params.stencil = 0;
                for (i, &e) in enable.iter().enumerate() {
                    if e != 0 {
                        params.stencil |= 1 << i;
                    }
                }
            }
        }
    }

    if matches!(op, GenericOp::Prewitt | GenericOp::Sobel) {
        params.scale = opt_float(args, "scale").map_err(err)?.unwrap_or(1.0) as f32;
        if params.scale < 0.0 {
            return Err(fail("scale must not be negative."));
        }
    }

    if op == GenericOp::Convolution {
        params.bias = opt_float(args, "bias").map_err(err)?.unwrap_or(0.0) as f32;
        params.saturate = opt_int(args, "saturate").map_err(err)?.unwrap_or(1) != 0;

        let matrix = args.get_float_array("matrix").map_err(err)?;
        let mode = match args.get_string("mode") {
            Ok(mode) => mode,
            Err(crate::map::MapError::KeyNotFound) => "s".to_owned(),
            Err(e) => return Err(err(e)),
        };

        match mode.as_bytes().first() {
            Some(b's') => {
                params.convolution_type = ConvolutionType::Square;
                if matrix.len() != 9 && matrix.len() != 25 {
                    return Err(fail(
                        "When mode starts with 's', matrix must contain exactly 9 or exactly 25 numbers.",
                    ));
                }
            }
            Some(b'h') | Some(b'v') => {
                params.convolution_type = if mode.starts_with('h') {
                    ConvolutionType::Horizontal
                } else {
                    ConvolutionType::Vertical
                };
                if matrix.len() < 3 || matrix.len() > 25 {
                    return Err(fail(
                        "When mode starts with 'h' or 'v', matrix must contain between 3 and 25 numbers.",
                    ));
                }
                if matrix.len() % 2 == 0 {
                    return Err(fail("matrix must contain an odd number of numbers."));
                }
            }
            _ => return Err(fail("mode must start with 's', 'h', or 'v'.")),
        }

        let mut matrix_sumf = 0.0f32;
        for &m in &matrix {
            let rounded = m.round() as i32;
            if vi.format.sample_type == SampleType::Integer {
                if rounded.abs() > 1023 {
                    return Err(fail("coefficients may only be between -1023 and 1023"));
                }
                params.matrix.push(rounded);
                params.matrixf.push(rounded as f32);
            } else {
                params.matrix.push(rounded);
                params.matrixf.push(m as f32);
            }
            matrix_sumf += *params.matrixf.last().unwrap();
        }

        if matrix_sumf.abs() < f32::EPSILON {
            matrix_sumf = 1.0;
        }

        let mut rdiv = opt_float(args, "divisor").map_err(err)?.unwrap_or(0.0) as f32;
        if rdiv == 0.0 {
            rdiv = matrix_sumf;
        }
        params.rdiv = 1.0 / rdiv;

        // A three-tap strip is just a 3x3 matrix with zero rows.
        if params.convolution_type == ConvolutionType::Horizontal && params.matrix.len() == 3 {
            params.convolution_type = ConvolutionType::Square;
            let m = params.matrix.clone();
            let mf = params.matrixf.clone();
            params.matrix = vec![0, 0, 0, m[0], m[1], m[2], 0, 0, 0];
            params.matrixf = vec![0.0, 0.0, 0.0, mf[0], mf[1], mf[2], 0.0, 0.0, 0.0];
        } else if params.convolution_type == ConvolutionType::Vertical && params.matrix.len() == 3 {
            params.convolution_type = ConvolutionType::Square;
            let m = params.matrix.clone();
            let mf = params.matrixf.clone();
            params.matrix = vec![0, m[0], 0, 0, m[1], 0, 0, m[2], 0];
            params.matrixf = vec![0.0, mf[0], 0.0, 0.0, mf[1], 0.0, 0.0, mf[2], 0.0];
        }

        if params.convolution_type == ConvolutionType::Horizontal
            && params.matrix.len() as i32 / 2 >= vi.format.plane_width(vi.width, min_plane)
        {
            return Err(fail("Width must be bigger than convolution radius."));
        }
        if params.convolution_type == ConvolutionType::Vertical
            && params.matrix.len() as i32 / 2 >= vi.format.plane_height(vi.height, min_plane)
        {
            return Err(fail("Height must be bigger than convolution radius."));
        }
    }

    let deps = vec![FilterDependency::new(node.clone(), RequestPattern::StrictSpatial)];
    core.create_video_filter(name, &vi, FilterMode::Parallel, deps, Generic {
        node,
        name,
        op,
        process,
        params,
    })
}

/// Arguments: `clip`, `planes`, `matrix`, `bias`, `divisor`, `mode`,
/// `saturate`.
pub fn convolution(core: &Core, args: &Map) -> Result<Node, String> {
    create_generic(core, args, GenericOp::Convolution, "Convolution")
}

/// Arguments: `clip`, `planes`, `threshold`, `coordinates`.
pub fn minimum(core: &Core, args: &Map) -> Result<Node, String> {
    create_generic(core, args, GenericOp::Minimum, "Minimum")
}

/// Arguments: `clip`, `planes`, `threshold`, `coordinates`.
pub fn maximum(core: &Core, args: &Map) -> Result<Node, String> {
    create_generic(core, args, GenericOp::Maximum, "Maximum")
}

/// Arguments: `clip`, `planes`.
pub fn median(core: &Core, args: &Map) -> Result<Node, String> {
    create_generic(core, args, GenericOp::Median, "Median")
}

/// Arguments: `clip`, `planes`, `threshold`.
pub fn deflate(core: &Core, args: &Map) -> Result<Node, String> {
    create_generic(core, args, GenericOp::Deflate, "Deflate")
}

/// Arguments: `clip`, `planes`, `threshold`.
pub fn inflate(core: &Core, args: &Map) -> Result<Node, String> {
    create_generic(core, args, GenericOp::Inflate, "Inflate")
}

/// Arguments: `clip`, `planes`, `scale`.
pub fn prewitt(core: &Core, args: &Map) -> Result<Node, String> {
    create_generic(core, args, GenericOp::Prewitt, "Prewitt")
}

/// Arguments: `clip`, `planes`, `scale`.
pub fn sobel(core: &Core, args: &Map) -> Result<Node, String> {
    create_generic(core, args, GenericOp::Sobel, "Sobel")
}

#[inline]
fn clamp_x<T: Copy>(row: &[T], x: i32) -> T {
    row[x.clamp(0, row.len() as i32 - 1) as usize]
}

impl Generic {
    /// The eight neighbors in stencil order: top-left, top, top-right, left,
    /// right, bottom-left, bottom, bottom-right.
    fn neighborhood<T: Copy>(rows: (&[T], &[T], &[T]), x: i32) -> [T; 8] {
        let (above, cur, below) = rows;
        [
            clamp_x(above, x - 1),
            clamp_x(above, x),
            clamp_x(above, x + 1),
            clamp_x(cur, x - 1),
            clamp_x(cur, x + 1),
            clamp_x(below, x - 1),
            clamp_x(below, x),
            clamp_x(below, x + 1),
        ]
    }

    fn pixel_int(&self, center: i32, nb: [i32; 8], maxval: i32) -> i32 {
        let p = &self.params;
        match self.op {
            GenericOp::Minimum => {
                let mut m = center;
                for (i, &v) in nb.iter().enumerate() {
                    if p.stencil & (1 << i) != 0 {
                        m = m.min(v);
                    }
                }
                m.max(center - i32::from(p.th))
            }
            GenericOp::Maximum => {
                let mut m = center;
                for (i, &v) in nb.iter().enumerate() {
                    if p.stencil & (1 << i) != 0 {
                        m = m.max(v);
                    }
                }
                m.min(center + i32::from(p.th)).min(maxval)
            }
            GenericOp::Median => {
                let mut values = [
                    nb[0], nb[1], nb[2], nb[3], center, nb[4], nb[5], nb[6], nb[7],
                ];
                values.sort_unstable();
                values[4]
            }
            GenericOp::Deflate => {
                let sum: i32 = nb.iter().sum();
                let avg = (sum + 4) >> 3;
                avg.min(center).max(center - i32::from(p.th))
            }
            GenericOp::Inflate => {
                let sum: i32 = nb.iter().sum();
                let avg = (sum + 4) >> 3;
                avg.max(center).min(center + i32::from(p.th)).min(maxval)
            }
            GenericOp::Prewitt | GenericOp::Sobel => {
                let (gx, gy) = self.gradients(center as f32, nb.map(|v| v as f32));
                let val = (gx * gx + gy * gy).sqrt() * p.scale;
                (val.round() as i32).clamp(0, maxval)
            }
            GenericOp::Convolution => {
                let m = &p.matrix;
                let tmp = m[0] * nb[0]
                    + m[1] * nb[1]
                    + m[2] * nb[2]
                    + m[3] * nb[3]
                    + m[4] * center
                    + m[5] * nb[4]
                    + m[6] * nb[5]
                    + m[7] * nb[6]
                    + m[8] * nb[7];
                let mut val = tmp as f32 * p.rdiv + p.bias;
                if !p.saturate {
                    val = val.abs();
                }
                (val.round() as i32).clamp(0, maxval)
            }
        }
    }

    fn pixel_float(&self, center: f32, nb: [f32; 8]) -> f32 {
        let p = &self.params;
        match self.op {
            GenericOp::Minimum => {
                let mut m = center;
                for (i, &v) in nb.iter().enumerate() {
                    if p.stencil & (1 << i) != 0 {
                        m = m.min(v);
                    }
                }
                m.max(center - p.thf)
            }
            GenericOp::Maximum => {
                let mut m = center;
                for (i, &v) in nb.iter().enumerate() {
                    if p.stencil & (1 << i) != 0 {
                        m = m.max(v);
                    }
                }
                m.min(center + p.thf)
            }
            GenericOp::Median => {
                let mut values = [
                    nb[0], nb[1], nb[2], nb[3], center, nb[4], nb[5], nb[6], nb[7],
                ];
                values.sort_unstable_by(|a, b| a.partial_cmp(b).unwrap());
                values[4]
            }
            GenericOp::Deflate => {
                let avg = nb.iter().sum::<f32>() / 8.0;
                avg.min(center).max(center - p.thf)
            }
            GenericOp::Inflate => {
                let avg = nb.iter().sum::<f32>() / 8.0;
                avg.max(center).min(center + p.thf)
            }
            GenericOp::Prewitt | GenericOp::Sobel => {
                let (gx, gy) = self.gradients(center, nb);
                (gx * gx + gy * gy).sqrt() * p.scale
            }
            GenericOp::Convolution => {
                let m = &p.matrixf;
                let tmp = m[0] * nb[0]
                    + m[1] * nb[1]
                    + m[2] * nb[2]
                    + m[3] * nb[3]
                    + m[4] * center
                    + m[5] * nb[4]
                    + m[6] * nb[5]
                    + m[7] * nb[6]
                    + m[8] * nb[7];
                let mut val = tmp * p.rdiv + p.bias;
                if !p.saturate {
                    val = val.abs();
                }
                val
            }
        }
    }

    fn gradients(&self, _center: f32, nb: [f32; 8]) -> (f32, f32) {
        match self.op {
            GenericOp::Prewitt => (
                nb[2] + nb[4] + nb[7] - nb[0] - nb[3] - nb[5],
                nb[5] + nb[6] + nb[7] - nb[0] - nb[1] - nb[2],
            ),
            _ => (
                nb[2] + 2.0 * nb[4] + nb[7] - nb[0] - 2.0 * nb[3] - nb[5],
                nb[5] + 2.0 * nb[6] + nb[7] - nb[0] - 2.0 * nb[1] - nb[2],
            ),
        }
    }

    fn process_plane_3x3_int<T>(&self, src: &Frame, dst: &mut Frame, plane: i32, maxval: i32)
    where
        T: Copy + Into<i32> + TryFrom<i32>,
        <T as TryFrom<i32>>::Error: std::fmt::Debug,
    {
        let width = src.get_width(plane);
        let height = src.get_height(plane);
        for y in 0..height {
            let above: Vec<T> = src.row::<T>(plane, (y - 1).max(0)).to_vec();
            let cur: Vec<T> = src.row::<T>(plane, y).to_vec();
            let below: Vec<T> = src.row::<T>(plane, (y + 1).min(height - 1)).to_vec();
            let out = dst.row_mut::<T>(plane, y);
            for x in 0..width {
                let nb = Generic::neighborhood((&above[..], &cur[..], &below[..]), x)
                    .map(|v: T| v.into());
                let center = cur[x as usize].into();
                out[x as usize] = T::try_from(self.pixel_int(center, nb, maxval)).unwrap();
            }
        }
    }

    fn process_plane_3x3_float(&self, src: &Frame, dst: &mut Frame, plane: i32) {
        let width = src.get_width(plane);
        let height = src.get_height(plane);
        for y in 0..height {
            let above: Vec<f32> = src.row::<f32>(plane, (y - 1).max(0)).to_vec();
            let cur: Vec<f32> = src.row::<f32>(plane, y).to_vec();
            let below: Vec<f32> = src.row::<f32>(plane, (y + 1).min(height - 1)).to_vec();
            let out = dst.row_mut::<f32>(plane, y);
            for x in 0..width {
                let nb = Generic::neighborhood((&above[..], &cur[..], &below[..]), x);
                out[x as usize] = self.pixel_float(cur[x as usize], nb);
            }
        }
    }

    fn conv_finish_int(&self, tmp: i64, maxval: i32) -> i32 {
        let mut val = tmp as f32 * self.params.rdiv + self.params.bias;
        if !self.params.saturate {
            val = val.abs();
        }
        (val.round() as i32).clamp(0, maxval)
    }

    fn conv_finish_float(&self, tmp: f32) -> f32 {
        let mut val = tmp * self.params.rdiv + self.params.bias;
        if !self.params.saturate {
            val = val.abs();
        }
        val
    }

    fn process_plane_conv5x5_int<T>(&self, src: &Frame, dst: &mut Frame, plane: i32, maxval: i32)
    where
        T: Copy + Into<i32> + TryFrom<i32>,
        <T as TryFrom<i32>>::Error: std::fmt::Debug,
    {
        let width = src.get_width(plane);
        let height = src.get_height(plane);
        let rows: Vec<Vec<T>> = (0..height).map(|y| src.row::<T>(plane, y).to_vec()).collect();
        for y in 0..height {
            let out = dst.row_mut::<T>(plane, y);
            for x in 0..width {
                let mut tmp = 0i64;
                for dy in -2i32..=2 {
                    let row = &rows[(y + dy).clamp(0, height - 1) as usize];
                    for dx in -2i32..=2 {
                        let m = self.params.matrix[((dy + 2) * 5 + dx + 2) as usize];
                        let v: i32 = clamp_x(row, x + dx).into();
                        tmp += i64::from(m) * i64::from(v);
                    }
                }
                out[x as usize] = T::try_from(self.conv_finish_int(tmp, maxval)).unwrap();
            }
        }
    }

    fn process_plane_conv5x5_float(&self, src: &Frame, dst: &mut Frame, plane: i32) {
        let width = src.get_width(plane);
        let height = src.get_height(plane);
        let rows: Vec<Vec<f32>> = (0..height)
            .map(|y| src.row::<f32>(plane, y).to_vec())
            .collect();
        for y in 0..height {
            let out = dst.row_mut::<f32>(plane, y);
            for x in 0..width {
                let mut tmp = 0.0f32;
                for dy in -2i32..=2 {
                    let row = &rows[(y + dy).clamp(0, height - 1) as usize];
                    for dx in -2i32..=2 {
                        let m = self.params.matrixf[((dy + 2) * 5 + dx + 2) as usize];
                        tmp += m * clamp_x(row, x + dx);
                    }
                }
                out[x as usize] = self.conv_finish_float(tmp);
            }
        }
    }

    fn process_plane_conv_strip_int<T>(
        &self,
        src: &Frame,
        dst: &mut Frame,
        plane: i32,
        maxval: i32,
        horizontal: bool,
    ) where
        T: Copy + Into<i32> + TryFrom<i32>,
        <T as TryFrom<i32>>::Error: std::fmt::Debug,
    {
        let width = src.get_width(plane);
        let height = src.get_height(plane);
        let radius = self.params.matrix.len() as i32 / 2;
        let rows: Vec<Vec<T>> = (0..height).map(|y| src.row::<T>(plane, y).to_vec()).collect();
        for y in 0..height {
            let out = dst.row_mut::<T>(plane, y);
            for x in 0..width {
                let mut tmp = 0i64;
                for (i, &m) in self.params.matrix.iter().enumerate() {
                    let offset = i as i32 - radius;
                    let v: i32 = if horizontal {
                        clamp_x(&rows[y as usize], x + offset)
                    } else {
                        rows[(y + offset).clamp(0, height - 1) as usize][x as usize]
                    }
                    .into();
                    tmp += i64::from(m) * i64::from(v);
                }
                out[x as usize] = T::try_from(self.conv_finish_int(tmp, maxval)).unwrap();
            }
        }
    }

    fn process_plane_conv_strip_float(
        &self,
        src: &Frame,
        dst: &mut Frame,
        plane: i32,
        horizontal: bool,
    ) {
        let width = src.get_width(plane);
        let height = src.get_height(plane);
        let radius = self.params.matrixf.len() as i32 / 2;
        let rows: Vec<Vec<f32>> = (0..height)
            .map(|y| src.row::<f32>(plane, y).to_vec())
            .collect();
        for y in 0..height {
            let out = dst.row_mut::<f32>(plane, y);
            for x in 0..width {
                let mut tmp = 0.0f32;
                for (i, &m) in self.params.matrixf.iter().enumerate() {
                    let offset = i as i32 - radius;
                    let v = if horizontal {
                        clamp_x(&rows[y as usize], x + offset)
                    } else {
                        rows[(y + offset).clamp(0, height - 1) as usize][x as usize]
                    };
                    tmp += m * v;
                }
                out[x as usize] = self.conv_finish_float(tmp);
            }
        }
    }

    fn process_plane(&self, src: &Frame, dst: &mut Frame, plane: i32, format: &VideoFormat) {
        let maxval = (1i32 << format.bits_per_sample.min(30)) - 1;
        let is_5x5 =
            self.op == GenericOp::Convolution && self.params.matrix.len() == 25
                && self.params.convolution_type == ConvolutionType::Square;
        let is_strip = self.op == GenericOp::Convolution
            && self.params.convolution_type != ConvolutionType::Square;

        match (format.sample_type, format.bytes_per_sample) {
            (SampleType::Integer, 1) => {
                if is_5x5 {
                    self.process_plane_conv5x5_int::<u8>(src, dst, plane, maxval);
                } else if is_strip {
                    self.process_plane_conv_strip_int::<u8>(
                        src,
                        dst,
                        plane,
                        maxval,
                        self.params.convolution_type == ConvolutionType::Horizontal,
                    );
                } else {
                    self.process_plane_3x3_int::<u8>(src, dst, plane, maxval);
                }
            }
            (SampleType::Integer, _) => {
                if is_5x5 {
                    self.process_plane_conv5x5_int::<u16>(src, dst, plane, maxval);
                } else if is_strip {
                    self.process_plane_conv_strip_int::<u16>(
                        src,
                        dst,
                        plane,
                        maxval,
                        self.params.convolution_type == ConvolutionType::Horizontal,
                    );
                } else {
                    self.process_plane_3x3_int::<u16>(src, dst, plane, maxval);
                }
            }
            (SampleType::Float, _) => {
                if is_5x5 {
                    self.process_plane_conv5x5_float(src, dst, plane);
                } else if is_strip {
                    self.process_plane_conv_strip_float(
                        src,
                        dst,
                        plane,
                        self.params.convolution_type == ConvolutionType::Horizontal,
                    );
                } else {
                    self.process_plane_3x3_float(src, dst, plane);
                }
            }
        }
    }
}

impl Filter for Generic {
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
                    .ok_or_else(|| format!("{}: upstream frame missing", self.name))?;
                let format = src.get_video_format().unwrap();

                let mut dst = new_frame_sharing_planes(&src, &self.process);
                for plane in 0..format.num_planes {
                    if self.process[plane as usize] {
                        self.process_plane(&src, &mut dst, plane, &format);
                    }
                }
                Ok(Some(dst))
            }
            ActivationReason::Error => Ok(None),
        }
    }
}

//////////////////////////////////////////
// Single pixel filters: Invert, Limiter, Binarize, Levels

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RangeArgumentHandling {
    Lower,
    Upper,
    Middle,
}

/// Parses a per-plane pixel-value argument like `min`, `max`, `v0`, `v1` or
/// `threshold`. Missing trailing planes repeat the last given value; when
/// nothing is given the plane defaults to the bottom, top or middle of its
/// range. Chroma planes of float YUV clips center around zero unless the
/// value is a mask.
fn plane_pixel_range_args(
    format: &crate::format::VideoFormat,
    args: &Map,
    name: &str,
    mode: RangeArgumentHandling,
    mask: bool,
) -> Result<([u16; 3], [f32; 3]), String> {
    let values = super::opt_float_array(args, name)
        .map_err(|e| e.to_string())?
        .unwrap_or_default();
    if values.len() > format.num_planes as usize {
        return Err(format!(
            "{} has more values specified than there are planes",
            name
        ));
    }

    let mut ival = [0u16; 3];
    let mut fval = [0f32; 3];
    let mut prev_valid = false;

    for plane in 0..3usize {
        let uv = !mask && plane > 0 && format.color_family == ColorFamily::YUV;
        match values.get(plane) {
            None => {
                if prev_valid {
                    ival[plane] = ival[plane - 1];
                    fval[plane] = fval[plane - 1];
                } else {
                    match mode {
                        RangeArgumentHandling::Lower => {
                            ival[plane] = 0;
                            fval[plane] = if uv { -0.5 } else { 0.0 };
                        }
                        RangeArgumentHandling::Upper => {
                            ival[plane] = ((1u32 << format.bits_per_sample) - 1) as u16;
                            fval[plane] = if uv { 0.5 } else { 1.0 };
                        }
                        RangeArgumentHandling::Middle => {
                            ival[plane] = ((1u32 << format.bits_per_sample) / 2) as u16;
                            fval[plane] = if uv { 0.0 } else { 0.5 };
                        }
                    }
                }
            }
            Some(&value) => {
                if format.sample_type == SampleType::Integer {
                    let rounded = (value + 0.5) as i64;
                    if rounded < 0 || rounded > i64::from((1u32 << format.bits_per_sample) - 1) {
                        return Err(format!("{} out of range", name));
                    }
                    ival[plane] = rounded as u16;
                } else {
                    fval[plane] = value as f32;
                }
                prev_valid = true;
            }
        }
    }

    Ok((ival, fval))
}

/// Shared scaffolding of the one-pixel-in, one-pixel-out filters: parse the
/// clip and planes arguments and check the format.
fn point_init(
    args: &Map,
    name: &'static str,
) -> Result<(Node, crate::format::VideoInfo, [bool; 3]), String> {
    let node = args
        .get_node("clip")
        .map_err(|e| format!("{}: {}", name, e))?;
    let vi = node
        .video_info()
        .ok_or_else(|| format!("{}: clip must be video", name))?;

    if !is_8to16_or_float(&vi.format) {
        return Err(format!(
            "{}: Clip must be constant format and of integer 8-16 bit type or 32 bit float.",
            name
        ));
    }

    let process = planes_arg(args, vi.format.num_planes).map_err(|e| format!("{}: {}", name, e))?;
    Ok((node, vi, process))
}

fn point_deps(node: &Node) -> Vec<FilterDependency> {
    vec![FilterDependency::new(node.clone(), RequestPattern::StrictSpatial)]
}

/// Applies `op`/`opf` to every pixel of the processed planes.
fn point_process<OpInt, OpFloat>(
    src: &Frame,
    process: &[bool; 3],
    op: OpInt,
    opf: OpFloat,
) -> Frame
where
    OpInt: Fn(i32, u32, i32) -> i32,
    OpFloat: Fn(f32, usize) -> f32,
{
    let format = src.get_video_format().unwrap();
    let mut dst = new_frame_sharing_planes(src, process);

    for plane in 0..format.num_planes {
        if !process[plane as usize] {
            continue;
        }
        let height = src.get_height(plane);
        for y in 0..height {
            match (format.sample_type, format.bytes_per_sample) {
                (SampleType::Integer, 1) => {
                    let row: Vec<u8> = src.row::<u8>(plane, y).to_vec();
                    let out = dst.row_mut::<u8>(plane, y);
                    for (slot, &v) in out.iter_mut().zip(&row) {
                        *slot = op(i32::from(v), plane as u32, 8) as u8;
                    }
                }
                (SampleType::Integer, _) => {
                    let row: Vec<u16> = src.row::<u16>(plane, y).to_vec();
                    let out = dst.row_mut::<u16>(plane, y);
                    for (slot, &v) in out.iter_mut().zip(&row) {
                        *slot = op(i32::from(v), plane as u32, format.bits_per_sample) as u16;
                    }
                }
                (SampleType::Float, _) => {
                    let row: Vec<f32> = src.row::<f32>(plane, y).to_vec();
                    let out = dst.row_mut::<f32>(plane, y);
                    for (slot, &v) in out.iter_mut().zip(&row) {
                        *slot = opf(v, plane as usize);
                    }
                }
            }
        }
    }

    dst
}

/// Flips every pixel value within its range. The mask variant treats chroma
/// like luma instead of negating around the zero center.
pub struct Invert {
    node: Node,
    name: &'static str,
    process: [bool; 3],
    mask: bool,
}

fn create_invert(core: &Core, args: &Map, mask: bool, name: &'static str) -> Result<Node, String> {
    let (node, vi, process) = point_init(args, name)?;
    core.create_video_filter(name, &vi, FilterMode::Parallel, point_deps(&node), Invert {
        node,
        name,
        process,
        mask,
    })
}

/// Arguments: `clip`, `planes`.
pub fn invert(core: &Core, args: &Map) -> Result<Node, String> {
    create_invert(core, args, false, "Invert")
}

/// Arguments: `clip`, `planes`.
pub fn invert_mask(core: &Core, args: &Map) -> Result<Node, String> {
    create_invert(core, args, true, "InvertMask")
}

impl Filter for Invert {
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
                    .ok_or_else(|| format!("{}: upstream frame missing", self.name))?;
                let format = src.get_video_format().unwrap();
                let mask = self.mask;
                let family = format.color_family;

                let dst = point_process(
                    &src,
                    &self.process,
                    |v, _, bits| {
                        let max = (1i32 << bits) - 1;
                        max - v.min(max)
                    },
                    |v, plane| {
                        let uv = !mask && family == ColorFamily::YUV && plane > 0;
                        if uv {
                            -v
                        } else {
                            1.0 - v
                        }
                    },
                );
                Ok(Some(dst))
            }
            ActivationReason::Error => Ok(None),
        }
    }
}

/// Clamps every pixel to a per-plane `[min, max]` range.
pub struct Limiter {
    node: Node,
    process: [bool; 3],
    min: [u16; 3],
    max: [u16; 3],
    minf: [f32; 3],
    maxf: [f32; 3],
}

/// Arguments: `clip`, `min`, `max`, `planes`.
pub fn limiter(core: &Core, args: &Map) -> Result<Node, String> {
    let (node, vi, process) = point_init(args, "Limiter")?;

    let (min, minf) =
        plane_pixel_range_args(&vi.format, args, "min", RangeArgumentHandling::Lower, false)
            .map_err(|e| format!("Limiter: {}", e))?;
    let (max, maxf) =
        plane_pixel_range_args(&vi.format, args, "max", RangeArgumentHandling::Upper, false)
            .map_err(|e| format!("Limiter: {}", e))?;

    for i in 0..3 {
        let bad = match vi.format.sample_type {
            SampleType::Integer => min[i] > max[i],
            SampleType::Float => minf[i] > maxf[i],
        };
        if bad {
            return Err("Limiter: min bigger than max".to_owned());
        }
    }

    core.create_video_filter("Limiter", &vi, FilterMode::Parallel, point_deps(&node), Limiter {
        node,
        process,
        min,
        max,
        minf,
        maxf,
    })
}

impl Filter for Limiter {
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
                    .ok_or("Limiter: upstream frame missing")?;

                let dst = point_process(
                    &src,
                    &self.process,
                    |v, plane, _| {
                        v.clamp(
                            i32::from(self.min[plane as usize]),
                            i32::from(self.max[plane as usize]),
                        )
                    },
                    |v, plane| v.clamp(self.minf[plane], self.maxf[plane]),
                );
                Ok(Some(dst))
            }
            ActivationReason::Error => Ok(None),
        }
    }
}

/// Per-plane thresholding: pixels below the threshold become `v0`, the rest
/// `v1`. The mask variant skips the chroma centering of the defaults.
pub struct Binarize {
    node: Node,
    name: &'static str,
    process: [bool; 3],
    v0: [u16; 3],
    v1: [u16; 3],
    thr: [u16; 3],
    v0f: [f32; 3],
    v1f: [f32; 3],
    thrf: [f32; 3],
}

fn create_binarize(
    core: &Core,
    args: &Map,
    mask: bool,
    name: &'static str,
) -> Result<Node, String> {
    let (node, vi, process) = point_init(args, name)?;

    let (v0, v0f) =
        plane_pixel_range_args(&vi.format, args, "v0", RangeArgumentHandling::Lower, mask)
            .map_err(|e| format!("{}: {}", name, e))?;
    let (v1, v1f) =
        plane_pixel_range_args(&vi.format, args, "v1", RangeArgumentHandling::Upper, mask)
            .map_err(|e| format!("{}: {}", name, e))?;
    let (thr, thrf) = plane_pixel_range_args(
        &vi.format,
        args,
        "threshold",
        RangeArgumentHandling::Middle,
        mask,
    )
    .map_err(|e| format!("{}: {}", name, e))?;

    core.create_video_filter(name, &vi, FilterMode::Parallel, point_deps(&node), Binarize {
        node,
        name,
        process,
        v0,
        v1,
        thr,
        v0f,
        v1f,
        thrf,
    })
}

/// Arguments: `clip`, `v0`, `v1`, `threshold`, `planes`.
pub fn binarize(core: &Core, args: &Map) -> Result<Node, String> {
    create_binarize(core, args, false, "Binarize")
}

/// Arguments: `clip`, `v0`, `v1`, `threshold`, `planes`.
pub fn binarize_mask(core: &Core, args: &Map) -> Result<Node, String> {
    create_binarize(core, args, true, "BinarizeMask")
}

impl Filter for Binarize {
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
                    .ok_or_else(|| format!("{}: upstream frame missing", self.name))?;

                let dst = point_process(
                    &src,
                    &self.process,
                    |v, plane, _| {
                        let p = plane as usize;
                        if v < i32::from(self.thr[p]) {
                            i32::from(self.v0[p])
                        } else {
                            i32::from(self.v1[p])
                        }
                    },
                    |v, plane| {
                        if v < self.thrf[plane] {
                            self.v0f[plane]
                        } else {
                            self.v1f[plane]
                        }
                    },
                );
                Ok(Some(dst))
            }
            ActivationReason::Error => Ok(None),
        }
    }
}

/// Gamma and range remapping. Integer formats evaluate through a lookup
/// table built at construction, float formats compute directly.
pub struct Levels {
    node: Node,
    process: [bool; 3],
    /// Reciprocal of the user-supplied gamma.
    gamma: f32,
    min_in: f32,
    max_in: f32,
    min_out: f32,
    max_out: f32,
    lut: Vec<u16>,
}

/// Arguments: `clip`, `min_in`, `max_in`, `min_out`, `max_out`, `gamma`,
/// `planes`.
pub fn levels(core: &Core, args: &Map) -> Result<Node, String> {
    let err = |e: crate::map::MapError| format!("Levels: {}", e);
    let (node, vi, process) = point_init(args, "Levels")?;

    let maxvalf = if vi.format.sample_type == SampleType::Integer {
        ((1u32 << vi.format.bits_per_sample) - 1) as f32
    } else {
        1.0
    };

    let mut min_in = opt_float(args, "min_in").map_err(err)?.unwrap_or(0.0) as f32;
    let mut min_out = opt_float(args, "min_out").map_err(err)?.unwrap_or(0.0) as f32;
    let mut max_in = opt_float(args, "max_in")
        .map_err(err)?
        .unwrap_or(f64::from(maxvalf)) as f32;
    let mut max_out = opt_float(args, "max_out")
        .map_err(err)?
        .unwrap_or(f64::from(maxvalf)) as f32;
    let gamma = match opt_float(args, "gamma").map_err(err)? {
        Some(g) => 1.0 / g as f32,
        None => 1.0,
    };

    let mut lut = Vec::new();
    if vi.format.sample_type == SampleType::Integer {
        let maxval = (1u32 << vi.format.bits_per_sample) - 1;

        min_in = min_in.round();
        min_out = min_out.round();
        max_in = max_in.round();
        max_out = max_out.round();

        lut.reserve(maxval as usize + 1);
        for v in 0..=maxval {
            let normalized =
                ((v as f32).min(max_in) - min_in).max(0.0) / (max_in - min_in);
            let mapped = normalized.powf(gamma) * (max_out - min_out) + min_out;
            lut.push((mapped.clamp(0.0, maxvalf) + 0.5) as u16);
        }
    }

    core.create_video_filter("Levels", &vi, FilterMode::Parallel, point_deps(&node), Levels {
        node,
        process,
        gamma,
        min_in,
        max_in,
        min_out,
        max_out,
        lut,
    })
}

impl Filter for Levels {
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
                    .ok_or("Levels: upstream frame missing")?;

                let range_in = 1.0 / (self.max_in - self.min_in);
                let range_out = self.max_out - self.min_out;
                let linear = (self.gamma - 1.0).abs() < f32::EPSILON;
                let range_scale = range_out / (self.max_in - self.min_in);

                let dst = point_process(
                    &src,
                    &self.process,
                    |v, _, bits| {
                        let maxval = (1i32 << bits) - 1;
                        i32::from(self.lut[v.min(maxval) as usize])
                    },
                    |v, _| {
                        let clipped = (v.min(self.max_in) - self.min_in).max(0.0);
                        if linear {
                            clipped * range_scale + self.min_out
                        } else {
                            (clipped * range_in).powf(self.gamma) * range_out + self.min_out
                        }
                    },
                );
                Ok(Some(dst))
            }
            ActivationReason::Error => Ok(None),
        }
    }
}
