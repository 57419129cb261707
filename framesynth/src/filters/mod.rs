//! The built-in filter library.

pub mod audio;
pub mod boxblur;
pub mod expr;
pub mod field;
pub mod generic;
pub mod merge;
pub mod reorder;
pub mod source;

#[cfg(test)]
mod tests;

use crate::format::{SampleType, VideoFormat};
use crate::frame::Frame;
use crate::map::{Map, MapError};

/// `None` when the key is absent, error on a wrong type.
pub(crate) fn opt_int(args: &Map, key: &str) -> Result<Option<i64>, MapError> {
    match args.get_int(key) {
        Ok(v) => Ok(Some(v)),
        Err(MapError::KeyNotFound) => Ok(None),
        Err(e) => Err(e),
    }
}

pub(crate) fn opt_float(args: &Map, key: &str) -> Result<Option<f64>, MapError> {
    match args.get_float(key) {
        Ok(v) => Ok(Some(v)),
        Err(MapError::KeyNotFound) => Ok(None),
        Err(e) => Err(e),
    }
}

pub(crate) fn opt_int_array(args: &Map, key: &str) -> Result<Option<Vec<i64>>, MapError> {
    match args.get_int_array(key) {
        Ok(v) => Ok(Some(v)),
        Err(MapError::KeyNotFound) => Ok(None),
        Err(e) => Err(e),
    }
}

pub(crate) fn opt_float_array(args: &Map, key: &str) -> Result<Option<Vec<f64>>, MapError> {
    match args.get_float_array(key) {
        Ok(v) => Ok(Some(v)),
        Err(MapError::KeyNotFound) => Ok(None),
        Err(e) => Err(e),
    }
}

pub(crate) fn gcd(mut a: i64, mut b: i64) -> i64 {
    while b != 0 {
        let t = b;
        b = a % b;
        a = t;
    }
    a.abs().max(1)
}

/// Multiplies a rational by `mul / div` and reduces the result.
pub(crate) fn mul_div_rational(num: &mut i64, den: &mut i64, mul: i64, div: i64) {
    if *den == 0 {
        return;
    }
    *num *= mul;
    *den *= div;
    let g = gcd(*num, *den);
    *num /= g;
    *den /= g;
}

/// Rescales the duration properties of a frame by `mul / div`, if present.
pub(crate) fn scale_duration(frame: &mut Frame, mul: i64, div: i64) {
    if let Some((mut num, mut den)) = frame.duration() {
        mul_div_rational(&mut num, &mut den, mul, div);
        frame.set_duration(num, den);
    }
}

/// Row-by-row copy between plane storages of possibly different strides.
pub(crate) fn bitblt(
    dst: &mut [u8],
    dst_stride: usize,
    src: &[u8],
    src_stride: usize,
    row_bytes: usize,
    height: usize,
) {
    if src_stride == dst_stride && src_stride == row_bytes {
        dst[..row_bytes * height].copy_from_slice(&src[..row_bytes * height]);
        return;
    }
    for y in 0..height {
        dst[y * dst_stride..y * dst_stride + row_bytes]
            .copy_from_slice(&src[y * src_stride..y * src_stride + row_bytes]);
    }
}

/// The per-plane processing formats supported by the pixel kernels.
pub(crate) fn is_8to16_or_float(format: &VideoFormat) -> bool {
    match format.sample_type {
        SampleType::Integer => format.bits_per_sample <= 16,
        SampleType::Float => format.bits_per_sample == 32,
    }
}

/// Parses the conventional `planes` argument: absent means all planes,
/// otherwise the listed planes are processed.
pub(crate) fn planes_arg(args: &Map, num_planes: i32) -> Result<[bool; 3], String> {
    let planes = opt_int_array(args, "planes").map_err(|e| e.to_string())?;
    match planes {
        None => Ok([true; 3]),
        Some(list) => {
            let mut process = [false; 3];
            for &p in &list {
                if p < 0 || p >= i64::from(num_planes) {
                    return Err("plane index out of range".to_owned());
                }
                if process[p as usize] {
                    return Err("plane specified twice".to_owned());
                }
                process[p as usize] = true;
            }
            Ok(process)
        }
    }
}

/// Allocates an output frame that shares the unprocessed planes of `src` and
/// copies its properties.
pub(crate) fn new_frame_sharing_planes(src: &Frame, process: &[bool; 3]) -> Frame {
    let format = src.get_video_format().unwrap();
    let plane_src: Vec<Option<&Frame>> = (0..3)
        .map(|p| if process[p] { None } else { Some(src) })
        .collect();
    Frame::new_video_frame2(
        &format,
        src.get_width(0),
        src.get_height(0),
        &plane_src,
        &[0, 1, 2],
        Some(src),
    )
}
