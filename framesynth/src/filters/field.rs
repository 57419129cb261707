//! Interlacing helpers: SeparateFields and DoubleWeave.

use crate::core::Core;
use crate::filter::{
    ActivationReason, Filter, FilterDependency, FilterMode, FrameData, RequestPattern,
};
use crate::frame::{Frame, FrameContext};
use crate::map::Map;
use crate::node::Node;

use super::{bitblt, mul_div_rational, opt_int, scale_duration};

//////////////////////////////////////////
// SeparateFields

/// Splits every frame into its two fields, halving the height and doubling
/// the frame count. Emits `_Field` (0 = bottom, 1 = top) and deletes
/// `_FieldBased`.
pub struct SeparateFields {
    node: Node,
    /// -1 when no explicit field order was given; `_FieldBased` decides then.
    tff: i32,
    modify_duration: bool,
    width: i32,
    height: i32,
}

impl SeparateFields {
    /// Arguments: `clip`, `tff`, `modify_duration`.
    pub fn create(core: &Core, args: &Map) -> Result<Node, String> {
        let err = |e: crate::map::MapError| format!("SeparateFields: {}", e);

        let tff = match opt_int(args, "tff").map_err(err)? {
            Some(v) => (v != 0) as i32,
            None => -1,
        };
        let modify_duration = opt_int(args, "modify_duration").map_err(err)?.unwrap_or(1) != 0;

        let node = args.get_node("clip").map_err(err)?;
        let mut vi = node
            .video_info()
            .ok_or("SeparateFields: clip must be video")?;

        if !vi.is_constant() {
            return Err("SeparateFields: clip must have constant format and dimensions".to_owned());
        }
        if vi.height % (1 << (vi.format.sub_sampling_h + 1)) != 0 {
            return Err(
                "SeparateFields: clip height must be mod 2 in the smallest subsampled plane"
                    .to_owned(),
            );
        }
        if vi.num_frames > i32::MAX / 2 {
            return Err("SeparateFields: resulting clip is too long".to_owned());
        }
        vi.num_frames *= 2;
        vi.height /= 2;

        if modify_duration {
            mul_div_rational(&mut vi.fps_num, &mut vi.fps_den, 2, 1);
        }

        let deps = vec![FilterDependency::new(node.clone(), RequestPattern::General)];
        core.create_video_filter(
            "SeparateFields",
            &vi,
            FilterMode::Parallel,
            deps,
            SeparateFields {
                node,
                tff,
                modify_duration,
                width: vi.width,
                height: vi.height,
            },
        )
    }
}

impl Filter for SeparateFields {
    fn get_frame(
        &self,
        n: i32,
        reason: ActivationReason,
        _frame_data: &mut FrameData,
        ctx: &mut FrameContext,
    ) -> Result<Option<Frame>, String> {
        match reason {
            ActivationReason::Initial => {
                self.node.request_frame_filter(n / 2, ctx);
                Ok(None)
            }
            ActivationReason::AllFramesReady => {
                let src = self
                    .node
                    .get_frame_filter(n / 2, ctx)
                    .ok_or("SeparateFields: upstream frame missing")?;

                let mut effective_tff = self.tff;
                match src.properties().get_int("_FieldBased").unwrap_or(0) {
                    1 => effective_tff = 0,
                    2 => effective_tff = 1,
                    _ => {}
                }
                if effective_tff == -1 {
                    return Err("SeparateFields: no field order provided".to_owned());
                }

                let format = src.get_video_format().unwrap();
                let mut dst =
                    Frame::new_video_frame(&format, self.width, self.height, Some(&src));
                let field = (n & 1) ^ effective_tff;

                for plane in 0..format.num_planes {
                    let src_stride = src.get_stride(plane) as usize;
                    let dst_stride = dst.get_stride(plane) as usize;
                    let row_bytes =
                        dst.get_width(plane) as usize * format.bytes_per_sample as usize;
                    let height = dst.get_height(plane) as usize;

                    // Top field lives in the even lines.
                    let offset = if field == 1 { 0 } else { src_stride };
                    let src_data = src.get_read_slice(plane);
                    bitblt(
                        dst.get_write_slice(plane),
                        dst_stride,
                        &src_data[offset..],
                        2 * src_stride,
                        row_bytes,
                        height,
                    );
                }

                let props = dst.properties_mut();
                let _ = props.set_int("_Field", i64::from(field));
                let _ = props.delete_key("_FieldBased");

                if self.modify_duration {
                    scale_duration(&mut dst, 1, 2);
                }

                Ok(Some(dst))
            }
            ActivationReason::Error => Ok(None),
        }
    }
}

//////////////////////////////////////////
// DoubleWeave

/// The inverse of [`SeparateFields`]: weaves every pair of fields back into
/// one full-height frame, halving the frame count.
pub struct DoubleWeave {
    node: Node,
    tff: i32,
    modify_duration: bool,
    width: i32,
    height: i32,
}

impl DoubleWeave {
    /// Arguments: `clip`, `tff`, `modify_duration`.
    pub fn create(core: &Core, args: &Map) -> Result<Node, String> {
        let err = |e: crate::map::MapError| format!("DoubleWeave: {}", e);

        let tff = match opt_int(args, "tff").map_err(err)? {
            Some(v) => (v != 0) as i32,
            None => -1,
        };
        let modify_duration = opt_int(args, "modify_duration").map_err(err)?.unwrap_or(1) != 0;

        let node = args.get_node("clip").map_err(err)?;
        let mut vi = node.video_info().ok_or("DoubleWeave: clip must be video")?;

        if !vi.is_constant() {
            return Err("DoubleWeave: clip must have constant format and dimensions".to_owned());
        }
        if vi.num_frames < 2 {
            return Err("DoubleWeave: clip must have at least two fields".to_owned());
        }

        vi.num_frames /= 2;
        vi.height *= 2;

        if modify_duration {
            mul_div_rational(&mut vi.fps_num, &mut vi.fps_den, 1, 2);
        }

        let deps = vec![FilterDependency::new(node.clone(), RequestPattern::NoFrameReuse)];
        core.create_video_filter("DoubleWeave", &vi, FilterMode::Parallel, deps, DoubleWeave {
            node,
            tff,
            modify_duration,
            width: vi.width,
            height: vi.height,
        })
    }
}

impl Filter for DoubleWeave {
    fn get_frame(
        &self,
        n: i32,
        reason: ActivationReason,
        _frame_data: &mut FrameData,
        ctx: &mut FrameContext,
    ) -> Result<Option<Frame>, String> {
        match reason {
            ActivationReason::Initial => {
                self.node.request_frame_filter(2 * n, ctx);
                self.node.request_frame_filter(2 * n + 1, ctx);
                Ok(None)
            }
            ActivationReason::AllFramesReady => {
                let src1 = self
                    .node
                    .get_frame_filter(2 * n, ctx)
                    .ok_or("DoubleWeave: upstream frame missing")?;
                let src2 = self
                    .node
                    .get_frame_filter(2 * n + 1, ctx)
                    .ok_or("DoubleWeave: upstream frame missing")?;

                let f1 = src1.properties().get_int("_Field").unwrap_or(-1);
                let f2 = src2.properties().get_int("_Field").unwrap_or(-1);

                let (top, bottom) = if f1 == 0 && f2 == 1 {
                    (&src2, &src1)
                } else if f1 == 1 && f2 == 0 {
                    (&src1, &src2)
                } else if self.tff != -1 {
                    if self.tff == 1 {
                        (&src1, &src2)
                    } else {
                        (&src2, &src1)
                    }
                } else {
                    return Err(
                        "DoubleWeave: field order could not be determined from frame properties"
                            .to_owned(),
                    );
                };

                let format = src1.get_video_format().unwrap();
                let mut dst =
                    Frame::new_video_frame(&format, self.width, self.height, Some(&src1));

                for plane in 0..format.num_planes {
                    let dst_stride = dst.get_stride(plane) as usize;
                    let row_bytes =
                        dst.get_width(plane) as usize * format.bytes_per_sample as usize;
                    let field_height = top.get_height(plane) as usize;

                    for (field, frame) in [(0usize, top), (1usize, bottom)] {
                        let src_stride = frame.get_stride(plane) as usize;
                        let src_data = frame.get_read_slice(plane).to_vec();
                        let dst_data = dst.get_write_slice(plane);
                        for y in 0..field_height {
                            dst_data[(2 * y + field) * dst_stride..][..row_bytes]
                                .copy_from_slice(&src_data[y * src_stride..][..row_bytes]);
                        }
                    }
                }

                let props = dst.properties_mut();
                let _ = props.delete_key("_Field");
                let _ = props.set_int("_FieldBased", 0);

                if self.modify_duration {
                    scale_duration(&mut dst, 2, 1);
                }

                Ok(Some(dst))
            }
            ActivationReason::Error => Ok(None),
        }
    }
}
