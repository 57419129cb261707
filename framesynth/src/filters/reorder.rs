//! Pure index remappers: Trim, Reverse, Loop, Interleave, SelectEvery,
//! Splice, DuplicateFrames, DeleteFrames and FreezeFrames.
//!
//! None of these touch pixel data; the getter computes an upstream index
//! during the initial phase and hands the upstream frame through, possibly
//! with rewritten duration properties.

use crate::core::Core;
use crate::filter::{
    ActivationReason, Filter, FilterDependency, FilterMode, FrameData, RequestPattern,
};
use crate::format::{ColorFamily, VideoInfo};
use crate::frame::{Frame, FrameContext};
use crate::map::Map;
use crate::node::Node;

use super::{mul_div_rational, opt_int, opt_int_array, scale_duration};

struct MismatchInfo {
    matches: bool,
    different_dimensions: bool,
    different_format: bool,
    different_frame_rate: bool,
    clipnum: usize,
}

/// Intersects the video infos of several clips; mismatching fields are
/// zeroed out the way variable-format clips represent them.
fn find_common_vi(nodes: &[Node]) -> (VideoInfo, MismatchInfo) {
    let mut out = nodes[0].video_info().unwrap();
    let mut info = MismatchInfo {
        matches: true,
        different_dimensions: false,
        different_format: false,
        different_frame_rate: false,
        clipnum: 0,
    };

    for (i, node) in nodes.iter().enumerate().skip(1) {
        let vi = node.video_info().unwrap();

        if out.width != vi.width || out.height != vi.height {
            out.width = 0;
            out.height = 0;
            info.different_dimensions = true;
            if info.clipnum == 0 {
                info.clipnum = i;
            }
        }

        if out.format != vi.format {
            out.format.color_family = ColorFamily::Undefined;
            info.different_format = true;
            if info.clipnum == 0 {
                info.clipnum = i;
            }
        }

        if out.fps_num != vi.fps_num || out.fps_den != vi.fps_den {
            out.fps_num = 0;
            out.fps_den = 0;
            info.different_frame_rate = true;
            if info.clipnum == 0 {
                info.clipnum = i;
            }
        }

        if out.num_frames < vi.num_frames {
            out.num_frames = vi.num_frames;
        }
    }

    info.matches =
        !info.different_dimensions && !info.different_format && !info.different_frame_rate;
    (out, info)
}

fn mismatch_to_text(info: &MismatchInfo) -> String {
    let mut parts = Vec::new();
    if info.different_format {
        parts.push("format");
    }
    if info.different_dimensions {
        parts.push("dimensions");
    }
    if info.different_frame_rate {
        parts.push("framerate");
    }
    parts.join(", ")
}

//////////////////////////////////////////
// Trim

pub struct Trim {
    node: Node,
    first: i32,
}

impl Trim {
    /// Arguments: `clip`, `first`, `last`, `length`.
    pub fn create(core: &Core, args: &Map) -> Result<Node, String> {
        let err = |e: crate::map::MapError| format!("Trim: {}", e);

        let first = opt_int(args, "first").map_err(err)?;
        let last = opt_int(args, "last").map_err(err)?;
        let length = opt_int(args, "length").map_err(err)?;

        if last.is_some() && length.is_some() {
            return Err("Trim: both last frame and length specified".to_owned());
        }
        let first_val = first.unwrap_or(0) as i32;
        if let Some(last) = last {
            if (last as i32) < first_val {
                return Err(
                    "Trim: invalid last frame specified (last is less than first)".to_owned(),
                );
            }
        }
        if let Some(length) = length {
            if length < 1 {
                return Err("Trim: invalid length specified (less than 1)".to_owned());
            }
        }
        if first_val < 0 {
            return Err("Trim: invalid first frame specified (less than 0)".to_owned());
        }

        let node = args.get_node("clip").map_err(err)?;
        let mut vi = node.video_info().ok_or("Trim: clip must be video")?;

        if last.map_or(false, |l| l as i32 >= vi.num_frames)
            || length.map_or(false, |l| first_val + l as i32 > vi.num_frames)
            || vi.num_frames <= first_val
        {
            return Err("Trim: last frame beyond clip end".to_owned());
        }

        let trimlen = if let Some(last) = last {
            last as i32 - first_val + 1
        } else if let Some(length) = length {
            length as i32
        } else {
            vi.num_frames - first_val
        };

        // obvious no-op so just pass through the input clip
        if (first.is_none() && last.is_none() && length.is_none()) || trimlen == vi.num_frames {
            return Ok(node);
        }

        vi.num_frames = trimlen;

        let deps = vec![FilterDependency::new(node.clone(), RequestPattern::NoFrameReuse)];
        core.create_video_filter("Trim", &vi, FilterMode::Parallel, deps, Trim {
            node,
            first: first_val,
        })
    }
}

impl Filter for Trim {
    fn get_frame(
        &self,
        n: i32,
        reason: ActivationReason,
        _frame_data: &mut FrameData,
        ctx: &mut FrameContext,
    ) -> Result<Option<Frame>, String> {
        match reason {
            ActivationReason::Initial => {
                self.node.request_frame_filter(n + self.first, ctx);
                Ok(None)
            }
            ActivationReason::AllFramesReady => {
                Ok(self.node.get_frame_filter(n + self.first, ctx))
            }
            ActivationReason::Error => Ok(None),
        }
    }
}

//////////////////////////////////////////
// Reverse

pub struct Reverse {
    node: Node,
    num_frames: i32,
}

impl Reverse {
    /// Arguments: `clip`.
    pub fn create(core: &Core, args: &Map) -> Result<Node, String> {
        let node = args
            .get_node("clip")
            .map_err(|e| format!("Reverse: {}", e))?;
        let vi = node.video_info().ok_or("Reverse: clip must be video")?;

        let deps = vec![FilterDependency::new(node.clone(), RequestPattern::NoFrameReuse)];
        core.create_video_filter("Reverse", &vi, FilterMode::Parallel, deps, Reverse {
            node,
            num_frames: vi.num_frames,
        })
    }

    fn map(&self, n: i32) -> i32 {
        (self.num_frames - n - 1).max(0)
    }
}

impl Filter for Reverse {
    fn get_frame(
        &self,
        n: i32,
        reason: ActivationReason,
        _frame_data: &mut FrameData,
        ctx: &mut FrameContext,
    ) -> Result<Option<Frame>, String> {
        match reason {
            ActivationReason::Initial => {
                self.node.request_frame_filter(self.map(n), ctx);
                Ok(None)
            }
            ActivationReason::AllFramesReady => Ok(self.node.get_frame_filter(self.map(n), ctx)),
            ActivationReason::Error => Ok(None),
        }
    }
}

//////////////////////////////////////////
// Loop

pub struct Loop {
    node: Node,
    src_frames: i32,
}

impl Loop {
    /// Arguments: `clip`, `times` (0 loops for the maximum duration).
    pub fn create(core: &Core, args: &Map) -> Result<Node, String> {
        let err = |e: crate::map::MapError| format!("Loop: {}", e);
        let times = opt_int(args, "times").map_err(err)?.unwrap_or(0);
        if times < 0 {
            return Err("Loop: cannot repeat clip a negative number of times".to_owned());
        }

        let node = args.get_node("clip").map_err(err)?;
        let mut vi = node.video_info().ok_or("Loop: clip must be video")?;

        // early termination for the trivial case
        if times == 1 {
            return Ok(node);
        }

        let src_frames = vi.num_frames;
        if times > 0 {
            if i64::from(vi.num_frames) * times > i64::from(i32::MAX) {
                return Err("Loop: resulting clip is too long".to_owned());
            }
            vi.num_frames *= times as i32;
        } else {
            // loop for maximum duration
            vi.num_frames = i32::MAX;
        }

        let deps = vec![FilterDependency::new(node.clone(), RequestPattern::General)];
        core.create_video_filter("Loop", &vi, FilterMode::Parallel, deps, Loop {
            node,
            src_frames,
        })
    }
}

impl Filter for Loop {
    fn get_frame(
        &self,
        n: i32,
        reason: ActivationReason,
        _frame_data: &mut FrameData,
        ctx: &mut FrameContext,
    ) -> Result<Option<Frame>, String> {
        match reason {
            ActivationReason::Initial => {
                self.node.request_frame_filter(n % self.src_frames, ctx);
                Ok(None)
            }
            ActivationReason::AllFramesReady => {
                Ok(self.node.get_frame_filter(n % self.src_frames, ctx))
            }
            ActivationReason::Error => Ok(None),
        }
    }
}

//////////////////////////////////////////
// Interleave

pub struct Interleave {
    nodes: Vec<Node>,
    modify_duration: bool,
}

impl Interleave {
    /// Arguments: `clips`, `extend`, `mismatch`, `modify_duration`.
    pub fn create(core: &Core, args: &Map) -> Result<Node, String> {
        let err = |e: crate::map::MapError| format!("Interleave: {}", e);

        let mismatch = opt_int(args, "mismatch").map_err(err)?.unwrap_or(0) != 0;
        let extend = opt_int(args, "extend").map_err(err)?.unwrap_or(0) != 0;
        let modify_duration = opt_int(args, "modify_duration").map_err(err)?.unwrap_or(1) != 0;

        let nodes: Vec<Node> = args.get_node_iter("clips").map_err(err)?.collect();
        let numclips = nodes.len();

        // passthrough for the special case with only one clip
        if numclips == 1 {
            return Ok(nodes.into_iter().next().unwrap());
        }

        if nodes.iter().any(|n| n.video_info().is_none()) {
            return Err("Interleave: all clips must be video".to_owned());
        }

        let (mut vi, mminfo) = find_common_vi(&nodes);
        if !mminfo.matches && !mismatch {
            return Err(format!(
                "Interleave: clips are mismatched in {} starting at clip #{}",
                mismatch_to_text(&mminfo),
                mminfo.clipnum
            ));
        }

        let mut overflow = false;
        if extend {
            if vi.num_frames > i32::MAX / numclips as i32 {
                overflow = true;
            }
            vi.num_frames = vi.num_frames.wrapping_mul(numclips as i32);
        } else {
            // this is exactly how avisynth does it
            vi.num_frames =
                (nodes[0].video_info().unwrap().num_frames - 1) * numclips as i32 + 1;
            for (i, node) in nodes.iter().enumerate() {
                let frames = node.video_info().unwrap().num_frames;
                if frames > (i32::MAX - i as i32 - 1) / numclips as i32 + 1 {
                    overflow = true;
                }
                vi.num_frames = vi
                    .num_frames
                    .max((frames - 1) * numclips as i32 + i as i32 + 1);
            }
        }

        if overflow {
            return Err("Interleave: resulting clip is too long".to_owned());
        }

        if modify_duration {
            mul_div_rational(&mut vi.fps_num, &mut vi.fps_den, numclips as i64, 1);
        }

        let max_num_frames = numclips as i32;
        let deps = nodes
            .iter()
            .map(|node| {
                let pattern = if max_num_frames <= node.video_info().unwrap().num_frames {
                    RequestPattern::StrictSpatial
                } else {
                    RequestPattern::General
                };
                FilterDependency::new(node.clone(), pattern)
            })
            .collect();

        core.create_video_filter("Interleave", &vi, FilterMode::Parallel, deps, Interleave {
            nodes,
            modify_duration,
        })
    }
}

impl Filter for Interleave {
    fn get_frame(
        &self,
        n: i32,
        reason: ActivationReason,
        _frame_data: &mut FrameData,
        ctx: &mut FrameContext,
    ) -> Result<Option<Frame>, String> {
        let numclips = self.nodes.len() as i32;
        let node = &self.nodes[(n % numclips) as usize];
        match reason {
            ActivationReason::Initial => {
                node.request_frame_filter(n / numclips, ctx);
                Ok(None)
            }
            ActivationReason::AllFramesReady => {
                let src = node
                    .get_frame_filter(n / numclips, ctx)
                    .ok_or("Interleave: upstream frame missing")?;
                if self.modify_duration {
                    let mut dst = src.copy_frame();
                    scale_duration(&mut dst, 1, i64::from(numclips));
                    Ok(Some(dst))
                } else {
                    Ok(Some(src))
                }
            }
            ActivationReason::Error => Ok(None),
        }
    }
}

//////////////////////////////////////////
// SelectEvery

pub struct SelectEvery {
    node: Node,
    offsets: Vec<i32>,
    cycle: i32,
    modify_duration: bool,
}

impl SelectEvery {
    /// Arguments: `clip`, `cycle`, `offsets`, `modify_duration`.
    pub fn create(core: &Core, args: &Map) -> Result<Node, String> {
        let err = |e: crate::map::MapError| format!("SelectEvery: {}", e);

        let cycle = args.get_int("cycle").map_err(err)? as i32;
        if cycle <= 1 {
            return Err("SelectEvery: invalid cycle size (must be greater than 1)".to_owned());
        }

        let modify_duration = opt_int(args, "modify_duration").map_err(err)?.unwrap_or(1) != 0;

        let offsets64 = args.get_int_array("offsets").map_err(err)?;
        let num = offsets64.len() as i32;
        let mut offsets = Vec::with_capacity(offsets64.len());
        for &o in &offsets64 {
            if o < 0 || o >= i64::from(cycle) {
                return Err("SelectEvery: invalid offset specified".to_owned());
            }
            offsets.push(o as i32);
        }

        let node = args.get_node("clip").map_err(err)?;
        let mut vi = node.video_info().ok_or("SelectEvery: clip must be video")?;
        let inputnframes = vi.num_frames;
        if inputnframes > 0 {
            vi.num_frames = (inputnframes / cycle) * num;
            for &offset in &offsets {
                if offset < inputnframes % cycle {
                    vi.num_frames += 1;
                }
            }
        }

        if vi.num_frames == 0 {
            return Err(
                "SelectEvery: no frames to output, all offsets outside available frames"
                    .to_owned(),
            );
        }

        if modify_duration {
            mul_div_rational(&mut vi.fps_num, &mut vi.fps_den, i64::from(num), i64::from(cycle));
        }

        let deps = vec![FilterDependency::new(node.clone(), RequestPattern::NoFrameReuse)];
        core.create_video_filter("SelectEvery", &vi, FilterMode::Parallel, deps, SelectEvery {
            node,
            offsets,
            cycle,
            modify_duration,
        })
    }
}

impl Filter for SelectEvery {
    fn get_frame(
        &self,
        n: i32,
        reason: ActivationReason,
        frame_data: &mut FrameData,
        ctx: &mut FrameContext,
    ) -> Result<Option<Frame>, String> {
        match reason {
            ActivationReason::Initial => {
                let num = self.offsets.len() as i32;
                let src = (n / num) * self.cycle + self.offsets[(n % num) as usize];
                frame_data.set(src);
                self.node.request_frame_filter(src, ctx);
                Ok(None)
            }
            ActivationReason::AllFramesReady => {
                let src_n = frame_data.take::<i32>().unwrap();
                let src = self
                    .node
                    .get_frame_filter(src_n, ctx)
                    .ok_or("SelectEvery: upstream frame missing")?;
                if self.modify_duration {
                    let mut dst = src.copy_frame();
                    scale_duration(
                        &mut dst,
                        i64::from(self.cycle),
                        self.offsets.len() as i64,
                    );
                    Ok(Some(dst))
                } else {
                    Ok(Some(src))
                }
            }
            ActivationReason::Error => {
                frame_data.clear();
                Ok(None)
            }
        }
    }
}

//////////////////////////////////////////
// Splice

pub struct Splice {
    nodes: Vec<Node>,
    numframes: Vec<i32>,
}

impl Splice {
    /// Arguments: `clips`, `mismatch`.
    pub fn create(core: &Core, args: &Map) -> Result<Node, String> {
        let err = |e: crate::map::MapError| format!("Splice: {}", e);

        let mismatch = opt_int(args, "mismatch").map_err(err)?.unwrap_or(0) != 0;
        let nodes: Vec<Node> = args.get_node_iter("clips").map_err(err)?.collect();

        // passthrough for the special case with only one clip
        if nodes.len() == 1 {
            return Ok(nodes.into_iter().next().unwrap());
        }

        if nodes.iter().any(|n| n.video_info().is_none()) {
            return Err("Splice: all clips must be video".to_owned());
        }

        let (mut vi, mminfo) = find_common_vi(&nodes);
        if !mminfo.matches
            && !mismatch
            && !vi.is_same_video(&nodes[0].video_info().unwrap())
        {
            return Err(format!(
                "Splice: clips are mismatched in {} starting at clip #{}",
                mismatch_to_text(&mminfo),
                mminfo.clipnum
            ));
        }

        let mut numframes = Vec::with_capacity(nodes.len());
        vi.num_frames = 0;
        for node in &nodes {
            let frames = node.video_info().unwrap().num_frames;
            numframes.push(frames);
            vi.num_frames = vi.num_frames.wrapping_add(frames);

            // did it overflow?
            if vi.num_frames < frames {
                return Err("Splice: the resulting clip is too long".to_owned());
            }
        }

        let deps = nodes
            .iter()
            .map(|node| FilterDependency::new(node.clone(), RequestPattern::NoFrameReuse))
            .collect();
        core.create_video_filter("Splice", &vi, FilterMode::Parallel, deps, Splice {
            nodes,
            numframes,
        })
    }

    fn map(&self, n: i32) -> (usize, i32) {
        let mut cumframe = 0;
        for (i, &frames) in self.numframes.iter().enumerate() {
            if (n >= cumframe && n < cumframe + frames) || i == self.numframes.len() - 1 {
                return (i, n - cumframe);
            }
            cumframe += frames;
        }
        unreachable!()
    }
}

impl Filter for Splice {
    fn get_frame(
        &self,
        n: i32,
        reason: ActivationReason,
        frame_data: &mut FrameData,
        ctx: &mut FrameContext,
    ) -> Result<Option<Frame>, String> {
        match reason {
            ActivationReason::Initial => {
                let (idx, frame) = self.map(n);
                frame_data.set((idx, frame));
                self.nodes[idx].request_frame_filter(frame, ctx);
                Ok(None)
            }
            ActivationReason::AllFramesReady => {
                let (idx, frame) = frame_data.take::<(usize, i32)>().unwrap();
                Ok(self.nodes[idx].get_frame_filter(frame, ctx))
            }
            ActivationReason::Error => {
                frame_data.clear();
                Ok(None)
            }
        }
    }
}

//////////////////////////////////////////
// DuplicateFrames

pub struct DuplicateFrames {
    node: Node,
    dups: Vec<i32>,
}

impl DuplicateFrames {
    /// Arguments: `clip`, `frames` (indices to duplicate).
    pub fn create(core: &Core, args: &Map) -> Result<Node, String> {
        let err = |e: crate::map::MapError| format!("DuplicateFrames: {}", e);

        let node = args.get_node("clip").map_err(err)?;
        let mut vi = node
            .video_info()
            .ok_or("DuplicateFrames: clip must be video")?;

        let mut dups = Vec::new();
        for f in args.get_int_array("frames").map_err(err)? {
            if f < 0 || f as i32 > vi.num_frames - 1 {
                return Err("DuplicateFrames: out of bounds frame number".to_owned());
            }
            dups.push(f as i32);
        }
        dups.sort_unstable();

        if vi.num_frames.checked_add(dups.len() as i32).is_none() {
            return Err("DuplicateFrames: resulting clip is too long".to_owned());
        }
        vi.num_frames += dups.len() as i32;

        let deps = vec![FilterDependency::new(node.clone(), RequestPattern::General)];
        core.create_video_filter(
            "DuplicateFrames",
            &vi,
            FilterMode::Parallel,
            deps,
            DuplicateFrames { node, dups },
        )
    }

    fn map(&self, mut n: i32) -> i32 {
        for &dup in &self.dups {
            if n > dup {
                n -= 1;
            } else {
                break;
            }
        }
        n
    }
}

impl Filter for DuplicateFrames {
    fn get_frame(
        &self,
        n: i32,
        reason: ActivationReason,
        frame_data: &mut FrameData,
        ctx: &mut FrameContext,
    ) -> Result<Option<Frame>, String> {
        match reason {
            ActivationReason::Initial => {
                let src = self.map(n);
                frame_data.set(src);
                self.node.request_frame_filter(src, ctx);
                Ok(None)
            }
            ActivationReason::AllFramesReady => {
                let src = frame_data.take::<i32>().unwrap();
                Ok(self.node.get_frame_filter(src, ctx))
            }
            ActivationReason::Error => {
                frame_data.clear();
                Ok(None)
            }
        }
    }
}

//////////////////////////////////////////
// DeleteFrames

pub struct DeleteFrames {
    node: Node,
    del: Vec<i32>,
}

impl DeleteFrames {
    /// Arguments: `clip`, `frames` (indices to delete).
    pub fn create(core: &Core, args: &Map) -> Result<Node, String> {
        let err = |e: crate::map::MapError| format!("DeleteFrames: {}", e);

        let node = args.get_node("clip").map_err(err)?;
        let mut vi = node.video_info().ok_or("DeleteFrames: clip must be video")?;

        let mut del = Vec::new();
        for f in args.get_int_array("frames").map_err(err)? {
            if f < 0 || f as i32 >= vi.num_frames {
                return Err("DeleteFrames: out of bounds frame number".to_owned());
            }
            del.push(f as i32);
        }
        del.sort_unstable();

        if del.windows(2).any(|w| w[0] == w[1]) {
            return Err("DeleteFrames: can't delete a frame more than once".to_owned());
        }

        vi.num_frames -= del.len() as i32;
        if vi.num_frames <= 0 {
            return Err("DeleteFrames: can't delete all frames".to_owned());
        }

        let deps = vec![FilterDependency::new(node.clone(), RequestPattern::NoFrameReuse)];
        core.create_video_filter("DeleteFrames", &vi, FilterMode::Parallel, deps, DeleteFrames {
            node,
            del,
        })
    }

    fn map(&self, mut n: i32) -> i32 {
        for &del in &self.del {
            if n >= del {
                n += 1;
            } else {
                break;
            }
        }
        n
    }
}

impl Filter for DeleteFrames {
    fn get_frame(
        &self,
        n: i32,
        reason: ActivationReason,
        frame_data: &mut FrameData,
        ctx: &mut FrameContext,
    ) -> Result<Option<Frame>, String> {
        match reason {
            ActivationReason::Initial => {
                let src = self.map(n);
                frame_data.set(src);
                self.node.request_frame_filter(src, ctx);
                Ok(None)
            }
            ActivationReason::AllFramesReady => {
                let src = frame_data.take::<i32>().unwrap();
                Ok(self.node.get_frame_filter(src, ctx))
            }
            ActivationReason::Error => {
                frame_data.clear();
                Ok(None)
            }
        }
    }
}

//////////////////////////////////////////
// FreezeFrames

#[derive(Clone, Copy)]
struct Freeze {
    first: i32,
    last: i32,
    replacement: i32,
}

pub struct FreezeFrames {
    node: Node,
    freeze: Vec<Freeze>,
}

impl FreezeFrames {
    /// Arguments: `clip`, `first`, `last`, `replacement` (parallel arrays of
    /// sorted, non-overlapping ranges).
    pub fn create(core: &Core, args: &Map) -> Result<Node, String> {
        let err = |e: crate::map::MapError| format!("FreezeFrames: {}", e);

        let firsts = opt_int_array(args, "first").map_err(err)?.unwrap_or_default();
        let lasts = opt_int_array(args, "last").map_err(err)?.unwrap_or_default();
        let replacements = opt_int_array(args, "replacement")
            .map_err(err)?
            .unwrap_or_default();

        if firsts.len() != lasts.len() || firsts.len() != replacements.len() {
            return Err(
                "FreezeFrames: 'first', 'last', and 'replacement' must have the same length."
                    .to_owned(),
            );
        }

        let node = args.get_node("clip").map_err(err)?;
        if firsts.is_empty() {
            return Ok(node);
        }

        let vi = node.video_info().ok_or("FreezeFrames: clip must be video")?;

        let mut freeze = Vec::with_capacity(firsts.len());
        for i in 0..firsts.len() {
            let (mut first, mut last) = (firsts[i] as i32, lasts[i] as i32);
            if first > last {
                std::mem::swap(&mut first, &mut last);
            }
            let replacement = replacements[i] as i32;
            if first < 0
                || last >= vi.num_frames
                || replacement < 0
                || replacement >= vi.num_frames
            {
                return Err("FreezeFrames: out of bounds frame number(s)".to_owned());
            }
            freeze.push(Freeze {
                first,
                last,
                replacement,
            });
        }

        freeze.sort_by_key(|f| f.first);
        if freeze.windows(2).any(|w| w[0].last >= w[1].first) {
            return Err("FreezeFrames: the frame ranges must not overlap".to_owned());
        }

        let deps = vec![FilterDependency::new(node.clone(), RequestPattern::General)];
        core.create_video_filter("FreezeFrames", &vi, FilterMode::Parallel, deps, FreezeFrames {
            node,
            freeze,
        })
    }

    fn map(&self, n: i32) -> i32 {
        if n >= self.freeze.first().unwrap().first && n <= self.freeze.last().unwrap().last {
            for range in &self.freeze {
                if n >= range.first && n <= range.last {
                    return range.replacement;
                }
            }
        }
        n
    }
}

impl Filter for FreezeFrames {
    fn get_frame(
        &self,
        n: i32,
        reason: ActivationReason,
        frame_data: &mut FrameData,
        ctx: &mut FrameContext,
    ) -> Result<Option<Frame>, String> {
        match reason {
            ActivationReason::Initial => {
                let src = self.map(n);
                frame_data.set(src);
                self.node.request_frame_filter(src, ctx);
                Ok(None)
            }
            ActivationReason::AllFramesReady => {
                let src = frame_data.take::<i32>().unwrap();
                Ok(self.node.get_frame_filter(src, ctx))
            }
            ActivationReason::Error => {
                frame_data.clear();
                Ok(None)
            }
        }
    }
}

