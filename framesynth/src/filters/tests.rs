//! End-to-end filter tests driving the full request pipeline.

use crate::core::Core;
use crate::filter::{ActivationReason, Filter, FilterMode, FrameData};
use crate::format::{VideoFormat, VideoInfo, AUDIO_FRAME_SAMPLES};
use crate::frame::{Frame, FrameContext};
use crate::map::Map;
use crate::node::Node;

fn gray_vi(width: i32, height: i32, num_frames: i32) -> VideoInfo {
    VideoInfo {
        format: VideoFormat::gray8(),
        fps_num: 30,
        fps_den: 1,
        width,
        height,
        num_frames,
    }
}

/// Frame `n` is filled with the constant value `n`.
struct ValueClip {
    vi: VideoInfo,
}

impl Filter for ValueClip {
    fn get_frame(
        &self,
        n: i32,
        reason: ActivationReason,
        _frame_data: &mut FrameData,
        _ctx: &mut FrameContext,
    ) -> Result<Option<Frame>, String> {
        if reason != ActivationReason::Initial {
            return Ok(None);
        }
        let mut frame =
            Frame::new_video_frame(&self.vi.format, self.vi.width, self.vi.height, None);
        for y in 0..self.vi.height {
            frame.row_mut::<u8>(0, y).fill(n as u8);
        }
        frame.set_duration(i64::from(self.vi.fps_den), i64::from(self.vi.fps_num));
        Ok(Some(frame))
    }
}

fn value_clip(core: &Core, num_frames: i32) -> Node {
    let vi = gray_vi(16, 16, num_frames);
    core.create_video_filter("ValueClip", &vi, FilterMode::Parallel, Vec::new(), ValueClip {
        vi,
    })
    .unwrap()
}

/// Every frame carries a horizontal ramp `pixel(x) = x`.
struct RampClip {
    vi: VideoInfo,
}

impl Filter for RampClip {
    fn get_frame(
        &self,
        _n: i32,
        reason: ActivationReason,
        _frame_data: &mut FrameData,
        _ctx: &mut FrameContext,
    ) -> Result<Option<Frame>, String> {
        if reason != ActivationReason::Initial {
            return Ok(None);
        }
        let mut frame =
            Frame::new_video_frame(&self.vi.format, self.vi.width, self.vi.height, None);
        for y in 0..self.vi.height {
            for (x, v) in frame.row_mut::<u8>(0, y).iter_mut().enumerate() {
                *v = x as u8;
            }
        }
        Ok(Some(frame))
    }
}

fn ramp_clip(core: &Core, width: i32, height: i32, num_frames: i32) -> Node {
    let vi = gray_vi(width, height, num_frames);
    core.create_video_filter("RampClip", &vi, FilterMode::Parallel, Vec::new(), RampClip { vi })
        .unwrap()
}

/// Per-pixel pattern distinguishing frame, row and column.
struct PatternClip {
    vi: VideoInfo,
}

impl Filter for PatternClip {
    fn get_frame(
        &self,
        n: i32,
        reason: ActivationReason,
        _frame_data: &mut FrameData,
        _ctx: &mut FrameContext,
    ) -> Result<Option<Frame>, String> {
        if reason != ActivationReason::Initial {
            return Ok(None);
        }
        let mut frame =
            Frame::new_video_frame(&self.vi.format, self.vi.width, self.vi.height, None);
        for y in 0..self.vi.height {
            for (x, v) in frame.row_mut::<u8>(0, y).iter_mut().enumerate() {
                *v = (n * 31 + y * 7 + x as i32) as u8;
            }
        }
        Ok(Some(frame))
    }
}

fn pattern_clip(core: &Core, num_frames: i32) -> Node {
    let vi = gray_vi(16, 8, num_frames);
    core.create_video_filter(
        "PatternClip",
        &vi,
        FilterMode::Parallel,
        Vec::new(),
        PatternClip { vi },
    )
    .unwrap()
}

fn frame_value(frame: &Frame) -> u8 {
    frame.row::<u8>(0, 0)[0]
}

fn clip_values(node: &Node) -> Vec<u8> {
    let n = node.video_info().unwrap().num_frames;
    (0..n as usize)
        .map(|i| frame_value(&node.get_frame(i).unwrap()))
        .collect()
}

fn assert_same_clip(a: &Node, b: &Node) {
    let n = a.video_info().unwrap().num_frames;
    assert_eq!(n, b.video_info().unwrap().num_frames);
    for i in 0..n as usize {
        assert_eq!(
            a.get_frame(i).unwrap(),
            b.get_frame(i).unwrap(),
            "frame {} differs",
            i
        );
    }
}

//////////////////////////////////////////
// Reorder filters

#[test]
fn test_trim_then_reverse() {
    let core = Core::with_threads(2);
    let clip = value_clip(&core, 8);

    let mut args = Map::new();
    args.set_node("clip", &clip).unwrap();
    args.set_int("first", 2).unwrap();
    args.set_int("last", 5).unwrap();
    let trimmed = super::reorder::Trim::create(&core, &args).unwrap();
    assert_eq!(clip_values(&trimmed), vec![2, 3, 4, 5]);

    let mut args = Map::new();
    args.set_node("clip", &trimmed).unwrap();
    let reversed = super::reorder::Reverse::create(&core, &args).unwrap();
    assert_eq!(clip_values(&reversed), vec![5, 4, 3, 2]);
}

#[test]
fn test_trim_validation() {
    let core = Core::with_threads(1);
    let clip = value_clip(&core, 8);

    let mut args = Map::new();
    args.set_node("clip", &clip).unwrap();
    args.set_int("last", 3).unwrap();
    args.set_int("length", 3).unwrap();
    assert!(super::reorder::Trim::create(&core, &args)
        .unwrap_err()
        .contains("both last frame and length"));

    // A no-op trim passes the input through.
    let mut args = Map::new();
    args.set_node("clip", &clip).unwrap();
    let same = super::reorder::Trim::create(&core, &args).unwrap();
    assert_eq!(same, clip);
}

#[test]
fn test_reverse_reverse_is_identity() {
    let core = Core::with_threads(2);
    let clip = pattern_clip(&core, 6);

    let mut args = Map::new();
    args.set_node("clip", &clip).unwrap();
    let once = super::reorder::Reverse::create(&core, &args).unwrap();

    let mut args = Map::new();
    args.set_node("clip", &once).unwrap();
    let twice = super::reorder::Reverse::create(&core, &args).unwrap();

    assert_same_clip(&clip, &twice);
}

#[test]
fn test_splice_and_passthrough() {
    let core = Core::with_threads(2);
    let a = value_clip(&core, 3);
    let b = value_clip(&core, 2);

    let mut args = Map::new();
    args.set_node("clips", &a).unwrap();
    args.append_node("clips", &b).unwrap();
    let spliced = super::reorder::Splice::create(&core, &args).unwrap();
    assert_eq!(spliced.video_info().unwrap().num_frames, 5);
    assert_eq!(clip_values(&spliced), vec![0, 1, 2, 0, 1]);

    // Splice([c]) is c itself.
    let mut args = Map::new();
    args.set_node("clips", &a).unwrap();
    let single = super::reorder::Splice::create(&core, &args).unwrap();
    assert_eq!(single, a);
}

#[test]
fn test_interleave() {
    let core = Core::with_threads(2);
    let a = value_clip(&core, 3);
    let b = value_clip(&core, 3);

    let mut args = Map::new();
    args.set_node("clips", &a).unwrap();
    args.append_node("clips", &b).unwrap();
    args.set_int("modify_duration", 0).unwrap();
    let node = super::reorder::Interleave::create(&core, &args).unwrap();

    assert_eq!(node.video_info().unwrap().num_frames, 6);
    assert_eq!(clip_values(&node), vec![0, 0, 1, 1, 2, 2]);
}

#[test]
fn test_loop_repeats_frames() {
    let core = Core::with_threads(2);
    let clip = value_clip(&core, 3);

    let mut args = Map::new();
    args.set_node("clip", &clip).unwrap();
    args.set_int("times", 2).unwrap();
    let node = super::reorder::Loop::create(&core, &args).unwrap();
    assert_eq!(clip_values(&node), vec![0, 1, 2, 0, 1, 2]);

    // Loop(c, 1) is c itself.
    let mut args = Map::new();
    args.set_node("clip", &clip).unwrap();
    args.set_int("times", 1).unwrap();
    let same = super::reorder::Loop::create(&core, &args).unwrap();
    assert_eq!(same, clip);
}

#[test]
fn test_select_every() {
    let core = Core::with_threads(2);
    let clip = value_clip(&core, 8);

    // Selecting every offset of the cycle is the identity.
    let mut args = Map::new();
    args.set_node("clip", &clip).unwrap();
    args.set_int("cycle", 4).unwrap();
    args.set_int_array("offsets", vec![0, 1, 2, 3]).unwrap();
    args.set_int("modify_duration", 0).unwrap();
    let identity = super::reorder::SelectEvery::create(&core, &args).unwrap();
    assert_eq!(clip_values(&identity), vec![0, 1, 2, 3, 4, 5, 6, 7]);

    // Odd frames only.
    let mut args = Map::new();
    args.set_node("clip", &clip).unwrap();
    args.set_int("cycle", 2).unwrap();
    args.set_int_array("offsets", vec![1]).unwrap();
    args.set_int("modify_duration", 0).unwrap();
    let odd = super::reorder::SelectEvery::create(&core, &args).unwrap();
    assert_eq!(clip_values(&odd), vec![1, 3, 5, 7]);
}

#[test]
fn test_duplicate_and_delete_frames() {
    let core = Core::with_threads(2);
    let clip = value_clip(&core, 5);

    let mut args = Map::new();
    args.set_node("clip", &clip).unwrap();
    args.set_int_array("frames", vec![1, 3]).unwrap();
    let dup = super::reorder::DuplicateFrames::create(&core, &args).unwrap();
    assert_eq!(clip_values(&dup), vec![0, 1, 1, 2, 3, 3, 4]);

    let mut args = Map::new();
    args.set_node("clip", &clip).unwrap();
    args.set_int_array("frames", vec![0, 2]).unwrap();
    let del = super::reorder::DeleteFrames::create(&core, &args).unwrap();
    assert_eq!(clip_values(&del), vec![1, 3, 4]);

    let mut args = Map::new();
    args.set_node("clip", &clip).unwrap();
    args.set_int_array("frames", vec![2, 2]).unwrap();
    assert!(super::reorder::DeleteFrames::create(&core, &args)
        .unwrap_err()
        .contains("more than once"));
}

#[test]
fn test_freeze_frames() {
    let core = Core::with_threads(2);
    let clip = value_clip(&core, 10);

    let mut args = Map::new();
    args.set_node("clip", &clip).unwrap();
    args.set_int_array("first", vec![2, 6]).unwrap();
    args.set_int_array("last", vec![4, 8]).unwrap();
    args.set_int_array("replacement", vec![0, 9]).unwrap();
    let frozen = super::reorder::FreezeFrames::create(&core, &args).unwrap();

    assert_eq!(clip_values(&frozen), vec![0, 1, 0, 0, 0, 5, 9, 9, 9, 9]);
}

//////////////////////////////////////////
// Field filters

#[test]
fn test_separate_fields_weave_roundtrip() {
    let core = Core::with_threads(2);
    let clip = pattern_clip(&core, 4);

    let mut args = Map::new();
    args.set_node("clip", &clip).unwrap();
    args.set_int("tff", 1).unwrap();
    let fields = super::field::SeparateFields::create(&core, &args).unwrap();

    let fvi = fields.video_info().unwrap();
    assert_eq!(fvi.num_frames, 8);
    assert_eq!(fvi.height, 4);

    // Field metadata: even output frames carry the top field.
    let top = fields.get_frame(0).unwrap();
    assert_eq!(top.field(), Some(crate::frame::Field::Top));
    let bottom = fields.get_frame(1).unwrap();
    assert_eq!(bottom.field(), Some(crate::frame::Field::Bottom));

    let mut args = Map::new();
    args.set_node("clip", &fields).unwrap();
    args.set_int("tff", 1).unwrap();
    let woven = super::field::DoubleWeave::create(&core, &args).unwrap();

    assert_same_clip(&clip, &woven);
}

//////////////////////////////////////////
// Expr

#[test]
fn test_expr_saturating_double() {
    let core = Core::with_threads(2);
    let mut args = Map::new();
    args.set_int("width", 32).unwrap();
    args.set_int("height", 8).unwrap();
    args.set_int("format", VideoFormat::gray8().id() as i64).unwrap();
    args.set_int("length", 3).unwrap();
    args.set_float_array("color", vec![128.0]).unwrap();
    let clip = super::source::BlankClip::create(&core, &args).unwrap();

    let mut args = Map::new();
    args.set_node("clips", &clip).unwrap();
    args.set_string("expr", "x 2 *").unwrap();
    let node = super::expr::Expr::create(&core, &args).unwrap();

    let frame = node.get_frame(0).unwrap();
    assert!(frame.row::<u8>(0, 3).iter().all(|&v| v == 255));
}

#[test]
fn test_expr_identity_equals_input() {
    let core = Core::with_threads(2);
    let clip = pattern_clip(&core, 3);

    let mut args = Map::new();
    args.set_node("clips", &clip).unwrap();
    args.set_string("expr", "x").unwrap();
    let node = super::expr::Expr::create(&core, &args).unwrap();

    assert_same_clip(&clip, &node);
}

#[test]
fn test_expr_two_inputs() {
    let core = Core::with_threads(2);
    let a = value_clip(&core, 4);
    let b = value_clip(&core, 4);

    let mut args = Map::new();
    args.set_node("clips", &a).unwrap();
    args.append_node("clips", &b).unwrap();
    args.set_string("expr", "x y + 1 +").unwrap();
    let node = super::expr::Expr::create(&core, &args).unwrap();

    assert_eq!(clip_values(&node), vec![1, 3, 5, 7]);
}

//////////////////////////////////////////
// Merge

fn blank_gray(core: &Core, value: f64, width: i32, length: i32) -> Node {
    let mut args = Map::new();
    args.set_int("width", i64::from(width)).unwrap();
    args.set_int("height", 8).unwrap();
    args.set_int("format", VideoFormat::gray8().id() as i64).unwrap();
    args.set_int("length", i64::from(length)).unwrap();
    args.set_float_array("color", vec![value]).unwrap();
    super::source::BlankClip::create(core, &args).unwrap()
}

#[test]
fn test_merge_half() {
    let core = Core::with_threads(2);
    let a = blank_gray(&core, 100.0, 16, 3);
    let b = blank_gray(&core, 200.0, 16, 3);

    let mut args = Map::new();
    args.set_node("clipa", &a).unwrap();
    args.set_node("clipb", &b).unwrap();
    let node = super::merge::Merge::create(&core, &args).unwrap();

    let frame = node.get_frame(0).unwrap();
    assert!(frame.row::<u8>(0, 0).iter().all(|&v| v == 150));
}

#[test]
fn test_merge_extreme_weights_copy_planes() {
    let core = Core::with_threads(2);
    let a = blank_gray(&core, 10.0, 16, 3);
    let b = blank_gray(&core, 20.0, 16, 3);

    for (weight, expected) in [(0.0, 10u8), (1.0, 20u8)] {
        let mut args = Map::new();
        args.set_node("clipa", &a).unwrap();
        args.set_node("clipb", &b).unwrap();
        args.set_float_array("weight", vec![weight]).unwrap();
        let node = super::merge::Merge::create(&core, &args).unwrap();
        assert_eq!(frame_value(&node.get_frame(0).unwrap()), expected);
    }
}

#[test]
fn test_masked_merge_ramp() {
    let core = Core::with_threads(2);
    let a = blank_gray(&core, 0.0, 256, 2);
    let b = blank_gray(&core, 200.0, 256, 2);
    let mask = ramp_clip(&core, 256, 8, 2);

    let mut args = Map::new();
    args.set_node("clipa", &a).unwrap();
    args.set_node("clipb", &b).unwrap();
    args.set_node("mask", &mask).unwrap();
    let node = super::merge::MaskedMerge::create(&core, &args).unwrap();

    let frame = node.get_frame(0).unwrap();
    let row = frame.row::<u8>(0, 0);
    for (i, &v) in row.iter().enumerate() {
        let expected = (200.0 * i as f64 / 255.0).round() as u8;
        assert_eq!(v, expected, "column {}", i);
    }
}

//////////////////////////////////////////
// BoxBlur and generic kernels

#[test]
fn test_boxblur_constant_is_invariant() {
    let core = Core::with_threads(2);
    let clip = blank_gray(&core, 90.0, 16, 2);

    let mut args = Map::new();
    args.set_node("clip", &clip).unwrap();
    let node = super::boxblur::BoxBlur::create(&core, &args).unwrap();

    let frame = node.get_frame(0).unwrap();
    assert!(frame.row::<u8>(0, 4).iter().all(|&v| v == 90));
}

#[test]
fn test_boxblur_radius1_horizontal() {
    let core = Core::with_threads(2);
    let clip = ramp_clip(&core, 16, 8, 1);

    let mut args = Map::new();
    args.set_node("clip", &clip).unwrap();
    args.set_int("vpasses", 0).unwrap();
    let node = super::boxblur::BoxBlur::create(&core, &args).unwrap();

    let frame = node.get_frame(0).unwrap();
    let row = frame.row::<u8>(0, 0);
    // Rolling three-tap average with clamped edges and round-up bias.
    assert_eq!(row[0], (0 + 0 + 1 + 2) / 3);
    for x in 1..15 {
        let sum = (x - 1) + x + (x + 1);
        assert_eq!(row[x] as usize, (sum + 2) / 3, "column {}", x);
    }
}

#[test]
fn test_convolution_identity_matrix() {
    let core = Core::with_threads(2);
    let clip = pattern_clip(&core, 2);

    let mut args = Map::new();
    args.set_node("clip", &clip).unwrap();
    args.set_float_array(
        "matrix",
        vec![0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0],
    )
    .unwrap();
    let node = super::generic::convolution(&core, &args).unwrap();

    assert_same_clip(&clip, &node);
}

#[test]
fn test_convolution_blur_on_constant() {
    let core = Core::with_threads(2);
    let clip = blank_gray(&core, 64.0, 16, 1);

    let mut args = Map::new();
    args.set_node("clip", &clip).unwrap();
    args.set_float_array("matrix", vec![1.0; 9]).unwrap();
    let node = super::generic::convolution(&core, &args).unwrap();

    assert_eq!(frame_value(&node.get_frame(0).unwrap()), 64);
}

#[test]
fn test_min_max_median_on_constant() {
    let core = Core::with_threads(2);
    let clip = blank_gray(&core, 123.0, 16, 1);

    for create in [
        super::generic::minimum as fn(&Core, &Map) -> Result<Node, String>,
        super::generic::maximum,
        super::generic::median,
        super::generic::deflate,
        super::generic::inflate,
    ] {
        let mut args = Map::new();
        args.set_node("clip", &clip).unwrap();
        let node = create(&core, &args).unwrap();
        assert_eq!(frame_value(&node.get_frame(0).unwrap()), 123);
    }
}

#[test]
fn test_minimum_maximum_on_ramp() {
    let core = Core::with_threads(2);
    let clip = ramp_clip(&core, 16, 8, 1);

    let mut args = Map::new();
    args.set_node("clip", &clip).unwrap();
    let minimum = super::generic::minimum(&core, &args).unwrap();
    let frame = minimum.get_frame(0).unwrap();
    // Interior pixels take the value of their left neighbor.
    assert_eq!(frame.row::<u8>(0, 4)[5], 4);

    let mut args = Map::new();
    args.set_node("clip", &clip).unwrap();
    let maximum = super::generic::maximum(&core, &args).unwrap();
    let frame = maximum.get_frame(0).unwrap();
    assert_eq!(frame.row::<u8>(0, 4)[5], 6);
}

#[test]
fn test_invert() {
    let core = Core::with_threads(2);
    let clip = blank_gray(&core, 100.0, 16, 1);

    let mut args = Map::new();
    args.set_node("clip", &clip).unwrap();
    let node = super::generic::invert(&core, &args).unwrap();
    assert_eq!(frame_value(&node.get_frame(0).unwrap()), 155);

    // For gray clips the mask variant behaves identically.
    let mut args = Map::new();
    args.set_node("clip", &clip).unwrap();
    let node = super::generic::invert_mask(&core, &args).unwrap();
    assert_eq!(frame_value(&node.get_frame(0).unwrap()), 155);
}

#[test]
fn test_limiter_clamps_to_range() {
    let core = Core::with_threads(2);
    let clip = ramp_clip(&core, 256, 8, 1);

    let mut args = Map::new();
    args.set_node("clip", &clip).unwrap();
    args.set_float_array("min", vec![50.0]).unwrap();
    args.set_float_array("max", vec![200.0]).unwrap();
    let node = super::generic::limiter(&core, &args).unwrap();

    let frame = node.get_frame(0).unwrap();
    for (x, &v) in frame.row::<u8>(0, 0).iter().enumerate() {
        assert_eq!(v as usize, x.clamp(50, 200), "column {}", x);
    }

    let mut args = Map::new();
    args.set_node("clip", &clip).unwrap();
    args.set_float_array("min", vec![200.0]).unwrap();
    args.set_float_array("max", vec![50.0]).unwrap();
    assert!(super::generic::limiter(&core, &args)
        .unwrap_err()
        .contains("min bigger than max"));
}

#[test]
fn test_binarize_default_threshold() {
    let core = Core::with_threads(2);
    let clip = ramp_clip(&core, 256, 8, 1);

    let mut args = Map::new();
    args.set_node("clip", &clip).unwrap();
    let node = super::generic::binarize(&core, &args).unwrap();

    // Default threshold is the middle of the range, v0/v1 its extremes.
    let frame = node.get_frame(0).unwrap();
    for (x, &v) in frame.row::<u8>(0, 0).iter().enumerate() {
        assert_eq!(v, if x < 128 { 0 } else { 255 }, "column {}", x);
    }
}

#[test]
fn test_levels_identity_and_inversion() {
    let core = Core::with_threads(2);
    let clip = ramp_clip(&core, 256, 8, 1);

    let mut args = Map::new();
    args.set_node("clip", &clip).unwrap();
    let node = super::generic::levels(&core, &args).unwrap();
    assert_same_clip(&clip, &node);

    // Swapping the output range inverts the ramp.
    let mut args = Map::new();
    args.set_node("clip", &clip).unwrap();
    args.set_float("min_out", 255.0).unwrap();
    args.set_float("max_out", 0.0).unwrap();
    let node = super::generic::levels(&core, &args).unwrap();
    let frame = node.get_frame(0).unwrap();
    for (x, &v) in frame.row::<u8>(0, 0).iter().enumerate() {
        assert_eq!(v as usize, 255 - x, "column {}", x);
    }
}

#[test]
fn test_prewitt_flat_is_zero() {
    let core = Core::with_threads(2);
    let clip = blank_gray(&core, 200.0, 16, 1);

    let mut args = Map::new();
    args.set_node("clip", &clip).unwrap();
    let node = super::generic::prewitt(&core, &args).unwrap();
    assert_eq!(frame_value(&node.get_frame(0).unwrap()), 0);

    let mut args = Map::new();
    args.set_node("clip", &clip).unwrap();
    let node = super::generic::sobel(&core, &args).unwrap();
    assert_eq!(frame_value(&node.get_frame(0).unwrap()), 0);
}

//////////////////////////////////////////
// Audio

fn test_audio(core: &Core, length: i64) -> Node {
    let mut args = Map::new();
    args.set_int("length", length).unwrap();
    super::source::TestAudio::create(core, &args).unwrap()
}

fn sample(node: &Node, s: i64) -> u16 {
    let frame_samples = i64::from(AUDIO_FRAME_SAMPLES);
    let frame = node.get_frame((s / frame_samples) as usize).unwrap();
    frame.channel::<u16>(0)[(s % frame_samples) as usize]
}

#[test]
fn test_audio_trim_by_samples() {
    let core = Core::with_threads(2);
    let clip = test_audio(&core, 10 * i64::from(AUDIO_FRAME_SAMPLES));

    let mut args = Map::new();
    args.set_node("clip", &clip).unwrap();
    args.set_int("first", 1000).unwrap();
    args.set_int("length", 5000).unwrap();
    let node = super::audio::AudioTrim::create(&core, &args).unwrap();

    let ai = node.audio_info().unwrap();
    assert_eq!(ai.num_samples, 5000);
    assert_eq!(ai.num_frames, 2);

    // Sample i of the output equals sample i + 1000 of the input.
    for s in [0i64, 1, 2071, 2072, 3071, 3072, 4999] {
        assert_eq!(sample(&node, s), ((s + 1000) % 0xFFFF) as u16, "sample {}", s);
    }

    assert_eq!(
        node.get_frame(1).unwrap().get_length(),
        5000 - AUDIO_FRAME_SAMPLES
    );
}

#[test]
fn test_audio_reverse_roundtrip() {
    let core = Core::with_threads(2);
    let clip = test_audio(&core, 2 * i64::from(AUDIO_FRAME_SAMPLES) + 100);

    let mut args = Map::new();
    args.set_node("clip", &clip).unwrap();
    let once = super::audio::AudioReverse::create(&core, &args).unwrap();

    // First output sample is the last input sample.
    let total = clip.audio_info().unwrap().num_samples;
    assert_eq!(sample(&once, 0), ((total - 1) % 0xFFFF) as u16);

    let mut args = Map::new();
    args.set_node("clip", &once).unwrap();
    let twice = super::audio::AudioReverse::create(&core, &args).unwrap();

    for s in [0i64, 1, 3072, total - 1] {
        assert_eq!(sample(&twice, s), sample(&clip, s), "sample {}", s);
    }
}

#[test]
fn test_audio_splice_concatenates_samples() {
    let core = Core::with_threads(2);
    let a = test_audio(&core, 5000);
    let b = test_audio(&core, 4000);

    let mut args = Map::new();
    args.set_node("clips", &a).unwrap();
    args.append_node("clips", &b).unwrap();
    let node = super::audio::AudioSplice::create(&core, &args).unwrap();

    let ai = node.audio_info().unwrap();
    assert_eq!(ai.num_samples, 9000);

    for s in [0i64, 4999, 5000, 6000, 8999] {
        let expected = if s < 5000 { s } else { s - 5000 };
        assert_eq!(sample(&node, s), (expected % 0xFFFF) as u16, "sample {}", s);
    }
}

#[test]
fn test_audio_loop_wraps_samples() {
    let core = Core::with_threads(2);
    let clip = test_audio(&core, 5000);

    let mut args = Map::new();
    args.set_node("clip", &clip).unwrap();
    args.set_int("times", 3).unwrap();
    let node = super::audio::AudioLoop::create(&core, &args).unwrap();

    assert_eq!(node.audio_info().unwrap().num_samples, 15000);
    for s in [0i64, 5000, 10000, 12345] {
        assert_eq!(sample(&node, s), ((s % 5000) % 0xFFFF) as u16, "sample {}", s);
    }
}

#[test]
fn test_audio_gain() {
    let core = Core::with_threads(2);
    let clip = test_audio(&core, 4000);

    let mut args = Map::new();
    args.set_node("clip", &clip).unwrap();
    args.set_float_array("gain", vec![0.0]).unwrap();
    let node = super::audio::AudioGain::create(&core, &args).unwrap();

    let frame = node.get_frame(0).unwrap();
    assert!(frame.channel::<i16>(0).iter().all(|&v| v == 0));
    assert!(frame.channel::<i16>(1).iter().all(|&v| v == 0));
}

#[test]
fn test_audio_mix_rejects_non_stereo_output() {
    let core = Core::with_threads(2);
    let clip = test_audio(&core, 4000);

    let mut args = Map::new();
    args.set_node("clips", &clip).unwrap();
    args.set_float_array("matrix", vec![1.0, 1.0]).unwrap();
    args.set_int_array("channels_out", vec![0]).unwrap();
    assert!(super::audio::AudioMix::create(&core, &args)
        .unwrap_err()
        .contains("two channels"));
}

#[test]
fn test_shuffle_channels_extracts_mono() {
    let core = Core::with_threads(2);
    let clip = test_audio(&core, 7000);

    let mut args = Map::new();
    args.set_node("clips", &clip).unwrap();
    args.set_int("channels_in", 0).unwrap();
    args.set_int("channels_out", 0).unwrap();
    let node = super::audio::ShuffleChannels::create(&core, &args).unwrap();

    let ai = node.audio_info().unwrap();
    assert_eq!(ai.format.num_channels, 1);
    assert_eq!(ai.num_samples, 7000);

    let src = clip.get_frame(1).unwrap();
    let frame = node.get_frame(1).unwrap();
    assert_eq!(frame.channel::<u16>(0), src.channel::<u16>(0));
}

#[test]
fn test_split_channels() {
    let core = Core::with_threads(2);
    let clip = test_audio(&core, 5000);

    let mut args = Map::new();
    args.set_node("clip", &clip).unwrap();
    let split = super::audio::SplitChannels::create(&core, &args).unwrap();
    assert_eq!(split.len(), 2);

    let src = clip.get_frame(0).unwrap();
    for (channel, mono) in split.iter().enumerate() {
        assert_eq!(mono.audio_info().unwrap().format.num_channels, 1);
        let frame = mono.get_frame(0).unwrap();
        assert_eq!(frame.channel::<u16>(0), src.channel::<u16>(channel as i32));
    }
}

#[test]
fn test_assume_sample_rate() {
    let core = Core::with_threads(2);
    let clip = test_audio(&core, 5000);

    let mut args = Map::new();
    args.set_node("clip", &clip).unwrap();
    args.set_int("samplerate", 48000).unwrap();
    let node = super::audio::AssumeSampleRate::create(&core, &args).unwrap();

    // Only the reported rate changes; samples pass through untouched.
    assert_eq!(node.audio_info().unwrap().sample_rate, 48000);
    assert_eq!(node.get_frame(0).unwrap(), clip.get_frame(0).unwrap());

    let mut args = Map::new();
    args.set_node("clip", &clip).unwrap();
    assert!(super::audio::AssumeSampleRate::create(&core, &args)
        .unwrap_err()
        .contains("source clip or samplerate"));
}

#[test]
fn test_audio_mix_swap_channels() {
    let core = Core::with_threads(2);
    let clip = test_audio(&core, 4000);

    // Swap left and right with a permutation matrix. Both TestAudio channels
    // carry the same ramp, so output equals input.
    let mut args = Map::new();
    args.set_node("clips", &clip).unwrap();
    args.set_float_array("matrix", vec![0.0, 1.0, 1.0, 0.0]).unwrap();
    args.set_int_array("channels_out", vec![0, 1]).unwrap();
    let node = super::audio::AudioMix::create(&core, &args).unwrap();

    let frame = node.get_frame(0).unwrap();
    let src = clip.get_frame(0).unwrap();
    assert_eq!(frame.channel::<i16>(0), src.channel::<i16>(0));
    assert_eq!(frame.channel::<i16>(1), src.channel::<i16>(1));
}
