use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::core::Core;
use crate::filter::{
    ActivationReason, Filter, FilterDependency, FilterMode, FrameData, RequestPattern,
};
use crate::format::{VideoFormat, VideoInfo};
use crate::frame::{Frame, FrameContext};
use crate::map::Map;
use crate::node::{CacheMode, Node};

fn gray_vi(num_frames: i32) -> VideoInfo {
    VideoInfo {
        format: VideoFormat::gray8(),
        fps_num: 24,
        fps_den: 1,
        width: 16,
        height: 16,
        num_frames,
    }
}

/// Source whose frame `n` is filled with the value `n`, with optional
/// instrumentation and delays.
struct ValueSource {
    invocations: Arc<AtomicUsize>,
    delay: Duration,
}

impl Filter for ValueSource {
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
        self.invocations.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        let mut frame = Frame::new_video_frame(&VideoFormat::gray8(), 16, 16, None);
        for y in 0..16 {
            frame.row_mut::<u8>(0, y).fill(n as u8);
        }
        Ok(Some(frame))
    }
}

fn value_source(core: &Core, num_frames: i32) -> (Node, Arc<AtomicUsize>) {
    let invocations = Arc::new(AtomicUsize::new(0));
    let node = core
        .create_video_filter(
            "ValueSource",
            &gray_vi(num_frames),
            FilterMode::Parallel,
            Vec::new(),
            ValueSource {
                invocations: invocations.clone(),
                delay: Duration::ZERO,
            },
        )
        .unwrap();
    (node, invocations)
}

fn frame_value(frame: &Frame) -> u8 {
    frame.row::<u8>(0, 0)[0]
}

#[test]
fn test_core_info() {
    let core = Core::with_threads(3);
    let info = core.info();
    assert_eq!(info.num_threads, 3);
    assert!(info.version_string.starts_with("framesynth"));
}

#[test]
fn test_source_frame_roundtrip() {
    let core = Core::with_threads(2);
    let (node, _) = value_source(&core, 10);

    for n in [0usize, 5, 9] {
        let frame = node.get_frame(n).unwrap();
        assert_eq!(frame_value(&frame), n as u8);
    }

    assert!(node.get_frame(10).is_err());
}

#[test]
fn test_frame_cache_hit() {
    let core = Core::with_threads(2);
    let (node, invocations) = value_source(&core, 10);

    node.get_frame(3).unwrap();
    node.get_frame(3).unwrap();

    assert_eq!(invocations.load(Ordering::SeqCst), 1);
}

#[test]
fn test_force_disabled_cache() {
    let core = Core::with_threads(2);
    let (node, invocations) = value_source(&core, 10);
    node.set_cache_mode(CacheMode::ForceDisable);

    node.get_frame(3).unwrap();
    node.get_frame(3).unwrap();

    assert_eq!(invocations.load(Ordering::SeqCst), 2);
}

#[test]
fn test_no_frame_reuse_consumer_disables_upstream_cache() {
    let core = Core::with_threads(2);
    let (source, invocations) = value_source(&core, 10);

    // Registering a NoFrameReuse consumer turns the source cache off.
    let _consumer = core
        .create_video_filter(
            "Passthrough",
            &gray_vi(10),
            FilterMode::Parallel,
            vec![FilterDependency::new(source.clone(), RequestPattern::NoFrameReuse)],
            Passthrough { node: source.clone() },
        )
        .unwrap();

    source.get_frame(1).unwrap();
    source.get_frame(1).unwrap();
    assert_eq!(invocations.load(Ordering::SeqCst), 2);
}

struct Passthrough {
    node: Node,
}

impl Filter for Passthrough {
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
            ActivationReason::AllFramesReady => Ok(self.node.get_frame_filter(n, ctx)),
            ActivationReason::Error => Ok(None),
        }
    }
}

/// Counts the exact upstream indices requested per output frame.
struct RequestRecorder {
    node: Node,
    requests: Arc<Mutex<Vec<i32>>>,
}

impl Filter for RequestRecorder {
    fn get_frame(
        &self,
        n: i32,
        reason: ActivationReason,
        _frame_data: &mut FrameData,
        ctx: &mut FrameContext,
    ) -> Result<Option<Frame>, String> {
        match reason {
            ActivationReason::Initial => {
                self.requests.lock().push(n);
                self.node.request_frame_filter(n, ctx);
                Ok(None)
            }
            ActivationReason::AllFramesReady => Ok(self.node.get_frame_filter(n, ctx)),
            ActivationReason::Error => Ok(None),
        }
    }
}

#[test]
fn test_strict_spatial_requests_exactly_one_upstream_frame() {
    let core = Core::with_threads(2);
    let (source, invocations) = value_source(&core, 10);
    source.set_cache_mode(CacheMode::ForceDisable);

    let requests = Arc::new(Mutex::new(Vec::new()));
    let filter = core
        .create_video_filter(
            "Recorder",
            &gray_vi(10),
            FilterMode::Parallel,
            vec![FilterDependency::new(source.clone(), RequestPattern::StrictSpatial)],
            RequestRecorder {
                node: source,
                requests: requests.clone(),
            },
        )
        .unwrap();

    let frame = filter.get_frame(4).unwrap();
    assert_eq!(frame_value(&frame), 4);

    // Exactly one request, for exactly the same index.
    assert_eq!(*requests.lock(), vec![4]);
    assert_eq!(invocations.load(Ordering::SeqCst), 1);
}

#[test]
fn test_concurrent_requests_coalesce() {
    let core = Core::with_threads(4);
    let invocations = Arc::new(AtomicUsize::new(0));
    let node = core
        .create_video_filter(
            "SlowSource",
            &gray_vi(4),
            FilterMode::Parallel,
            Vec::new(),
            ValueSource {
                invocations: invocations.clone(),
                delay: Duration::from_millis(50),
            },
        )
        .unwrap();

    let done = Arc::new(AtomicUsize::new(0));
    for _ in 0..8 {
        let done = done.clone();
        node.get_frame_async(2, move |result, n, _| {
            assert_eq!(n, 2);
            assert_eq!(frame_value(&result.unwrap()), 2);
            done.fetch_add(1, Ordering::SeqCst);
        });
    }

    while done.load(Ordering::SeqCst) < 8 {
        std::thread::sleep(Duration::from_millis(5));
    }

    // All eight requests observed the same result from a single invocation.
    assert_eq!(invocations.load(Ordering::SeqCst), 1);
}

#[test]
fn test_get_frame_future() {
    let core = Core::with_threads(2);
    let (node, _) = value_source(&core, 10);

    let frame = futures::executor::block_on(node.get_frame_future(6)).unwrap();
    assert_eq!(frame_value(&frame), 6);
}

/// Records the order in which AllFramesReady fires.
struct OrderRecorder {
    node: Node,
    order: Arc<Mutex<Vec<i32>>>,
}

impl Filter for OrderRecorder {
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
                self.order.lock().push(n);
                Ok(self.node.get_frame_filter(n, ctx))
            }
            ActivationReason::Error => Ok(None),
        }
    }
}

#[test]
fn test_frame_state_delivers_in_ascending_order() {
    let core = Core::with_threads(4);
    // The source is slow enough that every request is registered before the
    // first delivery happens.
    let source = core
        .create_video_filter(
            "SlowSource",
            &gray_vi(16),
            FilterMode::Parallel,
            Vec::new(),
            ValueSource {
                invocations: Arc::new(AtomicUsize::new(0)),
                delay: Duration::from_millis(20),
            },
        )
        .unwrap();

    let order = Arc::new(Mutex::new(Vec::new()));
    let filter = core
        .create_video_filter(
            "Ordered",
            &gray_vi(16),
            FilterMode::FrameState,
            vec![FilterDependency::new(source.clone(), RequestPattern::StrictSpatial)],
            OrderRecorder {
                node: source,
                order: order.clone(),
            },
        )
        .unwrap();

    let done = Arc::new(AtomicUsize::new(0));
    // Issue requests in descending order to stress the gate.
    for n in (0..16).rev() {
        let done = done.clone();
        filter.get_frame_async(n as usize, move |result, _, _| {
            result.unwrap();
            done.fetch_add(1, Ordering::SeqCst);
        });
    }

    while done.load(Ordering::SeqCst) < 16 {
        std::thread::sleep(Duration::from_millis(5));
    }

    let recorded = order.lock().clone();
    let mut sorted = recorded.clone();
    sorted.sort_unstable();
    assert_eq!(recorded, sorted, "AllFramesReady ran out of order");
    assert_eq!(recorded.len(), 16);
}

struct FailingSource;

impl Filter for FailingSource {
    fn get_frame(
        &self,
        n: i32,
        reason: ActivationReason,
        _frame_data: &mut FrameData,
        ctx: &mut FrameContext,
    ) -> Result<Option<Frame>, String> {
        if reason != ActivationReason::Initial {
            return Ok(None);
        }
        if n == 3 {
            ctx.set_filter_error("FailingSource: frame 3 is broken");
            return Ok(None);
        }
        Ok(Some(Frame::new_video_frame(&VideoFormat::gray8(), 16, 16, None)))
    }
}

#[test]
fn test_error_propagates_to_downstream_waiters() {
    let core = Core::with_threads(2);
    let source = core
        .create_video_filter(
            "FailingSource",
            &gray_vi(10),
            FilterMode::Parallel,
            Vec::new(),
            FailingSource,
        )
        .unwrap();

    let filter = core
        .create_video_filter(
            "Passthrough",
            &gray_vi(10),
            FilterMode::Parallel,
            vec![FilterDependency::new(source.clone(), RequestPattern::StrictSpatial)],
            Passthrough { node: source },
        )
        .unwrap();

    assert!(filter.get_frame(0).is_ok());

    let err = filter.get_frame(3).unwrap_err();
    assert!(err.message().contains("FailingSource"), "got: {}", err);

    // Errors are cached and re-requests yield the same error.
    let err2 = filter.get_frame(3).unwrap_err();
    assert_eq!(err, err2);
}

#[test]
fn test_blank_clip_source() {
    let core = Core::with_threads(2);
    let mut args = Map::new();
    args.set_int("width", 32).unwrap();
    args.set_int("height", 8).unwrap();
    args.set_int("format", VideoFormat::gray8().id() as i64).unwrap();
    args.set_int("length", 5).unwrap();
    args.set_float_array("color", vec![77.0]).unwrap();

    let node = crate::filters::source::BlankClip::create(&core, &args).unwrap();
    let frame = node.get_frame(2).unwrap();
    assert_eq!(frame_value(&frame), 77);
    assert_eq!(frame.duration(), Some((1, 24)));
}
