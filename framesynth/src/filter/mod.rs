//! Module for filter related types and traits.
mod traits;

use crate::node::Node;

pub use traits::{Filter, FrameData};

/// One upstream edge of a filter node.
pub struct FilterDependency {
    pub source: Node,
    pub request_pattern: RequestPattern,
}

impl FilterDependency {
    pub fn new(source: Node, request_pattern: RequestPattern) -> Self {
        Self {
            source,
            request_pattern,
        }
    }
}

/// Describes the temporal access pattern a filter has on one of its inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestPattern {
    /// Anything goes. Note that filters that may be requesting beyond the end
    /// of a clip (repeating the last frame) should use General and not any of
    /// the other modes.
    General,
    /// Will only request an input frame at most once if all output frames are
    /// requested exactly one time. This includes filters such as Trim,
    /// Reverse, SelectEvery.
    NoFrameReuse,
    /// Only requests frame N to output frame N. The main difference to
    /// `NoFrameReuse` is that the requested frame is always fixed and known
    /// ahead of time. Filter examples Lut, Expr (conditionally, see General
    /// note) and similar.
    StrictSpatial,
    /// Basically identical to `NoFrameReuse` except that it hints the last
    /// requested frame may be requested multiple times.
    FrameReuseLastOnly,
}

/// The phase of the two-phase request protocol a get_frame call is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationReason {
    /// First call for an output frame; declare upstream requests here.
    Initial,
    /// All requested frames have been produced; consume them and emit the
    /// output frame.
    AllFramesReady,
    /// An upstream frame failed. Release per-frame state; the error is
    /// propagated regardless of the return value.
    Error,
}

/// Controls how a filter will be multithreaded, if at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    /// Completely parallel execution. Multiple threads will call a filter's
    /// get_frame function, to fetch several frames in parallel.
    Parallel,
    /// For filters that are serial in nature but can request in advance one
    /// or more frames they need. A filter's get_frame function will be called
    /// from multiple threads at a time with activation reason
    /// [`ActivationReason::Initial`], but only one thread will call it with
    /// activation reason [`ActivationReason::AllFramesReady`] at a time.
    ParallelRequests,
    /// Only one thread can call the filter's get_frame function at a time.
    /// Useful for filters that modify or examine their internal state to
    /// determine which frames to request.
    ///
    /// While the get_frame function will only run in one thread at a time,
    /// the calls can happen in any order. For example, it can be called with
    /// reason Initial for frame 0, then again with reason Initial for frame 1,
    /// then with reason AllFramesReady for frame 0.
    Unordered,
    /// For compatibility with other filtering architectures. DO NOT USE IN
    /// NEW FILTERS. Only one frame is processed at a time, and output frames
    /// are delivered in strictly ascending order.
    FrameState,
}
