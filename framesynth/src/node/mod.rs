//! Nodes of the filter graph.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use futures::channel::oneshot;
use parking_lot::Mutex;

use crate::core::sched::{self, FrameJob, Waiter};
use crate::core::CoreInner;
use crate::filter::{Filter, FilterDependency, FilterMode, RequestPattern};
use crate::format::{AudioInfo, MediaType, VideoInfo};
use crate::frame::{Frame, FrameContext};

mod cache;
mod errors;
pub use self::cache::CacheMode;
pub(crate) use self::cache::FrameCache;
pub use self::errors::GetFrameError;

#[derive(Debug, Clone, Copy)]
pub(crate) enum NodeInfo {
    Video(VideoInfo),
    Audio(AudioInfo),
}

impl NodeInfo {
    pub(crate) fn num_frames(&self) -> i32 {
        match self {
            NodeInfo::Video(vi) => vi.num_frames,
            NodeInfo::Audio(ai) => ai.num_frames,
        }
    }
}

pub(crate) struct FrameStateGate {
    /// Indices currently in flight, in ascending order.
    pub requested: BTreeSet<i32>,
    /// Jobs whose delivery phase is ready but must wait for a smaller index.
    pub deferred: BTreeMap<i32, Arc<FrameJob>>,
}

pub(crate) struct NodeInner {
    pub(crate) id: u64,
    pub(crate) name: String,
    pub(crate) info: NodeInfo,
    pub(crate) filter: Box<dyn Filter>,
    pub(crate) mode: FilterMode,
    pub(crate) deps: Vec<(Node, RequestPattern)>,
    pub(crate) core: Arc<CoreInner>,
    /// In-flight frame jobs, used to coalesce concurrent requests.
    pub(crate) jobs: Mutex<HashMap<i32, Arc<FrameJob>>>,
    pub(crate) cache: Mutex<FrameCache>,
    /// Held across any getter invocation of Unordered and FrameState filters.
    pub(crate) serial_lock: Mutex<()>,
    /// Held across AllFramesReady invocations of ParallelRequests filters.
    pub(crate) all_ready_lock: Mutex<()>,
    /// Ascending-order delivery gate for FrameState filters.
    pub(crate) fstate: Mutex<FrameStateGate>,
}

/// A reference to a node in the constructed filter graph.
#[derive(Clone)]
pub struct Node {
    pub(crate) inner: Arc<NodeInner>,
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .finish_non_exhaustive()
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for Node {}

impl Node {
    pub(crate) fn new(
        core: Arc<CoreInner>,
        name: String,
        info: NodeInfo,
        mode: FilterMode,
        deps: Vec<FilterDependency>,
        filter: Box<dyn Filter>,
    ) -> Self {
        for dep in &deps {
            dep.source
                .inner
                .cache
                .lock()
                .register_consumer(dep.request_pattern);
        }

        Self {
            inner: Arc::new(NodeInner {
                id: core.next_node_id(),
                name,
                info,
                filter,
                mode,
                deps: deps
                    .into_iter()
                    .map(|d| (d.source, d.request_pattern))
                    .collect(),
                core,
                jobs: Mutex::new(HashMap::new()),
                cache: Mutex::new(FrameCache::new()),
                serial_lock: Mutex::new(()),
                all_ready_lock: Mutex::new(()),
                fstate: Mutex::new(FrameStateGate {
                    requested: BTreeSet::new(),
                    deferred: BTreeMap::new(),
                }),
            }),
        }
    }

    #[inline]
    pub(crate) fn id(&self) -> u64 {
        self.inner.id
    }

    /// The upstream edges of this node, in registration order.
    pub fn dependencies(&self) -> impl Iterator<Item = (&Node, RequestPattern)> {
        self.inner.deps.iter().map(|(node, pattern)| (node, *pattern))
    }

    /// The name the filter was registered under.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Returns the video info associated with this `Node`, if it outputs
    /// video.
    #[inline]
    pub fn video_info(&self) -> Option<VideoInfo> {
        match self.inner.info {
            NodeInfo::Video(vi) => Some(vi),
            NodeInfo::Audio(_) => None,
        }
    }

    /// Returns the audio info associated with this `Node`, if it outputs
    /// audio.
    #[inline]
    pub fn audio_info(&self) -> Option<AudioInfo> {
        match self.inner.info {
            NodeInfo::Audio(ai) => Some(ai),
            NodeInfo::Video(_) => None,
        }
    }

    #[inline]
    pub fn media_type(&self) -> MediaType {
        match self.inner.info {
            NodeInfo::Video(_) => MediaType::Video,
            NodeInfo::Audio(_) => MediaType::Audio,
        }
    }

    /// Determines the strategy for frame caching. Mostly useful for cache
    /// debugging since the auto mode should work well in just about all
    /// cases.
    ///
    /// Resets the cache to default options when called, discarding
    /// [`Node::set_cache_options`] changes.
    #[inline]
    pub fn set_cache_mode(&self, mode: CacheMode) {
        self.inner.cache.lock().set_mode(mode);
    }

    /// Call after [`Node::set_cache_mode`] or the changes will be discarded.
    /// Sets internal details of a node's associated cache.
    ///
    /// # Arguments
    ///
    /// * `fixed_size`: make the cache always hold `max_size` frames instead
    ///   of resizing adaptively.
    /// * `max_size`: the maximum number of frames to cache.
    /// * `max_history_size`: how many recently evicted frames to keep track
    ///   of, used to determine whether growing the cache is beneficial.
    #[inline]
    pub fn set_cache_options(&self, fixed_size: bool, max_size: usize, max_history_size: usize) {
        self.inner
            .cache
            .lock()
            .set_options(fixed_size, max_size, max_history_size);
    }

    fn check_bounds(&self, n: usize) -> Result<i32, GetFrameError> {
        assert!(n <= i32::MAX as usize);
        let total = self.inner.info.num_frames();
        if n >= total as usize {
            return Err(GetFrameError::new(
                "Requested frame number beyond the last one".to_owned(),
            ));
        }
        Ok(n as i32)
    }

    /// Generates a frame directly, blocking until it is produced.
    ///
    /// Must not be called from inside a filter; use the request machinery
    /// instead, or the worker pool can end up waiting on itself.
    pub fn get_frame(&self, n: usize) -> Result<Frame, GetFrameError> {
        let n = self.check_bounds(n)?;
        let (sender, receiver) = oneshot::channel();
        sched::request_frame(
            self,
            n,
            Waiter::Callback(Box::new(move |result| {
                let _ = sender.send(result);
            })),
        );
        futures::executor::block_on(receiver)
            .expect("worker pool dropped the request")
            .map_err(GetFrameError::new)
    }

    /// Requests the generation of a frame. When the frame is ready, a
    /// user-provided function is called.
    ///
    /// If multiple frames were requested, they can be returned in any order.
    pub fn get_frame_async<F>(&self, n: usize, callback: F)
    where
        F: FnOnce(Result<Frame, GetFrameError>, usize, Node) + Send + 'static,
    {
        let node = self.clone();
        let n_checked = match self.check_bounds(n) {
            Ok(v) => v,
            Err(e) => {
                callback(Err(e), n, node);
                return;
            }
        };
        sched::request_frame(
            self,
            n_checked,
            Waiter::Callback(Box::new(move |result| {
                callback(result.map_err(GetFrameError::new), n, node);
            })),
        );
    }

    /// Returns a future that resolves to the frame at the given index `n`.
    pub fn get_frame_future(
        &self,
        n: usize,
    ) -> impl std::future::Future<Output = Result<Frame, String>> {
        let (sender, receiver) = oneshot::channel();
        self.get_frame_async(n, move |result, _, _| {
            let result: Result<Frame, String> = result.map_err(|e| e.into_inner());
            let _ = sender.send(result);
        });

        async move { receiver.await.unwrap() }
    }

    /// Request a frame from a node (used in a filter's `Initial` phase).
    ///
    /// The frame number is clamped to the clip length.
    #[inline]
    pub fn request_frame_filter(&self, n: i32, ctx: &mut FrameContext) {
        let n = n.clamp(0, self.inner.info.num_frames() - 1);
        ctx.push_request(self, n);
    }

    /// Get a requested frame from a node (used in a filter's
    /// `AllFramesReady` phase). Returns `None` only if the frame was never
    /// requested during the `Initial` phase of the same context.
    #[inline]
    pub fn get_frame_filter(&self, n: i32, ctx: &FrameContext) -> Option<Frame> {
        let n = n.clamp(0, self.inner.info.num_frames() - 1);
        ctx.resolved_frame(self, n)
    }
}
