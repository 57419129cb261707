//! The engine core: worker pool, filter registration and frame allocation.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{Receiver, Sender};
use parking_lot::RwLock;

use crate::filter::{Filter, FilterDependency, FilterMode};
use crate::format::{AudioFormat, AudioInfo, VideoFormat, VideoInfo};
use crate::frame::Frame;
use crate::log::{LogHandler, LogRS, MessageType};
use crate::node::{Node, NodeInfo};

pub(crate) mod sched;

#[cfg(test)]
mod tests;

/// Information about a core instance.
#[derive(Debug, Clone)]
pub struct CoreInfo {
    pub version_string: String,
    pub core_version: i32,
    pub num_threads: usize,
}

pub(crate) struct CoreInner {
    pub(crate) sender: Sender<Arc<sched::FrameJob>>,
    num_threads: usize,
    node_ids: AtomicU64,
    log_handlers: RwLock<Vec<Box<dyn LogHandler>>>,
}

impl CoreInner {
    pub(crate) fn next_node_id(&self) -> u64 {
        self.node_ids.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn enqueue(&self, job: Arc<sched::FrameJob>) {
        // Send only fails when every worker is gone, which means the process
        // is tearing down anyway.
        let _ = self.sender.send(job);
    }

    pub(crate) fn log(&self, msg_type: MessageType, msg: &str) {
        for handler in self.log_handlers.read().iter() {
            handler.handle(msg_type, msg);
        }
    }
}

/// A handle to an engine core.
///
/// Cloning is cheap; the worker pool lives until the last handle and the
/// last node created from it are gone.
#[derive(Clone)]
pub struct Core {
    pub(crate) inner: Arc<CoreInner>,
}

impl Core {
    /// Creates a core with one worker thread per CPU.
    pub fn new() -> Self {
        Self::with_threads(num_cpus::get())
    }

    /// Creates a core with an explicit worker thread count.
    pub fn with_threads(num_threads: usize) -> Self {
        let num_threads = num_threads.max(1);
        let (sender, receiver): (_, Receiver<Arc<sched::FrameJob>>) =
            crossbeam_channel::unbounded();

        for i in 0..num_threads {
            let receiver = receiver.clone();
            thread::Builder::new()
                .name(format!("framesynth-worker-{}", i))
                .spawn(move || {
                    while let Ok(job) = receiver.recv() {
                        sched::run_job(&job);
                    }
                })
                .expect("failed to spawn worker thread");
        }

        Self {
            inner: Arc::new(CoreInner {
                sender,
                num_threads,
                node_ids: AtomicU64::new(0),
                log_handlers: RwLock::new(vec![Box::new(LogRS {})]),
            }),
        }
    }

    /// Returns an instance of `CoreInfo`.
    pub fn info(&self) -> CoreInfo {
        CoreInfo {
            version_string: format!("framesynth {}", env!("CARGO_PKG_VERSION")),
            core_version: 1,
            num_threads: self.inner.num_threads,
        }
    }

    /// Installs an additional log handler.
    pub fn add_log_handler(&self, handler: Box<dyn LogHandler>) {
        self.inner.log_handlers.write().push(handler);
    }

    /// Sends a message through the core's log handlers.
    pub fn log_message(&self, msg_type: MessageType, msg: &str) {
        self.inner.log(msg_type, msg);
    }

    /// Creates a new video frame, optionally copying the properties attached
    /// to another frame.
    pub fn new_video_frame(
        &self,
        format: &VideoFormat,
        width: i32,
        height: i32,
        prop_src: Option<&Frame>,
    ) -> Frame {
        Frame::new_video_frame(format, width, height, prop_src)
    }

    /// Creates a new video frame reusing planes of existing frames.
    pub fn new_video_frame2(
        &self,
        format: &VideoFormat,
        width: i32,
        height: i32,
        plane_src: &[Option<&Frame>],
        planes: &[i32],
        prop_src: Option<&Frame>,
    ) -> Frame {
        Frame::new_video_frame2(format, width, height, plane_src, planes, prop_src)
    }

    /// Creates a new audio frame holding `num_samples` samples per channel.
    pub fn new_audio_frame(
        &self,
        format: &AudioFormat,
        num_samples: i32,
        prop_src: Option<&Frame>,
    ) -> Frame {
        Frame::new_audio_frame(format, num_samples, prop_src)
    }

    /// Duplicates the frame: plane data deeply, properties shallowly.
    pub fn copy_frame(&self, frame: &Frame) -> Frame {
        frame.copy_frame()
    }

    /// Registers a video filter node.
    ///
    /// Nodes are created bottom-up (every dependency must already exist), so
    /// the resulting graph is acyclic by construction. On failure every
    /// acquired upstream reference is released before returning.
    pub fn create_video_filter<F: Filter>(
        &self,
        name: &str,
        vi: &VideoInfo,
        mode: FilterMode,
        deps: Vec<FilterDependency>,
        filter: F,
    ) -> Result<Node, String> {
        if vi.num_frames <= 0 {
            return Err(format!("{}: clip must have a known length", name));
        }
        if !vi.is_constant() {
            return Err(format!(
                "{}: clip must have constant format and dimensions",
                name
            ));
        }
        if vi.width % (1 << vi.format.sub_sampling_w) != 0
            || vi.height % (1 << vi.format.sub_sampling_h) != 0
        {
            return Err(format!(
                "{}: dimensions must be divisible by the subsampling",
                name
            ));
        }

        Ok(Node::new(
            self.inner.clone(),
            name.to_owned(),
            NodeInfo::Video(*vi),
            mode,
            deps,
            Box::new(filter),
        ))
    }

    /// Registers an audio filter node. The frame count of the info is derived
    /// from the sample count.
    pub fn create_audio_filter<F: Filter>(
        &self,
        name: &str,
        ai: &AudioInfo,
        mode: FilterMode,
        deps: Vec<FilterDependency>,
        filter: F,
    ) -> Result<Node, String> {
        if ai.num_samples <= 0 {
            return Err(format!("{}: clip must have a known length", name));
        }
        if ai.sample_rate <= 0 {
            return Err(format!("{}: clip must have a valid sample rate", name));
        }

        let ai = AudioInfo::new(ai.format, ai.sample_rate, ai.num_samples);
        Ok(Node::new(
            self.inner.clone(),
            name.to_owned(),
            NodeInfo::Audio(ai),
            mode,
            deps,
            Box::new(filter),
        ))
    }
}

impl Default for Core {
    fn default() -> Self {
        Self::new()
    }
}
