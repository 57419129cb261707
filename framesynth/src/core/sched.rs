//! The frame-graph scheduler.
//!
//! A task is one `(node, n)` frame request. Each task runs the node's getter
//! twice: once with `Initial` to collect upstream requests, once with
//! `AllFramesReady` (or `Error`) to deliver the output. Between the phases
//! the task is parked; worker threads never block on upstream work, they
//! simply pick the next ready task off the queue.

use std::collections::HashMap;

use log::trace;
use parking_lot::Mutex;
use std::sync::Arc;

use crate::filter::{ActivationReason, FilterMode, FrameData};
use crate::frame::{Frame, FrameContext};
use crate::node::Node;

/// Something to resolve once a frame (or its error) is available.
pub(crate) enum Waiter {
    /// A downstream task waiting for one of its upstream requests.
    Job(Arc<FrameJob>),
    /// An external request.
    Callback(Box<dyn FnOnce(Result<Frame, String>) + Send>),
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum Phase {
    /// The getter has not been invoked yet.
    Initial,
    /// Requests are registered; once `pending` reaches zero the task is
    /// re-queued to deliver.
    Deliver,
}

pub(crate) struct JobState {
    pub phase: Phase,
    /// Unresolved upstream requests.
    pub pending: usize,
    pub scratch: FrameData,
    pub resolved: HashMap<(u64, i32), Frame>,
    pub upstream_error: Option<String>,
    pub waiters: Vec<Waiter>,
}

/// One in-flight `(node, n)` request. Concurrent requests for the same frame
/// coalesce onto a single job.
pub(crate) struct FrameJob {
    pub node: Node,
    pub n: i32,
    pub state: Mutex<JobState>,
}

/// Entry point: request frame `n` of `node` on behalf of `waiter`.
///
/// Never blocks and never invokes a getter inline; the actual work happens on
/// the worker pool.
pub(crate) fn request_frame(node: &Node, n: i32, waiter: Waiter) {
    if let Some(result) = node.inner.cache.lock().get(n) {
        deliver(waiter, node.id(), n, result);
        return;
    }

    let mut jobs = node.inner.jobs.lock();
    if let Some(job) = jobs.get(&n) {
        job.state.lock().waiters.push(waiter);
        return;
    }

    // The job may have finished between the cache probe and taking the jobs
    // lock; the cache is filled under this lock, so probe it once more.
    if let Some(result) = node.inner.cache.lock().get(n) {
        drop(jobs);
        deliver(waiter, node.id(), n, result);
        return;
    }

    let job = Arc::new(FrameJob {
        node: node.clone(),
        n,
        state: Mutex::new(JobState {
            phase: Phase::Initial,
            pending: 0,
            scratch: FrameData::default(),
            resolved: HashMap::new(),
            upstream_error: None,
            waiters: vec![waiter],
        }),
    });
    jobs.insert(n, job.clone());
    drop(jobs);

    if node.inner.mode == FilterMode::FrameState {
        node.inner.fstate.lock().requested.insert(n);
    }

    trace!("enqueue ({}, {})", node.name(), n);
    node.inner.core.enqueue(job);
}

/// Executes one scheduling step of a job on a worker thread.
pub(crate) fn run_job(job: &Arc<FrameJob>) {
    let phase = job.state.lock().phase;
    match phase {
        Phase::Initial => run_initial(job),
        Phase::Deliver => run_deliver(job),
    }
}

fn run_initial(job: &Arc<FrameJob>) {
    let node = &job.node;
    let mut scratch = std::mem::take(&mut job.state.lock().scratch);
    let mut ctx = FrameContext::new();

    let result = {
        let _serial = match node.inner.mode {
            FilterMode::Unordered | FilterMode::FrameState => Some(node.inner.serial_lock.lock()),
            _ => None,
        };
        node.inner
            .filter
            .get_frame(job.n, ActivationReason::Initial, &mut scratch, &mut ctx)
    };

    match result {
        Err(message) => finish(job, Err(message)),
        Ok(_) if ctx.error.is_some() => finish(job, Err(ctx.error.unwrap())),
        Ok(Some(frame)) => finish(job, Ok(frame)),
        Ok(None) => {
            // Dedupe: requesting the same upstream frame twice must resolve
            // to a single registration.
            let mut requests: Vec<(Node, i32)> = Vec::with_capacity(ctx.requests.len());
            for (unode, m) in ctx.requests.drain(..) {
                if !requests.iter().any(|(r, rn)| r.id() == unode.id() && *rn == m) {
                    requests.push((unode, m));
                }
            }

            {
                let mut state = job.state.lock();
                state.phase = Phase::Deliver;
                state.pending = requests.len();
                state.scratch = scratch;
            }

            if requests.is_empty() {
                node.inner.core.enqueue(job.clone());
            } else {
                for (unode, m) in requests {
                    request_frame(&unode, m, Waiter::Job(job.clone()));
                }
            }
        }
    }
}

fn run_deliver(job: &Arc<FrameJob>) {
    let node = &job.node;

    // FrameState filters deliver in strictly ascending frame order. Instead
    // of blocking the worker, a job that is not next in line parks itself in
    // the gate and is re-queued when its turn comes.
    if node.inner.mode == FilterMode::FrameState {
        let mut gate = node.inner.fstate.lock();
        if gate.requested.iter().next() != Some(&job.n) {
            gate.deferred.insert(job.n, job.clone());
            return;
        }
    }

    let (mut scratch, resolved, upstream_error) = {
        let mut state = job.state.lock();
        (
            std::mem::take(&mut state.scratch),
            std::mem::take(&mut state.resolved),
            state.upstream_error.take(),
        )
    };

    let _serial = match node.inner.mode {
        FilterMode::Unordered | FilterMode::FrameState => Some(node.inner.serial_lock.lock()),
        _ => None,
    };
    let _all_ready = match node.inner.mode {
        FilterMode::ParallelRequests => Some(node.inner.all_ready_lock.lock()),
        _ => None,
    };

    if let Some(message) = upstream_error {
        // Give the getter a chance to drop per-request state, then inherit
        // the upstream failure.
        let mut ctx = FrameContext::new();
        let _ = node.inner.filter.get_frame(
            job.n,
            ActivationReason::Error,
            &mut scratch,
            &mut ctx,
        );
        finish(job, Err(message));
        return;
    }

    let mut ctx = FrameContext::new();
    ctx.resolved = resolved;

    let result = node.inner.filter.get_frame(
        job.n,
        ActivationReason::AllFramesReady,
        &mut scratch,
        &mut ctx,
    );

    match result {
        Err(message) => finish(job, Err(message)),
        Ok(_) if ctx.error.is_some() => finish(job, Err(ctx.error.unwrap())),
        Ok(Some(frame)) => finish(job, Ok(frame)),
        Ok(None) => finish(
            job,
            Err(format!("{}: filter returned no frame", node.name())),
        ),
    }
}

/// Completes a job: caches the result, unparks the next FrameState job and
/// resolves every waiter.
fn finish(job: &Arc<FrameJob>, result: Result<Frame, String>) {
    let node = &job.node;
    trace!("finish ({}, {}): ok={}", node.name(), job.n, result.is_ok());

    {
        let mut jobs = node.inner.jobs.lock();
        jobs.remove(&job.n);
        node.inner.cache.lock().insert(job.n, &result);
    }

    if node.inner.mode == FilterMode::FrameState {
        let next = {
            let mut gate = node.inner.fstate.lock();
            gate.requested.remove(&job.n);
            match gate.requested.iter().next().copied() {
                Some(min) => gate.deferred.remove(&min),
                None => None,
            }
        };
        if let Some(next) = next {
            node.inner.core.enqueue(next);
        }
    }

    let waiters = std::mem::take(&mut job.state.lock().waiters);
    for waiter in waiters {
        deliver(waiter, node.id(), job.n, result.clone());
    }
}

/// Hands a finished result to one waiter. For job waiters this may make the
/// downstream task ready, in which case it is re-queued.
fn deliver(waiter: Waiter, node_id: u64, n: i32, result: Result<Frame, String>) {
    match waiter {
        Waiter::Callback(callback) => callback(result),
        Waiter::Job(parent) => {
            let ready = {
                let mut state = parent.state.lock();
                match result {
                    Ok(frame) => {
                        state.resolved.insert((node_id, n), frame);
                    }
                    Err(message) => {
                        state.upstream_error.get_or_insert(message);
                    }
                }
                state.pending -= 1;
                state.pending == 0
            };
            if ready {
                parent.node.inner.core.enqueue(parent.clone());
            }
        }
    }
}
