use std::any::Any;

use crate::filter::ActivationReason;
use crate::frame::{Frame, FrameContext};

/// Per-request scratch state owned by the scheduler for the duration of one
/// `(node, frame)` invocation. Survives the gap between the `Initial` and
/// `AllFramesReady` phases.
#[derive(Default)]
pub struct FrameData(Option<Box<dyn Any + Send>>);

impl std::fmt::Debug for FrameData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("FrameData")
            .field(&self.0.as_ref().map(|_| "..."))
            .finish()
    }
}

impl FrameData {
    pub fn set<T: Any + Send>(&mut self, value: T) {
        self.0 = Some(Box::new(value));
    }

    pub fn get<T: Any + Send>(&self) -> Option<&T> {
        self.0.as_ref()?.downcast_ref()
    }

    pub fn take<T: Any + Send>(&mut self) -> Option<T> {
        let boxed = self.0.take()?;
        match boxed.downcast() {
            Ok(value) => Some(*value),
            Err(boxed) => {
                self.0 = Some(boxed);
                None
            }
        }
    }

    pub fn clear(&mut self) {
        self.0 = None;
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }
}

/// Trait that filter structs must implement.
///
/// Instance state lives in the implementing struct; filters running in
/// [`FilterMode::Parallel`](crate::filter::FilterMode::Parallel) must not
/// mutate it. Per-request state goes into the `FrameData` slot instead.
pub trait Filter: Send + Sync + 'static {
    /// Produce frame `n`.
    ///
    /// Called with [`ActivationReason::Initial`] first; request upstream
    /// frames through `ctx` and return `Ok(None)`, or return the finished
    /// frame directly for source filters. Once every requested frame is ready
    /// the function is called again with [`ActivationReason::AllFramesReady`]
    /// and must return the output frame.
    ///
    /// Errors may be reported by returning `Err` or through
    /// [`FrameContext::set_filter_error`]; either way the message should be
    /// prefixed with the filter's name.
    fn get_frame(
        &self,
        n: i32,
        reason: ActivationReason,
        frame_data: &mut FrameData,
        ctx: &mut FrameContext,
    ) -> Result<Option<Frame>, String>;
}
