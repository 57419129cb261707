//! Callable values stored in property maps.

use std::fmt;
use std::sync::Arc;

use crate::map::Map;

type FunctionImpl = dyn Fn(&Map, &mut Map) + Send + Sync;

/// A reference-counted callable taking an argument map and writing results
/// (or an error) into an output map.
#[derive(Clone)]
pub struct Function {
    inner: Arc<FunctionImpl>,
}

impl Function {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Map, &mut Map) + Send + Sync + 'static,
    {
        Self { inner: Arc::new(f) }
    }

    /// Calls the function. Errors are reported through the output map's
    /// error slot.
    pub fn call(&self, args: &Map, out: &mut Map) {
        (self.inner)(args, out);
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function").finish_non_exhaustive()
    }
}
