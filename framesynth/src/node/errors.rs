use thiserror::Error;

/// An error returned from a frame request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct GetFrameError(pub(crate) String);

impl GetFrameError {
    pub fn new(message: String) -> Self {
        Self(message)
    }

    /// Returns the error message.
    pub fn message(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}
