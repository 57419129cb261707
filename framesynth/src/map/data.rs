use std::ops::Deref;
use std::sync::Arc;

/// Type hint attached to a data property.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DataType {
    String = 1,
    Binary = 0,
    Unknown = -1,
}

/// An owned byte string stored in a map, with a hint describing whether the
/// contents are UTF-8 text or arbitrary binary data.
#[derive(Clone, Debug)]
pub struct Data {
    bytes: Arc<[u8]>,
    hint: DataType,
}

impl Deref for Data {
    type Target = [u8];
    fn deref(&self) -> &Self::Target {
        &self.bytes
    }
}

impl Data {
    pub(crate) fn new(bytes: &[u8], hint: DataType) -> Self {
        Self {
            bytes: bytes.into(),
            hint,
        }
    }

    pub fn type_hint(&self) -> DataType {
        self.hint
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl From<&[u8]> for Data {
    fn from(value: &[u8]) -> Self {
        Self::new(value, DataType::Binary)
    }
}

impl From<&str> for Data {
    fn from(value: &str) -> Self {
        Self::new(value.as_bytes(), DataType::String)
    }
}

impl PartialEq for Data {
    fn eq(&self, other: &Self) -> bool {
        self.bytes == other.bytes
    }
}

impl Eq for Data {}
