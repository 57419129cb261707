use log::{debug, error, info, warn};

#[derive(Debug, Clone, Copy)]
pub enum MessageType {
    Debug = 0,
    Information = 1,
    Warning = 2,
    Critical = 3,
    Fatal = 4,
}

impl From<i32> for MessageType {
    fn from(value: i32) -> Self {
        match value {
            0 => MessageType::Debug,
            1 => MessageType::Information,
            2 => MessageType::Warning,
            3 => MessageType::Critical,
            4 => MessageType::Fatal,
            _ => MessageType::Debug, // fallback
        }
    }
}

impl From<MessageType> for i32 {
    fn from(value: MessageType) -> Self {
        value as i32
    }
}

pub trait LogHandler: Send + Sync {
    fn handle(&self, msg_type: MessageType, msg: &str);
}

/// LogHandler implementation using [`log`](https://github.com/rust-lang/log)
pub struct LogRS {}

impl LogHandler for LogRS {
    fn handle(&self, msg_type: MessageType, msg: &str) {
        match msg_type {
            MessageType::Debug => debug!("{}", msg),
            MessageType::Information => info!("{}", msg),
            MessageType::Warning => warn!("{}", msg),
            MessageType::Critical => error!("{}", msg),
            MessageType::Fatal => error!("{}", msg),
        }
    }
}
