//! Video and audio format descriptors.

mod audio;
mod enums;
mod errors;
mod presets;
mod video;

#[cfg(test)]
mod tests;

pub use self::audio::{AudioFormat, AudioFormatBuilder, AudioInfo};
pub use self::enums::{ChannelLayout, ColorFamily, MediaType, SampleType};
pub use self::errors::FormatError;
pub use self::presets::PresetVideoFormat;
pub use self::video::{VideoFormat, VideoFormatBuilder, VideoInfo};

/// Number of samples per channel carried by every audio frame except
/// possibly the last one of a stream.
pub const AUDIO_FRAME_SAMPLES: i32 = 3072;
