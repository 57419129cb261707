use crate::format::{ChannelLayout, FormatError, SampleType, AUDIO_FRAME_SAMPLES};

/// Builder for creating AudioFormat with validation
#[derive(Debug, Clone)]
pub struct AudioFormatBuilder {
    sample_type: SampleType,
    bits_per_sample: i32,
    channel_layout: ChannelLayout,
}

impl AudioFormatBuilder {
    /// Create a new AudioFormat builder with the required parameters
    pub fn new(
        sample_type: SampleType,
        bits_per_sample: i32,
        channel_layout: ChannelLayout,
    ) -> Self {
        Self {
            sample_type,
            bits_per_sample,
            channel_layout,
        }
    }

    /// Set mono channel layout
    pub fn mono(mut self) -> Self {
        self.channel_layout = ChannelLayout::MONO;
        self
    }

    /// Set stereo channel layout
    pub fn stereo(mut self) -> Self {
        self.channel_layout = ChannelLayout::STEREO;
        self
    }

    /// Set custom channel layout
    pub fn channel_layout(mut self, layout: ChannelLayout) -> Self {
        self.channel_layout = layout;
        self
    }

    /// Build the AudioFormat
    pub fn build(self) -> Result<AudioFormat, FormatError> {
        AudioFormat::query(self.sample_type, self.bits_per_sample, self.channel_layout)
    }
}

#[derive(Debug, Copy, Clone, Hash, PartialEq, Eq)]
pub struct AudioInfo {
    pub format: AudioFormat,
    pub sample_rate: i32,
    pub num_samples: i64,
    pub num_frames: i32,
}

#[derive(Debug, Copy, Clone, Hash, PartialEq, Eq)]
pub struct AudioFormat {
    pub sample_type: SampleType,
    pub bits_per_sample: i32,
    pub bytes_per_sample: i32,
    pub num_channels: i32,
    pub channel_layout: ChannelLayout,
}

impl AudioFormat {
    /// Creates a validated AudioFormat, deriving `bytes_per_sample` and
    /// `num_channels` from the other fields.
    pub fn query(
        sample_type: SampleType,
        bits_per_sample: i32,
        channel_layout: ChannelLayout,
    ) -> Result<Self, FormatError> {
        let invalid = || FormatError::InvalidAudioFormat {
            sample_type,
            bits_per_sample,
            channel_layout: channel_layout.bits(),
        };

        let valid_bits = match sample_type {
            SampleType::Integer => bits_per_sample == 16 || bits_per_sample == 32,
            SampleType::Float => bits_per_sample == 32,
        };
        if !valid_bits {
            return Err(invalid());
        }

        if channel_layout.is_empty() {
            return Err(invalid());
        }

        Ok(Self {
            sample_type,
            bits_per_sample,
            bytes_per_sample: bits_per_sample / 8,
            num_channels: channel_layout.channel_count() as i32,
            channel_layout,
        })
    }

    pub const STEREO16: Self = Self {
        sample_type: SampleType::Integer,
        bits_per_sample: 16,
        bytes_per_sample: 2,
        num_channels: 2,
        channel_layout: ChannelLayout::STEREO,
    };

    pub const MONO16: Self = Self {
        sample_type: SampleType::Integer,
        bits_per_sample: 16,
        bytes_per_sample: 2,
        num_channels: 1,
        channel_layout: ChannelLayout::MONO,
    };
}

impl AudioInfo {
    /// Builds an AudioInfo, deriving the frame count from the sample count.
    pub fn new(format: AudioFormat, sample_rate: i32, num_samples: i64) -> Self {
        Self {
            format,
            sample_rate,
            num_samples,
            num_frames: Self::frame_count(num_samples),
        }
    }

    /// Number of audio frames needed to hold `num_samples` samples.
    pub fn frame_count(num_samples: i64) -> i32 {
        ((num_samples + i64::from(AUDIO_FRAME_SAMPLES) - 1) / i64::from(AUDIO_FRAME_SAMPLES)) as i32
    }

    /// Number of samples carried by frame `n` of this clip.
    pub fn frame_samples(&self, n: i32) -> i32 {
        let start = i64::from(n) * i64::from(AUDIO_FRAME_SAMPLES);
        (self.num_samples - start).min(i64::from(AUDIO_FRAME_SAMPLES)).max(0) as i32
    }
}
