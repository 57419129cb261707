use bitflags::bitflags;
use std::fmt::Display;

#[derive(Debug, Copy, Clone, Hash, PartialEq, Eq)]
pub enum MediaType {
    Video,
    Audio,
}

bitflags! {
    /// Audio channel layout bitmask
    #[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
    pub struct ChannelLayout: u64 {
        const FRONT_LEFT = 1 << 0;
        const FRONT_RIGHT = 1 << 1;
        const FRONT_CENTER = 1 << 2;
        const LOW_FREQUENCY = 1 << 3;
        const BACK_LEFT = 1 << 4;
        const BACK_RIGHT = 1 << 5;
        const FRONT_LEFT_OF_CENTER = 1 << 6;
        const FRONT_RIGHT_OF_CENTER = 1 << 7;
        const BACK_CENTER = 1 << 8;
        const SIDE_LEFT = 1 << 9;
        const SIDE_RIGHT = 1 << 10;
        const TOP_CENTER = 1 << 11;
        const TOP_FRONT_LEFT = 1 << 12;
        const TOP_FRONT_CENTER = 1 << 13;
        const TOP_FRONT_RIGHT = 1 << 14;
        const TOP_BACK_LEFT = 1 << 15;
        const TOP_BACK_CENTER = 1 << 16;
        const TOP_BACK_RIGHT = 1 << 17;
        const STEREO_LEFT = 1 << 29;
        const STEREO_RIGHT = 1 << 30;
        const WIDE_LEFT = 1 << 31;
        const WIDE_RIGHT = 1 << 32;
        const SURROUND_DIRECT_LEFT = 1 << 33;
        const SURROUND_DIRECT_RIGHT = 1 << 34;
        const LOW_FREQUENCY_2 = 1 << 35;
    }
}

impl ChannelLayout {
    // Common layout combinations
    pub const MONO: ChannelLayout = ChannelLayout::FRONT_LEFT;
    pub const STEREO: ChannelLayout = ChannelLayout::FRONT_LEFT.union(ChannelLayout::FRONT_RIGHT);
    pub const SURROUND_2_1: ChannelLayout = ChannelLayout::STEREO.union(ChannelLayout::LOW_FREQUENCY);
    pub const SURROUND_3_0: ChannelLayout = ChannelLayout::STEREO.union(ChannelLayout::FRONT_CENTER);
    pub const SURROUND_4_0: ChannelLayout = ChannelLayout::STEREO
        .union(ChannelLayout::BACK_LEFT)
        .union(ChannelLayout::BACK_RIGHT);
    pub const SURROUND_5_1: ChannelLayout = ChannelLayout::SURROUND_4_0
        .union(ChannelLayout::FRONT_CENTER)
        .union(ChannelLayout::LOW_FREQUENCY);
    pub const SURROUND_7_1: ChannelLayout = ChannelLayout::SURROUND_5_1
        .union(ChannelLayout::SIDE_LEFT)
        .union(ChannelLayout::SIDE_RIGHT);

    /// Create a new empty channel layout
    pub const fn new() -> Self {
        Self::empty()
    }

    /// Check if a specific channel is present
    pub const fn has_channel(self, channel: ChannelLayout) -> bool {
        self.contains(channel)
    }

    /// Add a channel to the layout
    pub const fn with_channel(self, channel: ChannelLayout) -> Self {
        self.union(channel)
    }

    /// Remove a channel from the layout
    pub const fn without_channel(self, channel: ChannelLayout) -> Self {
        self.difference(channel)
    }

    /// Count the number of channels
    pub const fn channel_count(self) -> u32 {
        self.bits().count_ones()
    }
}

impl Display for ChannelLayout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut channels = Vec::new();
        for i in 0..64 {
            if self.bits() & (1u64 << i) != 0 {
                channels.push(format!("ch{}", i));
            }
        }
        write!(f, "ChannelLayout({})", channels.join(", "))
    }
}

impl Default for ChannelLayout {
    fn default() -> Self {
        Self::empty()
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum ColorFamily {
    Undefined = 0,
    Gray = 1,
    RGB = 2,
    YUV = 3,
}

#[derive(Debug, Copy, Clone, Hash, PartialEq, Eq)]
pub enum SampleType {
    Integer = 0,
    Float = 1,
}
