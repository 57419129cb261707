use crate::format::{ColorFamily, FormatError, SampleType};

/// Information about a video clip
#[derive(Debug, Copy, Clone, Hash, PartialEq, Eq)]
pub struct VideoInfo {
    /// Format of the clip.
    pub format: VideoFormat,
    /// Numerator part of the clip's frame rate. Should always be a reduced fraction.
    pub fps_num: i64,
    /// Denominator part of the clip's frame rate. Should always be a reduced fraction.
    pub fps_den: i64,
    /// Width of the clip.
    pub width: i32,
    /// Height of the clip.
    pub height: i32,
    /// Length of the clip.
    pub num_frames: i32,
}

/// Describes the format of a clip.
#[derive(Debug, Copy, Clone, Hash, PartialEq, Eq)]
pub struct VideoFormat {
    pub color_family: ColorFamily,
    pub sample_type: SampleType,
    /// Number of significant bits.
    pub bits_per_sample: i32,
    /// Number of bytes needed for a sample. This is always a power of 2 and the
    /// smallest possible that can fit the number of bits used per sample.
    pub bytes_per_sample: i32,
    /// log2 horizontal subsampling factor, applied to second and third plane.
    pub sub_sampling_w: i32,
    /// log2 vertical subsampling factor, applied to second and third plane.
    /// Convenient numbers that can be used like so:
    /// `uv_width = y_width >> sub_sampling_w;`
    pub sub_sampling_h: i32,
    /// Number of planes.
    pub num_planes: i32,
}

impl VideoFormat {
    /// Creates a validated VideoFormat, deriving `bytes_per_sample` and
    /// `num_planes` from the other fields.
    pub fn query(
        color_family: ColorFamily,
        sample_type: SampleType,
        bits_per_sample: i32,
        sub_sampling_w: i32,
        sub_sampling_h: i32,
    ) -> Result<Self, FormatError> {
        let invalid = || FormatError::InvalidVideoFormat {
            color_family,
            sample_type,
            bits_per_sample,
            sub_sampling_w,
            sub_sampling_h,
        };

        let valid_bits = match sample_type {
            SampleType::Integer => (8..=32).contains(&bits_per_sample),
            #[cfg(feature = "f16-pixel-type")]
            SampleType::Float => bits_per_sample == 16 || bits_per_sample == 32,
            #[cfg(not(feature = "f16-pixel-type"))]
            SampleType::Float => bits_per_sample == 32,
        };
        if !valid_bits {
            return Err(invalid());
        }

        if !(0..=4).contains(&sub_sampling_w) || !(0..=4).contains(&sub_sampling_h) {
            return Err(invalid());
        }

        let num_planes = match color_family {
            ColorFamily::Gray => {
                if sub_sampling_w != 0 || sub_sampling_h != 0 {
                    return Err(invalid());
                }
                1
            }
            ColorFamily::RGB => {
                if sub_sampling_w != 0 || sub_sampling_h != 0 {
                    return Err(invalid());
                }
                3
            }
            ColorFamily::YUV => 3,
            ColorFamily::Undefined => return Err(invalid()),
        };

        let mut bytes_per_sample = 1;
        while bytes_per_sample * 8 < bits_per_sample {
            bytes_per_sample *= 2;
        }

        Ok(Self {
            color_family,
            sample_type,
            bits_per_sample,
            bytes_per_sample,
            sub_sampling_w,
            sub_sampling_h,
            num_planes,
        })
    }

    /// Width of the given plane for a frame of `width` luma samples.
    pub fn plane_width(&self, width: i32, plane: i32) -> i32 {
        if plane > 0 {
            width >> self.sub_sampling_w
        } else {
            width
        }
    }

    /// Height of the given plane for a frame of `height` luma samples.
    pub fn plane_height(&self, height: i32, plane: i32) -> i32 {
        if plane > 0 {
            height >> self.sub_sampling_h
        } else {
            height
        }
    }

    /// Short name in the usual convention, e.g. `YUV420P8` or `GrayS`.
    pub fn name(&self) -> String {
        let suffix = match (self.sample_type, self.bits_per_sample) {
            (SampleType::Float, 16) => "H".to_owned(),
            (SampleType::Float, _) => "S".to_owned(),
            (SampleType::Integer, bits) => bits.to_string(),
        };
        match self.color_family {
            ColorFamily::Gray => format!("Gray{}", suffix),
            ColorFamily::RGB => format!("RGB{}", suffix),
            ColorFamily::YUV => {
                let ss = match (self.sub_sampling_w, self.sub_sampling_h) {
                    (0, 0) => "444",
                    (1, 0) => "422",
                    (1, 1) => "420",
                    (2, 0) => "411",
                    (2, 2) => "410",
                    (0, 1) => "440",
                    _ => "4xx",
                };
                format!("YUV{}P{}", ss, suffix)
            }
            ColorFamily::Undefined => "Undefined".to_owned(),
        }
    }
}

/// Builder for creating VideoFormat with validation
#[derive(Debug, Clone)]
pub struct VideoFormatBuilder {
    color_family: ColorFamily,
    sample_type: SampleType,
    bits_per_sample: i32,
    sub_sampling_w: i32,
    sub_sampling_h: i32,
}

impl VideoFormatBuilder {
    /// Create a new VideoFormat builder with the minimum required parameters
    pub fn new(color_family: ColorFamily, sample_type: SampleType, bits_per_sample: i32) -> Self {
        Self {
            color_family,
            sample_type,
            bits_per_sample,
            sub_sampling_w: 0,
            sub_sampling_h: 0,
        }
    }

    /// Set horizontal subsampling (for YUV formats)
    pub fn sub_sampling_w(mut self, sub_sampling_w: i32) -> Self {
        self.sub_sampling_w = sub_sampling_w;
        self
    }

    /// Set vertical subsampling (for YUV formats)
    pub fn sub_sampling_h(mut self, sub_sampling_h: i32) -> Self {
        self.sub_sampling_h = sub_sampling_h;
        self
    }

    /// Set both horizontal and vertical subsampling (for YUV formats)
    pub fn sub_sampling(mut self, sub_sampling_w: i32, sub_sampling_h: i32) -> Self {
        self.sub_sampling_w = sub_sampling_w;
        self.sub_sampling_h = sub_sampling_h;
        self
    }

    /// Build the VideoFormat
    pub fn build(self) -> Result<VideoFormat, FormatError> {
        VideoFormat::query(
            self.color_family,
            self.sample_type,
            self.bits_per_sample,
            self.sub_sampling_w,
            self.sub_sampling_h,
        )
    }
}

impl VideoFormat {
    /// Convenience method to create the common YUV420P8 format
    pub fn yuv420p8() -> Self {
        Self::query(ColorFamily::YUV, SampleType::Integer, 8, 1, 1).unwrap()
    }

    /// Convenience method to create the common YUV444P8 format
    pub fn yuv444p8() -> Self {
        Self::query(ColorFamily::YUV, SampleType::Integer, 8, 0, 0).unwrap()
    }

    /// Convenience method to create the common RGB24 format
    pub fn rgb24() -> Self {
        Self::query(ColorFamily::RGB, SampleType::Integer, 8, 0, 0).unwrap()
    }

    /// Convenience method to create the common Gray8 format
    pub fn gray8() -> Self {
        Self::query(ColorFamily::Gray, SampleType::Integer, 8, 0, 0).unwrap()
    }

    /// Convenience method to create the single precision float gray format
    pub fn gray_s() -> Self {
        Self::query(ColorFamily::Gray, SampleType::Float, 32, 0, 0).unwrap()
    }
}

impl VideoInfo {
    /// Whether width, height and format are all known and fixed.
    pub fn is_constant(&self) -> bool {
        self.width > 0 && self.height > 0 && self.format.color_family != ColorFamily::Undefined
    }

    /// Whether two clips can be spliced/interleaved without a mismatch flag.
    pub fn is_same_video(&self, other: &VideoInfo) -> bool {
        self.format == other.format
            && self.width == other.width
            && self.height == other.height
            && self.fps_num == other.fps_num
            && self.fps_den == other.fps_den
    }
}
