use thiserror::Error;

use crate::format::{ColorFamily, SampleType};

/// The error type for format queries.
///
/// Carries the parameters the query was attempted with so callers can report
/// exactly which combination was rejected.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatError {
    /// No video format exists for the queried combination of color family,
    /// sample type, bit depth and subsampling.
    #[error(
        "no video format matches {color_family:?}/{sample_type:?} with {bits_per_sample} bits per sample and {sub_sampling_w}x{sub_sampling_h} subsampling"
    )]
    InvalidVideoFormat {
        color_family: ColorFamily,
        sample_type: SampleType,
        bits_per_sample: i32,
        sub_sampling_w: i32,
        sub_sampling_h: i32,
    },
    /// No audio format exists for the queried combination of sample type,
    /// bit depth and channel layout bitmap.
    #[error(
        "no audio format matches {sample_type:?} with {bits_per_sample} bits per sample and channel layout {channel_layout:#x}"
    )]
    InvalidAudioFormat {
        sample_type: SampleType,
        bits_per_sample: i32,
        channel_layout: u64,
    },
}
