#[cfg(test)]
mod tests {
    use crate::format::{
        AudioFormat, AudioInfo, ChannelLayout, ColorFamily, PresetVideoFormat, SampleType,
        VideoFormat, AUDIO_FRAME_SAMPLES,
    };

    #[test]
    fn test_preset_format_values() {
        assert_eq!(PresetVideoFormat::None as i32, 0);
        assert_ne!(PresetVideoFormat::Gray8 as i32, 0);
        assert_ne!(PresetVideoFormat::YUV420P8 as i32, 0);
        assert_ne!(PresetVideoFormat::RGB24 as i32, 0);
    }

    #[test]
    fn test_color_family_enum() {
        assert_eq!(ColorFamily::Undefined as i32, 0);
        assert_eq!(ColorFamily::Gray as i32, 1);
        assert_eq!(ColorFamily::RGB as i32, 2);
        assert_eq!(ColorFamily::YUV as i32, 3);
    }

    #[test]
    fn test_format_id_round_trip() {
        let fmt = PresetVideoFormat::YUV420P10.into_format();
        assert_eq!(fmt.color_family, ColorFamily::YUV);
        assert_eq!(fmt.bits_per_sample, 10);
        assert_eq!(fmt.bytes_per_sample, 2);
        assert_eq!(fmt.sub_sampling_w, 1);
        assert_eq!(fmt.sub_sampling_h, 1);
        assert_eq!(fmt.num_planes, 3);
        assert_eq!(fmt.id(), PresetVideoFormat::YUV420P10 as i32);
    }

    #[test]
    fn test_format_id_uniqueness() {
        assert_ne!(PresetVideoFormat::Gray8 as i32, PresetVideoFormat::Gray16 as i32);
        assert_ne!(PresetVideoFormat::Gray8 as i32, PresetVideoFormat::YUV420P8 as i32);
        assert_ne!(PresetVideoFormat::RGB24 as i32, PresetVideoFormat::YUV420P8 as i32);
        assert_ne!(PresetVideoFormat::GrayS as i32, PresetVideoFormat::Gray32 as i32);
    }

    #[test]
    fn test_rgb_rejects_subsampling() {
        assert!(VideoFormat::query(ColorFamily::RGB, SampleType::Integer, 8, 1, 1).is_err());
        assert!(VideoFormat::query(ColorFamily::Gray, SampleType::Integer, 8, 0, 1).is_err());
        assert!(VideoFormat::query(ColorFamily::YUV, SampleType::Integer, 8, 1, 1).is_ok());
    }

    #[test]
    fn test_bit_depth_limits() {
        assert!(VideoFormat::query(ColorFamily::Gray, SampleType::Integer, 7, 0, 0).is_err());
        assert!(VideoFormat::query(ColorFamily::Gray, SampleType::Integer, 33, 0, 0).is_err());
        assert!(VideoFormat::query(ColorFamily::Gray, SampleType::Float, 24, 0, 0).is_err());
        assert!(VideoFormat::query(ColorFamily::Gray, SampleType::Float, 32, 0, 0).is_ok());
    }

    #[cfg(not(feature = "f16-pixel-type"))]
    #[test]
    fn test_half_rejected_without_feature() {
        assert!(VideoFormat::query(ColorFamily::Gray, SampleType::Float, 16, 0, 0).is_err());
    }

    #[test]
    fn test_plane_dimensions() {
        let fmt = VideoFormat::yuv420p8();
        assert_eq!(fmt.plane_width(640, 0), 640);
        assert_eq!(fmt.plane_width(640, 1), 320);
        assert_eq!(fmt.plane_height(480, 2), 240);
    }

    #[test]
    fn test_audio_format_channels() {
        let fmt = AudioFormat::query(SampleType::Integer, 16, ChannelLayout::SURROUND_5_1).unwrap();
        assert_eq!(fmt.num_channels, 6);
        assert_eq!(fmt.bytes_per_sample, 2);

        assert!(AudioFormat::query(SampleType::Integer, 8, ChannelLayout::MONO).is_err());
        assert!(AudioFormat::query(SampleType::Float, 16, ChannelLayout::MONO).is_err());
        assert!(AudioFormat::query(SampleType::Integer, 16, ChannelLayout::empty()).is_err());
    }

    #[test]
    fn test_audio_frame_addressing() {
        let ai = AudioInfo::new(AudioFormat::STEREO16, 44100, 10 * i64::from(AUDIO_FRAME_SAMPLES));
        assert_eq!(ai.num_frames, 10);
        assert_eq!(ai.frame_samples(0), AUDIO_FRAME_SAMPLES);
        assert_eq!(ai.frame_samples(9), AUDIO_FRAME_SAMPLES);

        let ai = AudioInfo::new(AudioFormat::STEREO16, 44100, 5000);
        assert_eq!(ai.num_frames, 2);
        assert_eq!(ai.frame_samples(0), AUDIO_FRAME_SAMPLES);
        assert_eq!(ai.frame_samples(1), 5000 - AUDIO_FRAME_SAMPLES);
    }
}
