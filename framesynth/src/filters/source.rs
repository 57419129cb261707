//! Source filters producing frames from nothing.

use parking_lot::Mutex;

use crate::core::Core;
use crate::filter::{ActivationReason, Filter, FilterMode, FrameData};
use crate::format::{
    AudioFormat, AudioInfo, ChannelLayout, SampleType, VideoFormat, VideoInfo,
    AUDIO_FRAME_SAMPLES,
};
use crate::frame::{Frame, FrameContext};
use crate::map::Map;
use crate::node::Node;

use super::{opt_float_array, opt_int, opt_int_array};

fn fill_plane(frame: &mut Frame, plane: i32, value: f64) {
    let format = frame.get_video_format().unwrap();
    let height = frame.get_height(plane);
    for y in 0..height {
        match (format.sample_type, format.bytes_per_sample) {
            (SampleType::Integer, 1) => frame.row_mut::<u8>(plane, y).fill(value as u8),
            (SampleType::Integer, 2) => frame.row_mut::<u16>(plane, y).fill(value as u16),
            (SampleType::Integer, 4) => frame.row_mut::<u32>(plane, y).fill(value as u32),
            (SampleType::Float, 4) => frame.row_mut::<f32>(plane, y).fill(value as f32),
            _ => frame.row_mut::<u16>(plane, y).fill(value as u16),
        }
    }
}

/// Constant-color video clip.
pub struct BlankClip {
    vi: VideoInfo,
    color: [f64; 3],
    keep: Option<Mutex<Option<Frame>>>,
}

impl BlankClip {
    fn make_frame(&self) -> Frame {
        let mut frame = Frame::new_video_frame(&self.vi.format, self.vi.width, self.vi.height, None);
        for plane in 0..self.vi.format.num_planes {
            fill_plane(&mut frame, plane, self.color[plane as usize]);
        }
        if self.vi.fps_num > 0 {
            frame.set_duration(self.vi.fps_den, self.vi.fps_num);
        }
        frame
    }

    /// Arguments: `width`, `height`, `format` (packed id), `length`,
    /// `fpsnum`, `fpsden`, `color` (one value per plane), `keep`.
    pub fn create(core: &Core, args: &Map) -> Result<Node, String> {
        let err = |e: crate::map::MapError| format!("BlankClip: {}", e);

        let width = opt_int(args, "width").map_err(err)?.unwrap_or(640) as i32;
        let height = opt_int(args, "height").map_err(err)?.unwrap_or(480) as i32;
        let format = match opt_int(args, "format").map_err(err)? {
            Some(id) => VideoFormat::from_id(id as i32)
                .map_err(|e| format!("BlankClip: {}", e))?,
            None => VideoFormat::rgb24(),
        };
        let length = opt_int(args, "length").map_err(err)?.unwrap_or(240) as i32;
        let fps_num = opt_int(args, "fpsnum").map_err(err)?.unwrap_or(24);
        let fps_den = opt_int(args, "fpsden").map_err(err)?.unwrap_or(1);
        let keep = opt_int(args, "keep").map_err(err)?.unwrap_or(0) != 0;

        if length <= 0 {
            return Err("BlankClip: invalid length".to_owned());
        }
        if fps_num < 0 || fps_den <= 0 {
            return Err("BlankClip: invalid framerate".to_owned());
        }

        let mut color = [0.0f64; 3];
        if let Some(values) = opt_float_array(args, "color").map_err(err)? {
            if values.len() != format.num_planes as usize {
                return Err("BlankClip: invalid number of color values".to_owned());
            }
            for (i, v) in values.iter().enumerate() {
                color[i] = *v;
            }
        }

        let vi = VideoInfo {
            format,
            fps_num,
            fps_den,
            width,
            height,
            num_frames: length,
        };

        core.create_video_filter(
            "BlankClip",
            &vi,
            if keep { FilterMode::Unordered } else { FilterMode::Parallel },
            Vec::new(),
            BlankClip {
                vi,
                color,
                keep: keep.then(|| Mutex::new(None)),
            },
        )
    }
}

impl Filter for BlankClip {
    fn get_frame(
        &self,
        _n: i32,
        reason: ActivationReason,
        _frame_data: &mut FrameData,
        _ctx: &mut FrameContext,
    ) -> Result<Option<Frame>, String> {
        if reason != ActivationReason::Initial {
            return Ok(None);
        }
        match &self.keep {
            Some(slot) => {
                let mut slot = slot.lock();
                if slot.is_none() {
                    *slot = Some(self.make_frame());
                }
                Ok(slot.clone())
            }
            None => Ok(Some(self.make_frame())),
        }
    }
}

/// Silent audio clip.
pub struct BlankAudio {
    ai: AudioInfo,
    keep: Option<Mutex<Option<Frame>>>,
}

impl BlankAudio {
    /// Arguments: `channels` (channel indices), `bits`, `sampletype`,
    /// `samplerate`, `length` (in samples), `keep`.
    pub fn create(core: &Core, args: &Map) -> Result<Node, String> {
        let err = |e: crate::map::MapError| format!("BlankAudio: {}", e);

        let mut layout = ChannelLayout::STEREO;
        if let Some(channels) = opt_int_array(args, "channels").map_err(err)? {
            layout = ChannelLayout::empty();
            for &c in &channels {
                let bit = ChannelLayout::from_bits_truncate(1u64 << c);
                if layout.contains(bit) {
                    return Err("BlankAudio: channel specified twice".to_owned());
                }
                layout |= bit;
            }
        }

        let bits = opt_int(args, "bits").map_err(err)?.unwrap_or(16) as i32;
        let sample_type = if opt_int(args, "sampletype").map_err(err)?.unwrap_or(0) != 0 {
            SampleType::Float
        } else {
            SampleType::Integer
        };
        let sample_rate = opt_int(args, "samplerate").map_err(err)?.unwrap_or(44100) as i32;
        let keep = opt_int(args, "keep").map_err(err)?.unwrap_or(0) != 0;
        let length = opt_int(args, "length")
            .map_err(err)?
            .unwrap_or(i64::from(sample_rate) * 10);

        if sample_rate <= 0 {
            return Err("BlankAudio: invalid sample rate".to_owned());
        }
        if length <= 0 {
            return Err("BlankAudio: invalid length".to_owned());
        }

        let format = AudioFormat::query(sample_type, bits, layout)
            .map_err(|_| "BlankAudio: invalid format".to_owned())?;
        let ai = AudioInfo::new(format, sample_rate, length);

        core.create_audio_filter(
            "BlankAudio",
            &ai,
            if keep { FilterMode::Unordered } else { FilterMode::Parallel },
            Vec::new(),
            BlankAudio {
                ai,
                keep: keep.then(|| Mutex::new(None)),
            },
        )
    }

    fn make_frame(&self, n: i32) -> Frame {
        // Zero-filled by allocation.
        Frame::new_audio_frame(&self.ai.format, self.ai.frame_samples(n), None)
    }
}

impl Filter for BlankAudio {
    fn get_frame(
        &self,
        n: i32,
        reason: ActivationReason,
        _frame_data: &mut FrameData,
        _ctx: &mut FrameContext,
    ) -> Result<Option<Frame>, String> {
        if reason != ActivationReason::Initial {
            return Ok(None);
        }
        match &self.keep {
            Some(slot) => {
                let mut slot = slot.lock();
                // All frames but the final one have the same length, so one
                // cached frame serves every full-size request.
                if n < self.ai.num_frames - 1 {
                    if slot.is_none() {
                        *slot = Some(self.make_frame(n));
                    }
                    Ok(slot.clone())
                } else {
                    Ok(Some(self.make_frame(n)))
                }
            }
            None => Ok(Some(self.make_frame(n))),
        }
    }
}

/// Deterministic 16-bit ramp signal for exercising the audio path.
pub struct TestAudio {
    ai: AudioInfo,
}

impl TestAudio {
    /// Arguments: `channels`, `bits` (must be 16), `isfloat`, `samplerate`,
    /// `length` (in samples).
    pub fn create(core: &Core, args: &Map) -> Result<Node, String> {
        let err = |e: crate::map::MapError| format!("TestAudio: {}", e);

        let mut layout = ChannelLayout::STEREO;
        if let Some(channels) = opt_int_array(args, "channels").map_err(err)? {
            layout = ChannelLayout::empty();
            for &c in &channels {
                let bit = ChannelLayout::from_bits_truncate(1u64 << c);
                if layout.contains(bit) {
                    return Err("TestAudio: channel specified twice".to_owned());
                }
                layout |= bit;
            }
        }

        let bits = opt_int(args, "bits").map_err(err)?.unwrap_or(16) as i32;
        if bits != 16 {
            return Err("TestAudio: bits must be 16!".to_owned());
        }
        let isfloat = opt_int(args, "isfloat").map_err(err)?.unwrap_or(0) != 0;
        let sample_rate = opt_int(args, "samplerate").map_err(err)?.unwrap_or(44100) as i32;
        let length = opt_int(args, "length")
            .map_err(err)?
            .unwrap_or(i64::from(sample_rate) * 60 * 60);

        if sample_rate <= 0 {
            return Err("TestAudio: invalid sample rate".to_owned());
        }
        if length <= 0 {
            return Err("TestAudio: invalid length".to_owned());
        }

        let format = AudioFormat::query(
            if isfloat { SampleType::Float } else { SampleType::Integer },
            bits,
            layout,
        )
        .map_err(|_| "TestAudio: invalid format".to_owned())?;
        let ai = AudioInfo::new(format, sample_rate, length);

        core.create_audio_filter("TestAudio", &ai, FilterMode::Parallel, Vec::new(), TestAudio {
            ai,
        })
    }
}

impl Filter for TestAudio {
    fn get_frame(
        &self,
        n: i32,
        reason: ActivationReason,
        _frame_data: &mut FrameData,
        _ctx: &mut FrameContext,
    ) -> Result<Option<Frame>, String> {
        if reason != ActivationReason::Initial {
            return Ok(None);
        }
        let start_sample = i64::from(n) * i64::from(AUDIO_FRAME_SAMPLES);
        let samples = self.ai.frame_samples(n);
        let mut frame = Frame::new_audio_frame(&self.ai.format, samples, None);
        for channel in 0..self.ai.format.num_channels {
            let data = frame.channel_mut::<u16>(channel);
            for (i, sample) in data.iter_mut().enumerate() {
                *sample = ((start_sample + i as i64) % 0xFFFF) as u16;
            }
        }
        Ok(Some(frame))
    }
}
