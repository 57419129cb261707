//! Sample-addressed audio filters: AudioTrim, AudioSplice, AudioLoop,
//! AudioReverse, AudioGain and AudioMix.
//!
//! Audio frames carry a fixed number of samples per channel, so most of the
//! work here is mapping output sample ranges onto upstream frame/offset
//! pairs and stitching the pieces back together.

use crate::core::Core;
use crate::filter::{
    ActivationReason, Filter, FilterDependency, FilterMode, FrameData, RequestPattern,
};
use crate::format::{AudioFormat, AudioInfo, ChannelLayout, SampleType, AUDIO_FRAME_SAMPLES};
use crate::frame::{Frame, FrameContext};
use crate::map::Map;
use crate::node::Node;

use super::{opt_float_array, opt_int};

const FRAME_SAMPLES: i64 = AUDIO_FRAME_SAMPLES as i64;

/// Copies `count` samples of every channel from `src[src_offset..]` into
/// `dst[dst_offset..]`.
fn copy_samples(
    dst: &mut Frame,
    dst_offset: usize,
    src: &Frame,
    src_offset: usize,
    count: usize,
) {
    let format = src.get_audio_format().unwrap();
    let bps = format.bytes_per_sample as usize;
    for channel in 0..format.num_channels {
        let src_bytes =
            src.get_read_slice(channel)[src_offset * bps..(src_offset + count) * bps].to_vec();
        dst.get_write_slice(channel)[dst_offset * bps..(dst_offset + count) * bps]
            .copy_from_slice(&src_bytes);
    }
}

//////////////////////////////////////////
// AudioTrim

pub struct AudioTrim {
    node: Node,
    ai: AudioInfo,
    first: i64,
}

impl AudioTrim {
    /// Arguments: `clip`, `first`, `last`, `length`, all measured in samples.
    pub fn create(core: &Core, args: &Map) -> Result<Node, String> {
        let err = |e: crate::map::MapError| format!("AudioTrim: {}", e);

        let first = opt_int(args, "first").map_err(err)?;
        let last = opt_int(args, "last").map_err(err)?;
        let length = opt_int(args, "length").map_err(err)?;

        if last.is_some() && length.is_some() {
            return Err("AudioTrim: both last sample and length specified".to_owned());
        }
        let first_val = first.unwrap_or(0);
        if let Some(last) = last {
            if last < first_val {
                return Err(
                    "AudioTrim: invalid last sample specified (last is less than first)"
                        .to_owned(),
                );
            }
        }
        if let Some(length) = length {
            if length < 1 {
                return Err("AudioTrim: invalid length specified (less than 1)".to_owned());
            }
        }
        if first_val < 0 {
            return Err("AudioTrim: invalid first sample specified (less than 0)".to_owned());
        }

        let node = args.get_node("clip").map_err(err)?;
        let mut ai = node.audio_info().ok_or("AudioTrim: clip must be audio")?;

        if last.map_or(false, |l| l >= ai.num_samples)
            || length.map_or(false, |l| first_val + l > ai.num_samples)
            || ai.num_samples <= first_val
        {
            return Err("AudioTrim: last sample beyond clip end".to_owned());
        }

        let trimlen = if let Some(last) = last {
            last - first_val + 1
        } else if let Some(length) = length {
            length
        } else {
            ai.num_samples - first_val
        };

        // obvious no-op so just pass through the input clip
        if (first.is_none() && last.is_none() && length.is_none()) || trimlen == ai.num_samples {
            return Ok(node);
        }

        ai.num_samples = trimlen;
        let out_ai = AudioInfo::new(ai.format, ai.sample_rate, ai.num_samples);

        let deps = vec![FilterDependency::new(node.clone(), RequestPattern::General)];
        core.create_audio_filter("AudioTrim", &out_ai, FilterMode::Parallel, deps, AudioTrim {
            node,
            ai: out_ai,
            first: first_val,
        })
    }
}

impl Filter for AudioTrim {
    fn get_frame(
        &self,
        n: i32,
        reason: ActivationReason,
        _frame_data: &mut FrameData,
        ctx: &mut FrameContext,
    ) -> Result<Option<Frame>, String> {
        let start_sample = i64::from(n) * FRAME_SAMPLES + self.first;
        let start_frame = (start_sample / FRAME_SAMPLES) as i32;
        let length = self.ai.frame_samples(n) as usize;

        if start_sample % FRAME_SAMPLES == 0 && n != self.ai.num_frames - 1 {
            // pass through audio frames when possible
            match reason {
                ActivationReason::Initial => {
                    self.node.request_frame_filter(start_frame, ctx);
                    Ok(None)
                }
                ActivationReason::AllFramesReady => {
                    let src = self
                        .node
                        .get_frame_filter(start_frame, ctx)
                        .ok_or("AudioTrim: upstream frame missing")?;
                    if length == src.get_length() as usize {
                        return Ok(Some(src));
                    }
                    let mut dst =
                        Frame::new_audio_frame(&self.ai.format, length as i32, Some(&src));
                    copy_samples(&mut dst, 0, &src, 0, length);
                    Ok(Some(dst))
                }
                ActivationReason::Error => Ok(None),
            }
        } else {
            let offset = (start_sample % FRAME_SAMPLES) as usize;
            let num_src1 = AUDIO_FRAME_SAMPLES as usize - offset;
            match reason {
                ActivationReason::Initial => {
                    self.node.request_frame_filter(start_frame, ctx);
                    if num_src1 < length {
                        self.node.request_frame_filter(start_frame + 1, ctx);
                    }
                    Ok(None)
                }
                ActivationReason::AllFramesReady => {
                    let src1 = self
                        .node
                        .get_frame_filter(start_frame, ctx)
                        .ok_or("AudioTrim: upstream frame missing")?;
                    let mut dst =
                        Frame::new_audio_frame(&self.ai.format, length as i32, Some(&src1));
                    let head = num_src1.min(length);
                    copy_samples(&mut dst, 0, &src1, offset, head);

                    if length > head {
                        let src2 = self
                            .node
                            .get_frame_filter(start_frame + 1, ctx)
                            .ok_or("AudioTrim: upstream frame missing")?;
                        copy_samples(&mut dst, head, &src2, 0, length - head);
                    }

                    Ok(Some(dst))
                }
                ActivationReason::Error => Ok(None),
            }
        }
    }
}

//////////////////////////////////////////
// AudioSplice

/// A contiguous run of samples inside one upstream frame.
#[derive(Clone, Copy)]
struct Segment {
    clip: usize,
    frame: i32,
    offset: usize,
    count: usize,
}

pub struct AudioSplice {
    nodes: Vec<Node>,
    ai: AudioInfo,
    cum_samples: Vec<i64>,
}

impl AudioSplice {
    /// Arguments: `clips`.
    pub fn create(core: &Core, args: &Map) -> Result<Node, String> {
        let err = |e: crate::map::MapError| format!("AudioSplice: {}", e);

        let nodes: Vec<Node> = args.get_node_iter("clips").map_err(err)?.collect();
        if nodes.len() == 1 {
            return Ok(nodes.into_iter().next().unwrap());
        }

        let first_ai = nodes[0]
            .audio_info()
            .ok_or("AudioSplice: all clips must be audio")?;
        let mut total = 0i64;
        let mut cum_samples = Vec::with_capacity(nodes.len());
        for node in &nodes {
            let ai = node.audio_info().ok_or("AudioSplice: all clips must be audio")?;
            if ai.format != first_ai.format || ai.sample_rate != first_ai.sample_rate {
                return Err(
                    "AudioSplice: all clips must have the same format and sample rate".to_owned(),
                );
            }
            total += ai.num_samples;
            cum_samples.push(total);
        }

        let ai = AudioInfo::new(first_ai.format, first_ai.sample_rate, total);

        let deps = nodes
            .iter()
            .map(|node| FilterDependency::new(node.clone(), RequestPattern::NoFrameReuse))
            .collect();
        core.create_audio_filter("AudioSplice", &ai, FilterMode::Parallel, deps, AudioSplice {
            nodes,
            ai,
            cum_samples,
        })
    }

    /// Output frame `n` broken into upstream sample runs.
    fn segments(&self, n: i32) -> Vec<Segment> {
        let mut segments = Vec::new();
        let mut pos = i64::from(n) * FRAME_SAMPLES;
        let mut remaining = i64::from(self.ai.frame_samples(n));

        while remaining > 0 {
            let clip = self
                .cum_samples
                .iter()
                .position(|&cum| cum > pos)
                .expect("sample position beyond the spliced clip");
            let clip_start = if clip > 0 { self.cum_samples[clip - 1] } else { 0 };
            let local = pos - clip_start;
            let frame = (local / FRAME_SAMPLES) as i32;
            let offset = (local % FRAME_SAMPLES) as usize;
            let in_frame = i64::from(self.nodes[clip].audio_info().unwrap().frame_samples(frame))
                - offset as i64;
            let count = in_frame.min(remaining);

            segments.push(Segment {
                clip,
                frame,
                offset,
                count: count as usize,
            });
            pos += count;
            remaining -= count;
        }

        segments
    }
}

impl Filter for AudioSplice {
    fn get_frame(
        &self,
        n: i32,
        reason: ActivationReason,
        _frame_data: &mut FrameData,
        ctx: &mut FrameContext,
    ) -> Result<Option<Frame>, String> {
        match reason {
            ActivationReason::Initial => {
                for segment in self.segments(n) {
                    self.nodes[segment.clip].request_frame_filter(segment.frame, ctx);
                }
                Ok(None)
            }
            ActivationReason::AllFramesReady => {
                let mut dst = None;
                let mut dst_offset = 0usize;
                for segment in self.segments(n) {
                    let src = self.nodes[segment.clip]
                        .get_frame_filter(segment.frame, ctx)
                        .ok_or("AudioSplice: upstream frame missing")?;
                    let dst = dst.get_or_insert_with(|| {
                        Frame::new_audio_frame(
                            &self.ai.format,
                            self.ai.frame_samples(n),
                            Some(&src),
                        )
                    });
                    copy_samples(dst, dst_offset, &src, segment.offset, segment.count);
                    dst_offset += segment.count;
                }
                Ok(dst)
            }
            ActivationReason::Error => Ok(None),
        }
    }
}

//////////////////////////////////////////
// AudioLoop

pub struct AudioLoop {
    node: Node,
    ai: AudioInfo,
    src_samples: i64,
}

impl AudioLoop {
    /// Arguments: `clip`, `times` (0 loops for the maximum duration).
    pub fn create(core: &Core, args: &Map) -> Result<Node, String> {
        let err = |e: crate::map::MapError| format!("AudioLoop: {}", e);

        let times = opt_int(args, "times").map_err(err)?.unwrap_or(0);
        if times < 0 {
            return Err("AudioLoop: cannot repeat clip a negative number of times".to_owned());
        }

        let node = args.get_node("clip").map_err(err)?;
        let mut ai = node.audio_info().ok_or("AudioLoop: clip must be audio")?;
        let src_samples = ai.num_samples;

        // early termination for the trivial case
        if times == 1 {
            return Ok(node);
        }

        if times > 0 {
            if ai.num_samples > (i64::from(i32::MAX) * FRAME_SAMPLES) / times {
                return Err("AudioLoop: resulting clip is too long".to_owned());
            }
            ai.num_samples *= times;
        } else {
            ai.num_samples = i64::from(i32::MAX) * FRAME_SAMPLES;
        }

        let ai = AudioInfo::new(ai.format, ai.sample_rate, ai.num_samples);
        let deps = vec![FilterDependency::new(node.clone(), RequestPattern::General)];
        core.create_audio_filter("AudioLoop", &ai, FilterMode::Parallel, deps, AudioLoop {
            node,
            ai,
            src_samples,
        })
    }

    fn segments(&self, n: i32) -> Vec<Segment> {
        let mut segments = Vec::new();
        let mut pos = i64::from(n) * FRAME_SAMPLES;
        let mut remaining = i64::from(self.ai.frame_samples(n));

        while remaining > 0 {
            let local = pos % self.src_samples;
            let frame = (local / FRAME_SAMPLES) as i32;
            let offset = (local % FRAME_SAMPLES) as usize;
            let in_frame =
                i64::from(self.node.audio_info().unwrap().frame_samples(frame)) - offset as i64;
            let wrap = self.src_samples - local;
            let count = in_frame.min(wrap).min(remaining);

            segments.push(Segment {
                clip: 0,
                frame,
                offset,
                count: count as usize,
            });
            pos += count;
            remaining -= count;
        }

        segments
    }
}

impl Filter for AudioLoop {
    fn get_frame(
        &self,
        n: i32,
        reason: ActivationReason,
        _frame_data: &mut FrameData,
        ctx: &mut FrameContext,
    ) -> Result<Option<Frame>, String> {
        match reason {
            ActivationReason::Initial => {
                for segment in self.segments(n) {
                    self.node.request_frame_filter(segment.frame, ctx);
                }
                Ok(None)
            }
            ActivationReason::AllFramesReady => {
                let mut dst = None;
                let mut dst_offset = 0usize;
                for segment in self.segments(n) {
                    let src = self
                        .node
                        .get_frame_filter(segment.frame, ctx)
                        .ok_or("AudioLoop: upstream frame missing")?;
                    let dst = dst.get_or_insert_with(|| {
                        Frame::new_audio_frame(
                            &self.ai.format,
                            self.ai.frame_samples(n),
                            Some(&src),
                        )
                    });
                    copy_samples(dst, dst_offset, &src, segment.offset, segment.count);
                    dst_offset += segment.count;
                }
                Ok(dst)
            }
            ActivationReason::Error => Ok(None),
        }
    }
}

//////////////////////////////////////////
// AudioReverse

pub struct AudioReverse {
    node: Node,
    ai: AudioInfo,
}

impl AudioReverse {
    /// Arguments: `clip`.
    pub fn create(core: &Core, args: &Map) -> Result<Node, String> {
        let node = args
            .get_node("clip")
            .map_err(|e| format!("AudioReverse: {}", e))?;
        let ai = node.audio_info().ok_or("AudioReverse: clip must be audio")?;

        let deps = vec![FilterDependency::new(node.clone(), RequestPattern::General)];
        core.create_audio_filter("AudioReverse", &ai, FilterMode::Parallel, deps, AudioReverse {
            node,
            ai,
        })
    }

    fn reverse_into<T: Copy>(dst: &mut Frame, dst_offset: usize, src: &Frame, take: usize, skip: usize) {
        let channels = src.get_audio_format().unwrap().num_channels;
        let len = src.get_length() as usize;
        for channel in 0..channels {
            let samples: Vec<T> = src.channel::<T>(channel).to_vec();
            let out = &mut dst.channel_mut::<T>(channel)[dst_offset..dst_offset + take];
            for (i, slot) in out.iter_mut().enumerate() {
                *slot = samples[len - i - 1 - skip];
            }
        }
    }

    fn dispatch_reverse(
        &self,
        dst: &mut Frame,
        dst_offset: usize,
        src: &Frame,
        take: usize,
        skip: usize,
    ) {
        match self.ai.format.bytes_per_sample {
            2 => Self::reverse_into::<u16>(dst, dst_offset, src, take, skip),
            _ => Self::reverse_into::<u32>(dst, dst_offset, src, take, skip),
        }
    }
}

impl Filter for AudioReverse {
    fn get_frame(
        &self,
        n: i32,
        reason: ActivationReason,
        _frame_data: &mut FrameData,
        ctx: &mut FrameContext,
    ) -> Result<Option<Frame>, String> {
        let n1 = self.ai.num_frames - 1 - n;
        let n2 = (self.ai.num_frames - 2 - n).max(0);

        match reason {
            ActivationReason::Initial => {
                self.node.request_frame_filter(n1, ctx);
                if self.ai.num_samples % FRAME_SAMPLES != 0 {
                    self.node.request_frame_filter(n2, ctx);
                }
                Ok(None)
            }
            ActivationReason::AllFramesReady => {
                let dst_length = self.ai.frame_samples(n) as usize;
                let src1 = self
                    .node
                    .get_frame_filter(n1, ctx)
                    .ok_or("AudioReverse: upstream frame missing")?;
                let l1 = src1.get_length() as usize;
                let tail = (self.ai.num_samples % FRAME_SAMPLES) as usize;
                let s1_offset = if tail == 0 { 0 } else { l1 - tail };
                let s1_samples = l1 - s1_offset;

                let mut dst =
                    Frame::new_audio_frame(&self.ai.format, dst_length as i32, Some(&src1));
                self.dispatch_reverse(&mut dst, 0, &src1, s1_samples.min(dst_length), s1_offset);

                let remaining = dst_length.saturating_sub(s1_samples);
                if remaining > 0 {
                    let src2 = self
                        .node
                        .get_frame_filter(n2, ctx)
                        .ok_or("AudioReverse: upstream frame missing")?;
                    self.dispatch_reverse(&mut dst, s1_samples, &src2, remaining, 0);
                }

                Ok(Some(dst))
            }
            ActivationReason::Error => Ok(None),
        }
    }
}

//////////////////////////////////////////
// AudioGain

pub struct AudioGain {
    node: Node,
    format: AudioFormat,
    gain: Vec<f32>,
}

impl AudioGain {
    /// Arguments: `clip`, `gain` (one value per channel or a single value).
    pub fn create(core: &Core, args: &Map) -> Result<Node, String> {
        let err = |e: crate::map::MapError| format!("AudioGain: {}", e);

        let gain: Vec<f32> = opt_float_array(args, "gain")
            .map_err(err)?
            .unwrap_or_else(|| vec![1.0])
            .iter()
            .map(|&g| g as f32)
            .collect();

        let node = args.get_node("clip").map_err(err)?;
        let ai = node.audio_info().ok_or("AudioGain: clip must be audio")?;

        if gain.len() != 1 && gain.len() != ai.format.num_channels as usize {
            return Err(
                "AudioGain: must provide one gain value per channel or a single value used for all channels"
                    .to_owned(),
            );
        }

        let deps = vec![FilterDependency::new(node.clone(), RequestPattern::StrictSpatial)];
        core.create_audio_filter("AudioGain", &ai, FilterMode::Parallel, deps, AudioGain {
            node,
            format: ai.format,
            gain,
        })
    }

    fn channel_gain(&self, channel: i32) -> f32 {
        if self.gain.len() > 1 {
            self.gain[channel as usize]
        } else {
            self.gain[0]
        }
    }

    fn apply(&self, src: &Frame) -> Frame {
        let length = src.get_length();
        let mut dst = Frame::new_audio_frame(&self.format, length, Some(src));
        for channel in 0..self.format.num_channels {
            let gain = self.channel_gain(channel);
            match (self.format.sample_type, self.format.bytes_per_sample) {
                (SampleType::Float, _) => {
                    let samples: Vec<f32> = src.channel::<f32>(channel).to_vec();
                    for (d, s) in dst.channel_mut::<f32>(channel).iter_mut().zip(samples) {
                        *d = s * gain;
                    }
                }
                (_, 2) => {
                    let samples: Vec<i16> = src.channel::<i16>(channel).to_vec();
                    for (d, s) in dst.channel_mut::<i16>(channel).iter_mut().zip(samples) {
                        *d = (f32::from(s) * gain) as i16;
                    }
                }
                _ => {
                    let samples: Vec<i32> = src.channel::<i32>(channel).to_vec();
                    for (d, s) in dst.channel_mut::<i32>(channel).iter_mut().zip(samples) {
                        *d = (s as f32 * gain) as i32;
                    }
                }
            }
        }
        dst
    }
}

impl Filter for AudioGain {
    fn get_frame(
        &self,
        n: i32,
        reason: ActivationReason,
        _frame_data: &mut FrameData,
        ctx: &mut FrameContext,
    ) -> Result<Option<Frame>, String> {
        match reason {
            ActivationReason::Initial => {
                self.node.request_frame_filter(n, ctx);
                Ok(None)
            }
            ActivationReason::AllFramesReady => {
                let src = self
                    .node
                    .get_frame_filter(n, ctx)
                    .ok_or("AudioGain: upstream frame missing")?;
                Ok(Some(self.apply(&src)))
            }
            ActivationReason::Error => Ok(None),
        }
    }
}

//////////////////////////////////////////
// AudioMix

struct MixSource {
    node_idx: usize,
    channel: i32,
    weights: Vec<f64>,
}

/// Mixes the channels of the input clips into a stereo clip using a weight
/// matrix. Output layouts other than two channels are rejected.
pub struct AudioMix {
    req_nodes: Vec<Node>,
    sources: Vec<MixSource>,
    output_idx: Vec<usize>,
    ai: AudioInfo,
}

impl AudioMix {
    /// Arguments: `clips`, `matrix` (input-major weights), `channels_out`
    /// (exactly two channel indices).
    pub fn create(core: &Core, args: &Map) -> Result<Node, String> {
        let err = |e: crate::map::MapError| format!("AudioMix: {}", e);

        let nodes: Vec<Node> = args.get_node_iter("clips").map_err(err)?.collect();
        let matrix = args.get_float_array("matrix").map_err(err)?;
        let channels_out = args.get_int_array("channels_out").map_err(err)?;

        if channels_out.len() != 2 {
            return Err("AudioMix: output must have exactly two channels".to_owned());
        }

        let mut layout = ChannelLayout::empty();
        for &c in &channels_out {
            let bit = ChannelLayout::from_bits_truncate(1u64 << c);
            if layout.contains(bit) {
                return Err("AudioMix: output channel specified twice".to_owned());
            }
            layout |= bit;
        }

        // Map each requested output channel to its index in the bitmap order.
        let mut output_idx = Vec::with_capacity(channels_out.len());
        for &c in &channels_out {
            let pos = (0..c).filter(|&j| layout.bits() & (1u64 << j) != 0).count();
            output_idx.push(pos);
        }

        let first_ai = nodes
            .first()
            .and_then(|n| n.audio_info())
            .ok_or("AudioMix: all clips must be audio")?;

        let mut sources = Vec::new();
        for (i, node) in nodes.iter().enumerate() {
            let ai = node.audio_info().ok_or("AudioMix: all clips must be audio")?;
            if ai.num_samples != first_ai.num_samples
                || ai.sample_rate != first_ai.sample_rate
                || ai.format.bits_per_sample != first_ai.format.bits_per_sample
                || ai.format.sample_type != first_ai.format.sample_type
            {
                return Err(
                    "AudioMix: all inputs must have the same length, samplerate, bits per sample and sample type"
                        .to_owned(),
                );
            }
            for channel in 0..ai.format.num_channels {
                sources.push(MixSource {
                    node_idx: i,
                    channel,
                    weights: Vec::new(),
                });
            }
        }

        let num_src_channels = sources.len();
        if nodes.len() > num_src_channels {
            return Err("AudioMix: cannot have more input nodes than selected input channels".to_owned());
        }
        if channels_out.len() * num_src_channels != matrix.len() {
            return Err(
                "AudioMix: the number of matrix weights must equal (input channels * output channels)"
                    .to_owned(),
            );
        }

        for (i, source) in sources.iter_mut().enumerate() {
            for j in 0..channels_out.len() {
                source.weights.push(matrix[j * num_src_channels + i]);
            }
        }

        let format = AudioFormat::query(
            first_ai.format.sample_type,
            first_ai.format.bits_per_sample,
            layout,
        )
        .map_err(|_| "AudioMix: invalid output channel configuration".to_owned())?;
        let ai = AudioInfo::new(format, first_ai.sample_rate, first_ai.num_samples);

        let deps = nodes
            .iter()
            .map(|node| FilterDependency::new(node.clone(), RequestPattern::StrictSpatial))
            .collect();
        core.create_audio_filter("AudioMix", &ai, FilterMode::Parallel, deps, AudioMix {
            req_nodes: nodes,
            sources,
            output_idx,
            ai,
        })
    }

    fn mix<T: Copy + Into<f64>>(
        &self,
        frames: &[Frame],
        dst: &mut Frame,
        length: usize,
        convert: impl Fn(f64) -> T,
    ) {
        let src_channels: Vec<Vec<T>> = self
            .sources
            .iter()
            .map(|s| frames[s.node_idx].channel::<T>(s.channel).to_vec())
            .collect();

        for (out, &dst_channel) in self.output_idx.iter().enumerate() {
            let data = dst.channel_mut::<T>(dst_channel as i32);
            for (i, slot) in data.iter_mut().enumerate().take(length) {
                let mut acc = 0.0f64;
                for (src, samples) in self.sources.iter().zip(&src_channels) {
                    acc += samples[i].into() * src.weights[out];
                }
                *slot = convert(acc);
            }
        }
    }
}

impl Filter for AudioMix {
    fn get_frame(
        &self,
        n: i32,
        reason: ActivationReason,
        _frame_data: &mut FrameData,
        ctx: &mut FrameContext,
    ) -> Result<Option<Frame>, String> {
        match reason {
            ActivationReason::Initial => {
                for node in &self.req_nodes {
                    node.request_frame_filter(n, ctx);
                }
                Ok(None)
            }
            ActivationReason::AllFramesReady => {
                let mut frames = Vec::with_capacity(self.req_nodes.len());
                for node in &self.req_nodes {
                    frames.push(
                        node.get_frame_filter(n, ctx)
                            .ok_or("AudioMix: upstream frame missing")?,
                    );
                }

                let length = frames[0].get_length();
                let mut dst = Frame::new_audio_frame(&self.ai.format, length, Some(&frames[0]));

                match (self.ai.format.sample_type, self.ai.format.bytes_per_sample) {
                    (SampleType::Float, _) => {
                        self.mix::<f32>(&frames, &mut dst, length as usize, |v| v as f32)
                    }
                    (_, 2) => {
                        self.mix::<i16>(&frames, &mut dst, length as usize, |v| v as i16)
                    }
                    _ => self.mix::<i32>(&frames, &mut dst, length as usize, |v| v as i32),
                }

                Ok(Some(dst))
            }
            ActivationReason::Error => Ok(None),
        }
    }
}

//////////////////////////////////////////
// ShuffleChannels

struct ShuffleSource {
    node: Node,
    /// Channel index within the source frame, after layout resolution.
    channel: i32,
    num_frames: i32,
}

/// Reassembles an output clip from arbitrary channels of the input clips.
/// Shorter inputs are padded with silence.
pub struct ShuffleChannels {
    req_nodes: Vec<Node>,
    sources: Vec<ShuffleSource>,
    ai: AudioInfo,
}

impl ShuffleChannels {
    /// Arguments: `clips`, `channels_in` (channel ids, or negative raw
    /// indices as `-(index + 1)`), `channels_out` (channel ids forming the
    /// output layout).
    pub fn create(core: &Core, args: &Map) -> Result<Node, String> {
        let err = |e: crate::map::MapError| format!("ShuffleChannels: {}", e);

        let nodes: Vec<Node> = args.get_node_iter("clips").map_err(err)?.collect();
        let channels_in = args.get_int_array("channels_in").map_err(err)?;
        let channels_out = args.get_int_array("channels_out").map_err(err)?;

        if channels_in.len() != channels_out.len() {
            return Err(
                "ShuffleChannels: must have the same number of channels_in and channels_out"
                    .to_owned(),
            );
        }
        if nodes.is_empty() || channels_in.is_empty() {
            return Err("ShuffleChannels: at least one clip and channel required".to_owned());
        }
        if nodes.len() > channels_in.len() {
            return Err(
                "ShuffleChannels: cannot have more input nodes than selected input channels"
                    .to_owned(),
            );
        }

        let mut layout = ChannelLayout::empty();
        // (destination channel id, source node, requested source channel)
        let mut picks: Vec<(i64, Node, i64)> = Vec::with_capacity(channels_in.len());
        for (i, (&channel, &dst_channel)) in channels_in.iter().zip(&channels_out).enumerate() {
            layout |= ChannelLayout::from_bits_truncate(1u64 << dst_channel);
            let node = nodes[i.min(nodes.len() - 1)].clone();
            picks.push((dst_channel, node, channel));
        }

        // Output channels are stored in layout bitmap order.
        picks.sort_by_key(|&(dst, _, _)| dst);

        let first_ai = picks[0]
            .1
            .audio_info()
            .ok_or("ShuffleChannels: all clips must be audio")?;
        let mut num_samples = first_ai.num_samples;

        let mut sources = Vec::with_capacity(picks.len());
        for (_, node, requested) in &picks {
            let ai = node
                .audio_info()
                .ok_or("ShuffleChannels: all clips must be audio")?;
            if ai.sample_rate != first_ai.sample_rate
                || ai.format.bits_per_sample != first_ai.format.bits_per_sample
                || ai.format.sample_type != first_ai.format.sample_type
            {
                return Err(
                    "ShuffleChannels: all inputs must have the same samplerate, bits per sample and sample type"
                        .to_owned(),
                );
            }

            // Resolve channel ids to plain frame indices.
            let channel = if *requested < 0 {
                let idx = (-*requested - 1) as i32;
                if ai.format.num_channels <= idx {
                    return Err(
                        "ShuffleChannels: specified channel is not present in input".to_owned(),
                    );
                }
                idx
            } else {
                let bit = 1u64 << *requested;
                if *requested > 0 && ai.format.channel_layout.bits() & bit == 0 {
                    return Err(
                        "ShuffleChannels: specified channel is not present in input".to_owned(),
                    );
                }
                (0..*requested)
                    .filter(|&j| ai.format.channel_layout.bits() & (1u64 << j) != 0)
                    .count() as i32
            };

            num_samples = num_samples.max(ai.num_samples);
            sources.push(ShuffleSource {
                node: node.clone(),
                channel,
                num_frames: ai.num_frames,
            });
        }

        let format = AudioFormat::query(
            first_ai.format.sample_type,
            first_ai.format.bits_per_sample,
            layout,
        )
        .map_err(|_| "ShuffleChannels: invalid output channel configuration".to_owned())?;
        if format.num_channels as usize != channels_out.len() {
            return Err("ShuffleChannels: output channel specified twice".to_owned());
        }
        let ai = AudioInfo::new(format, first_ai.sample_rate, num_samples);

        // Request each distinct node only once.
        let mut req_nodes: Vec<Node> = Vec::new();
        for source in &sources {
            if !req_nodes.contains(&source.node) {
                req_nodes.push(source.node.clone());
            }
        }

        let deps = req_nodes
            .iter()
            .map(|node| {
                let pattern = if ai.num_frames <= node.audio_info().unwrap().num_frames {
                    RequestPattern::StrictSpatial
                } else {
                    RequestPattern::General
                };
                FilterDependency::new(node.clone(), pattern)
            })
            .collect();
        core.create_audio_filter(
            "ShuffleChannels",
            &ai,
            FilterMode::Parallel,
            deps,
            ShuffleChannels {
                req_nodes,
                sources,
                ai,
            },
        )
    }
}

impl Filter for ShuffleChannels {
    fn get_frame(
        &self,
        n: i32,
        reason: ActivationReason,
        _frame_data: &mut FrameData,
        ctx: &mut FrameContext,
    ) -> Result<Option<Frame>, String> {
        match reason {
            ActivationReason::Initial => {
                for node in &self.req_nodes {
                    node.request_frame_filter(n, ctx);
                }
                Ok(None)
            }
            ActivationReason::AllFramesReady => {
                let dst_length = self.ai.frame_samples(n) as usize;
                let mut dst = None;
                let bps = self.ai.format.bytes_per_sample as usize;

                for (idx, source) in self.sources.iter().enumerate() {
                    let src = source
                        .node
                        .get_frame_filter(n, ctx)
                        .ok_or("ShuffleChannels: upstream frame missing")?;
                    // Inputs past their end contribute silence; fresh frames
                    // are already zeroed.
                    let src_length = if n < source.num_frames {
                        src.get_length() as usize
                    } else {
                        0
                    };
                    let copy_length = dst_length.min(src_length);

                    let dst = dst.get_or_insert_with(|| {
                        Frame::new_audio_frame(&self.ai.format, dst_length as i32, Some(&src))
                    });
                    if copy_length > 0 {
                        let src_bytes =
                            src.get_read_slice(source.channel)[..copy_length * bps].to_vec();
                        dst.get_write_slice(idx as i32)[..copy_length * bps]
                            .copy_from_slice(&src_bytes);
                    }
                }

                Ok(dst)
            }
            ActivationReason::Error => Ok(None),
        }
    }
}

//////////////////////////////////////////
// SplitChannels

/// Splits a clip into one mono clip per channel, in layout bitmap order.
pub struct SplitChannels;

impl SplitChannels {
    /// Arguments: `clip`.
    pub fn create(core: &Core, args: &Map) -> Result<Vec<Node>, String> {
        let err = |e: crate::map::MapError| format!("SplitChannels: {}", e);

        let node = args.get_node("clip").map_err(err)?;
        let ai = node
            .audio_info()
            .ok_or("SplitChannels: clip must be audio")?;

        // Pass through when nothing to do.
        if ai.format.num_channels == 1 {
            return Ok(vec![node]);
        }

        let mut out = Vec::with_capacity(ai.format.num_channels as usize);
        let mut index = 0i64;
        for _ in 0..ai.format.num_channels {
            while ai.format.channel_layout.bits() & (1u64 << index) == 0 {
                index += 1;
            }

            let mut shuffle_args = Map::new();
            shuffle_args.set_node("clips", &node).map_err(err)?;
            shuffle_args.set_int("channels_in", index).map_err(err)?;
            shuffle_args.set_int("channels_out", index).map_err(err)?;
            out.push(ShuffleChannels::create(core, &shuffle_args)?);
            index += 1;
        }

        Ok(out)
    }
}

//////////////////////////////////////////
// AssumeSampleRate

/// Replaces the reported sample rate without touching any samples.
pub struct AssumeSampleRate {
    node: Node,
}

impl AssumeSampleRate {
    /// Arguments: `clip`, and exactly one of `src` (clip to copy the rate
    /// from) or `samplerate`.
    pub fn create(core: &Core, args: &Map) -> Result<Node, String> {
        let err = |e: crate::map::MapError| format!("AssumeSampleRate: {}", e);

        let node = args.get_node("clip").map_err(err)?;
        let mut ai = node
            .audio_info()
            .ok_or("AssumeSampleRate: clip must be audio")?;

        let samplerate = opt_int(args, "samplerate").map_err(err)?;
        let src = match args.get_node("src") {
            Ok(src) => Some(src),
            Err(crate::map::MapError::KeyNotFound) => None,
            Err(e) => return Err(err(e)),
        };

        match (samplerate, &src) {
            (Some(rate), None) => ai.sample_rate = rate as i32,
            (None, Some(src)) => {
                ai.sample_rate = src
                    .audio_info()
                    .ok_or("AssumeSampleRate: src must be audio")?
                    .sample_rate;
            }
            _ => {
                return Err(
                    "AssumeSampleRate: need to specify source clip or samplerate".to_owned(),
                )
            }
        }

        if ai.sample_rate < 1 {
            return Err("AssumeSampleRate: invalid samplerate specified".to_owned());
        }

        let deps = vec![FilterDependency::new(node.clone(), RequestPattern::StrictSpatial)];
        core.create_audio_filter(
            "AssumeSampleRate",
            &ai,
            FilterMode::Parallel,
            deps,
            AssumeSampleRate { node },
        )
    }
}

impl Filter for AssumeSampleRate {
    fn get_frame(
        &self,
        n: i32,
        reason: ActivationReason,
        _frame_data: &mut FrameData,
        ctx: &mut FrameContext,
    ) -> Result<Option<Frame>, String> {
        match reason {
            ActivationReason::Initial => {
                self.node.request_frame_filter(n, ctx);
                Ok(None)
            }
            ActivationReason::AllFramesReady => Ok(self.node.get_frame_filter(n, ctx)),
            ActivationReason::Error => Ok(None),
        }
    }
}
