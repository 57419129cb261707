//! Module for frame related types and functionality.
mod enums;

#[cfg(test)]
mod tests;

use std::collections::HashMap;
use std::sync::Arc;

use crate::format::{AudioFormat, MediaType, VideoFormat};
use crate::map::Map;
use crate::node::Node;

pub use enums::{ChromaLocation, ColorRange, Field, FieldBased};

/// Plane buffers are aligned to this many bytes, and strides are padded to a
/// multiple of it.
pub const FRAME_ALIGN: usize = 64;

/// A reference-counted, 64-byte aligned byte buffer backing one plane.
#[derive(Debug)]
pub(crate) struct PlaneBuffer {
    storage: Vec<u8>,
    offset: usize,
    len: usize,
}

impl PlaneBuffer {
    fn zeroed(len: usize) -> Self {
        let storage = vec![0u8; len + FRAME_ALIGN - 1];
        let offset = storage.as_ptr().align_offset(FRAME_ALIGN);
        Self {
            storage,
            offset,
            len,
        }
    }

    #[inline]
    fn bytes(&self) -> &[u8] {
        &self.storage[self.offset..self.offset + self.len]
    }

    #[inline]
    fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.storage[self.offset..self.offset + self.len]
    }
}

#[derive(Debug, Clone)]
pub(crate) struct PlaneStorage {
    buf: Arc<PlaneBuffer>,
    /// Distance in bytes between two consecutive lines. Always positive.
    stride: isize,
    /// Width in samples.
    width: i32,
    /// Height in lines. 1 for audio channels.
    height: i32,
}

impl PlaneStorage {
    fn new(width: i32, height: i32, bytes_per_sample: i32) -> Self {
        let row = (width as usize * bytes_per_sample as usize + FRAME_ALIGN - 1)
            & !(FRAME_ALIGN - 1);
        Self {
            buf: Arc::new(PlaneBuffer::zeroed(row * height as usize)),
            stride: row as isize,
            width,
            height,
        }
    }

    fn deep_copy(&self) -> Self {
        let mut buf = PlaneBuffer::zeroed(self.buf.len);
        buf.bytes_mut().copy_from_slice(self.buf.bytes());
        Self {
            buf: Arc::new(buf),
            ..self.clone()
        }
    }
}

#[derive(Debug)]
enum FrameContent {
    Video {
        format: VideoFormat,
        width: i32,
        height: i32,
        planes: Vec<PlaneStorage>,
    },
    Audio {
        format: AudioFormat,
        /// Samples per channel carried by this frame.
        num_samples: i32,
        channels: Vec<PlaneStorage>,
    },
}

#[derive(Debug)]
struct FrameInner {
    content: FrameContent,
    props: Map,
}

/// One frame of a clip.
///
/// Frames are immutable once published; cloning a `Frame` only bumps a
/// reference count. Write access requires unique ownership of both the frame
/// and the touched plane buffer and panics otherwise; use
/// [`Frame::copy_frame`] or [`Frame::make_unique`] to obtain a writable copy.
#[derive(Debug, Clone)]
pub struct Frame {
    inner: Arc<FrameInner>,
}

impl Frame {
    /// Creates a new video frame, optionally copying the properties attached
    /// to another frame.
    ///
    /// # Panics
    ///
    /// If the dimensions are not positive or not divisible by the format's
    /// subsampling.
    pub fn new_video_frame(
        format: &VideoFormat,
        width: i32,
        height: i32,
        prop_src: Option<&Frame>,
    ) -> Self {
        assert!(width > 0 && height > 0, "frame dimensions must be positive");
        assert!(
            width % (1 << format.sub_sampling_w) == 0,
            "width must be divisible by the horizontal subsampling"
        );
        assert!(
            height % (1 << format.sub_sampling_h) == 0,
            "height must be divisible by the vertical subsampling"
        );

        let planes = (0..format.num_planes)
            .map(|p| {
                PlaneStorage::new(
                    format.plane_width(width, p),
                    format.plane_height(height, p),
                    format.bytes_per_sample,
                )
            })
            .collect();

        Self {
            inner: Arc::new(FrameInner {
                content: FrameContent::Video {
                    format: *format,
                    width,
                    height,
                    planes,
                },
                props: prop_src.map(|f| f.inner.props.clone()).unwrap_or_default(),
            }),
        }
    }

    /// Creates a new video frame from the planes of existing frames. Planes
    /// listed in `plane_src`/`planes` are shared with their source frame
    /// without copying; the rest are freshly allocated.
    ///
    /// # Panics
    ///
    /// If a reused plane has incompatible dimensions or sample size.
    pub fn new_video_frame2(
        format: &VideoFormat,
        width: i32,
        height: i32,
        plane_src: &[Option<&Frame>],
        planes: &[i32],
        prop_src: Option<&Frame>,
    ) -> Self {
        assert_eq!(plane_src.len(), planes.len());

        let mut out = Self::new_video_frame(format, width, height, prop_src);
        {
            let inner = Arc::get_mut(&mut out.inner).unwrap();
            let FrameContent::Video { planes: dst_planes, .. } = &mut inner.content else {
                unreachable!()
            };

            for (p, (src, &src_plane)) in plane_src.iter().zip(planes).enumerate() {
                if p >= dst_planes.len() {
                    break;
                }
                let Some(src) = src else { continue };
                let FrameContent::Video {
                    format: src_format,
                    planes: src_planes,
                    ..
                } = &src.inner.content
                else {
                    panic!("plane source must be a video frame")
                };
                let storage = &src_planes[src_plane as usize];
                assert_eq!(
                    src_format.bytes_per_sample, format.bytes_per_sample,
                    "shared plane must have the same sample size"
                );
                assert!(
                    storage.width == dst_planes[p].width
                        && storage.height == dst_planes[p].height,
                    "shared plane must have the same dimensions"
                );
                dst_planes[p] = storage.clone();
            }
        }
        out
    }

    /// Creates a new audio frame holding `num_samples` samples per channel,
    /// optionally copying the properties attached to another frame.
    ///
    /// # Panics
    ///
    /// If `num_samples` is not positive.
    pub fn new_audio_frame(
        format: &AudioFormat,
        num_samples: i32,
        prop_src: Option<&Frame>,
    ) -> Self {
        assert!(num_samples > 0, "sample count must be positive");

        let channels = (0..format.num_channels)
            .map(|_| PlaneStorage::new(num_samples, 1, format.bytes_per_sample))
            .collect();

        Self {
            inner: Arc::new(FrameInner {
                content: FrameContent::Audio {
                    format: *format,
                    num_samples,
                    channels,
                },
                props: prop_src.map(|f| f.inner.props.clone()).unwrap_or_default(),
            }),
        }
    }

    /// Produces a writable clone: plane data is copied deeply, the property
    /// map shallowly (value arrays stay shared until modified). Mutating the
    /// clone never aliases the original.
    pub fn copy_frame(&self) -> Frame {
        let content = match &self.inner.content {
            FrameContent::Video {
                format,
                width,
                height,
                planes,
            } => FrameContent::Video {
                format: *format,
                width: *width,
                height: *height,
                planes: planes.iter().map(PlaneStorage::deep_copy).collect(),
            },
            FrameContent::Audio {
                format,
                num_samples,
                channels,
            } => FrameContent::Audio {
                format: *format,
                num_samples: *num_samples,
                channels: channels.iter().map(PlaneStorage::deep_copy).collect(),
            },
        };
        Frame {
            inner: Arc::new(FrameInner {
                content,
                props: self.inner.props.clone(),
            }),
        }
    }

    /// Ensures this handle is the sole owner, deep-copying if it is not.
    pub fn make_unique(&mut self) {
        if Arc::get_mut(&mut self.inner).is_none() {
            *self = self.copy_frame();
        }
    }

    fn storages(&self) -> &[PlaneStorage] {
        match &self.inner.content {
            FrameContent::Video { planes, .. } => planes,
            FrameContent::Audio { channels, .. } => channels,
        }
    }

    fn storage(&self, plane: i32) -> &PlaneStorage {
        &self.storages()[plane as usize]
    }

    pub fn get_frame_type(&self) -> MediaType {
        match &self.inner.content {
            FrameContent::Video { .. } => MediaType::Video,
            FrameContent::Audio { .. } => MediaType::Audio,
        }
    }

    pub fn get_video_format(&self) -> Option<VideoFormat> {
        match &self.inner.content {
            FrameContent::Video { format, .. } => Some(*format),
            FrameContent::Audio { .. } => None,
        }
    }

    pub fn get_audio_format(&self) -> Option<AudioFormat> {
        match &self.inner.content {
            FrameContent::Audio { format, .. } => Some(*format),
            FrameContent::Video { .. } => None,
        }
    }

    /// Returns the width of a plane, in pixels. The width depends on the
    /// plane number because of the possible chroma subsampling.
    #[inline]
    pub fn get_width(&self, plane: i32) -> i32 {
        self.storage(plane).width
    }

    /// Returns the height of a plane, in pixels.
    #[inline]
    pub fn get_height(&self, plane: i32) -> i32 {
        self.storage(plane).height
    }

    /// Returns the number of samples per channel of an audio frame, or 0 for
    /// video frames.
    #[inline]
    pub fn get_length(&self) -> i32 {
        match &self.inner.content {
            FrameContent::Audio { num_samples, .. } => *num_samples,
            FrameContent::Video { .. } => 0,
        }
    }

    /// Returns the distance in bytes between two consecutive lines of a
    /// plane. The stride is always positive.
    #[inline]
    pub fn get_stride(&self, plane: i32) -> isize {
        self.storage(plane).stride
    }

    /// Read-only access to the full plane storage including stride padding.
    pub fn get_read_slice(&self, plane: i32) -> &[u8] {
        self.storage(plane).buf.bytes()
    }

    /// Mutable access to the full plane storage (only for uniquely owned
    /// frames with unshared plane buffers).
    pub fn get_write_slice(&mut self, plane: i32) -> &mut [u8] {
        let inner = Arc::get_mut(&mut self.inner)
            .expect("frame must be uniquely owned for write access");
        let storage = match &mut inner.content {
            FrameContent::Video { planes, .. } => &mut planes[plane as usize],
            FrameContent::Audio { channels, .. } => &mut channels[plane as usize],
        };
        Arc::get_mut(&mut storage.buf)
            .expect("plane buffer is shared; copy the frame before writing")
            .bytes_mut()
    }

    /// One row of a plane as typed samples, excluding the stride padding.
    ///
    /// # Panics
    ///
    /// If `T` does not match the format's sample size.
    pub fn row<T: Copy>(&self, plane: i32, y: i32) -> &[T] {
        let storage = self.storage(plane);
        let bps = std::mem::size_of::<T>();
        debug_assert_eq!(bps, self.bytes_per_sample() as usize);
        let start = y as usize * storage.stride as usize;
        let bytes = &storage.buf.bytes()[start..start + storage.width as usize * bps];
        // Alignment holds: plane bases and strides are multiples of FRAME_ALIGN.
        unsafe { std::slice::from_raw_parts(bytes.as_ptr().cast(), storage.width as usize) }
    }

    /// Mutable row access; same ownership requirements as `get_write_slice`.
    pub fn row_mut<T: Copy>(&mut self, plane: i32, y: i32) -> &mut [T] {
        let width = self.get_width(plane) as usize;
        let stride = self.get_stride(plane) as usize;
        let bps = std::mem::size_of::<T>();
        debug_assert_eq!(bps, self.bytes_per_sample() as usize);
        let start = y as usize * stride;
        let bytes = &mut self.get_write_slice(plane)[start..start + width * bps];
        unsafe { std::slice::from_raw_parts_mut(bytes.as_mut_ptr().cast(), width) }
    }

    /// All samples of one audio channel.
    pub fn channel<T: Copy>(&self, channel: i32) -> &[T] {
        self.row(channel, 0)
    }

    /// Mutable access to one audio channel.
    pub fn channel_mut<T: Copy>(&mut self, channel: i32) -> &mut [T] {
        self.row_mut(channel, 0)
    }

    fn bytes_per_sample(&self) -> i32 {
        match &self.inner.content {
            FrameContent::Video { format, .. } => format.bytes_per_sample,
            FrameContent::Audio { format, .. } => format.bytes_per_sample,
        }
    }

    /// Read-only access to frame properties
    #[inline]
    pub fn properties(&self) -> &Map {
        &self.inner.props
    }

    /// Read-write access to frame properties (only for uniquely owned frames)
    #[inline]
    pub fn properties_mut(&mut self) -> &mut Map {
        &mut Arc::get_mut(&mut self.inner)
            .expect("frame must be uniquely owned to modify properties")
            .props
    }

    pub fn planes(&self) -> Planes<'_> {
        Planes {
            frame: self,
            total: self.storages().len() as i32,
            current: 0,
        }
    }

    // Standard frame property getters

    /// Get color range (full or limited)
    pub fn color_range(&self) -> Option<ColorRange> {
        match self.properties().get_int("_ColorRange").ok()? {
            0 => Some(ColorRange::Full),
            1 => Some(ColorRange::Limited),
            _ => None,
        }
    }

    /// Get field based information (interlaced)
    pub fn field_based(&self) -> Option<FieldBased> {
        match self.properties().get_int("_FieldBased").ok()? {
            0 => Some(FieldBased::Progressive),
            1 => Some(FieldBased::BottomFieldFirst),
            2 => Some(FieldBased::TopFieldFirst),
            _ => None,
        }
    }

    /// Get which field was used to generate this frame
    pub fn field(&self) -> Option<Field> {
        match self.properties().get_int("_Field").ok()? {
            0 => Some(Field::Bottom),
            1 => Some(Field::Top),
            _ => None,
        }
    }

    /// Get frame duration as a rational number (numerator, denominator)
    pub fn duration(&self) -> Option<(i64, i64)> {
        let num = self.properties().get_int("_DurationNum").ok()?;
        let den = self.properties().get_int("_DurationDen").ok()?;
        Some((num, den))
    }

    /// Get absolute timestamp in seconds
    pub fn absolute_time(&self) -> Option<f64> {
        self.properties().get_float("_AbsoluteTime").ok()
    }

    // Standard frame property setters (for uniquely owned frames only)

    /// Set color range (full or limited)
    pub fn set_color_range(&mut self, range: ColorRange) {
        let _ = self.properties_mut().set_int("_ColorRange", range as i64);
    }

    /// Set field based information (interlaced)
    pub fn set_field_based(&mut self, field_based: FieldBased) {
        let _ = self
            .properties_mut()
            .set_int("_FieldBased", field_based as i64);
    }

    /// Set which field was used to generate this frame
    pub fn set_field(&mut self, field: Field) {
        let _ = self.properties_mut().set_int("_Field", field as i64);
    }

    /// Set frame duration as a rational number (numerator, denominator)
    pub fn set_duration(&mut self, num: i64, den: i64) {
        let _ = self.properties_mut().set_int("_DurationNum", num);
        let _ = self.properties_mut().set_int("_DurationDen", den);
    }
}

/// Compares pixel/sample content. Two frames with the same format and
/// dimensions and identical per-plane data are equal regardless of stride
/// differences. Properties do not participate.
impl PartialEq for Frame {
    fn eq(&self, other: &Self) -> bool {
        match (&self.inner.content, &other.inner.content) {
            (
                FrameContent::Video { format: f1, width: w1, height: h1, .. },
                FrameContent::Video { format: f2, width: w2, height: h2, .. },
            ) => {
                if f1 != f2 || w1 != w2 || h1 != h2 {
                    return false;
                }
                let bps = f1.bytes_per_sample as usize;
                (0..f1.num_planes).all(|p| {
                    let width = self.get_width(p) as usize * bps;
                    (0..self.get_height(p)).all(|y| {
                        let a = &self.get_read_slice(p)
                            [y as usize * self.get_stride(p) as usize..][..width];
                        let b = &other.get_read_slice(p)
                            [y as usize * other.get_stride(p) as usize..][..width];
                        a == b
                    })
                })
            }
            (
                FrameContent::Audio { format: f1, num_samples: n1, .. },
                FrameContent::Audio { format: f2, num_samples: n2, .. },
            ) => {
                if f1 != f2 || n1 != n2 {
                    return false;
                }
                let width = *n1 as usize * f1.bytes_per_sample as usize;
                (0..f1.num_channels)
                    .all(|c| self.get_read_slice(c)[..width] == other.get_read_slice(c)[..width])
            }
            _ => false,
        }
    }
}

pub struct Plane<'a> {
    pub data: &'a [u8],
    pub stride: isize,
    pub width: i32,
    pub height: i32,
}

pub struct Planes<'a> {
    frame: &'a Frame,
    total: i32,
    current: i32,
}

impl<'a> Iterator for Planes<'a> {
    type Item = Plane<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current >= self.total {
            None
        } else {
            let plane = Plane {
                data: self.frame.get_read_slice(self.current),
                stride: self.frame.get_stride(self.current),
                width: self.frame.get_width(self.current),
                height: self.frame.get_height(self.current),
            };
            self.current += 1;
            Some(plane)
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.total - self.current) as usize;
        (remaining, Some(remaining))
    }
}

impl<'a> ExactSizeIterator for Planes<'a> {}

/// The per-request context handed to a filter's get_frame function.
///
/// During the `Initial` phase it records upstream frame requests; during
/// `AllFramesReady` it hands out the resolved frames.
#[derive(Debug, Default)]
pub struct FrameContext {
    pub(crate) requests: Vec<(Node, i32)>,
    pub(crate) resolved: HashMap<(u64, i32), Frame>,
    pub(crate) error: Option<String>,
}

impl FrameContext {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Adds an error message to the frame context, replacing the existing
    /// message, if any.
    ///
    /// This is the way to report errors in a filter's get_frame function.
    pub fn set_filter_error(&mut self, message: &str) {
        self.error = Some(message.to_owned());
    }

    pub(crate) fn push_request(&mut self, node: &Node, n: i32) {
        self.requests.push((node.clone(), n));
    }

    pub(crate) fn resolved_frame(&self, node: &Node, n: i32) -> Option<Frame> {
        self.resolved.get(&(node.id(), n)).cloned()
    }
}
