// crates/velocut-core/src/media_types.rs
//
// Units of media that flow through the pipeline queues.
// No threads, no decoders — just plain data with single-owner handoff.
//
//   Chunk      — audio for one time slice: deferred silence or real samples.
//   VideoFrame — video for one time slice: deferred black or real pixels.
//
// Both are tagged variants so "is this silence / blackness?" is a pattern
// match. Deferred variants only know their shape; `materialize()` allocates.

use std::cell::OnceCell;
use std::fmt;

use crate::helpers::geometry::{Point, Rect, Size};
use crate::helpers::pixel::{rgba_offset, RGBA_BLACK};

/// Presentation timestamp in frame units along the timeline.
pub type Pts = i64;

/// One interleaved audio sample (signed 16-bit PCM).
pub type Sample = i16;

pub const MAX_SAMPLE: Sample = i16::MAX;
pub const MIN_SAMPLE: Sample = i16::MIN;

// ── Audio ─────────────────────────────────────────────────────────────────────

/// Interleaved sample buffer with a read cursor.
///
/// `sample_count` counts every interleaved sample (all channels). The buffer
/// length never changes after construction; only the cursor moves.
#[derive(Clone, Debug, PartialEq)]
pub struct SampleChunk {
    channels: u16,
    samples:  Vec<Sample>,
    read:     usize,
    pts:      Pts,
}

impl SampleChunk {
    /// Wrap pre-filled interleaved samples.
    ///
    /// Panics if `channels` is zero or the buffer does not hold a whole
    /// number of frames.
    pub fn new(channels: u16, samples: Vec<Sample>, pts: Pts) -> Self {
        assert!(channels > 0, "SampleChunk::new — channels must be > 0");
        assert_eq!(
            samples.len() % channels as usize,
            0,
            "SampleChunk::new — {} samples is not a multiple of {} channels",
            samples.len(),
            channels,
        );
        Self { channels, samples, read: 0, pts }
    }

    /// Zero-filled chunk of `sample_count` interleaved samples.
    pub fn silence(channels: u16, sample_count: usize, pts: Pts) -> Self {
        Self::new(channels, vec![0; sample_count], pts)
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Total interleaved samples, consumed or not.
    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// Samples per channel.
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    pub fn pts(&self) -> Pts {
        self.pts
    }

    pub fn set_pts(&mut self, pts: Pts) {
        self.pts = pts;
    }

    pub fn read_cursor(&self) -> usize {
        self.read
    }

    pub fn unread(&self) -> usize {
        self.samples.len() - self.read
    }

    pub fn is_drained(&self) -> bool {
        self.read == self.samples.len()
    }

    pub fn unread_samples(&self) -> &[Sample] {
        &self.samples[self.read..]
    }

    pub fn unread_samples_mut(&mut self) -> &mut [Sample] {
        &mut self.samples[self.read..]
    }

    /// Advance the read cursor by `n`. Panics if fewer than `n` are unread.
    pub fn consume(&mut self, n: usize) {
        assert!(
            n <= self.unread(),
            "SampleChunk::consume — {} requested, only {} unread",
            n,
            self.unread(),
        );
        self.read += n;
    }

    pub fn into_samples(self) -> Vec<Sample> {
        self.samples
    }
}

/// Audio for one time slice.
#[derive(Clone, Debug, PartialEq)]
pub enum Chunk {
    /// Silence whose buffer has not been allocated.
    Empty { channels: u16, sample_count: usize, pts: Pts },
    Filled(SampleChunk),
}

impl Chunk {
    pub fn empty(channels: u16, sample_count: usize, pts: Pts) -> Self {
        Chunk::Empty { channels, sample_count, pts }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Chunk::Empty { .. })
    }

    pub fn channels(&self) -> u16 {
        match self {
            Chunk::Empty { channels, .. } => *channels,
            Chunk::Filled(c) => c.channels(),
        }
    }

    /// Samples still to be played. Deferred silence is never partially read.
    pub fn unread(&self) -> usize {
        match self {
            Chunk::Empty { sample_count, .. } => *sample_count,
            Chunk::Filled(c) => c.unread(),
        }
    }

    pub fn pts(&self) -> Pts {
        match self {
            Chunk::Empty { pts, .. } => *pts,
            Chunk::Filled(c) => c.pts(),
        }
    }

    pub fn set_pts(&mut self, new_pts: Pts) {
        match self {
            Chunk::Empty { pts, .. } => *pts = new_pts,
            Chunk::Filled(c) => c.set_pts(new_pts),
        }
    }

    /// Allocate the buffer if deferred.
    pub fn materialize(self) -> SampleChunk {
        match self {
            Chunk::Empty { channels, sample_count, pts } => {
                SampleChunk::silence(channels, sample_count, pts)
            }
            Chunk::Filled(c) => c,
        }
    }
}

impl From<SampleChunk> for Chunk {
    fn from(c: SampleChunk) -> Self {
        Chunk::Filled(c)
    }
}

// ── Video ─────────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    Rgb24,
    Rgba32,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgb24 => 3,
            PixelFormat::Rgba32 => 4,
        }
    }
}

/// A decoded (or synthesized) image plus the layer attributes the compositor
/// needs: where to put it, how opaque it is, and which part is valid.
///
/// Mutating anything that contributes to the derived bitmap (pixels,
/// opacity, region of interest) drops the cached bitmap.
#[derive(Clone)]
pub struct PixelFrame {
    size:     Size,
    format:   PixelFormat,
    data:     Vec<u8>,
    pts:      Pts,
    repeat:   u32,
    position: Point,
    opacity:  u8,
    roi:      Rect,
    bitmap:   OnceCell<Vec<u8>>,
}

impl PixelFrame {
    /// Wrap packed pixel data. The region of interest starts as the whole
    /// frame, opacity as 255, position as the origin.
    ///
    /// Panics if `data` is not exactly `width × height × bpp` bytes.
    pub fn new(size: Size, format: PixelFormat, data: Vec<u8>, pts: Pts) -> Self {
        let expected = size.area() * format.bytes_per_pixel();
        assert_eq!(
            data.len(),
            expected,
            "PixelFrame::new — {} bytes for {}×{} {:?}, expected {}",
            data.len(),
            size.width,
            size.height,
            format,
            expected,
        );
        Self {
            size,
            format,
            data,
            pts,
            repeat:   1,
            position: Point::default(),
            opacity:  255,
            roi:      Rect::from_size(size),
            bitmap:   OnceCell::new(),
        }
    }

    /// Opaque black RGBA frame.
    pub fn black(size: Size, pts: Pts) -> Self {
        let data = RGBA_BLACK.repeat(size.area());
        Self::new(size, PixelFormat::Rgba32, data, pts)
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Mutable pixel access. Invalidates the derived bitmap.
    pub fn data_mut(&mut self) -> &mut [u8] {
        self.bitmap.take();
        &mut self.data
    }

    pub fn pts(&self) -> Pts {
        self.pts
    }

    pub fn set_pts(&mut self, pts: Pts) {
        self.pts = pts;
    }

    /// Number of ticks this frame is held on screen.
    pub fn repeat(&self) -> u32 {
        self.repeat
    }

    pub fn set_repeat(&mut self, repeat: u32) {
        self.repeat = repeat.max(1);
    }

    pub fn position(&self) -> Point {
        self.position
    }

    pub fn set_position(&mut self, position: Point) {
        self.position = position;
    }

    pub fn opacity(&self) -> u8 {
        self.opacity
    }

    pub fn set_opacity(&mut self, opacity: u8) {
        if opacity != self.opacity {
            self.opacity = opacity;
            self.bitmap.take();
        }
    }

    pub fn region_of_interest(&self) -> Rect {
        self.roi
    }

    /// Panics if `roi` reaches outside the frame.
    pub fn set_region_of_interest(&mut self, roi: Rect) {
        assert!(
            Rect::from_size(self.size).contains_rect(&roi),
            "PixelFrame::set_region_of_interest — {:?} outside {}×{}",
            roi,
            self.size.width,
            self.size.height,
        );
        if roi != self.roi {
            self.roi = roi;
            self.bitmap.take();
        }
    }

    /// RGBA value of pixel (`x`, `y`); RGB sources report alpha 255.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        assert!(
            x < self.size.width && y < self.size.height,
            "PixelFrame::pixel — ({x},{y}) outside {}×{}",
            self.size.width,
            self.size.height,
        );
        let bpp = self.format.bytes_per_pixel();
        let i = (y as usize * self.size.width as usize + x as usize) * bpp;
        let p = &self.data[i..i + bpp];
        match self.format {
            PixelFormat::Rgb24 => [p[0], p[1], p[2], 255],
            PixelFormat::Rgba32 => [p[0], p[1], p[2], p[3]],
        }
    }

    /// Packed RGBA of the region of interest with the alpha channel set to
    /// the frame opacity. Computed on first call and cached.
    pub fn bitmap(&self) -> &[u8] {
        self.bitmap.get_or_init(|| {
            let roi = self.roi;
            let mut out = vec![0u8; roi.size().area() * 4];
            for y in 0..roi.height {
                for x in 0..roi.width {
                    let [r, g, b, _] = self.pixel(roi.x as u32 + x, roi.y as u32 + y);
                    let o = rgba_offset(x, y, roi.width);
                    out[o..o + 4].copy_from_slice(&[r, g, b, self.opacity]);
                }
            }
            out
        })
    }

    pub fn has_cached_bitmap(&self) -> bool {
        self.bitmap.get().is_some()
    }
}

impl fmt::Debug for PixelFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PixelFrame")
            .field("size", &self.size)
            .field("format", &self.format)
            .field("pts", &self.pts)
            .field("repeat", &self.repeat)
            .field("position", &self.position)
            .field("opacity", &self.opacity)
            .field("roi", &self.roi)
            .finish_non_exhaustive()
    }
}

/// Video for one time slice.
#[derive(Clone, Debug)]
pub enum VideoFrame {
    /// Black frame whose buffer has not been allocated.
    Empty { size: Size, pts: Pts },
    Filled(PixelFrame),
}

impl VideoFrame {
    pub fn empty(size: Size, pts: Pts) -> Self {
        VideoFrame::Empty { size, pts }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, VideoFrame::Empty { .. })
    }

    pub fn size(&self) -> Size {
        match self {
            VideoFrame::Empty { size, .. } => *size,
            VideoFrame::Filled(f) => f.size(),
        }
    }

    pub fn pts(&self) -> Pts {
        match self {
            VideoFrame::Empty { pts, .. } => *pts,
            VideoFrame::Filled(f) => f.pts(),
        }
    }

    pub fn as_filled(&self) -> Option<&PixelFrame> {
        match self {
            VideoFrame::Empty { .. } => None,
            VideoFrame::Filled(f) => Some(f),
        }
    }

    /// Allocate the black buffer if deferred.
    pub fn materialize(self) -> PixelFrame {
        match self {
            VideoFrame::Empty { size, pts } => PixelFrame::black(size, pts),
            VideoFrame::Filled(f) => f,
        }
    }
}

impl From<PixelFrame> for VideoFrame {
    fn from(f: PixelFrame) -> Self {
        VideoFrame::Filled(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_cursor_tracks_consumption() {
        let mut c = SampleChunk::new(2, vec![1, 2, 3, 4, 5, 6], 7);
        assert_eq!(c.frames(), 3);
        assert_eq!(c.unread(), 6);
        c.consume(4);
        assert_eq!(c.read_cursor(), 4);
        assert_eq!(c.unread_samples(), &[5, 6]);
        c.consume(2);
        assert!(c.is_drained());
    }

    #[test]
    #[should_panic(expected = "only 2 unread")]
    fn consume_past_end_panics() {
        let mut c = SampleChunk::new(1, vec![0, 0], 0);
        c.consume(3);
    }

    #[test]
    #[should_panic(expected = "not a multiple")]
    fn ragged_interleave_panics() {
        SampleChunk::new(2, vec![0, 0, 0], 0);
    }

    #[test]
    fn empty_chunk_materializes_to_silence() {
        let c = Chunk::empty(2, 8, 3);
        assert!(c.is_empty());
        assert_eq!(c.unread(), 8);
        let s = c.materialize();
        assert_eq!(s.pts(), 3);
        assert_eq!(s.channels(), 2);
        assert!(s.unread_samples().iter().all(|&v| v == 0));
    }

    #[test]
    fn chunk_set_pts_applies_to_both_variants() {
        let mut e = Chunk::empty(1, 4, 0);
        e.set_pts(9);
        assert_eq!(e.pts(), 9);
        let mut f: Chunk = SampleChunk::silence(1, 4, 0).into();
        f.set_pts(11);
        assert_eq!(f.pts(), 11);
    }

    #[test]
    fn bitmap_is_cached_and_invalidated_by_opacity() {
        let mut f = PixelFrame::new(
            Size::new(2, 1),
            PixelFormat::Rgb24,
            vec![10, 20, 30, 40, 50, 60],
            0,
        );
        assert!(!f.has_cached_bitmap());
        assert_eq!(f.bitmap(), &[10, 20, 30, 255, 40, 50, 60, 255]);
        assert!(f.has_cached_bitmap());

        f.set_opacity(128);
        assert!(!f.has_cached_bitmap());
        assert_eq!(f.bitmap(), &[10, 20, 30, 128, 40, 50, 60, 128]);
    }

    #[test]
    fn bitmap_crops_to_region_of_interest() {
        let mut f = PixelFrame::new(
            Size::new(2, 2),
            PixelFormat::Rgba32,
            vec![
                1, 1, 1, 255,  2, 2, 2, 255,
                3, 3, 3, 255,  4, 4, 4, 255,
            ],
            0,
        );
        f.bitmap();
        f.set_region_of_interest(Rect::new(1, 1, 1, 1));
        assert!(!f.has_cached_bitmap());
        assert_eq!(f.bitmap(), &[4, 4, 4, 255]);
    }

    #[test]
    fn position_and_pts_do_not_invalidate_bitmap() {
        let mut f = PixelFrame::black(Size::new(1, 1), 0);
        f.bitmap();
        f.set_position(Point::new(3, 4));
        f.set_pts(10);
        assert!(f.has_cached_bitmap());
    }

    #[test]
    #[should_panic(expected = "outside")]
    fn roi_outside_frame_panics() {
        let mut f = PixelFrame::black(Size::new(4, 4), 0);
        f.set_region_of_interest(Rect::new(2, 2, 3, 1));
    }

    #[test]
    fn empty_video_frame_materializes_black() {
        let f = VideoFrame::empty(Size::new(3, 2), 5).materialize();
        assert_eq!(f.pts(), 5);
        assert_eq!(f.pixel(2, 1), RGBA_BLACK);
        assert_eq!(f.repeat(), 1);
    }
}
