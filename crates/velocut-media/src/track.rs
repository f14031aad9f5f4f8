// crates/velocut-media/src/track.rs
//
// Per-track pull interface and the Sequence that composes tracks.
//
// A track is one producer lane. For every time step the Sequence asks each
// active track for exactly one unit at the same pts, then hands the lot to
// the AudioMixer / FrameCompositor. Tracks never see each other.
//
// The queue-backed tracks are the usual implementation: a background task
// decodes ahead and pushes into a BoundedQueue, the track pops on demand.
// Pop blocks until the producer catches up — that is the pipeline's only
// rate limiter.

use std::sync::Arc;

use velocut_core::config::PipelineConfig;
use velocut_core::helpers::geometry::Size;
use velocut_core::media_types::{Chunk, PixelFrame, Pts, VideoFrame};
use velocut_core::queue::BoundedQueue;

use crate::audio::AudioMixer;
use crate::video::FrameCompositor;

pub trait AudioTrack: Send {
    /// The chunk for `pts`: `chunk_size` interleaved samples over `channels`.
    fn next_audio(&mut self, pts: Pts, chunk_size: usize, channels: u16) -> Chunk;
}

pub trait VideoTrack: Send {
    /// The frame for `pts`, already scaled for `bounding_box`: fitted by
    /// the factor `FrameCompositor::scaled_rect(bounding_box)` reports. The
    /// compositor draws it pixel for pixel.
    fn next_video(&mut self, pts: Pts, bounding_box: Size) -> VideoFrame;
}

// ── Queue-backed tracks ───────────────────────────────────────────────────────

/// Pops chunks a producer pushed into a shared queue.
pub struct QueuedAudioTrack {
    queue: Arc<BoundedQueue<Chunk>>,
}

impl QueuedAudioTrack {
    pub fn new(queue: Arc<BoundedQueue<Chunk>>) -> Self {
        Self { queue }
    }
}

impl AudioTrack for QueuedAudioTrack {
    fn next_audio(&mut self, pts: Pts, _chunk_size: usize, _channels: u16) -> Chunk {
        let chunk = self.queue.pop();
        assert_eq!(
            chunk.pts(),
            pts,
            "QueuedAudioTrack::next_audio — producer delivered pts {} for request {}",
            chunk.pts(),
            pts,
        );
        chunk
    }
}

/// Pops frames a producer pushed into a shared queue. The producer is
/// responsible for scaling to the bounding box it was given.
pub struct QueuedVideoTrack {
    queue: Arc<BoundedQueue<VideoFrame>>,
}

impl QueuedVideoTrack {
    pub fn new(queue: Arc<BoundedQueue<VideoFrame>>) -> Self {
        Self { queue }
    }
}

impl VideoTrack for QueuedVideoTrack {
    fn next_video(&mut self, pts: Pts, _bounding_box: Size) -> VideoFrame {
        let frame = self.queue.pop();
        assert_eq!(
            frame.pts(),
            pts,
            "QueuedVideoTrack::next_video — producer delivered pts {} for request {}",
            frame.pts(),
            pts,
        );
        frame
    }
}

// ── Sequence ──────────────────────────────────────────────────────────────────

struct Slot<T: ?Sized> {
    active: bool,
    track:  Box<T>,
}

/// The ordered set of audio and video tracks of one timeline, composed one
/// time step at a time. Video track 0 is the bottom layer.
pub struct Sequence {
    audio:          Vec<Slot<dyn AudioTrack>>,
    video:          Vec<Slot<dyn VideoTrack>>,
    mixer:          AudioMixer,
    compositor:     FrameCompositor,
    draw_debug_box: bool,
}

impl Sequence {
    pub fn new(cfg: &PipelineConfig) -> Self {
        Self {
            audio:          Vec::new(),
            video:          Vec::new(),
            mixer:          AudioMixer::new(cfg.audio_chunk_size, cfg.audio_channels),
            compositor:     FrameCompositor::new(cfg.video_size()),
            draw_debug_box: cfg.draw_debug_box,
        }
    }

    /// Append an audio track. Returns its index.
    pub fn add_audio_track(&mut self, track: Box<dyn AudioTrack>) -> usize {
        self.audio.push(Slot { active: true, track });
        self.audio.len() - 1
    }

    /// Append a video track on top of the existing ones. Returns its index.
    pub fn add_video_track(&mut self, track: Box<dyn VideoTrack>) -> usize {
        self.video.push(Slot { active: true, track });
        self.video.len() - 1
    }

    /// Inactive tracks are not pulled from at all.
    pub fn set_audio_active(&mut self, index: usize, active: bool) {
        self.audio[index].active = active;
    }

    pub fn set_video_active(&mut self, index: usize, active: bool) {
        self.video[index].active = active;
    }

    pub fn set_draw_debug_box(&mut self, on: bool) {
        self.draw_debug_box = on;
    }

    pub fn mixer(&self) -> &AudioMixer {
        &self.mixer
    }

    pub fn compositor(&self) -> &FrameCompositor {
        &self.compositor
    }

    /// Mixed audio for `pts`.
    pub fn next_audio(&mut self, pts: Pts) -> Chunk {
        let (size, channels) = (self.mixer.chunk_size(), self.mixer.channels());
        let inputs = self
            .audio
            .iter_mut()
            .filter(|s| s.active)
            .map(|s| s.track.next_audio(pts, size, channels))
            .collect();
        self.mixer.generate(inputs, pts)
    }

    /// Composited video for `pts`, or `None` when no video track is active.
    pub fn next_video(&mut self, pts: Pts, bounding_box: Size) -> Option<PixelFrame> {
        let inputs = self
            .video
            .iter_mut()
            .filter(|s| s.active)
            .map(|s| s.track.next_video(pts, bounding_box))
            .collect();
        self.compositor.generate(inputs, bounding_box, self.draw_debug_box)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use velocut_core::helpers::geometry::Point;
    use velocut_core::media_types::{PixelFormat, SampleChunk};

    /// Produces a constant value every step.
    struct Constant(i16);

    impl AudioTrack for Constant {
        fn next_audio(&mut self, pts: Pts, chunk_size: usize, channels: u16) -> Chunk {
            SampleChunk::new(channels, vec![self.0; chunk_size], pts).into()
        }
    }

    struct Solid([u8; 4], Point);

    impl VideoTrack for Solid {
        fn next_video(&mut self, pts: Pts, _bounding_box: Size) -> VideoFrame {
            let mut f = PixelFrame::new(Size::new(1, 1), PixelFormat::Rgba32, self.0.to_vec(), pts);
            f.set_position(self.1);
            f.into()
        }
    }

    fn small_config() -> PipelineConfig {
        PipelineConfig {
            video_width: 2,
            video_height: 1,
            audio_channels: 1,
            audio_chunk_size: 4,
            ..Default::default()
        }
    }

    #[test]
    fn sequence_mixes_active_audio_tracks() {
        let mut seq = Sequence::new(&small_config());
        seq.add_audio_track(Box::new(Constant(1000)));
        let loud = seq.add_audio_track(Box::new(Constant(32000)));
        seq.add_audio_track(Box::new(Constant(5)));

        let out = seq.next_audio(3).materialize();
        assert_eq!(out.pts(), 3);
        assert_eq!(out.unread_samples(), &[32767; 4]);

        seq.set_audio_active(loud, false);
        let out = seq.next_audio(4).materialize();
        assert_eq!(out.unread_samples(), &[1005; 4]);
    }

    #[test]
    fn sequence_without_audio_tracks_is_silent() {
        let mut seq = Sequence::new(&small_config());
        let out = seq.next_audio(0);
        assert!(out.is_empty());
        assert_eq!(out.unread(), 4);
    }

    #[test]
    fn sequence_layers_video_tracks_bottom_up() {
        let mut seq = Sequence::new(&small_config());
        seq.add_video_track(Box::new(Solid([255, 0, 0, 255], Point::new(0, 0))));
        let top = seq.add_video_track(Box::new(Solid([0, 0, 255, 255], Point::new(0, 0))));

        let out = seq.next_video(0, Size::new(2, 1)).unwrap();
        assert_eq!(out.pixel(0, 0), [0, 0, 255, 255]);
        assert_eq!(out.pixel(1, 0), [0, 0, 0, 255]);

        seq.set_video_active(top, false);
        let out = seq.next_video(1, Size::new(2, 1)).unwrap();
        assert_eq!(out.pixel(0, 0), [255, 0, 0, 255]);
    }

    #[test]
    fn sequence_without_active_video_yields_none() {
        let mut seq = Sequence::new(&small_config());
        let t = seq.add_video_track(Box::new(Solid([1, 1, 1, 255], Point::default())));
        seq.set_video_active(t, false);
        assert!(seq.next_video(0, Size::new(2, 1)).is_none());
    }

    #[test]
    fn queued_tracks_pull_from_producer_threads() {
        let cfg = small_config();
        let audio_q = Arc::new(BoundedQueue::new(2));
        let video_q = Arc::new(BoundedQueue::new(2));

        let producer = {
            let (aq, vq) = (Arc::clone(&audio_q), Arc::clone(&video_q));
            thread::spawn(move || {
                for pts in 0..5 {
                    aq.push(SampleChunk::new(1, vec![pts as i16; 4], pts).into());
                    vq.push(VideoFrame::Filled(PixelFrame::new(
                        Size::new(2, 1),
                        PixelFormat::Rgb24,
                        vec![pts as u8; 6],
                        pts,
                    )));
                }
            })
        };

        let mut seq = Sequence::new(&cfg);
        seq.add_audio_track(Box::new(QueuedAudioTrack::new(audio_q)));
        seq.add_video_track(Box::new(QueuedVideoTrack::new(video_q)));
        for pts in 0..5 {
            let a = seq.next_audio(pts).materialize();
            assert_eq!(a.unread_samples(), &[pts as i16; 4]);
            let v = seq.next_video(pts, Size::new(2, 1)).unwrap();
            assert_eq!(v.pixel(1, 0), [pts as u8, pts as u8, pts as u8, 255]);
        }
        producer.join().unwrap();
    }

    #[test]
    #[should_panic(expected = "producer delivered pts")]
    fn queued_track_rejects_out_of_step_pts() {
        let q = Arc::new(BoundedQueue::new(1));
        q.push(Chunk::empty(1, 4, 7));
        QueuedAudioTrack::new(q).next_audio(8, 4, 1);
    }
}
