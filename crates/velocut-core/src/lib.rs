// crates/velocut-core/src/lib.rs
//
// Plain data shared by the media pipeline: the blocking queue that every
// stage hands buffers through, the audio/video units themselves, geometry
// and pixel helpers, and the pipeline config. No threads live here.

pub mod config;
pub mod helpers;
pub mod media_types;
pub mod queue;

pub use config::PipelineConfig;
pub use media_types::{Chunk, PixelFormat, PixelFrame, Pts, Sample, SampleChunk, VideoFrame};
pub use queue::BoundedQueue;
