// crates/velocut-media/src/lib.rs
//
// The threaded half of the pipeline: composition of per-track audio/video
// into one output unit per time step, and the background task runners that
// keep long operations off the main thread.
//
// No UI toolkit dependency — status flows to the main thread through
// MainThreadDispatcher and a StatusSink the application supplies.

pub mod audio;
pub mod dispatch;
pub mod task;
pub mod track;
pub mod video;
pub mod worker;

// Re-export the main public API so callers' imports stay short.
pub use audio::AudioMixer;
pub use dispatch::{MainLoop, MainThreadDispatcher};
pub use task::{StatusSink, Task, TaskContext, TaskHandle, TaskState};
pub use track::{AudioTrack, QueuedAudioTrack, QueuedVideoTrack, Sequence, VideoTrack};
pub use video::FrameCompositor;
pub use worker::{RunnerConfig, RunnerKind, TaskRunner};
