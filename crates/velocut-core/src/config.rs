// crates/velocut-core/src/config.rs
//
// Pipeline tuning knobs, persisted as JSON next to the project.
// Every field has a default so older or hand-written files with missing keys
// still load.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::helpers::geometry::Size;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Intrinsic project video size. Composites are scaled from this into
    /// whatever bounding box the caller asks for.
    pub video_width:           u32,
    pub video_height:          u32,
    pub audio_channels:        u16,
    /// Interleaved samples per audio chunk (all channels).
    pub audio_chunk_size:      usize,
    pub audio_queue_capacity:  usize,
    pub video_queue_capacity:  usize,
    /// Demuxed packets buffered ahead of the decoders.
    pub packet_queue_capacity: usize,
    pub task_queue_capacity:   usize,
    /// Shutdown wait: how many times TaskRunner::abort polls for the worker
    /// thread to finish, and how long each poll sleeps.
    pub abort_retries:         u32,
    pub abort_poll_ms:         u64,
    /// Outline the scaled video area in composited preview frames.
    pub draw_debug_box:        bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            video_width:           1280,
            video_height:          720,
            audio_channels:        2,
            audio_chunk_size:      2 * 1024,
            audio_queue_capacity:  20,
            video_queue_capacity:  10,
            packet_queue_capacity: 100,
            task_queue_capacity:   1000,
            abort_retries:         50,
            abort_poll_ms:         20,
            draw_debug_box:        false,
        }
    }
}

impl PipelineConfig {
    pub fn video_size(&self) -> Size {
        Size::new(self.video_width, self.video_height)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading pipeline config {}", path.display()))?;
        let cfg: Self = serde_json::from_str(&text)
            .with_context(|| format!("parsing pipeline config {}", path.display()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Like `load`, but a missing file yields the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::info!("[config] {} not found — using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load(path)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text)
            .with_context(|| format!("writing pipeline config {}", path.display()))?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.audio_channels > 0, "audio_channels must be > 0");
        anyhow::ensure!(
            self.audio_chunk_size > 0 && self.audio_chunk_size % self.audio_channels as usize == 0,
            "audio_chunk_size {} must be a positive multiple of audio_channels {}",
            self.audio_chunk_size,
            self.audio_channels,
        );
        anyhow::ensure!(
            self.audio_queue_capacity > 0
                && self.video_queue_capacity > 0
                && self.packet_queue_capacity > 0
                && self.task_queue_capacity > 0,
            "queue capacities must be > 0",
        );
        anyhow::ensure!(!self.video_size().is_empty(), "video size must be non-zero");
        Ok(())
    }
}
