// crates/velocut-media/src/bin/velocut_render.rs
//
// Headless render driver. Runs the full pipeline without a UI:
//
//   demux runner (invisible)  ── packet pts ──► packet queue
//   decode runner (invisible) ── synthetic units per packet ──► per-track queues
//   main thread  ── Sequence::next_audio / next_video per step ──► stats
//   export runner (visible)  ── summary task, progress via the dispatcher
//
// Usage: velocut-render [config.json] [steps]
// A missing config file means defaults. RUST_LOG controls verbosity.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};

use velocut_core::helpers::geometry::{Point, Rect, Size};
use velocut_core::media_types::{Chunk, PixelFormat, PixelFrame, Pts, SampleChunk, VideoFrame};
use velocut_core::{BoundedQueue, PipelineConfig};
use velocut_media::{
    MainThreadDispatcher, QueuedAudioTrack, QueuedVideoTrack, RunnerConfig, RunnerKind, Sequence,
    StatusSink, TaskContext, TaskRunner,
};

const AUDIO_TRACKS: usize = 2;
const VIDEO_TRACKS: usize = 2;

/// Status bar stand-in: everything goes to the log.
struct LogStatus;

impl StatusSink for LogStatus {
    fn queue_size_changed(&self, runner: &str, size: usize) {
        log::debug!("[status] {runner}: {size} queued");
    }
    fn progress_text(&self, text: &str) {
        log::info!("[status] {text}");
    }
    fn progress_bar(&self, max: u64) {
        log::info!("[status] progress 0/{max}");
    }
    fn progress(&self, value: u64) {
        log::info!("[status] progress {value}");
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = std::env::args().skip(1);
    let config_path = args.next().map(PathBuf::from).unwrap_or_else(|| PathBuf::from("pipeline.json"));
    let steps: Pts = match args.next() {
        Some(s) => s.parse().with_context(|| format!("invalid step count '{s}'"))?,
        None => 100,
    };
    let cfg = PipelineConfig::load_or_default(&config_path)?;
    let bounding_box = Size::new((cfg.video_width / 2).max(1), (cfg.video_height / 2).max(1));

    let (dispatcher, main_loop) = MainThreadDispatcher::new();
    let status: Arc<dyn StatusSink> = Arc::new(LogStatus);
    let demux = TaskRunner::new(RunnerConfig::from_pipeline("demux", RunnerKind::Invisible, &cfg));
    let decode = TaskRunner::new(RunnerConfig::from_pipeline("decode", RunnerKind::Invisible, &cfg));
    let export = TaskRunner::with_status(
        RunnerConfig::from_pipeline("export", RunnerKind::Visible, &cfg),
        dispatcher.clone(),
        status,
    );

    let audio_qs: Vec<Arc<BoundedQueue<Chunk>>> = (0..AUDIO_TRACKS)
        .map(|_| Arc::new(BoundedQueue::new(cfg.audio_queue_capacity)))
        .collect();
    let video_qs: Vec<Arc<BoundedQueue<VideoFrame>>> = (0..VIDEO_TRACKS)
        .map(|_| Arc::new(BoundedQueue::new(cfg.video_queue_capacity)))
        .collect();

    let mut seq = Sequence::new(&cfg);
    for q in &audio_qs {
        seq.add_audio_track(Box::new(QueuedAudioTrack::new(Arc::clone(q))));
    }
    for q in &video_qs {
        seq.add_video_track(Box::new(QueuedVideoTrack::new(Arc::clone(q))));
    }

    // ── Producer ──────────────────────────────────────────────────────────────
    // Long-running tasks working ahead; queue back-pressure paces them.
    let (scaled, scale) = seq.compositor().scaled_rect(bounding_box);
    log::info!(
        "[render] {steps} steps, {}×{} → {:?} (scale {scale:.3})",
        cfg.video_width,
        cfg.video_height,
        scaled,
    );
    let packets: Arc<BoundedQueue<Pts>> = Arc::new(BoundedQueue::new(cfg.packet_queue_capacity));
    {
        let packets = Arc::clone(&packets);
        demux.set_expected_work(1);
        demux.schedule_fn("demux", false, move |ctx: &TaskContext| {
            for pts in 0..steps {
                if ctx.is_aborted() {
                    return;
                }
                packets.push(pts);
            }
        });
    }
    {
        let (aqs, vqs) = (audio_qs.clone(), video_qs.clone());
        let (channels, chunk_size) = (cfg.audio_channels, cfg.audio_chunk_size);
        let packets = Arc::clone(&packets);
        decode.set_expected_work(1);
        decode.schedule_fn("decode tracks", false, move |ctx: &TaskContext| {
            for _ in 0..steps {
                if ctx.is_aborted() {
                    return;
                }
                let pts = packets.pop();
                for (i, q) in aqs.iter().enumerate() {
                    q.push(synth_chunk(i, pts, channels, chunk_size));
                }
                for (i, q) in vqs.iter().enumerate() {
                    q.push(synth_frame(i, pts, scaled));
                }
            }
        });
    }

    // ── Consumer ──────────────────────────────────────────────────────────────
    let started = Instant::now();
    let mut peak: i16 = 0;
    let mut silent_steps = 0u64;
    let mut lit_pixels = 0u64;
    for pts in 0..steps {
        let chunk = seq.next_audio(pts);
        if chunk.is_empty() {
            silent_steps += 1;
        } else {
            let c = chunk.materialize();
            let step_peak = c.unread_samples().iter().map(|s| s.saturating_abs()).max().unwrap_or(0);
            peak = peak.max(step_peak);
        }
        if let Some(frame) = seq.next_video(pts, bounding_box) {
            lit_pixels += frame.data().chunks_exact(4).filter(|p| p[..3] != [0, 0, 0]).count() as u64;
        }
        main_loop.pump();
    }
    demux.wait_for_execution_count();
    decode.wait_for_execution_count();
    let elapsed = started.elapsed();

    // ── Summary via the visible runner ────────────────────────────────────────
    let summary = format!(
        "{steps} steps in {:.1} ms, audio peak {peak}, {silent_steps} silent, {lit_pixels} lit pixels",
        elapsed.as_secs_f64() * 1000.0,
    );
    let main = dispatcher.clone();
    export.set_expected_work(1);
    export.schedule_fn("write summary", true, move |ctx: &TaskContext| {
        ctx.show_progress_bar(3);
        for i in 1..=3 {
            if ctx.is_aborted() {
                return;
            }
            std::thread::sleep(Duration::from_millis(5));
            ctx.show_progress(i);
        }
        main.run_and_wait(move || log::info!("[render] {summary}"));
    });
    while export.executed_count() < 1 {
        main_loop.pump_for(Duration::from_millis(20));
    }
    main_loop.pump();

    demux.abort();
    decode.abort();
    export.abort();
    Ok(())
}

/// Square wave per track; track 1 goes silent every fourth step.
fn synth_chunk(track: usize, pts: Pts, channels: u16, chunk_size: usize) -> Chunk {
    if track == 1 && pts % 4 == 0 {
        return Chunk::empty(channels, chunk_size, pts);
    }
    let amplitude = 12_000 * (track as i16 + 1);
    let period = 64 * (track + 1);
    let samples = (0..chunk_size)
        .map(|i| {
            let frame = i / channels as usize;
            if (frame / period) % 2 == 0 { amplitude } else { -amplitude }
        })
        .collect();
    SampleChunk::new(channels, samples, pts).into()
}

/// Track 0: full-size gradient. Track 1: translucent box sliding across,
/// absent every tenth step.
fn synth_frame(track: usize, pts: Pts, scaled: Rect) -> VideoFrame {
    let full = scaled.size();
    if full.is_empty() {
        return VideoFrame::empty(full, pts);
    }
    match track {
        0 => {
            let mut data = Vec::with_capacity(full.area() * 3);
            for y in 0..full.height {
                for x in 0..full.width {
                    data.extend_from_slice(&[
                        (x * 255 / full.width) as u8,
                        (y * 255 / full.height) as u8,
                        (pts % 256) as u8,
                    ]);
                }
            }
            PixelFrame::new(full, PixelFormat::Rgb24, data, pts).into()
        }
        _ if pts % 10 == 0 => VideoFrame::empty(full, pts),
        _ => {
            let size = Size::new((full.width / 4).max(1), (full.height / 4).max(1));
            let mut f = PixelFrame::new(size, PixelFormat::Rgba32, [255, 255, 255, 255].repeat(size.area()), pts);
            let travel = full.width.saturating_sub(size.width).max(1) as i64;
            f.set_position(Point::new((pts * 7 % travel) as i32, (full.height / 3) as i32));
            f.set_opacity(160);
            f.into()
        }
    }
}
