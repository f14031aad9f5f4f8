// crates/velocut-media/src/video.rs
//
// Video composition: one frame per active video track in, one frame out.
//
// Layers are painted bottom to top (input order). The project's intrinsic
// video size is fitted into the requested bounding box once per call; that
// scaled rect is the coordinate space every layer's position refers to, and
// the clip region for every layer. Everything outside it stays black.
//
// The compositor never resamples. Layers arrive already scaled by their
// producer, which gets the one scale factor for the whole composite from
// `scaled_rect` (the same call this module makes), so every layer shares it.
//
// Each layer's region of interest is drawn with its top-left at
// scaled.origin + position, blended with one uniform opacity for the whole
// layer. Per-pixel source alpha is ignored.
//
// Output is packed RGBA with alpha 255 and pts 0 — a composite has no single
// source timestamp.

use rayon::prelude::*;

use velocut_core::helpers::geometry::{fit_centered, Rect, Size};
use velocut_core::helpers::pixel::{blend_u8, outline_rect};
use velocut_core::media_types::{PixelFormat, PixelFrame, VideoFrame};

const DEBUG_BOX_COLOR: [u8; 4] = [255, 0, 0, 255];

#[derive(Clone, Copy, Debug)]
pub struct FrameCompositor {
    video_size: Size,
}

impl FrameCompositor {
    /// `video_size` is the intrinsic project size layers were authored at.
    pub fn new(video_size: Size) -> Self {
        Self { video_size }
    }

    pub fn video_size(&self) -> Size {
        self.video_size
    }

    /// Rect the video occupies inside `bounding_box`, and the scale factor.
    pub fn scaled_rect(&self, bounding_box: Size) -> (Rect, f64) {
        fit_centered(self.video_size, bounding_box)
    }

    /// Composite `inputs` (bottom first) into a frame the size of
    /// `bounding_box`. Returns `None` when there is nothing to composite.
    ///
    /// `draw_debug_box` outlines the scaled video rect after all layers are
    /// painted. Preview only; export passes `false`.
    pub fn generate(
        &self,
        inputs: Vec<VideoFrame>,
        bounding_box: Size,
        draw_debug_box: bool,
    ) -> Option<PixelFrame> {
        if inputs.is_empty() {
            return None;
        }

        let (scaled, scale) = self.scaled_rect(bounding_box);
        log::trace!("[compositor] {:?} into {:?} at scale {scale:.4}", self.video_size, scaled);
        let mut canvas = PixelFrame::black(bounding_box, 0);

        for (layer, input) in inputs.iter().enumerate() {
            let frame = match input {
                VideoFrame::Empty { .. } => continue,
                VideoFrame::Filled(f) => f,
            };
            if frame.region_of_interest().is_empty() || frame.opacity() == 0 {
                continue;
            }
            log::trace!(
                "[compositor] layer {layer}: {:?} at {:?}, opacity {}",
                frame.region_of_interest(),
                frame.position(),
                frame.opacity(),
            );
            blend_layer(&mut canvas, frame, scaled);
        }

        if draw_debug_box {
            outline_rect(canvas.data_mut(), bounding_box.width, scaled, DEBUG_BOX_COLOR);
        }
        Some(canvas)
    }
}

/// Alpha-blend `layer`'s region of interest onto `canvas`, clipped to `clip`.
fn blend_layer(canvas: &mut PixelFrame, layer: &PixelFrame, clip: Rect) {
    let roi = layer.region_of_interest();
    let dest = Rect::new(
        clip.x + layer.position().x,
        clip.y + layer.position().y,
        roi.width,
        roi.height,
    );
    let visible = dest.intersect(&clip);
    if visible.is_empty() {
        return;
    }

    // Offsets of the visible area inside the layer's region of interest.
    let src_x0 = roi.x as usize + (visible.x - dest.x) as usize;
    let src_y0 = roi.y as usize + (visible.y - dest.y) as usize;

    let canvas_w = canvas.size().width as usize;
    let src_w = layer.size().width as usize;
    let src_bpp = layer.format().bytes_per_pixel();
    let src = layer.data();
    let opacity = layer.opacity();
    let opaque = opacity == 255 && layer.format() == PixelFormat::Rgba32;

    let first_row = visible.y as usize;
    let rows = visible.height as usize;
    let x0 = visible.x as usize;
    let cols = visible.width as usize;

    canvas
        .data_mut()
        .par_chunks_mut(canvas_w * 4)
        .skip(first_row)
        .take(rows)
        .enumerate()
        .for_each(|(i, row)| {
            let src_row = (src_y0 + i) * src_w;
            let dst = &mut row[x0 * 4..(x0 + cols) * 4];
            if opaque {
                let s = (src_row + src_x0) * 4;
                dst.copy_from_slice(&src[s..s + cols * 4]);
                for px in dst.chunks_exact_mut(4) {
                    px[3] = 255;
                }
                return;
            }
            for (c, px) in dst.chunks_exact_mut(4).enumerate() {
                let s = (src_row + src_x0 + c) * src_bpp;
                px[0] = blend_u8(px[0], src[s], opacity);
                px[1] = blend_u8(px[1], src[s + 1], opacity);
                px[2] = blend_u8(px[2], src[s + 2], opacity);
            }
        });
}
