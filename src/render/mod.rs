//! CPU composition pass.
//!
//! Takes the immutable source frame plus the current pads and blobs and
//! produces a fresh RGBA output buffer: pad overlays alpha-blended into
//! their rectangles, blob circles stroked on top. Text labels are drawn by
//! the egui layer, not here.

use std::collections::HashMap;
use std::path::Path;

use image::imageops::FilterType;
use thiserror::Error;

use crate::camera::Frame;
use crate::kit::{DrumKind, Pad, PadRect};
use crate::vision::{Blob, Mask};

/// Overlay weight for pad images; the background keeps the remainder.
pub const OVERLAY_ALPHA: f32 = 0.6;

const CIRCLE_COLOR: [u8; 3] = [255, 255, 0];
const CIRCLE_THICKNESS: f32 = 2.0;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("failed to load overlay image {path}: {source}")]
    ImageLoad {
        path: std::path::PathBuf,
        source: image::ImageError,
    },
}

/// A pad's overlay image, resized to the pad rectangle at load time.
pub struct PadOverlay {
    pub width: u32,
    pub height: u32,
    /// RGBA, row-major, exactly `width * height * 4` bytes.
    pub pixels: Vec<u8>,
}

impl PadOverlay {
    /// Load an image and resize it to exactly the pad rectangle.
    pub fn load(path: &Path, rect: PadRect) -> Result<Self, RenderError> {
        let img = image::open(path).map_err(|source| RenderError::ImageLoad {
            path: path.to_path_buf(),
            source,
        })?;
        let resized = img
            .resize_exact(rect.width, rect.height, FilterType::Triangle)
            .to_rgba8();
        Ok(Self {
            width: rect.width,
            height: rect.height,
            pixels: resized.into_raw(),
        })
    }
}

/// Compose the output frame: source pixels, pad overlays, blob circles.
pub fn compose(
    frame: &Frame,
    pads: &[Pad],
    overlays: &HashMap<DrumKind, PadOverlay>,
    blobs: &[Blob],
) -> Vec<u8> {
    let mut out = frame.data.clone();

    for blob in blobs {
        stroke_circle(
            &mut out,
            frame.width,
            frame.height,
            blob.center,
            blob.radius,
        );
    }

    // Overlays go on top: a marker passing through a pad shows the pad art,
    // not the tracking circle.
    for pad in pads {
        if let Some(overlay) = overlays.get(&pad.kind()) {
            blend_overlay(&mut out, frame.width, frame.height, pad.rect(), overlay);
        }
    }

    out
}

/// Alpha-blend the overlay into its pad rectangle: 60% overlay, 40%
/// background. Pixels outside the frame are clipped.
fn blend_overlay(out: &mut [u8], frame_w: u32, frame_h: u32, rect: PadRect, overlay: &PadOverlay) {
    for oy in 0..overlay.height.min(rect.height) {
        let fy = rect.y + oy;
        if fy >= frame_h {
            break;
        }
        for ox in 0..overlay.width.min(rect.width) {
            let fx = rect.x + ox;
            if fx >= frame_w {
                break;
            }
            let src = ((oy * overlay.width + ox) * 4) as usize;
            let dst = ((fy * frame_w + fx) * 4) as usize;
            for c in 0..3 {
                let blended = overlay.pixels[src + c] as f32 * OVERLAY_ALPHA
                    + out[dst + c] as f32 * (1.0 - OVERLAY_ALPHA);
                out[dst + c] = blended.round() as u8;
            }
        }
    }
}

/// Stroke a circle outline. Scans the circle's bounding box and marks pixels
/// within the stroke thickness of the radius.
fn stroke_circle(out: &mut [u8], frame_w: u32, frame_h: u32, center: (f32, f32), radius: f32) {
    let (cx, cy) = center;
    let reach = (radius + CIRCLE_THICKNESS).ceil() as i32;
    let x0 = (cx as i32 - reach).max(0);
    let x1 = (cx as i32 + reach).min(frame_w as i32 - 1);
    let y0 = (cy as i32 - reach).max(0);
    let y1 = (cy as i32 + reach).min(frame_h as i32 - 1);

    for y in y0..=y1 {
        for x in x0..=x1 {
            let d = ((x as f32 - cx).powi(2) + (y as f32 - cy).powi(2)).sqrt();
            if (d - radius).abs() <= CIRCLE_THICKNESS / 2.0 {
                let idx = ((y as u32 * frame_w + x as u32) * 4) as usize;
                out[idx] = CIRCLE_COLOR[0];
                out[idx + 1] = CIRCLE_COLOR[1];
                out[idx + 2] = CIRCLE_COLOR[2];
            }
        }
    }
}

/// Expand the binary mask into an RGBA grayscale image for display.
pub fn mask_to_rgba(mask: &Mask) -> Vec<u8> {
    let mut out = Vec::with_capacity(mask.data.len() * 4);
    for &v in &mask.data {
        out.extend_from_slice(&[v, v, v, 255]);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn black_frame(width: u32, height: u32) -> Frame {
        let mut data = vec![0u8; (width * height * 4) as usize];
        for px in data.chunks_exact_mut(4) {
            px[3] = 255;
        }
        Frame::from_rgba(width, height, data)
    }

    fn white_overlay(width: u32, height: u32) -> PadOverlay {
        PadOverlay {
            width,
            height,
            pixels: vec![255u8; (width * height * 4) as usize],
        }
    }

    #[test]
    fn test_blend_is_sixty_forty() {
        let frame = black_frame(10, 10);
        let pads = vec![Pad::new(DrumKind::HiHat, PadRect::new(2, 2, 4, 4))];
        let mut overlays = HashMap::new();
        overlays.insert(DrumKind::HiHat, white_overlay(4, 4));

        let out = compose(&frame, &pads, &overlays, &[]);

        // 0.6 * 255 + 0.4 * 0 = 153.
        let idx = ((3 * 10 + 3) * 4) as usize;
        assert_eq!(out[idx], 153);
        assert_eq!(out[idx + 1], 153);
        assert_eq!(out[idx + 2], 153);

        // Outside the rectangle stays untouched.
        let outside = ((8 * 10 + 8) * 4) as usize;
        assert_eq!(out[outside], 0);
    }

    #[test]
    fn test_overlay_clips_at_frame_edge() {
        let frame = black_frame(6, 6);
        let pads = vec![Pad::new(DrumKind::TomDrum, PadRect::new(4, 4, 4, 4))];
        let mut overlays = HashMap::new();
        overlays.insert(DrumKind::TomDrum, white_overlay(4, 4));

        // Must not panic; in-frame corner of the rect is blended.
        let out = compose(&frame, &pads, &overlays, &[]);
        let idx = ((5 * 6 + 5) * 4) as usize;
        assert_eq!(out[idx], 153);
    }

    #[test]
    fn test_circle_stroke_hits_cardinal_points() {
        let frame = black_frame(20, 20);
        let blobs = [Blob {
            center: (10.0, 10.0),
            radius: 5.0,
        }];

        let out = compose(&frame, &[], &HashMap::new(), &blobs);

        for (x, y) in [(15u32, 10u32), (5, 10), (10, 15), (10, 5)] {
            let idx = ((y * 20 + x) * 4) as usize;
            assert_eq!(&out[idx..idx + 3], &CIRCLE_COLOR);
        }
        // Center stays background.
        let center = ((10 * 20 + 10) * 4) as usize;
        assert_eq!(out[center], 0);
    }

    #[test]
    fn test_circle_clipped_at_border_does_not_panic() {
        let frame = black_frame(10, 10);
        let blobs = [Blob {
            center: (0.0, 0.0),
            radius: 8.0,
        }];
        let out = compose(&frame, &[], &HashMap::new(), &blobs);
        assert_eq!(out.len(), frame.data.len());
    }

    #[test]
    fn test_compose_leaves_source_frame_untouched() {
        let frame = black_frame(10, 10);
        let original = frame.data.clone();
        let pads = vec![Pad::new(DrumKind::BassDrum, PadRect::new(0, 0, 5, 5))];
        let mut overlays = HashMap::new();
        overlays.insert(DrumKind::BassDrum, white_overlay(5, 5));

        let _ = compose(&frame, &pads, &overlays, &[]);
        assert_eq!(frame.data, original);
    }

    #[test]
    fn test_mask_to_rgba_expands_channels() {
        let mut mask = Mask::empty(2, 1);
        mask.set(1, 0);
        assert_eq!(mask_to_rgba(&mask), vec![0, 0, 0, 255, 255, 255, 255, 255]);
    }
}
