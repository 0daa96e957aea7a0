//! HSV color segmentation.
//!
//! Converts RGBA frames to hue/saturation/value and thresholds against fixed
//! marker color ranges. Hue uses the half-degree scale (0..=179) so the
//! threshold constants stay directly comparable to the usual CV literature.

use crate::camera::Frame;
use crate::vision::Mask;

/// Inclusive HSV threshold range.
#[derive(Debug, Clone, Copy)]
pub struct HsvRange {
    pub lower: [u8; 3],
    pub upper: [u8; 3],
}

impl HsvRange {
    #[inline]
    pub fn contains(&self, h: u8, s: u8, v: u8) -> bool {
        h >= self.lower[0]
            && h <= self.upper[0]
            && s >= self.lower[1]
            && s <= self.upper[1]
            && v >= self.lower[2]
            && v <= self.upper[2]
    }
}

/// Blue marker range.
pub const BLUE_RANGE: HsvRange = HsvRange {
    lower: [90, 50, 70],
    upper: [128, 255, 255],
};

/// Green marker range.
pub const GREEN_RANGE: HsvRange = HsvRange {
    lower: [40, 50, 50],
    upper: [80, 255, 255],
};

/// RGB to HSV, hue in 0..=179, saturation and value in 0..=255.
pub fn rgb_to_hsv(r: u8, g: u8, b: u8) -> (u8, u8, u8) {
    let rf = r as f32;
    let gf = g as f32;
    let bf = b as f32;
    let max = rf.max(gf).max(bf);
    let min = rf.min(gf).min(bf);
    let delta = max - min;

    let v = max;
    let s = if max > 0.0 { delta / max * 255.0 } else { 0.0 };

    let mut h = if delta == 0.0 {
        0.0
    } else if max == rf {
        60.0 * ((gf - bf) / delta)
    } else if max == gf {
        60.0 * ((bf - rf) / delta) + 120.0
    } else {
        60.0 * ((rf - gf) / delta) + 240.0
    };
    if h < 0.0 {
        h += 360.0;
    }

    (
        (h / 2.0).round().min(179.0) as u8,
        s.round() as u8,
        v.round() as u8,
    )
}

/// Threshold a frame against a set of HSV ranges; the result is the union of
/// the per-range masks.
pub fn segment(frame: &Frame, ranges: &[HsvRange]) -> Mask {
    let mut mask = Mask::empty(frame.width, frame.height);

    for y in 0..frame.height {
        for x in 0..frame.width {
            let idx = ((y * frame.width + x) * 4) as usize;
            let (h, s, v) =
                rgb_to_hsv(frame.data[idx], frame.data[idx + 1], frame.data[idx + 2]);
            if ranges.iter().any(|range| range.contains(h, s, v)) {
                mask.set(x, y);
            }
        }
    }

    mask
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_frame(width: u32, height: u32, rgb: [u8; 3]) -> Frame {
        let mut data = Vec::with_capacity((width * height * 4) as usize);
        for _ in 0..width * height {
            data.extend_from_slice(&[rgb[0], rgb[1], rgb[2], 255]);
        }
        Frame::from_rgba(width, height, data)
    }

    #[test]
    fn test_hue_of_primaries() {
        assert_eq!(rgb_to_hsv(255, 0, 0), (0, 255, 255));
        assert_eq!(rgb_to_hsv(0, 255, 0), (60, 255, 255));
        assert_eq!(rgb_to_hsv(0, 0, 255), (120, 255, 255));
    }

    #[test]
    fn test_gray_has_no_saturation() {
        let (_, s, v) = rgb_to_hsv(128, 128, 128);
        assert_eq!(s, 0);
        assert_eq!(v, 128);
    }

    #[test]
    fn test_pure_blue_fills_mask() {
        let frame = solid_frame(8, 6, [0, 0, 255]);
        let mask = segment(&frame, &[BLUE_RANGE, GREEN_RANGE]);
        assert_eq!(mask.set_count(), 48);
    }

    #[test]
    fn test_pure_green_fills_mask() {
        let frame = solid_frame(8, 6, [0, 255, 0]);
        let mask = segment(&frame, &[BLUE_RANGE, GREEN_RANGE]);
        assert_eq!(mask.set_count(), 48);
    }

    #[test]
    fn test_pure_red_yields_empty_mask() {
        let frame = solid_frame(8, 6, [255, 0, 0]);
        let mask = segment(&frame, &[BLUE_RANGE, GREEN_RANGE]);
        assert_eq!(mask.set_count(), 0);
    }

    #[test]
    fn test_mixed_frame_segments_only_marker_pixels() {
        let mut frame = solid_frame(4, 4, [255, 0, 0]);
        // Paint one blue pixel at (2, 1).
        let idx = ((1 * 4 + 2) * 4) as usize;
        frame.data[idx..idx + 4].copy_from_slice(&[0, 0, 255, 255]);

        let mask = segment(&frame, &[BLUE_RANGE, GREEN_RANGE]);
        assert_eq!(mask.set_count(), 1);
        assert!(mask.get(2, 1));
    }
}
