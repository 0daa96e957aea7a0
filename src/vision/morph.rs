//! Binary morphology with a square structuring element.
//!
//! The segmenter output is cleaned with an erode/dilate pair: erosion drops
//! isolated noise pixels, dilation restores the surviving regions roughly to
//! their original extent and fills small gaps.

use crate::vision::Mask;

/// Kernel side length used by the pipeline.
pub const KERNEL_SIZE: u32 = 5;

/// Erode: a pixel survives iff every in-bounds neighbor under the kernel is
/// set.
pub fn erode(mask: &Mask, kernel: u32) -> Mask {
    let r = (kernel / 2) as i32;
    let mut out = Mask::empty(mask.width, mask.height);

    for y in 0..mask.height as i32 {
        for x in 0..mask.width as i32 {
            if neighborhood(mask, x, y, r, |all, set| all && set, true) {
                out.set(x as u32, y as u32);
            }
        }
    }

    out
}

/// Dilate: a pixel is set iff any in-bounds neighbor under the kernel is set.
pub fn dilate(mask: &Mask, kernel: u32) -> Mask {
    let r = (kernel / 2) as i32;
    let mut out = Mask::empty(mask.width, mask.height);

    for y in 0..mask.height as i32 {
        for x in 0..mask.width as i32 {
            if neighborhood(mask, x, y, r, |any, set| any || set, false) {
                out.set(x as u32, y as u32);
            }
        }
    }

    out
}

/// Erode then dilate with the fixed pipeline kernel.
pub fn open(mask: &Mask) -> Mask {
    dilate(&erode(mask, KERNEL_SIZE), KERNEL_SIZE)
}

#[inline]
fn neighborhood(
    mask: &Mask,
    cx: i32,
    cy: i32,
    r: i32,
    fold: impl Fn(bool, bool) -> bool,
    init: bool,
) -> bool {
    let mut acc = init;
    for dy in -r..=r {
        for dx in -r..=r {
            let x = cx + dx;
            let y = cy + dy;
            if x < 0 || y < 0 || x >= mask.width as i32 || y >= mask.height as i32 {
                continue;
            }
            acc = fold(acc, mask.get(x as u32, y as u32));
            // Short-circuit once the fold can no longer change.
            if acc != init {
                return acc;
            }
        }
    }
    acc
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mask_from_rows(rows: &[&str]) -> Mask {
        let height = rows.len() as u32;
        let width = rows[0].len() as u32;
        let mut mask = Mask::empty(width, height);
        for (y, row) in rows.iter().enumerate() {
            for (x, c) in row.chars().enumerate() {
                if c == '#' {
                    mask.set(x as u32, y as u32);
                }
            }
        }
        mask
    }

    #[test]
    fn test_erode_removes_isolated_pixel() {
        let mask = mask_from_rows(&[
            ".......",
            ".......",
            "...#...",
            ".......",
            ".......",
        ]);
        assert_eq!(erode(&mask, KERNEL_SIZE).set_count(), 0);
    }

    #[test]
    fn test_erode_keeps_core_of_solid_block() {
        // 7x7 block in a 9x9 mask: only the 3x3 core survives a 5x5 erode.
        let mut mask = Mask::empty(9, 9);
        for y in 1..8 {
            for x in 1..8 {
                mask.set(x, y);
            }
        }
        let eroded = erode(&mask, KERNEL_SIZE);
        assert_eq!(eroded.set_count(), 9);
        assert!(eroded.get(4, 4));
        assert!(!eroded.get(2, 2));
    }

    #[test]
    fn test_dilate_grows_single_pixel_to_kernel() {
        let mask = mask_from_rows(&[
            ".......",
            ".......",
            ".......",
            "...#...",
            ".......",
            ".......",
            ".......",
        ]);
        let dilated = dilate(&mask, KERNEL_SIZE);
        assert_eq!(dilated.set_count(), 25);
        assert!(dilated.get(1, 1));
        assert!(!dilated.get(0, 0));
    }

    #[test]
    fn test_open_suppresses_noise_but_keeps_blobs() {
        // A lone pixel far from a solid 6x6 block.
        let mut mask = Mask::empty(20, 12);
        mask.set(17, 2);
        for y in 3..9 {
            for x in 3..9 {
                mask.set(x, y);
            }
        }
        let opened = open(&mask);
        assert!(!opened.get(17, 2));
        assert!(opened.get(5, 5));
    }

    #[test]
    fn test_empty_mask_stays_empty() {
        let mask = Mask::empty(10, 10);
        assert_eq!(open(&mask).set_count(), 0);
    }
}
