//! Blob extraction: connected components reduced to enclosing circles.
//!
//! Each 8-connected region of the mask becomes one [`Blob`], summarized by
//! the minimal enclosing circle of its boundary pixels. A lossy but cheap
//! estimate of where the marker is and how big it looks. No minimum-area
//! filter is applied; tiny regions still produce blobs.

use rand::seq::SliceRandom;

use crate::vision::Mask;

/// A detected colored region, reduced to a center and radius in frame
/// coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Blob {
    pub center: (f32, f32),
    pub radius: f32,
}

/// Extract one blob per 8-connected component of the mask, in scan order of
/// the component's first pixel.
pub fn extract_blobs(mask: &Mask) -> Vec<Blob> {
    let width = mask.width as i32;
    let height = mask.height as i32;
    let mut visited = vec![false; (width * height) as usize];
    let mut blobs = Vec::new();

    for start_y in 0..height {
        for start_x in 0..width {
            let start_idx = (start_y * width + start_x) as usize;
            if visited[start_idx] || !mask.get(start_x as u32, start_y as u32) {
                continue;
            }

            // Flood fill the component.
            let mut component = Vec::new();
            let mut stack = vec![(start_x, start_y)];
            visited[start_idx] = true;
            while let Some((x, y)) = stack.pop() {
                component.push((x, y));
                for dy in -1..=1 {
                    for dx in -1..=1 {
                        let nx = x + dx;
                        let ny = y + dy;
                        if nx < 0 || ny < 0 || nx >= width || ny >= height {
                            continue;
                        }
                        let nidx = (ny * width + nx) as usize;
                        if !visited[nidx] && mask.get(nx as u32, ny as u32) {
                            visited[nidx] = true;
                            stack.push((nx, ny));
                        }
                    }
                }
            }

            let boundary = boundary_points(mask, &component);
            let circle = min_enclosing_circle(&boundary);
            blobs.push(Blob {
                center: (circle.cx as f32, circle.cy as f32),
                radius: circle.r as f32,
            });
        }
    }

    blobs
}

/// Pixels of the component with at least one unset (or out-of-bounds)
/// 4-neighbor. The enclosing circle only depends on these.
fn boundary_points(mask: &Mask, component: &[(i32, i32)]) -> Vec<(f64, f64)> {
    let width = mask.width as i32;
    let height = mask.height as i32;
    component
        .iter()
        .filter(|&&(x, y)| {
            [(1, 0), (-1, 0), (0, 1), (0, -1)].iter().any(|&(dx, dy)| {
                let nx = x + dx;
                let ny = y + dy;
                nx < 0
                    || ny < 0
                    || nx >= width
                    || ny >= height
                    || !mask.get(nx as u32, ny as u32)
            })
        })
        .map(|&(x, y)| (x as f64, y as f64))
        .collect()
}

#[derive(Debug, Clone, Copy)]
pub struct Circle {
    pub cx: f64,
    pub cy: f64,
    pub r: f64,
}

impl Circle {
    fn point(p: (f64, f64)) -> Self {
        Self {
            cx: p.0,
            cy: p.1,
            r: 0.0,
        }
    }

    fn diameter(a: (f64, f64), b: (f64, f64)) -> Self {
        let cx = (a.0 + b.0) / 2.0;
        let cy = (a.1 + b.1) / 2.0;
        Self {
            cx,
            cy,
            r: dist(a, b) / 2.0,
        }
    }

    /// Circumcircle of three points; falls back to the widest diameter
    /// circle when the points are collinear.
    fn circumscribe(a: (f64, f64), b: (f64, f64), c: (f64, f64)) -> Self {
        let d = 2.0 * (a.0 * (b.1 - c.1) + b.0 * (c.1 - a.1) + c.0 * (a.1 - b.1));
        if d.abs() < 1e-12 {
            let ab = Circle::diameter(a, b);
            let ac = Circle::diameter(a, c);
            let bc = Circle::diameter(b, c);
            let mut best = ab;
            for cand in [ac, bc] {
                if cand.r > best.r {
                    best = cand;
                }
            }
            return best;
        }
        let a2 = a.0 * a.0 + a.1 * a.1;
        let b2 = b.0 * b.0 + b.1 * b.1;
        let c2 = c.0 * c.0 + c.1 * c.1;
        let cx = (a2 * (b.1 - c.1) + b2 * (c.1 - a.1) + c2 * (a.1 - b.1)) / d;
        let cy = (a2 * (c.0 - b.0) + b2 * (a.0 - c.0) + c2 * (b.0 - a.0)) / d;
        Self {
            cx,
            cy,
            r: dist((cx, cy), a),
        }
    }

    fn contains(&self, p: (f64, f64)) -> bool {
        dist((self.cx, self.cy), p) <= self.r + 1e-9
    }
}

#[inline]
fn dist(a: (f64, f64), b: (f64, f64)) -> f64 {
    ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt()
}

/// Minimal enclosing circle (Welzl, move-to-front, randomized insertion
/// order for the expected-linear bound).
pub fn min_enclosing_circle(points: &[(f64, f64)]) -> Circle {
    if points.is_empty() {
        return Circle::point((0.0, 0.0));
    }

    let mut pts = points.to_vec();
    pts.shuffle(&mut rand::rng());

    let mut circle = Circle::point(pts[0]);
    for i in 1..pts.len() {
        if !circle.contains(pts[i]) {
            circle = circle_with_one(&pts[..i], pts[i]);
        }
    }
    circle
}

fn circle_with_one(pts: &[(f64, f64)], p: (f64, f64)) -> Circle {
    let mut circle = Circle::point(p);
    for j in 0..pts.len() {
        if !circle.contains(pts[j]) {
            circle = circle_with_two(&pts[..j], pts[j], p);
        }
    }
    circle
}

fn circle_with_two(pts: &[(f64, f64)], q: (f64, f64), p: (f64, f64)) -> Circle {
    let mut circle = Circle::diameter(p, q);
    for &r in pts {
        if !circle.contains(r) {
            circle = Circle::circumscribe(p, q, r);
        }
    }
    circle
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_circle_of_two_points() {
        let circle = min_enclosing_circle(&[(0.0, 0.0), (4.0, 0.0)]);
        assert!((circle.cx - 2.0).abs() < 1e-6);
        assert!(circle.cy.abs() < 1e-6);
        assert!((circle.r - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_circle_of_square_corners() {
        let pts = [(0.0, 0.0), (2.0, 0.0), (0.0, 2.0), (2.0, 2.0)];
        let circle = min_enclosing_circle(&pts);
        assert!((circle.cx - 1.0).abs() < 1e-6);
        assert!((circle.cy - 1.0).abs() < 1e-6);
        assert!((circle.r - 2.0_f64.sqrt()).abs() < 1e-6);
    }

    #[test]
    fn test_interior_points_do_not_grow_circle() {
        let pts = [
            (0.0, 0.0),
            (4.0, 0.0),
            (2.0, 1.0),
            (2.0, -1.0),
            (1.0, 0.5),
        ];
        let circle = min_enclosing_circle(&pts);
        assert!((circle.r - 2.0).abs() < 1e-6);
        for p in pts {
            assert!(circle.contains(p));
        }
    }

    #[test]
    fn test_square_blob_yields_centered_circle() {
        let mut mask = Mask::empty(20, 20);
        for y in 5..10 {
            for x in 5..10 {
                mask.set(x, y);
            }
        }

        let blobs = extract_blobs(&mask);
        assert_eq!(blobs.len(), 1);
        let blob = blobs[0];
        assert!((blob.center.0 - 7.0).abs() < 1e-3);
        assert!((blob.center.1 - 7.0).abs() < 1e-3);
        // Half-diagonal of the 4x4 pixel-center span.
        assert!((blob.radius - 8.0_f32.sqrt()).abs() < 1e-3);
    }

    #[test]
    fn test_separate_components_yield_separate_blobs() {
        let mut mask = Mask::empty(30, 10);
        for y in 2..5 {
            for x in 2..5 {
                mask.set(x, y);
            }
        }
        for y in 3..6 {
            for x in 20..23 {
                mask.set(x, y);
            }
        }

        let mut blobs = extract_blobs(&mask);
        blobs.sort_by(|a, b| a.center.0.partial_cmp(&b.center.0).unwrap());
        assert_eq!(blobs.len(), 2);
        assert!((blobs[0].center.0 - 3.0).abs() < 1e-3);
        assert!((blobs[1].center.0 - 21.0).abs() < 1e-3);
    }

    #[test]
    fn test_diagonal_pixels_are_one_component() {
        let mut mask = Mask::empty(10, 10);
        mask.set(2, 2);
        mask.set(3, 3);
        mask.set(4, 4);

        assert_eq!(extract_blobs(&mask).len(), 1);
    }

    #[test]
    fn test_single_pixel_blob() {
        let mut mask = Mask::empty(10, 10);
        mask.set(4, 7);

        let blobs = extract_blobs(&mask);
        assert_eq!(blobs.len(), 1);
        assert_eq!(blobs[0].center, (4.0, 7.0));
        assert_eq!(blobs[0].radius, 0.0);
    }

    #[test]
    fn test_empty_mask_yields_no_blobs() {
        let mask = Mask::empty(10, 10);
        assert!(extract_blobs(&mask).is_empty());
    }
}
