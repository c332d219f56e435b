//! Mask compositing and gradient-domain blending.
//!
//! Two stages take a reconstructed face canvas into the destination image.
//! `composite_face` swaps the hull interior for the canvas content with a
//! hard mask; `seamless_clone` then re-solves the swapped region in the
//! gradient domain so the seam disappears: the result keeps the patch's
//! gradients but takes its boundary values from the background (the
//! "normal clone" formulation of Poisson image editing).

use image::{GrayImage, Luma, RgbImage};
use imageproc::drawing::draw_polygon_mut;
use imageproc::point::Point as PixelPoint;
use log::debug;

use crate::types::{BoundingRect, ConvexHull};

/// Jacobi relaxation cap. Face-sized regions settle visually well before
/// this; the identity case exits after a single sweep.
const MAX_ITERATIONS: usize = 500;

/// Early-exit threshold on the largest per-pixel update of a sweep.
const CONVERGENCE: f32 = 0.05;

/// Binary mask of the filled hull, 255 inside, matching the image size.
/// Degenerate hulls produce an all-zero mask.
pub fn hull_mask(hull: &ConvexHull, width: u32, height: u32) -> GrayImage {
    let mut mask = GrayImage::new(width, height);

    let mut corners: Vec<PixelPoint<i32>> = hull
        .vertices()
        .iter()
        .map(|p| PixelPoint::new(p.x as i32, p.y as i32))
        .collect();
    corners.dedup();
    while corners.len() > 1 && corners.first() == corners.last() {
        corners.pop();
    }
    if corners.len() < 3 {
        return mask;
    }

    draw_polygon_mut(&mut mask, &corners, Luma([255u8]));
    mask
}

/// Hard-swap the masked region: outside the head mask the destination
/// pixel survives, inside the canvas content replaces it.
///
/// The two operands complement each other by construction (the canvas is
/// zero outside the face), so the saturating add never mixes texture.
pub fn composite_face(dest: &RgbImage, canvas: &RgbImage, head_mask: &GrayImage) -> RgbImage {
    debug_assert_eq!(dest.dimensions(), canvas.dimensions());
    debug_assert_eq!(dest.dimensions(), head_mask.dimensions());

    let mut combined = RgbImage::new(dest.width(), dest.height());
    for (x, y, pixel) in combined.enumerate_pixels_mut() {
        let body = if head_mask.get_pixel(x, y)[0] == 0 {
            *dest.get_pixel(x, y)
        } else {
            image::Rgb([0, 0, 0])
        };
        let face = canvas.get_pixel(x, y);
        for channel in 0..3 {
            pixel[channel] = body[channel].saturating_add(face[channel]);
        }
    }
    combined
}

/// Poisson-blend the masked region of `patch` into `background`.
///
/// The mask's bounding box is placed with its center at `center`
/// (truncating division, so the placement matches integer rect centers).
/// Within the region the solver keeps the patch's gradient field while
/// matching the background along the boundary; everything outside the
/// region is returned unchanged. An empty mask is a no-op.
pub fn seamless_clone(
    patch: &RgbImage,
    background: &RgbImage,
    mask: &GrayImage,
    center: (i32, i32),
) -> RgbImage {
    debug_assert_eq!(patch.dimensions(), background.dimensions());
    debug_assert_eq!(mask.dimensions(), background.dimensions());

    let mut output = background.clone();
    let Some(bounds) = mask_bounds(mask) else {
        debug!("seamless clone called with an empty mask");
        return output;
    };

    let width = bounds.width as usize;
    let height = bounds.height as usize;
    let origin = (
        center.0 - bounds.width / 2,
        center.1 - bounds.height / 2,
    );

    let bg_width = background.width() as i32;
    let bg_height = background.height() as i32;
    let dest_of = |i: usize, j: usize| (origin.0 + i as i32, origin.1 + j as i32);

    // The unknowns: mask-covered window pixels whose destination lands
    // inside the background.
    let mut region = vec![false; width * height];
    for j in 0..height {
        for i in 0..width {
            let lit = mask.get_pixel((bounds.x + i as i32) as u32, (bounds.y + j as i32) as u32)[0]
                != 0;
            let (dx, dy) = dest_of(i, j);
            region[j * width + i] =
                lit && dx >= 0 && dy >= 0 && dx < bg_width && dy < bg_height;
        }
    }

    // Guidance field, sampled at the mask's frame and clamped at the patch
    // edge so border gradients read as zero.
    let guide = |channel: usize, i: i64, j: i64| -> f32 {
        let x = (i64::from(bounds.x) + i).clamp(0, i64::from(bg_width) - 1) as u32;
        let y = (i64::from(bounds.y) + j).clamp(0, i64::from(bg_height) - 1) as u32;
        f32::from(patch.get_pixel(x, y)[channel])
    };

    for channel in 0..3 {
        // Seeding the solution with the patch itself makes an already
        // consistent patch (identical gradients and boundary) an exact
        // fixed point from the first sweep.
        let mut current: Vec<f32> = (0..width * height)
            .map(|idx| guide(channel, (idx % width) as i64, (idx / width) as i64))
            .collect();
        let mut next = current.clone();

        for _ in 0..MAX_ITERATIONS {
            let mut largest = 0.0f32;

            for j in 0..height {
                for i in 0..width {
                    let idx = j * width + i;
                    if !region[idx] {
                        continue;
                    }

                    let g_p = guide(channel, i as i64, j as i64);
                    let mut acc = 0.0f32;
                    let mut neighbors = 0u32;

                    for (di, dj) in [(-1i64, 0i64), (1, 0), (0, -1), (0, 1)] {
                        let qi = i as i64 + di;
                        let qj = j as i64 + dj;
                        let qdx = origin.0 + qi as i32;
                        let qdy = origin.1 + qj as i32;
                        if qdx < 0 || qdy < 0 || qdx >= bg_width || qdy >= bg_height {
                            continue;
                        }
                        neighbors += 1;

                        acc += g_p - guide(channel, qi, qj);

                        let in_window =
                            qi >= 0 && qj >= 0 && (qi as usize) < width && (qj as usize) < height;
                        if in_window && region[qj as usize * width + qi as usize] {
                            acc += current[qj as usize * width + qi as usize];
                        } else {
                            acc +=
                                f32::from(background.get_pixel(qdx as u32, qdy as u32)[channel]);
                        }
                    }

                    if neighbors == 0 {
                        continue;
                    }
                    let value = acc / neighbors as f32;
                    largest = largest.max((value - current[idx]).abs());
                    next[idx] = value;
                }
            }

            std::mem::swap(&mut current, &mut next);
            if largest < CONVERGENCE {
                break;
            }
        }

        for j in 0..height {
            for i in 0..width {
                let idx = j * width + i;
                if !region[idx] {
                    continue;
                }
                let (dx, dy) = dest_of(i, j);
                output.get_pixel_mut(dx as u32, dy as u32)[channel] =
                    current[idx].round().clamp(0.0, 255.0) as u8;
            }
        }
    }

    output
}

/// Bounding box of the mask's nonzero pixels.
fn mask_bounds(mask: &GrayImage) -> Option<BoundingRect> {
    let mut min_x = u32::MAX;
    let mut min_y = u32::MAX;
    let mut max_x = 0u32;
    let mut max_y = 0u32;
    let mut any = false;

    for (x, y, pixel) in mask.enumerate_pixels() {
        if pixel[0] != 0 {
            any = true;
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
    }

    any.then(|| {
        BoundingRect::new(
            min_x as i32,
            min_y as i32,
            (max_x - min_x + 1) as i32,
            (max_y - min_y + 1) as i32,
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Point;
    use image::Rgb;

    /// Deterministic non-flat test image.
    fn gradient_image(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            Rgb([
                (x * 3 % 256) as u8,
                (y * 5 % 256) as u8,
                ((x + y) * 2 % 256) as u8,
            ])
        })
    }

    fn disk_mask(width: u32, height: u32, cx: i32, cy: i32, radius: i32) -> GrayImage {
        GrayImage::from_fn(width, height, |x, y| {
            let dx = x as i32 - cx;
            let dy = y as i32 - cy;
            if dx * dx + dy * dy <= radius * radius {
                Luma([255])
            } else {
                Luma([0])
            }
        })
    }

    #[test]
    fn empty_mask_is_a_no_op() {
        let background = gradient_image(40, 40);
        let mask = GrayImage::new(40, 40);
        let patch = RgbImage::from_pixel(40, 40, Rgb([255, 0, 0]));

        let out = seamless_clone(&patch, &background, &mask, (20, 20));
        assert_eq!(out.as_raw(), background.as_raw());
    }

    #[test]
    fn cloning_an_image_onto_itself_is_exact() {
        let background = gradient_image(60, 60);
        let mask = disk_mask(60, 60, 30, 30, 12);
        let center = mask_bounds(&mask).unwrap().center();

        // Gradients and boundary already agree, so the solver must leave
        // every pixel bit-identical.
        let out = seamless_clone(&background.clone(), &background, &mask, center);
        assert_eq!(out.as_raw(), background.as_raw());
    }

    #[test]
    fn flat_patch_on_flat_background_adopts_background() {
        let background = RgbImage::from_pixel(50, 50, Rgb([10, 10, 10]));
        let patch = RgbImage::from_pixel(50, 50, Rgb([200, 200, 200]));
        let mask = disk_mask(50, 50, 25, 25, 6);
        let center = mask_bounds(&mask).unwrap().center();

        let out = seamless_clone(&patch, &background, &mask, center);

        // A zero-gradient patch carries no texture of its own; the solution
        // is the harmonic fill of the boundary values.
        let center_pixel = out.get_pixel(25, 25);
        assert!(
            center_pixel[0] < 20,
            "expected the flat patch to fade into the background, got {}",
            center_pixel[0]
        );

        // Pixels outside the mask are untouched.
        for (x, y, pixel) in out.enumerate_pixels() {
            if mask.get_pixel(x, y)[0] == 0 {
                assert_eq!(pixel, background.get_pixel(x, y));
            }
        }
    }

    #[test]
    fn composite_splits_at_the_hull_boundary() {
        let dest = RgbImage::from_pixel(80, 80, Rgb([30, 60, 90]));
        let mut canvas = RgbImage::new(80, 80);
        for y in 20..60 {
            for x in 20..60 {
                canvas.put_pixel(x, y, Rgb([200, 10, 10]));
            }
        }
        let hull = ConvexHull::of_points(&[
            Point::new(20.0, 20.0),
            Point::new(59.0, 20.0),
            Point::new(59.0, 59.0),
            Point::new(20.0, 59.0),
        ]);
        let mask = hull_mask(&hull, 80, 80);

        let combined = composite_face(&dest, &canvas, &mask);
        assert_eq!(*combined.get_pixel(40, 40), Rgb([200, 10, 10]));
        assert_eq!(*combined.get_pixel(5, 5), Rgb([30, 60, 90]));
    }

    #[test]
    fn degenerate_hull_masks_nothing() {
        let hull = ConvexHull::of_points(&[Point::new(1.0, 1.0), Point::new(9.0, 9.0)]);
        let mask = hull_mask(&hull, 20, 20);
        assert!(mask.pixels().all(|p| p[0] == 0));
    }
}
