//! Per-triangle affine texture warping.
//!
//! The warper rebuilds the source face at the destination geometry: for
//! every triangle of the topology it derives the affine map taking the
//! source triangle onto the destination triangle, warps the source patch,
//! cuts it to the triangle shape and accumulates the piece into a canvas
//! sized like the destination image. Pixels outside the destination face
//! stay zero.

use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::drawing::draw_polygon_mut;
use imageproc::geometric_transformations::{warp_into, Interpolation, Projection};
use imageproc::point::Point as PixelPoint;
use log::debug;
use nalgebra::{Matrix3, Vector3};

use crate::error::Error;
use crate::triangulation::Triangulation;
use crate::types::{BoundingRect, Landmarks, Point};

/// Warp the source face onto the destination geometry.
///
/// Returns a canvas of `dest_width` x `dest_height` holding the source
/// texture at the destination landmark positions and zero everywhere else.
/// Fails up front if any destination landmark lies outside the
/// destination image; degenerate triangles are skipped, never fatal.
pub fn reconstruct_face(
    topology: &Triangulation,
    source_image: &RgbImage,
    source_landmarks: &Landmarks,
    dest_landmarks: &Landmarks,
    dest_width: u32,
    dest_height: u32,
) -> crate::Result<RgbImage> {
    for p in dest_landmarks.iter() {
        if p.x < 0.0 || p.y < 0.0 || p.x >= dest_width as f32 || p.y >= dest_height as f32 {
            return Err(Error::LandmarkOutOfBounds {
                x: p.x,
                y: p.y,
                width: dest_width,
                height: dest_height,
            });
        }
    }

    let mut canvas = RgbImage::new(dest_width, dest_height);
    let mut skipped = 0usize;

    for &[a, b, c] in topology.triangles() {
        let src = [source_landmarks[a], source_landmarks[b], source_landmarks[c]];
        let dst = [dest_landmarks[a], dest_landmarks[b], dest_landmarks[c]];
        if !warp_triangle(source_image, &src, &dst, &mut canvas) {
            skipped += 1;
        }
    }
    if skipped > 0 {
        debug!(
            "skipped {} of {} degenerate triangles",
            skipped,
            topology.len()
        );
    }

    Ok(canvas)
}

/// Warp one triangle of source texture into the canvas. Returns false if
/// the triangle is degenerate on either side and was skipped.
fn warp_triangle(
    source_image: &RgbImage,
    src: &[Point; 3],
    dst: &[Point; 3],
    canvas: &mut RgbImage,
) -> bool {
    let src_rect = BoundingRect::from_points(src);
    let dst_rect = BoundingRect::from_points(dst);

    let src_local = rect_local(src, &src_rect);
    let dst_local = rect_local(dst, &dst_rect);

    // Collinear correspondences make the system singular; a singular
    // forward map cannot be inverted for sampling. Both cases skip.
    let Some(coeffs) = affine_between(&src_local, &dst_local) else {
        return false;
    };
    let Some(projection) = Projection::from_matrix([
        coeffs[0], coeffs[1], coeffs[2],
        coeffs[3], coeffs[4], coeffs[5],
        0.0, 0.0, 1.0,
    ]) else {
        return false;
    };

    let Some(mask) = triangle_mask(&dst_local, &dst_rect) else {
        return false;
    };

    let patch = extract_patch(source_image, &src_rect);
    let mut warped = RgbImage::new(dst_rect.width as u32, dst_rect.height as u32);
    warp_into(
        &patch,
        &projection,
        Interpolation::Bilinear,
        Rgb([0, 0, 0]),
        &mut warped,
    );

    accumulate(canvas, &warped, &mask, &dst_rect);
    true
}

/// Triangle vertices relative to their bounding rect origin.
fn rect_local(triangle: &[Point; 3], rect: &BoundingRect) -> [Point; 3] {
    let origin = Point::new(rect.x as f32, rect.y as f32);
    [
        triangle[0] - origin,
        triangle[1] - origin,
        triangle[2] - origin,
    ]
}

/// Solve the affine map taking `src` onto `dst` from the three point
/// correspondences. `None` when the vertices are collinear.
fn affine_between(src: &[Point; 3], dst: &[Point; 3]) -> Option<[f32; 6]> {
    let system = Matrix3::new(
        src[0].x, src[0].y, 1.0,
        src[1].x, src[1].y, 1.0,
        src[2].x, src[2].y, 1.0,
    );
    let inverse = system.try_inverse()?;

    let xs = inverse * Vector3::new(dst[0].x, dst[1].x, dst[2].x);
    let ys = inverse * Vector3::new(dst[0].y, dst[1].y, dst[2].y);
    Some([xs[0], xs[1], xs[2], ys[0], ys[1], ys[2]])
}

/// Binary mask of the triangle at rect-local coordinates, 255 inside.
/// `None` when truncation collapses the triangle.
fn triangle_mask(local: &[Point; 3], rect: &BoundingRect) -> Option<GrayImage> {
    let corners = [
        PixelPoint::new(local[0].x as i32, local[0].y as i32),
        PixelPoint::new(local[1].x as i32, local[1].y as i32),
        PixelPoint::new(local[2].x as i32, local[2].y as i32),
    ];
    if corners[0] == corners[1] || corners[1] == corners[2] || corners[0] == corners[2] {
        return None;
    }

    let mut mask = GrayImage::new(rect.width as u32, rect.height as u32);
    draw_polygon_mut(&mut mask, &corners, Luma([255u8]));
    Some(mask)
}

/// Copy of the image region under `rect`, zero-padded where the rect
/// overhangs the image. The source face may legitimately touch the image
/// border, so overhang is not an error here.
fn extract_patch(image: &RgbImage, rect: &BoundingRect) -> RgbImage {
    let mut patch = RgbImage::new(rect.width as u32, rect.height as u32);
    let image_rect = BoundingRect::new(0, 0, image.width() as i32, image.height() as i32);

    if let Some(overlap) = rect.intersect(&image_rect) {
        for y in overlap.y..overlap.bottom() {
            for x in overlap.x..overlap.right() {
                patch.put_pixel(
                    (x - rect.x) as u32,
                    (y - rect.y) as u32,
                    *image.get_pixel(x as u32, y as u32),
                );
            }
        }
    }
    patch
}

/// Add the masked warped patch into the canvas at the rect offset.
///
/// A canvas pixel that is already lit (luma above 1) keeps its value, so
/// adjacent triangles sharing a bounding rect never double-accumulate
/// brightness along their common edge.
fn accumulate(canvas: &mut RgbImage, warped: &RgbImage, mask: &GrayImage, rect: &BoundingRect) {
    for y in 0..rect.height {
        for x in 0..rect.width {
            if mask.get_pixel(x as u32, y as u32)[0] == 0 {
                continue;
            }

            let cx = rect.x + x;
            let cy = rect.y + y;
            if cx < 0 || cy < 0 || cx >= canvas.width() as i32 || cy >= canvas.height() as i32 {
                continue;
            }

            let incoming = warped.get_pixel(x as u32, y as u32);
            let current = canvas.get_pixel_mut(cx as u32, cy as u32);
            if luma(current) > 1 {
                continue;
            }
            for channel in 0..3 {
                current[channel] = current[channel].saturating_add(incoming[channel]);
            }
        }
    }
}

/// Rec. 601 luma, the same weighting the masks are thresholded with.
fn luma(pixel: &Rgb<u8>) -> u8 {
    let value = 0.299 * f32::from(pixel[0])
        + 0.587 * f32::from(pixel[1])
        + 0.114 * f32::from(pixel[2]);
    value.round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ConvexHull, LANDMARK_COUNT};

    /// Oval landmark layout on whole-pixel coordinates, as an integer-output
    /// detector would produce.
    fn oval_points(cx: f32, cy: f32, rx: f32, ry: f32) -> Vec<Point> {
        (0..LANDMARK_COUNT)
            .map(|i| {
                let angle = i as f32 / LANDMARK_COUNT as f32 * std::f32::consts::TAU;
                Point::new(
                    (cx + rx * angle.cos()).round(),
                    (cy + ry * angle.sin()).round(),
                )
            })
            .collect()
    }

    fn flat_image(width: u32, height: u32, color: Rgb<u8>) -> RgbImage {
        RgbImage::from_pixel(width, height, color)
    }

    #[test]
    fn out_of_bounds_destination_landmark_is_fatal() {
        let source = Landmarks::new(oval_points(100.0, 100.0, 50.0, 60.0)).unwrap();
        let topology = Triangulation::from_landmarks(&source).unwrap();

        let mut stray = oval_points(100.0, 100.0, 50.0, 60.0);
        stray[10] = Point::new(500.0, 100.0);
        let dest = Landmarks::new(stray).unwrap();

        let image = flat_image(200, 200, Rgb([90, 90, 90]));
        match reconstruct_face(&topology, &image, &source, &dest, 200, 200) {
            Err(Error::LandmarkOutOfBounds { x, width, .. }) => {
                assert_eq!(x, 500.0);
                assert_eq!(width, 200);
            }
            other => panic!("expected LandmarkOutOfBounds, got {:?}", other),
        }
    }

    #[test]
    fn canvas_is_zero_outside_destination_hull() {
        let source = Landmarks::new(oval_points(100.0, 100.0, 50.0, 60.0)).unwrap();
        let topology = Triangulation::from_landmarks(&source).unwrap();
        let dest = Landmarks::new(oval_points(70.0, 80.0, 30.0, 36.0)).unwrap();

        let image = flat_image(200, 200, Rgb([200, 150, 100]));
        let canvas = reconstruct_face(&topology, &image, &source, &dest, 160, 160).unwrap();

        let hull = dest.convex_hull();
        for (x, y, pixel) in canvas.enumerate_pixels() {
            if *pixel != Rgb([0, 0, 0]) {
                assert!(
                    near_hull(&hull, x, y),
                    "lit pixel ({}, {}) outside destination hull",
                    x,
                    y
                );
            }
        }
    }

    /// Containment up to rasterization: edge stroking may light a boundary
    /// pixel whose center sits a fraction outside the ideal hull edge.
    fn near_hull(hull: &ConvexHull, x: u32, y: u32) -> bool {
        for dy in -1..=1 {
            for dx in -1..=1 {
                if hull.contains(Point::new(x as f32 + dx as f32, y as f32 + dy as f32)) {
                    return true;
                }
            }
        }
        false
    }

    #[test]
    fn face_interior_receives_source_texture() {
        let source = Landmarks::new(oval_points(100.0, 100.0, 50.0, 60.0)).unwrap();
        let topology = Triangulation::from_landmarks(&source).unwrap();
        let dest = Landmarks::new(oval_points(80.0, 80.0, 40.0, 48.0)).unwrap();

        let image = flat_image(200, 200, Rgb([180, 120, 60]));
        let canvas = reconstruct_face(&topology, &image, &source, &dest, 160, 160).unwrap();

        // Flat source texture: deep-interior pixels must carry it through
        // the warp unchanged up to interpolation rounding.
        let center = canvas.get_pixel(80, 80);
        for channel in 0..3 {
            let expected = [180i16, 120, 60][channel];
            assert!(
                (i16::from(center[channel]) - expected).abs() <= 2,
                "center channel {} is {}, expected about {}",
                channel,
                center[channel],
                expected
            );
        }
    }

    #[test]
    fn collinear_triangle_is_skipped_not_fatal() {
        let mut points = oval_points(100.0, 100.0, 50.0, 60.0);
        // Make three specific landmarks exactly collinear.
        points[0] = Point::new(40.0, 40.0);
        points[1] = Point::new(50.0, 50.0);
        points[2] = Point::new(60.0, 60.0);
        let landmarks = Landmarks::new(points).unwrap();

        let topology = Triangulation::from_triples(vec![[0, 1, 2], [10, 30, 50]]).unwrap();
        let image = flat_image(200, 200, Rgb([90, 90, 90]));

        let with_degenerate =
            reconstruct_face(&topology, &image, &landmarks, &landmarks, 200, 200).unwrap();

        let only_valid = Triangulation::from_triples(vec![[10, 30, 50]]).unwrap();
        let without =
            reconstruct_face(&only_valid, &image, &landmarks, &landmarks, 200, 200).unwrap();

        assert_eq!(
            with_degenerate.as_raw(),
            without.as_raw(),
            "a skipped degenerate triangle must not change the output"
        );
    }

    #[test]
    fn source_rect_overhanging_image_is_zero_padded() {
        // Source landmarks touch the image border; the triangle rects spill
        // past it and must read as black there rather than fail.
        let source = Landmarks::new(oval_points(60.0, 60.0, 59.5, 59.5)).unwrap();
        let topology = Triangulation::from_landmarks(&source).unwrap();
        let dest = Landmarks::new(oval_points(100.0, 100.0, 50.0, 50.0)).unwrap();

        let image = flat_image(120, 120, Rgb([240, 240, 240]));
        let canvas = reconstruct_face(&topology, &image, &source, &dest, 220, 220);
        assert!(canvas.is_ok());
    }
}
