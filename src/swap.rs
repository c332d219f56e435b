use image::RgbImage;
use log::debug;

use crate::blend;
use crate::triangulation::Triangulation;
use crate::types::{ConvexHull, DetectedFace, Landmarks};
use crate::warp;

/// A source face prepared for swapping: the chosen image, its landmarks,
/// their convex hull and the mesh topology. Built once, immutable after,
/// and reused across every apply call in a session.
#[derive(Debug, Clone)]
pub struct SourceFace {
    image: RgbImage,
    landmarks: Landmarks,
    hull: ConvexHull,
    topology: Triangulation,
}

impl SourceFace {
    /// Prepare a face for swapping.
    ///
    /// Fails with [`Error::EmptyTopology`](crate::Error::EmptyTopology)
    /// when the landmarks yield no usable mesh, so a swapper can never
    /// exist without triangles to warp.
    pub fn new(image: RgbImage, landmarks: Landmarks) -> crate::Result<Self> {
        let hull = landmarks.convex_hull();
        let topology = Triangulation::from_landmarks(&landmarks)?;
        debug!("source face mesh has {} triangles", topology.len());
        Ok(Self {
            image,
            landmarks,
            hull,
            topology,
        })
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn landmarks(&self) -> &Landmarks {
        &self.landmarks
    }

    pub fn hull(&self) -> &ConvexHull {
        &self.hull
    }

    pub fn topology(&self) -> &Triangulation {
        &self.topology
    }
}

/// Result of one swap application.
#[derive(Debug, Clone)]
pub enum SwapOutcome {
    /// Every detected face was replaced; holds the final image.
    Swapped(RgbImage),
    /// The face list was empty. Distinct from success so callers can
    /// report "no face found" instead of inferring it from side effects.
    NoFaces,
}

/// Applies one prepared source face to destination images, face by face.
#[derive(Debug, Clone)]
pub struct FaceSwapper {
    source: SourceFace,
}

impl FaceSwapper {
    pub fn new(source: SourceFace) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &SourceFace {
        &self.source
    }

    /// Swap the source face onto every detected face, in detector order.
    ///
    /// The faces fold over one running image: each face's warped canvas
    /// replaces the face region of the output-so-far, and the combined
    /// patch is seamlessly cloned back into it. Later faces may retouch
    /// an earlier face's blend boundary; that ordering is part of the
    /// contract. Fails without partial output if a face's landmarks fall
    /// outside the destination image.
    pub fn apply(&self, dest: &RgbImage, faces: &[DetectedFace]) -> crate::Result<SwapOutcome> {
        if faces.is_empty() {
            return Ok(SwapOutcome::NoFaces);
        }

        let mut running = dest.clone();
        for (index, face) in faces.iter().enumerate() {
            debug!("swapping face {} of {}", index + 1, faces.len());

            let canvas = warp::reconstruct_face(
                self.source.topology(),
                self.source.image(),
                self.source.landmarks(),
                &face.landmarks,
                running.width(),
                running.height(),
            )?;

            let hull = face.landmarks.convex_hull();
            let mask = blend::hull_mask(&hull, running.width(), running.height());
            let patch = blend::composite_face(&running, &canvas, &mask);
            let center = hull.bounding_rect().center();
            running = blend::seamless_clone(&patch, &running, &mask, center);
        }

        Ok(SwapOutcome::Swapped(running))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::types::{Point, LANDMARK_COUNT};
    use image::Rgb;

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

    fn swapper(color: Rgb<u8>) -> FaceSwapper {
        let image = RgbImage::from_pixel(200, 200, color);
        let landmarks = Landmarks::new(oval_points(100.0, 100.0, 55.0, 70.0)).unwrap();
        FaceSwapper::new(SourceFace::new(image, landmarks).unwrap())
    }

    #[test]
    fn empty_face_list_is_a_distinct_outcome() {
        let swapper = swapper(Rgb([120, 90, 60]));
        let dest = RgbImage::from_pixel(100, 100, Rgb([20, 20, 20]));

        match swapper.apply(&dest, &[]).unwrap() {
            SwapOutcome::NoFaces => {}
            SwapOutcome::Swapped(_) => panic!("empty input must not report a swap"),
        }
    }

    #[test]
    fn construction_rejects_unusable_landmarks() {
        let image = RgbImage::new(100, 100);
        let collinear: Vec<Point> = (0..LANDMARK_COUNT)
            .map(|i| Point::new(i as f32, i as f32))
            .collect();
        let landmarks = Landmarks::new(collinear).unwrap();

        match SourceFace::new(image, landmarks) {
            Err(Error::EmptyTopology) => {}
            other => panic!("expected EmptyTopology, got {:?}", other),
        }
    }

    #[test]
    fn out_of_bounds_face_aborts_without_output() {
        let swapper = swapper(Rgb([120, 90, 60]));
        let dest = RgbImage::from_pixel(100, 100, Rgb([20, 20, 20]));

        // Landmarks extend past the 100x100 destination.
        let face = DetectedFace::from_landmarks(
            Landmarks::new(oval_points(90.0, 90.0, 40.0, 40.0)).unwrap(),
        );
        match swapper.apply(&dest, &[face]) {
            Err(Error::LandmarkOutOfBounds { .. }) => {}
            other => panic!("expected LandmarkOutOfBounds, got {:?}", other),
        }
    }

    #[test]
    fn swap_leaves_pixels_outside_the_hull_untouched() {
        let swapper = swapper(Rgb([200, 140, 90]));
        let dest = RgbImage::from_pixel(160, 160, Rgb([25, 35, 45]));

        let landmarks = Landmarks::new(oval_points(80.0, 80.0, 35.0, 45.0)).unwrap();
        let face = DetectedFace::from_landmarks(landmarks.clone());

        let SwapOutcome::Swapped(result) = swapper.apply(&dest, &[face]).unwrap() else {
            panic!("expected a swapped image");
        };

        let mask = blend::hull_mask(&landmarks.convex_hull(), dest.width(), dest.height());
        for (x, y, pixel) in result.enumerate_pixels() {
            if mask.get_pixel(x, y)[0] == 0 {
                assert_eq!(
                    pixel,
                    dest.get_pixel(x, y),
                    "pixel ({}, {}) outside the face was modified",
                    x,
                    y
                );
            }
        }
    }

    #[test]
    fn repeated_applies_are_independent() {
        let swapper = swapper(Rgb([180, 40, 40]));
        let dest = RgbImage::from_pixel(160, 160, Rgb([15, 15, 15]));
        let face = DetectedFace::from_landmarks(
            Landmarks::new(oval_points(80.0, 80.0, 35.0, 45.0)).unwrap(),
        );

        let SwapOutcome::Swapped(first) = swapper.apply(&dest, std::slice::from_ref(&face)).unwrap()
        else {
            panic!("expected a swapped image");
        };
        let SwapOutcome::Swapped(second) =
            swapper.apply(&dest, std::slice::from_ref(&face)).unwrap()
        else {
            panic!("expected a swapped image");
        };

        assert_eq!(first.as_raw(), second.as_raw());
    }
}
