//! The landmark detection boundary.
//!
//! Detection itself is outside this crate; what the pipeline needs is a
//! service that, given an image, says which faces it contains and where
//! their 68 landmarks sit. The trait keeps that boundary explicit and
//! injectable: detectors are constructed and passed around, never
//! reached through global state.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::types::{DetectedFace, Landmarks};

/// Finds faces and their landmarks in an image.
///
/// An empty list means the image contains no detectable face and is a
/// normal outcome, never an error. Errors are reserved for detection
/// itself failing (unreadable or malformed landmark data).
pub trait LandmarkDetector {
    fn detect(&self, image_path: &Path) -> crate::Result<Vec<DetectedFace>>;
}

/// Detector that reads landmarks from a JSON sidecar next to the image:
/// `portrait.png` is annotated by `portrait.png.landmarks.json` holding an
/// array of faces, each an array of 68 `{"x", "y"}` points.
///
/// The landmark count is validated during parsing; each face's rectangle
/// is derived from its landmark extent.
#[derive(Debug, Clone, Copy, Default)]
pub struct SidecarDetector;

impl SidecarDetector {
    pub fn new() -> Self {
        Self
    }

    /// Sidecar file annotating `image_path`.
    pub fn sidecar_path(image_path: &Path) -> PathBuf {
        let mut name = image_path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".landmarks.json");
        image_path.with_file_name(name)
    }
}

impl LandmarkDetector for SidecarDetector {
    fn detect(&self, image_path: &Path) -> crate::Result<Vec<DetectedFace>> {
        let sidecar = Self::sidecar_path(image_path);
        if !sidecar.exists() {
            warn!(
                "no landmark sidecar at {}, treating image as faceless",
                sidecar.display()
            );
            return Ok(Vec::new());
        }

        let data = fs::read_to_string(&sidecar)?;
        let faces: Vec<Landmarks> = serde_json::from_str(&data)?;
        debug!("{} face(s) in {}", faces.len(), sidecar.display());
        Ok(faces.into_iter().map(DetectedFace::from_landmarks).collect())
    }
}

/// Parse landmark faces from raw sidecar JSON. Used by callers that take a
/// landmarks file directly instead of pairing it with an image path.
pub fn faces_from_json(data: &str) -> crate::Result<Vec<DetectedFace>> {
    let faces: Vec<Landmarks> = serde_json::from_str(data)?;
    Ok(faces.into_iter().map(DetectedFace::from_landmarks).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Point, LANDMARK_COUNT};

    fn ring_json(count: usize) -> String {
        let points: Vec<Point> = (0..count)
            .map(|i| {
                let angle = i as f32 / count as f32 * std::f32::consts::TAU;
                Point::new(60.0 + 30.0 * angle.cos(), 60.0 + 30.0 * angle.sin())
            })
            .collect();
        serde_json::to_string(&vec![points]).unwrap()
    }

    /// Scratch directory unique to one test.
    fn scratch_dir(label: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "face-graft-test-{}-{}",
            label,
            std::process::id()
        ));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn sidecar_path_appends_suffix() {
        let path = SidecarDetector::sidecar_path(Path::new("/photos/portrait.png"));
        assert_eq!(
            path,
            Path::new("/photos/portrait.png.landmarks.json")
        );
    }

    #[test]
    fn missing_sidecar_means_no_faces() {
        let dir = scratch_dir("missing");
        let faces = SidecarDetector::new()
            .detect(&dir.join("unannotated.png"))
            .unwrap();
        assert!(faces.is_empty());
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn sidecar_faces_are_loaded_and_validated() {
        let dir = scratch_dir("valid");
        let image = dir.join("face.png");
        fs::write(SidecarDetector::sidecar_path(&image), ring_json(LANDMARK_COUNT)).unwrap();

        let faces = SidecarDetector::new().detect(&image).unwrap();
        assert_eq!(faces.len(), 1);
        for p in faces[0].landmarks.iter() {
            assert!(faces[0].rect.contains(*p));
        }
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn wrong_landmark_count_is_an_error() {
        let dir = scratch_dir("short");
        let image = dir.join("face.png");
        fs::write(SidecarDetector::sidecar_path(&image), ring_json(40)).unwrap();

        assert!(SidecarDetector::new().detect(&image).is_err());
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn faces_parse_from_raw_json() {
        let faces = faces_from_json(&ring_json(LANDMARK_COUNT)).unwrap();
        assert_eq!(faces.len(), 1);
        assert!(faces_from_json("[[{\"x\": 1.0, \"y\": 2.0}]]").is_err());
    }
}
