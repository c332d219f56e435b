//! # face-graft
//!
//! Face-to-face texture transfer: graft one annotated source face onto
//! every face found in a destination image.
//!
//! This crate provides:
//! - **Mesh Construction**: Delaunay triangulation over 68-point landmark sets
//! - **Texture Warping**: per-triangle affine reconstruction of the source
//!   face at the destination geometry
//! - **Seamless Blending**: Poisson compositing that carries the
//!   destination's lighting and skin tone across the paste boundary
//! - **Multi-Face Swaps**: sequential application to every detected face
//!
//! Landmarks follow the iBUG 68-point annotation scheme, so any detector
//! emitting that layout (dlib and friends) plugs in directly.
//!
//! ## Pipeline Overview
//!
//! 1. Triangulate the source landmarks once; the mesh is stored as index
//!    triples, so the same topology applies to any other 68-point set
//! 2. For each destination face, map every source triangle onto the
//!    corresponding destination triangle with its own affine transform
//! 3. Composite the warped texture over the destination image, hard-masked
//!    to the face's convex hull
//! 4. Seamlessly clone the composite back onto the destination so the seam
//!    disappears
//!
//! ## Quick Start
//!
//! ```rust
//! use face_graft::{DetectedFace, FaceSwapper, Landmarks, Point, SourceFace, SwapOutcome};
//! use image::{Rgb, RgbImage};
//!
//! // 68 points on an oval stand in for real detector output.
//! let ring = |cx: f32, cy: f32, rx: f32, ry: f32| {
//!     let points = (0..68)
//!         .map(|i| {
//!             let t = i as f32 / 68.0 * std::f32::consts::TAU;
//!             Point::new((cx + rx * t.cos()).round(), (cy + ry * t.sin()).round())
//!         })
//!         .collect();
//!     Landmarks::new(points).unwrap()
//! };
//!
//! // Prepare the source face once; it is reusable across swaps.
//! let source = RgbImage::from_pixel(100, 100, Rgb([180, 140, 120]));
//! let swapper = FaceSwapper::new(
//!     SourceFace::new(source, ring(50.0, 50.0, 25.0, 30.0)).unwrap(),
//! );
//!
//! // Swap it onto one face in the destination.
//! let dest = RgbImage::from_pixel(120, 120, Rgb([40, 60, 90]));
//! let faces = vec![DetectedFace::from_landmarks(ring(60.0, 60.0, 25.0, 30.0))];
//! match swapper.apply(&dest, &faces).unwrap() {
//!     SwapOutcome::Swapped(output) => assert_eq!(output.dimensions(), (120, 120)),
//!     SwapOutcome::NoFaces => unreachable!(),
//! }
//! ```
//!
//! ## Landmark Input
//!
//! Landmark detection itself is outside this crate. Implement
//! [`LandmarkDetector`] for whatever detector you run, or use the bundled
//! [`SidecarDetector`] to read pre-computed landmarks from a JSON file
//! stored next to the image.

mod blend;
mod delaunay;
mod detector;
mod error;
mod swap;
mod task;
mod triangulation;
mod types;
mod warp;

pub use blend::{composite_face, hull_mask, seamless_clone};
pub use delaunay::triangulate;
pub use detector::{faces_from_json, LandmarkDetector, SidecarDetector};
pub use error::{Error, Result};
pub use swap::{FaceSwapper, SourceFace, SwapOutcome};
pub use task::{TaskSlot, TaskState};
pub use triangulation::Triangulation;
pub use types::{BoundingRect, ConvexHull, DetectedFace, Landmarks, Point, LANDMARK_COUNT};
pub use warp::reconstruct_face;
