use log::{debug, warn};

use crate::delaunay;
use crate::error::Error;
use crate::types::{Landmarks, Point, LANDMARK_COUNT};

/// A face mesh as an ordered list of landmark index triples.
///
/// The topology is pure connectivity: triples reference positions in the
/// 68-point scheme rather than coordinates, so a mesh built from one face
/// applies unchanged to any other landmark set of the same scheme. That is
/// what makes cross-face warping work, since triangle (i, j, k) on the
/// source corresponds to triangle (i, j, k) on the destination.
///
/// Invariants: at least one triangle, every index below [`LANDMARK_COUNT`],
/// and the three indices of each triangle distinct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Triangulation {
    triangles: Vec<[usize; 3]>,
}

impl Triangulation {
    /// Build the mesh for a landmark set.
    ///
    /// The landmarks are Delaunay-triangulated inside the bounding rect of
    /// their convex hull, then every triangle vertex is mapped back to its
    /// landmark index by exact coordinate match, scanning in index order so
    /// the lowest index wins if landmarks share a coordinate. A triangle
    /// with a vertex matching no landmark is skipped with a warning rather
    /// than attributed to an arbitrary index.
    pub fn from_landmarks(landmarks: &Landmarks) -> crate::Result<Self> {
        let domain = landmarks.convex_hull().bounding_rect();
        let corners = delaunay::triangulate(domain, landmarks.points());
        let total = corners.len();

        let mut triangles = Vec::with_capacity(total);
        let mut skipped = 0usize;
        for triangle in corners {
            match resolve(landmarks, &triangle) {
                Some(triple) => triangles.push(triple),
                None => {
                    skipped += 1;
                    warn!(
                        "skipping triangle {:?}: vertex matches no landmark",
                        triangle
                    );
                }
            }
        }
        if skipped > 0 {
            debug!("resolved {} of {} triangles", triangles.len(), total);
        }

        if triangles.is_empty() {
            return Err(Error::EmptyTopology);
        }
        Ok(Self { triangles })
    }

    /// Build a topology from explicit index triples, validating the
    /// invariants above.
    pub fn from_triples(triples: Vec<[usize; 3]>) -> crate::Result<Self> {
        if triples.is_empty() {
            return Err(Error::EmptyTopology);
        }
        for &[a, b, c] in &triples {
            for index in [a, b, c] {
                if index >= LANDMARK_COUNT {
                    return Err(Error::TriangleIndexOutOfRange {
                        index,
                        count: LANDMARK_COUNT,
                    });
                }
            }
            if a == b || b == c || a == c {
                return Err(Error::RepeatedTriangleIndex { a, b, c });
            }
        }
        Ok(Self { triangles: triples })
    }

    pub fn triangles(&self) -> &[[usize; 3]] {
        &self.triangles
    }

    /// Number of triangles, always at least one.
    pub fn len(&self) -> usize {
        self.triangles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }
}

/// First landmark whose coordinates equal `vertex` exactly.
fn index_of(landmarks: &Landmarks, vertex: Point) -> Option<usize> {
    landmarks
        .iter()
        .position(|p| p.x == vertex.x && p.y == vertex.y)
}

fn resolve(landmarks: &Landmarks, corners: &[Point; 3]) -> Option<[usize; 3]> {
    Some([
        index_of(landmarks, corners[0])?,
        index_of(landmarks, corners[1])?,
        index_of(landmarks, corners[2])?,
    ])
}
