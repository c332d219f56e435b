use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Number of landmarks in the standard annotation scheme (iBUG 68).
pub const LANDMARK_COUNT: usize = 68;

/// A 2D point with floating-point coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub const fn zero() -> Self {
        Self { x: 0.0, y: 0.0 }
    }

    pub fn distance(&self, other: &Point) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

impl std::ops::Add for Point {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
        }
    }
}

impl std::ops::AddAssign for Point {
    fn add_assign(&mut self, rhs: Self) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl std::ops::Sub for Point {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
        }
    }
}

impl std::ops::Mul<f32> for Point {
    type Output = Self;

    fn mul(self, rhs: f32) -> Self::Output {
        Self {
            x: self.x * rhs,
            y: self.y * rhs,
        }
    }
}

/// An axis-aligned rectangle with integer pixel coordinates.
///
/// `from_points` snaps outward: the left/top edge is the floor of the
/// minimum coordinate and width/height extend one past the ceiling of the
/// maximum, so every input point lies inside the rect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl BoundingRect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Smallest integer rect enclosing all points. Zero-sized at the origin
    /// for an empty slice.
    pub fn from_points(points: &[Point]) -> Self {
        let Some(first) = points.first() else {
            return Self::new(0, 0, 0, 0);
        };

        let mut min_x = first.x;
        let mut min_y = first.y;
        let mut max_x = first.x;
        let mut max_y = first.y;
        for p in &points[1..] {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }

        let x = min_x.floor() as i32;
        let y = min_y.floor() as i32;
        Self {
            x,
            y,
            width: max_x.ceil() as i32 - x + 1,
            height: max_y.ceil() as i32 - y + 1,
        }
    }

    /// One past the rightmost column.
    pub const fn right(&self) -> i32 {
        self.x + self.width
    }

    /// One past the bottommost row.
    pub const fn bottom(&self) -> i32 {
        self.y + self.height
    }

    /// Integer center computed with truncating division.
    pub const fn center(&self) -> (i32, i32) {
        (
            (2 * self.x + self.width) / 2,
            (2 * self.y + self.height) / 2,
        )
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x as f32
            && p.y >= self.y as f32
            && p.x < self.right() as f32
            && p.y < self.bottom() as f32
    }

    /// Overlapping region of two rects, or `None` if they are disjoint.
    pub fn intersect(&self, other: &BoundingRect) -> Option<BoundingRect> {
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = self.right().min(other.right());
        let y1 = self.bottom().min(other.bottom());
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some(BoundingRect::new(x0, y0, x1 - x0, y1 - y0))
    }
}

/// An ordered set of 68 facial landmarks following the iBUG annotation
/// scheme: jaw 0-16, brows 17-26, nose 27-35, eyes 36-47, mouth 48-67.
/// Left and right name the subject's sides, not the viewer's, so in an
/// upright portrait the right brow and eye sit on the image's left.
///
/// The count is enforced at construction and during deserialization, so a
/// value of this type always holds exactly [`LANDMARK_COUNT`] points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Point>", into = "Vec<Point>")]
pub struct Landmarks {
    points: Vec<Point>,
}

impl Landmarks {
    pub fn new(points: Vec<Point>) -> crate::Result<Self> {
        if points.len() != LANDMARK_COUNT {
            return Err(Error::LandmarkCount {
                expected: LANDMARK_COUNT,
                actual: points.len(),
            });
        }
        Ok(Self { points })
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Point> {
        self.points.iter()
    }

    /// Convex hull of all 68 points.
    pub fn convex_hull(&self) -> ConvexHull {
        ConvexHull::of_points(&self.points)
    }

    /// Axis-aligned pixel rectangle covering all 68 points.
    pub fn bounding_rect(&self) -> BoundingRect {
        BoundingRect::from_points(&self.points)
    }

    /// Jawline, ear to ear (points 0-16).
    pub fn jaw(&self) -> &[Point] {
        &self.points[0..=16]
    }

    /// Right eyebrow (points 17-21).
    pub fn right_brow(&self) -> &[Point] {
        &self.points[17..=21]
    }

    /// Left eyebrow (points 22-26).
    pub fn left_brow(&self) -> &[Point] {
        &self.points[22..=26]
    }

    /// Nose bridge and nostrils (points 27-35).
    pub fn nose(&self) -> &[Point] {
        &self.points[27..=35]
    }

    /// Right eye loop (points 36-41).
    pub fn right_eye(&self) -> &[Point] {
        &self.points[36..=41]
    }

    /// Left eye loop (points 42-47).
    pub fn left_eye(&self) -> &[Point] {
        &self.points[42..=47]
    }

    /// Outer and inner lip loops (points 48-67).
    pub fn mouth(&self) -> &[Point] {
        &self.points[48..=67]
    }
}

impl std::ops::Index<usize> for Landmarks {
    type Output = Point;

    fn index(&self, idx: usize) -> &Self::Output {
        &self.points[idx]
    }
}

impl TryFrom<Vec<Point>> for Landmarks {
    type Error = Error;

    fn try_from(points: Vec<Point>) -> crate::Result<Self> {
        Self::new(points)
    }
}

impl From<Landmarks> for Vec<Point> {
    fn from(landmarks: Landmarks) -> Self {
        landmarks.points
    }
}

/// Cross product of (a - o) and (b - o). Positive for a counter-clockwise
/// turn with the y axis pointing up.
fn cross(o: Point, a: Point, b: Point) -> f32 {
    (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
}

/// A convex polygon stored as vertices in hull order.
///
/// Built with Andrew's monotone chain; collinear points along an edge are
/// dropped, so consecutive vertices always make a strict turn. Fewer than
/// three distinct input points yield a degenerate hull that contains
/// nothing and has zero area.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvexHull {
    vertices: Vec<Point>,
}

impl ConvexHull {
    pub fn of_points(points: &[Point]) -> Self {
        let mut pts = points.to_vec();
        pts.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
        pts.dedup_by(|a, b| a.x == b.x && a.y == b.y);

        if pts.len() < 3 {
            return Self { vertices: pts };
        }

        let mut lower: Vec<Point> = Vec::new();
        for &p in &pts {
            while lower.len() >= 2
                && cross(lower[lower.len() - 2], lower[lower.len() - 1], p) <= 0.0
            {
                lower.pop();
            }
            lower.push(p);
        }

        let mut upper: Vec<Point> = Vec::new();
        for &p in pts.iter().rev() {
            while upper.len() >= 2
                && cross(upper[upper.len() - 2], upper[upper.len() - 1], p) <= 0.0
            {
                upper.pop();
            }
            upper.push(p);
        }

        // The last point of each chain is the first point of the other.
        lower.pop();
        upper.pop();
        lower.extend(upper);
        Self { vertices: lower }
    }

    pub fn vertices(&self) -> &[Point] {
        &self.vertices
    }

    /// Enclosed area in square pixels (shoelace formula).
    pub fn area(&self) -> f32 {
        if self.vertices.len() < 3 {
            return 0.0;
        }

        let mut area = 0.0;
        let n = self.vertices.len();
        for i in 0..n {
            let j = (i + 1) % n;
            area += self.vertices[i].x * self.vertices[j].y;
            area -= self.vertices[j].x * self.vertices[i].y;
        }
        (area / 2.0).abs()
    }

    /// True if `p` lies inside the hull or on its boundary.
    pub fn contains(&self, p: Point) -> bool {
        if self.vertices.len() < 3 {
            return false;
        }

        let mut positive = false;
        let mut negative = false;
        let n = self.vertices.len();
        for i in 0..n {
            let side = cross(self.vertices[i], self.vertices[(i + 1) % n], p);
            if side > 0.0 {
                positive = true;
            } else if side < 0.0 {
                negative = true;
            }
            if positive && negative {
                return false;
            }
        }
        true
    }

    pub fn bounding_rect(&self) -> BoundingRect {
        BoundingRect::from_points(&self.vertices)
    }
}

/// One face found in a destination image: the detector's rough rect plus
/// the fitted landmarks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedFace {
    pub rect: BoundingRect,
    pub landmarks: Landmarks,
}

impl DetectedFace {
    /// Build a face whose rect is the landmark extent. Useful when the
    /// landmark source carries no detector rect of its own.
    pub fn from_landmarks(landmarks: Landmarks) -> Self {
        let rect = landmarks.bounding_rect();
        Self { rect, landmarks }
    }
}
