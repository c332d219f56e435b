//! Plane subdivision for landmark meshes.
//!
//! Incremental Bowyer-Watson Delaunay triangulation over a rectangular
//! domain. Duplicate sites are merged on insertion and triangles come back
//! as coordinate triples carrying the exact inserted values, so callers can
//! map every vertex to its originating site by coordinate equality.

use crate::types::{BoundingRect, Point};

/// Triangulate `sites` inside `domain`.
///
/// Every site must lie within the domain rect. Fewer than three distinct
/// sites yield an empty list. Triangles touching the synthetic outer
/// vertices are dropped, so the result covers exactly the convex hull of
/// the sites.
pub fn triangulate(domain: BoundingRect, sites: &[Point]) -> Vec<[Point; 3]> {
    debug_assert!(sites.iter().all(|p| domain.contains(*p)));

    // Exact duplicates collapse onto the first occurrence.
    let mut unique: Vec<Point> = Vec::with_capacity(sites.len());
    for &p in sites {
        if !unique.iter().any(|q| q.x == p.x && q.y == p.y) {
            unique.push(p);
        }
    }
    if unique.len() < 3 {
        return Vec::new();
    }

    // All predicate math runs in f64; the f32 inputs are only echoed back
    // in the output.
    let mut coords: Vec<(f64, f64)> = unique
        .iter()
        .map(|p| (f64::from(p.x), f64::from(p.y)))
        .collect();
    let site_count = coords.len();

    // A triangle comfortably enclosing the whole domain seeds the
    // incremental insertion.
    let span = f64::from(domain.width.max(domain.height).max(1));
    let mid_x = f64::from(domain.x) + f64::from(domain.width) / 2.0;
    let mid_y = f64::from(domain.y) + f64::from(domain.height) / 2.0;
    coords.push((mid_x - 20.0 * span, mid_y - span));
    coords.push((mid_x, mid_y + 20.0 * span));
    coords.push((mid_x + 20.0 * span, mid_y - span));

    let mut triangles: Vec<[usize; 3]> = Vec::new();
    push_ccw(&mut triangles, &coords, site_count, site_count + 1, site_count + 2);

    for site in 0..site_count {
        let p = coords[site];

        let bad: Vec<usize> = (0..triangles.len())
            .filter(|&t| {
                let [a, b, c] = triangles[t];
                in_circumcircle(coords[a], coords[b], coords[c], p)
            })
            .collect();

        // Edges owned by exactly one invalidated triangle form the cavity
        // boundary.
        let mut boundary: Vec<(usize, usize)> = Vec::new();
        for &t in &bad {
            let [a, b, c] = triangles[t];
            for edge in [(a, b), (b, c), (c, a)] {
                let shared = bad
                    .iter()
                    .any(|&other| other != t && has_edge(triangles[other], edge));
                if !shared {
                    boundary.push(edge);
                }
            }
        }

        for &t in bad.iter().rev() {
            triangles.swap_remove(t);
        }
        for (a, b) in boundary {
            push_ccw(&mut triangles, &coords, a, b, site);
        }
    }

    triangles
        .into_iter()
        .filter(|t| t.iter().all(|&v| v < site_count))
        .map(|[a, b, c]| [unique[a], unique[b], unique[c]])
        .collect()
}

fn push_ccw(triangles: &mut Vec<[usize; 3]>, coords: &[(f64, f64)], a: usize, b: usize, c: usize) {
    if orient(coords[a], coords[b], coords[c]) < 0.0 {
        triangles.push([a, c, b]);
    } else {
        triangles.push([a, b, c]);
    }
}

/// Twice the signed area of triangle (a, b, c).
fn orient(a: (f64, f64), b: (f64, f64), c: (f64, f64)) -> f64 {
    (b.0 - a.0) * (c.1 - a.1) - (b.1 - a.1) * (c.0 - a.0)
}

/// Strict in-circle test for a counter-clockwise triangle (a, b, c).
fn in_circumcircle(a: (f64, f64), b: (f64, f64), c: (f64, f64), p: (f64, f64)) -> bool {
    let ax = a.0 - p.0;
    let ay = a.1 - p.1;
    let bx = b.0 - p.0;
    let by = b.1 - p.1;
    let cx = c.0 - p.0;
    let cy = c.1 - p.1;

    let det = (ax * ax + ay * ay) * (bx * cy - cx * by)
        - (bx * bx + by * by) * (ax * cy - cx * ay)
        + (cx * cx + cy * cy) * (ax * by - bx * ay);
    det > 0.0
}

fn has_edge(triangle: [usize; 3], edge: (usize, usize)) -> bool {
    let [a, b, c] = triangle;
    for candidate in [(a, b), (b, c), (c, a)] {
        if candidate == edge || (candidate.1, candidate.0) == edge {
            return true;
        }
    }
    false
}
