//! Stage 5: polyline simplification, corner classification, and curve fitting.
//!
//! Each traced `Boundary` is simplified with Douglas-Peucker, then every
//! surviving vertex is classified as a sharp corner or a smooth point by its
//! turning angle. Corners become straight `LineTo` segments; smooth vertices
//! become the control point of a quadratic Bezier whose on-curve endpoint is
//! the midpoint toward the next vertex — the usual way a polygon gets
//! rounded into a font-style quadratic contour without ever naming the
//! original vertex as an on-curve point.

use crate::config::VectorizeConfig;
use crate::types::{Boundary, FittedRegion, Palette, Path, PathSegment, Point, Region};

fn perpendicular_distance_sq(p: Point, a: Point, b: Point) -> f64 {
    let (ax, ay, bx, by, px, py) =
        (a.x as f64, a.y as f64, b.x as f64, b.y as f64, p.x as f64, p.y as f64);
    let dx = bx - ax;
    let dy = by - ay;
    let len_sq = dx * dx + dy * dy;
    if len_sq < 1e-12 {
        return (px - ax).powi(2) + (py - ay).powi(2);
    }
    let cross = dy * px - dx * py + bx * ay - by * ax;
    (cross * cross) / len_sq
}

fn simplify_recursive(points: &[Point], start: usize, end: usize, tolerance_sq: f64, keep: &mut [bool]) {
    if end <= start + 1 {
        return;
    }
    let mut max_dist_sq = 0.0f64;
    let mut max_idx = start;
    for i in (start + 1)..end {
        let d = perpendicular_distance_sq(points[i], points[start], points[end]);
        if d > max_dist_sq {
            max_dist_sq = d;
            max_idx = i;
        }
    }
    if max_dist_sq > tolerance_sq {
        keep[max_idx] = true;
        simplify_recursive(points, start, max_idx, tolerance_sq, keep);
        simplify_recursive(points, max_idx, end, tolerance_sq, keep);
    }
}

/// Simplifies a closed polyline by opening it at its first point, running
/// standard Douglas-Peucker with both ends pinned, and dropping the
/// duplicated closing point.
fn douglas_peucker_closed(points: &[Point], tolerance: f64) -> Vec<Point> {
    if points.len() < 3 {
        return points.to_vec();
    }
    let mut open = points.to_vec();
    open.push(points[0]);
    let last = open.len() - 1;

    let mut keep = vec![false; open.len()];
    keep[0] = true;
    keep[last] = true;
    simplify_recursive(&open, 0, last, tolerance * tolerance, &mut keep);

    let mut result: Vec<Point> = open
        .iter()
        .zip(keep.iter())
        .filter(|&(_, &k)| k)
        .map(|(&p, _)| p)
        .collect();
    result.pop();
    result
}

fn turning_angle_deg(prev: Point, cur: Point, next: Point) -> f32 {
    let v1 = (cur.x - prev.x, cur.y - prev.y);
    let v2 = (next.x - cur.x, next.y - cur.y);
    let len1 = (v1.0 * v1.0 + v1.1 * v1.1).sqrt();
    let len2 = (v2.0 * v2.0 + v2.1 * v2.1).sqrt();
    if len1 < 1e-6 || len2 < 1e-6 {
        return 0.0;
    }
    let dot = ((v1.0 * v2.0 + v1.1 * v2.1) / (len1 * len2)).clamp(-1.0, 1.0);
    dot.acos().to_degrees()
}

fn detect_corners(vertices: &[Point], threshold_deg: f32) -> Vec<bool> {
    let n = vertices.len();
    (0..n)
        .map(|i| {
            let prev = vertices[(i + n - 1) % n];
            let cur = vertices[i];
            let next = vertices[(i + 1) % n];
            turning_angle_deg(prev, cur, next) >= threshold_deg
        })
        .collect()
}

/// Builds the closed `Path`: corners land exactly on their vertex, smooth
/// vertices are consumed as a quadratic control point with the on-curve
/// endpoint at the midpoint toward the next vertex.
fn build_path(vertices: &[Point], corners: &[bool]) -> Path {
    let n = vertices.len();
    let last = n - 1;
    let start = if corners[last] { vertices[last] } else { vertices[last].midpoint(vertices[0]) };

    let mut segments = Vec::with_capacity(n);
    for i in 0..n {
        if corners[i] {
            segments.push(PathSegment::LineTo(vertices[i]));
        } else {
            let next = vertices[(i + 1) % n];
            segments.push(PathSegment::QuadTo {
                control: vertices[i],
                to: vertices[i].midpoint(next),
            });
        }
    }
    Path { start, segments }
}

/// Simplifies and curve-fits one traced boundary.
pub fn fit_boundary(boundary: &Boundary, config: &VectorizeConfig) -> Path {
    let points: Vec<Point> = boundary.points.iter().map(|g| g.to_point()).collect();
    let simplified = douglas_peucker_closed(&points, config.simplify_tolerance);
    let vertices = if simplified.len() >= 3 { simplified } else { points };
    let corners = detect_corners(&vertices, config.corner_angle_threshold);
    build_path(&vertices, &corners)
}

/// Simplifies and curve-fits an entire region (outer boundary plus holes),
/// resolving its fill color from the palette.
pub fn fit_region(region: &Region, config: &VectorizeConfig, palette: &Palette) -> FittedRegion {
    let outer = fit_boundary(&region.outer, config);
    let holes = region.holes.iter().map(|h| fit_boundary(h, config)).collect();
    let fill_rgb = palette.colors[region.palette_index].rgb;
    FittedRegion {
        palette_index: region.palette_index,
        pixel_count: region.pixel_count,
        fill_rgb,
        outer,
        holes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GridPoint;

    fn square_boundary() -> Boundary {
        Boundary {
            points: vec![
                GridPoint::new(0, 0),
                GridPoint::new(4, 0),
                GridPoint::new(4, 4),
                GridPoint::new(0, 4),
            ],
        }
    }

    #[test]
    fn right_angle_square_is_all_corners() {
        let config = VectorizeConfig { simplify_tolerance: 0.1, corner_angle_threshold: 45.0, ..VectorizeConfig::default() };
        let path = fit_boundary(&square_boundary(), &config);
        assert!(path.segments.iter().all(|s| matches!(s, PathSegment::LineTo(_))));
        assert_eq!(path.segments.len(), 4);
    }

    #[test]
    fn collinear_points_are_simplified_away() {
        let boundary = Boundary {
            points: vec![
                GridPoint::new(0, 0),
                GridPoint::new(2, 0),
                GridPoint::new(4, 0),
                GridPoint::new(4, 4),
                GridPoint::new(0, 4),
            ],
        };
        let config = VectorizeConfig { simplify_tolerance: 0.5, corner_angle_threshold: 45.0, ..VectorizeConfig::default() };
        let path = fit_boundary(&boundary, &config);
        // The extra midpoint (2,0) on a straight edge should vanish.
        assert_eq!(path.segments.len(), 4);
    }

    #[test]
    fn high_corner_threshold_smooths_every_vertex() {
        let config = VectorizeConfig { simplify_tolerance: 0.1, corner_angle_threshold: 179.0, ..VectorizeConfig::default() };
        let path = fit_boundary(&square_boundary(), &config);
        assert!(path.segments.iter().all(|s| matches!(s, PathSegment::QuadTo { .. })));
    }

    #[test]
    fn path_closes_back_to_its_start() {
        let config = VectorizeConfig::default();
        let path = fit_boundary(&square_boundary(), &config);
        let end = match *path.segments.last().unwrap() {
            PathSegment::LineTo(p) => p,
            PathSegment::QuadTo { to, .. } => to,
        };
        assert!((end.x - path.start.x).abs() < 1e-4);
        assert!((end.y - path.start.y).abs() < 1e-4);
    }
}
