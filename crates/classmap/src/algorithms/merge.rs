use std::cmp::Ordering;

use geo::algorithm::line_intersection::{line_intersection, LineIntersection};
use geo::algorithm::orient::{Direction, Orient};
use geo::{Area, BooleanOps};
use geo_types::{Coord, Line, LineString, MultiPolygon, Polygon};
use tracing::{debug, warn};

use crate::{error::TraceError, traits::PolygonMerger};

/// Exact boolean union of same-class fragments.
///
/// Degenerate inputs are dropped first. The remaining polygons are sorted
/// into a canonical order and unioned pairwise, so the result does not depend
/// on the order fragments arrive in.
#[derive(Debug, Clone)]
pub struct BooleanUnionMerger {
    /// Polygons with less area are degenerate
    pub epsilon: f64,
}

impl Default for BooleanUnionMerger {
    fn default() -> Self {
        Self { epsilon: 1e-12 }
    }
}

impl PolygonMerger for BooleanUnionMerger {
    fn merge(&self, polygons: Vec<Polygon<f64>>) -> Vec<Polygon<f64>> {
        let input = polygons.len();
        let mut valid: Vec<Polygon<f64>> = polygons
            .into_iter()
            .filter_map(|polygon| match validate_polygon(polygon, self.epsilon) {
                Ok(polygon) => Some(polygon),
                Err(error) => {
                    warn!(%error, "dropping polygon before merge");
                    None
                }
            })
            .map(canonicalize_polygon)
            .collect();
        valid.sort_by(compare_polygons);

        let merged = cascaded_union(valid);
        let output = canonicalize(merged);
        debug!(input, output = output.len(), "merged polygons");
        output
    }
}

/// Reject polygons that must never reach the clipper. Degenerate holes are
/// removed; a degenerate or self-intersecting exterior drops the polygon.
pub fn validate_polygon(polygon: Polygon<f64>, epsilon: f64) -> Result<Polygon<f64>, TraceError> {
    let (exterior, interiors) = polygon.into_inner();

    let vertices = distinct_vertices(&exterior);
    if vertices < 3 {
        return Err(TraceError::Degenerate { vertices });
    }
    if !exterior.coords().all(|c| c.x.is_finite() && c.y.is_finite()) {
        return Err(TraceError::Degenerate { vertices: 0 });
    }
    if is_self_intersecting(&exterior) {
        return Err(TraceError::SelfIntersecting);
    }

    let holes: Vec<LineString<f64>> = interiors
        .into_iter()
        .filter(|hole| {
            let keep = distinct_vertices(hole) >= 3
                && Polygon::new(hole.clone(), vec![]).unsigned_area() > epsilon
                && !is_self_intersecting(hole);
            if !keep {
                warn!(vertices = hole.0.len(), "dropping degenerate hole");
            }
            keep
        })
        .collect();

    let polygon = Polygon::new(exterior, holes);
    let area = polygon.unsigned_area();
    if area <= epsilon {
        return Err(TraceError::ZeroArea { area });
    }
    Ok(polygon)
}

fn distinct_vertices(ring: &LineString<f64>) -> usize {
    let mut coords: Vec<Coord<f64>> = ring.coords().copied().collect();
    coords.sort_by(compare_coords);
    coords.dedup();
    coords.len()
}

/// True if two non-adjacent edges of the ring cross or overlap. Edges that
/// only touch at a shared vertex are allowed, as traced rings pinch at
/// saddle vertices.
pub fn is_self_intersecting(ring: &LineString<f64>) -> bool {
    let mut segments: Vec<(usize, Line<f64>)> = ring
        .lines()
        .filter(|line| line.start != line.end)
        .enumerate()
        .collect();
    let count = segments.len();
    if count < 3 {
        return false;
    }

    let min_x = |line: &Line<f64>| line.start.x.min(line.end.x);
    let max_x = |line: &Line<f64>| line.start.x.max(line.end.x);
    segments.sort_by(|a, b| min_x(&a.1).total_cmp(&min_x(&b.1)));

    for (i, &(index_a, a)) in segments.iter().enumerate() {
        let a_max_x = max_x(&a);
        for &(index_b, b) in &segments[i + 1..] {
            if min_x(&b) > a_max_x {
                break;
            }
            let gap = index_a.abs_diff(index_b);
            if gap == 1 || gap == count - 1 {
                continue;
            }
            match line_intersection(a, b) {
                Some(LineIntersection::SinglePoint { is_proper: true, .. }) => return true,
                Some(LineIntersection::Collinear { intersection })
                    if intersection.start != intersection.end =>
                {
                    return true
                }
                _ => {}
            }
        }
    }
    false
}

fn cascaded_union(polygons: Vec<Polygon<f64>>) -> MultiPolygon<f64> {
    let mut parts: Vec<MultiPolygon<f64>> = polygons
        .into_iter()
        .map(|polygon| MultiPolygon::new(vec![polygon]))
        .collect();

    while parts.len() > 1 {
        let mut next = Vec::with_capacity(parts.len().div_ceil(2));
        let mut iter = parts.into_iter();
        while let Some(a) = iter.next() {
            match iter.next() {
                Some(b) => next.push(a.union(&b)),
                None => next.push(a),
            }
        }
        parts = next;
    }

    parts
        .into_iter()
        .next()
        .unwrap_or_else(|| MultiPolygon::new(Vec::new()))
}

/// Exterior counter-clockwise, holes clockwise, redundant vertices removed,
/// each ring starting at its smallest vertex, holes and polygons sorted.
pub fn canonicalize(merged: MultiPolygon<f64>) -> Vec<Polygon<f64>> {
    let mut polygons: Vec<Polygon<f64>> = merged
        .0
        .into_iter()
        .map(canonicalize_polygon)
        .filter(|polygon| polygon.exterior().0.len() >= 4)
        .collect();
    polygons.sort_by(compare_polygons);
    polygons
}

fn canonicalize_polygon(polygon: Polygon<f64>) -> Polygon<f64> {
    let (exterior, interiors) = polygon.orient(Direction::Default).into_inner();
    let mut holes: Vec<LineString<f64>> = interiors
        .into_iter()
        .map(canonical_ring)
        .filter(|hole| hole.0.len() >= 4)
        .collect();
    holes.sort_by(|a, b| compare_rings(a, b));
    Polygon::new(canonical_ring(exterior), holes)
}

fn canonical_ring(ring: LineString<f64>) -> LineString<f64> {
    let mut coords: Vec<Coord<f64>> = ring.0;
    if coords.len() > 1 && coords.first() == coords.last() {
        coords.pop();
    }
    coords.dedup();
    while coords.len() > 1 && coords.first() == coords.last() {
        coords.pop();
    }

    // Drop vertices lying on a straight run between their neighbours.
    let mut coords = coords.into_iter().fold(Vec::new(), |mut out: Vec<Coord<f64>>, c| {
        while out.len() >= 2 && is_collinear(out[out.len() - 2], out[out.len() - 1], c) {
            out.pop();
        }
        out.push(c);
        out
    });
    while coords.len() > 3 {
        let n = coords.len();
        if is_collinear(coords[n - 2], coords[n - 1], coords[0]) {
            coords.pop();
        } else if is_collinear(coords[n - 1], coords[0], coords[1]) {
            coords.remove(0);
        } else {
            break;
        }
    }

    if let Some(start) = (0..coords.len()).min_by(|&a, &b| compare_coords(&coords[a], &coords[b])) {
        coords.rotate_left(start);
    }
    if let Some(&first) = coords.first() {
        coords.push(first);
    }
    LineString::new(coords)
}

fn is_collinear(a: Coord<f64>, b: Coord<f64>, c: Coord<f64>) -> bool {
    let cross = (b.x - a.x) * (c.y - b.y) - (b.y - a.y) * (c.x - b.x);
    let dot = (b.x - a.x) * (c.x - b.x) + (b.y - a.y) * (c.y - b.y);
    cross == 0.0 && dot > 0.0
}

fn compare_coords(a: &Coord<f64>, b: &Coord<f64>) -> Ordering {
    a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y))
}

fn compare_rings(a: &LineString<f64>, b: &LineString<f64>) -> Ordering {
    for (ca, cb) in a.coords().zip(b.coords()) {
        let ordering = compare_coords(ca, cb);
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    a.0.len().cmp(&b.0.len())
}

fn compare_polygons(a: &Polygon<f64>, b: &Polygon<f64>) -> Ordering {
    compare_rings(a.exterior(), b.exterior())
        .then_with(|| a.interiors().len().cmp(&b.interiors().len()))
}
