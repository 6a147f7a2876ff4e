use std::collections::{HashMap, VecDeque};

use geo_types::{Coord, LineString, Polygon};
use tracing::{debug, warn};

use crate::{
    algorithms::mask::ClassMask,
    config::Connectivity,
    error::{Result, TraceError},
    traits::RegionVectorizer,
    types::GeoTransform,
};

/// Pixel-corner vertex `(col, row)`.
type Vertex = (i64, i64);

/// Directions in clockwise screen order (rows grow downward).
const EAST: u8 = 0;
const SOUTH: u8 = 1;
const WEST: u8 = 2;
const NORTH: u8 = 3;

fn step(vertex: Vertex, direction: u8) -> Vertex {
    match direction {
        EAST => (vertex.0 + 1, vertex.1),
        SOUTH => (vertex.0, vertex.1 + 1),
        WEST => (vertex.0 - 1, vertex.1),
        _ => (vertex.0, vertex.1 - 1),
    }
}

/// A connected set of mask cells, listed in scan order.
#[derive(Debug, Clone)]
pub struct Region {
    pub label: u32,
    pub cells: Vec<(usize, usize)>,
}

/// Cell-edge boundary tracer.
///
/// Regions are found by breadth-first flood fill. Each region's boundary is
/// assembled from the directed cell edges separating it from everything else,
/// oriented so the region lies to the right of travel on screen. Outer rings
/// therefore come out clockwise on screen and holes counter-clockwise.
#[derive(Debug, Clone)]
pub struct BoundaryTracer {
    pub connectivity: Connectivity,
    /// Regions with fewer cells are skipped without tracing
    pub min_region_pixels: usize,
}

impl Default for BoundaryTracer {
    fn default() -> Self {
        Self {
            connectivity: Connectivity::Four,
            min_region_pixels: 1,
        }
    }
}

impl BoundaryTracer {
    pub fn new(connectivity: Connectivity, min_region_pixels: usize) -> Self {
        Self {
            connectivity,
            min_region_pixels,
        }
    }

    /// Label connected regions. Returns the label raster (0 = background)
    /// and the regions in the order their first cell was met.
    pub fn label_regions(&self, mask: &ClassMask) -> (Vec<u32>, Vec<Region>) {
        let (width, height) = mask.dimensions();
        let mut labels = vec![0u32; width * height];
        let mut regions = Vec::new();
        let mut queue = VecDeque::new();

        for (start, &bit) in mask.bits().iter().enumerate() {
            if !bit || labels[start] != 0 {
                continue;
            }
            let label = regions.len() as u32 + 1;
            let mut cells = Vec::new();
            labels[start] = label;
            queue.push_back((start % width, start / width));

            while let Some((col, row)) = queue.pop_front() {
                cells.push((col, row));
                for &(dx, dy) in self.connectivity.offsets() {
                    let nc = col as isize + dx;
                    let nr = row as isize + dy;
                    if !mask.get_signed(nc, nr) {
                        continue;
                    }
                    let index = nr as usize * width + nc as usize;
                    if labels[index] == 0 {
                        labels[index] = label;
                        queue.push_back((nc as usize, nr as usize));
                    }
                }
            }

            cells.sort_unstable_by_key(|&(col, row)| (row, col));
            regions.push(Region { label, cells });
        }

        debug!(regions = regions.len(), width, height, "labelled mask regions");
        (labels, regions)
    }

    /// Trace one labelled region into pixel-space rings: the outer ring first,
    /// then holes.
    pub fn trace_region(
        &self,
        labels: &[u32],
        width: usize,
        height: usize,
        region: &Region,
    ) -> std::result::Result<Vec<Vec<Vertex>>, TraceError> {
        let inside = |col: i64, row: i64| {
            col >= 0
                && row >= 0
                && (col as usize) < width
                && (row as usize) < height
                && labels[row as usize * width + col as usize] == region.label
        };

        // Outgoing boundary edges per start vertex as a direction bitmask.
        let mut edges: HashMap<Vertex, u8> = HashMap::new();
        let mut edge_count = 0usize;
        for &(col, row) in &region.cells {
            let (c, r) = (col as i64, row as i64);
            let sides = [
                (!inside(c, r - 1), (c, r), EAST),
                (!inside(c + 1, r), (c + 1, r), SOUTH),
                (!inside(c, r + 1), (c + 1, r + 1), WEST),
                (!inside(c - 1, r), (c, r + 1), NORTH),
            ];
            for (exposed, start, direction) in sides {
                if exposed {
                    *edges.entry(start).or_insert(0) |= 1 << direction;
                    edge_count += 1;
                }
            }
        }

        let mut remaining = edges.clone();
        let mut rings = Vec::new();
        let mut starts: Vec<Vertex> = edges.keys().copied().collect();
        starts.sort_unstable_by_key(|&(x, y)| (y, x));

        for start in starts {
            while let Some(direction) = remaining
                .get(&start)
                .copied()
                .filter(|&bits| bits != 0)
                .map(|bits| bits.trailing_zeros() as u8)
            {
                let ring = self.walk(&edges, &mut remaining, start, direction, edge_count)?;
                rings.push(ring);
            }
        }

        let mut outer = Vec::new();
        let mut holes = Vec::new();
        for ring in rings {
            if ring.len() < 3 {
                return Err(TraceError::Degenerate {
                    vertices: ring.len(),
                });
            }
            if signed_area(&ring) > 0 {
                outer.push(ring);
            } else {
                holes.push(ring);
            }
        }

        match outer.len() {
            0 => Err(TraceError::NoOuterRing),
            1 => {
                let mut ordered = outer;
                ordered.extend(holes);
                Ok(ordered)
            }
            count => Err(TraceError::MultipleOuterRings { count }),
        }
    }

    /// Follow edges from `start` until the walk returns to its first edge,
    /// keeping only the vertices where the direction changes.
    fn walk(
        &self,
        edges: &HashMap<Vertex, u8>,
        remaining: &mut HashMap<Vertex, u8>,
        start: Vertex,
        start_direction: u8,
        limit: usize,
    ) -> std::result::Result<Vec<Vertex>, TraceError> {
        let mut path: Vec<(Vertex, u8)> = Vec::new();
        let mut vertex = start;
        let mut direction = start_direction;

        for _ in 0..=limit {
            match remaining.get_mut(&vertex) {
                Some(bits) if *bits & (1 << direction) != 0 => *bits &= !(1 << direction),
                _ => {
                    return Err(TraceError::OpenBoundary {
                        x: vertex.0,
                        y: vertex.1,
                    })
                }
            }
            path.push((vertex, direction));
            vertex = step(vertex, direction);

            let available = edges.get(&vertex).copied().unwrap_or(0);
            direction = self.choose_turn(direction, available).ok_or(TraceError::OpenBoundary {
                x: vertex.0,
                y: vertex.1,
            })?;

            if vertex == start && direction == start_direction {
                let ring = path
                    .iter()
                    .enumerate()
                    .filter(|&(i, &(_, out))| {
                        let incoming = path[(i + path.len() - 1) % path.len()].1;
                        incoming != out
                    })
                    .map(|(_, &(v, _))| v)
                    .collect();
                return Ok(ring);
            }
        }

        Err(TraceError::OpenBoundary {
            x: vertex.0,
            y: vertex.1,
        })
    }

    /// Pick the outgoing direction at a vertex. Two candidates only occur at
    /// saddle vertices: turning right keeps diagonal cells apart (four
    /// connectivity), turning left joins them (eight connectivity).
    fn choose_turn(&self, incoming: u8, available: u8) -> Option<u8> {
        let right = (incoming + 1) % 4;
        let straight = incoming;
        let left = (incoming + 3) % 4;
        let order = match self.connectivity {
            Connectivity::Four => [right, straight, left],
            Connectivity::Eight => [left, straight, right],
        };
        order.into_iter().find(|&d| available & (1 << d) != 0)
    }

    fn to_geographic(ring: &[Vertex], transform: &GeoTransform) -> LineString<f64> {
        let mut coords: Vec<Coord<f64>> = ring
            .iter()
            .map(|&(col, row)| transform.apply(col as f64, row as f64))
            .collect();
        if let Some(&first) = coords.first() {
            coords.push(first);
        }
        LineString::new(coords)
    }
}

/// Twice the shoelace area in pixel space; positive for screen-clockwise rings.
fn signed_area(ring: &[Vertex]) -> i64 {
    ring.iter()
        .zip(ring.iter().cycle().skip(1))
        .map(|(a, b)| a.0 * b.1 - b.0 * a.1)
        .sum()
}

impl BoundaryTracer {
    /// Trace every region large enough to keep. A region whose boundary
    /// cannot be closed into one outer ring is logged and dropped; the
    /// others still come through.
    fn trace_regions(
        &self,
        labels: &[u32],
        width: usize,
        height: usize,
        regions: &[Region],
        transform: &GeoTransform,
    ) -> Vec<Polygon<f64>> {
        let mut polygons = Vec::with_capacity(regions.len());
        let mut skipped = 0usize;
        let mut dropped = 0usize;
        for region in regions {
            if region.cells.len() < self.min_region_pixels {
                skipped += 1;
                continue;
            }
            let rings = match self.trace_region(labels, width, height, region) {
                Ok(rings) => rings,
                Err(error) => {
                    let (col, row) = region.cells.first().copied().unwrap_or_default();
                    warn!(%error, label = region.label, col, row, cells = region.cells.len(), "dropping region");
                    dropped += 1;
                    continue;
                }
            };
            let mut rings = rings.iter().map(|ring| Self::to_geographic(ring, transform));
            if let Some(exterior) = rings.next() {
                polygons.push(Polygon::new(exterior, rings.collect()));
            }
        }

        debug!(
            traced = polygons.len(),
            skipped,
            dropped,
            min_region_pixels = self.min_region_pixels,
            "vectorized mask"
        );
        polygons
    }
}

impl RegionVectorizer for BoundaryTracer {
    fn vectorize(&self, mask: &ClassMask, transform: &GeoTransform) -> Result<Vec<Polygon<f64>>> {
        let (width, height) = mask.dimensions();
        let (labels, regions) = self.label_regions(mask);
        Ok(self.trace_regions(&labels, width, height, &regions, transform))
    }
}
