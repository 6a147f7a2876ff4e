use geo::Area;
use geo_types::Polygon;
use tracing::debug;

use crate::traits::PolygonFilter;

/// Minimum area filter using geo crate's area calculation.
///
/// Area is measured in the units of the coordinate system (square degrees
/// for geographic input). A polygon exactly at the threshold is kept.
#[derive(Debug, Clone)]
pub struct MinimumAreaFilter {
    pub min_area: f64,
}

impl Default for MinimumAreaFilter {
    fn default() -> Self {
        Self { min_area: 0.005 }
    }
}

impl MinimumAreaFilter {
    pub fn new(min_area: f64) -> Self {
        Self { min_area }
    }

    pub fn keeps(&self, polygon: &Polygon<f64>) -> bool {
        polygon.unsigned_area() >= self.min_area
    }
}

impl PolygonFilter for MinimumAreaFilter {
    fn filter(&self, polygons: Vec<Polygon<f64>>) -> Vec<Polygon<f64>> {
        let before = polygons.len();
        let kept: Vec<_> = polygons.into_iter().filter(|p| self.keeps(p)).collect();
        if kept.len() < before {
            debug!(
                dropped = before - kept.len(),
                min_area = self.min_area,
                "filtered small polygons"
            );
        }
        kept
    }
}
