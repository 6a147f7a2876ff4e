use geo_types::{Coord, LineString, Polygon};
use serde::{Deserialize, Serialize};

use crate::{
    error::{ClassMapError, Result},
    types::Bounds,
};

/// Linear map from a geographic window onto a canvas, north up.
///
/// `x = (lon - west) / (east - west) * width`
/// `y = (north - lat) / (north - south) * height`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DrawTransform {
    bounds: Bounds,
    width: f64,
    height: f64,
}

impl DrawTransform {
    /// Fails on an empty or inverted window and on a non-positive canvas.
    pub fn new(bounds: Bounds, width: f64, height: f64) -> Result<Self> {
        bounds.validate()?;
        if !(width > 0.0 && height > 0.0) || !width.is_finite() || !height.is_finite() {
            return Err(ClassMapError::InvalidCanvas { width, height });
        }
        Ok(Self {
            bounds,
            width,
            height,
        })
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn canvas_size(&self) -> (f64, f64) {
        (self.width, self.height)
    }

    pub fn project(&self, lon: f64, lat: f64) -> Coord<f64> {
        Coord {
            x: (lon - self.bounds.west) / self.bounds.width() * self.width,
            y: (self.bounds.north - lat) / self.bounds.height() * self.height,
        }
    }

    /// Canvas back to geographic coordinates.
    pub fn unproject(&self, x: f64, y: f64) -> Coord<f64> {
        Coord {
            x: self.bounds.west + x / self.width * self.bounds.width(),
            y: self.bounds.north - y / self.height * self.bounds.height(),
        }
    }

    pub fn project_ring(&self, ring: &LineString<f64>) -> LineString<f64> {
        ring.coords().map(|c| self.project(c.x, c.y)).collect()
    }

    pub fn project_polygon(&self, polygon: &Polygon<f64>) -> Polygon<f64> {
        Polygon::new(
            self.project_ring(polygon.exterior()),
            polygon
                .interiors()
                .iter()
                .map(|ring| self.project_ring(ring))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_vertical_axis_is_inverted() {
        let transform = DrawTransform::new(Bounds::new(0.0, 0.0, 10.0, 10.0), 100.0, 100.0).unwrap();
        assert_eq!(transform.project(0.0, 10.0), Coord { x: 0.0, y: 0.0 });
        assert_eq!(transform.project(10.0, 10.0), Coord { x: 100.0, y: 0.0 });
        assert_eq!(transform.project(0.0, 0.0), Coord { x: 0.0, y: 100.0 });
        assert_eq!(transform.project(10.0, 0.0), Coord { x: 100.0, y: 100.0 });
    }

    #[test]
    fn test_round_trip() {
        let transform =
            DrawTransform::new(Bounds::new(10.0, -35.0, 40.0, -5.0), 600.0, 650.0).unwrap();
        for &(lon, lat) in &[(18.4241, -33.9249), (31.5833, -16.7833), (10.0, -5.0), (40.0, -35.0)] {
            let canvas = transform.project(lon, lat);
            let back = transform.unproject(canvas.x, canvas.y);
            assert_abs_diff_eq!(back.x, lon, epsilon = 1e-9);
            assert_abs_diff_eq!(back.y, lat, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_points_outside_window_still_project() {
        let transform = DrawTransform::new(Bounds::new(0.0, 0.0, 10.0, 10.0), 100.0, 100.0).unwrap();
        assert_eq!(transform.project(-1.0, 11.0), Coord { x: -10.0, y: -10.0 });
    }

    #[test]
    fn test_invalid_inputs_rejected() {
        let bounds = Bounds::new(0.0, 0.0, 10.0, 10.0);
        assert!(matches!(
            DrawTransform::new(bounds, 0.0, 100.0),
            Err(ClassMapError::InvalidCanvas { .. })
        ));
        assert!(matches!(
            DrawTransform::new(Bounds::new(10.0, 0.0, 0.0, 10.0), 100.0, 100.0),
            Err(ClassMapError::InvalidBounds { .. })
        ));
    }
}
