use std::collections::BTreeSet;
use std::path::Path;

use geo_types::Coord;
use image::GrayImage;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{ClassMapError, Result};

/// Integer class code stored in each raster cell.
pub type ClassCode = i32;

/// Immutable grid of class codes stored row-major.
///
/// Deserializing goes through [`ClassGrid::new`], so a cell buffer that does
/// not match `width * height` is rejected wherever the grid is nested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawGrid")]
pub struct ClassGrid {
    width: usize,
    height: usize,
    cells: Vec<ClassCode>,
}

#[derive(Deserialize)]
struct RawGrid {
    width: usize,
    height: usize,
    cells: Vec<ClassCode>,
}

impl TryFrom<RawGrid> for ClassGrid {
    type Error = ClassMapError;

    fn try_from(raw: RawGrid) -> Result<Self> {
        Self::new(raw.width, raw.height, raw.cells)
    }
}

impl ClassGrid {
    pub fn new(width: usize, height: usize, cells: Vec<ClassCode>) -> Result<Self> {
        if cells.len() != width * height {
            return Err(ClassMapError::InvalidGrid(format!(
                "{} cells supplied for a {}x{} grid",
                cells.len(),
                width,
                height
            )));
        }
        Ok(Self {
            width,
            height,
            cells,
        })
    }

    /// Build a grid from nested rows, rejecting ragged input.
    pub fn from_rows(rows: Vec<Vec<ClassCode>>) -> Result<Self> {
        let height = rows.len();
        let width = rows.first().map_or(0, Vec::len);
        let mut cells = Vec::with_capacity(width * height);
        for (index, row) in rows.into_iter().enumerate() {
            if row.len() != width {
                return Err(ClassMapError::InvalidGrid(format!(
                    "row {} has {} cells, expected {}",
                    index,
                    row.len(),
                    width
                )));
            }
            cells.extend(row);
        }
        Self::new(width, height, cells)
    }

    /// Class-coded 8-bit rasters: every luma value is taken as the class code.
    pub fn from_gray_image(image: &GrayImage) -> Self {
        let cells = image.pixels().map(|p| ClassCode::from(p.0[0])).collect();
        Self {
            width: image.width() as usize,
            height: image.height() as usize,
            cells,
        }
    }

    /// Decode a class-coded image file (PNG or TIFF) into a grid.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let image = image::open(path)?.to_luma8();
        Ok(Self::from_gray_image(&image))
    }

    /// Keep every `step`-th column and row, starting at the origin cell.
    pub fn decimate(&self, step: usize) -> Self {
        let step = step.max(1);
        let width = self.width.div_ceil(step);
        let height = self.height.div_ceil(step);
        let mut cells = Vec::with_capacity(width * height);
        for row in (0..self.height).step_by(step) {
            for col in (0..self.width).step_by(step) {
                cells.push(self.cells[row * self.width + col]);
            }
        }
        Self {
            width,
            height,
            cells,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    pub fn cells(&self) -> &[ClassCode] {
        &self.cells
    }

    /// Class code at `(col, row)`, `None` outside the grid.
    pub fn get(&self, col: usize, row: usize) -> Option<ClassCode> {
        if col < self.width && row < self.height {
            Some(self.cells[row * self.width + col])
        } else {
            None
        }
    }

    /// Distinct class codes present, ascending, excluding `nodata`.
    pub fn distinct_classes(&self, nodata: ClassCode) -> Vec<ClassCode> {
        self.cells
            .iter()
            .copied()
            .filter(|&code| code != nodata)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

/// Affine pixel to geographic mapping in GDAL coefficient order:
/// `[origin_x, pixel_width, row_rotation, origin_y, column_rotation, pixel_height]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform(pub [f64; 6]);

impl GeoTransform {
    /// Axis-aligned transform with the grid origin at the north-west corner.
    /// `cell_height` is the positive cell size; rows run southward.
    pub fn north_up(west: f64, north: f64, cell_width: f64, cell_height: f64) -> Self {
        Self([west, cell_width, 0.0, north, 0.0, -cell_height])
    }

    /// Geographic coordinate of the pixel-corner `(col, row)`.
    pub fn apply(&self, col: f64, row: f64) -> Coord<f64> {
        let [x0, a, b, y0, d, e] = self.0;
        Coord {
            x: x0 + col * a + row * b,
            y: y0 + col * d + row * e,
        }
    }

    /// Transform for a grid that keeps every `step`-th cell: same origin,
    /// pixel size multiplied by `step`.
    pub fn scaled(&self, step: usize) -> Self {
        let [x0, a, b, y0, d, e] = self.0;
        let k = step.max(1) as f64;
        Self([x0, a * k, b * k, y0, d * k, e * k])
    }

    /// Inverse mapping, `None` for a singular transform.
    pub fn inverse(&self) -> Option<Self> {
        let [x0, a, b, y0, d, e] = self.0;
        let det = a * e - b * d;
        if det == 0.0 || !det.is_finite() {
            return None;
        }
        let ia = e / det;
        let ib = -b / det;
        let id = -d / det;
        let ie = a / det;
        Some(Self([
            -(ia * x0 + ib * y0),
            ia,
            ib,
            -(id * x0 + ie * y0),
            id,
            ie,
        ]))
    }
}

/// Geographic window `(west, south, east, north)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl Bounds {
    pub fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self {
            west,
            south,
            east,
            north,
        }
    }

    /// Bounds covered by a `width x height` grid under `transform`.
    pub fn from_transform(transform: &GeoTransform, width: usize, height: usize) -> Self {
        let corners = [
            transform.apply(0.0, 0.0),
            transform.apply(width as f64, 0.0),
            transform.apply(0.0, height as f64),
            transform.apply(width as f64, height as f64),
        ];
        let mut bounds = Self::new(
            f64::INFINITY,
            f64::INFINITY,
            f64::NEG_INFINITY,
            f64::NEG_INFINITY,
        );
        for c in corners {
            bounds.west = bounds.west.min(c.x);
            bounds.east = bounds.east.max(c.x);
            bounds.south = bounds.south.min(c.y);
            bounds.north = bounds.north.max(c.y);
        }
        bounds
    }

    pub fn validate(&self) -> Result<()> {
        let finite = [self.west, self.south, self.east, self.north]
            .iter()
            .all(|v| v.is_finite());
        if !finite || self.west >= self.east || self.south >= self.north {
            return Err(ClassMapError::InvalidBounds {
                west: self.west,
                south: self.south,
                east: self.east,
                north: self.north,
            });
        }
        Ok(())
    }

    pub fn width(&self) -> f64 {
        self.east - self.west
    }

    pub fn height(&self) -> f64 {
        self.north - self.south
    }

    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        (self.west..=self.east).contains(&lon) && (self.south..=self.north).contains(&lat)
    }
}

/// A decoded raster window as handed over by the raster reader.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RasterWindow {
    pub grid: ClassGrid,
    pub transform: GeoTransform,
    pub bounds: Bounds,
}

impl RasterWindow {
    /// Window whose bounds are derived from the grid extent.
    pub fn new(grid: ClassGrid, transform: GeoTransform) -> Self {
        let bounds = Bounds::from_transform(&transform, grid.width(), grid.height());
        Self {
            grid,
            transform,
            bounds,
        }
    }

    pub fn with_bounds(grid: ClassGrid, transform: GeoTransform, bounds: Bounds) -> Self {
        Self {
            grid,
            transform,
            bounds,
        }
    }

    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Coarser copy of the window. The bounds stay put so the sampled map
    /// keeps the same frame as the full-resolution one.
    pub fn decimate(&self, step: usize) -> Self {
        Self {
            grid: self.grid.decimate(step),
            transform: self.transform.scaled(step),
            bounds: self.bounds,
        }
    }
}

/// A point of interest drawn on top of the class map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SiteMarker {
    pub label: String,
    pub lon: f64,
    pub lat: f64,
}

impl SiteMarker {
    pub fn new(label: impl Into<String>, lon: f64, lat: f64) -> Self {
        Self {
            label: label.into(),
            lon,
            lat,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_grid_rejects_wrong_cell_count() {
        let err = ClassGrid::new(3, 3, vec![0; 8]).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_grid_rejects_ragged_rows() {
        assert!(ClassGrid::from_rows(vec![vec![1, 2], vec![3]]).is_err());
    }

    #[test]
    fn test_distinct_classes_skip_nodata() {
        let grid = ClassGrid::from_rows(vec![vec![3, 0, 1], vec![1, 255, 3]]).unwrap();
        assert_eq!(grid.distinct_classes(0), vec![1, 3, 255]);
        assert_eq!(grid.distinct_classes(255), vec![0, 1, 3]);
    }

    #[test]
    fn test_gray_image_codes() {
        let mut image = GrayImage::new(2, 1);
        image.put_pixel(1, 0, image::Luma([7u8]));
        let grid = ClassGrid::from_gray_image(&image);
        assert_eq!(grid.get(0, 0), Some(0));
        assert_eq!(grid.get(1, 0), Some(7));
        assert_eq!(grid.get(2, 0), None);
    }

    #[test]
    fn test_transform_inverse() {
        let transform = GeoTransform([10.0, 0.5, 0.1, -5.0, 0.05, -0.5]);
        let inverse = transform.inverse().unwrap();
        let geo = transform.apply(3.0, 7.0);
        let px = inverse.apply(geo.x, geo.y);
        assert_abs_diff_eq!(px.x, 3.0, epsilon = 1e-9);
        assert_abs_diff_eq!(px.y, 7.0, epsilon = 1e-9);
    }

    #[test]
    fn test_bounds_from_north_up_transform() {
        let transform = GeoTransform::north_up(10.0, -5.0, 1.0, 1.0);
        let bounds = Bounds::from_transform(&transform, 4, 4);
        assert_eq!(bounds, Bounds::new(10.0, -9.0, 14.0, -5.0));
        assert!(bounds.validate().is_ok());
        assert!(bounds.contains(12.0, -7.0));
    }

    #[test]
    fn test_window_json() {
        let json = r#"{
            "grid": {"width": 2, "height": 1, "cells": [0, 3]},
            "transform": [25.0, 0.5, 0.0, -15.0, 0.0, -0.5],
            "bounds": {"west": 25.0, "south": -15.5, "east": 26.0, "north": -15.0}
        }"#;
        let window = RasterWindow::from_json(json).unwrap();
        assert_eq!(window.grid.get(1, 0), Some(3));
        assert_eq!(window.bounds, Bounds::from_transform(&window.transform, 2, 1));

        let short = json.replace("[0, 3]", "[0]");
        let err = RasterWindow::from_json(&short).unwrap_err();
        assert!(err.to_string().contains("1 cells supplied for a 2x1 grid"));
    }

    #[test]
    fn test_short_cell_buffer_rejected_when_nested() {
        #[derive(Debug, Deserialize)]
        struct Wrapper {
            grid: ClassGrid,
        }
        let err = serde_json::from_str::<Wrapper>(
            r#"{"grid": {"width": 3, "height": 3, "cells": [1, 1]}}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("2 cells supplied for a 3x3 grid"));

        let ok: Wrapper =
            serde_json::from_str(r#"{"grid": {"width": 1, "height": 2, "cells": [4, 5]}}"#).unwrap();
        assert_eq!(ok.grid.get(0, 1), Some(5));
    }

    #[test]
    fn test_decimate_keeps_every_nth_cell() {
        let grid = ClassGrid::from_rows(vec![
            vec![1, 2, 3, 4, 5],
            vec![6, 7, 8, 9, 10],
            vec![11, 12, 13, 14, 15],
        ])
        .unwrap();
        let sampled = grid.decimate(2);
        assert_eq!(sampled.dimensions(), (3, 2));
        assert_eq!(sampled.cells(), &[1, 3, 5, 11, 13, 15]);
        assert_eq!(grid.decimate(1), grid);
    }

    #[test]
    fn test_decimated_window_scales_pixel_size() {
        let grid = ClassGrid::new(8, 4, vec![2; 32]).unwrap();
        let window = RasterWindow::new(grid, GeoTransform::north_up(20.0, -10.0, 0.25, 0.25));
        let sampled = window.decimate(4);

        assert_eq!(sampled.grid.dimensions(), (2, 1));
        assert_eq!(sampled.transform, GeoTransform([20.0, 1.0, 0.0, -10.0, 0.0, -1.0]));
        assert_eq!(sampled.bounds, window.bounds);
        assert_eq!(
            Bounds::from_transform(&sampled.transform, 2, 1),
            Bounds::new(20.0, -11.0, 22.0, -10.0)
        );
    }

    #[test]
    fn test_open_class_coded_png() {
        let mut image = GrayImage::new(3, 2);
        image.put_pixel(2, 1, image::Luma([14u8]));
        let path = std::env::temp_dir().join(format!("classmap-grid-{}.png", std::process::id()));
        image.save(&path).unwrap();

        let grid = ClassGrid::open(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(grid.dimensions(), (3, 2));
        assert_eq!(grid.get(2, 1), Some(14));
        assert_eq!(grid.distinct_classes(0), vec![14]);
    }

    #[test]
    fn test_open_missing_image_reports_image_error() {
        let err = ClassGrid::open(std::env::temp_dir().join("classmap-no-such-grid.png")).unwrap_err();
        assert!(matches!(err, ClassMapError::Image(_)));
    }

    #[test]
    fn test_bounds_validation() {
        assert!(Bounds::new(1.0, 0.0, 1.0, 1.0).validate().is_err());
        assert!(Bounds::new(0.0, 2.0, 1.0, 1.0).validate().is_err());
        assert!(Bounds::new(0.0, 0.0, f64::NAN, 1.0).validate().is_err());
    }
}
