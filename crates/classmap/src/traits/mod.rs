use geo_types::Polygon;

use crate::{
    algorithms::mask::ClassMask,
    error::Result,
    types::{ClassCode, ClassGrid, GeoTransform},
};

/// Trait for turning a class grid into a per-class boolean mask
pub trait MaskExtractor: Send + Sync {
    /// Write the mask of `class_code` into `mask`, which must match the grid dimensions
    fn extract_into(&self, grid: &ClassGrid, class_code: ClassCode, mask: &mut ClassMask) -> Result<()>;
}

/// Trait for region vectorization algorithms
pub trait RegionVectorizer: Send + Sync {
    /// Trace every connected region of the mask into a geographic polygon with holes
    fn vectorize(&self, mask: &ClassMask, transform: &GeoTransform) -> Result<Vec<Polygon<f64>>>;
}

/// Trait for merging same-class polygon fragments
pub trait PolygonMerger: Send + Sync {
    /// Union the fragments into a canonical, non-overlapping polygon set
    fn merge(&self, polygons: Vec<Polygon<f64>>) -> Vec<Polygon<f64>>;
}

/// Trait for polygon post-processing after the merge
pub trait PolygonFilter: Send + Sync {
    /// Drop or rewrite merged polygons
    fn filter(&self, polygons: Vec<Polygon<f64>>) -> Vec<Polygon<f64>>;
}
