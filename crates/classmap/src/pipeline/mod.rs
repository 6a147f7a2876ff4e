pub mod builder;

use geo_types::Polygon;
use rayon::prelude::*;
use tracing::debug;

use crate::{
    algorithms::mask::ClassMask,
    error::Result,
    traits::{MaskExtractor, PolygonFilter, PolygonMerger, RegionVectorizer},
    types::{ClassCode, RasterWindow},
};

/// Merged, filtered geographic polygons of one class.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassPolygons {
    pub class_code: ClassCode,
    pub polygons: Vec<Polygon<f64>>,
}

/// The per-class chain: mask extraction, vectorization, merge, filters.
pub struct Pipeline {
    mask_extractor: Box<dyn MaskExtractor>,
    vectorizer: Box<dyn RegionVectorizer>,
    merger: Box<dyn PolygonMerger>,
    filters: Vec<Box<dyn PolygonFilter>>,
}

impl Pipeline {
    /// Create a new pipeline builder
    pub fn builder() -> builder::PipelineBuilder {
        builder::PipelineBuilder::new()
    }

    /// Create a new pipeline with the given components
    pub fn new(
        mask_extractor: Box<dyn MaskExtractor>,
        vectorizer: Box<dyn RegionVectorizer>,
        merger: Box<dyn PolygonMerger>,
        filters: Vec<Box<dyn PolygonFilter>>,
    ) -> Self {
        Self {
            mask_extractor,
            vectorizer,
            merger,
            filters,
        }
    }

    /// Run the chain for a single class code
    pub fn process_class(&self, window: &RasterWindow, class_code: ClassCode) -> Result<ClassPolygons> {
        let grid = &window.grid;

        // Step 1: Boolean mask of the class
        let mut mask = ClassMask::new(grid.width(), grid.height());
        self.mask_extractor.extract_into(grid, class_code, &mut mask)?;

        // Step 2: Trace regions into geographic polygons
        let traced = self.vectorizer.vectorize(&mask, &window.transform)?;
        let traced_count = traced.len();

        // Step 3: Union fragments
        let mut polygons = self.merger.merge(traced);

        // Step 4: Post-merge filters in sequence
        for filter in &self.filters {
            polygons = filter.filter(polygons);
        }

        debug!(
            class_code,
            cells = mask.count(),
            traced = traced_count,
            kept = polygons.len(),
            "processed class"
        );
        Ok(ClassPolygons {
            class_code,
            polygons,
        })
    }

    /// Run every class present in the window except `nodata`, in parallel.
    /// Results come back in ascending class order.
    pub fn process_window(&self, window: &RasterWindow, nodata: ClassCode) -> Result<Vec<ClassPolygons>> {
        let classes = window.grid.distinct_classes(nodata);
        let mut results = classes
            .par_iter()
            .map(|&class_code| self.process_class(window, class_code))
            .collect::<Result<Vec<_>>>()?;
        results.sort_by_key(|class| class.class_code);
        Ok(results)
    }

    /// Get information about the pipeline configuration
    pub fn info(&self) -> String {
        format!(
            "Pipeline: 1 mask extractor, 1 vectorizer, 1 merger, {} filters",
            self.filters.len()
        )
    }
}
