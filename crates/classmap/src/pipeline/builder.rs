use crate::{
    algorithms::{BooleanUnionMerger, BoundaryTracer, EqualityMaskExtractor, MinimumAreaFilter},
    config::{Connectivity, RenderConfig},
    pipeline::Pipeline,
    traits::{MaskExtractor, PolygonFilter, PolygonMerger, RegionVectorizer},
};

/// Builder for creating processing pipelines with a fluent API
pub struct PipelineBuilder {
    mask_extractor: Option<Box<dyn MaskExtractor>>,
    vectorizer: Option<Box<dyn RegionVectorizer>>,
    merger: Option<Box<dyn PolygonMerger>>,
    filters: Vec<Box<dyn PolygonFilter>>,
}

impl PipelineBuilder {
    /// Create a new pipeline builder
    pub fn new() -> Self {
        Self {
            mask_extractor: None,
            vectorizer: None,
            merger: None,
            filters: Vec::new(),
        }
    }

    /// Set the mask extractor (replaces any existing one)
    pub fn set_mask_extractor<M>(mut self, extractor: M) -> Self
    where
        M: MaskExtractor + 'static,
    {
        self.mask_extractor = Some(Box::new(extractor));
        self
    }

    /// Set the region vectorizer (replaces any existing one)
    pub fn set_vectorizer<V>(mut self, vectorizer: V) -> Self
    where
        V: RegionVectorizer + 'static,
    {
        self.vectorizer = Some(Box::new(vectorizer));
        self
    }

    /// Set the polygon merger (replaces any existing one)
    pub fn set_merger<M>(mut self, merger: M) -> Self
    where
        M: PolygonMerger + 'static,
    {
        self.merger = Some(Box::new(merger));
        self
    }

    /// Add a post-merge filter to the pipeline
    pub fn add_filter<F>(mut self, filter: F) -> Self
    where
        F: PolygonFilter + 'static,
    {
        self.filters.push(Box::new(filter));
        self
    }

    /// Use a boundary tracer with the given connectivity and minimum region size
    pub fn with_tracer(self, connectivity: Connectivity, min_region_pixels: usize) -> Self {
        self.set_vectorizer(BoundaryTracer::new(connectivity, min_region_pixels))
    }

    /// Drop merged polygons smaller than `min_area`
    pub fn with_min_polygon_area(self, min_area: f64) -> Self {
        self.add_filter(MinimumAreaFilter::new(min_area))
    }

    /// Build the pipeline with default components if not specified
    pub fn build(self) -> Pipeline {
        let mask_extractor = self
            .mask_extractor
            .unwrap_or_else(|| Box::new(EqualityMaskExtractor));

        let vectorizer = self
            .vectorizer
            .unwrap_or_else(|| Box::new(BoundaryTracer::default()));

        let merger = self
            .merger
            .unwrap_or_else(|| Box::new(BooleanUnionMerger::default()));

        Pipeline::new(mask_extractor, vectorizer, merger, self.filters)
    }

    /// Build the pipeline described by a render configuration
    pub fn from_config(config: &RenderConfig) -> Pipeline {
        Self::new()
            .with_tracer(config.connectivity, config.min_region_pixels)
            .set_merger(BooleanUnionMerger {
                epsilon: config.merge_epsilon,
            })
            .with_min_polygon_area(config.min_polygon_area)
            .build()
    }
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
