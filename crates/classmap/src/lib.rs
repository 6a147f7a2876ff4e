//! # Class Map Rendering Library
//!
//! Turns categorical raster windows (climate zones, land cover, any grid of
//! integer class codes) into styled vector paths on a fixed-size canvas.
//!
//! ## Core Features
//!
//! - **Region Vectorization**: Exact cell-edge boundary tracing with holes, 4- or 8-connected
//! - **Polygon Merging**: Same-class fragments unioned into canonical, non-overlapping shapes
//! - **Small-Feature Filtering**: Area threshold in map units after the merge
//! - **Path Output**: `MOVE`/`LINE`/`CLOSE` records with even-odd fill, plus SVG and GeoJSON export
//! - **Overlays**: Site markers, labels and a legend of the classes actually drawn
//! - **Concurrency**: Classes on rayon, panels on tokio with a timeout each
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use classmap::{Panel, RasterWindow, RenderConfig, Renderer, StyleTable};
//!
//! let window = RasterWindow::from_json_file("historical.json")?;
//! let renderer = Renderer::new(RenderConfig::default(), StyleTable::koppen())?;
//!
//! let rendered = renderer.render_panel(&Panel::new("1991-2020", window))?;
//! for path in &rendered.paths {
//!     println!("{} {}", path.style.short_label, path.to_svg_path_data(1));
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Custom Pipeline
//!
//! ```rust,no_run
//! use classmap::{Connectivity, Pipeline, algorithms::*};
//!
//! let pipeline = Pipeline::builder()
//!     .with_tracer(Connectivity::Eight, 4)
//!     .set_merger(BooleanUnionMerger::default())
//!     .with_min_polygon_area(0.01)
//!     .build();
//! # let _ = pipeline;
//! ```

pub mod algorithms;
pub mod config;
pub mod error;
pub mod io;
pub mod overlay;
pub mod path;
pub mod pipeline;
pub mod projection;
pub mod render;
pub mod style;
pub mod svg;
pub mod traits;
pub mod types;

pub use config::{Connectivity, OverlayStyle, RenderConfig};
pub use error::{ClassMapError, Result, TraceError};
pub use overlay::{Legend, LegendEntry, Overlay, OverlayRenderer};
pub use path::{FillRule, PathCommand, PathRecord, PathSerializer};
pub use pipeline::{builder::PipelineBuilder, ClassPolygons, Pipeline};
pub use projection::DrawTransform;
pub use render::{Panel, PanelFailure, PanelReport, RenderedPanel, Renderer};
pub use style::{ClassStyle, StyleLookup, StyleTable};
pub use svg::{render_document, DocumentLayout};
pub use traits::*;
pub use types::{Bounds, ClassCode, ClassGrid, GeoTransform, RasterWindow, SiteMarker};
