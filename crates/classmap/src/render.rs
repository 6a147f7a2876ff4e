//! Panel orchestration: one class map per raster window, many windows at once.
//!
//! Classes inside a panel run on the rayon pool. Panels run concurrently on
//! tokio's blocking pool, each under its own timeout; a failed panel is
//! reported and left out while its siblings still render.

use std::{borrow::Cow, sync::Arc, time::Duration, time::Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, info_span, warn};

use crate::{
    config::RenderConfig,
    error::{ClassMapError, Result},
    overlay::{Legend, Overlay, OverlayRenderer},
    path::{PathRecord, PathSerializer},
    pipeline::{builder::PipelineBuilder, ClassPolygons, Pipeline},
    projection::DrawTransform,
    style::StyleTable,
    types::{Bounds, RasterWindow, SiteMarker},
};

/// A named raster window plus the sites drawn on top of it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Panel {
    pub name: String,
    pub window: RasterWindow,
    #[serde(default)]
    pub sites: Vec<SiteMarker>,
}

impl Panel {
    pub fn new(name: impl Into<String>, window: RasterWindow) -> Self {
        Self {
            name: name.into(),
            window,
            sites: Vec::new(),
        }
    }

    pub fn with_sites(mut self, sites: Vec<SiteMarker>) -> Self {
        self.sites = sites;
        self
    }
}

/// Everything needed to draw one panel, in canvas coordinates.
#[derive(Debug, Clone, Serialize)]
pub struct RenderedPanel {
    pub name: String,
    pub canvas_width: f64,
    pub canvas_height: f64,
    pub bounds: Bounds,
    /// Decimal places the path coordinates were rounded to
    pub precision: u32,
    /// Ascending by class code
    pub paths: Vec<PathRecord>,
    pub overlays: Vec<Overlay>,
    pub legend: Legend,
    /// Merged geographic polygons the paths were drawn from
    #[serde(skip)]
    pub classes: Vec<ClassPolygons>,
}

#[derive(Debug)]
pub struct PanelFailure {
    pub panel: String,
    pub error: ClassMapError,
}

/// Outcome of a multi-panel render. Successful panels keep input order.
#[derive(Debug, Default)]
pub struct PanelReport {
    pub panels: Vec<RenderedPanel>,
    pub failures: Vec<PanelFailure>,
}

impl PanelReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// One legend covering every rendered panel.
    pub fn legend(&self) -> Legend {
        Legend::merge(self.panels.iter().map(|panel| &panel.legend))
    }
}

#[derive(Clone)]
pub struct Renderer {
    config: Arc<RenderConfig>,
    styles: Arc<StyleTable>,
    pipeline: Arc<Pipeline>,
}

impl Renderer {
    pub fn new(config: RenderConfig, styles: StyleTable) -> Result<Self> {
        let pipeline = PipelineBuilder::from_config(&config);
        Self::with_pipeline(config, styles, pipeline)
    }

    /// Use a custom per-class pipeline instead of the one the config describes.
    pub fn with_pipeline(config: RenderConfig, styles: StyleTable, pipeline: Pipeline) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            styles: Arc::new(styles),
            pipeline: Arc::new(pipeline),
        })
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub fn styles(&self) -> &StyleTable {
        &self.styles
    }

    pub fn render_panel(&self, panel: &Panel) -> Result<RenderedPanel> {
        let span = info_span!("panel", name = %panel.name);
        let _guard = span.enter();
        let started = Instant::now();

        let transform = DrawTransform::new(
            panel.window.bounds,
            self.config.canvas_width,
            self.config.canvas_height,
        )?;
        let window = match self.config.sample_step {
            step if step > 1 => {
                let sampled = panel.window.decimate(step);
                debug!(
                    step,
                    from = ?panel.window.grid.dimensions(),
                    to = ?sampled.grid.dimensions(),
                    "sampling grid"
                );
                Cow::Owned(sampled)
            }
            _ => Cow::Borrowed(&panel.window),
        };
        let classes = self.pipeline.process_window(&window, self.config.nodata)?;

        let serializer = PathSerializer::new(self.config.precision);
        let mut paths = Vec::new();
        for class in &classes {
            let lookup = self.styles.lookup(class.class_code);
            if lookup.is_default() {
                warn!(class_code = class.class_code, "no style for class, using default");
            }
            for polygon in &class.polygons {
                let canvas = transform.project_polygon(polygon);
                match serializer.serialize(class.class_code, lookup.style(), &canvas) {
                    Ok(record) => paths.push(record),
                    Err(error) => {
                        warn!(class_code = class.class_code, %error, "dropping polygon collapsed on canvas")
                    }
                }
            }
        }

        let overlay = OverlayRenderer::new(self.config.overlay.clone());
        let overlays = overlay.render_sites(&panel.sites, &transform);
        let legend = overlay.legend(paths.iter().map(|path| path.class_code), &self.styles);

        info!(
            classes = classes.len(),
            paths = paths.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "rendered panel"
        );

        Ok(RenderedPanel {
            name: panel.name.clone(),
            canvas_width: self.config.canvas_width,
            canvas_height: self.config.canvas_height,
            bounds: panel.window.bounds,
            precision: self.config.precision,
            paths,
            overlays,
            legend,
            classes,
        })
    }

    /// Render all panels concurrently. A panel that errors, panics or runs
    /// past `panel_timeout_secs` lands in `failures`.
    pub async fn render_panels(&self, panels: Vec<Panel>) -> PanelReport {
        let seconds = self.config.panel_timeout_secs;
        let limit = Duration::from_secs(seconds);

        let handles: Vec<_> = panels
            .into_iter()
            .map(|panel| {
                let renderer = self.clone();
                let name = panel.name.clone();
                let task_name = name.clone();
                let handle = tokio::spawn(async move {
                    let work = tokio::task::spawn_blocking(move || renderer.render_panel(&panel));
                    match tokio::time::timeout(limit, work).await {
                        Ok(Ok(result)) => result,
                        Ok(Err(join_error)) => Err(ClassMapError::PanelFailed {
                            panel: task_name,
                            reason: join_error.to_string(),
                        }),
                        Err(_) => Err(ClassMapError::PanelTimeout {
                            panel: task_name,
                            seconds,
                        }),
                    }
                });
                (name, handle)
            })
            .collect();

        let mut report = PanelReport::default();
        for (name, handle) in handles {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(join_error) => Err(ClassMapError::PanelFailed {
                    panel: name.clone(),
                    reason: join_error.to_string(),
                }),
            };
            match outcome {
                Ok(rendered) => report.panels.push(rendered),
                Err(error) => {
                    error!(panel = %name, %error, "panel omitted");
                    report.failures.push(PanelFailure { panel: name, error });
                }
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        algorithms::{mask::ClassMask, BoundaryTracer},
        path::PathCommand,
        traits::RegionVectorizer,
        types::{ClassGrid, GeoTransform},
    };
    use geo::Area;
    use geo_types::Polygon;

    fn config() -> RenderConfig {
        RenderConfig {
            canvas_width: 200.0,
            canvas_height: 200.0,
            ..RenderConfig::default()
        }
    }

    fn block_panel(name: &str) -> Panel {
        let grid = ClassGrid::from_rows(vec![
            vec![0, 0, 0, 0],
            vec![0, 1, 1, 0],
            vec![0, 1, 1, 0],
            vec![0, 0, 0, 0],
        ])
        .unwrap();
        Panel::new(name, RasterWindow::new(grid, GeoTransform::north_up(10.0, -5.0, 1.0, 1.0)))
    }

    #[test]
    fn test_block_renders_to_canvas_square() {
        let renderer = Renderer::new(config(), StyleTable::koppen()).unwrap();
        let rendered = renderer.render_panel(&block_panel("demo")).unwrap();

        assert_eq!(rendered.paths.len(), 1);
        let path = &rendered.paths[0];
        assert_eq!(path.class_code, 1);
        assert_eq!(path.style.short_label, "Af");
        assert_eq!(
            path.commands,
            vec![
                PathCommand::MoveTo { x: 50.0, y: 150.0 },
                PathCommand::LineTo { x: 150.0, y: 150.0 },
                PathCommand::LineTo { x: 150.0, y: 50.0 },
                PathCommand::LineTo { x: 50.0, y: 50.0 },
                PathCommand::Close,
            ]
        );
        assert_eq!(rendered.legend.len(), 1);
        assert!(rendered.legend.contains(1));
        assert_eq!(rendered.classes[0].polygons[0].unsigned_area(), 4.0);
    }

    #[test]
    fn test_legend_matches_emitted_paths() {
        let grid = ClassGrid::from_rows(vec![
            vec![3, 3, 0, 29],
            vec![3, 0, 0, 29],
            vec![0, 0, 14, 0],
        ])
        .unwrap();
        let panel = Panel::new("mixed", RasterWindow::new(grid, GeoTransform::north_up(0.0, 3.0, 1.0, 1.0)))
            .with_sites(vec![SiteMarker::new("A", 1.0, 1.0), SiteMarker::new("B", 2.5, 2.5)]);

        let rendered = Renderer::new(config(), StyleTable::koppen())
            .unwrap()
            .render_panel(&panel)
            .unwrap();

        let path_codes: Vec<_> = rendered.paths.iter().map(|p| p.class_code).collect();
        assert_eq!(path_codes, vec![3, 14, 29]);
        let legend_codes: Vec<_> = rendered.legend.entries.iter().map(|e| e.class_code).collect();
        assert_eq!(legend_codes, vec![3, 14, 29]);
        assert_eq!(rendered.overlays.len(), 4);
    }

    #[test]
    fn test_unstyled_class_uses_default_style() {
        let grid = ClassGrid::from_rows(vec![vec![99, 99], vec![0, 0]]).unwrap();
        let panel = Panel::new("unknown", RasterWindow::new(grid, GeoTransform::north_up(0.0, 2.0, 1.0, 1.0)));
        let rendered = Renderer::new(config(), StyleTable::koppen())
            .unwrap()
            .render_panel(&panel)
            .unwrap();
        assert_eq!(rendered.paths[0].style.fill_color, "#CCCCCC");
        assert_eq!(rendered.legend.entries[0].long_label, "Unclassified");
    }

    #[test]
    fn test_invalid_window_bounds_fail_panel() {
        let grid = ClassGrid::from_rows(vec![vec![1]]).unwrap();
        let window = RasterWindow::with_bounds(
            grid,
            GeoTransform::north_up(0.0, 1.0, 1.0, 1.0),
            Bounds::new(5.0, 0.0, 1.0, 1.0),
        );
        let err = Renderer::new(config(), StyleTable::koppen())
            .unwrap()
            .render_panel(&Panel::new("broken", window))
            .unwrap_err();
        assert!(matches!(err, ClassMapError::InvalidBounds { .. }));
        assert!(err.is_configuration());
    }

    #[test]
    fn test_sample_step_vectorizes_coarser_grid() {
        let config = RenderConfig {
            sample_step: 2,
            ..config()
        };
        let rendered = Renderer::new(config, StyleTable::koppen())
            .unwrap()
            .render_panel(&block_panel("sampled"))
            .unwrap();

        // Only cell (2, 2) of the block survives, drawn 2x2 degrees large
        assert_eq!(rendered.paths.len(), 1);
        assert_eq!(rendered.bounds, Bounds::new(10.0, -9.0, 14.0, -5.0));
        assert_eq!(rendered.classes[0].polygons[0].unsigned_area(), 4.0);
        let mut corners: Vec<_> = rendered.paths[0]
            .commands
            .iter()
            .filter_map(|c| match *c {
                PathCommand::MoveTo { x, y } | PathCommand::LineTo { x, y } => Some((x as i64, y as i64)),
                PathCommand::Close => None,
            })
            .collect();
        corners.sort();
        assert_eq!(corners, vec![(100, 100), (100, 200), (200, 100), (200, 200)]);
    }

    #[test]
    fn test_short_cell_buffer_panel_rejected() {
        let json = r#"{
            "name": "short",
            "window": {
                "grid": {"width": 3, "height": 3, "cells": [1, 1]},
                "transform": [0.0, 1.0, 0.0, 3.0, 0.0, -1.0],
                "bounds": {"west": 0.0, "south": 0.0, "east": 3.0, "north": 3.0}
            }
        }"#;
        let err = serde_json::from_str::<Panel>(json).unwrap_err();
        assert!(err.to_string().contains("2 cells supplied for a 3x3 grid"));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = RenderConfig {
            canvas_width: -1.0,
            ..RenderConfig::default()
        };
        assert!(Renderer::new(config, StyleTable::koppen()).is_err());
    }

    #[tokio::test]
    async fn test_failed_panel_does_not_block_siblings() {
        let grid = ClassGrid::from_rows(vec![vec![1]]).unwrap();
        let broken = Panel::new(
            "broken",
            RasterWindow::with_bounds(
                grid,
                GeoTransform::north_up(0.0, 1.0, 1.0, 1.0),
                Bounds::new(0.0, 1.0, 1.0, 1.0),
            ),
        );
        let renderer = Renderer::new(config(), StyleTable::koppen()).unwrap();
        let report = renderer
            .render_panels(vec![block_panel("first"), broken, block_panel("third")])
            .await;

        let names: Vec<_> = report.panels.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["first", "third"]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].panel, "broken");
        assert!(!report.is_complete());
        assert_eq!(report.legend().len(), 1);
    }

    struct SlowVectorizer;

    impl RegionVectorizer for SlowVectorizer {
        fn vectorize(&self, mask: &ClassMask, transform: &GeoTransform) -> Result<Vec<Polygon<f64>>> {
            std::thread::sleep(Duration::from_secs(2));
            BoundaryTracer::default().vectorize(mask, transform)
        }
    }

    #[tokio::test]
    async fn test_slow_panel_times_out() {
        let config = RenderConfig {
            panel_timeout_secs: 1,
            ..config()
        };
        let pipeline = Pipeline::builder().set_vectorizer(SlowVectorizer).build();
        let renderer = Renderer::with_pipeline(config, StyleTable::koppen(), pipeline).unwrap();

        let report = renderer.render_panels(vec![block_panel("slow")]).await;
        assert!(report.panels.is_empty());
        assert!(matches!(
            report.failures[0].error,
            ClassMapError::PanelTimeout { seconds: 1, .. }
        ));
    }
}
