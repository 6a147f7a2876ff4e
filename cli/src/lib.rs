use std::fs;
use std::path::{Path, PathBuf};

use classmap::{
    ClassMapError, DocumentLayout, Panel, RasterWindow, RenderConfig, SiteMarker, StyleTable,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum JobError {
    #[error(transparent)]
    SerdeError(#[from] serde_json::Error),
    #[error(transparent)]
    TomlDeError(#[from] toml::de::Error),
    #[error(transparent)]
    TomlSerError(#[from] toml::ser::Error),
    #[error(transparent)]
    IoError(#[from] std::io::Error),
    #[error(transparent)]
    ClassMap(#[from] ClassMapError),
    #[error("Job defines no panels")]
    NoPanels,
    #[error("Duplicate panel name '{0}'")]
    DuplicatePanel(String),
    #[error("Panels '{first}' and '{second}' would both be written as '{stem}'")]
    OutputCollision {
        first: String,
        second: String,
        stem: String,
    },
    #[error("Panel '{panel}': cannot load window {path:?}: {source}")]
    PanelWindow {
        panel: String,
        path: PathBuf,
        #[source]
        source: ClassMapError,
    },
    #[error("Unsupported file format. Please use .toml or .json files")]
    UnsupportedFileFormat,
}

/// File name stem for a panel's output files: anything outside ASCII
/// alphanumerics, `-` and `_` becomes `_`.
pub fn output_stem(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

/// One panel of the output document: a raster window file and its title.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct PanelSource {
    pub name: String,
    /// JSON file holding the decoded raster window
    pub window: PathBuf,
    pub description: Option<String>,
}

/// A complete render job: panels, shared sites, styling and output location.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct RenderJob {
    pub output_dir: PathBuf,
    /// Style table file; the built-in Köppen palette when absent
    pub styles: Option<PathBuf>,
    #[serde(default)]
    pub write_geojson: bool,
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub layout: DocumentLayout,
    pub panels: Vec<PanelSource>,
    #[serde(default)]
    pub sites: Vec<SiteMarker>,
}

impl RenderJob {
    /// Load RenderJob configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self, JobError> {
        let job: RenderJob = toml::from_str(content)?;
        job.validate()?;
        Ok(job)
    }

    /// Load RenderJob configuration from JSON string
    pub fn from_json(content: &str) -> Result<Self, JobError> {
        let job: RenderJob = serde_json::from_str(content)?;
        job.validate()?;
        Ok(job)
    }

    /// Auto-detect file format and load configuration
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, JobError> {
        let path = path.as_ref();
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml(&fs::read_to_string(path)?),
            Some("json") => Self::from_json(&fs::read_to_string(path)?),
            _ => Err(JobError::UnsupportedFileFormat),
        }
    }

    pub fn validate(&self) -> Result<(), JobError> {
        if self.panels.is_empty() {
            return Err(JobError::NoPanels);
        }
        for (i, panel) in self.panels.iter().enumerate() {
            if self.panels[..i].iter().any(|other| other.name == panel.name) {
                return Err(JobError::DuplicatePanel(panel.name.clone()));
            }
            let stem = output_stem(&panel.name);
            if let Some(other) = self.panels[..i].iter().find(|other| output_stem(&other.name) == stem) {
                return Err(JobError::OutputCollision {
                    first: other.name.clone(),
                    second: panel.name.clone(),
                    stem,
                });
            }
        }
        self.render.validate()?;
        Ok(())
    }

    pub fn style_table(&self) -> Result<StyleTable, JobError> {
        match &self.styles {
            Some(path) => Ok(StyleTable::from_file(path)?),
            None => Ok(StyleTable::koppen()),
        }
    }

    /// Read every panel's raster window. Sites are shared by all panels.
    ///
    /// A window that cannot be read fails only its own panel: the error is
    /// logged and returned next to the panels that did load.
    pub fn load_panels(&self) -> (Vec<Panel>, Vec<JobError>) {
        let mut panels = Vec::with_capacity(self.panels.len());
        let mut failures = Vec::new();
        for source in &self.panels {
            match RasterWindow::from_json_file(&source.window) {
                Ok(window) => {
                    panels.push(Panel::new(source.name.clone(), window).with_sites(self.sites.clone()))
                }
                Err(source_error) => {
                    error!(panel = %source.name, window = ?source.window, error = %source_error, "Failed to load panel window");
                    failures.push(JobError::PanelWindow {
                        panel: source.name.clone(),
                        path: source.window.clone(),
                        source: source_error,
                    });
                }
            }
        }
        (panels, failures)
    }

    /// Save RenderJob configuration to a TOML file
    pub fn to_toml_file<P: AsRef<Path>>(&self, path: P) -> Result<(), JobError> {
        fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    /// Convert RenderJob to TOML string
    pub fn to_toml(&self) -> Result<String, JobError> {
        Ok(toml::to_string_pretty(&self)?)
    }

    /// Convert RenderJob to JSON string
    pub fn to_json(&self) -> Result<String, JobError> {
        Ok(serde_json::to_string_pretty(&self)?)
    }

    pub fn schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(RenderJob)
    }

    /// A starting point for a two-panel comparison job.
    pub fn skeleton(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            styles: None,
            write_geojson: false,
            render: RenderConfig::default(),
            layout: DocumentLayout {
                title: Some("Köppen-Geiger climate classification".to_string()),
                ..DocumentLayout::default()
            },
            panels: vec![
                PanelSource {
                    name: "1991-2020".to_string(),
                    window: PathBuf::from("historical.json"),
                    description: None,
                },
                PanelSource {
                    name: "2071-2099".to_string(),
                    window: PathBuf::from("projected.json"),
                    description: Some("SSP2-4.5".to_string()),
                },
            ],
            sites: vec![SiteMarker::new("Harare", 31.05, -17.83)],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use classmap::Connectivity;

    #[test]
    fn test_job_from_toml() {
        let job = RenderJob::from_toml(
            r#"
output_dir = "out"
write_geojson = true

[render]
canvas_width = 300.0
connectivity = "eight"

[layout]
title = "Zimbabwe"

[[panels]]
name = "historical"
window = "historical.json"

[[sites]]
label = "Harare"
lon = 31.05
lat = -17.83
"#,
        )
        .expect("Should parse job");

        assert_eq!(job.output_dir, PathBuf::from("out"));
        assert!(job.write_geojson);
        assert_eq!(job.render.canvas_width, 300.0);
        assert_eq!(job.render.canvas_height, 650.0);
        assert_eq!(job.render.connectivity, Connectivity::Eight);
        assert_eq!(job.layout.title.as_deref(), Some("Zimbabwe"));
        assert_eq!(job.panels[0].window, PathBuf::from("historical.json"));
        assert_eq!(job.sites[0].label, "Harare");
    }

    #[test]
    fn test_job_without_panels_rejected() {
        let err = RenderJob::from_json(r#"{"output_dir": "out", "panels": []}"#).unwrap_err();
        assert!(matches!(err, JobError::NoPanels));
    }

    #[test]
    fn test_duplicate_panel_names_rejected() {
        let mut job = RenderJob::skeleton("out");
        job.panels[1].name = job.panels[0].name.clone();
        assert!(matches!(job.validate(), Err(JobError::DuplicatePanel(_))));
    }

    #[test]
    fn test_colliding_output_names_rejected() {
        let mut job = RenderJob::skeleton("out");
        job.panels[0].name = "a b".to_string();
        job.panels[1].name = "a_b".to_string();
        match job.validate() {
            Err(JobError::OutputCollision { first, second, stem }) => {
                assert_eq!(first, "a b");
                assert_eq!(second, "a_b");
                assert_eq!(stem, "a_b");
            }
            other => panic!("expected output collision, got {other:?}"),
        }
        assert_eq!(output_stem("1991-2020 (SSP2)"), "1991-2020__SSP2_");
    }

    #[test]
    fn test_missing_window_fails_only_its_panel() {
        let dir = std::env::temp_dir().join(format!("classmap-job-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let present = dir.join("historical.json");
        fs::write(
            &present,
            r#"{
                "grid": {"width": 2, "height": 1, "cells": [1, 3]},
                "transform": [25.0, 0.5, 0.0, -15.0, 0.0, -0.5],
                "bounds": {"west": 25.0, "south": -15.5, "east": 26.0, "north": -15.0}
            }"#,
        )
        .unwrap();

        let mut job = RenderJob::skeleton(&dir);
        job.panels[0].window = present;
        job.panels[1].window = dir.join("missing.json");

        let (panels, failures) = job.load_panels();
        fs::remove_dir_all(&dir).ok();

        assert_eq!(panels.len(), 1);
        assert_eq!(panels[0].name, "1991-2020");
        assert_eq!(panels[0].sites.len(), 1);
        assert_eq!(failures.len(), 1);
        assert!(matches!(
            &failures[0],
            JobError::PanelWindow { panel, source: ClassMapError::Io(_), .. } if panel == "2071-2099"
        ));
        assert!(failures[0].to_string().contains("2071-2099"));
    }

    #[test]
    fn test_skeleton_survives_toml() {
        let job = RenderJob::skeleton("out");
        let reloaded = RenderJob::from_toml(&job.to_toml().unwrap()).unwrap();
        assert_eq!(reloaded, job);
    }

    #[test]
    fn test_unsupported_extension() {
        assert!(matches!(
            RenderJob::from_file("job.yaml"),
            Err(JobError::UnsupportedFileFormat)
        ));
    }
}
