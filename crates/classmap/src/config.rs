use std::path::Path;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr, VariantNames};

use crate::error::{ClassMapError, Result};
use crate::types::ClassCode;

/// Cell adjacency used both for flood fill and for resolving saddle
/// vertices while tracing boundaries.
#[derive(
    Debug, Clone, Copy, Default,
    Serialize, Deserialize, JsonSchema,
    Display, EnumString, VariantNames, IntoStaticStr,
    PartialEq, Eq, Hash
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Connectivity {
    /// Edge neighbours only; diagonal cells form separate regions
    #[default]
    #[strum(to_string = "four", serialize = "4")]
    Four,
    /// Edge and corner neighbours
    #[strum(to_string = "eight", serialize = "8")]
    Eight,
}

impl Connectivity {
    pub fn offsets(&self) -> &'static [(isize, isize)] {
        match self {
            Self::Four => &[(0, -1), (1, 0), (0, 1), (-1, 0)],
            Self::Eight => &[
                (0, -1),
                (1, -1),
                (1, 0),
                (1, 1),
                (0, 1),
                (-1, 1),
                (-1, 0),
                (-1, -1),
            ],
        }
    }
}

/// Per-run rendering parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct RenderConfig {
    #[schemars(range(min = 1.0))]
    pub canvas_width: f64,
    #[schemars(range(min = 1.0))]
    pub canvas_height: f64,
    pub connectivity: Connectivity,
    /// Regions with fewer cells are skipped before tracing
    pub min_region_pixels: usize,
    /// Merged polygons below this area (square degrees) are discarded
    pub min_polygon_area: f64,
    /// Decimal places kept in emitted canvas coordinates
    #[schemars(range(max = 10))]
    pub precision: u32,
    /// Class code that marks unclassified cells
    pub nodata: ClassCode,
    pub panel_timeout_secs: u64,
    /// Input polygons with less area are dropped before the union
    pub merge_epsilon: f64,
    /// Vectorize every n-th row and column only; 1 keeps the full grid
    #[schemars(range(min = 1))]
    pub sample_step: usize,
    pub overlay: OverlayStyle,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            canvas_width: 600.0,
            canvas_height: 650.0,
            connectivity: Connectivity::Four,
            min_region_pixels: 1,
            min_polygon_area: 0.005,
            precision: 1,
            nodata: 0,
            panel_timeout_secs: 120,
            merge_epsilon: 1e-12,
            sample_step: 1,
            overlay: OverlayStyle::default(),
        }
    }
}

impl RenderConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.canvas_width > 0.0 && self.canvas_height > 0.0)
            || !self.canvas_width.is_finite()
            || !self.canvas_height.is_finite()
        {
            return Err(ClassMapError::InvalidCanvas {
                width: self.canvas_width,
                height: self.canvas_height,
            });
        }
        if self.precision > 10 {
            return Err(ClassMapError::InvalidConfig(format!(
                "precision {} exceeds 10 decimal places",
                self.precision
            )));
        }
        if !(self.min_polygon_area >= 0.0) || !(self.merge_epsilon >= 0.0) {
            return Err(ClassMapError::InvalidConfig(
                "area thresholds must be non-negative".to_string(),
            ));
        }
        if self.sample_step == 0 {
            return Err(ClassMapError::InvalidConfig(
                "sample_step must be at least 1".to_string(),
            ));
        }
        if self.panel_timeout_secs == 0 {
            return Err(ClassMapError::InvalidConfig(
                "panel_timeout_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: RenderConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let config: RenderConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Auto-detect file format and load configuration
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml(&content),
            Some("json") => Self::from_json(&content),
            _ => Err(ClassMapError::InvalidConfig(format!(
                "unsupported config format: {}",
                path.display()
            ))),
        }
    }

    pub fn schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(RenderConfig)
    }
}

/// Sizes for site markers, labels and legend swatches, in canvas units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct OverlayStyle {
    /// Draw a dot at every site
    pub show_markers: bool,
    /// Draw the site name above its position
    pub show_labels: bool,
    pub marker_radius: f64,
    /// Approximate rendered width of one label character
    pub label_char_width: f64,
    pub label_height: f64,
    pub label_padding: f64,
    /// Distance from the marker centre up to the label box top
    pub label_offset: f64,
    pub swatch_width: f64,
    pub swatch_height: f64,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            show_markers: true,
            show_labels: true,
            marker_radius: 6.0,
            label_char_width: 6.0,
            label_height: 14.0,
            label_padding: 2.0,
            label_offset: 22.0,
            swatch_width: 12.0,
            swatch_height: 10.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_defaults_are_valid() {
        assert!(RenderConfig::default().validate().is_ok());
    }

    #[test]
    fn test_connectivity_parse() {
        assert_eq!(Connectivity::from_str("eight").unwrap(), Connectivity::Eight);
        assert_eq!(Connectivity::from_str("4").unwrap(), Connectivity::Four);
        assert!(Connectivity::from_str("six").is_err());
        assert_eq!(Connectivity::Four.to_string(), "four");
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = RenderConfig::from_toml(
            r#"
canvas_width = 200.0
canvas_height = 100.0
connectivity = "eight"

[overlay]
marker_radius = 4.0
"#,
        )
        .expect("Should parse config");
        assert_eq!(config.canvas_width, 200.0);
        assert_eq!(config.connectivity, Connectivity::Eight);
        assert_eq!(config.precision, 1);
        assert_eq!(config.overlay.marker_radius, 4.0);
        assert_eq!(config.overlay.label_height, 14.0);
        assert_eq!(config.sample_step, 1);
        assert!(config.overlay.show_labels);
    }

    #[test]
    fn test_zero_sample_step_rejected() {
        let err = RenderConfig::from_toml("sample_step = 0").unwrap_err();
        assert!(matches!(err, ClassMapError::InvalidConfig(_)));

        let config = RenderConfig::from_toml("sample_step = 4\n[overlay]\nshow_labels = false").unwrap();
        assert_eq!(config.sample_step, 4);
        assert!(!config.overlay.show_labels);
        assert!(config.overlay.show_markers);
    }

    #[test]
    fn test_invalid_canvas_rejected() {
        let err = RenderConfig::from_json(r#"{"canvas_width": 0.0}"#).unwrap_err();
        assert!(matches!(err, ClassMapError::InvalidCanvas { .. }));
        assert!(err.is_configuration());
    }
}
