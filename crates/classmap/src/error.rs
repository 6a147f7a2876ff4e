use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClassMapError {
    #[error("Invalid window bounds: west={west}, south={south}, east={east}, north={north}")]
    InvalidBounds {
        west: f64,
        south: f64,
        east: f64,
        north: f64,
    },

    #[error("Invalid canvas size: {width}x{height}")]
    InvalidCanvas { width: f64, height: f64 },

    #[error("Dimension mismatch: expected {expected:?}, got {actual:?}")]
    DimensionMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("Invalid class grid: {0}")]
    InvalidGrid(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid feature: {0}")]
    InvalidFeature(String),

    #[error("Panel '{panel}' timed out after {seconds}s")]
    PanelTimeout { panel: String, seconds: u64 },

    #[error("Panel '{panel}' failed: {reason}")]
    PanelFailed { panel: String, reason: String },

    #[error("Failed to load image: {0}")]
    Image(#[from] image::ImageError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),
}

impl ClassMapError {
    /// Caller misuse rather than a property of the raster data. A panel that
    /// hits one of these is omitted from the document.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::InvalidBounds { .. }
                | Self::InvalidCanvas { .. }
                | Self::DimensionMismatch { .. }
                | Self::InvalidGrid(_)
                | Self::InvalidConfig(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ClassMapError>;

/// Reasons a traced region or ring is dropped instead of emitted.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TraceError {
    #[error("ring has {vertices} distinct vertices, need at least 3")]
    Degenerate { vertices: usize },

    #[error("region produced no outer ring")]
    NoOuterRing,

    #[error("region produced {count} outer rings")]
    MultipleOuterRings { count: usize },

    #[error("boundary walk did not close at ({x}, {y})")]
    OpenBoundary { x: i64, y: i64 },

    #[error("polygon area {area} is below epsilon")]
    ZeroArea { area: f64 },

    #[error("ring is self-intersecting")]
    SelfIntersecting,
}
