use geo_types::{LineString, Polygon};
use serde::{Deserialize, Serialize};
use strum::Display;
use tracing::warn;

use crate::{error::TraceError, style::ClassStyle, types::ClassCode};

/// One drawing command in canvas coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum PathCommand {
    MoveTo { x: f64, y: f64 },
    LineTo { x: f64, y: f64 },
    Close,
}

/// How overlapping sub-paths are filled. Holes rely on even-odd.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum FillRule {
    #[default]
    EvenOdd,
    NonZero,
}

/// A styled polygon ready for drawing: the outer ring followed by one
/// sub-path per hole, each `MOVE (LINE)* CLOSE`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathRecord {
    pub class_code: ClassCode,
    pub style: ClassStyle,
    pub fill_rule: FillRule,
    pub commands: Vec<PathCommand>,
}

impl PathRecord {
    pub fn subpath_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, PathCommand::MoveTo { .. }))
            .count()
    }

    /// Vertices of every sub-path, outer ring first.
    pub fn subpaths(&self) -> Vec<Vec<(f64, f64)>> {
        let mut subpaths = Vec::new();
        for command in &self.commands {
            match *command {
                PathCommand::MoveTo { x, y } => subpaths.push(vec![(x, y)]),
                PathCommand::LineTo { x, y } => {
                    if let Some(current) = subpaths.last_mut() {
                        current.push((x, y));
                    }
                }
                PathCommand::Close => {}
            }
        }
        subpaths
    }

    /// SVG `d` attribute: `M x y L x y ... Z` per sub-path.
    pub fn to_svg_path_data(&self, precision: usize) -> String {
        self.commands
            .iter()
            .map(|command| match *command {
                PathCommand::MoveTo { x, y } => format!("M {x:.precision$} {y:.precision$}"),
                PathCommand::LineTo { x, y } => format!("L {x:.precision$} {y:.precision$}"),
                PathCommand::Close => "Z".to_string(),
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Rounds canvas polygons and emits path records.
#[derive(Debug, Clone)]
pub struct PathSerializer {
    pub precision: u32,
}

impl Default for PathSerializer {
    fn default() -> Self {
        Self { precision: 1 }
    }
}

impl PathSerializer {
    pub fn new(precision: u32) -> Self {
        Self { precision }
    }

    pub fn round(&self, value: f64) -> f64 {
        let scale = 10f64.powi(self.precision as i32);
        (value * scale).round() / scale
    }

    /// Round a ring and strip repeated vertices. Fails if fewer than three
    /// distinct vertices survive.
    pub fn round_ring(&self, ring: &LineString<f64>) -> Result<Vec<(f64, f64)>, TraceError> {
        let mut vertices: Vec<(f64, f64)> = ring
            .coords()
            .map(|c| (self.round(c.x), self.round(c.y)))
            .collect();
        vertices.dedup();
        while vertices.len() > 1 && vertices.first() == vertices.last() {
            vertices.pop();
        }

        let mut distinct = vertices.clone();
        distinct.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)));
        distinct.dedup();
        if distinct.len() < 3 {
            return Err(TraceError::Degenerate {
                vertices: distinct.len(),
            });
        }
        Ok(vertices)
    }

    /// Serialize one canvas-space polygon. A collapsed hole is dropped with a
    /// warning; a collapsed outer ring fails the whole record.
    pub fn serialize(
        &self,
        class_code: ClassCode,
        style: &ClassStyle,
        polygon: &Polygon<f64>,
    ) -> Result<PathRecord, TraceError> {
        let mut commands = Vec::new();
        push_ring(&mut commands, &self.round_ring(polygon.exterior())?);

        for hole in polygon.interiors() {
            match self.round_ring(hole) {
                Ok(vertices) => push_ring(&mut commands, &vertices),
                Err(error) => warn!(class_code, %error, "dropping hole collapsed by rounding"),
            }
        }

        Ok(PathRecord {
            class_code,
            style: style.clone(),
            fill_rule: FillRule::EvenOdd,
            commands,
        })
    }
}

fn push_ring(commands: &mut Vec<PathCommand>, vertices: &[(f64, f64)]) {
    for (i, &(x, y)) in vertices.iter().enumerate() {
        commands.push(if i == 0 {
            PathCommand::MoveTo { x, y }
        } else {
            PathCommand::LineTo { x, y }
        });
    }
    commands.push(PathCommand::Close);
}
