//! SVG document writer.
//!
//! Lays rendered panels out side by side, each under its title, with one
//! shared legend underneath. Pure function, no I/O.

use std::fmt::Write;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{
    overlay::{Legend, Overlay},
    path::PathRecord,
    render::RenderedPanel,
};

/// Page geometry around the panels, in canvas units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct DocumentLayout {
    pub title: Option<String>,
    pub margin: f64,
    /// Horizontal space between panels and vertical space above the legend
    pub gap: f64,
    pub title_height: f64,
    pub font_size: f64,
    pub legend_row_height: f64,
    pub swatch_width: f64,
    pub swatch_height: f64,
    /// Decimal places written in path data. Never fewer than a panel was
    /// rounded to at render time.
    pub precision: usize,
}

impl Default for DocumentLayout {
    fn default() -> Self {
        Self {
            title: None,
            margin: 20.0,
            gap: 20.0,
            title_height: 24.0,
            font_size: 11.0,
            legend_row_height: 16.0,
            swatch_width: 12.0,
            swatch_height: 10.0,
            precision: 1,
        }
    }
}

fn xml_escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            other => out.push(other),
        }
    }
    out
}

fn legend_rows(legend: &Legend) -> usize {
    legend
        .groups()
        .iter()
        .map(|(group, members)| members.len() + usize::from(group.is_some()))
        .sum()
}

/// Render panels into one standalone SVG document.
pub fn render_document(panels: &[RenderedPanel], layout: &DocumentLayout) -> String {
    let legend = Legend::merge(panels.iter().map(|panel| &panel.legend));
    let header = if layout.title.is_some() {
        layout.title_height
    } else {
        0.0
    };

    let panels_width: f64 = panels.iter().map(|p| p.canvas_width).sum::<f64>()
        + layout.gap * panels.len().saturating_sub(1) as f64;
    let panels_height = panels.iter().map(|p| p.canvas_height).fold(0.0, f64::max);
    let legend_top = layout.margin + header + layout.title_height + panels_height + layout.gap;
    let width = panels_width + 2.0 * layout.margin;
    let height = legend_top + legend_rows(&legend) as f64 * layout.legend_row_height + layout.margin;

    let mut out = String::new();
    let _ = writeln!(out, r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    let _ = writeln!(
        out,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="{height}" viewBox="0 0 {width} {height}" font-family="sans-serif" font-size="{}">"#,
        layout.font_size
    );

    if let Some(title) = &layout.title {
        let title = xml_escape(title);
        let _ = writeln!(out, "  <title>{title}</title>");
        let _ = writeln!(
            out,
            r#"  <text x="{}" y="{}" text-anchor="middle" font-weight="bold">{title}</text>"#,
            width / 2.0,
            layout.margin + layout.title_height / 2.0,
        );
    }

    let mut offset_x = layout.margin;
    for panel in panels {
        let offset_y = layout.margin + header;
        write_panel(&mut out, panel, offset_x, offset_y, layout);
        offset_x += panel.canvas_width + layout.gap;
    }

    write_legend(&mut out, &legend, layout.margin, legend_top, layout);
    let _ = writeln!(out, "</svg>");
    out
}

fn write_panel(out: &mut String, panel: &RenderedPanel, x: f64, y: f64, layout: &DocumentLayout) {
    let _ = writeln!(
        out,
        r#"  <text x="{}" y="{}" text-anchor="middle">{}</text>"#,
        x + panel.canvas_width / 2.0,
        y + layout.title_height / 2.0,
        xml_escape(&panel.name),
    );
    let _ = writeln!(
        out,
        r#"  <g transform="translate({x},{})">"#,
        y + layout.title_height
    );
    let precision = layout.precision.max(panel.precision as usize);
    for path in &panel.paths {
        write_path(out, path, precision);
    }
    for overlay in &panel.overlays {
        write_overlay(out, overlay);
    }
    let _ = writeln!(out, "  </g>");
}

fn write_path(out: &mut String, path: &PathRecord, precision: usize) {
    let _ = writeln!(
        out,
        r#"    <path d="{}" fill="{}" fill-rule="{}" stroke="none"/>"#,
        path.to_svg_path_data(precision),
        xml_escape(&path.style.fill_color),
        path.fill_rule,
    );
}

fn write_overlay(out: &mut String, overlay: &Overlay) {
    match overlay {
        Overlay::Marker { x, y, radius } => {
            let _ = writeln!(
                out,
                r##"    <circle cx="{x}" cy="{y}" r="{radius}" fill="#000000" stroke="#FFFFFF"/>"##
            );
        }
        Overlay::Label {
            text,
            x,
            y,
            background,
        } => {
            let _ = writeln!(
                out,
                r##"    <rect x="{}" y="{}" width="{}" height="{}" fill="#FFFFFF" fill-opacity="0.8"/>"##,
                background.x, background.y, background.width, background.height
            );
            let _ = writeln!(
                out,
                r#"    <text x="{x}" y="{y}" text-anchor="middle">{}</text>"#,
                xml_escape(text)
            );
        }
    }
}

fn write_legend(out: &mut String, legend: &Legend, x: f64, top: f64, layout: &DocumentLayout) {
    if legend.is_empty() {
        return;
    }
    let _ = writeln!(out, r#"  <g class="legend">"#);
    let mut row = 0usize;
    for (group, entries) in legend.groups() {
        if let Some(group) = group {
            let baseline = top + (row as f64 + 0.75) * layout.legend_row_height;
            let _ = writeln!(
                out,
                r#"    <text x="{x}" y="{baseline}" font-weight="bold">{}</text>"#,
                xml_escape(group)
            );
            row += 1;
        }
        for entry in entries {
            let row_top = top + row as f64 * layout.legend_row_height;
            let _ = writeln!(
                out,
                r##"    <rect x="{x}" y="{}" width="{}" height="{}" fill="{}" stroke="#333333"/>"##,
                row_top + (layout.legend_row_height - layout.swatch_height) / 2.0,
                layout.swatch_width,
                layout.swatch_height,
                xml_escape(&entry.fill_color),
            );
            let _ = writeln!(
                out,
                r#"    <text x="{}" y="{}">{} {}</text>"#,
                x + layout.swatch_width + 6.0,
                row_top + 0.75 * layout.legend_row_height,
                xml_escape(&entry.short_label),
                xml_escape(&entry.long_label),
            );
            row += 1;
        }
    }
    let _ = writeln!(out, "  </g>");
}
