//! Site markers, labels and the legend drawn over the class map.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::{
    config::OverlayStyle,
    projection::DrawTransform,
    style::StyleTable,
    types::{ClassCode, SiteMarker},
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Drawable overlay primitive in canvas coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Overlay {
    Marker {
        x: f64,
        y: f64,
        radius: f64,
    },
    /// Text centred on `x`, baseline at `y`, over a background box
    Label {
        text: String,
        x: f64,
        y: f64,
        background: Rect,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegendEntry {
    pub class_code: ClassCode,
    pub short_label: String,
    pub long_label: String,
    pub fill_color: String,
    pub group: Option<String>,
}

/// Legend for the classes present in one render, ascending by class code.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Legend {
    pub entries: Vec<LegendEntry>,
}

impl Legend {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, class_code: ClassCode) -> bool {
        self.entries.iter().any(|e| e.class_code == class_code)
    }

    /// Entries grouped by their style group, groups in order of first
    /// appearance. Ungrouped entries share a `None` group.
    pub fn groups(&self) -> Vec<(Option<&str>, Vec<&LegendEntry>)> {
        let mut groups: Vec<(Option<&str>, Vec<&LegendEntry>)> = Vec::new();
        for entry in &self.entries {
            let key = entry.group.as_deref();
            match groups.iter_mut().find(|(group, _)| *group == key) {
                Some((_, members)) => members.push(entry),
                None => groups.push((key, vec![entry])),
            }
        }
        groups
    }

    /// Merge legends of several panels into one, keeping each code once.
    pub fn merge<'a>(legends: impl IntoIterator<Item = &'a Legend>) -> Legend {
        let mut entries: Vec<LegendEntry> = Vec::new();
        for legend in legends {
            for entry in &legend.entries {
                if !entries.iter().any(|e| e.class_code == entry.class_code) {
                    entries.push(entry.clone());
                }
            }
        }
        entries.sort_by_key(|e| e.class_code);
        Legend { entries }
    }
}

/// Projects sites and builds the legend.
#[derive(Debug, Clone, Default)]
pub struct OverlayRenderer {
    pub style: OverlayStyle,
}

impl OverlayRenderer {
    pub fn new(style: OverlayStyle) -> Self {
        Self { style }
    }

    /// Marker and label for every site, each subject to its switch in the
    /// style. Sites outside the window are projected like any other.
    pub fn render_sites(&self, sites: &[SiteMarker], transform: &DrawTransform) -> Vec<Overlay> {
        let mut overlays = Vec::with_capacity(sites.len() * 2);
        for site in sites {
            let point = transform.project(site.lon, site.lat);
            if self.style.show_markers {
                overlays.push(Overlay::Marker {
                    x: point.x,
                    y: point.y,
                    radius: self.style.marker_radius,
                });
            }
            if self.style.show_labels {
                overlays.push(self.label(&site.label, point.x, point.y));
            }
        }
        overlays
    }

    fn label(&self, text: &str, x: f64, y: f64) -> Overlay {
        let style = &self.style;
        let text_width = text.chars().count() as f64 * style.label_char_width;
        let width = text_width + 2.0 * style.label_padding;
        let top = y - style.label_offset;
        Overlay::Label {
            text: text.to_string(),
            x,
            y: top + style.label_height - style.label_padding,
            background: Rect {
                x: x - width / 2.0,
                y: top,
                width,
                height: style.label_height,
            },
        }
    }

    /// One entry per distinct class code, ascending.
    pub fn legend(&self, class_codes: impl IntoIterator<Item = ClassCode>, styles: &StyleTable) -> Legend {
        let codes: BTreeSet<ClassCode> = class_codes.into_iter().collect();
        let entries = codes
            .into_iter()
            .map(|class_code| {
                let style = styles.style(class_code);
                LegendEntry {
                    class_code,
                    short_label: style.short_label.clone(),
                    long_label: style.long_label.clone(),
                    fill_color: style.fill_color.clone(),
                    group: style.group.clone(),
                }
            })
            .collect();
        Legend { entries }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Bounds;

    fn transform() -> DrawTransform {
        DrawTransform::new(Bounds::new(0.0, 0.0, 10.0, 10.0), 100.0, 100.0).unwrap()
    }

    #[test]
    fn test_marker_and_label_positions() {
        let overlays = OverlayRenderer::default()
            .render_sites(&[SiteMarker::new("Harare", 5.0, 5.0)], &transform());
        assert_eq!(overlays.len(), 2);
        assert_eq!(
            overlays[0],
            Overlay::Marker {
                x: 50.0,
                y: 50.0,
                radius: 6.0
            }
        );
        match &overlays[1] {
            Overlay::Label {
                text,
                x,
                y,
                background,
            } => {
                assert_eq!(text, "Harare");
                assert_eq!(*x, 50.0);
                assert_eq!(*y, 40.0);
                assert_eq!(
                    *background,
                    Rect {
                        x: 30.0,
                        y: 28.0,
                        width: 40.0,
                        height: 14.0
                    }
                );
            }
            other => panic!("expected label, got {other:?}"),
        }
    }

    #[test]
    fn test_marker_and_label_switches() {
        let sites = [SiteMarker::new("Harare", 5.0, 5.0), SiteMarker::new("Beira", 8.0, 2.0)];

        let markers_only = OverlayRenderer::new(OverlayStyle {
            show_labels: false,
            ..OverlayStyle::default()
        })
        .render_sites(&sites, &transform());
        assert_eq!(markers_only.len(), 2);
        assert!(markers_only.iter().all(|o| matches!(o, Overlay::Marker { .. })));

        let labels_only = OverlayRenderer::new(OverlayStyle {
            show_markers: false,
            ..OverlayStyle::default()
        })
        .render_sites(&sites, &transform());
        let texts: Vec<_> = labels_only
            .iter()
            .filter_map(|o| match o {
                Overlay::Label { text, .. } => Some(text.as_str()),
                Overlay::Marker { .. } => None,
            })
            .collect();
        assert_eq!(texts, vec!["Harare", "Beira"]);
        assert_eq!(labels_only.len(), 2);

        let hidden = OverlayRenderer::new(OverlayStyle {
            show_markers: false,
            show_labels: false,
            ..OverlayStyle::default()
        })
        .render_sites(&sites, &transform());
        assert!(hidden.is_empty());
    }

    #[test]
    fn test_sites_outside_window_are_not_clipped() {
        let overlays = OverlayRenderer::default()
            .render_sites(&[SiteMarker::new("Far", 20.0, -10.0)], &transform());
        assert_eq!(
            overlays[0],
            Overlay::Marker {
                x: 200.0,
                y: 200.0,
                radius: 6.0
            }
        );
    }

    #[test]
    fn test_legend_sorted_unique_with_fallback() {
        let legend = OverlayRenderer::default().legend([15, 3, 15, 99, 3], &StyleTable::koppen());
        let codes: Vec<_> = legend.entries.iter().map(|e| e.class_code).collect();
        assert_eq!(codes, vec![3, 15, 99]);
        assert_eq!(legend.entries[0].short_label, "Aw");
        assert_eq!(legend.entries[2].long_label, "Unclassified");
    }

    #[test]
    fn test_legend_groups_follow_order() {
        let legend = OverlayRenderer::default().legend([1, 2, 7, 29], &StyleTable::koppen());
        let groups = legend.groups();
        let names: Vec<_> = groups.iter().map(|(name, members)| (*name, members.len())).collect();
        assert_eq!(
            names,
            vec![
                (Some("A - Tropical"), 2),
                (Some("B - Arid"), 1),
                (Some("E - Polar"), 1)
            ]
        );
    }

    #[test]
    fn test_merged_legend_keeps_each_code_once() {
        let renderer = OverlayRenderer::default();
        let styles = StyleTable::koppen();
        let merged = Legend::merge([&renderer.legend([4, 1], &styles), &renderer.legend([1, 29], &styles)]);
        let codes: Vec<_> = merged.entries.iter().map(|e| e.class_code).collect();
        assert_eq!(codes, vec![1, 4, 29]);
    }
}
