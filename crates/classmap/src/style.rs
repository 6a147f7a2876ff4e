use std::collections::BTreeMap;
use std::path::Path;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{ClassMapError, Result};
use crate::types::ClassCode;

/// Fill colour and labels for one class code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ClassStyle {
    /// Hex colour, e.g. `#46AAFA`
    pub fill_color: String,
    pub short_label: String,
    pub long_label: String,
    /// Legend group heading, e.g. `A - Tropical`
    #[serde(default)]
    pub group: Option<String>,
}

impl ClassStyle {
    pub fn new(
        fill_color: impl Into<String>,
        short_label: impl Into<String>,
        long_label: impl Into<String>,
    ) -> Self {
        Self {
            fill_color: fill_color.into(),
            short_label: short_label.into(),
            long_label: long_label.into(),
            group: None,
        }
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }
}

impl Default for ClassStyle {
    fn default() -> Self {
        Self::new("#CCCCCC", "?", "Unclassified")
    }
}

/// Result of a style lookup. Unmapped codes resolve to the table default.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StyleLookup<'a> {
    Mapped(&'a ClassStyle),
    Default(&'a ClassStyle),
}

impl<'a> StyleLookup<'a> {
    pub fn style(&self) -> &'a ClassStyle {
        match *self {
            Self::Mapped(style) | Self::Default(style) => style,
        }
    }

    pub fn is_default(&self) -> bool {
        matches!(self, Self::Default(_))
    }
}

/// Immutable class code to style mapping with a fallback style.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct StyleTable {
    #[serde(default)]
    pub default_style: ClassStyle,
    #[serde(deserialize_with = "deserialize_class_keys")]
    pub classes: BTreeMap<ClassCode, ClassStyle>,
}

/// TOML table keys are always strings, so class codes are parsed by hand.
fn deserialize_class_keys<'de, D>(
    deserializer: D,
) -> std::result::Result<BTreeMap<ClassCode, ClassStyle>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = BTreeMap::<String, ClassStyle>::deserialize(deserializer)?;
    raw.into_iter()
        .map(|(key, style)| {
            key.trim()
                .parse::<ClassCode>()
                .map(|code| (code, style))
                .map_err(|_| serde::de::Error::custom(format!("invalid class code '{key}'")))
        })
        .collect()
}

impl StyleTable {
    pub fn new(classes: BTreeMap<ClassCode, ClassStyle>, default_style: ClassStyle) -> Self {
        Self {
            default_style,
            classes,
        }
    }

    pub fn lookup(&self, code: ClassCode) -> StyleLookup<'_> {
        match self.classes.get(&code) {
            Some(style) => StyleLookup::Mapped(style),
            None => StyleLookup::Default(&self.default_style),
        }
    }

    pub fn style(&self, code: ClassCode) -> &ClassStyle {
        self.lookup(code).style()
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml(&content),
            Some("json") => Self::from_json(&content),
            _ => Err(ClassMapError::InvalidConfig(format!(
                "unsupported style table format: {}",
                path.display()
            ))),
        }
    }

    /// Standard Köppen–Geiger palette (Beck et al. 2023 class numbering).
    pub fn koppen() -> Self {
        const TROPICAL: &str = "A - Tropical";
        const ARID: &str = "B - Arid";
        const TEMPERATE: &str = "C - Temperate";
        const CONTINENTAL: &str = "D - Continental";
        const POLAR: &str = "E - Polar";

        let entries: [(ClassCode, &str, &str, &str, &str); 30] = [
            (1, "#0000FF", "Af", "Tropical rainforest", TROPICAL),
            (2, "#0078FF", "Am", "Tropical monsoon", TROPICAL),
            (3, "#46AAFA", "Aw", "Tropical savannah", TROPICAL),
            (4, "#FF0000", "BWh", "Hot desert", ARID),
            (5, "#FF9696", "BWk", "Cold desert", ARID),
            (6, "#F5A500", "BSh", "Hot semi-arid", ARID),
            (7, "#FFDC64", "BSk", "Cold semi-arid", ARID),
            (8, "#FFFF00", "Csa", "Mediterranean hot summer", TEMPERATE),
            (9, "#C8C800", "Csb", "Mediterranean warm summer", TEMPERATE),
            (10, "#969600", "Csc", "Mediterranean cold summer", TEMPERATE),
            (11, "#96FF96", "Cwa", "Humid subtropical, dry winter", TEMPERATE),
            (12, "#64C864", "Cwb", "Subtropical highland", TEMPERATE),
            (13, "#329632", "Cwc", "Temperate dry winter, cold summer", TEMPERATE),
            (14, "#C8FF50", "Cfa", "Humid subtropical, no dry season", TEMPERATE),
            (15, "#64FF50", "Cfb", "Oceanic", TEMPERATE),
            (16, "#32C800", "Cfc", "Subpolar oceanic", TEMPERATE),
            (17, "#FF00FF", "Dsa", "Continental dry summer, hot", CONTINENTAL),
            (18, "#C800C8", "Dsb", "Continental dry summer, warm", CONTINENTAL),
            (19, "#963296", "Dsc", "Continental dry summer, cold", CONTINENTAL),
            (20, "#966496", "Dsd", "Continental dry summer, very cold", CONTINENTAL),
            (21, "#AABFFF", "Dwa", "Continental dry winter, hot", CONTINENTAL),
            (22, "#5A78DC", "Dwb", "Continental dry winter, warm", CONTINENTAL),
            (23, "#4B50B4", "Dwc", "Continental dry winter, cold", CONTINENTAL),
            (24, "#320087", "Dwd", "Continental dry winter, very cold", CONTINENTAL),
            (25, "#00FFFF", "Dfa", "Continental humid, hot summer", CONTINENTAL),
            (26, "#37C8FF", "Dfb", "Continental humid, warm summer", CONTINENTAL),
            (27, "#007D7D", "Dfc", "Subarctic", CONTINENTAL),
            (28, "#00465F", "Dfd", "Subarctic, very cold winter", CONTINENTAL),
            (29, "#B2B2B2", "ET", "Tundra", POLAR),
            (30, "#666666", "EF", "Ice cap", POLAR),
        ];

        let classes = entries
            .into_iter()
            .map(|(code, color, short, long, group)| {
                (code, ClassStyle::new(color, short, long).with_group(group))
            })
            .collect();

        Self::new(classes, ClassStyle::default())
    }
}

impl Default for StyleTable {
    fn default() -> Self {
        Self::koppen()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_mapped_and_default() {
        let table = StyleTable::koppen();
        let mapped = table.lookup(3);
        assert!(!mapped.is_default());
        assert_eq!(mapped.style().short_label, "Aw");

        let fallback = table.lookup(99);
        assert!(fallback.is_default());
        assert_eq!(fallback.style(), &ClassStyle::default());
    }

    #[test]
    fn test_koppen_table_complete() {
        let table = StyleTable::koppen();
        assert_eq!(table.len(), 30);
        assert!((1..=30).all(|code| !table.lookup(code).is_default()));
        assert_eq!(table.style(29).group.as_deref(), Some("E - Polar"));
    }

    #[test]
    fn test_style_table_from_toml() {
        let content = r##"
[default_style]
fill_color = "#000000"
short_label = "-"
long_label = "None"

[classes.1]
fill_color = "#FF0000"
short_label = "W"
long_label = "Water"
group = "Surface"
"##;
        let table = StyleTable::from_toml(content).expect("Should parse style table");
        assert_eq!(table.style(1).fill_color, "#FF0000");
        assert_eq!(table.style(2).short_label, "-");
    }
}
