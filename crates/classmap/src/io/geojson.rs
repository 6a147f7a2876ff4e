use std::path::Path;

use geo::Area;
use geo_types::Polygon;
use geojson::{feature::Id, Feature, FeatureCollection, Geometry, Value};
use serde_json::{json, Map};

use crate::{
    error::{ClassMapError, Result},
    pipeline::ClassPolygons,
    render::RenderedPanel,
    style::StyleTable,
    types::ClassCode,
};

fn polygon_feature(id: usize, class_code: ClassCode, polygon: &Polygon<f64>, styles: &StyleTable) -> Feature {
    let style = styles.style(class_code);
    let mut properties = Map::new();
    properties.insert("class_code".to_string(), json!(class_code));
    properties.insert("short_label".to_string(), json!(style.short_label));
    properties.insert("long_label".to_string(), json!(style.long_label));
    properties.insert("fill_color".to_string(), json!(style.fill_color));
    properties.insert("area".to_string(), json!(polygon.unsigned_area()));
    properties.insert("hole_count".to_string(), json!(polygon.interiors().len()));

    Feature {
        bbox: None,
        geometry: Some(Geometry::new(Value::from(polygon))),
        id: Some(Id::Number(serde_json::Number::from(id))),
        properties: Some(properties),
        foreign_members: None,
    }
}

/// Export merged class polygons in geographic coordinates, one feature per polygon.
pub fn classes_to_geojson(classes: &[ClassPolygons], styles: &StyleTable) -> FeatureCollection {
    let features: Vec<Feature> = classes
        .iter()
        .flat_map(|class| class.polygons.iter().map(move |p| (class.class_code, p)))
        .enumerate()
        .map(|(i, (class_code, polygon))| polygon_feature(i, class_code, polygon, styles))
        .collect();

    let mut foreign_members = Map::new();
    foreign_members.insert("class_count".to_string(), json!(classes.len()));
    foreign_members.insert("polygon_count".to_string(), json!(features.len()));

    FeatureCollection {
        bbox: None,
        features,
        foreign_members: Some(foreign_members),
    }
}

/// Load class polygons back from a collection written by [`classes_to_geojson`].
/// Features are regrouped by `class_code`, ascending.
pub fn classes_from_geojson_str(content: &str) -> Result<Vec<ClassPolygons>> {
    let collection: FeatureCollection = content.parse()?;
    let mut classes: Vec<ClassPolygons> = Vec::new();

    for feature in collection.features {
        let class_code = feature
            .property("class_code")
            .and_then(|v| v.as_i64())
            .and_then(|v| ClassCode::try_from(v).ok())
            .ok_or_else(|| ClassMapError::InvalidFeature("feature without a valid class_code".to_string()))?;
        let Some(geometry) = feature.geometry else {
            continue;
        };
        let polygon = Polygon::<f64>::try_from(geometry.value)?;

        match classes.iter_mut().find(|class| class.class_code == class_code) {
            Some(class) => class.polygons.push(polygon),
            None => classes.push(ClassPolygons {
                class_code,
                polygons: vec![polygon],
            }),
        }
    }

    classes.sort_by_key(|class| class.class_code);
    Ok(classes)
}

impl ClassPolygons {
    pub fn to_geojson(&self, styles: &StyleTable) -> FeatureCollection {
        classes_to_geojson(std::slice::from_ref(self), styles)
    }
}

impl RenderedPanel {
    /// Export the panel's merged polygons, tagged with the panel name
    pub fn to_geojson(&self, styles: &StyleTable) -> FeatureCollection {
        let mut collection = classes_to_geojson(&self.classes, styles);
        if let Some(members) = collection.foreign_members.as_mut() {
            members.insert("panel".to_string(), json!(self.name));
        }
        collection
    }

    /// Export to GeoJSON and serialize to JSON string
    pub fn to_geojson_string(&self, styles: &StyleTable) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.to_geojson(styles))?)
    }

    /// Save GeoJSON to file
    pub fn save_geojson<P: AsRef<Path>>(&self, path: P, styles: &StyleTable) -> Result<()> {
        std::fs::write(path, self.to_geojson_string(styles)?)?;
        Ok(())
    }
}
