use std::collections::HashMap;

use geo::{BoundingRect, Coord, MultiPoint};
use geojson::{Feature, FeatureCollection, Geometry, Value};

use crate::config::{palette_index, PaletteConfig};
use crate::error::SurveyError;
use crate::surface::{LayerId, RenderSurface};
use crate::types::{FeatureStyle, GeoBounds, OverlayDescriptor, OverlayKind, StyledFeature};

/// Selection value that removes the active overlay.
pub const CLEAR_KEY: &str = "clear";

const POINT_RADIUS: f64 = 5.0;
const POINT_FILL_OPACITY: f64 = 0.8;
const PATH_WEIGHT: f64 = 2.0;
const PATH_FILL_OPACITY: f64 = 0.2;

/// Per-feature styling for clustered vector overlays.
pub struct StyleRules<'a> {
    palette: &'a [String],
    points: bool,
}

impl<'a> StyleRules<'a> {
    /// Point datasets are drawn as circle markers, everything else as paths.
    pub fn for_collection(palette: &'a [String], collection: &FeatureCollection) -> Self {
        let points = collection
            .features
            .first()
            .and_then(|f| f.geometry.as_ref())
            .map(|g| matches!(g.value, Value::Point(_)))
            .unwrap_or(false);
        StyleRules { palette, points }
    }

    pub fn color_for(&self, cluster_index: u64) -> String {
        self.palette
            .get(palette_index(cluster_index, self.palette.len()))
            .cloned()
            .unwrap_or_default()
    }

    pub fn style_for(&self, feature: &Feature) -> FeatureStyle {
        let color = self.color_for(cluster_index(feature));
        if self.points {
            FeatureStyle::CircleMarker { radius: POINT_RADIUS, fill_color: color, fill_opacity: POINT_FILL_OPACITY }
        } else {
            FeatureStyle::Path { color, weight: PATH_WEIGHT, fill_opacity: PATH_FILL_OPACITY }
        }
    }
}

/// Cluster index from the `cluster` property; anything but a non-negative integer counts as 0.
pub fn cluster_index(feature: &Feature) -> u64 {
    feature
        .properties
        .as_ref()
        .and_then(|props| props.get("cluster"))
        .and_then(|c| c.as_u64())
        .unwrap_or(0)
}

fn push_position(pos: &[f64], out: &mut Vec<Coord>) {
    if pos.len() >= 2 {
        out.push(Coord { x: pos[0], y: pos[1] });
    }
}

fn collect_coords(value: &Value, out: &mut Vec<Coord>) {
    match value {
        Value::Point(p) => push_position(p, out),
        Value::MultiPoint(ps) | Value::LineString(ps) => {
            for p in ps {
                push_position(p, out);
            }
        }
        Value::MultiLineString(lines) | Value::Polygon(lines) => {
            for p in lines.iter().flatten() {
                push_position(p, out);
            }
        }
        Value::MultiPolygon(polys) => {
            for p in polys.iter().flatten().flatten() {
                push_position(p, out);
            }
        }
        Value::GeometryCollection(geoms) => {
            for Geometry { value, .. } in geoms {
                collect_coords(value, out);
            }
        }
    }
}

/// Bounds of every position in the collection, or `None` when it has no geometry.
pub fn collection_bounds(collection: &FeatureCollection) -> Option<GeoBounds> {
    let mut coords = Vec::new();
    for geometry in collection.features.iter().filter_map(|f| f.geometry.as_ref()) {
        collect_coords(&geometry.value, &mut coords);
    }
    let rect = MultiPoint::<f64>::from(coords).bounding_rect()?;
    // GeoJSON positions are [lng, lat].
    Some(GeoBounds::new([rect.min().y, rect.min().x], [rect.max().y, rect.max().x]))
}

struct ActiveOverlay {
    key: String,
    layer: LayerId,
    bounds: Option<GeoBounds>,
}

/// Registry of named overlays, at most one of which is on the map.
///
/// Swapping removes the old layer before adding the new one, so a selection never
/// shows two overlays at once.
pub struct OverlayManager {
    palette: PaletteConfig,
    registry: HashMap<String, OverlayDescriptor>,
    active: Option<ActiveOverlay>,
}

impl OverlayManager {
    pub fn new(palette: PaletteConfig) -> Self {
        OverlayManager { palette, registry: HashMap::new(), active: None }
    }

    pub fn register(&mut self, descriptor: OverlayDescriptor) -> Result<(), SurveyError> {
        match descriptor.kind {
            OverlayKind::RasterImage if descriptor.bounds.is_none() => {
                return Err(SurveyError::InvalidOverlay(format!("raster overlay {:?} has no bounds", descriptor.key)));
            }
            OverlayKind::VectorFeatures if descriptor.features.is_none() => {
                return Err(SurveyError::InvalidOverlay(format!("vector overlay {:?} has no features", descriptor.key)));
            }
            _ => {}
        }
        if descriptor.key == CLEAR_KEY {
            return Err(SurveyError::InvalidOverlay(format!("{:?} is reserved", CLEAR_KEY)));
        }
        if let Some(existing) = self.registry.get(&descriptor.key) {
            if *existing == descriptor {
                log::debug!("Overlay {} already registered", descriptor.key);
                return Ok(());
            }
            log::warn!("Refusing conflicting registration of overlay {}", descriptor.key);
            return Err(SurveyError::DuplicateRegistration(descriptor.key));
        }
        log::info!("Registered overlay {} ({:?})", descriptor.key, descriptor.kind);
        self.registry.insert(descriptor.key.clone(), descriptor);
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&OverlayDescriptor> {
        self.registry.get(key)
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    pub fn active_key(&self) -> Option<&str> {
        self.active.as_ref().map(|a| a.key.as_str())
    }

    pub fn active_bounds(&self) -> Option<GeoBounds> {
        self.active.as_ref().and_then(|a| a.bounds)
    }

    pub fn select<S: RenderSurface>(&mut self, key: &str, surface: &mut S) -> Result<(), SurveyError> {
        if key == CLEAR_KEY {
            self.clear(surface);
            return Ok(());
        }
        let descriptor = match self.registry.get(key) {
            Some(descriptor) => descriptor,
            None => {
                log::warn!("Could not find overlay {}", key);
                return Err(SurveyError::OverlayNotFound(key.to_string()));
            }
        };

        if descriptor.kind == OverlayKind::RasterImage && descriptor.bounds.is_none() {
            return Err(SurveyError::InvalidOverlay(format!("raster overlay {:?} has no bounds", key)));
        }

        if let Some(old) = self.active.take() {
            surface.remove_layer(old.layer);
        }

        let (layer, bounds) = match (&descriptor.kind, &descriptor.features) {
            (OverlayKind::VectorFeatures, Some(collection)) => {
                let rules = StyleRules::for_collection(self.palette.palette_for(&descriptor.key), collection);
                let styled: Vec<StyledFeature> = collection
                    .features
                    .iter()
                    .map(|feature| StyledFeature { feature: feature.clone(), style: rules.style_for(feature) })
                    .collect();
                let bounds = descriptor.bounds.or_else(|| collection_bounds(collection));
                (surface.add_vector_layer(&styled), bounds)
            }
            _ => {
                let bounds = descriptor.bounds.ok_or_else(|| {
                    SurveyError::InvalidOverlay(format!("overlay {:?} has nothing to draw", key))
                })?;
                (surface.add_image_overlay(&descriptor.source_ref, &bounds), Some(bounds))
            }
        };

        if let Some(bounds) = &bounds {
            surface.fit_bounds(bounds);
        }
        log::info!("Showing overlay {}", key);
        self.active = Some(ActiveOverlay { key: key.to_string(), layer, bounds });
        Ok(())
    }

    pub fn clear<S: RenderSurface>(&mut self, surface: &mut S) {
        if let Some(old) = self.active.take() {
            surface.remove_layer(old.layer);
            log::info!("Cleared overlay {}", old.key);
        }
    }
}
