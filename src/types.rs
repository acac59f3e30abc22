use geojson::{Feature, FeatureCollection};
use serde::{Deserialize, Serialize};

use crate::error::SurveyError;

// ** Coordinates **

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

/// Geographic bounding box as two opposite corners, `[[lat, lng], [lat, lng]]` on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "[[f64; 2]; 2]", into = "[[f64; 2]; 2]")]
pub struct GeoBounds {
    pub south_west: Location,
    pub north_east: Location,
}

impl GeoBounds {
    pub fn new(a: [f64; 2], b: [f64; 2]) -> Self {
        GeoBounds {
            south_west: Location { latitude: a[0].min(b[0]), longitude: a[1].min(b[1]) },
            north_east: Location { latitude: a[0].max(b[0]), longitude: a[1].max(b[1]) },
        }
    }

    pub fn corners(&self) -> [[f64; 2]; 2] {
        [
            [self.south_west.latitude, self.south_west.longitude],
            [self.north_east.latitude, self.north_east.longitude],
        ]
    }
}

impl From<[[f64; 2]; 2]> for GeoBounds {
    fn from(corners: [[f64; 2]; 2]) -> Self {
        GeoBounds::new(corners[0], corners[1])
    }
}

impl From<GeoBounds> for [[f64; 2]; 2] {
    fn from(bounds: GeoBounds) -> Self {
        bounds.corners()
    }
}

// ** Position fixes **

/// A fix as delivered by the host's location service; any field may be missing.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct RawFix {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub accuracy: Option<f64>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PositionFix {
    pub location: Location,
    pub accuracy_radius_m: f64,
}

impl PositionFix {
    pub fn new(latitude: f64, longitude: f64, accuracy_radius_m: f64) -> Self {
        PositionFix { location: Location { latitude, longitude }, accuracy_radius_m }
    }
}

impl TryFrom<RawFix> for PositionFix {
    type Error = SurveyError;

    fn try_from(raw: RawFix) -> Result<Self, Self::Error> {
        let (latitude, longitude) = match (raw.latitude, raw.longitude) {
            (Some(lat), Some(lng)) => (lat, lng),
            _ => return Err(SurveyError::InvalidFix("missing coordinates".into())),
        };
        if !latitude.is_finite() || !longitude.is_finite() {
            return Err(SurveyError::InvalidFix(format!("non-finite coordinates {latitude}, {longitude}")));
        }
        if latitude.abs() > 90.0 || longitude.abs() > 180.0 {
            return Err(SurveyError::InvalidFix(format!("coordinates out of range {latitude}, {longitude}")));
        }
        let accuracy = raw.accuracy.filter(|a| a.is_finite() && *a >= 0.0).unwrap_or(0.0);
        Ok(PositionFix::new(latitude, longitude, accuracy))
    }
}

// ** Routes **

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoutePoint {
    pub lat: f64,
    pub lng: f64,
}

impl From<Location> for RoutePoint {
    fn from(location: Location) -> Self {
        RoutePoint { lat: location.latitude, lng: location.longitude }
    }
}

impl From<RoutePoint> for Location {
    fn from(point: RoutePoint) -> Self {
        Location { latitude: point.lat, longitude: point.lng }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    pub points: Vec<RoutePoint>,
    pub is_recording: bool,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct PolylineStyle {
    pub color: String,
    pub weight: f64,
    pub opacity: f64,
    #[serde(rename = "dashArray", skip_serializing_if = "Option::is_none")]
    pub dash_array: Option<String>,
}

/// Fixed-pixel circle marker, as used for bird spots.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CircleMarkerStyle {
    pub radius: f64,
    pub fill_color: String,
    pub color: String,
    pub weight: f64,
    pub opacity: f64,
    pub fill_opacity: f64,
}

impl Default for CircleMarkerStyle {
    fn default() -> Self {
        CircleMarkerStyle {
            radius: 10.0,
            fill_color: "#3388ff".to_string(),
            color: "#000".to_string(),
            weight: 1.0,
            opacity: 1.0,
            fill_opacity: 0.8,
        }
    }
}

// ** Overlays **

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OverlayKind {
    RasterImage,
    VectorFeatures,
}

/// A registered overlay. Vector overlays carry their loaded features.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlayDescriptor {
    pub key: String,
    pub kind: OverlayKind,
    pub source_ref: String,
    #[serde(default)]
    pub bounds: Option<GeoBounds>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(skip)]
    pub features: Option<FeatureCollection>,
}

impl OverlayDescriptor {
    pub fn raster(key: &str, source_ref: &str, bounds: GeoBounds) -> Self {
        OverlayDescriptor {
            key: key.to_string(),
            kind: OverlayKind::RasterImage,
            source_ref: source_ref.to_string(),
            bounds: Some(bounds),
            label: None,
            features: None,
        }
    }

    pub fn vector(key: &str, source_ref: &str, features: FeatureCollection) -> Self {
        OverlayDescriptor {
            key: key.to_string(),
            kind: OverlayKind::VectorFeatures,
            source_ref: source_ref.to_string(),
            bounds: None,
            label: None,
            features: Some(features),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum FeatureStyle {
    #[serde(rename_all = "camelCase")]
    CircleMarker { radius: f64, fill_color: String, fill_opacity: f64 },
    #[serde(rename_all = "camelCase")]
    Path { color: String, weight: f64, fill_opacity: f64 },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StyledFeature {
    pub feature: Feature,
    pub style: FeatureStyle,
}
