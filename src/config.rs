use std::collections::HashMap;

use serde::Deserialize;

use crate::error::SurveyError;
use crate::types::{CircleMarkerStyle, Location, PolylineStyle};

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SurveyConfig {
    pub api_base: String,
    pub tracker: TrackerConfig,
    pub palette: PaletteConfig,
    pub saved_routes: SavedRoutesConfig,
    pub spots: SpotsConfig,
    pub map: MapConfig,
}

impl Default for SurveyConfig {
    fn default() -> Self {
        SurveyConfig {
            api_base: "http://localhost:8000".to_string(),
            tracker: TrackerConfig::default(),
            palette: PaletteConfig::default(),
            saved_routes: SavedRoutesConfig::default(),
            spots: SpotsConfig::default(),
            map: MapConfig::default(),
        }
    }
}

impl SurveyConfig {
    pub fn from_json(json: &str) -> Result<Self, SurveyError> {
        if json.trim().is_empty() {
            return Ok(SurveyConfig::default());
        }
        let config: SurveyConfig =
            serde_json::from_str(json).map_err(|e| SurveyError::Config(e.to_string()))?;
        if config.palette.default_palette.is_empty() {
            return Err(SurveyError::Config("default palette must not be empty".into()));
        }
        if config.map.min_zoom > config.map.max_zoom {
            return Err(SurveyError::Config(format!(
                "min_zoom {} exceeds max_zoom {}",
                config.map.min_zoom, config.map.max_zoom
            )));
        }
        Ok(config)
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Fixes closer than this to the last accepted point are dropped.
    pub min_separation_m: f64,
    /// The uncertainty circle is drawn at `accuracy * factor`.
    pub accuracy_radius_factor: f64,
    pub accuracy_color: String,
    pub route_style: PolylineStyle,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        TrackerConfig {
            min_separation_m: 5.0,
            accuracy_radius_factor: 0.5,
            accuracy_color: "#136aec".to_string(),
            route_style: PolylineStyle {
                color: "#3498db".to_string(),
                weight: 6.0,
                opacity: 0.8,
                dash_array: Some("5,10".to_string()),
            },
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct PaletteConfig {
    pub default_palette: Vec<String>,
    pub dataset_overrides: HashMap<String, Vec<String>>,
}

fn colors(names: &[&str]) -> Vec<String> {
    names.iter().map(|c| c.to_string()).collect()
}

impl Default for PaletteConfig {
    fn default() -> Self {
        let mut dataset_overrides = HashMap::new();
        dataset_overrides.insert(
            "cp4".to_string(),
            colors(&["green", "red", "blue", "orange", "purple", "brown"]),
        );
        PaletteConfig {
            default_palette: colors(&["red", "blue", "green", "orange", "purple", "brown"]),
            dataset_overrides,
        }
    }
}

impl PaletteConfig {
    /// Looks up the exact dataset id first, then the id without its file extension.
    pub fn palette_for(&self, dataset_id: &str) -> &[String] {
        let stem = dataset_id.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(dataset_id);
        self.dataset_overrides
            .get(dataset_id)
            .or_else(|| self.dataset_overrides.get(stem))
            .filter(|palette| !palette.is_empty())
            .map(Vec::as_slice)
            .unwrap_or(self.default_palette.as_slice())
    }
}

pub fn palette_index(cluster_index: u64, palette_len: usize) -> usize {
    if palette_len == 0 {
        return 0;
    }
    (cluster_index % palette_len as u64) as usize
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SavedRoutesConfig {
    pub style: PolylineStyle,
}

impl Default for SavedRoutesConfig {
    fn default() -> Self {
        SavedRoutesConfig {
            style: PolylineStyle {
                color: "#ff0000".to_string(),
                weight: 4.0,
                opacity: 0.8,
                dash_array: None,
            },
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct SpotsConfig {
    pub style: CircleMarkerStyle,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    pub min_zoom: f64,
    pub max_zoom: f64,
    pub initial_center: [f64; 2],
}

impl Default for MapConfig {
    fn default() -> Self {
        MapConfig { min_zoom: 14.0, max_zoom: 17.0, initial_center: [28.522722996428367, 77.16883125123917] }
    }
}

impl MapConfig {
    pub fn clamp_zoom(&self, zoom: f64) -> f64 {
        zoom.clamp(self.min_zoom, self.max_zoom)
    }

    pub fn initial_center(&self) -> Location {
        Location { latitude: self.initial_center[0], longitude: self.initial_center[1] }
    }
}
