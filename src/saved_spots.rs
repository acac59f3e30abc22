use html_escape::encode_text;

use crate::backend::SpotRecord;
use crate::surface::{LayerId, RenderSurface};
use crate::types::{CircleMarkerStyle, PositionFix, RawFix};

pub fn popup_html(spot: &SpotRecord) -> String {
    format!(
        "<strong>{}</strong><br>Observations: {}",
        encode_text(&spot.name),
        spot.observations.len(),
    )
}

/// Bird-spotting locations drawn as circle markers.
pub struct SavedSpots {
    style: CircleMarkerStyle,
    layers: Vec<LayerId>,
}

impl SavedSpots {
    pub fn new(style: CircleMarkerStyle) -> Self {
        SavedSpots { style, layers: Vec::new() }
    }

    pub fn is_shown(&self) -> bool {
        !self.layers.is_empty()
    }

    /// Replaces whatever is currently shown; spots with unusable coordinates are skipped.
    pub fn show<S: RenderSurface>(&mut self, spots: &[SpotRecord], surface: &mut S) {
        self.hide(surface);
        for spot in spots {
            let raw = RawFix { latitude: Some(spot.latitude), longitude: Some(spot.longitude), accuracy: None };
            let location = match PositionFix::try_from(raw) {
                Ok(fix) => fix.location,
                Err(e) => {
                    log::warn!("Skipping spot {}: {}", spot.name, e);
                    continue;
                }
            };
            let layer = surface.add_circle_marker(location, &self.style);
            surface.bind_popup(layer, &popup_html(spot));
            self.layers.push(layer);
        }
        log::info!("Showing {} spots", self.layers.len());
    }

    pub fn hide<S: RenderSurface>(&mut self, surface: &mut S) {
        for layer in self.layers.drain(..) {
            surface.remove_layer(layer);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::testing::{Call, RecordingSurface};
    use crate::types::Location;

    fn spot(name: &str, latitude: f64, longitude: f64) -> SpotRecord {
        SpotRecord { spot_id: None, name: name.to_string(), latitude, longitude, observations: Vec::new() }
    }

    #[test]
    fn test_show_draws_markers_and_hide_removes() {
        let mut surface = RecordingSurface::default();
        let mut spots = SavedSpots::new(CircleMarkerStyle::default());
        spots.show(&[spot("Heron Pond", 28.53, 77.18), spot("Broken", f64::NAN, 77.18), spot("Ridge", 28.52, 77.17)], &mut surface);
        assert_eq!(surface.live.len(), 2);
        assert!(surface.calls.contains(&Call::AddCircleMarker(LayerId(1), Location { latitude: 28.53, longitude: 77.18 })));
        assert!(spots.is_shown());

        spots.show(&[spot("Ridge", 28.52, 77.17)], &mut surface);
        assert_eq!(surface.live.len(), 1);

        spots.hide(&mut surface);
        assert!(surface.live.is_empty());
        assert!(!spots.is_shown());
    }

    #[test]
    fn test_spot_name_markup_is_escaped() {
        let html = popup_html(&spot("<img src=x onerror=alert(1)>", 28.53, 77.18));
        assert!(!html.contains("<img"));
        assert_eq!(html, "<strong>&lt;img src=x onerror=alert(1)&gt;</strong><br>Observations: 0");
    }
}
