use html_escape::encode_text;

use crate::backend::RoutePayload;
use crate::surface::{LayerId, RenderSurface};
use crate::types::PolylineStyle;

pub fn popup_html(route: &RoutePayload) -> String {
    format!(
        "<strong>{}</strong><br>Points: {}<br>Date: {}",
        encode_text(route.name.as_deref().unwrap_or("Unnamed Route")),
        route.point_count(),
        encode_text(route.created_at.as_deref().unwrap_or("Unknown")),
    )
}

/// Previously saved routes drawn on the map.
pub struct SavedRoutes {
    style: PolylineStyle,
    layers: Vec<LayerId>,
}

impl SavedRoutes {
    pub fn new(style: PolylineStyle) -> Self {
        SavedRoutes { style, layers: Vec::new() }
    }

    pub fn is_shown(&self) -> bool {
        !self.layers.is_empty()
    }

    /// Replaces whatever is currently shown.
    pub fn show<S: RenderSurface>(&mut self, routes: &[RoutePayload], surface: &mut S) {
        self.hide(surface);
        for route in routes.iter().filter(|r| !r.points.is_empty()) {
            let layer = surface.add_polyline(&route.points, &self.style);
            surface.bind_popup(layer, &popup_html(route));
            self.layers.push(layer);
        }
        log::info!("Showing {} saved routes", self.layers.len());
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
    use crate::config::SavedRoutesConfig;
    use crate::surface::testing::{Call, RecordingSurface};
    use crate::types::RoutePoint;

    fn payload(name: Option<&str>, n: usize) -> RoutePayload {
        RoutePayload {
            name: name.map(String::from),
            created_at: None,
            points: (0..n).map(|i| RoutePoint { lat: 28.5 + i as f64 * 0.001, lng: 77.1 }).collect(),
            point_count: None,
        }
    }

    #[test]
    fn test_popup_defaults() {
        assert_eq!(popup_html(&payload(None, 3)), "<strong>Unnamed Route</strong><br>Points: 3<br>Date: Unknown");
    }

    #[test]
    fn test_popup_escapes_markup() {
        let mut route = payload(Some("<img src=x onerror=alert(1)>"), 2);
        route.created_at = Some("<b>today</b>".into());
        let html = popup_html(&route);
        assert!(!html.contains("<img"));
        assert!(!html.contains("<b>"));
        assert_eq!(
            html,
            "<strong>&lt;img src=x onerror=alert(1)&gt;</strong><br>Points: 2<br>Date: &lt;b&gt;today&lt;/b&gt;"
        );
    }

    #[test]
    fn test_show_replaces_and_hide_removes() {
        let mut surface = RecordingSurface::default();
        let mut saved = SavedRoutes::new(SavedRoutesConfig::default().style);
        saved.show(&[payload(Some("a"), 2), payload(Some("b"), 4), payload(None, 0)], &mut surface);
        assert_eq!(surface.live.len(), 2);
        assert_eq!(surface.count(|c| matches!(c, Call::BindPopup(..))), 2);

        saved.show(&[payload(Some("c"), 2)], &mut surface);
        assert_eq!(surface.live.len(), 1);

        saved.hide(&mut surface);
        assert!(surface.live.is_empty());
        assert!(!saved.is_shown());
    }
}
