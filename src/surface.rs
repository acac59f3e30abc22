use serde::Serialize;
use wasm_bindgen::prelude::*;

use crate::types::{CircleMarkerStyle, GeoBounds, Location, PolylineStyle, RoutePoint, StyledFeature};

/// Handle to a layer living on the render surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LayerId(pub u32);

/// Everything the survey core needs from the map library.
pub trait RenderSurface {
    fn add_marker(&mut self, at: Location) -> LayerId;
    fn add_circle(&mut self, at: Location, radius_m: f64, color: &str) -> LayerId;
    fn add_circle_marker(&mut self, at: Location, style: &CircleMarkerStyle) -> LayerId;
    fn remove_layer(&mut self, layer: LayerId);
    fn add_polyline(&mut self, points: &[RoutePoint], style: &PolylineStyle) -> LayerId;
    fn extend_polyline(&mut self, layer: LayerId, point: RoutePoint);
    fn bind_popup(&mut self, layer: LayerId, html: &str);
    fn add_image_overlay(&mut self, source_ref: &str, bounds: &GeoBounds) -> LayerId;
    fn add_vector_layer(&mut self, features: &[StyledFeature]) -> LayerId;
    fn fit_bounds(&mut self, bounds: &GeoBounds);
    /// Recentres the view, keeping the current zoom.
    fn set_view(&mut self, center: Location);
}

#[wasm_bindgen]
extern "C" {
    /// JS object implementing the render surface on top of the page's map.
    pub type JsRenderSurface;

    #[wasm_bindgen(method, js_name = addMarker)]
    fn js_add_marker(this: &JsRenderSurface, lat: f64, lng: f64) -> u32;

    #[wasm_bindgen(method, js_name = addCircle)]
    fn js_add_circle(this: &JsRenderSurface, lat: f64, lng: f64, radius: f64, color: &str) -> u32;

    #[wasm_bindgen(method, js_name = addCircleMarker)]
    fn js_add_circle_marker(this: &JsRenderSurface, lat: f64, lng: f64, style: JsValue) -> u32;

    #[wasm_bindgen(method, js_name = removeLayer)]
    fn js_remove_layer(this: &JsRenderSurface, layer: u32);

    #[wasm_bindgen(method, js_name = addPolyline)]
    fn js_add_polyline(this: &JsRenderSurface, points: JsValue, style: JsValue) -> u32;

    #[wasm_bindgen(method, js_name = extendPolyline)]
    fn js_extend_polyline(this: &JsRenderSurface, layer: u32, lat: f64, lng: f64);

    #[wasm_bindgen(method, js_name = bindPopup)]
    fn js_bind_popup(this: &JsRenderSurface, layer: u32, html: &str);

    #[wasm_bindgen(method, js_name = addImageOverlay)]
    fn js_add_image_overlay(this: &JsRenderSurface, source: &str, bounds: JsValue) -> u32;

    #[wasm_bindgen(method, js_name = addVectorLayer)]
    fn js_add_vector_layer(this: &JsRenderSurface, features: JsValue) -> u32;

    #[wasm_bindgen(method, js_name = fitBounds)]
    fn js_fit_bounds(this: &JsRenderSurface, bounds: JsValue);

    #[wasm_bindgen(method, js_name = setView)]
    fn js_set_view(this: &JsRenderSurface, lat: f64, lng: f64);
}

fn to_js<T: Serialize>(value: &T) -> JsValue {
    serde_wasm_bindgen::to_value(value).unwrap_or_else(|e| {
        log::error!("Failed to convert value for the map: {}", e);
        JsValue::NULL
    })
}

impl RenderSurface for JsRenderSurface {
    fn add_marker(&mut self, at: Location) -> LayerId {
        LayerId(self.js_add_marker(at.latitude, at.longitude))
    }

    fn add_circle(&mut self, at: Location, radius_m: f64, color: &str) -> LayerId {
        LayerId(self.js_add_circle(at.latitude, at.longitude, radius_m, color))
    }

    fn add_circle_marker(&mut self, at: Location, style: &CircleMarkerStyle) -> LayerId {
        LayerId(self.js_add_circle_marker(at.latitude, at.longitude, to_js(style)))
    }

    fn remove_layer(&mut self, layer: LayerId) {
        self.js_remove_layer(layer.0)
    }

    fn add_polyline(&mut self, points: &[RoutePoint], style: &PolylineStyle) -> LayerId {
        let latlngs: Vec<[f64; 2]> = points.iter().map(|p| [p.lat, p.lng]).collect();
        LayerId(self.js_add_polyline(to_js(&latlngs), to_js(style)))
    }

    fn extend_polyline(&mut self, layer: LayerId, point: RoutePoint) {
        self.js_extend_polyline(layer.0, point.lat, point.lng)
    }

    fn bind_popup(&mut self, layer: LayerId, html: &str) {
        self.js_bind_popup(layer.0, html)
    }

    fn add_image_overlay(&mut self, source_ref: &str, bounds: &GeoBounds) -> LayerId {
        LayerId(self.js_add_image_overlay(source_ref, to_js(bounds)))
    }

    fn add_vector_layer(&mut self, features: &[StyledFeature]) -> LayerId {
        LayerId(self.js_add_vector_layer(to_js(&features)))
    }

    fn fit_bounds(&mut self, bounds: &GeoBounds) {
        self.js_fit_bounds(to_js(bounds))
    }

    fn set_view(&mut self, center: Location) {
        self.js_set_view(center.latitude, center.longitude)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    pub enum Call {
        AddMarker(LayerId, Location),
        AddCircle(LayerId, Location, f64),
        AddCircleMarker(LayerId, Location),
        Remove(LayerId),
        AddPolyline(LayerId, Vec<RoutePoint>),
        ExtendPolyline(LayerId, RoutePoint),
        BindPopup(LayerId, String),
        AddImage(LayerId, String, GeoBounds),
        AddVector(LayerId, Vec<StyledFeature>),
        FitBounds(GeoBounds),
        SetView(Location),
    }

    /// Records every call and tracks which layers are on the map.
    #[derive(Default)]
    pub struct RecordingSurface {
        pub calls: Vec<Call>,
        pub live: Vec<LayerId>,
        next_id: u32,
    }

    impl RecordingSurface {
        fn alloc(&mut self) -> LayerId {
            self.next_id += 1;
            let id = LayerId(self.next_id);
            self.live.push(id);
            id
        }

        pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
            self.calls.iter().filter(|c| pred(c)).count()
        }
    }

    impl RenderSurface for RecordingSurface {
        fn add_marker(&mut self, at: Location) -> LayerId {
            let id = self.alloc();
            self.calls.push(Call::AddMarker(id, at));
            id
        }

        fn add_circle(&mut self, at: Location, radius_m: f64, _color: &str) -> LayerId {
            let id = self.alloc();
            self.calls.push(Call::AddCircle(id, at, radius_m));
            id
        }

        fn add_circle_marker(&mut self, at: Location, _style: &CircleMarkerStyle) -> LayerId {
            let id = self.alloc();
            self.calls.push(Call::AddCircleMarker(id, at));
            id
        }

        fn remove_layer(&mut self, layer: LayerId) {
            self.live.retain(|l| *l != layer);
            self.calls.push(Call::Remove(layer));
        }

        fn add_polyline(&mut self, points: &[RoutePoint], _style: &PolylineStyle) -> LayerId {
            let id = self.alloc();
            self.calls.push(Call::AddPolyline(id, points.to_vec()));
            id
        }

        fn extend_polyline(&mut self, layer: LayerId, point: RoutePoint) {
            self.calls.push(Call::ExtendPolyline(layer, point));
        }

        fn bind_popup(&mut self, layer: LayerId, html: &str) {
            self.calls.push(Call::BindPopup(layer, html.to_string()));
        }

        fn add_image_overlay(&mut self, source_ref: &str, bounds: &GeoBounds) -> LayerId {
            let id = self.alloc();
            self.calls.push(Call::AddImage(id, source_ref.to_string(), *bounds));
            id
        }

        fn add_vector_layer(&mut self, features: &[StyledFeature]) -> LayerId {
            let id = self.alloc();
            self.calls.push(Call::AddVector(id, features.to_vec()));
            id
        }

        fn fit_bounds(&mut self, bounds: &GeoBounds) {
            self.calls.push(Call::FitBounds(*bounds));
        }

        fn set_view(&mut self, center: Location) {
            self.calls.push(Call::SetView(center));
        }
    }
}
