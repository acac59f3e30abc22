use std::cell::RefCell;
use std::rc::Rc;

use log::Level;
use serde::Serialize;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;
use wasm_bindgen_futures::js_sys;

pub mod backend;
pub mod config;
pub mod context;
pub mod error;
pub mod overlay;
pub mod saved_routes;
pub mod saved_spots;
pub mod surface;
pub mod tracker;
pub mod types;

use self::backend::Backend;
use self::config::SurveyConfig;
use self::context::MapContext;
use self::error::SurveyError;
use self::surface::JsRenderSurface;
use self::tracker::FixOutcome;
use self::types::{OverlayDescriptor, RawFix};

impl From<SurveyError> for JsValue {
    fn from(e: SurveyError) -> Self {
        JsValue::from_str(&e.to_string())
    }
}

fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(value).map_err(|e| JsValue::from_str(&e.to_string()))
}

#[wasm_bindgen]
pub fn rust_init(level: Option<String>) -> Result<(), JsValue> {
    let level = level.and_then(|l| l.parse().ok()).unwrap_or(Level::Info);
    console_log::init_with_level(level).map_err(|e| JsValue::from_str(&e.to_string()))?;
    log::info!("Logger initialized from library");
    Ok(())
}

/// The page-facing handle: one per map.
#[wasm_bindgen]
pub struct SurveyMap {
    context: Rc<RefCell<MapContext<JsRenderSurface>>>,
    backend: Backend,
    config: SurveyConfig,
}

#[wasm_bindgen]
impl SurveyMap {
    #[wasm_bindgen(constructor)]
    pub fn new(surface: JsRenderSurface, config_json: &str) -> Result<SurveyMap, JsValue> {
        let config = SurveyConfig::from_json(config_json)?;
        log::info!("Survey map using backend {}", config.api_base);
        Ok(SurveyMap {
            context: Rc::new(RefCell::new(MapContext::new(surface, &config))),
            backend: Backend::new(&config.api_base),
            config,
        })
    }

    /// Feed for the host's location watcher. Returns what happened to the fix, or nothing if it was invalid.
    #[wasm_bindgen(js_name = onLocationFound)]
    pub fn on_location_found(&self, fix: JsValue) -> Option<String> {
        let raw: RawFix = match serde_wasm_bindgen::from_value(fix) {
            Ok(raw) => raw,
            Err(e) => {
                log::debug!("Unreadable fix: {}", e);
                return None;
            }
        };
        let outcome = self.context.borrow_mut().on_position_fix(raw)?;
        let label = match outcome {
            FixOutcome::IndicatorOnly => "indicator",
            FixOutcome::Accepted => "accepted",
            FixOutcome::TooClose => "too-close",
        };
        Some(label.to_string())
    }

    #[wasm_bindgen(js_name = startRecording)]
    pub fn start_recording(&self) {
        self.context.borrow_mut().start_recording()
    }

    /// Resolves to the frozen route, or `null` when nothing was recorded.
    #[wasm_bindgen(js_name = stopRecording)]
    pub fn stop_recording(&self) -> Result<JsValue, JsValue> {
        match self.context.borrow_mut().stop_recording() {
            Some(route) => to_js(&route),
            None => Ok(JsValue::NULL),
        }
    }

    #[wasm_bindgen(js_name = toggleRecording)]
    pub fn toggle_recording(&self) -> Result<JsValue, JsValue> {
        match self.context.borrow_mut().toggle_recording() {
            Some(route) => to_js(&route),
            None => Ok(JsValue::NULL),
        }
    }

    #[wasm_bindgen(js_name = isRecording)]
    pub fn is_recording(&self) -> bool {
        self.context.borrow().tracker().is_recording()
    }

    pub fn route(&self) -> Result<JsValue, JsValue> {
        to_js(&self.context.borrow().route())
    }

    /// Sends the stopped route to the backend. The buffer is cleared only if the save succeeds
    /// and nothing new was recorded meanwhile; shown saved routes are refreshed afterwards.
    #[wasm_bindgen(js_name = saveRoute)]
    pub fn save_route(&self, name: Option<String>) -> js_sys::Promise {
        let created_at = String::from(js_sys::Date::new_0().to_iso_string());
        let payload = self.context.borrow().begin_save(name.as_deref(), created_at);
        let backend = self.backend.clone();
        let context = Rc::clone(&self.context);
        future_to_promise(async move {
            let payload = payload?;
            let outcome = backend.save_route(&payload).await;
            let (message, refresh) = {
                let mut context = context.borrow_mut();
                let message = context.finish_save(&payload.points, outcome)?;
                (message, context.saved_routes_shown())
            };
            if refresh {
                match backend.fetch_routes().await {
                    Ok(routes) => context.borrow_mut().show_saved_routes(&routes),
                    Err(e) => log::warn!("Could not refresh saved routes: {}", e),
                }
            }
            Ok(JsValue::from_str(&message))
        })
    }

    #[wasm_bindgen(js_name = discardRoute)]
    pub fn discard_route(&self) {
        self.context.borrow_mut().discard_route()
    }

    #[wasm_bindgen(js_name = registerOverlay)]
    pub fn register_overlay(&self, descriptor: JsValue) -> Result<(), JsValue> {
        let descriptor: OverlayDescriptor =
            serde_wasm_bindgen::from_value(descriptor).map_err(|e| JsValue::from_str(&e.to_string()))?;
        Ok(self.context.borrow_mut().register_overlay(descriptor)?)
    }

    /// `"clear"` removes the active overlay.
    #[wasm_bindgen(js_name = selectOverlay)]
    pub fn select_overlay(&self, key: &str) -> Result<(), JsValue> {
        Ok(self.context.borrow_mut().select_overlay(key)?)
    }

    #[wasm_bindgen(js_name = clearOverlay)]
    pub fn clear_overlay(&self) {
        self.context.borrow_mut().clear_overlay()
    }

    #[wasm_bindgen(js_name = activeOverlay)]
    pub fn active_overlay(&self) -> Option<String> {
        self.context.borrow().overlays().active_key().map(String::from)
    }

    /// Registers every stratification of every site and resolves to the site list for the controls.
    #[wasm_bindgen(js_name = loadSites)]
    pub fn load_sites(&self) -> js_sys::Promise {
        let backend = self.backend.clone();
        let context = Rc::clone(&self.context);
        future_to_promise(async move {
            let sites = backend.fetch_sites().await?;
            {
                let mut context = context.borrow_mut();
                for descriptor in sites.iter().flat_map(|site| site.descriptors()) {
                    if let Err(e) = context.register_overlay(descriptor) {
                        log::warn!("Skipping stratification: {}", e);
                    }
                }
            }
            to_js(&sites)
        })
    }

    /// Fetches a clustered GeoJSON layer, registers it under `key` and shows it.
    #[wasm_bindgen(js_name = loadVectorOverlay)]
    pub fn load_vector_overlay(&self, key: String, url: String) -> js_sys::Promise {
        let backend = self.backend.clone();
        let context = Rc::clone(&self.context);
        future_to_promise(async move {
            let registered = context.borrow().overlays().get(&key).is_some();
            if !registered {
                let features = backend.fetch_feature_collection(&url).await.map_err(|e| {
                    log::error!("Error loading {}: {}", url, e);
                    JsValue::from(e)
                })?;
                context.borrow_mut().register_overlay(OverlayDescriptor::vector(&key, &url, features))?;
            }
            context.borrow_mut().select_overlay(&key)?;
            Ok(JsValue::UNDEFINED)
        })
    }

    #[wasm_bindgen(js_name = showSavedRoutes)]
    pub fn show_saved_routes(&self) -> js_sys::Promise {
        let backend = self.backend.clone();
        let context = Rc::clone(&self.context);
        future_to_promise(async move {
            let routes = backend.fetch_routes().await?;
            context.borrow_mut().show_saved_routes(&routes);
            Ok(JsValue::from_f64(routes.len() as f64))
        })
    }

    #[wasm_bindgen(js_name = hideSavedRoutes)]
    pub fn hide_saved_routes(&self) {
        self.context.borrow_mut().hide_saved_routes()
    }

    /// Draws the bird-spotting locations; resolves to the spot list for the details panel.
    #[wasm_bindgen(js_name = showSpots)]
    pub fn show_spots(&self) -> js_sys::Promise {
        let backend = self.backend.clone();
        let context = Rc::clone(&self.context);
        future_to_promise(async move {
            let spots = backend.fetch_spots().await.map_err(|e| {
                log::error!("Error fetching spots: {}", e);
                JsValue::from(e)
            })?;
            context.borrow_mut().show_spots(&spots);
            to_js(&spots)
        })
    }

    #[wasm_bindgen(js_name = hideSpots)]
    pub fn hide_spots(&self) {
        self.context.borrow_mut().hide_spots()
    }

    /// Zoom to apply after a zoom-end event.
    #[wasm_bindgen(js_name = clampZoom)]
    pub fn clamp_zoom(&self, zoom: f64) -> f64 {
        self.config.map.clamp_zoom(zoom)
    }

    #[wasm_bindgen(js_name = initialCenter)]
    pub fn initial_center(&self) -> Vec<f64> {
        let center = self.config.map.initial_center();
        vec![center.latitude, center.longitude]
    }
}
