use crate::backend::{RoutePayload, SpotRecord};
use crate::config::SurveyConfig;
use crate::error::SurveyError;
use crate::overlay::OverlayManager;
use crate::saved_routes::SavedRoutes;
use crate::saved_spots::SavedSpots;
use crate::surface::RenderSurface;
use crate::tracker::{FixOutcome, LocationTracker};
use crate::types::{OverlayDescriptor, PositionFix, RawFix, Route, RoutePoint};

/// Owns the map surface and every component drawing on it.
///
/// Events are handled one at a time; each call runs to completion before the next.
pub struct MapContext<S: RenderSurface> {
    surface: S,
    tracker: LocationTracker,
    overlays: OverlayManager,
    saved_routes: SavedRoutes,
    spots: SavedSpots,
}

impl<S: RenderSurface> MapContext<S> {
    pub fn new(surface: S, config: &SurveyConfig) -> Self {
        MapContext {
            surface,
            tracker: LocationTracker::new(config.tracker.clone()),
            overlays: OverlayManager::new(config.palette.clone()),
            saved_routes: SavedRoutes::new(config.saved_routes.style.clone()),
            spots: SavedSpots::new(config.spots.style.clone()),
        }
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn tracker(&self) -> &LocationTracker {
        &self.tracker
    }

    pub fn overlays(&self) -> &OverlayManager {
        &self.overlays
    }

    /// Invalid fixes are dropped and yield `None`.
    pub fn on_position_fix(&mut self, raw: RawFix) -> Option<FixOutcome> {
        match PositionFix::try_from(raw) {
            Ok(fix) => Some(self.tracker.on_position_fix(fix, &mut self.surface)),
            Err(e) => {
                log::debug!("Ignoring fix: {}", e);
                None
            }
        }
    }

    pub fn start_recording(&mut self) {
        self.tracker.start_recording(&mut self.surface)
    }

    /// Returns the route to hand to the save workflow, if anything was recorded.
    pub fn stop_recording(&mut self) -> Option<Route> {
        self.tracker.stop_recording()
    }

    /// Record/save button: starts when idle, stops when recording.
    pub fn toggle_recording(&mut self) -> Option<Route> {
        if self.tracker.is_recording() {
            self.stop_recording()
        } else {
            self.start_recording();
            None
        }
    }

    pub fn route(&self) -> Route {
        self.tracker.route()
    }

    pub fn discard_route(&mut self) {
        self.tracker.discard_route(&mut self.surface)
    }

    /// Snapshots the buffered route for upload. Refused while recording or when nothing was recorded.
    pub fn begin_save(&self, name: Option<&str>, created_at: String) -> Result<RoutePayload, SurveyError> {
        if self.tracker.is_recording() {
            return Err(SurveyError::SaveRefused("stop recording first".into()));
        }
        if self.tracker.points().is_empty() {
            return Err(SurveyError::SaveRefused("no route points to save".into()));
        }
        Ok(RoutePayload::new(&self.tracker.route(), name, created_at))
    }

    /// Applies the backend's answer to a save started with `begin_save`.
    ///
    /// On success the buffer is discarded, but only if the tracker is idle and still holds
    /// exactly `saved_points`; a route recorded while the request was in flight is kept.
    /// On failure the buffer is left alone so the save can be retried.
    pub fn finish_save(
        &mut self,
        saved_points: &[RoutePoint],
        outcome: Result<String, SurveyError>,
    ) -> Result<String, SurveyError> {
        match outcome {
            Ok(message) => {
                if !self.tracker.is_recording() && self.tracker.points() == saved_points {
                    self.tracker.discard_route(&mut self.surface);
                } else {
                    log::info!("Route changed during save; keeping the current buffer");
                }
                Ok(message)
            }
            Err(e) => {
                log::error!("Error saving route: {}", e);
                Err(e)
            }
        }
    }

    pub fn register_overlay(&mut self, descriptor: OverlayDescriptor) -> Result<(), SurveyError> {
        self.overlays.register(descriptor)
    }

    pub fn select_overlay(&mut self, key: &str) -> Result<(), SurveyError> {
        self.overlays.select(key, &mut self.surface)
    }

    pub fn clear_overlay(&mut self) {
        self.overlays.clear(&mut self.surface)
    }

    pub fn show_saved_routes(&mut self, routes: &[RoutePayload]) {
        self.saved_routes.show(routes, &mut self.surface)
    }

    pub fn hide_saved_routes(&mut self) {
        self.saved_routes.hide(&mut self.surface)
    }

    pub fn saved_routes_shown(&self) -> bool {
        self.saved_routes.is_shown()
    }

    pub fn show_spots(&mut self, spots: &[SpotRecord]) {
        self.spots.show(spots, &mut self.surface)
    }

    pub fn hide_spots(&mut self) {
        self.spots.hide(&mut self.surface)
    }
}
