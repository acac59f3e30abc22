use crate::config::TrackerConfig;
use crate::surface::{LayerId, RenderSurface};
use crate::types::{Location, PositionFix, Route, RoutePoint};

pub fn distance_meters(a: &Location, b: &Location) -> f64 {
    let ap = haversine_rs::point::Point { latitude: a.latitude, longitude: a.longitude };
    let bp = haversine_rs::point::Point { latitude: b.latitude, longitude: b.longitude };
    haversine_rs::distance(ap, bp, haversine_rs::units::Unit::Meters)
}

/// What happened to a fix handed to the tracker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FixOutcome {
    /// Not recording; only the position indicator moved.
    IndicatorOnly,
    Accepted,
    /// Within the minimum separation of the last accepted point.
    TooClose,
}

struct Indicator {
    marker: LayerId,
    circle: LayerId,
}

pub struct LocationTracker {
    config: TrackerConfig,
    points: Vec<RoutePoint>,
    recording: bool,
    first_fix_seen: bool,
    current: Option<PositionFix>,
    indicator: Option<Indicator>,
    path: Option<LayerId>,
}

impl LocationTracker {
    pub fn new(config: TrackerConfig) -> Self {
        LocationTracker {
            config,
            points: Vec::new(),
            recording: false,
            first_fix_seen: false,
            current: None,
            indicator: None,
            path: None,
        }
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    pub fn current_position(&self) -> Option<&PositionFix> {
        self.current.as_ref()
    }

    pub fn on_position_fix<S: RenderSurface>(&mut self, fix: PositionFix, surface: &mut S) -> FixOutcome {
        self.current = Some(fix);
        self.update_indicator(&fix, surface);

        if !self.first_fix_seen {
            self.first_fix_seen = true;
            surface.set_view(fix.location);
            log::info!("First fix at {}, {}", fix.location.latitude, fix.location.longitude);
        }

        if !self.recording {
            return FixOutcome::IndicatorOnly;
        }

        if let Some(last) = self.points.last() {
            let distance_m = distance_meters(&Location::from(*last), &fix.location);
            if distance_m <= self.config.min_separation_m {
                log::debug!("Dropping fix {:.1} m from the last point", distance_m);
                return FixOutcome::TooClose;
            }
        }

        let point = RoutePoint::from(fix.location);
        self.points.push(point);
        match self.path {
            Some(path) => surface.extend_polyline(path, point),
            None => self.path = Some(surface.add_polyline(&self.points, &self.config.route_style)),
        }
        log::debug!("Accepted route point; now {}", self.points.len());
        FixOutcome::Accepted
    }

    fn update_indicator<S: RenderSurface>(&mut self, fix: &PositionFix, surface: &mut S) {
        if let Some(old) = self.indicator.take() {
            surface.remove_layer(old.marker);
            surface.remove_layer(old.circle);
        }
        let radius_m = fix.accuracy_radius_m * self.config.accuracy_radius_factor;
        self.indicator = Some(Indicator {
            marker: surface.add_marker(fix.location),
            circle: surface.add_circle(fix.location, radius_m, &self.config.accuracy_color),
        });
    }

    /// Starts a fresh route, discarding any buffered points and the drawn path.
    pub fn start_recording<S: RenderSurface>(&mut self, surface: &mut S) {
        self.clear_path(surface);
        self.points.clear();
        self.recording = true;
        log::info!("Route recording started");
    }

    /// Stops recording. Returns the frozen route when it holds any points; the buffer is kept.
    pub fn stop_recording(&mut self) -> Option<Route> {
        self.recording = false;
        log::info!("Route recording stopped with {} points", self.points.len());
        if self.points.is_empty() {
            None
        } else {
            Some(self.route())
        }
    }

    pub fn points(&self) -> &[RoutePoint] {
        &self.points
    }

    pub fn route(&self) -> Route {
        Route { points: self.points.clone(), is_recording: self.recording }
    }

    /// Drops the buffered route and its path, e.g. after it was saved.
    pub fn discard_route<S: RenderSurface>(&mut self, surface: &mut S) {
        self.clear_path(surface);
        self.points.clear();
    }

    fn clear_path<S: RenderSurface>(&mut self, surface: &mut S) {
        if let Some(path) = self.path.take() {
            surface.remove_layer(path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::testing::{Call, RecordingSurface};

    fn tracker() -> LocationTracker {
        LocationTracker::new(TrackerConfig::default())
    }

    fn fix(lat: f64, lng: f64) -> PositionFix {
        PositionFix::new(lat, lng, 10.0)
    }

    #[test]
    fn test_idle_fixes_leave_route_empty() {
        let mut surface = RecordingSurface::default();
        let mut t = tracker();
        for i in 0..20 {
            let outcome = t.on_position_fix(fix(28.5227 + i as f64 * 0.001, 77.1688), &mut surface);
            assert_eq!(outcome, FixOutcome::IndicatorOnly);
        }
        assert!(t.route().points.is_empty());
        assert_eq!(surface.count(|c| matches!(c, Call::AddPolyline(..))), 0);
    }

    #[test]
    fn test_indicator_replaced_on_every_fix() {
        let mut surface = RecordingSurface::default();
        let mut t = tracker();
        t.on_position_fix(fix(28.5227, 77.1688), &mut surface);
        t.on_position_fix(fix(28.5228, 77.1688), &mut surface);
        t.on_position_fix(fix(28.5229, 77.1688), &mut surface);
        assert_eq!(surface.live.len(), 2);
        assert_eq!(surface.count(|c| matches!(c, Call::Remove(_))), 4);
        assert!(surface.calls.contains(&Call::AddCircle(LayerId(6), Location { latitude: 28.5229, longitude: 77.1688 }, 5.0)));
    }

    #[test]
    fn test_duplicate_fix_rejected_distant_fix_accepted() {
        let mut surface = RecordingSurface::default();
        let mut t = tracker();
        t.start_recording(&mut surface);
        assert_eq!(t.on_position_fix(fix(28.5227, 77.1688), &mut surface), FixOutcome::Accepted);
        assert_eq!(t.on_position_fix(fix(28.5227, 77.1688), &mut surface), FixOutcome::TooClose);
        assert_eq!(t.on_position_fix(fix(28.5230, 77.1700), &mut surface), FixOutcome::Accepted);
        assert_eq!(t.route().points.len(), 2);
    }

    #[test]
    fn test_jitter_within_threshold_dropped() {
        let mut surface = RecordingSurface::default();
        let mut t = tracker();
        t.start_recording(&mut surface);
        t.on_position_fix(fix(28.5227, 77.1688), &mut surface);
        // ~3.3 m north
        assert_eq!(t.on_position_fix(fix(28.52273, 77.1688), &mut surface), FixOutcome::TooClose);
        // ~11 m north
        assert_eq!(t.on_position_fix(fix(28.5228, 77.1688), &mut surface), FixOutcome::Accepted);
    }

    #[test]
    fn test_accepted_points_respect_min_separation() {
        let mut surface = RecordingSurface::default();
        let mut t = tracker();
        t.start_recording(&mut surface);
        let mut lat = 28.5227;
        for i in 0..200 {
            lat += if i % 3 == 0 { 0.00007 } else { 0.00002 };
            t.on_position_fix(fix(lat, 77.1688), &mut surface);
        }
        let points = t.route().points;
        assert!(points.len() > 1);
        for pair in points.windows(2) {
            let d = distance_meters(&Location::from(pair[0]), &Location::from(pair[1]));
            assert!(d > 5.0, "accepted pair only {} m apart", d);
        }
    }

    #[test]
    fn test_path_extended_incrementally() {
        let mut surface = RecordingSurface::default();
        let mut t = tracker();
        t.start_recording(&mut surface);
        t.on_position_fix(fix(28.5227, 77.1688), &mut surface);
        t.on_position_fix(fix(28.5237, 77.1688), &mut surface);
        t.on_position_fix(fix(28.5247, 77.1688), &mut surface);
        assert_eq!(surface.count(|c| matches!(c, Call::AddPolyline(..))), 1);
        assert_eq!(surface.count(|c| matches!(c, Call::ExtendPolyline(..))), 2);
    }

    #[test]
    fn test_start_recording_resets_buffer_and_path() {
        let mut surface = RecordingSurface::default();
        let mut t = tracker();
        t.start_recording(&mut surface);
        t.on_position_fix(fix(28.5227, 77.1688), &mut surface);
        t.on_position_fix(fix(28.5237, 77.1688), &mut surface);
        let route = t.stop_recording().unwrap();
        assert_eq!(route.points.len(), 2);
        assert!(!route.is_recording);
        // The buffer survives stop so the save can be retried.
        assert_eq!(t.route().points.len(), 2);

        t.start_recording(&mut surface);
        assert!(t.route().points.is_empty());
        assert!(t.route().is_recording);
        assert_eq!(surface.live.len(), 2);
    }

    #[test]
    fn test_restart_while_recording_clears_buffer_and_path() {
        let mut surface = RecordingSurface::default();
        let mut t = tracker();
        t.start_recording(&mut surface);
        t.on_position_fix(fix(28.5227, 77.1688), &mut surface);
        t.on_position_fix(fix(28.5237, 77.1688), &mut surface);
        let path = surface
            .calls
            .iter()
            .find_map(|c| match c {
                Call::AddPolyline(id, _) => Some(*id),
                _ => None,
            })
            .unwrap();

        t.start_recording(&mut surface);
        assert!(t.is_recording());
        assert!(t.points().is_empty());
        assert!(!surface.live.contains(&path));
        assert!(surface.calls.contains(&Call::Remove(path)));

        // The next accepted fix starts a new path rather than extending the old one.
        t.on_position_fix(fix(28.5247, 77.1688), &mut surface);
        assert_eq!(t.points().len(), 1);
        assert_eq!(surface.count(|c| matches!(c, Call::AddPolyline(..))), 2);
    }

    #[test]
    fn test_stop_with_empty_buffer_yields_nothing() {
        let mut surface = RecordingSurface::default();
        let mut t = tracker();
        t.start_recording(&mut surface);
        assert!(t.stop_recording().is_none());
        assert!(!t.is_recording());
    }

    #[test]
    fn test_first_fix_recentres_once() {
        let mut surface = RecordingSurface::default();
        let mut t = tracker();
        for cycle in 0..3 {
            t.start_recording(&mut surface);
            t.on_position_fix(fix(28.5227 + cycle as f64 * 0.01, 77.1688), &mut surface);
            t.on_position_fix(fix(28.5327 + cycle as f64 * 0.01, 77.1688), &mut surface);
            t.stop_recording();
        }
        assert_eq!(surface.count(|c| matches!(c, Call::SetView(_))), 1);
        assert_eq!(surface.calls.iter().find(|c| matches!(c, Call::SetView(_))),
            Some(&Call::SetView(Location { latitude: 28.5227, longitude: 77.1688 })));
    }

    #[test]
    fn test_discard_route_removes_path() {
        let mut surface = RecordingSurface::default();
        let mut t = tracker();
        t.start_recording(&mut surface);
        t.on_position_fix(fix(28.5227, 77.1688), &mut surface);
        t.stop_recording();
        t.discard_route(&mut surface);
        assert!(t.route().points.is_empty());
        // Only the position marker and circle remain.
        assert_eq!(surface.live.len(), 2);
    }
}
