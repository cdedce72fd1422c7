use tracing::{debug, warn};
use uuid::Uuid;

use crate::items::dto::FoodItem;
use crate::map::surface::{Bounds, FitOptions, LatLng, LayerId, MapSurface, MarkerKind};

pub const INITIAL_ZOOM: u8 = 13;
pub const VIEWER_POPUP: &str = "Your Location";
pub const MARKER_FIT: FitOptions = FitOptions {
    padding: 50,
    max_zoom: Some(15),
};
pub const ROUTE_FIT: FitOptions = FitOptions {
    padding: 60,
    max_zoom: None,
};

/// Emitted once item markers are on the surface; consumed by `fit_markers`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarkersPlaced {
    pub placed: usize,
    /// Viewer plus every placed marker.
    pub bounds: Bounds,
}

pub fn item_position(item: &FoodItem) -> Option<LatLng> {
    item.location
        .as_ref()
        .map(|l| LatLng::new(l.lat, l.lng))
        .filter(LatLng::is_finite)
}

fn popup_text(item: &FoodItem) -> String {
    let mut text = format!("{}\n{} {}", item.title, item.quantity, item.unit);
    if !item.description.is_empty() {
        text.push('\n');
        text.push_str(&item.description);
    }
    text.push_str("\nShared by ");
    text.push_str(&item.poster.name);
    text
}

struct Ready {
    viewer_marker: LayerId,
}

/// Drives a map widget from the viewer location and the item collection.
///
/// Until a viewer location arrives the map is a placeholder and the surface
/// is never touched.
pub struct MapPresenter<S: MapSurface> {
    surface: S,
    viewer: Option<LatLng>,
    ready: Option<Ready>,
    items: Vec<FoodItem>,
    markers: Vec<(Uuid, LayerId)>,
    selected: Option<Uuid>,
    route: Option<LayerId>,
}

impl<S: MapSurface> MapPresenter<S> {
    pub fn new(surface: S) -> Self {
        Self {
            surface,
            viewer: None,
            ready: None,
            items: Vec::new(),
            markers: Vec::new(),
            selected: None,
            route: None,
        }
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn into_surface(self) -> S {
        self.surface
    }

    pub fn is_ready(&self) -> bool {
        self.ready.is_some()
    }

    pub fn viewer(&self) -> Option<LatLng> {
        self.viewer
    }

    /// The first call initializes the map; later calls only move the anchor
    /// used for fitting and directions.
    pub fn set_viewer_location(&mut self, at: LatLng) -> Option<MarkersPlaced> {
        if !at.is_finite() {
            warn!(lat = at.lat, lng = at.lng, "ignoring non-finite viewer location");
            return None;
        }
        self.viewer = Some(at);
        if self.ready.is_some() {
            return None;
        }

        self.surface.set_view(at, INITIAL_ZOOM);
        let viewer_marker = self
            .surface
            .add_marker(at, MarkerKind::Viewer, VIEWER_POPUP.to_string());
        self.ready = Some(Ready { viewer_marker });
        debug!("map ready");

        if self.items.is_empty() {
            None
        } else {
            let items = std::mem::take(&mut self.items);
            self.place_markers(items)
        }
    }

    /// Replaces every item marker. `None` while the map is a placeholder.
    pub fn place_markers(&mut self, items: Vec<FoodItem>) -> Option<MarkersPlaced> {
        self.items = items;
        let viewer = self.viewer?;
        if self.ready.is_none() {
            return None;
        }

        for (_, layer) in self.markers.drain(..) {
            self.surface.remove_layer(layer);
        }

        let mut bounds = Bounds::around(viewer);
        for item in &self.items {
            let Some(at) = item_position(item) else {
                continue;
            };
            let layer = self
                .surface
                .add_marker(at, MarkerKind::Item(item.id), popup_text(item));
            self.markers.push((item.id, layer));
            bounds.extend(at);
        }

        if let Some(id) = self.selected {
            if !self.markers.iter().any(|(item_id, _)| *item_id == id) {
                self.close_overlay();
            }
        }

        Some(MarkersPlaced {
            placed: self.markers.len(),
            bounds,
        })
    }

    /// Fits the view to the placed markers; skipped when none were placed.
    pub fn fit_markers(&mut self, placed: MarkersPlaced) -> bool {
        if placed.placed == 0 || self.ready.is_none() {
            return false;
        }
        self.surface.fit_bounds(placed.bounds, MARKER_FIT);
        true
    }

    pub fn show_items(&mut self, items: Vec<FoodItem>) {
        if let Some(placed) = self.place_markers(items) {
            self.fit_markers(placed);
        }
    }

    pub fn selected(&self) -> Option<&FoodItem> {
        let id = self.selected?;
        self.items.iter().find(|item| item.id == id)
    }

    /// Opens the info overlay and the marker popup for a placed item.
    pub fn select(&mut self, item_id: Uuid) -> bool {
        let Some(&(_, layer)) = self.markers.iter().find(|(id, _)| *id == item_id) else {
            return false;
        };
        if self.selected != Some(item_id) {
            self.clear_route();
        }
        self.selected = Some(item_id);
        self.surface.open_popup(layer);
        true
    }

    /// Draws a straight line from the viewer to the selected item.
    pub fn request_directions(&mut self) -> bool {
        let (Some(viewer), Some(target)) = (self.viewer, self.selected().and_then(item_position))
        else {
            return false;
        };
        if self.ready.is_none() {
            return false;
        }

        self.clear_route();
        self.route = Some(self.surface.add_polyline(vec![viewer, target]));
        let mut bounds = Bounds::around(viewer);
        bounds.extend(target);
        self.surface.fit_bounds(bounds, ROUTE_FIT);
        true
    }

    pub fn close_overlay(&mut self) {
        self.selected = None;
        self.clear_route();
    }

    fn clear_route(&mut self) {
        if let Some(route) = self.route.take() {
            self.surface.remove_layer(route);
        }
    }

    /// Removes the map and returns to the uninitialized state.
    pub fn teardown(&mut self) {
        if let Some(ready) = self.ready.take() {
            debug!(viewer_marker = ready.viewer_marker.0, "removing map");
            self.surface.remove();
        }
        self.viewer = None;
        self.items.clear();
        self.markers.clear();
        self.selected = None;
        self.route = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::items::dto::{Location, Poster};
    use crate::map::scene::SceneSurface;
    use crate::store::MemoryStore;

    fn item_at(lat: f64, lng: f64) -> FoodItem {
        let mut item = FoodItem::from_row(
            MemoryStore::raw_item(Uuid::new_v4(), "Bread"),
            Poster {
                name: "Ben".into(),
                avatar: String::new(),
            },
        );
        item.location = Some(Location {
            lat,
            lng,
            address: String::new(),
        });
        item
    }

    fn berlin() -> LatLng {
        LatLng::new(52.52, 13.405)
    }

    fn ready_presenter() -> MapPresenter<SceneSurface> {
        let mut presenter = MapPresenter::new(SceneSurface::new());
        presenter.set_viewer_location(berlin());
        presenter
    }

    #[test]
    fn placeholder_never_touches_surface() {
        let mut presenter = MapPresenter::new(SceneSurface::new());
        assert!(presenter.place_markers(vec![item_at(52.5, 13.4)]).is_none());
        assert!(!presenter.select(Uuid::new_v4()));
        assert!(!presenter.request_directions());
        assert!(!presenter.is_ready());
        assert_eq!(presenter.surface().calls(), 0);
    }

    #[test]
    fn first_location_initializes_once() {
        let mut presenter = ready_presenter();
        presenter.set_viewer_location(LatLng::new(48.1, 11.6));

        let scene = presenter.surface().scene();
        assert_eq!(scene.markers.len(), 1);
        assert_eq!(scene.markers[0].kind, MarkerKind::Viewer);
        assert_eq!(scene.markers[0].popup, VIEWER_POPUP);
        assert_eq!(scene.markers[0].position, berlin());
        assert_eq!(presenter.viewer(), Some(LatLng::new(48.1, 11.6)));
    }

    #[test]
    fn markers_only_for_finite_coordinates() {
        let mut presenter = ready_presenter();
        let items = vec![
            item_at(52.5, 13.4),
            item_at(f64::NAN, 13.4),
            item_at(52.5, f64::INFINITY),
            item_at(52.49, 13.41),
        ];
        let mut without_location = item_at(0.0, 0.0);
        without_location.location = None;
        let mut all = items;
        all.push(without_location);

        let placed = presenter.place_markers(all).unwrap();
        assert_eq!(placed.placed, 2);
        let item_markers = presenter
            .surface()
            .scene()
            .markers
            .iter()
            .filter(|m| matches!(m.kind, MarkerKind::Item(_)))
            .count();
        assert_eq!(item_markers, 2);
    }

    #[test]
    fn replacing_items_clears_old_markers() {
        let mut presenter = ready_presenter();
        presenter.place_markers(vec![item_at(52.5, 13.4), item_at(52.6, 13.3)]);
        let placed = presenter.place_markers(vec![item_at(52.4, 13.2)]).unwrap();
        assert_eq!(placed.placed, 1);
        assert_eq!(presenter.surface().scene().markers.len(), 2);

        let placed = presenter.place_markers(Vec::new()).unwrap();
        assert_eq!(placed.placed, 0);
        assert_eq!(presenter.surface().scene().markers.len(), 1);
    }

    #[test]
    fn fit_covers_viewer_and_items() {
        let mut presenter = ready_presenter();
        let far = item_at(53.0, 14.0);
        let placed = presenter.place_markers(vec![far]).unwrap();
        assert!(placed.bounds.contains(berlin()));
        assert!(placed.bounds.contains(LatLng::new(53.0, 14.0)));

        assert!(presenter.fit_markers(placed));
        let scene = presenter.surface().scene();
        match &scene.viewport {
            Some(crate::map::scene::Viewport::Fit { bounds, options }) => {
                assert_eq!(*bounds, placed.bounds);
                assert_eq!(*options, MARKER_FIT);
            }
            other => panic!("expected fit viewport, got {:?}", other),
        }
    }

    #[test]
    fn nothing_placed_skips_fit() {
        let mut presenter = ready_presenter();
        let placed = presenter.place_markers(vec![item_at(f64::NAN, 1.0)]).unwrap();
        assert!(!presenter.fit_markers(placed));
        assert!(matches!(
            presenter.surface().scene().viewport,
            Some(crate::map::scene::Viewport::Center { zoom: INITIAL_ZOOM, .. })
        ));
    }

    #[test]
    fn items_before_location_are_placed_on_init() {
        let mut presenter = MapPresenter::new(SceneSurface::new());
        presenter.place_markers(vec![item_at(52.5, 13.4)]);
        let placed = presenter.set_viewer_location(berlin()).unwrap();
        assert_eq!(placed.placed, 1);
    }

    #[test]
    fn at_most_one_route_anchored_to_latest_selection() {
        let mut presenter = ready_presenter();
        let a = item_at(52.5, 13.4);
        let b = item_at(52.6, 13.3);
        let (a_id, b_id) = (a.id, b.id);
        presenter.show_items(vec![a, b]);

        assert!(presenter.select(a_id));
        assert!(presenter.request_directions());
        assert!(presenter.request_directions());
        assert_eq!(presenter.surface().scene().routes.len(), 1);

        assert!(presenter.select(b_id));
        assert!(presenter.request_directions());
        let scene = presenter.surface().scene();
        assert_eq!(scene.routes.len(), 1);
        assert_eq!(scene.routes[0].points, vec![berlin(), LatLng::new(52.6, 13.3)]);
        match &scene.viewport {
            Some(crate::map::scene::Viewport::Fit { options, .. }) => {
                assert_eq!(*options, ROUTE_FIT)
            }
            other => panic!("expected route fit, got {:?}", other),
        }
    }

    #[test]
    fn close_overlay_removes_route() {
        let mut presenter = ready_presenter();
        let a = item_at(52.5, 13.4);
        let id = a.id;
        presenter.show_items(vec![a]);
        presenter.select(id);
        presenter.request_directions();

        presenter.close_overlay();
        assert!(presenter.selected().is_none());
        assert!(presenter.surface().scene().routes.is_empty());
        assert!(!presenter.request_directions());
    }

    #[test]
    fn selection_opens_marker_popup() {
        let mut presenter = ready_presenter();
        let a = item_at(52.5, 13.4);
        let id = a.id;
        presenter.show_items(vec![a]);
        assert!(presenter.select(id));
        assert_eq!(presenter.selected().map(|i| i.id), Some(id));

        let scene = presenter.surface().scene();
        let popup = scene.open_popup.unwrap();
        let marker = scene.markers.iter().find(|m| m.layer == popup).unwrap();
        assert_eq!(marker.kind, MarkerKind::Item(id));
    }

    #[test]
    fn teardown_returns_to_uninitialized() {
        let mut presenter = ready_presenter();
        presenter.show_items(vec![item_at(52.5, 13.4)]);
        presenter.teardown();
        assert!(!presenter.is_ready());
        assert!(presenter.surface().scene().removed);

        presenter.set_viewer_location(berlin());
        assert!(presenter.is_ready());
    }
}
