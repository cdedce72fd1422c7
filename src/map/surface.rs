use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.lng.is_finite()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bounds {
    pub south_west: LatLng,
    pub north_east: LatLng,
}

impl Bounds {
    pub fn around(point: LatLng) -> Self {
        Self {
            south_west: point,
            north_east: point,
        }
    }

    pub fn extend(&mut self, point: LatLng) {
        self.south_west.lat = self.south_west.lat.min(point.lat);
        self.south_west.lng = self.south_west.lng.min(point.lng);
        self.north_east.lat = self.north_east.lat.max(point.lat);
        self.north_east.lng = self.north_east.lng.max(point.lng);
    }

    pub fn contains(&self, point: LatLng) -> bool {
        (self.south_west.lat..=self.north_east.lat).contains(&point.lat)
            && (self.south_west.lng..=self.north_east.lng).contains(&point.lng)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct LayerId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "item_id", rename_all = "lowercase")]
pub enum MarkerKind {
    Viewer,
    Item(Uuid),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FitOptions {
    pub padding: u32,
    pub max_zoom: Option<u8>,
}

/// The map widget bound to a view container.
pub trait MapSurface {
    fn set_view(&mut self, center: LatLng, zoom: u8);
    fn add_marker(&mut self, at: LatLng, kind: MarkerKind, popup: String) -> LayerId;
    fn add_polyline(&mut self, points: Vec<LatLng>) -> LayerId;
    fn remove_layer(&mut self, layer: LayerId);
    fn fit_bounds(&mut self, bounds: Bounds, options: FitOptions);
    fn open_popup(&mut self, layer: LayerId);
    /// Destroys the widget; no call is valid afterwards.
    fn remove(&mut self);
}
