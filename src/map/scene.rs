use serde::Serialize;

use crate::map::surface::{Bounds, FitOptions, LatLng, LayerId, MapSurface, MarkerKind};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum Viewport {
    Center { center: LatLng, zoom: u8 },
    Fit { bounds: Bounds, options: FitOptions },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SceneMarker {
    pub layer: LayerId,
    pub kind: MarkerKind,
    pub position: LatLng,
    pub popup: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SceneRoute {
    pub layer: LayerId,
    pub points: Vec<LatLng>,
}

/// Everything currently drawn, in the shape a client map renders it.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Scene {
    pub viewport: Option<Viewport>,
    pub markers: Vec<SceneMarker>,
    pub routes: Vec<SceneRoute>,
    pub open_popup: Option<LayerId>,
    pub removed: bool,
}

/// Surface that records draw calls into a `Scene`.
#[derive(Debug, Default)]
pub struct SceneSurface {
    scene: Scene,
    next_layer: u64,
    calls: usize,
}

impl SceneSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn into_scene(self) -> Scene {
        self.scene
    }

    /// Number of surface calls made so far.
    pub fn calls(&self) -> usize {
        self.calls
    }

    fn layer(&mut self) -> LayerId {
        self.next_layer += 1;
        LayerId(self.next_layer)
    }
}

impl MapSurface for SceneSurface {
    fn set_view(&mut self, center: LatLng, zoom: u8) {
        self.calls += 1;
        self.scene.removed = false;
        self.scene.viewport = Some(Viewport::Center { center, zoom });
    }

    fn add_marker(&mut self, at: LatLng, kind: MarkerKind, popup: String) -> LayerId {
        self.calls += 1;
        let layer = self.layer();
        self.scene.markers.push(SceneMarker {
            layer,
            kind,
            position: at,
            popup,
        });
        layer
    }

    fn add_polyline(&mut self, points: Vec<LatLng>) -> LayerId {
        self.calls += 1;
        let layer = self.layer();
        self.scene.routes.push(SceneRoute { layer, points });
        layer
    }

    fn remove_layer(&mut self, layer: LayerId) {
        self.calls += 1;
        self.scene.markers.retain(|m| m.layer != layer);
        self.scene.routes.retain(|r| r.layer != layer);
        if self.scene.open_popup == Some(layer) {
            self.scene.open_popup = None;
        }
    }

    fn fit_bounds(&mut self, bounds: Bounds, options: FitOptions) {
        self.calls += 1;
        self.scene.viewport = Some(Viewport::Fit { bounds, options });
    }

    fn open_popup(&mut self, layer: LayerId) {
        self.calls += 1;
        self.scene.open_popup = Some(layer);
    }

    fn remove(&mut self) {
        self.calls += 1;
        self.scene = Scene {
            removed: true,
            ..Scene::default()
        };
    }
}
