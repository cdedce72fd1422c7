use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::{
    auth::extractors::AuthUser,
    error::{AppError, AppResult},
    items::{dto::FoodItem, expiry, services, store::{MINE_FAILED, NEARBY_FAILED}},
    map::{
        presenter::MapPresenter,
        scene::{Scene, SceneSurface},
        surface::LatLng,
    },
    state::AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new().route("/map/scene", get(scene))
}

#[derive(Debug, Deserialize)]
pub struct SceneQuery {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub selected: Option<Uuid>,
    #[serde(default)]
    pub directions: bool,
}

#[derive(Debug, Serialize)]
pub struct SceneResponse {
    /// No viewer location known: render the placeholder instead of a map.
    pub placeholder: bool,
    pub scene: Scene,
    pub selected: Option<FoodItem>,
}

/// GET /map/scene?lat=&lng=&selected=&directions=
///
/// Plots the viewer's own items together with everyone else's. Without
/// coordinates the saved profile location is used.
#[instrument(skip_all, fields(user_id = %identity.id))]
pub async fn scene(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Query(q): Query<SceneQuery>,
) -> AppResult<Json<SceneResponse>> {
    let viewer = match (q.lat, q.lng) {
        (Some(lat), Some(lng)) => Some(LatLng::new(lat, lng)),
        _ => match state.store.profile(identity.id).await {
            Ok(profile) => profile.and_then(|p| match (p.location_lat, p.location_lng) {
                (Some(lat), Some(lng)) => Some(LatLng::new(lat, lng)),
                _ => None,
            }),
            Err(e) => {
                warn!(error = %e, "saved location lookup failed");
                None
            }
        },
    };

    let (mine, nearby) = tokio::join!(
        services::load_mine(state.store.as_ref(), &identity),
        services::load_nearby(state.store.as_ref(), &identity),
    );
    let mut items = mine.map_err(|e| AppError::store(MINE_FAILED, e))?;
    items.extend(nearby.map_err(|e| AppError::store(NEARBY_FAILED, e))?);
    let items = expiry::visible(&items, OffsetDateTime::now_utc());

    let mut presenter = MapPresenter::new(SceneSurface::new());
    if let Some(at) = viewer {
        if let Some(placed) = presenter.set_viewer_location(at) {
            presenter.fit_markers(placed);
        }
    }
    presenter.show_items(items);

    if let Some(id) = q.selected {
        if presenter.select(id) && q.directions {
            presenter.request_directions();
        }
    }

    let placeholder = !presenter.is_ready();
    let selected = presenter.selected().cloned();
    Ok(Json(SceneResponse {
        placeholder,
        scene: presenter.into_surface().into_scene(),
        selected,
    }))
}
