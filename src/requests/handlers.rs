use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    auth::extractors::{AuthUser, Viewer},
    error::AppResult,
    requests::{
        dto::{FoodRequest, SentRequest},
        services,
    },
    state::AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/items/:id/requests", post(create_request))
        .route("/requests/sent", get(list_sent))
}

#[instrument(skip_all, fields(item_id = %id))]
pub async fn create_request(
    State(state): State<AppState>,
    Viewer(viewer): Viewer,
    Path(id): Path<Uuid>,
) -> AppResult<(StatusCode, Json<FoodRequest>)> {
    let request =
        services::request_item(state.store.as_ref(), state.rpc.as_ref(), viewer.as_ref(), id)
            .await?;
    Ok((StatusCode::CREATED, Json(request)))
}

#[instrument(skip_all, fields(user_id = %identity.id))]
pub async fn list_sent(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
) -> AppResult<Json<Vec<SentRequest>>> {
    Ok(Json(services::sent_requests(state.store.as_ref(), &identity).await?))
}
