use axum::{
    extract::{Query, State},
    routing::{get, put},
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::extractors::AuthUser,
    error::AppResult,
    profiles::{
        dto::{
            LeaderboardPage, LeaderboardQuery, LocationResponse, ProfileStats, SaveLocationRequest,
            UpdateProfileRequest,
        },
        repo_types::ProfileRow,
        services,
    },
    state::AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/me/profile", get(get_profile).put(update_profile))
        .route("/me/location", put(save_location))
        .route("/me/stats", get(stats))
        .route("/leaderboard", get(leaderboard))
}

#[instrument(skip_all, fields(user_id = %identity.id))]
pub async fn get_profile(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
) -> AppResult<Json<ProfileRow>> {
    Ok(Json(services::get_profile(state.store.as_ref(), &identity).await?))
}

#[instrument(skip_all, fields(user_id = %identity.id))]
pub async fn update_profile(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Json(body): Json<UpdateProfileRequest>,
) -> AppResult<Json<ProfileRow>> {
    Ok(Json(
        services::update_profile(state.store.as_ref(), &identity, body).await?,
    ))
}

#[instrument(skip_all, fields(user_id = %identity.id))]
pub async fn save_location(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Json(body): Json<SaveLocationRequest>,
) -> AppResult<Json<LocationResponse>> {
    let saved =
        services::save_location(state.store.as_ref(), &identity, body.lat, body.lng, body.address)
            .await?;
    Ok(Json(LocationResponse {
        lat: saved.lat,
        lng: saved.lng,
        address: saved.address,
        message: "Location saved successfully",
    }))
}

#[instrument(skip_all, fields(user_id = %identity.id))]
pub async fn stats(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
) -> AppResult<Json<ProfileStats>> {
    Ok(Json(services::stats(state.store.as_ref(), &identity).await?))
}

#[instrument(skip(state))]
pub async fn leaderboard(
    State(state): State<AppState>,
    Query(q): Query<LeaderboardQuery>,
) -> AppResult<Json<LeaderboardPage>> {
    Ok(Json(
        services::leaderboard(state.store.as_ref(), q.limit, q.offset).await?,
    ))
}
