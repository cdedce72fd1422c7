use axum::{
    extract::{DefaultBodyLimit, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use time::OffsetDateTime;
use tracing::instrument;
use uuid::Uuid;

use crate::{
    auth::extractors::{AuthUser, Viewer},
    error::{AppError, AppResult},
    images::services::ImageUpload,
    items::{
        dto::{CreateItemRequest, FoodItem, ItemFeedResponse, PostedItemResponse},
        expiry,
        repo_types::LikeState,
        services,
        store::{ItemStore, MINE_FAILED, NEARBY_FAILED},
    },
    notice::Notices,
    state::AppState,
};

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/items", get(feed))
        .route("/items/mine", get(list_mine))
        .route("/items/nearby", get(list_nearby))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/items", post(create_item))
        .route("/items/:id/like", post(like_item))
        .layer(DefaultBodyLimit::max(20 * 1024 * 1024)) // 20MB
}

/// Dashboard payload: both lists plus any notices the loads raised.
#[instrument(skip_all, fields(user_id = %identity.id))]
pub async fn feed(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
) -> Json<ItemFeedResponse> {
    let notices = Notices::new();
    let items = ItemStore::new(state.store.clone(), notices.clone());
    items.refresh(&identity).await;
    let lists = items.visible(OffsetDateTime::now_utc());
    Json(ItemFeedResponse {
        mine: lists.mine,
        nearby: lists.nearby,
        notices: notices.drain(),
    })
}

#[instrument(skip_all, fields(user_id = %identity.id))]
pub async fn list_mine(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
) -> AppResult<Json<Vec<FoodItem>>> {
    let items = services::load_mine(state.store.as_ref(), &identity)
        .await
        .map_err(|e| AppError::store(MINE_FAILED, e))?;
    Ok(Json(expiry::visible(&items, OffsetDateTime::now_utc())))
}

#[instrument(skip_all, fields(user_id = %identity.id))]
pub async fn list_nearby(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
) -> AppResult<Json<Vec<FoodItem>>> {
    let items = services::load_nearby(state.store.as_ref(), &identity)
        .await
        .map_err(|e| AppError::store(NEARBY_FAILED, e))?;
    Ok(Json(expiry::visible(&items, OffsetDateTime::now_utc())))
}

/// POST /items { title, description, category, quantity, unit, location,
/// expire_date, expire_time, image?: bytes, image_content_type? }
#[instrument(skip_all)]
pub async fn create_item(
    State(state): State<AppState>,
    Viewer(viewer): Viewer,
    Json(body): Json<CreateItemRequest>,
) -> AppResult<(StatusCode, Json<PostedItemResponse>)> {
    let image = body.image.map(|buf| ImageUpload {
        body: Bytes::from(buf.into_vec()),
        content_type: body
            .image_content_type
            .clone()
            .unwrap_or_else(|| "image/jpeg".into()),
    });

    let posted = services::post_item(&state, viewer.as_ref(), &body.draft, image).await?;
    let notice = posted.comparison.map(|c| c.verdict.notice());
    Ok((
        StatusCode::CREATED,
        Json(PostedItemResponse {
            item: posted.item,
            comparison: posted.comparison,
            notice,
        }),
    ))
}

#[instrument(skip_all, fields(item_id = %id))]
pub async fn like_item(
    State(state): State<AppState>,
    Viewer(viewer): Viewer,
    Path(id): Path<Uuid>,
) -> AppResult<Json<LikeState>> {
    let like = services::toggle_like(state.store.as_ref(), viewer.as_ref(), id).await?;
    Ok(Json(like))
}
