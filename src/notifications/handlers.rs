use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post},
    Json, Router,
};
use futures_util::stream::{self, Stream};
use serde::Serialize;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::{
    auth::extractors::AuthUser,
    error::{AppError, AppResult},
    feed::ChangeKind,
    notifications::{
        center::{owned_row, COLLECTION},
        repo_types::NotificationRow,
    },
    state::AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/notifications", get(list_notifications))
        .route("/notifications/stream", get(stream_notifications))
        .route("/notifications/:id/read", post(mark_read))
}

#[derive(Debug, Serialize)]
pub struct NotificationList {
    pub items: Vec<NotificationRow>,
    pub unread: usize,
}

#[instrument(skip_all, fields(user_id = %identity.id))]
pub async fn list_notifications(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
) -> AppResult<Json<NotificationList>> {
    let items = state
        .store
        .notifications_for(identity.id)
        .await
        .map_err(|e| AppError::store("Failed to load notifications", e))?;
    let unread = items.iter().filter(|n| !n.is_read).count();
    Ok(Json(NotificationList { items, unread }))
}

#[instrument(skip_all, fields(user_id = %identity.id, notification_id = %id))]
pub async fn mark_read(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let updated = state
        .store
        .mark_read(id, identity.id)
        .await
        .map_err(|e| AppError::store("Failed to update notification", e))?;
    if updated {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound("Notification not found".into()))
    }
}

/// Server-sent events with the viewer's new notifications.
///
/// The subscription lives inside the stream and is released when the client
/// disconnects and axum drops it.
#[instrument(skip_all, fields(user_id = %identity.id))]
pub async fn stream_notifications(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let owner = identity.id;
    let subscription = state.feed.subscribe(COLLECTION, ChangeKind::Insert);
    debug!("notification stream opened");

    let events = stream::unfold(subscription, move |mut sub| async move {
        loop {
            let change = sub.next().await?;
            if let Some(row) = owned_row(&change, owner) {
                let event = Event::default().event("notification").json_data(&row);
                return Some((event, sub));
            }
        }
    });

    Sse::new(events).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}
