use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::auth::provider::Identity;
use crate::error::{AppError, AppResult};
use crate::requests::dto::{FoodRequest, SentRequest};
use crate::rpc::RemoteProcedures;
use crate::store::DocumentStore;

pub const SENT_FAILED: &str = "Failed to load sent requests";

/// Asks for someone else's item: bumps the requester's score, then records
/// a pending request.
#[instrument(skip_all, fields(%item_id))]
pub async fn request_item(
    store: &dyn DocumentStore,
    rpc: &dyn RemoteProcedures,
    viewer: Option<&Identity>,
    item_id: Uuid,
) -> AppResult<FoodRequest> {
    let viewer = viewer.ok_or_else(|| AppError::login_required("request food items"))?;

    let item = store
        .item(item_id, viewer.id)
        .await
        .map_err(|e| AppError::store("Failed to send request", e))?
        .ok_or_else(|| AppError::NotFound("Food item not found".into()))?;
    if item.user_id == viewer.id {
        return Err(AppError::Forbidden("You cannot request your own food item".into()));
    }

    if let Err(e) = rpc.increment_score(viewer.id).await {
        warn!(error = %e, user_id = %viewer.id, "increment_score failed");
    }

    let row = store
        .insert_request(item_id, viewer.id)
        .await
        .map_err(|e| AppError::store("Failed to send request", e))?;
    info!(request_id = %row.id, user_id = %viewer.id, "food request sent");
    Ok(row.into())
}

pub async fn sent_requests(store: &dyn DocumentStore, viewer: &Identity) -> AppResult<Vec<SentRequest>> {
    let rows = store
        .sent_requests(viewer.id)
        .await
        .map_err(|e| AppError::store(SENT_FAILED, e))?;
    Ok(rows.into_iter().map(SentRequest::from).collect())
}
