use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::requests::repo_types::{FoodRequestRow, RequestStatus, SentRequestRow};

#[derive(Debug, Clone, Serialize)]
pub struct FoodRequest {
    pub id: Uuid,
    pub food_item_id: Uuid,
    pub requester_id: Uuid,
    pub status: RequestStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<FoodRequestRow> for FoodRequest {
    fn from(row: FoodRequestRow) -> Self {
        Self {
            id: row.id,
            food_item_id: row.food_item_id,
            requester_id: row.requester_id,
            status: RequestStatus::from_column(row.status.as_deref()),
            created_at: row.created_at,
        }
    }
}

/// Row of the "sent requests" list.
#[derive(Debug, Clone, Serialize)]
pub struct SentRequest {
    pub id: Uuid,
    pub status: RequestStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub title: String,
    pub image_url: Option<String>,
}

impl From<SentRequestRow> for SentRequest {
    fn from(row: SentRequestRow) -> Self {
        Self {
            id: row.id,
            status: RequestStatus::from_column(row.status.as_deref()),
            created_at: row.created_at,
            title: row.title,
            image_url: row.image_url,
        }
    }
}
