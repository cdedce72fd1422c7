use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    #[default]
    Pending,
    Accepted,
    Rejected,
}

impl RequestStatus {
    /// Missing or unrecognised status reads as pending.
    pub fn from_column(value: Option<&str>) -> Self {
        value.and_then(|v| v.parse().ok()).unwrap_or_default()
    }
}

impl FromStr for RequestStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "accepted" => Ok(Self::Accepted),
            "rejected" => Ok(Self::Rejected),
            other => anyhow::bail!("unknown request status: {}", other),
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct FoodRequestRow {
    pub id: Uuid,
    pub food_item_id: Uuid,
    pub requester_id: Uuid,
    pub status: Option<String>,
    pub created_at: OffsetDateTime,
}

/// A sent request joined with its item's title and image.
#[derive(Debug, Clone, FromRow)]
pub struct SentRequestRow {
    pub id: Uuid,
    pub status: Option<String>,
    pub created_at: OffsetDateTime,
    pub title: String,
    pub image_url: Option<String>,
}
