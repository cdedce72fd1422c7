use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::items::repo_types::{FoodItemRow, Unit};
use crate::notice::Notice;
use crate::score::Comparison;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lng: f64,
    #[serde(default)]
    pub address: String,
}

/// Poster fields denormalized onto each item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Poster {
    pub name: String,
    pub avatar: String,
}

/// A food item as views render it: defaults applied, poster joined.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FoodItem {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub category: String,
    pub quantity: u32,
    pub unit: Unit,
    pub image_url: Option<String>,
    pub location: Option<Location>,
    pub user_id: Uuid,
    pub poster: Poster,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub expires_at: Option<OffsetDateTime>,
    pub carbon_emissions: Option<f64>,
    pub likes: i64,
    pub liked: bool,
}

impl FoodItem {
    /// Applies the load-time defaults: quantity 1, unit pieces.
    pub fn from_row(row: FoodItemRow, poster: Poster) -> Self {
        let quantity = row
            .quantity
            .filter(|q| *q > 0)
            .and_then(|q| u32::try_from(q).ok())
            .unwrap_or(1);
        let unit = row
            .unit
            .as_deref()
            .filter(|u| !u.is_empty())
            .and_then(|u| u.parse().ok())
            .unwrap_or_default();
        let location = match (row.location_lat, row.location_lng) {
            (Some(lat), Some(lng)) => Some(Location {
                lat,
                lng,
                address: row.location_address.unwrap_or_default(),
            }),
            _ => None,
        };
        Self {
            id: row.id,
            title: row.title,
            description: row.description,
            category: row.category,
            quantity,
            unit,
            image_url: row.image_url,
            location,
            user_id: row.user_id,
            poster,
            created_at: row.created_at,
            expires_at: row.expire_date,
            carbon_emissions: row.carbon_emissions,
            likes: row.likes,
            liked: row.liked,
        }
    }
}

fn default_quantity() -> f64 {
    1.0
}

/// The add-food form as submitted.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ItemDraft {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    /// Any JSON number; only whole values of at least 1 pass validation.
    #[serde(default = "default_quantity")]
    pub quantity: f64,
    #[serde(default)]
    pub unit: Unit,
    #[serde(default)]
    pub location: Option<Location>,
    /// `YYYY-MM-DD`
    #[serde(default)]
    pub expire_date: Option<String>,
    /// `HH:MM`
    #[serde(default)]
    pub expire_time: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateItemRequest {
    #[serde(flatten)]
    pub draft: ItemDraft,
    #[serde(default)]
    pub image: Option<serde_bytes::ByteBuf>,
    #[serde(default)]
    pub image_content_type: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PostedItemResponse {
    pub item: FoodItem,
    pub comparison: Option<Comparison>,
    pub notice: Option<Notice>,
}

/// Both lists with anything already expired filtered out.
#[derive(Debug, Serialize)]
pub struct ItemFeedResponse {
    pub mine: Vec<FoodItem>,
    pub nearby: Vec<FoodItem>,
    pub notices: Vec<Notice>,
}
