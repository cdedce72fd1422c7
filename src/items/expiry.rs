use time::OffsetDateTime;

use crate::items::dto::FoodItem;

/// An item expires once its expiry is strictly before `now`; no expiry never expires.
pub fn is_expired(expires_at: Option<OffsetDateTime>, now: OffsetDateTime) -> bool {
    matches!(expires_at, Some(at) if at < now)
}

/// Items still worth showing at `now`. Evaluate per render.
pub fn visible(items: &[FoodItem], now: OffsetDateTime) -> Vec<FoodItem> {
    items
        .iter()
        .filter(|item| !is_expired(item.expires_at, now))
        .cloned()
        .collect()
}
