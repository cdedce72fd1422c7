use std::collections::{HashMap, HashSet};

use anyhow::Context;
use time::{macros::format_description, Date, PrimitiveDateTime, Time};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::auth::provider::Identity;
use crate::error::{AppError, AppResult};
use crate::images::services::{upload_food_photo, ImageUpload};
use crate::items::dto::{FoodItem, ItemDraft, Poster};
use crate::items::repo_types::{Category, LikeState, NewFoodItem};
use crate::score::{self, Comparison};
use crate::state::AppState;
use crate::store::DocumentStore;

pub const OWN_POSTER_FALLBACK: &str = "You";
pub const POSTER_FALLBACK: &str = "Food Sharer";

fn newest_first(items: &mut [FoodItem]) {
    items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

fn own_poster(viewer: &Identity) -> Poster {
    let name = if viewer.name.trim().is_empty() {
        OWN_POSTER_FALLBACK.to_string()
    } else {
        viewer.name.clone()
    };
    Poster {
        name,
        avatar: viewer.avatar.clone(),
    }
}

/// The viewer's own items, posted under their own name.
pub async fn load_mine(store: &dyn DocumentStore, viewer: &Identity) -> anyhow::Result<Vec<FoodItem>> {
    let rows = store
        .items_by_owner(viewer.id, viewer.id)
        .await
        .context("load own items")?;

    let poster = own_poster(viewer);
    let mut items: Vec<FoodItem> = rows
        .into_iter()
        .map(|row| FoodItem::from_row(row, poster.clone()))
        .collect();
    newest_first(&mut items);
    Ok(items)
}

/// Everyone else's items with their posters resolved in one batch lookup.
pub async fn load_nearby(store: &dyn DocumentStore, viewer: &Identity) -> anyhow::Result<Vec<FoodItem>> {
    let rows = store
        .items_not_owned_by(viewer.id, viewer.id)
        .await
        .context("load nearby items")?;
    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let mut seen = HashSet::new();
    let poster_ids: Vec<Uuid> = rows
        .iter()
        .map(|row| row.user_id)
        .filter(|id| seen.insert(*id))
        .collect();

    let posters: HashMap<Uuid, Poster> = match store.profiles_by_ids(&poster_ids).await {
        Ok(profiles) => profiles
            .into_iter()
            .map(|p| {
                let name = p
                    .full_name
                    .filter(|n| !n.trim().is_empty())
                    .unwrap_or_else(|| POSTER_FALLBACK.to_string());
                let poster = Poster {
                    name,
                    avatar: p.avatar_url.unwrap_or_default(),
                };
                (p.id, poster)
            })
            .collect(),
        Err(e) => {
            warn!(error = %e, posters = poster_ids.len(), "poster lookup failed; using fallbacks");
            HashMap::new()
        }
    };

    let mut items: Vec<FoodItem> = rows
        .into_iter()
        .map(|row| {
            let poster = posters.get(&row.user_id).cloned().unwrap_or_else(|| Poster {
                name: POSTER_FALLBACK.to_string(),
                avatar: String::new(),
            });
            FoodItem::from_row(row, poster)
        })
        .collect();
    newest_first(&mut items);
    Ok(items)
}

fn parse_expiry(date: &str, time: &str) -> Option<time::OffsetDateTime> {
    let date = Date::parse(date.trim(), format_description!("[year]-[month]-[day]")).ok()?;
    let time = Time::parse(time.trim(), format_description!("[hour]:[minute]")).ok()?;
    Some(PrimitiveDateTime::new(date, time).assume_utc())
}

/// Checks the add-food form in the order the form reports problems.
pub fn validate_draft(viewer: Option<&Identity>, draft: &ItemDraft) -> AppResult<NewFoodItem> {
    let viewer = viewer.ok_or_else(|| AppError::login_required("share food"))?;

    let title = draft.title.trim();
    let description = draft.description.trim();
    if title.is_empty() || description.is_empty() || draft.category.trim().is_empty() {
        return Err(AppError::validation("Please fill in all fields"));
    }
    let category: Category = draft
        .category
        .trim()
        .parse()
        .map_err(|_| AppError::validation("Please select a valid category"))?;

    let location = draft
        .location
        .as_ref()
        .ok_or_else(|| AppError::validation("Please select a location"))?;

    let expire_date = match (draft.expire_date.as_deref(), draft.expire_time.as_deref()) {
        (Some(d), Some(t)) if !d.trim().is_empty() && !t.trim().is_empty() => parse_expiry(d, t),
        _ => None,
    }
    .ok_or_else(|| AppError::validation("Please set expiry date and time"))?;

    let q = draft.quantity;
    if !q.is_finite() || q < 1.0 || q.fract() != 0.0 || q > f64::from(u32::MAX) {
        return Err(AppError::validation("Please set a valid quantity"));
    }
    let quantity = q as u32;

    if !location.lat.is_finite() || !location.lng.is_finite() {
        return Err(AppError::validation("Please select a valid location"));
    }

    Ok(NewFoodItem {
        title: title.to_string(),
        description: description.to_string(),
        category,
        quantity,
        unit: draft.unit,
        image_url: None,
        location_lat: location.lat,
        location_lng: location.lng,
        location_address: location.address.clone(),
        user_id: viewer.id,
        expire_date,
    })
}

#[derive(Debug)]
pub struct PostedItem {
    pub item: FoodItem,
    /// Absent when the comparison could not be computed.
    pub comparison: Option<Comparison>,
}

/// Validates, uploads the optional photo, inserts exactly once, then scores.
#[instrument(skip_all, fields(user_id = tracing::field::Empty))]
pub async fn post_item(
    state: &AppState,
    viewer: Option<&Identity>,
    draft: &ItemDraft,
    image: Option<ImageUpload>,
) -> AppResult<PostedItem> {
    let mut new_item = validate_draft(viewer, draft)?;
    let viewer = viewer.ok_or_else(|| AppError::login_required("share food"))?;
    tracing::Span::current().record("user_id", tracing::field::display(new_item.user_id));

    let stored = match image {
        Some(image) => Some(
            upload_food_photo(state.storage.as_ref(), new_item.user_id, image)
                .await
                .map_err(|e| AppError::store("Failed to upload image", e))?,
        ),
        None => None,
    };
    new_item.image_url = stored.as_ref().map(|s| s.url.clone());

    let row = match state.store.insert_item(&new_item).await {
        Ok(row) => row,
        Err(e) => {
            if let Some(stored) = &stored {
                if let Err(del) = state.storage.delete_object(&stored.key).await {
                    warn!(error = %del, key = %stored.key, "orphaned photo left behind");
                }
            }
            return Err(AppError::store("Failed to share food item", e));
        }
    };
    info!(item_id = %row.id, "food item shared");

    let comparison =
        match score::compare_owner(state.store.as_ref(), new_item.user_id, state.config.missing_emissions)
            .await
        {
            Ok(cmp) => Some(cmp),
            Err(e) => {
                warn!(error = %e, "emission comparison failed");
                None
            }
        };

    Ok(PostedItem {
        item: FoodItem::from_row(row, own_poster(viewer)),
        comparison,
    })
}

pub async fn toggle_like(
    store: &dyn DocumentStore,
    viewer: Option<&Identity>,
    item_id: Uuid,
) -> AppResult<LikeState> {
    let viewer = viewer.ok_or_else(|| AppError::login_required("like food items"))?;
    store
        .toggle_like(item_id, viewer.id)
        .await
        .map_err(|e| AppError::store("Failed to update like", e))?
        .ok_or_else(|| AppError::NotFound("Food item not found".into()))
}
