use tracing::{info, instrument};

use crate::auth::provider::Identity;
use crate::error::{AppError, AppResult};
use crate::profiles::dto::{LeaderboardEntry, LeaderboardPage, ProfileStats, UpdateProfileRequest};
use crate::profiles::repo_types::{ProfileRow, ProfileUpdate, SavedLocation, ScoreRow};
use crate::score;
use crate::store::DocumentStore;

const AVATAR_BASE: &str = "https://ui-avatars.com/api/";

/// Generated initials avatar for a display name.
pub fn default_avatar_url(name: &str) -> String {
    format!(
        "{}?name={}&background=random",
        AVATAR_BASE,
        urlencoding::encode(name.trim())
    )
}

fn not_found() -> AppError {
    AppError::NotFound("Profile not found".into())
}

pub async fn get_profile(store: &dyn DocumentStore, viewer: &Identity) -> AppResult<ProfileRow> {
    store
        .profile(viewer.id)
        .await
        .map_err(|e| AppError::store("Failed to load profile", e))?
        .ok_or_else(not_found)
}

/// Blank strings clear nothing: they are rejected for the name and ignored
/// for the optional fields.
#[instrument(skip_all, fields(user_id = %viewer.id))]
pub async fn update_profile(
    store: &dyn DocumentStore,
    viewer: &Identity,
    request: UpdateProfileRequest,
) -> AppResult<ProfileRow> {
    let full_name = match request.full_name {
        Some(name) if name.trim().is_empty() => {
            return Err(AppError::validation("Name is required"));
        }
        Some(name) => Some(name.trim().to_string()),
        None => None,
    };
    let keep = |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
    let update = ProfileUpdate {
        full_name,
        phone_number: keep(request.phone_number),
        bio: keep(request.bio),
        avatar_url: keep(request.avatar_url),
    };

    let row = store
        .update_profile(viewer.id, &update)
        .await
        .map_err(|e| AppError::store("Failed to update profile", e))?
        .ok_or_else(not_found)?;
    info!("profile updated");
    Ok(row)
}

/// Stores the viewer's pickup location; zero or non-finite coordinates are refused.
pub async fn save_location(
    store: &dyn DocumentStore,
    viewer: &Identity,
    lat: f64,
    lng: f64,
    address: Option<String>,
) -> AppResult<SavedLocation> {
    if !lat.is_finite() || !lng.is_finite() || lat == 0.0 || lng == 0.0 {
        return Err(AppError::validation("Please select a valid location"));
    }
    let address = address
        .map(|a| a.trim().to_string())
        .filter(|a| !a.is_empty())
        .unwrap_or_else(|| format!("{}, {}", lat, lng));
    let location = SavedLocation { lat, lng, address };

    let saved = store
        .save_location(viewer.id, &location)
        .await
        .map_err(|e| AppError::store("Failed to save location", e))?;
    if !saved {
        return Err(not_found());
    }
    Ok(location)
}

pub async fn stats(store: &dyn DocumentStore, viewer: &Identity) -> AppResult<ProfileStats> {
    let profile = get_profile(store, viewer).await?;
    let carbon_emissions = score::total_emissions(store, viewer.id)
        .await
        .map_err(|e| AppError::store("Failed to load carbon emissions", e))?;
    Ok(ProfileStats {
        score: i64::from(profile.requests_sent.unwrap_or(0)),
        carbon_emissions,
    })
}

/// Named profiles by score, highest first; ties keep store order.
pub fn rank(rows: Vec<ScoreRow>) -> Vec<LeaderboardEntry> {
    let mut named: Vec<(ScoreRow, String)> = rows
        .into_iter()
        .filter_map(|row| {
            let name = row.full_name.as_deref()?.trim().to_string();
            (!name.is_empty()).then_some((row, name))
        })
        .collect();
    named.sort_by_key(|(row, _)| std::cmp::Reverse(row.requests_sent.unwrap_or(0)));
    named
        .into_iter()
        .enumerate()
        .map(|(i, (row, full_name))| LeaderboardEntry {
            rank: i + 1,
            id: row.id,
            full_name,
            score: i64::from(row.requests_sent.unwrap_or(0)),
        })
        .collect()
}

pub async fn leaderboard(
    store: &dyn DocumentStore,
    limit: usize,
    offset: usize,
) -> AppResult<LeaderboardPage> {
    let rows = store
        .scores()
        .await
        .map_err(|e| AppError::store("Failed to load leaderboard", e))?;
    let ranked = rank(rows);
    let total = ranked.len();
    let entries: Vec<LeaderboardEntry> = ranked.into_iter().skip(offset).take(limit).collect();
    Ok(LeaderboardPage {
        has_more: offset.saturating_add(entries.len()) < total,
        entries,
        total,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profiles::repo::ProfileRepo;
    use crate::profiles::repo_types::NewProfile;
    use crate::rpc::RemoteProcedures;
    use crate::store::MemoryStore;
    use uuid::Uuid;

    async fn member(store: &MemoryStore, name: &str) -> Identity {
        let id = Uuid::new_v4();
        store
            .insert_profile(&NewProfile {
                id,
                email: format!("{}@example.com", id),
                full_name: name.into(),
                phone_number: None,
                avatar_url: default_avatar_url(name),
            })
            .await
            .unwrap();
        Identity {
            id,
            email: format!("{}@example.com", id),
            name: name.into(),
            avatar: String::new(),
        }
    }

    #[test]
    fn avatar_url_encodes_name() {
        assert_eq!(
            default_avatar_url("Ana Lima"),
            "https://ui-avatars.com/api/?name=Ana%20Lima&background=random"
        );
    }

    #[test]
    fn rank_drops_blank_names_and_sorts_by_score() {
        let row = |name: Option<&str>, score: Option<i32>| ScoreRow {
            id: Uuid::new_v4(),
            full_name: name.map(String::from),
            requests_sent: score,
        };
        let ranked = rank(vec![
            row(Some("Ana"), Some(2)),
            row(Some("   "), Some(9)),
            row(None, Some(7)),
            row(Some("Ben"), None),
            row(Some("Cleo"), Some(5)),
        ]);
        let names: Vec<&str> = ranked.iter().map(|e| e.full_name.as_str()).collect();
        assert_eq!(names, vec!["Cleo", "Ana", "Ben"]);
        assert_eq!(ranked[2].score, 0);
        assert_eq!(ranked[0].rank, 1);
    }

    #[tokio::test]
    async fn leaderboard_pages_with_show_more() {
        let store = MemoryStore::new();
        for i in 0..12 {
            let m = member(&store, &format!("User {}", i)).await;
            for _ in 0..i {
                store.increment_score(m.id).await.unwrap();
            }
        }

        let first = leaderboard(&store, 10, 0).await.unwrap();
        assert_eq!(first.entries.len(), 10);
        assert_eq!(first.total, 12);
        assert!(first.has_more);
        assert_eq!(first.entries[0].full_name, "User 11");

        let rest = leaderboard(&store, 10, 10).await.unwrap();
        assert_eq!(rest.entries.len(), 2);
        assert!(!rest.has_more);
        assert_eq!(rest.entries[0].rank, 11);
    }

    #[tokio::test]
    async fn location_rejects_zero_and_defaults_address() {
        let store = MemoryStore::new();
        let ana = member(&store, "Ana").await;

        assert!(save_location(&store, &ana, 0.0, 13.4, None).await.is_err());
        assert!(save_location(&store, &ana, f64::NAN, 13.4, None).await.is_err());

        let saved = save_location(&store, &ana, 52.5, 13.4, None).await.unwrap();
        assert_eq!(saved.address, "52.5, 13.4");
        let profile = get_profile(&store, &ana).await.unwrap();
        assert_eq!(profile.location_address.as_deref(), Some("52.5, 13.4"));
        assert_eq!(profile.location_lat, Some(52.5));
    }

    #[tokio::test]
    async fn update_keeps_unset_fields() {
        let store = MemoryStore::new();
        let ana = member(&store, "Ana").await;

        let row = update_profile(
            &store,
            &ana,
            UpdateProfileRequest {
                bio: Some("Loves soup".into()),
                phone_number: Some("  ".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(row.full_name.as_deref(), Some("Ana"));
        assert_eq!(row.bio.as_deref(), Some("Loves soup"));
        assert_eq!(row.phone_number, None);

        let err = update_profile(
            &store,
            &ana,
            UpdateProfileRequest {
                full_name: Some(" ".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "Name is required");
    }

    #[tokio::test]
    async fn stats_sum_emissions_with_missing_as_zero() {
        let store = MemoryStore::new();
        let ana = member(&store, "Ana").await;
        let a = store.insert_raw(MemoryStore::raw_item(ana.id, "Soup"));
        store.insert_raw(MemoryStore::raw_item(ana.id, "Bread"));
        store.set_emission(a, Some(2.5));
        store.increment_score(ana.id).await.unwrap();

        let stats = stats(&store, &ana).await.unwrap();
        assert_eq!(stats, ProfileStats { score: 1, carbon_emissions: 2.5 });
    }
}
