use anyhow::Context;
use async_trait::async_trait;
use uuid::Uuid;

use crate::profiles::repo_types::{
    NewProfile, ProfileRow, ProfileSummary, ProfileUpdate, SavedLocation, ScoreRow,
};
use crate::store::pg::PgStore;

/// `profiles` collection.
#[async_trait]
pub trait ProfileRepo: Send + Sync {
    async fn profiles_by_ids(&self, ids: &[Uuid]) -> anyhow::Result<Vec<ProfileSummary>>;
    async fn profile(&self, id: Uuid) -> anyhow::Result<Option<ProfileRow>>;
    async fn insert_profile(&self, profile: &NewProfile) -> anyhow::Result<ProfileRow>;
    async fn update_profile(
        &self,
        id: Uuid,
        update: &ProfileUpdate,
    ) -> anyhow::Result<Option<ProfileRow>>;
    /// Returns `false` when no profile matched.
    async fn save_location(&self, id: Uuid, location: &SavedLocation) -> anyhow::Result<bool>;
    async fn scores(&self) -> anyhow::Result<Vec<ScoreRow>>;
}

const PROFILE_COLUMNS: &str = r#"
    id, email, full_name, avatar_url, phone_number, bio, requests_sent,
    location_lat, location_lng, location_address, created_at
"#;

#[async_trait]
impl ProfileRepo for PgStore {
    async fn profiles_by_ids(&self, ids: &[Uuid]) -> anyhow::Result<Vec<ProfileSummary>> {
        sqlx::query_as::<_, ProfileSummary>(
            r#"SELECT id, full_name, avatar_url FROM profiles WHERE id = ANY($1)"#,
        )
        .bind(ids)
        .fetch_all(&self.db)
        .await
        .context("select poster profiles")
    }

    async fn profile(&self, id: Uuid) -> anyhow::Result<Option<ProfileRow>> {
        let sql = format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE id = $1");
        sqlx::query_as::<_, ProfileRow>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await
            .context("select profile")
    }

    async fn insert_profile(&self, profile: &NewProfile) -> anyhow::Result<ProfileRow> {
        let sql = format!(
            r#"
            INSERT INTO profiles (id, email, full_name, phone_number, avatar_url)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {PROFILE_COLUMNS}
            "#
        );
        sqlx::query_as::<_, ProfileRow>(&sql)
            .bind(profile.id)
            .bind(&profile.email)
            .bind(&profile.full_name)
            .bind(profile.phone_number.as_deref())
            .bind(&profile.avatar_url)
            .fetch_one(&self.db)
            .await
            .context("insert profile")
    }

    async fn update_profile(
        &self,
        id: Uuid,
        update: &ProfileUpdate,
    ) -> anyhow::Result<Option<ProfileRow>> {
        let sql = format!(
            r#"
            UPDATE profiles
               SET full_name    = COALESCE($2, full_name),
                   phone_number = COALESCE($3, phone_number),
                   bio          = COALESCE($4, bio),
                   avatar_url   = COALESCE($5, avatar_url)
             WHERE id = $1
            RETURNING {PROFILE_COLUMNS}
            "#
        );
        sqlx::query_as::<_, ProfileRow>(&sql)
            .bind(id)
            .bind(update.full_name.as_deref())
            .bind(update.phone_number.as_deref())
            .bind(update.bio.as_deref())
            .bind(update.avatar_url.as_deref())
            .fetch_optional(&self.db)
            .await
            .context("update profile")
    }

    async fn save_location(&self, id: Uuid, location: &SavedLocation) -> anyhow::Result<bool> {
        let updated = sqlx::query(
            r#"
            UPDATE profiles
               SET location_lat = $2, location_lng = $3, location_address = $4
             WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(location.lat)
        .bind(location.lng)
        .bind(&location.address)
        .execute(&self.db)
        .await
        .context("save profile location")?
        .rows_affected();
        Ok(updated > 0)
    }

    async fn scores(&self) -> anyhow::Result<Vec<ScoreRow>> {
        sqlx::query_as::<_, ScoreRow>(r#"SELECT id, full_name, requests_sent FROM profiles"#)
            .fetch_all(&self.db)
            .await
            .context("select profile scores")
    }
}
