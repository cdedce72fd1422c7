use anyhow::Context;
use async_trait::async_trait;
use uuid::Uuid;

use crate::items::repo_types::{FoodItemRow, LikeState, NewFoodItem};
use crate::store::pg::PgStore;

/// `food_items` collection.
#[async_trait]
pub trait ItemRepo: Send + Sync {
    /// Items posted by `owner`, newest first.
    async fn items_by_owner(&self, owner: Uuid, viewer: Uuid) -> anyhow::Result<Vec<FoodItemRow>>;
    /// Items posted by anyone but `owner`, newest first.
    async fn items_not_owned_by(&self, owner: Uuid, viewer: Uuid)
        -> anyhow::Result<Vec<FoodItemRow>>;
    async fn item(&self, id: Uuid, viewer: Uuid) -> anyhow::Result<Option<FoodItemRow>>;
    async fn insert_item(&self, item: &NewFoodItem) -> anyhow::Result<FoodItemRow>;
    /// Emission column of every item, or of one owner's items.
    async fn emissions(&self, owner: Option<Uuid>) -> anyhow::Result<Vec<Option<f64>>>;
    /// Flips `user`'s like on an item; `None` if the item does not exist.
    async fn toggle_like(&self, item_id: Uuid, user: Uuid) -> anyhow::Result<Option<LikeState>>;
}

const ITEM_COLUMNS: &str = r#"
    f.id, f.title, f.description, f.category, f.quantity, f.unit, f.image_url,
    f.location_lat, f.location_lng, f.location_address, f.user_id, f.created_at,
    f.expire_date, f.carbon_emissions,
    (SELECT COUNT(*) FROM food_item_likes l WHERE l.food_item_id = f.id) AS likes,
    EXISTS (
        SELECT 1 FROM food_item_likes l WHERE l.food_item_id = f.id AND l.user_id = $2
    ) AS liked
"#;

#[async_trait]
impl ItemRepo for PgStore {
    async fn items_by_owner(&self, owner: Uuid, viewer: Uuid) -> anyhow::Result<Vec<FoodItemRow>> {
        let sql = format!(
            "SELECT {ITEM_COLUMNS} FROM food_items f WHERE f.user_id = $1 ORDER BY f.created_at DESC"
        );
        sqlx::query_as::<_, FoodItemRow>(&sql)
            .bind(owner)
            .bind(viewer)
            .fetch_all(&self.db)
            .await
            .context("select own food items")
    }

    async fn items_not_owned_by(
        &self,
        owner: Uuid,
        viewer: Uuid,
    ) -> anyhow::Result<Vec<FoodItemRow>> {
        let sql = format!(
            "SELECT {ITEM_COLUMNS} FROM food_items f WHERE f.user_id <> $1 ORDER BY f.created_at DESC"
        );
        sqlx::query_as::<_, FoodItemRow>(&sql)
            .bind(owner)
            .bind(viewer)
            .fetch_all(&self.db)
            .await
            .context("select nearby food items")
    }

    async fn item(&self, id: Uuid, viewer: Uuid) -> anyhow::Result<Option<FoodItemRow>> {
        let sql = format!("SELECT {ITEM_COLUMNS} FROM food_items f WHERE f.id = $1");
        sqlx::query_as::<_, FoodItemRow>(&sql)
            .bind(id)
            .bind(viewer)
            .fetch_optional(&self.db)
            .await
            .context("select food item")
    }

    async fn insert_item(&self, item: &NewFoodItem) -> anyhow::Result<FoodItemRow> {
        let id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO food_items (title, description, category, quantity, unit, image_url,
                                    location_lat, location_lng, location_address, user_id,
                                    expire_date)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING id
            "#,
        )
        .bind(&item.title)
        .bind(&item.description)
        .bind(item.category.as_str())
        .bind(i32::try_from(item.quantity).context("quantity out of range")?)
        .bind(item.unit.as_str())
        .bind(item.image_url.as_deref())
        .bind(item.location_lat)
        .bind(item.location_lng)
        .bind(&item.location_address)
        .bind(item.user_id)
        .bind(item.expire_date)
        .fetch_one(&self.db)
        .await
        .context("insert food item")?;

        // Re-read so trigger-populated columns come back.
        self.item(id, item.user_id)
            .await?
            .context("inserted food item vanished")
    }

    async fn emissions(&self, owner: Option<Uuid>) -> anyhow::Result<Vec<Option<f64>>> {
        let rows: Vec<(Option<f64>,)> = sqlx::query_as(
            r#"
            SELECT carbon_emissions
              FROM food_items
             WHERE $1::uuid IS NULL OR user_id = $1
            "#,
        )
        .bind(owner)
        .fetch_all(&self.db)
        .await
        .context("select carbon emissions")?;
        Ok(rows.into_iter().map(|(v,)| v).collect())
    }

    async fn toggle_like(&self, item_id: Uuid, user: Uuid) -> anyhow::Result<Option<LikeState>> {
        let mut tx = self.db.begin().await.context("begin tx")?;

        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM food_items WHERE id = $1)")
            .bind(item_id)
            .fetch_one(&mut *tx)
            .await
            .context("check food item")?;
        if !exists {
            return Ok(None);
        }

        let removed = sqlx::query("DELETE FROM food_item_likes WHERE food_item_id = $1 AND user_id = $2")
            .bind(item_id)
            .bind(user)
            .execute(&mut *tx)
            .await
            .context("delete like")?
            .rows_affected();
        if removed == 0 {
            sqlx::query("INSERT INTO food_item_likes (food_item_id, user_id) VALUES ($1, $2)")
                .bind(item_id)
                .bind(user)
                .execute(&mut *tx)
                .await
                .context("insert like")?;
        }

        let likes: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM food_item_likes WHERE food_item_id = $1")
            .bind(item_id)
            .fetch_one(&mut *tx)
            .await
            .context("count likes")?;
        tx.commit().await.context("commit tx")?;

        Ok(Some(LikeState {
            likes,
            liked: removed == 0,
        }))
    }
}
