use anyhow::Context;
use async_trait::async_trait;
use uuid::Uuid;

use crate::requests::repo_types::{FoodRequestRow, SentRequestRow};
use crate::store::pg::PgStore;

/// `food_requests` collection.
#[async_trait]
pub trait RequestRepo: Send + Sync {
    async fn insert_request(&self, item_id: Uuid, requester: Uuid)
        -> anyhow::Result<FoodRequestRow>;
    /// Requests sent by `requester`, newest first.
    async fn sent_requests(&self, requester: Uuid) -> anyhow::Result<Vec<SentRequestRow>>;
}

#[async_trait]
impl RequestRepo for PgStore {
    async fn insert_request(
        &self,
        item_id: Uuid,
        requester: Uuid,
    ) -> anyhow::Result<FoodRequestRow> {
        sqlx::query_as::<_, FoodRequestRow>(
            r#"
            INSERT INTO food_requests (food_item_id, requester_id, status)
            VALUES ($1, $2, 'pending')
            RETURNING id, food_item_id, requester_id, status, created_at
            "#,
        )
        .bind(item_id)
        .bind(requester)
        .fetch_one(&self.db)
        .await
        .context("insert food request")
    }

    async fn sent_requests(&self, requester: Uuid) -> anyhow::Result<Vec<SentRequestRow>> {
        sqlx::query_as::<_, SentRequestRow>(
            r#"
            SELECT r.id, r.status, r.created_at, f.title, f.image_url
              FROM food_requests r
              JOIN food_items f ON f.id = r.food_item_id
             WHERE r.requester_id = $1
             ORDER BY r.created_at DESC
            "#,
        )
        .bind(requester)
        .fetch_all(&self.db)
        .await
        .context("select sent requests")
    }
}
