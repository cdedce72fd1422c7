use anyhow::Context;
use async_trait::async_trait;
use uuid::Uuid;

use crate::notifications::repo_types::NotificationRow;
use crate::store::pg::PgStore;

/// `notifications` collection. Rows are normally created by store-side triggers.
#[async_trait]
pub trait NotificationRepo: Send + Sync {
    async fn notifications_for(&self, user: Uuid) -> anyhow::Result<Vec<NotificationRow>>;
    async fn insert_notification(&self, user: Uuid, message: &str)
        -> anyhow::Result<NotificationRow>;
    /// Marks one of `user`'s notifications read; `false` if none matched.
    async fn mark_read(&self, id: Uuid, user: Uuid) -> anyhow::Result<bool>;
}

#[async_trait]
impl NotificationRepo for PgStore {
    async fn notifications_for(&self, user: Uuid) -> anyhow::Result<Vec<NotificationRow>> {
        sqlx::query_as::<_, NotificationRow>(
            r#"
            SELECT id, user_id, message, is_read, created_at
              FROM notifications
             WHERE user_id = $1
             ORDER BY created_at DESC
            "#,
        )
        .bind(user)
        .fetch_all(&self.db)
        .await
        .context("select notifications")
    }

    async fn insert_notification(
        &self,
        user: Uuid,
        message: &str,
    ) -> anyhow::Result<NotificationRow> {
        sqlx::query_as::<_, NotificationRow>(
            r#"
            INSERT INTO notifications (user_id, message)
            VALUES ($1, $2)
            RETURNING id, user_id, message, is_read, created_at
            "#,
        )
        .bind(user)
        .bind(message)
        .fetch_one(&self.db)
        .await
        .context("insert notification")
    }

    async fn mark_read(&self, id: Uuid, user: Uuid) -> anyhow::Result<bool> {
        let updated = sqlx::query(
            r#"UPDATE notifications SET is_read = TRUE WHERE id = $1 AND user_id = $2"#,
        )
        .bind(id)
        .bind(user)
        .execute(&self.db)
        .await
        .context("mark notification read")?
        .rows_affected();
        Ok(updated > 0)
    }
}
