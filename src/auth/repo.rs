use anyhow::Context;
use async_trait::async_trait;
use uuid::Uuid;

use crate::auth::repo_types::Account;
use crate::store::pg::PgStore;

/// Identity records backing the local session provider.
#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<Account>>;
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Account>>;
    /// Create a new user with hashed password.
    async fn create_user(&self, email: &str, password_hash: &str) -> anyhow::Result<Account>;
}

#[async_trait]
impl UserRepo for PgStore {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<Account>> {
        sqlx::query_as::<_, Account>(
            r#"
            SELECT id, email, password_hash, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .context("find user by email")
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Account>> {
        sqlx::query_as::<_, Account>(
            r#"SELECT id, email, password_hash, created_at FROM users WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("find user by id")
    }

    async fn create_user(&self, email: &str, password_hash: &str) -> anyhow::Result<Account> {
        sqlx::query_as::<_, Account>(
            r#"
            INSERT INTO users (email, password_hash)
            VALUES ($1, $2)
            RETURNING id, email, password_hash, created_at
            "#,
        )
        .bind(email)
        .bind(password_hash)
        .fetch_one(&self.db)
        .await
        .context("create user")
    }
}
