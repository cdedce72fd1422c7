use anyhow::Context;
use async_trait::async_trait;
use uuid::Uuid;

use crate::store::pg::PgStore;

/// Remote procedures exposed by the backend, invoked as side effects.
#[async_trait]
pub trait RemoteProcedures: Send + Sync {
    /// Bumps a user's leaderboard score by one.
    async fn increment_score(&self, uid: Uuid) -> anyhow::Result<()>;
}

#[async_trait]
impl RemoteProcedures for PgStore {
    async fn increment_score(&self, uid: Uuid) -> anyhow::Result<()> {
        sqlx::query("SELECT increment_score($1)")
            .bind(uid)
            .execute(&self.db)
            .await
            .context("rpc increment_score")?;
        Ok(())
    }
}
