use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Row of `users`: login credentials only. Display fields live on the profile.
#[derive(Debug, Clone, FromRow)]
pub struct Account {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub created_at: OffsetDateTime,
}
