use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::auth::{
    dto::RegisterRequest,
    jwt::JwtKeys,
    password::{hash_password, is_valid_email, verify_password, MIN_PASSWORD_LEN},
    repo_types::Account,
};
use crate::error::AppError;
use crate::profiles::{repo_types::NewProfile, services::default_avatar_url};
use crate::store::DocumentStore;

/// The signed-in person as every view sees them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Identity {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub avatar: String,
}

#[derive(Debug, Clone)]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub identity: Identity,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid email")]
    InvalidEmail,
    #[error("Password too short")]
    PasswordTooShort,
    #[error("Name is required")]
    MissingName,
    #[error("Email already registered")]
    EmailTaken,
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Invalid or expired token")]
    InvalidToken,
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidEmail | AuthError::PasswordTooShort | AuthError::MissingName => {
                AppError::Validation(err.to_string())
            }
            AuthError::EmailTaken => AppError::Conflict(err.to_string()),
            AuthError::InvalidCredentials | AuthError::InvalidToken => {
                AppError::Unauthorized(err.to_string())
            }
            AuthError::Backend(e) => AppError::Internal(e),
        }
    }
}

/// Identity/session service: sign-up, password login, token resolution.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn sign_up(&self, request: &RegisterRequest) -> Result<SessionTokens, AuthError>;
    async fn sign_in(&self, email: &str, password: &str) -> Result<SessionTokens, AuthError>;
    /// Identity behind a valid access token.
    async fn resolve(&self, access_token: &str) -> Result<Identity, AuthError>;
    async fn refresh(&self, refresh_token: &str) -> Result<SessionTokens, AuthError>;
    async fn sign_out(&self, identity: &Identity) -> Result<(), AuthError>;
}

/// Session provider backed by the `users` table, argon2 and JWTs.
pub struct LocalSessionProvider {
    store: Arc<dyn DocumentStore>,
    keys: JwtKeys,
}

impl LocalSessionProvider {
    pub fn new(store: Arc<dyn DocumentStore>, keys: JwtKeys) -> Self {
        Self { store, keys }
    }

    /// Joins the identity with its profile; missing fields get display fallbacks.
    async fn identity(&self, user: &Account) -> anyhow::Result<Identity> {
        let profile = self.store.profile(user.id).await?;
        let name = profile
            .as_ref()
            .and_then(|p| p.full_name.clone())
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| "User".to_string());
        let avatar = profile
            .and_then(|p| p.avatar_url)
            .filter(|a| !a.is_empty())
            .unwrap_or_else(|| default_avatar_url(&name));
        Ok(Identity {
            id: user.id,
            email: user.email.clone(),
            name,
            avatar,
        })
    }

    async fn issue(&self, user: &Account) -> Result<SessionTokens, AuthError> {
        let access_token = self.keys.sign_access(user.id)?;
        let refresh_token = self.keys.sign_refresh(user.id)?;
        Ok(SessionTokens {
            access_token,
            refresh_token,
            identity: self.identity(user).await?,
        })
    }

    async fn user(&self, id: Uuid) -> Result<Account, AuthError> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or(AuthError::InvalidToken)
    }
}

#[async_trait]
impl SessionProvider for LocalSessionProvider {
    #[instrument(skip(self, request), fields(email = %request.email))]
    async fn sign_up(&self, request: &RegisterRequest) -> Result<SessionTokens, AuthError> {
        let email = request.email.trim().to_lowercase();
        if !is_valid_email(&email) {
            warn!(%email, "invalid email");
            return Err(AuthError::InvalidEmail);
        }
        if request.password.len() < MIN_PASSWORD_LEN {
            warn!("password too short");
            return Err(AuthError::PasswordTooShort);
        }
        let name = request.name.trim();
        if name.is_empty() {
            return Err(AuthError::MissingName);
        }
        if self.store.find_by_email(&email).await?.is_some() {
            warn!(%email, "email already registered");
            return Err(AuthError::EmailTaken);
        }

        let hash = hash_password(&request.password)?;
        let user = self.store.create_user(&email, &hash).await?;

        // The profile mirrors the identity and must share its id.
        let profile = NewProfile {
            id: user.id,
            email: email.clone(),
            full_name: name.to_string(),
            phone_number: request
                .phone_number
                .as_deref()
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string),
            avatar_url: default_avatar_url(name),
        };
        if let Err(e) = self.store.insert_profile(&profile).await {
            error!(error = %e, user_id = %user.id, "profile insert failed");
            return Err(e.into());
        }

        info!(user_id = %user.id, %email, "user registered");
        self.issue(&user).await
    }

    #[instrument(skip(self, password))]
    async fn sign_in(&self, email: &str, password: &str) -> Result<SessionTokens, AuthError> {
        let email = email.trim().to_lowercase();
        if !is_valid_email(&email) {
            return Err(AuthError::InvalidEmail);
        }
        let Some(user) = self.store.find_by_email(&email).await? else {
            warn!(%email, "login unknown email");
            return Err(AuthError::InvalidCredentials);
        };
        if !verify_password(password, &user.password_hash)? {
            warn!(%email, user_id = %user.id, "login invalid password");
            return Err(AuthError::InvalidCredentials);
        }
        info!(user_id = %user.id, "user logged in");
        self.issue(&user).await
    }

    async fn resolve(&self, access_token: &str) -> Result<Identity, AuthError> {
        let claims = self.keys.verify_access(access_token).map_err(|_| {
            warn!("invalid or expired token");
            AuthError::InvalidToken
        })?;
        let user = self.user(claims.sub).await?;
        Ok(self.identity(&user).await?)
    }

    async fn refresh(&self, refresh_token: &str) -> Result<SessionTokens, AuthError> {
        let claims = self
            .keys
            .verify_refresh(refresh_token)
            .map_err(|_| AuthError::InvalidToken)?;
        let user = self.user(claims.sub).await?;
        self.issue(&user).await
    }

    async fn sign_out(&self, identity: &Identity) -> Result<(), AuthError> {
        // Tokens are stateless; they lapse at expiry.
        info!(user_id = %identity.id, "user signed out");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::profiles::repo::ProfileRepo;
    use crate::store::MemoryStore;

    fn provider() -> (Arc<MemoryStore>, LocalSessionProvider) {
        let store = Arc::new(MemoryStore::new());
        let keys = JwtKeys::from_config(&AppConfig::for_tests().jwt);
        let provider = LocalSessionProvider::new(store.clone(), keys);
        (store, provider)
    }

    fn register(email: &str) -> RegisterRequest {
        RegisterRequest {
            email: email.into(),
            password: "long-enough-pw".into(),
            name: "Ana Lima".into(),
            phone_number: Some("+1 555".into()),
        }
    }

    #[tokio::test]
    async fn sign_up_mirrors_profile() {
        let (store, provider) = provider();
        let tokens = provider.sign_up(&register(" Ana@Example.org ")).await.unwrap();
        assert_eq!(tokens.identity.email, "ana@example.org");
        assert_eq!(tokens.identity.name, "Ana Lima");
        assert!(tokens.identity.avatar.contains("name=Ana%20Lima"));

        let profile = store.profile(tokens.identity.id).await.unwrap().expect("profile");
        assert_eq!(profile.full_name.as_deref(), Some("Ana Lima"));
        assert_eq!(profile.phone_number.as_deref(), Some("+1 555"));
    }

    #[tokio::test]
    async fn sign_up_rejects_bad_input_and_duplicates() {
        let (_, provider) = provider();
        let mut short = register("a@b.org");
        short.password = "short".into();
        assert!(matches!(provider.sign_up(&short).await, Err(AuthError::PasswordTooShort)));
        assert!(matches!(
            provider.sign_up(&register("not-an-email")).await,
            Err(AuthError::InvalidEmail)
        ));
        provider.sign_up(&register("a@b.org")).await.unwrap();
        assert!(matches!(
            provider.sign_up(&register("a@b.org")).await,
            Err(AuthError::EmailTaken)
        ));
    }

    #[tokio::test]
    async fn sign_in_then_resolve_and_refresh() {
        let (_, provider) = provider();
        provider.sign_up(&register("c@d.org")).await.unwrap();
        assert!(matches!(
            provider.sign_in("c@d.org", "wrong-password").await,
            Err(AuthError::InvalidCredentials)
        ));

        let tokens = provider.sign_in("c@d.org", "long-enough-pw").await.unwrap();
        let identity = provider.resolve(&tokens.access_token).await.unwrap();
        assert_eq!(identity, tokens.identity);
        assert!(matches!(
            provider.resolve(&tokens.refresh_token).await,
            Err(AuthError::InvalidToken)
        ));

        let renewed = provider.refresh(&tokens.refresh_token).await.unwrap();
        assert_eq!(renewed.identity.id, identity.id);
    }
}
