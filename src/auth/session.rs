use std::sync::Arc;

use tokio::sync::watch;
use tracing::warn;

use crate::auth::{
    dto::RegisterRequest,
    provider::{AuthError, Identity, SessionProvider, SessionTokens},
};
use crate::feed::ChangeFeed;
use crate::notice::Notices;
use crate::notifications::center::NotificationCenter;
use crate::store::DocumentStore;

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    SignedIn(Identity),
    SignedOut,
}

/// One client session, passed explicitly to whatever needs the viewer.
///
/// `init` restores a session from a stored refresh token; `logout` (or
/// `teardown`) ends it and releases the notification subscription.
pub struct Session {
    provider: Arc<dyn SessionProvider>,
    tokens: Option<SessionTokens>,
    events: watch::Sender<SessionEvent>,
    notifications: Option<NotificationCenter>,
}

impl Session {
    pub async fn init(provider: Arc<dyn SessionProvider>, refresh_token: Option<&str>) -> Self {
        let tokens = match refresh_token {
            Some(token) => match provider.refresh(token).await {
                Ok(tokens) => Some(tokens),
                Err(e) => {
                    warn!(error = %e, "stored session rejected");
                    None
                }
            },
            None => None,
        };
        let initial = match &tokens {
            Some(t) => SessionEvent::SignedIn(t.identity.clone()),
            None => SessionEvent::SignedOut,
        };
        let (events, _) = watch::channel(initial);
        Self {
            provider,
            tokens,
            events,
            notifications: None,
        }
    }

    pub fn viewer(&self) -> Option<&Identity> {
        self.tokens.as_ref().map(|t| &t.identity)
    }

    pub fn is_authenticated(&self) -> bool {
        self.tokens.is_some()
    }

    pub fn access_token(&self) -> Option<&str> {
        self.tokens.as_ref().map(|t| t.access_token.as_str())
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.tokens.as_ref().map(|t| t.refresh_token.as_str())
    }

    /// Session-change notifications; the receiver starts at the current state.
    pub fn changes(&self) -> watch::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    fn signed_in(&mut self, tokens: SessionTokens) -> &Identity {
        // A new identity must not inherit the previous one's subscription.
        self.notifications = None;
        self.events
            .send_replace(SessionEvent::SignedIn(tokens.identity.clone()));
        &self.tokens.insert(tokens).identity
    }

    pub async fn sign_up(&mut self, request: &RegisterRequest) -> Result<&Identity, AuthError> {
        let tokens = self.provider.sign_up(request).await?;
        Ok(self.signed_in(tokens))
    }

    pub async fn login(&mut self, email: &str, password: &str) -> Result<&Identity, AuthError> {
        let tokens = self.provider.sign_in(email, password).await?;
        Ok(self.signed_in(tokens))
    }

    /// Acquires the session's notification center, replacing any previous one.
    pub fn open_notifications(
        &mut self,
        store: Arc<dyn DocumentStore>,
        feed: &ChangeFeed,
        notices: Notices,
    ) -> Option<&mut NotificationCenter> {
        let owner = self.viewer()?.id;
        self.notifications = None;
        Some(
            self.notifications
                .insert(NotificationCenter::open(store, feed, owner, notices)),
        )
    }

    pub fn notifications(&mut self) -> Option<&mut NotificationCenter> {
        self.notifications.as_mut()
    }

    /// Local state is cleared even when the provider call fails.
    pub async fn logout(&mut self) -> Result<(), AuthError> {
        self.notifications = None;
        let Some(tokens) = self.tokens.take() else {
            return Ok(());
        };
        self.events.send_replace(SessionEvent::SignedOut);
        self.provider.sign_out(&tokens.identity).await
    }

    pub async fn teardown(mut self) {
        if let Err(e) = self.logout().await {
            warn!(error = %e, "sign out during teardown failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{jwt::JwtKeys, provider::LocalSessionProvider};
    use crate::config::AppConfig;
    use crate::store::MemoryStore;

    fn provider(store: Arc<MemoryStore>) -> Arc<dyn SessionProvider> {
        let keys = JwtKeys::from_config(&AppConfig::for_tests().jwt);
        Arc::new(LocalSessionProvider::new(store, keys))
    }

    fn register() -> RegisterRequest {
        RegisterRequest {
            email: "sam@example.org".into(),
            password: "long-enough-pw".into(),
            name: "Sam".into(),
            phone_number: None,
        }
    }

    #[tokio::test]
    async fn lifecycle_publishes_changes() {
        let store = Arc::new(MemoryStore::new());
        let mut session = Session::init(provider(store), None).await;
        let changes = session.changes();
        assert_eq!(*changes.borrow(), SessionEvent::SignedOut);

        let id = session.sign_up(&register()).await.unwrap().id;
        assert!(session.is_authenticated());
        assert!(matches!(&*changes.borrow(), SessionEvent::SignedIn(i) if i.id == id));

        session.logout().await.unwrap();
        assert!(session.viewer().is_none());
        assert_eq!(*changes.borrow(), SessionEvent::SignedOut);
    }

    #[tokio::test]
    async fn init_restores_from_refresh_token() {
        let store = Arc::new(MemoryStore::new());
        let provider = provider(store);
        let mut first = Session::init(provider.clone(), None).await;
        first.sign_up(&register()).await.unwrap();
        let token = first.refresh_token().map(str::to_string);

        let restored = Session::init(provider.clone(), token.as_deref()).await;
        assert_eq!(restored.viewer().map(|i| i.name.as_str()), Some("Sam"));

        let rejected = Session::init(provider, Some("garbage")).await;
        assert!(!rejected.is_authenticated());
    }

    #[tokio::test]
    async fn teardown_releases_notification_subscription() {
        let feed = ChangeFeed::new(16);
        let store = Arc::new(MemoryStore::new().with_feed(feed.clone()));
        let mut session = Session::init(provider(store.clone()), None).await;
        assert!(session
            .open_notifications(store.clone(), &feed, Notices::new())
            .is_none());

        session.sign_up(&register()).await.unwrap();
        session.open_notifications(store.clone(), &feed, Notices::new());
        session.open_notifications(store, &feed, Notices::new());
        assert_eq!(feed.active_subscriptions(), 1);

        session.teardown().await;
        assert_eq!(feed.active_subscriptions(), 0);
    }
}
