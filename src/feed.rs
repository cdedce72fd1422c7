use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use sqlx::{postgres::PgListener, PgPool};
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// One row-level change published by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Change {
    pub collection: String,
    pub kind: ChangeKind,
    pub record: serde_json::Value,
}

/// Real-time change feed keyed by collection and event kind.
#[derive(Clone)]
pub struct ChangeFeed {
    tx: broadcast::Sender<Change>,
    active: Arc<AtomicUsize>,
}

impl ChangeFeed {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            active: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Returns how many subscriptions saw the change.
    pub fn publish(&self, change: Change) -> usize {
        debug!(collection = %change.collection, kind = ?change.kind, "change published");
        self.tx.send(change).unwrap_or(0)
    }

    pub fn subscribe(&self, collection: &str, kind: ChangeKind) -> Subscription {
        self.active.fetch_add(1, Ordering::AcqRel);
        debug!(%collection, ?kind, "subscription acquired");
        Subscription {
            rx: self.tx.subscribe(),
            collection: collection.to_string(),
            kind,
            active: Arc::clone(&self.active),
        }
    }

    pub fn active_subscriptions(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new(256)
    }
}

/// Scoped subscription handle; dropping it releases the channel.
pub struct Subscription {
    rx: broadcast::Receiver<Change>,
    collection: String,
    kind: ChangeKind,
    active: Arc<AtomicUsize>,
}

impl Subscription {
    fn matches(&self, change: &Change) -> bool {
        change.collection == self.collection && change.kind == self.kind
    }

    /// Waits for the next matching change; `None` once the feed is gone.
    pub async fn next(&mut self) -> Option<Change> {
        loop {
            match self.rx.recv().await {
                Ok(change) if self.matches(&change) => return Some(change),
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, collection = %self.collection, "subscription lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Next matching change already buffered, without waiting.
    pub fn try_next(&mut self) -> Option<Change> {
        loop {
            match self.rx.try_recv() {
                Ok(change) if self.matches(&change) => return Some(change),
                Ok(_) => continue,
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, collection = %self.collection, "subscription lagged");
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::AcqRel);
        debug!(collection = %self.collection, kind = ?self.kind, "subscription released");
    }
}

/// Forwards Postgres `NOTIFY` payloads on `channel` into the feed.
pub async fn bridge_postgres(
    pool: &PgPool,
    channel: &str,
    feed: ChangeFeed,
) -> anyhow::Result<JoinHandle<()>> {
    let mut listener = PgListener::connect_with(pool)
        .await
        .context("connect change listener")?;
    listener
        .listen(channel)
        .await
        .with_context(|| format!("listen on {}", channel))?;

    Ok(tokio::spawn(async move {
        loop {
            match listener.recv().await {
                Ok(notification) => match serde_json::from_str::<Change>(notification.payload()) {
                    Ok(change) => {
                        feed.publish(change);
                    }
                    Err(e) => warn!(error = %e, "malformed change payload"),
                },
                Err(e) => {
                    error!(error = %e, "change listener failed; reconnecting");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn change(collection: &str, kind: ChangeKind) -> Change {
        Change {
            collection: collection.into(),
            kind,
            record: json!({}),
        }
    }

    #[tokio::test]
    async fn subscription_filters_by_collection_and_kind() {
        let feed = ChangeFeed::new(16);
        let mut sub = feed.subscribe("notifications", ChangeKind::Insert);
        feed.publish(change("food_items", ChangeKind::Insert));
        feed.publish(change("notifications", ChangeKind::Update));
        feed.publish(change("notifications", ChangeKind::Insert));

        let got = sub.next().await.expect("matching change");
        assert_eq!(got.collection, "notifications");
        assert_eq!(got.kind, ChangeKind::Insert);
        assert!(sub.try_next().is_none());
    }

    #[test]
    fn dropping_subscription_releases_it() {
        let feed = ChangeFeed::new(16);
        let sub = feed.subscribe("notifications", ChangeKind::Insert);
        assert_eq!(feed.active_subscriptions(), 1);
        drop(sub);
        assert_eq!(feed.active_subscriptions(), 0);
    }

    #[test]
    fn payload_shape_matches_notify_trigger() {
        let raw = r#"{"collection":"notifications","kind":"INSERT","record":{"id":"x"}}"#;
        let parsed: Change = serde_json::from_str(raw).expect("parse");
        assert_eq!(parsed.kind, ChangeKind::Insert);
        assert_eq!(parsed.record["id"], "x");
    }
}
