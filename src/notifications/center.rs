use std::sync::Arc;

use tracing::{error, warn};
use uuid::Uuid;

use crate::feed::{Change, ChangeFeed, ChangeKind, Subscription};
use crate::notice::{Notice, Notices};
use crate::notifications::repo_types::NotificationRow;
use crate::store::DocumentStore;

pub const COLLECTION: &str = "notifications";

/// Decodes a feed change into a notification addressed to `owner`.
pub fn owned_row(change: &Change, owner: Uuid) -> Option<NotificationRow> {
    match serde_json::from_value::<NotificationRow>(change.record.clone()) {
        Ok(row) if row.user_id == owner => Some(row),
        Ok(_) => None,
        Err(e) => {
            warn!(error = %e, "undecodable notification record");
            None
        }
    }
}

/// The bell menu: a user's notifications, unread count and live inserts.
///
/// Holds exactly one change-feed subscription for its lifetime; dropping the
/// center releases it.
pub struct NotificationCenter {
    owner: Uuid,
    store: Arc<dyn DocumentStore>,
    subscription: Subscription,
    items: Vec<NotificationRow>,
    unread: usize,
    notices: Notices,
}

impl NotificationCenter {
    /// Subscribes before any fetch so no insert falls between the two.
    pub fn open(
        store: Arc<dyn DocumentStore>,
        feed: &ChangeFeed,
        owner: Uuid,
        notices: Notices,
    ) -> Self {
        Self {
            owner,
            store,
            subscription: feed.subscribe(COLLECTION, ChangeKind::Insert),
            items: Vec::new(),
            unread: 0,
            notices,
        }
    }

    pub fn items(&self) -> &[NotificationRow] {
        &self.items
    }

    pub fn unread(&self) -> usize {
        self.unread
    }

    /// Bulk fetch; on failure the previous list stays.
    pub async fn load(&mut self) {
        match self.store.notifications_for(self.owner).await {
            Ok(rows) => {
                self.unread = rows.iter().filter(|n| !n.is_read).count();
                self.items = rows;
            }
            Err(e) => error!(error = %e, user_id = %self.owner, "fetch notifications failed"),
        }
    }

    fn prepend(&mut self, row: NotificationRow) {
        if !row.is_read {
            self.unread += 1;
        }
        self.items.insert(0, row);
    }

    /// Applies every live insert already buffered; returns how many arrived.
    pub fn drain_live(&mut self) -> usize {
        let mut applied = 0;
        while let Some(change) = self.subscription.try_next() {
            if let Some(row) = owned_row(&change, self.owner) {
                self.prepend(row);
                applied += 1;
            }
        }
        applied
    }

    /// Waits for the next live insert for this owner.
    pub async fn next_live(&mut self) -> Option<NotificationRow> {
        loop {
            let change = self.subscription.next().await?;
            if let Some(row) = owned_row(&change, self.owner) {
                self.prepend(row.clone());
                return Some(row);
            }
        }
    }

    pub async fn mark_read(&mut self, id: Uuid) {
        match self.store.mark_read(id, self.owner).await {
            Ok(true) => {
                if let Some(n) = self.items.iter_mut().find(|n| n.id == id && !n.is_read) {
                    n.is_read = true;
                    self.unread = self.unread.saturating_sub(1);
                }
            }
            Ok(false) => warn!(notification_id = %id, "notification not found"),
            Err(e) => {
                error!(error = %e, notification_id = %id, "mark read failed");
                self.notices.push(Notice::error("Failed to update notification"));
            }
        }
    }
}
