use std::sync::{Arc, Mutex, MutexGuard};

use time::OffsetDateTime;
use tracing::{debug, error};
use uuid::Uuid;

use crate::auth::provider::Identity;
use crate::generation::{Generation, Ticket};
use crate::items::dto::FoodItem;
use crate::items::{expiry, services};
use crate::items::repo_types::LikeState;
use crate::notice::{Notice, Notices};
use crate::store::DocumentStore;

pub const MINE_FAILED: &str = "Failed to load your food items";
pub const NEARBY_FAILED: &str = "Failed to load nearby food items";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemLists {
    pub mine: Vec<FoodItem>,
    pub nearby: Vec<FoodItem>,
}

#[derive(Default)]
struct Lists {
    items: ItemLists,
    loading: bool,
}

/// View model behind the dashboard: the viewer's items and everyone else's.
///
/// Each list has its own generation; a load that finishes after a newer one
/// was started is dropped. A failed load keeps the last list and raises a notice.
pub struct ItemStore {
    store: Arc<dyn DocumentStore>,
    notices: Notices,
    lists: Mutex<Lists>,
    mine_gen: Generation,
    nearby_gen: Generation,
}

impl ItemStore {
    pub fn new(store: Arc<dyn DocumentStore>, notices: Notices) -> Self {
        Self {
            store,
            notices,
            lists: Mutex::new(Lists::default()),
            mine_gen: Generation::new(),
            nearby_gen: Generation::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Lists> {
        self.lists.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn begin_mine(&self) -> Ticket {
        let ticket = self.mine_gen.issue();
        self.lock().loading = true;
        ticket
    }

    pub fn begin_nearby(&self) -> Ticket {
        self.nearby_gen.issue()
    }

    /// Applies a "mine" result; returns false when the ticket is stale.
    pub fn apply_mine(&self, ticket: Ticket, result: anyhow::Result<Vec<FoodItem>>) -> bool {
        if !self.mine_gen.is_current(ticket) {
            debug!("discarding stale own-items result");
            return false;
        }
        let mut lists = self.lock();
        lists.loading = false;
        match result {
            Ok(items) => lists.items.mine = items,
            Err(e) => {
                drop(lists);
                error!(error = %e, "load own items failed");
                self.notices.push(Notice::error(MINE_FAILED));
            }
        }
        true
    }

    pub fn apply_nearby(&self, ticket: Ticket, result: anyhow::Result<Vec<FoodItem>>) -> bool {
        if !self.nearby_gen.is_current(ticket) {
            debug!("discarding stale nearby result");
            return false;
        }
        match result {
            Ok(items) => self.lock().items.nearby = items,
            Err(e) => {
                error!(error = %e, "load nearby items failed");
                self.notices.push(Notice::error(NEARBY_FAILED));
            }
        }
        true
    }

    pub async fn load_mine(&self, viewer: &Identity) {
        let ticket = self.begin_mine();
        let result = services::load_mine(self.store.as_ref(), viewer).await;
        self.apply_mine(ticket, result);
    }

    pub async fn load_nearby(&self, viewer: &Identity) {
        let ticket = self.begin_nearby();
        let result = services::load_nearby(self.store.as_ref(), viewer).await;
        self.apply_nearby(ticket, result);
    }

    /// Runs both loads concurrently; each list applies on its own.
    pub async fn refresh(&self, viewer: &Identity) {
        tokio::join!(self.load_mine(viewer), self.load_nearby(viewer));
    }

    /// Flips the viewer's like and patches the item in whichever list holds it.
    pub async fn toggle_like(&self, viewer: &Identity, item_id: Uuid) -> Option<LikeState> {
        match services::toggle_like(self.store.as_ref(), Some(viewer), item_id).await {
            Ok(state) => {
                let mut lists = self.lock();
                let ItemLists { mine, nearby } = &mut lists.items;
                for item in mine.iter_mut().chain(nearby.iter_mut()) {
                    if item.id == item_id {
                        item.likes = state.likes;
                        item.liked = state.liked;
                    }
                }
                Some(state)
            }
            Err(e) => {
                self.notices.push(Notice::error(e.to_string()));
                None
            }
        }
    }

    /// View teardown: every in-flight load becomes stale.
    pub fn detach(&self) {
        self.mine_gen.invalidate();
        self.nearby_gen.invalidate();
        self.lock().loading = false;
    }

    pub fn is_loading(&self) -> bool {
        self.lock().loading
    }

    pub fn snapshot(&self) -> ItemLists {
        self.lock().items.clone()
    }

    /// Both lists with expired items hidden as of `now`.
    pub fn visible(&self, now: OffsetDateTime) -> ItemLists {
        let lists = self.lock();
        ItemLists {
            mine: expiry::visible(&lists.items.mine, now),
            nearby: expiry::visible(&lists.items.nearby, now),
        }
    }
}
