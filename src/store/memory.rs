use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::auth::{repo::UserRepo, repo_types::Account};
use crate::feed::{Change, ChangeFeed, ChangeKind};
use crate::items::{
    repo::ItemRepo,
    repo_types::{FoodItemRow, LikeState, NewFoodItem},
};
use crate::notifications::{repo::NotificationRepo, repo_types::NotificationRow};
use crate::profiles::{
    repo::ProfileRepo,
    repo_types::{NewProfile, ProfileRow, ProfileSummary, ProfileUpdate, SavedLocation, ScoreRow},
};
use crate::requests::{
    repo::RequestRepo,
    repo_types::{FoodRequestRow, SentRequestRow},
};
use crate::rpc::RemoteProcedures;

/// Text of the owner's notification when someone requests their item.
pub fn request_message(requester: Option<&str>, title: &str) -> String {
    let name = requester.map(str::trim).filter(|n| !n.is_empty()).unwrap_or("Someone");
    format!("{} requested your {}", name, title)
}

type EmissionFn = Box<dyn Fn(&NewFoodItem) -> Option<f64> + Send + Sync>;

#[derive(Default)]
struct Data {
    users: Vec<Account>,
    profiles: HashMap<Uuid, ProfileRow>,
    items: Vec<FoodItemRow>,
    likes: HashSet<(Uuid, Uuid)>,
    requests: Vec<FoodRequestRow>,
    notifications: Vec<NotificationRow>,
    last_ts: Option<OffsetDateTime>,
}

impl Data {
    /// Strictly increasing creation stamps so newest-first order is total.
    fn next_timestamp(&mut self) -> OffsetDateTime {
        let now = OffsetDateTime::now_utc();
        let ts = match self.last_ts {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        };
        self.last_ts = Some(ts);
        ts
    }

    fn with_likes(&self, row: &FoodItemRow, viewer: Uuid) -> FoodItemRow {
        let mut row = row.clone();
        row.likes = self.likes.iter().filter(|(item, _)| *item == row.id).count() as i64;
        row.liked = self.likes.contains(&(row.id, viewer));
        row
    }

    fn newest_first(&self, viewer: Uuid, keep: impl Fn(&FoodItemRow) -> bool) -> Vec<FoodItemRow> {
        let mut rows: Vec<FoodItemRow> = self
            .items
            .iter()
            .filter(|row| keep(row))
            .map(|row| self.with_likes(row, viewer))
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        rows
    }
}

/// In-process store with the same contracts as the Postgres adapter.
///
/// Store-side triggers are emulated: an optional emission function fills
/// `carbon_emissions` on insert, and notification inserts are published on
/// the attached change feed.
#[derive(Default)]
pub struct MemoryStore {
    data: Mutex<Data>,
    feed: Option<ChangeFeed>,
    emissions: Option<EmissionFn>,
    fail_reads: AtomicBool,
    fail_profile_lookups: AtomicBool,
    fail_item_writes: AtomicBool,
    item_inserts: AtomicUsize,
    profile_lookups: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_feed(mut self, feed: ChangeFeed) -> Self {
        self.feed = Some(feed);
        self
    }

    pub fn with_emissions(
        mut self,
        f: impl Fn(&NewFoodItem) -> Option<f64> + Send + Sync + 'static,
    ) -> Self {
        self.emissions = Some(Box::new(f));
        self
    }

    /// Makes every item read fail, as if the store were unreachable.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::Release);
    }

    pub fn set_fail_profile_lookups(&self, fail: bool) {
        self.fail_profile_lookups.store(fail, Ordering::Release);
    }

    /// Makes item inserts fail after being counted.
    pub fn set_fail_item_writes(&self, fail: bool) {
        self.fail_item_writes.store(fail, Ordering::Release);
    }

    pub fn item_inserts(&self) -> usize {
        self.item_inserts.load(Ordering::Acquire)
    }

    pub fn profile_lookups(&self) -> usize {
        self.profile_lookups.load(Ordering::Acquire)
    }

    /// A bare row as an older client might have written it: no quantity,
    /// unit, location or emissions.
    pub fn raw_item(owner: Uuid, title: &str) -> FoodItemRow {
        FoodItemRow {
            id: Uuid::new_v4(),
            title: title.to_string(),
            description: String::new(),
            category: "meals".into(),
            quantity: None,
            unit: None,
            image_url: None,
            location_lat: None,
            location_lng: None,
            location_address: None,
            user_id: owner,
            created_at: OffsetDateTime::UNIX_EPOCH,
            expire_date: None,
            carbon_emissions: None,
            likes: 0,
            liked: false,
        }
    }

    /// Stores `row` verbatim apart from a fresh creation stamp.
    pub fn insert_raw(&self, mut row: FoodItemRow) -> Uuid {
        let mut data = self.lock();
        row.created_at = data.next_timestamp();
        let id = row.id;
        data.items.push(row);
        id
    }

    pub fn set_emission(&self, item_id: Uuid, value: Option<f64>) {
        let mut data = self.lock();
        if let Some(row) = data.items.iter_mut().find(|row| row.id == item_id) {
            row.carbon_emissions = value;
        }
    }

    fn lock(&self) -> MutexGuard<'_, Data> {
        // A poisoned lock only means a test panicked mid-write; the data is still usable.
        self.data.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check_reads(&self) -> anyhow::Result<()> {
        anyhow::ensure!(!self.fail_reads.load(Ordering::Acquire), "store unavailable");
        Ok(())
    }
}

#[async_trait]
impl UserRepo for MemoryStore {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<Account>> {
        Ok(self.lock().users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Account>> {
        Ok(self.lock().users.iter().find(|u| u.id == id).cloned())
    }

    async fn create_user(&self, email: &str, password_hash: &str) -> anyhow::Result<Account> {
        let mut data = self.lock();
        anyhow::ensure!(
            !data.users.iter().any(|u| u.email == email),
            "duplicate key value violates unique constraint \"users_email_key\""
        );
        let user = Account {
            id: Uuid::new_v4(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            created_at: data.next_timestamp(),
        };
        data.users.push(user.clone());
        Ok(user)
    }
}

#[async_trait]
impl ItemRepo for MemoryStore {
    async fn items_by_owner(&self, owner: Uuid, viewer: Uuid) -> anyhow::Result<Vec<FoodItemRow>> {
        self.check_reads()?;
        Ok(self.lock().newest_first(viewer, |row| row.user_id == owner))
    }

    async fn items_not_owned_by(
        &self,
        owner: Uuid,
        viewer: Uuid,
    ) -> anyhow::Result<Vec<FoodItemRow>> {
        self.check_reads()?;
        Ok(self.lock().newest_first(viewer, |row| row.user_id != owner))
    }

    async fn item(&self, id: Uuid, viewer: Uuid) -> anyhow::Result<Option<FoodItemRow>> {
        self.check_reads()?;
        let data = self.lock();
        Ok(data
            .items
            .iter()
            .find(|row| row.id == id)
            .map(|row| data.with_likes(row, viewer)))
    }

    async fn insert_item(&self, item: &NewFoodItem) -> anyhow::Result<FoodItemRow> {
        self.item_inserts.fetch_add(1, Ordering::AcqRel);
        anyhow::ensure!(
            !self.fail_item_writes.load(Ordering::Acquire),
            "food_items unavailable"
        );
        let carbon_emissions = self.emissions.as_ref().and_then(|f| f(item));
        let mut data = self.lock();
        let row = FoodItemRow {
            id: Uuid::new_v4(),
            title: item.title.clone(),
            description: item.description.clone(),
            category: item.category.as_str().to_string(),
            quantity: Some(i32::try_from(item.quantity)?),
            unit: Some(item.unit.as_str().to_string()),
            image_url: item.image_url.clone(),
            location_lat: Some(item.location_lat),
            location_lng: Some(item.location_lng),
            location_address: Some(item.location_address.clone()),
            user_id: item.user_id,
            created_at: data.next_timestamp(),
            expire_date: Some(item.expire_date),
            carbon_emissions,
            likes: 0,
            liked: false,
        };
        data.items.push(row.clone());
        Ok(row)
    }

    async fn emissions(&self, owner: Option<Uuid>) -> anyhow::Result<Vec<Option<f64>>> {
        self.check_reads()?;
        Ok(self
            .lock()
            .items
            .iter()
            .filter(|row| owner.map_or(true, |o| row.user_id == o))
            .map(|row| row.carbon_emissions)
            .collect())
    }

    async fn toggle_like(&self, item_id: Uuid, user: Uuid) -> anyhow::Result<Option<LikeState>> {
        let mut data = self.lock();
        if !data.items.iter().any(|row| row.id == item_id) {
            return Ok(None);
        }
        let liked = if data.likes.remove(&(item_id, user)) {
            false
        } else {
            data.likes.insert((item_id, user));
            true
        };
        let likes = data.likes.iter().filter(|(item, _)| *item == item_id).count() as i64;
        Ok(Some(LikeState { likes, liked }))
    }
}

#[async_trait]
impl ProfileRepo for MemoryStore {
    async fn profiles_by_ids(&self, ids: &[Uuid]) -> anyhow::Result<Vec<ProfileSummary>> {
        self.profile_lookups.fetch_add(1, Ordering::AcqRel);
        anyhow::ensure!(
            !self.fail_profile_lookups.load(Ordering::Acquire),
            "profiles unavailable"
        );
        let data = self.lock();
        Ok(ids
            .iter()
            .filter_map(|id| data.profiles.get(id))
            .map(|p| ProfileSummary {
                id: p.id,
                full_name: p.full_name.clone(),
                avatar_url: p.avatar_url.clone(),
            })
            .collect())
    }

    async fn profile(&self, id: Uuid) -> anyhow::Result<Option<ProfileRow>> {
        Ok(self.lock().profiles.get(&id).cloned())
    }

    async fn insert_profile(&self, profile: &NewProfile) -> anyhow::Result<ProfileRow> {
        let mut data = self.lock();
        anyhow::ensure!(
            !data.profiles.contains_key(&profile.id),
            "duplicate key value violates unique constraint \"profiles_pkey\""
        );
        let row = ProfileRow {
            id: profile.id,
            email: profile.email.clone(),
            full_name: Some(profile.full_name.clone()),
            avatar_url: Some(profile.avatar_url.clone()),
            phone_number: profile.phone_number.clone(),
            bio: None,
            requests_sent: Some(0),
            location_lat: None,
            location_lng: None,
            location_address: None,
            created_at: data.next_timestamp(),
        };
        data.profiles.insert(row.id, row.clone());
        Ok(row)
    }

    async fn update_profile(
        &self,
        id: Uuid,
        update: &ProfileUpdate,
    ) -> anyhow::Result<Option<ProfileRow>> {
        let mut data = self.lock();
        let Some(row) = data.profiles.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(name) = &update.full_name {
            row.full_name = Some(name.clone());
        }
        if let Some(phone) = &update.phone_number {
            row.phone_number = Some(phone.clone());
        }
        if let Some(bio) = &update.bio {
            row.bio = Some(bio.clone());
        }
        if let Some(avatar) = &update.avatar_url {
            row.avatar_url = Some(avatar.clone());
        }
        Ok(Some(row.clone()))
    }

    async fn save_location(&self, id: Uuid, location: &SavedLocation) -> anyhow::Result<bool> {
        let mut data = self.lock();
        let Some(row) = data.profiles.get_mut(&id) else {
            return Ok(false);
        };
        row.location_lat = Some(location.lat);
        row.location_lng = Some(location.lng);
        row.location_address = Some(location.address.clone());
        Ok(true)
    }

    async fn scores(&self) -> anyhow::Result<Vec<ScoreRow>> {
        Ok(self
            .lock()
            .profiles
            .values()
            .map(|p| ScoreRow {
                id: p.id,
                full_name: p.full_name.clone(),
                requests_sent: p.requests_sent,
            })
            .collect())
    }
}

#[async_trait]
impl RequestRepo for MemoryStore {
    async fn insert_request(
        &self,
        item_id: Uuid,
        requester: Uuid,
    ) -> anyhow::Result<FoodRequestRow> {
        let (row, owner, message) = {
            let mut data = self.lock();
            let item = data
                .items
                .iter()
                .find(|row| row.id == item_id)
                .ok_or_else(|| {
                    anyhow::anyhow!(
                        "violates foreign key constraint \"food_requests_food_item_id_fkey\""
                    )
                })?;
            let owner = item.user_id;
            let message = request_message(
                data.profiles.get(&requester).and_then(|p| p.full_name.as_deref()),
                &item.title,
            );
            let row = FoodRequestRow {
                id: Uuid::new_v4(),
                food_item_id: item_id,
                requester_id: requester,
                status: Some("pending".into()),
                created_at: data.next_timestamp(),
            };
            data.requests.push(row.clone());
            (row, owner, message)
        };
        // Same as the food_requests insert trigger
        self.insert_notification(owner, &message).await?;
        Ok(row)
    }

    async fn sent_requests(&self, requester: Uuid) -> anyhow::Result<Vec<SentRequestRow>> {
        let data = self.lock();
        let mut rows: Vec<SentRequestRow> = data
            .requests
            .iter()
            .filter(|r| r.requester_id == requester)
            .filter_map(|r| {
                let item = data.items.iter().find(|i| i.id == r.food_item_id)?;
                Some(SentRequestRow {
                    id: r.id,
                    status: r.status.clone(),
                    created_at: r.created_at,
                    title: item.title.clone(),
                    image_url: item.image_url.clone(),
                })
            })
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }
}

#[async_trait]
impl NotificationRepo for MemoryStore {
    async fn notifications_for(&self, user: Uuid) -> anyhow::Result<Vec<NotificationRow>> {
        let mut rows: Vec<NotificationRow> = self
            .lock()
            .notifications
            .iter()
            .filter(|n| n.user_id == user)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn insert_notification(
        &self,
        user: Uuid,
        message: &str,
    ) -> anyhow::Result<NotificationRow> {
        let row = {
            let mut data = self.lock();
            let row = NotificationRow {
                id: Uuid::new_v4(),
                user_id: user,
                message: message.to_string(),
                is_read: false,
                created_at: data.next_timestamp(),
            };
            data.notifications.push(row.clone());
            row
        };
        if let Some(feed) = &self.feed {
            feed.publish(Change {
                collection: "notifications".into(),
                kind: ChangeKind::Insert,
                record: serde_json::to_value(&row)?,
            });
        }
        Ok(row)
    }

    async fn mark_read(&self, id: Uuid, user: Uuid) -> anyhow::Result<bool> {
        let mut data = self.lock();
        match data
            .notifications
            .iter_mut()
            .find(|n| n.id == id && n.user_id == user)
        {
            Some(n) => {
                n.is_read = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl RemoteProcedures for MemoryStore {
    async fn increment_score(&self, uid: Uuid) -> anyhow::Result<()> {
        let mut data = self.lock();
        let profile = data
            .profiles
            .get_mut(&uid)
            .ok_or_else(|| anyhow::anyhow!("no profile for {}", uid))?;
        profile.requests_sent = Some(profile.requests_sent.unwrap_or(0) + 1);
        Ok(())
    }
}
