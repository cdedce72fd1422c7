//! Document-store seam: one trait per collection and two adapters.

pub mod memory;
pub mod pg;

pub use memory::MemoryStore;
pub use pg::PgStore;

use crate::auth::repo::UserRepo;
use crate::items::repo::ItemRepo;
use crate::notifications::repo::NotificationRepo;
use crate::profiles::repo::ProfileRepo;
use crate::requests::repo::RequestRepo;

/// Every collection the application reads or writes.
pub trait DocumentStore:
    UserRepo + ItemRepo + ProfileRepo + RequestRepo + NotificationRepo
{
}

impl<T> DocumentStore for T where
    T: UserRepo + ItemRepo + ProfileRepo + RequestRepo + NotificationRepo
{
}
