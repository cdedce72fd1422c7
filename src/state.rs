use std::sync::Arc;

use crate::auth::{jwt::JwtKeys, provider::LocalSessionProvider, provider::SessionProvider};
use crate::config::{AppConfig, StoreBackend};
use crate::feed::{bridge_postgres, ChangeFeed};
use crate::rpc::RemoteProcedures;
use crate::storage::{MemoryStorage, Storage, StorageClient};
use crate::store::{DocumentStore, MemoryStore, PgStore};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn DocumentStore>,
    pub rpc: Arc<dyn RemoteProcedures>,
    pub storage: Arc<dyn StorageClient>,
    pub feed: ChangeFeed,
    pub sessions: Arc<dyn SessionProvider>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);
        let feed = ChangeFeed::default();

        let (store, rpc, storage): (
            Arc<dyn DocumentStore>,
            Arc<dyn RemoteProcedures>,
            Arc<dyn StorageClient>,
        ) = match config.backend {
            StoreBackend::Postgres => {
                let pg = PgStore::connect(&config.database_url).await?;
                if let Err(e) = pg.migrate().await {
                    tracing::warn!(error = %e, "migrations folder not found or migration failed; continuing");
                }
                // Real-time inserts arrive through LISTEN/NOTIFY
                bridge_postgres(pg.pool(), &config.feed_channel, feed.clone()).await?;

                let storage = Storage::new(&config.storage).await?;
                let pg = Arc::new(pg);
                (pg.clone(), pg, Arc::new(storage))
            }
            StoreBackend::Memory => {
                tracing::info!("running with in-memory store");
                let memory = Arc::new(MemoryStore::new().with_feed(feed.clone()));
                (memory.clone(), memory, Arc::new(MemoryStorage::new()))
            }
        };

        Ok(Self::from_parts(config, store, rpc, storage, feed))
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        store: Arc<dyn DocumentStore>,
        rpc: Arc<dyn RemoteProcedures>,
        storage: Arc<dyn StorageClient>,
        feed: ChangeFeed,
    ) -> Self {
        let keys = JwtKeys::from_config(&config.jwt);
        let sessions = Arc::new(LocalSessionProvider::new(store.clone(), keys));
        Self {
            config,
            store,
            rpc,
            storage,
            feed,
            sessions,
        }
    }

    /// Memory-backed state with the store publishing on `state.feed`.
    pub fn fake() -> Self {
        let feed = ChangeFeed::default();
        let store = Arc::new(MemoryStore::new().with_feed(feed.clone()));
        Self::from_parts(
            Arc::new(AppConfig::for_tests()),
            store.clone(),
            store,
            Arc::new(MemoryStorage::new()),
            feed,
        )
    }

    /// Like `fake`, keeping typed handles on the store and blob store.
    pub fn fake_with(store: Arc<MemoryStore>, storage: Arc<MemoryStorage>) -> Self {
        Self::from_parts(
            Arc::new(AppConfig::for_tests()),
            store.clone(),
            store,
            storage,
            ChangeFeed::default(),
        )
    }
}
