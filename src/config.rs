use serde::Deserialize;

use crate::score::MissingEmissions;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

/// Blob store connection (S3 or MinIO).
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
    /// Base of public object URLs, e.g. `https://cdn.example.com`.
    pub public_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub backend: StoreBackend,
    pub database_url: String,
    pub jwt: JwtConfig,
    pub storage: StorageConfig,
    pub missing_emissions: MissingEmissions,
    pub feed_channel: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let backend = match std::env::var("STORE").as_deref() {
            Ok("memory") => StoreBackend::Memory,
            _ => StoreBackend::Postgres,
        };
        let database_url = match backend {
            StoreBackend::Postgres => std::env::var("DATABASE_URL")?,
            StoreBackend::Memory => std::env::var("DATABASE_URL").unwrap_or_default(),
        };
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "foodshare".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "foodshare-users".into()),
            ttl_minutes: std::env::var("JWT_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60),
            refresh_ttl_minutes: std::env::var("JWT_REFRESH_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60 * 24 * 14),
        };
        let storage = StorageConfig {
            endpoint: std::env::var("STORAGE_ENDPOINT")
                .unwrap_or_else(|_| "http://localhost:9000".into()),
            bucket: std::env::var("STORAGE_BUCKET").unwrap_or_else(|_| "food-photos".into()),
            access_key: std::env::var("STORAGE_ACCESS_KEY").unwrap_or_default(),
            secret_key: std::env::var("STORAGE_SECRET_KEY").unwrap_or_default(),
            region: std::env::var("STORAGE_REGION").unwrap_or_else(|_| "us-east-1".into()),
            public_url: std::env::var("STORAGE_PUBLIC_URL")
                .unwrap_or_else(|_| "http://localhost:9000".into()),
        };
        let missing_emissions = std::env::var("SCORE_MISSING_EMISSIONS")
            .ok()
            .map(|v| v.parse::<MissingEmissions>())
            .transpose()?
            .unwrap_or_default();
        let feed_channel =
            std::env::var("FEED_CHANNEL").unwrap_or_else(|_| "foodshare_changes".into());

        Ok(Self {
            backend,
            database_url,
            jwt,
            storage,
            missing_emissions,
            feed_channel,
        })
    }

    /// Config used by `AppState::fake` and tests.
    pub fn for_tests() -> Self {
        Self {
            backend: StoreBackend::Memory,
            database_url: String::new(),
            jwt: JwtConfig {
                secret: "test".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
                ttl_minutes: 5,
                refresh_ttl_minutes: 60,
            },
            storage: StorageConfig {
                endpoint: "fake".into(),
                bucket: "food-photos".into(),
                access_key: "fake".into(),
                secret_key: "fake".into(),
                region: "us-east-1".into(),
                public_url: "https://fake.local".into(),
            },
            missing_emissions: MissingEmissions::AsZero,
            feed_channel: "foodshare_changes".into(),
        }
    }
}
