use anyhow::Context;
use bytes::Bytes;
use rand::{distributions::Alphanumeric, Rng};
use uuid::Uuid;

use crate::storage::StorageClient;

const NAME_LEN: usize = 12;

pub struct ImageUpload {
    pub body: Bytes,
    pub content_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredImage {
    pub key: String,
    pub url: String,
}

/// Stores a food photo under `<user id>/<random>.<ext>` and returns its public URL.
pub async fn upload_food_photo(
    storage: &dyn StorageClient,
    user_id: Uuid,
    image: ImageUpload,
) -> anyhow::Result<StoredImage> {
    anyhow::ensure!(!image.body.is_empty(), "empty image");

    let ext = ext_from_mime(&image.content_type).unwrap_or("bin");
    let name: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(NAME_LEN)
        .map(char::from)
        .collect();
    let key = format!("{}/{}.{}", user_id, name, ext);

    storage
        .put_object(&key, image.body, &image.content_type)
        .await
        .with_context(|| format!("put_object {}", key))?;

    let url = storage.public_url(&key);
    Ok(StoredImage { key, url })
}

fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/heic" => Some("heic"),
        "image/gif" => Some("gif"),
        _ => None,
    }
}
