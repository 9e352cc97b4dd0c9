use crate::media::{
    DestroyOutcome, ImageUpload, MediaError, MediaResult, MediaStore, UploadedImage,
};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::RwLock;

/// In-process media store. Assets get `memory://<folder>/<id>` URLs and a
/// version suffix that changes on every overwrite.
pub struct MemoryMediaStore {
    folder: String,
    assets: RwLock<HashMap<String, (Bytes, u32)>>,
}

impl MemoryMediaStore {
    pub fn new(folder: impl Into<String>) -> Self {
        Self {
            folder: folder.into(),
            assets: RwLock::new(HashMap::new()),
        }
    }

    /// Stored bytes for an asset, if present.
    pub fn get(&self, public_id: &str) -> Option<Bytes> {
        self.assets
            .read()
            .ok()?
            .get(public_id)
            .map(|(data, _)| data.clone())
    }

    fn url(public_id: &str, version: u32) -> String {
        format!("memory://{public_id}?v={version}")
    }

    fn put(&self, public_id: String, data: Bytes) -> MediaResult<UploadedImage> {
        let mut assets = self
            .assets
            .write()
            .map_err(|_| MediaError::Transport("poisoned lock".into()))?;
        let version = assets.get(&public_id).map(|(_, v)| v + 1).unwrap_or(1);
        assets.insert(public_id.clone(), (data, version));
        Ok(UploadedImage {
            url: Self::url(&public_id, version),
            public_id,
        })
    }
}

#[async_trait]
impl MediaStore for MemoryMediaStore {
    async fn upload(&self, image: ImageUpload) -> MediaResult<UploadedImage> {
        if image.data.is_empty() {
            return Err(MediaError::EmptyImage);
        }
        let public_id = format!("{}/{}", self.folder, uuid::Uuid::new_v4().simple());
        self.put(public_id, image.data)
    }

    async fn replace(&self, public_id: &str, image: ImageUpload) -> MediaResult<UploadedImage> {
        if public_id.trim().is_empty() {
            return Err(MediaError::MissingPublicId);
        }
        if image.data.is_empty() {
            return Err(MediaError::EmptyImage);
        }
        self.put(public_id.to_string(), image.data)
    }

    async fn destroy(&self, public_id: &str) -> MediaResult<DestroyOutcome> {
        if public_id.trim().is_empty() {
            return Err(MediaError::MissingPublicId);
        }
        let removed = self
            .assets
            .write()
            .map_err(|_| MediaError::Transport("poisoned lock".into()))?
            .remove(public_id);
        Ok(match removed {
            Some(_) => DestroyOutcome::ok(),
            None => DestroyOutcome::not_found(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upload_places_asset_in_folder() {
        let store = MemoryMediaStore::new("cocktails");
        let uploaded = store.upload(ImageUpload::new(vec![1u8, 2, 3])).await.unwrap();
        assert!(uploaded.public_id.starts_with("cocktails/"));
        assert!(uploaded.url.contains(&uploaded.public_id));
        assert_eq!(store.get(&uploaded.public_id).unwrap().as_ref(), &[1, 2, 3]);
    }

    #[tokio::test]
    async fn replace_bumps_version() {
        let store = MemoryMediaStore::new("cocktails");
        let first = store.upload(ImageUpload::new(vec![1u8])).await.unwrap();
        let second = store
            .replace(&first.public_id, ImageUpload::new(vec![2u8]))
            .await
            .unwrap();
        assert_eq!(second.public_id, first.public_id);
        assert_ne!(second.url, first.url);
        assert_eq!(store.get(&first.public_id).unwrap().as_ref(), &[2]);
    }

    #[tokio::test]
    async fn destroy_reports_not_found_second_time() {
        let store = MemoryMediaStore::new("cocktails");
        let uploaded = store.upload(ImageUpload::new(vec![9u8])).await.unwrap();
        assert_eq!(store.destroy(&uploaded.public_id).await.unwrap(), DestroyOutcome::ok());
        assert_eq!(
            store.destroy(&uploaded.public_id).await.unwrap(),
            DestroyOutcome::not_found()
        );
    }

    #[tokio::test]
    async fn rejects_empty_input() {
        let store = MemoryMediaStore::new("cocktails");
        assert!(matches!(
            store.upload(ImageUpload::new(Vec::<u8>::new())).await,
            Err(MediaError::EmptyImage)
        ));
        assert!(matches!(store.destroy(" ").await, Err(MediaError::MissingPublicId)));
    }
}
