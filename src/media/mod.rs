//! Media store for cocktail images.
//!
//! Images live outside the document store and are referenced from items by
//! an opaque public id. Upload, overwrite and delete are independent of the
//! item lifecycle; callers keep the two in step themselves.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[cfg(feature = "cloudinary")]
pub mod cloudinary;
pub mod memory;

#[cfg(feature = "cloudinary")]
pub use cloudinary::CloudinaryClient;
pub use memory::MemoryMediaStore;

#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("public_id is required")]
    MissingPublicId,
    #[error("image payload is empty")]
    EmptyImage,
    #[error("media transport error: {0}")]
    Transport(String),
    #[error("media store responded {status}: {message}")]
    Upstream { status: u16, message: String },
    #[error("unexpected media store response: {0}")]
    Decode(String),
    #[error("media store misconfigured: {0}")]
    Config(String),
}

pub type MediaResult<T> = Result<T, MediaError>;

/// Binary content handed to the media store.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub data: Bytes,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
}

impl ImageUpload {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            file_name: None,
            content_type: None,
        }
    }

    pub fn with_file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = Some(name.into());
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// Where an uploaded image ended up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedImage {
    pub url: String,
    pub public_id: String,
}

/// Destroy result as reported by the media store: `"ok"` or `"not found"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestroyOutcome {
    pub result: String,
}

impl DestroyOutcome {
    pub fn ok() -> Self {
        Self {
            result: "ok".to_string(),
        }
    }

    pub fn not_found() -> Self {
        Self {
            result: "not found".to_string(),
        }
    }
}

#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Store a new image under the configured folder.
    async fn upload(&self, image: ImageUpload) -> MediaResult<UploadedImage>;

    /// Overwrite the asset at `public_id`, invalidating cached copies.
    async fn replace(&self, public_id: &str, image: ImageUpload) -> MediaResult<UploadedImage>;

    /// Remove the asset at `public_id`.
    async fn destroy(&self, public_id: &str) -> MediaResult<DestroyOutcome>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaBackend {
    #[default]
    Memory,
    Cloudinary,
}

/// Media store settings.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaConfig {
    #[serde(default)]
    pub backend: MediaBackend,

    /// Logical folder every upload lands in.
    #[serde(default = "default_folder")]
    pub folder: String,

    #[serde(default)]
    pub cloud_name: String,

    #[serde(default)]
    pub api_key: String,

    #[serde(default)]
    pub api_secret: String,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Outbound request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

// Keeps the secret out of logs.
impl std::fmt::Debug for MediaConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaConfig")
            .field("backend", &self.backend)
            .field("folder", &self.folder)
            .field("cloud_name", &self.cloud_name)
            .field("api_key", &self.api_key)
            .field("api_secret", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            backend: MediaBackend::default(),
            folder: default_folder(),
            cloud_name: String::new(),
            api_key: String::new(),
            api_secret: String::new(),
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl MediaConfig {
    pub fn build(&self) -> MediaResult<Arc<dyn MediaStore>> {
        match self.backend {
            MediaBackend::Memory => Ok(Arc::new(MemoryMediaStore::new(&self.folder))),
            MediaBackend::Cloudinary => {
                #[cfg(feature = "cloudinary")]
                {
                    Ok(Arc::new(CloudinaryClient::new(self)?))
                }
                #[cfg(not(feature = "cloudinary"))]
                {
                    Err(MediaError::Config(
                        "cloudinary backend disabled at compile time".into(),
                    ))
                }
            }
        }
    }
}

fn default_folder() -> String {
    "cocktails".to_string()
}

fn default_base_url() -> String {
    "https://api.cloudinary.com".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}
