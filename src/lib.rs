//! Core of the cocktail catalogue backend.
//!
//! This crate holds everything below the HTTP layer:
//!
//! - [`model`]: typed items, identifiers and update patches
//! - [`filter`]: attribute filters for listings (set membership, AND-combined)
//! - [`store`]: the document store seam with memory and redb backends
//! - [`media`]: the media store seam with memory and Cloudinary backends
//! - [`service`]: input validation and paging in front of the store
//!
//! The HTTP server lives in `crates/server` and wires these together.
//!
//! # Example
//!
//! ```rust,no_run
//! use cocktails::{ItemService, StoreConfig};
//! use serde_json::json;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let store = StoreConfig::in_memory().build()?;
//! let items = ItemService::new(store);
//!
//! let payload = json!({"name": "Mojito", "category": "highball"});
//! let created = items.create_item(payload.as_object().cloned().unwrap()).await?;
//!
//! let page = items.search_items(0, Some(10), Some("mojito")).await?;
//! assert_eq!(page.items[0].id, created.inserted_id);
//! # Ok(())
//! # }
//! ```

pub mod filter;
pub mod media;
pub mod model;
pub mod service;
pub mod store;

pub use filter::{Filter, FilterError, parse_filters};
pub use media::{
    DestroyOutcome, ImageUpload, MediaBackend, MediaConfig, MediaError, MediaStore,
    MemoryMediaStore, UploadedImage,
};
pub use model::{ImageRef, InvalidId, Item, ItemId, ItemPatch, NewItem, PayloadError};
pub use service::{
    DeleteResult, InsertResult, ItemPage, ItemService, MAX_LIST_LIMIT, MAX_SEARCH_LIMIT,
    ServiceError, ServiceResult,
};
pub use store::{
    DeleteOutcome, ItemStore, MemoryStore, Page, StoreBackend, StoreConfig, StoreError,
    TextQuery, UpdateOutcome,
};
